//! Shared HTTP plumbing for every channel.

use config::HttpConfig;
use errors::NotifierError;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

/// One client for all channels, with connect and total timeouts.
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(config.user_agent.clone())
        .build()
}

/// Send and turn transport errors and non-2xx responses into
/// [`NotifierError`].
pub(crate) async fn send_checked(
    channel: &str,
    request: RequestBuilder
) -> Result<(), NotifierError> {
    let response = request
        .send()
        .await
        .map_err(|e| NotifierError::Transport {
            channel: channel.to_string(),
            reason: e.to_string()
        })?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(NotifierError::Rejected {
        channel: channel.to_string(),
        status: status.as_u16(),
        body
    })
}
