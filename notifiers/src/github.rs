//! GitHub issue creation for an error group.

use config::{GithubConfig, HttpConfig};
use errors::IssueError;
use fl_core::types::{ErrorGroup, ErrorOccurrence};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utils::truncate_with_ellipsis;

const TITLE_MESSAGE_LENGTH: usize = 80;
const MAX_BACKTRACE_LINES: usize = 20;
const VARIABLE_VALUE_LENGTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIssue {
    pub url: String,
    pub number: u64
}

#[derive(Debug, Serialize)]
struct IssueRequest<'a> {
    title: String,
    body: String,
    labels: &'a [String]
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    html_url: String,
    number: u64
}

pub struct GithubIssueCreator {
    config: GithubConfig,
    client: Client,
    dashboard_url: Option<String>
}

impl GithubIssueCreator {
    pub fn new(config: GithubConfig, http: &HttpConfig) -> Result<Self, IssueError> {
        let client = crate::http::build_http_client(http).map_err(|e| IssueError::Transport {
            reason: e.to_string()
        })?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: GithubConfig, client: Client) -> Self {
        Self {
            config,
            client,
            dashboard_url: None
        }
    }

    pub fn with_dashboard_url(mut self, url: Option<String>) -> Self {
        self.dashboard_url = url;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub async fn create(
        &self,
        group: &ErrorGroup,
        occurrence: Option<&ErrorOccurrence>
    ) -> Result<CreatedIssue, IssueError> {
        let (Some(repo), Some(token)) = (
            self.config.repo.as_deref().filter(|r| !r.is_empty()),
            self.config.token.as_deref().filter(|t| !t.is_empty())
        ) else {
            return Err(IssueError::NotConfigured);
        };

        let url = format!(
            "{}/repos/{}/issues",
            self.config.api_base.trim_end_matches('/'),
            repo
        );
        let payload = IssueRequest {
            title: self.issue_title(group),
            body: self.issue_body(group, occurrence),
            labels: &self.config.labels
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", self.config.product_name.as_str())
            .json(&payload)
            .send()
            .await
            .map_err(|e| IssueError::Transport {
                reason: e.to_string()
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), group_id = %group.id, "GitHub issue creation rejected");
            return Err(IssueError::ApiRejected {
                status: status.as_u16(),
                body
            });
        }

        let issue: IssueResponse =
            response
                .json()
                .await
                .map_err(|e| IssueError::InvalidResponse {
                    reason: e.to_string()
                })?;
        tracing::info!(group_id = %group.id, number = issue.number, "GitHub issue created");
        Ok(CreatedIssue {
            url: issue.html_url,
            number: issue.number
        })
    }

    pub fn issue_title(&self, group: &ErrorGroup) -> String {
        format!(
            "[{}] {}: {}",
            self.config.product_name,
            group.exception_class,
            truncate_with_ellipsis(&group.sanitized_message, TITLE_MESSAGE_LENGTH)
        )
    }

    pub fn labels(&self) -> &[String] {
        &self.config.labels
    }

    pub fn issue_body(&self, group: &ErrorGroup, occurrence: Option<&ErrorOccurrence>) -> String {
        let mut body = String::new();
        body.push_str("## Error Details\n\n");
        body.push_str("| Field | Value |\n|-------|-------|\n");
        body.push_str(&format!("| **Exception** | `{}` |\n", group.exception_class));
        body.push_str(&format!(
            "| **Message** | {} |\n",
            group.sanitized_message.replace('|', "\\|")
        ));
        body.push_str(&format!(
            "| **Location** | `{}` |\n",
            group.location().unwrap_or_else(|| "unknown".to_string())
        ));
        if let Some(method) = &group.method_name {
            body.push_str(&format!("| **Method** | `{}` |\n", method));
        }
        body.push_str(&format!("| **Occurrences** | {} |\n", group.occurrences_count));
        body.push_str(&format!("| **First seen** | {} |\n", group.first_seen_at.to_rfc3339()));
        body.push_str(&format!("| **Last seen** | {} |\n", group.last_seen_at.to_rfc3339()));
        if let Some(occurrence) = occurrence {
            body.push_str(&format!("| **Environment** | {} |\n", occurrence.environment));
            if let Some(url) = &occurrence.request_url {
                body.push_str(&format!(
                    "| **Request** | `{} {}` |\n",
                    occurrence.request_method.as_deref().unwrap_or_default(),
                    url
                ));
            }
        }

        body.push_str("\n## Stack Trace\n\n```\n");
        body.push_str(&format_backtrace(
            occurrence
                .map(|o| o.backtrace.as_slice())
                .unwrap_or_default()
        ));
        body.push_str("\n```\n");

        body.push_str(&local_variables_section(occurrence));

        let link = self
            .dashboard_url
            .as_deref()
            .map(|base| format!("{}/error_groups/{}", base.trim_end_matches('/'), group.id))
            .or_else(|| self.config.repo.as_ref().map(|r| format!("https://github.com/{r}")))
            .unwrap_or_default();
        body.push_str(&format!(
            "\n---\n*Created by [{}]({})*\n",
            self.config.product_name, link
        ));
        body
    }
}

/// First frames of the backtrace, or a placeholder when it is empty.
pub fn format_backtrace(backtrace: &[String]) -> String {
    if backtrace.is_empty() {
        return "No backtrace available".to_string();
    }
    backtrace
        .iter()
        .take(MAX_BACKTRACE_LINES)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn local_variables_section(occurrence: Option<&ErrorOccurrence>) -> String {
    let Some(locals) = occurrence.and_then(|o| o.local_variables.as_ref()) else {
        return String::new();
    };
    if locals.is_empty() {
        return String::new();
    }

    let mut section = String::from("\n## Local Variables\n\n| Variable | Value |\n|----------|-------|\n");
    for (name, value) in locals {
        section.push_str(&format!(
            "| `{}` | `{}` |\n",
            name,
            format_variable_value(value).replace('|', "\\|")
        ));
    }
    section
}

/// Compact JSON rendering, cut at a fixed length.
pub fn format_variable_value(value: &Value) -> String {
    truncate_with_ellipsis(&value.to_string(), VARIABLE_VALUE_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_variable_value() {
        assert_eq!(format_variable_value(&json!({"key": "value"})), r#"{"key":"value"}"#);
        assert_eq!(format_variable_value(&json!("test")), r#""test""#);
        assert_eq!(format_variable_value(&json!(123)), "123");
        let long = format_variable_value(&json!("x".repeat(500)));
        assert!(long.ends_with("..."));
        assert_eq!(long.chars().count(), VARIABLE_VALUE_LENGTH);
    }

    #[test]
    fn test_format_backtrace_limits_lines() {
        let frames: Vec<String> = (0..50).map(|i| format!("src/app.rs:{i}:in `f`")).collect();
        assert_eq!(format_backtrace(&frames).lines().count(), 20);
        assert_eq!(format_backtrace(&[]), "No backtrace available");
    }
}
