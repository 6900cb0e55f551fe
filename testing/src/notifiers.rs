use async_trait::async_trait;
use errors::NotifierError;
use notifiers::{ErrorEvent, Notifier};
use parking_lot::Mutex;

/// Keeps every event it is handed.
pub struct RecordingNotifier {
    name: String,
    events: Mutex<Vec<ErrorEvent>>
}

impl RecordingNotifier {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            events: Mutex::new(Vec::new())
        }
    }

    pub fn events(&self) -> Vec<ErrorEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, event: &ErrorEvent) -> Result<(), NotifierError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Always fails with a transport error.
pub struct FailingNotifier {
    name: String
}

impl FailingNotifier {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string()
        }
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, _event: &ErrorEvent) -> Result<(), NotifierError> {
        Err(NotifierError::Transport {
            channel: self.name.clone(),
            reason: "connection refused".to_string()
        })
    }
}

/// Panics inside `notify`.
pub struct PanickingNotifier;

#[async_trait]
impl Notifier for PanickingNotifier {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn notify(&self, _event: &ErrorEvent) -> Result<(), NotifierError> {
        panic!("notifier exploded")
    }
}
