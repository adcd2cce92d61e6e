//! Job outcome and its notification.

use std::sync::Arc;

use tracing::{error, info};

use crate::contract::OutcomeChannel;

/// Result of handling one inbound message. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub success: bool,
    pub message_id: String,
    /// Failure description; `None` on success.
    pub description: Option<String>,
}

impl JobOutcome {
    pub fn succeeded(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: message_id.into(),
            description: None,
        }
    }

    pub fn failed(message_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: message_id.into(),
            description: Some(description.into()),
        }
    }

    /// Human-readable status line sent to the outcome channel.
    pub fn notification(&self) -> String {
        if self.success {
            format!("Message {} processed successfully", self.message_id)
        } else {
            format!(
                "Message {} failed: {}",
                self.message_id,
                self.description.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

/// Sends exactly one notification per outcome, to the success or the error channel.
#[derive(Clone)]
pub struct OutcomeReporter {
    success: Arc<dyn OutcomeChannel>,
    error: Arc<dyn OutcomeChannel>,
}

impl OutcomeReporter {
    pub fn new(success: Arc<dyn OutcomeChannel>, error: Arc<dyn OutcomeChannel>) -> Self {
        Self { success, error }
    }

    /// Delivery failures are logged and swallowed.
    pub async fn report(&self, outcome: &JobOutcome) {
        let (channel, channel_name) = if outcome.success {
            (&self.success, "success")
        } else {
            (&self.error, "error")
        };
        let text = outcome.notification();

        match channel.send(&text).await {
            Ok(()) => info!(
                message_id = %outcome.message_id,
                channel = channel_name,
                "Sent outcome notification"
            ),
            Err(e) => error!(
                message_id = %outcome.message_id,
                channel = channel_name,
                error = %e,
                "Failed to send outcome notification"
            ),
        }
    }
}
