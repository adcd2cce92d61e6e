//! # contract: collaborator interfaces used by the sync core
//!
//! The core never talks to a network or a queue directly. It calls into three
//! narrow capabilities, each defined here as an async trait:
//!
//! - [`ObjectFetcher`]: checks whether a remote object exists and copies it to a local path.
//! - [`QueueTransport`]: hands out inbound messages and acknowledges them.
//! - [`OutcomeChannel`]: a send-only sink for plain-text job notifications.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`, so consumers can generate mocks
//!   for unit/integration tests (enabled by the `test-export-mocks` feature).
//!
//! ## Implementing a collaborator
//! - Methods return [`BoxError`] on failure. The core turns those into job
//!   failures or log lines; it never retries.
//! - Implementations must be safe to share between concurrently running jobs.

use std::path::Path;

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Error type at collaborator boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One inbound message: an opaque id and the raw body carrying a folder tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: String,
    pub body: Vec<u8>,
}

impl InboundMessage {
    pub fn new(id: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }
}

/// Access to the remote object store.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    /// Whether an object exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool, BoxError>;

    /// Transfer the object under `key` to `local_path`, replacing any existing file.
    async fn fetch(&self, key: &str, local_path: &Path) -> Result<(), BoxError>;
}

/// Source of inbound messages.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Next message, or `None` once the queue has nothing more to deliver.
    async fn receive(&self) -> Result<Option<InboundMessage>, BoxError>;

    /// Remove a message from the queue. Called exactly once per handled message.
    async fn acknowledge(&self, message_id: &str) -> Result<(), BoxError>;

    /// Hook for transport-level faults that never reached a message handler.
    fn report_transport_error(&self, description: &str);
}

/// Send-only notification sink (one for successes, one for errors).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait OutcomeChannel: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), BoxError>;
}
