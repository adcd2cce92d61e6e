//! Spool-directory queue: each `*.json` file in the inbox is one message.
//!
//! The inbox is listed once when the queue is opened and handed out in file-name order.
//! The message id is the file stem; acknowledging deletes the file.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use treesync_core::contract::{BoxError, InboundMessage, QueueTransport};

const MESSAGE_EXTENSION: &str = "json";
const UNREADABLE_SUFFIX: &str = ".unreadable";

pub struct SpoolQueue {
    inbox: PathBuf,
    pending: Mutex<VecDeque<PathBuf>>,
}

impl SpoolQueue {
    /// Opens the inbox, creating it if needed, and snapshots the messages waiting in it.
    pub async fn open(inbox: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let inbox = inbox.into();
        tokio::fs::create_dir_all(&inbox)
            .await
            .with_context(|| format!("Failed to create inbox {}", inbox.display()))?;

        let mut entries = tokio::fs::read_dir(&inbox)
            .await
            .with_context(|| format!("Failed to list inbox {}", inbox.display()))?;
        let mut messages = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension() == Some(OsStr::new(MESSAGE_EXTENSION)) {
                messages.push(path);
            }
        }
        messages.sort();

        info!(inbox = %inbox.display(), messages = messages.len(), "Opened spool inbox");
        Ok(Self {
            inbox,
            pending: Mutex::new(messages.into()),
        })
    }

    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    fn message_path(&self, message_id: &str) -> PathBuf {
        self.inbox.join(format!("{message_id}.{MESSAGE_EXTENSION}"))
    }

    async fn set_aside(&self, path: &Path) {
        let mut target = path.as_os_str().to_os_string();
        target.push(UNREADABLE_SUFFIX);
        if let Err(e) = tokio::fs::rename(path, &target).await {
            error!(path = %path.display(), error = %e, "Failed to move unreadable message aside");
        }
    }
}

fn message_id(path: &Path) -> Option<&str> {
    path.file_stem().and_then(OsStr::to_str)
}

#[async_trait]
impl QueueTransport for SpoolQueue {
    async fn receive(&self) -> Result<Option<InboundMessage>, BoxError> {
        loop {
            let Some(path) = self.pending.lock().await.pop_front() else {
                return Ok(None);
            };
            let Some(id) = message_id(&path).map(str::to_owned) else {
                self.report_transport_error(&format!(
                    "{} has no usable message id",
                    path.display()
                ));
                self.set_aside(&path).await;
                continue;
            };
            match tokio::fs::read(&path).await {
                Ok(body) => {
                    debug!(message_id = %id, bytes = body.len(), "Received message");
                    return Ok(Some(InboundMessage { id, body }));
                }
                Err(e) => {
                    self.report_transport_error(&format!(
                        "failed to read {}: {e}",
                        path.display()
                    ));
                    self.set_aside(&path).await;
                }
            }
        }
    }

    async fn acknowledge(&self, message_id: &str) -> Result<(), BoxError> {
        let path = self.message_path(message_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(message_id, "Acknowledged message");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(message_id, "Message already gone at acknowledgment");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn report_transport_error(&self, description: &str) {
        error!(inbox = %self.inbox.display(), description, "Spool transport error");
    }
}
