//! Outcome channels: webhook, append-only file, or log-only.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;
use treesync_core::contract::{BoxError, OutcomeChannel};

use crate::config::ChannelConfig;

/// POSTs each notification as a `text/plain` body. Non-2xx responses are send failures.
pub struct WebhookChannel {
    client: Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl OutcomeChannel for WebhookChannel {
    async fn send(&self, text: &str) -> Result<(), BoxError> {
        self.client
            .post(&self.url)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(text.to_owned())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Appends one line per notification.
pub struct FileChannel {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl OutcomeChannel for FileChannel {
    async fn send(&self, text: &str) -> Result<(), BoxError> {
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{text}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Emits the notification as a log event only.
pub struct LogChannel {
    name: &'static str,
}

#[async_trait]
impl OutcomeChannel for LogChannel {
    async fn send(&self, text: &str) -> Result<(), BoxError> {
        info!(channel = self.name, notification = text, "Outcome notification");
        Ok(())
    }
}

pub fn build_channel(
    config: &ChannelConfig,
    client: &Client,
    name: &'static str,
) -> Arc<dyn OutcomeChannel> {
    match config {
        ChannelConfig::Webhook { url } => {
            Arc::new(WebhookChannel::new(client.clone(), url.clone()))
        }
        ChannelConfig::File { path } => Arc::new(FileChannel::new(path.clone())),
        ChannelConfig::Log => Arc::new(LogChannel { name }),
    }
}
