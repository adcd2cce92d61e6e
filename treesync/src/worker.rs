//! Wires configuration into a ready-to-use message handler.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use treesync_core::download::TreeDownloader;
use treesync_core::intake::MessageHandler;
use treesync_core::outcome::OutcomeReporter;

use crate::channels::build_channel;
use crate::config::WorkerConfig;
use crate::store::HttpObjectStore;

/// Builds the handler shared by every job. The category table is moved into an
/// `Arc` here and only read from then on.
pub fn build_handler(config: WorkerConfig) -> Result<MessageHandler> {
    let store = HttpObjectStore::new(&config.store).context("Failed to set up object store")?;
    let client = Client::builder()
        .build()
        .context("Failed to build HTTP client for outcome channels")?;

    let reporter = OutcomeReporter::new(
        build_channel(&config.channels.success, &client, "success"),
        build_channel(&config.channels.error, &client, "error"),
    );
    let downloader = TreeDownloader::new(Arc::new(config.categories), Arc::new(store));
    Ok(MessageHandler::new(downloader, reporter))
}
