//! HTTP object store: `HEAD` for existence, streamed `GET` for transfers.

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use treesync_core::contract::{BoxError, ObjectFetcher};

use crate::config::StoreSection;

pub struct HttpObjectStore {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(config: &StoreSection) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid store base URL {:?}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("Store base URL {} cannot carry object paths", base_url);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client for object store")?;
        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    /// URL of an object; each key segment is percent-encoded on its own.
    pub fn object_url(&self, key: &str) -> Result<Url, BoxError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| "store base URL cannot carry object paths")?
            .pop_if_empty()
            .extend(key.split('/'));
        Ok(url)
    }

    fn authorised(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn download_to(
        &self,
        key: &str,
        url: Url,
        file: &mut tokio::fs::File,
    ) -> Result<u64, BoxError> {
        let response = self
            .authorised(self.client.get(url))
            .send()
            .await?
            .error_for_status()?;
        let expected = response.content_length();

        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if let Some(expected) = expected {
            if expected != written {
                return Err(
                    format!("{key}: expected {expected} bytes, received {written}").into(),
                );
            }
        }
        Ok(written)
    }
}

/// A uniquely named `.part` file next to `local_path`, removed on drop unless persisted.
fn partial_file(local_path: &Path) -> std::io::Result<(std::fs::File, TempPath)> {
    let folder = local_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut prefix = OsString::from(".");
    prefix.push(local_path.file_name().unwrap_or_default());
    prefix.push(".");
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(".part");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // tempfile defaults to 0600; mirrored files get ordinary permissions.
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    Ok(builder.tempfile_in(folder)?.into_parts())
}

#[async_trait]
impl ObjectFetcher for HttpObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, BoxError> {
        let url = self.object_url(key)?;
        let response = self.authorised(self.client.head(url)).send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(format!("unexpected status {status} checking {key}").into()),
        }
    }

    async fn fetch(&self, key: &str, local_path: &Path) -> Result<(), BoxError> {
        let url = self.object_url(key)?;
        let (file, partial) = partial_file(local_path)?;
        let mut file = tokio::fs::File::from_std(file);

        let bytes = self.download_to(key, url, &mut file).await?;
        drop(file);
        partial.persist(local_path)?;
        debug!(key, bytes, local_path = %local_path.display(), "Stored object");
        Ok(())
    }
}
