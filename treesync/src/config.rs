/// `config` module: loads the worker's YAML configuration and applies environment overrides.
///
/// This is the only place where the untrusted YAML file is parsed into typed settings.
/// The category table it produces is handed to the core once, before any message is handled,
/// and never changes afterwards.
///
/// # Environment
/// - `TREESYNC_STORE_BASE_URL` replaces `store.base_url`.
/// - `TREESYNC_STORE_TOKEN` sets a bearer token for object store requests.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use treesync_core::category::CategoryMapping;

pub const STORE_BASE_URL_ENV: &str = "TREESYNC_STORE_BASE_URL";
pub const STORE_TOKEN_ENV: &str = "TREESYNC_STORE_TOKEN";

#[derive(Debug, Deserialize)]
pub struct WorkerConfig {
    pub categories: CategoryMapping,
    pub store: StoreSection,
    pub queue: QueueSection,
    pub channels: ChannelsSection,
}

#[derive(Debug, Deserialize)]
pub struct StoreSection {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Only ever taken from the environment.
    #[serde(skip)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueueSection {
    pub inbox: PathBuf,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChannelsSection {
    pub success: ChannelConfig,
    pub error: ChannelConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelConfig {
    Webhook { url: String },
    File { path: PathBuf },
    Log,
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_concurrent_jobs() -> usize {
    1
}

/// Loads and validates the YAML config at `path`, then applies environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<WorkerConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: WorkerConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let Ok(base_url) = std::env::var(STORE_BASE_URL_ENV) {
        info!(base_url = %base_url, "Store base URL overridden from env");
        config.store.base_url = base_url;
    }
    config.store.token = std::env::var(STORE_TOKEN_ENV)
        .ok()
        .filter(|token| !token.is_empty());

    validate(&config).with_context(|| format!("Invalid config in {}", path_ref.display()))?;

    config.categories.trace_loaded();
    info!(
        inbox = %config.queue.inbox.display(),
        max_concurrent_jobs = config.queue.max_concurrent_jobs,
        store = %config.store.base_url,
        "Config loaded successfully"
    );
    Ok(config)
}

fn validate(config: &WorkerConfig) -> Result<()> {
    if config.categories.is_empty() {
        bail!("at least one category must be configured");
    }
    for (category, root) in config.categories.iter() {
        if category.is_empty() || category.contains('/') {
            bail!("category name {category:?} must be a single non-empty path segment");
        }
        if root.as_os_str().is_empty() {
            bail!("category {category:?} has an empty destination root");
        }
    }
    if config.queue.max_concurrent_jobs == 0 {
        bail!("queue.max_concurrent_jobs must be at least 1");
    }
    if config.store.timeout_secs == 0 {
        bail!("store.timeout_secs must be at least 1");
    }
    Ok(())
}
