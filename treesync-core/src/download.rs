//! Tree downloader: mirrors one folder tree into category-routed local folders.
//!
//! # Behaviour
//! - Folders are visited depth-first in declared order; a folder's own files
//!   are fetched before any of its subfolders are entered.
//! - Fail-fast: the first failed fetch ends the whole download, so nothing
//!   declared after it is attempted.
//! - A folder without a category (the root) has its own files skipped but its
//!   subfolders are still visited. A folder whose category has no destination
//!   is skipped together with its descendants. Neither counts as a failure.
//! - Fetches run one at a time; the downloader holds no mutable state, so
//!   several downloads may run concurrently on the same instance.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::category::{CategoryMapping, SkipReason};
use crate::contract::ObjectFetcher;
use crate::error::{FetchFailure, SyncError, SyncResult};
use crate::tree::{is_safe_name, join_key, FileLeaf, FolderNode};

/// A branch (or the root's own files) that was left out of the download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBranch {
    pub path: String,
    pub reason: SkipReason,
}

/// Summary of a successful download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub files_fetched: usize,
    pub skipped: Vec<SkippedBranch>,
}

pub struct TreeDownloader {
    mapping: Arc<CategoryMapping>,
    fetcher: Arc<dyn ObjectFetcher>,
}

impl TreeDownloader {
    pub fn new(mapping: Arc<CategoryMapping>, fetcher: Arc<dyn ObjectFetcher>) -> Self {
        Self { mapping, fetcher }
    }

    pub fn mapping(&self) -> &CategoryMapping {
        &self.mapping
    }

    /// Downloads `node` and everything below it. `ancestor_path` is the key of
    /// the node's parent, empty for a root.
    pub async fn download(
        &self,
        node: &FolderNode,
        ancestor_path: &str,
    ) -> SyncResult<DownloadReport> {
        let mut report = DownloadReport::default();
        let mut pending: Vec<(&FolderNode, String)> = vec![(node, ancestor_path.to_owned())];

        while let Some((node, ancestor)) = pending.pop() {
            if !is_safe_name(&node.name) {
                let key = join_key(&ancestor, &node.name);
                error!(path = %key, "Folder name is not a single path component");
                return Err(SyncError::fetch(key, FetchFailure::InvalidName(node.name.clone())));
            }
            let current_path = join_key(&ancestor, &node.name);

            match self.mapping.local_folder(&current_path) {
                Ok(local_folder) => {
                    ensure_folder(&local_folder).await?;
                    for file in &node.files {
                        self.fetch_file(&current_path, &local_folder, file).await?;
                        report.files_fetched += 1;
                    }
                }
                Err(SkipReason::UndeterminedCategory) => {
                    if !node.files.is_empty() {
                        warn!(
                            path = %current_path,
                            files = node.files.len(),
                            "Skipping files of folder without category"
                        );
                        report.skipped.push(SkippedBranch {
                            path: current_path.clone(),
                            reason: SkipReason::UndeterminedCategory,
                        });
                    }
                }
                Err(reason) => {
                    warn!(path = %current_path, %reason, "Skipping branch");
                    report.skipped.push(SkippedBranch {
                        path: current_path,
                        reason,
                    });
                    continue;
                }
            }

            // Reversed so the first declared subfolder is popped first.
            for sub in node.subfolders.iter().rev() {
                pending.push((sub, current_path.clone()));
            }
        }

        info!(
            files_fetched = report.files_fetched,
            skipped = report.skipped.len(),
            "Tree download complete"
        );
        Ok(report)
    }

    async fn fetch_file(
        &self,
        folder_path: &str,
        local_folder: &Path,
        file: &FileLeaf,
    ) -> SyncResult<()> {
        let key = join_key(folder_path, &file.name);
        if !is_safe_name(&file.name) {
            error!(key = %key, "File name is not a single path component");
            return Err(SyncError::fetch(key, FetchFailure::InvalidName(file.name.clone())));
        }
        let local_path = local_folder.join(&file.name);

        match self.fetcher.exists(&key).await {
            Ok(true) => {}
            Ok(false) => {
                error!(key = %key, "Remote object does not exist");
                return Err(SyncError::fetch(key, FetchFailure::Missing));
            }
            Err(e) => {
                error!(key = %key, error = %e, "Existence check failed");
                return Err(SyncError::fetch(key, FetchFailure::Transfer(e.to_string())));
            }
        }

        if let Err(e) = self.fetcher.fetch(&key, &local_path).await {
            error!(key = %key, local_path = %local_path.display(), error = %e, "Transfer failed");
            return Err(SyncError::fetch(key, FetchFailure::Transfer(e.to_string())));
        }

        debug!(
            key = %key,
            local_path = %local_path.display(),
            declared_size = file.size,
            "Fetched object"
        );
        Ok(())
    }
}

async fn ensure_folder(path: &Path) -> SyncResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| SyncError::Io {
            operation: "create_dir_all",
            path: path.to_path_buf(),
            source,
        })
}
