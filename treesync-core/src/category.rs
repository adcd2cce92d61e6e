//! Category routing: picks a destination root from the second segment of a folder key.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Why a branch was not downloaded. Never a job failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    /// The folder key has fewer than two segments.
    #[error("category undetermined")]
    UndeterminedCategory,
    /// The category has no configured destination root.
    #[error("category {0:?} has no destination")]
    UnmappedCategory(String),
}

/// Returns the category segment (index 1) of a slash-delimited folder key.
pub fn category_of(path: &str) -> Option<&str> {
    path.split('/').nth(1).filter(|segment| !segment.is_empty())
}

/// Category name to destination root. Built once at startup and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMapping {
    roots: BTreeMap<String, PathBuf>,
}

impl CategoryMapping {
    pub fn new<I, K, V>(roots: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PathBuf>,
    {
        Self {
            roots: roots
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn destination_root(&self, category: &str) -> Option<&Path> {
        self.roots.get(category).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.roots.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    /// Resolves the local folder for a folder key.
    ///
    /// The root segment and the category segment are dropped; whatever follows
    /// is joined onto the category's destination root, so `root/movies/extras`
    /// with `movies -> /media/movies` becomes `/media/movies/extras`.
    pub fn local_folder(&self, path: &str) -> Result<PathBuf, SkipReason> {
        let category = category_of(path).ok_or(SkipReason::UndeterminedCategory)?;
        let root = self
            .destination_root(category)
            .ok_or_else(|| SkipReason::UnmappedCategory(category.to_owned()))?;

        let folder = path
            .split('/')
            .skip(2)
            .filter(|segment| !segment.is_empty())
            .fold(root.to_path_buf(), |acc, segment| acc.join(segment));
        debug!(path, category, local_folder = %folder.display(), "Resolved local folder");
        Ok(folder)
    }

    pub fn trace_loaded(&self) {
        info!(categories = self.roots.len(), "Loaded category mapping");
        for (category, root) in &self.roots {
            debug!(category = %category, root = %root.display(), "Category destination");
        }
    }
}
