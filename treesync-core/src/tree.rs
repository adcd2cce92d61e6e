//! Folder tree carried by an inbound message.
//!
//! The wire format is JSON with `name`, `files` and `subfolders` fields whose
//! names are matched case-insensitively (`Name`, `FILES`, ... are accepted).
//! A tree is parsed fresh for every message and dropped once the job ends.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{SyncError, SyncResult};

/// One remote object to fetch. `size` is informational and never verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLeaf {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

/// A folder with its files and nested folders, in declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub files: Vec<FileLeaf>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub subfolders: Vec<FolderNode>,
}

impl FolderNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
            subfolders: Vec::new(),
        }
    }

    pub fn with_file(mut self, name: impl Into<String>, size: u64) -> Self {
        self.files.push(FileLeaf {
            name: name.into(),
            size,
        });
        self
    }

    pub fn with_subfolder(mut self, folder: FolderNode) -> Self {
        self.subfolders.push(folder);
        self
    }

    /// Number of files in this folder and all of its descendants.
    pub fn total_files(&self) -> usize {
        self.files.len()
            + self
                .subfolders
                .iter()
                .map(FolderNode::total_files)
                .sum::<usize>()
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses a message body into a tree.
///
/// Returns `Ok(None)` when the body is valid JSON `null`, i.e. it carries no
/// tree at all. Callers treat that the same as a parse failure.
pub fn parse_tree(body: &[u8]) -> SyncResult<Option<FolderNode>> {
    let value: Value = serde_json::from_slice(body)?;
    if value.is_null() {
        return Ok(None);
    }
    let tree = serde_json::from_value(lowercase_keys(value)?)?;
    Ok(Some(tree))
}

fn lowercase_keys(value: Value) -> SyncResult<Value> {
    match value {
        Value::Object(map) => {
            let mut lowered = Map::with_capacity(map.len());
            for (key, child) in map {
                let lower = key.to_lowercase();
                if lowered.contains_key(&lower) {
                    return Err(SyncError::Parse(format!(
                        "field {key:?} appears more than once (names are case-insensitive)"
                    )));
                }
                lowered.insert(lower, lowercase_keys(child)?);
            }
            Ok(Value::Object(lowered))
        }
        Value::Array(items) => items
            .into_iter()
            .map(lowercase_keys)
            .collect::<SyncResult<Vec<_>>>()
            .map(Value::Array),
        other => Ok(other),
    }
}

/// Joins an ancestor key and a child name with `/`. An empty ancestor yields the name itself.
pub fn join_key(ancestor: &str, name: &str) -> String {
    if ancestor.is_empty() {
        name.to_owned()
    } else {
        format!("{ancestor}/{name}")
    }
}

/// A name is safe when it is a single path component that stays inside its parent.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
