//! Namespace Lister
//!
//! Rebuilds a folder/file view of a user's namespace from the flat keys
//! stored under `{userId}/`. Folders are never stored; they are implied by
//! the `/` segments of deeper keys.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::key::UserId;
use crate::error::{Error, Result};
use crate::store::{ObjectMeta, ObjectStore};

/// Timestamp layout used in listings (UTC)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Entry type. Declaration order is the listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Folder,
    File,
}

/// One row of a namespace listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl FileEntry {
    fn folder(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            kind: EntryKind::Folder,
            size: None,
            last_modified: None,
        }
    }

    fn file(name: &str, object: &ObjectMeta) -> Self {
        Self {
            name: name.to_string(),
            path: object.key.clone(),
            kind: EntryKind::File,
            size: Some(object.size),
            last_modified: object.last_modified.as_ref().map(format_timestamp),
        }
    }

    /// Whether this entry is a synthesized folder
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// Format a store timestamp the way listings expose it
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Lists a user's namespace
pub struct NamespaceLister {
    store: Arc<dyn ObjectStore>,
}

impl NamespaceLister {
    /// Create a lister over `store`
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// List every folder and file in the user's namespace
    ///
    /// An empty namespace yields an empty vector.
    pub async fn list(&self, user: &UserId) -> Result<Vec<FileEntry>> {
        let prefix = user.prefix();
        let objects = self
            .store
            .list_prefix(&prefix)
            .await
            .map_err(|e| Error::Listing(format!("listing {} failed: {}", prefix, e)))?;

        let entries = build_entries(&prefix, &objects);
        debug!(
            "Listed {}: {} keys, {} entries",
            prefix,
            objects.len(),
            entries.len()
        );
        Ok(entries)
    }
}

/// Reconstruct the sorted folder/file view from listed objects
pub fn build_entries(prefix: &str, objects: &[ObjectMeta]) -> Vec<FileEntry> {
    let mut entries = Vec::new();
    // Keyed by full folder path including the trailing separator
    let mut folders: HashSet<String> = HashSet::new();

    for object in objects {
        if object.key == prefix {
            continue;
        }
        let relative = match object.key.strip_prefix(prefix) {
            Some(relative) => relative,
            None => continue,
        };

        let parts: Vec<&str> = relative.split('/').collect();
        let (file_name, dirs) = match parts.split_last() {
            Some(split) => split,
            None => continue,
        };

        let mut folder_path = prefix.to_string();
        for dir in dirs {
            folder_path.push_str(dir);
            folder_path.push('/');
            if dir.is_empty() {
                continue;
            }
            if folders.insert(folder_path.clone()) {
                entries.push(FileEntry::folder(dir, folder_path.trim_end_matches('/')));
            }
        }

        if !file_name.is_empty() {
            entries.push(FileEntry::file(file_name, object));
        }
    }

    sort_entries(&mut entries);
    entries
}

/// Folders first, then by name, then by full path
fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.path.cmp(&b.path))
    });
}
