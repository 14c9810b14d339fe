//! Resolution of slash-delimited paths, relative to a root folder, to Drive ids.
//!
//! Drive has no path concept: objects point at their parents and sibling
//! names are not unique. Paths are walked one segment at a time, and when
//! several siblings share a name the first one in the store's order wins.
//! That order is not guaranteed to be stable between calls.

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::FileKind;
use crate::store::FileStore;

/// Lexically normalize a relative path into its segments.
///
/// `.` and empty segments are dropped and a trailing slash is ignored. A
/// leading `/` or any `..` segment is rejected, so a path can never name
/// anything outside the root. An empty result denotes the root itself.
pub fn normalize(path: &str) -> Result<Vec<&str>> {
    let trimmed = path.trim();
    if trimmed.starts_with('/') || trimmed.starts_with('\\') {
        return Err(Error::InvalidPath(format!(
            "{}: absolute paths are not allowed",
            path
        )));
    }

    let mut segments = Vec::new();
    for segment in trimmed.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(Error::InvalidPath(format!(
                    "{}: directory traversal is not allowed",
                    path
                )))
            }
            other => segments.push(other),
        }
    }
    Ok(segments)
}

/// Walks paths beneath `root_id` using a `FileStore`.
pub struct PathResolver<'a> {
    store: &'a dyn FileStore,
    root_id: &'a str,
}

impl<'a> PathResolver<'a> {
    pub fn new(store: &'a dyn FileStore, root_id: &'a str) -> Self {
        Self { store, root_id }
    }

    /// Resolve `path` to an object id.
    ///
    /// Every segment but the last must be a folder; the last must be of
    /// `leaf_kind` when one is given. An empty path (or `.`) is the root
    /// and costs no store call.
    pub async fn resolve(&self, path: &str, leaf_kind: Option<FileKind>) -> Result<String> {
        let segments = normalize(path)?;
        self.walk(&segments, leaf_kind).await
    }

    /// Resolve everything but the final segment, returning the parent folder
    /// id and the final segment name.
    ///
    /// The final segment does not need to exist. A trailing `/` means the
    /// path names a folder and the leaf is returned empty.
    pub async fn resolve_parent_and_leaf(&self, path: &str) -> Result<(String, String)> {
        let segments = normalize(path)?;
        if segments.is_empty() {
            return Err(Error::InvalidPath("path is empty".to_string()));
        }

        if path.trim_end().ends_with('/') {
            let parent = self.walk(&segments, Some(FileKind::Folder)).await?;
            return Ok((parent, String::new()));
        }

        let (leaf, dirs) = segments
            .split_last()
            .ok_or_else(|| Error::InvalidPath("path is empty".to_string()))?;
        let parent = self.walk(dirs, Some(FileKind::Folder)).await?;
        Ok((parent, leaf.to_string()))
    }

    async fn walk(&self, segments: &[&str], leaf_kind: Option<FileKind>) -> Result<String> {
        let mut parent = self.root_id.to_string();

        for (i, segment) in segments.iter().enumerate() {
            let is_last = i + 1 == segments.len();
            let kind = if is_last { leaf_kind } else { Some(FileKind::Folder) };

            let matches = self.store.list_children(&parent, Some(*segment), kind).await?;
            let Some(first) = matches.into_iter().next() else {
                let consumed = segments[..=i].join("/");
                return Err(Error::NotFound(match kind {
                    Some(FileKind::Folder) => format!("folder {}", consumed),
                    Some(FileKind::Spreadsheet) => format!("spreadsheet {}", consumed),
                    _ => consumed,
                }));
            };

            debug!(segment, parent = %parent, id = %first.id, "resolved path segment");
            parent = first.id;
        }

        Ok(parent)
    }
}
