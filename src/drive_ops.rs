//! File and folder operations addressed by path.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{FileKind, FileMetadata};
use crate::resolver::{normalize, PathResolver};
use crate::store::FileStore;

/// Direct children of a folder, split into folders and other files.
#[derive(Debug, Clone)]
pub struct FileListing {
    pub path: String,
    pub folders: Vec<FileMetadata>,
    pub files: Vec<FileMetadata>,
}

impl fmt::Display for FileListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        writeln!(f, "Path: {}", path)?;
        writeln!(f)?;

        writeln!(f, "Folders ({}):", self.folders.len())?;
        if self.folders.is_empty() {
            writeln!(f, "  No folders found")?;
        }
        for folder in &self.folders {
            writeln!(f, "  {}/", folder.name)?;
        }
        writeln!(f)?;

        writeln!(f, "Files ({}):", self.files.len())?;
        if self.files.is_empty() {
            writeln!(f, "  No files found")?;
        }
        for file in &self.files {
            writeln!(f, "  {}", file)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CopiedFile {
    pub source_path: String,
    pub new_id: String,
    pub name: String,
    pub parent_id: String,
}

impl fmt::Display for CopiedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File '{}' copied successfully as '{}'. New file ID: {}",
            self.source_path, self.name, self.new_id
        )
    }
}

#[derive(Debug, Clone)]
pub struct RenamedFile {
    pub path: String,
    pub id: String,
    pub new_name: String,
}

impl fmt::Display for RenamedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File '{}' successfully renamed to '{}'",
            self.path, self.new_name
        )
    }
}

/// list / copy / rename against a `FileStore`, rooted at one folder.
pub struct DriveOperations {
    store: Arc<dyn FileStore>,
    root_id: String,
}

impl DriveOperations {
    pub fn new(store: Arc<dyn FileStore>, root_id: impl Into<String>) -> Self {
        Self {
            store,
            root_id: root_id.into(),
        }
    }

    fn resolver(&self) -> PathResolver<'_> {
        PathResolver::new(self.store.as_ref(), &self.root_id)
    }

    /// Resolve a path that must name an object below the root, never the root itself.
    async fn resolve_object(&self, path: &str) -> Result<String> {
        if normalize(path)?.is_empty() {
            return Err(Error::InvalidPath("path is empty".to_string()));
        }
        self.resolver().resolve(path, None).await
    }

    /// List a folder's children; folders and files each sorted by name.
    pub async fn list_files(&self, path: &str) -> Result<FileListing> {
        let folder_id = self.resolver().resolve(path, Some(FileKind::Folder)).await?;
        let children = self.store.list_children(&folder_id, None, None).await?;

        let (mut folders, mut files): (Vec<_>, Vec<_>) =
            children.into_iter().partition(FileMetadata::is_folder);
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        files.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(FileListing {
            path: path.trim().trim_matches('/').to_string(),
            folders,
            files,
        })
    }

    /// Copy `src_path` to `dst_path`.
    ///
    /// The final segment of `dst_path` is the new name; a trailing `/`
    /// keeps the source name.
    pub async fn copy_file(&self, src_path: &str, dst_path: &str) -> Result<CopiedFile> {
        let source_id = self.resolve_object(src_path).await?;
        let source = self.store.get_file(&source_id).await?;

        let (parent_id, leaf) = self.resolver().resolve_parent_and_leaf(dst_path).await?;
        let name = if leaf.is_empty() { source.name } else { leaf };

        let copied = self.store.copy_file(&source_id, &parent_id, &name).await?;
        Ok(CopiedFile {
            source_path: src_path.to_string(),
            new_id: copied.id,
            name,
            parent_id,
        })
    }

    /// Rename the object at `path` in place.
    pub async fn rename_file(&self, path: &str, new_name: &str) -> Result<RenamedFile> {
        if new_name.trim().is_empty() {
            return Err(Error::InvalidArgument("new name cannot be empty".to_string()));
        }
        let id = self.resolve_object(path).await?;
        let renamed = self.store.rename_file(&id, new_name).await?;
        Ok(RenamedFile {
            path: path.to_string(),
            id,
            new_name: renamed.name,
        })
    }
}
