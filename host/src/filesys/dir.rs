//! Directory operations

use std::path::{Component, Path, PathBuf};

use tokio::fs;

use crate::errors::HostError;
use crate::filesys::file::File;

/// A directory wrapper with path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the directory and any missing parents. Idempotent.
    pub async fn create(&self) -> Result<(), HostError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Delete the directory and all contents. Missing directories are fine.
    pub async fn delete(&self) -> Result<(), HostError> {
        match fs::remove_dir_all(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// All regular files below this directory, as paths relative to it,
    /// using `/` separators and sorted.
    pub async fn list_files_recursive(&self) -> Result<Vec<String>, HostError> {
        let mut files = Vec::new();
        let mut pending = vec![self.path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Ok(relative) = path.strip_prefix(&self.path) {
                        let parts: Vec<_> = relative
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy().into_owned())
                            .collect();
                        files.push(parts.join("/"));
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Get a file within this directory
    pub fn file(&self, name: &str) -> File {
        File::new(self.path.join(name))
    }

    /// Get a subdirectory
    pub fn subdir(&self, name: &str) -> Dir {
        Dir::new(self.path.join(name))
    }

    /// Resolve a `/`-separated relative path inside this directory.
    ///
    /// Rejects absolute paths and any `..` component so remote paths can
    /// never escape the directory.
    pub fn resolve_relative(&self, relative: &str) -> Result<File, HostError> {
        let mut resolved = self.path.clone();
        let mut depth = 0usize;

        for segment in relative.split('/') {
            if segment.is_empty() || segment == "." {
                continue;
            }
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(part)), None) => {
                    resolved.push(part);
                    depth += 1;
                }
                _ => {
                    return Err(HostError::Storage(format!(
                        "refusing unsafe relative path: {}",
                        relative
                    )))
                }
            }
        }

        if depth == 0 {
            return Err(HostError::Storage(format!(
                "empty relative path: {:?}",
                relative
            )));
        }

        Ok(File::new(resolved))
    }

    /// Create a temporary directory
    pub async fn create_temp_dir(prefix: &str) -> Result<Dir, HostError> {
        let temp_dir = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
        fs::create_dir_all(&temp_dir).await?;
        Ok(Dir::new(temp_dir))
    }
}
