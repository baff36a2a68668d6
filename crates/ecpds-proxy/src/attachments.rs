// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem-backed attachment directories.
//!
//! Every destination owns `<root>/<destination>`; type labels own
//! `<root>/_types/<label>`. Paths handed in are already split into segments
//! with `..` refused, so nothing here can leave its scope.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use ecpds_core::EcpdsError;
use ecpds_core::types::{FILE_PERMISSION, FileListElement};

/// Marker file standing for a directory created through the data domain.
pub const MKDIR_MARKER: &str = ".ecpds_mkdir";

const TYPES_DIR: &str = "_types";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Destination(String),
    Type(String),
}

/// Kind, size and modification time of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub is_dir: bool,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

fn io_error(path: &Path, e: io::Error) -> EcpdsError {
    match e.kind() {
        io::ErrorKind::NotFound => EcpdsError::NotFound(path.display().to_string()),
        io::ErrorKind::PermissionDenied => {
            EcpdsError::PermissionDenied(path.display().to_string())
        }
        _ => EcpdsError::Transient {
            message: format!("{}: {e}", path.display()),
            source: Some(Box::new(e)),
        },
    }
}

impl AttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scope_dir(&self, scope: &Scope) -> PathBuf {
        match scope {
            Scope::Destination(name) => self.root.join(name),
            Scope::Type(label) => self.root.join(TYPES_DIR).join(label),
        }
    }

    pub fn path(&self, scope: &Scope, segments: &[String]) -> PathBuf {
        segments
            .iter()
            .fold(self.scope_dir(scope), |path, segment| path.join(segment))
    }

    pub async fn stat(&self, scope: &Scope, segments: &[String]) -> Result<EntryInfo, EcpdsError> {
        let path = self.path(scope, segments);
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_error(&path, e))?;
        let modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(EntryInfo {
            is_dir: meta.is_dir(),
            size: meta.len(),
            modified,
        })
    }

    /// Entries of a directory, or the single entry for a plain file.
    ///
    /// A scope that was never written to lists as empty.
    pub async fn list(
        &self,
        scope: &Scope,
        segments: &[String],
        owner: &str,
        group: &str,
    ) -> Result<Vec<FileListElement>, EcpdsError> {
        let path = self.path(scope, segments);
        let info = match self.stat(scope, segments).await {
            Ok(info) => info,
            Err(EcpdsError::NotFound(_)) if segments.is_empty() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        if !info.is_dir {
            let name = segments.last().cloned().unwrap_or_default();
            return Ok(vec![file_element(name, &info, owner, group)]);
        }

        let mut entries = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| io_error(&path, e))?;
        let mut listing = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&path, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == MKDIR_MARKER {
                continue;
            }
            let meta = entry
                .metadata()
                .await
                .map_err(|e| io_error(&entry.path(), e))?;
            let info = EntryInfo {
                is_dir: meta.is_dir(),
                size: meta.len(),
                modified: meta
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now()),
            };
            if info.is_dir {
                let mut dir = FileListElement::directory(name, owner, group, None);
                dir.mtime = info.modified;
                listing.push(dir);
            } else {
                listing.push(file_element(name, &info, owner, group));
            }
        }
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listing)
    }

    /// Create the parent directories of a file about to be written.
    pub async fn prepare_write(
        &self,
        scope: &Scope,
        segments: &[String],
    ) -> Result<PathBuf, EcpdsError> {
        let path = self.path(scope, segments);
        if let Ok(meta) = tokio::fs::metadata(&path).await {
            if meta.is_dir() {
                return Err(EcpdsError::PermissionDenied(format!(
                    "{}: not a plain file",
                    path.display()
                )));
            }
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        Ok(path)
    }

    pub async fn delete(&self, scope: &Scope, segments: &[String]) -> Result<(), EcpdsError> {
        if self.stat(scope, segments).await?.is_dir {
            return Err(EcpdsError::PermissionDenied(format!(
                "{}: not a plain file",
                self.path(scope, segments).display()
            )));
        }
        let path = self.path(scope, segments);
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| io_error(&path, e))?;
        debug!(path = %path.display(), "attachment deleted");
        Ok(())
    }

    pub async fn rename(
        &self,
        scope: &Scope,
        source: &[String],
        target: &[String],
    ) -> Result<(), EcpdsError> {
        let from = self.path(scope, source);
        self.stat(scope, source).await?;
        let to = self.prepare_write(scope, target).await?;
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| io_error(&from, e))
    }

    pub async fn has_marker(&self, scope: &Scope, segments: &[String]) -> bool {
        tokio::fs::metadata(self.path(scope, segments).join(MKDIR_MARKER))
            .await
            .is_ok()
    }

    pub async fn write_marker(&self, scope: &Scope, segments: &[String]) -> Result<(), EcpdsError> {
        let dir = self.path(scope, segments);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&dir, e))?;
        let marker = dir.join(MKDIR_MARKER);
        tokio::fs::write(&marker, b"")
            .await
            .map_err(|e| io_error(&marker, e))
    }

    /// Remove a marker and its directory once the directory is empty.
    pub async fn remove_marker(&self, scope: &Scope, segments: &[String]) -> Result<(), EcpdsError> {
        let dir = self.path(scope, segments);
        let marker = dir.join(MKDIR_MARKER);
        tokio::fs::remove_file(&marker)
            .await
            .map_err(|e| io_error(&marker, e))?;
        if let Err(e) = tokio::fs::remove_dir(&dir).await {
            debug!(path = %dir.display(), error = %e, "marker directory kept");
        }
        Ok(())
    }

    /// Names of the marker directories directly under the scope.
    pub async fn marker_dirs(&self, scope: &Scope) -> Vec<String> {
        let dir = self.scope_dir(scope);
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            return Vec::new();
        };
        let mut names = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            if tokio::fs::metadata(entry.path().join(MKDIR_MARKER))
                .await
                .is_ok()
            {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        names
    }
}

fn file_element(name: String, info: &EntryInfo, owner: &str, group: &str) -> FileListElement {
    FileListElement {
        name,
        permission: FILE_PERMISSION.to_string(),
        owner: owner.to_string(),
        group: group.to_string(),
        size: info.size,
        mtime: info.modified,
        comment: None,
    }
}
