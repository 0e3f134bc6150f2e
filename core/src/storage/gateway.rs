use std::fmt;
use std::io::ErrorKind;
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, instrument};

use crate::storage::{Error, Result};

/// What a [`FileSystem::stat`] call knows about a path.
///
/// A missing path is not an error: it stats as `exists == false` with every
/// other field at its default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stat {
    pub exists: bool,
    /// True for a directory, or a link that resolves to one.
    pub is_directory: bool,
    /// The path itself is a symbolic link. Tree walks do not descend into links.
    pub is_symlink: bool,
    /// Size in bytes. Zero for directories.
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl Stat {
    pub fn missing() -> Self {
        Stat::default()
    }
}

/// Asynchronous directory and file I/O used by every storage component.
///
/// Paths are absolute `/`-separated strings. `move_item` and `delete` trust the
/// caller: they do not check for cycles or collisions and an existing target
/// may be overwritten, matching native file system semantics. Callers guard
/// against accidental overwrites by calling [`FileSystem::stat`] first.
#[async_trait]
pub trait FileSystem: fmt::Debug + Send + Sync {
    /// Returns existence and basic metadata for `path`.
    async fn stat(&self, path: &str) -> Result<Stat>;

    /// Returns the names of the direct children of `path` (no recursion).
    async fn list_directory(&self, path: &str) -> Result<Vec<String>>;

    /// Creates a directory, and its missing ancestors when `intermediates` is set.
    async fn mkdir(&self, path: &str, intermediates: bool) -> Result<()>;

    /// Moves a file or directory from `from` to `to`.
    async fn move_item(&self, from: &str, to: &str) -> Result<()>;

    /// Deletes a file, or a directory with everything below it.
    async fn delete(&self, path: &str) -> Result<()>;
}

/// [`FileSystem`] backed by the local disk through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        TokioFileSystem
    }
}

fn timestamp(time: std::io::Result<SystemTime>) -> Option<DateTime<Utc>> {
    time.ok().map(DateTime::<Utc>::from)
}

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn stat(&self, path: &str) -> Result<Stat> {
        let link = match fs::symlink_metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Stat::missing()),
            Err(e) => return Err(Error::Io(e)),
        };
        let is_symlink = link.file_type().is_symlink();
        let meta = if is_symlink {
            match fs::metadata(path).await {
                Ok(target) => target,
                // Dangling link: report the link itself.
                Err(e) if e.kind() == ErrorKind::NotFound => link,
                Err(e) => return Err(Error::Io(e)),
            }
        } else {
            link
        };
        Ok(Stat {
            exists: true,
            is_directory: meta.is_dir(),
            is_symlink,
            size: if meta.is_dir() { 0 } else { meta.len() },
            created: timestamp(meta.created()),
            modified: timestamp(meta.modified()),
        })
    }

    #[instrument(skip(self))]
    async fn list_directory(&self, path: &str) -> Result<Vec<String>> {
        let mut read_dir = fs::read_dir(path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::NotFound(path.to_string())
            } else {
                Error::Io(e)
            }
        })?;

        let mut names = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(Error::Io)? {
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => debug!("Skipping non-unicode entry name: {:?}", raw),
            }
        }
        Ok(names)
    }

    #[instrument(skip(self))]
    async fn mkdir(&self, path: &str, intermediates: bool) -> Result<()> {
        if intermediates {
            fs::create_dir_all(path).await.map_err(Error::Io)
        } else {
            fs::create_dir(path).await.map_err(Error::Io)
        }
    }

    #[instrument(skip(self))]
    async fn move_item(&self, from: &str, to: &str) -> Result<()> {
        fs::rename(from, to).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::NotFound(from.to_string())
            } else {
                Error::Io(e)
            }
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str) -> Result<()> {
        let meta = fs::symlink_metadata(path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::NotFound(path.to_string())
            } else {
                Error::Io(e)
            }
        })?;
        if meta.is_dir() {
            fs::remove_dir_all(path).await.map_err(Error::Io)
        } else {
            fs::remove_file(path).await.map_err(Error::Io)
        }
    }
}
