use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::storage::gateway::Stat;
use crate::storage::RECENTLY_DELETED_DIR_NAME;

/// Classification of a folder by name.
///
/// The recently-deleted staging folder is hidden from folder listings,
/// breadcrumbs and folder ranking; everything else is a normal folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FolderKind {
    Normal,
    RecentlyDeletedRoot,
}

impl FolderKind {
    pub fn of(name: &str) -> Self {
        if name == RECENTLY_DELETED_DIR_NAME {
            FolderKind::RecentlyDeletedRoot
        } else {
            FolderKind::Normal
        }
    }

    /// Whether folders of this kind are shown to the user.
    pub fn is_visible(self) -> bool {
        self == FolderKind::Normal
    }
}

/// One navigable segment of a path, as shown in a breadcrumb bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreadcrumbItem {
    pub name: String,
    /// Cumulative path relative to the recordings root (`""` for the root).
    pub path: String,
    pub is_last: bool,
}

/// A folder inside the recordings tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderEntry {
    /// Stable identifier; the relative path.
    pub id: String,
    pub name: String,
    /// Path relative to the recordings root.
    pub path: String,
    /// Number of direct children that are files. Subfolders are not counted.
    pub item_count: usize,
}

/// An audio file, either in the recordings tree or in the recently-deleted area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioFileEntry {
    pub id: String,
    pub name: String,
    /// Absolute path.
    pub path: String,
    /// Path relative to the recordings root, or to the recently-deleted folder
    /// for items staged there.
    pub relative_path: String,
    pub size: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    /// Not known without decoding the file; left empty by this crate.
    pub duration: Option<Duration>,
}

impl AudioFileEntry {
    pub(crate) fn from_stat(path: String, relative_path: String, stat: &Stat) -> Self {
        let name = crate::storage::paths::file_name(&path).to_string();
        AudioFileEntry {
            id: path.clone(),
            name,
            path,
            relative_path,
            size: stat.size,
            created_at: stat.created,
            modified_at: stat.modified,
            duration: None,
        }
    }
}
