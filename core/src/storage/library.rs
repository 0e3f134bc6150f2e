use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info, instrument};

use crate::storage::gateway::{FileSystem, Stat, TokioFileSystem};
use crate::storage::model::{AudioFileEntry, BreadcrumbItem, FolderEntry, FolderKind};
use crate::storage::moves::MoveOperation;
use crate::storage::naming::generate_intelligent_recording_name;
use crate::storage::paths::{file_name, parent_path, validate_file_name, Layout, NameError};
use crate::storage::recently_deleted::{DeleteReport, RecentlyDeletedManager};
use crate::storage::{is_audio_file, Error, Result};

/// One directory of the recordings tree with the stats of its children.
struct DirListing {
    path: String,
    entries: Vec<(String, Stat)>,
}

/// The recordings tree as seen by the UI.
///
/// Every method takes paths relative to the recordings root (absolute paths
/// below the root are accepted as well) and returns relative paths. Input is
/// validated before the file system is touched.
#[derive(Debug, Clone)]
pub struct Library {
    fs: Arc<dyn FileSystem>,
    layout: Layout,
    recently_deleted: RecentlyDeletedManager,
}

impl Library {
    /// Wraps an existing layout. Nothing is created on disk.
    pub fn new(fs: Arc<dyn FileSystem>, layout: Layout) -> Self {
        let recently_deleted = RecentlyDeletedManager::new(fs.clone(), layout.recently_deleted_root());
        Library { fs, layout, recently_deleted }
    }

    /// Like [`Library::new`], but creates the recordings root if it is missing.
    #[instrument(skip(fs))]
    pub async fn open(fs: Arc<dyn FileSystem>, layout: Layout) -> Result<Self> {
        let root = fs.stat(layout.recordings_root()).await?;
        if !root.exists {
            debug!("Creating recordings root {}", layout.recordings_root());
            fs.mkdir(layout.recordings_root(), true).await?;
        } else if !root.is_directory {
            return Err(Error::NotADirectory(layout.recordings_root().to_string()));
        }
        Ok(Library::new(fs, layout))
    }

    /// Opens the library stored under `document_root` on the local disk.
    pub async fn open_local(document_root: &str) -> Result<Self> {
        Library::open(Arc::new(TokioFileSystem::new()), Layout::new(document_root)).await
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn recently_deleted(&self) -> &RecentlyDeletedManager {
        &self.recently_deleted
    }

    /// Maps a relative (or absolute, in-tree) path to an absolute one.
    ///
    /// `.` and `..` segments are refused so a path can never leave the tree.
    fn resolve(&self, path: &str) -> Result<String> {
        let absolute = if self.layout.is_valid_recording_path(path) {
            path.trim_end_matches('/').to_string()
        } else if path.starts_with('/') {
            return Err(Error::OutsideRecordings(path.to_string()));
        } else {
            self.layout.to_absolute(path)
        };
        if absolute.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(Error::OutsideRecordings(path.to_string()));
        }
        Ok(absolute)
    }

    /// Resolves a path that must not be the recordings root itself.
    fn resolve_item(&self, path: &str) -> Result<String> {
        let absolute = self.resolve(path)?;
        if absolute == self.layout.recordings_root() {
            return Err(Error::OutsideRecordings(path.to_string()));
        }
        Ok(absolute)
    }

    async fn require_directory(&self, absolute: &str) -> Result<()> {
        let stat = self.fs.stat(absolute).await?;
        if !stat.exists {
            return Err(Error::NotFound(self.layout.to_relative(absolute)));
        }
        if !stat.is_directory {
            return Err(Error::NotADirectory(self.layout.to_relative(absolute)));
        }
        Ok(())
    }

    /// Lists a directory, treating a missing one as empty.
    async fn list_or_empty(&self, absolute: &str) -> Result<Vec<String>> {
        match self.fs.list_directory(absolute).await {
            Ok(mut names) => {
                names.sort();
                Ok(names)
            }
            Err(Error::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn count_files(&self, absolute: &str) -> Result<usize> {
        let mut count = 0;
        for name in self.list_or_empty(absolute).await? {
            if !self.fs.stat(&format!("{absolute}/{name}")).await?.is_directory {
                count += 1;
            }
        }
        Ok(count)
    }

    fn folder_entry(&self, absolute: &str, item_count: usize) -> FolderEntry {
        let relative = self.layout.to_relative(absolute);
        FolderEntry {
            id: relative.clone(),
            name: file_name(absolute).to_string(),
            path: relative,
            item_count,
        }
    }

    /// Returns the stat of a path in the tree.
    pub async fn stat(&self, path: &str) -> Result<Stat> {
        let absolute = self.resolve(path)?;
        self.fs.stat(&absolute).await
    }

    pub fn breadcrumbs(&self, path: &str) -> Vec<BreadcrumbItem> {
        self.layout.generate_breadcrumbs(path)
    }

    /// Subfolders of `folder`, sorted by name. The recently-deleted folder is
    /// never listed. A missing folder lists as empty.
    #[instrument(skip(self))]
    pub async fn list_folders(&self, folder: &str) -> Result<Vec<FolderEntry>> {
        let absolute = self.resolve(folder)?;
        let mut folders = Vec::new();
        for name in self.list_or_empty(&absolute).await? {
            if !FolderKind::of(&name).is_visible() {
                debug!("Skipping reserved folder {}", name);
                continue;
            }
            let path = format!("{absolute}/{name}");
            if self.fs.stat(&path).await?.is_directory {
                let item_count = self.count_files(&path).await?;
                folders.push(self.folder_entry(&path, item_count));
            }
        }
        debug!("Found {} folders", folders.len());
        Ok(folders)
    }

    /// Audio files directly inside `folder`, sorted by name.
    #[instrument(skip(self))]
    pub async fn list_recordings(&self, folder: &str) -> Result<Vec<AudioFileEntry>> {
        let absolute = self.resolve(folder)?;
        let mut recordings = Vec::new();
        for name in self.list_or_empty(&absolute).await? {
            if !is_audio_file(&name) {
                continue;
            }
            let path = format!("{absolute}/{name}");
            let stat = self.fs.stat(&path).await?;
            if !stat.is_directory {
                let relative = self.layout.to_relative(&path);
                recordings.push(AudioFileEntry::from_stat(path, relative, &stat));
            }
        }
        Ok(recordings)
    }

    /// Name for the next recording made in `folder` ("Recording N.m4a").
    #[instrument(skip(self))]
    pub async fn next_recording_name(&self, folder: &str) -> Result<String> {
        let absolute = self.resolve(folder)?;
        let names = self.list_or_empty(&absolute).await?;
        Ok(generate_intelligent_recording_name(&names[..]))
    }

    /// Creates `name` inside `parent` and returns it.
    #[instrument(skip(self))]
    pub async fn create_folder(&self, parent: &str, name: &str) -> Result<FolderEntry> {
        validate_file_name(name)?;
        let name = name.trim();
        if !FolderKind::of(name).is_visible() {
            return Err(NameError::Reserved(name.to_string()).into());
        }

        let parent_absolute = self.resolve(parent)?;
        self.require_directory(&parent_absolute).await?;

        let path = format!("{parent_absolute}/{name}");
        if self.fs.stat(&path).await?.exists {
            return Err(Error::AlreadyExists {
                name: name.to_string(),
                destination: self.display_folder(&parent_absolute),
            });
        }
        self.fs.mkdir(&path, false).await?;
        info!("Created folder {}", path);
        Ok(self.folder_entry(&path, 0))
    }

    /// Gives an item a new name in place and returns its new relative path.
    ///
    /// Renaming to the current name is a no-op. A case-only rename is checked
    /// against the exact names in the folder, so it works on file systems
    /// that ignore case.
    #[instrument(skip(self))]
    pub async fn rename(&self, path: &str, new_name: &str) -> Result<String> {
        validate_file_name(new_name)?;
        let new_name = new_name.trim();
        let absolute = self.resolve_item(path)?;

        let stat = self.fs.stat(&absolute).await?;
        if !stat.exists {
            return Err(Error::NotFound(self.layout.to_relative(&absolute)));
        }
        let current = file_name(&absolute);
        if current == new_name {
            debug!("Rename target equals current name, nothing to do");
            return Ok(self.layout.to_relative(&absolute));
        }
        if stat.is_directory && !FolderKind::of(new_name).is_visible() {
            return Err(NameError::Reserved(new_name.to_string()).into());
        }

        let parent = parent_path(&absolute);
        let target = format!("{parent}/{new_name}");
        let taken = if current.to_lowercase() == new_name.to_lowercase() {
            self.list_or_empty(parent).await?.iter().any(|name| name == new_name)
        } else {
            self.fs.stat(&target).await?.exists
        };
        if taken {
            return Err(Error::AlreadyExists {
                name: new_name.to_string(),
                destination: self.display_folder(parent),
            });
        }

        self.fs.move_item(&absolute, &target).await?;
        info!("Renamed {} to {}", absolute, target);
        Ok(self.layout.to_relative(&target))
    }

    /// Moves a file or folder into `destination_folder` and returns its new
    /// relative path.
    ///
    /// No-op moves and moves of a folder into itself are rejected before
    /// anything is touched, as are moves onto an existing item.
    #[instrument(skip(self))]
    pub async fn move_item(&self, source: &str, destination_folder: &str) -> Result<String> {
        let source_absolute = self.resolve_item(source)?;
        let destination_absolute = self.resolve(destination_folder)?;
        let operation = MoveOperation::new(
            source_absolute.clone(),
            destination_absolute.clone(),
            file_name(&source_absolute),
        );
        operation.validate()?;

        if !self.fs.stat(&source_absolute).await?.exists {
            return Err(Error::NotFound(self.layout.to_relative(&source_absolute)));
        }
        self.require_directory(&destination_absolute).await?;

        let target = operation.target_path();
        if self.fs.stat(&target).await?.exists {
            return Err(Error::AlreadyExists {
                name: operation.item_name,
                destination: self.display_folder(&destination_absolute),
            });
        }

        self.fs.move_item(&source_absolute, &target).await?;
        info!("Moved {} to {}", source_absolute, target);
        Ok(self.layout.to_relative(&target))
    }

    /// Soft-deletes one recording. Returns its path in the recently-deleted folder.
    #[instrument(skip(self))]
    pub async fn delete_recording(&self, path: &str) -> Result<String> {
        let absolute = self.resolve_item(path)?;
        let stat = self.fs.stat(&absolute).await?;
        if !stat.exists {
            return Err(Error::NotFound(self.layout.to_relative(&absolute)));
        }
        if stat.is_directory {
            return Err(Error::IsADirectory(self.layout.to_relative(&absolute)));
        }
        self.recently_deleted.move_to_recently_deleted(&absolute, file_name(&absolute)).await
    }

    /// Soft-deletes a folder; see
    /// [`RecentlyDeletedManager::delete_folder_and_move_audio_files`].
    #[instrument(skip(self))]
    pub async fn delete_folder(&self, path: &str) -> Result<DeleteReport> {
        let absolute = self.resolve_item(path)?;
        self.recently_deleted.delete_folder_and_move_audio_files(&absolute).await
    }

    /// Moves `name` out of the recently-deleted folder into `destination_folder`
    /// (created if missing). Returns the restored relative path.
    #[instrument(skip(self))]
    pub async fn restore(&self, name: &str, destination_folder: &str) -> Result<String> {
        validate_file_name(name)?;
        let source = format!("{}/{}", self.recently_deleted.root(), name);
        if !self.fs.stat(&source).await?.exists {
            return Err(Error::NotFound(name.to_string()));
        }
        let destination = self.resolve(destination_folder)?;
        let restored = self.recently_deleted.restore(&source, &destination, name).await?;
        Ok(self.layout.to_relative(&restored))
    }

    pub async fn list_recently_deleted(&self) -> Result<Vec<AudioFileEntry>> {
        self.recently_deleted.list().await
    }

    pub async fn purge(&self, name: &str) -> Result<()> {
        self.recently_deleted.purge(name).await
    }

    pub async fn empty_recently_deleted(&self) -> Result<usize> {
        self.recently_deleted.empty().await
    }

    /// Recordings anywhere in the tree whose name contains `query`, ignoring
    /// case. Sorted by relative path.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<AudioFileEntry>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for listing in self.walk().await? {
            for (name, stat) in listing.entries {
                if stat.is_directory || !is_audio_file(&name) || !name.to_lowercase().contains(&needle) {
                    continue;
                }
                let path = format!("{}/{}", listing.path, name);
                let relative = self.layout.to_relative(&path);
                matches.push(AudioFileEntry::from_stat(path, relative, &stat));
            }
        }
        matches.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        debug!("{} recording(s) match '{}'", matches.len(), query);
        Ok(matches)
    }

    /// Folders ranked by how many files they hold, most first, ties broken by
    /// path. Empty folders and the recordings root are left out.
    #[instrument(skip(self))]
    pub async fn commonly_used_folders(&self, limit: usize) -> Result<Vec<FolderEntry>> {
        let mut folders: Vec<FolderEntry> = self
            .walk()
            .await?
            .into_iter()
            .filter(|listing| listing.path != self.layout.recordings_root())
            .map(|listing| {
                let item_count = listing.entries.iter().filter(|(_, stat)| !stat.is_directory).count();
                self.folder_entry(&listing.path, item_count)
            })
            .filter(|folder| folder.item_count > 0)
            .collect();

        folders.sort_by(|a, b| b.item_count.cmp(&a.item_count).then_with(|| a.path.cmp(&b.path)));
        folders.truncate(limit);
        Ok(folders)
    }

    /// Every visible directory of the tree with its children, root first.
    async fn walk(&self) -> Result<Vec<DirListing>> {
        let mut listings = Vec::new();
        let root = self.layout.recordings_root().to_string();
        if self.fs.stat(&root).await?.is_directory {
            self.walk_into(root, &mut listings).await?;
        }
        Ok(listings)
    }

    fn walk_into<'a>(&'a self, dir: String, listings: &'a mut Vec<DirListing>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut entries = Vec::new();
            for name in self.list_or_empty(&dir).await? {
                let stat = self.fs.stat(&format!("{dir}/{name}")).await?;
                entries.push((name, stat));
            }
            let subfolders: Vec<String> = entries
                .iter()
                .filter(|(name, stat)| stat.is_directory && !stat.is_symlink && FolderKind::of(name).is_visible())
                .map(|(name, _)| format!("{dir}/{name}"))
                .collect();

            listings.push(DirListing { path: dir, entries });
            for subfolder in subfolders {
                self.walk_into(subfolder, &mut *listings).await?;
            }
            Ok(())
        })
    }

    fn display_folder(&self, absolute: &str) -> String {
        let relative = self.layout.to_relative(absolute);
        if relative.is_empty() { "Recordings".to_string() } else { relative }
    }
}
