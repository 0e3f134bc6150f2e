use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::storage::gateway::FileSystem;
use crate::storage::model::AudioFileEntry;
use crate::storage::naming::{find_unique_file_name, split_file_name};
use crate::storage::paths::{parent_path, validate_file_name};
use crate::storage::{is_audio_file, Error, Result};

/// Progress of a folder soft-delete.
///
/// `Scanning → Relocating → Finalizing → Done | PartialFailure`. Each phase
/// finishes before the next starts and every file move is awaited before the
/// next one is issued, so collision handling for a file sees every file that
/// already landed in the staging folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeletePhase {
    Scanning,
    Relocating,
    Finalizing,
    /// Every audio file was relocated and the folder removed.
    Done,
    /// The folder was removed but some audio files could not be relocated.
    PartialFailure,
}

/// An audio file found while scanning a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedFile {
    pub path: String,
    pub name: String,
}

/// A file the relocation step gave up on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocationFailure {
    pub path: String,
    pub error: String,
}

/// Outcome of [`RecentlyDeletedManager::delete_folder_and_move_audio_files`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub folder: String,
    /// `(original path, path in the staging folder)` per relocated file.
    pub relocated: Vec<(String, String)>,
    pub failures: Vec<RelocationFailure>,
    pub phase: DeletePhase,
}

impl DeleteReport {
    fn new(folder: &str) -> Self {
        DeleteReport {
            folder: folder.to_string(),
            relocated: Vec::new(),
            failures: Vec::new(),
            phase: DeletePhase::Scanning,
        }
    }

    fn enter(&mut self, phase: DeletePhase) {
        debug!("Delete of {}: {:?} -> {:?}", self.folder, self.phase, phase);
        self.phase = phase;
    }

    pub fn moved_count(&self) -> usize {
        self.relocated.len()
    }
}

/// Soft-delete and restore of audio files through a flat staging folder.
///
/// The staging folder does not keep the original hierarchy, so name clashes
/// are expected and resolved with letter suffixes (see
/// [`find_unique_file_name`]). Restoring never renames: a clash is an error.
#[derive(Debug, Clone)]
pub struct RecentlyDeletedManager {
    fs: Arc<dyn FileSystem>,
    root: String,
}

impl RecentlyDeletedManager {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<String>) -> Self {
        let root: String = root.into();
        let root = root.trim_end_matches('/').to_string();
        RecentlyDeletedManager { fs, root }
    }

    /// Absolute path of the staging folder.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Path of `name` directly inside the staging folder.
    ///
    /// Refuses anything that would not land directly below the staging root,
    /// such as `..`.
    fn staged_path(&self, name: &str) -> Result<String> {
        validate_file_name(name)?;
        let path = format!("{}/{}", self.root, name);
        if parent_path(&path) != self.root {
            return Err(Error::NotFound(path));
        }
        Ok(path)
    }

    /// True iff `path` is the staging folder or lies below it.
    pub fn is_in_recently_deleted(&self, path: &str) -> bool {
        path == self.root
            || path
                .strip_prefix(&self.root)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    async fn ensure_root(&self) -> Result<()> {
        let stat = self.fs.stat(&self.root).await?;
        if !stat.exists {
            debug!("Creating recently-deleted folder {}", self.root);
            self.fs.mkdir(&self.root, true).await?;
        } else if !stat.is_directory {
            return Err(Error::NotADirectory(self.root.clone()));
        }
        Ok(())
    }

    /// Moves one file into the staging folder and returns its new path.
    ///
    /// If the name is taken there, a letter suffix is appended to the stem.
    #[instrument(skip(self))]
    pub async fn move_to_recently_deleted(&self, path: &str, name: &str) -> Result<String> {
        self.ensure_root().await?;

        let mut target = format!("{}/{}", self.root, name);
        if self.fs.stat(&target).await?.exists {
            let (stem, extension) = split_file_name(name);
            let unique = find_unique_file_name(&*self.fs, &self.root, stem, extension.unwrap_or("")).await?;
            debug!("'{}' already in recently deleted, using '{}'", name, unique);
            target = format!("{}/{}", self.root, unique);
        }

        self.fs.move_item(path, &target).await?;
        Ok(target)
    }

    /// Depth-first list of every audio file below `folder`, at any depth.
    ///
    /// Other files are skipped silently, and so are symbolic links: a link is
    /// removed with the folder but whatever it points to is left alone.
    /// Entries are visited in name order.
    #[instrument(skip(self))]
    pub async fn collect_audio_files(&self, folder: &str) -> Result<Vec<ScannedFile>> {
        let mut found = Vec::new();
        self.collect_into(folder.trim_end_matches('/').to_string(), &mut found).await?;
        Ok(found)
    }

    fn collect_into<'a>(&'a self, dir: String, found: &'a mut Vec<ScannedFile>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut names = self.fs.list_directory(&dir).await?;
            names.sort();
            for name in names {
                let path = format!("{dir}/{name}");
                let stat = self.fs.stat(&path).await?;
                if stat.is_symlink {
                    debug!("Skipping link {}", path);
                } else if stat.is_directory {
                    self.collect_into(path, &mut *found).await?;
                } else if is_audio_file(&name) {
                    found.push(ScannedFile { path, name });
                } else {
                    debug!("Skipping non-audio file {}", path);
                }
            }
            Ok(())
        })
    }

    /// Soft-deletes a folder: relocates every audio file below it into the
    /// staging folder, then removes the folder.
    ///
    /// A file that fails to move is logged and recorded in the report; the
    /// remaining files are still processed. Failing to remove the folder
    /// afterwards is fatal and reported as [`Error::FinalizeFailed`]; files
    /// relocated by then stay where they are.
    ///
    /// Non-audio files are not relocated, so they are removed together with
    /// the folder.
    #[instrument(skip(self))]
    pub async fn delete_folder_and_move_audio_files(&self, folder_path: &str) -> Result<DeleteReport> {
        let folder_path = folder_path.trim_end_matches('/');
        let stat = self.fs.stat(folder_path).await?;
        if !stat.exists {
            return Err(Error::NotFound(folder_path.to_string()));
        }
        if !stat.is_directory {
            return Err(Error::NotADirectory(folder_path.to_string()));
        }

        let mut report = DeleteReport::new(folder_path);
        let files = self.collect_audio_files(folder_path).await?;
        debug!("Found {} audio file(s) to relocate", files.len());

        report.enter(DeletePhase::Relocating);
        for file in files {
            match self.move_to_recently_deleted(&file.path, &file.name).await {
                Ok(new_path) => report.relocated.push((file.path, new_path)),
                Err(e) => {
                    warn!("Failed to move {} to recently deleted: {}", file.path, e);
                    report.failures.push(RelocationFailure { path: file.path, error: e.to_string() });
                }
            }
        }

        report.enter(DeletePhase::Finalizing);
        if let Err(e) = self.fs.delete(folder_path).await {
            warn!("Failed to remove {} after relocating {} file(s): {}", folder_path, report.moved_count(), e);
            return Err(Error::FinalizeFailed {
                path: folder_path.to_string(),
                relocated: report.moved_count(),
                source: Box::new(e),
            });
        }

        if report.failures.is_empty() {
            report.enter(DeletePhase::Done);
        } else {
            report.enter(DeletePhase::PartialFailure);
        }
        info!("Deleted {} ({} file(s) moved to recently deleted)", folder_path, report.moved_count());
        Ok(report)
    }

    /// Moves a file out of the staging folder into `destination_folder`.
    ///
    /// The destination is created if missing. An existing item with the same
    /// name fails with [`Error::AlreadyExists`]; nothing is renamed.
    #[instrument(skip(self))]
    pub async fn restore(&self, path: &str, destination_folder: &str, name: &str) -> Result<String> {
        validate_file_name(name)?;
        if parent_path(path) != self.root {
            return Err(Error::NotFound(path.to_string()));
        }
        let destination_folder = destination_folder.trim_end_matches('/');
        let destination = self.fs.stat(destination_folder).await?;
        if !destination.exists {
            debug!("Creating restore destination {}", destination_folder);
            self.fs.mkdir(destination_folder, true).await?;
        } else if !destination.is_directory {
            return Err(Error::NotADirectory(destination_folder.to_string()));
        }

        let target = format!("{destination_folder}/{name}");
        if self.fs.stat(&target).await?.exists {
            return Err(Error::AlreadyExists {
                name: name.to_string(),
                destination: destination_folder.to_string(),
            });
        }

        self.fs.move_item(path, &target).await?;
        Ok(target)
    }

    /// Audio files currently in the staging folder, sorted by name.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<AudioFileEntry>> {
        if !self.fs.stat(&self.root).await?.exists {
            return Ok(Vec::new());
        }
        let mut names = self.fs.list_directory(&self.root).await?;
        names.sort();

        let mut entries = Vec::new();
        for name in names {
            let path = format!("{}/{}", self.root, name);
            let stat = self.fs.stat(&path).await?;
            if stat.is_directory || !is_audio_file(&name) {
                continue;
            }
            entries.push(AudioFileEntry::from_stat(path, name, &stat));
        }
        Ok(entries)
    }

    /// Permanently deletes one item from the staging folder.
    #[instrument(skip(self))]
    pub async fn purge(&self, name: &str) -> Result<()> {
        let path = self.staged_path(name)?;
        if !self.fs.stat(&path).await?.exists {
            return Err(Error::NotFound(path));
        }
        self.fs.delete(&path).await
    }

    /// Permanently deletes everything in the staging folder. Returns the
    /// number of items removed.
    #[instrument(skip(self))]
    pub async fn empty(&self) -> Result<usize> {
        if !self.fs.stat(&self.root).await?.exists {
            return Ok(0);
        }
        let names = self.fs.list_directory(&self.root).await?;
        for name in &names {
            self.fs.delete(&format!("{}/{}", self.root, name)).await?;
        }
        Ok(names.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryFileSystem, NameError};

    const TRASH: &str = "/docs/recently-deleted";

    fn manager() -> (Arc<MemoryFileSystem>, RecentlyDeletedManager) {
        let fs = Arc::new(MemoryFileSystem::new());
        let manager = RecentlyDeletedManager::new(fs.clone(), TRASH);
        (fs, manager)
    }

    #[test]
    fn test_is_in_recently_deleted() {
        let (_, manager) = manager();
        assert!(manager.is_in_recently_deleted("/docs/recently-deleted"));
        assert!(manager.is_in_recently_deleted("/docs/recently-deleted/a.m4a"));
        assert!(!manager.is_in_recently_deleted("/docs/recently-deleted-old/a.m4a"));
        assert!(!manager.is_in_recently_deleted("/docs/recordings/a.m4a"));
    }

    #[tokio::test]
    async fn test_collect_audio_files_recurses_and_skips_other_files() {
        let (fs, manager) = manager();
        fs.add_file("/docs/recordings/Music/a.m4a", 1);
        fs.add_file("/docs/recordings/Music/cover.jpg", 1);
        fs.add_file("/docs/recordings/Music/Live/b.mp3", 1);
        fs.add_file("/docs/recordings/Music/Live/Deep/c.WAV", 1);
        fs.add_directory("/docs/recordings/Music/Empty");

        let found = manager.collect_audio_files("/docs/recordings/Music").await.unwrap();
        let names: Vec<&str> = found.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["c.WAV", "b.mp3", "a.m4a"]);
        assert_eq!(found[0].path, "/docs/recordings/Music/Live/Deep/c.WAV");
    }

    #[tokio::test]
    async fn test_move_to_recently_deleted_creates_root_and_resolves_collisions() {
        let (fs, manager) = manager();
        fs.add_file("/docs/recordings/a/take.m4a", 1);
        fs.add_file("/docs/recordings/b/take.m4a", 2);
        fs.add_file("/docs/recordings/c/take.m4a", 3);

        let first = manager.move_to_recently_deleted("/docs/recordings/a/take.m4a", "take.m4a").await.unwrap();
        let second = manager.move_to_recently_deleted("/docs/recordings/b/take.m4a", "take.m4a").await.unwrap();
        let third = manager.move_to_recently_deleted("/docs/recordings/c/take.m4a", "take.m4a").await.unwrap();

        assert_eq!(first, "/docs/recently-deleted/take.m4a");
        assert_eq!(second, "/docs/recently-deleted/takea.m4a");
        assert_eq!(third, "/docs/recently-deleted/takeb.m4a");
        assert!(!fs.exists("/docs/recordings/a/take.m4a"));
    }

    #[tokio::test]
    async fn test_delete_folder_with_nested_audio() {
        let (fs, manager) = manager();
        fs.add_file("/docs/recordings/Music/a.m4a", 1);
        fs.add_file("/docs/recordings/Music/Live/b.mp3", 1);

        let report = manager.delete_folder_and_move_audio_files("/docs/recordings/Music").await.unwrap();
        assert_eq!(report.moved_count(), 2);
        assert_eq!(report.phase, DeletePhase::Done);
        assert!(!fs.exists("/docs/recordings/Music"));
        assert!(fs.exists("/docs/recently-deleted/a.m4a"));
        assert!(fs.exists("/docs/recently-deleted/b.mp3"));
    }

    #[tokio::test]
    async fn test_delete_folder_renames_against_files_moved_earlier_in_same_run() {
        let (fs, manager) = manager();
        fs.add_file("/docs/recordings/Music/x/song.m4a", 1);
        fs.add_file("/docs/recordings/Music/y/song.m4a", 1);
        fs.add_file("/docs/recently-deleted/song.m4a", 1);

        let report = manager.delete_folder_and_move_audio_files("/docs/recordings/Music").await.unwrap();
        let targets: Vec<&str> = report.relocated.iter().map(|(_, to)| to.as_str()).collect();
        assert_eq!(targets, vec!["/docs/recently-deleted/songa.m4a", "/docs/recently-deleted/songb.m4a"]);
    }

    #[tokio::test]
    async fn test_delete_folder_continues_after_file_failure() {
        let (fs, manager) = manager();
        fs.add_file("/docs/recordings/Music/a.m4a", 1);
        fs.add_file("/docs/recordings/Music/b.m4a", 1);
        fs.add_file("/docs/recordings/Music/c.m4a", 1);
        fs.fail_moves_from("/docs/recordings/Music/b.m4a");

        let report = manager.delete_folder_and_move_audio_files("/docs/recordings/Music").await.unwrap();
        assert_eq!(report.moved_count(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, "/docs/recordings/Music/b.m4a");
        assert_eq!(report.phase, DeletePhase::PartialFailure);
        assert!(!fs.exists("/docs/recordings/Music"));
    }

    #[tokio::test]
    async fn test_delete_folder_finalize_failure_is_fatal_without_rollback() {
        let (fs, manager) = manager();
        fs.add_file("/docs/recordings/Music/a.m4a", 1);
        fs.fail_deletes_of("/docs/recordings/Music");

        let err = manager.delete_folder_and_move_audio_files("/docs/recordings/Music").await.unwrap_err();
        match err {
            Error::FinalizeFailed { path, relocated, .. } => {
                assert_eq!(path, "/docs/recordings/Music");
                assert_eq!(relocated, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(fs.exists("/docs/recently-deleted/a.m4a"));
        assert!(fs.is_directory("/docs/recordings/Music"));
    }

    #[tokio::test]
    async fn test_delete_folder_drops_non_audio_files() {
        let (fs, manager) = manager();
        fs.add_file("/docs/recordings/Music/notes.txt", 1);

        let report = manager.delete_folder_and_move_audio_files("/docs/recordings/Music").await.unwrap();
        assert_eq!(report.moved_count(), 0);
        assert!(!fs.exists("/docs/recordings/Music/notes.txt"));
        assert!(!fs.exists("/docs/recently-deleted/notes.txt"));
    }

    #[tokio::test]
    async fn test_delete_missing_or_file_path() {
        let (fs, manager) = manager();
        fs.add_file("/docs/recordings/a.m4a", 1);
        assert!(matches!(
            manager.delete_folder_and_move_audio_files("/docs/recordings/nope").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            manager.delete_folder_and_move_audio_files("/docs/recordings/a.m4a").await,
            Err(Error::NotADirectory(_))
        ));
    }

    #[tokio::test]
    async fn test_purge_and_restore_refuse_dot_names() {
        let (fs, manager) = manager();
        fs.add_file("/docs/recordings/keep.m4a", 1);
        fs.add_file("/docs/recently-deleted/a.m4a", 1);

        for name in [".", ".."] {
            assert!(matches!(manager.purge(name).await, Err(Error::InvalidName(NameError::DotName(_)))));
        }
        assert!(matches!(
            manager.restore("/docs/recordings/keep.m4a", "/docs/recordings/Other", "keep.m4a").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            manager.restore("/docs/recently-deleted/..", "/docs/recordings/Other", "..").await,
            Err(Error::InvalidName(_))
        ));
        assert!(fs.exists("/docs/recordings/keep.m4a"));
        assert!(fs.exists("/docs/recently-deleted/a.m4a"));
    }

    #[tokio::test]
    async fn test_restore_creates_destination() {
        let (fs, manager) = manager();
        fs.add_file("/docs/recently-deleted/a.m4a", 1);

        let restored = manager
            .restore("/docs/recently-deleted/a.m4a", "/docs/recordings/New/Folder", "a.m4a")
            .await
            .unwrap();
        assert_eq!(restored, "/docs/recordings/New/Folder/a.m4a");
        assert!(fs.exists("/docs/recordings/New/Folder/a.m4a"));
        assert!(!fs.exists("/docs/recently-deleted/a.m4a"));
    }

    #[tokio::test]
    async fn test_restore_collision_is_an_error() {
        let (fs, manager) = manager();
        fs.add_file("/docs/recently-deleted/a.m4a", 1);
        fs.add_file("/docs/recordings/a.m4a", 2);

        let err = manager.restore("/docs/recently-deleted/a.m4a", "/docs/recordings", "a.m4a").await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { ref name, .. } if name == "a.m4a"));
        assert!(fs.exists("/docs/recently-deleted/a.m4a"));
        assert_eq!(fs.stat("/docs/recordings/a.m4a").await.unwrap().size, 2);
    }

    #[tokio::test]
    async fn test_list_purge_and_empty() {
        let (fs, manager) = manager();
        assert!(manager.list().await.unwrap().is_empty());
        assert_eq!(manager.empty().await.unwrap(), 0);

        fs.add_file("/docs/recently-deleted/b.mp3", 5);
        fs.add_file("/docs/recently-deleted/a.m4a", 3);
        fs.add_file("/docs/recently-deleted/readme.txt", 1);

        let listed = manager.list().await.unwrap();
        let names: Vec<&str> = listed.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.m4a", "b.mp3"]);
        assert_eq!(listed[0].size, 3);
        assert_eq!(listed[0].relative_path, "a.m4a");

        manager.purge("a.m4a").await.unwrap();
        assert!(!fs.exists("/docs/recently-deleted/a.m4a"));
        assert!(matches!(manager.purge("a.m4a").await, Err(Error::NotFound(_))));
        assert!(matches!(manager.purge("../recordings").await, Err(Error::InvalidName(_))));

        assert_eq!(manager.empty().await.unwrap(), 2);
        assert!(fs.list_directory(TRASH).await.unwrap().is_empty());
    }
}
