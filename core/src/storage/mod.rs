//! Maps the recordings tree onto the device file system.
//!
//! This module owns the rules for how recordings and folders are laid out on
//! disk and how they may be changed. The on-disk structure is the only source
//! of truth: every listing is recomputed from the live file system and no index
//! or cache is kept.
//!
//! # Layout
//!
//! ```text
//! <document root>/
//!     recordings/          user folders and audio files, arbitrarily nested
//!     recently-deleted/    flat staging area for soft-deleted audio files
//! ```
//!
//! Paths handed to and from the UI are plain `/`-separated strings. *Relative*
//! paths are rooted at `recordings/`, never start or end with `/` and contain no
//! empty segments. *Absolute* paths are obtained by joining the recordings root
//! with a relative path (see [`Layout`]).
//!
//! # Core Concepts
//!
//! *   **[`FileSystem`]:** The asynchronous I/O boundary (stat, list, mkdir,
//!     move, delete). It is injected everywhere as `Arc<dyn FileSystem>`.
//!     [`TokioFileSystem`] talks to the real disk, [`MemoryFileSystem`] keeps
//!     a tree in memory for deterministic tests.
//! *   **Path resolution:** [`Layout`] converts between absolute and relative
//!     paths and builds [`BreadcrumbItem`] chains. [`sanitize_file_name`] and
//!     [`validate_file_name`] handle user-entered names.
//! *   **Naming:** [`generate_intelligent_recording_name`] picks the first free
//!     "Recording N" slot, [`generate_unique_file_name`] appends `(N)` counters
//!     and [`find_unique_file_name`] resolves collisions in the recently-deleted
//!     area with letter suffixes.
//! *   **Move validation:** [`validate_move_operation`] rejects no-op moves and
//!     moves of a folder into itself. It must run before anything is mutated;
//!     the gateway performs no checks of its own.
//! *   **Soft delete:** [`RecentlyDeletedManager`] relocates audio files out of
//!     a folder that is being deleted and restores them later.
//! *   **[`Library`]:** The façade the UI calls. It validates, resolves paths
//!     and drives the gateway in the right order.
//!
//! # Error Handling
//!
//! Validators return [`NameError`] and [`MoveError`] values whose `Display`
//! text is meant to be shown to the user verbatim. Operations that touch the
//! file system return [`Result`], where [`Error`] covers I/O failures,
//! collisions and rejected input.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use memo_core::storage::Library;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let library = Library::open_local("/var/mobile/Documents").await?;
//!
//!     library.create_folder("", "Interviews").await?;
//!     let name = library.next_recording_name("Interviews").await?;
//!     println!("Next recording will be called {name}");
//!
//!     for folder in library.list_folders("").await? {
//!         println!("{} ({} recordings)", folder.name, folder.item_count);
//!     }
//!     Ok(())
//! }
//! ```

pub use self::gateway::{FileSystem, Stat, TokioFileSystem};
pub use self::library::Library;
pub use self::memory::MemoryFileSystem;
pub use self::model::{AudioFileEntry, BreadcrumbItem, FolderEntry, FolderKind};
pub use self::moves::{validate_move_operation, MoveError, MoveOperation};
pub use self::naming::{
    find_unique_file_name, generate_intelligent_recording_name, generate_letter_suffix,
    generate_unique_file_name, split_file_name,
};
pub use self::paths::{join_path, parent_path, sanitize_file_name, validate_file_name, Layout, NameError};
pub use self::recently_deleted::{DeletePhase, DeleteReport, RecentlyDeletedManager, RelocationFailure, ScannedFile};

mod gateway;
mod library;
mod memory;
mod model;
mod moves;
mod naming;
mod paths;
mod recently_deleted;

use thiserror::Error;

/// Directory under the document root holding the user's recordings.
pub const RECORDINGS_DIR_NAME: &str = "recordings";
/// Reserved directory holding soft-deleted audio files.
pub const RECENTLY_DELETED_DIR_NAME: &str = "recently-deleted";
/// Extensions (lowercase, without dot) treated as audio files.
pub const AUDIO_EXTENSIONS: [&str; 6] = ["m4a", "mp3", "wav", "aac", "mp4", "caf"];
/// Longest file or folder name accepted, in UTF-16 code units.
pub const MAX_NAME_LENGTH: usize = 255;
/// Longest file or folder name accepted, in UTF-8 bytes (the usual on-disk limit).
pub const MAX_NAME_BYTES: usize = 255;
/// Letter suffixes tried before falling back to a timestamped name.
pub const LETTER_SUFFIX_ATTEMPTS: usize = 1000;

/// Returns true if `name` carries one of the [`AUDIO_EXTENSIONS`] (case-insensitive).
pub fn is_audio_file(name: &str) -> bool {
    match split_file_name(name) {
        (_, Some(ext)) => AUDIO_EXTENSIONS.iter().any(|audio| ext.eq_ignore_ascii_case(audio)),
        (_, None) => false,
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Path is not a directory: {0}")]
    NotADirectory(String),

    #[error("Path is a directory: {0}")]
    IsADirectory(String),

    #[error("An item named \"{name}\" already exists in {destination}")]
    AlreadyExists { name: String, destination: String },

    #[error("{0}")]
    InvalidName(#[from] NameError),

    #[error("{0}")]
    InvalidMove(#[from] MoveError),

    #[error("Path is outside the recordings folder: {0}")]
    OutsideRecordings(String),

    #[error("Failed to remove folder {path} after relocating {relocated} file(s)")]
    FinalizeFailed {
        path: String,
        relocated: usize,
        #[source]
        source: Box<Error>,
    },
}

// Define a standard Result type for the library
pub type Result<T> = std::result::Result<T, Error>;
