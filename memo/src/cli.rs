use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Memo: organize voice recordings in folders.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Document root holding `recordings/` and `recently-deleted/`.
    #[arg(long, global = true, env = "MEMO_ROOT")]
    pub root: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (use multiple times for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the folders and recordings in a folder.
    Ls(LsArgs),
    /// Create a folder.
    Mkdir(MkdirArgs),
    /// Move a recording or folder into another folder.
    Mv(MvArgs),
    /// Rename a recording or folder in place.
    Rename(RenameArgs),
    /// Move a recording or folder to Recently Deleted.
    Rm(RmArgs),
    /// Move a recording out of Recently Deleted.
    Restore(RestoreArgs),
    /// List Recently Deleted.
    Trash,
    /// Permanently delete items from Recently Deleted.
    Purge(PurgeArgs),
    /// Show the breadcrumb trail for a folder.
    Crumbs(FolderArg),
    /// Show the name the next recording in a folder would get.
    NextName(FolderArg),
    /// Find recordings by name.
    Search(SearchArgs),
    /// Show the folders holding the most files.
    Top(TopArgs),
    /// Show how a name would be cleaned up before use.
    Sanitize(SanitizeArgs),
}

// --- Argument Structs for each Subcommand ---

#[derive(Args, Debug)]
pub struct FolderArg {
    /// Folder relative to the recordings root (default: the root).
    #[arg(default_value = "")]
    pub folder: String,
}

#[derive(Args, Debug)]
pub struct LsArgs {
    /// Folder relative to the recordings root (default: the root).
    #[arg(default_value = "")]
    pub folder: String,

    /// Only list folders.
    #[arg(long, short = 'd', conflicts_with = "recordings")]
    pub folders: bool,

    /// Only list recordings.
    #[arg(long, short = 'r')]
    pub recordings: bool,
}

#[derive(Args, Debug)]
pub struct MkdirArgs {
    /// Name of the new folder.
    #[arg(required = true)]
    pub name: String,

    /// Folder to create it in.
    #[arg(long, short, default_value = "")]
    pub parent: String,
}

#[derive(Args, Debug)]
pub struct MvArgs {
    /// Recording or folder to move.
    #[arg(required = true)]
    pub source: String,

    /// Destination folder ("" for the root).
    #[arg(required = true)]
    pub destination: String,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Recording or folder to rename.
    #[arg(required = true)]
    pub path: String,

    /// New name, including the extension for recordings.
    #[arg(required = true)]
    pub name: String,
}

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Recording or folder to delete.
    #[arg(required = true)]
    pub path: String,
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Name of the item in Recently Deleted.
    #[arg(required = true)]
    pub name: String,

    /// Folder to restore into (created if missing).
    #[arg(default_value = "")]
    pub destination: String,
}

#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Name of the item in Recently Deleted.
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub name: Option<String>,

    /// Empty Recently Deleted.
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Text to look for in recording names.
    #[arg(required = true)]
    pub query: String,
}

#[derive(Args, Debug)]
pub struct TopArgs {
    /// Number of folders to show.
    #[arg(long, short, default_value = "5")]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct SanitizeArgs {
    /// Raw name as typed by the user.
    #[arg(required = true)]
    pub name: String,
}
