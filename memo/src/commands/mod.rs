use std::fmt::Write as _;

use crate::cli::{
    FolderArg, LsArgs, MkdirArgs, MvArgs, PurgeArgs, RenameArgs, RestoreArgs, RmArgs, SanitizeArgs, SearchArgs,
    TopArgs,
};
use crate::AppContext;
use anyhow::{Context, Result};
use memo_core::storage::{sanitize_file_name, AudioFileEntry, DeletePhase, FolderEntry};
use serde::Serialize;
use tracing::{info, warn};

/// Serializes `value` as pretty JSON when `--json` is set, otherwise prints
/// the human-readable text.
fn emit<T: Serialize>(cx: &AppContext, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if cx.json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        let text = text();
        if !text.is_empty() {
            println!("{}", text.trim_end());
        }
    }
    Ok(())
}

/// Prints a confirmation line unless `--quiet` or `--json` is set.
fn confirm(cx: &AppContext, message: &str) {
    if !cx.quiet && !cx.json {
        println!("{message}");
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 { format!("{bytes} B") } else { format!("{value:.1} {}", UNITS[unit]) }
}

fn format_folders(out: &mut String, folders: &[FolderEntry]) {
    for folder in folders {
        let _ = writeln!(out, "  {}/  ({} item{})", folder.path, folder.item_count, if folder.item_count == 1 { "" } else { "s" });
    }
}

fn format_recordings(out: &mut String, recordings: &[AudioFileEntry], relative: bool) {
    for recording in recordings {
        let shown = if relative { &recording.relative_path } else { &recording.name };
        let modified = recording
            .modified_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "--".to_string());
        let _ = writeln!(out, "  {:<40} {:>10}  {}", shown, format_size(recording.size), modified);
    }
}

// --- Handler Functions ---

#[derive(Serialize)]
struct Listing {
    folders: Vec<FolderEntry>,
    recordings: Vec<AudioFileEntry>,
}

pub async fn handle_ls(args: LsArgs, cx: &AppContext) -> Result<()> {
    let folders = if args.recordings { Vec::new() } else { cx.library.list_folders(&args.folder).await? };
    let recordings = if args.folders { Vec::new() } else { cx.library.list_recordings(&args.folder).await? };
    let listing = Listing { folders, recordings };

    emit(cx, &listing, || {
        let mut out = String::new();
        if listing.folders.is_empty() && listing.recordings.is_empty() {
            out.push_str("  (empty)");
        }
        format_folders(&mut out, &listing.folders);
        format_recordings(&mut out, &listing.recordings, false);
        out
    })
}

pub async fn handle_mkdir(args: MkdirArgs, cx: &AppContext) -> Result<()> {
    let folder = cx.library.create_folder(&args.parent, &args.name).await?;
    info!("Created folder {}", folder.path);
    confirm(cx, &format!("Created {}", folder.path));
    emit(cx, &folder, String::new)
}

pub async fn handle_mv(args: MvArgs, cx: &AppContext) -> Result<()> {
    let moved = cx.library.move_item(&args.source, &args.destination).await?;
    confirm(cx, &format!("Moved {} to {}", args.source, moved));
    emit(cx, &moved, String::new)
}

pub async fn handle_rename(args: RenameArgs, cx: &AppContext) -> Result<()> {
    let renamed = cx.library.rename(&args.path, &args.name).await?;
    confirm(cx, &format!("Renamed {} to {}", args.path, renamed));
    emit(cx, &renamed, String::new)
}

pub async fn handle_rm(args: RmArgs, cx: &AppContext) -> Result<()> {
    let stat = cx.library.stat(&args.path).await?;
    if !stat.exists {
        anyhow::bail!("Nothing to delete at '{}'", args.path);
    }

    if !stat.is_directory {
        let staged = cx.library.delete_recording(&args.path).await?;
        confirm(cx, &format!("Moved {} to Recently Deleted", args.path));
        return emit(cx, &staged, String::new);
    }

    let report = cx
        .library
        .delete_folder(&args.path)
        .await
        .with_context(|| format!("Failed to delete folder '{}'", args.path))?;
    if report.phase == DeletePhase::PartialFailure {
        for failure in &report.failures {
            warn!("Could not move {}: {}", failure.path, failure.error);
        }
    }
    confirm(
        cx,
        &format!(
            "Deleted {} ({} recording(s) moved to Recently Deleted, {} failed)",
            args.path,
            report.moved_count(),
            report.failures.len()
        ),
    );
    emit(cx, &report, String::new)
}

pub async fn handle_restore(args: RestoreArgs, cx: &AppContext) -> Result<()> {
    let restored = cx.library.restore(&args.name, &args.destination).await?;
    confirm(cx, &format!("Restored {} to {}", args.name, restored));
    emit(cx, &restored, String::new)
}

pub async fn handle_trash(cx: &AppContext) -> Result<()> {
    let items = cx.library.list_recently_deleted().await?;
    emit(cx, &items, || {
        let mut out = String::new();
        if items.is_empty() {
            out.push_str("  Recently Deleted is empty");
        }
        format_recordings(&mut out, &items, false);
        out
    })
}

pub async fn handle_purge(args: PurgeArgs, cx: &AppContext) -> Result<()> {
    match args.name {
        Some(name) => {
            cx.library.purge(&name).await?;
            confirm(cx, &format!("Permanently deleted {name}"));
            emit(cx, &1usize, String::new)
        }
        None => {
            let removed = cx.library.empty_recently_deleted().await?;
            confirm(cx, &format!("Permanently deleted {removed} item(s)"));
            emit(cx, &removed, String::new)
        }
    }
}

pub async fn handle_crumbs(args: FolderArg, cx: &AppContext) -> Result<()> {
    let crumbs = cx.library.breadcrumbs(&args.folder);
    emit(cx, &crumbs, || crumbs.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(" › "))
}

pub async fn handle_next_name(args: FolderArg, cx: &AppContext) -> Result<()> {
    let name = cx.library.next_recording_name(&args.folder).await?;
    emit(cx, &name, || name.clone())
}

pub async fn handle_search(args: SearchArgs, cx: &AppContext) -> Result<()> {
    let found = cx.library.search(&args.query).await?;
    emit(cx, &found, || {
        let mut out = String::new();
        if found.is_empty() {
            let _ = write!(out, "  No recordings match '{}'", args.query);
        }
        format_recordings(&mut out, &found, true);
        out
    })
}

pub async fn handle_top(args: TopArgs, cx: &AppContext) -> Result<()> {
    let folders = cx.library.commonly_used_folders(args.limit).await?;
    emit(cx, &folders, || {
        let mut out = String::new();
        format_folders(&mut out, &folders);
        out
    })
}

pub fn handle_sanitize(args: SanitizeArgs, cx: &AppContext) -> Result<()> {
    let name = sanitize_file_name(&args.name);
    emit(cx, &name, || name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_folders_pluralizes() {
        let mut out = String::new();
        let folders = vec![
            FolderEntry { id: "a".into(), name: "a".into(), path: "a".into(), item_count: 1 },
            FolderEntry { id: "b".into(), name: "b".into(), path: "b".into(), item_count: 3 },
        ];
        format_folders(&mut out, &folders);
        assert_eq!(out, "  a/  (1 item)\n  b/  (3 items)\n");
    }
}
