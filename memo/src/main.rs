use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use memo::cli::{Cli, Commands};
use memo::{commands, AppContext};
use memo_core::storage::Library;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let root = document_root(cli.root.clone())?;
    debug!("Using document root {}", root.display());
    let library = Library::open_local(&root.to_string_lossy())
        .await
        .with_context(|| format!("Failed to open recordings under {}", root.display()))?;

    let cx = AppContext {
        library,
        json: cli.json,
        quiet: cli.quiet,
    };

    // Match the command and call the appropriate handler function
    match cli.command {
        Commands::Ls(args) => commands::handle_ls(args, &cx).await?,
        Commands::Mkdir(args) => commands::handle_mkdir(args, &cx).await?,
        Commands::Mv(args) => commands::handle_mv(args, &cx).await?,
        Commands::Rename(args) => commands::handle_rename(args, &cx).await?,
        Commands::Rm(args) => commands::handle_rm(args, &cx).await?,
        Commands::Restore(args) => commands::handle_restore(args, &cx).await?,
        Commands::Trash => commands::handle_trash(&cx).await?,
        Commands::Purge(args) => commands::handle_purge(args, &cx).await?,
        Commands::Crumbs(args) => commands::handle_crumbs(args, &cx).await?,
        Commands::NextName(args) => commands::handle_next_name(args, &cx).await?,
        Commands::Search(args) => commands::handle_search(args, &cx).await?,
        Commands::Top(args) => commands::handle_top(args, &cx).await?,
        Commands::Sanitize(args) => commands::handle_sanitize(args, &cx)?,
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `-q` shows errors only and each `-v` lowers the
/// threshold one level from `warn`.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("memo={level},memo_core={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `--root` / `MEMO_ROOT`, falling back to the current directory. Relative
/// roots are made absolute against the current directory.
fn document_root(flag: Option<PathBuf>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Cannot determine the current directory")?;
    Ok(match flag {
        Some(root) if root.is_absolute() => root,
        Some(root) => cwd.join(root),
        None => cwd,
    })
}
