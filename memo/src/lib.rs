use memo_core::storage::Library;

pub mod cli;
pub mod commands;

/// What every command handler gets: the opened library and output settings.
pub struct AppContext {
    pub library: Library,
    pub json: bool,
    pub quiet: bool,
}
