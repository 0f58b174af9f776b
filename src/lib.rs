pub mod config;
pub mod console;
pub mod models;
pub mod query_ast;
pub mod query_tools;
pub mod render;

use std::io::{self, IsTerminal};

use crate::config::AppPreferences;
use crate::console::Console;
use crate::query_ast::{QueryAstError, SqliteStore};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] QueryAstError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Console entrypoint. `database` (usually the first CLI argument) wins over
/// the preferences file; with neither, the store is in memory.
pub fn run(database: Option<String>) -> Result<(), AppError> {
    dotenv::dotenv().ok();
    let _ = env_logger::Builder::from_default_env()
        .filter_module("sqlstep", log::LevelFilter::Warn)
        .parse_default_env()
        .is_test(false)
        .try_init();

    let prefs = AppPreferences::load();
    log::info!(
        "Starting with data directory: {}",
        config::get_data_dir().display()
    );
    let store = match database.or_else(|| prefs.database.clone()) {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::open_in_memory()?,
    };

    let interactive = io::stdin().is_terminal();
    let mut console = Console::new(store, prefs, io::stdout().lock())
        .with_color(io::stdout().is_terminal())
        .with_prompt(interactive);
    console.run(io::stdin().lock())?;
    Ok(())
}
