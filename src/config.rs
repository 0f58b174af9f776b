use dirs::home_dir;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the data directory (must be absolute)
pub const DATA_DIR_ENV: &str = "SQLSTEP_DATA_DIR";
pub const MAX_PRODUCT_ROWS_ENV: &str = "SQLSTEP_MAX_PRODUCT_ROWS";
pub const TIME_BUDGET_ENV: &str = "SQLSTEP_TIME_BUDGET_MS";

pub const DEFAULT_MAX_PRODUCT_ROWS: usize = 100_000;

const PREFERENCES_FILE: &str = "preferences.json";

/// Bounds applied to one simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorConfig {
    /// Largest cartesian product the join stage may build. `None` disables the cap.
    pub max_product_rows: Option<usize>,
    /// Wall-clock budget for the whole run. `None` means no deadline.
    pub time_budget: Option<Duration>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_product_rows: Some(DEFAULT_MAX_PRODUCT_ROWS),
            time_budget: None,
        }
    }
}

impl SimulatorConfig {
    pub fn from_preferences(prefs: &AppPreferences) -> Self {
        Self {
            max_product_rows: match prefs.max_product_rows {
                Some(0) => None,
                Some(n) => Some(n),
                None => Some(DEFAULT_MAX_PRODUCT_ROWS),
            },
            time_budget: prefs.time_budget_ms.filter(|ms| *ms > 0).map(Duration::from_millis),
        }
    }
}

/// Console preferences persisted as JSON in the data directory.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppPreferences {
    /// SQLite file opened at start-up; in-memory when unset
    pub database: Option<String>,
    /// Print the simulated steps after each statement
    pub visualize: bool,
    /// 0 disables the cap
    pub max_product_rows: Option<usize>,
    /// 0 disables the deadline
    pub time_budget_ms: Option<u64>,
}

impl AppPreferences {
    /// Load from the data directory, then apply environment overrides. A
    /// missing or unreadable file yields defaults.
    pub fn load() -> Self {
        let path = preferences_path();
        let mut prefs = match Self::load_from(&path) {
            Ok(p) => p,
            Err(e) => {
                info!("Using default preferences ({}): {}", path.display(), e);
                AppPreferences::default()
            }
        };
        prefs.apply_overrides(|key| std::env::var(key).ok());
        prefs
    }

    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let prefs: AppPreferences = serde_json::from_str(&content)?;
        info!(
            "Loaded prefs from JSON: database={:?}, visualize={}, max_product_rows={:?}, time_budget_ms={:?}",
            prefs.database, prefs.visualize, prefs.max_product_rows, prefs.time_budget_ms
        );
        Ok(prefs)
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let dir = get_data_dir();
        fs::create_dir_all(&dir)?;
        self.save_to(&dir.join(PREFERENCES_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("Saved preferences to {}", path.display());
        Ok(())
    }

    /// Override numeric limits from `lookup` (the process environment outside tests).
    /// Values that do not parse are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(n) = lookup(MAX_PRODUCT_ROWS_ENV).and_then(|v| v.trim().parse().ok()) {
            info!("{} overrides max_product_rows: {}", MAX_PRODUCT_ROWS_ENV, n);
            self.max_product_rows = Some(n);
        }
        if let Some(ms) = lookup(TIME_BUDGET_ENV).and_then(|v| v.trim().parse().ok()) {
            info!("{} overrides time_budget_ms: {}", TIME_BUDGET_ENV, ms);
            self.time_budget_ms = Some(ms);
        }
    }
}

pub fn preferences_path() -> PathBuf {
    get_data_dir().join(PREFERENCES_FILE)
}

pub fn get_data_dir() -> PathBuf {
    if let Ok(custom_dir) = std::env::var(DATA_DIR_ENV) {
        let path = PathBuf::from(custom_dir);
        if path.is_absolute() {
            return path;
        }
        log::warn!("{} must be absolute, ignoring {}", DATA_DIR_ENV, path.display());
    }

    // Default to ~/.sqlstep
    if let Some(mut hd) = home_dir() {
        hd.push(".sqlstep");
        return hd;
    }
    PathBuf::from(".sqlstep")
}
