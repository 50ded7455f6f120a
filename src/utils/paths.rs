use dirs::home_dir;
use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

const DEFAULT_DIR_NAME: &str = ".club_core";
const HOME_ENV: &str = "CLUB_CORE_HOME";
const TABLES_DIR: &str = "tables";
const CONFIG_FILE: &str = "config.json";

/// Returns the application data directory, defaulting to `~/.club_core`.
pub fn app_data_dir() -> PathBuf {
    if let Some(custom) = env::var_os(HOME_ENV) {
        return PathBuf::from(custom);
    }
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}

/// Directory holding one JSON file per table.
pub fn tables_dir() -> PathBuf {
    tables_dir_in(&app_data_dir())
}

pub fn tables_dir_in(base: &Path) -> PathBuf {
    base.join(TABLES_DIR)
}

pub fn config_file_in(base: &Path) -> PathBuf {
    base.join(CONFIG_FILE)
}

pub fn ensure_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}
