//! Platform-specific locations for clipkeep data

use std::path::PathBuf;

const APP_DIR: &str = "Clipkeep";

/// Get the platform-specific data directory
///
/// Returns:
/// - Windows: %LOCALAPPDATA%\Clipkeep
/// - macOS: ~/Library/Application Support/Clipkeep
/// - Linux/Other: ~/.local/share/Clipkeep
pub fn get_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".data")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

/// Get the platform-specific config directory
pub fn get_config_dir() -> PathBuf {
    let base = dirs::config_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

pub fn get_history_db_path() -> PathBuf {
    get_data_dir().join("clipboard_history.db")
}

pub fn get_archive_db_path() -> PathBuf {
    get_data_dir().join("clipkeep_archive.db")
}

pub fn get_settings_path() -> PathBuf {
    get_config_dir().join("settings.toml")
}

/// Key file for the fixed-key encryption mode
pub fn get_key_file_path() -> PathBuf {
    get_data_dir().join("clipkeep.key")
}

/// Key file sealing the personal password inside settings
pub fn get_settings_key_path() -> PathBuf {
    get_config_dir().join("settings.key")
}

/// Ensure the data directory exists, creating it if necessary
pub fn ensure_data_dir() -> std::io::Result<PathBuf> {
    let dir = get_data_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Ensure the config directory exists, creating it if necessary
pub fn ensure_config_dir() -> std::io::Result<PathBuf> {
    let dir = get_config_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
