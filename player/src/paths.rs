/// Canonical file paths for the player's data files.
///
/// Both files live under `<platform config dir>/livesplit-player/`:
///   - config.toml  Edited by the user, read (and hot-reloaded) by the player.
///   - status.toml  Written by the player, read by any front-end.
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "livesplit-player";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";

/// Returns the player's application data directory, e.g. `~/.config/livesplit-player/`.
pub fn app_data_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("No configuration directory for this platform")?;
    Ok(base.join(APP_DIR_NAME))
}

/// Returns the full path to the config file inside `app_dir`.
pub fn config_file_path(app_dir: &Path) -> PathBuf {
    app_dir.join(CONFIG_FILE_NAME)
}

/// Returns the full path to the status file inside `app_dir`.
pub fn status_file_path(app_dir: &Path) -> PathBuf {
    app_dir.join(STATUS_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_ends_with_app_name() {
        if let Ok(dir) = app_data_dir() {
            assert_eq!(dir.file_name().unwrap(), APP_DIR_NAME);
        }
    }

    #[test]
    fn config_file_path_has_correct_name() {
        let path = config_file_path(Path::new("/cfg"));
        assert_eq!(path.file_name().unwrap(), CONFIG_FILE_NAME);
    }

    #[test]
    fn status_file_path_has_correct_name() {
        let path = status_file_path(Path::new("/cfg"));
        assert_eq!(path.file_name().unwrap(), STATUS_FILE_NAME);
    }

    #[test]
    fn config_and_status_share_same_parent_dir() {
        let dir = Path::new("/cfg/livesplit-player");
        assert_eq!(config_file_path(dir).parent(), status_file_path(dir).parent());
    }
}
