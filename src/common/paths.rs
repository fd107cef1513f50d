//! Configuration and scratch-directory locations

use std::io;
use std::path::{Path, PathBuf};

/// Name used for the configuration directory
const APP_NAME: &str = "xfer-harness";

/// Name of the directory created under the test root for every run
pub const TEST_DATA_DIR: &str = "test_data";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/xfer-harness/`
/// - macOS: `~/Library/Application Support/xfer-harness/`
/// - Windows: `%APPDATA%\xfer-harness\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Default test root when neither the config file nor the environment names one
pub fn default_test_root() -> PathBuf {
    std::env::temp_dir().join(APP_NAME)
}

/// Get the file name of an executable path, used when staging it
pub fn executable_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

/// Remove a directory tree, treating "did not exist" as success
pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Remove a file, treating "did not exist" as success
pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Delete `*.log` files directly inside `dir`
///
/// Returns how many were removed. Files that vanish or cannot be removed
/// are skipped.
pub fn remove_log_files(dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_log = path.is_file() && path.extension().map(|ext| ext == "log").unwrap_or(false);
        if is_log && std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_is_valid() {
        let dir = config_dir();
        assert!(dir.is_some());
    }

    #[test]
    fn test_executable_name() {
        assert_eq!(
            executable_name(Path::new("/opt/tools/azcopy")),
            Some("azcopy".to_string())
        );
    }

    #[test]
    fn test_remove_missing_paths_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(remove_dir_if_exists(&tmp.path().join("nope")).is_ok());
        assert!(remove_file_if_exists(&tmp.path().join("nope.txt")).is_ok());
    }

    #[test]
    fn test_remove_log_files_only_touches_logs() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.log"), "x").unwrap();
        std::fs::write(tmp.path().join("b.log"), "x").unwrap();
        std::fs::write(tmp.path().join("keep.txt"), "x").unwrap();

        assert_eq!(remove_log_files(tmp.path()).unwrap(), 2);
        assert!(tmp.path().join("keep.txt").exists());
        assert!(!tmp.path().join("a.log").exists());
    }
}
