//! Centralized path management for ptyprobe.
//!
//! All application directories are lazily initialized and cached.
//! Use `set_*` functions before first access to override for testing.

use std::path::PathBuf;
use std::sync::OnceLock;

static CONFIG_DIR: OnceLock<PathBuf> = OnceLock::new();
static HOME_DIR: OnceLock<PathBuf> = OnceLock::new();

/// ~/.config/ptyprobe (or platform equivalent)
pub fn config_dir() -> &'static PathBuf {
    CONFIG_DIR.get_or_init(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ptyprobe")
    })
}

/// The user's home directory; the target program is launched from here
/// unless the config names another working directory.
pub fn home_dir() -> &'static PathBuf {
    HOME_DIR.get_or_init(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
}

/// Override config dir (must be called before first access). For testing.
pub fn set_config_dir(path: PathBuf) {
    let _ = CONFIG_DIR.set(path);
}

/// Override home dir (must be called before first access). For testing.
pub fn set_home_dir(path: PathBuf) {
    let _ = HOME_DIR.set(path);
}

/// Config file path: config_dir()/config.toml
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Expand a leading `~` to the home directory. Other paths pass through.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return home_dir().clone();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_dir_ends_with_ptyprobe() {
        let dir = config_dir();
        assert!(
            dir.ends_with("ptyprobe"),
            "config_dir should end with 'ptyprobe': {:?}",
            dir
        );
    }

    #[test]
    fn config_file_is_toml() {
        let path = config_file();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
    }

    #[test]
    fn expand_home_rewrites_tilde_prefix() {
        let expanded = expand_home("~/projects");
        assert_eq!(expanded, home_dir().join("projects"));
        assert_eq!(expand_home("~"), *home_dir());
    }

    #[test]
    fn expand_home_leaves_other_paths_alone() {
        assert_eq!(expand_home("/usr/bin"), PathBuf::from("/usr/bin"));
        assert_eq!(expand_home("relative/~dir"), PathBuf::from("relative/~dir"));
    }
}
