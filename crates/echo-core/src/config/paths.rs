//! Path utilities for echo configuration files

use std::path::PathBuf;

/// Directory holding echo configuration
///
/// Returns: `<config dir>/echo` (e.g. `~/.config/echo` on Linux)
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("echo")
}

/// Get the default config file path
///
/// Returns: `<config dir>/echo/config.yaml`
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_layout() {
        let path = default_config_path();
        assert!(path.ends_with("echo/config.yaml"));
    }
}
