use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Main configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Editor socket, derived from the user id when unset
    #[serde(default)]
    pub socket: Option<PathBuf>,

    /// Command that starts the editor when its socket is unreachable
    /// e.g. "textmate --background"
    #[serde(default)]
    pub launch: Option<String>,

    /// Connection attempts before giving up
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Pause between connection attempts
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Whether the editor sends a greeting line on accept
    #[serde(default = "default_greeting")]
    pub greeting: bool,
}

fn default_connect_attempts() -> u32 {
    20
}

fn default_retry_interval_ms() -> u64 {
    500
}

fn default_greeting() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket: None,
            launch: None,
            connect_attempts: default_connect_attempts(),
            retry_interval_ms: default_retry_interval_ms(),
            greeting: default_greeting(),
        }
    }
}

impl Config {
    /// Load config from default location (~/.config/mate/config.toml)
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load config from `path`, falling back to defaults if missing or invalid
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Ignoring invalid config: {e}");
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Get config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("mate/config.toml"))
    }

    /// Socket to connect to, computed once per invocation
    pub fn socket_path(&self) -> PathBuf {
        self.socket
            .clone()
            .unwrap_or_else(libmate::paths::socket_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml"));
        assert_eq!(config.socket, None);
        assert_eq!(config.connect_attempts, 20);
        assert_eq!(config.retry_interval_ms, 500);
        assert!(config.greeting);
    }

    #[test]
    fn parses_all_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
socket = "/run/user/1000/editor.sock"
launch = "textmate --background"
connect-attempts = 3
retry-interval-ms = 50
greeting = false
"#,
        )
        .unwrap();

        let config = Config::load_from(&path);
        assert_eq!(
            config.socket_path(),
            PathBuf::from("/run/user/1000/editor.sock")
        );
        assert_eq!(config.launch.as_deref(), Some("textmate --background"));
        assert_eq!(config.connect_attempts, 3);
        assert_eq!(config.retry_interval_ms, 50);
        assert!(!config.greeting);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "connect-attempts = 1\n").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.connect_attempts, 1);
        assert_eq!(config.retry_interval_ms, 500);
        assert_eq!(config.launch, None);
    }

    #[test]
    fn invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "connect-attempts = \"many\"\n").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.connect_attempts, 20);
    }
}
