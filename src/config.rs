//! Daemon configuration.
//!
//! Settings are read from `~/.playd/config.json` when that file exists. Every
//! field has a default, so a partial file (or none at all) is fine. Paths may
//! start with `~/`, which is expanded to the home directory on load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Directory under the home directory that holds playd's files.
pub const APP_DIR_NAME: &str = ".playd";

/// Config file name inside [`APP_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Socket file name inside [`APP_DIR_NAME`].
pub const SOCKET_FILE_NAME: &str = "playd.sock";

// ============================================================================
// ConfigError
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The home directory could not be determined.
    #[error("ホームディレクトリが見つかりません")]
    HomeNotFound,

    /// The config file exists but could not be read.
    #[error("設定ファイルを読み込めません: {0}")]
    ReadError(String),

    /// The config file is not valid JSON for this schema.
    #[error("設定ファイルの形式が不正です: {0}")]
    ParseError(String),

    /// A value is out of range.
    #[error("設定値が不正です: {0}")]
    InvalidValue(String),
}

impl ConfigError {
    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::HomeNotFound => "HOME環境変数を設定してください",
            Self::ReadError(_) => "設定ファイルの権限を確認してください",
            Self::ParseError(_) | Self::InvalidValue(_) => {
                "~/.playd/config.json の内容を確認してください"
            }
        }
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_default()
}

fn default_music_dir() -> PathBuf {
    home_dir().join("Music")
}

fn default_extensions() -> Vec<String> {
    crate::playlist::DEFAULT_EXTENSIONS
        .iter()
        .map(|e| (*e).to_string())
        .collect()
}

/// Returns `~/.playd/playd.sock`.
#[must_use]
pub fn default_socket_path() -> PathBuf {
    home_dir().join(APP_DIR_NAME).join(SOCKET_FILE_NAME)
}

fn default_autoplay() -> bool {
    true
}

/// Returns `~/.playd/config.json`.
///
/// # Errors
///
/// Returns `ConfigError::HomeNotFound` if there is no home directory.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::HomeNotFound)
}

/// Expands a leading `~/` (or a lone `~`) to the home directory.
#[must_use]
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

// ============================================================================
// DaemonConfig
// ============================================================================

/// Daemon settings.
///
/// # Example
///
/// ```
/// use playd::config::DaemonConfig;
///
/// let config = DaemonConfig::default();
/// assert_eq!(config.extensions, vec!["mp3".to_string()]);
/// assert!(config.autoplay);
/// assert_eq!(config.idle_exit_secs, 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Directory scanned for tracks at startup.
    #[serde(default = "default_music_dir")]
    pub music_dir: PathBuf,

    /// File extensions that count as tracks, without the dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// IPC socket path.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Track the cursor starts on.
    #[serde(default)]
    pub initial_index: usize,

    /// Start playing as soon as the daemon is up.
    #[serde(default = "default_autoplay")]
    pub autoplay: bool,

    /// Exit after the keep-alive claim has been released this long. 0 = never.
    #[serde(default)]
    pub idle_exit_secs: u64,

    /// Tracing filter directive for the daemon, e.g. `"playd=debug"`.
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            music_dir: default_music_dir(),
            extensions: default_extensions(),
            socket_path: default_socket_path(),
            initial_index: 0,
            autoplay: default_autoplay(),
            idle_exit_secs: 0,
            log_filter: None,
        }
    }
}

impl DaemonConfig {
    /// Loads `~/.playd/config.json`, falling back to defaults if it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is unreadable or invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_config_path()?)
    }

    /// Loads the config at `path`, falling back to defaults if it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is unreadable or invalid.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// Expands `~` in the path fields.
    pub fn expand_paths(&mut self) {
        self.music_dir = expand_home(&self.music_dir);
        self.socket_path = expand_home(&self.socket_path);
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extensions.is_empty() {
            return Err(ConfigError::InvalidValue(
                "extensions には1つ以上の拡張子を指定してください".to_string(),
            ));
        }
        if let Some(bad) = self
            .extensions
            .iter()
            .find(|e| e.is_empty() || e.starts_with('.'))
        {
            return Err(ConfigError::InvalidValue(format!(
                "拡張子はドットなしで指定してください: '{}'",
                bad
            )));
        }
        if self.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue(
                "socket_path が空です".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert!(config.music_dir.ends_with("Music"));
        assert!(config.socket_path.ends_with(".playd/playd.sock"));
        assert_eq!(config.initial_index, 0);
        assert!(config.autoplay);
        assert!(config.log_filter.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_empty_json() {
        let config: DaemonConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DaemonConfig::default());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let json = r#"{"music_dir":"/srv/music","extensions":["mp3","ogg"],"autoplay":false}"#;
        let config: DaemonConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.music_dir, PathBuf::from("/srv/music"));
        assert_eq!(config.extensions, vec!["mp3", "ogg"]);
        assert!(!config.autoplay);
        assert_eq!(config.idle_exit_secs, 0);
    }

    #[test]
    fn test_validate_rejects_empty_extensions() {
        let config = DaemonConfig {
            extensions: vec![],
            ..DaemonConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_validate_rejects_dotted_extension() {
        let config = DaemonConfig {
            extensions: vec![".mp3".to_string()],
            ..DaemonConfig::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains(".mp3"));
    }

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap_or_default();
        assert_eq!(expand_home(Path::new("~/Music")), home.join("Music"));
        assert_eq!(expand_home(Path::new("/abs/path")), PathBuf::from("/abs/path"));
        assert_eq!(expand_home(Path::new("rel/~x")), PathBuf::from("rel/~x"));
    }

    mod load_tests {
        use super::*;

        #[test]
        fn test_load_missing_file_uses_defaults() {
            let dir = tempfile::tempdir().unwrap();
            let config = DaemonConfig::load_from(&dir.path().join("config.json")).unwrap();
            assert_eq!(config, DaemonConfig::default());
        }

        #[test]
        fn test_load_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("config.json");
            std::fs::write(
                &path,
                r#"{"music_dir":"~/Songs","initial_index":2,"idle_exit_secs":300}"#,
            )
            .unwrap();

            let config = DaemonConfig::load_from(&path).unwrap();

            assert_eq!(config.music_dir, home_dir().join("Songs"));
            assert_eq!(config.initial_index, 2);
            assert_eq!(config.idle_exit_secs, 300);
        }

        #[test]
        fn test_load_invalid_json() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("config.json");
            std::fs::write(&path, "not json").unwrap();

            let err = DaemonConfig::load_from(&path).unwrap_err();
            assert!(matches!(err, ConfigError::ParseError(_)));
            assert!(err.suggestion().contains("config.json"));
        }

        #[test]
        fn test_load_invalid_value() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("config.json");
            std::fs::write(&path, r#"{"extensions":[]}"#).unwrap();

            assert!(matches!(
                DaemonConfig::load_from(&path),
                Err(ConfigError::InvalidValue(_))
            ));
        }
    }
}
