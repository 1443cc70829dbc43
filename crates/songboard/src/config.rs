//! Configuration management for songboard.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "songboard";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "requests.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SONGBOARD_`)
/// 2. TOML config file at `~/.config/songboard/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Text and timing shown on the board.
    pub board: BoardConfig,
    /// Priority ("play now") flow configuration.
    pub priority: PriorityConfig,
    /// QR code appearance.
    pub qr: QrConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
    /// Origin used for the QR link, e.g. `https://requests.example.com`.
    /// When unset, the origin is taken from the request's `Host` header.
    pub public_origin: Option<String>,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/songboard/requests.db`
    pub database_path: Option<PathBuf>,
}

/// Board text and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Heading shown on both screens.
    pub title: String,
    /// Textual rate-limit hint. Not enforced.
    pub rate_limit_hint: String,
    /// Seconds before the "sent" acknowledgment reverts to the form.
    pub sent_banner_secs: u64,
}

/// Priority flow configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    /// Show the "Request & Play NOW" action.
    pub enabled: bool,
    /// Price quoted in the payment-nudge dialog.
    pub price: String,
    /// Where the payment should be sent.
    pub contact: String,
}

/// QR code appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    /// Minimum rendered size in pixels.
    pub size_px: u32,
    /// Module colour.
    pub dark_color: String,
    /// Background colour.
    pub light_color: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            public_origin: None,
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            title: "Request a Song".to_string(),
            rate_limit_hint: "Please limit to one request every 30 minutes ❤️".to_string(),
            sent_banner_secs: 3,
        }
    }
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            price: "$7".to_string(),
            contact: "the DJ".to_string(),
        }
    }
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            size_px: 200,
            dark_color: "#e0e0e0".to_string(),
            light_color: "#1a1a2e".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            // Double underscore so keys like `sent_banner_secs` survive the split
            .merge(Env::prefixed("SONGBOARD_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        if let Some(origin) = &self.server.public_origin {
            if !(origin.starts_with("http://") || origin.starts_with("https://")) {
                return Err(Error::ConfigValidation {
                    message: format!("public_origin must start with http:// or https://: {origin}"),
                });
            }
        }

        if self.board.sent_banner_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "sent_banner_secs must be greater than 0".to_string(),
            });
        }

        if !(64..=2048).contains(&self.qr.size_px) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "qr.size_px must be between 64 and 2048, got {}",
                    self.qr.size_px
                ),
            });
        }

        for color in [&self.qr.dark_color, &self.qr.light_color] {
            if !is_hex_color(color) {
                return Err(Error::ConfigValidation {
                    message: format!("invalid colour {color:?}, expected #rgb or #rrggbb"),
                });
            }
        }

        Ok(())
    }

    /// The socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns an error if `server.bind` is not a valid socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|_| Error::ConfigValidation {
                message: format!("invalid bind address: {}", self.server.bind),
            })
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the configured public origin without a trailing slash.
    #[must_use]
    pub fn public_origin(&self) -> Option<&str> {
        self.server
            .public_origin
            .as_deref()
            .map(|o| o.trim_end_matches('/'))
    }

    /// Get the sent-banner revert delay as a Duration.
    #[must_use]
    pub fn sent_banner_delay(&self) -> Duration {
        Duration::from_secs(self.board.sent_banner_secs)
    }
}

fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert!(config.server.public_origin.is_none());
        assert!(config.storage.database_path.is_none());
        assert_eq!(config.board.sent_banner_secs, 3);
        assert!(config.priority.enabled);
        assert_eq!(config.qr.size_px, 200);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_bind() {
        let mut config = Config::default();
        config.server.bind = "not an address".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("invalid bind address"));
    }

    #[test]
    fn test_validate_bad_origin() {
        let mut config = Config::default();
        config.server.public_origin = Some("requests.example.com".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("public_origin"));
    }

    #[test]
    fn test_validate_zero_banner() {
        let mut config = Config::default();
        config.board.sent_banner_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("sent_banner_secs"));
    }

    #[test]
    fn test_validate_qr_size() {
        let mut config = Config::default();
        config.qr.size_px = 10;
        assert!(config.validate().is_err());

        config.qr.size_px = 4096;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_qr_colors() {
        let mut config = Config::default();
        config.qr.dark_color = "red".to_string();
        assert!(config.validate().is_err());

        config.qr.dark_color = "#fff".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bind_addr() {
        let config = Config::default();
        assert_eq!(
            config.bind_addr().unwrap(),
            SocketAddr::from(([0, 0, 0, 0], 8080))
        );
    }

    #[test]
    fn test_public_origin_trims_slash() {
        let mut config = Config::default();
        config.server.public_origin = Some("https://dj.example.com/".to_string());
        assert_eq!(config.public_origin(), Some("https://dj.example.com"));
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("requests.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_sent_banner_delay() {
        assert_eq!(
            Config::default().sent_banner_delay(),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("songboard"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [server]
            bind = "127.0.0.1:9000"
            public_origin = "https://dj.example.com"

            [board]
            title = "Friday Night"
            sent_banner_secs = 5

            [priority]
            price = "$10"
            "#,
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.public_origin(), Some("https://dj.example.com"));
        assert_eq!(config.board.title, "Friday Night");
        assert_eq!(config.board.sent_banner_secs, 5);
        assert_eq!(config.priority.price, "$10");
        // Untouched sections keep their defaults
        assert_eq!(config.qr, QrConfig::default());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[board]\nsent_banner_secs = 0\n").unwrap();

        assert!(Config::load_from(Some(path)).is_err());
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("sent_banner_secs"));
        assert!(json.contains("public_origin"));
    }
}
