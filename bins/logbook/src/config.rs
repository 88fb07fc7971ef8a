//! Service configuration: a TOML file with CLI overrides.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0"
//! port = 11610
//!
//! [auth]
//! username = "ops"
//! password = "secret"
//!
//! [database]
//! path = "db"
//! compression = "Snappy"
//! cache_size = "16M"
//!
//! [pagination]
//! records_per_page = 100
//!
//! [log]
//! path = "logbook.log"
//! ```
//!
//! Every section and field is optional; defaults match the values above
//! (auth and the log file default to off). `cache_size` accepts a bare byte
//! count or a `K`/`M`/`G` suffix.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use logbook_db::{Compression, StorageConfig};
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

/// Configuration file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "logbook.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub auth: AuthSection,
    pub database: DatabaseSection,
    pub pagination: PaginationSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 11610,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AuthSection {
    /// Credentials, if basic auth should be enabled. Both fields must be
    /// present and non-empty.
    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some((username.clone(), password.clone()))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: PathBuf,
    pub compression: Compression,
    #[serde(deserialize_with = "deserialize_size")]
    pub cache_size: usize,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("db"),
            compression: Compression::default(),
            cache_size: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationSection {
    pub records_per_page: usize,
}

impl Default for PaginationSection {
    fn default() -> Self {
        Self {
            records_per_page: 100,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Optional log file; output is teed to stdout and this file.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `path`, or from [`DEFAULT_CONFIG_PATH`] if it
    /// exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Config::default()
                }
            }
        };

        if config.pagination.records_per_page == 0 {
            bail!("records_per_page must be at least 1");
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("error opening config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("error reading config file {}", path.display()))
    }

    /// Storage engine options derived from this configuration.
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            records_per_page: self.pagination.records_per_page,
            cache_size_bytes: self.database.cache_size,
            compression: self.database.compression,
        }
    }
}

/// Accepts `16777216`, `"16384K"`, `"16M"` or `"1G"`.
fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    struct SizeVisitor;

    impl<'de> Visitor<'de> for SizeVisitor {
        type Value = usize;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a byte count, optionally with a K/M/G suffix")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<usize, E> {
            Ok(value as usize)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<usize, E> {
            usize::try_from(value).map_err(|_| E::custom(format!("invalid size: {value}")))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<usize, E> {
            parse_size(value).ok_or_else(|| E::custom(format!("invalid size: {value}")))
        }
    }

    deserializer.deserialize_any(SizeVisitor)
}

fn parse_size(value: &str) -> Option<usize> {
    let value = value.trim();
    let (digits, multiplier) = match value.strip_suffix(['K', 'M', 'G']) {
        Some(digits) => {
            let multiplier = match &value[digits.len()..] {
                "K" => 1024,
                "M" => 1024 * 1024,
                _ => 1024 * 1024 * 1024,
            };
            (digits, multiplier)
        }
        None => (value, 1),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<usize>().ok()?.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 11610);
        assert_eq!(config.database.path, PathBuf::from("db"));
        assert_eq!(config.database.compression, Compression::Snappy);
        assert_eq!(config.database.cache_size, 16 * 1024 * 1024);
        assert_eq!(config.pagination.records_per_page, 100);
        assert!(config.auth.credentials().is_none());
        assert!(config.log.path.is_none());
    }

    #[test]
    fn full_file_parses() {
        let config: Config = toml::from_str(
            r#"
            [server]
            bind = "127.0.0.1"
            port = 8080

            [auth]
            username = "ops"
            password = "secret"

            [database]
            path = "/var/lib/logbook"
            compression = "LZ4"
            cache_size = "32M"

            [pagination]
            records_per_page = 50

            [log]
            path = "logbook.log"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.auth.credentials(),
            Some(("ops".to_string(), "secret".to_string()))
        );
        assert_eq!(config.database.compression, Compression::LZ4);
        assert_eq!(config.database.cache_size, 32 * 1024 * 1024);
        assert_eq!(config.pagination.records_per_page, 50);
        assert_eq!(config.log.path, Some(PathBuf::from("logbook.log")));
    }

    #[test]
    fn size_suffixes() {
        assert_eq!(parse_size("1024"), Some(1024));
        assert_eq!(parse_size("4K"), Some(4 * 1024));
        assert_eq!(parse_size("16M"), Some(16 * 1024 * 1024));
        assert_eq!(parse_size("2G"), Some(2 * 1024 * 1024 * 1024));
        assert_eq!(parse_size(""), None);
        assert_eq!(parse_size("M"), None);
        assert_eq!(parse_size("16MB"), None);
        assert_eq!(parse_size("-1"), None);
    }

    #[test]
    fn numeric_cache_size_accepted() {
        let config: Config =
            toml::from_str("[database]\ncache_size = 1048576\n").unwrap();
        assert_eq!(config.database.cache_size, 1024 * 1024);
    }

    #[test]
    fn bad_compression_rejected() {
        let result: std::result::Result<Config, _> =
            toml::from_str("[database]\ncompression = \"Brotli\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn partial_auth_disables_basic_auth() {
        let config: Config = toml::from_str("[auth]\nusername = \"ops\"\n").unwrap();
        assert!(config.auth.credentials().is_none());
    }
}
