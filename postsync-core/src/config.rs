//! Layered application configuration.
//!
//! # Sources
//!
//! ```text
//! environment variable  >  config file (YAML)  >  built-in default
//! ```
//!
//! The file lives at `$CONFIG` or `config/config.yaml`. A missing or broken
//! file is logged and treated as empty; a missing database URI is not, and
//! fails in [`AppConfig::snapshot`].
//!
//! # API pattern
//!
//! Every loader has two forms:
//! - `load_with_env(env)`: explicit environment lookup; used in tests
//! - `load()`: reads the process environment, delegates to `load_with_env`
//!
//! Tests must never mutate the process environment; pass a closure instead.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::snapshot::{ConnectionDescriptor, MainCfSettings, SyncSnapshot};
use crate::types::MapMode;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

pub const ENV_CONFIG: &str = "CONFIG";
pub const ENV_DB_URI: &str = "DBURI";
pub const ENV_OUTPUT_DIR: &str = "POSTFIXCONFPATH";
pub const ENV_HOSTNAME: &str = "POSTHOSTNAME";
pub const ENV_MAP_MODE: &str = "POSTSYNC_MAP_MODE";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Root of the YAML config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub db: DbConfig,
    pub output: OutputConfig,
    pub postfix: PostfixConfig,
}

/// Store connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DbConfig {
    /// e.g. `mysql://relay:secret@db:3306/mailrelay` or `sqlite://relay.db`.
    pub uri: Option<String>,
}

/// Where and how the Postfix files are produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub mode: MapMode,
    /// Relays fetched per store round trip in pre-rendered mode.
    pub page_size: u32,
    /// Also emit disabled and soft-deleted relays.
    pub include_disabled: bool,
    /// Writer high-water mark in bytes.
    pub write_buffer: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/etc/postfix"),
            mode: MapMode::LiveQuery,
            page_size: 100,
            include_disabled: false,
            write_buffer: 64 * 1024,
        }
    }
}

/// Values rendered into `main.cf`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostfixConfig {
    pub hostname: String,
    pub tls_cert_file: Option<PathBuf>,
    pub tls_key_file: Option<PathBuf>,
    pub message_size_limit: u64,
    pub mailbox_size_limit: u64,
    pub content_filter: Option<String>,
}

impl Default for PostfixConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            tls_cert_file: None,
            tls_key_file: None,
            message_size_limit: 25 * 1024 * 1024,
            mailbox_size_limit: 0,
            content_filter: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Read and parse a config file. Strict: any failure is returned.
pub fn read_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve the config file path from the environment.
pub fn config_path_with_env<F>(env: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup(env, ENV_CONFIG)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load the config file at `path` (lenient) and apply environment overrides.
pub fn load_at_with_env<F>(path: &Path, env: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match read_file(path) {
        Ok(config) => config,
        Err(err) => {
            if let Some(legacy) = legacy_config_hint(path) {
                tracing::warn!(
                    legacy = %legacy.display(),
                    expected = %path.display(),
                    "found a JSON5 config; convert it to YAML at the expected path"
                );
            }
            tracing::warn!(error = %err, "using empty configuration");
            AppConfig::default()
        }
    };
    config.apply_env(&env)?;
    Ok(config)
}

/// A `.json5` sibling of a missing config file, as older deployments used.
pub fn legacy_config_hint(path: &Path) -> Option<PathBuf> {
    if path.exists() {
        return None;
    }
    let legacy = path.with_extension("json5");
    legacy.is_file().then_some(legacy)
}

/// Load configuration using `env` for every variable lookup.
pub fn load_with_env<F>(env: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let path = config_path_with_env(&env);
    load_at_with_env(&path, env)
}

/// `load_with_env` convenience wrapper over the process environment.
pub fn load() -> Result<AppConfig, ConfigError> {
    load_with_env(|key| std::env::var(key).ok())
}

/// Empty values count as unset.
fn lookup<F>(env: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(key).filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Overwrite file values with any environment variables that are set.
    pub fn apply_env<F>(&mut self, env: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup(env, ENV_DB_URI) {
            self.db.uri = Some(uri);
        }
        if let Some(dir) = lookup(env, ENV_OUTPUT_DIR) {
            self.output.dir = PathBuf::from(dir);
        }
        if let Some(hostname) = lookup(env, ENV_HOSTNAME) {
            self.postfix.hostname = hostname;
        }
        if let Some(mode) = lookup(env, ENV_MAP_MODE) {
            self.output.mode = mode.parse().map_err(ConfigError::InvalidMode)?;
        }
        Ok(())
    }

    /// The configured URI, or [`ConfigError::MissingUri`].
    pub fn db_uri(&self) -> Result<&str, ConfigError> {
        self.db
            .uri
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingUri)
    }

    /// Validate and freeze into a [`SyncSnapshot`].
    pub fn snapshot(&self) -> Result<SyncSnapshot, ConfigError> {
        let connection = ConnectionDescriptor::parse(self.db_uri()?)?;
        let page_size = NonZeroU32::new(self.output.page_size).ok_or(ConfigError::InvalidPageSize)?;
        Ok(SyncSnapshot {
            hostname: self.postfix.hostname.clone(),
            connection,
            output_dir: self.output.dir.clone(),
            map_mode: self.output.mode,
            page_size,
            include_disabled: self.output.include_disabled,
            write_buffer: self.output.write_buffer,
            main_cf: MainCfSettings {
                tls_cert_file: self.postfix.tls_cert_file.clone(),
                tls_key_file: self.postfix.tls_key_file.clone(),
                message_size_limit: self.postfix.message_size_limit,
                mailbox_size_limit: self.postfix.mailbox_size_limit,
                content_filter: self.postfix.content_filter.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.output.dir, PathBuf::from("/etc/postfix"));
        assert_eq!(cfg.output.mode, MapMode::LiveQuery);
        assert_eq!(cfg.output.page_size, 100);
        assert_eq!(cfg.postfix.hostname, "localhost");
        assert!(cfg.db.uri.is_none());
    }

    #[test]
    fn empty_env_value_is_ignored() {
        let mut cfg = AppConfig::default();
        cfg.postfix.hostname = "from-file".into();
        cfg.apply_env(&env_of(&[(ENV_HOSTNAME, "")])).unwrap();
        assert_eq!(cfg.postfix.hostname, "from-file");
    }

    #[test]
    fn bad_mode_in_env_is_an_error() {
        let mut cfg = AppConfig::default();
        let err = cfg
            .apply_env(&env_of(&[(ENV_MAP_MODE, "btree")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMode(_)));
    }

    #[test]
    fn snapshot_requires_uri() {
        let err = AppConfig::default().snapshot().unwrap_err();
        assert!(matches!(err, ConfigError::MissingUri));
    }

    #[test]
    fn snapshot_rejects_zero_page_size() {
        let mut cfg = AppConfig::default();
        cfg.db.uri = Some("mysql://u:p@h/d".into());
        cfg.output.page_size = 0;
        assert!(matches!(cfg.snapshot(), Err(ConfigError::InvalidPageSize)));
    }
}
