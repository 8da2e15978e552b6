use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use postharvest_engine::EngineConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILENAME: &str = "postharvest.ron";

/// Front-end configuration, read from a RON file. Every field is optional in
/// the file; missing ones keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Holds `history.json` and `settings.json`.
    pub state_dir: PathBuf,
    pub download_dir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub settle_delay_ms: u64,
    pub tick_delay_ms: u64,
    pub tick_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".postharvest"),
            download_dir: PathBuf::from("downloads"),
            log_file: Some(PathBuf::from("postharvest.log")),
            settle_delay_ms: 2_000,
            tick_delay_ms: 1_000,
            tick_timeout_ms: 30_000,
        }
    }
}

/// Where a loaded [`AppConfig`] came from. Config is read before logging is
/// set up, so the caller logs this once the logger exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults { missing: PathBuf },
}

impl AppConfig {
    /// Reads `path`. A missing file yields the defaults; an unreadable or
    /// malformed one is an error.
    pub fn load(path: &Path) -> anyhow::Result<(Self, ConfigSource)> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let source = ConfigSource::Defaults {
                    missing: path.to_path_buf(),
                };
                return Ok((Self::default(), source));
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read config {path:?}"));
            }
        };

        let config: Self =
            ron::from_str(&content).with_context(|| format!("failed to parse config {path:?}"))?;
        Ok((config, ConfigSource::File(path.to_path_buf())))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            tick_delay: Duration::from_millis(self.tick_delay_ms),
            tick_timeout: Duration::from_millis(self.tick_timeout_ms),
            ..EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(DEFAULT_CONFIG_FILENAME);
        let (config, source) = AppConfig::load(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(source, ConfigSource::Defaults { missing: path });
    }

    #[test]
    fn partial_file_overrides_named_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(DEFAULT_CONFIG_FILENAME);
        fs::write(&path, r#"(state_dir: "/tmp/ph", tick_delay_ms: 250, log_file: None)"#).unwrap();

        let (config, source) = AppConfig::load(&path).unwrap();

        assert_eq!(source, ConfigSource::File(path.clone()));
        assert_eq!(config.state_dir, PathBuf::from("/tmp/ph"));
        assert_eq!(config.tick_delay_ms, 250);
        assert_eq!(config.log_file, None);
        assert_eq!(config.settle_delay_ms, 2_000);
        assert_eq!(
            config.engine_config().tick_delay,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(DEFAULT_CONFIG_FILENAME);
        fs::write(&path, "(state_dir: ").unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }
}
