//! INI configuration file.
//!
//! Settings live in `~/.config/normalmap/config.ini` (platform equivalent via
//! [`dirs::config_dir`]):
//!
//! ```ini
//! [generator]
//! scale = 20
//! suffix = _normals.png
//!
//! [batch]
//! output_dir = out
//! threads = 8
//! error_policy = continue
//! queue_order = fifo
//! averaging = exact
//!
//! [logging]
//! level = debug
//! file = /tmp/normalmap.log
//! ```
//!
//! Every key is optional. Values read here sit between the built-in
//! defaults and command-line flags.

use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;
use tracing::Level;

use crate::batch::{AveragingMode, BatchConfig, DispatchMode, ErrorPolicy};
use crate::pool::QueueOrder;

/// Directory name under the platform config dir.
const APP_DIR: &str = "normalmap";

/// Config file name.
const CONFIG_FILE: &str = "config.ini";

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The file exists but could not be read.
    #[error("Failed to read config file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid INI.
    #[error("Failed to parse config file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// A key is not recognized.
    #[error("Unknown config key [{section}] {key}")]
    UnknownKey { section: String, key: String },

    /// A key holds a value that cannot be used.
    #[error("Invalid value for [{section}] {key}: '{value}'")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}

/// `[generator]` settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratorSettings {
    pub scale: Option<f32>,
    pub suffix: Option<String>,
}

/// `[batch]` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSettings {
    pub output_dir: Option<PathBuf>,
    /// Worker count; setting it selects parallel mode.
    pub threads: Option<usize>,
    pub error_policy: Option<ErrorPolicy>,
    pub queue_order: Option<QueueOrder>,
    pub averaging: Option<AveragingMode>,
}

/// `[logging]` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: Option<Level>,
    pub file: Option<PathBuf>,
}

/// Parsed contents of a config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub generator: GeneratorSettings,
    pub batch: BatchSettings,
    pub logging: LoggingSettings,
}

/// Returns the default config file location, if the platform has one.
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

impl ConfigFile {
    /// Loads the default config file.
    ///
    /// A missing file (or a platform without a config dir) yields the
    /// defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match config_file_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Loads a specific config file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(err) => ConfigError::Parse {
                path: path.to_path_buf(),
                reason: err.to_string(),
            },
        })?;
        Self::from_ini(&ini)
    }

    /// Parses config from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (section, properties) in ini.iter() {
            let section = section.unwrap_or_default();
            for (key, value) in properties.iter() {
                let value = value.trim();
                match (section, key) {
                    ("generator", "scale") => {
                        let scale: f32 = parse(section, key, value)?;
                        if !scale.is_finite() {
                            return Err(invalid(section, key, value));
                        }
                        config.generator.scale = Some(scale);
                    }
                    ("generator", "suffix") => {
                        if value.is_empty() {
                            return Err(invalid(section, key, value));
                        }
                        config.generator.suffix = Some(value.to_string());
                    }
                    ("batch", "output_dir") => {
                        config.batch.output_dir = Some(expand_tilde(value));
                    }
                    ("batch", "threads") => {
                        let threads: usize = parse(section, key, value)?;
                        if threads == 0 {
                            return Err(invalid(section, key, value));
                        }
                        config.batch.threads = Some(threads);
                    }
                    ("batch", "error_policy") => {
                        config.batch.error_policy = Some(parse(section, key, value)?);
                    }
                    ("batch", "queue_order") => {
                        config.batch.queue_order = Some(parse(section, key, value)?);
                    }
                    ("batch", "averaging") => {
                        config.batch.averaging = Some(parse(section, key, value)?);
                    }
                    ("logging", "level") => {
                        config.logging.level = Some(parse(section, key, value)?);
                    }
                    ("logging", "file") => {
                        config.logging.file = Some(expand_tilde(value));
                    }
                    _ => {
                        return Err(ConfigError::UnknownKey {
                            section: section.to_string(),
                            key: key.to_string(),
                        })
                    }
                }
            }
        }

        Ok(config)
    }

    /// Overlays these settings onto `base`.
    ///
    /// `threads` switches a sequential configuration to parallel mode; an
    /// existing parallel or merge mode is left alone.
    pub fn apply_to(&self, mut base: BatchConfig) -> BatchConfig {
        if let Some(scale) = self.generator.scale {
            base.scale = scale;
        }
        if let Some(suffix) = &self.generator.suffix {
            base.output_suffix = suffix.clone();
        }
        if let Some(dir) = &self.batch.output_dir {
            base.output_dir = dir.clone();
        }
        if let (Some(workers), DispatchMode::Sequential) = (self.batch.threads, &base.mode) {
            base.mode = DispatchMode::Parallel { workers };
        }
        if let Some(policy) = self.batch.error_policy {
            base.error_policy = policy;
        }
        if let Some(order) = self.batch.queue_order {
            base.queue_order = order;
        }
        if let Some(averaging) = self.batch.averaging {
            base.averaging = averaging;
        }
        base
    }
}

fn invalid(section: &str, key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(section, key, value))
}

/// Expands a leading `~/` to the home directory.
fn expand_tilde(value: &str) -> PathBuf {
    match (value.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_is_default() {
        let config = ConfigFile::from_ini_str("").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_parses_every_key() {
        let config = ConfigFile::from_ini_str(
            "[generator]\nscale = 8.5\nsuffix = _n.png\n\
             [batch]\noutput_dir = out\nthreads = 6\nerror_policy = continue\n\
             queue_order = lifo\naveraging = legacy\n\
             [logging]\nlevel = debug\nfile = run.log\n",
        )
        .unwrap();

        assert_eq!(config.generator.scale, Some(8.5));
        assert_eq!(config.generator.suffix.as_deref(), Some("_n.png"));
        assert_eq!(config.batch.output_dir, Some(PathBuf::from("out")));
        assert_eq!(config.batch.threads, Some(6));
        assert_eq!(config.batch.error_policy, Some(ErrorPolicy::ContinueOnError));
        assert_eq!(config.batch.queue_order, Some(QueueOrder::Lifo));
        assert_eq!(config.batch.averaging, Some(AveragingMode::LegacyTruncated));
        assert_eq!(config.logging.level, Some(Level::DEBUG));
        assert_eq!(config.logging.file, Some(PathBuf::from("run.log")));
    }

    #[test]
    fn test_invalid_value() {
        let err = ConfigFile::from_ini_str("[batch]\nthreads = many\n").unwrap_err();
        match err {
            ConfigError::InvalidValue {
                section,
                key,
                value,
            } => {
                assert_eq!(section, "batch");
                assert_eq!(key, "threads");
                assert_eq!(value, "many");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = ConfigFile::from_ini_str("[batch]\nthreads = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_non_finite_scale_rejected() {
        let err = ConfigFile::from_ini_str("[generator]\nscale = inf\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_unknown_key() {
        let err = ConfigFile::from_ini_str("[batch]\nspeed = 11\n").unwrap_err();
        assert_eq!(err.to_string(), "Unknown config key [batch] speed");
    }

    #[test]
    fn test_apply_to_overlays_settings() {
        let config = ConfigFile::from_ini_str(
            "[generator]\nscale = 3\n[batch]\nthreads = 2\nerror_policy = continue\n",
        )
        .unwrap();

        let applied = config.apply_to(BatchConfig::new("x"));
        assert_eq!(applied.scale, 3.0);
        assert_eq!(applied.mode, DispatchMode::Parallel { workers: 2 });
        assert_eq!(applied.error_policy, ErrorPolicy::ContinueOnError);
        assert_eq!(applied.output_dir, PathBuf::from("x"));
    }

    #[test]
    fn test_threads_do_not_override_merge() {
        let config = ConfigFile::from_ini_str("[batch]\nthreads = 4\n").unwrap();
        let merge = BatchConfig::default().with_mode(DispatchMode::Merge {
            output_name: "m.png".to_string(),
        });
        assert_eq!(config.apply_to(merge.clone()), merge);
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[generator]\nscale = 12\n").unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.generator.scale, Some(12.0));
    }

    #[test]
    fn test_load_from_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = ConfigFile::load_from(&temp.path().join("nope.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_config_file_path_ends_with_app_dir() {
        if let Some(path) = config_file_path() {
            assert!(path.ends_with("normalmap/config.ini"));
        }
    }
}
