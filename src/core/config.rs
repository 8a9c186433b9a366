use crate::core::errors::ConfigError;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Transport-level request body ceiling (16 MiB)
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Session secret used when `SESSION_SECRET` is unset. Not for production.
pub const DEFAULT_SESSION_SECRET: &str = "dev-secret-key";

/// Where the display copy of an analyzed image lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// JPEG written under the results directory, session keeps only its id
    Disk,
    /// JPEG base64-encoded straight into the session's result record
    Inline,
}

impl StorageMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "disk" => Some(StorageMode::Disk),
            "inline" => Some(StorageMode::Inline),
            _ => None,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
    /// Serverless deployment: ephemeral `/tmp` paths, no background cleanup loop
    pub serverless: bool,
}

/// Result storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub mode: StorageMode,
    pub results_dir: PathBuf,
}

/// Image pipeline configuration
#[derive(Debug, Clone)]
pub struct ImagingConfig {
    /// Longer edge bound of the copy fed to the analyzer
    pub analysis_max_edge: u32,
    /// Longer edge bound of the copy shown to the user
    pub display_max_edge: u32,
    pub jpeg_quality: u8,
}

/// Session cookie configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
}

/// Result image retention
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub retention: Duration,
    pub interval: Duration,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub imaging: ImagingConfig,
    pub session: SessionConfig,
    pub cleanup: CleanupConfig,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build and validate a configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::load(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn load<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Parse log level
        let log_level = lookup("LOG_LEVEL")
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        let serverless = lookup("VERCEL")
            .map(|s| s.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let mode = match lookup("RESULT_STORAGE") {
            Some(raw) => {
                StorageMode::parse(&raw).ok_or(ConfigError::InvalidStorageMode(raw))?
            }
            None => StorageMode::Disk,
        };

        let results_dir = lookup("RESULTS_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                if serverless {
                    PathBuf::from("/tmp/results")
                } else {
                    PathBuf::from("./results")
                }
            });

        let jpeg_quality = match lookup("JPEG_QUALITY") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::EnvVarError {
                name: "JPEG_QUALITY".to_string(),
                value: raw.clone(),
            })?,
            None => 85,
        };

        Ok(Self {
            server: ServerConfig {
                port: parse_var(lookup, "SERVER_PORT").unwrap_or(5000),
                host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                log_level,
                serverless,
            },
            storage: StorageConfig { mode, results_dir },
            imaging: ImagingConfig {
                analysis_max_edge: parse_var(lookup, "ANALYSIS_MAX_EDGE").unwrap_or(512),
                display_max_edge: parse_var(lookup, "DISPLAY_MAX_EDGE").unwrap_or(600),
                jpeg_quality,
            },
            session: SessionConfig {
                secret: lookup("SESSION_SECRET")
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_SESSION_SECRET.to_string()),
            },
            cleanup: CleanupConfig {
                retention: Duration::from_secs(
                    parse_var(lookup, "RESULT_RETENTION_HOURS").unwrap_or(24u64) * 3600,
                ),
                interval: Duration::from_secs(
                    parse_var(lookup, "CLEANUP_INTERVAL_SECS").unwrap_or(3600),
                ),
            },
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(16..=8192).contains(&self.imaging.analysis_max_edge) {
            return Err(ConfigError::InvalidImagingConfig(format!(
                "analysis_max_edge must be between 16 and 8192, got {}",
                self.imaging.analysis_max_edge
            )));
        }

        if !(16..=8192).contains(&self.imaging.display_max_edge) {
            return Err(ConfigError::InvalidImagingConfig(format!(
                "display_max_edge must be between 16 and 8192, got {}",
                self.imaging.display_max_edge
            )));
        }

        if !(1..=100).contains(&self.imaging.jpeg_quality) {
            return Err(ConfigError::InvalidJpegQuality(self.imaging.jpeg_quality));
        }

        if self.cleanup.retention.is_zero() {
            return Err(ConfigError::InvalidCleanupConfig(
                "result_retention_hours must be > 0".to_string(),
            ));
        }
        if self.cleanup.interval.is_zero() {
            return Err(ConfigError::InvalidCleanupConfig(
                "cleanup_interval_secs must be > 0".to_string(),
            ));
        }

        // Validate results directory parent exists
        if self.storage.mode == StorageMode::Disk {
            let results_path = Path::new(&self.storage.results_dir);
            if let Some(parent) = results_path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(ConfigError::InvalidResultsPath(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn is_serverless(&self) -> bool {
        self.server.serverless
    }

    pub fn storage_mode(&self) -> StorageMode {
        self.storage.mode
    }

    pub fn results_dir(&self) -> &Path {
        &self.storage.results_dir
    }

    pub fn session_secret(&self) -> &str {
        &self.session.secret
    }

    pub fn uses_default_secret(&self) -> bool {
        self.session.secret == DEFAULT_SESSION_SECRET
    }

    pub fn max_upload_bytes(&self) -> usize {
        MAX_UPLOAD_BYTES
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name).and_then(|s| s.trim().parse().ok())
}

// No Default implementation: Config::new() can fail.

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.server_port(), 5000);
        assert_eq!(config.storage_mode(), StorageMode::Disk);
        assert_eq!(config.results_dir(), Path::new("./results"));
        assert_eq!(config.imaging.analysis_max_edge, 512);
        assert_eq!(config.imaging.display_max_edge, 600);
        assert_eq!(config.imaging.jpeg_quality, 85);
        assert_eq!(config.cleanup.retention, Duration::from_secs(24 * 3600));
        assert_eq!(config.cleanup.interval, Duration::from_secs(3600));
        assert!(config.uses_default_secret());
        assert!(!config.is_serverless());
        assert_eq!(config.max_upload_bytes(), 16 * 1024 * 1024);
    }

    #[test]
    fn test_serverless_uses_tmp() {
        let config = config_from(&[("VERCEL", "true")]).unwrap();
        assert!(config.is_serverless());
        assert_eq!(config.results_dir(), Path::new("/tmp/results"));
    }

    #[test]
    fn test_explicit_results_dir_wins() {
        let config = config_from(&[("VERCEL", "true"), ("RESULTS_DIR", "/tmp/custom")]).unwrap();
        assert_eq!(config.results_dir(), Path::new("/tmp/custom"));
    }

    #[test]
    fn test_inline_mode_and_secret() {
        let config =
            config_from(&[("RESULT_STORAGE", "Inline"), ("SESSION_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.storage_mode(), StorageMode::Inline);
        assert_eq!(config.session_secret(), "s3cret");
        assert!(!config.uses_default_secret());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            config_from(&[("RESULT_STORAGE", "s3")]),
            Err(ConfigError::InvalidStorageMode(_))
        ));
        assert!(matches!(
            config_from(&[("JPEG_QUALITY", "0")]),
            Err(ConfigError::InvalidJpegQuality(0))
        ));
        assert!(matches!(
            config_from(&[("JPEG_QUALITY", "high")]),
            Err(ConfigError::EnvVarError { .. })
        ));
        assert!(matches!(
            config_from(&[("ANALYSIS_MAX_EDGE", "4")]),
            Err(ConfigError::InvalidImagingConfig(_))
        ));
        assert!(matches!(
            config_from(&[("CLEANUP_INTERVAL_SECS", "0")]),
            Err(ConfigError::InvalidCleanupConfig(_))
        ));
        assert!(matches!(
            config_from(&[("RESULTS_DIR", "/definitely/not/here/results")]),
            Err(ConfigError::InvalidResultsPath(_))
        ));
    }
}
