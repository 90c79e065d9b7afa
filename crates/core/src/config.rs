//! Engine configuration. Defaults first, then an optional TOML file, then
//! environment overrides.

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://tarifario.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string() },
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("failed to parse config file `{path}`: {source}")]
    Parse { path: String, source: toml::de::Error },
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database: Option<FileDatabase>,
    logging: Option<FileLogging>,
}

#[derive(Debug, Default, Deserialize)]
struct FileDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLogging {
    level: Option<String>,
}

impl EngineConfig {
    /// Load configuration, layering an optional TOML file and then the
    /// `TARIFARIO_*` environment variables over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = path {
            let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let file: FileConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
            config.apply_file(file);
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(database) = file.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
        }
    }

    fn apply_env(&mut self) {
        if let Ok(url) = env::var("TARIFARIO_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(value) = env::var("TARIFARIO_DB_MAX_CONNECTIONS") {
            if let Ok(max_connections) = value.parse() {
                self.database.max_connections = max_connections;
            }
        }
        if let Ok(level) = env::var("TARIFARIO_LOG_LEVEL") {
            self.logging.level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::EngineConfig;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[database]\nurl = \"sqlite::memory:\"\nmax_connections = 2\n\n[logging]\nlevel = \"debug\"\n"
        )
        .expect("write config");

        let config = EngineConfig::load(Some(file.path())).expect("load config");
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.database.timeout_secs, 30);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn missing_file_is_an_error() {
        let error = EngineConfig::load(Some(std::path::Path::new("/nonexistent/tarifario.toml")))
            .expect_err("missing file");
        assert!(error.to_string().contains("/nonexistent/tarifario.toml"));
    }
}
