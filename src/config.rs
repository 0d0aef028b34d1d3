use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::{ConflictMode, EngineConfig};

/// Server settings, read from `GUESTHOUSE_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    /// WAL appends since the last compaction that trigger the next one.
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub op_timeout: Duration,
    pub conflict_mode: ConflictMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5433,
            data_dir: PathBuf::from("./data"),
            password: "guesthouse".into(),
            max_connections: 256,
            compact_threshold: 1000,
            metrics_port: None,
            tls_cert: None,
            tls_key: None,
            op_timeout: Duration::from_millis(5000),
            conflict_mode: ConflictMode::Overlap,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    Invalid { var: &'static str, value: String, reason: String },
    TlsPairIncomplete,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { var, value, reason } => {
                write!(f, "invalid {var}='{value}': {reason}")
            }
            ConfigError::TlsPairIncomplete => write!(
                f,
                "both GUESTHOUSE_TLS_CERT and GUESTHOUSE_TLS_KEY must be set, or neither"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid { var, reason: e.to_string(), value }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from any variable source; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let tls_cert = lookup("GUESTHOUSE_TLS_CERT");
        let tls_key = lookup("GUESTHOUSE_TLS_KEY");
        if tls_cert.is_some() != tls_key.is_some() {
            return Err(ConfigError::TlsPairIncomplete);
        }

        let max_connections = parsed(&lookup, "GUESTHOUSE_MAX_CONNECTIONS")?
            .unwrap_or(defaults.max_connections);
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "GUESTHOUSE_MAX_CONNECTIONS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            bind: lookup("GUESTHOUSE_BIND").unwrap_or(defaults.bind),
            port: parsed(&lookup, "GUESTHOUSE_PORT")?.unwrap_or(defaults.port),
            data_dir: lookup("GUESTHOUSE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            password: lookup("GUESTHOUSE_PASSWORD").unwrap_or(defaults.password),
            max_connections,
            compact_threshold: parsed(&lookup, "GUESTHOUSE_COMPACT_THRESHOLD")?
                .unwrap_or(defaults.compact_threshold),
            metrics_port: parsed(&lookup, "GUESTHOUSE_METRICS_PORT")?,
            tls_cert,
            tls_key,
            op_timeout: parsed(&lookup, "GUESTHOUSE_OP_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.op_timeout),
            conflict_mode: parsed(&lookup, "GUESTHOUSE_CONFLICT_MODE")?
                .unwrap_or(defaults.conflict_mode),
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            op_timeout: self.op_timeout,
            conflict_mode: self.conflict_mode,
        }
    }

    /// Certificate and key paths when TLS is configured.
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        self.tls_cert.as_deref().zip(self.tls_key.as_deref())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("guesthouse.wal")
    }
}
