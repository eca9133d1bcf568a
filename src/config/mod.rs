//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `LUMEN_*` environment variables.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::fmt::Display;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_AVG_TOKENS_PER_CALL, DEFAULT_CANDIDATE_WINDOW, DEFAULT_COST_PER_1K_TOKENS,
    DEFAULT_DAYS_UNUSED, DEFAULT_INITIAL_CONFIDENCE, DEFAULT_MIN_CONFIDENCE,
    DEFAULT_SEARCH_LIMIT, DEFAULT_SIMILARITY_THRESHOLD, DimConfig,
};
use crate::embedding::{
    DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_TIMEOUT, DEFAULT_EMBEDDING_URL,
    DEFAULT_MEMO_CAPACITY, HttpEmbedderConfig,
};
use crate::knowledge::StoreConfig;
use crate::lifecycle::{DEFAULT_MAINTENANCE_INTERVAL_SECS, MaintenanceConfig};
use crate::responder::{MaintenancePolicy, ResponderConfig};
use crate::storage::SnapshotFile;
use crate::upstream::{DEFAULT_UPSTREAM_MODEL, DEFAULT_UPSTREAM_TIMEOUT};

/// SQLite file name used when `LUMEN_DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_FILENAME: &str = "knowledge.db";
/// Whole-request budget for `POST /v1/responses`.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Where knowledge entries live.
pub enum BackendKind {
    /// In-process map with an rkyv snapshot in `storage_path`.
    #[default]
    Memory,
    /// SQLite database.
    Sqlite,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Sqlite => "sqlite",
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(ConfigError::UnknownBackend {
                value: s.to_string(),
            }),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `LUMEN_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Directory for the snapshot and default SQLite file. Default: `./.data`.
    pub storage_path: PathBuf,

    /// Storage backend. Default: memory.
    pub backend: BackendKind,

    /// SQLite URL; defaults to `sqlite://{storage_path}/knowledge.db`.
    pub database_url: Option<String>,

    /// Embedding endpoint base URL.
    pub embedding_url: String,

    /// Bearer token for the embedding endpoint.
    pub embedding_api_key: Option<String>,

    pub embedding_model: String,

    /// Pinned embedding dimension; learned from the first vector when unset.
    pub embedding_dim: Option<usize>,

    pub embedding_timeout: Duration,

    /// Model identifier passed to the generation client.
    pub upstream_model: String,

    pub upstream_timeout: Duration,

    /// Use the offline stub embedder and canned upstream. Default: `false`.
    pub mock_provider: bool,

    pub similarity_threshold: f32,

    pub search_limit: usize,

    /// Entries scored per lookup.
    pub candidate_window: usize,

    pub initial_confidence: f64,

    pub min_confidence: f64,

    pub days_unused: u32,

    pub maintenance_interval: Duration,

    pub maintenance_enabled: bool,

    pub avg_tokens_per_call: u64,

    pub cost_per_1k_tokens: f64,

    /// Max memoized query embeddings. Default: `10_000`.
    pub memo_capacity: u64,

    /// Deadline for one `POST /v1/responses` request.
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            storage_path: PathBuf::from("./.data"),
            backend: BackendKind::default(),
            database_url: None,
            embedding_url: DEFAULT_EMBEDDING_URL.to_string(),
            embedding_api_key: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dim: None,
            embedding_timeout: DEFAULT_EMBEDDING_TIMEOUT,
            upstream_model: DEFAULT_UPSTREAM_MODEL.to_string(),
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            mock_provider: false,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            search_limit: DEFAULT_SEARCH_LIMIT,
            candidate_window: DEFAULT_CANDIDATE_WINDOW,
            initial_confidence: DEFAULT_INITIAL_CONFIDENCE,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            days_unused: DEFAULT_DAYS_UNUSED,
            maintenance_interval: Duration::from_secs(DEFAULT_MAINTENANCE_INTERVAL_SECS),
            maintenance_enabled: true,
            avg_tokens_per_call: DEFAULT_AVG_TOKENS_PER_CALL,
            cost_per_1k_tokens: DEFAULT_COST_PER_1K_TOKENS,
            memo_capacity: DEFAULT_MEMO_CAPACITY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "LUMEN_PORT";
    const ENV_BIND_ADDR: &'static str = "LUMEN_BIND_ADDR";
    const ENV_STORAGE_PATH: &'static str = "LUMEN_STORAGE_PATH";
    const ENV_BACKEND: &'static str = "LUMEN_BACKEND";
    const ENV_DATABASE_URL: &'static str = "LUMEN_DATABASE_URL";
    const ENV_EMBEDDING_URL: &'static str = "LUMEN_EMBEDDING_URL";
    const ENV_EMBEDDING_API_KEY: &'static str = "LUMEN_EMBEDDING_API_KEY";
    const ENV_EMBEDDING_MODEL: &'static str = "LUMEN_EMBEDDING_MODEL";
    const ENV_EMBEDDING_DIM: &'static str = "LUMEN_EMBEDDING_DIM";
    const ENV_EMBEDDING_TIMEOUT_MS: &'static str = "LUMEN_EMBEDDING_TIMEOUT_MS";
    const ENV_UPSTREAM_MODEL: &'static str = "LUMEN_UPSTREAM_MODEL";
    const ENV_UPSTREAM_TIMEOUT_SECS: &'static str = "LUMEN_UPSTREAM_TIMEOUT_SECS";
    const ENV_MOCK_PROVIDER: &'static str = "LUMEN_MOCK_PROVIDER";
    const ENV_SIMILARITY_THRESHOLD: &'static str = "LUMEN_SIMILARITY_THRESHOLD";
    const ENV_SEARCH_LIMIT: &'static str = "LUMEN_SEARCH_LIMIT";
    const ENV_CANDIDATE_WINDOW: &'static str = "LUMEN_CANDIDATE_WINDOW";
    const ENV_INITIAL_CONFIDENCE: &'static str = "LUMEN_INITIAL_CONFIDENCE";
    const ENV_MIN_CONFIDENCE: &'static str = "LUMEN_MIN_CONFIDENCE";
    const ENV_DAYS_UNUSED: &'static str = "LUMEN_DAYS_UNUSED";
    const ENV_MAINTENANCE_INTERVAL_SECS: &'static str = "LUMEN_MAINTENANCE_INTERVAL_SECS";
    const ENV_MAINTENANCE_ENABLED: &'static str = "LUMEN_MAINTENANCE_ENABLED";
    const ENV_AVG_TOKENS_PER_CALL: &'static str = "LUMEN_AVG_TOKENS_PER_CALL";
    const ENV_COST_PER_1K_TOKENS: &'static str = "LUMEN_COST_PER_1K_TOKENS";
    const ENV_MEMO_CAPACITY: &'static str = "LUMEN_MEMO_CAPACITY";
    const ENV_REQUEST_TIMEOUT_SECS: &'static str = "LUMEN_REQUEST_TIMEOUT_SECS";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let storage_path = Self::parse_path_from_env(Self::ENV_STORAGE_PATH, defaults.storage_path);
        let backend = match Self::parse_optional_string_from_env(Self::ENV_BACKEND) {
            Some(value) => value.parse()?,
            None => defaults.backend,
        };
        let database_url = Self::parse_optional_string_from_env(Self::ENV_DATABASE_URL);

        let embedding_url =
            Self::parse_string_from_env(Self::ENV_EMBEDDING_URL, defaults.embedding_url);
        let embedding_api_key = Self::parse_optional_string_from_env(Self::ENV_EMBEDDING_API_KEY);
        let embedding_model =
            Self::parse_string_from_env(Self::ENV_EMBEDDING_MODEL, defaults.embedding_model);
        let embedding_dim = match Self::parse_optional_string_from_env(Self::ENV_EMBEDDING_DIM) {
            Some(value) => Some(Self::parse_value(Self::ENV_EMBEDDING_DIM, &value)?),
            None => defaults.embedding_dim,
        };
        let embedding_timeout = Duration::from_millis(Self::parse_from_env(
            Self::ENV_EMBEDDING_TIMEOUT_MS,
            defaults.embedding_timeout.as_millis() as u64,
        )?);

        let upstream_model =
            Self::parse_string_from_env(Self::ENV_UPSTREAM_MODEL, defaults.upstream_model);
        let upstream_timeout = Duration::from_secs(Self::parse_from_env(
            Self::ENV_UPSTREAM_TIMEOUT_SECS,
            defaults.upstream_timeout.as_secs(),
        )?);
        let mock_provider = Self::parse_bool_from_env(Self::ENV_MOCK_PROVIDER, defaults.mock_provider);

        let similarity_threshold =
            Self::parse_from_env(Self::ENV_SIMILARITY_THRESHOLD, defaults.similarity_threshold)?;
        let search_limit = Self::parse_from_env(Self::ENV_SEARCH_LIMIT, defaults.search_limit)?;
        let candidate_window =
            Self::parse_from_env(Self::ENV_CANDIDATE_WINDOW, defaults.candidate_window)?;
        let initial_confidence =
            Self::parse_from_env(Self::ENV_INITIAL_CONFIDENCE, defaults.initial_confidence)?;
        let min_confidence =
            Self::parse_from_env(Self::ENV_MIN_CONFIDENCE, defaults.min_confidence)?;
        let days_unused = Self::parse_from_env(Self::ENV_DAYS_UNUSED, defaults.days_unused)?;
        let maintenance_interval = Duration::from_secs(Self::parse_from_env(
            Self::ENV_MAINTENANCE_INTERVAL_SECS,
            defaults.maintenance_interval.as_secs(),
        )?);
        let maintenance_enabled =
            Self::parse_bool_from_env(Self::ENV_MAINTENANCE_ENABLED, defaults.maintenance_enabled);

        let avg_tokens_per_call =
            Self::parse_from_env(Self::ENV_AVG_TOKENS_PER_CALL, defaults.avg_tokens_per_call)?;
        let cost_per_1k_tokens =
            Self::parse_from_env(Self::ENV_COST_PER_1K_TOKENS, defaults.cost_per_1k_tokens)?;
        let memo_capacity = Self::parse_from_env(Self::ENV_MEMO_CAPACITY, defaults.memo_capacity)?;
        let request_timeout = Duration::from_secs(Self::parse_from_env(
            Self::ENV_REQUEST_TIMEOUT_SECS,
            defaults.request_timeout.as_secs(),
        )?);

        Ok(Self {
            port,
            bind_addr,
            storage_path,
            backend,
            database_url,
            embedding_url,
            embedding_api_key,
            embedding_model,
            embedding_dim,
            embedding_timeout,
            upstream_model,
            upstream_timeout,
            mock_provider,
            similarity_threshold,
            search_limit,
            candidate_window,
            initial_confidence,
            min_confidence,
            days_unused,
            maintenance_interval,
            maintenance_enabled,
            avg_tokens_per_call,
            cost_per_1k_tokens,
            memo_capacity,
            request_timeout,
        })
    }

    /// Validates paths and value ranges (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_path.exists() && !self.storage_path.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.storage_path.clone(),
            });
        }

        if let Some(dim) = self.embedding_dim {
            DimConfig::new(dim)
                .validate()
                .map_err(|_| Self::out_of_range(Self::ENV_EMBEDDING_DIM, dim, "> 0"))?;
        }
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Self::out_of_range(
                Self::ENV_SIMILARITY_THRESHOLD,
                self.similarity_threshold,
                "[-1, 1]",
            ));
        }
        for (name, value) in [
            (Self::ENV_INITIAL_CONFIDENCE, self.initial_confidence),
            (Self::ENV_MIN_CONFIDENCE, self.min_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Self::out_of_range(name, value, "[0, 1]"));
            }
        }
        for (name, value) in [
            (Self::ENV_SEARCH_LIMIT, self.search_limit),
            (Self::ENV_CANDIDATE_WINDOW, self.candidate_window),
        ] {
            if value == 0 {
                return Err(Self::out_of_range(name, value, "> 0"));
            }
        }
        if self.memo_capacity == 0 {
            return Err(Self::out_of_range(Self::ENV_MEMO_CAPACITY, self.memo_capacity, "> 0"));
        }
        if !self.cost_per_1k_tokens.is_finite() || self.cost_per_1k_tokens < 0.0 {
            return Err(Self::out_of_range(
                Self::ENV_COST_PER_1K_TOKENS,
                self.cost_per_1k_tokens,
                ">= 0",
            ));
        }
        for (name, value) in [
            (Self::ENV_EMBEDDING_TIMEOUT_MS, self.embedding_timeout),
            (Self::ENV_UPSTREAM_TIMEOUT_SECS, self.upstream_timeout),
            (Self::ENV_REQUEST_TIMEOUT_SECS, self.request_timeout),
        ] {
            if value.is_zero() {
                return Err(Self::out_of_range(name, 0, "> 0"));
            }
        }
        if self.maintenance_enabled && self.maintenance_interval.is_zero() {
            return Err(Self::out_of_range(
                Self::ENV_MAINTENANCE_INTERVAL_SECS,
                0,
                "> 0 while maintenance is enabled",
            ));
        }

        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// SQLite URL, derived from `storage_path` unless set explicitly.
    pub fn database_url(&self) -> String {
        match &self.database_url {
            Some(url) => url.clone(),
            None => format!(
                "sqlite://{}",
                self.storage_path.join(DEFAULT_DATABASE_FILENAME).display()
            ),
        }
    }

    pub fn snapshot_file(&self) -> SnapshotFile {
        SnapshotFile::in_dir(&self.storage_path)
    }

    pub fn store_config(&self) -> StoreConfig {
        let config = StoreConfig::default()
            .candidate_window(self.candidate_window)
            .embed_timeout(self.embedding_timeout);
        match self.embedding_dim {
            Some(dim) => config.embedding_dim(dim),
            None => config,
        }
    }

    pub fn responder_config(&self) -> ResponderConfig {
        ResponderConfig::default()
            .similarity_threshold(self.similarity_threshold)
            .search_limit(self.search_limit)
            .initial_confidence(self.initial_confidence)
            .cost_model(self.avg_tokens_per_call, self.cost_per_1k_tokens)
            .maintenance(MaintenancePolicy {
                min_confidence: self.min_confidence,
                days_unused: self.days_unused,
            })
    }

    pub fn maintenance_config(&self) -> MaintenanceConfig {
        MaintenanceConfig::default()
            .interval(self.maintenance_interval)
            .enabled(self.maintenance_enabled)
    }

    pub fn http_embedder_config(&self) -> HttpEmbedderConfig {
        HttpEmbedderConfig {
            base_url: self.embedding_url.clone(),
            api_key: self.embedding_api_key.clone(),
            model: self.embedding_model.clone(),
            dimensions: self.embedding_dim,
            timeout: self.embedding_timeout,
        }
    }

    fn out_of_range(name: &'static str, value: impl Display, expected: &'static str) -> ConfigError {
        ConfigError::OutOfRange {
            name,
            value: value.to_string(),
            expected,
        }
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_bool_from_env(var_name: &str, default: bool) -> bool {
        env::var(var_name)
            .map(|s| {
                let s = s.trim().to_lowercase();
                s != "false" && s != "0" && s != "no" && s != "off"
            })
            .unwrap_or(default)
    }

    fn parse_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match Self::parse_optional_string_from_env(var_name) {
            Some(value) => Self::parse_value(var_name, &value),
            None => Ok(default),
        }
    }

    fn parse_value<T>(var_name: &'static str, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            name: var_name,
            value: value.to_string(),
            reason: e.to_string(),
        })
    }
}
