use crate::pipeline::WorkerConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(rename = "type", default = "default_storage_type")]
    pub storage_type: String,
    /// Full postgres connection URL. Takes precedence over the individual fields.
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// SQLite database file.
    #[serde(default = "default_sqlite_path")]
    pub path: String,
    #[serde(default)]
    pub pool: PoolConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: default_storage_type(),
            url: None,
            host: None,
            port: None,
            database: None,
            user: None,
            password: None,
            path: default_sqlite_path(),
            pool: PoolConfig::default(),
        }
    }
}

fn default_storage_type() -> String {
    "sqlite".to_string()
}

fn default_sqlite_path() -> String {
    "clickstat.db".to_string()
}

impl StorageConfig {
    /// Connection URL for the postgres backend.
    pub fn postgres_url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let host = self.host.as_deref().context("Postgres storage requires 'host'")?;
        let database = self
            .database
            .as_deref()
            .context("Postgres storage requires 'database'")?;
        let user = self.user.as_deref().context("Postgres storage requires 'user'")?;
        let password = self.password.as_deref().unwrap_or_default();

        Ok(format!(
            "postgres://{}:{}@{}:{}/{}",
            user,
            password,
            host,
            self.port.unwrap_or(5432),
            database
        ))
    }
}

/// Connection pool limits shared by the flush and query paths.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub min_connections: u32,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    #[serde(default = "default_connection_ttl_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_connection_ttl_secs")]
    pub max_lifetime_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: 0,
            acquire_timeout_ms: default_acquire_timeout_ms(),
            idle_timeout_secs: default_connection_ttl_secs(),
            max_lifetime_secs: default_connection_ttl_secs(),
        }
    }
}

fn default_max_connections() -> u32 {
    25
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_connection_ttl_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub flush_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            flush_timeout_ms: default_timeout_ms(),
            shutdown_grace_ms: default_timeout_ms(),
        }
    }
}

fn default_queue_capacity() -> usize {
    crate::pipeline::DEFAULT_QUEUE_CAPACITY
}

fn default_batch_size() -> usize {
    100
}

fn default_flush_interval_ms() -> u64 {
    1_000
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl PipelineConfig {
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            batch_size: self.batch_size,
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            flush_timeout: Duration::from_millis(self.flush_timeout_ms),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl AppConfig {
    /// Load configuration from an optional file and environment variables.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Add environment variables with prefix CLICKSTAT_
        // Example: CLICKSTAT_SERVER__PORT=8080, CLICKSTAT_PIPELINE__BATCH_SIZE=500
        builder = builder.add_source(
            config::Environment::with_prefix("CLICKSTAT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.storage.storage_type.as_str() {
            "postgres" => {
                if self.storage.url.is_none() {
                    if self.storage.host.is_none() {
                        anyhow::bail!("Postgres storage requires 'host'");
                    }
                    if self.storage.database.is_none() {
                        anyhow::bail!("Postgres storage requires 'database'");
                    }
                    if self.storage.user.is_none() {
                        anyhow::bail!("Postgres storage requires 'user'");
                    }
                }
            }
            "sqlite" => {
                if self.storage.path.trim().is_empty() {
                    anyhow::bail!("SQLite storage requires 'path'");
                }
            }
            _ => anyhow::bail!("Invalid storage type: {}", self.storage.storage_type),
        }

        if self.storage.pool.max_connections == 0 {
            anyhow::bail!("storage.pool.max_connections must be at least 1");
        }

        let pipeline = &self.pipeline;
        if pipeline.queue_capacity == 0 {
            anyhow::bail!("pipeline.queue_capacity must be at least 1");
        }
        if pipeline.batch_size == 0 {
            anyhow::bail!("pipeline.batch_size must be at least 1");
        }
        if pipeline.flush_interval_ms == 0 {
            anyhow::bail!("pipeline.flush_interval_ms must be positive");
        }
        if pipeline.flush_timeout_ms == 0 {
            anyhow::bail!("pipeline.flush_timeout_ms must be positive");
        }

        Ok(())
    }
}
