//! Store configuration via `quire.toml`
//!
//! A directory-backed store reads its settings from `quire.toml` in the data
//! directory. On first open a default file is written; to change settings,
//! edit the file and reopen the store. In-memory stores use the defaults
//! unless a config is passed to the builder.

use quire_concurrency::RetryConfig;
use quire_core::{QuireError, QuireResult};
use quire_storage::{ContentSerializer, TableNames};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file name placed in the store's data directory.
pub const CONFIG_FILE_NAME: &str = "quire.toml";

/// Store configuration loaded from `quire.toml`.
///
/// # Example
///
/// ```toml
/// table_prefix = ""
/// content_serializer = "json"
/// id_block_size = 20
/// busy_timeout_ms = 5000
/// check_concurrency = false
///
/// [retry]
/// max_retries = 3
/// base_delay_ms = 10
/// max_delay_ms = 100
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Prefix prepended to every physical table name
    pub table_prefix: String,
    /// `"json"` or `"msgpack"`
    pub content_serializer: String,
    /// Identifiers reserved per round-trip to the `Identifiers` table
    pub id_block_size: u64,
    /// How long a connection waits for another writer's lock
    pub busy_timeout_ms: u64,
    /// Reject updates of documents modified since the session loaded them
    pub check_concurrency: bool,
    /// Commit retry budget on lock contention
    pub retry: RetryConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            content_serializer: ContentSerializer::Json.name().to_string(),
            id_block_size: 20,
            busy_timeout_ms: 5000,
            check_concurrency: false,
            retry: RetryConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Set the table prefix
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Set the content serializer
    pub fn with_content_serializer(mut self, serializer: ContentSerializer) -> Self {
        self.content_serializer = serializer.name().to_string();
        self
    }

    /// Set the identifier block size
    pub fn with_id_block_size(mut self, size: u64) -> Self {
        self.id_block_size = size;
        self
    }

    /// Enable or disable optimistic version checks
    pub fn with_check_concurrency(mut self, enabled: bool) -> Self {
        self.check_concurrency = enabled;
        self
    }

    /// Set the busy timeout
    pub fn with_busy_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.busy_timeout_ms = timeout_ms;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Parsed content serializer
    pub fn serializer(&self) -> QuireResult<ContentSerializer> {
        ContentSerializer::from_name(&self.content_serializer)
    }

    /// Table naming derived from the prefix
    pub fn table_names(&self) -> QuireResult<TableNames> {
        TableNames::new(self.table_prefix.clone())
    }

    /// Busy timeout as a duration
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Check every setting eagerly
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error for an unknown serializer, a zero
    /// block size, or a prefix that is not a valid identifier.
    pub fn validate(&self) -> QuireResult<()> {
        self.serializer()?;
        self.table_names()?;
        if self.id_block_size == 0 {
            return Err(QuireError::configuration("id_block_size must be at least 1"));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Quire store configuration

# Prefix prepended to every table name (document, identifiers, indexes)
table_prefix = ""

# Document content encoding: "json" (TEXT, human-readable) or "msgpack" (BLOB)
content_serializer = "json"

# Identifiers reserved per round-trip to the Identifiers table
id_block_size = 20

# Milliseconds a connection waits for another writer before giving up
busy_timeout_ms = 5000

# Reject updates of documents changed by another session since they were loaded
check_concurrency = false

# Commit retries on lock contention (exponential backoff)
[retry]
max_retries = 3
base_delay_ms = 10
max_delay_ms = 100
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> QuireResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StoreConfig = toml::from_str(&content).map_err(|e| {
            QuireError::configuration(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> QuireResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> QuireResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            QuireError::serialization(format!("failed to serialize config: {}", e))
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
