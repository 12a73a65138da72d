//! Store handle and builder
//!
//! ```ignore
//! let store = Store::builder()
//!     .path("/data/blog")
//!     .register_indexes(BlogPostIndexProvider)?
//!     .open()?;
//! store.initialize().await?;
//!
//! let mut session = store.create_session()?;
//! session.save(&mut post).await?;
//! session.commit().await?;
//! ```

use quire_core::{QuireError, QuireResult};
use quire_storage::{
    ConnectionOptions, ContentSerializer, LinearBlockIdGenerator, SchemaBuilder, SqlStore,
    StorageLocation,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::{StoreConfig, CONFIG_FILE_NAME};
use crate::coordinator::{SessionCoordinator, StoreMetrics};
use crate::registry::{IndexProvider, IndexRegistry};
use crate::session::Session;

/// State shared by a store and all of its sessions
pub(crate) struct StoreInner {
    pub(crate) sql: SqlStore,
    pub(crate) config: StoreConfig,
    pub(crate) serializer: ContentSerializer,
    pub(crate) registry: IndexRegistry,
    pub(crate) ids: LinearBlockIdGenerator,
    pub(crate) coordinator: SessionCoordinator,
}

/// Builder for [`Store`]
///
/// Defaults to an in-memory database with default settings.
#[derive(Default)]
pub struct StoreBuilder {
    data_dir: Option<PathBuf>,
    config: Option<StoreConfig>,
    registry: IndexRegistry,
}

impl StoreBuilder {
    /// Create a builder for an in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a private in-memory database
    pub fn in_memory(mut self) -> Self {
        self.data_dir = None;
        self
    }

    /// Keep the database and `quire.toml` in `dir`
    pub fn path<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Use `config` instead of the defaults or the data directory's
    /// `quire.toml`
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Register the indexes declared by `provider`
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error for an incomplete reduce descriptor.
    pub fn register_indexes<P: IndexProvider>(mut self, provider: P) -> QuireResult<Self> {
        self.registry.register(&provider)?;
        Ok(self)
    }

    /// Open the store
    ///
    /// For a directory-backed store the directory is created if needed and
    /// `quire.toml` is written with defaults on first open, then read back.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the database
    /// cannot be opened.
    pub fn open(self) -> QuireResult<Store> {
        let (location, config) = match self.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(&dir)?;
                let config = match self.config {
                    Some(config) => config,
                    None => {
                        let path = dir.join(CONFIG_FILE_NAME);
                        StoreConfig::write_default_if_missing(&path)?;
                        StoreConfig::from_file(&path)?
                    }
                };
                (StorageLocation::in_directory(&dir), config)
            }
            None => (StorageLocation::Memory, self.config.unwrap_or_default()),
        };
        config.validate()?;

        let serializer = config.serializer()?;
        let options = ConnectionOptions {
            busy_timeout: config.busy_timeout(),
            names: config.table_names()?,
        };
        let sql = SqlStore::open(location, options)?;
        let ids = LinearBlockIdGenerator::new(
            Arc::clone(sql.anchor()),
            sql.names(),
            config.id_block_size,
        )?;

        info!(
            target: "quire::store",
            location = ?sql.location(),
            serializer = %serializer,
            table_prefix = %config.table_prefix,
            indexes = self.registry.len(),
            "Opened store"
        );

        Ok(Store {
            inner: Arc::new(StoreInner {
                sql,
                config,
                serializer,
                registry: self.registry,
                ids,
                coordinator: SessionCoordinator::new(),
            }),
        })
    }
}

/// A document store
///
/// Cheap to clone; clones share the database, the index registry and the
/// metrics.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Start configuring a store
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Create the document and identifier tables if they are missing
    ///
    /// Index tables are created by the application through
    /// [`Session::schema`].
    pub async fn initialize(&self) -> QuireResult<()> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || -> QuireResult<()> {
            let sql = &inner.sql;
            let names = sql.names();
            let (has_documents, has_identifiers) = {
                let conn = sql.anchor().lock();
                (
                    sql.catalog().exists(&conn, &names.document())?,
                    sql.catalog().exists(&conn, &names.identifiers())?,
                )
            };

            let mut schema = SchemaBuilder::new(
                Arc::clone(sql.anchor()),
                names.clone(),
                Arc::clone(sql.catalog()),
            );
            if !has_documents {
                schema.create_document_table()?;
            }
            if !has_identifiers {
                schema.create_identifiers_table()?;
            }
            info!(
                target: "quire::store",
                created_documents = !has_documents,
                created_identifiers = !has_identifiers,
                "Initialized store"
            );
            Ok(())
        })
        .await
        .map_err(|e| QuireError::storage(format!("initialize task failed: {}", e)))?
    }

    /// Open a new session
    ///
    /// File-backed stores give each session its own connection; in-memory
    /// sessions share the store's connection.
    pub fn create_session(&self) -> QuireResult<Session> {
        let conn = self.inner.sql.session_connection()?;
        Ok(Session::new(Arc::clone(&self.inner), conn))
    }

    /// Effective configuration
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Registered index descriptors
    pub fn registry(&self) -> &IndexRegistry {
        &self.inner.registry
    }

    /// Session lifecycle counters
    pub fn metrics(&self) -> StoreMetrics {
        self.inner.coordinator.metrics()
    }

    /// Database location
    pub fn location(&self) -> &StorageLocation {
        self.inner.sql.location()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("location", self.location())
            .field("serializer", &self.inner.serializer)
            .field("registry", &self.inner.registry)
            .finish()
    }
}
