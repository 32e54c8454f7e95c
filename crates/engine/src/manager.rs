//! PersistenceManager: the public entry point
//!
//! The manager owns the metadata registry and a context factory. Every
//! call looks up the entity metadata, builds one context and runs one
//! operation on it.
//!
//! ```ignore
//! let mut registry = MetaRegistry::new();
//! registry.register::<User>(user_meta);
//! let manager = PersistenceManager::new(registry, Arc::new(MemoryStore::new()), defaults);
//!
//! let mut proxy = manager.persist(user)?;
//! proxy.set("name", "alice")?;
//! let mut managed: Managed<User> = proxy.into();
//! manager.update(&mut managed)?;
//! ```

use std::collections::HashSet;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use wideorm_core::{Entity, EntityMeta, Error, GlobalDefaults, MetaRegistry, Options, Result};
use wideorm_storage::StatementExecutor;

use crate::config::WideOrmConfig;
use crate::context::PersistenceContextFactory;
use crate::options::OperationKind;
use crate::proxy::{EntityProxifier, EntityProxy, Managed};
use crate::slice::{IndexCondition, SliceQueryBuilder};
use crate::validator::{EntityValidator, StructuralValidator};

/// Facade over metadata, contexts and the executor
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    registry: Arc<MetaRegistry>,
    factory: PersistenceContextFactory,
    proxifier: EntityProxifier,
}

impl PersistenceManager {
    /// Manager with the structural validator
    pub fn new(
        registry: MetaRegistry,
        executor: Arc<dyn StatementExecutor>,
        defaults: GlobalDefaults,
    ) -> Self {
        Self::with_validator(registry, executor, Arc::new(StructuralValidator), defaults)
    }

    /// Manager with a custom validator
    pub fn with_validator(
        registry: MetaRegistry,
        executor: Arc<dyn StatementExecutor>,
        validator: Arc<dyn EntityValidator>,
        defaults: GlobalDefaults,
    ) -> Self {
        debug!(target: "wideorm::context", entities = registry.len(), "persistence manager created");
        Self {
            registry: Arc::new(registry),
            factory: PersistenceContextFactory::new(executor, validator, defaults),
            proxifier: EntityProxifier,
        }
    }

    /// Manager whose global defaults come from a config file
    ///
    /// A missing file is created with the default content first.
    pub fn from_config(
        registry: MetaRegistry,
        executor: Arc<dyn StatementExecutor>,
        path: &Path,
    ) -> Result<Self> {
        WideOrmConfig::write_default_if_missing(path)?;
        let config = WideOrmConfig::from_file(path)?;
        let defaults = config.defaults()?;
        info!(target: "wideorm::config", path = %path.display(), "loaded persistence defaults");
        Ok(Self::new(registry, executor, defaults))
    }

    /// Global defaults in effect
    pub fn defaults(&self) -> &GlobalDefaults {
        self.factory.resolver().global()
    }

    /// Metadata registry
    pub fn registry(&self) -> &MetaRegistry {
        &self.registry
    }

    fn meta<E: Entity>(&self) -> Result<Arc<EntityMeta>> {
        self.registry.get::<E>()
    }

    // ========================================================================
    // Entity operations
    // ========================================================================

    /// Insert a plain entity and return it as a proxy
    pub fn persist<E: Entity>(&self, entity: E) -> Result<EntityProxy<E>> {
        self.persist_with(entity, Options::new())
    }

    /// [`persist`](Self::persist) with explicit options
    pub fn persist_with<E: Entity>(&self, entity: E, options: Options) -> Result<EntityProxy<E>> {
        let mut managed = Managed::NonProxy(entity);
        self.factory
            .entity_context(self.meta::<E>()?, &mut managed, options)
            .persist()
    }

    /// Flush the changes of a proxy
    pub fn update<E: Entity>(&self, entity: &mut Managed<E>) -> Result<()> {
        self.update_with(entity, Options::new())
    }

    /// [`update`](Self::update) with explicit options
    pub fn update_with<E: Entity>(&self, entity: &mut Managed<E>, options: Options) -> Result<()> {
        self.factory
            .entity_context(self.meta::<E>()?, entity, options)
            .update()
    }

    /// Delete an entity, plain or proxied
    pub fn remove<E: Entity>(&self, entity: Managed<E>) -> Result<()> {
        self.remove_with(entity, Options::new())
    }

    /// [`remove`](Self::remove) with explicit options
    pub fn remove_with<E: Entity>(&self, mut entity: Managed<E>, options: Options) -> Result<()> {
        self.factory
            .entity_context(self.meta::<E>()?, &mut entity, options)
            .remove()
    }

    /// Delete by primary key
    pub fn remove_by_id<E: Entity>(&self, key: E::Key) -> Result<()> {
        self.remove_by_id_with::<E>(key, Options::new())
    }

    /// [`remove_by_id`](Self::remove_by_id) with explicit options
    pub fn remove_by_id_with<E: Entity>(&self, key: E::Key, options: Options) -> Result<()> {
        self.factory
            .key_context::<E>(self.meta::<E>()?, Some(key), options)
            .remove_by_id()
    }

    /// Read an entity with all fields loaded
    pub fn find<E: Entity>(&self, key: E::Key) -> Result<Option<EntityProxy<E>>> {
        self.find_with::<E>(key, Options::new())
    }

    /// [`find`](Self::find) with explicit options
    pub fn find_with<E: Entity>(
        &self,
        key: E::Key,
        options: Options,
    ) -> Result<Option<EntityProxy<E>>> {
        self.factory
            .key_context::<E>(self.meta::<E>()?, Some(key), options)
            .find()
    }

    /// Proxy that loads fields on first access
    pub fn get_proxy<E: Entity>(&self, key: E::Key) -> Result<Option<EntityProxy<E>>> {
        self.get_proxy_with::<E>(key, Options::new())
    }

    /// [`get_proxy`](Self::get_proxy) with explicit options
    pub fn get_proxy_with<E: Entity>(
        &self,
        key: E::Key,
        options: Options,
    ) -> Result<Option<EntityProxy<E>>> {
        self.factory
            .key_context::<E>(self.meta::<E>()?, Some(key), options)
            .get_proxy()
    }

    /// Reload a proxy from the store, dropping pending changes
    pub fn refresh<E: Entity>(&self, entity: &mut Managed<E>) -> Result<()> {
        self.refresh_with(entity, Options::new())
    }

    /// [`refresh`](Self::refresh) with explicit options
    pub fn refresh_with<E: Entity>(&self, entity: &mut Managed<E>, options: Options) -> Result<()> {
        self.factory
            .entity_context(self.meta::<E>()?, entity, options)
            .refresh()
    }

    // ========================================================================
    // Proxy helpers
    // ========================================================================

    /// Load every unloaded field of a proxy
    pub fn initialize<E: Entity>(&self, entity: &mut Managed<E>) -> Result<()> {
        self.factory
            .entity_context(self.meta::<E>()?, entity, Options::new())
            .initialize()
    }

    /// [`initialize`](Self::initialize) for several proxies
    pub fn initialize_all<'e, E, I>(&self, entities: I) -> Result<()>
    where
        E: Entity,
        I: IntoIterator<Item = &'e mut Managed<E>>,
    {
        let meta = self.meta::<E>()?;
        for entity in entities {
            self.factory
                .entity_context(Arc::clone(&meta), entity, Options::new())
                .initialize()?;
        }
        Ok(())
    }

    /// Unwrap a proxy; plain entities pass through
    pub fn remove_proxy<E: Entity>(&self, entity: Managed<E>) -> E {
        self.proxifier.remove_proxy(entity)
    }

    /// Unwrap proxies, keeping order
    pub fn remove_proxy_list<E: Entity>(&self, entities: Vec<Managed<E>>) -> Vec<E> {
        self.proxifier.remove_proxy_list(entities)
    }

    /// Unwrap proxies into a set
    pub fn remove_proxy_set<E>(&self, entities: Vec<Managed<E>>) -> HashSet<E>
    where
        E: Entity + Eq + Hash,
    {
        self.proxifier.remove_proxy_set(entities)
    }

    /// Load every field, then unwrap
    pub fn init_and_remove_proxy<E: Entity>(&self, mut entity: Managed<E>) -> Result<E> {
        if entity.is_proxy() {
            self.initialize(&mut entity)?;
        }
        Ok(self.proxifier.remove_proxy(entity))
    }

    /// [`init_and_remove_proxy`](Self::init_and_remove_proxy) for a list
    pub fn init_and_remove_proxy_list<E: Entity>(&self, entities: Vec<Managed<E>>) -> Result<Vec<E>> {
        entities
            .into_iter()
            .map(|entity| self.init_and_remove_proxy(entity))
            .collect()
    }

    /// [`init_and_remove_proxy`](Self::init_and_remove_proxy) into a set
    pub fn init_and_remove_proxy_set<E>(&self, entities: Vec<Managed<E>>) -> Result<HashSet<E>>
    where
        E: Entity + Eq + Hash,
    {
        entities
            .into_iter()
            .map(|entity| self.init_and_remove_proxy(entity))
            .collect()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Start a slice query over a clustered entity
    ///
    /// # Errors
    ///
    /// Returns `Validation` when `E` has no clustering components.
    pub fn slice_query<E: Entity>(&self) -> Result<SliceQueryBuilder<'_, E>> {
        let meta = self.meta::<E>()?;
        if !meta.is_clustered() {
            return Err(Error::validation(format!(
                "'{}' has no clustering key; slice queries need one",
                meta.entity_name()
            )));
        }
        Ok(SliceQueryBuilder::new(&self.factory, meta))
    }

    /// Entities whose indexed column equals a value
    pub fn indexed_query<E: Entity>(&self, condition: IndexCondition) -> Result<Vec<EntityProxy<E>>> {
        self.indexed_query_with(condition, Options::new())
    }

    /// [`indexed_query`](Self::indexed_query) with explicit options
    ///
    /// # Errors
    ///
    /// Returns `Validation` for clustered entities, unknown or counter
    /// columns, and null values.
    pub fn indexed_query_with<E: Entity>(
        &self,
        condition: IndexCondition,
        options: Options,
    ) -> Result<Vec<EntityProxy<E>>> {
        let meta = self.meta::<E>()?;
        if meta.is_clustered() {
            return Err(Error::validation(format!(
                "indexed queries are not supported on clustered entity '{}'",
                meta.entity_name()
            )));
        }
        let property = meta
            .property(&condition.column)
            .filter(|p| !p.is_counter())
            .ok_or_else(|| {
                Error::validation(format!(
                    "'{}' is not an indexable column of '{}'",
                    condition.column,
                    meta.entity_name()
                ))
            })?
            .clone();

        let core = self.factory.core(Arc::clone(&meta), options);
        let resolved = core.resolve(OperationKind::Read)?;
        let rows = self
            .factory
            .slices()
            .index_lookup(meta.table_name(), &property, &condition.value, &resolved)?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let key: E::Key = core.decode_row_key(&row.row_key)?;
            if let Some(entity) = core.materialize::<E>(key, &row.columns)? {
                results.push(core.wrap_loaded(entity)?);
            }
        }
        debug!(
            target: "wideorm::context",
            entity = meta.entity_name(),
            results = results.len(),
            "indexed query"
        );
        Ok(results)
    }
}
