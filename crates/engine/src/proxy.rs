//! Entity proxies
//!
//! A managed entity is either a plain value or a proxy around one. The
//! proxy owns the entity and tracks, per field, whether it was loaded from
//! the store and whether it was changed since. Unloaded fields are fetched
//! through a [`FieldLoader`] on first access; counters are never cached and
//! always read through.
//!
//! ## State transitions
//!
//! ```text
//! NonProxy --persist/find/get_proxy--> Proxy --remove_proxy--> NonProxy
//!                                        |
//!                                        +-- set / increment: field dirty
//!                                        +-- update: dirty cleared
//!                                        +-- refresh: reloaded, dirty cleared
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use wideorm_core::{Entity, EntityMeta, Error, KeyValue, PropertyMeta, Result, Value};

/// Loads field values for a proxy
pub trait FieldLoader: Send + Sync {
    /// Load several non-counter fields of the row identified by `key`
    ///
    /// Returns one value per property, in order, `Value::Null` for an
    /// absent column.
    fn load_fields(&self, key: &[Value], properties: &[&PropertyMeta]) -> Result<Vec<Value>>;

    /// Current value of a counter field
    fn read_counter(&self, key: &[Value], property: &PropertyMeta) -> Result<Option<i64>>;
}

// ============================================================================
// EntityProxy
// ============================================================================

/// Lazy-loading, dirty-tracking wrapper around one entity
#[derive(Clone)]
pub struct EntityProxy<E: Entity> {
    target: E,
    meta: Arc<EntityMeta>,
    loaded: HashSet<String>,
    dirty: HashSet<String>,
    counter_deltas: BTreeMap<String, i64>,
    loader: Arc<dyn FieldLoader>,
}

impl<E: Entity> fmt::Debug for EntityProxy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityProxy")
            .field("entity", &self.meta.entity_name())
            .field("target", &self.target)
            .field("loaded", &self.loaded)
            .field("dirty", &self.dirty)
            .field("counter_deltas", &self.counter_deltas)
            .finish()
    }
}

impl<E: Entity> EntityProxy<E> {
    pub(crate) fn new(
        target: E,
        meta: Arc<EntityMeta>,
        loaded: HashSet<String>,
        loader: Arc<dyn FieldLoader>,
    ) -> Self {
        Self {
            target,
            meta,
            loaded,
            dirty: HashSet::new(),
            counter_deltas: BTreeMap::new(),
            loader,
        }
    }

    /// Wrapped entity, as far as it is loaded
    pub fn target(&self) -> &E {
        &self.target
    }

    /// Entity metadata
    pub fn meta(&self) -> &Arc<EntityMeta> {
        &self.meta
    }

    /// Primary key of the wrapped entity
    pub fn key(&self) -> Option<E::Key> {
        self.target.key()
    }

    /// Read a field, loading it first if needed
    ///
    /// Counter fields are read from the store on every call and do not
    /// include pending increments.
    pub fn get(&mut self, field: &str) -> Result<Value> {
        let property = self.property(field)?.clone();
        if property.is_counter() {
            let key = self.key_values()?;
            return Ok(self
                .loader
                .read_counter(&key, &property)?
                .map_or(Value::Null, Value::Long));
        }
        if !self.loaded.contains(field) {
            let key = self.key_values()?;
            let mut values = self.loader.load_fields(&key, &[&property])?;
            let value = values.pop().unwrap_or(Value::Null);
            self.target.set_field(field, value)?;
            self.loaded.insert(field.to_string());
        }
        Ok(self.target.get_field(field))
    }

    /// Write a field and mark it dirty
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let property = self.property(field)?;
        if property.is_counter() {
            return Err(Error::validation(format!(
                "counter '{}' can only be incremented",
                field
            )));
        }
        self.target.set_field(field, value.into())?;
        self.loaded.insert(field.to_string());
        self.dirty.insert(field.to_string());
        Ok(())
    }

    /// Record a pending counter increment
    pub fn increment(&mut self, counter: &str, delta: i64) -> Result<()> {
        if !self.property(counter)?.is_counter() {
            return Err(Error::validation(format!("'{}' is not a counter", counter)));
        }
        let pending = self.counter_deltas.entry(counter.to_string()).or_insert(0);
        *pending = pending.saturating_add(delta);
        Ok(())
    }

    /// True once the field has been loaded or set
    pub fn is_loaded(&self, field: &str) -> bool {
        self.loaded.contains(field)
    }

    /// True when the field was set since the last load or flush
    pub fn is_dirty(&self, field: &str) -> bool {
        self.dirty.contains(field)
    }

    /// Names of loaded fields
    pub fn loaded_fields(&self) -> &HashSet<String> {
        &self.loaded
    }

    /// Names of dirty fields
    pub fn dirty_fields(&self) -> &HashSet<String> {
        &self.dirty
    }

    /// Increments not yet flushed
    pub fn pending_counter_deltas(&self) -> &BTreeMap<String, i64> {
        &self.counter_deltas
    }

    /// True when an update would issue statements
    pub fn has_changes(&self) -> bool {
        !self.dirty.is_empty() || self.counter_deltas.values().any(|d| *d != 0)
    }

    /// Load every non-counter field not loaded yet, in one read
    pub fn initialize(&mut self) -> Result<()> {
        let meta = Arc::clone(&self.meta);
        let missing: Vec<&PropertyMeta> = meta
            .properties()
            .iter()
            .filter(|p| !p.is_counter() && !self.loaded.contains(p.name()))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let key = self.key_values()?;
        let values = self.loader.load_fields(&key, &missing)?;
        for (property, value) in missing.iter().zip(values) {
            self.target.set_field(property.name(), value)?;
            self.loaded.insert(property.name().to_string());
        }
        Ok(())
    }

    /// Unwrap the entity
    pub fn into_target(self) -> E {
        self.target
    }

    pub(crate) fn take_changes(&mut self) -> (HashSet<String>, BTreeMap<String, i64>) {
        (
            std::mem::take(&mut self.dirty),
            std::mem::take(&mut self.counter_deltas),
        )
    }

    pub(crate) fn reset(&mut self, target: E, loaded: HashSet<String>) {
        self.target = target;
        self.loaded = loaded;
        self.dirty.clear();
        self.counter_deltas.clear();
    }

    fn property(&self, field: &str) -> Result<&PropertyMeta> {
        self.meta.property(field).ok_or_else(|| {
            Error::validation(format!(
                "'{}' is not a mapped property of '{}'",
                field,
                self.meta.entity_name()
            ))
        })
    }

    fn key_values(&self) -> Result<Vec<Value>> {
        self.target
            .key()
            .map(|k| k.decompose())
            .ok_or_else(|| Error::validation("proxy target has no primary key"))
    }
}

// ============================================================================
// Managed
// ============================================================================

/// An entity as the caller holds it: plain, or wrapped in a proxy
#[derive(Debug, Clone)]
pub enum Managed<E: Entity> {
    /// Plain entity, not tracked
    NonProxy(E),
    /// Tracked entity
    Proxy(EntityProxy<E>),
}

impl<E: Entity> Managed<E> {
    /// State name, as used in errors
    pub fn state_name(&self) -> &'static str {
        match self {
            Managed::NonProxy(_) => "NonProxy",
            Managed::Proxy(_) => "Proxy",
        }
    }

    /// True for the proxy state
    pub fn is_proxy(&self) -> bool {
        matches!(self, Managed::Proxy(_))
    }

    /// Proxy, when in the proxy state
    pub fn as_proxy_mut(&mut self) -> Option<&mut EntityProxy<E>> {
        match self {
            Managed::Proxy(proxy) => Some(proxy),
            Managed::NonProxy(_) => None,
        }
    }
}

impl<E: Entity> From<E> for Managed<E> {
    fn from(entity: E) -> Self {
        Managed::NonProxy(entity)
    }
}

impl<E: Entity> From<EntityProxy<E>> for Managed<E> {
    fn from(proxy: EntityProxy<E>) -> Self {
        Managed::Proxy(proxy)
    }
}

// ============================================================================
// EntityProxifier
// ============================================================================

/// Proxy state checks, wrapping and unwrapping
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityProxifier;

impl EntityProxifier {
    /// Fail unless the entity is plain
    pub fn ensure_not_proxy<E: Entity>(&self, entity: &Managed<E>) -> Result<()> {
        match entity {
            Managed::NonProxy(_) => Ok(()),
            Managed::Proxy(_) => Err(Error::UnexpectedProxyState {
                expected: "NonProxy",
                actual: entity.state_name(),
            }),
        }
    }

    /// Fail unless the entity is a proxy
    pub fn ensure_proxy<E: Entity>(&self, entity: &Managed<E>) -> Result<()> {
        match entity {
            Managed::Proxy(_) => Ok(()),
            Managed::NonProxy(_) => Err(Error::UnexpectedProxyState {
                expected: "Proxy",
                actual: entity.state_name(),
            }),
        }
    }

    /// The proxy inside, failing unless the entity is one
    pub fn proxy_mut<'a, E: Entity>(
        &self,
        entity: &'a mut Managed<E>,
    ) -> Result<&'a mut EntityProxy<E>> {
        match entity {
            Managed::Proxy(proxy) => Ok(proxy),
            Managed::NonProxy(_) => Err(Error::UnexpectedProxyState {
                expected: "Proxy",
                actual: "NonProxy",
            }),
        }
    }

    /// The plain entity, wrapped or not
    pub fn get_real_object<'a, E: Entity>(&self, entity: &'a Managed<E>) -> &'a E {
        match entity {
            Managed::NonProxy(e) => e,
            Managed::Proxy(proxy) => proxy.target(),
        }
    }

    /// Strip the proxy; plain entities pass through
    pub fn remove_proxy<E: Entity>(&self, entity: Managed<E>) -> E {
        match entity {
            Managed::NonProxy(e) => e,
            Managed::Proxy(proxy) => proxy.into_target(),
        }
    }

    /// Strip proxies, keeping order
    pub fn remove_proxy_list<E, I>(&self, entities: I) -> Vec<E>
    where
        E: Entity,
        I: IntoIterator<Item = Managed<E>>,
    {
        entities.into_iter().map(|e| self.remove_proxy(e)).collect()
    }

    /// Strip proxies into a set
    pub fn remove_proxy_set<E, I>(&self, entities: I) -> HashSet<E>
    where
        E: Entity + Eq + Hash,
        I: IntoIterator<Item = Managed<E>>,
    {
        entities.into_iter().map(|e| self.remove_proxy(e)).collect()
    }

    /// Wrap with every field loaded except counters
    pub fn build_proxy_with_all_fields_loaded_except_counters<E: Entity>(
        &self,
        entity: E,
        meta: Arc<EntityMeta>,
        loader: Arc<dyn FieldLoader>,
    ) -> EntityProxy<E> {
        let loaded = meta
            .properties()
            .iter()
            .filter(|p| !p.is_counter())
            .map(|p| p.name().to_string())
            .collect();
        EntityProxy::new(entity, meta, loaded, loader)
    }

    /// Wrap with only the primary key known
    pub fn build_proxy_with_id_loaded<E: Entity>(
        &self,
        entity: E,
        meta: Arc<EntityMeta>,
        loader: Arc<dyn FieldLoader>,
    ) -> EntityProxy<E> {
        EntityProxy::new(entity, meta, HashSet::new(), loader)
    }
}
