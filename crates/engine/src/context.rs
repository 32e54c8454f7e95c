//! Persistence contexts
//!
//! A context binds one logical operation to one entity (or one primary
//! key). It is built by [`PersistenceContextFactory`] and consumed by the
//! operation it runs, so a context can never run twice.
//!
//! Every operation follows the same order:
//!
//! 1. proxy state check
//! 2. validation
//! 3. option resolution
//! 4. key and column encoding
//! 5. executor statement(s)
//!
//! Steps 1 to 4 never touch the store, so a failure there leaves it
//! untouched.
//!
//! ## Row layout
//!
//! - row key: id component 0, encoded exactly
//! - clustering prefix: id components `1..n`, encoded exactly
//! - column name: clustering prefix plus the property name
//! - a marker column (empty property name) records that the entity exists

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, trace};

use wideorm_core::{
    CompositeColumnName, CompositeKeyCodec, Entity, EntityMeta, Error, GlobalDefaults, KeyValue,
    Options, PropertyMeta, ResolvedOptions, Result, Value,
};
use wideorm_storage::{Column, ColumnSelection, StatementExecutor};

use crate::options::{OperationKind, OptionsResolver};
use crate::proxy::{EntityProxifier, EntityProxy, FieldLoader, Managed};
use crate::slice::SliceRangeBuilder;
use crate::validator::{validate, validate_proxy, EntityValidator};

// ============================================================================
// Factory
// ============================================================================

/// Builds one context per logical call
#[derive(Clone)]
pub struct PersistenceContextFactory {
    executor: Arc<dyn StatementExecutor>,
    validator: Arc<dyn EntityValidator>,
    resolver: OptionsResolver,
}

impl std::fmt::Debug for PersistenceContextFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceContextFactory")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl PersistenceContextFactory {
    /// Create a factory over one executor, one validator and global defaults
    pub fn new(
        executor: Arc<dyn StatementExecutor>,
        validator: Arc<dyn EntityValidator>,
        defaults: GlobalDefaults,
    ) -> Self {
        Self {
            executor,
            validator,
            resolver: OptionsResolver::new(defaults),
        }
    }

    /// Statement executor
    pub fn executor(&self) -> &Arc<dyn StatementExecutor> {
        &self.executor
    }

    /// Options resolver
    pub fn resolver(&self) -> &OptionsResolver {
        &self.resolver
    }

    /// Slice and index query encoder over the same executor
    pub fn slices(&self) -> SliceRangeBuilder {
        SliceRangeBuilder::new(Arc::clone(&self.executor))
    }

    /// Context bound to an entity
    pub fn entity_context<'a, E: Entity>(
        &self,
        meta: Arc<EntityMeta>,
        entity: &'a mut Managed<E>,
        options: Options,
    ) -> PersistenceContext<'a, E> {
        PersistenceContext {
            core: self.core(meta, options),
            entity,
        }
    }

    /// Context bound to a primary key
    pub fn key_context<E: Entity>(
        &self,
        meta: Arc<EntityMeta>,
        key: Option<E::Key>,
        options: Options,
    ) -> KeyContext<E> {
        KeyContext {
            core: self.core(meta, options),
            key,
            _entity: PhantomData,
        }
    }

    pub(crate) fn core(&self, meta: Arc<EntityMeta>, options: Options) -> ContextCore {
        ContextCore {
            executor: Arc::clone(&self.executor),
            validator: Arc::clone(&self.validator),
            resolver: self.resolver,
            codec: CompositeKeyCodec::new(),
            proxifier: EntityProxifier,
            meta,
            options,
        }
    }
}

// ============================================================================
// Shared machinery
// ============================================================================

/// Encoded location of one entity
#[derive(Debug, Clone)]
pub(crate) struct RowAddress {
    pub(crate) row_key: Vec<u8>,
    pub(crate) prefix: CompositeColumnName,
}

/// Collaborators and per-call state shared by both context kinds
#[derive(Clone)]
pub(crate) struct ContextCore {
    pub(crate) executor: Arc<dyn StatementExecutor>,
    pub(crate) validator: Arc<dyn EntityValidator>,
    pub(crate) resolver: OptionsResolver,
    pub(crate) codec: CompositeKeyCodec,
    pub(crate) proxifier: EntityProxifier,
    pub(crate) meta: Arc<EntityMeta>,
    pub(crate) options: Options,
}

impl ContextCore {
    pub(crate) fn table(&self) -> &str {
        self.meta.table_name()
    }

    pub(crate) fn resolve(&self, kind: OperationKind) -> Result<ResolvedOptions> {
        self.resolver.resolve(&self.options, &self.meta, kind)
    }

    /// Row key and clustering prefix of a full primary key
    pub(crate) fn address(&self, key: &[Value]) -> Result<RowAddress> {
        let full = self
            .codec
            .build_exact(self.meta.id_meta(), Some(&key.to_vec()))?;
        let (partition, clustering) = full.components().split_at(1);
        Ok(RowAddress {
            row_key: CompositeColumnName::from_components(partition.to_vec()).encode(),
            prefix: CompositeColumnName::from_components(clustering.to_vec()),
        })
    }

    /// Row key for a partition value
    pub(crate) fn partition_row_key(&self, partition: &Value) -> Result<Vec<u8>> {
        let meta = self.meta.id_meta().partition();
        Ok(self.codec.build_exact(&meta, Some(partition))?.encode())
    }

    pub(crate) fn column_name(&self, prefix: &CompositeColumnName, property: &str) -> Result<Vec<u8>> {
        Ok(prefix
            .clone()
            .with_component(property.as_bytes().to_vec())?
            .encode())
    }

    pub(crate) fn marker_column(&self, prefix: &CompositeColumnName) -> Result<Vec<u8>> {
        self.column_name(prefix, "")
    }

    pub(crate) fn selection(&self, address: &RowAddress) -> ColumnSelection {
        if address.prefix.is_empty() {
            ColumnSelection::All
        } else {
            ColumnSelection::Prefix(address.prefix.encode())
        }
    }

    /// Options for reads issued later through a proxy
    fn read_options(&self) -> Result<ResolvedOptions> {
        let call = match self.options.consistency() {
            Some(level) => Options::with_consistency_level(level),
            None => Options::new(),
        };
        self.resolver.resolve(&call, &self.meta, OperationKind::Read)
    }

    pub(crate) fn loader(&self) -> Result<Arc<dyn FieldLoader>> {
        Ok(Arc::new(StoreLoader {
            core: self.clone(),
            options: self.read_options()?,
        }))
    }

    /// Marker plus every non-null, non-counter field; non-zero counters apart
    fn entity_columns<E: Entity>(
        &self,
        entity: &E,
        address: &RowAddress,
    ) -> Result<(Vec<Column>, Vec<(Vec<u8>, i64)>)> {
        let mut columns = vec![Column::new(self.marker_column(&address.prefix)?, Vec::new())];
        let mut counters = Vec::new();

        for property in self.meta.properties() {
            let value = entity.get_field(property.name());
            if value.is_null() {
                continue;
            }
            let name = self.column_name(&address.prefix, property.name())?;
            if property.is_counter() {
                let delta = value.as_long().ok_or_else(|| {
                    Error::serialization(format!(
                        "counter '{}' holds a {} value",
                        property.name(),
                        value.type_name()
                    ))
                })?;
                if delta != 0 {
                    counters.push((name, delta));
                }
            } else {
                columns.push(Column::new(name, serialize(property, &value)?));
            }
        }
        Ok((columns, counters))
    }

    /// Build an entity from the columns of one row
    ///
    /// Returns `None` when no column (marker included) is present.
    pub(crate) fn materialize<E: Entity>(&self, key: E::Key, columns: &[Column]) -> Result<Option<E>> {
        if columns.is_empty() {
            return Ok(None);
        }
        let mut entity = E::default();
        entity.set_key(key);
        for column in columns {
            let mut name = CompositeColumnName::decode(&column.name)?;
            let property = property_component(&mut name)?;
            self.apply_column(&mut entity, &property, &column.value)?;
        }
        Ok(Some(entity))
    }

    /// Group a slice of one partition into entities, in scan order
    pub(crate) fn materialize_slice<E: Entity>(
        &self,
        partition: &Value,
        columns: &[Column],
        limit: Option<usize>,
    ) -> Result<Vec<E>> {
        let clustering_codecs = self
            .meta
            .clustering_meta()
            .map(PropertyMeta::codecs)
            .unwrap_or_default();
        let limit = limit.unwrap_or(usize::MAX);

        let mut entities = Vec::new();
        let mut current: Option<(CompositeColumnName, E)> = None;
        for column in columns {
            let mut name = CompositeColumnName::decode(&column.name)?;
            let property = property_component(&mut name)?;

            let same_group = current.as_ref().map_or(false, |(prefix, _)| *prefix == name);
            if !same_group {
                if let Some((_, done)) = current.take() {
                    entities.push(done);
                }
                if entities.len() >= limit {
                    return Ok(entities);
                }
                let mut components = vec![partition.clone()];
                components.extend(name.values(&clustering_codecs)?);
                let mut entity = E::default();
                entity.set_key(E::Key::recompose(components)?);
                current = Some((name, entity));
            }
            if let Some((_, entity)) = current.as_mut() {
                self.apply_column(entity, &property, &column.value)?;
            }
        }
        if let Some((_, done)) = current {
            if entities.len() < limit {
                entities.push(done);
            }
        }
        Ok(entities)
    }

    /// Decode a row key of a non-clustered entity back to its primary key
    pub(crate) fn decode_row_key<K: KeyValue>(&self, row_key: &[u8]) -> Result<K> {
        let codecs = self.meta.id_meta().codecs();
        let values = CompositeColumnName::decode(row_key)?.values(&codecs)?;
        K::recompose(values)
    }

    pub(crate) fn wrap_loaded<E: Entity>(&self, entity: E) -> Result<EntityProxy<E>> {
        Ok(self
            .proxifier
            .build_proxy_with_all_fields_loaded_except_counters(
                entity,
                Arc::clone(&self.meta),
                self.loader()?,
            ))
    }

    fn apply_column<E: Entity>(&self, entity: &mut E, property: &str, bytes: &[u8]) -> Result<()> {
        if property.is_empty() {
            return Ok(());
        }
        match self.meta.property(property) {
            Some(meta) if !meta.is_counter() => {
                entity.set_field(property, deserialize(meta, bytes)?)
            }
            _ => {
                trace!(target: "wideorm::context", property, "skipping unmapped column");
                Ok(())
            }
        }
    }

    fn all_loaded_names(&self) -> HashSet<String> {
        self.meta
            .properties()
            .iter()
            .filter(|p| !p.is_counter())
            .map(|p| p.name().to_string())
            .collect()
    }
}

fn serialize(property: &PropertyMeta, value: &Value) -> Result<Vec<u8>> {
    let codec = property.value_codec().ok_or_else(|| {
        Error::serialization(format!("property '{}' has no value codec", property.name()))
    })?;
    codec.serialize(value)
}

fn deserialize(property: &PropertyMeta, bytes: &[u8]) -> Result<Value> {
    let codec = property.value_codec().ok_or_else(|| {
        Error::serialization(format!("property '{}' has no value codec", property.name()))
    })?;
    codec.deserialize(bytes)
}

/// Split the trailing property-name component off a column name
fn property_component(name: &mut CompositeColumnName) -> Result<String> {
    let last = name
        .pop()
        .ok_or_else(|| Error::malformed("column name has no property component"))?;
    String::from_utf8(last.bytes().to_vec())
        .map_err(|_| Error::malformed("property component is not UTF-8"))
}

/// Loads proxy fields straight from the executor
struct StoreLoader {
    core: ContextCore,
    options: ResolvedOptions,
}

impl FieldLoader for StoreLoader {
    fn load_fields(&self, key: &[Value], properties: &[&PropertyMeta]) -> Result<Vec<Value>> {
        let address = self.core.address(key)?;
        let names = properties
            .iter()
            .map(|p| self.core.column_name(&address.prefix, p.name()))
            .collect::<Result<Vec<_>>>()?;

        let columns = self.core.executor.read(
            self.core.table(),
            &address.row_key,
            &ColumnSelection::Names(names.clone()),
            &self.options,
        )?;
        let by_name: HashMap<Vec<u8>, Vec<u8>> =
            columns.into_iter().map(|c| (c.name, c.value)).collect();

        properties
            .iter()
            .zip(&names)
            .map(|(property, name)| match by_name.get(name) {
                Some(bytes) => deserialize(property, bytes),
                None => Ok(Value::Null),
            })
            .collect()
    }

    fn read_counter(&self, key: &[Value], property: &PropertyMeta) -> Result<Option<i64>> {
        let address = self.core.address(key)?;
        let name = self.core.column_name(&address.prefix, property.name())?;
        self.core
            .executor
            .read_counter(self.core.table(), &address.row_key, &name, &self.options)
    }
}

fn key_values<E: Entity>(entity: &E) -> Result<Vec<Value>> {
    entity
        .key()
        .map(|k| k.decompose())
        .ok_or_else(|| Error::validation("primary key is null"))
}

// ============================================================================
// Entity-bound context
// ============================================================================

/// Context bound to one managed entity
pub struct PersistenceContext<'a, E: Entity> {
    core: ContextCore,
    entity: &'a mut Managed<E>,
}

impl<'a, E: Entity> PersistenceContext<'a, E> {
    /// Insert the entity and return it wrapped in a proxy
    ///
    /// Issues one row write, plus one increment per non-zero counter.
    pub fn persist(self) -> Result<EntityProxy<E>> {
        let core = self.core;
        core.proxifier.ensure_not_proxy(self.entity)?;
        let entity = core.proxifier.get_real_object(self.entity);
        validate(&*core.validator, &core.meta, entity)?;
        let options = core.resolve(OperationKind::Write)?;

        let address = core.address(&key_values(entity)?)?;
        let (columns, counters) = core.entity_columns(entity, &address)?;
        let column_count = columns.len();

        core.executor
            .write(core.table(), &address.row_key, columns, &options)?;
        for (name, delta) in &counters {
            core.executor
                .increment_counter(core.table(), &address.row_key, name, *delta, &options)?;
        }

        debug!(
            target: "wideorm::context",
            entity = core.meta.entity_name(),
            columns = column_count,
            counters = counters.len(),
            "persist"
        );
        core.wrap_loaded(entity.clone())
    }

    /// Flush dirty fields and pending counter increments of a proxy
    ///
    /// Dirty null fields become column deletes. Field writes rewrite the
    /// marker column with the same options. Without changes no statement
    /// is issued.
    pub fn update(self) -> Result<()> {
        let core = self.core;
        let proxy = core.proxifier.proxy_mut(self.entity)?;
        validate_proxy(&*core.validator, &core.meta, proxy)?;
        if !proxy.has_changes() {
            trace!(target: "wideorm::context", entity = core.meta.entity_name(), "update without changes");
            return Ok(());
        }
        let options = core.resolve(OperationKind::Write)?;
        let address = core.address(&key_values(proxy.target())?)?;

        let mut writes = Vec::new();
        let mut deletes = Vec::new();
        let mut dirty: Vec<&String> = proxy.dirty_fields().iter().collect();
        dirty.sort();
        for field in dirty {
            let property = core.meta.property(field).ok_or_else(|| {
                Error::validation(format!("'{}' is not a mapped property", field))
            })?;
            let name = core.column_name(&address.prefix, field)?;
            let value = proxy.target().get_field(field);
            if value.is_null() {
                deletes.push(name);
            } else {
                writes.push(Column::new(name, serialize(property, &value)?));
            }
        }
        let mut increments = Vec::new();
        for (counter, delta) in proxy.pending_counter_deltas() {
            if *delta != 0 {
                increments.push((core.column_name(&address.prefix, counter)?, *delta));
            }
        }

        let (write_count, delete_count) = (writes.len(), deletes.len());
        if !writes.is_empty() {
            // Marker lives at least as long as the freshest field
            writes.push(Column::new(core.marker_column(&address.prefix)?, Vec::new()));
            core.executor
                .write(core.table(), &address.row_key, writes, &options)?;
        }
        if !deletes.is_empty() {
            core.executor.delete(
                core.table(),
                &address.row_key,
                &ColumnSelection::Names(deletes),
                &options,
            )?;
        }
        for (name, delta) in &increments {
            core.executor
                .increment_counter(core.table(), &address.row_key, name, *delta, &options)?;
        }
        proxy.take_changes();

        debug!(
            target: "wideorm::context",
            entity = core.meta.entity_name(),
            writes = write_count,
            deletes = delete_count,
            counters = increments.len(),
            "update"
        );
        Ok(())
    }

    /// Delete the entity's row (or its clustering prefix)
    pub fn remove(self) -> Result<()> {
        let core = self.core;
        let entity = core.proxifier.get_real_object(self.entity);
        let key = entity.key().map(|k| k.decompose());
        core.validator
            .validate_primary_key(core.meta.id_meta(), key.as_deref())?;
        let options = core.resolve(OperationKind::Write)?;
        let address = core.address(&key_values(entity)?)?;

        core.executor
            .delete(core.table(), &address.row_key, &core.selection(&address), &options)?;
        debug!(target: "wideorm::context", entity = core.meta.entity_name(), "remove");
        Ok(())
    }

    /// Reload every field of a proxy and drop its pending changes
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the row no longer exists.
    pub fn refresh(self) -> Result<()> {
        let core = self.core;
        let proxy = core.proxifier.proxy_mut(self.entity)?;
        let key = proxy
            .key()
            .ok_or_else(|| Error::validation("primary key is null"))?;
        let values = key.decompose();
        core.validator
            .validate_primary_key(core.meta.id_meta(), Some(&values[..]))?;
        let options = core.resolve(OperationKind::Read)?;
        let address = core.address(&values)?;

        let columns = core.executor.read(
            core.table(),
            &address.row_key,
            &core.selection(&address),
            &options,
        )?;
        let fresh = core
            .materialize::<E>(key, &columns)?
            .ok_or_else(|| Error::NotFound(core.meta.entity_name().to_string()))?;
        proxy.reset(fresh, core.all_loaded_names());

        debug!(target: "wideorm::context", entity = core.meta.entity_name(), "refresh");
        Ok(())
    }

    /// Load every field of a proxy that is not loaded yet
    pub fn initialize(self) -> Result<()> {
        let core = self.core;
        core.proxifier.proxy_mut(self.entity)?.initialize()
    }
}

// ============================================================================
// Key-bound context
// ============================================================================

/// Context bound to one primary key of entity type `E`
pub struct KeyContext<E: Entity> {
    core: ContextCore,
    key: Option<E::Key>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> KeyContext<E> {
    fn validated(&self) -> Result<(E::Key, Vec<Value>)> {
        let values = self.key.as_ref().map(|k| k.decompose());
        self.core
            .validator
            .validate_primary_key(self.core.meta.id_meta(), values.as_deref())?;
        match (&self.key, values) {
            (Some(key), Some(values)) => Ok((key.clone(), values)),
            _ => Err(Error::validation("primary key is null")),
        }
    }

    /// Read the entity with every field materialized
    ///
    /// Returns `Ok(None)` when the row does not exist.
    pub fn find(self) -> Result<Option<EntityProxy<E>>> {
        let (key, values) = self.validated()?;
        let core = self.core;
        let options = core.resolve(OperationKind::Read)?;
        let address = core.address(&values)?;

        let columns = core.executor.read(
            core.table(),
            &address.row_key,
            &core.selection(&address),
            &options,
        )?;
        let found = core.materialize::<E>(key, &columns)?;
        debug!(
            target: "wideorm::context",
            entity = core.meta.entity_name(),
            found = found.is_some(),
            "find"
        );
        found.map(|entity| core.wrap_loaded(entity)).transpose()
    }

    /// Proxy with only the key loaded; fields load on access
    ///
    /// Returns `Ok(None)` when the row does not exist.
    pub fn get_proxy(self) -> Result<Option<EntityProxy<E>>> {
        let (key, values) = self.validated()?;
        let core = self.core;
        let options = core.resolve(OperationKind::Read)?;
        let address = core.address(&values)?;

        let marker = core.marker_column(&address.prefix)?;
        let columns = core.executor.read(
            core.table(),
            &address.row_key,
            &ColumnSelection::Names(vec![marker]),
            &options,
        )?;
        if columns.is_empty() {
            debug!(target: "wideorm::context", entity = core.meta.entity_name(), found = false, "get_proxy");
            return Ok(None);
        }

        let mut entity = E::default();
        entity.set_key(key);
        debug!(target: "wideorm::context", entity = core.meta.entity_name(), found = true, "get_proxy");
        Ok(Some(core.proxifier.build_proxy_with_id_loaded(
            entity,
            Arc::clone(&core.meta),
            core.loader()?,
        )))
    }

    /// Delete the row (or clustering prefix) of the key
    pub fn remove_by_id(self) -> Result<()> {
        let (_, values) = self.validated()?;
        let core = self.core;
        let options = core.resolve(OperationKind::Write)?;
        let address = core.address(&values)?;

        core.executor
            .delete(core.table(), &address.row_key, &core.selection(&address), &options)?;
        debug!(target: "wideorm::context", entity = core.meta.entity_name(), "remove_by_id");
        Ok(())
    }
}
