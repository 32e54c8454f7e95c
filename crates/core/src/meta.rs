//! Entity metadata
//!
//! Metadata is built once at startup (by hand or by a mapping layer on top
//! of this crate), wrapped in `Arc`, and shared read-only afterwards.
//!
//! - [`PropertyMeta`]: one mapped field or key, with its component codecs
//! - [`MultiKeyComponents`]: ordered components of a multi-part key
//! - [`EntityMeta`]: table, id, properties and per-entity defaults
//! - [`MetaRegistry`]: entity type → metadata lookup

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::options::ConsistencyLevel;
use crate::value::ValueCodec;

/// Role of a mapped property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Single-component primary key
    Id,
    /// Multi-component primary key (partition + clustering components)
    EmbeddedId,
    /// Plain column, loaded eagerly
    Simple,
    /// Plain column, loaded only on first access or on `initialize`
    Lazy,
    /// Counter column: written as increments, always read through
    Counter,
}

impl PropertyKind {
    /// True for `Id` and `EmbeddedId`
    pub fn is_id(&self) -> bool {
        matches!(self, PropertyKind::Id | PropertyKind::EmbeddedId)
    }
}

/// One component of a multi-part key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyComponent {
    /// Component name (field name on the key type)
    pub name: String,
    /// Codec used to serialize this component
    pub codec: ValueCodec,
}

impl KeyComponent {
    /// Create a key component
    pub fn new(name: impl Into<String>, codec: ValueCodec) -> Self {
        Self {
            name: name.into(),
            codec,
        }
    }
}

/// Ordered components of a multi-part key
///
/// Index order is clustering order. It is fixed when the metadata is built
/// and never reordered afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiKeyComponents {
    components: Vec<KeyComponent>,
}

impl MultiKeyComponents {
    /// Build from components in declared order
    pub fn new(components: Vec<KeyComponent>) -> Self {
        Self { components }
    }

    /// Components in declared order
    pub fn components(&self) -> &[KeyComponent] {
        &self.components
    }

    /// Number of declared components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True when no component is declared
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Codec of component `index`
    pub fn codec(&self, index: usize) -> Option<ValueCodec> {
        self.components.get(index).map(|c| c.codec)
    }
}

/// Shape of the value a property carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLayout {
    /// One component
    Single(ValueCodec),
    /// Several ordered components
    Multi(MultiKeyComponents),
}

/// Metadata for one mapped field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMeta {
    name: String,
    kind: PropertyKind,
    layout: KeyLayout,
    required: bool,
}

impl PropertyMeta {
    /// Single-component property
    pub fn single(name: impl Into<String>, kind: PropertyKind, codec: ValueCodec) -> Self {
        Self {
            name: name.into(),
            required: kind.is_id(),
            kind,
            layout: KeyLayout::Single(codec),
        }
    }

    /// Multi-component key property
    pub fn multi(name: impl Into<String>, components: MultiKeyComponents) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::EmbeddedId,
            layout: KeyLayout::Multi(components),
            required: true,
        }
    }

    /// Mark the property as required (non-null on persist)
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Property name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Property kind
    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    /// Component layout
    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    /// True when the property must be non-null
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// True for single-component properties
    pub fn is_single_key(&self) -> bool {
        matches!(self.layout, KeyLayout::Single(_))
    }

    /// True for counter properties
    pub fn is_counter(&self) -> bool {
        self.kind == PropertyKind::Counter
    }

    /// True for lazy properties
    pub fn is_lazy(&self) -> bool {
        self.kind == PropertyKind::Lazy
    }

    /// Codec of a single-component property
    pub fn value_codec(&self) -> Option<ValueCodec> {
        match &self.layout {
            KeyLayout::Single(codec) => Some(*codec),
            KeyLayout::Multi(_) => None,
        }
    }

    /// Number of declared components
    pub fn component_count(&self) -> usize {
        match &self.layout {
            KeyLayout::Single(_) => 1,
            KeyLayout::Multi(multi) => multi.len(),
        }
    }

    /// Component codecs in declared order
    pub fn codecs(&self) -> Vec<ValueCodec> {
        match &self.layout {
            KeyLayout::Single(codec) => vec![*codec],
            KeyLayout::Multi(multi) => multi.components().iter().map(|c| c.codec).collect(),
        }
    }

    /// Single-component metadata for the partition part of this key
    pub fn partition(&self) -> PropertyMeta {
        match &self.layout {
            KeyLayout::Multi(multi) if !multi.is_empty() => {
                let first = &multi.components()[0];
                PropertyMeta::single(first.name.clone(), PropertyKind::Id, first.codec)
            }
            _ => self.clone(),
        }
    }

    /// Metadata of the clustering part of a multi-component key
    ///
    /// Component 0 is the partition key; components `1..n` order the
    /// columns inside the partition. Returns `None` for single keys.
    fn clustering(&self) -> Option<PropertyMeta> {
        match &self.layout {
            KeyLayout::Multi(multi) if multi.len() > 1 => Some(PropertyMeta {
                name: self.name.clone(),
                kind: PropertyKind::EmbeddedId,
                layout: KeyLayout::Multi(MultiKeyComponents::new(
                    multi.components()[1..].to_vec(),
                )),
                required: true,
            }),
            _ => None,
        }
    }
}

/// Metadata for one entity type
#[derive(Debug, Clone)]
pub struct EntityMeta {
    entity_name: String,
    table_name: String,
    id_meta: PropertyMeta,
    clustering_meta: Option<PropertyMeta>,
    properties: Vec<PropertyMeta>,
    read_consistency: Option<ConsistencyLevel>,
    write_consistency: Option<ConsistencyLevel>,
    default_ttl: Option<NonZeroU32>,
}

impl EntityMeta {
    /// Start building metadata for a table
    pub fn builder(entity_name: impl Into<String>, table_name: impl Into<String>) -> EntityMetaBuilder {
        EntityMetaBuilder {
            entity_name: entity_name.into(),
            table_name: table_name.into(),
            id_meta: None,
            properties: Vec::new(),
            read_consistency: None,
            write_consistency: None,
            default_ttl: None,
        }
    }

    /// Entity name (for logs and errors)
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Backing table
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Primary key metadata
    pub fn id_meta(&self) -> &PropertyMeta {
        &self.id_meta
    }

    /// Clustering metadata (id components `1..n`), present for clustered entities
    pub fn clustering_meta(&self) -> Option<&PropertyMeta> {
        self.clustering_meta.as_ref()
    }

    /// True when the primary key has clustering components
    pub fn is_clustered(&self) -> bool {
        self.clustering_meta.is_some()
    }

    /// Non-id properties in declared order
    pub fn properties(&self) -> &[PropertyMeta] {
        &self.properties
    }

    /// Look up a non-id property by name
    pub fn property(&self, name: &str) -> Option<&PropertyMeta> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Entity default read consistency
    pub fn read_consistency(&self) -> Option<ConsistencyLevel> {
        self.read_consistency
    }

    /// Entity default write consistency
    pub fn write_consistency(&self) -> Option<ConsistencyLevel> {
        self.write_consistency
    }

    /// Entity default TTL
    pub fn default_ttl(&self) -> Option<NonZeroU32> {
        self.default_ttl
    }
}

/// Builder for [`EntityMeta`]
#[derive(Debug)]
pub struct EntityMetaBuilder {
    entity_name: String,
    table_name: String,
    id_meta: Option<PropertyMeta>,
    properties: Vec<PropertyMeta>,
    read_consistency: Option<ConsistencyLevel>,
    write_consistency: Option<ConsistencyLevel>,
    default_ttl: Option<NonZeroU32>,
}

impl EntityMetaBuilder {
    /// Single-component primary key
    pub fn id(mut self, name: impl Into<String>, codec: ValueCodec) -> Self {
        self.id_meta = Some(PropertyMeta::single(name, PropertyKind::Id, codec));
        self
    }

    /// Multi-component primary key; component 0 is the partition key
    pub fn embedded_id(mut self, name: impl Into<String>, components: Vec<KeyComponent>) -> Self {
        self.id_meta = Some(PropertyMeta::multi(name, MultiKeyComponents::new(components)));
        self
    }

    /// Eagerly loaded column
    pub fn column(mut self, name: impl Into<String>, codec: ValueCodec) -> Self {
        self.properties
            .push(PropertyMeta::single(name, PropertyKind::Simple, codec));
        self
    }

    /// Eagerly loaded column that must be non-null on persist
    pub fn required_column(mut self, name: impl Into<String>, codec: ValueCodec) -> Self {
        self.properties
            .push(PropertyMeta::single(name, PropertyKind::Simple, codec).required());
        self
    }

    /// Lazily loaded column
    pub fn lazy_column(mut self, name: impl Into<String>, codec: ValueCodec) -> Self {
        self.properties
            .push(PropertyMeta::single(name, PropertyKind::Lazy, codec));
        self
    }

    /// Counter column
    pub fn counter(mut self, name: impl Into<String>) -> Self {
        self.properties.push(PropertyMeta::single(
            name,
            PropertyKind::Counter,
            ValueCodec::Long,
        ));
        self
    }

    /// Entity default read consistency
    pub fn read_consistency(mut self, level: ConsistencyLevel) -> Self {
        self.read_consistency = Some(level);
        self
    }

    /// Entity default write consistency
    pub fn write_consistency(mut self, level: ConsistencyLevel) -> Self {
        self.write_consistency = Some(level);
        self
    }

    /// Entity default TTL in seconds
    pub fn default_ttl(mut self, ttl: NonZeroU32) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Validate and freeze the metadata
    pub fn build(self) -> Result<EntityMeta> {
        let id_meta = self.id_meta.ok_or_else(|| {
            Error::validation(format!("entity '{}' declares no id", self.entity_name))
        })?;

        if let KeyLayout::Multi(multi) = id_meta.layout() {
            if multi.is_empty() {
                return Err(Error::validation(format!(
                    "embedded id of '{}' declares no component",
                    self.entity_name
                )));
            }
        }

        let mut seen = std::collections::HashSet::new();
        seen.insert(id_meta.name().to_string());
        for property in &self.properties {
            // The empty name is the row marker column
            if property.name().is_empty() {
                return Err(Error::validation(format!(
                    "entity '{}' declares a property with an empty name",
                    self.entity_name
                )));
            }
            if !seen.insert(property.name().to_string()) {
                return Err(Error::validation(format!(
                    "property '{}' declared twice on '{}'",
                    property.name(),
                    self.entity_name
                )));
            }
        }

        let clustering_meta = id_meta.clustering();
        Ok(EntityMeta {
            entity_name: self.entity_name,
            table_name: self.table_name,
            id_meta,
            clustering_meta,
            properties: self.properties,
            read_consistency: self.read_consistency,
            write_consistency: self.write_consistency,
            default_ttl: self.default_ttl,
        })
    }
}

/// Entity type → metadata map, filled once at startup
#[derive(Debug, Default, Clone)]
pub struct MetaRegistry {
    by_type: HashMap<TypeId, Arc<EntityMeta>>,
}

impl MetaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register metadata for entity type `E`
    pub fn register<E: Entity>(&mut self, meta: EntityMeta) -> &mut Self {
        self.by_type.insert(TypeId::of::<E>(), Arc::new(meta));
        self
    }

    /// Metadata for entity type `E`
    pub fn get<E: Entity>(&self) -> Result<Arc<EntityMeta>> {
        self.by_type
            .get(&TypeId::of::<E>())
            .cloned()
            .ok_or_else(|| Error::UnknownEntity(type_name::<E>().to_string()))
    }

    /// True when `E` is registered
    pub fn contains<E: Entity>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<E>())
    }

    /// Number of registered entity types
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}
