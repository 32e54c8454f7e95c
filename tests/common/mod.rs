//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::num::NonZeroU32;
use std::sync::Arc;

pub use wideorm::{
    ConsistencyLevel, Entity, EntityMeta, EntityProxy, Error, GlobalDefaults, KeyComponent,
    KeyValue, Managed, ManualClock, MemoryStore, MetaRegistry, Options, PersistenceManager,
    Result, StatementKind, Value, ValueCodec,
};

// ============================================================================
// Entities
// ============================================================================

/// Single-key entity covering every property kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CompleteBean {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub age: Option<i64>,
    pub bio: Option<String>,
    pub version: Option<i64>,
}

impl CompleteBean {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id: Some(id),
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn meta() -> EntityMeta {
        EntityMeta::builder("CompleteBean", "complete_bean")
            .id("id", ValueCodec::Long)
            .required_column("name", ValueCodec::Text)
            .column("age", ValueCodec::Long)
            .lazy_column("bio", ValueCodec::Text)
            .counter("version")
            .build()
            .expect("valid metadata")
    }
}

impl Entity for CompleteBean {
    type Key = i64;

    fn key(&self) -> Option<i64> {
        self.id
    }

    fn set_key(&mut self, key: i64) {
        self.id = Some(key);
    }

    fn get_field(&self, name: &str) -> Value {
        match name {
            "name" => self.name.clone().into(),
            "age" => self.age.into(),
            "bio" => self.bio.clone().into(),
            "version" => self.version.into(),
            _ => Value::Null,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
        match (name, value) {
            ("name", Value::Text(v)) => self.name = Some(v),
            ("name", Value::Null) => self.name = None,
            ("age", Value::Long(v)) => self.age = Some(v),
            ("age", Value::Null) => self.age = None,
            ("bio", Value::Text(v)) => self.bio = Some(v),
            ("bio", Value::Null) => self.bio = None,
            ("version", Value::Long(v)) => self.version = Some(v),
            ("version", Value::Null) => self.version = None,
            (name, value) => {
                return Err(Error::serialization(format!(
                    "cannot set {} to a {} value",
                    name,
                    value.type_name()
                )))
            }
        }
        Ok(())
    }
}

/// Two-component key: partition `id`, clustering `name`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ClusteredKey {
    pub id: i64,
    pub name: String,
}

impl ClusteredKey {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}

impl KeyValue for ClusteredKey {
    fn decompose(&self) -> Vec<Value> {
        vec![Value::Long(self.id), Value::Text(self.name.clone())]
    }

    fn recompose(components: Vec<Value>) -> Result<Self> {
        match components.as_slice() {
            [Value::Long(id), Value::Text(name)] => Ok(Self {
                id: *id,
                name: name.clone(),
            }),
            _ => Err(Error::malformed("expected (long, text) key")),
        }
    }
}

/// Entity stored as one clustered column group per key
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ClusteredEntity {
    pub id: Option<ClusteredKey>,
    pub value: Option<String>,
}

impl ClusteredEntity {
    pub fn new(id: i64, name: &str, value: &str) -> Self {
        Self {
            id: Some(ClusteredKey::new(id, name)),
            value: Some(value.to_string()),
        }
    }

    pub fn meta() -> EntityMeta {
        EntityMeta::builder("ClusteredEntity", "clustered")
            .embedded_id(
                "id",
                vec![
                    KeyComponent::new("id", ValueCodec::Long),
                    KeyComponent::new("name", ValueCodec::Text),
                ],
            )
            .column("value", ValueCodec::Text)
            .build()
            .expect("valid metadata")
    }
}

impl Entity for ClusteredEntity {
    type Key = ClusteredKey;

    fn key(&self) -> Option<ClusteredKey> {
        self.id.clone()
    }

    fn set_key(&mut self, key: ClusteredKey) {
        self.id = Some(key);
    }

    fn get_field(&self, name: &str) -> Value {
        match name {
            "value" => self.value.clone().into(),
            _ => Value::Null,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
        match (name, value) {
            ("value", Value::Text(v)) => self.value = Some(v),
            ("value", Value::Null) => self.value = None,
            (name, value) => {
                return Err(Error::serialization(format!(
                    "cannot set {} to a {} value",
                    name,
                    value.type_name()
                )))
            }
        }
        Ok(())
    }
}

// ============================================================================
// TestOrm - manager over an inspectable in-memory store
// ============================================================================

/// Start of the manual clock, in microseconds
pub const START_MICROS: u64 = 1_000_000_000;

pub struct TestOrm {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub manager: PersistenceManager,
}

impl TestOrm {
    pub fn new() -> Self {
        Self::with_defaults(GlobalDefaults::default())
    }

    pub fn with_defaults(defaults: GlobalDefaults) -> Self {
        init_tracing();
        let clock = Arc::new(ManualClock::new(START_MICROS));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));

        let mut registry = MetaRegistry::new();
        registry
            .register::<CompleteBean>(CompleteBean::meta())
            .register::<ClusteredEntity>(ClusteredEntity::meta());

        let manager = PersistenceManager::new(registry, store.clone(), defaults);
        Self {
            store,
            clock,
            manager,
        }
    }

    /// Number of statements of one kind since the last clear
    pub fn count(&self, kind: StatementKind) -> usize {
        self.store.statement_count(kind)
    }

    pub fn total_statements(&self) -> usize {
        self.store.statements().len()
    }
}

/// Route engine logs to the test writer; repeated calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn global_defaults(ttl: Option<u32>) -> GlobalDefaults {
    GlobalDefaults {
        read_consistency: Some(ConsistencyLevel::One),
        write_consistency: Some(ConsistencyLevel::Quorum),
        ttl: ttl.and_then(NonZeroU32::new),
    }
}
