//! WideORM - object mapping over wide-column stores
//!
//! Entities are mapped onto wide rows: the first primary key component is
//! the row key, the remaining components form a clustering prefix, and
//! each property is one column under that prefix.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use wideorm::{GlobalDefaults, Managed, MemoryStore, MetaRegistry, PersistenceManager};
//!
//! let mut registry = MetaRegistry::new();
//! registry.register::<User>(User::meta()?);
//!
//! let manager = PersistenceManager::new(
//!     registry,
//!     Arc::new(MemoryStore::new()),
//!     GlobalDefaults::default(),
//! );
//!
//! let mut proxy = manager.persist(User::new(42, "alice"))?;
//! proxy.set("name", "bob")?;
//! // Keep the Managed around: update clears its dirty state in place
//! let mut user: Managed<User> = proxy.into();
//! manager.update(&mut user)?;
//! ```
//!
//! # Architecture
//!
//! - `wideorm-core`: values, metadata, composite key codec, options, errors
//! - `wideorm-storage`: the statement executor interface and an in-memory
//!   executor
//! - `wideorm-engine`: contexts, proxies, option resolution, slice queries
//!   and the [`PersistenceManager`] facade

pub use wideorm_core::*;
pub use wideorm_engine::{
    validate, validate_proxy, EntityProxifier, EntityProxy, EntityValidator, FieldLoader,
    IndexCondition, KeyContext, Managed, OperationKind, OptionsResolver, PersistenceContext,
    PersistenceContextFactory, PersistenceManager, SliceQueryBuilder, SliceRange,
    SliceRangeBuilder, StructuralValidator, WideOrmConfig, CONFIG_FILE_NAME, DEFAULT_SLICE_LIMIT,
};
pub use wideorm_storage::{
    Cell, Clock, Column, ColumnRange, ColumnSelection, IndexedRow, ManualClock, MemoryStore,
    StatementExecutor, StatementKind, StatementRecord, SystemClock,
};
