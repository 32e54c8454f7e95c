//! Persistence engine for WideORM
//!
//! This crate turns entity operations into executor statements:
//! - PersistenceManager: facade owning metadata and collaborators
//! - PersistenceContext / KeyContext: one operation per context
//! - EntityProxy / EntityProxifier: lazy loading and dirty tracking
//! - OptionsResolver: call > entity > global option precedence
//! - SliceRangeBuilder / SliceQueryBuilder: clustering-range and index queries
//! - WideOrmConfig: process-wide defaults from `wideorm.toml`
//!
//! The engine never talks to a store directly; every statement goes
//! through a [`wideorm_storage::StatementExecutor`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod manager;
pub mod options;
pub mod proxy;
pub mod slice;
pub mod validator;

pub use config::{WideOrmConfig, CONFIG_FILE_NAME};
pub use context::{KeyContext, PersistenceContext, PersistenceContextFactory};
pub use manager::PersistenceManager;
pub use options::{OperationKind, OptionsResolver};
pub use proxy::{EntityProxifier, EntityProxy, FieldLoader, Managed};
pub use slice::{IndexCondition, SliceQueryBuilder, SliceRange, SliceRangeBuilder, DEFAULT_SLICE_LIMIT};
pub use validator::{validate, validate_proxy, EntityValidator, StructuralValidator};
