//! Core types and traits for WideORM
//!
//! This crate defines the foundational types used throughout the system:
//! - Value / ValueCodec: field and key-component values and their byte forms
//! - KeyValue / Entity: capabilities a mapped type exposes
//! - PropertyMeta / EntityMeta: mapping metadata, built once and shared
//! - CompositeKeyCodec: composite column names and slice bounds
//! - Options: per-operation consistency, TTL and timestamp
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod composite;
pub mod entity;
pub mod error;
pub mod meta;
pub mod options;
pub mod value;

pub use composite::{
    Boundary, CompositeColumnName, CompositeComponent, CompositeKeyCodec, SliceBounds,
    MAX_COMPONENT_LEN,
};
pub use entity::{Entity, KeyValue};
pub use error::{Error, Result};
pub use meta::{
    EntityMeta, EntityMetaBuilder, KeyComponent, KeyLayout, MetaRegistry, MultiKeyComponents,
    PropertyKind, PropertyMeta,
};
pub use options::{ConsistencyLevel, GlobalDefaults, Options, ResolvedOptions};
pub use value::{Value, ValueCodec};
