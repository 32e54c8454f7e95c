//! Storage layer for WideORM
//!
//! This crate defines how encoded statements reach a wide-row store:
//! - StatementExecutor: the executor interface the engine calls
//! - Column / ColumnSelection / ColumnRange: statement payloads
//! - MemoryStore: in-process executor with composite column ordering,
//!   TTL, last-write-wins timestamps and a statement log
//! - Cell / Clock: stored cells and the wall clock used for TTL

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cell;
pub mod executor;
pub mod memory;

pub use cell::{Cell, Clock, ManualClock, SystemClock};
pub use executor::{Column, ColumnRange, ColumnSelection, IndexedRow, StatementExecutor};
pub use memory::{MemoryStore, StatementKind, StatementRecord};
