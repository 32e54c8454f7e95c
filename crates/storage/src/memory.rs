//! MemoryStore: in-process wide-row statement executor
//!
//! This module implements [`StatementExecutor`] using:
//! - `BTreeMap<Vec<u8>, Row>` per table, rows ordered by raw row key
//! - `BTreeMap<ColumnKey, Cell>` per row, columns ordered by the composite
//!   comparator, so range reads are plain `BTreeMap::range` calls
//! - `parking_lot::RwLock` around all tables; each statement takes the lock
//!   once
//! - a statement log recording every executed statement with its options
//!
//! # Design Notes
//!
//! - **Last write wins**: every cell and tombstone carries a write
//!   timestamp. A write older than what is stored is dropped.
//! - **Logical TTL expiration**: expired cells are filtered at read time,
//!   not deleted.
//! - **Consistency is recorded, not enforced**: a single in-process replica
//!   satisfies every level.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use wideorm_core::{CompositeKeyCodec, ResolvedOptions, Result};

use crate::cell::{Cell, Clock, SystemClock};
use crate::executor::{Column, ColumnRange, ColumnSelection, IndexedRow, StatementExecutor};

// ============================================================================
// Statement log
// ============================================================================

/// Kind of an executed statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// Column write
    Write,
    /// Row, prefix or column delete
    Delete,
    /// Point read
    Read,
    /// Range read
    RangeRead,
    /// Secondary index read
    IndexRead,
    /// Counter increment
    CounterIncrement,
    /// Counter read
    CounterRead,
}

/// One executed statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRecord {
    /// Statement kind
    pub kind: StatementKind,
    /// Target table
    pub table: String,
    /// Target row, absent for index reads
    pub row_key: Option<Vec<u8>>,
    /// Columns written or returned
    pub column_count: usize,
    /// Options the statement ran with
    pub options: ResolvedOptions,
}

// ============================================================================
// Tables
// ============================================================================

/// Encoded column name ordered by the composite comparator
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnKey(Vec<u8>);

impl Ord for ColumnKey {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        CompositeKeyCodec::compare(&self.0, &other.0)
    }
}

impl PartialOrd for ColumnKey {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
struct Row {
    cells: BTreeMap<ColumnKey, Cell>,
    counters: BTreeMap<ColumnKey, i64>,
    /// Prefix tombstones: (encoded prefix, write timestamp); empty prefix is the whole row
    tombstones: Vec<(Vec<u8>, u64)>,
}

impl Row {
    fn is_shadowed(&self, name: &[u8], timestamp: u64) -> bool {
        self.tombstones
            .iter()
            .any(|(prefix, ts)| name.starts_with(prefix) && timestamp <= *ts)
    }

    fn delete_prefix(&mut self, prefix: &[u8], timestamp: u64) {
        self.cells
            .retain(|name, cell| !(name.0.starts_with(prefix) && cell.timestamp() <= timestamp));
        self.counters.retain(|name, _| !name.0.starts_with(prefix));

        match self.tombstones.iter_mut().find(|(p, _)| p == prefix) {
            Some((_, ts)) => *ts = (*ts).max(timestamp),
            None => self.tombstones.push((prefix.to_vec(), timestamp)),
        }
    }

    fn delete_column(&mut self, name: &[u8], timestamp: u64, now: u64) {
        let key = ColumnKey(name.to_vec());
        self.counters.remove(&key);
        let replace = self
            .cells
            .get(&key)
            .map_or(true, |cell| cell.is_superseded_by(timestamp));
        if replace {
            self.cells.insert(key, Cell::tombstone(timestamp, now));
        }
    }

    fn visible(&self, now: u64) -> impl Iterator<Item = Column> + '_ {
        self.cells.iter().filter_map(move |(name, cell)| {
            cell.visible_value(now)
                .map(|value| Column::new(name.0.clone(), value.to_vec()))
        })
    }
}

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<Vec<u8>, Row>,
}

/// In-memory wide-row store
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    log: Mutex<Vec<StatementRecord>>,
    clock: Arc<dyn Clock>,
    /// Last store-assigned write timestamp
    last_timestamp: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store on the given clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
            clock,
            last_timestamp: AtomicU64::new(0),
        }
    }

    /// Every statement executed so far, oldest first
    pub fn statements(&self) -> Vec<StatementRecord> {
        self.log.lock().clone()
    }

    /// Number of executed statements of one kind
    pub fn statement_count(&self, kind: StatementKind) -> usize {
        self.log.lock().iter().filter(|s| s.kind == kind).count()
    }

    /// Forget the statement log
    pub fn clear_statements(&self) {
        self.log.lock().clear();
    }

    /// Number of rows with at least one live column or counter
    pub fn live_row_count(&self, table: &str) -> usize {
        let now = self.clock.now_micros();
        let tables = self.tables.read();
        tables.get(table).map_or(0, |t| {
            t.rows
                .values()
                .filter(|row| row.visible(now).next().is_some() || !row.counters.is_empty())
                .count()
        })
    }

    /// Write timestamp for a statement: the caller's, or a fresh one
    ///
    /// Assigned timestamps are wall-clock microseconds, bumped so that
    /// they strictly increase.
    fn write_timestamp(&self, options: &ResolvedOptions) -> u64 {
        if let Some(ts) = options.timestamp {
            return ts.get();
        }
        let now = self.clock.now_micros();
        let mut last = self.last_timestamp.load(Ordering::SeqCst);
        loop {
            let next = now.max(last + 1);
            match self.last_timestamp.compare_exchange(
                last,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }

    fn record(
        &self,
        kind: StatementKind,
        table: &str,
        row_key: Option<&[u8]>,
        column_count: usize,
        options: &ResolvedOptions,
    ) {
        self.log.lock().push(StatementRecord {
            kind,
            table: table.to_string(),
            row_key: row_key.map(<[u8]>::to_vec),
            column_count,
            options: *options,
        });
    }
}

impl StatementExecutor for MemoryStore {
    fn write(
        &self,
        table: &str,
        row_key: &[u8],
        columns: Vec<Column>,
        options: &ResolvedOptions,
    ) -> Result<()> {
        let timestamp = self.write_timestamp(options);
        let now = self.clock.now_micros();
        let requested = columns.len();
        let mut applied = 0;

        {
            let mut tables = self.tables.write();
            let row = tables
                .entry(table.to_string())
                .or_default()
                .rows
                .entry(row_key.to_vec())
                .or_default();

            for column in columns {
                if row.is_shadowed(&column.name, timestamp) {
                    continue;
                }
                let key = ColumnKey(column.name);
                if let Some(existing) = row.cells.get(&key) {
                    if !existing.is_superseded_by(timestamp) {
                        continue;
                    }
                }
                row.cells
                    .insert(key, Cell::live(column.value, timestamp, now, options.ttl));
                applied += 1;
            }
        }

        self.record(StatementKind::Write, table, Some(row_key), requested, options);
        debug!(target: "wideorm::store", table, requested, applied, "write");
        Ok(())
    }

    fn delete(
        &self,
        table: &str,
        row_key: &[u8],
        selection: &ColumnSelection,
        options: &ResolvedOptions,
    ) -> Result<()> {
        let timestamp = self.write_timestamp(options);
        let now = self.clock.now_micros();

        {
            let mut tables = self.tables.write();
            let row = tables
                .entry(table.to_string())
                .or_default()
                .rows
                .entry(row_key.to_vec())
                .or_default();

            match selection {
                ColumnSelection::All => row.delete_prefix(&[], timestamp),
                ColumnSelection::Prefix(prefix) => row.delete_prefix(prefix, timestamp),
                ColumnSelection::Names(names) => {
                    for name in names {
                        row.delete_column(name, timestamp, now);
                    }
                }
            }
        }

        let count = match selection {
            ColumnSelection::Names(names) => names.len(),
            ColumnSelection::All | ColumnSelection::Prefix(_) => 0,
        };
        self.record(StatementKind::Delete, table, Some(row_key), count, options);
        debug!(target: "wideorm::store", table, "delete");
        Ok(())
    }

    fn read(
        &self,
        table: &str,
        row_key: &[u8],
        selection: &ColumnSelection,
        options: &ResolvedOptions,
    ) -> Result<Vec<Column>> {
        let now = self.clock.now_micros();
        let columns: Vec<Column> = {
            let tables = self.tables.read();
            match tables.get(table).and_then(|t| t.rows.get(row_key)) {
                None => Vec::new(),
                Some(row) => match selection {
                    ColumnSelection::All => row.visible(now).collect(),
                    ColumnSelection::Prefix(prefix) => row
                        .visible(now)
                        .filter(|c| c.name.starts_with(prefix))
                        .collect(),
                    ColumnSelection::Names(names) => {
                        let wanted: HashSet<&[u8]> = names.iter().map(Vec::as_slice).collect();
                        row.visible(now)
                            .filter(|c| wanted.contains(c.name.as_slice()))
                            .collect()
                    }
                },
            }
        };

        self.record(StatementKind::Read, table, Some(row_key), columns.len(), options);
        trace!(target: "wideorm::store", table, columns = columns.len(), "read");
        Ok(columns)
    }

    fn read_range(
        &self,
        table: &str,
        row_key: &[u8],
        range: &ColumnRange,
        options: &ResolvedOptions,
    ) -> Result<Vec<Column>> {
        let now = self.clock.now_micros();
        let (lower, upper) = if range.reverse {
            (range.end.as_ref(), range.start.as_ref())
        } else {
            (range.start.as_ref(), range.end.as_ref())
        };
        let inverted = match (lower, upper) {
            (Some(lo), Some(hi)) => CompositeKeyCodec::compare(lo, hi) == CmpOrdering::Greater,
            _ => false,
        };
        let limit = range.limit.unwrap_or(usize::MAX);

        let columns: Vec<Column> = if inverted {
            Vec::new()
        } else {
            let tables = self.tables.read();
            match tables.get(table).and_then(|t| t.rows.get(row_key)) {
                None => Vec::new(),
                Some(row) => {
                    let bound = |b: Option<&Vec<u8>>| {
                        b.map_or(Bound::Unbounded, |b| Bound::Included(ColumnKey(b.clone())))
                    };
                    let scan = row.cells.range((bound(lower), bound(upper)));
                    let visible = |(name, cell): (&ColumnKey, &Cell)| {
                        cell.visible_value(now)
                            .map(|value| Column::new(name.0.clone(), value.to_vec()))
                    };
                    if range.reverse {
                        scan.rev().filter_map(visible).take(limit).collect()
                    } else {
                        scan.filter_map(visible).take(limit).collect()
                    }
                }
            }
        };

        self.record(
            StatementKind::RangeRead,
            table,
            Some(row_key),
            columns.len(),
            options,
        );
        debug!(
            target: "wideorm::store",
            table,
            reverse = range.reverse,
            columns = columns.len(),
            "range read"
        );
        Ok(columns)
    }

    fn read_index(
        &self,
        table: &str,
        column_name: &[u8],
        value: &[u8],
        options: &ResolvedOptions,
    ) -> Result<Vec<IndexedRow>> {
        let now = self.clock.now_micros();
        let key = ColumnKey(column_name.to_vec());
        let rows: Vec<IndexedRow> = {
            let tables = self.tables.read();
            match tables.get(table) {
                None => Vec::new(),
                Some(t) => t
                    .rows
                    .iter()
                    .filter(|(_, row)| {
                        row.cells
                            .get(&key)
                            .and_then(|cell| cell.visible_value(now))
                            .map_or(false, |stored| stored == value)
                    })
                    .map(|(row_key, row)| IndexedRow {
                        row_key: row_key.clone(),
                        columns: row.visible(now).collect(),
                    })
                    .collect(),
            }
        };

        self.record(StatementKind::IndexRead, table, None, rows.len(), options);
        debug!(target: "wideorm::store", table, rows = rows.len(), "index read");
        Ok(rows)
    }

    fn increment_counter(
        &self,
        table: &str,
        row_key: &[u8],
        column_name: &[u8],
        delta: i64,
        options: &ResolvedOptions,
    ) -> Result<()> {
        {
            let mut tables = self.tables.write();
            let counter = tables
                .entry(table.to_string())
                .or_default()
                .rows
                .entry(row_key.to_vec())
                .or_default()
                .counters
                .entry(ColumnKey(column_name.to_vec()))
                .or_insert(0);
            *counter = counter.saturating_add(delta);
        }

        self.record(
            StatementKind::CounterIncrement,
            table,
            Some(row_key),
            1,
            options,
        );
        trace!(target: "wideorm::store", table, delta, "counter increment");
        Ok(())
    }

    fn read_counter(
        &self,
        table: &str,
        row_key: &[u8],
        column_name: &[u8],
        options: &ResolvedOptions,
    ) -> Result<Option<i64>> {
        let value = {
            let tables = self.tables.read();
            tables
                .get(table)
                .and_then(|t| t.rows.get(row_key))
                .and_then(|row| row.counters.get(&ColumnKey(column_name.to_vec())))
                .copied()
        };

        self.record(StatementKind::CounterRead, table, Some(row_key), 1, options);
        Ok(value)
    }
}
