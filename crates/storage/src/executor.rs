//! Statement executor interface
//!
//! The mapping layer never talks to a cluster directly. It hands encoded
//! statements to a [`StatementExecutor`]: row keys and column names are
//! already composite-encoded, payloads are already serialized, and options
//! are already resolved. Executors apply consistency, TTL and timestamp
//! verbatim.

use wideorm_core::{ResolvedOptions, Result};

/// One column of a row: encoded composite name and payload bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Encoded composite column name
    pub name: Vec<u8>,
    /// Serialized payload
    pub value: Vec<u8>,
}

impl Column {
    /// Create a column
    pub fn new(name: Vec<u8>, value: Vec<u8>) -> Self {
        Self { name, value }
    }
}

/// Columns addressed by a read or delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelection {
    /// Every column of the row
    All,
    /// Columns whose encoded name starts with these bytes
    ///
    /// The prefix is an encoded composite whose markers are all exact, so
    /// a byte prefix is a component prefix.
    Prefix(Vec<u8>),
    /// Exactly these encoded names
    Names(Vec<Vec<u8>>),
}

/// Bounds of a range read over one row
///
/// `start` and `end` are encoded composites whose boundary markers already
/// carry inclusivity. Both ends compare inclusively under the composite
/// comparator. When `reverse` is set, `start` is the upper end and columns
/// come back in descending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRange {
    /// Where the scan starts, `None` for the row edge
    pub start: Option<Vec<u8>>,
    /// Where the scan stops, `None` for the row edge
    pub end: Option<Vec<u8>>,
    /// Scan in descending order
    pub reverse: bool,
    /// Maximum number of columns returned
    pub limit: Option<usize>,
}

/// A row returned by an index read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRow {
    /// Row key
    pub row_key: Vec<u8>,
    /// Every live column of the row
    pub columns: Vec<Column>,
}

/// Executes row/column statements against a wide-row store
///
/// Every method is one statement. Implementations must apply a statement
/// atomically with respect to other statements on the same row.
pub trait StatementExecutor: Send + Sync {
    /// Write columns into one row
    fn write(
        &self,
        table: &str,
        row_key: &[u8],
        columns: Vec<Column>,
        options: &ResolvedOptions,
    ) -> Result<()>;

    /// Delete the selected columns of one row (counters included)
    fn delete(
        &self,
        table: &str,
        row_key: &[u8],
        selection: &ColumnSelection,
        options: &ResolvedOptions,
    ) -> Result<()>;

    /// Read the selected live columns of one row, in column order
    fn read(
        &self,
        table: &str,
        row_key: &[u8],
        selection: &ColumnSelection,
        options: &ResolvedOptions,
    ) -> Result<Vec<Column>>;

    /// Read live columns of one row between two bounds
    fn read_range(
        &self,
        table: &str,
        row_key: &[u8],
        range: &ColumnRange,
        options: &ResolvedOptions,
    ) -> Result<Vec<Column>>;

    /// Rows holding `column_name` with exactly `value`
    fn read_index(
        &self,
        table: &str,
        column_name: &[u8],
        value: &[u8],
        options: &ResolvedOptions,
    ) -> Result<Vec<IndexedRow>>;

    /// Add `delta` to a counter column
    fn increment_counter(
        &self,
        table: &str,
        row_key: &[u8],
        column_name: &[u8],
        delta: i64,
        options: &ResolvedOptions,
    ) -> Result<()>;

    /// Current counter value, `None` if never incremented
    fn read_counter(
        &self,
        table: &str,
        row_key: &[u8],
        column_name: &[u8],
        options: &ResolvedOptions,
    ) -> Result<Option<i64>>;
}
