//! Slice and index queries
//!
//! [`SliceRangeBuilder`] turns clustering bounds into encoded composite
//! boundaries and hands them to the range-scan executor. It also encodes
//! the point-equality lookup used by single-condition index queries.
//!
//! [`SliceQueryBuilder`] is the typed, fluent entry point built on top of
//! it.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use wideorm_core::{
    CompositeColumnName, CompositeKeyCodec, ConsistencyLevel, Entity, EntityMeta, Error, Options,
    PropertyMeta, ResolvedOptions, Result, SliceBounds, Value,
};
use wideorm_storage::{Column, ColumnRange, IndexedRow, StatementExecutor};

use crate::context::PersistenceContextFactory;
use crate::options::OperationKind;
use crate::proxy::EntityProxy;

/// Entities returned by a slice query when no limit is given
pub const DEFAULT_SLICE_LIMIT: usize = 100;

/// Clustering bounds of one slice
///
/// `start` and `end` are leading clustering components; trailing nulls
/// leave the remaining components open. When `reverse` is set, `start` is
/// the larger bound.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceRange {
    /// Where iteration starts, `None` for the partition edge
    pub start: Option<Vec<Value>>,
    /// Where iteration ends, `None` for the partition edge
    pub end: Option<Vec<Value>>,
    /// Include entities matching `start`
    pub inclusive_start: bool,
    /// Include entities matching `end`
    pub inclusive_end: bool,
    /// Iterate in descending clustering order
    pub reverse: bool,
}

impl Default for SliceRange {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            inclusive_start: true,
            inclusive_end: true,
            reverse: false,
        }
    }
}

/// A single equality condition on an indexed column
#[derive(Debug, Clone, PartialEq)]
pub struct IndexCondition {
    /// Property name
    pub column: String,
    /// Value the column must hold
    pub value: Value,
}

impl IndexCondition {
    /// Condition `column == value`
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

// ============================================================================
// SliceRangeBuilder
// ============================================================================

/// Encodes slice bounds and index lookups for the executor
#[derive(Clone)]
pub struct SliceRangeBuilder {
    executor: Arc<dyn StatementExecutor>,
    codec: CompositeKeyCodec,
}

impl std::fmt::Debug for SliceRangeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SliceRangeBuilder").finish_non_exhaustive()
    }
}

impl SliceRangeBuilder {
    /// Builder over an executor
    pub fn new(executor: Arc<dyn StatementExecutor>) -> Self {
        Self {
            executor,
            codec: CompositeKeyCodec::new(),
        }
    }

    /// Encoded start and end of a slice over `clustering`
    pub fn bounds(&self, clustering: &PropertyMeta, range: &SliceRange) -> Result<SliceBounds> {
        self.codec.build_range(
            clustering,
            range.start.as_ref(),
            range.inclusive_start,
            range.end.as_ref(),
            range.inclusive_end,
            range.reverse,
        )
    }

    /// Range-scan one partition row
    ///
    /// `column_limit` caps the number of columns, not entities.
    pub fn slice(
        &self,
        table: &str,
        row_key: &[u8],
        clustering: &PropertyMeta,
        range: &SliceRange,
        column_limit: Option<usize>,
        options: &ResolvedOptions,
    ) -> Result<Vec<Column>> {
        let bounds = self.bounds(clustering, range)?;
        let column_range = ColumnRange {
            start: bounds.start.as_ref().map(CompositeColumnName::encode),
            end: bounds.end.as_ref().map(CompositeColumnName::encode),
            reverse: range.reverse,
            limit: column_limit,
        };

        let columns = self
            .executor
            .read_range(table, row_key, &column_range, options)?;
        debug!(
            target: "wideorm::slice",
            table,
            reverse = range.reverse,
            bounded_start = column_range.start.is_some(),
            bounded_end = column_range.end.is_some(),
            columns = columns.len(),
            "slice"
        );
        Ok(columns)
    }

    /// Rows whose `property` column holds exactly `value`
    ///
    /// Only meaningful for entities without clustering components, whose
    /// column names are the bare property name.
    pub fn index_lookup(
        &self,
        table: &str,
        property: &PropertyMeta,
        value: &Value,
        options: &ResolvedOptions,
    ) -> Result<Vec<IndexedRow>> {
        let codec = property.value_codec().ok_or_else(|| {
            Error::validation(format!("property '{}' cannot be indexed", property.name()))
        })?;
        if value.is_null() {
            return Err(Error::validation(format!(
                "index condition on '{}' has a null value",
                property.name()
            )));
        }
        let column = CompositeColumnName::new()
            .with_component(property.name().as_bytes().to_vec())?
            .encode();
        let encoded = codec.serialize(value)?;

        let rows = self
            .executor
            .read_index(table, &column, &encoded, options)?;
        debug!(target: "wideorm::slice", table, property = property.name(), rows = rows.len(), "index lookup");
        Ok(rows)
    }
}

// ============================================================================
// SliceQueryBuilder
// ============================================================================

/// Fluent slice query over one partition of a clustered entity
///
/// ```ignore
/// let tweets = manager
///     .slice_query::<Tweet>()?
///     .partition_key(user_id)
///     .from_clustering([Value::from(10i64)])
///     .reverse()
///     .limit(20)
///     .get()?;
/// ```
pub struct SliceQueryBuilder<'m, E: Entity> {
    factory: &'m PersistenceContextFactory,
    meta: Arc<EntityMeta>,
    partition: Option<Value>,
    range: SliceRange,
    limit: usize,
    consistency: Option<ConsistencyLevel>,
    _entity: PhantomData<fn() -> E>,
}

impl<'m, E: Entity> std::fmt::Debug for SliceQueryBuilder<'m, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SliceQueryBuilder")
            .field("entity", &self.meta.entity_name())
            .field("partition", &self.partition)
            .field("range", &self.range)
            .field("limit", &self.limit)
            .field("consistency", &self.consistency)
            .finish_non_exhaustive()
    }
}

impl<'m, E: Entity> SliceQueryBuilder<'m, E> {
    pub(crate) fn new(factory: &'m PersistenceContextFactory, meta: Arc<EntityMeta>) -> Self {
        Self {
            factory,
            meta,
            partition: None,
            range: SliceRange::default(),
            limit: DEFAULT_SLICE_LIMIT,
            consistency: None,
            _entity: PhantomData,
        }
    }

    /// Partition (first primary key component) to scan
    pub fn partition_key(mut self, value: impl Into<Value>) -> Self {
        self.partition = Some(value.into());
        self
    }

    /// Leading clustering components where the slice starts
    pub fn from_clustering<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.range.start = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Leading clustering components where the slice ends
    pub fn to_clustering<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.range.end = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Inclusivity of both bounds (inclusive by default)
    pub fn bounds(mut self, inclusive_start: bool, inclusive_end: bool) -> Self {
        self.range.inclusive_start = inclusive_start;
        self.range.inclusive_end = inclusive_end;
        self
    }

    /// Iterate in descending clustering order
    pub fn reverse(mut self) -> Self {
        self.range.reverse = true;
        self
    }

    /// Maximum number of entities
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Read consistency of the scan
    pub fn consistency(mut self, level: ConsistencyLevel) -> Self {
        self.consistency = Some(level);
        self
    }

    /// Run the query, one proxy per entity in scan order
    ///
    /// # Errors
    ///
    /// Returns `Validation` when no partition key was given or the limit
    /// is zero, and `InvalidKeyComponents` for bounds with holes.
    pub fn get(self) -> Result<Vec<EntityProxy<E>>> {
        let partition = self
            .partition
            .ok_or_else(|| Error::validation("slice query needs a partition key"))?;
        if self.limit == 0 {
            return Err(Error::validation("slice limit must be positive"));
        }
        let clustering = self.meta.clustering_meta().ok_or_else(|| {
            Error::validation(format!(
                "'{}' has no clustering key to slice on",
                self.meta.entity_name()
            ))
        })?;

        let options = match self.consistency {
            Some(level) => Options::with_consistency_level(level),
            None => Options::new(),
        };
        let core = self.factory.core(Arc::clone(&self.meta), options);
        let resolved = core.resolve(OperationKind::Read)?;
        let row_key = core.partition_row_key(&partition)?;

        // Each entity spans at most one column per property plus its marker
        let per_entity = self.meta.properties().len() + 1;
        let column_limit = self.limit.saturating_mul(per_entity);

        let columns = self.factory.slices().slice(
            self.meta.table_name(),
            &row_key,
            clustering,
            &self.range,
            Some(column_limit),
            &resolved,
        )?;
        let entities = core.materialize_slice::<E>(&partition, &columns, Some(self.limit))?;
        entities
            .into_iter()
            .map(|entity| core.wrap_loaded(entity))
            .collect()
    }

    /// First entity of the slice, if any
    pub fn get_first(self) -> Result<Option<EntityProxy<E>>> {
        Ok(self.limit(1).get()?.into_iter().next())
    }
}
