//! Per-operation options
//!
//! The store has no transactions. Each statement instead carries a
//! consistency level, an optional TTL and an optional write timestamp.
//!
//! - [`Options`]: what a caller asks for on one call (every field optional)
//! - [`GlobalDefaults`]: process-wide defaults handed to the context factory
//! - [`ResolvedOptions`]: the merged triple attached to a statement
//!
//! Absence is meaningful everywhere: a field left `None` inherits from the
//! next precedence tier, and a field absent at every tier is left to the
//! executor's own default. Zero is never used as a placeholder.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::{NonZeroU32, NonZeroU64};
use std::str::FromStr;

use crate::error::Error;

/// Read/write quorum policy requested for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyLevel {
    /// Write succeeds when any node (hinted handoff included) accepted it
    Any,
    /// One replica
    One,
    /// Two replicas
    Two,
    /// Three replicas
    Three,
    /// Majority of replicas
    Quorum,
    /// One replica in the local datacenter
    LocalOne,
    /// Majority of replicas in the local datacenter
    LocalQuorum,
    /// Majority of replicas in every datacenter
    EachQuorum,
    /// Every replica
    All,
}

impl ConsistencyLevel {
    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::Any => "ANY",
            ConsistencyLevel::One => "ONE",
            ConsistencyLevel::Two => "TWO",
            ConsistencyLevel::Three => "THREE",
            ConsistencyLevel::Quorum => "QUORUM",
            ConsistencyLevel::LocalOne => "LOCAL_ONE",
            ConsistencyLevel::LocalQuorum => "LOCAL_QUORUM",
            ConsistencyLevel::EachQuorum => "EACH_QUORUM",
            ConsistencyLevel::All => "ALL",
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsistencyLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ANY" => Ok(ConsistencyLevel::Any),
            "ONE" => Ok(ConsistencyLevel::One),
            "TWO" => Ok(ConsistencyLevel::Two),
            "THREE" => Ok(ConsistencyLevel::Three),
            "QUORUM" => Ok(ConsistencyLevel::Quorum),
            "LOCAL_ONE" => Ok(ConsistencyLevel::LocalOne),
            "LOCAL_QUORUM" => Ok(ConsistencyLevel::LocalQuorum),
            "EACH_QUORUM" => Ok(ConsistencyLevel::EachQuorum),
            "ALL" => Ok(ConsistencyLevel::All),
            other => Err(Error::config(format!(
                "unknown consistency level '{}'",
                other
            ))),
        }
    }
}

/// Options supplied by the caller for one operation
///
/// # Example
///
/// ```
/// use wideorm_core::{ConsistencyLevel, Options};
///
/// let options = Options::new()
///     .with_consistency(ConsistencyLevel::EachQuorum)
///     .with_ttl(150)
///     .with_timestamp(100);
/// assert_eq!(options.ttl(), Some(150));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    consistency: Option<ConsistencyLevel>,
    ttl: Option<u32>,
    timestamp: Option<u64>,
}

impl Options {
    /// No explicit options: every field inherits
    pub const fn new() -> Self {
        Options {
            consistency: None,
            ttl: None,
            timestamp: None,
        }
    }

    /// Options carrying only a consistency level
    pub const fn with_consistency_level(level: ConsistencyLevel) -> Self {
        Options {
            consistency: Some(level),
            ttl: None,
            timestamp: None,
        }
    }

    /// Set the consistency level
    pub fn with_consistency(mut self, level: ConsistencyLevel) -> Self {
        self.consistency = Some(level);
        self
    }

    /// Set the TTL in seconds (must be positive, checked at resolution)
    pub fn with_ttl(mut self, seconds: u32) -> Self {
        self.ttl = Some(seconds);
        self
    }

    /// Set the write timestamp (must be positive, checked at resolution)
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Requested consistency level
    pub fn consistency(&self) -> Option<ConsistencyLevel> {
        self.consistency
    }

    /// Requested TTL in seconds
    pub fn ttl(&self) -> Option<u32> {
        self.ttl
    }

    /// Requested write timestamp
    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.consistency.is_none() && self.ttl.is_none() && self.timestamp.is_none()
    }
}

/// Process-wide defaults, the lowest precedence tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalDefaults {
    /// Default consistency for reads
    pub read_consistency: Option<ConsistencyLevel>,
    /// Default consistency for writes
    pub write_consistency: Option<ConsistencyLevel>,
    /// Default TTL applied to writes
    pub ttl: Option<NonZeroU32>,
}

/// Fully resolved options attached to one statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedOptions {
    /// Consistency level, or `None` for the executor default
    pub consistency: Option<ConsistencyLevel>,
    /// TTL in seconds, or `None` for no expiry
    pub ttl: Option<NonZeroU32>,
    /// Write timestamp, or `None` for executor-assigned
    pub timestamp: Option<NonZeroU64>,
}

impl ResolvedOptions {
    /// Resolved options with every field absent
    pub const fn none() -> Self {
        ResolvedOptions {
            consistency: None,
            ttl: None,
            timestamp: None,
        }
    }
}
