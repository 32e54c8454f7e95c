//! Stored cells with write timestamp and optional TTL
//!
//! A cell is one column of one row. Two clocks are involved:
//!
//! - the **write timestamp** decides which of two writes wins (last write
//!   wins, deletes win ties). It is caller-supplied or assigned by the
//!   store, and only compared with other write timestamps.
//! - the **wall clock** decides TTL expiry. It is read from a [`Clock`] so
//!   tests can move time forward.

use std::fmt::Debug;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of wall-clock time in microseconds since the Unix epoch
pub trait Clock: Send + Sync + Debug {
    /// Current time in microseconds
    fn now_micros(&self) -> u64;
}

/// System wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        // Clock before the epoch reads as the epoch
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64
    }
}

/// Manually advanced clock for tests
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    /// Clock starting at `micros`
    pub fn new(micros: u64) -> Self {
        Self {
            micros: AtomicU64::new(micros),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.micros
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.micros.load(Ordering::SeqCst)
    }
}

/// One stored column, or a column tombstone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Payload, `None` for a tombstone
    value: Option<Vec<u8>>,
    /// Write timestamp
    timestamp: u64,
    /// Wall-clock time of the write, for TTL
    written_at: u64,
    /// Time-to-live in seconds
    ttl: Option<NonZeroU32>,
}

impl Cell {
    /// A live cell
    pub fn live(value: Vec<u8>, timestamp: u64, written_at: u64, ttl: Option<NonZeroU32>) -> Self {
        Cell {
            value: Some(value),
            timestamp,
            written_at,
            ttl,
        }
    }

    /// A tombstone
    pub fn tombstone(timestamp: u64, written_at: u64) -> Self {
        Cell {
            value: None,
            timestamp,
            written_at,
            ttl: None,
        }
    }

    /// Payload, when live and not a tombstone
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    /// Write timestamp
    #[inline]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// TTL in seconds
    #[inline]
    pub fn ttl(&self) -> Option<NonZeroU32> {
        self.ttl
    }

    /// True for tombstones
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// Wall-clock time at which the cell expires
    pub fn expiry_micros(&self) -> Option<u64> {
        self.ttl.map(|ttl| {
            self.written_at
                .saturating_add(u64::from(ttl.get()).saturating_mul(1_000_000))
        })
    }

    /// True when the TTL has elapsed at `now`
    pub fn is_expired(&self, now: u64) -> bool {
        self.expiry_micros().map_or(false, |expiry| now >= expiry)
    }

    /// Payload if the cell is readable at `now`
    pub fn visible_value(&self, now: u64) -> Option<&[u8]> {
        if self.is_expired(now) {
            None
        } else {
            self.value()
        }
    }

    /// True when a write at `timestamp` replaces this cell
    ///
    /// Last write wins. On equal timestamps a tombstone is kept.
    pub fn is_superseded_by(&self, timestamp: u64) -> bool {
        if self.is_tombstone() {
            timestamp > self.timestamp
        } else {
            timestamp >= self.timestamp
        }
    }
}
