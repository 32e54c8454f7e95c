//! Per-operation option resolution
//!
//! Three tiers, highest first: the call, the entity's declared defaults,
//! the process-wide defaults. Each field resolves independently.
//!
//! | field | call | entity | global |
//! |---|---|---|---|
//! | consistency | yes | read/write default | read/write default |
//! | ttl | yes | writes only | writes only |
//! | timestamp | yes | - | - |

use std::num::{NonZeroU32, NonZeroU64};

use wideorm_core::{EntityMeta, Error, GlobalDefaults, Options, ResolvedOptions, Result};

/// Whether an operation reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// find, get_proxy, refresh, initialize, slice and index queries
    Read,
    /// persist, update, remove, remove_by_id
    Write,
}

/// Merges call options with entity and global defaults
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionsResolver {
    global: GlobalDefaults,
}

impl OptionsResolver {
    /// Resolver over the given process-wide defaults
    pub fn new(global: GlobalDefaults) -> Self {
        Self { global }
    }

    /// Process-wide defaults
    pub fn global(&self) -> &GlobalDefaults {
        &self.global
    }

    /// Resolve options for one operation on one entity type
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the call supplies a zero TTL or a zero
    /// timestamp.
    pub fn resolve(
        &self,
        call: &Options,
        meta: &EntityMeta,
        kind: OperationKind,
    ) -> Result<ResolvedOptions> {
        let call_ttl = match call.ttl() {
            None => None,
            Some(secs) => Some(
                NonZeroU32::new(secs).ok_or_else(|| Error::validation("ttl must be positive"))?,
            ),
        };
        let timestamp = match call.timestamp() {
            None => None,
            Some(ts) => Some(
                NonZeroU64::new(ts)
                    .ok_or_else(|| Error::validation("timestamp must be positive"))?,
            ),
        };

        let (entity_consistency, global_consistency) = match kind {
            OperationKind::Read => (meta.read_consistency(), self.global.read_consistency),
            OperationKind::Write => (meta.write_consistency(), self.global.write_consistency),
        };
        let consistency = call
            .consistency()
            .or(entity_consistency)
            .or(global_consistency);

        let ttl = match kind {
            OperationKind::Write => call_ttl.or(meta.default_ttl()).or(self.global.ttl),
            OperationKind::Read => call_ttl,
        };

        Ok(ResolvedOptions {
            consistency,
            ttl,
            timestamp,
        })
    }
}
