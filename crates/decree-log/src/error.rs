//! # error
//!
//! why: make every failure of the log core an explicit value the embedder can act on
//! relations: returned by window.rs, prepare_list.rs, config.rs, replica.rs
//! what: WindowError, ProtocolViolation, PrepareError, ConfigError

use crate::mutation::Decree;
use crate::role::ReplicaRole;
use thiserror::Error;

/// Why the mutation window refused a mutation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("decree {decree} is at or below the window floor {floor}")]
    DecreeTooOld { decree: Decree, floor: Decree },

    #[error("decree {decree} is beyond window capacity (floor {floor}, capacity {capacity})")]
    CapacityExceeded {
        decree: Decree,
        floor: Decree,
        capacity: usize,
    },

    #[error("slot for decree {decree} already holds a different mutation")]
    SlotOccupied { decree: Decree },
}

impl WindowError {
    /// Both an out-of-range decree and an occupied slot count as the window
    /// being unable to take the mutation right now.
    pub fn is_capacity_class(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. } | Self::SlotOccupied { .. })
    }
}

/// A sequencing bug upstream. The watermark must not move past one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("decree {decree} is not above committed decree {committed}")]
    StaleDecree { decree: Decree, committed: Decree },

    #[error("forced commit needs decree {decree} but it is not buffered")]
    MissingMutation { decree: Decree },

    #[error("watermark mismatch: committed {committed}, window floor {floor}, window min {min}")]
    WatermarkMismatch {
        committed: Decree,
        floor: Decree,
        min: Decree,
    },

    #[error("learner window out of sync: min decree {min}, committed {committed}")]
    LearnerOutOfSync { min: Decree, committed: Decree },

    #[error("learner at {committed} cannot free a slot: primary only advertises {advertised}")]
    LearnerAheadOfPrimary {
        advertised: Decree,
        committed: Decree,
    },

    #[error("{role} replica could not buffer decree {decree}: {source}")]
    BufferRejected {
        role: ReplicaRole,
        decree: Decree,
        #[source]
        source: WindowError,
    },

    #[error("commit handler failed at decree {decree}: {reason}")]
    HandlerFailed { decree: Decree, reason: String },

    #[error("cannot truncate to {decree}, already committed {committed}")]
    TruncateBehindWatermark { decree: Decree, committed: Decree },
}

/// Outcome of a failed prepare
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrepareError {
    /// Recoverable; the caller may commit and retry or apply backpressure
    #[error("prepare list is full: {0}")]
    CapacityExceeded(#[source] WindowError),

    #[error("protocol violation: {0}")]
    Fatal(#[from] ProtocolViolation),
}

impl PrepareError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log config: {0}")]
    Invalid(String),

    #[error("log config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
