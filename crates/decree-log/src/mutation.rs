//! # mutation
//!
//! why: represent one entry of the decree-ordered replicated log
//! relations: buffered by window.rs, drained through prepare_list.rs to a CommitHandler
//! what: Decree alias, Mutation struct, readiness flag

use serde::{Deserialize, Serialize};

/// Position of a mutation in the replicated log. 0 means nothing committed yet.
pub type Decree = u64;

/// A single entry in the replicated log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    /// The position of this mutation in the log (1-indexed)
    pub decree: Decree,
    /// The proposer's committed decree when this mutation was proposed
    pub last_committed_decree: Decree,
    /// Opaque payload handed to the state machine on commit
    pub payload: Vec<u8>,
    /// Set by the replication engine once the mutation may be committed in order
    ready: bool,
}

impl Mutation {
    /// Create a new, not-yet-ready mutation
    pub fn new(decree: Decree, last_committed_decree: Decree, payload: Vec<u8>) -> Self {
        Self {
            decree,
            last_committed_decree,
            payload,
            ready: false,
        }
    }

    /// Builder-style variant of [`Mutation::mark_ready`]
    pub fn with_ready(mut self, ready: bool) -> Self {
        self.ready = ready;
        self
    }

    /// Flag this mutation as eligible for ordered commit (e.g. write quorum acked)
    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Whether two mutations carry the same log content. The readiness flag
    /// is local bookkeeping and is ignored.
    pub fn same_content(&self, other: &Mutation) -> bool {
        self.decree == other.decree
            && self.last_committed_decree == other.last_committed_decree
            && self.payload == other.payload
    }
}
