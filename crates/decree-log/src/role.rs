//! # role
//!
//! why: name the replica roles that decide how prepare() buffers and commits
//! relations: passed per call into prepare_list.rs, held by replica.rs
//! what: ReplicaRole enum

use serde::{Deserialize, Serialize};
use std::fmt;

/// The role a replica plays for one partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplicaRole {
    /// Proposes mutations; commits once the caller sees quorum readiness
    Primary,
    /// Follows the primary, chasing its advertised commit point
    Secondary,
    /// Learner catching up; frees window slots by force-committing
    PotentialSecondary,
    /// Reinitializing from a local log
    Inactive,
}

impl Default for ReplicaRole {
    fn default() -> Self {
        Self::Inactive
    }
}

impl fmt::Display for ReplicaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::PotentialSecondary => "potential-secondary",
            Self::Inactive => "inactive",
        };
        f.write_str(name)
    }
}
