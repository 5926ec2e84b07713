//! # logging
//!
//! why: make commit progression observable without coupling to a logger implementation
//! relations: called from prepare_list.rs and replica.rs when `log_events` is on
//! what: event names and one function per event
//!
//! Events go through the [log](https://docs.rs/log/latest/log/) facade. Each line
//! is comma separated: the event name in PascalCase first, then the event fields,
//! for example:
//!
//! ```text
//! Commit, 42, forced
//! ```

use crate::error::ProtocolViolation;
use crate::mutation::Decree;
use crate::role::ReplicaRole;

pub const PREPARE: &str = "Prepare";
pub const COMMIT: &str = "Commit";
pub const TRUNCATE: &str = "Truncate";
pub const RESET: &str = "Reset";
pub const RECONCILE: &str = "Reconcile";
pub const RECONCILE_GAP: &str = "ReconcileGap";
pub const LEARNER_FORCE_COMMIT: &str = "LearnerForceCommit";
pub const ASSIGN_ROLE: &str = "AssignRole";
pub const PROTOCOL_VIOLATION: &str = "ProtocolViolation";

pub(crate) fn prepare(role: ReplicaRole, decree: Decree, advertised: Decree) {
    log::debug!("{}, {}, {}, {}", PREPARE, role, decree, advertised);
}

pub(crate) fn commit(decree: Decree, forced: bool) {
    let mode = if forced { "forced" } else { "ordered" };
    log::debug!("{}, {}, {}", COMMIT, decree, mode);
}

pub(crate) fn truncate(decree: Decree, discarded: usize) {
    log::info!("{}, {}, {}", TRUNCATE, decree, discarded);
}

pub(crate) fn reset(decree: Decree, discarded: usize) {
    log::info!("{}, {}, {}", RESET, decree, discarded);
}

pub(crate) fn reconcile(from: Decree, to: Decree, replayed: usize) {
    log::info!("{}, {}, {}, {}", RECONCILE, from, to, replayed);
}

/// Decrees in `from..=to` were passed over during reconciliation with no
/// buffered mutation to hand to the commit handler.
pub(crate) fn reconcile_gap(from: Decree, to: Decree) {
    log::warn!("{}, {}, {}", RECONCILE_GAP, from, to);
}

pub(crate) fn learner_force_commit(decree: Decree, incoming: Decree) {
    log::debug!("{}, {}, {}", LEARNER_FORCE_COMMIT, decree, incoming);
}

pub(crate) fn assign_role(role: ReplicaRole, decree: Decree) {
    log::info!("{}, {}, {}", ASSIGN_ROLE, role, decree);
}

pub(crate) fn protocol_violation(violation: &ProtocolViolation) {
    log::error!("{}, {}", PROTOCOL_VIOLATION, violation);
}
