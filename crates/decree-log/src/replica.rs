//! # replica
//!
//! why: give the replication engine one handle per partition replica that knows its role
//! relations: owns a PrepareList (prepare_list.rs), tags every prepare with a ReplicaRole (role.rs)
//! what: ReplicaLog driver, LogStatus snapshot

use crate::config::LogConfig;
use crate::error::{ConfigError, PrepareError, ProtocolViolation};
use crate::logging;
use crate::mutation::{Decree, Mutation};
use crate::prepare_list::{CommitHandler, PrepareList};
use crate::role::ReplicaRole;
use serde::{Deserialize, Serialize};

/// Point-in-time view of a replica's log, for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStatus {
    pub role: ReplicaRole,
    pub committed_decree: Decree,
    pub min_decree: Decree,
    pub max_decree: Decree,
    pub count: usize,
    pub capacity: usize,
}

/// The replicated log of a single partition replica
///
/// All calls for one partition must come from one execution context at a
/// time; nothing in here locks.
#[derive(Debug)]
pub struct ReplicaLog<H> {
    role: ReplicaRole,
    list: PrepareList<H>,
    log_events: bool,
}

impl<H: CommitHandler> ReplicaLog<H> {
    /// Create an inactive replica log with nothing committed
    pub fn new(config: &LogConfig, handler: H) -> Result<Self, ConfigError> {
        Ok(Self {
            role: ReplicaRole::Inactive,
            list: PrepareList::with_config(0, config, handler)?,
            log_events: config.log_events,
        })
    }

    pub fn role(&self) -> ReplicaRole {
        self.role
    }

    /// Take on `role` and restart the log from `decree`.
    ///
    /// Called when the replica becomes primary, attaches as a secondary,
    /// starts learning, or reloads a local log while inactive.
    pub fn assign_role(&mut self, role: ReplicaRole, decree: Decree) {
        if self.log_events {
            logging::assign_role(role, decree);
        }
        self.role = role;
        self.list.reset(decree);
    }

    /// Handle an incoming prepare under the current role
    pub fn on_prepare(&mut self, mutation: Mutation) -> Result<(), PrepareError> {
        self.list.prepare(mutation, self.role)
    }

    /// Quorum acknowledged `decree`; returns false if it is not buffered
    pub fn mark_ready(&mut self, decree: Decree) -> bool {
        self.list.mark_ready(decree)
    }

    /// Ordered commit of `decree` and any ready mutations following it
    pub fn on_commit(&mut self, decree: Decree) -> Result<bool, ProtocolViolation> {
        self.list.commit(decree, false)
    }

    /// Effects up to `decree` were restored from a checkpoint
    pub fn on_checkpoint(&mut self, decree: Decree) -> Result<(), ProtocolViolation> {
        self.list.truncate(decree)
    }

    pub fn committed_decree(&self) -> Decree {
        self.list.committed_decree()
    }

    pub fn prepare_list(&self) -> &PrepareList<H> {
        &self.list
    }

    pub fn handler(&self) -> &H {
        self.list.handler()
    }

    pub fn handler_mut(&mut self) -> &mut H {
        self.list.handler_mut()
    }

    pub fn into_handler(self) -> H {
        self.list.into_handler()
    }

    pub fn status(&self) -> LogStatus {
        LogStatus {
            role: self.role,
            committed_decree: self.list.committed_decree(),
            min_decree: self.list.min_decree(),
            max_decree: self.list.max_decree(),
            count: self.list.count(),
            capacity: self.list.capacity(),
        }
    }
}
