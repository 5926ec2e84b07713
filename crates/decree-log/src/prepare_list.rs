//! # prepare_list
//!
//! why: turn raw buffering into a commit protocol that depends on the replica's role
//! relations: wraps window.rs, driven by replica.rs, delivers to a CommitHandler
//! what: CommitHandler trait, PrepareList with prepare/commit/truncate/reset
//!
//! The list owns the committed-decree watermark. Outside of reconciliation
//! gaps, every committed decree is handed to the commit handler exactly once
//! and in strictly increasing order, from inside the call that committed it.

use crate::config::LogConfig;
use crate::error::{ConfigError, PrepareError, ProtocolViolation, WindowError};
use crate::logging;
use crate::mutation::{Decree, Mutation};
use crate::role::ReplicaRole;
use crate::window::MutationWindow;

/// Applies a committed mutation to the state machine
///
/// Called synchronously, once per committed decree, in decree order.
/// Implementations that defer work must keep that order visible to readers.
pub trait CommitHandler {
    fn commit(&mut self, mutation: Mutation);

    /// Why this handler can no longer apply commits, if it can't.
    /// Consulted before and after every delivery; a fault stops the watermark.
    fn fault(&self) -> Option<String> {
        None
    }
}

impl<F> CommitHandler for F
where
    F: FnMut(Mutation),
{
    fn commit(&mut self, mutation: Mutation) {
        self(mutation)
    }
}

/// Role-aware commit controller over a [`MutationWindow`]
#[derive(Debug)]
pub struct PrepareList<H> {
    window: MutationWindow,
    committed_decree: Decree,
    handler: H,
    log_events: bool,
}

impl<H: CommitHandler> PrepareList<H> {
    /// Create a list with nothing buffered and `init_decree` committed
    pub fn new(init_decree: Decree, capacity: usize, handler: H) -> Self {
        Self {
            window: MutationWindow::new(init_decree, capacity),
            committed_decree: init_decree,
            handler,
            log_events: true,
        }
    }

    /// Create a list sized by `config`, refusing a config that fails validation
    pub fn with_config(
        init_decree: Decree,
        config: &LogConfig,
        handler: H,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut list = Self::new(init_decree, config.max_prepare_count, handler);
        list.log_events = config.log_events;
        Ok(list)
    }

    // -- accessors --

    pub fn committed_decree(&self) -> Decree {
        self.committed_decree
    }

    pub fn min_decree(&self) -> Decree {
        self.window.min_decree()
    }

    pub fn max_decree(&self) -> Decree {
        self.window.max_decree()
    }

    pub fn count(&self) -> usize {
        self.window.count()
    }

    pub fn capacity(&self) -> usize {
        self.window.capacity()
    }

    pub fn get(&self, decree: Decree) -> Option<&Mutation> {
        self.window.get(decree)
    }

    pub fn window(&self) -> &MutationWindow {
        &self.window
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Flag a buffered mutation as ready for ordered commit.
    /// Returns false when nothing is buffered at `decree`.
    pub fn mark_ready(&mut self, decree: Decree) -> bool {
        match self.window.get_mut(decree) {
            Some(mutation) => {
                mutation.mark_ready();
                true
            }
            None => false,
        }
    }

    // -- protocol --

    /// Buffer `mutation` following the rules of `role`.
    ///
    /// A decree at or below the committed decree is always fatal.
    pub fn prepare(&mut self, mutation: Mutation, role: ReplicaRole) -> Result<(), PrepareError> {
        let decree = mutation.decree;
        if decree <= self.committed_decree {
            return Err(self
                .violation(ProtocolViolation::StaleDecree {
                    decree,
                    committed: self.committed_decree,
                })
                .into());
        }
        if self.log_events {
            logging::prepare(role, decree, mutation.last_committed_decree);
        }

        match role {
            ReplicaRole::Primary => self.window.put(mutation).map_err(|err| {
                if err.is_capacity_class() {
                    PrepareError::CapacityExceeded(err)
                } else {
                    self.buffer_rejected(role, decree, err).into()
                }
            }),

            ReplicaRole::Secondary => {
                self.commit(mutation.last_committed_decree, true)?;
                self.buffer(role, mutation)
            }

            ReplicaRole::PotentialSecondary => {
                while let Err(WindowError::CapacityExceeded { .. }) = self.window.check_range(decree) {
                    self.free_learner_slot(&mutation)?;
                }
                self.buffer(role, mutation)
            }

            ReplicaRole::Inactive => {
                self.reconcile(mutation.last_committed_decree)?;
                self.buffer(role, mutation)
            }
        }
    }

    /// Commit up to `decree`.
    ///
    /// Ordered (`force == false`): only acts when `decree` is the next one to
    /// commit and is buffered, then keeps going through consecutive buffered
    /// mutations that are ready. Forced: commits everything up to and
    /// including `decree`, each of which must be buffered.
    ///
    /// Returns whether at least one decree was committed. Asking for an
    /// already committed or non-sequential decree is a harmless `Ok(false)`.
    pub fn commit(&mut self, decree: Decree, force: bool) -> Result<bool, ProtocolViolation> {
        if decree <= self.committed_decree {
            return Ok(false);
        }

        if !force {
            if decree != self.committed_decree + 1 || self.window.get(decree).is_none() {
                return Ok(false);
            }
            self.commit_next(false)?;
            while let Some(next) = self.committed_decree.checked_add(1) {
                if !self.window.get(next).map_or(false, Mutation::is_ready) {
                    break;
                }
                self.commit_next(false)?;
            }
        } else {
            for next in self.committed_decree + 1..=decree {
                if self.window.get(next).is_none() {
                    return Err(self.violation(ProtocolViolation::MissingMutation { decree: next }));
                }
                self.commit_next(true)?;
            }
        }

        Ok(true)
    }

    /// Drop buffered mutations up to `decree` without delivering them and
    /// move the watermark there. Used when their effects are already in the
    /// state machine, e.g. after restoring a checkpoint.
    pub fn truncate(&mut self, decree: Decree) -> Result<(), ProtocolViolation> {
        if decree < self.committed_decree {
            return Err(self.violation(ProtocolViolation::TruncateBehindWatermark {
                decree,
                committed: self.committed_decree,
            }));
        }
        let before = self.window.count();
        self.window.reset(decree, false);
        self.committed_decree = decree;
        if self.log_events {
            logging::truncate(decree, before - self.window.count());
        }
        Ok(())
    }

    /// Forget everything buffered and restart from `decree`
    pub fn reset(&mut self, decree: Decree) {
        let discarded = self.window.count();
        self.window.reset(decree, true);
        self.committed_decree = decree;
        if self.log_events {
            logging::reset(decree, discarded);
        }
    }

    // -- internals --

    fn buffer(&mut self, role: ReplicaRole, mutation: Mutation) -> Result<(), PrepareError> {
        let decree = mutation.decree;
        self.window
            .put(mutation)
            .map_err(|err| self.buffer_rejected(role, decree, err).into())
    }

    /// Learner overflow: commit exactly the next decree to open one slot
    fn free_learner_slot(&mut self, incoming: &Mutation) -> Result<(), ProtocolViolation> {
        let next = self.committed_decree + 1;
        if self.window.is_empty() || self.window.min_decree() != next {
            return Err(self.violation(ProtocolViolation::LearnerOutOfSync {
                min: self.window.min_decree(),
                committed: self.committed_decree,
            }));
        }
        if incoming.last_committed_decree <= self.committed_decree {
            return Err(self.violation(ProtocolViolation::LearnerAheadOfPrimary {
                advertised: incoming.last_committed_decree,
                committed: self.committed_decree,
            }));
        }
        if self.log_events {
            logging::learner_force_commit(next, incoming.decree);
        }
        self.commit(next, true)?;
        Ok(())
    }

    /// Bring an inactive replica's watermark up to the advertised commit point
    fn reconcile(&mut self, advertised: Decree) -> Result<(), ProtocolViolation> {
        let from = self.committed_decree;
        if advertised > self.window.max_decree() {
            // nothing buffered can still matter, jump straight there
            self.window.reset(advertised, true);
            self.committed_decree = advertised;
            if self.log_events {
                logging::reconcile(from, advertised, 0);
            }
            return Ok(());
        }
        if advertised <= self.committed_decree {
            return Ok(());
        }

        let mut replayed = 0;
        let mut gap_start = None;
        for decree in from + 1..=advertised {
            if self.window.is_empty() {
                gap_start.get_or_insert(decree);
                break;
            }
            if self.window.min_decree() == decree {
                if let Some(start) = gap_start.take() {
                    logging::reconcile_gap(start, decree - 1);
                }
                self.check_handler(decree)?;
                self.committed_decree = decree;
                if let Some(mutation) = self.window.pop_min() {
                    self.deliver(decree, mutation)?;
                    replayed += 1;
                }
            } else {
                gap_start.get_or_insert(decree);
            }
        }
        if let Some(start) = gap_start {
            logging::reconcile_gap(start, advertised);
        }

        self.committed_decree = advertised;
        self.window.reset(advertised, false);
        if self.log_events {
            logging::reconcile(from, advertised, replayed);
        }
        self.check_watermark()
    }

    fn commit_next(&mut self, forced: bool) -> Result<(), ProtocolViolation> {
        let next = match self.committed_decree.checked_add(1) {
            Some(next) => next,
            None => return Err(self.watermark_mismatch()),
        };
        if self.window.min_decree() != next {
            return Err(self.watermark_mismatch());
        }
        self.check_handler(next)?;
        let mutation = match self.window.pop_min() {
            Some(mutation) => mutation,
            None => return Err(self.violation(ProtocolViolation::MissingMutation { decree: next })),
        };

        self.committed_decree = next;
        if self.log_events {
            logging::commit(next, forced);
        }
        self.deliver(next, mutation)?;
        self.check_watermark()
    }

    fn deliver(&mut self, decree: Decree, mutation: Mutation) -> Result<(), ProtocolViolation> {
        self.handler.commit(mutation);
        self.check_handler(decree)
    }

    fn check_handler(&self, decree: Decree) -> Result<(), ProtocolViolation> {
        match self.handler.fault() {
            Some(reason) => Err(self.violation(ProtocolViolation::HandlerFailed { decree, reason })),
            None => Ok(()),
        }
    }

    /// The floor must sit on the watermark and every buffered decree above it
    fn check_watermark(&self) -> Result<(), ProtocolViolation> {
        let floor_matches = self.window.floor() == self.committed_decree;
        let min_above = self.window.is_empty() || self.window.min_decree() > self.committed_decree;
        if floor_matches && min_above {
            Ok(())
        } else {
            Err(self.watermark_mismatch())
        }
    }

    fn watermark_mismatch(&self) -> ProtocolViolation {
        self.violation(ProtocolViolation::WatermarkMismatch {
            committed: self.committed_decree,
            floor: self.window.floor(),
            min: self.window.min_decree(),
        })
    }

    fn buffer_rejected(&self, role: ReplicaRole, decree: Decree, source: WindowError) -> ProtocolViolation {
        self.violation(ProtocolViolation::BufferRejected { role, decree, source })
    }

    fn violation(&self, violation: ProtocolViolation) -> ProtocolViolation {
        logging::protocol_violation(&violation);
        violation
    }
}
