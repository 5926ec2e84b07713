//! # decree-apply
//!
//! why: consume committed mutations on the state-machine side of the prepare list
//! relations: implements decree-log's CommitHandler, fed by PrepareList / ReplicaLog
//! what: Apply trait, AppliedLog (order-checking recorder), DeferredApplier (worker thread)

use decree_log::{CommitHandler, Decree, Mutation};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("decree {decree} delivered after {previous}")]
    OutOfOrder { previous: Decree, decree: Decree },

    #[error("expected decree {expected}, got {decree}")]
    Gap { expected: Decree, decree: Decree },

    #[error("apply worker is gone")]
    WorkerGone,
}

/// state machine side of a commit
///
/// this abstraction allows the same replica to feed:
/// - a storage engine (production)
/// - a worker thread (via DeferredApplier)
/// - an in-memory recorder (testing)
pub trait Apply {
    /// apply one committed mutation; called in decree order
    fn apply(&mut self, mutation: Mutation);
}

// -- in-memory applied log --

/// in-memory record of every mutation applied, in delivery order
///
/// deliveries that go backwards are not applied and are kept in `errors()`.
/// a strict log additionally refuses gaps, which is right for a replica
/// that is never truncated or reset.
#[derive(Debug, Default)]
pub struct AppliedLog {
    entries: Vec<(Decree, Vec<u8>)>,
    errors: Vec<ApplyError>,
    strict: bool,
}

impl AppliedLog {
    /// create an applied log that tolerates gaps
    pub fn new() -> Self {
        Self::default()
    }

    /// create an applied log that also rejects gaps
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// highest decree applied so far, 0 if none
    pub fn last_applied(&self) -> Decree {
        self.entries.last().map_or(0, |(decree, _)| *decree)
    }

    pub fn decrees(&self) -> Vec<Decree> {
        self.entries.iter().map(|(decree, _)| *decree).collect()
    }

    pub fn payload(&self, decree: Decree) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(d, _)| *d == decree)
            .map(|(_, payload)| payload.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn errors(&self) -> &[ApplyError] {
        &self.errors
    }

    fn check_order(&self, decree: Decree) -> Result<(), ApplyError> {
        let previous = self.last_applied();
        if !self.entries.is_empty() && decree <= previous {
            return Err(ApplyError::OutOfOrder { previous, decree });
        }
        if self.strict && !self.entries.is_empty() && decree != previous + 1 {
            return Err(ApplyError::Gap {
                expected: previous + 1,
                decree,
            });
        }
        Ok(())
    }
}

impl Apply for AppliedLog {
    fn apply(&mut self, mutation: Mutation) {
        match self.check_order(mutation.decree) {
            Ok(()) => self.entries.push((mutation.decree, mutation.payload)),
            Err(err) => {
                log::error!("rejected delivery: {}", err);
                self.errors.push(err);
            }
        }
    }
}

impl CommitHandler for AppliedLog {
    fn commit(&mut self, mutation: Mutation) {
        self.apply(mutation);
    }
}

// -- deferred applier --

/// moves application onto a worker thread
///
/// mutations go through one fifo channel to one worker, so the worker sees
/// them in exactly the order the prepare list committed them. once the worker
/// dies the applier reports a fault, which stops the prepare list from
/// committing anything further.
pub struct DeferredApplier<A> {
    sender: Option<Sender<Mutation>>,
    worker: Option<JoinHandle<A>>,
    sent: u64,
    dropped: u64,
}

impl<A: Apply + Send + 'static> DeferredApplier<A> {
    /// spawn the worker that owns `apply`
    pub fn spawn(mut apply: A) -> Self {
        let (sender, receiver) = mpsc::channel::<Mutation>();
        let worker = thread::spawn(move || {
            for mutation in receiver {
                apply.apply(mutation);
            }
            apply
        });

        Self {
            sender: Some(sender),
            worker: Some(worker),
            sent: 0,
            dropped: 0,
        }
    }

    /// number of mutations handed to the worker
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// number of mutations that could not be handed over because the worker died
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// wait for every queued mutation to be applied and take the state machine back
    pub fn shutdown(mut self) -> Result<A, ApplyError> {
        self.sender.take();
        let worker = self.worker.take().ok_or(ApplyError::WorkerGone)?;
        worker.join().map_err(|_| ApplyError::WorkerGone)
    }
}

impl<A> CommitHandler for DeferredApplier<A> {
    fn fault(&self) -> Option<String> {
        if self.dropped > 0 {
            return Some(format!(
                "apply worker gone, {} decrees not applied",
                self.dropped
            ));
        }
        match &self.worker {
            Some(worker) if worker.is_finished() => Some("apply worker stopped".to_string()),
            Some(_) => None,
            None => Some("apply worker shut down".to_string()),
        }
    }

    fn commit(&mut self, mutation: Mutation) {
        let decree = mutation.decree;
        let delivered = self
            .sender
            .as_ref()
            .map_or(false, |sender| sender.send(mutation).is_ok());
        if delivered {
            self.sent += 1;
        } else {
            self.dropped += 1;
            log::error!("apply worker gone, decree {} not applied", decree);
        }
    }
}

impl<A> Drop for DeferredApplier<A> {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("apply worker panicked, {} decrees handed over", self.sent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mu(decree: Decree) -> Mutation {
        Mutation::new(decree, decree.saturating_sub(1), vec![decree as u8])
    }

    struct Exploding;

    impl Apply for Exploding {
        fn apply(&mut self, _mutation: Mutation) {
            panic!("state machine failure");
        }
    }

    fn wait_for_fault<A>(applier: &DeferredApplier<A>) {
        for _ in 0..500 {
            if applier.fault().is_some() {
                return;
            }
            thread::sleep(std::time::Duration::from_millis(10));
        }
        panic!("apply worker never stopped");
    }

    #[test]
    fn applied_log_records_in_order() {
        let mut log = AppliedLog::new();
        log.apply(mu(1));
        log.apply(mu(2));

        assert_eq!(log.decrees(), vec![1, 2]);
        assert_eq!(log.last_applied(), 2);
        assert_eq!(log.payload(2), Some(&[2u8][..]));
        assert!(log.errors().is_empty());
    }

    #[test]
    fn applied_log_rejects_backwards_delivery() {
        let mut log = AppliedLog::new();
        log.apply(mu(3));
        log.apply(mu(2));

        assert_eq!(log.decrees(), vec![3]);
        assert_eq!(
            log.errors(),
            &[ApplyError::OutOfOrder {
                previous: 3,
                decree: 2
            }]
        );
    }

    #[test]
    fn relaxed_log_accepts_gaps() {
        let mut log = AppliedLog::new();
        log.apply(mu(1));
        log.apply(mu(5));
        assert_eq!(log.decrees(), vec![1, 5]);
    }

    #[test]
    fn strict_log_rejects_gaps() {
        let mut log = AppliedLog::strict();
        log.apply(mu(1));
        log.apply(mu(3));
        assert_eq!(log.decrees(), vec![1]);
        assert_eq!(
            log.errors(),
            &[ApplyError::Gap {
                expected: 2,
                decree: 3
            }]
        );
    }

    #[test]
    fn deferred_applier_preserves_order() {
        let mut applier = DeferredApplier::spawn(AppliedLog::strict());
        for d in 1..=100 {
            applier.commit(mu(d));
        }
        assert_eq!(applier.sent(), 100);

        assert!(applier.fault().is_none());

        let log = applier.shutdown().unwrap();
        assert_eq!(log.len(), 100);
        assert_eq!(log.last_applied(), 100);
        assert!(log.errors().is_empty());
    }

    #[test]
    fn commits_after_worker_death_are_dropped() {
        let mut applier = DeferredApplier::spawn(Exploding);
        applier.commit(mu(1));
        wait_for_fault(&applier);
        assert_eq!(applier.fault().as_deref(), Some("apply worker stopped"));

        applier.commit(mu(2));
        assert_eq!(applier.sent(), 1);
        assert_eq!(applier.dropped(), 1);
        assert_eq!(
            applier.fault().as_deref(),
            Some("apply worker gone, 1 decrees not applied")
        );
        assert_eq!(applier.shutdown().err(), Some(ApplyError::WorkerGone));
    }
}
