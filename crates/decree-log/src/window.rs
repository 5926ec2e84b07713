//! # window
//!
//! why: hold prepared-but-uncommitted mutations in a bounded, decree-indexed buffer
//! relations: owned by prepare_list.rs, which adds the role-aware commit rules
//! what: MutationWindow with a monotonically advancing floor

use crate::error::WindowError;
use crate::mutation::{Decree, Mutation};
use std::collections::BTreeMap;

/// Bounded staging buffer for mutations in `(floor, floor + capacity]`
///
/// The window has no idea about replica roles. It only enforces that every
/// buffered decree sits above the floor and within capacity, and that a
/// decree maps to at most one mutation.
#[derive(Debug, Clone)]
pub struct MutationWindow {
    buffered: BTreeMap<Decree, Mutation>,
    floor: Decree,
    capacity: usize,
}

impl MutationWindow {
    /// Create an empty window whose floor is `floor`
    pub fn new(floor: Decree, capacity: usize) -> Self {
        Self {
            buffered: BTreeMap::new(),
            floor,
            capacity,
        }
    }

    /// Buffer a mutation.
    ///
    /// Re-inserting the same content at an already buffered decree succeeds
    /// and leaves the window unchanged, except that a ready flag on the new
    /// copy is carried over.
    pub fn put(&mut self, mutation: Mutation) -> Result<(), WindowError> {
        let decree = mutation.decree;
        self.check_range(decree)?;

        match self.buffered.get_mut(&decree) {
            Some(existing) if existing.same_content(&mutation) => {
                if mutation.is_ready() {
                    existing.mark_ready();
                }
                Ok(())
            }
            Some(_) => Err(WindowError::SlotOccupied { decree }),
            None => {
                self.buffered.insert(decree, mutation);
                Ok(())
            }
        }
    }

    /// Whether `decree` falls inside `(floor, floor + capacity]`
    pub fn check_range(&self, decree: Decree) -> Result<(), WindowError> {
        if decree <= self.floor {
            return Err(WindowError::DecreeTooOld {
                decree,
                floor: self.floor,
            });
        }
        if decree - self.floor > self.capacity as u64 {
            return Err(WindowError::CapacityExceeded {
                decree,
                floor: self.floor,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    pub fn get(&self, decree: Decree) -> Option<&Mutation> {
        self.buffered.get(&decree)
    }

    pub fn get_mut(&mut self, decree: Decree) -> Option<&mut Mutation> {
        self.buffered.get_mut(&decree)
    }

    /// Lowest buffered decree, or the floor when empty
    pub fn min_decree(&self) -> Decree {
        self.buffered
            .keys()
            .next()
            .copied()
            .unwrap_or(self.floor)
    }

    /// Highest buffered decree, or the floor when empty
    pub fn max_decree(&self) -> Decree {
        self.buffered
            .keys()
            .next_back()
            .copied()
            .unwrap_or(self.floor)
    }

    /// Evict the lowest buffered mutation and raise the floor to its decree
    pub fn pop_min(&mut self) -> Option<Mutation> {
        let (decree, mutation) = self.buffered.pop_first()?;
        self.floor = decree;
        Some(mutation)
    }

    /// Move the floor to `decree`.
    ///
    /// With `clear` every buffered mutation is dropped; otherwise only the
    /// ones that would now sit at or below the floor.
    pub fn reset(&mut self, decree: Decree, clear: bool) {
        if clear {
            self.buffered.clear();
        } else {
            self.buffered = self.buffered.split_off(&decree.saturating_add(1));
        }
        self.floor = decree;
    }

    pub fn count(&self) -> usize {
        self.buffered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffered.is_empty()
    }

    pub fn floor(&self) -> Decree {
        self.floor
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
