//! Single-slot deferred work: at most one pending instance, rescheduling replaces it.
//!
//! The slots are plain deadlines owned by the charger actor, which runs a due job
//! between commands. A job therefore never runs concurrently with a cancel.

use embassy_time::Instant;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Deferred {
    deadline: Option<Instant>,
}

impl Deferred {
    pub const fn new() -> Self { Self { deadline: None } }

    /// Replace any pending instance.
    pub fn schedule(&mut self, at: Instant) { self.deadline = Some(at); }

    /// Returns whether an instance was pending.
    pub fn cancel(&mut self) -> bool { self.deadline.take().is_some() }

    pub fn deadline(&self) -> Option<Instant> { self.deadline }

    pub fn is_pending(&self) -> bool { self.deadline.is_some() }

    /// Clear the slot if its deadline has passed at `now`.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(at) if at <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Earliest of the pending deadlines.
pub fn earliest(slots: &[&Deferred]) -> Option<Instant> {
    slots.iter().filter_map(|s| s.deadline()).min()
}
