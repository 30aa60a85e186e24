//! In-flight transition guard preventing duplicate lifecycle processing.

use crate::tournament::models::TournamentId;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

/// A lifecycle transition the engine can fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransitionKind {
    /// `Scheduled` → `Registering`
    OpenRegistration,
    /// `Registering` → `RegistrationClosed` (or `Cancelled` below minimum)
    CloseRegistration,
    /// `RegistrationClosed` → `Active`, start snapshot batch
    Start,
    /// `Active` → `Ended` → `Complete`/`NeedsReview`, end snapshot batch
    End,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::OpenRegistration => "open_registration",
            TransitionKind::CloseRegistration => "close_registration",
            TransitionKind::Start => "start",
            TransitionKind::End => "end",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type GuardKey = (TournamentId, TransitionKind);

/// Tracks which (tournament, transition) pairs are currently executing.
///
/// Two overlapping poll passes (periodic timer plus a manual trigger) must
/// never both run the same snapshot sequence. `try_acquire` is an atomic
/// check-and-set under one lock hold, not a read followed by a write, so two
/// racing callers cannot both see the slot as free.
#[derive(Clone, Default)]
pub struct InFlightGuard {
    inner: Arc<Mutex<HashSet<GuardKey>>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a transition slot, or `None` if it is already in flight.
    ///
    /// The returned permit releases the slot on drop, so release happens on
    /// success and failure paths alike.
    pub fn try_acquire(
        &self,
        tournament_id: TournamentId,
        kind: TransitionKind,
    ) -> Option<TransitionPermit> {
        let key = (tournament_id, kind);
        let mut in_flight = self.inner.lock().expect("guard lock poisoned");
        if in_flight.insert(key) {
            Some(TransitionPermit {
                key,
                inner: Arc::clone(&self.inner),
            })
        } else {
            None
        }
    }

    /// Whether a transition is currently executing
    pub fn is_in_flight(&self, tournament_id: TournamentId, kind: TransitionKind) -> bool {
        self.inner
            .lock()
            .expect("guard lock poisoned")
            .contains(&(tournament_id, kind))
    }

    /// All transitions currently executing
    pub fn active(&self) -> Vec<GuardKey> {
        let mut keys: Vec<GuardKey> = self
            .inner
            .lock()
            .expect("guard lock poisoned")
            .iter()
            .copied()
            .collect();
        keys.sort();
        keys
    }
}

/// RAII claim on one (tournament, transition) slot
pub struct TransitionPermit {
    key: GuardKey,
    inner: Arc<Mutex<HashSet<GuardKey>>>,
}

impl Drop for TransitionPermit {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.inner.lock() {
            in_flight.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected() {
        let guard = InFlightGuard::new();
        let permit = guard.try_acquire(1, TransitionKind::Start);
        assert!(permit.is_some());
        assert!(guard.try_acquire(1, TransitionKind::Start).is_none());
    }

    #[test]
    fn test_drop_releases_slot() {
        let guard = InFlightGuard::new();
        {
            let _permit = guard.try_acquire(1, TransitionKind::End).unwrap();
            assert!(guard.is_in_flight(1, TransitionKind::End));
        }
        assert!(!guard.is_in_flight(1, TransitionKind::End));
        assert!(guard.try_acquire(1, TransitionKind::End).is_some());
    }

    #[test]
    fn test_slots_are_independent_per_tournament_and_kind() {
        let guard = InFlightGuard::new();
        let _start = guard.try_acquire(1, TransitionKind::Start).unwrap();
        assert!(guard.try_acquire(2, TransitionKind::Start).is_some());
        assert!(guard.try_acquire(1, TransitionKind::End).is_some());
    }

    #[test]
    fn test_concurrent_acquire_admits_exactly_one() {
        let guard = InFlightGuard::new();
        let (sender, receiver) = std::sync::mpsc::channel();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = guard.clone();
                let sender = sender.clone();
                std::thread::spawn(move || {
                    // Send the permit to the main thread so it stays alive
                    // until every thread has tried
                    sender.send(guard.try_acquire(42, TransitionKind::Start)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        drop(sender);

        let admitted = receiver.iter().filter(Option::is_some).count();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn test_active_lists_claimed_slots() {
        let guard = InFlightGuard::new();
        let _a = guard.try_acquire(1, TransitionKind::Start).unwrap();
        let _b = guard.try_acquire(2, TransitionKind::End).unwrap();
        assert_eq!(
            guard.active(),
            vec![(1, TransitionKind::Start), (2, TransitionKind::End)]
        );
    }
}
