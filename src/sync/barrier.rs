//! Reusable rendezvous barrier
//!
//! The sweep engine uses this barrier twice per round to line up the moment
//! two actors hand their reads to the kernel, and again the moment both reads
//! have completed. It must therefore be reusable for thousands of rounds and
//! must never let a caller through before every party of its round arrived.
//!
//! # Rounds
//!
//! The state is `(arrived, generation)`. Each `wait()` records the generation
//! it joined. The caller that brings `arrived` to `parties` resets it to zero
//! and bumps the generation under the same lock, so a waiter released from
//! round K compares against K and can never count itself into round K again.
//!
//! # Breaking
//!
//! `std::sync::Barrier` cannot be cancelled: if one actor fails while its
//! partner is blocked, the partner blocks forever. This barrier can be broken
//! instead. Waiters of the unfinished round, and every later `wait()`, return
//! [`BarrierError::Broken`].
//!
//! # Example
//!
//! ```
//! use sectorprobe::sync::Barrier;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let barrier = Arc::new(Barrier::new(2).unwrap());
//! let partner = Arc::clone(&barrier);
//! let handle = thread::spawn(move || partner.wait().unwrap());
//! let mine = barrier.wait().unwrap();
//! let theirs = handle.join().unwrap();
//!
//! assert_eq!(mine.generation(), theirs.generation());
//! assert!(mine.is_leader() != theirs.is_leader());
//! ```

use std::sync::{Condvar, Mutex, MutexGuard};
use thiserror::Error;

/// Barrier failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierError {
    #[error("barrier needs at least one party, got {0}")]
    InvalidParties(usize),

    #[error("barrier was broken by another party")]
    Broken,
}

/// Outcome of a successful [`Barrier::wait`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    generation: u64,
    leader: bool,
}

impl BarrierWaitResult {
    /// The round this caller was released from
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True for exactly one caller per round: the one whose arrival completed it
    pub fn is_leader(&self) -> bool {
        self.leader
    }
}

#[derive(Debug)]
struct State {
    arrived: usize,
    generation: u64,
    broken: bool,
}

/// N-party barrier backed by a mutex and a condition variable
#[derive(Debug)]
pub struct Barrier {
    parties: usize,
    state: Mutex<State>,
    released: Condvar,
}

impl Barrier {
    /// Create a barrier for exactly `parties` concurrent callers
    pub fn new(parties: usize) -> Result<Self, BarrierError> {
        if parties < 1 {
            return Err(BarrierError::InvalidParties(parties));
        }

        Ok(Self {
            parties,
            state: Mutex::new(State {
                arrived: 0,
                generation: 0,
                broken: false,
            }),
            released: Condvar::new(),
        })
    }

    /// Block until `parties` callers have reached the barrier in this round
    ///
    /// Returns `Err(BarrierError::Broken)` if the barrier is broken before the
    /// round completes or was already broken when called.
    pub fn wait(&self) -> Result<BarrierWaitResult, BarrierError> {
        let mut state = self.lock();
        if state.broken {
            return Err(BarrierError::Broken);
        }

        let generation = state.generation;
        state.arrived += 1;
        debug_assert!(state.arrived <= self.parties);

        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            drop(state);
            self.released.notify_all();
            return Ok(BarrierWaitResult { generation, leader: true });
        }

        while state.generation == generation && !state.broken {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }

        // Released rounds win over a break that happened afterwards
        if state.generation == generation {
            return Err(BarrierError::Broken);
        }

        Ok(BarrierWaitResult { generation, leader: false })
    }

    /// Break the barrier, waking every waiter with [`BarrierError::Broken`]
    pub fn break_barrier(&self) {
        let mut state = self.lock();
        if state.broken {
            return;
        }
        state.broken = true;
        state.arrived = 0;
        drop(state);
        self.released.notify_all();
    }

    /// Number of parties needed to complete a round
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Callers currently blocked in the open round
    pub fn arrived(&self) -> usize {
        self.lock().arrived
    }

    /// Number of rounds completed so far
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn is_broken(&self) -> bool {
        self.lock().broken
    }

    // No code panics while holding the lock, but a poisoned mutex must not
    // strand the partner, so recover the state instead of propagating.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_zero_parties_rejected() {
        assert_eq!(Barrier::new(0).unwrap_err(), BarrierError::InvalidParties(0));
    }

    #[test]
    fn test_single_party_never_blocks() {
        let barrier = Barrier::new(1).unwrap();
        for round in 0..5 {
            let result = barrier.wait().unwrap();
            assert_eq!(result.generation(), round);
            assert!(result.is_leader());
        }
        assert_eq!(barrier.generation(), 5);
        assert_eq!(barrier.arrived(), 0);
    }

    #[test]
    fn test_waiter_blocks_until_partner_arrives() {
        let barrier = Arc::new(Barrier::new(2).unwrap());
        let returned = Arc::new(AtomicBool::new(false));

        let handle = {
            let barrier = Arc::clone(&barrier);
            let returned = Arc::clone(&returned);
            thread::spawn(move || {
                let result = barrier.wait().unwrap();
                returned.store(true, Ordering::SeqCst);
                result
            })
        };

        // Give the partner ample time to (wrongly) slip through
        thread::sleep(Duration::from_millis(50));
        assert!(!returned.load(Ordering::SeqCst));
        assert_eq!(barrier.arrived(), 1);

        let mine = barrier.wait().unwrap();
        let theirs = handle.join().unwrap();

        assert!(returned.load(Ordering::SeqCst));
        assert_eq!(mine.generation(), 0);
        assert_eq!(theirs.generation(), 0);
        assert!(mine.is_leader() ^ theirs.is_leader());
        assert_eq!(barrier.arrived(), 0);
    }

    #[test]
    fn test_reusable_across_many_rounds() {
        const ROUNDS: u64 = 2_000;
        let barrier = Arc::new(Barrier::new(2).unwrap());
        let arrivals = Arc::new(AtomicUsize::new(0));

        let spawn_party = || {
            let barrier = Arc::clone(&barrier);
            let arrivals = Arc::clone(&arrivals);
            thread::spawn(move || {
                let mut leaders = 0;
                for round in 0..ROUNDS {
                    arrivals.fetch_add(1, Ordering::SeqCst);
                    let result = barrier.wait().unwrap();
                    // Both parties of this round must have arrived before release
                    assert!(arrivals.load(Ordering::SeqCst) >= 2 * (round as usize + 1));
                    assert_eq!(result.generation(), round);
                    if result.is_leader() {
                        leaders += 1;
                    }
                }
                leaders
            })
        };

        let a = spawn_party();
        let b = spawn_party();
        let leaders = a.join().unwrap() + b.join().unwrap();

        assert_eq!(leaders, ROUNDS);
        assert_eq!(barrier.generation(), ROUNDS);
        assert_eq!(barrier.arrived(), 0);
        assert!(!barrier.is_broken());
    }

    #[test]
    fn test_break_wakes_blocked_waiter() {
        let barrier = Arc::new(Barrier::new(2).unwrap());
        let handle = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait())
        };

        thread::sleep(Duration::from_millis(20));
        barrier.break_barrier();

        assert_eq!(handle.join().unwrap(), Err(BarrierError::Broken));
        assert!(barrier.is_broken());
        assert_eq!(barrier.wait(), Err(BarrierError::Broken));
    }

    #[test]
    fn test_break_after_release_keeps_completed_round() {
        let barrier = Barrier::new(1).unwrap();
        assert!(barrier.wait().is_ok());
        barrier.break_barrier();
        barrier.break_barrier();
        assert_eq!(barrier.generation(), 1);
        assert_eq!(barrier.wait(), Err(BarrierError::Broken));
    }
}
