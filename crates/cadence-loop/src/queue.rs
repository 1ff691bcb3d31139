// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The per-phase queue of one-shot continuations.

use crate::timing::PlayerLoopTiming;
use cadence_core::error::Fault;
use cadence_core::task::Continuation;
use cadence_core::unobserved;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// What a [`ContinuationQueue`] is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    /// Nothing queued and no drain in progress.
    Idle,
    /// Continuations are queued for the next drain.
    Accepting,
    /// A drain is in progress; new entries wait for the next one.
    Draining,
}

struct QueueState {
    active: Vec<Continuation>,
    waiting: Vec<Continuation>,
    dequing: bool,
}

/// Ends a drain, even one cut short by an unwind.
///
/// The drained batch, empty but keeping its capacity, becomes the new waiting
/// list and the queue accepts drains again.
struct Drain<'a> {
    state: &'a Mutex<QueueState>,
    batch: Vec<Continuation>,
}

impl Drop for Drain<'_> {
    fn drop(&mut self) {
        let mut batch = std::mem::take(&mut self.batch);
        batch.clear();
        let mut state = self.state.lock();
        state.active = std::mem::replace(&mut state.waiting, batch);
        state.dequing = false;
    }
}

/// A FIFO of continuations bound to one [`PlayerLoopTiming`].
///
/// Entries enqueued while [`run`](Self::run) drains the queue, including from
/// the continuations themselves, are parked on a waiting list and run on the
/// next drain. `enqueue` is safe from any thread.
pub struct ContinuationQueue {
    timing: PlayerLoopTiming,
    max_length: usize,
    state: Mutex<QueueState>,
}

impl ContinuationQueue {
    /// Creates an empty queue.
    ///
    /// ## Arguments
    /// * `timing` - The phase the queue belongs to, used in log messages.
    /// * `initial_capacity` - Slots reserved up front in each list.
    /// * `max_length` - Length past which growth is logged as a warning.
    pub fn new(timing: PlayerLoopTiming, initial_capacity: usize, max_length: usize) -> Self {
        Self {
            timing,
            max_length,
            state: Mutex::new(QueueState {
                active: Vec::with_capacity(initial_capacity),
                waiting: Vec::with_capacity(initial_capacity),
                dequing: false,
            }),
        }
    }

    /// The phase this queue belongs to.
    pub fn timing(&self) -> PlayerLoopTiming {
        self.timing
    }

    /// Appends `continuation`. Always succeeds.
    pub fn enqueue(&self, continuation: Continuation) {
        let mut state = self.state.lock();
        let list = if state.dequing {
            &mut state.waiting
        } else {
            &mut state.active
        };
        if list.len() == list.capacity() {
            let grown = (list.capacity() * 2).max(1);
            if grown > self.max_length {
                log::warn!(
                    "Continuation queue {} grew to {grown} slots, past the configured maximum of {}.",
                    self.timing,
                    self.max_length
                );
            }
            list.reserve_exact(grown - list.len());
        }
        list.push(continuation);
    }

    /// Runs every continuation queued before the call, in insertion order.
    ///
    /// Panics are caught, logged and reported to the
    /// [unobserved fault bus](cadence_core::unobserved); the remaining
    /// continuations still run. Returns the number of entries executed.
    pub fn run(&self) -> usize {
        let batch = {
            let mut state = self.state.lock();
            if state.dequing {
                log::warn!(
                    "Continuation queue {} is already draining; nested run ignored.",
                    self.timing
                );
                return 0;
            }
            state.dequing = true;
            std::mem::take(&mut state.active)
        };

        let mut drain = Drain {
            state: &self.state,
            batch,
        };
        let executed = drain.batch.len();
        for continuation in drain.batch.drain(..) {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(continuation)) {
                let fault = Fault::from_panic(payload);
                log::error!("Continuation in {} failed: {fault}", self.timing);
                unobserved::report(fault.into(), "continuation-queue");
            }
        }
        if executed > 0 {
            log::trace!("Ran {executed} continuation(s) in {}.", self.timing);
        }
        executed
    }

    /// Number of continuations waiting for a drain.
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.active.len() + state.waiting.len()
    }

    /// Returns `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The current activity of the queue.
    pub fn status(&self) -> QueueStatus {
        let state = self.state.lock();
        if state.dequing {
            QueueStatus::Draining
        } else if state.active.is_empty() {
            QueueStatus::Idle
        } else {
            QueueStatus::Accepting
        }
    }

    /// Drops every queued continuation without running it.
    pub fn clear(&self) -> usize {
        let (active, waiting) = {
            let mut state = self.state.lock();
            (
                std::mem::take(&mut state.active),
                std::mem::take(&mut state.waiting),
            )
        };
        // Dropped outside the lock: captured state may enqueue on drop.
        active.len() + waiting.len()
    }
}

impl fmt::Debug for ContinuationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuationQueue")
            .field("timing", &self.timing)
            .field("len", &self.len())
            .field("status", &self.status())
            .finish()
    }
}
