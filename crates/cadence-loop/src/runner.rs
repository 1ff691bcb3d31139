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

//! Per-phase lists of items polled once per frame.

use crate::clock::FrameClock;
use crate::timing::PlayerLoopTiming;
use cadence_core::collections::RingQueue;
use cadence_core::error::Fault;
use cadence_core::unobserved;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// An item polled by a [`PlayerLoopRunner`] on every run of its phase.
pub trait PlayerLoopItem: Send + Sync {
    /// Advances the item by one frame.
    ///
    /// Returns `false` once the item is finished; it is then removed.
    fn move_next(&self, clock: &FrameClock) -> bool;
}

struct RunnerState {
    items: Vec<Arc<dyn PlayerLoopItem>>,
    waiting: RingQueue<Arc<dyn PlayerLoopItem>>,
    running: bool,
}

/// Ends a pass, even one cut short by an unwind: parked items are appended
/// and the runner accepts passes again.
struct Pass<'a> {
    state: &'a Mutex<RunnerState>,
    items: Vec<Arc<dyn PlayerLoopItem>>,
}

impl Drop for Pass<'_> {
    fn drop(&mut self) {
        let mut items = std::mem::take(&mut self.items);
        let mut state = self.state.lock();
        while let Some(item) = state.waiting.dequeue() {
            items.push(item);
        }
        state.items = items;
        state.running = false;
    }
}

/// The loop items of one phase.
///
/// Items added during a pass, including by the items themselves, are parked
/// and appended in insertion order once the pass ends, so they are first
/// polled on the next run.
pub struct PlayerLoopRunner {
    timing: PlayerLoopTiming,
    state: Mutex<RunnerState>,
}

impl PlayerLoopRunner {
    /// Creates an empty runner for `timing`.
    pub fn new(timing: PlayerLoopTiming, initial_capacity: usize) -> Self {
        Self {
            timing,
            state: Mutex::new(RunnerState {
                items: Vec::with_capacity(initial_capacity),
                waiting: RingQueue::new(initial_capacity),
                running: false,
            }),
        }
    }

    /// The phase this runner belongs to.
    pub fn timing(&self) -> PlayerLoopTiming {
        self.timing
    }

    /// Adds an item, polled from the next run on.
    pub fn add(&self, item: Arc<dyn PlayerLoopItem>) {
        let mut state = self.state.lock();
        if state.running {
            state.waiting.enqueue(item);
        } else {
            state.items.push(item);
        }
    }

    /// Polls every item once, dropping the finished ones.
    ///
    /// A panicking item is logged, reported to the
    /// [unobserved fault bus](cadence_core::unobserved) and removed.
    pub fn run(&self, clock: &FrameClock) {
        let items = {
            let mut state = self.state.lock();
            if state.running {
                log::warn!(
                    "Loop runner {} is already running; nested run ignored.",
                    self.timing
                );
                return;
            }
            state.running = true;
            std::mem::take(&mut state.items)
        };

        let mut pass = Pass {
            state: &self.state,
            items,
        };
        let timing = self.timing;
        pass.items.retain(|item| {
            match panic::catch_unwind(AssertUnwindSafe(|| item.move_next(clock))) {
                Ok(keep) => keep,
                Err(payload) => {
                    let fault = Fault::from_panic(payload);
                    log::error!("Loop item in {timing} failed and was removed: {fault}");
                    unobserved::report(fault.into(), "player-loop-item");
                    false
                }
            }
        });
    }

    /// Number of registered items, parked ones included.
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.items.len() + state.waiting.len()
    }

    /// Returns `true` when no item is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every item without polling it again.
    pub fn clear(&self) -> usize {
        let (items, waiting_count) = {
            let mut state = self.state.lock();
            let count = state.waiting.len();
            state.waiting.clear();
            (std::mem::take(&mut state.items), count)
        };
        items.len() + waiting_count
    }
}

impl fmt::Debug for PlayerLoopRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerLoopRunner")
            .field("timing", &self.timing)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Countdown {
        remaining: AtomicUsize,
        polls: AtomicUsize,
    }

    impl Countdown {
        fn new(frames: usize) -> Arc<Self> {
            Arc::new(Self {
                remaining: AtomicUsize::new(frames),
                polls: AtomicUsize::new(0),
            })
        }
    }

    impl PlayerLoopItem for Countdown {
        fn move_next(&self, _clock: &FrameClock) -> bool {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.remaining.fetch_sub(1, Ordering::SeqCst) > 1
        }
    }

    struct Spawner {
        runner: Arc<PlayerLoopRunner>,
        child: Arc<Countdown>,
    }

    impl PlayerLoopItem for Spawner {
        fn move_next(&self, _clock: &FrameClock) -> bool {
            self.runner.add(self.child.clone());
            false
        }
    }

    struct Exploding;

    impl PlayerLoopItem for Exploding {
        fn move_next(&self, _clock: &FrameClock) -> bool {
            panic!("item exploded");
        }
    }

    #[test]
    fn finished_items_are_removed() {
        let runner = PlayerLoopRunner::new(PlayerLoopTiming::Update, 4);
        let clock = FrameClock::new();
        let item = Countdown::new(2);
        runner.add(item.clone());

        runner.run(&clock);
        assert_eq!(runner.len(), 1);
        runner.run(&clock);
        assert!(runner.is_empty());
        runner.run(&clock);
        assert_eq!(item.polls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn items_added_during_a_pass_start_on_the_next_run() {
        let runner = Arc::new(PlayerLoopRunner::new(PlayerLoopTiming::Update, 4));
        let clock = FrameClock::new();
        let child = Countdown::new(1);
        runner.add(Arc::new(Spawner {
            runner: runner.clone(),
            child: child.clone(),
        }));

        runner.run(&clock);
        assert_eq!(child.polls.load(Ordering::SeqCst), 0);
        assert_eq!(runner.len(), 1);

        runner.run(&clock);
        assert_eq!(child.polls.load(Ordering::SeqCst), 1);
        assert!(runner.is_empty());
    }

    #[test]
    fn panicking_items_are_dropped() {
        let runner = PlayerLoopRunner::new(PlayerLoopTiming::Update, 4);
        let clock = FrameClock::new();
        let survivor = Countdown::new(3);
        runner.add(Arc::new(Exploding));
        runner.add(survivor.clone());

        runner.run(&clock);
        assert_eq!(runner.len(), 1);
        assert_eq!(survivor.polls.load(Ordering::SeqCst), 1);
    }
}
