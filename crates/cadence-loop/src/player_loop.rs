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

//! The frame-phase scheduler driven by the engine loop.

use crate::clock::FrameClock;
use crate::config::{ConfigError, RuntimeConfig};
use crate::queue::ContinuationQueue;
use crate::runner::{PlayerLoopItem, PlayerLoopRunner};
use crate::timing::PlayerLoopTiming;
use cadence_core::error::{InvalidOperation, TaskResult};
use cadence_core::task::{AutoResetCompletionSource, Continuation};
use cadence_core::{pool, spawn, unobserved, Task};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::time::Duration;

thread_local! {
    static CURRENT: RefCell<Vec<PlayerLoopHandle>> = const { RefCell::new(Vec::new()) };
}

struct LoopInner {
    clock: FrameClock,
    queues: Vec<ContinuationQueue>,
    runners: Vec<PlayerLoopRunner>,
}

impl LoopInner {
    fn new(config: &RuntimeConfig) -> Self {
        let queues = PlayerLoopTiming::ALL
            .iter()
            .map(|&timing| {
                ContinuationQueue::new(
                    timing,
                    config.initial_queue_capacity,
                    config.max_queue_length,
                )
            })
            .collect();
        let runners = PlayerLoopTiming::ALL
            .iter()
            .map(|&timing| PlayerLoopRunner::new(timing, config.initial_queue_capacity))
            .collect();
        let clock = FrameClock::new();
        clock.set_time_scale(config.time_scale);
        Self {
            clock,
            queues,
            runners,
        }
    }

    fn queue(&self, timing: PlayerLoopTiming) -> &ContinuationQueue {
        &self.queues[timing.index()]
    }

    fn runner(&self, timing: PlayerLoopTiming) -> &PlayerLoopRunner {
        &self.runners[timing.index()]
    }
}

/// The scheduler owned by the engine driver.
///
/// The driver advances the clock once per frame and runs each phase in turn;
/// a phase run drains that phase's continuation queue, then polls its loop
/// items. Everything else talks to the loop through a [`PlayerLoopHandle`].
pub struct PlayerLoop {
    inner: Arc<LoopInner>,
}

impl Default for PlayerLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerLoop {
    /// Creates a loop with the default [`RuntimeConfig`].
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LoopInner::new(&RuntimeConfig::default())),
        }
    }

    /// Creates a loop from `config`.
    ///
    /// The pool cap and the cancellation reporting flag are process-wide, so
    /// they also apply to loops created earlier.
    pub fn with_config(config: &RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        pool::set_max_pool_size(config.max_pool_size);
        unobserved::set_propagate_cancellation(config.propagate_cancellation);
        log::debug!(
            "Player loop created (queue capacity {}, time scale {}).",
            config.initial_queue_capacity,
            config.time_scale
        );
        Ok(Self {
            inner: Arc::new(LoopInner::new(config)),
        })
    }

    /// Returns a handle usable from any thread.
    pub fn handle(&self) -> PlayerLoopHandle {
        PlayerLoopHandle {
            inner: self.inner.clone(),
        }
    }

    /// Makes this loop the current one of the calling thread until the guard
    /// is dropped. Guards nest.
    pub fn enter(&self) -> EnterGuard {
        self.handle().enter()
    }

    /// The frame clock.
    pub fn clock(&self) -> &FrameClock {
        &self.inner.clock
    }

    /// Starts a new frame that lasted `delta`.
    pub fn advance_frame(&self, delta: Duration) {
        self.inner.clock.advance(delta);
    }

    /// Runs one phase: its queued continuations first, then its loop items.
    pub fn run(&self, timing: PlayerLoopTiming) {
        self.inner.queue(timing).run();
        self.inner.runner(timing).run(&self.inner.clock);
    }

    /// Advances the clock by `delta` and runs every phase in frame order.
    pub fn tick(&self, delta: Duration) {
        self.advance_frame(delta);
        for timing in PlayerLoopTiming::ALL {
            self.run(timing);
        }
    }
}

impl Drop for PlayerLoop {
    fn drop(&mut self) {
        let mut dropped = 0;
        for timing in PlayerLoopTiming::ALL {
            dropped += self.inner.queue(timing).clear();
            dropped += self.inner.runner(timing).clear();
        }
        if dropped > 0 {
            log::debug!("Player loop dropped with {dropped} pending entries.");
        }
    }
}

impl fmt::Debug for PlayerLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerLoop")
            .field("frame", &self.inner.clock.frame_count())
            .finish()
    }
}

/// A cloneable, thread-safe handle on a [`PlayerLoop`].
///
/// Schedules continuations and loop items, and creates the frame and timer
/// promises (see the factory methods).
#[derive(Clone)]
pub struct PlayerLoopHandle {
    inner: Arc<LoopInner>,
}

impl PlayerLoopHandle {
    /// The loop entered on the calling thread.
    ///
    /// Fails with [`InvalidOperation::NoPlayerLoop`] outside of
    /// [`PlayerLoop::enter`].
    pub fn current() -> TaskResult<Self> {
        CURRENT
            .with(|stack| stack.borrow().last().cloned())
            .ok_or_else(|| InvalidOperation::NoPlayerLoop.into())
    }

    /// Makes this loop the current one of the calling thread until the guard
    /// is dropped.
    pub fn enter(&self) -> EnterGuard {
        CURRENT.with(|stack| stack.borrow_mut().push(self.clone()));
        EnterGuard {
            _not_send: PhantomData,
        }
    }

    /// The frame clock of the loop.
    pub fn clock(&self) -> &FrameClock {
        &self.inner.clock
    }

    /// Queues `continuation` to run on the next drain of `timing`.
    pub fn add_continuation<F>(&self, timing: PlayerLoopTiming, continuation: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(timing, Box::new(continuation));
    }

    /// Queues an already boxed continuation.
    pub fn enqueue(&self, timing: PlayerLoopTiming, continuation: Continuation) {
        self.inner.queue(timing).enqueue(continuation);
    }

    /// Registers `item` with the runner of `timing`.
    pub fn add_action(&self, timing: PlayerLoopTiming, item: Arc<dyn PlayerLoopItem>) {
        log::trace!("Loop item added to {timing}.");
        self.inner.runner(timing).add(item);
    }

    /// Starts `future` from the next drain of `timing`.
    ///
    /// Used to hop from a background thread onto the loop: the first poll
    /// happens on the thread running the phase.
    pub fn spawn_at<T, F>(&self, timing: PlayerLoopTiming, future: F) -> Task<T>
    where
        T: Send + 'static,
        F: Future<Output = TaskResult<T>> + Send + 'static,
    {
        let (source, task) = AutoResetCompletionSource::create_task();
        let version = source.version();
        self.add_continuation(timing, move || {
            spawn(future).continue_with(move |result| {
                match result {
                    Ok(value) => source.try_set_result_for(version, value),
                    Err(error) => source.try_set_error_for(version, error),
                };
            });
        });
        task
    }

    /// Number of queued continuations and loop items on `timing`.
    pub fn pending(&self, timing: PlayerLoopTiming) -> usize {
        self.inner.queue(timing).len() + self.inner.runner(timing).len()
    }

    /// A handle that does not keep the loop alive.
    pub fn downgrade(&self) -> WeakPlayerLoopHandle {
        WeakPlayerLoopHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl fmt::Debug for PlayerLoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerLoopHandle")
            .field("frame", &self.inner.clock.frame_count())
            .finish()
    }
}

/// A non-owning [`PlayerLoopHandle`].
#[derive(Clone, Debug)]
pub struct WeakPlayerLoopHandle {
    inner: Weak<LoopInner>,
}

impl WeakPlayerLoopHandle {
    /// Returns a strong handle if the loop is still alive.
    pub fn upgrade(&self) -> Option<PlayerLoopHandle> {
        self.inner.upgrade().map(|inner| PlayerLoopHandle { inner })
    }
}

/// Keeps a loop current on this thread. See [`PlayerLoop::enter`].
#[must_use = "the loop stops being current when the guard is dropped"]
pub struct EnterGuard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        CURRENT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl fmt::Debug for EnterGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnterGuard")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::error::TaskError;
    use parking_lot::Mutex;

    #[test]
    fn current_requires_an_entered_loop() {
        assert!(matches!(
            PlayerLoopHandle::current(),
            Err(TaskError::InvalidOperation(InvalidOperation::NoPlayerLoop))
        ));

        let player_loop = PlayerLoop::new();
        {
            let _guard = player_loop.enter();
            assert!(PlayerLoopHandle::current().is_ok());
        }
        assert!(PlayerLoopHandle::current().is_err());
    }

    #[test]
    fn tick_runs_phases_in_frame_order() {
        let player_loop = PlayerLoop::new();
        let handle = player_loop.handle();
        let order = Arc::new(Mutex::new(Vec::new()));
        for timing in [
            PlayerLoopTiming::LastPostLateUpdate,
            PlayerLoopTiming::Update,
            PlayerLoopTiming::Initialization,
        ] {
            let order = order.clone();
            handle.add_continuation(timing, move || order.lock().push(timing));
        }

        player_loop.tick(Duration::from_millis(16));
        assert_eq!(
            *order.lock(),
            vec![
                PlayerLoopTiming::Initialization,
                PlayerLoopTiming::Update,
                PlayerLoopTiming::LastPostLateUpdate,
            ]
        );
        assert_eq!(player_loop.clock().frame_count(), 1);
    }

    #[test]
    fn background_threads_can_enqueue() {
        let player_loop = PlayerLoop::new();
        let handle = player_loop.handle();
        let hits = Arc::new(Mutex::new(0));

        let worker = {
            let hits = hits.clone();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    let hits = hits.clone();
                    handle.add_continuation(PlayerLoopTiming::Update, move || *hits.lock() += 1);
                }
            })
        };
        worker.join().unwrap();

        player_loop.run(PlayerLoopTiming::Update);
        assert_eq!(*hits.lock(), 10);
    }

    #[test]
    fn spawn_at_starts_on_the_loop_thread() {
        let player_loop = PlayerLoop::new();
        let handle = player_loop.handle();
        let task = handle.spawn_at(PlayerLoopTiming::PreUpdate, async { Ok(5) });
        assert!(!task.is_completed());

        player_loop.run(PlayerLoopTiming::PreUpdate);
        assert_eq!(task.get_result().unwrap(), 5);
    }

    #[test]
    fn weak_handle_does_not_outlive_the_loop() {
        let player_loop = PlayerLoop::new();
        let weak = player_loop.handle().downgrade();
        assert!(weak.upgrade().is_some());
        drop(player_loop);
        assert!(weak.upgrade().is_none());
    }
}
