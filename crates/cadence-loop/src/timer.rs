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

//! Restartable one-shot and periodic timers driven by the player loop.

use crate::clock::{FrameClock, Stopwatch};
use crate::player_loop::{PlayerLoopHandle, WeakPlayerLoopHandle};
use crate::runner::PlayerLoopItem;
use crate::schedule::DelayType;
use crate::timing::PlayerLoopTiming;
use cadence_core::error::{Fault, InvalidOperation, TaskResult};
use cadence_core::{unobserved, CancellationToken};
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

type TimerCallback = Box<dyn FnMut() + Send>;

struct TimerState {
    interval: Duration,
    elapsed: f32,
    stopwatch: Stopwatch,
    initial_frame: u64,
    running: bool,
    in_runner: bool,
    disposed: bool,
}

impl TimerState {
    fn reset(&mut self, frame: u64) {
        self.elapsed = 0.0;
        self.stopwatch.restart();
        self.initial_frame = frame;
    }

    /// Returns `true` once the interval has elapsed.
    fn elapsed_interval(&mut self, delay_type: DelayType, clock: &FrameClock) -> bool {
        match delay_type {
            DelayType::Realtime => self.stopwatch.elapsed() >= self.interval,
            DelayType::DeltaTime | DelayType::UnscaledDeltaTime => {
                if self.elapsed == 0.0 && clock.frame_count() == self.initial_frame {
                    return false;
                }
                self.elapsed += if delay_type == DelayType::DeltaTime {
                    clock.delta_time()
                } else {
                    clock.unscaled_delta_time()
                };
                self.elapsed >= self.interval.as_secs_f32()
            }
        }
    }
}

struct TimerInner {
    handle: WeakPlayerLoopHandle,
    timing: PlayerLoopTiming,
    periodic: bool,
    delay_type: DelayType,
    token: CancellationToken,
    state: Mutex<TimerState>,
    callback: Mutex<TimerCallback>,
}

impl TimerInner {
    fn invoke(&self) {
        let mut callback = self.callback.lock();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| (callback)())) {
            let fault = Fault::from_panic(payload);
            log::error!("Timer callback in {} failed: {fault}", self.timing);
            unobserved::report(fault.into(), "player-loop-timer");
        }
    }
}

impl PlayerLoopItem for TimerInner {
    fn move_next(&self, clock: &FrameClock) -> bool {
        let fire = {
            let mut state = self.state.lock();
            if state.disposed || !state.running {
                state.in_runner = false;
                return false;
            }
            if self.token.is_cancellation_requested() {
                state.running = false;
                state.in_runner = false;
                return false;
            }
            if !state.elapsed_interval(self.delay_type, clock) {
                return true;
            }
            if self.periodic {
                state.reset(clock.frame_count());
            } else {
                state.running = false;
                state.in_runner = false;
            }
            true
        };

        if fire {
            self.invoke();
        }
        self.periodic && self.state.lock().in_runner
    }
}

/// A timer that invokes a callback after an interval, once or periodically.
///
/// Timers are created stopped; [`restart`](Self::restart) starts them. A
/// periodic timer resets its elapsed time each time it fires. The timer holds
/// its loop weakly, and dropping the last `PlayerLoopTimer` does not stop a
/// running timer; use [`stop`](Self::stop) or [`dispose`](Self::dispose).
#[derive(Clone)]
pub struct PlayerLoopTimer {
    inner: Arc<TimerInner>,
}

impl PlayerLoopTimer {
    /// Creates a stopped timer.
    ///
    /// ## Arguments
    /// * `handle` - The loop whose `timing` phase drives the timer.
    /// * `interval` - Time between start and firing, and between firings.
    /// * `periodic` - Whether the timer keeps firing.
    /// * `delay_type` - The clock the interval is measured on.
    /// * `token` - Stops the timer when canceled.
    /// * `callback` - Invoked each time the timer fires.
    pub fn create<F>(
        handle: &PlayerLoopHandle,
        interval: Duration,
        periodic: bool,
        delay_type: DelayType,
        timing: PlayerLoopTiming,
        token: CancellationToken,
        callback: F,
    ) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self {
            inner: Arc::new(TimerInner {
                handle: handle.downgrade(),
                timing,
                periodic,
                delay_type,
                token,
                state: Mutex::new(TimerState {
                    interval,
                    elapsed: 0.0,
                    stopwatch: Stopwatch::new(),
                    initial_frame: handle.clock().frame_count(),
                    running: false,
                    in_runner: false,
                    disposed: false,
                }),
                callback: Mutex::new(Box::new(callback)),
            }),
        }
    }

    /// Creates a timer and starts it.
    #[allow(clippy::too_many_arguments)]
    pub fn start_new<F>(
        handle: &PlayerLoopHandle,
        interval: Duration,
        periodic: bool,
        delay_type: DelayType,
        timing: PlayerLoopTiming,
        token: CancellationToken,
        callback: F,
    ) -> TaskResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let timer = Self::create(handle, interval, periodic, delay_type, timing, token, callback);
        timer.restart()?;
        Ok(timer)
    }

    /// Restarts the measurement from now and starts the timer if stopped.
    ///
    /// Fails with [`InvalidOperation::AlreadyDisposed`] after
    /// [`dispose`](Self::dispose), and with
    /// [`InvalidOperation::NoPlayerLoop`] if the loop is gone.
    pub fn restart(&self) -> TaskResult<()> {
        self.restart_inner(None)
    }

    /// Like [`restart`](Self::restart), with a new interval.
    pub fn restart_with(&self, interval: Duration) -> TaskResult<()> {
        self.restart_inner(Some(interval))
    }

    fn restart_inner(&self, interval: Option<Duration>) -> TaskResult<()> {
        let handle = self
            .inner
            .handle
            .upgrade()
            .ok_or(InvalidOperation::NoPlayerLoop)?;
        let needs_runner = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return Err(InvalidOperation::AlreadyDisposed.into());
            }
            if let Some(interval) = interval {
                state.interval = interval;
            }
            state.reset(handle.clock().frame_count());
            state.running = true;
            !std::mem::replace(&mut state.in_runner, true)
        };
        if needs_runner {
            handle.add_action(self.inner.timing, self.inner.clone());
        }
        Ok(())
    }

    /// Stops the timer. It can be restarted.
    pub fn stop(&self) {
        self.inner.state.lock().running = false;
    }

    /// Stops the timer for good.
    pub fn dispose(&self) {
        let mut state = self.inner.state.lock();
        state.running = false;
        state.disposed = true;
    }

    /// Returns `true` while the timer is started.
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }
}

impl fmt::Debug for PlayerLoopTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("PlayerLoopTimer")
            .field("interval", &state.interval)
            .field("periodic", &self.inner.periodic)
            .field("running", &state.running)
            .field("disposed", &state.disposed)
            .finish()
    }
}
