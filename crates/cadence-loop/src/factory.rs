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

//! Frame and timer task factories.
//!
//! Each factory exists as a method on [`PlayerLoopHandle`] and as a free
//! function scheduling on the loop entered on the calling thread. The free
//! functions return a task failed with
//! [`InvalidOperation::NoPlayerLoop`](cadence_core::InvalidOperation::NoPlayerLoop)
//! when no loop is entered.

use crate::player_loop::PlayerLoopHandle;
use crate::promise::{
    AsyncOperation, AsyncOperationDriver, DelayDriver, DelayFrameDriver, LoopPromise,
    NextFrameDriver, RealtimeDelayDriver, ValueChangedItem, WaitUntilCanceledDriver,
    WaitUntilDriver, YieldDriver,
};
use crate::schedule::{DelayType, Schedule};
use crate::timing::PlayerLoopTiming;
use cadence_core::error::{TaskError, TaskResult};
use cadence_core::{CancellationToken, Task};
use std::sync::Arc;
use std::time::Duration;

/// Converts a delay in seconds, rejecting values no clock can reach.
fn checked_seconds(seconds: f32) -> TaskResult<Duration> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(TaskError::InvalidArgument(format!(
            "delay must be a finite, non-negative number of seconds, got {seconds}"
        )));
    }
    Ok(Duration::from_secs_f32(seconds))
}

impl PlayerLoopHandle {
    /// Completes on the next run of the schedule's phase.
    pub fn yield_now(&self, schedule: impl Into<Schedule>) -> Task<()> {
        LoopPromise::start(self, YieldDriver, schedule.into())
    }

    /// Completes on the first run of the schedule's phase in a later frame.
    pub fn next_frame(&self, schedule: impl Into<Schedule>) -> Task<()> {
        LoopPromise::start(self, NextFrameDriver, schedule.into())
    }

    /// Completes after the schedule's phase ran in `frames` later frames.
    pub fn delay_frame(&self, frames: u32, schedule: impl Into<Schedule>) -> Task<()> {
        LoopPromise::start(self, DelayFrameDriver::new(frames), schedule.into())
    }

    /// Completes once `delay` has passed on the clock chosen by `delay_type`.
    pub fn delay(
        &self,
        delay: Duration,
        delay_type: DelayType,
        schedule: impl Into<Schedule>,
    ) -> Task<()> {
        let schedule = schedule.into();
        match delay_type {
            DelayType::DeltaTime => LoopPromise::start(self, DelayDriver::scaled(delay), schedule),
            DelayType::UnscaledDeltaTime => {
                LoopPromise::start(self, DelayDriver::unscaled(delay), schedule)
            }
            DelayType::Realtime => {
                LoopPromise::start(self, RealtimeDelayDriver::new(delay), schedule)
            }
        }
    }

    /// Like [`delay`](Self::delay), with the delay given in seconds.
    ///
    /// Fails with [`TaskError::InvalidArgument`] for negative or non-finite
    /// values.
    pub fn delay_secs(
        &self,
        seconds: f32,
        delay_type: DelayType,
        schedule: impl Into<Schedule>,
    ) -> TaskResult<Task<()>> {
        let delay = checked_seconds(seconds)?;
        Ok(self.delay(delay, delay_type, schedule))
    }

    /// Completes once `predicate` returns `true`.
    pub fn wait_until<F>(&self, predicate: F, schedule: impl Into<Schedule>) -> Task<()>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        LoopPromise::start(self, WaitUntilDriver::until(predicate), schedule.into())
    }

    /// Completes once `predicate` returns `false`.
    pub fn wait_while<F>(&self, predicate: F, schedule: impl Into<Schedule>) -> Task<()>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        LoopPromise::start(self, WaitUntilDriver::while_true(predicate), schedule.into())
    }

    /// Succeeds once `token` is canceled.
    pub fn wait_until_canceled(&self, token: CancellationToken, timing: PlayerLoopTiming) -> Task<()> {
        LoopPromise::start(self, WaitUntilCanceledDriver::new(token), Schedule::new(timing))
    }

    /// Completes with `selector(target)` once it differs from its value at
    /// creation. Canceled if `target` is dropped first.
    pub fn wait_until_value_changed<M, V, F>(
        &self,
        target: &Arc<M>,
        selector: F,
        schedule: impl Into<Schedule>,
    ) -> Task<V>
    where
        M: Send + Sync + 'static,
        V: PartialEq + Send + 'static,
        F: FnMut(&M) -> V + Send + 'static,
    {
        ValueChangedItem::start(self, target, selector, schedule.into())
    }

    /// Completes with the outcome of `operation` once it is done.
    ///
    /// An operation that is already done completes synchronously.
    pub fn from_async_operation<O>(&self, mut operation: O, schedule: impl Into<Schedule>) -> Task<O::Output>
    where
        O: AsyncOperation,
    {
        if operation.is_done() {
            return Task::from(operation.take_result());
        }
        LoopPromise::start(self, AsyncOperationDriver::new(operation), schedule.into())
    }

    /// Like [`from_async_operation`](Self::from_async_operation), reporting
    /// the progress of the operation once per frame.
    pub fn from_async_operation_with_progress<O, P>(
        &self,
        mut operation: O,
        progress: P,
        schedule: impl Into<Schedule>,
    ) -> Task<O::Output>
    where
        O: AsyncOperation,
        P: FnMut(f32) + Send + 'static,
    {
        if operation.is_done() {
            return Task::from(operation.take_result());
        }
        LoopPromise::start(
            self,
            AsyncOperationDriver::with_progress(operation, progress),
            schedule.into(),
        )
    }
}

fn on_current<T>(schedule: impl FnOnce(&PlayerLoopHandle) -> Task<T>) -> Task<T> {
    match PlayerLoopHandle::current() {
        Ok(handle) => schedule(&handle),
        Err(error) => Task::from_error(error),
    }
}

/// [`PlayerLoopHandle::yield_now`] on the current loop.
pub fn yield_now(schedule: impl Into<Schedule>) -> Task<()> {
    on_current(|handle| handle.yield_now(schedule))
}

/// [`PlayerLoopHandle::next_frame`] on the current loop.
pub fn next_frame(schedule: impl Into<Schedule>) -> Task<()> {
    on_current(|handle| handle.next_frame(schedule))
}

/// [`PlayerLoopHandle::delay_frame`] on the current loop.
pub fn delay_frame(frames: u32, schedule: impl Into<Schedule>) -> Task<()> {
    on_current(|handle| handle.delay_frame(frames, schedule))
}

/// [`PlayerLoopHandle::delay`] on the current loop.
pub fn delay(delay: Duration, delay_type: DelayType, schedule: impl Into<Schedule>) -> Task<()> {
    on_current(|handle| handle.delay(delay, delay_type, schedule))
}

/// [`PlayerLoopHandle::delay_secs`] on the current loop.
pub fn delay_secs(
    seconds: f32,
    delay_type: DelayType,
    schedule: impl Into<Schedule>,
) -> TaskResult<Task<()>> {
    let delay = checked_seconds(seconds)?;
    Ok(on_current(|handle| handle.delay(delay, delay_type, schedule)))
}

/// [`PlayerLoopHandle::wait_until`] on the current loop.
pub fn wait_until<F>(predicate: F, schedule: impl Into<Schedule>) -> Task<()>
where
    F: FnMut() -> bool + Send + 'static,
{
    on_current(|handle| handle.wait_until(predicate, schedule))
}

/// [`PlayerLoopHandle::wait_while`] on the current loop.
pub fn wait_while<F>(predicate: F, schedule: impl Into<Schedule>) -> Task<()>
where
    F: FnMut() -> bool + Send + 'static,
{
    on_current(|handle| handle.wait_while(predicate, schedule))
}

/// [`PlayerLoopHandle::wait_until_canceled`] on the current loop.
pub fn wait_until_canceled(token: CancellationToken, timing: PlayerLoopTiming) -> Task<()> {
    on_current(|handle| handle.wait_until_canceled(token, timing))
}

/// [`PlayerLoopHandle::wait_until_value_changed`] on the current loop.
pub fn wait_until_value_changed<M, V, F>(
    target: &Arc<M>,
    selector: F,
    schedule: impl Into<Schedule>,
) -> Task<V>
where
    M: Send + Sync + 'static,
    V: PartialEq + Send + 'static,
    F: FnMut(&M) -> V + Send + 'static,
{
    on_current(|handle| handle.wait_until_value_changed(target, selector, schedule))
}

/// [`PlayerLoopHandle::from_async_operation`] on the current loop.
pub fn from_async_operation<O>(operation: O, schedule: impl Into<Schedule>) -> Task<O::Output>
where
    O: AsyncOperation,
{
    on_current(|handle| handle.from_async_operation(operation, schedule))
}
