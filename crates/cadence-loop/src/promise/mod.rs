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

//! Pooled promises completed by the player loop.
//!
//! A [`LoopPromise`] is both a task source and a loop item. Its per-kind
//! behavior lives in a small [`PromiseDriver`]; the promise itself handles
//! pooling, versioning and cancellation.

mod async_operation;
mod delay;
mod frame;
mod value_changed;
mod wait;

pub use self::async_operation::{AsyncOperation, AsyncOperationDriver};
pub use self::delay::{DelayDriver, RealtimeDelayDriver};
pub use self::frame::{DelayFrameDriver, NextFrameDriver, YieldDriver};
pub use self::value_changed::ValueChangedItem;
pub use self::wait::{WaitUntilCanceledDriver, WaitUntilDriver};

use crate::clock::FrameClock;
use crate::player_loop::PlayerLoopHandle;
use crate::runner::PlayerLoopItem;
use crate::schedule::{CancelMode, Schedule};
use cadence_core::cancel::{CancellationRegistration, CancellationToken};
use cadence_core::error::{Fault, TaskError, TaskResult};
use cadence_core::pool::{self, Poolable};
use cadence_core::task::{
    CompletionSourceCore, Continuation, Task, TaskSource, TaskStatus, Token,
};
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::task::Poll;

/// The per-frame logic of a [`LoopPromise`].
pub trait PromiseDriver: Send + 'static {
    /// The value the promise completes with.
    type Output: Send + 'static;

    /// Advances the driver by one frame.
    ///
    /// `creation_frame` is `true` while the clock still shows the frame in
    /// which the promise was started.
    fn poll(&mut self, clock: &FrameClock, creation_frame: bool)
        -> Poll<TaskResult<Self::Output>>;
}

struct PromiseState<D> {
    driver: Option<D>,
    cancel: CancellationToken,
    registration: CancellationRegistration,
    initial_frame: u64,
    in_loop: bool,
    consumed: bool,
}

impl<D> PromiseState<D> {
    fn idle() -> Self {
        Self {
            driver: None,
            cancel: CancellationToken::none(),
            registration: CancellationRegistration::default(),
            initial_frame: 0,
            in_loop: false,
            consumed: false,
        }
    }

    /// Returns `true` once neither the runner nor an awaiter needs the node.
    fn releasable(&self) -> bool {
        !self.in_loop && self.consumed
    }
}

/// A pooled promise polled by a [`PlayerLoopRunner`](crate::runner::PlayerLoopRunner).
///
/// The node goes back to its pool once both the runner has dropped it and
/// its result has been read.
pub struct LoopPromise<D: PromiseDriver> {
    core: CompletionSourceCore<D::Output>,
    state: Mutex<PromiseState<D>>,
    this: Weak<Self>,
}

impl<D: PromiseDriver> LoopPromise<D> {
    /// Starts `driver` on `handle` and returns the task it completes.
    ///
    /// Returns an already canceled task if the schedule's token is canceled.
    pub fn start(handle: &PlayerLoopHandle, driver: D, schedule: Schedule) -> Task<D::Output> {
        let Schedule {
            timing,
            token,
            cancel_mode,
        } = schedule;
        if token.is_cancellation_requested() {
            return Task::from_canceled(token);
        }

        let promise = pool::shared::<Self>().try_pop().unwrap_or_else(|| {
            Arc::new_cyclic(|this| Self {
                core: CompletionSourceCore::new(),
                state: Mutex::new(PromiseState::idle()),
                this: this.clone(),
            })
        });
        let version = promise.core.version();

        let registration = if cancel_mode == CancelMode::Immediate && token.can_be_canceled() {
            let weak = promise.this.clone();
            let cancel = token.clone();
            token.register(move || {
                if let Some(promise) = weak.upgrade() {
                    promise.core.try_set_canceled_for(version, cancel);
                }
            })
        } else {
            CancellationRegistration::default()
        };

        {
            let mut state = promise.state.lock();
            state.driver = Some(driver);
            state.cancel = token;
            state.registration = registration;
            state.initial_frame = handle.clock().frame_count();
            state.in_loop = true;
            state.consumed = false;
        }

        handle.add_action(timing, promise.clone());
        let source: Arc<dyn TaskSource<D::Output>> = promise;
        Task::from_source(source, version)
    }

    fn finish(&self, outcome: TaskResult<D::Output>) {
        let registration = {
            let mut state = self.state.lock();
            state.in_loop = false;
            state.driver = None;
            std::mem::take(&mut state.registration)
        };
        drop(registration);
        // Completing may let an awaiter read the result and recycle the node
        // inline; nothing below may touch the node afterwards.
        match outcome {
            Ok(value) => self.core.try_set_result(value),
            Err(error) => self.core.try_set_error(error),
        };
    }

    fn detach(&self) {
        let recycle = {
            let mut state = self.state.lock();
            state.in_loop = false;
            state.driver = None;
            state.releasable()
        };
        if recycle {
            self.return_to_pool();
        }
    }

    fn return_to_pool(&self) {
        if let Some(this) = self.this.upgrade() {
            pool::shared::<Self>().try_push(this);
        }
    }
}

impl<D: PromiseDriver> PlayerLoopItem for LoopPromise<D> {
    fn move_next(&self, clock: &FrameClock) -> bool {
        if self.core.unsafe_status().is_completed() {
            // Canceled through an immediate registration.
            self.detach();
            return false;
        }

        let polled = {
            let mut state = self.state.lock();
            if state.cancel.is_cancellation_requested() {
                Some(Err(TaskError::canceled(state.cancel.clone())))
            } else {
                let creation_frame = clock.frame_count() == state.initial_frame;
                match state.driver.as_mut() {
                    Some(driver) => match panic::catch_unwind(AssertUnwindSafe(|| {
                        driver.poll(clock, creation_frame)
                    })) {
                        Ok(Poll::Pending) => None,
                        Ok(Poll::Ready(outcome)) => Some(outcome),
                        Err(payload) => Some(Err(Fault::from_panic(payload).into())),
                    },
                    None => Some(Err(TaskError::fault(anyhow::anyhow!(
                        "loop promise polled without a driver"
                    )))),
                }
            }
        };

        match polled {
            None => true,
            Some(outcome) => {
                self.finish(outcome);
                false
            }
        }
    }
}

impl<D: PromiseDriver> TaskSource<D::Output> for LoopPromise<D> {
    fn status(&self, token: Token) -> TaskResult<TaskStatus> {
        self.core.status(token)
    }

    fn unsafe_status(&self) -> TaskStatus {
        self.core.unsafe_status()
    }

    fn on_completed(&self, continuation: Continuation, token: Token) -> TaskResult<()> {
        self.core.on_completed(continuation, token)
    }

    fn get_result(&self, token: Token) -> TaskResult<D::Output> {
        let result = self.core.take_result(token);
        if matches!(result, Err(TaskError::InvalidOperation(_))) {
            return result;
        }
        let recycle = {
            let mut state = self.state.lock();
            state.consumed = true;
            state.releasable()
        };
        if recycle {
            self.return_to_pool();
        }
        result
    }
}

impl<D: PromiseDriver> Poolable for LoopPromise<D> {
    fn clear(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), PromiseState::idle());
        drop(previous);
        self.core.reset();
    }
}

impl<D: PromiseDriver> fmt::Debug for LoopPromise<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopPromise")
            .field("driver", &std::any::type_name::<D>())
            .field("core", &self.core)
            .finish()
    }
}
