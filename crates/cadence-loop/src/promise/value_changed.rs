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

use crate::clock::FrameClock;
use crate::player_loop::PlayerLoopHandle;
use crate::runner::PlayerLoopItem;
use crate::schedule::{CancelMode, Schedule};
use cadence_core::cancel::{CancellationRegistration, CancellationToken};
use cadence_core::error::Fault;
use cadence_core::task::{AutoResetCompletionSource, Task, TaskSource, Token};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

struct Watch<M, V, F> {
    target: Weak<M>,
    selector: F,
    current: V,
    cancel: CancellationToken,
    _registration: CancellationRegistration,
}

/// Samples a value of a monitored object once per frame and completes with
/// the new value when it differs from the one seen at creation.
///
/// The monitored object is held weakly; if it is dropped the task is
/// canceled. Watchers are generic over the selector, so they are not pooled.
pub struct ValueChangedItem<M, V, F> {
    watch: Mutex<Option<Watch<M, V, F>>>,
    source: Arc<AutoResetCompletionSource<V>>,
    version: Token,
}

impl<M, V, F> ValueChangedItem<M, V, F>
where
    M: Send + Sync + 'static,
    V: PartialEq + Send + 'static,
    F: FnMut(&M) -> V + Send + 'static,
{
    /// Starts watching `selector(target)` on `handle`.
    ///
    /// The initial value is sampled before this returns.
    pub fn start(
        handle: &PlayerLoopHandle,
        target: &Arc<M>,
        mut selector: F,
        schedule: Schedule,
    ) -> Task<V> {
        let Schedule {
            timing,
            token,
            cancel_mode,
        } = schedule;
        if token.is_cancellation_requested() {
            return Task::from_canceled(token);
        }

        let (source, task) = AutoResetCompletionSource::create_task();
        let version = source.version();
        let registration = if cancel_mode == CancelMode::Immediate && token.can_be_canceled() {
            let source = source.clone();
            let cancel = token.clone();
            token.register(move || {
                source.try_set_canceled_for(version, cancel);
            })
        } else {
            CancellationRegistration::default()
        };

        let current = selector(target);
        let item = Arc::new(Self {
            watch: Mutex::new(Some(Watch {
                target: Arc::downgrade(target),
                selector,
                current,
                cancel: token,
                _registration: registration,
            })),
            source,
            version,
        });
        handle.add_action(timing, item);
        task
    }
}

impl<M, V, F> PlayerLoopItem for ValueChangedItem<M, V, F>
where
    M: Send + Sync + 'static,
    V: PartialEq + Send + 'static,
    F: FnMut(&M) -> V + Send + 'static,
{
    fn move_next(&self, _clock: &FrameClock) -> bool {
        let mut slot = self.watch.lock();
        let Some(watch) = slot.as_mut() else {
            return false;
        };
        // Completed by an immediate cancellation, possibly already read.
        if !matches!(self.source.status(self.version), Ok(status) if !status.is_completed()) {
            *slot = None;
            return false;
        }

        if watch.cancel.is_cancellation_requested() {
            let cancel = watch.cancel.clone();
            *slot = None;
            drop(slot);
            self.source.try_set_canceled_for(self.version, cancel);
            return false;
        }
        let Some(target) = watch.target.upgrade() else {
            let cancel = watch.cancel.clone();
            *slot = None;
            drop(slot);
            log::debug!("Watched object dropped; canceling its value watcher.");
            self.source.try_set_canceled_for(self.version, cancel);
            return false;
        };

        let sampled = panic::catch_unwind(AssertUnwindSafe(|| (watch.selector)(&target)));
        match sampled {
            Ok(value) if value == watch.current => true,
            Ok(value) => {
                *slot = None;
                drop(slot);
                self.source.try_set_result_for(self.version, value);
                false
            }
            Err(payload) => {
                *slot = None;
                drop(slot);
                self.source
                    .try_set_exception_for(self.version, Fault::from_panic(payload));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player_loop::PlayerLoop;
    use cadence_core::task::TaskStatus;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::time::Duration;

    #[test]
    fn completes_with_the_new_value() {
        let player_loop = PlayerLoop::new();
        let health = Arc::new(AtomicI32::new(100));
        let task = ValueChangedItem::start(
            &player_loop.handle(),
            &health,
            |h: &AtomicI32| h.load(Ordering::SeqCst),
            Schedule::default(),
        );

        player_loop.tick(Duration::from_millis(16));
        assert_eq!(task.status().unwrap(), TaskStatus::Pending);

        health.store(75, Ordering::SeqCst);
        player_loop.tick(Duration::from_millis(16));
        assert_eq!(task.get_result().unwrap(), 75);
    }

    #[test]
    fn dropping_the_target_cancels_the_watch() {
        let player_loop = PlayerLoop::new();
        let target = Arc::new(AtomicI32::new(0));
        let task = ValueChangedItem::start(
            &player_loop.handle(),
            &target,
            |t: &AtomicI32| t.load(Ordering::SeqCst),
            Schedule::default(),
        );

        drop(target);
        player_loop.tick(Duration::from_millis(16));
        assert_eq!(task.status().unwrap(), TaskStatus::Canceled);
    }
}
