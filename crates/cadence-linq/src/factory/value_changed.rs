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

use super::signal::{LoopSequence, LoopSource, Signal};
use cadence_core::error::Fault;
use cadence_core::CancellationToken;
use cadence_loop::{FrameClock, PlayerLoopHandle, PlayerLoopItem, PlayerLoopTiming};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

/// Sequence returned by [`every_value_changed`].
pub type EveryValueChanged<M, V, F> = LoopSequence<ValueChangedSource<M, V, F>>;

/// The [`LoopSource`] behind [`EveryValueChanged`].
pub struct ValueChangedSource<M, V, F> {
    handle: PlayerLoopHandle,
    target: Weak<M>,
    selector: F,
    timing: PlayerLoopTiming,
    _value: std::marker::PhantomData<fn() -> V>,
}

/// Yields the value `selector` reads from `target`, then every value that
/// differs from the last one yielded.
///
/// The target is sampled once per frame in `timing` and held weakly; the
/// sequence ends when it is dropped.
pub fn every_value_changed<M, V, F>(
    handle: &PlayerLoopHandle,
    target: &Arc<M>,
    selector: F,
    timing: PlayerLoopTiming,
) -> EveryValueChanged<M, V, F>
where
    M: Send + Sync + 'static,
    V: PartialEq + Clone + Send + 'static,
    F: FnMut(&M) -> V + Send + 'static,
{
    LoopSequence::new(ValueChangedSource {
        handle: handle.clone(),
        target: Arc::downgrade(target),
        selector,
        timing,
        _value: std::marker::PhantomData,
    })
}

impl<M, V, F> LoopSource for ValueChangedSource<M, V, F>
where
    M: Send + Sync + 'static,
    V: PartialEq + Clone + Send + 'static,
    F: FnMut(&M) -> V + Send + 'static,
{
    type Item = V;

    fn start(self, signal: Arc<Signal<V>>, token: CancellationToken) {
        let Some(target) = self.target.upgrade() else {
            signal.complete();
            return;
        };
        let mut selector = self.selector;
        let initial = match panic::catch_unwind(AssertUnwindSafe(|| selector(&target))) {
            Ok(value) => value,
            Err(payload) => {
                signal.fail(Fault::from_panic(payload).into());
                return;
            }
        };
        drop(target);
        signal.publish(initial.clone());
        self.handle.add_action(
            self.timing,
            Arc::new(WatchItem {
                signal,
                token,
                watch: Mutex::new(Watch {
                    target: self.target,
                    selector,
                    last: initial,
                }),
            }),
        );
    }
}

struct Watch<M, V, F> {
    target: Weak<M>,
    selector: F,
    last: V,
}

struct WatchItem<M, V, F> {
    signal: Arc<Signal<V>>,
    token: CancellationToken,
    watch: Mutex<Watch<M, V, F>>,
}

impl<M, V, F> PlayerLoopItem for WatchItem<M, V, F>
where
    M: Send + Sync + 'static,
    V: PartialEq + Clone + Send + 'static,
    F: FnMut(&M) -> V + Send + 'static,
{
    fn move_next(&self, _clock: &FrameClock) -> bool {
        if self.signal.is_stopped() {
            return false;
        }
        if self.token.is_cancellation_requested() {
            self.signal.complete();
            return false;
        }
        let mut watch = self.watch.lock();
        let Some(target) = watch.target.upgrade() else {
            log::debug!("every_value_changed: target dropped, ending the sequence.");
            self.signal.complete();
            return false;
        };
        let sampled = panic::catch_unwind(AssertUnwindSafe(|| (watch.selector)(&target)));
        let value = match sampled {
            Ok(value) => value,
            Err(payload) => {
                self.signal.fail(Fault::from_panic(payload).into());
                return false;
            }
        };
        if value == watch.last {
            return true;
        }
        watch.last = value.clone();
        drop(watch);
        self.signal.publish(value);
        true
    }
}
