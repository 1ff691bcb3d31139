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

//! Plumbing shared by the sequences a player loop produces.
//!
//! A loop item publishes into a [`Signal`] from inside a phase, and the
//! sequence's enumerator takes from it. Values the consumer has not taken
//! when the next one arrives are replaced, so a slow consumer sees the
//! latest value rather than a backlog.

use cadence_core::enumerator::{AsyncEnumerable, AsyncEnumerator};
use cadence_core::error::{InvalidOperation, TaskError, TaskResult};
use cadence_core::task::WakerSlot;
use cadence_core::CancellationToken;
use parking_lot::Mutex;
use std::sync::Arc;
use std::task::{Context, Poll};

enum End {
    Open,
    Completed,
    Faulted(TaskError),
}

struct SignalState<T> {
    value: Option<T>,
    end: End,
    stopped: bool,
}

/// A single-slot mailbox between a loop item and a consumer.
pub struct Signal<T> {
    state: Mutex<SignalState<T>>,
    waker: WakerSlot,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(SignalState {
                value: None,
                end: End::Open,
                stopped: false,
            }),
            waker: WakerSlot::new(),
        }
    }
}

impl<T> Signal<T> {
    /// Creates an open signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a value, replacing one that was not taken yet.
    pub fn publish(&self, value: T) {
        {
            let mut state = self.state.lock();
            if state.stopped || !matches!(state.end, End::Open) {
                return;
            }
            state.value = Some(value);
        }
        self.waker.wake();
    }

    /// Ends the sequence after the value still in the slot, if any.
    pub fn complete(&self) {
        self.close(End::Completed);
    }

    /// Fails the sequence after the value still in the slot, if any.
    pub fn fail(&self, error: TaskError) {
        self.close(End::Faulted(error));
    }

    fn close(&self, end: End) {
        {
            let mut state = self.state.lock();
            if !matches!(state.end, End::Open) {
                return;
            }
            state.end = end;
        }
        self.waker.wake();
    }

    /// Returns `true` once the consumer went away; producers should stop.
    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        state.value = None;
    }

    fn poll_take(&self, cx: &mut Context<'_>) -> Poll<TaskResult<Option<T>>> {
        let mut state = self.state.lock();
        if let Some(value) = state.value.take() {
            return Poll::Ready(Ok(Some(value)));
        }
        match &state.end {
            End::Completed => Poll::Ready(Ok(None)),
            End::Faulted(error) => Poll::Ready(Err(error.clone())),
            End::Open => {
                // Registered under the state lock so a concurrent publish
                // cannot slip in between the check and the registration.
                self.waker.register(cx.waker());
                Poll::Pending
            }
        }
    }
}

/// Something that feeds a [`Signal`] from the player loop.
pub trait LoopSource {
    /// The element type.
    type Item;

    /// Starts producing. Called by the first pull of the sequence.
    ///
    /// The producer should complete `signal` when `token` is canceled and
    /// stop once [`Signal::is_stopped`] returns `true`.
    fn start(self, signal: Arc<Signal<Self::Item>>, token: CancellationToken);
}

/// A sequence produced by a [`LoopSource`].
#[must_use = "sequences do nothing unless enumerated"]
pub struct LoopSequence<P> {
    source: P,
}

impl<P> LoopSequence<P> {
    pub(crate) fn new(source: P) -> Self {
        Self { source }
    }
}

impl<P: LoopSource> AsyncEnumerable for LoopSequence<P> {
    type Item = P::Item;
    type Enumerator = LoopSequenceEnumerator<P>;

    fn get_async_enumerator(self, token: CancellationToken) -> Self::Enumerator {
        LoopSequenceEnumerator {
            source: Some(self.source),
            signal: Arc::new(Signal::new()),
            token,
            current: None,
            disposed: false,
        }
    }
}

/// Enumerator of a [`LoopSequence`].
///
/// Dropping it without disposing still stops the producer, which then leaves
/// the player loop on its next pass.
pub struct LoopSequenceEnumerator<P: LoopSource> {
    source: Option<P>,
    signal: Arc<Signal<P::Item>>,
    token: CancellationToken,
    current: Option<P::Item>,
    disposed: bool,
}

impl<P: LoopSource> AsyncEnumerator for LoopSequenceEnumerator<P> {
    type Item = P::Item;

    fn poll_move_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        self.current = None;
        if let Err(canceled) = self.token.error_if_canceled() {
            self.signal.stop();
            return Poll::Ready(Err(canceled));
        }
        if let Some(source) = self.source.take() {
            source.start(self.signal.clone(), self.token.clone());
        }
        match std::task::ready!(self.signal.poll_take(cx)) {
            Ok(Some(value)) => {
                self.current = Some(value);
                Poll::Ready(Ok(true))
            }
            Ok(None) => Poll::Ready(Ok(false)),
            Err(error) => Poll::Ready(Err(error)),
        }
    }

    fn current(&self) -> Option<&P::Item> {
        self.current.as_ref()
    }

    fn take_current(&mut self) -> Option<P::Item> {
        self.current.take()
    }

    fn poll_dispose(&mut self, _cx: &mut Context<'_>) -> Poll<TaskResult<()>> {
        if std::mem::replace(&mut self.disposed, true) {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        self.source = None;
        self.current = None;
        self.signal.stop();
        Poll::Ready(Ok(()))
    }
}

impl<P: LoopSource> Drop for LoopSequenceEnumerator<P> {
    fn drop(&mut self) {
        self.signal.stop();
    }
}
