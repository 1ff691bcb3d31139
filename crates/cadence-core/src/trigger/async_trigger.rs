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

use super::event::{HandlerKey, Terminal, TriggerEvent, TriggerHandler};
use crate::cancel::{CancellationRegistration, CancellationToken};
use crate::collections::RingQueue;
use crate::enumerator::{AsyncEnumerable, AsyncEnumerator};
use crate::error::{Fault, InvalidOperation, TaskError, TaskResult};
use crate::task::{AutoResetCompletionSource, Task, Token};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

/// The awaitable face of a [`TriggerEvent`].
///
/// Producers call [`raise`](Self::raise) and the terminal methods; consumers
/// either await the next value with [`next_async`](Self::next_async) or
/// enumerate every value with [`subscribe`](Self::subscribe).
pub struct AsyncTrigger<T> {
    event: Arc<TriggerEvent<T>>,
}

impl<T> Clone for AsyncTrigger<T> {
    fn clone(&self) -> Self {
        Self {
            event: self.event.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Default for AsyncTrigger<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> AsyncTrigger<T> {
    /// Creates a trigger with no consumers.
    pub fn new() -> Self {
        Self {
            event: Arc::new(TriggerEvent::new()),
        }
    }

    /// The underlying event, for attaching custom handlers.
    pub fn event(&self) -> &Arc<TriggerEvent<T>> {
        &self.event
    }

    /// Delivers `value` to every current consumer.
    pub fn raise(&self, value: T) {
        self.event.set_result(value);
    }

    /// Completes every consumer. Pending [`next_async`](Self::next_async)
    /// tasks are canceled; subscriptions end normally.
    pub fn complete(&self) -> bool {
        self.event.set_completed()
    }

    /// Fails every consumer with `fault`.
    pub fn fail(&self, fault: Fault) -> bool {
        self.event.set_error(fault)
    }

    /// Cancels every consumer with `token`.
    pub fn cancel(&self, token: CancellationToken) -> bool {
        self.event.set_canceled(token)
    }

    /// Resolves with the next raised value.
    pub fn next_async(&self, token: CancellationToken) -> Task<T> {
        if token.is_cancellation_requested() {
            return Task::from_canceled(token);
        }
        let (source, task) = AutoResetCompletionSource::create_task();
        let handler = Arc::new(NextHandler {
            version: source.version(),
            source,
            event: Arc::downgrade(&self.event),
            slot: Mutex::new(KeySlot::default()),
        });

        let key = self.event.add(handler.clone());
        let stale = {
            let mut slot = handler.slot.lock();
            if slot.done {
                Some(key)
            } else {
                slot.key = Some(key);
                None
            }
        };
        if let Some(key) = stale {
            self.event.remove(key);
            return task;
        }

        if token.can_be_canceled() {
            let canceler = handler.clone();
            let observed = token.clone();
            let registration = token.register(move || {
                if canceler.detach() {
                    canceler.source.try_set_canceled_for(canceler.version, observed);
                }
            });
            handler.slot.lock().registration = Some(registration);
        }
        task
    }

    /// Returns a sequence of every value raised after enumeration starts.
    pub fn subscribe(&self) -> TriggerStream<T> {
        TriggerStream {
            event: self.event.clone(),
        }
    }
}

impl<T> fmt::Debug for AsyncTrigger<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncTrigger").field("event", &self.event).finish()
    }
}

#[derive(Default)]
struct KeySlot {
    key: Option<HandlerKey>,
    done: bool,
    registration: Option<CancellationRegistration>,
}

/// One-shot consumer behind [`AsyncTrigger::next_async`].
struct NextHandler<T> {
    source: Arc<AutoResetCompletionSource<T>>,
    version: Token,
    event: Weak<TriggerEvent<T>>,
    slot: Mutex<KeySlot>,
}

impl<T: Clone + Send + 'static> NextHandler<T> {
    /// Marks the handler as fired and unlinks it. Returns `false` if it had
    /// already fired.
    fn detach(&self) -> bool {
        let (key, registration) = {
            let mut slot = self.slot.lock();
            if std::mem::replace(&mut slot.done, true) {
                return false;
            }
            (slot.key.take(), slot.registration.take())
        };
        if let (Some(key), Some(event)) = (key, self.event.upgrade()) {
            event.remove(key);
        }
        drop(registration);
        true
    }
}

impl<T: Clone + Send + 'static> TriggerHandler<T> for NextHandler<T> {
    fn on_next(&self, value: T) {
        if self.detach() {
            self.source.try_set_result_for(self.version, value);
        }
    }

    fn on_completed(&self) {
        if self.detach() {
            self.source
                .try_set_canceled_for(self.version, CancellationToken::none());
        }
    }

    fn on_error(&self, fault: Fault) {
        if self.detach() {
            self.source.try_set_exception_for(self.version, fault);
        }
    }

    fn on_canceled(&self, token: CancellationToken) {
        if self.detach() {
            self.source.try_set_canceled_for(self.version, token);
        }
    }
}

/// Every value raised on an [`AsyncTrigger`], as an asynchronous sequence.
pub struct TriggerStream<T> {
    event: Arc<TriggerEvent<T>>,
}

impl<T: Clone + Send + 'static> AsyncEnumerable for TriggerStream<T> {
    type Item = T;
    type Enumerator = TriggerEnumerator<T>;

    fn get_async_enumerator(self, token: CancellationToken) -> Self::Enumerator {
        TriggerEnumerator::attach(self.event, token)
    }
}

struct StreamState<T> {
    buffer: RingQueue<T>,
    terminal: Option<Terminal>,
    waker: Option<Waker>,
}

struct StreamHandler<T> {
    state: Mutex<StreamState<T>>,
}

impl<T> StreamHandler<T> {
    fn push(&self, update: impl FnOnce(&mut StreamState<T>)) {
        let waker = {
            let mut state = self.state.lock();
            update(&mut state);
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T: Send> TriggerHandler<T> for StreamHandler<T> {
    fn on_next(&self, value: T) {
        self.push(|state| state.buffer.enqueue(value));
    }

    fn on_completed(&self) {
        self.push(|state| state.terminal = Some(Terminal::Completed));
    }

    fn on_error(&self, fault: Fault) {
        self.push(|state| state.terminal = Some(Terminal::Error(fault)));
    }

    fn on_canceled(&self, token: CancellationToken) {
        self.push(|state| state.terminal = Some(Terminal::Canceled(token)));
    }
}

/// Enumerator over the values of a [`TriggerStream`].
///
/// The handler is linked when the enumerator is created; values raised while
/// the consumer is busy are buffered in order.
pub struct TriggerEnumerator<T: Clone + Send + 'static> {
    event: Arc<TriggerEvent<T>>,
    handler: Arc<StreamHandler<T>>,
    key: Option<HandlerKey>,
    token: CancellationToken,
    registration: Option<CancellationRegistration>,
    current: Option<T>,
    disposed: bool,
}

impl<T: Clone + Send + 'static> TriggerEnumerator<T> {
    pub(crate) fn attach(event: Arc<TriggerEvent<T>>, token: CancellationToken) -> Self {
        let handler = Arc::new(StreamHandler {
            state: Mutex::new(StreamState {
                buffer: RingQueue::default(),
                terminal: None,
                waker: None,
            }),
        });
        let key = event.add(handler.clone());

        // Wake a parked consumer when the token fires so it observes cancellation.
        let registration = token.can_be_canceled().then(|| {
            let wake = Arc::downgrade(&handler);
            token.register(move || {
                if let Some(handler) = wake.upgrade() {
                    handler.push(|_| {});
                }
            })
        });

        Self {
            event,
            handler,
            key: key.is_linked().then_some(key),
            token,
            registration,
            current: None,
            disposed: false,
        }
    }

    fn detach(&mut self) {
        if let Some(key) = self.key.take() {
            self.event.remove(key);
        }
        self.registration = None;
    }
}

impl<T: Clone + Send + 'static> AsyncEnumerator for TriggerEnumerator<T> {
    type Item = T;

    fn poll_move_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        if self.token.is_cancellation_requested() {
            return Poll::Ready(Err(TaskError::canceled(self.token.clone())));
        }
        let mut state = self.handler.state.lock();
        if let Some(value) = state.buffer.dequeue() {
            drop(state);
            self.current = Some(value);
            return Poll::Ready(Ok(true));
        }
        match state.terminal.clone() {
            Some(terminal) => Poll::Ready(match terminal.into_error() {
                None => Ok(false),
                Some(error) => Err(error),
            }),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }

    fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    fn take_current(&mut self) -> Option<T> {
        self.current.take()
    }

    fn poll_dispose(&mut self, _cx: &mut Context<'_>) -> Poll<TaskResult<()>> {
        if std::mem::replace(&mut self.disposed, true) {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        self.detach();
        self.current = None;
        Poll::Ready(Ok(()))
    }
}

impl<T: Clone + Send + 'static> Drop for TriggerEnumerator<T> {
    fn drop(&mut self) {
        self.detach();
    }
}
