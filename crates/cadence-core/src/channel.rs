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

//! An unbounded single-consumer channel whose reader awaits with tasks.
//!
//! Writers may live on any thread. The reader is not cloneable: at most one
//! wait can be pending at a time, and a second concurrent wait fails with
//! [`InvalidOperation::ConcurrentMoveNext`].

use crate::cancel::{CancellationRegistration, CancellationToken};
use crate::collections::RingQueue;
use crate::enumerator::{AsyncEnumerable, AsyncEnumerator};
use crate::error::{Fault, InvalidOperation, TaskError, TaskResult};
use crate::task::TaskSource;
use crate::task::{spawn, AutoResetCompletionSource, Task, Token};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

struct Waiter {
    source: Arc<AutoResetCompletionSource<bool>>,
    version: Token,
    _registration: CancellationRegistration,
}

impl Waiter {
    fn is_pending(&self) -> bool {
        self.source.version() == self.version && !self.source.unsafe_status().is_completed()
    }
}

struct ChannelState<T> {
    queue: RingQueue<T>,
    // `Some` once completed; the inner value is the completion error, if any.
    closed: Option<Option<Fault>>,
    waiter: Option<Waiter>,
}

struct Shared<T> {
    state: Mutex<ChannelState<T>>,
}

/// Creates a channel with an unbounded buffer and a single reader.
pub fn single_consumer_unbounded<T: Send + 'static>() -> (ChannelWriter<T>, ChannelReader<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(ChannelState {
            queue: RingQueue::default(),
            closed: None,
            waiter: None,
        }),
    });
    (
        ChannelWriter {
            shared: shared.clone(),
        },
        ChannelReader { shared },
    )
}

/// The sending half of a channel.
pub struct ChannelWriter<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ChannelWriter<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Send + 'static> ChannelWriter<T> {
    /// Buffers `value`. Returns `false` once the channel is completed.
    pub fn try_write(&self, value: T) -> bool {
        let waiter = {
            let mut state = self.shared.state.lock();
            if state.closed.is_some() {
                return false;
            }
            state.queue.enqueue(value);
            state.waiter.take()
        };
        if let Some(waiter) = waiter {
            waiter.source.try_set_result_for(waiter.version, true);
        }
        true
    }

    /// Completes the channel, optionally with an error that the reader observes
    /// once the buffer is drained. Returns `false` if already completed.
    pub fn try_complete(&self, error: Option<Fault>) -> bool {
        let waiter = {
            let mut state = self.shared.state.lock();
            if state.closed.is_some() {
                return false;
            }
            state.closed = Some(error.clone());
            state.waiter.take()
        };
        log::debug!("Channel completed (faulted: {}).", error.is_some());
        if let Some(waiter) = waiter {
            match error {
                Some(fault) => waiter.source.try_set_exception_for(waiter.version, fault),
                None => waiter.source.try_set_result_for(waiter.version, false),
            };
        }
        true
    }
}

/// The receiving half of a channel.
pub struct ChannelReader<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> ChannelReader<T> {
    /// Takes a buffered value without waiting.
    pub fn try_read(&self) -> Option<T> {
        self.shared.state.lock().queue.dequeue()
    }

    /// Resolves to `true` when a value can be read, and to `false` once the
    /// channel is completed and drained.
    pub fn wait_to_read_async(&self, token: CancellationToken) -> Task<bool> {
        wait_to_read(&self.shared, token)
    }

    /// Resolves to the next value.
    ///
    /// Fails with [`InvalidOperation::ChannelClosed`] once the channel is
    /// completed and drained.
    pub fn read_async(&self, token: CancellationToken) -> Task<T> {
        if let Some(value) = self.try_read() {
            return Task::from_result(value);
        }
        let shared = self.shared.clone();
        spawn(async move {
            loop {
                if !wait_to_read(&shared, token.clone()).await? {
                    return Err(InvalidOperation::ChannelClosed.into());
                }
                if let Some(value) = shared.state.lock().queue.dequeue() {
                    return Ok(value);
                }
            }
        })
    }

    /// Consumes the reader into a sequence of every value written.
    pub fn read_all(self) -> ReadAll<T> {
        ReadAll {
            shared: self.shared,
        }
    }
}

fn wait_to_read<T: Send + 'static>(shared: &Arc<Shared<T>>, token: CancellationToken) -> Task<bool> {
    if token.is_cancellation_requested() {
        return Task::from_canceled(token);
    }
    let mut state = shared.state.lock();
    if !state.queue.is_empty() {
        return Task::from_result(true);
    }
    if let Some(closed) = &state.closed {
        return match closed {
            Some(fault) => Task::from_exception(fault.clone()),
            None => Task::from_result(false),
        };
    }
    if state.waiter.as_ref().is_some_and(Waiter::is_pending) {
        return Task::from_error(InvalidOperation::ConcurrentMoveNext.into());
    }

    let (source, task) = AutoResetCompletionSource::create_task();
    let version = source.version();
    let canceled = source.clone();
    let observed = token.clone();
    state.waiter = Some(Waiter {
        source,
        version,
        _registration: CancellationRegistration::default(),
    });
    drop(state);

    // Registered outside the lock: a canceled token runs the callback inline.
    let registration = token.register(move || {
        canceled.try_set_canceled_for(version, observed);
    });
    if let Some(waiter) = shared.state.lock().waiter.as_mut() {
        if waiter.version == version {
            waiter._registration = registration;
        }
    }
    task
}

impl<T> fmt::Debug for ChannelReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ChannelReader")
            .field("buffered", &state.queue.len())
            .field("completed", &state.closed.is_some())
            .finish()
    }
}

impl<T> fmt::Debug for ChannelWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelWriter").finish_non_exhaustive()
    }
}

/// Every value of a channel as an asynchronous sequence.
pub struct ReadAll<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> AsyncEnumerable for ReadAll<T> {
    type Item = T;
    type Enumerator = ReadAllEnumerator<T>;

    fn get_async_enumerator(self, token: CancellationToken) -> Self::Enumerator {
        ReadAllEnumerator {
            shared: self.shared,
            token,
            current: None,
            pending: None,
            disposed: false,
        }
    }
}

/// Enumerator returned by [`ReadAll`].
pub struct ReadAllEnumerator<T> {
    shared: Arc<Shared<T>>,
    token: CancellationToken,
    current: Option<T>,
    pending: Option<Task<bool>>,
    disposed: bool,
}

impl<T: Send + 'static> AsyncEnumerator for ReadAllEnumerator<T> {
    type Item = T;

    fn poll_move_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        loop {
            if let Some(pending) = self.pending.as_mut() {
                let ready = std::task::ready!(Pin::new(pending).poll(cx));
                self.pending = None;
                match ready {
                    Ok(true) => continue,
                    Ok(false) => return Poll::Ready(Ok(false)),
                    Err(error) => return Poll::Ready(Err(error)),
                }
            }
            if self.token.is_cancellation_requested() {
                return Poll::Ready(Err(TaskError::canceled(self.token.clone())));
            }
            if let Some(value) = self.shared.state.lock().queue.dequeue() {
                self.current = Some(value);
                return Poll::Ready(Ok(true));
            }
            self.pending = Some(wait_to_read(&self.shared, self.token.clone()));
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
        self.pending = None;
        self.current = None;
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationTokenSource;
    use crate::enumerator::AsyncEnumeratorExt;
    use crate::task::TaskStatus;

    #[test]
    fn values_are_read_in_write_order() {
        let (writer, reader) = single_consumer_unbounded();
        assert!(writer.try_write(1));
        assert!(writer.try_write(2));
        assert_eq!(reader.try_read(), Some(1));
        assert_eq!(reader.try_read(), Some(2));
        assert_eq!(reader.try_read(), None);
    }

    #[test]
    fn waiting_reader_is_released_by_a_write() {
        let (writer, reader) = single_consumer_unbounded::<&str>();
        let wait = reader.wait_to_read_async(CancellationToken::none());
        assert_eq!(wait.status().unwrap(), TaskStatus::Pending);

        let second = reader.wait_to_read_async(CancellationToken::none());
        assert!(matches!(
            second.get_result(),
            Err(TaskError::InvalidOperation(InvalidOperation::ConcurrentMoveNext))
        ));

        writer.try_write("ping");
        assert!(wait.get_result().unwrap());
        assert_eq!(reader.try_read(), Some("ping"));
    }

    #[test]
    fn completion_drains_then_closes() {
        let (writer, reader) = single_consumer_unbounded();
        writer.try_write(5);
        writer.try_complete(None);
        assert!(!writer.try_write(6));

        assert_eq!(reader.read_async(CancellationToken::none()).get_result().unwrap(), 5);
        assert!(matches!(
            reader.read_async(CancellationToken::none()).get_result(),
            Err(TaskError::InvalidOperation(InvalidOperation::ChannelClosed))
        ));
    }

    #[test]
    fn canceled_wait_does_not_block_the_next_one() {
        let (writer, reader) = single_consumer_unbounded::<u8>();
        let cts = CancellationTokenSource::new();
        let wait = reader.wait_to_read_async(cts.token());
        cts.cancel();
        assert!(wait.get_result().unwrap_err().is_canceled());

        let next = reader.wait_to_read_async(CancellationToken::none());
        writer.try_write(1);
        assert!(next.get_result().unwrap());
    }

    #[test]
    fn read_all_yields_until_completion() {
        let (writer, reader) = single_consumer_unbounded();
        let mut values = reader.read_all().get_async_enumerator(CancellationToken::none());
        let collected = spawn(async move {
            let mut seen = Vec::new();
            while let Some(value) = values.next_async().await? {
                seen.push(value);
            }
            values.dispose_async().await?;
            Ok(seen)
        });

        writer.try_write('a');
        writer.try_write('b');
        assert_eq!(collected.status().unwrap(), TaskStatus::Pending);
        writer.try_complete(None);
        assert_eq!(collected.get_result().unwrap(), vec!['a', 'b']);
    }
}
