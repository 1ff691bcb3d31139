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

//! Operators that end a sequence on an outside signal.

use crate::upstream::Upstream;
use cadence_core::enumerator::{AsyncEnumerable, AsyncEnumerator};
use cadence_core::error::{InvalidOperation, TaskError, TaskResult};
use cadence_core::task::WakerSlot;
use cadence_core::{CancellationRegistration, CancellationToken, Task};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

enum UntilState {
    Running,
    Completed,
    Faulted(TaskError),
}

/// A sequence that ends when another task completes.
#[must_use = "sequences do nothing unless enumerated"]
pub struct TakeUntil<S> {
    source: S,
    other: Task<()>,
}

impl<S> TakeUntil<S> {
    pub(crate) fn new(source: S, other: Task<()>) -> Self {
        Self { source, other }
    }
}

impl<S: AsyncEnumerable> AsyncEnumerable for TakeUntil<S> {
    type Item = S::Item;
    type Enumerator = TakeUntilEnumerator<S>;

    fn get_async_enumerator(self, token: CancellationToken) -> Self::Enumerator {
        TakeUntilEnumerator {
            upstream: Upstream::new(self.source, token.clone()),
            other: Some(self.other),
            token,
            state: UntilState::Running,
            current: None,
            disposed: false,
        }
    }
}

/// Enumerator of [`TakeUntil`].
///
/// A successful `other` ends the sequence; a failed one fails it.
pub struct TakeUntilEnumerator<S: AsyncEnumerable> {
    upstream: Upstream<S>,
    other: Option<Task<()>>,
    token: CancellationToken,
    state: UntilState,
    current: Option<S::Item>,
    disposed: bool,
}

impl<S: AsyncEnumerable> AsyncEnumerator for TakeUntilEnumerator<S> {
    type Item = S::Item;

    fn poll_move_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        self.current = None;
        match &self.state {
            UntilState::Completed => return Poll::Ready(Ok(false)),
            UntilState::Faulted(error) => return Poll::Ready(Err(error.clone())),
            UntilState::Running => {}
        }
        if let Some(other) = self.other.as_mut() {
            if let Poll::Ready(outcome) = Pin::new(other).poll(cx) {
                self.other = None;
                self.state = match outcome {
                    Ok(()) => UntilState::Completed,
                    Err(error) => UntilState::Faulted(error),
                };
                return self.poll_move_next(cx);
            }
        }
        if let Err(canceled) = self.token.error_if_canceled() {
            self.state = UntilState::Faulted(canceled.clone());
            return Poll::Ready(Err(canceled));
        }
        match std::task::ready!(self.upstream.poll_next(cx)) {
            Ok(Some(item)) => {
                self.current = Some(item);
                Poll::Ready(Ok(true))
            }
            Ok(None) => {
                self.state = UntilState::Completed;
                Poll::Ready(Ok(false))
            }
            Err(error) => {
                self.state = UntilState::Faulted(error.clone());
                Poll::Ready(Err(error))
            }
        }
    }

    fn current(&self) -> Option<&S::Item> {
        self.current.as_ref()
    }

    fn take_current(&mut self) -> Option<S::Item> {
        self.current.take()
    }

    fn poll_dispose(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<()>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        let outcome = std::task::ready!(self.upstream.poll_dispose(cx));
        self.disposed = true;
        self.other = None;
        self.state = UntilState::Completed;
        Poll::Ready(outcome)
    }
}

/// A sequence that ends quietly when a token is canceled.
#[must_use = "sequences do nothing unless enumerated"]
pub struct TakeUntilCanceled<S> {
    source: S,
    until: CancellationToken,
}

impl<S> TakeUntilCanceled<S> {
    pub(crate) fn new(source: S, until: CancellationToken) -> Self {
        Self { source, until }
    }
}

impl<S: AsyncEnumerable> AsyncEnumerable for TakeUntilCanceled<S> {
    type Item = S::Item;
    type Enumerator = TakeUntilCanceledEnumerator<S>;

    fn get_async_enumerator(self, token: CancellationToken) -> Self::Enumerator {
        TakeUntilCanceledEnumerator {
            upstream: Upstream::new(self.source, token.clone()),
            until: self.until,
            wake: Arc::new(WakerSlot::new()),
            registration: None,
            token,
            state: UntilState::Running,
            current: None,
            disposed: false,
        }
    }
}

/// Enumerator of [`TakeUntilCanceled`].
///
/// Unlike the pull token, cancellation of `until` completes the sequence
/// instead of failing it, and wakes a pending pull.
pub struct TakeUntilCanceledEnumerator<S: AsyncEnumerable> {
    upstream: Upstream<S>,
    until: CancellationToken,
    wake: Arc<WakerSlot>,
    registration: Option<CancellationRegistration>,
    token: CancellationToken,
    state: UntilState,
    current: Option<S::Item>,
    disposed: bool,
}

impl<S: AsyncEnumerable> AsyncEnumerator for TakeUntilCanceledEnumerator<S> {
    type Item = S::Item;

    fn poll_move_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        self.current = None;
        match &self.state {
            UntilState::Completed => return Poll::Ready(Ok(false)),
            UntilState::Faulted(error) => return Poll::Ready(Err(error.clone())),
            UntilState::Running => {}
        }
        self.wake.register(cx.waker());
        if self.registration.is_none() && self.until.can_be_canceled() {
            let wake = self.wake.clone();
            self.registration = Some(self.until.register(move || wake.wake()));
        }
        if self.until.is_cancellation_requested() {
            log::trace!("take_until_canceled: sequence ended by its token.");
            self.state = UntilState::Completed;
            return Poll::Ready(Ok(false));
        }
        if let Err(canceled) = self.token.error_if_canceled() {
            self.state = UntilState::Faulted(canceled.clone());
            return Poll::Ready(Err(canceled));
        }
        match std::task::ready!(self.upstream.poll_next(cx)) {
            Ok(Some(item)) => {
                self.current = Some(item);
                Poll::Ready(Ok(true))
            }
            Ok(None) => {
                self.state = UntilState::Completed;
                Poll::Ready(Ok(false))
            }
            Err(error) => {
                self.state = UntilState::Faulted(error.clone());
                Poll::Ready(Err(error))
            }
        }
    }

    fn current(&self) -> Option<&S::Item> {
        self.current.as_ref()
    }

    fn take_current(&mut self) -> Option<S::Item> {
        self.current.take()
    }

    fn poll_dispose(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<()>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        let outcome = std::task::ready!(self.upstream.poll_dispose(cx));
        self.disposed = true;
        self.registration = None;
        self.state = UntilState::Completed;
        Poll::Ready(outcome)
    }
}
