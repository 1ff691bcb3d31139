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

use cadence_core::enumerator::{AsyncEnumerable, AsyncEnumerator};
use cadence_core::error::{InvalidOperation, TaskError, TaskResult};
use cadence_core::task::WakerSlot;
use cadence_core::{CancellationRegistration, CancellationToken};
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A sequence that never yields and never ends on its own.
#[must_use = "sequences do nothing unless enumerated"]
pub struct Never<T> {
    _item: PhantomData<fn() -> T>,
}

/// Creates a sequence whose pulls stay pending until the pull token is
/// canceled.
pub fn never<T>() -> Never<T> {
    Never { _item: PhantomData }
}

impl<T> AsyncEnumerable for Never<T> {
    type Item = T;
    type Enumerator = NeverEnumerator<T>;

    fn get_async_enumerator(self, token: CancellationToken) -> Self::Enumerator {
        NeverEnumerator {
            token,
            wake: Arc::new(WakerSlot::new()),
            registration: None,
            disposed: false,
            _item: PhantomData,
        }
    }
}

/// Enumerator of [`Never`].
pub struct NeverEnumerator<T> {
    token: CancellationToken,
    wake: Arc<WakerSlot>,
    registration: Option<CancellationRegistration>,
    disposed: bool,
    _item: PhantomData<fn() -> T>,
}

impl<T> AsyncEnumerator for NeverEnumerator<T> {
    type Item = T;

    fn poll_move_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        if let Err(canceled) = self.token.error_if_canceled() {
            return Poll::Ready(Err(canceled));
        }
        self.wake.register(cx.waker());
        if self.registration.is_none() {
            let wake = self.wake.clone();
            self.registration = Some(self.token.register(move || wake.wake()));
        }
        Poll::Pending
    }

    fn current(&self) -> Option<&T> {
        None
    }

    fn take_current(&mut self) -> Option<T> {
        None
    }

    fn poll_dispose(&mut self, _cx: &mut Context<'_>) -> Poll<TaskResult<()>> {
        if std::mem::replace(&mut self.disposed, true) {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        self.registration = None;
        Poll::Ready(Ok(()))
    }
}

/// A sequence whose every pull fails with the same error.
#[must_use = "sequences do nothing unless enumerated"]
pub struct Throw<T> {
    error: TaskError,
    _item: PhantomData<fn() -> T>,
}

/// Creates a sequence that fails with `error`.
pub fn throw<T>(error: TaskError) -> Throw<T> {
    Throw {
        error,
        _item: PhantomData,
    }
}

impl<T> AsyncEnumerable for Throw<T> {
    type Item = T;
    type Enumerator = ThrowEnumerator<T>;

    fn get_async_enumerator(self, _token: CancellationToken) -> Self::Enumerator {
        ThrowEnumerator {
            error: self.error,
            disposed: false,
            _item: PhantomData,
        }
    }
}

/// Enumerator of [`Throw`].
pub struct ThrowEnumerator<T> {
    error: TaskError,
    disposed: bool,
    _item: PhantomData<fn() -> T>,
}

impl<T> AsyncEnumerator for ThrowEnumerator<T> {
    type Item = T;

    fn poll_move_next(&mut self, _cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        Poll::Ready(Err(self.error.clone()))
    }

    fn current(&self) -> Option<&T> {
        None
    }

    fn take_current(&mut self) -> Option<T> {
        None
    }

    fn poll_dispose(&mut self, _cx: &mut Context<'_>) -> Poll<TaskResult<()>> {
        if std::mem::replace(&mut self.disposed, true) {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        Poll::Ready(Ok(()))
    }
}
