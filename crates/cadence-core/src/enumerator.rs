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

//! The asynchronous sequence protocol.
//!
//! An [`AsyncEnumerable`] is a description of a sequence; calling
//! [`get_async_enumerator`](AsyncEnumerable::get_async_enumerator) starts one
//! pass over it. The resulting [`AsyncEnumerator`] is pulled one element at a
//! time with [`poll_move_next`](AsyncEnumerator::poll_move_next) and must be
//! disposed exactly once when the consumer is done with it, even if the
//! sequence was not exhausted.

use crate::cancel::CancellationToken;
use crate::error::{InvalidOperation, TaskResult};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A pull-based cursor over an asynchronous sequence.
pub trait AsyncEnumerator {
    /// The element type.
    type Item;

    /// Advances to the next element.
    ///
    /// Resolves to `Ok(true)` when a new element is available through
    /// [`current`](Self::current), and to `Ok(false)` once the sequence is
    /// exhausted.
    fn poll_move_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<bool>>;

    /// The element produced by the last successful move.
    fn current(&self) -> Option<&Self::Item>;

    /// Moves the current element out.
    fn take_current(&mut self) -> Option<Self::Item>;

    /// Releases the enumerator and everything it created.
    ///
    /// A second dispose fails with [`InvalidOperation::AlreadyDisposed`].
    fn poll_dispose(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<()>>;
}

impl<E: AsyncEnumerator + ?Sized> AsyncEnumerator for Box<E> {
    type Item = E::Item;

    fn poll_move_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        (**self).poll_move_next(cx)
    }

    fn current(&self) -> Option<&Self::Item> {
        (**self).current()
    }

    fn take_current(&mut self) -> Option<Self::Item> {
        (**self).take_current()
    }

    fn poll_dispose(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<()>> {
        (**self).poll_dispose(cx)
    }
}

/// A type-erased enumerator.
pub type BoxAsyncEnumerator<T> = Box<dyn AsyncEnumerator<Item = T> + Send>;

/// A description of an asynchronous sequence.
pub trait AsyncEnumerable {
    /// The element type.
    type Item;
    /// The cursor type produced for each pass.
    type Enumerator: AsyncEnumerator<Item = Self::Item>;

    /// Starts a pass over the sequence, observing `token` at every pull.
    fn get_async_enumerator(self, token: CancellationToken) -> Self::Enumerator;
}

/// Future-returning helpers over [`AsyncEnumerator`].
pub trait AsyncEnumeratorExt: AsyncEnumerator {
    /// Resolves when the enumerator moved, see
    /// [`poll_move_next`](AsyncEnumerator::poll_move_next).
    fn move_next_async(&mut self) -> MoveNext<'_, Self> {
        MoveNext { enumerator: self }
    }

    /// Resolves when the enumerator has been disposed.
    fn dispose_async(&mut self) -> Dispose<'_, Self> {
        Dispose { enumerator: self }
    }

    /// Resolves to the next element, or `None` at the end of the sequence.
    fn next_async(&mut self) -> Next<'_, Self> {
        Next { enumerator: self }
    }
}

impl<E: AsyncEnumerator + ?Sized> AsyncEnumeratorExt for E {}

/// Future returned by [`AsyncEnumeratorExt::move_next_async`].
#[must_use = "futures do nothing unless polled"]
pub struct MoveNext<'a, E: ?Sized> {
    enumerator: &'a mut E,
}

impl<E: AsyncEnumerator + ?Sized> Future for MoveNext<'_, E> {
    type Output = TaskResult<bool>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().enumerator.poll_move_next(cx)
    }
}

/// Future returned by [`AsyncEnumeratorExt::dispose_async`].
#[must_use = "futures do nothing unless polled"]
pub struct Dispose<'a, E: ?Sized> {
    enumerator: &'a mut E,
}

impl<E: AsyncEnumerator + ?Sized> Future for Dispose<'_, E> {
    type Output = TaskResult<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().enumerator.poll_dispose(cx)
    }
}

/// Future returned by [`AsyncEnumeratorExt::next_async`].
#[must_use = "futures do nothing unless polled"]
pub struct Next<'a, E: ?Sized> {
    enumerator: &'a mut E,
}

impl<E: AsyncEnumerator + ?Sized> Future for Next<'_, E> {
    type Output = TaskResult<Option<E::Item>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let enumerator = &mut *self.get_mut().enumerator;
        match std::task::ready!(enumerator.poll_move_next(cx)) {
            Ok(true) => Poll::Ready(
                enumerator
                    .take_current()
                    .map(Some)
                    .ok_or_else(|| InvalidOperation::NoCurrent.into()),
            ),
            Ok(false) => Poll::Ready(Ok(None)),
            Err(error) => Poll::Ready(Err(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::task::{Wake, Waker};

    struct Noop;
    impl Wake for Noop {
        fn wake(self: Arc<Self>) {}
    }

    struct Countdown {
        remaining: u32,
        current: Option<u32>,
        disposed: bool,
    }

    impl AsyncEnumerator for Countdown {
        type Item = u32;

        fn poll_move_next(&mut self, _cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
            if self.remaining == 0 {
                return Poll::Ready(Ok(false));
            }
            self.current = Some(self.remaining);
            self.remaining -= 1;
            Poll::Ready(Ok(true))
        }

        fn current(&self) -> Option<&u32> {
            self.current.as_ref()
        }

        fn take_current(&mut self) -> Option<u32> {
            self.current.take()
        }

        fn poll_dispose(&mut self, _cx: &mut Context<'_>) -> Poll<TaskResult<()>> {
            if std::mem::replace(&mut self.disposed, true) {
                return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
            }
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn next_async_walks_the_sequence() {
        let waker = Waker::from(Arc::new(Noop));
        let mut cx = Context::from_waker(&waker);
        let mut countdown: BoxAsyncEnumerator<u32> = Box::new(Countdown {
            remaining: 2,
            current: None,
            disposed: false,
        });

        let mut seen = Vec::new();
        loop {
            let mut next = countdown.next_async();
            match Pin::new(&mut next).poll(&mut cx) {
                Poll::Ready(Ok(Some(value))) => seen.push(value),
                Poll::Ready(Ok(None)) => break,
                other => panic!("unexpected poll result: {other:?}"),
            }
        }
        assert_eq!(seen, vec![2, 1]);

        let mut dispose = countdown.dispose_async();
        assert!(matches!(Pin::new(&mut dispose).poll(&mut cx), Poll::Ready(Ok(()))));
        let mut again = countdown.dispose_async();
        assert!(matches!(
            Pin::new(&mut again).poll(&mut cx),
            Poll::Ready(Err(crate::error::TaskError::InvalidOperation(
                InvalidOperation::AlreadyDisposed
            )))
        ));
    }
}
