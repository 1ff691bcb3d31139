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

//! Sequences backed by a synchronous iterator.

use cadence_core::enumerator::{AsyncEnumerable, AsyncEnumerator};
use cadence_core::error::{InvalidOperation, TaskError, TaskResult};
use cadence_core::CancellationToken;
use std::iter::{Empty, Once, Repeat, Take};
use std::ops::RangeInclusive;
use std::task::{Context, Poll};

/// A sequence yielding the items of an iterator.
#[must_use = "sequences do nothing unless enumerated"]
#[derive(Debug, Clone)]
pub struct FromIter<I> {
    iter: I,
}

/// Wraps any iterable as an asynchronous sequence.
///
/// Every pull completes synchronously; the pull token is checked before
/// each element.
pub fn from_iter<I: IntoIterator>(iter: I) -> FromIter<I::IntoIter> {
    FromIter {
        iter: iter.into_iter(),
    }
}

impl<I: Iterator> AsyncEnumerable for FromIter<I> {
    type Item = I::Item;
    type Enumerator = IterEnumerator<I>;

    fn get_async_enumerator(self, token: CancellationToken) -> Self::Enumerator {
        IterEnumerator {
            iter: Some(self.iter),
            token,
            current: None,
        }
    }
}

/// Enumerator of [`FromIter`].
pub struct IterEnumerator<I: Iterator> {
    // `None` once disposed.
    iter: Option<I>,
    token: CancellationToken,
    current: Option<I::Item>,
}

impl<I: Iterator> AsyncEnumerator for IterEnumerator<I> {
    type Item = I::Item;

    fn poll_move_next(&mut self, _cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        let Some(iter) = self.iter.as_mut() else {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        };
        if let Err(canceled) = self.token.error_if_canceled() {
            return Poll::Ready(Err(canceled));
        }
        self.current = iter.next();
        Poll::Ready(Ok(self.current.is_some()))
    }

    fn current(&self) -> Option<&I::Item> {
        self.current.as_ref()
    }

    fn take_current(&mut self) -> Option<I::Item> {
        self.current.take()
    }

    fn poll_dispose(&mut self, _cx: &mut Context<'_>) -> Poll<TaskResult<()>> {
        if self.iter.take().is_none() {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        self.current = None;
        Poll::Ready(Ok(()))
    }
}

/// Sequence returned by [`range`].
pub type Range = FromIter<RangeInclusive<i32>>;

/// Yields `count` consecutive integers starting at `start`.
///
/// Fails with [`TaskError::InvalidArgument`] when the last value would
/// overflow an `i32`.
pub fn range(start: i32, count: u32) -> TaskResult<Range> {
    if count == 0 {
        return Ok(from_iter(1..=0));
    }
    i32::try_from(count - 1)
        .ok()
        .and_then(|span| start.checked_add(span))
        .map(|last| from_iter(start..=last))
        .ok_or_else(|| TaskError::InvalidArgument(format!("range({start}, {count}) overflows i32")))
}

/// Sequence returned by [`repeat`].
pub type RepeatN<T> = FromIter<Take<Repeat<T>>>;

/// Yields `value` `count` times.
pub fn repeat<T: Clone>(value: T, count: usize) -> RepeatN<T> {
    from_iter(std::iter::repeat(value).take(count))
}

/// Sequence returned by [`return_value`].
pub type ReturnValue<T> = FromIter<Once<T>>;

/// Yields `value` once.
pub fn return_value<T>(value: T) -> ReturnValue<T> {
    from_iter(std::iter::once(value))
}

/// Sequence returned by [`empty`].
pub type EmptySequence<T> = FromIter<Empty<T>>;

/// A sequence that ends immediately.
pub fn empty<T>() -> EmptySequence<T> {
    from_iter(std::iter::empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_rejects_overflow() {
        assert!(range(i32::MAX, 1).is_ok());
        assert!(range(i32::MAX, 2).is_err());
        assert!(range(i32::MAX, 0).is_ok());
        assert!(range(-3, 3).is_ok());
    }
}
