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

//! Operators reading from two sequences.

use crate::upstream::Upstream;
use cadence_core::enumerator::{AsyncEnumerable, AsyncEnumerator};
use cadence_core::error::{InvalidOperation, TaskError, TaskResult};
use cadence_core::CancellationToken;
use std::task::{Context, Poll};

enum PairState {
    Running,
    Completed,
    Faulted(TaskError),
}

impl PairState {
    /// Returns the outcome a finished operator reports, or `None` while running.
    fn finished(&self) -> Option<TaskResult<bool>> {
        match self {
            PairState::Running => None,
            PairState::Completed => Some(Ok(false)),
            PairState::Faulted(error) => Some(Err(error.clone())),
        }
    }
}

/// Disposes both upstreams, keeping the first error.
fn poll_dispose_pair<A, B>(
    first: &mut Upstream<A>,
    second: &mut Upstream<B>,
    error: &mut Option<TaskError>,
    cx: &mut Context<'_>,
) -> Poll<TaskResult<()>>
where
    A: AsyncEnumerable,
    B: AsyncEnumerable,
{
    if let Err(failed) = std::task::ready!(first.poll_dispose(cx)) {
        error.get_or_insert(failed);
    }
    if let Err(failed) = std::task::ready!(second.poll_dispose(cx)) {
        error.get_or_insert(failed);
    }
    Poll::Ready(match error.take() {
        Some(failed) => Err(failed),
        None => Ok(()),
    })
}

/// The elements of `first` followed by the elements of `second`.
#[must_use = "sequences do nothing unless enumerated"]
pub struct Concat<A, B> {
    first: A,
    second: B,
}

impl<A, B> Concat<A, B> {
    pub(crate) fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A, B> AsyncEnumerable for Concat<A, B>
where
    A: AsyncEnumerable,
    B: AsyncEnumerable<Item = A::Item>,
{
    type Item = A::Item;
    type Enumerator = ConcatEnumerator<A, B>;

    fn get_async_enumerator(self, token: CancellationToken) -> Self::Enumerator {
        ConcatEnumerator {
            first: Upstream::new(self.first, token.clone()),
            second: Upstream::new(self.second, token.clone()),
            token,
            phase: ConcatPhase::First,
            current: None,
            dispose_error: None,
            disposed: false,
        }
    }
}

enum ConcatPhase {
    First,
    DisposingFirst,
    Second,
    Done(PairState),
}

/// Enumerator of [`Concat`].
///
/// The first enumerator is disposed as soon as it is exhausted, before the
/// second one is started.
pub struct ConcatEnumerator<A: AsyncEnumerable, B: AsyncEnumerable> {
    first: Upstream<A>,
    second: Upstream<B>,
    token: CancellationToken,
    phase: ConcatPhase,
    current: Option<A::Item>,
    dispose_error: Option<TaskError>,
    disposed: bool,
}

impl<A, B> AsyncEnumerator for ConcatEnumerator<A, B>
where
    A: AsyncEnumerable,
    B: AsyncEnumerable<Item = A::Item>,
{
    type Item = A::Item;

    fn poll_move_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        self.current = None;
        loop {
            if let ConcatPhase::Done(state) = &self.phase {
                if let Some(outcome) = state.finished() {
                    return Poll::Ready(outcome);
                }
            }
            if let Err(canceled) = self.token.error_if_canceled() {
                self.phase = ConcatPhase::Done(PairState::Faulted(canceled.clone()));
                return Poll::Ready(Err(canceled));
            }
            let polled = match self.phase {
                ConcatPhase::First => std::task::ready!(self.first.poll_next(cx)),
                ConcatPhase::DisposingFirst => {
                    let disposed = std::task::ready!(self.first.poll_dispose(cx));
                    self.phase = ConcatPhase::Second;
                    if let Err(error) = disposed {
                        self.phase = ConcatPhase::Done(PairState::Faulted(error.clone()));
                        return Poll::Ready(Err(error));
                    }
                    continue;
                }
                ConcatPhase::Second => std::task::ready!(self.second.poll_next(cx)),
                ConcatPhase::Done(_) => return Poll::Ready(Ok(false)),
            };
            match polled {
                Ok(Some(item)) => {
                    self.current = Some(item);
                    return Poll::Ready(Ok(true));
                }
                Ok(None) if matches!(self.phase, ConcatPhase::First) => {
                    self.phase = ConcatPhase::DisposingFirst;
                }
                Ok(None) => {
                    self.phase = ConcatPhase::Done(PairState::Completed);
                }
                Err(error) => {
                    self.phase = ConcatPhase::Done(PairState::Faulted(error.clone()));
                    return Poll::Ready(Err(error));
                }
            }
        }
    }

    fn current(&self) -> Option<&A::Item> {
        self.current.as_ref()
    }

    fn take_current(&mut self) -> Option<A::Item> {
        self.current.take()
    }

    fn poll_dispose(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<()>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        let outcome = std::task::ready!(poll_dispose_pair(
            &mut self.first,
            &mut self.second,
            &mut self.dispose_error,
            cx
        ));
        self.disposed = true;
        self.phase = ConcatPhase::Done(PairState::Completed);
        Poll::Ready(outcome)
    }
}

/// Pulls one side of a two-input operator, marking it done when it ends.
fn poll_side<S: AsyncEnumerable>(
    side: &mut Upstream<S>,
    done: &mut bool,
    cx: &mut Context<'_>,
) -> Poll<TaskResult<Option<S::Item>>> {
    if *done {
        return Poll::Ready(Ok(None));
    }
    let polled = std::task::ready!(side.poll_next(cx));
    if matches!(polled, Ok(None)) {
        *done = true;
    }
    Poll::Ready(polled)
}

/// The elements of two sequences interleaved as they arrive.
#[must_use = "sequences do nothing unless enumerated"]
pub struct Merge<A, B> {
    left: A,
    right: B,
}

impl<A, B> Merge<A, B> {
    pub(crate) fn new(left: A, right: B) -> Self {
        Self { left, right }
    }
}

impl<A, B> AsyncEnumerable for Merge<A, B>
where
    A: AsyncEnumerable,
    B: AsyncEnumerable<Item = A::Item>,
{
    type Item = A::Item;
    type Enumerator = MergeEnumerator<A, B>;

    fn get_async_enumerator(self, token: CancellationToken) -> Self::Enumerator {
        MergeEnumerator {
            left: Upstream::new(self.left, token.clone()),
            right: Upstream::new(self.right, token.clone()),
            left_done: false,
            right_done: false,
            prefer_right: false,
            token,
            state: PairState::Running,
            current: None,
            dispose_error: None,
            disposed: false,
        }
    }
}

/// Enumerator of [`Merge`].
///
/// When both sides have an element ready, the side that did not produce the
/// previous element goes first. The sequence ends once both sides ended.
pub struct MergeEnumerator<A: AsyncEnumerable, B: AsyncEnumerable> {
    left: Upstream<A>,
    right: Upstream<B>,
    left_done: bool,
    right_done: bool,
    prefer_right: bool,
    token: CancellationToken,
    state: PairState,
    current: Option<A::Item>,
    dispose_error: Option<TaskError>,
    disposed: bool,
}

impl<A, B> AsyncEnumerator for MergeEnumerator<A, B>
where
    A: AsyncEnumerable,
    B: AsyncEnumerable<Item = A::Item>,
{
    type Item = A::Item;

    fn poll_move_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        self.current = None;
        if let Some(outcome) = self.state.finished() {
            return Poll::Ready(outcome);
        }
        if let Err(canceled) = self.token.error_if_canceled() {
            self.state = PairState::Faulted(canceled.clone());
            return Poll::Ready(Err(canceled));
        }
        for turn in 0..2 {
            let from_right = self.prefer_right != (turn == 1);
            let polled = if from_right {
                poll_side(&mut self.right, &mut self.right_done, cx)
            } else {
                poll_side(&mut self.left, &mut self.left_done, cx)
            };
            match polled {
                Poll::Ready(Ok(Some(item))) => {
                    self.current = Some(item);
                    self.prefer_right = !from_right;
                    return Poll::Ready(Ok(true));
                }
                Poll::Ready(Err(error)) => {
                    self.state = PairState::Faulted(error.clone());
                    return Poll::Ready(Err(error));
                }
                Poll::Ready(Ok(None)) | Poll::Pending => {}
            }
        }
        if self.left_done && self.right_done {
            self.state = PairState::Completed;
            return Poll::Ready(Ok(false));
        }
        Poll::Pending
    }

    fn current(&self) -> Option<&A::Item> {
        self.current.as_ref()
    }

    fn take_current(&mut self) -> Option<A::Item> {
        self.current.take()
    }

    fn poll_dispose(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<()>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        let outcome = std::task::ready!(poll_dispose_pair(
            &mut self.left,
            &mut self.right,
            &mut self.dispose_error,
            cx
        ));
        self.disposed = true;
        self.state = PairState::Completed;
        Poll::Ready(outcome)
    }
}

/// Pairs of elements taken in lockstep from two sequences.
#[must_use = "sequences do nothing unless enumerated"]
pub struct Zip<A, B> {
    left: A,
    right: B,
}

impl<A, B> Zip<A, B> {
    pub(crate) fn new(left: A, right: B) -> Self {
        Self { left, right }
    }
}

impl<A, B> AsyncEnumerable for Zip<A, B>
where
    A: AsyncEnumerable,
    B: AsyncEnumerable,
{
    type Item = (A::Item, B::Item);
    type Enumerator = ZipEnumerator<A, B>;

    fn get_async_enumerator(self, token: CancellationToken) -> Self::Enumerator {
        ZipEnumerator {
            left: Upstream::new(self.left, token.clone()),
            right: Upstream::new(self.right, token.clone()),
            pending_left: None,
            token,
            state: PairState::Running,
            current: None,
            dispose_error: None,
            disposed: false,
        }
    }
}

/// Enumerator of [`Zip`]. Ends as soon as either side ends.
pub struct ZipEnumerator<A: AsyncEnumerable, B: AsyncEnumerable> {
    left: Upstream<A>,
    right: Upstream<B>,
    pending_left: Option<A::Item>,
    token: CancellationToken,
    state: PairState,
    current: Option<(A::Item, B::Item)>,
    dispose_error: Option<TaskError>,
    disposed: bool,
}

impl<A, B> ZipEnumerator<A, B>
where
    A: AsyncEnumerable,
    B: AsyncEnumerable,
{
    fn settle<T>(&mut self, polled: TaskResult<Option<T>>) -> Result<T, Poll<TaskResult<bool>>> {
        match polled {
            Ok(Some(item)) => Ok(item),
            Ok(None) => {
                self.state = PairState::Completed;
                Err(Poll::Ready(Ok(false)))
            }
            Err(error) => {
                self.state = PairState::Faulted(error.clone());
                Err(Poll::Ready(Err(error)))
            }
        }
    }
}

impl<A, B> AsyncEnumerator for ZipEnumerator<A, B>
where
    A: AsyncEnumerable,
    B: AsyncEnumerable,
{
    type Item = (A::Item, B::Item);

    fn poll_move_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        self.current = None;
        if let Some(outcome) = self.state.finished() {
            return Poll::Ready(outcome);
        }
        if self.pending_left.is_none() {
            if let Err(canceled) = self.token.error_if_canceled() {
                self.state = PairState::Faulted(canceled.clone());
                return Poll::Ready(Err(canceled));
            }
            let polled = std::task::ready!(self.left.poll_next(cx));
            match self.settle(polled) {
                Ok(item) => self.pending_left = Some(item),
                Err(finished) => return finished,
            }
        }
        let polled = std::task::ready!(self.right.poll_next(cx));
        let right = match self.settle(polled) {
            Ok(item) => item,
            Err(finished) => {
                self.pending_left = None;
                return finished;
            }
        };
        match self.pending_left.take() {
            Some(left) => {
                self.current = Some((left, right));
                Poll::Ready(Ok(true))
            }
            None => Poll::Ready(Err(InvalidOperation::NoCurrent.into())),
        }
    }

    fn current(&self) -> Option<&(A::Item, B::Item)> {
        self.current.as_ref()
    }

    fn take_current(&mut self) -> Option<(A::Item, B::Item)> {
        self.current.take()
    }

    fn poll_dispose(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<()>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        let outcome = std::task::ready!(poll_dispose_pair(
            &mut self.left,
            &mut self.right,
            &mut self.dispose_error,
            cx
        ));
        self.disposed = true;
        self.pending_left = None;
        self.state = PairState::Completed;
        Poll::Ready(outcome)
    }
}
