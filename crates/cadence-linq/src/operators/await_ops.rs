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

//! Operators whose per-element work is itself a task.

use super::stage::{guarded, Step};
use crate::upstream::Upstream;
use cadence_core::enumerator::{AsyncEnumerable, AsyncEnumerator};
use cadence_core::error::{InvalidOperation, TaskError, TaskResult};
use cadence_core::{CancellationToken, Task};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// An element-wise transformation that awaits a task per element.
pub trait AwaitStage<In> {
    /// The element type emitted downstream.
    type Out;
    /// State kept aside while the task runs.
    type Held;
    /// The result of the per-element task.
    type Awaited;

    /// Starts the task for `item`.
    fn start(&mut self, item: In) -> (Task<Self::Awaited>, Self::Held);

    /// Turns the task result into a step.
    fn finish(&mut self, held: Self::Held, awaited: Self::Awaited) -> Step<Self::Out>;
}

/// Stage of `select_await`.
pub struct SelectAwait<F> {
    pub(crate) selector: F,
}

impl<In, U, F> AwaitStage<In> for SelectAwait<F>
where
    F: FnMut(In) -> Task<U>,
{
    type Out = U;
    type Held = ();
    type Awaited = U;

    fn start(&mut self, item: In) -> (Task<U>, ()) {
        ((self.selector)(item), ())
    }

    fn finish(&mut self, _held: (), awaited: U) -> Step<U> {
        Step::Yield(awaited)
    }
}

/// Stage of `where_await`.
pub struct WhereAwait<F> {
    pub(crate) predicate: F,
}

impl<In, F> AwaitStage<In> for WhereAwait<F>
where
    F: FnMut(&In) -> Task<bool>,
{
    type Out = In;
    type Held = In;
    type Awaited = bool;

    fn start(&mut self, item: In) -> (Task<bool>, In) {
        ((self.predicate)(&item), item)
    }

    fn finish(&mut self, held: In, keep: bool) -> Step<In> {
        if keep {
            Step::Yield(held)
        } else {
            Step::Skip
        }
    }
}

/// A sequence transformed by an [`AwaitStage`].
#[must_use = "sequences do nothing unless enumerated"]
pub struct Awaited<S, G> {
    source: S,
    stage: G,
}

impl<S, G> Awaited<S, G> {
    pub(crate) fn new(source: S, stage: G) -> Self {
        Self { source, stage }
    }
}

impl<S, G> AsyncEnumerable for Awaited<S, G>
where
    S: AsyncEnumerable,
    G: AwaitStage<S::Item>,
{
    type Item = G::Out;
    type Enumerator = AwaitEnumerator<S, G>;

    fn get_async_enumerator(self, token: CancellationToken) -> Self::Enumerator {
        AwaitEnumerator {
            upstream: Upstream::new(self.source, token.clone()),
            stage: self.stage,
            token,
            state: AwaitState::Init,
            current: None,
            disposed: false,
        }
    }
}

enum AwaitState<A, H> {
    Init,
    AwaitingSourceMoveNext,
    AwaitingTransform(Task<A>, H),
    Completed,
    Faulted(TaskError),
}

/// Enumerator of an [`Awaited`] sequence.
pub struct AwaitEnumerator<S: AsyncEnumerable, G: AwaitStage<S::Item>> {
    upstream: Upstream<S>,
    stage: G,
    token: CancellationToken,
    state: AwaitState<G::Awaited, G::Held>,
    current: Option<G::Out>,
    disposed: bool,
}

impl<S, G> AwaitEnumerator<S, G>
where
    S: AsyncEnumerable,
    G: AwaitStage<S::Item>,
{
    fn fail(&mut self, error: TaskError) -> Poll<TaskResult<bool>> {
        self.state = AwaitState::Faulted(error.clone());
        Poll::Ready(Err(error))
    }
}

impl<S, G> AsyncEnumerator for AwaitEnumerator<S, G>
where
    S: AsyncEnumerable,
    G: AwaitStage<S::Item>,
{
    type Item = G::Out;

    fn poll_move_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        loop {
            match &mut self.state {
                AwaitState::Completed => return Poll::Ready(Ok(false)),
                AwaitState::Faulted(error) => return Poll::Ready(Err(error.clone())),
                AwaitState::Init => {
                    self.current = None;
                    if let Err(canceled) = self.token.error_if_canceled() {
                        return self.fail(canceled);
                    }
                    self.state = AwaitState::AwaitingSourceMoveNext;
                }
                AwaitState::AwaitingSourceMoveNext => {
                    match std::task::ready!(self.upstream.poll_next(cx)) {
                        Ok(Some(item)) => match guarded(|| self.stage.start(item)) {
                            Ok((task, held)) => {
                                self.state = AwaitState::AwaitingTransform(task, held);
                            }
                            Err(error) => return self.fail(error),
                        },
                        Ok(None) => self.state = AwaitState::Completed,
                        Err(error) => return self.fail(error),
                    }
                }
                AwaitState::AwaitingTransform(task, _) => {
                    let outcome = std::task::ready!(Pin::new(task).poll(cx));
                    let AwaitState::AwaitingTransform(_, held) =
                        std::mem::replace(&mut self.state, AwaitState::Init)
                    else {
                        continue;
                    };
                    match outcome {
                        Ok(awaited) => match guarded(|| self.stage.finish(held, awaited)) {
                            Ok(Step::Yield(value)) => {
                                self.current = Some(value);
                                return Poll::Ready(Ok(true));
                            }
                            Ok(Step::Skip) => {}
                            Ok(Step::Stop) => self.state = AwaitState::Completed,
                            Err(error) => return self.fail(error),
                        },
                        Err(error) => return self.fail(error),
                    }
                }
            }
        }
    }

    fn current(&self) -> Option<&G::Out> {
        self.current.as_ref()
    }

    fn take_current(&mut self) -> Option<G::Out> {
        self.current.take()
    }

    fn poll_dispose(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<()>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        let outcome = std::task::ready!(self.upstream.poll_dispose(cx));
        self.disposed = true;
        self.current = None;
        self.state = AwaitState::Completed;
        Poll::Ready(outcome)
    }
}
