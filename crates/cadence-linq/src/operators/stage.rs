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

//! The synchronous operator trampoline.
//!
//! Every element-wise operator is a [`Stage`]: a small state machine fed one
//! upstream element at a time. [`StageEnumerator`] owns the pull loop, so
//! stages never see wakers, cancellation or disposal.

use crate::upstream::Upstream;
use cadence_core::enumerator::{AsyncEnumerable, AsyncEnumerator};
use cadence_core::error::{Fault, InvalidOperation, TaskError, TaskResult};
use cadence_core::CancellationToken;
use std::panic::{self, AssertUnwindSafe};
use std::task::{Context, Poll};

/// Runs user code of an operator, turning a panic into a fault.
pub(crate) fn guarded<R>(call: impl FnOnce() -> R) -> TaskResult<R> {
    panic::catch_unwind(AssertUnwindSafe(call))
        .map_err(|payload| Fault::from_panic(payload).into())
}

/// What a stage does with one upstream element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<U> {
    /// Emit a value downstream.
    Yield(U),
    /// Drop the element and pull again.
    Skip,
    /// End the sequence without pulling again.
    Stop,
}

/// An element-wise transformation.
pub trait Stage<In> {
    /// The element type emitted downstream.
    type Out;

    /// Handles one upstream element.
    fn on_next(&mut self, item: In) -> TaskResult<Step<Self::Out>>;

    /// Called once when the upstream is exhausted; a returned value is
    /// emitted as the final element.
    fn on_completed(&mut self) -> Option<Self::Out> {
        None
    }

    /// Returns `true` when the stage will not accept another element, so the
    /// upstream need not be pulled.
    fn is_finished(&self) -> bool {
        false
    }
}

/// A sequence transformed by a [`Stage`].
#[must_use = "sequences do nothing unless enumerated"]
pub struct Staged<S, G> {
    source: S,
    stage: G,
}

impl<S, G> Staged<S, G> {
    pub(crate) fn new(source: S, stage: G) -> Self {
        Self { source, stage }
    }
}

impl<S, G> AsyncEnumerable for Staged<S, G>
where
    S: AsyncEnumerable,
    G: Stage<S::Item>,
{
    type Item = G::Out;
    type Enumerator = StageEnumerator<S, G>;

    fn get_async_enumerator(self, token: CancellationToken) -> Self::Enumerator {
        StageEnumerator {
            upstream: Upstream::new(self.source, token.clone()),
            stage: self.stage,
            token,
            state: OpState::Init,
            current: None,
            disposed: false,
        }
    }
}

enum OpState {
    Init,
    AwaitingSourceMoveNext,
    Completed,
    Faulted(TaskError),
}

/// Enumerator of a [`Staged`] sequence.
pub struct StageEnumerator<S: AsyncEnumerable, G: Stage<S::Item>> {
    upstream: Upstream<S>,
    stage: G,
    token: CancellationToken,
    state: OpState,
    current: Option<G::Out>,
    disposed: bool,
}

impl<S, G> StageEnumerator<S, G>
where
    S: AsyncEnumerable,
    G: Stage<S::Item>,
{
    fn fail(&mut self, error: TaskError) -> Poll<TaskResult<bool>> {
        self.state = OpState::Faulted(error.clone());
        Poll::Ready(Err(error))
    }
}

impl<S, G> AsyncEnumerator for StageEnumerator<S, G>
where
    S: AsyncEnumerable,
    G: Stage<S::Item>,
{
    type Item = G::Out;

    fn poll_move_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        if self.disposed {
            return Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into()));
        }
        loop {
            match &self.state {
                OpState::Completed => return Poll::Ready(Ok(false)),
                OpState::Faulted(error) => return Poll::Ready(Err(error.clone())),
                OpState::Init => {
                    self.current = None;
                    if self.stage.is_finished() {
                        self.state = OpState::Completed;
                        continue;
                    }
                    if let Err(canceled) = self.token.error_if_canceled() {
                        return self.fail(canceled);
                    }
                    self.state = OpState::AwaitingSourceMoveNext;
                }
                OpState::AwaitingSourceMoveNext => {
                    let item = match std::task::ready!(self.upstream.poll_next(cx)) {
                        Ok(Some(item)) => item,
                        Ok(None) => {
                            self.state = OpState::Completed;
                            match guarded(|| self.stage.on_completed()) {
                                Ok(Some(last)) => {
                                    self.current = Some(last);
                                    return Poll::Ready(Ok(true));
                                }
                                Ok(None) => continue,
                                Err(error) => return self.fail(error),
                            }
                        }
                        Err(error) => return self.fail(error),
                    };
                    self.state = OpState::Init;
                    match guarded(|| self.stage.on_next(item)).and_then(|step| step) {
                        Ok(Step::Yield(value)) => {
                            self.current = Some(value);
                            return Poll::Ready(Ok(true));
                        }
                        Ok(Step::Skip) => {}
                        Ok(Step::Stop) => self.state = OpState::Completed,
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
        self.state = OpState::Completed;
        Poll::Ready(outcome)
    }
}
