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

//! Lazily started handle on the sequence an operator reads from.

use cadence_core::enumerator::{AsyncEnumerable, AsyncEnumerator};
use cadence_core::error::{InvalidOperation, TaskResult};
use cadence_core::CancellationToken;
use std::task::{Context, Poll};

/// The upstream of an operator.
///
/// The enumerator is only created by the first pull, so an operator that
/// never pulls (such as `take(0)`) never starts its source. Disposal is
/// idempotent here; operators enforce the single-dispose rule themselves.
pub(crate) enum Upstream<S: AsyncEnumerable> {
    Unstarted(S, CancellationToken),
    Running(S::Enumerator),
    Disposed,
}

impl<S: AsyncEnumerable> Upstream<S> {
    pub(crate) fn new(source: S, token: CancellationToken) -> Self {
        Upstream::Unstarted(source, token)
    }

    pub(crate) fn poll_move_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        if matches!(self, Upstream::Unstarted(..)) {
            if let Upstream::Unstarted(source, token) = std::mem::replace(self, Upstream::Disposed) {
                *self = Upstream::Running(source.get_async_enumerator(token));
            }
        }
        match self {
            Upstream::Running(enumerator) => enumerator.poll_move_next(cx),
            _ => Poll::Ready(Err(InvalidOperation::AlreadyDisposed.into())),
        }
    }

    /// Moves the element of the last successful pull out.
    pub(crate) fn take_current(&mut self) -> TaskResult<S::Item> {
        match self {
            Upstream::Running(enumerator) => enumerator
                .take_current()
                .ok_or_else(|| InvalidOperation::NoCurrent.into()),
            _ => Err(InvalidOperation::NoCurrent.into()),
        }
    }

    /// Polls the element of the current pull into an owned value, mapping a
    /// finished sequence to `None`.
    pub(crate) fn poll_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<Option<S::Item>>> {
        match std::task::ready!(self.poll_move_next(cx)) {
            Ok(true) => Poll::Ready(self.take_current().map(Some)),
            Ok(false) => Poll::Ready(Ok(None)),
            Err(error) => Poll::Ready(Err(error)),
        }
    }

    pub(crate) fn poll_dispose(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<()>> {
        let outcome = match self {
            Upstream::Running(enumerator) => std::task::ready!(enumerator.poll_dispose(cx)),
            _ => Ok(()),
        };
        *self = Upstream::Disposed;
        Poll::Ready(outcome)
    }
}
