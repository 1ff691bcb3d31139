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

use super::async_trigger::{AsyncTrigger, TriggerEnumerator};
use crate::cancel::CancellationToken;
use crate::enumerator::{AsyncEnumerable, AsyncEnumerator};
use crate::error::TaskResult;
use crate::task::Task;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A value paired with a change trigger.
///
/// Every [`set`](Self::set) stores the value and raises it to the current
/// consumers. Enumerating the property yields the current value first, then
/// every later change.
pub struct AsyncReactiveProperty<T> {
    value: Arc<RwLock<T>>,
    trigger: AsyncTrigger<T>,
}

impl<T> Clone for AsyncReactiveProperty<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            trigger: self.trigger.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> AsyncReactiveProperty<T> {
    /// Creates a property holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            value: Arc::new(RwLock::new(initial)),
            trigger: AsyncTrigger::new(),
        }
    }

    /// A copy of the current value.
    pub fn value(&self) -> T {
        self.value.read().clone()
    }

    /// Stores `value` and notifies consumers.
    pub fn set(&self, value: T) {
        *self.value.write() = value.clone();
        self.trigger.raise(value);
    }

    /// Resolves with the next value set.
    pub fn wait_async(&self, token: CancellationToken) -> Task<T> {
        self.trigger.next_async(token)
    }

    /// Ends every enumeration of the property.
    pub fn complete(&self) -> bool {
        self.trigger.complete()
    }
}

impl<T: fmt::Debug> fmt::Debug for AsyncReactiveProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncReactiveProperty")
            .field("value", &*self.value.read())
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> AsyncEnumerable for AsyncReactiveProperty<T> {
    type Item = T;
    type Enumerator = ReactivePropertyEnumerator<T>;

    fn get_async_enumerator(self, token: CancellationToken) -> Self::Enumerator {
        // Link the change handler before sampling so no change is missed.
        let changes = TriggerEnumerator::attach(self.trigger.event().clone(), token);
        let first = self.value();
        ReactivePropertyEnumerator {
            first: Some(first),
            changes,
            current: None,
        }
    }
}

/// Enumerator returned by enumerating an [`AsyncReactiveProperty`].
pub struct ReactivePropertyEnumerator<T: Clone + Send + 'static> {
    first: Option<T>,
    changes: TriggerEnumerator<T>,
    current: Option<T>,
}

impl<T: Clone + Send + 'static> AsyncEnumerator for ReactivePropertyEnumerator<T> {
    type Item = T;

    fn poll_move_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        if let Some(first) = self.first.take() {
            self.current = Some(first);
            return Poll::Ready(Ok(true));
        }
        let moved = std::task::ready!(self.changes.poll_move_next(cx));
        if let Ok(true) = moved {
            self.current = self.changes.take_current();
        }
        Poll::Ready(moved)
    }

    fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    fn take_current(&mut self) -> Option<T> {
        self.current.take()
    }

    fn poll_dispose(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<()>> {
        self.first = None;
        self.current = None;
        self.changes.poll_dispose(cx)
    }
}
