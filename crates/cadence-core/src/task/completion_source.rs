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

//! Public result holders built on [`CompletionSourceCore`].

use super::core::CompletionSourceCore;
use super::source::{Continuation, TaskSource};
use super::{Task, TaskStatus, Token};
use crate::cancel::CancellationToken;
use crate::error::{Fault, InvalidOperation, TaskError, TaskResult};
use crate::pool::{self, Poolable};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

struct Waiters {
    fired: bool,
    list: Vec<Continuation>,
}

struct SharedSource<T> {
    core: CompletionSourceCore<T>,
    token: Token,
    waiters: Mutex<Waiters>,
}

impl<T> SharedSource<T> {
    fn fire(&self) {
        let waiting = {
            let mut waiters = self.waiters.lock();
            waiters.fired = true;
            std::mem::take(&mut waiters.list)
        };
        for continuation in waiting {
            continuation();
        }
    }

    fn check(&self, token: Token) -> TaskResult<()> {
        if token == self.token {
            Ok(())
        } else {
            Err(InvalidOperation::StaleToken {
                expected: self.token.get(),
                found: token.get(),
            }
            .into())
        }
    }
}

impl<T: Clone + Send + 'static> TaskSource<T> for SharedSource<T> {
    fn status(&self, token: Token) -> TaskResult<TaskStatus> {
        self.core.status(token)
    }

    fn unsafe_status(&self) -> TaskStatus {
        self.core.unsafe_status()
    }

    fn on_completed(&self, continuation: Continuation, token: Token) -> TaskResult<()> {
        self.check(token)?;
        let mut waiters = self.waiters.lock();
        if waiters.fired {
            drop(waiters);
            continuation();
        } else {
            waiters.list.push(continuation);
        }
        Ok(())
    }

    fn get_result(&self, token: Token) -> TaskResult<T> {
        self.core.get_result(token)
    }
}

/// A manually completed, non-pooled result holder that any number of tasks
/// may await.
///
/// Unlike the pooled sources it is never reset, so handles issued by
/// [`task`](Self::task) stay valid for as long as the source lives.
pub struct CompletionSource<T> {
    inner: Arc<SharedSource<T>>,
}

impl<T> Clone for CompletionSource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Default for CompletionSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> CompletionSource<T> {
    /// Creates a pending source.
    pub fn new() -> Self {
        let core = CompletionSourceCore::new();
        let token = core.version();
        let inner = Arc::new(SharedSource {
            core,
            token,
            waiters: Mutex::new(Waiters {
                fired: false,
                list: Vec::new(),
            }),
        });

        // One continuation on the core fans out to every awaiter.
        let weak: Weak<SharedSource<T>> = Arc::downgrade(&inner);
        let fan_out: Continuation = Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.fire();
            }
        });
        if let Err(error) = inner.core.on_completed(fan_out, token) {
            log::error!("Failed to attach the completion fan-out: {error}");
        }
        Self { inner }
    }

    /// Returns a new handle awaiting this source.
    pub fn task(&self) -> Task<T> {
        let source: Arc<dyn TaskSource<T>> = self.inner.clone();
        Task::from_source(source, self.inner.token)
    }

    /// Completes the source with a value.
    pub fn try_set_result(&self, value: T) -> bool {
        self.inner.core.try_set_result(value)
    }

    /// Completes the source with a fault.
    pub fn try_set_exception(&self, fault: Fault) -> bool {
        self.inner.core.try_set_exception(fault)
    }

    /// Completes the source as canceled by `token`.
    pub fn try_set_canceled(&self, token: CancellationToken) -> bool {
        self.inner.core.try_set_canceled(token)
    }

    /// Completes the source with any error.
    pub fn try_set_error(&self, error: TaskError) -> bool {
        self.inner.core.try_set_error(error)
    }

    /// The current status.
    pub fn status(&self) -> TaskStatus {
        self.inner.core.unsafe_status()
    }
}

impl<T> fmt::Debug for CompletionSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSource")
            .field("core", &self.inner.core)
            .finish()
    }
}

/// A pooled, single-await result holder.
///
/// The source returns itself to its pool as soon as its task's result has been
/// read, which bumps its version. A producer that may outlive the task should
/// complete it with the `*_for` variants, passing the token returned by
/// [`version`](Self::version) at creation, so it can never complete a recycled
/// node.
pub struct AutoResetCompletionSource<T> {
    core: CompletionSourceCore<T>,
    this: Weak<Self>,
}

impl<T: Send + 'static> AutoResetCompletionSource<T> {
    /// Takes a source from the pool, or allocates one.
    pub fn create() -> Arc<Self> {
        pool::shared::<Self>().try_pop().unwrap_or_else(|| {
            Arc::new_cyclic(|this| Self {
                core: CompletionSourceCore::new(),
                this: this.clone(),
            })
        })
    }

    /// Takes a source from the pool and returns it with its task.
    pub fn create_task() -> (Arc<Self>, Task<T>) {
        let source = Self::create();
        let task = source.task();
        (source, task)
    }

    /// Returns a handle for the current version.
    pub fn task(&self) -> Task<T> {
        let token = self.core.version();
        match self.this.upgrade() {
            Some(this) => {
                let source: Arc<dyn TaskSource<T>> = this;
                Task::from_source(source, token)
            }
            None => Task::from_error(InvalidOperation::AlreadyDisposed.into()),
        }
    }

    /// The current version.
    pub fn version(&self) -> Token {
        self.core.version()
    }

    /// Completes the current version with a value.
    pub fn try_set_result(&self, value: T) -> bool {
        self.core.try_set_result(value)
    }

    /// Completes the current version with a fault.
    pub fn try_set_exception(&self, fault: Fault) -> bool {
        self.core.try_set_exception(fault)
    }

    /// Completes the current version as canceled by `token`.
    pub fn try_set_canceled(&self, token: CancellationToken) -> bool {
        self.core.try_set_canceled(token)
    }

    /// Completes the current version with any error.
    pub fn try_set_error(&self, error: TaskError) -> bool {
        self.core.try_set_error(error)
    }

    /// Completes version `token` with a value.
    pub fn try_set_result_for(&self, token: Token, value: T) -> bool {
        self.core.try_set_result_for(token, value)
    }

    /// Completes version `token` with a fault.
    pub fn try_set_exception_for(&self, token: Token, fault: Fault) -> bool {
        self.core.try_set_exception_for(token, fault)
    }

    /// Completes version `token` as canceled by `cancel`.
    pub fn try_set_canceled_for(&self, token: Token, cancel: CancellationToken) -> bool {
        self.core.try_set_canceled_for(token, cancel)
    }

    /// Completes version `token` with any error.
    pub fn try_set_error_for(&self, token: Token, error: TaskError) -> bool {
        self.core.try_set_error_for(token, error)
    }

    fn return_to_pool(&self) {
        if let Some(this) = self.this.upgrade() {
            pool::shared::<Self>().try_push(this);
        }
    }
}

impl<T: Send + 'static> TaskSource<T> for AutoResetCompletionSource<T> {
    fn status(&self, token: Token) -> TaskResult<TaskStatus> {
        self.core.status(token)
    }

    fn unsafe_status(&self) -> TaskStatus {
        self.core.unsafe_status()
    }

    fn on_completed(&self, continuation: Continuation, token: Token) -> TaskResult<()> {
        self.core.on_completed(continuation, token)
    }

    fn get_result(&self, token: Token) -> TaskResult<T> {
        let result = self.core.take_result(token);
        // A misused handle (stale, early, second read) must not recycle a node
        // someone else may own.
        if !matches!(result, Err(TaskError::InvalidOperation(_))) {
            self.return_to_pool();
        }
        result
    }
}

impl<T: Send + 'static> Poolable for AutoResetCompletionSource<T> {
    fn clear(&self) {
        self.core.reset();
    }
}

impl<T> fmt::Debug for AutoResetCompletionSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoResetCompletionSource")
            .field("core", &self.core)
            .finish()
    }
}
