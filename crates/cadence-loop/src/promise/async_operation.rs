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

use super::PromiseDriver;
use crate::clock::FrameClock;
use cadence_core::error::TaskResult;
use std::fmt;
use std::task::Poll;

/// An engine operation that progresses on its own and is polled per frame,
/// such as an asset load or a scene switch.
pub trait AsyncOperation: Send + 'static {
    /// The value produced by the operation.
    type Output: Send + 'static;

    /// Returns `true` once the operation finished.
    fn is_done(&self) -> bool;

    /// Completion ratio in `[0, 1]`.
    fn progress(&self) -> f32;

    /// Takes the outcome. Called once, after [`is_done`](Self::is_done)
    /// returned `true`.
    fn take_result(&mut self) -> TaskResult<Self::Output>;
}

type ProgressReporter = Box<dyn FnMut(f32) + Send>;

/// Polls an [`AsyncOperation`] until it is done.
pub struct AsyncOperationDriver<O> {
    operation: O,
    progress: Option<ProgressReporter>,
}

impl<O: AsyncOperation> AsyncOperationDriver<O> {
    /// Wraps `operation`.
    pub fn new(operation: O) -> Self {
        Self {
            operation,
            progress: None,
        }
    }

    /// Wraps `operation`, reporting its progress once per frame.
    pub fn with_progress<F>(operation: O, progress: F) -> Self
    where
        F: FnMut(f32) + Send + 'static,
    {
        Self {
            operation,
            progress: Some(Box::new(progress)),
        }
    }
}

impl<O: AsyncOperation> PromiseDriver for AsyncOperationDriver<O> {
    type Output = O::Output;

    fn poll(&mut self, _clock: &FrameClock, _creation_frame: bool) -> Poll<TaskResult<O::Output>> {
        if let Some(report) = self.progress.as_mut() {
            report(self.operation.progress());
        }
        if self.operation.is_done() {
            Poll::Ready(self.operation.take_result())
        } else {
            Poll::Pending
        }
    }
}

impl<O> fmt::Debug for AsyncOperationDriver<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncOperationDriver")
            .field("operation", &std::any::type_name::<O>())
            .field("reports_progress", &self.progress.is_some())
            .finish()
    }
}
