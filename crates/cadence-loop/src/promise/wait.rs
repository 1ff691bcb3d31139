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
use cadence_core::CancellationToken;
use std::fmt;
use std::task::Poll;

type Predicate = Box<dyn FnMut() -> bool + Send>;

/// Evaluates a predicate once per frame until it returns the awaited value.
///
/// Backs both `wait_until` (awaits `true`) and `wait_while` (awaits `false`).
/// The predicate is first evaluated on the run after creation.
pub struct WaitUntilDriver {
    predicate: Predicate,
    awaited: bool,
}

impl WaitUntilDriver {
    /// Completes once `predicate` returns `true`.
    pub fn until<F>(predicate: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        Self {
            predicate: Box::new(predicate),
            awaited: true,
        }
    }

    /// Completes once `predicate` returns `false`.
    pub fn while_true<F>(predicate: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        Self {
            predicate: Box::new(predicate),
            awaited: false,
        }
    }
}

impl PromiseDriver for WaitUntilDriver {
    type Output = ();

    fn poll(&mut self, _clock: &FrameClock, _creation_frame: bool) -> Poll<TaskResult<()>> {
        if (self.predicate)() == self.awaited {
            Poll::Ready(Ok(()))
        } else {
            Poll::Pending
        }
    }
}

impl fmt::Debug for WaitUntilDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitUntilDriver")
            .field("awaited", &self.awaited)
            .finish()
    }
}

/// Succeeds once `token` is canceled.
#[derive(Debug)]
pub struct WaitUntilCanceledDriver {
    token: CancellationToken,
}

impl WaitUntilCanceledDriver {
    /// Watches `token`.
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl PromiseDriver for WaitUntilCanceledDriver {
    type Output = ();

    fn poll(&mut self, _clock: &FrameClock, _creation_frame: bool) -> Poll<TaskResult<()>> {
        if self.token.is_cancellation_requested() {
            Poll::Ready(Ok(()))
        } else {
            Poll::Pending
        }
    }
}
