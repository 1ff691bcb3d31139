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

use super::{TaskStatus, Token};
use crate::error::TaskResult;

/// A one-shot callback invoked when a source completes.
///
/// The closure captures whatever state it needs to resume its awaiter.
pub type Continuation = Box<dyn FnOnce() + Send>;

/// The protocol shared by every pending result holder.
///
/// Every call carries the [`Token`] the caller's handle was issued with. A
/// source whose version moved on must reject the call with
/// [`InvalidOperation::StaleToken`](crate::error::InvalidOperation::StaleToken).
pub trait TaskSource<T>: Send + Sync {
    /// Returns the status for `token`.
    fn status(&self, token: Token) -> TaskResult<TaskStatus>;

    /// Returns the current status without validating a token.
    fn unsafe_status(&self) -> TaskStatus;

    /// Arranges for `continuation` to run once the source completes.
    ///
    /// Runs the continuation inline if the source already completed. A source
    /// accepts at most one continuation per version.
    fn on_completed(&self, continuation: Continuation, token: Token) -> TaskResult<()>;

    /// Reads the outcome for `token`.
    ///
    /// Pooled sources may be recycled once this returns; the handle that
    /// called it must not touch the source again.
    fn get_result(&self, token: Token) -> TaskResult<T>;
}
