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

//! Awaitable task primitives.
//!
//! A [`Task`] is a small handle over a [`TaskSource`] and the [`Token`] it was
//! issued with. Sources are versioned and may be pooled: once a task's result
//! has been read, the source may be reset and handed to an unrelated task, and
//! every handle still holding the old token is rejected as stale.

mod completion_source;
pub mod core;
mod handle;
mod source;
mod spawn;
mod status;
mod when;

pub use self::completion_source::{AutoResetCompletionSource, CompletionSource};
pub use self::core::CompletionSourceCore;
pub use self::handle::{SharedTask, Task, WakerSlot};
pub use self::source::{Continuation, TaskSource};
pub use self::spawn::spawn;
pub use self::status::{TaskStatus, Token};
pub use self::when::{when_all, when_any};
