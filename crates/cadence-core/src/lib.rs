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

//! # Cadence Core
//!
//! Foundational crate of the cooperative task runtime: versioned task handles
//! and completion sources, recycling pools, cancellation, the trigger bridge
//! and the asynchronous sequence protocol.
//!
//! Nothing here knows about frames. The frame-driven scheduler lives in
//! `cadence-loop` and builds its promises on [`task::CompletionSourceCore`].

#![warn(missing_docs)]

pub mod cancel;
pub mod channel;
pub mod collections;
pub mod enumerator;
pub mod error;
pub mod pool;
pub mod task;
pub mod trigger;
pub mod unobserved;

pub use cancel::{CancellationRegistration, CancellationToken, CancellationTokenSource};
pub use error::{Fault, InvalidOperation, TaskError, TaskResult};
pub use task::{spawn, when_all, when_any, Task, TaskStatus};

/// Commonly used types and traits.
pub mod prelude {
    pub use crate::cancel::{CancellationToken, CancellationTokenSource};
    pub use crate::enumerator::{AsyncEnumerable, AsyncEnumerator, AsyncEnumeratorExt};
    pub use crate::error::{Fault, TaskError, TaskResult};
    pub use crate::task::{
        spawn, when_all, when_any, AutoResetCompletionSource, CompletionSource, Task, TaskStatus,
    };
    pub use crate::trigger::{AsyncReactiveProperty, AsyncTrigger};
}
