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

//! Defines the error taxonomy shared by every task, promise and enumerator.
//!
//! Three families of failure exist:
//! - [`TaskError::Faulted`]: user code or a wrapped operation failed. The
//!   payload is a [`Fault`], cheap to clone so it can be re-raised every time a
//!   result is read.
//! - [`TaskError::Canceled`]: a cancellation token fired.
//! - [`TaskError::InvalidOperation`]: programmer misuse (stale handles, double
//!   subscription, double dispose).

use crate::cancel::CancellationToken;
use crate::task::TaskStatus;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A convenient alias for results produced by tasks and enumerators.
pub type TaskResult<T> = Result<T, TaskError>;

/// The stored error of a faulted task.
///
/// Wraps an [`anyhow::Error`] behind an `Arc` so the same fault can be handed
/// out to every reader of a completed source.
#[derive(Clone)]
pub struct Fault(Arc<anyhow::Error>);

impl Fault {
    /// Wraps any error convertible into an [`anyhow::Error`].
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(error.into()))
    }

    /// Creates a fault from a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(anyhow::Error::msg(message)))
    }

    /// Converts a panic payload caught with `catch_unwind` into a fault.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::msg(format!("panicked: {message}"))
    }

    /// Returns the underlying error.
    pub fn error(&self) -> &anyhow::Error {
        &self.0
    }

    /// Attempts to downcast the underlying error to a concrete type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Returns `true` if both faults share the same allocation.
    pub fn ptr_eq(&self, other: &Fault) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fault({:?})", self.0)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

/// The reason carried by a canceled task: the token that fired.
#[derive(Debug, Clone, Default)]
pub struct Canceled {
    token: CancellationToken,
}

impl Canceled {
    /// Creates a cancellation reason bound to the originating token.
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// The token whose cancellation produced this outcome.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl fmt::Display for Canceled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "the operation was canceled")
    }
}

/// Misuse of the task protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidOperation {
    /// The handle's token no longer matches the source version. The source was
    /// reset or recycled for an unrelated task.
    #[error("token {found} does not match source version {expected}; the handle is stale")]
    StaleToken {
        /// The version currently held by the source.
        expected: u32,
        /// The version carried by the handle.
        found: u32,
    },
    /// A second continuation was attached before the first one fired.
    #[error("a continuation is already registered for this version")]
    ContinuationAlreadyRegistered,
    /// The result was read before the source reached a terminal state.
    #[error("the task has not completed yet")]
    NotCompleted,
    /// The result value was moved out by a previous read.
    #[error("the task result was already consumed")]
    ResultConsumed,
    /// `dispose` was requested twice on the same enumerator.
    #[error("the enumerator was already disposed")]
    AlreadyDisposed,
    /// A pull was started while a previous pull of the same enumerator was pending.
    #[error("move_next was called while a previous move_next is still pending")]
    ConcurrentMoveNext,
    /// An enumerator reported an element but exposed no current value.
    #[error("the enumerator reported an element but has no current value")]
    NoCurrent,
    /// A factory needing a player loop was called on a thread without one.
    #[error("no player loop is installed on the current thread")]
    NoPlayerLoop,
    /// A read was attempted on a channel that was completed by its writer.
    #[error("the channel was closed")]
    ChannelClosed,
    /// An aggregate that needs at least one element ran over an empty sequence.
    #[error("the sequence contains no elements")]
    NoElements,
}

/// The outcome of a task that did not succeed.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// User code or a wrapped operation raised an error.
    #[error("task faulted: {0}")]
    Faulted(Fault),
    /// A cancellation token fired before the task completed.
    #[error("{0}")]
    Canceled(Canceled),
    /// The task protocol was misused.
    #[error("invalid operation: {0}")]
    InvalidOperation(#[from] InvalidOperation),
    /// A factory rejected its arguments before creating the task.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<Fault> for TaskError {
    fn from(fault: Fault) -> Self {
        TaskError::Faulted(fault)
    }
}

impl TaskError {
    /// Builds a [`TaskError::Faulted`] from any error.
    pub fn fault(error: impl Into<anyhow::Error>) -> Self {
        TaskError::Faulted(Fault::new(error))
    }

    /// Builds a [`TaskError::Canceled`] bound to `token`.
    pub fn canceled(token: CancellationToken) -> Self {
        TaskError::Canceled(Canceled::new(token))
    }

    /// Returns `true` for the canceled family.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled(_))
    }

    /// Returns `true` for the invalid-operation family.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, TaskError::InvalidOperation(_))
    }

    /// The terminal status a source adopts when it stores this error.
    pub fn status(&self) -> TaskStatus {
        match self {
            TaskError::Canceled(_) => TaskStatus::Canceled,
            _ => TaskStatus::Faulted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom {0}")]
    struct Boom(u32);

    #[test]
    fn fault_keeps_the_original_error() {
        let fault = Fault::new(Boom(7));
        assert_eq!(fault.to_string(), "boom 7");
        assert_eq!(fault.downcast_ref::<Boom>().map(|b| b.0), Some(7));
    }

    #[test]
    fn cloned_faults_share_the_allocation() {
        let fault = Fault::msg("shared");
        let copy = fault.clone();
        assert!(fault.ptr_eq(&copy));
        assert!(!fault.ptr_eq(&Fault::msg("shared")));
    }

    #[test]
    fn panic_payloads_become_readable_faults() {
        let payload = std::panic::catch_unwind(|| panic!("exploded")).unwrap_err();
        let fault = Fault::from_panic(payload);
        assert_eq!(fault.to_string(), "panicked: exploded");
    }

    #[test]
    fn error_status_follows_the_family() {
        assert_eq!(
            TaskError::canceled(CancellationToken::none()).status(),
            TaskStatus::Canceled
        );
        assert_eq!(TaskError::fault(Boom(1)).status(), TaskStatus::Faulted);
        let misuse: TaskError = InvalidOperation::NotCompleted.into();
        assert!(misuse.is_invalid_operation());
        assert_eq!(misuse.status(), TaskStatus::Faulted);
    }
}
