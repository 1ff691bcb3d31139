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

//! The reusable state machine behind every completion source and promise.

use super::source::Continuation;
use super::{TaskStatus, Token};
use crate::cancel::CancellationToken;
use crate::error::{Fault, InvalidOperation, TaskError, TaskResult};
use crate::unobserved;
use parking_lot::Mutex;
use std::fmt;

struct CoreState<T> {
    version: Token,
    status: TaskStatus,
    result: Option<T>,
    error: Option<TaskError>,
    continuation: Option<Continuation>,
    error_observed: bool,
}

impl<T> CoreState<T> {
    fn check(&self, token: Token) -> TaskResult<()> {
        if self.version == token {
            Ok(())
        } else {
            Err(InvalidOperation::StaleToken {
                expected: self.version.get(),
                found: token.get(),
            }
            .into())
        }
    }

    /// Takes the error that nobody read, if any.
    fn take_unobserved(&mut self) -> Option<TaskError> {
        if self.status.is_completed() && !self.error_observed {
            self.error.take()
        } else {
            None
        }
    }
}

/// The versioned core of a completion source.
///
/// Holds the status, result or error, a single continuation slot and the
/// version token. Exactly one terminal transition succeeds per version, and
/// [`reset`](Self::reset) starts a new version.
///
/// Continuations are always invoked after the internal lock is released, so
/// a continuation may freely call back into the same core.
pub struct CompletionSourceCore<T> {
    state: Mutex<CoreState<T>>,
}

impl<T> Default for CompletionSourceCore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CompletionSourceCore<T> {
    /// Creates a pending core at version zero.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CoreState {
                version: Token::default(),
                status: TaskStatus::Pending,
                result: None,
                error: None,
                continuation: None,
                error_observed: false,
            }),
        }
    }

    /// The current version.
    pub fn version(&self) -> Token {
        self.state.lock().version
    }

    /// Returns to `Pending` under a new version and returns the new token.
    ///
    /// An error stored by the previous version that was never read is
    /// reported to the [unobserved fault bus](crate::unobserved).
    pub fn reset(&self) -> Token {
        let (token, unobserved) = {
            let mut state = self.state.lock();
            let unobserved = state.take_unobserved();
            state.version = state.version.next();
            state.status = TaskStatus::Pending;
            state.result = None;
            state.error = None;
            state.continuation = None;
            state.error_observed = false;
            (state.version, unobserved)
        };
        if let Some(error) = unobserved {
            unobserved::report(error, "completion-source-reset");
        }
        token
    }

    /// Completes the current version with a value.
    pub fn try_set_result(&self, value: T) -> bool {
        self.complete(None, Ok(value))
    }

    /// Completes the current version with a fault.
    pub fn try_set_exception(&self, fault: Fault) -> bool {
        self.complete(None, Err(TaskError::Faulted(fault)))
    }

    /// Completes the current version as canceled by `token`.
    pub fn try_set_canceled(&self, token: CancellationToken) -> bool {
        self.complete(None, Err(TaskError::canceled(token)))
    }

    /// Completes the current version with any error, routed by its family.
    pub fn try_set_error(&self, error: TaskError) -> bool {
        self.complete(None, Err(error))
    }

    /// Like [`try_set_result`](Self::try_set_result), but only if the version
    /// still equals `token`.
    pub fn try_set_result_for(&self, token: Token, value: T) -> bool {
        self.complete(Some(token), Ok(value))
    }

    /// Like [`try_set_exception`](Self::try_set_exception), but only if the
    /// version still equals `token`.
    pub fn try_set_exception_for(&self, token: Token, fault: Fault) -> bool {
        self.complete(Some(token), Err(TaskError::Faulted(fault)))
    }

    /// Like [`try_set_canceled`](Self::try_set_canceled), but only if the
    /// version still equals `token`.
    pub fn try_set_canceled_for(&self, token: Token, cancel: CancellationToken) -> bool {
        self.complete(Some(token), Err(TaskError::canceled(cancel)))
    }

    /// Like [`try_set_error`](Self::try_set_error), but only if the version
    /// still equals `token`.
    pub fn try_set_error_for(&self, token: Token, error: TaskError) -> bool {
        self.complete(Some(token), Err(error))
    }

    fn complete(&self, expected: Option<Token>, outcome: TaskResult<T>) -> bool {
        let continuation = {
            let mut state = self.state.lock();
            if expected.is_some_and(|token| token != state.version) {
                return false;
            }
            if state.status.is_completed() {
                return false;
            }
            match outcome {
                Ok(value) => {
                    state.status = TaskStatus::Succeeded;
                    state.result = Some(value);
                }
                Err(error) => {
                    state.status = error.status();
                    state.error = Some(error);
                }
            }
            state.continuation.take()
        };
        if let Some(continuation) = continuation {
            continuation();
        }
        true
    }

    /// Returns the status of version `token`.
    pub fn status(&self, token: Token) -> TaskResult<TaskStatus> {
        let state = self.state.lock();
        state.check(token)?;
        Ok(state.status)
    }

    /// Returns the status of the current version without a token check.
    pub fn unsafe_status(&self) -> TaskStatus {
        self.state.lock().status
    }

    /// Registers the continuation of version `token`.
    ///
    /// Runs it inline if the version already completed.
    pub fn on_completed(&self, continuation: Continuation, token: Token) -> TaskResult<()> {
        let mut state = self.state.lock();
        state.check(token)?;
        if state.status.is_completed() {
            drop(state);
            continuation();
            return Ok(());
        }
        if state.continuation.is_some() {
            return Err(InvalidOperation::ContinuationAlreadyRegistered.into());
        }
        state.continuation = Some(continuation);
        Ok(())
    }

    /// Moves the value of version `token` out.
    ///
    /// Errors are cloned, so they can be read any number of times; a value can
    /// be taken once and a second take fails with
    /// [`InvalidOperation::ResultConsumed`].
    pub fn take_result(&self, token: Token) -> TaskResult<T> {
        let mut state = self.state.lock();
        state.check(token)?;
        match state.status {
            TaskStatus::Pending => Err(InvalidOperation::NotCompleted.into()),
            TaskStatus::Succeeded => state
                .result
                .take()
                .ok_or_else(|| InvalidOperation::ResultConsumed.into()),
            TaskStatus::Faulted | TaskStatus::Canceled => {
                state.error_observed = true;
                Err(state
                    .error
                    .clone()
                    .unwrap_or_else(|| InvalidOperation::ResultConsumed.into()))
            }
        }
    }
}

impl<T: Clone> CompletionSourceCore<T> {
    /// Reads the outcome of version `token` without consuming it.
    ///
    /// Repeated calls return the same value or the same error.
    pub fn get_result(&self, token: Token) -> TaskResult<T> {
        let mut state = self.state.lock();
        state.check(token)?;
        match state.status {
            TaskStatus::Pending => Err(InvalidOperation::NotCompleted.into()),
            TaskStatus::Succeeded => state
                .result
                .clone()
                .ok_or_else(|| InvalidOperation::ResultConsumed.into()),
            TaskStatus::Faulted | TaskStatus::Canceled => {
                state.error_observed = true;
                Err(state
                    .error
                    .clone()
                    .unwrap_or_else(|| InvalidOperation::ResultConsumed.into()))
            }
        }
    }
}

impl<T> Drop for CompletionSourceCore<T> {
    fn drop(&mut self) {
        if let Some(error) = self.state.get_mut().take_unobserved() {
            unobserved::report(error, "completion-source-drop");
        }
    }
}

impl<T> fmt::Debug for CompletionSourceCore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CompletionSourceCore")
            .field("version", &state.version)
            .field("status", &state.status)
            .field("has_continuation", &state.continuation.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn exactly_one_terminal_transition_per_version() {
        let core = CompletionSourceCore::new();
        let token = core.version();

        assert!(core.try_set_result(1));
        assert!(!core.try_set_result(2));
        assert!(!core.try_set_exception(Fault::msg("late")));
        assert!(!core.try_set_canceled(CancellationToken::none()));

        assert_eq!(core.status(token).unwrap(), TaskStatus::Succeeded);
        assert_eq!(core.get_result(token).unwrap(), 1);
        assert_eq!(core.get_result(token).unwrap(), 1);
    }

    #[test]
    fn reset_invalidates_old_tokens() {
        let core = CompletionSourceCore::<u8>::new();
        let old = core.version();
        let new = core.reset();
        assert_ne!(old, new);

        let stale = core.status(old).unwrap_err();
        assert!(matches!(
            stale,
            TaskError::InvalidOperation(InvalidOperation::StaleToken { .. })
        ));
        assert!(core.on_completed(Box::new(|| {}), old).is_err());
        assert!(!core.try_set_result_for(old, 3));
        assert!(core.try_set_result_for(new, 3));
        assert_eq!(core.take_result(new).unwrap(), 3);
    }

    #[test]
    fn continuation_runs_once_after_completion() {
        let core = Arc::new(CompletionSourceCore::new());
        let token = core.version();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let reentrant = core.clone();
        core.on_completed(
            Box::new(move || {
                // The lock is released before the continuation runs.
                assert_eq!(reentrant.unsafe_status(), TaskStatus::Succeeded);
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            token,
        )
        .unwrap();

        let second = core.on_completed(Box::new(|| {}), token).unwrap_err();
        assert!(matches!(
            second,
            TaskError::InvalidOperation(InvalidOperation::ContinuationAlreadyRegistered)
        ));

        core.try_set_result("done");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn continuation_registered_after_completion_runs_inline() {
        let core = CompletionSourceCore::new();
        let token = core.version();
        core.try_set_result(());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        core.on_completed(
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            token,
        )
        .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn errors_are_re_raised_identically() {
        let core = CompletionSourceCore::<u32>::new();
        let token = core.version();
        let fault = Fault::msg("broken");
        core.try_set_exception(fault.clone());

        for _ in 0..2 {
            match core.take_result(token) {
                Err(TaskError::Faulted(stored)) => assert!(stored.ptr_eq(&fault)),
                other => panic!("expected the stored fault, got {other:?}"),
            }
        }
    }

    #[test]
    fn take_result_moves_the_value_once() {
        let core = CompletionSourceCore::new();
        let token = core.version();
        assert!(matches!(
            core.take_result(token),
            Err(TaskError::InvalidOperation(InvalidOperation::NotCompleted))
        ));
        core.try_set_result(String::from("value"));
        assert_eq!(core.take_result(token).unwrap(), "value");
        assert!(matches!(
            core.take_result(token),
            Err(TaskError::InvalidOperation(InvalidOperation::ResultConsumed))
        ));
    }

    #[test]
    fn canceled_status_follows_the_error_family() {
        let core = CompletionSourceCore::<()>::new();
        let token = core.version();
        core.try_set_error(TaskError::canceled(CancellationToken::canceled()));
        assert_eq!(core.status(token).unwrap(), TaskStatus::Canceled);
        assert!(core.take_result(token).unwrap_err().is_canceled());
    }
}
