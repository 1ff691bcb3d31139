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

//! The awaitable task handle.

use super::completion_source::{AutoResetCompletionSource, CompletionSource};
use super::source::{Continuation, TaskSource};
use super::{TaskStatus, Token};
use crate::cancel::CancellationToken;
use crate::error::{Fault, InvalidOperation, TaskError, TaskResult};
use crate::unobserved;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Holds the waker of the executor currently polling a task.
///
/// A single continuation is attached to the source on the first pending poll;
/// later polls only swap the stored waker.
#[derive(Debug, Default)]
pub struct WakerSlot {
    waker: Mutex<Option<Waker>>,
}

impl WakerSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `waker`, replacing a waker that would wake a different task.
    pub fn register(&self, waker: &Waker) {
        let mut slot = self.waker.lock();
        match slot.as_ref() {
            Some(current) if current.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        }
    }

    /// Wakes and clears the stored waker, if any.
    pub fn wake(&self) {
        let waker = self.waker.lock().take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

enum Repr<T> {
    /// Completed synchronously; `None` once the outcome has been read.
    Ready(Option<TaskResult<T>>),
    Source {
        source: Arc<dyn TaskSource<T>>,
        token: Token,
        waker: Option<Arc<WakerSlot>>,
    },
}

/// A handle to the eventual result of an operation.
///
/// A task is either already completed (no allocation) or a pair of a
/// [`TaskSource`] and the [`Token`] it was issued with. The handle is
/// single-consumer: reading the result, by awaiting it or through
/// [`get_result`](Self::get_result), consumes it. Use
/// [`preserve`](Self::preserve) to await a result more than once.
///
/// `Task<T>` implements [`Future`] with `Output = Result<T, TaskError>`.
#[must_use = "a task does nothing observable unless it is awaited, forgotten or continued"]
pub struct Task<T> {
    repr: Repr<T>,
}

// The handle never pins its contents.
impl<T> Unpin for Task<T> {}

impl<T> Task<T> {
    /// Wraps a pending source.
    pub fn from_source(source: Arc<dyn TaskSource<T>>, token: Token) -> Self {
        Self {
            repr: Repr::Source {
                source,
                token,
                waker: None,
            },
        }
    }

    /// A task that already succeeded with `value`.
    pub fn from_result(value: T) -> Self {
        Self {
            repr: Repr::Ready(Some(Ok(value))),
        }
    }

    /// A task that already failed with `error`.
    pub fn from_error(error: TaskError) -> Self {
        Self {
            repr: Repr::Ready(Some(Err(error))),
        }
    }

    /// A task that already faulted with `fault`.
    pub fn from_exception(fault: Fault) -> Self {
        Self::from_error(TaskError::Faulted(fault))
    }

    /// A task that was already canceled by `token`.
    pub fn from_canceled(token: CancellationToken) -> Self {
        Self::from_error(TaskError::canceled(token))
    }

    /// The status of the task.
    ///
    /// Fails with [`InvalidOperation::StaleToken`] if the source was recycled,
    /// and with [`InvalidOperation::ResultConsumed`] once the result was read.
    pub fn status(&self) -> TaskResult<TaskStatus> {
        match &self.repr {
            Repr::Ready(Some(Ok(_))) => Ok(TaskStatus::Succeeded),
            Repr::Ready(Some(Err(error))) => Ok(error.status()),
            Repr::Ready(None) => Err(InvalidOperation::ResultConsumed.into()),
            Repr::Source { source, token, .. } => source.status(*token),
        }
    }

    /// Returns `true` if the task reached a terminal status.
    pub fn is_completed(&self) -> bool {
        self.status().is_ok_and(TaskStatus::is_completed)
    }

    /// Arranges for `continuation` to run when the task completes.
    ///
    /// Runs it inline if the task already completed. This is the raw awaiter
    /// protocol: a pooled source accepts a single continuation, so do not mix
    /// it with awaiting the same task.
    pub fn on_completed(&self, continuation: Continuation) -> TaskResult<()> {
        match &self.repr {
            Repr::Ready(_) => {
                continuation();
                Ok(())
            }
            Repr::Source { source, token, .. } => source.on_completed(continuation, *token),
        }
    }

    /// Reads the outcome of a completed task.
    ///
    /// Fails with [`InvalidOperation::NotCompleted`] if the task is pending.
    pub fn get_result(self) -> TaskResult<T> {
        match self.repr {
            Repr::Ready(Some(result)) => result,
            Repr::Ready(None) => Err(InvalidOperation::ResultConsumed.into()),
            Repr::Source { source, token, .. } => source.get_result(token),
        }
    }
}

impl<T: Send + 'static> Task<T> {
    /// Runs `callback` with the outcome once the task completes.
    ///
    /// Runs inline if the task already completed, otherwise on whichever thread
    /// completes the source.
    pub fn continue_with<F>(self, callback: F)
    where
        F: FnOnce(TaskResult<T>) + Send + 'static,
    {
        match self.repr {
            Repr::Ready(Some(result)) => callback(result),
            Repr::Ready(None) => callback(Err(InvalidOperation::ResultConsumed.into())),
            Repr::Source { source, token, .. } => {
                // The callback is parked in a shared cell so it can still be
                // reached if the registration itself is refused.
                let callback = Arc::new(Mutex::new(Some(callback)));
                let pending = callback.clone();
                let reader = source.clone();
                let registered = source.on_completed(
                    Box::new(move || {
                        if let Some(callback) = pending.lock().take() {
                            callback(reader.get_result(token));
                        }
                    }),
                    token,
                );
                if let Err(error) = registered {
                    if let Some(callback) = callback.lock().take() {
                        callback(Err(error));
                    }
                }
            }
        }
    }

    /// Drops interest in the result. Faults are reported to the
    /// [unobserved fault bus](crate::unobserved).
    pub fn forget(self) {
        self.continue_with(|result| {
            if let Err(error) = result {
                unobserved::report(error, "forgotten-task");
            }
        });
    }

    /// Transforms the result with `transform` once the task succeeds.
    ///
    /// A panic in `transform` faults the returned task.
    pub fn map<U, F>(self, transform: F) -> Task<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        if let Repr::Ready(Some(result)) = self.repr {
            return match result {
                Ok(value) => match panic::catch_unwind(AssertUnwindSafe(|| transform(value))) {
                    Ok(mapped) => Task::from_result(mapped),
                    Err(payload) => Task::from_exception(Fault::from_panic(payload)),
                },
                Err(error) => Task::from_error(error),
            };
        }

        let (source, task) = AutoResetCompletionSource::<U>::create_task();
        let version = source.version();
        self.continue_with(move |result| match result {
            Ok(value) => match panic::catch_unwind(AssertUnwindSafe(|| transform(value))) {
                Ok(mapped) => {
                    source.try_set_result_for(version, mapped);
                }
                Err(payload) => {
                    source.try_set_exception_for(version, Fault::from_panic(payload));
                }
            },
            Err(error) => {
                source.try_set_error_for(version, error);
            }
        });
        task
    }
}

impl<T: Clone + Send + 'static> Task<T> {
    /// Converts the task into a memoizing handle that can be awaited any number
    /// of times.
    pub fn preserve(self) -> SharedTask<T> {
        let shared = CompletionSource::new();
        let producer = shared.clone();
        self.continue_with(move |result| {
            match result {
                Ok(value) => producer.try_set_result(value),
                Err(error) => producer.try_set_error(error),
            };
        });
        SharedTask { source: shared }
    }
}

impl Task<()> {
    /// A task that already succeeded.
    pub fn completed() -> Self {
        Self::from_result(())
    }
}

impl<T> Future for Task<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let (source, token, waker) = match &mut this.repr {
            Repr::Ready(slot) => {
                return Poll::Ready(
                    slot.take()
                        .unwrap_or_else(|| Err(InvalidOperation::ResultConsumed.into())),
                );
            }
            Repr::Source {
                source,
                token,
                waker,
            } => (source, *token, waker),
        };

        let outcome = match source.status(token) {
            Ok(status) if status.is_completed() => source.get_result(token),
            Ok(_) => match register_waker(source, token, waker, cx) {
                Ok(()) => return Poll::Pending,
                Err(error) => Err(error),
            },
            Err(error) => Err(error),
        };
        this.repr = Repr::Ready(None);
        Poll::Ready(outcome)
    }
}

fn register_waker<T>(
    source: &Arc<dyn TaskSource<T>>,
    token: Token,
    waker: &mut Option<Arc<WakerSlot>>,
    cx: &Context<'_>,
) -> TaskResult<()> {
    if let Some(slot) = waker {
        slot.register(cx.waker());
        return Ok(());
    }
    let slot = Arc::new(WakerSlot::new());
    // Register before attaching: a source that completes concurrently runs the
    // continuation inline and must find the waker.
    slot.register(cx.waker());
    let notify = slot.clone();
    *waker = Some(slot);
    source.on_completed(Box::new(move || notify.wake()), token)
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Ready(Some(Ok(_))) => f.write_str("Task(Succeeded)"),
            Repr::Ready(Some(Err(error))) => write!(f, "Task({:?})", error.status()),
            Repr::Ready(None) => f.write_str("Task(Consumed)"),
            Repr::Source { source, token, .. } => {
                write!(f, "Task({:?} @ {token})", source.unsafe_status())
            }
        }
    }
}

impl<T> From<TaskResult<T>> for Task<T> {
    fn from(result: TaskResult<T>) -> Self {
        Self {
            repr: Repr::Ready(Some(result)),
        }
    }
}

/// A memoized task that can be awaited any number of times.
///
/// Created by [`Task::preserve`].
#[derive(Debug)]
pub struct SharedTask<T> {
    source: CompletionSource<T>,
}

impl<T> Clone for SharedTask<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> SharedTask<T> {
    /// Returns a fresh single-consumer handle on the memoized result.
    pub fn task(&self) -> Task<T> {
        self.source.task()
    }

    /// The status of the underlying task.
    pub fn status(&self) -> TaskStatus {
        self.source.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::Wake;

    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn poll_once<F: Future + Unpin>(future: &mut F, waker: &Waker) -> Poll<F::Output> {
        let mut cx = Context::from_waker(waker);
        Pin::new(future).poll(&mut cx)
    }

    #[test]
    fn completed_task_is_ready_on_first_poll() {
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let waker = Waker::from(counter);
        let mut task = Task::from_result(5);
        assert!(matches!(poll_once(&mut task, &waker), Poll::Ready(Ok(5))));
        // A consumed handle reports the misuse instead of panicking.
        assert!(matches!(
            poll_once(&mut task, &waker),
            Poll::Ready(Err(TaskError::InvalidOperation(
                InvalidOperation::ResultConsumed
            )))
        ));
    }

    #[test]
    fn pending_task_wakes_its_poller() {
        // --- 1. SETUP ---
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let waker = Waker::from(counter.clone());
        let (source, mut task) = AutoResetCompletionSource::<u32>::create_task();

        // --- 2. ACTION ---
        assert!(poll_once(&mut task, &waker).is_pending());
        assert!(poll_once(&mut task, &waker).is_pending());
        source.try_set_result(11);

        // --- 3. ASSERTIONS ---
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert!(matches!(poll_once(&mut task, &waker), Poll::Ready(Ok(11))));
    }

    #[test]
    fn continue_with_runs_after_completion() {
        let (source, task) = AutoResetCompletionSource::<u32>::create_task();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        task.continue_with(move |result| *sink.lock() = Some(result.unwrap()));
        assert!(seen.lock().is_none());
        source.try_set_result(3);
        assert_eq!(*seen.lock(), Some(3));
    }

    #[test]
    fn map_transforms_and_captures_panics() {
        let (source, task) = AutoResetCompletionSource::<u32>::create_task();
        let doubled = task.map(|value| value * 2);
        source.try_set_result(21);
        assert_eq!(doubled.get_result().unwrap(), 42);

        let exploded = Task::from_result(1).map(|_: i32| -> i32 { panic!("transform failed") });
        match exploded.get_result() {
            Err(TaskError::Faulted(fault)) => assert!(fault.to_string().contains("transform failed")),
            other => panic!("expected a fault, got {other:?}"),
        }
    }

    #[test]
    fn preserved_task_can_be_read_repeatedly() {
        let (source, task) = AutoResetCompletionSource::<String>::create_task();
        let shared = task.preserve();
        let early = shared.task();
        source.try_set_result("memo".to_string());

        assert_eq!(early.get_result().unwrap(), "memo");
        assert_eq!(shared.task().get_result().unwrap(), "memo");
        assert_eq!(shared.status(), TaskStatus::Succeeded);
    }

    #[test]
    fn status_of_a_ready_error_follows_its_family() {
        let task = Task::<()>::from_canceled(CancellationToken::canceled());
        assert_eq!(task.status().unwrap(), TaskStatus::Canceled);
        let task = Task::<()>::from_exception(Fault::msg("x"));
        assert_eq!(task.status().unwrap(), TaskStatus::Faulted);
    }
}
