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

//! An inline cooperative executor for `async` blocks.
//!
//! There is no executor thread. A spawned future is polled immediately on the
//! calling thread and then re-polled inline by whichever thread wakes it, which
//! in practice is the thread draining a player-loop phase.

use super::completion_source::AutoResetCompletionSource;
use super::{Task, Token};
use crate::error::{Fault, TaskResult};
use parking_lot::Mutex;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

const IDLE: u8 = 0;
const POLLING: u8 = 1;
const NOTIFIED: u8 = 2;
const DONE: u8 = 3;

type BoxedFuture<T> = Pin<Box<dyn Future<Output = TaskResult<T>> + Send>>;

struct SpawnedTask<T: Send + 'static> {
    state: AtomicU8,
    future: Mutex<Option<BoxedFuture<T>>>,
    source: Arc<AutoResetCompletionSource<T>>,
    version: Token,
}

impl<T: Send + 'static> SpawnedTask<T> {
    fn schedule(self: &Arc<Self>) {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let next = match current {
                IDLE => POLLING,
                POLLING => NOTIFIED,
                _ => return,
            };
            match self
                .state
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) if next == POLLING => return self.run(),
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    fn run(self: &Arc<Self>) {
        let waker = Waker::from(self.clone());
        loop {
            let mut cx = Context::from_waker(&waker);
            let outcome = {
                let mut slot = self.future.lock();
                let Some(future) = slot.as_mut() else {
                    self.state.store(DONE, Ordering::Release);
                    return;
                };
                match panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))) {
                    Ok(Poll::Pending) => None,
                    Ok(Poll::Ready(result)) => {
                        *slot = None;
                        Some(result)
                    }
                    Err(payload) => {
                        *slot = None;
                        let fault = Fault::from_panic(payload);
                        log::debug!("Spawned task panicked: {fault}");
                        Some(Err(fault.into()))
                    }
                }
            };

            match outcome {
                Some(result) => {
                    self.state.store(DONE, Ordering::Release);
                    match result {
                        Ok(value) => self.source.try_set_result_for(self.version, value),
                        Err(error) => self.source.try_set_error_for(self.version, error),
                    };
                    return;
                }
                None => {
                    // A wake that raced the poll flips the state to NOTIFIED;
                    // poll again instead of going idle.
                    if self
                        .state
                        .compare_exchange(POLLING, IDLE, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return;
                    }
                    self.state.store(POLLING, Ordering::Release);
                }
            }
        }
    }
}

impl<T: Send + 'static> Wake for SpawnedTask<T> {
    fn wake(self: Arc<Self>) {
        self.schedule();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.schedule();
    }
}

/// Starts `future` and returns a task for its result.
///
/// The future is polled once before `spawn` returns, so a future that
/// completes synchronously yields an already completed task. An `Err` output
/// completes the task with that error (a `Canceled` error therefore produces a
/// canceled task), and a panic inside the future faults the task.
pub fn spawn<T, F>(future: F) -> Task<T>
where
    T: Send + 'static,
    F: Future<Output = TaskResult<T>> + Send + 'static,
{
    let (source, task) = AutoResetCompletionSource::create_task();
    let version = source.version();
    let spawned = Arc::new(SpawnedTask {
        state: AtomicU8::new(IDLE),
        future: Mutex::new(Some(Box::pin(future))),
        source,
        version,
    });
    log::trace!("Spawning an inline task.");
    spawned.schedule();
    task
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::task::TaskStatus;

    #[test]
    fn synchronous_future_completes_immediately() {
        let task = spawn(async { Ok(7) });
        assert_eq!(task.status().unwrap(), TaskStatus::Succeeded);
        assert_eq!(task.get_result().unwrap(), 7);
    }

    #[test]
    fn awaiting_a_source_resumes_on_completion() {
        let (source, inner) = AutoResetCompletionSource::<u32>::create_task();
        let outer = spawn(async move {
            let value = inner.await?;
            Ok(value + 1)
        });
        assert_eq!(outer.status().unwrap(), TaskStatus::Pending);

        source.try_set_result(41);
        assert_eq!(outer.get_result().unwrap(), 42);
    }

    #[test]
    fn panics_fault_the_spawned_task() {
        let task = spawn(async {
            if true {
                panic!("inside the future");
            }
            Ok(())
        });
        match task.get_result() {
            Err(TaskError::Faulted(fault)) => {
                assert!(fault.to_string().contains("inside the future"))
            }
            other => panic!("expected a fault, got {other:?}"),
        }
    }

    #[test]
    fn errors_propagate_with_their_family() {
        let (source, inner) = AutoResetCompletionSource::<()>::create_task();
        let outer = spawn(async move { inner.await });
        source.try_set_canceled(crate::cancel::CancellationToken::canceled());
        assert_eq!(outer.status().unwrap(), TaskStatus::Canceled);
    }
}
