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

use crate::player_loop::PlayerLoopHandle;
use crate::schedule::{DelayType, Schedule};
use crate::timing::PlayerLoopTiming;
use cadence_core::error::Fault;
use cadence_core::task::AutoResetCompletionSource;
use cadence_core::{CancellationTokenSource, Task};
use std::time::Duration;
use thiserror::Error;

/// The fault of a task that lost against its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the operation timed out after {0:?}")]
pub struct TimeoutError(pub Duration);

/// Races `task` against a delay.
///
/// The returned task completes like `task` if it finishes first, and faults
/// with a [`TimeoutError`] otherwise. The losing delay is canceled; a task
/// that loses keeps running and its late outcome is discarded.
pub fn with_timeout<T: Send + 'static>(
    handle: &PlayerLoopHandle,
    task: Task<T>,
    timeout: Duration,
    delay_type: DelayType,
    timing: PlayerLoopTiming,
) -> Task<T> {
    let (source, result) = AutoResetCompletionSource::create_task();
    let version = source.version();
    let deadline = CancellationTokenSource::new();

    let delay = handle.delay(
        timeout,
        delay_type,
        Schedule::new(timing)
            .with_token(deadline.token())
            .cancel_immediately(),
    );

    let on_timeout = source.clone();
    delay.continue_with(move |outcome| {
        if outcome.is_err() {
            return;
        }
        let fault = Fault::new(TimeoutError(timeout));
        if on_timeout.try_set_exception_for(version, fault) {
            log::debug!("Task timed out after {timeout:?}.");
        }
    });

    task.continue_with(move |outcome| {
        deadline.cancel();
        match outcome {
            Ok(value) => source.try_set_result_for(version, value),
            Err(error) => source.try_set_error_for(version, error),
        };
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player_loop::PlayerLoop;
    use cadence_core::error::TaskError;

    const FRAME: Duration = Duration::from_millis(100);

    #[test]
    fn the_task_wins_before_the_deadline() {
        let player_loop = PlayerLoop::new();
        let handle = player_loop.handle();
        let (source, task) = AutoResetCompletionSource::<u32>::create_task();
        let guarded = with_timeout(
            &handle,
            task,
            Duration::from_secs(1),
            DelayType::UnscaledDeltaTime,
            PlayerLoopTiming::Update,
        );

        player_loop.tick(FRAME);
        source.try_set_result(4);
        assert_eq!(guarded.get_result().unwrap(), 4);

        player_loop.tick(FRAME);
        assert_eq!(handle.pending(PlayerLoopTiming::Update), 0);
    }

    #[test]
    fn the_deadline_faults_a_slow_task() {
        let player_loop = PlayerLoop::new();
        let handle = player_loop.handle();
        let (_source, task) = AutoResetCompletionSource::<u32>::create_task();
        let guarded = with_timeout(
            &handle,
            task,
            Duration::from_millis(150),
            DelayType::UnscaledDeltaTime,
            PlayerLoopTiming::Update,
        );

        player_loop.tick(FRAME);
        assert!(!guarded.is_completed());
        player_loop.tick(FRAME);
        match guarded.get_result() {
            Err(TaskError::Faulted(fault)) => {
                assert_eq!(
                    fault.downcast_ref::<TimeoutError>(),
                    Some(&TimeoutError(Duration::from_millis(150)))
                );
            }
            other => panic!("expected a timeout fault, got {other:?}"),
        }
    }
}
