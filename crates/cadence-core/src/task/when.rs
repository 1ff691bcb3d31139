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

//! Combinators over several tasks.

use super::completion_source::AutoResetCompletionSource;
use super::Task;
use crate::error::TaskError;
use parking_lot::Mutex;
use std::sync::Arc;

struct Gather<T> {
    results: Vec<Option<T>>,
    remaining: usize,
}

/// Completes when every task succeeded, with the results in input order.
///
/// The first task to fail or be canceled completes the combined task with its
/// error; outcomes of the remaining tasks are still read, so they are never
/// reported as unobserved.
pub fn when_all<T: Send + 'static>(tasks: Vec<Task<T>>) -> Task<Vec<T>> {
    if tasks.is_empty() {
        return Task::from_result(Vec::new());
    }

    let (source, task) = AutoResetCompletionSource::<Vec<T>>::create_task();
    let version = source.version();
    let gather = Arc::new(Mutex::new(Gather {
        results: std::iter::repeat_with(|| None).take(tasks.len()).collect(),
        remaining: tasks.len(),
    }));

    for (index, pending) in tasks.into_iter().enumerate() {
        let source = source.clone();
        let gather = gather.clone();
        pending.continue_with(move |result| match result {
            Ok(value) => {
                let finished = {
                    let mut gather = gather.lock();
                    gather.results[index] = Some(value);
                    gather.remaining -= 1;
                    (gather.remaining == 0).then(|| std::mem::take(&mut gather.results))
                };
                if let Some(results) = finished {
                    source.try_set_result_for(version, results.into_iter().flatten().collect());
                }
            }
            Err(error) => {
                source.try_set_error_for(version, error);
            }
        });
    }
    task
}

/// Completes with the index and value of the first task to complete.
///
/// If the first task to complete failed, the combined task fails with that
/// error. An empty input is rejected with [`TaskError::InvalidArgument`].
pub fn when_any<T: Send + 'static>(tasks: Vec<Task<T>>) -> Task<(usize, T)> {
    if tasks.is_empty() {
        return Task::from_error(TaskError::InvalidArgument(
            "when_any requires at least one task".to_string(),
        ));
    }

    let (source, task) = AutoResetCompletionSource::<(usize, T)>::create_task();
    let version = source.version();
    for (index, pending) in tasks.into_iter().enumerate() {
        let source = source.clone();
        pending.continue_with(move |result| {
            match result {
                Ok(value) => source.try_set_result_for(version, (index, value)),
                Err(error) => source.try_set_error_for(version, error),
            };
        });
    }
    task
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Fault;
    use crate::task::TaskStatus;

    #[test]
    fn when_all_keeps_input_order() {
        let sources: Vec<_> = (0..3)
            .map(|_| AutoResetCompletionSource::<u32>::create_task())
            .collect();
        let (producers, tasks): (Vec<_>, Vec<_>) = sources.into_iter().unzip();
        let all = when_all(tasks);

        producers[2].try_set_result(30);
        producers[0].try_set_result(10);
        assert_eq!(all.status().unwrap(), TaskStatus::Pending);
        producers[1].try_set_result(20);

        assert_eq!(all.get_result().unwrap(), vec![10, 20, 30]);
    }

    #[test]
    fn when_all_fails_with_the_first_error() {
        let (first, first_task) = AutoResetCompletionSource::<u32>::create_task();
        let (second, second_task) = AutoResetCompletionSource::<u32>::create_task();
        let all = when_all(vec![first_task, second_task]);

        second.try_set_exception(Fault::msg("second failed"));
        first.try_set_result(1);

        match all.get_result() {
            Err(TaskError::Faulted(fault)) => assert_eq!(fault.to_string(), "second failed"),
            other => panic!("expected the first fault, got {other:?}"),
        }
    }

    #[test]
    fn when_all_of_nothing_is_complete() {
        assert!(when_all(Vec::<Task<u8>>::new()).get_result().unwrap().is_empty());
    }

    #[test]
    fn when_any_reports_the_winner() {
        let (slow, slow_task) = AutoResetCompletionSource::<&str>::create_task();
        let (fast, fast_task) = AutoResetCompletionSource::<&str>::create_task();
        let any = when_any(vec![slow_task, fast_task]);

        fast.try_set_result("fast");
        slow.try_set_result("slow");
        assert_eq!(any.get_result().unwrap(), (1, "fast"));
    }

    #[test]
    fn when_any_rejects_an_empty_input() {
        let error = when_any(Vec::<Task<u8>>::new()).get_result().unwrap_err();
        assert!(matches!(error, TaskError::InvalidArgument(_)));
    }
}
