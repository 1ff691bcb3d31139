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

use cadence_core::enumerator::{AsyncEnumerable, AsyncEnumerator, AsyncEnumeratorExt};
use cadence_core::task::AutoResetCompletionSource;
use cadence_core::{
    spawn, CancellationToken, CancellationTokenSource, Fault, InvalidOperation, Task, TaskError,
    TaskResult, TaskStatus,
};
use cadence_linq::factory::{IterEnumerator, Range};
use cadence_linq::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

/// Wraps a sequence and counts how often it is started and disposed.
struct Tracked<S> {
    inner: S,
    started: Arc<AtomicUsize>,
    disposed: Arc<AtomicUsize>,
}

struct TrackedEnumerator<E> {
    inner: E,
    disposed: Arc<AtomicUsize>,
}

impl<S: AsyncEnumerable> AsyncEnumerable for Tracked<S> {
    type Item = S::Item;
    type Enumerator = TrackedEnumerator<S::Enumerator>;

    fn get_async_enumerator(self, token: CancellationToken) -> Self::Enumerator {
        self.started.fetch_add(1, Ordering::SeqCst);
        TrackedEnumerator {
            inner: self.inner.get_async_enumerator(token),
            disposed: self.disposed,
        }
    }
}

impl<E: AsyncEnumerator> AsyncEnumerator for TrackedEnumerator<E> {
    type Item = E::Item;

    fn poll_move_next(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<bool>> {
        self.inner.poll_move_next(cx)
    }

    fn current(&self) -> Option<&E::Item> {
        self.inner.current()
    }

    fn take_current(&mut self) -> Option<E::Item> {
        self.inner.take_current()
    }

    fn poll_dispose(&mut self, cx: &mut Context<'_>) -> Poll<TaskResult<()>> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        self.inner.poll_dispose(cx)
    }
}

fn tracked(start: i32, count: u32) -> (Tracked<Range>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let started = Arc::new(AtomicUsize::new(0));
    let disposed = Arc::new(AtomicUsize::new(0));
    let sequence = Tracked {
        inner: range(start, count).unwrap(),
        started: started.clone(),
        disposed: disposed.clone(),
    };
    (sequence, started, disposed)
}

fn none() -> CancellationToken {
    CancellationToken::none()
}

#[test]
fn test_filter_yields_evens_then_ends() {
    // --- 1. SETUP ---
    let sequence = range(0, 5).unwrap().where_(|x| x % 2 == 0);

    // --- 2. ACTION ---
    let task = spawn(async move {
        let mut enumerator = sequence.get_async_enumerator(none());
        let mut seen = Vec::new();
        while enumerator.move_next_async().await? {
            seen.extend(enumerator.take_current());
        }
        let again = enumerator.move_next_async().await?;
        enumerator.dispose_async().await?;
        Ok((seen, again))
    });

    // --- 3. ASSERTIONS ---
    let (seen, again) = task.get_result().unwrap();
    assert_eq!(seen, vec![0, 2, 4]);
    assert!(!again);
}

#[test]
fn test_skip_and_take_boundaries() {
    let middle = range(1, 10).unwrap().skip(2).take(3).to_vec(none());
    assert_eq!(middle.get_result().unwrap(), vec![3, 4, 5]);

    let past_the_end = range(1, 3).unwrap().skip(5).to_vec(none());
    assert!(past_the_end.get_result().unwrap().is_empty());

    let more_than_available = range(1, 3).unwrap().take(10).to_vec(none());
    assert_eq!(more_than_available.get_result().unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_take_zero_never_starts_the_source() {
    let (sequence, started, disposed) = tracked(0, 5);

    let taken = sequence.take(0).to_vec(none());

    assert!(taken.get_result().unwrap().is_empty());
    assert_eq!(started.load(Ordering::SeqCst), 0);
    assert_eq!(disposed.load(Ordering::SeqCst), 0);
}

#[test]
fn test_partially_consumed_operator_disposes_upstream_once() {
    // --- 1. SETUP ---
    let (sequence, started, disposed) = tracked(0, 100);
    let mut enumerator = sequence
        .select(|x| x * 2)
        .get_async_enumerator(none());

    // --- 2. ACTION ---
    let task = spawn(async move {
        let first = enumerator.next_async().await?;
        let second = enumerator.next_async().await?;
        enumerator.dispose_async().await?;
        let again = enumerator.dispose_async().await;
        Ok((first, second, again))
    });

    // --- 3. ASSERTIONS ---
    let (first, second, again) = task.get_result().unwrap();
    assert_eq!((first, second), (Some(0), Some(2)));
    assert!(matches!(
        again,
        Err(TaskError::InvalidOperation(InvalidOperation::AlreadyDisposed))
    ));
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_aggregates_dispose_their_enumerator() {
    let (sequence, _, disposed) = tracked(0, 10);
    assert_eq!(sequence.first(none()).get_result().unwrap(), 0);
    assert_eq!(disposed.load(Ordering::SeqCst), 1);

    let (sequence, _, disposed) = tracked(0, 10);
    assert!(sequence.any(|x| *x == 3, none()).get_result().unwrap());
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_windowing_operators() {
    let chunks = range(0, 5).unwrap().buffer(2).to_vec(none());
    assert_eq!(chunks.get_result().unwrap(), vec![vec![0, 1], vec![2, 3], vec![4]]);

    let pairs = range(0, 4).unwrap().pairwise().to_vec(none());
    assert_eq!(pairs.get_result().unwrap(), vec![(0, 1), (1, 2), (2, 3)]);

    let running = range(1, 4).unwrap().scan(0, |total, x| total + x).to_vec(none());
    assert_eq!(running.get_result().unwrap(), vec![1, 3, 6, 10]);

    let distinct = from_iter([1, 1, 2, 2, 2, 3, 1])
        .distinct_until_changed()
        .to_vec(none());
    assert_eq!(distinct.get_result().unwrap(), vec![1, 2, 3, 1]);

    let empty_buffer = range(0, 3).unwrap().buffer(0).to_vec(none());
    assert!(matches!(
        empty_buffer.get_result(),
        Err(TaskError::InvalidArgument(_))
    ));
}

#[test]
fn test_predicate_operators() {
    let indexed = from_iter(["a", "b", "c"])
        .select_with_index(|name, index| format!("{index}:{name}"))
        .to_vec(none());
    assert_eq!(indexed.get_result().unwrap(), vec!["0:a", "1:b", "2:c"]);

    let skipped = from_iter([1, 2, 5, 1, 7])
        .skip_while(|x| *x < 3)
        .to_vec(none());
    assert_eq!(skipped.get_result().unwrap(), vec![5, 1, 7]);

    let (sequence, _, disposed) = tracked(0, 100);
    let taken = sequence.take_while(|x| *x < 3).to_vec(none());
    assert_eq!(taken.get_result().unwrap(), vec![0, 1, 2]);
    assert_eq!(disposed.load(Ordering::SeqCst), 1);

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let passed = range(0, 4)
        .unwrap()
        .do_on_next(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .count(none());
    assert_eq!(passed.get_result().unwrap(), 4);
    assert_eq!(seen.load(Ordering::SeqCst), 4);
}

#[test]
fn test_awaiting_operators_with_pending_tasks() {
    // --- 1. SETUP ---
    let sources: Vec<_> = (0..3)
        .map(|_| AutoResetCompletionSource::<i32>::create_task())
        .collect();
    let (sources, tasks): (Vec<_>, Vec<_>) = sources.into_iter().unzip();
    let mut tasks = tasks.into_iter();
    let mapped = range(0, 3)
        .unwrap()
        .select_await(move |_| tasks.next().unwrap_or_else(|| Task::from_result(-1)))
        .to_vec(none());

    // --- 2. ACTION ---
    assert_eq!(mapped.status().unwrap(), TaskStatus::Pending);
    sources[0].try_set_result(10);
    sources[1].try_set_result(20);
    assert_eq!(mapped.status().unwrap(), TaskStatus::Pending);
    sources[2].try_set_result(30);

    // --- 3. ASSERTIONS ---
    assert_eq!(mapped.get_result().unwrap(), vec![10, 20, 30]);

    let filtered = range(0, 6)
        .unwrap()
        .where_await(|x| Task::from_result(x % 3 == 0))
        .to_vec(none());
    assert_eq!(filtered.get_result().unwrap(), vec![0, 3]);
}

#[test]
fn test_failed_transform_faults_the_sequence() {
    let failed = range(0, 3)
        .unwrap()
        .select_await(|x| {
            if x == 1 {
                Task::from_exception(Fault::msg("bad element"))
            } else {
                Task::from_result(x)
            }
        })
        .to_vec(none());
    match failed.get_result() {
        Err(TaskError::Faulted(fault)) => assert_eq!(fault.to_string(), "bad element"),
        other => panic!("expected a fault, got {other:?}"),
    }
}

#[test]
fn test_combining_operators() {
    let joined = range(0, 2)
        .unwrap()
        .concat(range(5, 2).unwrap())
        .to_vec(none());
    assert_eq!(joined.get_result().unwrap(), vec![0, 1, 5, 6]);

    let merged = range(0, 3)
        .unwrap()
        .merge(range(10, 3).unwrap())
        .to_vec(none());
    assert_eq!(merged.get_result().unwrap(), vec![0, 10, 1, 11, 2, 12]);

    let zipped = range(0, 3).unwrap().zip(from_iter(["a", "b"])).to_vec(none());
    assert_eq!(zipped.get_result().unwrap(), vec![(0, "a"), (1, "b")]);
}

#[test]
fn test_concat_disposes_each_side_once() {
    let (first, _, first_disposed) = tracked(0, 3);
    let (second, second_started, second_disposed) = tracked(10, 3);

    let head = first.concat(second).take(4).to_vec(none());

    assert_eq!(head.get_result().unwrap(), vec![0, 1, 2, 10]);
    assert_eq!(first_disposed.load(Ordering::SeqCst), 1);
    assert_eq!(second_started.load(Ordering::SeqCst), 1);
    assert_eq!(second_disposed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_scalar_aggregates() {
    assert_eq!(range(1, 4).unwrap().sum(none()).get_result().unwrap(), 10);
    assert_eq!(range(1, 4).unwrap().last(none()).get_result().unwrap(), 4);
    assert_eq!(from_iter([3, 9, 1, 9]).max(none()).get_result().unwrap(), 9);
    assert_eq!(from_iter([3, 9, 1, 9]).min(none()).get_result().unwrap(), 1);
    assert!(range(0, 5).unwrap().all(|x| *x < 5, none()).get_result().unwrap());
    assert!(!range(0, 5).unwrap().contains(7, none()).get_result().unwrap());
    let product = range(1, 4)
        .unwrap()
        .aggregate(1, |acc, x| acc * x, none());
    assert_eq!(product.get_result().unwrap(), 24);

    let nothing = empty::<i32>().first(none());
    assert!(matches!(
        nothing.get_result(),
        Err(TaskError::InvalidOperation(InvalidOperation::NoElements))
    ));
    assert!(matches!(
        empty::<i32>().max(none()).get_result(),
        Err(TaskError::InvalidOperation(InvalidOperation::NoElements))
    ));
    assert_eq!(repeat("x", 3).count(none()).get_result().unwrap(), 3);
    assert_eq!(return_value(8).to_vec(none()).get_result().unwrap(), vec![8]);
}

#[test]
fn test_thrown_sequence_faults_the_aggregate() {
    let failing = throw::<i32>(TaskError::Faulted(Fault::msg("source broke")));
    let collected = failing.to_vec(none());
    assert_eq!(collected.status().unwrap(), TaskStatus::Faulted);
}

#[test]
fn test_canceled_token_stops_at_the_next_pull() {
    let canceled = range(0, 5).unwrap().select(|x| x + 1).to_vec(CancellationToken::canceled());
    assert_eq!(canceled.status().unwrap(), TaskStatus::Canceled);

    let source = CancellationTokenSource::new();
    let pending = never::<i32>().to_vec(source.token());
    assert_eq!(pending.status().unwrap(), TaskStatus::Pending);
    source.cancel();
    assert_eq!(pending.status().unwrap(), TaskStatus::Canceled);
}

#[test]
fn test_take_until_ends_when_the_other_task_completes() {
    // --- 1. SETUP ---
    let (trigger, other) = AutoResetCompletionSource::<()>::create_task();
    let collected = never::<i32>().take_until(other).to_vec(none());
    assert_eq!(collected.status().unwrap(), TaskStatus::Pending);

    // --- 2. ACTION ---
    trigger.try_set_result(());

    // --- 3. ASSERTIONS ---
    assert!(collected.get_result().unwrap().is_empty());
}

#[test]
fn test_take_until_canceled_ends_quietly() {
    let stop = CancellationTokenSource::new();
    let collected = never::<i32>()
        .take_until_canceled(stop.token())
        .to_vec(none());
    assert_eq!(collected.status().unwrap(), TaskStatus::Pending);

    stop.cancel();
    assert_eq!(collected.status().unwrap(), TaskStatus::Succeeded);

    let open = CancellationTokenSource::new();
    let skipped = range(0, 3)
        .unwrap()
        .skip_until_canceled(open.token())
        .to_vec(none());
    assert!(skipped.get_result().unwrap().is_empty());
}

#[test]
fn test_from_iter_refuses_a_second_dispose() {
    let task = spawn(async {
        let mut enumerator: IterEnumerator<_> = from_iter(vec![1]).get_async_enumerator(none());
        enumerator.dispose_async().await?;
        Ok(enumerator.dispose_async().await)
    });
    assert!(matches!(
        task.get_result().unwrap(),
        Err(TaskError::InvalidOperation(InvalidOperation::AlreadyDisposed))
    ));
}

#[test]
fn test_panicking_selector_faults_instead_of_unwinding() {
    // --- 1. SETUP ---
    let (sequence, _, disposed) = tracked(0, 5);
    let mut enumerator = sequence
        .select(|x| if x == 2 { panic!("selector exploded") } else { x })
        .get_async_enumerator(none());

    // --- 2. ACTION ---
    let task = spawn(async move {
        let mut seen = Vec::new();
        let failure = loop {
            match enumerator.next_async().await {
                Ok(Some(value)) => seen.push(value),
                Ok(None) => break None,
                Err(error) => break Some(error),
            }
        };
        let again = enumerator.move_next_async().await;
        enumerator.dispose_async().await?;
        Ok((seen, failure, again.is_err()))
    });

    // --- 3. ASSERTIONS ---
    let (seen, failure, still_faulted) = task.get_result().unwrap();
    assert_eq!(seen, vec![0, 1]);
    match failure {
        Some(TaskError::Faulted(fault)) => {
            assert_eq!(fault.to_string(), "panicked: selector exploded")
        }
        other => panic!("expected a fault, got {other:?}"),
    }
    assert!(still_faulted);
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_aggregate_disposes_after_a_panicking_predicate() {
    let (sequence, _, disposed) = tracked(0, 5);

    let counted = sequence
        .where_(|x| if *x == 3 { panic!("predicate exploded") } else { true })
        .count(none());

    assert!(matches!(counted.get_result(), Err(TaskError::Faulted(_))));
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}
