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

use anyhow::Result;
use cadence_core::error::InvalidOperation;
use cadence_core::task::{AutoResetCompletionSource, CompletionSourceCore, TaskSource};
use cadence_core::unobserved;
use cadence_core::{spawn, CancellationToken, Fault, Task, TaskError, TaskStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn is_stale<T>(result: &Result<T, TaskError>) -> bool {
    matches!(
        result,
        Err(TaskError::InvalidOperation(InvalidOperation::StaleToken { .. }))
    )
}

#[test]
fn test_reset_then_one_terminal_then_stable_result() -> Result<()> {
    // --- 1. SETUP ---
    let core = CompletionSourceCore::<u32>::new();
    let token = core.reset();

    // --- 2. ACTION ---
    let accepted = [
        core.try_set_result(1),
        core.try_set_exception(Fault::msg("second")),
        core.try_set_canceled(CancellationToken::none()),
        core.try_set_result(2),
    ];

    // --- 3. ASSERTIONS ---
    assert_eq!(accepted, [true, false, false, false]);
    assert_eq!(core.status(token)?, TaskStatus::Succeeded);
    for _ in 0..3 {
        assert_eq!(core.get_result(token)?, 1);
    }
    Ok(())
}

#[test]
fn test_stale_token_is_rejected_everywhere() {
    let core = CompletionSourceCore::<u32>::new();
    let old = core.version();
    core.try_set_result(5);
    let _current = core.reset();

    assert!(is_stale(&core.status(old)));
    assert!(is_stale(&core.get_result(old)));
    assert!(is_stale(&core.take_result(old)));
    assert!(is_stale(&core.on_completed(Box::new(|| {}), old)));
}

#[test]
fn test_recycled_pooled_source_rejects_the_old_handle() {
    let (source, task) = AutoResetCompletionSource::<u32>::create_task();
    let version = source.version();
    source.try_set_result(1);
    assert_eq!(task.get_result().unwrap(), 1);

    // The same node now serves a new version.
    assert!(is_stale(&TaskSource::status(&*source, version)));
    assert!(is_stale(&TaskSource::get_result(&*source, version)));
}

#[test]
fn test_unread_fault_is_reported_on_drop() {
    let receiver = unobserved::subscribe();
    {
        let core = CompletionSourceCore::<()>::new();
        core.try_set_exception(Fault::msg("nobody listened"));
    }
    let reported = receiver.try_iter().any(|fault| {
        fault.origin == "completion-source-drop"
            && fault.error.to_string().contains("nobody listened")
    });
    assert!(reported);
}

#[test]
fn test_read_fault_is_not_reported() {
    let receiver = unobserved::subscribe();
    {
        let core = CompletionSourceCore::<()>::new();
        let token = core.version();
        core.try_set_exception(Fault::msg("observed fault"));
        assert!(core.take_result(token).is_err());
    }
    assert!(!receiver
        .try_iter()
        .any(|fault| fault.error.to_string().contains("observed fault")));
}

#[test]
fn test_forgotten_task_reports_its_fault() {
    let receiver = unobserved::subscribe();
    let (source, task) = AutoResetCompletionSource::<()>::create_task();
    task.forget();
    source.try_set_exception(Fault::msg("forgotten failure"));
    assert!(receiver
        .try_iter()
        .any(|fault| fault.origin == "forgotten-task"));
}

#[test]
fn test_spawned_chain_resumes_inline() -> Result<()> {
    // --- 1. SETUP ---
    let (first, first_task) = AutoResetCompletionSource::<u32>::create_task();
    let (second, second_task) = AutoResetCompletionSource::<u32>::create_task();
    let steps = Arc::new(AtomicUsize::new(0));
    let progress = steps.clone();

    let chain: Task<u32> = spawn(async move {
        let a = first_task.await?;
        progress.fetch_add(1, Ordering::SeqCst);
        let b = second_task.await?;
        progress.fetch_add(1, Ordering::SeqCst);
        Ok(a + b)
    });

    // --- 2. ACTION & 3. ASSERTIONS ---
    assert_eq!(steps.load(Ordering::SeqCst), 0);
    first.try_set_result(20);
    assert_eq!(steps.load(Ordering::SeqCst), 1);
    assert_eq!(chain.status()?, TaskStatus::Pending);
    second.try_set_result(22);
    assert_eq!(steps.load(Ordering::SeqCst), 2);
    assert_eq!(chain.get_result()?, 42);
    Ok(())
}
