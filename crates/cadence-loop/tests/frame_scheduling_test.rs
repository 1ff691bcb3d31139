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
use cadence_core::task::TaskStatus;
use cadence_core::{spawn, unobserved, CancellationTokenSource, TaskError, TaskResult};
use cadence_loop::{
    AsyncOperation, DelayType, FrameClock, PlayerLoop, PlayerLoopItem, PlayerLoopTiming,
    RuntimeConfig, Schedule,
};
use std::panic::{self, AssertUnwindSafe};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const FRAME: Duration = Duration::from_millis(16);

#[test]
fn test_drain_runs_queued_entries_and_defers_new_ones() {
    // --- 1. SETUP ---
    let player_loop = PlayerLoop::new();
    let handle = player_loop.handle();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..4 {
        let order = order.clone();
        let inner_handle = handle.clone();
        handle.add_continuation(PlayerLoopTiming::Update, move || {
            order.lock().push(i);
            // Queued during the drain: must wait for the next run.
            let order = order.clone();
            inner_handle.add_continuation(PlayerLoopTiming::Update, move || {
                order.lock().push(10 + i)
            });
        });
    }

    // --- 2. ACTION ---
    player_loop.run(PlayerLoopTiming::Update);
    let after_first = order.lock().clone();
    player_loop.run(PlayerLoopTiming::Update);

    // --- 3. ASSERTIONS ---
    assert_eq!(after_first, vec![0, 1, 2, 3]);
    assert_eq!(*order.lock(), vec![0, 1, 2, 3, 10, 11, 12, 13]);
}

#[test]
fn test_delay_frame_completes_on_the_third_update() {
    let player_loop = PlayerLoop::new();
    let task = player_loop
        .handle()
        .delay_frame(3, PlayerLoopTiming::Update);

    player_loop.tick(FRAME);
    player_loop.tick(FRAME);
    assert_eq!(task.status().unwrap(), TaskStatus::Pending);

    player_loop.tick(FRAME);
    assert_eq!(task.status().unwrap(), TaskStatus::Succeeded);
}

#[test]
fn test_delay_created_mid_frame_skips_that_frame() {
    let player_loop = PlayerLoop::new();
    let handle = player_loop.handle();
    player_loop.tick(FRAME);

    // Created after the frame started: the current frame does not count.
    let task = handle.delay_frame(1, PlayerLoopTiming::LastUpdate);
    player_loop.run(PlayerLoopTiming::LastUpdate);
    assert_eq!(task.status().unwrap(), TaskStatus::Pending);

    player_loop.tick(FRAME);
    assert_eq!(task.status().unwrap(), TaskStatus::Succeeded);
}

#[test]
fn test_spawned_future_awaits_frames() -> Result<()> {
    // --- 1. SETUP ---
    let player_loop = PlayerLoop::new();
    let handle = player_loop.handle();
    let steps = Arc::new(AtomicUsize::new(0));

    // --- 2. ACTION ---
    let counter = steps.clone();
    let task = spawn(async move {
        handle.next_frame(PlayerLoopTiming::Update).await?;
        counter.fetch_add(1, Ordering::SeqCst);
        handle
            .delay(Duration::from_millis(40), DelayType::UnscaledDeltaTime, PlayerLoopTiming::Update)
            .await?;
        counter.fetch_add(1, Ordering::SeqCst);
        Ok("finished")
    });

    // --- 3. ASSERTIONS ---
    assert_eq!(steps.load(Ordering::SeqCst), 0);
    player_loop.tick(FRAME);
    assert_eq!(steps.load(Ordering::SeqCst), 1);
    for _ in 0..4 {
        player_loop.tick(FRAME);
    }
    assert_eq!(steps.load(Ordering::SeqCst), 2);
    assert_eq!(task.get_result()?, "finished");
    Ok(())
}

#[test]
fn test_wait_until_and_wait_while() {
    let player_loop = PlayerLoop::new();
    let handle = player_loop.handle();
    let ready = Arc::new(AtomicBool::new(false));

    let flag = ready.clone();
    let until = handle.wait_until(move || flag.load(Ordering::SeqCst), PlayerLoopTiming::Update);
    let flag = ready.clone();
    let while_not = handle.wait_while(move || !flag.load(Ordering::SeqCst), PlayerLoopTiming::Update);

    player_loop.tick(FRAME);
    assert!(!until.is_completed());
    assert!(!while_not.is_completed());

    ready.store(true, Ordering::SeqCst);
    player_loop.tick(FRAME);
    assert!(until.get_result().is_ok());
    assert!(while_not.get_result().is_ok());
}

#[test]
fn test_cancellation_surfaces_as_canceled() {
    let player_loop = PlayerLoop::new();
    let handle = player_loop.handle();
    let source = CancellationTokenSource::new();

    let task = handle.delay_frame(10, Schedule::new(PlayerLoopTiming::Update).with_token(source.token()));
    let waiter = handle.wait_until_canceled(source.token(), PlayerLoopTiming::Update);

    player_loop.tick(FRAME);
    source.cancel();
    player_loop.tick(FRAME);

    assert!(matches!(task.get_result(), Err(TaskError::Canceled(_))));
    assert!(waiter.get_result().is_ok());
}

struct FakeLoad {
    frames_left: Arc<AtomicUsize>,
}

impl AsyncOperation for FakeLoad {
    type Output = &'static str;

    fn is_done(&self) -> bool {
        self.frames_left.load(Ordering::SeqCst) == 0
    }

    fn progress(&self) -> f32 {
        1.0 / (1 + self.frames_left.load(Ordering::SeqCst)) as f32
    }

    fn take_result(&mut self) -> TaskResult<&'static str> {
        Ok("level-1")
    }
}

#[test]
fn test_async_operation_is_polled_per_frame() {
    let player_loop = PlayerLoop::new();
    let handle = player_loop.handle();
    let frames_left = Arc::new(AtomicUsize::new(2));
    let reports = Arc::new(Mutex::new(Vec::new()));

    let sink = reports.clone();
    let task = handle.from_async_operation_with_progress(
        FakeLoad {
            frames_left: frames_left.clone(),
        },
        move |progress| sink.lock().push(progress),
        PlayerLoopTiming::Update,
    );

    for _ in 0..2 {
        player_loop.tick(FRAME);
        frames_left.fetch_sub(1, Ordering::SeqCst);
    }
    player_loop.tick(FRAME);

    assert_eq!(task.get_result().unwrap(), "level-1");
    assert_eq!(reports.lock().len(), 3);

    // Already done: completes without touching the loop.
    let done = handle.from_async_operation(
        FakeLoad {
            frames_left: Arc::new(AtomicUsize::new(0)),
        },
        PlayerLoopTiming::Update,
    );
    assert_eq!(done.get_result().unwrap(), "level-1");
}

#[test]
fn test_config_applies_the_time_scale() -> Result<()> {
    let config = RuntimeConfig::from_json(r#"{ "time_scale": 0.5 }"#)?;
    let player_loop = PlayerLoop::with_config(&config)?;
    let handle = player_loop.handle();

    let scaled = handle.delay(Duration::from_millis(100), DelayType::DeltaTime, PlayerLoopTiming::Update);
    let unscaled = handle.delay(
        Duration::from_millis(100),
        DelayType::UnscaledDeltaTime,
        PlayerLoopTiming::Update,
    );

    player_loop.tick(Duration::from_millis(100));
    assert!(unscaled.is_completed());
    assert!(!scaled.is_completed());

    player_loop.tick(Duration::from_millis(100));
    assert!(scaled.is_completed());
    Ok(())
}

struct Exploding;

impl PlayerLoopItem for Exploding {
    fn move_next(&self, _clock: &FrameClock) -> bool {
        panic!("loop item exploded");
    }
}

struct Counting(Arc<AtomicUsize>);

impl PlayerLoopItem for Counting {
    fn move_next(&self, _clock: &FrameClock) -> bool {
        self.0.fetch_add(1, Ordering::SeqCst);
        true
    }
}

#[test]
fn test_panicking_fault_handler_leaves_the_phase_usable() {
    // --- 1. SETUP ---
    let player_loop = PlayerLoop::new();
    let handle = player_loop.handle();
    let continuations = Arc::new(AtomicUsize::new(0));
    let polls = Arc::new(AtomicUsize::new(0));

    unobserved::set_handler(|_| panic!("fault handler exploded"));
    handle.add_continuation(PlayerLoopTiming::Update, || panic!("continuation exploded"));
    let counter = continuations.clone();
    handle.add_continuation(PlayerLoopTiming::Update, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    handle.add_action(PlayerLoopTiming::Update, Arc::new(Exploding));
    handle.add_action(PlayerLoopTiming::Update, Arc::new(Counting(polls.clone())));

    // --- 2. ACTION ---
    let first = panic::catch_unwind(AssertUnwindSafe(|| {
        player_loop.run(PlayerLoopTiming::Update)
    }));
    unobserved::clear_handler();

    let counter = continuations.clone();
    handle.add_continuation(PlayerLoopTiming::Update, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    player_loop.run(PlayerLoopTiming::Update);

    // --- 3. ASSERTIONS ---
    assert!(first.is_ok(), "a panicking handler must not reach the driver");
    assert_eq!(continuations.load(Ordering::SeqCst), 2);
    assert_eq!(polls.load(Ordering::SeqCst), 2);
    // Only the counting item is left; the exploding one was removed.
    assert_eq!(handle.pending(PlayerLoopTiming::Update), 1);
}
