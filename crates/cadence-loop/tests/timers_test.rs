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

use cadence_core::unobserved;
use cadence_core::{CancellationToken, CancellationTokenSource, TaskError};
use cadence_loop::{
    cancel_after_frames, DelayType, PlayerLoop, PlayerLoopTimer, PlayerLoopTiming,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const FRAME: Duration = Duration::from_millis(100);

fn frame_log() -> (Arc<Mutex<Vec<u64>>>, Arc<Mutex<u64>>) {
    (Arc::new(Mutex::new(Vec::new())), Arc::new(Mutex::new(0)))
}

#[test]
fn test_periodic_timer_fires_every_interval() {
    // --- 1. SETUP ---
    let player_loop = PlayerLoop::new();
    let (fired_at, frame) = frame_log();
    let log = fired_at.clone();
    let current = frame.clone();
    let timer = PlayerLoopTimer::start_new(
        &player_loop.handle(),
        Duration::from_millis(250),
        true,
        DelayType::UnscaledDeltaTime,
        PlayerLoopTiming::Update,
        CancellationToken::none(),
        move || log.lock().push(*current.lock()),
    )
    .unwrap();

    // --- 2. ACTION ---
    for i in 1..=9 {
        *frame.lock() = i;
        player_loop.tick(FRAME);
    }

    // --- 3. ASSERTIONS ---
    // 250ms at 100ms per frame: fires on every third frame.
    assert_eq!(*fired_at.lock(), vec![3, 6, 9]);
    assert!(timer.is_running());
}

#[test]
fn test_restart_with_changes_the_interval() {
    let player_loop = PlayerLoop::new();
    let (fired_at, frame) = frame_log();
    let log = fired_at.clone();
    let current = frame.clone();
    let timer = PlayerLoopTimer::create(
        &player_loop.handle(),
        Duration::from_millis(450),
        false,
        DelayType::UnscaledDeltaTime,
        PlayerLoopTiming::Update,
        CancellationToken::none(),
        move || log.lock().push(*current.lock()),
    );

    // Created stopped.
    *frame.lock() = 1;
    player_loop.tick(FRAME);
    assert!(fired_at.lock().is_empty());

    timer.restart_with(Duration::from_millis(150)).unwrap();
    for i in 2..=6 {
        *frame.lock() = i;
        player_loop.tick(FRAME);
    }
    assert_eq!(*fired_at.lock(), vec![3]);
    assert!(!timer.is_running());
}

#[test]
fn test_token_stops_a_running_timer() {
    let player_loop = PlayerLoop::new();
    let handle = player_loop.handle();
    let source = CancellationTokenSource::new();
    let hits = Arc::new(Mutex::new(0));
    let counter = hits.clone();

    let timer = PlayerLoopTimer::start_new(
        &handle,
        Duration::from_millis(100),
        true,
        DelayType::UnscaledDeltaTime,
        PlayerLoopTiming::Update,
        source.token(),
        move || *counter.lock() += 1,
    )
    .unwrap();
    cancel_after_frames(&handle, &source, 2, PlayerLoopTiming::PreUpdate);

    for _ in 0..5 {
        player_loop.tick(FRAME);
    }

    // Frame 1 fires; frame 2 cancels in PreUpdate before Update runs.
    assert_eq!(*hits.lock(), 1);
    assert!(!timer.is_running());
    assert_eq!(handle.pending(PlayerLoopTiming::Update), 0);
}

#[test]
fn test_panicking_callback_is_contained_and_reported() {
    let receiver = unobserved::subscribe();
    let player_loop = PlayerLoop::new();
    let handle = player_loop.handle();
    let survivor = Arc::new(Mutex::new(false));

    handle.add_continuation(PlayerLoopTiming::Update, || panic!("scripted failure"));
    let flag = survivor.clone();
    handle.add_continuation(PlayerLoopTiming::Update, move || *flag.lock() = true);

    player_loop.tick(FRAME);

    assert!(*survivor.lock());
    let reported = receiver.try_iter().any(|fault| {
        fault.origin == "continuation-queue"
            && matches!(&fault.error, TaskError::Faulted(f) if f.to_string().contains("scripted failure"))
    });
    assert!(reported, "the swallowed panic should reach the unobserved fault bus");
}
