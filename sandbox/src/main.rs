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

// Cadence Sandbox
// Drives a simulated frame loop and runs a few scripted gameplay tasks on it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cadence_core::task::AutoResetCompletionSource;
use cadence_core::{pool, unobserved, CancellationToken, CancellationTokenSource, Task};
use cadence_linq::prelude::*;
use cadence_loop::{
    cancel_after, next_frame, with_timeout, DelayType, PlayerLoop, PlayerLoopHandle,
    PlayerLoopTimer, PlayerLoopTiming, RuntimeConfig,
};

const FRAME: Duration = Duration::from_millis(16);
const MAX_FRAMES: u64 = 900;

fn load_config() -> Result<RuntimeConfig> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/runtime.json")));
    if !path.exists() {
        log::warn!("No configuration at {}, using defaults.", path.display());
        return Ok(RuntimeConfig::default());
    }
    let config = RuntimeConfig::from_file(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    log::info!("Loaded runtime configuration from {}.", path.display());
    Ok(config)
}

/// Waits, counts frames, then races a load that never finishes against a
/// deadline.
fn intro_script(handle: PlayerLoopHandle) -> Task<()> {
    handle.clone().spawn_at(PlayerLoopTiming::Update, async move {
        log::info!("Intro: waiting half a second.");
        handle
            .delay(Duration::from_millis(500), DelayType::DeltaTime, PlayerLoopTiming::Update)
            .await?;
        handle.delay_frame(10, PlayerLoopTiming::Update).await?;
        next_frame(PlayerLoopTiming::PostLateUpdate).await?;
        log::info!("Intro: resumed at frame {}.", handle.clock().frame_count());

        let (_loader, load) = AutoResetCompletionSource::<u32>::create_task();
        let deadline = Duration::from_millis(250);
        let guarded = with_timeout(
            &handle,
            load,
            deadline,
            DelayType::UnscaledDeltaTime,
            PlayerLoopTiming::Update,
        );
        match guarded.await {
            Ok(bytes) => log::info!("Intro: loaded {bytes} bytes."),
            Err(error) => log::warn!("Intro: gave up on the load: {error}"),
        }
        Ok(())
    })
}

/// Announces a wave every second until the session ends; resolves to the
/// number of waves.
fn wave_spawner(handle: &PlayerLoopHandle, session: CancellationToken) -> Task<usize> {
    interval(handle, Duration::from_secs(1), DelayType::DeltaTime, PlayerLoopTiming::Update)
        .select_with_index(|(), index| index + 1)
        .do_on_next(|wave| log::info!("Wave {wave} incoming."))
        .take_until_canceled(session)
        .count(CancellationToken::none())
}

/// Logs every health change together with the previous value until the
/// session ends.
fn health_monitor(
    handle: &PlayerLoopHandle,
    health: &Arc<AtomicU32>,
    session: CancellationToken,
) -> Task<()> {
    every_value_changed(
        handle,
        health,
        |health: &AtomicU32| health.load(Ordering::Relaxed),
        PlayerLoopTiming::PostLateUpdate,
    )
    .pairwise()
    .take_until_canceled(session)
    .for_each(
        |(before, after)| log::info!("Health {before} -> {after}."),
        CancellationToken::none(),
    )
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let player_loop = PlayerLoop::with_config(&config)?;
    let _entered = player_loop.enter();
    let handle = player_loop.handle();
    let faults = unobserved::subscribe();

    let session = CancellationTokenSource::new();
    let _session_timer = cancel_after(
        &handle,
        &session,
        Duration::from_secs(5),
        DelayType::DeltaTime,
        PlayerLoopTiming::Update,
    )?;

    let health = Arc::new(AtomicU32::new(100));
    let damage = health.clone();
    let poison = PlayerLoopTimer::start_new(
        &handle,
        Duration::from_millis(750),
        true,
        DelayType::DeltaTime,
        PlayerLoopTiming::FixedUpdate,
        session.token(),
        move || {
            let _ = damage.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |hp| {
                Some(hp.saturating_sub(15))
            });
        },
    )?;

    let intro = intro_script(handle.clone());
    let waves = wave_spawner(&handle, session.token());
    let monitor = health_monitor(&handle, &health, session.token());

    // Work finished on another thread hands its continuation to the loop.
    let streaming = handle.clone();
    std::thread::spawn(move || {
        for asset in 0..3 {
            streaming.add_continuation(PlayerLoopTiming::PreUpdate, move || {
                log::info!("Asset {asset} streamed in on a worker thread.");
            });
        }
    })
    .join()
    .map_err(|_| anyhow::anyhow!("the streaming thread panicked"))?;

    // A faulty continuation is contained and surfaces on the fault bus.
    handle.add_continuation(PlayerLoopTiming::Update, || panic!("scripted failure"));

    let mut frames = 0;
    while !(intro.is_completed() && waves.is_completed()) && frames < MAX_FRAMES {
        player_loop.tick(FRAME);
        for fault in faults.try_iter() {
            log::warn!("Unobserved fault from {}: {}", fault.origin, fault.error);
        }
        frames += 1;
    }

    poison.dispose();
    log::info!("Stopped after {frames} frames.");
    log::info!("Intro finished with {:?}.", intro.status());
    match waves.get_result() {
        Ok(count) => log::info!("{count} waves spawned."),
        Err(error) => log::warn!("Wave spawner failed: {error}"),
    }
    log::info!("Health ended at {}.", health.load(Ordering::Relaxed));
    log::info!("Health monitor finished with {:?}.", monitor.status());
    for (name, idle) in pool::size_info() {
        log::debug!("Pool {name}: {idle} idle.");
    }
    Ok(())
}
