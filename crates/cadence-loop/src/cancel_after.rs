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

//! Loop-driven cancellation deadlines.

use crate::clock::FrameClock;
use crate::player_loop::PlayerLoopHandle;
use crate::runner::PlayerLoopItem;
use crate::schedule::DelayType;
use crate::timer::PlayerLoopTimer;
use crate::timing::PlayerLoopTiming;
use cadence_core::error::TaskResult;
use cadence_core::{CancellationToken, CancellationTokenSource};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cancels `source` once `delay` has passed on the clock chosen by
/// `delay_type`.
///
/// Returns the underlying one-shot timer; disposing it abandons the deadline.
pub fn cancel_after(
    handle: &PlayerLoopHandle,
    source: &CancellationTokenSource,
    delay: Duration,
    delay_type: DelayType,
    timing: PlayerLoopTiming,
) -> TaskResult<PlayerLoopTimer> {
    let target = source.clone();
    PlayerLoopTimer::start_new(
        handle,
        delay,
        false,
        delay_type,
        timing,
        CancellationToken::none(),
        move || {
            log::debug!("Cancellation deadline reached.");
            target.cancel();
        },
    )
}

struct FrameCountdown {
    source: CancellationTokenSource,
    frames: u32,
    counted: AtomicU32,
    initial_frame: u64,
}

impl PlayerLoopItem for FrameCountdown {
    fn move_next(&self, clock: &FrameClock) -> bool {
        if self.source.is_cancellation_requested() {
            return false;
        }
        if clock.frame_count() == self.initial_frame {
            return true;
        }
        if self.counted.fetch_add(1, Ordering::AcqRel) + 1 >= self.frames {
            self.source.cancel();
            return false;
        }
        true
    }
}

/// Cancels `source` after `timing` ran in `frames` later frames.
///
/// Zero frames cancels immediately.
pub fn cancel_after_frames(
    handle: &PlayerLoopHandle,
    source: &CancellationTokenSource,
    frames: u32,
    timing: PlayerLoopTiming,
) {
    if frames == 0 {
        source.cancel();
        return;
    }
    handle.add_action(
        timing,
        Arc::new(FrameCountdown {
            source: source.clone(),
            frames,
            counted: AtomicU32::new(0),
            initial_frame: handle.clock().frame_count(),
        }),
    );
}
