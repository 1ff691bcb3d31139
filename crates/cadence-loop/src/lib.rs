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

//! # Cadence Loop
//!
//! The frame-driven half of the runtime. An engine driver owns a
//! [`PlayerLoop`], advances its [`FrameClock`] once per frame and runs its
//! phases; gameplay code awaits the frame and timer tasks created through a
//! [`PlayerLoopHandle`] or the free functions of [`factory`].

#![warn(missing_docs)]

pub mod cancel_after;
pub mod clock;
pub mod config;
pub mod factory;
pub mod player_loop;
pub mod promise;
pub mod queue;
pub mod runner;
pub mod schedule;
pub mod timeout;
pub mod timer;
pub mod timing;

pub use cancel_after::{cancel_after, cancel_after_frames};
pub use clock::{FrameClock, Stopwatch};
pub use config::{ConfigError, RuntimeConfig};
pub use factory::{
    delay, delay_frame, delay_secs, from_async_operation, next_frame, wait_until,
    wait_until_canceled, wait_until_value_changed, wait_while, yield_now,
};
pub use player_loop::{EnterGuard, PlayerLoop, PlayerLoopHandle, WeakPlayerLoopHandle};
pub use promise::{AsyncOperation, LoopPromise, PromiseDriver};
pub use queue::{ContinuationQueue, QueueStatus};
pub use runner::{PlayerLoopItem, PlayerLoopRunner};
pub use schedule::{CancelMode, DelayType, Schedule};
pub use timeout::{with_timeout, TimeoutError};
pub use timer::PlayerLoopTimer;
pub use timing::PlayerLoopTiming;
