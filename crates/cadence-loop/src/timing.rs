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

use serde::{Deserialize, Serialize};
use std::fmt;

/// A phase of the engine frame at which continuations and loop items run.
///
/// The declaration order is the order in which
/// [`PlayerLoop::tick`](crate::PlayerLoop::tick) runs the phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlayerLoopTiming {
    /// Start of the frame.
    Initialization,
    /// End of the initialization phase.
    LastInitialization,
    /// Before input and platform events are processed.
    EarlyUpdate,
    /// End of the early update phase.
    LastEarlyUpdate,
    /// The fixed-step simulation phase.
    FixedUpdate,
    /// End of the fixed update phase.
    LastFixedUpdate,
    /// Before gameplay update.
    PreUpdate,
    /// End of the pre-update phase.
    LastPreUpdate,
    /// Gameplay update.
    #[default]
    Update,
    /// End of the update phase.
    LastUpdate,
    /// Before late update.
    PreLateUpdate,
    /// End of the pre-late-update phase.
    LastPreLateUpdate,
    /// After late update, before rendering.
    PostLateUpdate,
    /// End of the frame.
    LastPostLateUpdate,
    /// Time bookkeeping.
    TimeUpdate,
    /// End of time bookkeeping.
    LastTimeUpdate,
}

impl PlayerLoopTiming {
    /// Number of phases.
    pub const COUNT: usize = 16;

    /// Every phase, in frame order.
    pub const ALL: [PlayerLoopTiming; Self::COUNT] = [
        PlayerLoopTiming::Initialization,
        PlayerLoopTiming::LastInitialization,
        PlayerLoopTiming::EarlyUpdate,
        PlayerLoopTiming::LastEarlyUpdate,
        PlayerLoopTiming::FixedUpdate,
        PlayerLoopTiming::LastFixedUpdate,
        PlayerLoopTiming::PreUpdate,
        PlayerLoopTiming::LastPreUpdate,
        PlayerLoopTiming::Update,
        PlayerLoopTiming::LastUpdate,
        PlayerLoopTiming::PreLateUpdate,
        PlayerLoopTiming::LastPreLateUpdate,
        PlayerLoopTiming::PostLateUpdate,
        PlayerLoopTiming::LastPostLateUpdate,
        PlayerLoopTiming::TimeUpdate,
        PlayerLoopTiming::LastTimeUpdate,
    ];

    /// Position of the phase in [`ALL`](Self::ALL).
    pub const fn index(self) -> usize {
        self as usize
    }

    /// A stable, human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            PlayerLoopTiming::Initialization => "Initialization",
            PlayerLoopTiming::LastInitialization => "LastInitialization",
            PlayerLoopTiming::EarlyUpdate => "EarlyUpdate",
            PlayerLoopTiming::LastEarlyUpdate => "LastEarlyUpdate",
            PlayerLoopTiming::FixedUpdate => "FixedUpdate",
            PlayerLoopTiming::LastFixedUpdate => "LastFixedUpdate",
            PlayerLoopTiming::PreUpdate => "PreUpdate",
            PlayerLoopTiming::LastPreUpdate => "LastPreUpdate",
            PlayerLoopTiming::Update => "Update",
            PlayerLoopTiming::LastUpdate => "LastUpdate",
            PlayerLoopTiming::PreLateUpdate => "PreLateUpdate",
            PlayerLoopTiming::LastPreLateUpdate => "LastPreLateUpdate",
            PlayerLoopTiming::PostLateUpdate => "PostLateUpdate",
            PlayerLoopTiming::LastPostLateUpdate => "LastPostLateUpdate",
            PlayerLoopTiming::TimeUpdate => "TimeUpdate",
            PlayerLoopTiming::LastTimeUpdate => "LastTimeUpdate",
        }
    }
}

impl fmt::Display for PlayerLoopTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
