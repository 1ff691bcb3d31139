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

use crate::timing::PlayerLoopTiming;
use cadence_core::CancellationToken;
use serde::{Deserialize, Serialize};

/// How a loop promise reacts to cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CancelMode {
    /// Cancellation is observed on the promise's next poll.
    #[default]
    Lazy,
    /// The promise is canceled the instant cancellation is requested.
    Immediate,
}

/// Which clock a time-based delay counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DelayType {
    /// Scaled frame time.
    #[default]
    DeltaTime,
    /// Frame time, ignoring the time scale.
    UnscaledDeltaTime,
    /// Wall-clock time.
    Realtime,
}

/// Where and under which cancellation a loop promise runs.
///
/// A bare [`PlayerLoopTiming`] converts into a schedule without cancellation.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    /// The phase whose runner polls the promise.
    pub timing: PlayerLoopTiming,
    /// Cancels the promise when requested.
    pub token: CancellationToken,
    /// When cancellation is observed.
    pub cancel_mode: CancelMode,
}

impl Schedule {
    /// A schedule on `timing` without cancellation.
    pub fn new(timing: PlayerLoopTiming) -> Self {
        Self {
            timing,
            ..Self::default()
        }
    }

    /// Cancels the promise through `token`.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Observes cancellation with `mode`.
    pub fn with_cancel_mode(mut self, mode: CancelMode) -> Self {
        self.cancel_mode = mode;
        self
    }

    /// Shorthand for [`CancelMode::Immediate`].
    pub fn cancel_immediately(self) -> Self {
        self.with_cancel_mode(CancelMode::Immediate)
    }
}

impl From<PlayerLoopTiming> for Schedule {
    fn from(timing: PlayerLoopTiming) -> Self {
        Self::new(timing)
    }
}
