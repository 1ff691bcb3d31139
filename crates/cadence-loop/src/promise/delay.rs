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

use super::PromiseDriver;
use crate::clock::{FrameClock, Stopwatch};
use cadence_core::error::TaskResult;
use std::task::Poll;
use std::time::Duration;

/// Accumulates frame time until `delay` has passed.
///
/// Frame time of the creation frame is not counted.
#[derive(Debug)]
pub struct DelayDriver {
    delay: f32,
    elapsed: f32,
    unscaled: bool,
}

impl DelayDriver {
    /// Counts scaled frame time.
    pub fn scaled(delay: Duration) -> Self {
        Self {
            delay: delay.as_secs_f32(),
            elapsed: 0.0,
            unscaled: false,
        }
    }

    /// Counts frame time, ignoring the time scale.
    pub fn unscaled(delay: Duration) -> Self {
        Self {
            unscaled: true,
            ..Self::scaled(delay)
        }
    }
}

impl PromiseDriver for DelayDriver {
    type Output = ();

    fn poll(&mut self, clock: &FrameClock, creation_frame: bool) -> Poll<TaskResult<()>> {
        if self.elapsed == 0.0 && creation_frame {
            return Poll::Pending;
        }
        self.elapsed += if self.unscaled {
            clock.unscaled_delta_time()
        } else {
            clock.delta_time()
        };
        if self.elapsed >= self.delay {
            Poll::Ready(Ok(()))
        } else {
            Poll::Pending
        }
    }
}

/// Completes once `delay` of wall-clock time has passed since creation.
#[derive(Debug)]
pub struct RealtimeDelayDriver {
    delay: Duration,
    stopwatch: Stopwatch,
}

impl RealtimeDelayDriver {
    /// Starts measuring now.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            stopwatch: Stopwatch::new(),
        }
    }
}

impl PromiseDriver for RealtimeDelayDriver {
    type Output = ();

    fn poll(&mut self, _clock: &FrameClock, _creation_frame: bool) -> Poll<TaskResult<()>> {
        if self.stopwatch.elapsed() >= self.delay {
            Poll::Ready(Ok(()))
        } else {
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_delay_follows_the_time_scale() {
        let clock = FrameClock::new();
        clock.set_time_scale(0.5);
        clock.advance(Duration::from_millis(100));

        let mut scaled = DelayDriver::scaled(Duration::from_millis(100));
        let mut unscaled = DelayDriver::unscaled(Duration::from_millis(100));

        assert!(unscaled.poll(&clock, false).is_ready());
        assert!(scaled.poll(&clock, false).is_pending());
        assert!(scaled.poll(&clock, false).is_ready());
    }

    #[test]
    fn creation_frame_time_is_ignored() {
        let clock = FrameClock::new();
        clock.advance(Duration::from_secs(1));
        let mut driver = DelayDriver::scaled(Duration::from_millis(10));
        assert!(driver.poll(&clock, true).is_pending());
        assert!(driver.poll(&clock, false).is_ready());
    }

    #[test]
    fn realtime_delay_uses_the_wall_clock() {
        let clock = FrameClock::new();
        let mut driver = RealtimeDelayDriver::new(Duration::ZERO);
        assert!(driver.poll(&clock, true).is_ready());
    }
}
