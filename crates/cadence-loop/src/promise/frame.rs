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
use crate::clock::FrameClock;
use cadence_core::error::TaskResult;
use std::task::Poll;

/// Completes on the next run of its phase.
#[derive(Debug, Default)]
pub struct YieldDriver;

impl PromiseDriver for YieldDriver {
    type Output = ();

    fn poll(&mut self, _clock: &FrameClock, _creation_frame: bool) -> Poll<TaskResult<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Completes on the first run of its phase in a later frame.
#[derive(Debug, Default)]
pub struct NextFrameDriver;

impl PromiseDriver for NextFrameDriver {
    type Output = ();

    fn poll(&mut self, _clock: &FrameClock, creation_frame: bool) -> Poll<TaskResult<()>> {
        if creation_frame {
            Poll::Pending
        } else {
            Poll::Ready(Ok(()))
        }
    }
}

/// Completes after its phase ran in `frames` frames, not counting the frame
/// the promise was created in.
#[derive(Debug)]
pub struct DelayFrameDriver {
    frames: u32,
    counted: u32,
}

impl DelayFrameDriver {
    /// Waits `frames` frames. Zero completes on the first run.
    pub fn new(frames: u32) -> Self {
        Self { frames, counted: 0 }
    }
}

impl PromiseDriver for DelayFrameDriver {
    type Output = ();

    fn poll(&mut self, _clock: &FrameClock, creation_frame: bool) -> Poll<TaskResult<()>> {
        if self.counted == 0 {
            if self.frames == 0 {
                return Poll::Ready(Ok(()));
            }
            if creation_frame {
                return Poll::Pending;
            }
        }
        self.counted += 1;
        if self.counted >= self.frames {
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
    fn delay_frame_skips_the_creation_frame() {
        let clock = FrameClock::new();
        let mut driver = DelayFrameDriver::new(2);

        assert!(driver.poll(&clock, true).is_pending());
        assert!(driver.poll(&clock, false).is_pending());
        assert!(driver.poll(&clock, false).is_ready());
    }

    #[test]
    fn zero_frames_completes_immediately() {
        let clock = FrameClock::new();
        assert!(DelayFrameDriver::new(0).poll(&clock, true).is_ready());
    }

    #[test]
    fn next_frame_waits_out_the_creation_frame() {
        let clock = FrameClock::new();
        let mut driver = NextFrameDriver;
        assert!(driver.poll(&clock, true).is_pending());
        assert!(driver.poll(&clock, false).is_ready());
    }
}
