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

//! Frame time as seen by loop items.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// The frame counter and per-frame deltas of a player loop.
///
/// Written by the driver through [`PlayerLoop::advance_frame`](crate::PlayerLoop::advance_frame)
/// and read by every loop item. Floats are stored as raw bits in atomics so
/// the clock can be shared with background threads.
#[derive(Debug)]
pub struct FrameClock {
    frame_count: AtomicU64,
    delta_bits: AtomicU32,
    unscaled_delta_bits: AtomicU32,
    time_scale_bits: AtomicU32,
    startup: Instant,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Creates a clock at frame zero with a time scale of one.
    pub fn new() -> Self {
        Self {
            frame_count: AtomicU64::new(0),
            delta_bits: AtomicU32::new(0f32.to_bits()),
            unscaled_delta_bits: AtomicU32::new(0f32.to_bits()),
            time_scale_bits: AtomicU32::new(1f32.to_bits()),
            startup: Instant::now(),
        }
    }

    /// Starts a new frame that lasted `unscaled_delta`.
    pub fn advance(&self, unscaled_delta: Duration) {
        let unscaled = unscaled_delta.as_secs_f32();
        let scaled = unscaled * self.time_scale();
        self.unscaled_delta_bits
            .store(unscaled.to_bits(), Ordering::Release);
        self.delta_bits.store(scaled.to_bits(), Ordering::Release);
        self.frame_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of frames started so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Acquire)
    }

    /// Scaled duration of the current frame, in seconds.
    pub fn delta_time(&self) -> f32 {
        f32::from_bits(self.delta_bits.load(Ordering::Acquire))
    }

    /// Unscaled duration of the current frame, in seconds.
    pub fn unscaled_delta_time(&self) -> f32 {
        f32::from_bits(self.unscaled_delta_bits.load(Ordering::Acquire))
    }

    /// The multiplier applied to frame deltas.
    pub fn time_scale(&self) -> f32 {
        f32::from_bits(self.time_scale_bits.load(Ordering::Acquire))
    }

    /// Sets the multiplier applied to later frame deltas.
    pub fn set_time_scale(&self, scale: f32) {
        self.time_scale_bits.store(scale.to_bits(), Ordering::Release);
    }

    /// Wall-clock time since the clock was created.
    pub fn realtime_since_startup(&self) -> Duration {
        self.startup.elapsed()
    }
}

/// Measures wall-clock time from a starting instant.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    start_time: Instant,
}

impl Stopwatch {
    /// Creates a new stopwatch, started now.
    #[inline]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Restarts the measurement from now.
    #[inline]
    pub fn restart(&mut self) {
        self.start_time = Instant::now();
    }

    /// Returns the elapsed time since the stopwatch was started.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the elapsed time since the stopwatch was started in seconds as f64.
    #[inline]
    pub fn elapsed_secs_f64(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const SLEEP_DURATION_MS: u64 = 20;

    #[test]
    fn advance_scales_the_delta() {
        let clock = FrameClock::new();
        clock.set_time_scale(0.5);
        clock.advance(Duration::from_millis(100));

        assert_eq!(clock.frame_count(), 1);
        assert!((clock.unscaled_delta_time() - 0.1).abs() < 1e-6);
        assert!((clock.delta_time() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn stopwatch_measures_sleeps() {
        let mut watch = Stopwatch::new();
        thread::sleep(Duration::from_millis(SLEEP_DURATION_MS));
        assert!(watch.elapsed() >= Duration::from_millis(SLEEP_DURATION_MS));

        watch.restart();
        assert!(
            watch.elapsed() < Duration::from_millis(SLEEP_DURATION_MS),
            "restart should reset the measurement"
        );
    }
}
