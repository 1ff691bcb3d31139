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

//! Frame and time driven tick sequences.

use super::signal::{LoopSequence, LoopSource, Signal};
use cadence_core::CancellationToken;
use cadence_loop::{
    DelayType, FrameClock, PlayerLoopHandle, PlayerLoopItem, PlayerLoopTiming, Stopwatch,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
enum Span {
    Time(Duration),
    Frames(u32),
}

/// Sequence returned by the tick factories; yields `()` per tick.
pub type Ticker = LoopSequence<TickerSource>;

/// The [`LoopSource`] behind [`Ticker`].
pub struct TickerSource {
    handle: PlayerLoopHandle,
    timing: PlayerLoopTiming,
    delay_type: DelayType,
    due: Span,
    period: Option<Span>,
}

impl LoopSource for TickerSource {
    type Item = ();

    fn start(self, signal: Arc<Signal<()>>, token: CancellationToken) {
        let initial_frame = self.handle.clock().frame_count();
        log::trace!("Starting a ticker in {}.", self.timing);
        self.handle.add_action(
            self.timing,
            Arc::new(TickItem {
                signal,
                token,
                delay_type: self.delay_type,
                period: self.period,
                measure: Mutex::new(Measure {
                    span: self.due,
                    elapsed: 0.0,
                    frames: 0,
                    stopwatch: Stopwatch::new(),
                    initial_frame,
                }),
            }),
        );
    }
}

struct Measure {
    span: Span,
    elapsed: f32,
    frames: u32,
    stopwatch: Stopwatch,
    initial_frame: u64,
}

impl Measure {
    fn reset(&mut self, span: Span, frame: u64) {
        self.span = span;
        self.elapsed = 0.0;
        self.frames = 0;
        self.stopwatch.restart();
        self.initial_frame = frame;
    }

    /// Returns `true` once the current span has passed. The frame the
    /// measurement started on never counts.
    fn advance(&mut self, delay_type: DelayType, clock: &FrameClock) -> bool {
        let creation_frame = clock.frame_count() == self.initial_frame;
        match self.span {
            Span::Frames(0) => true,
            Span::Frames(frames) => {
                if creation_frame {
                    return false;
                }
                self.frames += 1;
                self.frames >= frames
            }
            Span::Time(duration) => match delay_type {
                DelayType::Realtime => self.stopwatch.elapsed() >= duration,
                DelayType::DeltaTime | DelayType::UnscaledDeltaTime => {
                    if self.elapsed == 0.0 && creation_frame {
                        return false;
                    }
                    self.elapsed += if delay_type == DelayType::DeltaTime {
                        clock.delta_time()
                    } else {
                        clock.unscaled_delta_time()
                    };
                    self.elapsed >= duration.as_secs_f32()
                }
            },
        }
    }
}

struct TickItem {
    signal: Arc<Signal<()>>,
    token: CancellationToken,
    delay_type: DelayType,
    period: Option<Span>,
    measure: Mutex<Measure>,
}

impl PlayerLoopItem for TickItem {
    fn move_next(&self, clock: &FrameClock) -> bool {
        if self.signal.is_stopped() {
            return false;
        }
        if self.token.is_cancellation_requested() {
            self.signal.complete();
            return false;
        }
        let periodic = {
            let mut measure = self.measure.lock();
            if !measure.advance(self.delay_type, clock) {
                return true;
            }
            if let Some(period) = self.period {
                measure.reset(period, clock.frame_count());
            }
            self.period.is_some()
        };
        self.signal.publish(());
        if !periodic {
            self.signal.complete();
        }
        periodic
    }
}

fn ticker(
    handle: &PlayerLoopHandle,
    timing: PlayerLoopTiming,
    delay_type: DelayType,
    due: Span,
    period: Option<Span>,
) -> Ticker {
    LoopSequence::new(TickerSource {
        handle: handle.clone(),
        timing,
        delay_type,
        due,
        period,
    })
}

/// Yields once per frame in `timing`, starting with the frame after the
/// first pull.
pub fn every_update(handle: &PlayerLoopHandle, timing: PlayerLoopTiming) -> Ticker {
    interval_frame(handle, 1, timing)
}

/// Yields every `period`, measured on the clock chosen by `delay_type`.
pub fn interval(
    handle: &PlayerLoopHandle,
    period: Duration,
    delay_type: DelayType,
    timing: PlayerLoopTiming,
) -> Ticker {
    ticker(
        handle,
        timing,
        delay_type,
        Span::Time(period),
        Some(Span::Time(period)),
    )
}

/// Yields every `frames` frames.
pub fn interval_frame(handle: &PlayerLoopHandle, frames: u32, timing: PlayerLoopTiming) -> Ticker {
    ticker(
        handle,
        timing,
        DelayType::DeltaTime,
        Span::Frames(frames),
        Some(Span::Frames(frames)),
    )
}

/// Yields once after `due`, then every `period` if one is given.
pub fn timer(
    handle: &PlayerLoopHandle,
    due: Duration,
    period: Option<Duration>,
    delay_type: DelayType,
    timing: PlayerLoopTiming,
) -> Ticker {
    ticker(
        handle,
        timing,
        delay_type,
        Span::Time(due),
        period.map(Span::Time),
    )
}

/// Yields once after `due` frames, then every `period` frames if one is
/// given.
pub fn timer_frame(
    handle: &PlayerLoopHandle,
    due: u32,
    period: Option<u32>,
    timing: PlayerLoopTiming,
) -> Ticker {
    ticker(
        handle,
        timing,
        DelayType::DeltaTime,
        Span::Frames(due),
        period.map(Span::Frames),
    )
}
