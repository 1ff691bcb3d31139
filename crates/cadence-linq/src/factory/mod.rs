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

//! Sequence factories.
//!
//! The synchronous ones ([`range`], [`from_iter`], ...) complete every pull
//! inline. The loop-driven ones ([`every_update`], [`interval`], [`timer`],
//! [`every_value_changed`]) register a player-loop item on their first pull
//! and yield from inside the phase they were scheduled on.

mod iter;
mod signal;
mod special;
mod ticker;
mod value_changed;

pub use self::iter::{
    empty, from_iter, range, repeat, return_value, EmptySequence, FromIter, IterEnumerator, Range,
    RepeatN, ReturnValue,
};
pub use self::signal::{LoopSequence, LoopSequenceEnumerator, LoopSource, Signal};
pub use self::special::{never, throw, Never, NeverEnumerator, Throw, ThrowEnumerator};
pub use self::ticker::{
    every_update, interval, interval_frame, timer, timer_frame, Ticker, TickerSource,
};
pub use self::value_changed::{every_value_changed, EveryValueChanged, ValueChangedSource};
