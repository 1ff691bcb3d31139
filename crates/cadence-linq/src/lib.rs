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

//! # Cadence Linq
//!
//! Query operators over the asynchronous sequence protocol of
//! [`cadence_core::enumerator`].
//!
//! Sequences are built from the [`factory`] functions, chained with the
//! lazy operators of [`AsyncEnumerableExt`] and consumed either by pulling
//! an enumerator by hand or with the task-returning [`AggregateExt`]
//! methods:
//!
//! ```
//! use cadence_core::CancellationToken;
//! use cadence_linq::prelude::*;
//!
//! let evens = range(0, 5)
//!     .unwrap()
//!     .where_(|x| x % 2 == 0)
//!     .to_vec(CancellationToken::none());
//! assert_eq!(evens.get_result().unwrap(), vec![0, 2, 4]);
//! ```

#![warn(missing_docs)]

pub mod aggregate;
pub mod factory;
pub mod operators;
mod upstream;

pub use aggregate::AggregateExt;
pub use operators::AsyncEnumerableExt;

/// Commonly used factories and extension traits.
pub mod prelude {
    pub use crate::aggregate::AggregateExt;
    pub use crate::factory::{
        empty, every_update, every_value_changed, from_iter, interval, interval_frame, never,
        range, repeat, return_value, throw, timer, timer_frame,
    };
    pub use crate::operators::AsyncEnumerableExt;
    pub use cadence_core::enumerator::{AsyncEnumerable, AsyncEnumerator, AsyncEnumeratorExt};
}
