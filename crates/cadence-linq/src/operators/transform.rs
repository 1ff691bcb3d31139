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

//! Element-wise stages behind the projection, filtering and windowing
//! operators.

use super::stage::{Stage, Step};
use cadence_core::error::{TaskError, TaskResult};
use cadence_core::CancellationToken;

/// Stage of `select`.
pub struct Select<F> {
    pub(crate) selector: F,
}

impl<In, U, F> Stage<In> for Select<F>
where
    F: FnMut(In) -> U,
{
    type Out = U;

    fn on_next(&mut self, item: In) -> TaskResult<Step<U>> {
        Ok(Step::Yield((self.selector)(item)))
    }
}

/// Stage of `select_with_index`.
pub struct SelectWithIndex<F> {
    pub(crate) selector: F,
    pub(crate) index: usize,
}

impl<In, U, F> Stage<In> for SelectWithIndex<F>
where
    F: FnMut(In, usize) -> U,
{
    type Out = U;

    fn on_next(&mut self, item: In) -> TaskResult<Step<U>> {
        let index = self.index;
        self.index += 1;
        Ok(Step::Yield((self.selector)(item, index)))
    }
}

/// Stage of `where_`.
pub struct Where<F> {
    pub(crate) predicate: F,
}

impl<In, F> Stage<In> for Where<F>
where
    F: FnMut(&In) -> bool,
{
    type Out = In;

    fn on_next(&mut self, item: In) -> TaskResult<Step<In>> {
        Ok(if (self.predicate)(&item) {
            Step::Yield(item)
        } else {
            Step::Skip
        })
    }
}

/// Stage of `skip`.
pub struct Skip {
    pub(crate) remaining: usize,
}

impl<In> Stage<In> for Skip {
    type Out = In;

    fn on_next(&mut self, item: In) -> TaskResult<Step<In>> {
        if self.remaining > 0 {
            self.remaining -= 1;
            return Ok(Step::Skip);
        }
        Ok(Step::Yield(item))
    }
}

/// Stage of `skip_while`.
pub struct SkipWhile<F> {
    pub(crate) predicate: F,
    pub(crate) skipping: bool,
}

impl<In, F> Stage<In> for SkipWhile<F>
where
    F: FnMut(&In) -> bool,
{
    type Out = In;

    fn on_next(&mut self, item: In) -> TaskResult<Step<In>> {
        if self.skipping && (self.predicate)(&item) {
            return Ok(Step::Skip);
        }
        self.skipping = false;
        Ok(Step::Yield(item))
    }
}

/// Stage of `skip_until_canceled`: drops elements until its token fires.
pub struct SkipUntilCanceled {
    pub(crate) token: CancellationToken,
}

impl<In> Stage<In> for SkipUntilCanceled {
    type Out = In;

    fn on_next(&mut self, item: In) -> TaskResult<Step<In>> {
        Ok(if self.token.is_cancellation_requested() {
            Step::Yield(item)
        } else {
            Step::Skip
        })
    }
}

/// Stage of `take`.
pub struct Take {
    pub(crate) remaining: usize,
}

impl<In> Stage<In> for Take {
    type Out = In;

    fn on_next(&mut self, item: In) -> TaskResult<Step<In>> {
        if self.remaining == 0 {
            return Ok(Step::Stop);
        }
        self.remaining -= 1;
        Ok(Step::Yield(item))
    }

    fn is_finished(&self) -> bool {
        self.remaining == 0
    }
}

/// Stage of `take_while`.
pub struct TakeWhile<F> {
    pub(crate) predicate: F,
}

impl<In, F> Stage<In> for TakeWhile<F>
where
    F: FnMut(&In) -> bool,
{
    type Out = In;

    fn on_next(&mut self, item: In) -> TaskResult<Step<In>> {
        Ok(if (self.predicate)(&item) {
            Step::Yield(item)
        } else {
            Step::Stop
        })
    }
}

/// Stage of `distinct_until_changed`.
pub struct DistinctUntilChanged<T> {
    pub(crate) last: Option<T>,
}

impl<T: PartialEq + Clone> Stage<T> for DistinctUntilChanged<T> {
    type Out = T;

    fn on_next(&mut self, item: T) -> TaskResult<Step<T>> {
        if self.last.as_ref() == Some(&item) {
            return Ok(Step::Skip);
        }
        self.last = Some(item.clone());
        Ok(Step::Yield(item))
    }
}

/// Stage of `buffer`: groups elements into chunks of `count`.
///
/// The trailing partial chunk is emitted when the upstream ends.
pub struct Buffer<T> {
    pub(crate) count: usize,
    pub(crate) chunk: Vec<T>,
}

impl<T> Stage<T> for Buffer<T> {
    type Out = Vec<T>;

    fn on_next(&mut self, item: T) -> TaskResult<Step<Vec<T>>> {
        if self.count == 0 {
            return Err(TaskError::InvalidArgument(
                "buffer count must be at least 1".to_string(),
            ));
        }
        self.chunk.push(item);
        if self.chunk.len() < self.count {
            return Ok(Step::Skip);
        }
        Ok(Step::Yield(std::mem::replace(
            &mut self.chunk,
            Vec::with_capacity(self.count),
        )))
    }

    fn on_completed(&mut self) -> Option<Vec<T>> {
        (!self.chunk.is_empty()).then(|| std::mem::take(&mut self.chunk))
    }
}

/// Stage of `pairwise`: emits each element with its predecessor.
pub struct Pairwise<T> {
    pub(crate) previous: Option<T>,
}

impl<T: Clone> Stage<T> for Pairwise<T> {
    type Out = (T, T);

    fn on_next(&mut self, item: T) -> TaskResult<Step<(T, T)>> {
        match self.previous.replace(item.clone()) {
            Some(previous) => Ok(Step::Yield((previous, item))),
            None => Ok(Step::Skip),
        }
    }
}

/// Stage of `scan`: emits every intermediate accumulator.
pub struct Scan<A, F> {
    pub(crate) accumulator: A,
    pub(crate) folder: F,
}

impl<In, A, F> Stage<In> for Scan<A, F>
where
    A: Clone,
    F: FnMut(&A, In) -> A,
{
    type Out = A;

    fn on_next(&mut self, item: In) -> TaskResult<Step<A>> {
        self.accumulator = (self.folder)(&self.accumulator, item);
        Ok(Step::Yield(self.accumulator.clone()))
    }
}

/// Stage of `do_on_next`.
pub struct DoOnNext<F> {
    pub(crate) action: F,
}

impl<In, F> Stage<In> for DoOnNext<F>
where
    F: FnMut(&In),
{
    type Out = In;

    fn on_next(&mut self, item: In) -> TaskResult<Step<In>> {
        (self.action)(&item);
        Ok(Step::Yield(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_reports_finished_before_pulling_past_its_count() {
        let mut take = Take { remaining: 1 };
        assert!(!Stage::<u8>::is_finished(&take));
        assert_eq!(take.on_next(7u8).unwrap(), Step::Yield(7));
        assert!(Stage::<u8>::is_finished(&take));
    }

    #[test]
    fn buffer_flushes_the_partial_chunk_on_completion() {
        let mut buffer = Buffer {
            count: 3,
            chunk: Vec::new(),
        };
        assert_eq!(buffer.on_next(1).unwrap(), Step::Skip);
        assert_eq!(buffer.on_next(2).unwrap(), Step::Skip);
        assert_eq!(buffer.on_completed(), Some(vec![1, 2]));
        assert_eq!(buffer.on_completed(), None);
    }

    #[test]
    fn skip_while_stops_checking_after_the_first_miss() {
        let mut stage = SkipWhile {
            predicate: |x: &i32| *x < 3,
            skipping: true,
        };
        assert_eq!(stage.on_next(1).unwrap(), Step::Skip);
        assert_eq!(stage.on_next(4).unwrap(), Step::Yield(4));
        assert_eq!(stage.on_next(1).unwrap(), Step::Yield(1));
    }
}
