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

//! Sequence operators, exposed through [`AsyncEnumerableExt`].

mod await_ops;
mod combine;
mod stage;
mod take_until;
mod transform;

pub use self::await_ops::{AwaitEnumerator, AwaitStage, Awaited, SelectAwait, WhereAwait};
pub use self::combine::{Concat, ConcatEnumerator, Merge, MergeEnumerator, Zip, ZipEnumerator};
pub use self::stage::{Stage, StageEnumerator, Staged, Step};
pub use self::take_until::{
    TakeUntil, TakeUntilCanceled, TakeUntilCanceledEnumerator, TakeUntilEnumerator,
};
pub use self::transform::{
    Buffer, DistinctUntilChanged, DoOnNext, Pairwise, Scan, Select, SelectWithIndex, Skip,
    SkipUntilCanceled, SkipWhile, Take, TakeWhile, Where,
};

use cadence_core::enumerator::AsyncEnumerable;
use cadence_core::{CancellationToken, Task};

/// Operator methods available on every [`AsyncEnumerable`].
///
/// Operators are lazy: nothing is pulled until the resulting sequence is
/// enumerated, and the pull token given to `get_async_enumerator` flows to
/// every upstream.
pub trait AsyncEnumerableExt: AsyncEnumerable + Sized {
    /// Projects each element.
    fn select<U, F>(self, selector: F) -> Staged<Self, Select<F>>
    where
        F: FnMut(Self::Item) -> U,
    {
        Staged::new(self, Select { selector })
    }

    /// Projects each element together with its zero-based index.
    fn select_with_index<U, F>(self, selector: F) -> Staged<Self, SelectWithIndex<F>>
    where
        F: FnMut(Self::Item, usize) -> U,
    {
        Staged::new(self, SelectWithIndex { selector, index: 0 })
    }

    /// Projects each element through a task, one element at a time.
    fn select_await<U, F>(self, selector: F) -> Awaited<Self, SelectAwait<F>>
    where
        F: FnMut(Self::Item) -> Task<U>,
    {
        Awaited::new(self, SelectAwait { selector })
    }

    /// Keeps the elements matching `predicate`.
    fn where_<F>(self, predicate: F) -> Staged<Self, Where<F>>
    where
        F: FnMut(&Self::Item) -> bool,
    {
        Staged::new(self, Where { predicate })
    }

    /// Keeps the elements whose predicate task resolves to `true`.
    fn where_await<F>(self, predicate: F) -> Awaited<Self, WhereAwait<F>>
    where
        F: FnMut(&Self::Item) -> Task<bool>,
    {
        Awaited::new(self, WhereAwait { predicate })
    }

    /// Drops the first `count` elements.
    fn skip(self, count: usize) -> Staged<Self, Skip> {
        Staged::new(self, Skip { remaining: count })
    }

    /// Drops elements while `predicate` holds.
    fn skip_while<F>(self, predicate: F) -> Staged<Self, SkipWhile<F>>
    where
        F: FnMut(&Self::Item) -> bool,
    {
        Staged::new(
            self,
            SkipWhile {
                predicate,
                skipping: true,
            },
        )
    }

    /// Drops elements until `token` is canceled.
    fn skip_until_canceled(self, token: CancellationToken) -> Staged<Self, SkipUntilCanceled> {
        Staged::new(self, SkipUntilCanceled { token })
    }

    /// Keeps the first `count` elements. `take(0)` never starts the source.
    fn take(self, count: usize) -> Staged<Self, Take> {
        Staged::new(self, Take { remaining: count })
    }

    /// Keeps elements while `predicate` holds, then ends.
    fn take_while<F>(self, predicate: F) -> Staged<Self, TakeWhile<F>>
    where
        F: FnMut(&Self::Item) -> bool,
    {
        Staged::new(self, TakeWhile { predicate })
    }

    /// Ends the sequence when `other` completes.
    fn take_until(self, other: Task<()>) -> TakeUntil<Self> {
        TakeUntil::new(self, other)
    }

    /// Ends the sequence, without an error, when `token` is canceled.
    fn take_until_canceled(self, token: CancellationToken) -> TakeUntilCanceled<Self> {
        TakeUntilCanceled::new(self, token)
    }

    /// Drops elements equal to their predecessor.
    fn distinct_until_changed(self) -> Staged<Self, DistinctUntilChanged<Self::Item>>
    where
        Self::Item: PartialEq + Clone,
    {
        Staged::new(self, DistinctUntilChanged { last: None })
    }

    /// Groups elements into vectors of `count`; the last one may be shorter.
    ///
    /// A `count` of zero fails the first pull with
    /// [`TaskError::InvalidArgument`](cadence_core::TaskError::InvalidArgument).
    fn buffer(self, count: usize) -> Staged<Self, Buffer<Self::Item>> {
        Staged::new(
            self,
            Buffer {
                count,
                chunk: Vec::with_capacity(count),
            },
        )
    }

    /// Emits `(previous, current)` for every element after the first.
    fn pairwise(self) -> Staged<Self, Pairwise<Self::Item>>
    where
        Self::Item: Clone,
    {
        Staged::new(self, Pairwise { previous: None })
    }

    /// Folds the sequence, emitting every intermediate accumulator.
    fn scan<A, F>(self, seed: A, folder: F) -> Staged<Self, Scan<A, F>>
    where
        A: Clone,
        F: FnMut(&A, Self::Item) -> A,
    {
        Staged::new(
            self,
            Scan {
                accumulator: seed,
                folder,
            },
        )
    }

    /// Runs `action` on each element as it passes through.
    fn do_on_next<F>(self, action: F) -> Staged<Self, DoOnNext<F>>
    where
        F: FnMut(&Self::Item),
    {
        Staged::new(self, DoOnNext { action })
    }

    /// Continues with the elements of `second` once this sequence ends.
    fn concat<B>(self, second: B) -> Concat<Self, B>
    where
        B: AsyncEnumerable<Item = Self::Item>,
    {
        Concat::new(self, second)
    }

    /// Interleaves the elements of both sequences as they become available.
    fn merge<B>(self, other: B) -> Merge<Self, B>
    where
        B: AsyncEnumerable<Item = Self::Item>,
    {
        Merge::new(self, other)
    }

    /// Pairs elements of both sequences in lockstep.
    fn zip<B>(self, other: B) -> Zip<Self, B>
    where
        B: AsyncEnumerable,
    {
        Zip::new(self, other)
    }
}

impl<S: AsyncEnumerable> AsyncEnumerableExt for S {}
