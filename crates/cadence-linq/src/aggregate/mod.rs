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

//! Aggregates: operations that consume a whole sequence into one task.
//!
//! Each aggregate starts its pass with [`spawn`], so the returned task is
//! already running. The enumerator is disposed whether the pass ends,
//! breaks early, or fails.

mod fold;

use cadence_core::enumerator::AsyncEnumerable;
use cadence_core::error::{InvalidOperation, TaskResult};
use cadence_core::{spawn, CancellationToken, Task};
use std::cmp::Ordering;
use std::ops::{Add, ControlFlow};

fn non_empty<T>(value: Option<T>) -> TaskResult<T> {
    value.ok_or_else(|| InvalidOperation::NoElements.into())
}

/// Aggregate methods available on every sendable [`AsyncEnumerable`].
pub trait AggregateExt: AsyncEnumerable + Sized + Send + 'static
where
    Self::Item: Send + 'static,
    Self::Enumerator: Send + 'static,
{
    /// Collects every element.
    fn to_vec(self, token: CancellationToken) -> Task<Vec<Self::Item>> {
        self.aggregate(
            Vec::new(),
            |mut items, item| {
                items.push(item);
                items
            },
            token,
        )
    }

    /// The first element. Fails with [`InvalidOperation::NoElements`] on an
    /// empty sequence.
    fn first(self, token: CancellationToken) -> Task<Self::Item> {
        spawn(async move {
            let enumerator = self.get_async_enumerator(token);
            let first = fold::fold_while(enumerator, None, |_, item| {
                Ok(ControlFlow::Break(Some(item)))
            })
            .await?;
            non_empty(first)
        })
    }

    /// The last element. Fails with [`InvalidOperation::NoElements`] on an
    /// empty sequence.
    fn last(self, token: CancellationToken) -> Task<Self::Item> {
        spawn(async move {
            let enumerator = self.get_async_enumerator(token);
            let last = fold::fold_while(enumerator, None, |_, item| {
                Ok(ControlFlow::Continue(Some(item)))
            })
            .await?;
            non_empty(last)
        })
    }

    /// The number of elements.
    fn count(self, token: CancellationToken) -> Task<usize> {
        self.aggregate(0, |count, _| count + 1, token)
    }

    /// Whether any element matches. Stops at the first match.
    fn any<F>(self, mut predicate: F, token: CancellationToken) -> Task<bool>
    where
        F: FnMut(&Self::Item) -> bool + Send + 'static,
    {
        spawn(async move {
            let enumerator = self.get_async_enumerator(token);
            fold::fold_while(enumerator, false, move |_, item| {
                Ok(if predicate(&item) {
                    ControlFlow::Break(true)
                } else {
                    ControlFlow::Continue(false)
                })
            })
            .await
        })
    }

    /// Whether every element matches. Stops at the first mismatch.
    fn all<F>(self, mut predicate: F, token: CancellationToken) -> Task<bool>
    where
        F: FnMut(&Self::Item) -> bool + Send + 'static,
    {
        spawn(async move {
            let enumerator = self.get_async_enumerator(token);
            fold::fold_while(enumerator, true, move |_, item| {
                Ok(if predicate(&item) {
                    ControlFlow::Continue(true)
                } else {
                    ControlFlow::Break(false)
                })
            })
            .await
        })
    }

    /// Whether an element equals `value`.
    fn contains(self, value: Self::Item, token: CancellationToken) -> Task<bool>
    where
        Self::Item: PartialEq,
    {
        self.any(move |item| *item == value, token)
    }

    /// Folds every element into `seed`.
    fn aggregate<A, F>(self, seed: A, mut folder: F, token: CancellationToken) -> Task<A>
    where
        A: Send + 'static,
        F: FnMut(A, Self::Item) -> A + Send + 'static,
    {
        spawn(async move {
            let enumerator = self.get_async_enumerator(token);
            fold::fold_while(enumerator, seed, move |accumulator, item| {
                Ok(ControlFlow::Continue(folder(accumulator, item)))
            })
            .await
        })
    }

    /// Adds up the elements, starting from `Default::default()`.
    fn sum(self, token: CancellationToken) -> Task<Self::Item>
    where
        Self::Item: Default + Add<Output = Self::Item>,
    {
        self.aggregate(Self::Item::default(), |total, item| total + item, token)
    }

    /// The smallest element; the earliest wins among equals. Fails with
    /// [`InvalidOperation::NoElements`] on an empty sequence.
    fn min(self, token: CancellationToken) -> Task<Self::Item>
    where
        Self::Item: PartialOrd,
    {
        spawn(async move {
            let enumerator = self.get_async_enumerator(token);
            let min = fold::fold_while(enumerator, None, |best, item| {
                Ok(ControlFlow::Continue(match best {
                    Some(best) if item.partial_cmp(&best) != Some(Ordering::Less) => Some(best),
                    _ => Some(item),
                }))
            })
            .await?;
            non_empty(min)
        })
    }

    /// The largest element; the earliest wins among equals. Fails with
    /// [`InvalidOperation::NoElements`] on an empty sequence.
    fn max(self, token: CancellationToken) -> Task<Self::Item>
    where
        Self::Item: PartialOrd,
    {
        spawn(async move {
            let enumerator = self.get_async_enumerator(token);
            let max = fold::fold_while(enumerator, None, |best, item| {
                Ok(ControlFlow::Continue(match best {
                    Some(best) if item.partial_cmp(&best) != Some(Ordering::Greater) => {
                        Some(best)
                    }
                    _ => Some(item),
                }))
            })
            .await?;
            non_empty(max)
        })
    }

    /// Runs `action` on every element.
    fn for_each<F>(self, mut action: F, token: CancellationToken) -> Task<()>
    where
        F: FnMut(Self::Item) + Send + 'static,
    {
        self.aggregate((), move |(), item| action(item), token)
    }

    /// Awaits `action` on every element, one element at a time.
    fn for_each_await<F>(self, action: F, token: CancellationToken) -> Task<()>
    where
        F: FnMut(Self::Item) -> Task<()> + Send + 'static,
    {
        spawn(async move {
            let enumerator = self.get_async_enumerator(token);
            fold::for_each_await(enumerator, action).await
        })
    }
}

impl<S> AggregateExt for S
where
    S: AsyncEnumerable + Send + 'static,
    S::Item: Send + 'static,
    S::Enumerator: Send + 'static,
{
}
