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

use cadence_core::enumerator::{AsyncEnumerator, AsyncEnumeratorExt};
use cadence_core::error::TaskResult;
use cadence_core::Task;
use std::ops::ControlFlow;

async fn drive<E, A, F>(enumerator: &mut E, mut accumulator: A, step: &mut F) -> TaskResult<A>
where
    E: AsyncEnumerator,
    F: FnMut(A, E::Item) -> TaskResult<ControlFlow<A, A>>,
{
    while let Some(item) = enumerator.next_async().await? {
        match step(accumulator, item)? {
            ControlFlow::Continue(next) => accumulator = next,
            ControlFlow::Break(done) => return Ok(done),
        }
    }
    Ok(accumulator)
}

/// Folds `enumerator` until `step` breaks or the sequence ends, then
/// disposes it.
///
/// The enumerator is disposed on every path. A failure while folding wins
/// over a failure while disposing.
pub(crate) async fn fold_while<E, A, F>(mut enumerator: E, seed: A, mut step: F) -> TaskResult<A>
where
    E: AsyncEnumerator,
    F: FnMut(A, E::Item) -> TaskResult<ControlFlow<A, A>>,
{
    let outcome = drive(&mut enumerator, seed, &mut step).await;
    let disposed = enumerator.dispose_async().await;
    let value = outcome?;
    disposed?;
    Ok(value)
}

async fn drive_await<E, F>(enumerator: &mut E, action: &mut F) -> TaskResult<()>
where
    E: AsyncEnumerator,
    F: FnMut(E::Item) -> Task<()>,
{
    while let Some(item) = enumerator.next_async().await? {
        action(item).await?;
    }
    Ok(())
}

/// Awaits `action` for each element in turn, then disposes the enumerator.
pub(crate) async fn for_each_await<E, F>(mut enumerator: E, mut action: F) -> TaskResult<()>
where
    E: AsyncEnumerator,
    F: FnMut(E::Item) -> Task<()>,
{
    let outcome = drive_await(&mut enumerator, &mut action).await;
    let disposed = enumerator.dispose_async().await;
    outcome?;
    disposed
}
