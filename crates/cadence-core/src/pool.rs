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

//! Recycling pools for promise nodes.
//!
//! Every pooled promise type owns one process-wide [`TaskPool`], obtained with
//! [`shared`]. A node is cleared before it is stored, so a popped node never
//! exposes the state of its previous use. The number of idle nodes per pool is
//! capped by a global limit, see [`set_max_pool_size`].

use crossbeam_queue::SegQueue;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Weak};

/// Default cap on idle nodes kept by each pool.
pub const DEFAULT_MAX_POOL_SIZE: usize = 1024;

static MAX_POOL_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_POOL_SIZE);

static METERS: Mutex<Vec<Weak<PoolMeter>>> = Mutex::new(Vec::new());

static SHARED_POOLS: LazyLock<Mutex<HashMap<TypeId, &'static (dyn Any + Send + Sync)>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// A node that can be returned to a [`TaskPool`] and reused.
pub trait Poolable: Send + Sync + 'static {
    /// Resets the node to its freshly-created state.
    ///
    /// Called exactly once each time the node enters the pool.
    fn clear(&self);
}

/// Sets the global cap on idle nodes kept by each pool.
///
/// Shrinking the cap does not evict nodes already pooled; pools drain down to
/// the new size as nodes are popped.
pub fn set_max_pool_size(size: usize) {
    MAX_POOL_SIZE.store(size, Ordering::Relaxed);
    log::debug!("Task pool size limit set to {size}.");
}

/// Returns the global cap on idle nodes kept by each pool.
pub fn max_pool_size() -> usize {
    MAX_POOL_SIZE.load(Ordering::Relaxed)
}

/// Reports the number of idle nodes held by every live pool.
pub fn size_info() -> Vec<(&'static str, usize)> {
    let mut meters = METERS.lock();
    meters.retain(|meter| meter.strong_count() > 0);
    meters
        .iter()
        .filter_map(Weak::upgrade)
        .map(|meter| (meter.name, meter.len.load(Ordering::Relaxed)))
        .collect()
}

/// Returns the process-wide pool for `T`, creating it on first use.
pub fn shared<T: Poolable>() -> &'static TaskPool<T> {
    let mut pools = SHARED_POOLS.lock();
    let entry = pools.entry(TypeId::of::<T>()).or_insert_with(|| {
        let pool: &'static TaskPool<T> =
            Box::leak(Box::new(TaskPool::new(std::any::type_name::<T>())));
        pool
    });
    match entry.downcast_ref::<TaskPool<T>>() {
        Some(pool) => pool,
        None => unreachable!("pool registry entries are keyed by their own TypeId"),
    }
}

struct PoolMeter {
    name: &'static str,
    len: AtomicUsize,
}

/// A lock-free stack of idle nodes of one type.
pub struct TaskPool<T: Poolable> {
    items: SegQueue<Arc<T>>,
    meter: Arc<PoolMeter>,
}

impl<T: Poolable> TaskPool<T> {
    /// Creates an empty pool, reported as `name` by [`size_info`].
    pub fn new(name: &'static str) -> Self {
        let meter = Arc::new(PoolMeter {
            name,
            len: AtomicUsize::new(0),
        });
        METERS.lock().push(Arc::downgrade(&meter));
        Self {
            items: SegQueue::new(),
            meter,
        }
    }

    /// Takes an idle node, if any.
    pub fn try_pop(&self) -> Option<Arc<T>> {
        let item = self.items.pop()?;
        self.meter.len.fetch_sub(1, Ordering::AcqRel);
        Some(item)
    }

    /// Clears `item` and stores it for reuse.
    ///
    /// Returns `false` (dropping the node) when the pool is already at the
    /// global cap.
    pub fn try_push(&self, item: Arc<T>) -> bool {
        let max = max_pool_size();
        if self.meter.len.fetch_add(1, Ordering::AcqRel) >= max {
            self.meter.len.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        item.clear();
        self.items.push(item);
        true
    }

    /// Number of idle nodes.
    pub fn len(&self) -> usize {
        self.meter.len.load(Ordering::Acquire)
    }

    /// Returns `true` when no node is idle.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
