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

//! Cooperative cancellation: a source that requests cancellation and cheap,
//! cloneable tokens that observe it.
//!
//! Callbacks registered on a token run exactly once, on the thread that calls
//! [`CancellationTokenSource::cancel`]. A callback registered on a token that
//! is already canceled runs immediately, inline.

use crate::collections::{Slab, SlabKey};
use crate::error::{TaskError, TaskResult};
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

type Callback = Box<dyn FnOnce() + Send>;

struct CancelState {
    canceled: AtomicBool,
    callbacks: Mutex<Slab<Callback>>,
    // Registrations on parent tokens, kept alive as long as a linked source exists.
    links: Mutex<Vec<CancellationRegistration>>,
}

impl CancelState {
    fn new(canceled: bool) -> Self {
        Self {
            canceled: AtomicBool::new(canceled),
            callbacks: Mutex::new(Slab::new()),
            links: Mutex::new(Vec::new()),
        }
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        if self.canceled.swap(true, Ordering::AcqRel) {
            return;
        }
        let callbacks = self.callbacks.lock().drain();
        log::trace!("Cancellation requested, running {} callback(s).", callbacks.len());
        for callback in callbacks {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
                let fault = crate::error::Fault::from_panic(payload);
                log::error!("A cancellation callback panicked: {fault}");
            }
        }
        self.links.lock().clear();
    }
}

/// Requests cancellation for every [`CancellationToken`] it hands out.
///
/// Cloning a source yields another handle to the same cancellation state.
#[derive(Clone)]
pub struct CancellationTokenSource {
    state: Arc<CancelState>,
}

impl Default for CancellationTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationTokenSource {
    /// Creates a source that has not been canceled.
    pub fn new() -> Self {
        Self {
            state: Arc::new(CancelState::new(false)),
        }
    }

    /// Creates a source that is canceled as soon as any of `parents` is.
    ///
    /// If a parent is already canceled the new source starts canceled.
    pub fn linked(parents: &[CancellationToken]) -> Self {
        let source = Self::new();
        let mut registrations = Vec::with_capacity(parents.len());
        for parent in parents {
            let child: Weak<CancelState> = Arc::downgrade(&source.state);
            registrations.push(parent.register(move || {
                if let Some(child) = child.upgrade() {
                    child.cancel();
                }
            }));
        }
        if !source.state.is_canceled() {
            source.state.links.lock().extend(registrations);
        }
        source
    }

    /// Returns a token observing this source.
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            state: Some(self.state.clone()),
        }
    }

    /// Requests cancellation. Only the first call runs the registered callbacks.
    pub fn cancel(&self) {
        self.state.cancel();
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancellation_requested(&self) -> bool {
        self.state.is_canceled()
    }
}

impl fmt::Debug for CancellationTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationTokenSource")
            .field("canceled", &self.state.is_canceled())
            .finish()
    }
}

/// Observes cancellation requested by a [`CancellationTokenSource`].
///
/// The default token ([`CancellationToken::none`]) can never be canceled.
#[derive(Clone, Default)]
pub struct CancellationToken {
    state: Option<Arc<CancelState>>,
}

impl CancellationToken {
    /// A token that is never canceled.
    pub fn none() -> Self {
        Self { state: None }
    }

    /// A token that is already canceled.
    pub fn canceled() -> Self {
        Self {
            state: Some(Arc::new(CancelState::new(true))),
        }
    }

    /// Returns `true` once the owning source has been canceled.
    pub fn is_cancellation_requested(&self) -> bool {
        self.state.as_ref().is_some_and(|state| state.is_canceled())
    }

    /// Returns `false` for [`CancellationToken::none`].
    pub fn can_be_canceled(&self) -> bool {
        self.state.is_some()
    }

    /// Returns an error bound to this token if cancellation was requested.
    pub fn error_if_canceled(&self) -> TaskResult<()> {
        if self.is_cancellation_requested() {
            Err(TaskError::canceled(self.clone()))
        } else {
            Ok(())
        }
    }

    /// Returns `true` if both tokens observe the same source.
    pub fn same_source(&self, other: &CancellationToken) -> bool {
        match (&self.state, &other.state) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Registers `callback` to run when cancellation is requested.
    ///
    /// Runs `callback` inline if the token is already canceled. Dropping the
    /// returned registration unregisters a callback that has not run yet.
    pub fn register<F>(&self, callback: F) -> CancellationRegistration
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(state) = &self.state else {
            return CancellationRegistration::default();
        };
        if state.is_canceled() {
            callback();
            return CancellationRegistration::default();
        }

        let mut callbacks = state.callbacks.lock();
        // `cancel` raises the flag before draining, so checking under the lock
        // guarantees the callback is either drained or run here.
        if state.is_canceled() {
            drop(callbacks);
            callback();
            return CancellationRegistration::default();
        }
        let key = callbacks.insert(Box::new(callback));
        CancellationRegistration {
            state: Arc::downgrade(state),
            key: Some(key),
        }
    }
}

impl PartialEq for CancellationToken {
    fn eq(&self, other: &Self) -> bool {
        self.same_source(other)
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("can_be_canceled", &self.can_be_canceled())
            .field("canceled", &self.is_cancellation_requested())
            .finish()
    }
}

/// A callback registration returned by [`CancellationToken::register`].
///
/// Unregisters the callback when dropped.
#[derive(Default)]
pub struct CancellationRegistration {
    state: Weak<CancelState>,
    key: Option<SlabKey>,
}

impl CancellationRegistration {
    /// Returns `true` if the callback is still waiting for cancellation.
    pub fn is_registered(&self) -> bool {
        match (self.key, self.state.upgrade()) {
            (Some(key), Some(state)) => state.callbacks.lock().contains(key),
            _ => false,
        }
    }

    /// Unregisters the callback now instead of on drop.
    pub fn unregister(&mut self) {
        if let Some(key) = self.key.take() {
            if let Some(state) = self.state.upgrade() {
                state.callbacks.lock().remove(key);
            }
        }
    }
}

impl Drop for CancellationRegistration {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl fmt::Debug for CancellationRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationRegistration")
            .field("registered", &self.key.is_some())
            .finish()
    }
}
