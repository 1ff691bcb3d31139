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

use crate::cancel::CancellationToken;
use crate::collections::{HandlerList, SlabKey};
use crate::error::{Fault, TaskError};
use crate::unobserved;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Receives the notifications of a [`TriggerEvent`].
pub trait TriggerHandler<T>: Send + Sync {
    /// A value was raised.
    fn on_next(&self, value: T);
    /// The event completed normally. No further notification follows.
    fn on_completed(&self);
    /// The event completed with an error. No further notification follows.
    fn on_error(&self, fault: Fault);
    /// The event was canceled. No further notification follows.
    fn on_canceled(&self, token: CancellationToken);
}

/// A shared handler reference, as stored by [`TriggerEvent`].
pub type SharedHandler<T> = Arc<dyn TriggerHandler<T>>;

#[derive(Clone)]
pub(crate) enum Terminal {
    Completed,
    Error(Fault),
    Canceled(CancellationToken),
}

impl Terminal {
    fn deliver<T>(&self, handler: &dyn TriggerHandler<T>) {
        match self {
            Terminal::Completed => handler.on_completed(),
            Terminal::Error(fault) => handler.on_error(fault.clone()),
            Terminal::Canceled(token) => handler.on_canceled(token.clone()),
        }
    }

    pub(crate) fn into_error(self) -> Option<TaskError> {
        match self {
            Terminal::Completed => None,
            Terminal::Error(fault) => Some(TaskError::Faulted(fault)),
            Terminal::Canceled(token) => Some(TaskError::canceled(token)),
        }
    }
}

/// Identifies a handler added with [`TriggerEvent::add`].
///
/// A handler added after the event was exhausted receives the terminal
/// notification immediately and gets an empty key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerKey(Option<SlabKey>);

impl HandlerKey {
    /// Returns `true` if the handler was linked into the event.
    pub fn is_linked(&self) -> bool {
        self.0.is_some()
    }
}

struct EventState<T> {
    handlers: HandlerList<SharedHandler<T>>,
    terminal: Option<Terminal>,
}

/// A multi-consumer event that bridges callback-style notifications into
/// awaitable consumers.
///
/// Values are delivered to handlers in attachment order. Handlers added
/// while a value is being delivered only see later values, and any handler may
/// be removed at any time, including from inside its own callback. The first
/// terminal notification exhausts the event: every handler receives it once
/// and is then dropped, and later `add` calls receive it immediately.
pub struct TriggerEvent<T> {
    state: Mutex<EventState<T>>,
}

impl<T: Clone + Send + 'static> Default for TriggerEvent<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> TriggerEvent<T> {
    /// Creates an event with no handlers.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EventState {
                handlers: HandlerList::new(),
                terminal: None,
            }),
        }
    }

    /// Attaches `handler` at the end of the delivery order.
    pub fn add(&self, handler: SharedHandler<T>) -> HandlerKey {
        let mut state = self.state.lock();
        let terminal = state.terminal.clone();
        if let Some(terminal) = terminal {
            drop(state);
            guarded("trigger-handler", || terminal.deliver(&*handler));
            return HandlerKey(None);
        }
        HandlerKey(Some(state.handlers.push_back(handler)))
    }

    /// Detaches a handler. Returns `false` if it was not linked.
    pub fn remove(&self, key: HandlerKey) -> bool {
        match key.0 {
            Some(key) => self.state.lock().handlers.remove(key).is_some(),
            None => false,
        }
    }

    /// Number of linked handlers.
    pub fn handler_count(&self) -> usize {
        self.state.lock().handlers.len()
    }

    /// Returns `true` once a terminal notification was raised.
    pub fn is_exhausted(&self) -> bool {
        self.state.lock().terminal.is_some()
    }

    /// Delivers `value` to every handler linked right now.
    pub fn set_result(&self, value: T) {
        let walk = {
            let mut state = self.state.lock();
            if state.terminal.is_some() {
                return;
            }
            state.handlers.begin_walk()
        };
        loop {
            // The lock is released around each callback so handlers may add or
            // remove handlers, including themselves.
            let next = self.state.lock().handlers.advance(walk);
            let Some(handler) = next else { break };
            let value = value.clone();
            guarded("trigger-handler", || handler.on_next(value));
        }
        self.state.lock().handlers.end_walk(walk);
    }

    /// Completes the event normally.
    pub fn set_completed(&self) -> bool {
        self.finish(Terminal::Completed)
    }

    /// Completes the event with an error.
    pub fn set_error(&self, fault: Fault) -> bool {
        self.finish(Terminal::Error(fault))
    }

    /// Completes the event as canceled by `token`.
    pub fn set_canceled(&self, token: CancellationToken) -> bool {
        self.finish(Terminal::Canceled(token))
    }

    fn finish(&self, terminal: Terminal) -> bool {
        let handlers = {
            let mut state = self.state.lock();
            if state.terminal.is_some() {
                return false;
            }
            state.terminal = Some(terminal.clone());
            let handlers = state.handlers.snapshot();
            state.handlers.clear();
            handlers
        };
        log::debug!("Trigger event exhausted, notifying {} handler(s).", handlers.len());
        for handler in handlers {
            guarded("trigger-handler", || terminal.deliver(&*handler));
        }
        true
    }
}

fn guarded(origin: &'static str, callback: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
        let fault = Fault::from_panic(payload);
        log::error!("A trigger handler panicked: {fault}");
        unobserved::report(TaskError::Faulted(fault), origin);
    }
}

impl<T> fmt::Debug for TriggerEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TriggerEvent")
            .field("handlers", &state.handlers.len())
            .field("exhausted", &state.terminal.is_some())
            .finish()
    }
}
