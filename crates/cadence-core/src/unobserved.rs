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

//! A process-wide bus for errors that no awaiter ever read.
//!
//! Sources report here when a faulted version is reset or dropped without its
//! error being read, when a forgotten task fails, and when the scheduler
//! swallows a panic. Subscribers receive every report over a [`flume`]
//! channel; an optional handler is called synchronously. With neither
//! installed, reports are logged with `log::error!`.
//!
//! Canceled outcomes are dropped unless
//! [`set_propagate_cancellation(true)`](set_propagate_cancellation) was called.

use crate::error::{Fault, TaskError};
use parking_lot::{Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An error reported to the bus.
#[derive(Debug, Clone)]
pub struct UnobservedFault {
    /// The error nobody read.
    pub error: TaskError,
    /// Where the report originated, e.g. `"completion-source-drop"`.
    pub origin: &'static str,
}

type Handler = Arc<dyn Fn(&UnobservedFault) + Send + Sync>;

static SUBSCRIBERS: Mutex<Vec<flume::Sender<UnobservedFault>>> = Mutex::new(Vec::new());
static HANDLER: RwLock<Option<Handler>> = RwLock::new(None);
static PROPAGATE_CANCELLATION: AtomicBool = AtomicBool::new(false);

/// Returns a receiver for every future report.
///
/// Dropping the receiver unsubscribes it on the next report.
pub fn subscribe() -> flume::Receiver<UnobservedFault> {
    let (sender, receiver) = flume::unbounded();
    SUBSCRIBERS.lock().push(sender);
    receiver
}

/// Installs a handler called synchronously for every report, replacing the
/// previous one.
pub fn set_handler<F>(handler: F)
where
    F: Fn(&UnobservedFault) + Send + Sync + 'static,
{
    *HANDLER.write() = Some(Arc::new(handler));
}

/// Removes the installed handler.
pub fn clear_handler() {
    *HANDLER.write() = None;
}

/// Chooses whether canceled outcomes are reported.
pub fn set_propagate_cancellation(propagate: bool) {
    PROPAGATE_CANCELLATION.store(propagate, Ordering::Relaxed);
}

/// Returns `true` if canceled outcomes are reported.
pub fn propagate_cancellation() -> bool {
    PROPAGATE_CANCELLATION.load(Ordering::Relaxed)
}

/// Reports an error that no awaiter read.
///
/// A panicking handler is logged and never unwinds into the caller, which is
/// often a scheduler drain.
///
/// ## Arguments
/// * `error` - The unread error.
/// * `origin` - A short static label naming the reporting site.
pub fn report(error: TaskError, origin: &'static str) {
    if error.is_canceled() && !propagate_cancellation() {
        log::trace!("Dropping an unobserved cancellation from {origin}.");
        return;
    }
    let fault = UnobservedFault { error, origin };

    let delivered = {
        let mut subscribers = SUBSCRIBERS.lock();
        subscribers.retain(|sender| sender.send(fault.clone()).is_ok());
        !subscribers.is_empty()
    };

    let handler = HANDLER.read().clone();
    match handler {
        Some(handler) => {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(&fault))) {
                log::error!(
                    "Unobserved fault handler panicked on a report from {}: {}",
                    fault.origin,
                    Fault::from_panic(payload)
                );
            }
        }
        None if !delivered => {
            log::error!("Unobserved task error from {}: {}", fault.origin, fault.error);
        }
        None => {}
    }
}
