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

use cadence_core::enumerator::{AsyncEnumerable, AsyncEnumeratorExt};
use cadence_core::trigger::{AsyncTrigger, TriggerEvent, TriggerHandler};
use cadence_core::{spawn, CancellationToken, Fault, TaskStatus};
use parking_lot::Mutex;
use std::sync::Arc;

/// Appends every notification to a shared journal, tagged with its name.
struct Journal {
    name: &'static str,
    entries: Arc<Mutex<Vec<String>>>,
}

impl TriggerHandler<u32> for Journal {
    fn on_next(&self, value: u32) {
        self.entries.lock().push(format!("{}:{value}", self.name));
    }
    fn on_completed(&self) {
        self.entries.lock().push(format!("{}:completed", self.name));
    }
    fn on_error(&self, fault: Fault) {
        self.entries.lock().push(format!("{}:error:{fault}", self.name));
    }
    fn on_canceled(&self, _token: CancellationToken) {
        self.entries.lock().push(format!("{}:canceled", self.name));
    }
}

#[test]
fn test_consumers_are_notified_in_attachment_order() {
    // --- 1. SETUP ---
    let entries = Arc::new(Mutex::new(Vec::new()));
    let event = TriggerEvent::new();
    for name in ["first", "second"] {
        event.add(Arc::new(Journal {
            name,
            entries: entries.clone(),
        }));
    }

    // --- 2. ACTION ---
    event.set_result(7);
    event.set_completed();
    event.add(Arc::new(Journal {
        name: "third",
        entries: entries.clone(),
    }));

    // --- 3. ASSERTIONS ---
    assert_eq!(
        *entries.lock(),
        vec![
            "first:7",
            "second:7",
            "first:completed",
            "second:completed",
            "third:completed",
        ]
    );
}

#[test]
fn test_handler_added_during_delivery_waits_for_the_next_value() {
    struct Spawner {
        event: Arc<TriggerEvent<u32>>,
        entries: Arc<Mutex<Vec<String>>>,
        spawned: Mutex<bool>,
    }

    impl TriggerHandler<u32> for Spawner {
        fn on_next(&self, value: u32) {
            self.entries.lock().push(format!("spawner:{value}"));
            let mut spawned = self.spawned.lock();
            if !*spawned {
                *spawned = true;
                self.event.add(Arc::new(Journal {
                    name: "late",
                    entries: self.entries.clone(),
                }));
            }
        }
        fn on_completed(&self) {}
        fn on_error(&self, _fault: Fault) {}
        fn on_canceled(&self, _token: CancellationToken) {}
    }

    let entries = Arc::new(Mutex::new(Vec::new()));
    let event = Arc::new(TriggerEvent::new());
    event.add(Arc::new(Spawner {
        event: event.clone(),
        entries: entries.clone(),
        spawned: Mutex::new(false),
    }));

    event.set_result(1);
    event.set_result(2);

    assert_eq!(*entries.lock(), vec!["spawner:1", "spawner:2", "late:2"]);
}

#[test]
fn test_awaiting_consumers_and_subscriptions_share_one_trigger() {
    let trigger = AsyncTrigger::new();
    let next = trigger.next_async(CancellationToken::none());
    let mut stream = trigger.subscribe().get_async_enumerator(CancellationToken::none());

    let collected = spawn(async move {
        let mut seen = Vec::new();
        while let Some(value) = stream.next_async().await? {
            seen.push(value);
        }
        stream.dispose_async().await?;
        Ok(seen)
    });

    trigger.raise(1u32);
    trigger.raise(2);
    trigger.fail(Fault::msg("stream broke"));

    assert_eq!(next.get_result().unwrap(), 1);
    assert_eq!(collected.status().unwrap(), TaskStatus::Faulted);
    let error = collected.get_result().unwrap_err();
    assert!(error.to_string().contains("stream broke"));
}
