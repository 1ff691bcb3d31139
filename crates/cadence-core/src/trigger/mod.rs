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

//! Bridges callback-style notifications (lifecycle events, input, gameplay
//! signals) into awaitable tasks and asynchronous sequences.

mod async_trigger;
mod event;
mod reactive_property;

pub use self::async_trigger::{AsyncTrigger, TriggerEnumerator, TriggerStream};
pub use self::event::{HandlerKey, SharedHandler, TriggerEvent, TriggerHandler};
pub use self::reactive_property::{AsyncReactiveProperty, ReactivePropertyEnumerator};
