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

use std::fmt;

/// The lifecycle state of a task source for one version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskStatus {
    /// The operation has not completed yet.
    #[default]
    Pending,
    /// The operation completed with a value.
    Succeeded,
    /// The operation completed with an error.
    Faulted,
    /// The operation completed due to cancellation.
    Canceled,
}

impl TaskStatus {
    /// Returns `true` for every terminal status.
    pub fn is_completed(self) -> bool {
        self != TaskStatus::Pending
    }

    /// Returns `true` only for [`TaskStatus::Succeeded`].
    pub fn is_completed_successfully(self) -> bool {
        self == TaskStatus::Succeeded
    }

    /// Returns `true` only for [`TaskStatus::Faulted`].
    pub fn is_faulted(self) -> bool {
        self == TaskStatus::Faulted
    }

    /// Returns `true` only for [`TaskStatus::Canceled`].
    pub fn is_canceled(self) -> bool {
        self == TaskStatus::Canceled
    }
}

/// The version of a reusable task source.
///
/// A [`Task`](super::Task) handle is only valid while its token equals the
/// version held by the source. Resetting a source bumps the version, which
/// invalidates every handle issued before the reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Token(u32);

impl Token {
    /// Wraps a raw version number.
    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    /// The raw version number.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The version that follows this one. Wraps on overflow.
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_is_incomplete() {
        assert!(!TaskStatus::Pending.is_completed());
        for status in [TaskStatus::Succeeded, TaskStatus::Faulted, TaskStatus::Canceled] {
            assert!(status.is_completed());
        }
        assert!(TaskStatus::Succeeded.is_completed_successfully());
        assert!(!TaskStatus::Canceled.is_completed_successfully());
    }

    #[test]
    fn token_wraps_around() {
        assert_eq!(Token::new(u32::MAX).next(), Token::new(0));
        assert_eq!(Token::new(3).next().get(), 4);
    }
}
