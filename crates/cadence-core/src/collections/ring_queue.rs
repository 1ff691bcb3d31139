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

//! A minimal FIFO ring buffer.

const MINIMUM_GROW: usize = 4;

/// A growable FIFO ring buffer.
///
/// Used where items are parked for later processing (runner insertions made
/// during a pass, buffered channel and trigger values). Capacity doubles when
/// the buffer is full; it never shrinks.
#[derive(Debug)]
pub struct RingQueue<T> {
    buffer: Vec<Option<T>>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<T> Default for RingQueue<T> {
    fn default() -> Self {
        Self::new(MINIMUM_GROW)
    }
}

impl<T> RingQueue<T> {
    /// Creates a queue able to hold `capacity` items before growing.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut buffer = Vec::with_capacity(capacity);
        buffer.resize_with(capacity, || None);
        Self {
            buffer,
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current slot count.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Appends an item at the tail.
    pub fn enqueue(&mut self, item: T) {
        if self.len == self.buffer.len() {
            let grown = (self.buffer.len() * 2).max(self.buffer.len() + MINIMUM_GROW);
            self.set_capacity(grown);
        }
        self.buffer[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.buffer.len();
        self.len += 1;
    }

    /// Removes the item at the head.
    pub fn dequeue(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.buffer[self.head].take();
        self.head = (self.head + 1) % self.buffer.len();
        self.len -= 1;
        item
    }

    /// Returns the item at the head without removing it.
    pub fn peek(&self) -> Option<&T> {
        if self.len == 0 {
            None
        } else {
            self.buffer[self.head].as_ref()
        }
    }

    /// Drops every queued item, keeping the allocation.
    pub fn clear(&mut self) {
        while self.dequeue().is_some() {}
        self.head = 0;
        self.tail = 0;
    }

    fn set_capacity(&mut self, capacity: usize) {
        let mut grown = Vec::with_capacity(capacity);
        grown.resize_with(capacity, || None);
        let old_capacity = self.buffer.len();
        for (offset, slot) in grown.iter_mut().enumerate().take(self.len) {
            *slot = self.buffer[(self.head + offset) % old_capacity].take();
        }
        self.buffer = grown;
        self.head = 0;
        self.tail = if self.len == capacity { 0 } else { self.len };
    }
}
