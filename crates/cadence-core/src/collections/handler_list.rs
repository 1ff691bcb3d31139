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

//! An index-based intrusive doubly linked list with walk cursors.
//!
//! Nodes live in a [`Slab`] and link to each other through [`SlabKey`]s, so
//! `push_back` and `remove` are $O(1)$ given the key.
//!
//! ## Walking while mutating
//!
//! A dispatch that invokes callbacks between steps cannot hold a borrow of the
//! list, so it walks with a cursor instead:
//!
//! 1. [`HandlerList::begin_walk`] snapshots the head and the current epoch.
//! 2. [`HandlerList::advance`] returns the node under the cursor and moves the
//!    cursor to the node's `next` **before** the caller invokes anything.
//! 3. [`HandlerList::remove`] repairs every cursor that points at the removed
//!    node, so removing the upcoming node (or any other) mid-walk is safe.
//! 4. Nodes pushed after `begin_walk` carry a newer epoch and terminate the
//!    walk; they are seen by the next dispatch only.

use super::slab::{Slab, SlabKey};

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<SlabKey>,
    next: Option<SlabKey>,
    epoch: u64,
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    next: Option<SlabKey>,
    epoch: u64,
}

/// Identifies an in-progress walk started by [`HandlerList::begin_walk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkId(SlabKey);

/// Intrusive list of handlers, safe to mutate while being walked.
#[derive(Debug)]
pub struct HandlerList<T> {
    nodes: Slab<Node<T>>,
    head: Option<SlabKey>,
    tail: Option<SlabKey>,
    cursors: Slab<Cursor>,
    epoch: u64,
}

impl<T> Default for HandlerList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandlerList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            nodes: Slab::new(),
            head: None,
            tail: None,
            cursors: Slab::new(),
            epoch: 0,
        }
    }

    /// Number of linked nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when no node is linked.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Links `value` at the tail and returns its key.
    pub fn push_back(&mut self, value: T) -> SlabKey {
        let key = self.nodes.insert(Node {
            value,
            prev: self.tail,
            next: None,
            epoch: self.epoch,
        });
        match self.tail {
            Some(tail) => {
                if let Some(node) = self.nodes.get_mut(tail) {
                    node.next = Some(key);
                }
            }
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        key
    }

    /// Unlinks the node addressed by `key` and returns its value.
    pub fn remove(&mut self, key: SlabKey) -> Option<T> {
        let node = self.nodes.remove(key)?;

        match node.prev {
            Some(prev) => {
                if let Some(prev_node) = self.nodes.get_mut(prev) {
                    prev_node.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(next_node) = self.nodes.get_mut(next) {
                    next_node.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }

        let cursor_keys: Vec<SlabKey> = self
            .cursors
            .iter()
            .filter(|(_, cursor)| cursor.next == Some(key))
            .map(|(cursor_key, _)| cursor_key)
            .collect();
        for cursor_key in cursor_keys {
            if let Some(cursor) = self.cursors.get_mut(cursor_key) {
                cursor.next = node.next;
            }
        }

        Some(node.value)
    }

    /// Returns `true` if `key` is still linked.
    pub fn contains(&self, key: SlabKey) -> bool {
        self.nodes.contains(key)
    }

    /// Starts a walk over the nodes linked right now.
    pub fn begin_walk(&mut self) -> WalkId {
        let cursor = Cursor {
            next: self.head,
            epoch: self.epoch,
        };
        self.epoch += 1;
        WalkId(self.cursors.insert(cursor))
    }

    /// Ends a walk, releasing its cursor.
    pub fn end_walk(&mut self, walk: WalkId) {
        self.cursors.remove(walk.0);
    }

    /// Clears every node. Active cursors end at their next step.
    pub fn clear(&mut self) -> Vec<T> {
        let keys: Vec<SlabKey> = self.cursors.iter().map(|(key, _)| key).collect();
        for key in keys {
            if let Some(cursor) = self.cursors.get_mut(key) {
                cursor.next = None;
            }
        }
        self.head = None;
        self.tail = None;
        self.nodes.drain().into_iter().map(|node| node.value).collect()
    }
}

impl<T: Clone> HandlerList<T> {
    /// Returns the value under the walk's cursor and steps past it.
    ///
    /// Returns `None` when the walk is exhausted or reaches a node linked after
    /// the walk started.
    pub fn advance(&mut self, walk: WalkId) -> Option<T> {
        let cursor = *self.cursors.get(walk.0)?;
        let key = cursor.next?;
        let node = self.nodes.get(key)?;
        if node.epoch > cursor.epoch {
            return None;
        }
        let value = node.value.clone();
        let next = node.next;
        if let Some(cursor) = self.cursors.get_mut(walk.0) {
            cursor.next = next;
        }
        Some(value)
    }

    /// Clones every linked value, head to tail.
    pub fn snapshot(&self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(key) = cursor {
            match self.nodes.get(key) {
                Some(node) => {
                    values.push(node.value.clone());
                    cursor = node.next;
                }
                None => break,
            }
        }
        values
    }
}
