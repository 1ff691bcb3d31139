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

//! A generation-indexed slab used as the backing store of intrusive lists and
//! cancellation registrations.

/// A key into a [`Slab`].
///
/// It combines an index with a generation count to solve the "ABA problem".
/// When a slot is vacated its index can be recycled, but the generation is
/// incremented, so keys pointing to the old occupant stop resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlabKey {
    index: u32,
    generation: u32,
}

impl SlabKey {
    /// The raw slot index.
    pub fn index(self) -> u32 {
        self.index
    }

    /// The generation of the slot at the time the key was issued.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
enum Entry<T> {
    Occupied { value: T, generation: u32 },
    Vacant { next_free: Option<u32>, generation: u32 },
}

/// Slot storage with an intrusive free list threaded through vacant entries.
///
/// Insertion pops the free list in $O(1)$, removal pushes onto it in $O(1)$.
#[derive(Debug)]
pub struct Slab<T> {
    entries: Vec<Entry<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slab<T> {
    /// Creates an empty slab.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Creates an empty slab with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores `value` and returns the key that addresses it.
    pub fn insert(&mut self, value: T) -> SlabKey {
        self.len += 1;
        if let Some(index) = self.free_head {
            let entry = &mut self.entries[index as usize];
            let (next_free, generation) = match entry {
                Entry::Vacant {
                    next_free,
                    generation,
                } => (*next_free, *generation),
                Entry::Occupied { .. } => unreachable!("slab free list points at an occupied slot"),
            };
            self.free_head = next_free;
            *entry = Entry::Occupied { value, generation };
            SlabKey { index, generation }
        } else {
            let index = self.entries.len() as u32;
            self.entries.push(Entry::Occupied {
                value,
                generation: 0,
            });
            SlabKey {
                index,
                generation: 0,
            }
        }
    }

    /// Removes the value addressed by `key`, if the key is still live.
    pub fn remove(&mut self, key: SlabKey) -> Option<T> {
        let entry = self.entries.get_mut(key.index as usize)?;
        match entry {
            Entry::Occupied { generation, .. } if *generation == key.generation => {}
            _ => return None,
        }
        let vacant = Entry::Vacant {
            next_free: self.free_head,
            generation: key.generation.wrapping_add(1),
        };
        let previous = std::mem::replace(entry, vacant);
        self.free_head = Some(key.index);
        self.len -= 1;
        match previous {
            Entry::Occupied { value, .. } => Some(value),
            Entry::Vacant { .. } => None,
        }
    }

    /// Returns a reference to the value addressed by `key`.
    pub fn get(&self, key: SlabKey) -> Option<&T> {
        match self.entries.get(key.index as usize)? {
            Entry::Occupied { value, generation } if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    /// Returns a mutable reference to the value addressed by `key`.
    pub fn get_mut(&mut self, key: SlabKey) -> Option<&mut T> {
        match self.entries.get_mut(key.index as usize)? {
            Entry::Occupied { value, generation } if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    /// Returns `true` if `key` still addresses a live value.
    pub fn contains(&self, key: SlabKey) -> bool {
        self.get(key).is_some()
    }

    /// Removes every value, in slot order. All outstanding keys become stale.
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.len);
        for index in 0..self.entries.len() {
            let generation = match &self.entries[index] {
                Entry::Occupied { generation, .. } => *generation,
                Entry::Vacant { .. } => continue,
            };
            let key = SlabKey {
                index: index as u32,
                generation,
            };
            if let Some(value) = self.remove(key) {
                values.push(value);
            }
        }
        values
    }

    /// Iterates over live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlabKey, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                Entry::Occupied { value, generation } => Some((
                    SlabKey {
                        index: index as u32,
                        generation: *generation,
                    },
                    value,
                )),
                Entry::Vacant { .. } => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut slab = Slab::new();
        let a = slab.insert("a");
        let b = slab.insert("b");
        assert_eq!(slab.len(), 2);
        assert_eq!(slab.get(a), Some(&"a"));
        assert_eq!(slab.get(b), Some(&"b"));
    }

    #[test]
    fn removed_slots_are_recycled_with_a_new_generation() {
        let mut slab = Slab::new();
        let first = slab.insert(1);
        assert_eq!(slab.remove(first), Some(1));

        let second = slab.insert(2);
        assert_eq!(second.index(), first.index(), "the slot should be reused");
        assert_eq!(second.generation(), first.generation() + 1);

        // The stale key must not observe the new occupant.
        assert_eq!(slab.get(first), None);
        assert_eq!(slab.remove(first), None);
        assert_eq!(slab.get(second), Some(&2));
    }

    #[test]
    fn drain_empties_and_invalidates_keys() {
        let mut slab = Slab::new();
        let keys: Vec<_> = (0..4).map(|i| slab.insert(i)).collect();
        slab.remove(keys[1]);

        assert_eq!(slab.drain(), vec![0, 2, 3]);
        assert!(slab.is_empty());
        assert!(keys.iter().all(|key| !slab.contains(*key)));
    }

    #[test]
    fn iter_skips_vacant_slots() {
        let mut slab = Slab::new();
        let a = slab.insert('a');
        slab.insert('b');
        slab.remove(a);
        let values: Vec<char> = slab.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec!['b']);
    }
}
