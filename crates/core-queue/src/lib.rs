//! Generic intrusive-style queue backed by a safe, generation-tagged arena
//! instead of raw linked-list pointers. Every other reactor component builds
//! on this: function entries, operations, alarms, and tasks are all queue
//! elements.
//!
//! Enqueue, head/tail lookup, delete-by-handle, and requeue are O(1). Find
//! and process walk the list and are O(n), matching the documented cost
//! model of the original intrusive queue.

use std::fmt;

/// A stable handle to an element inside a [`Queue`]. Carries a generation
/// counter so a handle from a deleted element can never alias a later
/// element that reuses its slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId {
    index: usize,
    generation: u32,
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementId({}#{})", self.index, self.generation)
    }
}

enum Slot<T> {
    Occupied { value: T, prev: Option<usize>, next: Option<usize>, generation: u32 },
    Free { next_free: Option<usize>, generation: u32 },
}

/// An ordered container of elements with O(1) enqueue/delete/requeue and a
/// per-queue deallocator invoked whenever an element leaves the queue.
pub struct Queue<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    deallocator: Option<Box<dyn FnMut(T)>>,
    cancel_request: Option<Box<dyn FnMut(&mut T)>>,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Queue::new()
    }
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Queue {
            slots: Vec::new(),
            free_head: None,
            head: None,
            tail: None,
            len: 0,
            deallocator: None,
            cancel_request: None,
        }
    }

    /// Installs a deallocator invoked (with ownership of the removed value)
    /// whenever an element is deleted from this queue.
    pub fn with_deallocator(mut self, deallocator: impl FnMut(T) + 'static) -> Self {
        self.deallocator = Some(Box::new(deallocator));
        self
    }

    /// Installs the optional per-queue `cancelRequest` hook, invoked by
    /// [`Queue::cancel_request`] on the element still in place.
    pub fn with_cancel_request(mut self, hook: impl FnMut(&mut T) + 'static) -> Self {
        self.cancel_request = Some(Box::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn alloc_slot(&mut self, value: T, prev: Option<usize>, next: Option<usize>) -> ElementId {
        if let Some(index) = self.free_head {
            let generation = match &self.slots[index] {
                Slot::Free { generation, .. } => *generation,
                Slot::Occupied { .. } => unreachable!("free list points at occupied slot"),
            };
            let next_free = match &self.slots[index] {
                Slot::Free { next_free, .. } => *next_free,
                Slot::Occupied { .. } => unreachable!(),
            };
            self.free_head = next_free;
            self.slots[index] = Slot::Occupied { value, prev, next, generation };
            ElementId { index, generation }
        } else {
            let index = self.slots.len();
            let generation = 0;
            self.slots.push(Slot::Occupied { value, prev, next, generation });
            ElementId { index, generation }
        }
    }

    /// Appends `value` at the tail. O(1).
    pub fn enqueue_tail(&mut self, value: T) -> ElementId {
        let old_tail = self.tail;
        let id = self.alloc_slot(value, old_tail, None);
        if let Some(t) = old_tail {
            if let Slot::Occupied { next, .. } = &mut self.slots[t] {
                *next = Some(id.index);
            }
        } else {
            self.head = Some(id.index);
        }
        self.tail = Some(id.index);
        self.len += 1;
        id
    }

    pub fn get_head(&self) -> Option<ElementId> {
        self.head.map(|index| self.id_at(index))
    }

    pub fn get_tail(&self) -> Option<ElementId> {
        self.tail.map(|index| self.id_at(index))
    }

    fn id_at(&self, index: usize) -> ElementId {
        match &self.slots[index] {
            Slot::Occupied { generation, .. } => ElementId { index, generation: *generation },
            Slot::Free { .. } => unreachable!("linked list points at a free slot"),
        }
    }

    fn resolve(&self, id: ElementId) -> Option<usize> {
        match self.slots.get(id.index) {
            Some(Slot::Occupied { generation, .. }) if *generation == id.generation => Some(id.index),
            _ => None,
        }
    }

    pub fn get(&self, id: ElementId) -> Option<&T> {
        let index = self.resolve(id)?;
        match &self.slots[index] {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Free { .. } => None,
        }
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut T> {
        let index = self.resolve(id)?;
        match &mut self.slots[index] {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Free { .. } => None,
        }
    }

    fn next_of(&self, index: usize) -> Option<usize> {
        match &self.slots[index] {
            Slot::Occupied { next, .. } => *next,
            Slot::Free { .. } => None,
        }
    }

    /// Finds the first element satisfying `predicate`. O(n).
    pub fn find<F>(&self, mut predicate: F) -> Option<ElementId>
    where
        F: FnMut(&T) -> bool,
    {
        let mut cursor = self.head;
        while let Some(index) = cursor {
            if let Slot::Occupied { value, .. } = &self.slots[index] {
                if predicate(value) {
                    return Some(self.id_at(index));
                }
            }
            cursor = self.next_of(index);
        }
        None
    }

    /// Iterates head-to-tail invoking `predicate` on each element; stops and
    /// returns the element's handle as soon as `predicate` returns true.
    /// O(n) in the worst case.
    pub fn process<F>(&mut self, mut predicate: F) -> Option<ElementId>
    where
        F: FnMut(&mut T) -> bool,
    {
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let next = self.next_of(index);
            if let Slot::Occupied { value, .. } = &mut self.slots[index] {
                if predicate(value) {
                    return Some(self.id_at(index));
                }
            }
            cursor = next;
        }
        None
    }

    /// Removes `id` from the queue, running the per-queue deallocator (if
    /// any) on the removed value. O(1). Returns `true` if the element was
    /// present.
    pub fn delete_element(&mut self, id: ElementId) -> bool {
        let Some(index) = self.resolve(id) else { return false };
        let (prev, next, generation) = match &self.slots[index] {
            Slot::Occupied { prev, next, generation, .. } => (*prev, *next, *generation),
            Slot::Free { .. } => return false,
        };

        match prev {
            Some(p) => {
                if let Slot::Occupied { next: pnext, .. } = &mut self.slots[p] {
                    *pnext = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Slot::Occupied { prev: nprev, .. } = &mut self.slots[n] {
                    *nprev = prev;
                }
            }
            None => self.tail = prev,
        }

        let old = std::mem::replace(
            &mut self.slots[index],
            Slot::Free { next_free: self.free_head, generation: generation.wrapping_add(1) },
        );
        self.free_head = Some(index);
        self.len -= 1;

        if let Slot::Occupied { value, .. } = old {
            if let Some(dealloc) = &mut self.deallocator {
                dealloc(value);
            }
        }
        true
    }

    /// Moves `id` to the tail without changing its value. O(1). Used by the
    /// reactor to implement per-tick round-robin fairness across function
    /// entries.
    pub fn requeue_element(&mut self, id: ElementId) -> bool {
        let Some(index) = self.resolve(id) else { return false };
        if self.tail == Some(index) {
            return true;
        }
        let (prev, next) = match &self.slots[index] {
            Slot::Occupied { prev, next, .. } => (*prev, *next),
            Slot::Free { .. } => return false,
        };

        match prev {
            Some(p) => {
                if let Slot::Occupied { next: pnext, .. } = &mut self.slots[p] {
                    *pnext = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Slot::Occupied { prev: nprev, .. } = &mut self.slots[n] {
                    *nprev = prev;
                }
            }
            None => {}
        }

        let old_tail = self.tail;
        if let Slot::Occupied { prev, next, .. } = &mut self.slots[index] {
            *prev = old_tail;
            *next = None;
        }
        if let Some(t) = old_tail {
            if let Slot::Occupied { next, .. } = &mut self.slots[t] {
                *next = Some(index);
            }
        } else {
            self.head = Some(index);
        }
        self.tail = Some(index);
        true
    }

    /// Invokes the per-queue cancel-request hook (if installed) on the
    /// element still in place, without removing it.
    pub fn cancel_request(&mut self, id: ElementId) -> bool {
        let Some(index) = self.resolve(id) else { return false };
        let Some(hook) = &mut self.cancel_request else { return false };
        if let Slot::Occupied { value, .. } = &mut self.slots[index] {
            hook(value);
            true
        } else {
            false
        }
    }

    /// Iterates element handles head to tail. O(n); used by callers that
    /// need to look each element up (and possibly mutate or delete it)
    /// without holding a borrow of the queue across the walk.
    pub fn ids(&self) -> Vec<ElementId> {
        let mut cursor = self.head;
        let mut out = Vec::with_capacity(self.len);
        while let Some(index) = cursor {
            out.push(self.id_at(index));
            cursor = self.next_of(index);
        }
        out
    }

    /// Iterates elements head to tail, immutable.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let index = cursor?;
            let value = match &self.slots[index] {
                Slot::Occupied { value, .. } => value,
                Slot::Free { .. } => return None,
            };
            cursor = self.next_of(index);
            Some(value)
        })
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        if self.deallocator.is_none() {
            return;
        }
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let next = self.next_of(index);
            if let Slot::Occupied { value, .. } =
                std::mem::replace(&mut self.slots[index], Slot::Free { next_free: None, generation: 0 })
            {
                if let Some(dealloc) = &mut self.deallocator {
                    dealloc(value);
                }
            }
            cursor = next;
        }
    }
}
