//! A fixed-capacity, stable-index container.
//!
//! Three places in the server need the same shape: a capped set of
//! records where removing one must never shift another's index, because
//! other state (a multiplexer registration, a pipe file descriptor) keeps
//! referring to records by that index between ticks. `Store<T>` is that
//! container, used once for the live client slots, once for the live
//! process table, and once for the pending-task queue.

/// A capped, index-addressable collection of `T`.
///
/// `push` always prefers the lowest free index, so indices get reused
/// rather than growing unbounded, matching the slot-reuse behavior
/// callers depend on.
#[derive(Debug)]
pub struct Store<T> {
    slots: Vec<Option<T>>,
}

impl<T> Store<T> {
    /// Create an empty store with room for `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Store { slots }
    }

    /// Total number of slots, used or not.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently in use.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// True if no slot is in use.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if every slot is in use.
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Insert `value` into the first free slot, returning its index.
    /// Returns `None` (store full) without touching `value`'s caller-side
    /// copy if there is no room.
    pub fn push(&mut self, value: T) -> Option<usize> {
        let index = self.slots.iter().position(Option::is_none)?;
        self.slots[index] = Some(value);
        Some(index)
    }

    /// Borrow the record at `index`, if that slot is in use.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Mutably borrow the record at `index`, if that slot is in use.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Free slot `index`, returning the record that was there.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// Iterate used slots from the highest index down to 0.
    ///
    /// The reaper and the pending-task releaser both scan this way (see
    /// the queue-fairness decision in this repo's design notes) so that
    /// scan order is one convention, not two.
    pub fn iter_rev(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .rev()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i, v)))
    }

    /// Iterate used slots, mutably, from the highest index down to 0.
    pub fn iter_rev_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .rev()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (i, v)))
    }

    /// Drop every record and return the store to empty.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_get_remove_roundtrip() {
        let mut store: Store<&str> = Store::with_capacity(3);
        let i = store.push("a").unwrap();
        assert_eq!(store.get(i), Some(&"a"));
        assert_eq!(store.remove(i), Some("a"));
        assert_eq!(store.get(i), None);
    }

    #[test]
    fn push_fills_lowest_free_slot_first() {
        let mut store: Store<i32> = Store::with_capacity(3);
        let a = store.push(1).unwrap();
        let b = store.push(2).unwrap();
        let _c = store.push(3).unwrap();
        assert_eq!((a, b), (0, 1));

        store.remove(a);
        let reused = store.push(4).unwrap();
        assert_eq!(reused, a, "freed index should be reused before growing");
    }

    #[test]
    fn push_reports_full() {
        let mut store: Store<i32> = Store::with_capacity(1);
        assert!(store.push(1).is_some());
        assert!(store.is_full());
        assert_eq!(store.push(2), None);
    }

    #[test]
    fn get_and_remove_on_unused_slot_are_none() {
        let mut store: Store<i32> = Store::with_capacity(2);
        assert_eq!(store.get(0), None);
        assert_eq!(store.remove(0), None);
        assert_eq!(store.get(5), None, "out-of-range index must not panic");
    }

    #[test]
    fn iter_rev_visits_highest_index_first_and_skips_holes() {
        let mut store: Store<i32> = Store::with_capacity(4);
        store.push(10);
        store.push(20);
        let third = store.push(30).unwrap();
        store.remove(third);
        store.push(40);

        let seen: Vec<(usize, i32)> = store.iter_rev().map(|(i, v)| (i, *v)).collect();
        assert_eq!(seen, vec![(3, 40), (1, 20), (0, 10)]);
    }

    #[test]
    fn reset_frees_every_slot() {
        let mut store: Store<i32> = Store::with_capacity(2);
        store.push(1);
        store.push(2);
        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.push(9), Some(0));
    }

    #[test]
    fn len_and_capacity_stay_consistent() {
        let mut store: Store<i32> = Store::with_capacity(5);
        assert_eq!(store.capacity(), 5);
        assert_eq!(store.len(), 0);
        store.push(1);
        store.push(2);
        assert_eq!(store.len(), 2);
        store.remove(0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.capacity(), 5);
    }
}
