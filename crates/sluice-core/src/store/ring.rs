//! Fixed-capacity event slots addressed by sequence number.
//!
//! Capacity is a power of two so slot lookup is a bitmask instead of a
//! modulo. Unlike a queue, slots are not consumed by readers: `get` leaves
//! the event in place and only acknowledgment clears slots for reuse.

use crate::event::Event;

/// Power-of-two slot array addressed by `sequence & (capacity - 1)`.
pub struct EventRing {
    slots: Box<[Option<Event>]>,
    mask: usize,
}

impl EventRing {
    /// Allocates a ring with the given capacity.
    ///
    /// The caller validates the power-of-two requirement; this is checked
    /// here only defensively.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let slots: Vec<Option<Event>> = (0..capacity).map(|_| None).collect();
        Self {
            slots: slots.into_boxed_slice(),
            mask: capacity - 1,
        }
    }

    /// Returns the slot count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[allow(clippy::cast_sign_loss)] // sequences handed to the ring are >= 0
    fn index(&self, sequence: i64) -> usize {
        debug_assert!(sequence >= 0, "negative sequence {sequence}");
        (sequence as usize) & self.mask
    }

    /// Returns the event stored at `sequence`, if the slot is occupied.
    #[must_use]
    pub fn get(&self, sequence: i64) -> Option<&Event> {
        self.slots[self.index(sequence)].as_ref()
    }

    /// Writes an event into the slot for `sequence`, replacing any prior
    /// occupant from an earlier lap.
    pub fn put(&mut self, sequence: i64, event: Event) {
        let index = self.index(sequence);
        self.slots[index] = Some(event);
    }

    /// Empties the slot for `sequence`, returning its occupant.
    pub fn clear(&mut self, sequence: i64) -> Option<Event> {
        let index = self.index(sequence);
        self.slots[index].take()
    }

    /// Drops the payload of the event at `sequence`, keeping its metadata
    /// readable for position queries.
    pub fn release_payload(&mut self, sequence: i64) {
        let index = self.index(sequence);
        if let Some(event) = self.slots[index].as_mut() {
            event.release_payload();
        }
    }
}

impl std::fmt::Debug for EventRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let occupied = self.slots.iter().filter(|slot| slot.is_some()).count();
        f.debug_struct("EventRing")
            .field("capacity", &self.capacity())
            .field("occupied", &occupied)
            .finish()
    }
}
