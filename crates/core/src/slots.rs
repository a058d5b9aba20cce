//! Exclusive mapping of background candidates to the two output slots.

use serde::{Deserialize, Serialize};

use crate::types::Slot;

/// Which candidate index occupies each slot.
///
/// A candidate occupies at most one slot; assigning it to the other slot
/// moves it rather than duplicating it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAssignment {
    a: Option<usize>,
    b: Option<usize>,
}

impl SlotAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current occupant of `slot`.
    pub fn occupant(&self, slot: Slot) -> Option<usize> {
        match slot {
            Slot::A => self.a,
            Slot::B => self.b,
        }
    }

    /// The slot `candidate` occupies, if any.
    pub fn slot_of(&self, candidate: usize) -> Option<Slot> {
        Slot::ALL
            .into_iter()
            .find(|s| self.occupant(*s) == Some(candidate))
    }

    /// Place `candidate` in `slot`, evicting it from the other slot first.
    ///
    /// The previous occupant of `slot`, if different, is replaced.
    /// Assigning a candidate to the slot it already holds is a no-op.
    pub fn assign(&mut self, slot: Slot, candidate: usize) {
        if self.occupant(slot.other()) == Some(candidate) {
            *self.slot_mut(slot.other()) = None;
        }
        *self.slot_mut(slot) = Some(candidate);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Both slots hold distinct candidates.
    pub fn is_ready(&self) -> bool {
        matches!((self.a, self.b), (Some(a), Some(b)) if a != b)
    }

    /// Both occupants, when [`is_ready`](Self::is_ready).
    pub fn pair(&self) -> Option<(usize, usize)> {
        if self.is_ready() {
            self.a.zip(self.b)
        } else {
            None
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<usize> {
        match slot {
            Slot::A => &mut self.a,
            Slot::B => &mut self.b,
        }
    }
}
