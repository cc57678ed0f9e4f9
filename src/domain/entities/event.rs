use serde::Serialize;

/// Seat bookkeeping for a single event.
///
/// `is_full` is persisted alongside `seats_left`, so every transition goes through
/// this type to keep the two in agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventSeats {
    pub seats_left: i32,
    pub is_full: bool,
}

impl EventSeats {
    /// Build seat state from a seat count, deriving the full flag.
    pub fn new(seats_left: i32) -> Self {
        Self {
            seats_left,
            is_full: seats_left == 0,
        }
    }

    /// `seats_left >= 0` and `is_full <=> seats_left == 0`.
    pub fn is_consistent(&self) -> bool {
        self.seats_left >= 0 && self.is_full == (self.seats_left == 0)
    }

    pub fn has_capacity(&self) -> bool {
        !self.is_full && self.seats_left > 0
    }

    /// Take one seat. Returns `None` when the event has no capacity left.
    pub fn take(self) -> Option<Self> {
        if !self.has_capacity() {
            return None;
        }
        Some(Self::new(self.seats_left - 1))
    }

    /// Give one seat back.
    pub fn release(self) -> Self {
        Self::new(self.seats_left.saturating_add(1))
    }
}
