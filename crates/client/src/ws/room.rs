//! Single-room membership tracking.

use lunchparty_shared::RoomRef;

/// The one room this client has joined, if any.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoomMembership {
    current: Option<RoomRef>,
}

impl RoomMembership {
    pub fn current(&self) -> Option<&RoomRef> {
        self.current.as_ref()
    }

    /// Record `room` as joined. Returns the previously joined room when it
    /// differs from `room`; the caller is expected to leave it on the wire.
    pub fn join(&mut self, room: RoomRef) -> Option<RoomRef> {
        match self.current.replace(room) {
            Some(previous) if Some(&previous) != self.current.as_ref() => Some(previous),
            _ => None,
        }
    }

    /// Forget `room` if it is the tracked one. Stale leaves leave state untouched.
    pub fn leave(&mut self, room: &RoomRef) -> bool {
        if self.current.as_ref() == Some(room) {
            self.current = None;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joining_a_second_room_replaces_the_first() {
        let mut membership = RoomMembership::default();
        assert_eq!(membership.join(RoomRef::new("party", 1)), None);

        let previous = membership.join(RoomRef::new("party", 2));

        assert_eq!(previous, Some(RoomRef::new("party", 1)));
        assert_eq!(membership.current(), Some(&RoomRef::new("party", 2)));
    }

    #[test]
    fn rejoining_the_same_room_reports_nothing_to_leave() {
        let mut membership = RoomMembership::default();
        membership.join(RoomRef::new("party", 1));
        assert_eq!(membership.join(RoomRef::new("party", 1)), None);
    }

    #[test]
    fn stale_leave_keeps_current_room() {
        let mut membership = RoomMembership::default();
        membership.join(RoomRef::new("party", 1));

        assert!(!membership.leave(&RoomRef::new("personal", 1)));
        assert!(!membership.leave(&RoomRef::new("party", 9)));
        assert_eq!(membership.current(), Some(&RoomRef::new("party", 1)));

        assert!(membership.leave(&RoomRef::new("party", 1)));
        assert_eq!(membership.current(), None);
    }
}
