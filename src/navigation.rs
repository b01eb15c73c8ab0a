//! Navigation over the sorted connection list.
//!
//! A cyclic cursor: `next` and `previous` wrap around by design, `closest`
//! and `farthest` jump to the ends of the distance-sorted list, `random`
//! picks uniformly. Every transition is a no-op over an empty list.
//!
//! The cursor does not persist across a data refresh: rebinding to a new
//! list resets the selection to the closest connection unless the caller
//! explicitly restores a prior selection by (track, facility) id pair.

use rand::Rng;

use crate::Connection;

/// Cursor into a sorted connection list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationState {
    index: usize,
    len: usize,
}

impl NavigationState {
    /// Create a cursor over an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to a freshly sorted connection list, resetting the selection
    /// to the closest connection.
    pub fn rebind(&mut self, connections: &[Connection]) {
        self.len = connections.len();
        self.index = 0;
    }

    /// Bind to a new list, keeping the previous selection if the same
    /// (track, facility) pair still exists; otherwise reset to closest.
    pub fn restore(&mut self, connections: &[Connection], track_id: &str, facility_id: &str) {
        self.len = connections.len();
        self.index = connections
            .iter()
            .position(|c| c.object.track_id == track_id && c.facility.id == facility_id)
            .unwrap_or(0);
    }

    /// The selected index, or `None` over an empty list.
    pub fn selected(&self) -> Option<usize> {
        if self.len == 0 {
            None
        } else {
            Some(self.index)
        }
    }

    /// The selected connection within `connections`.
    ///
    /// `connections` must be the list this cursor was bound to.
    pub fn selected_connection<'a>(&self, connections: &'a [Connection]) -> Option<&'a Connection> {
        self.selected().and_then(|i| connections.get(i))
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Advance one step, wrapping past the end.
    pub fn next(&mut self) {
        if self.len > 0 {
            self.index = (self.index + 1) % self.len;
        }
    }

    /// Step back one, wrapping past the start.
    pub fn previous(&mut self) {
        if self.len > 0 {
            self.index = (self.index + self.len - 1) % self.len;
        }
    }

    /// Jump to the closest connection (index 0).
    pub fn closest(&mut self) {
        if self.len > 0 {
            self.index = 0;
        }
    }

    /// Jump to the farthest connection (last index).
    pub fn farthest(&mut self) {
        if self.len > 0 {
            self.index = self.len - 1;
        }
    }

    /// Jump to a uniformly random connection.
    pub fn random(&mut self) {
        self.random_with(&mut rand::rng());
    }

    /// Jump to a uniformly random connection using the given generator.
    ///
    /// Tests use a seeded generator here for determinism.
    pub fn random_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.len > 0 {
            self.index = rng.random_range(0..self.len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Facility, ObjectFix, Position};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn connections(n: usize) -> Vec<Connection> {
        (0..n)
            .map(|i| Connection {
                object: ObjectFix::new(&format!("track-{}", i), Position::new(0.0, i as f64)),
                facility: Facility::new(&format!("f{}", i), 0.0, 0.0, "f"),
                distance_meters: i as f64 * 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_previous_from_zero_wraps_to_last() {
        let list = connections(5);
        let mut nav = NavigationState::new();
        nav.rebind(&list);

        nav.previous();
        assert_eq!(nav.selected(), Some(4));
    }

    #[test]
    fn test_next_n_times_returns_to_start() {
        let list = connections(7);
        let mut nav = NavigationState::new();
        nav.rebind(&list);

        for start in [0usize, 3, 6] {
            nav.closest();
            for _ in 0..start {
                nav.next();
            }
            let origin = nav.selected();
            for _ in 0..list.len() {
                nav.next();
            }
            assert_eq!(nav.selected(), origin);
        }
    }

    #[test]
    fn test_closest_and_farthest() {
        let list = connections(4);
        let mut nav = NavigationState::new();
        nav.rebind(&list);

        nav.farthest();
        assert_eq!(nav.selected(), Some(3));
        nav.closest();
        assert_eq!(nav.selected(), Some(0));
    }

    #[test]
    fn test_empty_list_is_all_noops() {
        let mut nav = NavigationState::new();
        nav.rebind(&[]);

        nav.next();
        nav.previous();
        nav.farthest();
        nav.random();
        assert_eq!(nav.selected(), None);
        assert!(nav.selected_connection(&[]).is_none());
    }

    #[test]
    fn test_random_stays_in_bounds() {
        let list = connections(3);
        let mut nav = NavigationState::new();
        nav.rebind(&list);

        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            nav.random_with(&mut rng);
            assert!(nav.selected().unwrap() < list.len());
        }
    }

    #[test]
    fn test_rebind_resets_to_closest() {
        let list = connections(5);
        let mut nav = NavigationState::new();
        nav.rebind(&list);
        nav.farthest();

        nav.rebind(&list);
        assert_eq!(nav.selected(), Some(0));
    }

    #[test]
    fn test_restore_finds_prior_selection() {
        let list = connections(5);
        let mut nav = NavigationState::new();

        nav.restore(&list, "track-3", "f3");
        assert_eq!(nav.selected(), Some(3));
        assert_eq!(
            nav.selected_connection(&list).unwrap().object.track_id,
            "track-3"
        );
    }

    #[test]
    fn test_restore_falls_back_to_closest() {
        let list = connections(5);
        let mut nav = NavigationState::new();

        nav.restore(&list, "track-3", "f4"); // pair mismatch
        assert_eq!(nav.selected(), Some(0));
    }

    #[test]
    fn test_selected_connection_reads_sorted_list() {
        let list = connections(3);
        let mut nav = NavigationState::new();
        nav.rebind(&list);
        nav.next();

        let selected = nav.selected_connection(&list).unwrap();
        assert_eq!(selected.object.track_id, "track-1");
    }
}
