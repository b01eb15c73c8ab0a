//! Trajectory stitching: turning 24 unordered hourly snapshots into
//! per-object tracks.
//!
//! The upstream source provides **no stable object identifier**, so identity
//! must be inferred. Two heuristics are supported, selected by
//! configuration; neither is validated against ground truth and the choice
//! is a documented accuracy trade-off, not an implementation detail:
//!
//! - [`StitchStrategy::IndexAligned`] assumes array position is stable
//!   across hours. Cheap, keeps every observation, breaks silently if the
//!   upstream reorders.
//! - [`StitchStrategy::ProximityBucket`] groups positions by a
//!   one-decimal-degree cell (~11 km) and drops single-observation groups
//!   as noise. Robust to reordering, loses isolated fixes.

use std::collections::BTreeMap;

use crate::{Position, RawSnapshot, Result, Track, TrackPoint, TrackerError};

/// Identity heuristic used to resolve tracks from anonymous snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StitchStrategy {
    /// Object at array position `i` in hour `h` is the same object as
    /// position `i` in hour `h+1`. Track ids are `track-{i}`.
    ///
    /// Known correctness risk: this breaks silently if the upstream source
    /// reorders objects between hours. It is an assumption this crate
    /// cannot verify.
    IndexAligned,

    /// Positions whose lat/lon round to the same one-decimal-degree cell
    /// belong to the same provisional group; a group becomes a track only
    /// with at least two points across the window. Track ids are
    /// `track-{n}` with `n` assigned in sorted cell-key order.
    ProximityBucket,
}

/// Minimum points for a proximity group to count as a real trajectory.
/// A single observation over 24 hours is treated as noise.
const MIN_PROXIMITY_GROUP: usize = 2;

/// Stitch hourly snapshots into a mapping from track id to track.
///
/// Empty snapshots contribute no points and never create empty tracks.
/// All-empty input yields an empty map, not an error; callers decide
/// whether zero tracks is an error for their context (see
/// [`stitch_tracks_required`]).
///
/// Within each track, points are sorted by ascending `time_offset_hrs`,
/// so the most recent sample (offset 0) comes first.
pub fn stitch_tracks(
    snapshots: &[RawSnapshot],
    strategy: StitchStrategy,
) -> BTreeMap<String, Track> {
    let groups = match strategy {
        StitchStrategy::IndexAligned => group_by_index(snapshots),
        StitchStrategy::ProximityBucket => group_by_proximity(snapshots),
    };

    let mut tracks = BTreeMap::new();
    for (id, mut points) in groups {
        // Stable sort: points from the same hour keep their snapshot order
        points.sort_by_key(|p| p.time_offset_hrs);
        tracks.insert(id.clone(), Track { id, points });
    }
    tracks
}

/// Stitch, failing with `NoData` when every snapshot is empty.
///
/// For callers that demand at least one non-empty snapshot.
pub fn stitch_tracks_required(
    snapshots: &[RawSnapshot],
    strategy: StitchStrategy,
) -> Result<BTreeMap<String, Track>> {
    if snapshots.iter().all(|s| s.is_empty()) {
        return Err(TrackerError::NoData {
            message: "all 24 hourly snapshots are empty".to_string(),
        });
    }
    Ok(stitch_tracks(snapshots, strategy))
}

fn group_by_index(snapshots: &[RawSnapshot]) -> BTreeMap<String, Vec<TrackPoint>> {
    let mut groups: BTreeMap<String, Vec<TrackPoint>> = BTreeMap::new();

    for snapshot in snapshots {
        for (i, position) in snapshot.positions.iter().enumerate() {
            let track_id = format!("track-{}", i);
            groups.entry(track_id.clone()).or_default().push(TrackPoint {
                track_id,
                position: *position,
                time_offset_hrs: snapshot.offset_hrs,
            });
        }
    }

    groups
}

/// One-decimal-degree cell key (~11 km at the equator).
fn cell_key(lat: f64, lon: f64) -> (i32, i32) {
    ((lat * 10.0).round() as i32, (lon * 10.0).round() as i32)
}

fn group_by_proximity(snapshots: &[RawSnapshot]) -> BTreeMap<String, Vec<TrackPoint>> {
    // BTreeMap gives sorted cell-key iteration, which fixes the id order
    let mut cells: BTreeMap<(i32, i32), Vec<(u8, Position)>> = BTreeMap::new();

    for snapshot in snapshots {
        for position in &snapshot.positions {
            cells
                .entry(cell_key(position.lat, position.lon))
                .or_default()
                .push((snapshot.offset_hrs, *position));
        }
    }

    let mut groups = BTreeMap::new();
    let mut counter = 0usize;
    for (_key, members) in cells {
        if members.len() < MIN_PROXIMITY_GROUP {
            continue;
        }
        let track_id = format!("track-{}", counter);
        counter += 1;

        let points = members
            .into_iter()
            .map(|(offset, position)| TrackPoint {
                track_id: track_id.clone(),
                position,
                time_offset_hrs: offset,
            })
            .collect();
        groups.insert(track_id, points);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Position;

    fn snapshot(offset: u8, positions: Vec<Position>) -> RawSnapshot {
        RawSnapshot::new(offset, positions)
    }

    /// Full 24-hour window with the given snapshots placed at their
    /// offsets and every other hour empty.
    fn window(populated: Vec<RawSnapshot>) -> Vec<RawSnapshot> {
        let mut all: Vec<RawSnapshot> = (0..24).map(RawSnapshot::empty).collect();
        for snap in populated {
            let idx = snap.offset_hrs as usize;
            all[idx] = snap;
        }
        all
    }

    #[test]
    fn test_index_stitching_determinism() {
        // 3 snapshots of 2 objects each at offsets {0, 1, 2}
        let snapshots = window(vec![
            snapshot(0, vec![Position::new(10.0, 10.0), Position::new(20.0, 20.0)]),
            snapshot(1, vec![Position::new(10.1, 10.1), Position::new(20.1, 20.1)]),
            snapshot(2, vec![Position::new(10.2, 10.2), Position::new(20.2, 20.2)]),
        ]);

        let tracks = stitch_tracks(&snapshots, StitchStrategy::IndexAligned);
        assert_eq!(tracks.len(), 2);

        for id in ["track-0", "track-1"] {
            let track = &tracks[id];
            assert_eq!(track.len(), 3);
            let offsets: Vec<u8> = track.points.iter().map(|p| p.time_offset_hrs).collect();
            assert_eq!(offsets, vec![0, 1, 2]);
            assert!(track.points.iter().all(|p| p.track_id == id));
        }
    }

    #[test]
    fn test_index_latest_is_offset_zero() {
        let snapshots = window(vec![
            snapshot(0, vec![Position::new(10.0, 10.0)]),
            snapshot(5, vec![Position::new(12.0, 12.0)]),
        ]);
        let tracks = stitch_tracks(&snapshots, StitchStrategy::IndexAligned);
        let track = &tracks["track-0"];
        assert_eq!(track.latest().unwrap().time_offset_hrs, 0);
        assert_eq!(track.oldest().unwrap().time_offset_hrs, 5);
    }

    #[test]
    fn test_index_ragged_snapshot_lengths() {
        // Hour 1 reports a third object that hour 0 does not
        let snapshots = window(vec![
            snapshot(0, vec![Position::new(10.0, 10.0), Position::new(20.0, 20.0)]),
            snapshot(
                1,
                vec![
                    Position::new(10.1, 10.1),
                    Position::new(20.1, 20.1),
                    Position::new(30.0, 30.0),
                ],
            ),
        ]);

        let tracks = stitch_tracks(&snapshots, StitchStrategy::IndexAligned);
        assert_eq!(tracks.len(), 3);
        assert_eq!(tracks["track-2"].len(), 1);
    }

    #[test]
    fn test_proximity_noise_filtering() {
        // One lone observation with no neighbor in any other hour
        let snapshots = window(vec![snapshot(7, vec![Position::new(45.0, 45.0)])]);

        let tracks = stitch_tracks(&snapshots, StitchStrategy::ProximityBucket);
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_proximity_groups_adjacent_hours() {
        // Two observations in the same ~11km cell across two hours
        let snapshots = window(vec![
            snapshot(0, vec![Position::new(45.01, 45.01)]),
            snapshot(1, vec![Position::new(45.02, 45.03)]),
        ]);

        let tracks = stitch_tracks(&snapshots, StitchStrategy::ProximityBucket);
        assert_eq!(tracks.len(), 1);
        let track = &tracks["track-0"];
        assert_eq!(track.len(), 2);
        let offsets: Vec<u8> = track.points.iter().map(|p| p.time_offset_hrs).collect();
        assert_eq!(offsets, vec![0, 1]);
    }

    #[test]
    fn test_proximity_ids_follow_cell_key_order() {
        // Two real groups plus one noise point; ids are assigned in sorted
        // cell-key order, skipping the dropped group
        let snapshots = window(vec![
            snapshot(
                0,
                vec![
                    Position::new(50.0, 8.0),
                    Position::new(-30.0, 140.0),
                    Position::new(0.0, 0.0), // noise
                ],
            ),
            snapshot(
                1,
                vec![Position::new(50.01, 8.01), Position::new(-30.01, 140.01)],
            ),
        ]);

        let tracks = stitch_tracks(&snapshots, StitchStrategy::ProximityBucket);
        assert_eq!(tracks.len(), 2);
        // (-300, 1400) sorts before (500, 80)
        assert_eq!(tracks["track-0"].points[0].position.lat, -30.0);
        assert_eq!(tracks["track-1"].points[0].position.lat, 50.0);
    }

    #[test]
    fn test_all_empty_snapshots() {
        let snapshots: Vec<RawSnapshot> = (0..24).map(RawSnapshot::empty).collect();

        let tracks = stitch_tracks(&snapshots, StitchStrategy::IndexAligned);
        assert!(tracks.is_empty());

        let tracks = stitch_tracks(&snapshots, StitchStrategy::ProximityBucket);
        assert!(tracks.is_empty());

        let result = stitch_tracks_required(&snapshots, StitchStrategy::IndexAligned);
        assert!(matches!(result, Err(TrackerError::NoData { .. })));
    }

    #[test]
    fn test_required_passes_with_one_populated_hour() {
        let snapshots = window(vec![snapshot(23, vec![Position::new(1.0, 1.0)])]);
        let tracks =
            stitch_tracks_required(&snapshots, StitchStrategy::IndexAligned).unwrap();
        assert_eq!(tracks.len(), 1);
    }
}
