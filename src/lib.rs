//! # Balloon Tracker
//!
//! Trajectory stitching and nearest-facility matching for hourly balloon
//! telemetry.
//!
//! The upstream constellation publishes one position array per hour offset
//! (0 = now, 23 = 23 hours ago) with **no stable object identifiers**. This
//! library provides:
//! - Concurrent 24-hour snapshot fetching with per-hour failure recovery
//! - Trajectory stitching under configurable identity heuristics
//! - Nearest-facility assignment by great-circle distance
//! - Cyclic navigation over the sorted connection list
//!
//! ## Quick Start
//!
//! ```rust
//! use balloon_tracker::{match_facilities, Facility, ObjectFix, Position};
//!
//! let objects = vec![ObjectFix::new("track-0", Position::new(40.0, -75.0))];
//! let facilities = vec![
//!     Facility::new("f1", 40.0, -75.0, "Philadelphia, PA"),
//!     Facility::new("f2", 41.0, -74.0, "Newark, NJ"),
//! ];
//!
//! let outcome = match_facilities(&objects, &facilities).unwrap();
//! assert_eq!(outcome.connections.len(), 1);
//! assert_eq!(outcome.connections[0].facility.id, "f1");
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TrackerError};

// Geographic utilities (haversine distance)
pub mod geo_utils;
pub use geo_utils::distance_meters;

// Trajectory stitching (identity heuristics)
pub mod stitcher;
pub use stitcher::{stitch_tracks, stitch_tracks_required, StitchStrategy};

// Nearest-facility matching
pub mod matcher;
pub use matcher::{
    match_facilities, match_facilities_with_index, FacilityIndex, LinearScanIndex, MatchOutcome,
    RTreeIndex,
};

// Navigation over the sorted connection list
pub mod navigation;
pub use navigation::NavigationState;

// HTTP client for snapshot and facility fetching
pub mod http;
pub use http::UpstreamClient;

// Refresh pipeline (fetch -> stitch -> match, replace-don't-mutate)
pub mod engine;
pub use engine::{current_fixes, RefreshEngine, RefreshResult};

// ============================================================================
// Core Types
// ============================================================================

/// A geographic fix with latitude, longitude and optional altitude.
///
/// Immutable once read from a snapshot.
///
/// # Example
/// ```
/// use balloon_tracker::Position;
/// let point = Position::new(51.5074, -0.1278); // London
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    pub alt: Option<f64>,
}

impl Position {
    /// Create a new position without altitude.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            alt: None,
        }
    }

    /// Create a new position with altitude.
    pub fn with_alt(lat: f64, lon: f64, alt: f64) -> Self {
        Self {
            lat,
            lon,
            alt: Some(alt),
        }
    }

    /// Check if the position has valid, finite coordinates.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lon >= -180.0
            && self.lon <= 180.0
    }
}

/// One hour's worth of raw positions, as published by the upstream source.
///
/// `offset_hrs` counts hours before now: 0 = current hour, 23 = 23 hours
/// ago. An hour whose upstream data was missing or malformed yields an
/// empty snapshot, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    pub offset_hrs: u8,
    pub positions: Vec<Position>,
}

impl RawSnapshot {
    /// Create a snapshot for the given offset.
    pub fn new(offset_hrs: u8, positions: Vec<Position>) -> Self {
        Self {
            offset_hrs,
            positions,
        }
    }

    /// Create an empty snapshot (the degraded form for a bad hour).
    pub fn empty(offset_hrs: u8) -> Self {
        Self {
            offset_hrs,
            positions: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// A position attributed to a reconstructed track at a known hour offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub track_id: String,
    pub position: Position,
    pub time_offset_hrs: u8,
}

/// A reconstructed trajectory: positions believed to belong to the same
/// physical object, sorted by ascending `time_offset_hrs`.
///
/// Offset 0 is the current hour, so after sorting the *most recent* sample
/// is the first element. Callers wanting the current position should use
/// [`Track::latest`] rather than indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub points: Vec<TrackPoint>,
}

impl Track {
    /// The most recent sample (smallest hour offset).
    ///
    /// Returns `None` only for an empty track, which the stitcher never
    /// produces.
    pub fn latest(&self) -> Option<&TrackPoint> {
        self.points.first()
    }

    /// The oldest sample in the 24-hour window (largest hour offset).
    pub fn oldest(&self) -> Option<&TrackPoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A fixed ground facility.
///
/// The reference dataset spells longitude `lng`; both spellings are
/// accepted. Unknown extra fields (address, city, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: String,
    pub lat: f64,
    #[serde(alias = "lng")]
    pub lon: f64,
    #[serde(default)]
    pub name: String,
}

impl Facility {
    pub fn new(id: &str, lat: f64, lon: f64, name: &str) -> Self {
        Self {
            id: id.to_string(),
            lat,
            lon,
            name: name.to_string(),
        }
    }

    /// The facility location as a [`Position`].
    pub fn position(&self) -> Position {
        Position::new(self.lat, self.lon)
    }
}

/// A current object position carrying its resolved track id.
///
/// This is the matcher's input: one fix per track, normally the track's
/// latest sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectFix {
    pub track_id: String,
    pub position: Position,
}

impl ObjectFix {
    pub fn new(track_id: &str, position: Position) -> Self {
        Self {
            track_id: track_id.to_string(),
            position,
        }
    }
}

/// An (object, nearest facility, distance) assignment.
///
/// Connection lists are totally ordered by `distance_meters` ascending,
/// ties broken by `object.track_id` for determinism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub object: ObjectFix,
    pub facility: Facility,
    pub distance_meters: f64,
}

/// Configuration for the refresh pipeline.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Base URL of the hourly snapshot source. The per-offset URL is
    /// `{base}/{offset:02}.json`.
    pub snapshot_base_url: String,

    /// URL of the facility dataset (a JSON array of facility objects).
    /// There is no canonical public default; the embedding application
    /// must point this at its own dataset.
    pub facilities_url: String,

    /// Identity heuristic used by the stitcher.
    pub stitch_strategy: StitchStrategy,

    /// Per-request timeout in seconds. Bounds total refresh latency to
    /// roughly one round-trip since fetches run concurrently.
    pub fetch_timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            snapshot_base_url: "https://a.windbornesystems.com/treasure".to_string(),
            facilities_url: String::new(),
            stitch_strategy: StitchStrategy::IndexAligned,
            fetch_timeout_secs: 10,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_validation() {
        assert!(Position::new(51.5074, -0.1278).is_valid());
        assert!(Position::with_alt(0.0, 0.0, 12.3).is_valid());
        assert!(!Position::new(91.0, 0.0).is_valid());
        assert!(!Position::new(0.0, 181.0).is_valid());
        assert!(!Position::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_facility_accepts_lng_spelling() {
        let json = r#"{
            "id": "bk-001",
            "lat": 34.052235,
            "lng": -118.243683,
            "name": "Los Angeles, CA",
            "address": "Downtown LA",
            "state": "CA"
        }"#;
        let facility: Facility = serde_json::from_str(json).unwrap();
        assert_eq!(facility.id, "bk-001");
        assert_eq!(facility.lon, -118.243683);
        assert_eq!(facility.name, "Los Angeles, CA");
    }

    #[test]
    fn test_facility_accepts_lon_spelling() {
        let json = r#"{"id": "f1", "lat": 1.0, "lon": 2.0, "name": "n"}"#;
        let facility: Facility = serde_json::from_str(json).unwrap();
        assert_eq!(facility.lon, 2.0);
    }

    #[test]
    fn test_track_latest_is_smallest_offset() {
        let track = Track {
            id: "track-0".to_string(),
            points: vec![
                TrackPoint {
                    track_id: "track-0".to_string(),
                    position: Position::new(10.0, 10.0),
                    time_offset_hrs: 0,
                },
                TrackPoint {
                    track_id: "track-0".to_string(),
                    position: Position::new(11.0, 11.0),
                    time_offset_hrs: 5,
                },
            ],
        };
        assert_eq!(track.latest().unwrap().time_offset_hrs, 0);
        assert_eq!(track.oldest().unwrap().time_offset_hrs, 5);
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = RawSnapshot::empty(7);
        assert_eq!(snap.offset_hrs, 7);
        assert!(snap.is_empty());
    }
}
