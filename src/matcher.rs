//! Nearest-facility matching.
//!
//! For each current object position, find the closest facility by
//! great-circle distance, then produce a distance-sorted connection list and
//! the deduplicated subset of facilities actually chosen.
//!
//! Lookup runs behind the [`FacilityIndex`] trait. [`LinearScanIndex`] is
//! the default: O(objects × facilities) is fine at a few hundred objects
//! and a few thousand facilities. [`RTreeIndex`] is the drop-in upgrade for
//! facility sets an order of magnitude larger; it indexes unit-sphere
//! chordal coordinates, so chord-nearest is exactly great-circle-nearest.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use log::debug;
use rstar::primitives::GeomWithData;
use rstar::RTree;

use crate::geo_utils::haversine_meters;
use crate::{Connection, Facility, ObjectFix, Position, Result, TrackerError};

/// Facility count above which [`match_facilities`] switches from linear
/// scan to the R-tree index.
const SPATIAL_INDEX_THRESHOLD: usize = 10_000;

/// Result of a match run.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// One connection per input object, sorted by `distance_meters`
    /// ascending, ties broken by track id.
    pub connections: Vec<Connection>,
    /// Facilities chosen at least once, deduplicated and sorted by id.
    /// Facilities with zero assigned objects are dropped from this set,
    /// not from the caller's input.
    pub used_facilities: Vec<Facility>,
}

/// Nearest-facility lookup.
///
/// Implementations must agree: equal minimal distances resolve to the
/// facility with the smaller id.
pub trait FacilityIndex {
    /// The nearest facility to `position` and its great-circle distance
    /// in meters.
    fn nearest(&self, position: &Position) -> Result<(&Facility, f64)>;
}

fn validate_facilities(facilities: &[Facility]) -> Result<Vec<Facility>> {
    if facilities.is_empty() {
        return Err(TrackerError::NoFacilities);
    }
    for f in facilities {
        if !f.position().is_valid() {
            return Err(TrackerError::InvalidCoordinates {
                lat: f.lat,
                lon: f.lon,
            });
        }
    }
    Ok(facilities.to_vec())
}

fn validate_query(position: &Position) -> Result<()> {
    if !position.is_valid() {
        return Err(TrackerError::InvalidCoordinates {
            lat: position.lat,
            lon: position.lon,
        });
    }
    Ok(())
}

/// Exhaustive scan over all facilities.
#[derive(Debug, Clone)]
pub struct LinearScanIndex {
    facilities: Vec<Facility>,
}

impl LinearScanIndex {
    /// Build the index. Fails with `NoFacilities` on an empty set and
    /// `InvalidCoordinates` if any facility is out of range.
    pub fn new(facilities: &[Facility]) -> Result<Self> {
        Ok(Self {
            facilities: validate_facilities(facilities)?,
        })
    }
}

impl FacilityIndex for LinearScanIndex {
    fn nearest(&self, position: &Position) -> Result<(&Facility, f64)> {
        validate_query(position)?;

        let mut best: Option<(&Facility, f64)> = None;
        for facility in &self.facilities {
            let d = haversine_meters(position, &facility.position());
            best = match best {
                None => Some((facility, d)),
                Some((bf, bd)) => {
                    if d < bd || (d == bd && facility.id < bf.id) {
                        Some((facility, d))
                    } else {
                        Some((bf, bd))
                    }
                }
            };
        }
        // Construction guarantees a non-empty set
        best.ok_or(TrackerError::NoFacilities)
    }
}

/// R-tree over unit-sphere chordal coordinates.
///
/// Chord length is monotonic in great-circle distance, so the tree's
/// nearest neighbour is the true geodesic nearest neighbour with no
/// planar-projection error at poles or the antimeridian.
pub struct RTreeIndex {
    tree: RTree<GeomWithData<[f64; 3], usize>>,
    facilities: Vec<Facility>,
}

fn unit_vector(lat: f64, lon: f64) -> [f64; 3] {
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

impl RTreeIndex {
    /// Build the index. Same preconditions as [`LinearScanIndex::new`].
    pub fn new(facilities: &[Facility]) -> Result<Self> {
        let facilities = validate_facilities(facilities)?;
        let entries: Vec<_> = facilities
            .iter()
            .enumerate()
            .map(|(i, f)| GeomWithData::new(unit_vector(f.lat, f.lon), i))
            .collect();
        Ok(Self {
            tree: RTree::bulk_load(entries),
            facilities,
        })
    }
}

impl FacilityIndex for RTreeIndex {
    fn nearest(&self, position: &Position) -> Result<(&Facility, f64)> {
        validate_query(position)?;

        let query = unit_vector(position.lat, position.lon);
        let mut iter = self.tree.nearest_neighbor_iter_with_distance_2(&query);

        let (first, best_d2) = iter.next().ok_or(TrackerError::NoFacilities)?;

        // Collect chord-distance ties, then apply the haversine/id tie rule
        // so both index implementations resolve ties identically
        let mut candidates = vec![first.data];
        for (entry, d2) in iter {
            if d2 > best_d2 {
                break;
            }
            candidates.push(entry.data);
        }

        let mut best: Option<(&Facility, f64)> = None;
        for idx in candidates {
            let facility = &self.facilities[idx];
            let d = haversine_meters(position, &facility.position());
            best = match best {
                None => Some((facility, d)),
                Some((bf, bd)) => {
                    if d < bd || (d == bd && facility.id < bf.id) {
                        Some((facility, d))
                    } else {
                        Some((bf, bd))
                    }
                }
            };
        }
        best.ok_or(TrackerError::NoFacilities)
    }
}

/// Match each object to its nearest facility.
///
/// Fails with `NoFacilities` on an empty facility set: "closest of zero"
/// is undefined and must not silently default. Picks the index
/// implementation by facility count; both produce identical results.
///
/// # Example
/// ```
/// use balloon_tracker::{match_facilities, Facility, ObjectFix, Position};
///
/// let objects = vec![ObjectFix::new("o1", Position::new(40.0, -75.0))];
/// let facilities = vec![Facility::new("f1", 40.0, -75.0, "exact hit")];
///
/// let outcome = match_facilities(&objects, &facilities).unwrap();
/// assert_eq!(outcome.connections[0].distance_meters, 0.0);
/// ```
pub fn match_facilities(objects: &[ObjectFix], facilities: &[Facility]) -> Result<MatchOutcome> {
    if facilities.len() >= SPATIAL_INDEX_THRESHOLD {
        let index = RTreeIndex::new(facilities)?;
        match_facilities_with_index(objects, &index)
    } else {
        let index = LinearScanIndex::new(facilities)?;
        match_facilities_with_index(objects, &index)
    }
}

/// Match against a pre-built index.
pub fn match_facilities_with_index(
    objects: &[ObjectFix],
    index: &dyn FacilityIndex,
) -> Result<MatchOutcome> {
    let mut connections = Vec::with_capacity(objects.len());
    for object in objects {
        let (facility, distance_meters) = index.nearest(&object.position)?;
        connections.push(Connection {
            object: object.clone(),
            facility: facility.clone(),
            distance_meters,
        });
    }

    connections.sort_by(|a, b| {
        a.distance_meters
            .partial_cmp(&b.distance_meters)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.object.track_id.cmp(&b.object.track_id))
    });

    let mut used: BTreeMap<String, Facility> = BTreeMap::new();
    for connection in &connections {
        used.entry(connection.facility.id.clone())
            .or_insert_with(|| connection.facility.clone());
    }

    debug!(
        "[FacilityMatcher] {} objects -> {} connections, {} facilities in use",
        objects.len(),
        connections.len(),
        used.len()
    );

    Ok(MatchOutcome {
        connections,
        used_facilities: used.into_values().collect(),
    })
}
