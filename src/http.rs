//! HTTP client for the upstream telemetry source and the facility dataset.
//!
//! This module provides:
//! - Per-offset snapshot fetching with a hard per-request timeout
//! - Concurrent 24-hour fan-out (wait for all, never first-failure)
//! - Per-hour degradation: a bad hour becomes an empty snapshot, logged,
//!   never an error past this boundary
//! - Facility dataset loading, which *does* propagate failures

use log::{info, warn};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::{Facility, Position, RawSnapshot, Result, TrackerConfig, TrackerError};

/// Largest valid hour offset (inclusive).
pub const MAX_OFFSET_HRS: u8 = 23;

/// Number of hourly snapshots in one refresh window.
pub const WINDOW_HRS: usize = 24;

/// HTTP client for the snapshot source and facility dataset.
///
/// Cloning is cheap: the inner `reqwest::Client` is reference-counted and
/// clones share its connection pool.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    snapshot_base_url: String,
    facilities_url: String,
}

impl UpstreamClient {
    /// Create a client from the tracker configuration.
    ///
    /// The per-request timeout bounds refresh latency to roughly one
    /// round-trip, since all 24 snapshot fetches run concurrently.
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(WINDOW_HRS)
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| TrackerError::Http {
                message: format!("Failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self {
            client,
            snapshot_base_url: config.snapshot_base_url.clone(),
            facilities_url: config.facilities_url.clone(),
        })
    }

    /// Fetch one hourly snapshot.
    ///
    /// Fails with `OffsetOutOfRange` before any network I/O if `offset` is
    /// outside [0, 23] (that is the caller's fault). Any upstream problem
    /// for a valid offset (non-success status, malformed body, transport
    /// error, timeout) degrades to an empty snapshot with a warning: a
    /// single bad hour reduces data completeness, never the whole fetch.
    pub async fn fetch_snapshot(&self, offset: u8) -> Result<RawSnapshot> {
        if offset > MAX_OFFSET_HRS {
            return Err(TrackerError::OffsetOutOfRange { offset });
        }

        let url = format!("{}/{:02}.json", self.snapshot_base_url, offset);

        match self.try_fetch_snapshot(offset, &url).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!(
                    "[SnapshotFetcher] Offset {:02} degraded to empty: {}",
                    offset, e
                );
                Ok(RawSnapshot::empty(offset))
            }
        }
    }

    async fn try_fetch_snapshot(&self, offset: u8, url: &str) -> Result<RawSnapshot> {
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|e| TrackerError::Upstream {
                    offset,
                    message: e.to_string(),
                    status_code: e.status().map(|s| s.as_u16()),
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Upstream {
                offset,
                message: format!("status {}", status),
                status_code: Some(status.as_u16()),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| TrackerError::MalformedResponse {
                offset,
                message: e.to_string(),
            })?;

        let positions = parse_snapshot_body(offset, &body)?;
        Ok(RawSnapshot::new(offset, positions))
    }

    /// Fetch all 24 hourly snapshots concurrently.
    ///
    /// Always returns exactly 24 snapshots indexed by offset. Partial
    /// failures (empty snapshots) never cancel the sibling fetches.
    pub async fn fetch_24h_snapshots(&self) -> Vec<RawSnapshot> {
        let tasks: Vec<_> = (0..=MAX_OFFSET_HRS)
            .map(|offset| {
                let client = self.clone();
                tokio::spawn(async move { client.fetch_snapshot(offset).await })
            })
            .collect();

        let joined = futures::future::join_all(tasks).await;

        let mut snapshots: Vec<RawSnapshot> =
            (0..=MAX_OFFSET_HRS).map(RawSnapshot::empty).collect();

        for (offset, task) in (0..=MAX_OFFSET_HRS).zip(joined) {
            match task {
                // fetch_snapshot never errors for offsets in range
                Ok(Ok(snapshot)) => snapshots[offset as usize] = snapshot,
                Ok(Err(e)) => {
                    warn!("[SnapshotFetcher] Offset {:02} failed: {}", offset, e);
                }
                Err(e) => {
                    warn!(
                        "[SnapshotFetcher] Task join error for offset {:02}: {}",
                        offset, e
                    );
                }
            }
        }

        let populated = snapshots.iter().filter(|s| !s.is_empty()).count();
        info!(
            "[SnapshotFetcher] Fetched 24h window: {}/{} hours populated",
            populated, WINDOW_HRS
        );

        snapshots
    }

    /// Fetch the facility dataset.
    ///
    /// Unlike snapshot fetching, failures here propagate: the matcher
    /// cannot silently invent a facility set.
    pub async fn fetch_facilities(&self) -> Result<Vec<Facility>> {
        let response = self
            .client
            .get(&self.facilities_url)
            .send()
            .await
            .map_err(|e| TrackerError::Http {
                message: format!("Facility fetch failed: {}", e),
                status_code: e.status().map(|s| s.as_u16()),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Http {
                message: "Facility fetch failed".to_string(),
                status_code: Some(status.as_u16()),
            });
        }

        let facilities: Vec<Facility> =
            response.json().await.map_err(|e| TrackerError::Http {
                message: format!("Facility parse failed: {}", e),
                status_code: None,
            })?;

        info!(
            "[FacilityFetcher] Loaded {} facilities",
            facilities.len()
        );
        Ok(facilities)
    }
}

/// Parse an upstream snapshot body into normalized positions.
///
/// The body must be a JSON array; anything else is a malformed response.
/// Each element must itself be an array of at least two numbers; elements
/// that are not are filtered out individually, as are rows with
/// out-of-range or non-finite coordinates. A third numeric element, if
/// present, becomes the altitude.
pub(crate) fn parse_snapshot_body(offset: u8, body: &Value) -> Result<Vec<Position>> {
    let rows = body.as_array().ok_or_else(|| TrackerError::MalformedResponse {
        offset,
        message: "body is not an array".to_string(),
    })?;

    let mut positions = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(position) = parse_row(row) {
            if position.is_valid() {
                positions.push(position);
            }
        }
    }
    Ok(positions)
}

fn parse_row(row: &Value) -> Option<Position> {
    let cells = row.as_array()?;
    let lat = cells.first()?.as_f64()?;
    let lon = cells.get(1)?.as_f64()?;
    let alt = cells.get(2).and_then(Value::as_f64);
    Some(Position { lat, lon, alt })
}
