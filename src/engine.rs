//! # Refresh Engine
//!
//! One logical pipeline run per refresh tick: fetch the 24-hour snapshot
//! window and the facility dataset concurrently, stitch trajectories, match
//! facilities, and publish the result.
//!
//! ## Consistency model
//!
//! Each refresh builds wholly new `Track` and `Connection` collections and
//! publishes them by replacing an `Arc`: readers always see either the
//! previous complete result or the new complete result, never a partial
//! update. Nothing is mutated in place.
//!
//! Overlapping refreshes are disallowed: a `refresh` call that arrives
//! while another is in flight is skipped with `RefreshInProgress` rather
//! than interleaved. Retry and backoff policy belongs to the caller's
//! scheduler, not here.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{info, warn};
use tokio::time::MissedTickBehavior;

use crate::matcher::match_facilities;
use crate::stitcher::{stitch_tracks, StitchStrategy};
use crate::{
    Connection, Facility, ObjectFix, Result, Track, TrackerConfig, TrackerError, UpstreamClient,
};

/// The complete output of one refresh cycle.
#[derive(Debug, Clone)]
pub struct RefreshResult {
    /// Reconstructed trajectories, keyed by track id.
    pub tracks: BTreeMap<String, Track>,
    /// One connection per track with a current position, sorted by
    /// distance ascending.
    pub connections: Vec<Connection>,
    /// Facilities chosen by at least one object, sorted by id.
    pub used_facilities: Vec<Facility>,
}

impl RefreshResult {
    fn empty() -> Self {
        Self {
            tracks: BTreeMap::new(),
            connections: Vec::new(),
            used_facilities: Vec::new(),
        }
    }
}

/// Extract one current fix per track, in deterministic (track id) order.
///
/// Each track's most recent sample becomes the matcher input for that
/// object.
pub fn current_fixes(tracks: &BTreeMap<String, Track>) -> Vec<ObjectFix> {
    tracks
        .values()
        .filter_map(|track| {
            track.latest().map(|point| ObjectFix {
                track_id: track.id.clone(),
                position: point.position,
            })
        })
        .collect()
}

/// Stateful refresh pipeline.
///
/// Owns the upstream client and the last published [`RefreshResult`].
pub struct RefreshEngine {
    client: UpstreamClient,
    strategy: StitchStrategy,
    state: Mutex<Arc<RefreshResult>>,
    refresh_guard: tokio::sync::Mutex<()>,
}

impl RefreshEngine {
    /// Create an engine from the tracker configuration.
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        Ok(Self {
            client: UpstreamClient::new(config)?,
            strategy: config.stitch_strategy,
            state: Mutex::new(Arc::new(RefreshResult::empty())),
            refresh_guard: tokio::sync::Mutex::new(()),
        })
    }

    /// The last published result.
    ///
    /// Before the first successful refresh this is an empty result, the
    /// degraded-but-visible state the embedding application should show.
    pub fn current(&self) -> Arc<RefreshResult> {
        Arc::clone(&self.state.lock().unwrap())
    }

    /// Run one full refresh cycle and publish the result.
    ///
    /// Snapshot fetching and facility loading run concurrently; the
    /// matcher waits on both. Per-hour snapshot failures have already been
    /// degraded to empty hours by the fetcher; facility-load failures and
    /// match precondition failures propagate to the caller, leaving the
    /// previously published result in place.
    ///
    /// Fails with `RefreshInProgress` if another refresh is still running;
    /// the overlapping call is skipped, never queued.
    pub async fn refresh(&self) -> Result<Arc<RefreshResult>> {
        let _guard = self
            .refresh_guard
            .try_lock()
            .map_err(|_| TrackerError::RefreshInProgress)?;

        let (snapshots, facilities) = tokio::join!(
            self.client.fetch_24h_snapshots(),
            self.client.fetch_facilities(),
        );
        let facilities = facilities?;

        let tracks = stitch_tracks(&snapshots, self.strategy);
        let fixes = current_fixes(&tracks);
        let outcome = match_facilities(&fixes, &facilities)?;

        let result = Arc::new(RefreshResult {
            tracks,
            connections: outcome.connections,
            used_facilities: outcome.used_facilities,
        });

        info!(
            "[RefreshEngine] Published {} tracks, {} connections, {} facilities in use",
            result.tracks.len(),
            result.connections.len(),
            result.used_facilities.len()
        );

        *self.state.lock().unwrap() = Arc::clone(&result);
        Ok(result)
    }

    /// Drive refreshes on a fixed period until cancelled.
    ///
    /// Ticks that would overlap a still-running refresh are skipped.
    /// Failed refreshes are logged and the loop continues; the previously
    /// published result stays visible.
    pub async fn run(&self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            match self.refresh().await {
                Ok(result) => {
                    info!(
                        "[RefreshEngine] Refresh complete: {} tracks",
                        result.tracks.len()
                    );
                }
                Err(TrackerError::RefreshInProgress) => {
                    warn!("[RefreshEngine] Previous refresh still running, tick skipped");
                }
                Err(e) => {
                    warn!("[RefreshEngine] Refresh failed: {}", e);
                }
            }
        }
    }
}
