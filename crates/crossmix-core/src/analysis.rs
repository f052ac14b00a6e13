//! Track analysis data model
//!
//! Mirrors the analysis collaborator's response schema exactly (camelCase
//! wire names). Analyses are immutable once produced and cached by track id;
//! a replaced upload gets a fresh analysis under the same id via
//! [`AnalysisCache::invalidate`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::TrackId;

/// Beat grid reported by the analysis backend (timestamps in seconds)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeatGrid {
    pub bpm: f64,
    /// Downbeat timestamps (first beat of each bar), ordered
    pub downbeats: Vec<f64>,
    /// Every beat timestamp, ordered
    pub beats: Vec<f64>,
    /// Beats per bar (4 for everything the backend currently analyzes)
    pub bar_length: u32,
}

impl BeatGrid {
    /// Seconds per beat at the grid's tempo, None for a degenerate grid
    pub fn seconds_per_beat(&self) -> Option<f64> {
        (self.bpm > 0.0).then(|| 60.0 / self.bpm)
    }

    /// The beat timestamp nearest to `time` (seconds)
    pub fn nearest_beat(&self, time: f64) -> Option<f64> {
        self.beats
            .iter()
            .copied()
            .min_by(|a, b| {
                (a - time)
                    .abs()
                    .partial_cmp(&(b - time).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

/// Full analysis for one track, produced externally and consumed read-only
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackAnalysis {
    pub track_id: TrackId,
    /// Detected tempo, always positive for a valid analysis
    pub bpm: f64,
    /// Short key name ("Am", "F#", "Bbm")
    pub key: String,
    /// Camelot wheel number derived by the backend (1-12)
    pub key_number: u8,
    /// "major" or "minor"
    pub key_mode: String,
    /// Mean track energy in [0,1]
    pub energy: f64,
    /// Downsampled energy envelope over the track duration
    #[serde(default)]
    pub energy_curve: Vec<f64>,
    #[serde(default)]
    pub beat_grid: BeatGrid,
    /// Detected drop timestamps (seconds), ordered
    #[serde(default)]
    pub drops: Vec<f64>,
    /// Onset peaks (seconds), ordered
    #[serde(default)]
    pub peaks: Vec<f64>,
    /// Musical phrase boundaries (typically every 16 bars), ordered
    #[serde(default)]
    pub phrase_markers: Vec<f64>,
}

impl TrackAnalysis {
    /// Parse an analysis response body from the analysis collaborator
    pub fn from_json(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }

    /// First phrase marker strictly after `time`, if any
    pub fn next_phrase_marker(&self, time: f64) -> Option<f64> {
        self.phrase_markers.iter().copied().find(|&m| m > time)
    }

    /// First detected drop, if any
    pub fn first_drop(&self) -> Option<f64> {
        self.drops.first().copied()
    }
}

/// Stem separation status reported by the storage collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemsStatus {
    Pending,
    Processing,
    Ready,
    Error,
}

/// In-memory cache of analyses keyed by track id
///
/// Analyses are never mutated in place - a re-analyzed track replaces the
/// whole entry.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: HashMap<TrackId, TrackAnalysis>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an analysis, replacing any previous entry for the id
    pub fn insert(&mut self, analysis: TrackAnalysis) {
        self.entries.insert(analysis.track_id, analysis);
    }

    pub fn get(&self, track_id: TrackId) -> Option<&TrackAnalysis> {
        self.entries.get(&track_id)
    }

    /// Drop a cached analysis (track replaced in place under the same id)
    pub fn invalidate(&mut self, track_id: TrackId) {
        self.entries.remove(&track_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
