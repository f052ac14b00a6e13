//! Engine and loader error types

use thiserror::Error;

use crate::types::{DeckId, TrackId};

/// Errors from direct engine operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// `play` was called on a deck with no loaded track. This is a caller
    /// bug, not a degraded path - controls other than `play` are no-ops on
    /// an empty deck.
    #[error("deck {0} has no track loaded")]
    EmptyDeck(DeckId),

    /// A playback rate at or below zero was rejected
    #[error("invalid playback rate {rate} for deck {deck}")]
    InvalidRate { deck: DeckId, rate: f64 },
}

/// Errors while fetching or decoding track audio
#[derive(Error, Debug)]
pub enum LoadError {
    /// The storage collaborator failed to produce bytes
    #[error("fetch failed for track {track_id}: {reason}")]
    FetchFailed { track_id: TrackId, reason: String },

    /// The fetched bytes could not be decoded
    #[error("decode failed for track {track_id}: {source}")]
    DecodeFailed {
        track_id: TrackId,
        #[source]
        source: symphonia::core::errors::Error,
    },

    /// Decoded stream contained no audio frames
    #[error("track {0} decoded to an empty stream")]
    EmptyStream(TrackId),
}

/// Result alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result alias for loader operations
pub type LoadResult<T> = Result<T, LoadError>;
