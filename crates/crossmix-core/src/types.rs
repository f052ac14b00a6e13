//! Common types for Crossmix
//!
//! Fundamental audio types shared by the engine, loader, and backend:
//! stereo samples and buffers, stem identifiers, and the two deck identities.

use std::ops::{Index, IndexMut};

/// Default sample rate (48kHz, standard professional audio rate).
/// The actual rate is read from the output device at stream startup.
pub const SAMPLE_RATE: u32 = 48000;

/// Number of decks in the mixer. Exactly two - deck A and deck B.
pub const NUM_DECKS: usize = 2;

/// Number of stems per deck (Drums, Bass, Vocals, Other)
pub const NUM_STEMS: usize = 4;

/// Audio sample type (32-bit float throughout the graph)
pub type Sample = f32;

/// Track identifier assigned by the storage collaborator
pub type TrackId = i64;

/// Deck identity. The mixer has exactly two decks, never more or fewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeckId {
    A,
    B,
}

impl DeckId {
    /// Both decks in A, B order
    pub const BOTH: [DeckId; NUM_DECKS] = [DeckId::A, DeckId::B];

    /// Array index for per-deck storage
    #[inline]
    pub fn index(self) -> usize {
        match self {
            DeckId::A => 0,
            DeckId::B => 1,
        }
    }

    /// The opposite deck
    pub fn other(self) -> DeckId {
        match self {
            DeckId::A => DeckId::B,
            DeckId::B => DeckId::A,
        }
    }
}

impl std::fmt::Display for DeckId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeckId::A => write!(f, "A"),
            DeckId::B => write!(f, "B"),
        }
    }
}

/// Stem identifiers, in the order the separation backend produces them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Stem {
    Drums = 0,
    Bass = 1,
    Vocals = 2,
    Other = 3,
}

impl Stem {
    /// All stems in order
    pub const ALL: [Stem; NUM_STEMS] = [Stem::Drums, Stem::Bass, Stem::Vocals, Stem::Other];

    /// Convert from index (0-3) to Stem
    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(Stem::Drums),
            1 => Some(Stem::Bass),
            2 => Some(Stem::Vocals),
            3 => Some(Stem::Other),
            _ => None,
        }
    }

    /// Wire name used by the storage collaborator ("drums", "bass", ...)
    pub fn name(&self) -> &'static str {
        match self {
            Stem::Drums => "drums",
            Stem::Bass => "bass",
            Stem::Vocals => "vocals",
            Stem::Other => "other",
        }
    }
}

/// Playback state for a deck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
}

/// A single stereo sample (left and right channels)
///
/// `#[repr(C)]` guarantees the [left, right] layout, so a `&[StereoSample]`
/// can be reinterpreted as interleaved `&[f32]` with bytemuck - the output
/// callback writes interleaved frames without per-sample conversion.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// A silent sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Same value in both channels
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

impl std::ops::MulAssign<Sample> for StereoSample {
    #[inline]
    fn mul_assign(&mut self, factor: Sample) {
        self.left *= factor;
        self.right *= factor;
    }
}

/// A buffer of stereo samples - the primary audio buffer of the graph
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create an empty buffer with the given capacity (in stereo frames)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    /// Build from interleaved samples [L, R, L, R, ...]
    pub fn from_interleaved(interleaved: &[Sample]) -> Self {
        assert!(interleaved.len() % 2 == 0, "interleaved buffer must have even length");
        let samples = interleaved
            .chunks_exact(2)
            .map(|chunk| StereoSample::new(chunk[0], chunk[1]))
            .collect();
        Self { samples }
    }

    /// Build from separate left and right channel slices
    pub fn from_channels(left: &[Sample], right: &[Sample]) -> Self {
        assert_eq!(left.len(), right.len(), "channel lengths must match");
        let samples = left
            .iter()
            .zip(right.iter())
            .map(|(&l, &r)| StereoSample::new(l, r))
            .collect();
        Self { samples }
    }

    /// Wrap an existing Vec of frames
    pub fn from_vec(samples: Vec<StereoSample>) -> Self {
        Self { samples }
    }

    /// Number of stereo frames
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Set the working length of a pre-allocated buffer (real-time safe)
    ///
    /// Never allocates as long as `new_len <= capacity`. Newly exposed
    /// frames are silenced.
    #[inline]
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        if new_len > self.samples.len() {
            debug_assert!(
                new_len <= self.samples.capacity(),
                "set_len_from_capacity beyond capacity"
            );
            self.samples.resize(new_len, StereoSample::silence());
        } else {
            self.samples.truncate(new_len);
        }
    }

    /// Fill with silence
    pub fn fill_silence(&mut self) {
        self.samples.fill(StereoSample::silence());
    }

    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.samples
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }

    /// Zero-copy view as interleaved f32 [L, R, L, R, ...]
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.samples)
    }

    /// Zero-copy mutable view as interleaved f32
    #[inline]
    pub fn as_interleaved_mut(&mut self) -> &mut [Sample] {
        bytemuck::cast_slice_mut(&mut self.samples)
    }

    /// Sum another buffer into this one (lengths must match)
    pub fn add_buffer(&mut self, other: &StereoBuffer) {
        assert_eq!(self.len(), other.len(), "buffer lengths must match");
        for (dst, src) in self.samples.iter_mut().zip(other.samples.iter()) {
            *dst += *src;
        }
    }

    /// Scale all frames by a factor
    pub fn scale(&mut self, factor: Sample) {
        for sample in &mut self.samples {
            *sample *= factor;
        }
    }

    #[inline]
    pub fn push(&mut self, sample: StereoSample) {
        self.samples.push(sample);
    }

    pub fn iter(&self) -> impl Iterator<Item = &StereoSample> {
        self.samples.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut StereoSample> {
        self.samples.iter_mut()
    }

    /// Peak amplitude in the buffer
    pub fn peak(&self) -> Sample {
        self.samples.iter().map(|s| s.peak()).fold(0.0, Sample::max)
    }
}

impl Index<usize> for StereoBuffer {
    type Output = StereoSample;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl IndexMut<usize> for StereoBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.samples[index]
    }
}

/// One decoded buffer per stem
///
/// A stem set is only usable for playback when all four buffers share the
/// same length; partially-fetched sets stay in the cache but the deck falls
/// back to the full mix.
#[derive(Debug, Clone)]
pub struct StemBuffers {
    pub drums: StereoBuffer,
    pub bass: StereoBuffer,
    pub vocals: StereoBuffer,
    pub other: StereoBuffer,
}

impl StemBuffers {
    pub fn with_length(len: usize) -> Self {
        Self {
            drums: StereoBuffer::silence(len),
            bass: StereoBuffer::silence(len),
            vocals: StereoBuffer::silence(len),
            other: StereoBuffer::silence(len),
        }
    }

    /// Get a buffer by stem
    pub fn get(&self, stem: Stem) -> &StereoBuffer {
        match stem {
            Stem::Drums => &self.drums,
            Stem::Bass => &self.bass,
            Stem::Vocals => &self.vocals,
            Stem::Other => &self.other,
        }
    }

    /// Get a mutable buffer by stem
    pub fn get_mut(&mut self, stem: Stem) -> &mut StereoBuffer {
        match stem {
            Stem::Drums => &mut self.drums,
            Stem::Bass => &mut self.bass,
            Stem::Vocals => &mut self.vocals,
            Stem::Other => &mut self.other,
        }
    }

    /// Number of frames (all stems share it when complete)
    pub fn len(&self) -> usize {
        self.drums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drums.is_empty()
    }

    /// True when all four stems are present with equal, non-zero length
    pub fn is_complete(&self) -> bool {
        let len = self.drums.len();
        len > 0
            && self.bass.len() == len
            && self.vocals.len() == len
            && self.other.len() == len
    }
}
