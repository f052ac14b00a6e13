//! Track loading: fetch, decode, cache
//!
//! The storage collaborator is abstracted behind [`AudioSource`]; fetched
//! bytes are decoded with symphonia into stereo f32 buffers. Decoding runs
//! on a background worker thread; results come back over a crossbeam channel
//! so the control thread polls without blocking. The cache de-duplicates
//! in-flight loads per track id - at most one decode runs per key.
//!
//! Decoded tracks are wrapped in `basedrop::Shared` so the audio thread can
//! drop replaced tracks without paying the deallocation cost (see
//! [`crate::engine::gc`]).

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::thread;

use basedrop::Shared;
use crossbeam::channel::{unbounded, Receiver, Sender};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::analysis::{StemsStatus, TrackAnalysis};
use crate::engine::gc::gc_handle;
use crate::error::{LoadError, LoadResult};
use crate::types::{Stem, StemBuffers, StereoBuffer, TrackId, SAMPLE_RATE};

/// The storage collaborator: raw audio bytes by track id
///
/// Implementations must serve fresh content on every call (no stale HTTP
/// caching) - a track can be replaced in place under the same id, and the
/// [`TrackLoader`] cache is the only layer allowed to memoize, via explicit
/// [`TrackLoader::invalidate`].
pub trait AudioSource: Send {
    /// Fetch the full-mix audio bytes for a track
    fn fetch_track(&self, track_id: TrackId) -> LoadResult<Vec<u8>>;

    /// Fetch one stem's audio bytes for a track
    fn fetch_stem(&self, track_id: TrackId, stem: Stem) -> LoadResult<Vec<u8>>;

    /// Stem separation status for a track
    fn stems_status(&self, track_id: TrackId) -> LoadResult<StemsStatus>;
}

/// A fully decoded track, ready for a deck
pub struct LoadedTrack {
    pub id: TrackId,
    /// Sample rate of the decoded buffers (decks rate-convert on read)
    pub sample_rate: u32,
    /// The full mix
    pub full: StereoBuffer,
    /// Complete stem set, when separation was ready at load time
    pub stems: Option<StemBuffers>,
    /// Analysis snapshot captured at load time
    pub analysis: Option<TrackAnalysis>,
}

impl LoadedTrack {
    /// Track length in frames
    pub fn duration_frames(&self) -> usize {
        self.full.len()
    }

    /// Track length in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.full.len() as f64 / self.sample_rate as f64
    }
}

/// Decode compressed audio bytes into a stereo buffer
///
/// Mono input is duplicated to both channels; streams with more than two
/// channels keep the first two. Returns the decoded buffer and its sample
/// rate.
pub fn decode_bytes(track_id: TrackId, bytes: Vec<u8>) -> LoadResult<(StereoBuffer, u32)> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|source| LoadError::DecodeFailed { track_id, source })?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(LoadError::EmptyStream(track_id))?;
    let stream_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(SAMPLE_RATE);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|source| LoadError::DecodeFailed { track_id, source })?;

    let mut buffer = StereoBuffer::with_capacity(sample_rate as usize * 60);
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut channels = 2usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(source) => return Err(LoadError::DecodeFailed { track_id, source }),
        };
        if packet.track_id() != stream_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if sample_buf.is_none() {
                    let spec = *decoded.spec();
                    channels = spec.channels.count();
                    sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                }
                let sbuf = sample_buf.as_mut().expect("sample buffer initialized above");
                sbuf.copy_interleaved_ref(decoded);
                let samples = sbuf.samples();
                match channels {
                    0 => {}
                    1 => {
                        for &s in samples {
                            buffer.push(crate::types::StereoSample::mono(s));
                        }
                    }
                    n => {
                        for frame in samples.chunks_exact(n) {
                            buffer.push(crate::types::StereoSample::new(frame[0], frame[1]));
                        }
                    }
                }
            }
            // A corrupt packet is skippable; the stream continues
            Err(SymphoniaError::DecodeError(msg)) => {
                log::warn!("track {}: skipping corrupt packet: {}", track_id, msg);
            }
            Err(source) => return Err(LoadError::DecodeFailed { track_id, source }),
        }
    }

    if buffer.is_empty() {
        return Err(LoadError::EmptyStream(track_id));
    }
    Ok((buffer, sample_rate))
}

/// A load request for the background worker
pub struct LoadRequest {
    pub track_id: TrackId,
    /// Also fetch the stem set if separation is ready
    pub want_stems: bool,
    /// Analysis snapshot to attach to the loaded track
    pub analysis: Option<TrackAnalysis>,
}

/// Result messages delivered by [`TrackLoader::poll`]
pub enum LoadMessage {
    Loaded(Shared<LoadedTrack>),
    Failed { track_id: TrackId, error: LoadError },
}

/// Background track loader with a decoded-buffer cache
///
/// Lives on the control thread; owns a worker thread that fetches and
/// decodes. `request` de-duplicates against both the cache and in-flight
/// loads, `poll` drains finished results into the cache.
pub struct TrackLoader {
    requests: Sender<LoadRequest>,
    results: Receiver<LoadMessage>,
    cache: HashMap<TrackId, Shared<LoadedTrack>>,
    in_flight: HashSet<TrackId>,
}

impl TrackLoader {
    /// Create a loader and spawn its worker thread
    pub fn new(source: Box<dyn AudioSource>) -> Self {
        let (req_tx, req_rx) = unbounded::<LoadRequest>();
        let (res_tx, res_rx) = unbounded::<LoadMessage>();

        thread::Builder::new()
            .name("track-loader".to_string())
            .spawn(move || worker(source, req_rx, res_tx))
            .expect("spawn track-loader thread");

        Self {
            requests: req_tx,
            results: res_rx,
            cache: HashMap::new(),
            in_flight: HashSet::new(),
        }
    }

    /// Queue a load unless the track is already cached or being loaded.
    /// Returns whether the request was actually enqueued.
    pub fn request(&mut self, request: LoadRequest) -> bool {
        let id = request.track_id;
        if self.cache.contains_key(&id) || self.in_flight.contains(&id) {
            log::debug!("track {}: load request de-duplicated", id);
            return false;
        }
        self.in_flight.insert(id);
        // The worker outlives the loader only during shutdown races; a
        // disconnected channel just means nothing will be loaded.
        if self.requests.send(request).is_err() {
            self.in_flight.remove(&id);
            return false;
        }
        true
    }

    /// Drain finished loads into the cache and return them
    pub fn poll(&mut self) -> Vec<LoadMessage> {
        let mut messages = Vec::new();
        for msg in self.results.try_iter() {
            match &msg {
                LoadMessage::Loaded(track) => {
                    self.in_flight.remove(&track.id);
                    // Last write wins; decoded buffers are immutable
                    self.cache.insert(track.id, Shared::clone(track));
                }
                LoadMessage::Failed { track_id, error } => {
                    self.in_flight.remove(track_id);
                    log::error!("track {}: load failed: {}", track_id, error);
                }
            }
            messages.push(msg);
        }
        messages
    }

    /// Cached track, if present
    pub fn get(&self, track_id: TrackId) -> Option<&Shared<LoadedTrack>> {
        self.cache.get(&track_id)
    }

    pub fn is_loading(&self, track_id: TrackId) -> bool {
        self.in_flight.contains(&track_id)
    }

    /// Drop a cached track - required when content is replaced in place
    /// under the same id (cache busting is this layer's job).
    pub fn invalidate(&mut self, track_id: TrackId) {
        self.cache.remove(&track_id);
    }
}

fn worker(source: Box<dyn AudioSource>, requests: Receiver<LoadRequest>, results: Sender<LoadMessage>) {
    log::info!("track-loader worker started");
    for request in requests.iter() {
        let track_id = request.track_id;
        let msg = match load_one(source.as_ref(), request) {
            Ok(track) => LoadMessage::Loaded(track),
            Err(error) => LoadMessage::Failed { track_id, error },
        };
        if results.send(msg).is_err() {
            break; // loader dropped
        }
    }
}

fn load_one(source: &dyn AudioSource, request: LoadRequest) -> LoadResult<Shared<LoadedTrack>> {
    let track_id = request.track_id;
    let bytes = source.fetch_track(track_id)?;
    let (full, sample_rate) = decode_bytes(track_id, bytes)?;

    // Stems are all-or-nothing: a partial set never reaches a deck.
    let stems = if request.want_stems {
        match source.stems_status(track_id) {
            Ok(StemsStatus::Ready) => match load_stems(source, track_id) {
                Ok(stems) if stems.is_complete() => Some(stems),
                Ok(_) => {
                    log::warn!("track {}: stem lengths disagree, using full mix", track_id);
                    None
                }
                Err(e) => {
                    log::warn!("track {}: stem fetch failed ({}), using full mix", track_id, e);
                    None
                }
            },
            Ok(status) => {
                log::debug!("track {}: stems not ready ({:?})", track_id, status);
                None
            }
            Err(e) => {
                log::warn!("track {}: stems status query failed: {}", track_id, e);
                None
            }
        }
    } else {
        None
    };

    let track = LoadedTrack {
        id: track_id,
        sample_rate,
        full,
        stems,
        analysis: request.analysis,
    };
    log::info!(
        "track {}: loaded {:.1}s at {} Hz (stems: {})",
        track_id,
        track.duration_seconds(),
        track.sample_rate,
        track.stems.is_some()
    );
    Ok(Shared::new(&gc_handle(), track))
}

fn load_stems(source: &dyn AudioSource, track_id: TrackId) -> LoadResult<StemBuffers> {
    let mut stems = StemBuffers::with_length(0);
    for stem in Stem::ALL {
        let bytes = source.fetch_stem(track_id, stem)?;
        let (buffer, _) = decode_bytes(track_id, bytes)?;
        *stems.get_mut(stem) = buffer;
    }
    Ok(stems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Minimal 16-bit stereo PCM WAV
    fn wav_bytes(frames: usize, sample_rate: u32) -> Vec<u8> {
        let data_size = (frames * 4) as u32;
        let mut out = Vec::with_capacity(44 + data_size as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_size).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&2u16.to_le_bytes()); // stereo
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 4).to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_size.to_le_bytes());
        for i in 0..frames {
            let v = (((i % 64) as f32 / 64.0 - 0.5) * i16::MAX as f32) as i16;
            out.extend_from_slice(&v.to_le_bytes());
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    struct StubSource {
        fetches: Arc<AtomicUsize>,
        frames: usize,
        fail: bool,
    }

    impl AudioSource for StubSource {
        fn fetch_track(&self, track_id: TrackId) -> LoadResult<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LoadError::FetchFailed {
                    track_id,
                    reason: "stub failure".into(),
                });
            }
            Ok(wav_bytes(self.frames, 48000))
        }

        fn fetch_stem(&self, _track_id: TrackId, _stem: Stem) -> LoadResult<Vec<u8>> {
            Ok(wav_bytes(self.frames, 48000))
        }

        fn stems_status(&self, _track_id: TrackId) -> LoadResult<StemsStatus> {
            Ok(StemsStatus::Ready)
        }
    }

    fn wait_for_messages(loader: &mut TrackLoader) -> Vec<LoadMessage> {
        for _ in 0..200 {
            let msgs = loader.poll();
            if !msgs.is_empty() {
                return msgs;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("loader produced no result within 2s");
    }

    #[test]
    fn decode_roundtrips_wav() {
        let (buffer, sample_rate) = decode_bytes(1, wav_bytes(4800, 48000)).unwrap();
        assert_eq!(sample_rate, 48000);
        assert_eq!(buffer.len(), 4800);
        assert!(buffer.peak() > 0.1);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode_bytes(2, vec![0u8; 128]).unwrap_err();
        assert!(matches!(err, LoadError::DecodeFailed { track_id: 2, .. }));
    }

    #[test]
    fn loads_track_with_stems() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let mut loader = TrackLoader::new(Box::new(StubSource {
            fetches: Arc::clone(&fetches),
            frames: 1024,
            fail: false,
        }));

        assert!(loader.request(LoadRequest {
            track_id: 5,
            want_stems: true,
            analysis: None,
        }));

        let msgs = wait_for_messages(&mut loader);
        assert!(matches!(msgs[0], LoadMessage::Loaded(_)));
        let track = loader.get(5).expect("cached");
        assert_eq!(track.duration_frames(), 1024);
        assert!(track.stems.as_ref().unwrap().is_complete());
    }

    #[test]
    fn inflight_requests_deduplicate() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let mut loader = TrackLoader::new(Box::new(StubSource {
            fetches: Arc::clone(&fetches),
            frames: 256,
            fail: false,
        }));

        assert!(loader.request(LoadRequest { track_id: 9, want_stems: false, analysis: None }));
        // Second request for the same key while the first is in flight
        assert!(!loader.request(LoadRequest { track_id: 9, want_stems: false, analysis: None }));

        wait_for_messages(&mut loader);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // Cached now - still deduplicated
        assert!(!loader.request(LoadRequest { track_id: 9, want_stems: false, analysis: None }));

        // Invalidation re-opens the key (cache busting for replaced uploads)
        loader.invalidate(9);
        assert!(loader.request(LoadRequest { track_id: 9, want_stems: false, analysis: None }));
        wait_for_messages(&mut loader);
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fetch_failure_propagates() {
        let mut loader = TrackLoader::new(Box::new(StubSource {
            fetches: Arc::new(AtomicUsize::new(0)),
            frames: 256,
            fail: true,
        }));
        loader.request(LoadRequest { track_id: 3, want_stems: false, analysis: None });
        let msgs = wait_for_messages(&mut loader);
        assert!(matches!(
            msgs[0],
            LoadMessage::Failed { track_id: 3, error: LoadError::FetchFailed { .. } }
        ));
        assert!(loader.get(3).is_none());
        assert!(!loader.is_loading(3));
    }
}
