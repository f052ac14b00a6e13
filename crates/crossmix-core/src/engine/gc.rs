//! RT-safe deferred deallocation for track buffers
//!
//! Decoded tracks are hundreds of megabytes; freeing one inside the audio
//! callback (when a deck swaps tracks and drops the last reference) would
//! stall the stream. `basedrop::Shared` pointers enqueue the drop instead,
//! and a background thread reclaims the memory where latency is irrelevant.

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// How often the GC thread sweeps deferred drops
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    // The Collector is !Sync, so it lives on its own thread and only the
    // cloneable Handle escapes.
    thread::Builder::new()
        .name("audio-gc".to_string())
        .spawn(move || {
            let mut collector = Collector::new();
            tx.send(collector.handle()).expect("send GC handle");
            log::info!("audio GC thread started");
            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("spawn audio GC thread");

    rx.recv().expect("receive GC handle")
}

/// Handle for allocating `Shared<T>` values
///
/// Lightweight and cloneable; the first call spawns the collector thread.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
