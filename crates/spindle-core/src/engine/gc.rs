//! RT-safe deferred deallocation for track buffers
//!
//! Tracks are handed to the render thread as `basedrop::Shared<StereoBuffer>`.
//! When the render thread replaces or unloads a track, dropping the pointer
//! only enqueues it; the memory is released on the `spindle-gc` thread, where
//! the syscalls behind a large free cannot cause an xrun.
//!
//! ```ignore
//! use spindle_core::engine::prepare_track;
//!
//! let track = prepare_track(decoded);   // Shared<StereoBuffer>
//! sender.send(ChannelCommand::LoadTrack { channel: 0, track })?;
//! ```

use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use basedrop::{Collector, Handle, Shared};

use crate::types::StereoBuffer;

/// How often the collector thread frees queued allocations
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("spindle-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives and dies on this thread
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::info!("Track GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("Failed to spawn track GC thread");

    rx.recv().expect("Failed to receive GC handle")
}

/// Handle for creating `Shared<T>` allocations, starting the GC thread on
/// first use
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}

/// Wrap decoded audio for loading into a channel
///
/// Call off the audio thread; this allocates.
pub fn prepare_track(buffer: StereoBuffer) -> Shared<StereoBuffer> {
    Shared::new(&gc_handle(), buffer)
}
