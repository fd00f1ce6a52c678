//! Passthrough - external input fed through a channel instead of playback
//!
//! The passthrough state is split in three handles over one shared block of
//! atomics, so each thread gets exclusive access to its own half without a
//! lock:
//!
//! ```text
//!  input thread                                      render thread
//! ┌────────────────────┐         ┌────────────┐         ┌───────────────────────┐
//! │ PassthroughInput   │─write()►│ SampleRing │─read()─►│ PassthroughController │
//! │ (scratch, produce) │         │            │─skip()─►│ (consume, was_active) │
//! └────────────────────┘         └────────────┘         └───────────────────────┘
//!           ▲                                                      ▲
//!           └──────────── desired_active (AtomicBool) ─────────────┘
//!                                    ▲
//!                     ChannelControl (control layer)
//! ```
//!
//! Passthrough is only *effective* when it is both requested and the ring
//! holds data. Flipping the toggle before any input arrived keeps rendering
//! the internal source instead of an empty region.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::ring::SampleRing;
use crate::audio::{InputError, InputResult};
use crate::types::{ChannelId, Sample};

/// Lock-free diagnostic counters for one channel's passthrough
///
/// The real-time threads only bump these; turning them into log lines is
/// left to the control thread (see [`ChannelControl::log_diagnostics`]).
/// Relaxed ordering: these are statistics, nothing synchronizes on them.
#[derive(Debug, Default)]
pub struct PassthroughStats {
    underflows: AtomicU64,
    overflowed_samples: AtomicU64,
    truncated_samples: AtomicU64,
    rejected_buffers: AtomicU64,
}

impl PassthroughStats {
    /// Render callbacks that found fewer samples than requested
    pub fn underflows(&self) -> u64 {
        self.underflows.load(Ordering::Relaxed)
    }

    /// Samples the ring had no room for
    pub fn overflowed_samples(&self) -> u64 {
        self.overflowed_samples.load(Ordering::Relaxed)
    }

    /// Samples dropped because an input buffer exceeded the conversion buffer
    pub fn truncated_samples(&self) -> u64 {
        self.truncated_samples.load(Ordering::Relaxed)
    }

    /// Input buffers or connection events rejected by validation
    pub fn rejected_buffers(&self) -> u64 {
        self.rejected_buffers.load(Ordering::Relaxed)
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected_buffers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            underflows: self.underflows(),
            overflowed_samples: self.overflowed_samples(),
            truncated_samples: self.truncated_samples(),
            rejected_buffers: self.rejected_buffers(),
        }
    }
}

/// Counter values at one poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub underflows: u64,
    pub overflowed_samples: u64,
    pub truncated_samples: u64,
    pub rejected_buffers: u64,
}

/// State shared between the input side, the render side and the toggle
#[derive(Debug)]
struct PassthroughShared {
    ring: SampleRing,
    desired_active: AtomicBool,
    stats: PassthroughStats,
}

/// Create the three passthrough handles around a ring holding `capacity`
/// samples
///
/// Allocates the ring (`capacity + 1` slots) and the conversion scratch
/// buffer; nothing allocates afterwards. Panics if `capacity < 2`.
pub fn passthrough(capacity: usize) -> (PassthroughController, PassthroughInput, ChannelControl) {
    assert!(capacity >= 2, "passthrough capacity must hold at least one stereo frame");
    let shared = Arc::new(PassthroughShared {
        ring: SampleRing::new(capacity + 1),
        desired_active: AtomicBool::new(false),
        stats: PassthroughStats::default(),
    });

    let controller = PassthroughController {
        shared: Arc::clone(&shared),
        was_active_last_callback: false,
    };
    let input = PassthroughInput {
        shared: Arc::clone(&shared),
        scratch: vec![0.0; capacity],
    };
    let toggle = ChannelControl { shared };

    (controller, input, toggle)
}

/// Control-layer handle for the passthrough toggle and diagnostics
#[derive(Debug, Clone)]
pub struct ChannelControl {
    shared: Arc<PassthroughShared>,
}

impl ChannelControl {
    /// Request passthrough on or off. No audio side effects.
    pub fn set_desired_active(&self, active: bool) {
        self.shared.desired_active.store(active, Ordering::Release);
    }

    pub fn desired_active(&self) -> bool {
        self.shared.desired_active.load(Ordering::Acquire)
    }

    /// Map a control value to the toggle (any positive value enables)
    pub fn set_from_control_value(&self, value: f64) {
        self.set_desired_active(value > 0.0);
    }

    /// Samples currently waiting in the ring
    pub fn buffered_samples(&self) -> usize {
        self.shared.ring.len()
    }

    /// Usable ring size in samples
    pub fn capacity(&self) -> usize {
        self.shared.ring.capacity()
    }

    pub fn stats(&self) -> &PassthroughStats {
        &self.shared.stats
    }

    /// Warn about every counter that grew since `previous`, then advance it
    ///
    /// Meant to be polled from the control thread. Returns true if anything
    /// was logged.
    pub fn log_diagnostics(&self, channel: ChannelId, previous: &mut StatsSnapshot) -> bool {
        let now = self.stats().snapshot();
        let mut logged = false;

        let underflows = now.underflows.saturating_sub(previous.underflows);
        if underflows > 0 {
            log::warn!(
                "{} passthrough underflow in {} callbacks, played silence",
                channel,
                underflows
            );
            logged = true;
        }

        let overflowed = now.overflowed_samples.saturating_sub(previous.overflowed_samples);
        if overflowed > 0 {
            log::warn!("{} passthrough overflow, dropped {} samples", channel, overflowed);
            logged = true;
        }

        let truncated = now.truncated_samples.saturating_sub(previous.truncated_samples);
        if truncated > 0 {
            log::warn!(
                "{} dropped {} samples beyond the conversion buffer",
                channel,
                truncated
            );
            logged = true;
        }

        let rejected = now.rejected_buffers.saturating_sub(previous.rejected_buffers);
        if rejected > 0 {
            log::warn!("{} rejected {} input buffers or events", channel, rejected);
            logged = true;
        }

        *previous = now;
        logged
    }
}

/// Render-side half: reads the ring and tracks the previous callback's source
#[derive(Debug)]
pub struct PassthroughController {
    shared: Arc<PassthroughShared>,
    was_active_last_callback: bool,
}

impl PassthroughController {
    /// Requested and something to play
    #[inline]
    pub fn is_passthrough_effective(&self) -> bool {
        self.desired_active() && !self.shared.ring.is_empty()
    }

    #[inline]
    pub fn desired_active(&self) -> bool {
        self.shared.desired_active.load(Ordering::Acquire)
    }

    #[inline]
    pub fn was_active_last_callback(&self) -> bool {
        self.was_active_last_callback
    }

    #[inline]
    pub fn set_was_active_last_callback(&mut self, active: bool) {
        self.was_active_last_callback = active;
    }

    /// True for the one callback that must emit the deactivation silence
    #[inline]
    pub fn deactivation_pending(&self) -> bool {
        self.was_active_last_callback && !self.desired_active()
    }

    /// Fill `output` from the ring, silencing whatever the ring cannot supply
    ///
    /// Returns the number of samples read from the ring.
    pub fn consume(&mut self, output: &mut [Sample]) -> usize {
        let supplied = self.shared.ring.read(output);
        if supplied < output.len() {
            // Input thread is not keeping pace with the render callback
            output[supplied..].fill(0.0);
            self.shared.stats.underflows.fetch_add(1, Ordering::Relaxed);
        }
        supplied
    }

    /// Discard up to `count` buffered samples
    pub fn skip(&mut self, count: usize) -> usize {
        self.shared.ring.skip(count)
    }

    pub fn buffered_samples(&self) -> usize {
        self.shared.ring.len()
    }

    pub fn stats(&self) -> &PassthroughStats {
        &self.shared.stats
    }
}

/// Input-side half: validates, converts and writes external audio
#[derive(Debug)]
pub struct PassthroughInput {
    shared: Arc<PassthroughShared>,
    /// Mono to stereo conversion space, same size as the ring
    scratch: Vec<Sample>,
}

impl PassthroughInput {
    #[inline]
    pub fn desired_active(&self) -> bool {
        self.shared.desired_active.load(Ordering::Acquire)
    }

    /// Largest number of input frames accepted per call
    #[inline]
    pub fn max_frames(&self) -> usize {
        self.scratch.len() / 2
    }

    /// Write `frames` frames of `channels`-channel audio as interleaved stereo
    ///
    /// Mono input is upmixed by duplicating each sample into both sides.
    /// Input beyond [`Self::max_frames`] is truncated, and frames the ring
    /// has no room for are dropped; both are counted and returned as the
    /// dropped stereo sample count.
    pub fn produce(&mut self, raw: &[Sample], frames: usize, channels: usize) -> InputResult<usize> {
        if channels != 1 && channels != 2 {
            self.shared.stats.record_rejected();
            return Err(InputError::UnsupportedChannelCount(channels));
        }

        let needed = frames.checked_mul(channels);
        if needed.map_or(true, |needed| raw.len() < needed) {
            self.shared.stats.record_rejected();
            return Err(InputError::ShortBuffer {
                len: raw.len(),
                frames,
                channels,
            });
        }

        let accepted_frames = frames.min(self.max_frames());
        let truncated = (frames - accepted_frames) * 2;
        if truncated > 0 {
            self.shared
                .stats
                .truncated_samples
                .fetch_add(truncated as u64, Ordering::Relaxed);
        }

        let stereo: &[Sample] = if channels == 1 {
            for (pair, &sample) in self
                .scratch
                .chunks_exact_mut(2)
                .zip(&raw[..accepted_frames])
            {
                pair[0] = sample;
                pair[1] = sample;
            }
            &self.scratch[..accepted_frames * 2]
        } else {
            &raw[..accepted_frames * 2]
        };

        // Whole frames only, so left and right never trade places. Free space
        // only grows while we write, so an even bound stays exact.
        let room = self.shared.ring.free() & !1;
        let written = self.shared.ring.write(&stereo[..stereo.len().min(room)]);
        let overflowed = stereo.len() - written;
        if overflowed > 0 {
            // Render thread is not draining fast enough
            self.shared
                .stats
                .overflowed_samples
                .fetch_add(overflowed as u64, Ordering::Relaxed);
        }

        Ok(truncated + overflowed)
    }

    /// Forget buffered input from a previous device epoch
    ///
    /// Must not run concurrently with a render callback of this channel.
    pub fn on_connection_event(&self) {
        self.shared.ring.clear();
    }

    pub(crate) fn stats(&self) -> &PassthroughStats {
        &self.shared.stats
    }
}
