//! VU meter stage - measures, never modifies
//!
//! Levels are published through relaxed atomics so the UI reads them without
//! touching the audio thread.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::Stage;
use crate::types::StereoBuffer;

/// Lock-free meter readings for one channel
#[derive(Debug, Default)]
pub struct MeterAtomics {
    /// f32 bit patterns, linear amplitude
    left: AtomicU32,
    right: AtomicU32,
    /// Highest level seen since the UI last called `take_peak`
    peak: AtomicU32,
}

impl MeterAtomics {
    pub fn left(&self) -> f32 {
        f32::from_bits(self.left.load(Ordering::Relaxed))
    }

    pub fn right(&self) -> f32 {
        f32::from_bits(self.right.load(Ordering::Relaxed))
    }

    /// Read and reset the held peak
    pub fn take_peak(&self) -> f32 {
        f32::from_bits(self.peak.swap(0, Ordering::Relaxed))
    }

    fn publish(&self, left: f32, right: f32) {
        self.left.store(left.to_bits(), Ordering::Relaxed);
        self.right.store(right.to_bits(), Ordering::Relaxed);
        let current = f32::from_bits(self.peak.load(Ordering::Relaxed));
        let loudest = left.max(right);
        if loudest > current {
            self.peak.store(loudest.to_bits(), Ordering::Relaxed);
        }
    }
}

pub struct VuMeter {
    sample_rate: f32,
    falloff_db_per_sec: f32,
    level: [f32; 2],
    atomics: Arc<MeterAtomics>,
}

impl VuMeter {
    pub fn new(sample_rate: u32, falloff_db_per_sec: f32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            falloff_db_per_sec: falloff_db_per_sec.max(0.0),
            level: [0.0; 2],
            atomics: Arc::new(MeterAtomics::default()),
        }
    }

    pub fn atomics(&self) -> Arc<MeterAtomics> {
        Arc::clone(&self.atomics)
    }
}

impl Stage for VuMeter {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        if buffer.is_empty() {
            return;
        }

        let (mut peak_l, mut peak_r) = (0.0_f32, 0.0_f32);
        for sample in buffer.iter() {
            peak_l = peak_l.max(sample.left.abs());
            peak_r = peak_r.max(sample.right.abs());
        }

        // Instant attack, falloff scaled to the buffer duration
        let seconds = buffer.len() as f32 / self.sample_rate;
        let decay = 10.0_f32.powf(-self.falloff_db_per_sec * seconds / 20.0);
        self.level[0] = peak_l.max(self.level[0] * decay);
        self.level[1] = peak_r.max(self.level[1] * decay);

        self.atomics.publish(self.level[0], self.level[1]);
    }

    fn name(&self) -> &'static str {
        "metering"
    }

    fn reset(&mut self) {
        self.level = [0.0; 2];
        self.atomics.publish(0.0, 0.0);
    }
}
