//! Channel clipper
//!
//! Hard-limits each side to the threshold and raises a clip indicator the UI
//! can poll. Below the threshold samples pass untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{ParamInfo, ParamValue, Stage, StageParams};
use crate::types::StereoBuffer;

const PARAMS: [ParamInfo; 1] = [ParamInfo::new("Threshold", 1.0, -12.0, 0.0, "dBFS")];

const THRESHOLD: usize = 0;

pub struct Clipper {
    params: StageParams,
    /// Linear threshold, refreshed when the parameter changes
    threshold: f32,
    /// Set by the audio thread when a buffer clipped; the UI reads and clears
    clip_active: Arc<AtomicBool>,
}

impl Clipper {
    /// Clip at 0 dBFS
    pub fn new() -> Self {
        Self::with_threshold_db(0.0)
    }

    pub fn with_threshold_db(db: f32) -> Self {
        let mut params = StageParams::new(&PARAMS);
        params.set_actual(THRESHOLD, db);
        let threshold = 10.0_f32.powf(params.actual(THRESHOLD) / 20.0);
        Self {
            params,
            threshold,
            clip_active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Clip indicator shared with the UI thread
    pub fn clip_indicator(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.clip_active)
    }
}

impl Default for Clipper {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for Clipper {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.params.take_dirty() {
            self.threshold = 10.0_f32.powf(self.params.actual(THRESHOLD) / 20.0);
        }

        let t = self.threshold;
        let mut clipped = false;
        for sample in buffer.iter_mut() {
            if sample.peak() > t {
                clipped = true;
                sample.left = sample.left.clamp(-t, t);
                sample.right = sample.right.clamp(-t, t);
            }
        }

        if clipped {
            self.clip_active.store(true, Ordering::Relaxed);
        }
    }

    fn name(&self) -> &'static str {
        "clipping"
    }

    fn params(&self) -> &'static [ParamInfo] {
        &PARAMS
    }

    fn set_param(&mut self, index: usize, value: f32) {
        self.params.set(index, value);
    }

    fn param_values(&self) -> &[ParamValue] {
        self.params.values()
    }
}
