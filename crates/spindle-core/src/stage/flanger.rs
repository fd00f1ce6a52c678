//! Flanger - the channel's modulation effect
//!
//! A short delay line whose delay is swept by a sine LFO, mixed back with the
//! dry signal. With `Mix` at zero (the default) the stage is transparent.

use super::{ParamInfo, ParamValue, Stage, StageParams};
use crate::types::{StereoBuffer, StereoSample};

const PARAMS: [ParamInfo; 4] = [
    ParamInfo::new("Mix", 0.0, 0.0, 1.0, ""),
    ParamInfo::new("Depth", 0.5, 0.0, 1.0, ""),
    ParamInfo::new("Rate", 0.1, 0.05, 5.0, "Hz"),
    ParamInfo::new("Delay", 0.25, 1.0, 10.0, "ms"),
];

pub const FLANGER_MIX: usize = 0;
pub const FLANGER_DEPTH: usize = 1;
pub const FLANGER_RATE: usize = 2;
pub const FLANGER_DELAY: usize = 3;

/// Longest delay the line must hold: max base delay plus full-depth sweep
const MAX_DELAY_MS: f32 = 20.0;

/// Circular delay line with fractional (linear interpolated) taps
struct DelayLine {
    buffer: Vec<StereoSample>,
    write_pos: usize,
}

impl DelayLine {
    fn new(max_samples: usize) -> Self {
        Self {
            buffer: vec![StereoSample::silence(); max_samples.max(2)],
            write_pos: 0,
        }
    }

    #[inline]
    fn push(&mut self, input: StereoSample) {
        self.buffer[self.write_pos] = input;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Read `delay` samples behind the most recent write
    #[inline]
    fn tap(&self, delay: f32) -> StereoSample {
        let len = self.buffer.len();
        let delay = delay.clamp(1.0, (len - 1) as f32);
        let whole = delay.floor() as usize;
        let frac = delay - whole as f32;

        let newer = (self.write_pos + len - whole) % len;
        let older = (newer + len - 1) % len;
        self.buffer[newer] * (1.0 - frac) + self.buffer[older] * frac
    }

    fn clear(&mut self) {
        self.buffer.fill(StereoSample::silence());
        self.write_pos = 0;
    }
}

pub struct Flanger {
    params: StageParams,
    sample_rate: f32,
    delay: DelayLine,
    /// LFO phase in [0, 1)
    phase: f32,
}

impl Flanger {
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f32;
        let max_samples = (MAX_DELAY_MS * 0.001 * sample_rate).ceil() as usize;
        Self {
            params: StageParams::new(&PARAMS),
            sample_rate,
            delay: DelayLine::new(max_samples),
            phase: 0.0,
        }
    }

    /// Set the wet amount (0.0 = off)
    pub fn set_mix(&mut self, mix: f32) {
        self.params.set(FLANGER_MIX, mix);
    }
}

impl Stage for Flanger {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        let mix = self.params.actual(FLANGER_MIX);
        if mix <= 0.0 {
            // Keep the line primed so enabling mid-track has no stale tail
            for sample in buffer.iter() {
                self.delay.push(*sample);
            }
            return;
        }

        let depth = self.params.actual(FLANGER_DEPTH);
        let rate = self.params.actual(FLANGER_RATE);
        let base = self.params.actual(FLANGER_DELAY) * 0.001 * self.sample_rate;
        let phase_inc = rate / self.sample_rate;

        for sample in buffer.iter_mut() {
            let lfo = (2.0 * std::f32::consts::PI * self.phase).sin();
            let delay = base * (1.0 + depth * lfo);

            self.delay.push(*sample);
            let wet = self.delay.tap(delay);
            *sample = *sample * (1.0 - mix * 0.5) + wet * (mix * 0.5);

            self.phase += phase_inc;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }

    fn name(&self) -> &'static str {
        "flanger"
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

    fn reset(&mut self) {
        self.delay.clear();
        self.phase = 0.0;
    }
}
