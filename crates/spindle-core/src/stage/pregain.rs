//! Pregain (trim) stage

use super::{ParamInfo, ParamValue, Stage, StageParams};
use crate::types::StereoBuffer;

const PARAMS: [ParamInfo; 1] = [ParamInfo::new("Gain", 24.0 / 36.0, -24.0, 12.0, "dB")];

const GAIN: usize = 0;

/// Input trim, -24 to +12 dB
///
/// Gain changes are ramped linearly across one buffer to avoid zipper noise.
pub struct Pregain {
    params: StageParams,
    /// Linear gain applied at the end of the previous buffer
    current: f32,
}

impl Pregain {
    pub fn new() -> Self {
        Self::with_gain_db(0.0)
    }

    pub fn with_gain_db(db: f32) -> Self {
        let mut params = StageParams::new(&PARAMS);
        params.set_actual(GAIN, db);
        let current = db_to_linear(params.actual(GAIN));
        Self { params, current }
    }

    pub fn gain_db(&self) -> f32 {
        self.params.actual(GAIN)
    }

    pub fn set_gain_db(&mut self, db: f32) {
        self.params.set_actual(GAIN, db);
    }
}

impl Default for Pregain {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

impl Stage for Pregain {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        let target = db_to_linear(self.gain_db());
        let len = buffer.len();
        if len == 0 {
            return;
        }

        if (target - self.current).abs() < 1e-6 {
            buffer.scale(target);
        } else {
            let step = (target - self.current) / len as f32;
            let mut gain = self.current;
            for sample in buffer.iter_mut() {
                gain += step;
                *sample *= gain;
            }
        }
        self.current = target;
    }

    fn name(&self) -> &'static str {
        "pregain"
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
        self.current = db_to_linear(self.gain_db());
    }
}
