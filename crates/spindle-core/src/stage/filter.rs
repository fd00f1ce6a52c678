//! 3-band channel EQ (low shelf, mid peak, high shelf)

use super::{ParamInfo, ParamValue, Stage, StageParams};
use crate::types::{StereoBuffer, StereoSample};

/// Knob positions: 0.0 = kill, 0.5 = flat, 1.0 = +6 dB
const PARAMS: [ParamInfo; 3] = [
    ParamInfo::new("Low", 0.5, 0.0, 1.0, ""),
    ParamInfo::new("Mid", 0.5, 0.0, 1.0, ""),
    ParamInfo::new("High", 0.5, 0.0, 1.0, ""),
];

pub const EQ_LOW: usize = 0;
pub const EQ_MID: usize = 1;
pub const EQ_HIGH: usize = 2;

const LOW_FREQ: f32 = 100.0;
const MID_FREQ: f32 = 1000.0;
const HIGH_FREQ: f32 = 10000.0;
const MID_Q: f32 = 0.7;
const SHELF_SLOPE: f32 = 0.9;

/// Bands closer to flat than this are bypassed
const FLAT_DB: f32 = 0.1;

#[derive(Debug, Clone, Copy)]
struct Coeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coeffs {
    const UNITY: Coeffs = Coeffs {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn shelf(freq: f32, gain_db: f32, sample_rate: f32, high: bool) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / SHELF_SLOPE - 1.0) + 2.0).sqrt();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
        // High shelf is the low shelf with the cosine term mirrored
        let c = if high { -cos_w0 } else { cos_w0 };
        let sign = if high { -1.0 } else { 1.0 };

        let a0 = (a + 1.0) + (a - 1.0) * c + two_sqrt_a_alpha;
        Self {
            b0: a * ((a + 1.0) - (a - 1.0) * c + two_sqrt_a_alpha) / a0,
            b1: sign * 2.0 * a * ((a - 1.0) - (a + 1.0) * c) / a0,
            b2: a * ((a + 1.0) - (a - 1.0) * c - two_sqrt_a_alpha) / a0,
            a1: sign * -2.0 * ((a - 1.0) + (a + 1.0) * c) / a0,
            a2: ((a + 1.0) + (a - 1.0) * c - two_sqrt_a_alpha) / a0,
        }
    }

    fn peaking(freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_w0) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }
}

/// Direct form I memory for both sides
#[derive(Debug, Clone, Copy, Default)]
struct Biquad {
    x1: StereoSample,
    x2: StereoSample,
    y1: StereoSample,
    y2: StereoSample,
}

impl Biquad {
    #[inline]
    fn tick(&mut self, input: StereoSample, c: &Coeffs) -> StereoSample {
        let out = StereoSample::new(
            c.b0 * input.left + c.b1 * self.x1.left + c.b2 * self.x2.left
                - c.a1 * self.y1.left
                - c.a2 * self.y2.left,
            c.b0 * input.right + c.b1 * self.x1.right + c.b2 * self.x2.right
                - c.a1 * self.y1.right
                - c.a2 * self.y2.right,
        );
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = out;
        out
    }
}

/// Channel EQ with kill-capable bands
pub struct EqFilter {
    params: StageParams,
    sample_rate: f32,
    coeffs: [Coeffs; 3],
    state: [Biquad; 3],
}

impl EqFilter {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            params: StageParams::new(&PARAMS),
            sample_rate: sample_rate as f32,
            coeffs: [Coeffs::UNITY; 3],
            state: [Biquad::default(); 3],
        }
    }

    /// Set a band knob (0.0 = kill, 0.5 = flat, 1.0 = +6 dB)
    pub fn set_band(&mut self, band: usize, value: f32) {
        self.params.set(band, value);
    }

    /// Knob position to gain: kill below 0.01, log taper to flat, linear boost above
    fn knob_to_db(value: f32) -> f32 {
        if value < 0.01 {
            -60.0
        } else if value < 0.5 {
            let t = (value - 0.01) / 0.49;
            -60.0 * (1.0 - t)
        } else {
            (value - 0.5) * 12.0
        }
    }

    fn update_coeffs(&mut self) {
        if !self.params.take_dirty() {
            return;
        }

        let sr = self.sample_rate;
        let low = Self::knob_to_db(self.params.actual(EQ_LOW));
        let mid = Self::knob_to_db(self.params.actual(EQ_MID));
        let high = Self::knob_to_db(self.params.actual(EQ_HIGH));

        self.coeffs[EQ_LOW] = if low.abs() > FLAT_DB {
            Coeffs::shelf(LOW_FREQ, low, sr, false)
        } else {
            Coeffs::UNITY
        };
        self.coeffs[EQ_MID] = if mid.abs() > FLAT_DB {
            Coeffs::peaking(MID_FREQ, mid, MID_Q, sr)
        } else {
            Coeffs::UNITY
        };
        self.coeffs[EQ_HIGH] = if high.abs() > FLAT_DB {
            Coeffs::shelf(HIGH_FREQ, high, sr, true)
        } else {
            Coeffs::UNITY
        };
    }
}

impl Stage for EqFilter {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        self.update_coeffs();

        for sample in buffer.iter_mut() {
            let mut s = *sample;
            for (state, coeffs) in self.state.iter_mut().zip(self.coeffs.iter()) {
                s = state.tick(s, coeffs);
            }
            *sample = s;
        }
    }

    fn name(&self) -> &'static str {
        "filter"
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
        self.state = [Biquad::default(); 3];
    }
}
