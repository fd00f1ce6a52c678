//! Vinyl sound emulation for internally played audio
//!
//! A real record gets quieter as the platter slows to a stop. When the
//! channel plays its internal source at less than normal speed, the output is
//! attenuated proportionally (|speed| below 1.0), ramped per buffer.

use super::{ParamInfo, ParamValue, Stage, StageParams};
use crate::types::StereoBuffer;

const PARAMS: [ParamInfo; 1] = [ParamInfo::new("Speed", 0.75, -2.0, 2.0, "x")];

const SPEED: usize = 0;

pub struct VinylSoundEmu {
    params: StageParams,
    /// Gain applied at the end of the previous buffer
    gain: f32,
}

impl VinylSoundEmu {
    pub fn new() -> Self {
        Self {
            params: StageParams::new(&PARAMS),
            gain: 1.0,
        }
    }

    /// Current playback speed (1.0 = normal, negative = reverse)
    pub fn speed(&self) -> f32 {
        self.params.actual(SPEED)
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.params.set_actual(SPEED, speed);
    }

    fn target_gain(&self) -> f32 {
        self.speed().abs().min(1.0)
    }
}

impl Default for VinylSoundEmu {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for VinylSoundEmu {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        let target = self.target_gain();
        if buffer.is_empty() {
            return;
        }
        if target >= 1.0 && self.gain >= 1.0 {
            return;
        }

        let step = (target - self.gain) / buffer.len() as f32;
        let mut gain = self.gain;
        for sample in buffer.iter_mut() {
            gain += step;
            *sample *= gain;
        }
        self.gain = target;
    }

    fn name(&self) -> &'static str {
        "vinyl-emu"
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
        self.gain = self.target_gain();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_speed_is_transparent() {
        let mut emu = VinylSoundEmu::new();
        assert_eq!(emu.speed(), 1.0);

        let mut buffer = StereoBuffer::from_interleaved(&[0.7, -0.7, 0.3, -0.3]);
        emu.process(&mut buffer);
        assert_eq!(buffer.as_interleaved(), &[0.7, -0.7, 0.3, -0.3]);
    }

    #[test]
    fn test_slow_platter_fades_out() {
        let mut emu = VinylSoundEmu::new();
        emu.set_speed(0.0);

        let mut buffer = StereoBuffer::from_interleaved(&[1.0; 8]);
        emu.process(&mut buffer);
        // Ramp from unity down to silence over the buffer
        assert!(buffer[0].left < 1.0);
        assert!(buffer[3].left.abs() < 1e-6);

        let mut buffer = StereoBuffer::from_interleaved(&[1.0; 8]);
        emu.process(&mut buffer);
        assert!(buffer.is_silent());
    }

    #[test]
    fn test_reverse_uses_magnitude() {
        let mut emu = VinylSoundEmu::new();
        emu.set_speed(-1.0);
        let mut buffer = StereoBuffer::from_interleaved(&[0.5, 0.5]);
        emu.process(&mut buffer);
        assert_eq!(buffer[0].left, 0.5);
    }
}
