//! Processing stages - the fixed per-channel DSP chain
//!
//! Every stage implements [`Stage`]: an in-place transformation of a stereo
//! buffer that never changes its length. The channel runs them in the order
//! given by [`StageSlot::ALL`]:
//!
//! pregain → filter → modulation → clipping → metering
//!
//! The source-emulation stage ([`VinylSoundEmu`]) is not part of the chain; it
//! only runs on internally rendered audio.
//!
//! Stage `process` is called from the render callback. Implementations must
//! not block, lock or allocate there.

mod clipping;
mod filter;
mod flanger;
mod pregain;
mod vinyl_emu;
mod vu_meter;

pub use clipping::Clipper;
pub use filter::EqFilter;
pub use flanger::Flanger;
pub use pregain::Pregain;
pub use vinyl_emu::VinylSoundEmu;
pub use vu_meter::{MeterAtomics, VuMeter};

use serde::{Deserialize, Serialize};

use crate::config::ChannelConfig;
use crate::types::StereoBuffer;

/// Number of stages in the chain
pub const NUM_STAGES: usize = 5;

/// Position of a stage in the channel chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum StageSlot {
    Pregain = 0,
    Filter = 1,
    Modulation = 2,
    Clipping = 3,
    Metering = 4,
}

impl StageSlot {
    /// Processing order
    pub const ALL: [StageSlot; NUM_STAGES] = [
        StageSlot::Pregain,
        StageSlot::Filter,
        StageSlot::Modulation,
        StageSlot::Clipping,
        StageSlot::Metering,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StageSlot::Pregain => "pregain",
            StageSlot::Filter => "filter",
            StageSlot::Modulation => "modulation",
            StageSlot::Clipping => "clipping",
            StageSlot::Metering => "metering",
        }
    }
}

/// Description of a stage parameter
#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub name: &'static str,
    /// Default value (normalized 0.0-1.0)
    pub default: f32,
    pub min: f32,
    pub max: f32,
    pub unit: &'static str,
}

impl ParamInfo {
    pub const fn new(name: &'static str, default: f32, min: f32, max: f32, unit: &'static str) -> Self {
        Self {
            name,
            default,
            min,
            max,
            unit,
        }
    }

    /// Normalized position of an actual value within the range
    pub fn normalize(&self, actual: f32) -> f32 {
        if self.max == self.min {
            return 0.0;
        }
        ((actual - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }
}

/// Current parameter value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParamValue {
    /// Normalized value (0.0-1.0)
    pub normalized: f32,
    /// Value mapped into the parameter's range
    pub actual: f32,
}

impl ParamValue {
    pub fn from_normalized(normalized: f32, info: &ParamInfo) -> Self {
        let normalized = normalized.clamp(0.0, 1.0);
        let actual = info.min + normalized * (info.max - info.min);
        Self { normalized, actual }
    }
}

/// Shared parameter storage for the built-in stages
///
/// Values are fixed-size (one per `ParamInfo`), so setting a parameter on
/// the audio thread never allocates.
#[derive(Debug, Clone)]
pub struct StageParams {
    info: &'static [ParamInfo],
    values: Vec<ParamValue>,
    dirty: bool,
}

impl StageParams {
    pub fn new(info: &'static [ParamInfo]) -> Self {
        let values = info
            .iter()
            .map(|p| ParamValue::from_normalized(p.default, p))
            .collect();
        Self {
            info,
            values,
            dirty: true,
        }
    }

    pub fn info(&self) -> &'static [ParamInfo] {
        self.info
    }

    pub fn values(&self) -> &[ParamValue] {
        &self.values
    }

    /// Set a parameter by index (normalized). Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, normalized: f32) {
        if let Some(info) = self.info.get(index) {
            self.values[index] = ParamValue::from_normalized(normalized, info);
            self.dirty = true;
        }
    }

    /// Set a parameter from a value in its actual range
    pub fn set_actual(&mut self, index: usize, actual: f32) {
        if let Some(info) = self.info.get(index) {
            self.set(index, info.normalize(actual));
        }
    }

    #[inline]
    pub fn actual(&self, index: usize) -> f32 {
        self.values.get(index).map(|p| p.actual).unwrap_or(0.0)
    }

    /// Returns true once after any change
    #[inline]
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

/// The capability every channel stage implements
pub trait Stage: Send {
    /// Process the buffer in place
    fn process(&mut self, buffer: &mut StereoBuffer);

    /// Short name for logs and UI
    fn name(&self) -> &'static str;

    /// Parameter descriptions (empty for stages without parameters)
    fn params(&self) -> &'static [ParamInfo] {
        &[]
    }

    /// Set a parameter by index (normalized 0.0-1.0)
    fn set_param(&mut self, _index: usize, _value: f32) {}

    /// Current parameter values
    fn param_values(&self) -> &[ParamValue] {
        &[]
    }

    /// Clear internal state (filter memories, delay lines)
    fn reset(&mut self) {}
}

/// The five chain stages of one channel, in processing order
pub struct ChannelStages {
    pub pregain: Box<dyn Stage>,
    pub filter: Box<dyn Stage>,
    pub modulation: Box<dyn Stage>,
    pub clipping: Box<dyn Stage>,
    pub metering: Box<dyn Stage>,
}

impl ChannelStages {
    /// Built-in stages configured from `config`
    ///
    /// Also returns the meter's atomics so the UI can read levels.
    pub fn from_config(config: &ChannelConfig) -> (Self, std::sync::Arc<MeterAtomics>) {
        let meter = VuMeter::new(config.sample_rate, config.meter_falloff_db_per_sec);
        let meter_atomics = meter.atomics();
        let mut filter = EqFilter::new(config.sample_rate);
        for (band, value) in config.eq.iter().enumerate() {
            filter.set_band(band, *value);
        }
        let mut flanger = Flanger::new(config.sample_rate);
        flanger.set_mix(config.flanger_mix);

        let stages = Self {
            pregain: Box::new(Pregain::with_gain_db(config.pregain_db)),
            filter: Box::new(filter),
            modulation: Box::new(flanger),
            clipping: Box::new(Clipper::with_threshold_db(config.clip_threshold_db)),
            metering: Box::new(meter),
        };
        (stages, meter_atomics)
    }

    /// Convert into the fixed-order array the channel iterates
    pub fn into_array(self) -> [Box<dyn Stage>; NUM_STAGES] {
        [
            self.pregain,
            self.filter,
            self.modulation,
            self.clipping,
            self.metering,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PARAMS: [ParamInfo; 2] = [
        ParamInfo::new("Gain", 0.5, -24.0, 24.0, "dB"),
        ParamInfo::new("Mix", 0.0, 0.0, 1.0, ""),
    ];

    #[test]
    fn test_param_value_mapping() {
        let info = ParamInfo::new("Test", 0.5, 0.0, 100.0, "");

        assert_eq!(ParamValue::from_normalized(0.5, &info).actual, 50.0);
        assert_eq!(ParamValue::from_normalized(1.0, &info).actual, 100.0);
        assert_eq!(ParamValue::from_normalized(2.0, &info).normalized, 1.0);
        assert_eq!(info.normalize(25.0), 0.25);
    }

    #[test]
    fn test_stage_params_defaults_and_dirty_flag() {
        let mut params = StageParams::new(&TEST_PARAMS);
        assert_eq!(params.actual(0), 0.0);
        assert_eq!(params.actual(1), 0.0);
        assert!(params.take_dirty());
        assert!(!params.take_dirty());

        params.set(0, 1.0);
        assert_eq!(params.actual(0), 24.0);
        assert!(params.take_dirty());

        params.set_actual(0, -12.0);
        assert_eq!(params.actual(0), -12.0);

        // Unknown index is ignored
        params.set(7, 1.0);
        assert_eq!(params.values().len(), 2);
    }

    #[test]
    fn test_slot_order() {
        let names: Vec<&str> = StageSlot::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["pregain", "filter", "modulation", "clipping", "metering"]);
        assert_eq!(StageSlot::Clipping as usize, 3);
    }
}
