//! Configuration for the channel pipeline and mixer
//!
//! - Generic YAML config loading/saving
//! - Channel and mixer settings
//! - Default config location
//!
//! ```ignore
//! use spindle_core::config::{default_config_path, load_config, SpindleConfig};
//!
//! let config: SpindleConfig = load_config(&default_config_path());
//! ```

mod channel;
mod io;

pub use channel::{ChannelConfig, MixerConfig, SpindleConfig};
pub use io::{load_config, save_config};

use std::path::PathBuf;

/// `<platform config dir>/spindle/spindle.yaml`, or `./spindle.yaml` when the
/// platform has no config dir
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spindle")
        .join("spindle.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_ends_with_filename() {
        assert!(default_config_path().ends_with("spindle/spindle.yaml"));
    }
}
