//! Spindle Core - deck channel pipeline with lock-free input passthrough

pub mod audio;
pub mod config;
pub mod engine;
pub mod source;
pub mod stage;
pub mod types;

pub use types::*;
