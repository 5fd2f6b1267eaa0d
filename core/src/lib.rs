//! DTMF remote-control library for radio-operated relays
//!
//! Decodes DTMF tones from a radio receiver's audio output and drives a
//! relay (light/appliance) with brightness control and an auto-shutoff timer

pub mod analyzer;
pub mod controller;
pub mod error;
pub mod output;
pub mod runner;
pub mod source;

pub use analyzer::{classify, signal_energy, DtmfAnalyzer, SignalReading};
pub use controller::{ControlCore, ControllerConfig, RelayState};
pub use error::{Result, ToneSwitchError};
pub use output::{Clock, ManualClock, OutputSink};
pub use runner::ControlLoop;
pub use source::{SampleSource, SliceSource};

// Sampling configuration
pub const SAMPLE_RATE_HZ: usize = 8926;
pub const BLOCK_SAMPLES: usize = 128;
pub const BLOCK_DURATION_MS: u64 = (BLOCK_SAMPLES * 1000 / SAMPLE_RATE_HZ) as u64; // 14

// Input conditioning: mid-rail reading of a 10-bit ADC with no signal
pub const ADC_CENTER: i16 = 512;

// Detection thresholds
pub const SIGNAL_THRESHOLD: i64 = 1800; // minimum |deviation sum| per block
pub const TONE_THRESHOLD_RATIO: f32 = 4.0; // in-band dominance required for a decode
pub const MIN_TONE_ENERGY: f32 = 1.0e5; // magnitude floor below which no symbol is reported

// Control timing
pub const SHUTDOWN_TIMEOUT_MS: u64 = 300_000;
pub const RELEASE_DELAY_MS: u64 = 2_000;

// Brightness
pub const BRIGHTNESS_STEP: u8 = 16;
pub const INITIAL_BRIGHTNESS: u8 = 255;
