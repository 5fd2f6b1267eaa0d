use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use thiserror::Error;
use toneswitch_core::{
    Clock, ControlCore, ControlLoop, ControllerConfig, DtmfAnalyzer, ManualClock, OutputSink,
    SampleSource, SliceSource,
    ADC_CENTER, BLOCK_DURATION_MS, BLOCK_SAMPLES, BRIGHTNESS_STEP, RELEASE_DELAY_MS,
    SHUTDOWN_TIMEOUT_MS, SIGNAL_THRESHOLD,
};

#[derive(Parser)]
#[command(name = "toneswitch")]
#[command(about = "DTMF radio remote control for a relay with brightness and auto-shutoff")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a WAV recording of radio audio through the control pipeline
    Run {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Auto-shutoff timeout in milliseconds
        #[arg(long, default_value_t = SHUTDOWN_TIMEOUT_MS)]
        timeout_ms: u64,

        /// Hold-off after a manual shutdown in milliseconds
        #[arg(long, default_value_t = RELEASE_DELAY_MS)]
        release_delay_ms: u64,

        /// Brightness change per '*' / '#'
        #[arg(long, default_value_t = BRIGHTNESS_STEP)]
        brightness_step: u8,

        /// Drive the relay as plain on/off instead of variable duty
        #[arg(long)]
        no_brightness: bool,

        /// Signal-presence threshold (deviation sum per block)
        #[arg(long, default_value_t = SIGNAL_THRESHOLD)]
        threshold: i64,
    },

    /// Dump the per-block decode (symbol, deviation, presence) from a WAV file
    Symbols {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Signal-presence threshold (deviation sum per block)
        #[arg(long, default_value_t = SIGNAL_THRESHOLD)]
        threshold: i64,
    },
}

#[derive(Debug, Error)]
enum WavError {
    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),
}

/// Console sink: reports every output write as it happens
#[derive(Default)]
struct ConsoleSink {
    relay: u8,
    indicator: bool,
    transitions: usize,
}

impl OutputSink for ConsoleSink {
    fn set_relay(&mut self, level: u8) {
        self.relay = level;
        self.transitions += 1;
        if level == 0 {
            println!("relay -> off");
        } else {
            println!("relay -> on (level {})", level);
        }
    }

    fn set_indicator(&mut self, on: bool) {
        self.indicator = on;
        println!("indicator -> {}", if on { "on" } else { "off" });
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            timeout_ms,
            release_delay_ms,
            brightness_step,
            no_brightness,
            threshold,
        } => run_command(
            &input,
            timeout_ms,
            release_delay_ms,
            brightness_step,
            no_brightness,
            threshold,
        )?,
        Commands::Symbols { input, threshold } => symbols_command(&input, threshold)?,
    }

    Ok(())
}

fn run_command(
    input_path: &PathBuf,
    timeout_ms: u64,
    release_delay_ms: u64,
    brightness_step: u8,
    no_brightness: bool,
    threshold: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    let samples = read_wav_as_adc(input_path)?;
    println!(
        "Read {} samples ({} blocks) from {}",
        samples.len(),
        samples.len() / BLOCK_SAMPLES,
        input_path.display()
    );

    let config = ControllerConfig {
        shutdown_timeout_ms: timeout_ms,
        release_delay_ms,
        brightness_step,
        brightness_control: !no_brightness,
        ..Default::default()
    };
    log::info!(
        "timeout {} ms, release delay {} ms, brightness step {}, threshold {}",
        timeout_ms,
        release_delay_ms,
        brightness_step,
        threshold
    );

    let mut analyzer = DtmfAnalyzer::new();
    analyzer.set_signal_threshold(threshold);

    let mut control_loop = ControlLoop::new(analyzer, ControlCore::new(config)?);
    let mut source = SliceSource::new(samples);
    let mut sink = ConsoleSink::default();
    let mut clock = ManualClock::new();

    let mut last_symbol = None;
    while let Some(reading) = control_loop.run_once(&mut source, &mut sink, &mut clock)? {
        if reading.symbol != last_symbol {
            if let Some(symbol) = reading.symbol {
                println!("[{:>8} ms] decoded '{}'", clock.now_ms(), symbol);
            }
            last_symbol = reading.symbol;
        }
        clock.advance_ms(BLOCK_DURATION_MS);
    }

    let state = control_loop.core().state();
    println!(
        "Processed {} blocks ({} ms of audio), {} output transitions",
        control_loop.cycles(),
        clock.now_ms(),
        sink.transitions
    );
    println!(
        "Final state: relay {}, brightness {}, indicator {}",
        if state.active { "on" } else { "off" },
        state.brightness,
        if sink.indicator { "on" } else { "off" }
    );

    Ok(())
}

fn symbols_command(input_path: &PathBuf, threshold: i64) -> Result<(), Box<dyn std::error::Error>> {
    let samples = read_wav_as_adc(input_path)?;
    println!(
        "Read {} samples ({} blocks) from {}",
        samples.len(),
        samples.len() / BLOCK_SAMPLES,
        input_path.display()
    );

    let mut analyzer = DtmfAnalyzer::new();
    analyzer.set_signal_threshold(threshold);

    let mut source = SliceSource::new(samples);
    let mut block = [0i16; BLOCK_SAMPLES];
    let mut index = 0usize;

    while source.fill(&mut block) {
        let reading = analyzer.analyze(&block)?;
        let symbol = reading.symbol.map(String::from).unwrap_or_else(|| "-".into());
        let deviation = toneswitch_core::signal_energy(&block, ADC_CENTER);
        println!(
            "block {:>5}: symbol {} deviation {:>7} present {}",
            index, symbol, deviation, reading.signal_present
        );
        index += 1;
    }

    Ok(())
}

/// Read a WAV file and map it to 10-bit ADC counts around the bias center
fn read_wav_as_adc(input_path: &PathBuf) -> Result<Vec<i16>, Box<dyn std::error::Error>> {
    let file = File::open(input_path)?;
    let mut reader = hound::WavReader::new(file)?;

    let spec = reader.spec();
    println!(
        "Read WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    // Extract samples (handle both 16-bit and 32-bit float formats)
    let samples: Vec<f32> = match spec.bits_per_sample {
        16 => {
            let int_samples: Result<Vec<i16>, _> = reader.samples::<i16>().collect();
            int_samples?
                .into_iter()
                .map(|s| s as f32 / 32768.0)
                .collect()
        }
        32 => {
            let float_samples: Result<Vec<f32>, _> = reader.samples::<f32>().collect();
            float_samples?
        }
        other => {
            return Err(WavError::UnsupportedBitDepth(other).into());
        }
    };

    // Keep the first channel only
    let channels = spec.channels.max(1) as usize;
    let mono: Vec<f32> = samples.into_iter().step_by(channels).collect();

    // Scale [-1.0, 1.0] into 10-bit counts centered on the ADC bias
    let adc = mono
        .into_iter()
        .map(|s| {
            let clamped = s.max(-1.0).min(1.0);
            ADC_CENTER + (clamped * 511.0) as i16
        })
        .collect();

    Ok(adc)
}
