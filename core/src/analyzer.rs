use crate::error::{Result, ToneSwitchError};
use crate::{ADC_CENTER, BLOCK_SAMPLES, MIN_TONE_ENERGY, SAMPLE_RATE_HZ, SIGNAL_THRESHOLD, TONE_THRESHOLD_RATIO};
use std::f32::consts::PI;

/// Standard DTMF tone detector over fixed 128-sample windows
///
/// Frequency design:
/// - Row (low) frequencies (4): 697, 770, 852, 941 Hz
/// - Column (high) frequencies (4): 1209, 1336, 1477, 1633 Hz
/// - 16 symbols arranged on the 4x4 keypad grid
///
/// Detection uses the Goertzel algorithm per probed frequency; a symbol
/// is reported only when one row and one column tone dominate their bands.

/// Row (low) frequency band
pub const DTMF_ROW_FREQS: [f32; 4] = [697.0, 770.0, 852.0, 941.0];

/// Column (high) frequency band
pub const DTMF_COL_FREQS: [f32; 4] = [1209.0, 1336.0, 1477.0, 1633.0];

/// Number of probed frequencies (rows then columns)
pub const DTMF_NUM_TONES: usize = 8;

/// Keypad layout, indexed by [row][column]
const DTMF_SYMBOLS: [[char; 4]; 4] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];

/// Tone data derived from one sample block. Produced once per cycle,
/// never persisted across cycles.
#[derive(Clone, Debug)]
pub struct SignalReading {
    /// Goertzel magnitude squared per probed frequency, rows then columns
    pub magnitudes: [f32; DTMF_NUM_TONES],
    /// Carrier/audio activity detected, independent of symbol decode
    pub signal_present: bool,
    /// Decoded DTMF symbol, if one tone pair dominates the block
    pub symbol: Option<char>,
}

/// DTMF analyzer - classifies tone content of raw ADC sample blocks
pub struct DtmfAnalyzer {
    sample_rate: f32,
    center: i16,
    signal_threshold: i64,
    threshold_ratio: f32,
}

impl DtmfAnalyzer {
    pub fn new() -> Self {
        Self {
            sample_rate: SAMPLE_RATE_HZ as f32,
            center: ADC_CENTER,
            signal_threshold: SIGNAL_THRESHOLD,
            threshold_ratio: TONE_THRESHOLD_RATIO,
        }
    }

    /// Set the minimum |deviation sum| per block that counts as signal present
    pub fn set_signal_threshold(&mut self, threshold: i64) {
        self.signal_threshold = threshold.max(1);
    }

    /// Get the current signal-presence threshold
    pub fn signal_threshold(&self) -> i64 {
        self.signal_threshold
    }

    /// Set the in-band dominance ratio required for a decode
    pub fn set_threshold_ratio(&mut self, ratio: f32) {
        self.threshold_ratio = ratio.max(1.0);
    }

    /// Get the current dominance ratio
    pub fn threshold_ratio(&self) -> f32 {
        self.threshold_ratio
    }

    /// Compute power for a specific frequency using Goertzel algorithm
    fn goertzel(&self, samples: &[f32], freq: f32) -> f32 {
        let n = samples.len();
        let k = (0.5 + (n as f32 * freq / self.sample_rate)) as usize;
        let omega = 2.0 * PI * k as f32 / n as f32;
        let coeff = 2.0 * omega.cos();

        let mut q1 = 0.0;
        let mut q2 = 0.0;

        for &sample in samples {
            let q0 = coeff * q1 - q2 + sample;
            q2 = q1;
            q1 = q0;
        }

        // Compute magnitude squared (power)
        let real = q1 - q2 * omega.cos();
        let imag = q2 * omega.sin();
        real * real + imag * imag
    }

    /// Per-tone power for one sample block, rows then columns
    ///
    /// The block is centered on the DC-bias reference before analysis.
    pub fn magnitudes(&self, block: &[i16]) -> Result<[f32; DTMF_NUM_TONES]> {
        if block.len() != BLOCK_SAMPLES {
            return Err(ToneSwitchError::InvalidInputSize);
        }

        let centered: Vec<f32> = block
            .iter()
            .map(|&s| (s - self.center) as f32)
            .collect();

        let mut magnitudes = [0.0f32; DTMF_NUM_TONES];
        for (i, &freq) in DTMF_ROW_FREQS.iter().enumerate() {
            magnitudes[i] = self.goertzel(&centered, freq);
        }
        for (i, &freq) in DTMF_COL_FREQS.iter().enumerate() {
            magnitudes[4 + i] = self.goertzel(&centered, freq);
        }

        Ok(magnitudes)
    }

    /// Analyze one sample block into the per-cycle reading
    pub fn analyze(&self, block: &[i16]) -> Result<SignalReading> {
        let magnitudes = self.magnitudes(block)?;
        let deviation = signal_energy(block, self.center);
        let signal_present = deviation.abs() > self.signal_threshold;
        let symbol = classify(&magnitudes, self.threshold_ratio);

        log::debug!(
            "block: symbol={:?} deviation={} present={}",
            symbol,
            deviation,
            signal_present
        );

        Ok(SignalReading {
            magnitudes,
            signal_present,
            symbol,
        })
    }
}

impl Default for DtmfAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Signed sum of per-sample deviation from the DC-bias center
///
/// The sign carries no information; callers take the absolute value.
pub fn signal_energy(block: &[i16], center: i16) -> i64 {
    block.iter().map(|&s| (s as i64) - (center as i64)).sum()
}

/// Classify one block's tone magnitudes into a DTMF symbol
///
/// The strongest row and column tone must each exceed `threshold_ratio`
/// times every other tone in their band, the pair must be balanced
/// across bands, and the combined energy must clear the detection floor.
pub fn classify(magnitudes: &[f32; DTMF_NUM_TONES], threshold_ratio: f32) -> Option<char> {
    let (row_idx, row_max) = band_peak(&magnitudes[..4]);
    let (col_idx, col_max) = band_peak(&magnitudes[4..]);

    if row_max + col_max < MIN_TONE_ENERGY {
        return None;
    }

    for (i, &power) in magnitudes[..4].iter().enumerate() {
        if i != row_idx && row_max < power * threshold_ratio {
            return None;
        }
    }
    for (i, &power) in magnitudes[4..].iter().enumerate() {
        if i != col_idx && col_max < power * threshold_ratio {
            return None;
        }
    }

    // Reject one-sided detections (single tone, or hum in one band only)
    if row_max.min(col_max) * threshold_ratio < row_max.max(col_max) {
        return None;
    }

    Some(DTMF_SYMBOLS[row_idx][col_idx])
}

fn band_peak(band: &[f32]) -> (usize, f32) {
    let mut peak_idx = 0;
    let mut peak = 0.0;
    for (i, &power) in band.iter().enumerate() {
        if power > peak {
            peak = power;
            peak_idx = i;
        }
    }
    (peak_idx, peak)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Simple PRNG for reproducible noise
    fn simple_rand(seed: &mut u64) -> f32 {
        *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((*seed >> 32) as f32) / (u32::MAX as f32) * 2.0 - 1.0
    }

    /// Synthesize one block of a dual-tone symbol in ADC counts
    fn tone_block(row_freq: f32, col_freq: f32, amplitude: f32) -> Vec<i16> {
        let sample_rate = SAMPLE_RATE_HZ as f32;
        (0..BLOCK_SAMPLES)
            .map(|i| {
                let t = i as f32 / sample_rate;
                let low = (2.0 * PI * row_freq * t).sin();
                let high = (2.0 * PI * col_freq * t).sin();
                ADC_CENTER + ((low + high) * amplitude) as i16
            })
            .collect()
    }

    fn silence_block() -> Vec<i16> {
        vec![ADC_CENTER; BLOCK_SAMPLES]
    }

    #[test]
    fn test_frequency_constants() {
        assert_eq!(DTMF_ROW_FREQS.len(), 4);
        assert_eq!(DTMF_COL_FREQS.len(), 4);
        assert_eq!(DTMF_NUM_TONES, 8);
    }

    #[test]
    fn test_classify_all_16_symbols() {
        let analyzer = DtmfAnalyzer::new();

        for (row, &row_freq) in DTMF_ROW_FREQS.iter().enumerate() {
            for (col, &col_freq) in DTMF_COL_FREQS.iter().enumerate() {
                let block = tone_block(row_freq, col_freq, 180.0);
                let magnitudes = analyzer.magnitudes(&block).unwrap();
                let symbol = classify(&magnitudes, TONE_THRESHOLD_RATIO);
                assert_eq!(
                    symbol,
                    Some(DTMF_SYMBOLS[row][col]),
                    "symbol at row {} col {} failed to classify",
                    row,
                    col
                );
            }
        }
    }

    #[test]
    fn test_classify_with_noise() {
        let analyzer = DtmfAnalyzer::new();
        let mut seed = 12345u64;

        let mut block = tone_block(770.0, 1336.0, 160.0);
        for sample in block.iter_mut() {
            *sample += (simple_rand(&mut seed) * 20.0) as i16;
        }

        let magnitudes = analyzer.magnitudes(&block).unwrap();
        assert_eq!(classify(&magnitudes, TONE_THRESHOLD_RATIO), Some('5'));
    }

    #[test]
    fn test_classify_silence_is_none() {
        let analyzer = DtmfAnalyzer::new();
        let magnitudes = analyzer.magnitudes(&silence_block()).unwrap();
        assert_eq!(classify(&magnitudes, TONE_THRESHOLD_RATIO), None);
    }

    #[test]
    fn test_classify_single_tone_is_none() {
        let analyzer = DtmfAnalyzer::new();

        // Row tone only, nothing in the column band
        let sample_rate = SAMPLE_RATE_HZ as f32;
        let block: Vec<i16> = (0..BLOCK_SAMPLES)
            .map(|i| {
                let t = i as f32 / sample_rate;
                ADC_CENTER + ((2.0 * PI * 852.0 * t).sin() * 200.0) as i16
            })
            .collect();

        let magnitudes = analyzer.magnitudes(&block).unwrap();
        assert_eq!(classify(&magnitudes, TONE_THRESHOLD_RATIO), None);
    }

    #[test]
    fn test_magnitudes_invalid_block_length() {
        let analyzer = DtmfAnalyzer::new();
        let short = vec![ADC_CENTER; BLOCK_SAMPLES - 1];
        assert!(analyzer.magnitudes(&short).is_err());
    }

    #[test]
    fn test_signal_energy_signed() {
        let above = vec![ADC_CENTER + 10; BLOCK_SAMPLES];
        let below = vec![ADC_CENTER - 10; BLOCK_SAMPLES];

        assert_eq!(signal_energy(&above, ADC_CENTER), 10 * BLOCK_SAMPLES as i64);
        assert_eq!(signal_energy(&below, ADC_CENTER), -10 * BLOCK_SAMPLES as i64);
        assert_eq!(signal_energy(&silence_block(), ADC_CENTER), 0);
    }

    #[test]
    fn test_analyze_reports_presence_for_biased_audio() {
        let analyzer = DtmfAnalyzer::new();

        // Carrier with the DC shift the input conditioning produces
        let mut seed = 777u64;
        let block: Vec<i16> = (0..BLOCK_SAMPLES)
            .map(|_| ADC_CENTER + 40 + (simple_rand(&mut seed) * 15.0) as i16)
            .collect();

        let reading = analyzer.analyze(&block).unwrap();
        assert!(reading.signal_present);
        assert_eq!(reading.symbol, None);
    }

    #[test]
    fn test_analyze_silence_not_present() {
        let analyzer = DtmfAnalyzer::new();
        let reading = analyzer.analyze(&silence_block()).unwrap();
        assert!(!reading.signal_present);
        assert_eq!(reading.symbol, None);
    }

    #[test]
    fn test_threshold_setters_clamp() {
        let mut analyzer = DtmfAnalyzer::new();

        analyzer.set_signal_threshold(0);
        assert_eq!(analyzer.signal_threshold(), 1);

        analyzer.set_threshold_ratio(0.5);
        assert_eq!(analyzer.threshold_ratio(), 1.0);

        analyzer.set_threshold_ratio(6.0);
        assert_eq!(analyzer.threshold_ratio(), 6.0);
    }
}
