//! Threshold spike detection for multi-unit activity (MUA).
//!
//! Produces the per-channel event streams the frame detector consumes from a
//! band-passed, referenced voltage trace in microvolts:
//! - The trace is oriented by the configured peak sign (negative spikes are flipped,
//!   `Both` uses the absolute value).
//! - Noise is the median absolute deviation scaled to a normal sigma (x 1.4826).
//! - Threshold = `max(threshold_uv, noise_multiplier * noise)`.
//! - Peaks closer than one refractory period keep only the taller one.
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::frames::peaks::find_peaks;
use crate::types::ChannelEventStream;

/// MAD -> standard deviation for normally distributed noise.
pub const MAD_TO_SIGMA: f32 = 1.4826;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeakSign {
    #[serde(rename = "pos")]
    Positive,
    #[serde(rename = "neg")]
    Negative,
    #[serde(rename = "both")]
    Both,
}

impl PeakSign {
    fn orient(self, value: f32) -> f32 {
        match self {
            PeakSign::Positive => value,
            PeakSign::Negative => -value,
            PeakSign::Both => value.abs(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeDetectionConfig {
    pub threshold_uv: f32,
    pub noise_multiplier: f32,
    pub refractory_s: f64,
    pub peak_sign: PeakSign,
}

impl Default for SpikeDetectionConfig {
    fn default() -> Self {
        Self {
            threshold_uv: 25.0,
            noise_multiplier: 5.0,
            refractory_s: 0.002,
            peak_sign: PeakSign::Negative,
        }
    }
}

impl SpikeDetectionConfig {
    pub fn refractory_samples(&self, sample_rate_hz: f64) -> usize {
        ((self.refractory_s * sample_rate_hz).floor() as usize).max(1)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpikes {
    pub stream: ChannelEventStream,
    pub noise_level: f32,
    /// Threshold actually applied, after the noise floor.
    pub threshold_uv: f32,
    pub spike_rate_hz: f64,
}

impl ChannelSpikes {
    pub fn spike_count(&self) -> usize {
        self.stream.events.len()
    }
}

fn median(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Median absolute deviation, scaled by [`MAD_TO_SIGMA`].
pub fn median_abs_deviation(data: &[f32]) -> f32 {
    let mut scratch = data.to_vec();
    let center = median(&mut scratch);
    let mut deviations: Vec<f32> = data.iter().map(|v| (v - center).abs()).collect();
    median(&mut deviations) * MAD_TO_SIGMA
}

/// Detects spikes on one channel. Amplitudes keep the trace's own sign.
pub fn detect_spikes(
    channel_id: &str,
    origin: i64,
    trace: &[f32],
    sample_rate_hz: f64,
    config: &SpikeDetectionConfig,
) -> ChannelSpikes {
    let oriented: Vec<f32> = trace.iter().map(|&v| config.peak_sign.orient(v)).collect();
    let noise_level = median_abs_deviation(&oriented);
    let threshold_uv = config.threshold_uv.max(config.noise_multiplier * noise_level);

    let heights: Vec<f64> = oriented.iter().map(|&v| v as f64).collect();
    let peaks = find_peaks(
        &heights,
        threshold_uv as f64,
        config.refractory_samples(sample_rate_hz),
    );
    let events: Vec<u64> = peaks.iter().map(|p| p.index as u64).collect();
    let amplitudes: Vec<f32> = peaks.iter().map(|p| trace[p.index]).collect();

    let duration_s = trace.len() as f64 / sample_rate_hz;
    let spike_rate_hz = if duration_s > 0.0 {
        events.len() as f64 / duration_s
    } else {
        0.0
    };
    log::debug!(
        "{channel_id}: {} spikes, noise {noise_level:.2} uV, threshold {threshold_uv:.2} uV",
        events.len()
    );
    ChannelSpikes {
        stream: ChannelEventStream::new(channel_id, origin, trace.len() as u64, events)
            .with_amplitudes(amplitudes),
        noise_level,
        threshold_uv,
        spike_rate_hz,
    }
}

/// Runs [`detect_spikes`] on every channel in parallel; output keeps input order.
pub fn detect_channels(
    channels: &[(String, Vec<f32>)],
    origin: i64,
    sample_rate_hz: f64,
    config: &SpikeDetectionConfig,
) -> Vec<ChannelSpikes> {
    channels
        .par_iter()
        .map(|(id, trace)| detect_spikes(id, origin, trace, sample_rate_hz, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // +/-2 uV square noise with negative spikes at 100 (-60), 130 (-80) and 300 (-50).
    fn trace() -> Vec<f32> {
        let mut t: Vec<f32> = (0..600).map(|i| if i % 2 == 0 { 2.0 } else { -2.0 }).collect();
        t[100] = -60.0;
        t[130] = -80.0;
        t[300] = -50.0;
        t
    }

    #[test]
    fn mad_matches_normal_scaling() {
        let mad = median_abs_deviation(&[1.0, 2.0, 3.0, 4.0, 100.0]);
        assert!((mad - MAD_TO_SIGMA).abs() < 1e-6);
        assert_eq!(median_abs_deviation(&[]), 0.0);
    }

    #[test]
    fn negative_spikes_with_refractory_suppression() {
        let cfg = SpikeDetectionConfig::default();
        assert_eq!(cfg.refractory_samples(30_000.0), 60);
        let short = SpikeDetectionConfig {
            refractory_s: 0.0015,
            ..cfg
        };
        assert_eq!(short.refractory_samples(1_000.0), 1);
        assert_eq!(short.refractory_samples(100.0), 1);
        let spikes = detect_spikes("A-000", 1_000, &trace(), 30_000.0, &cfg);
        assert_eq!(spikes.stream.events, vec![130, 300]);
        assert_eq!(spikes.stream.amplitudes, Some(vec![-80.0, -50.0]));
        assert_eq!(spikes.stream.origin, 1_000);
        assert_eq!(spikes.stream.coverage, 600);
        assert_eq!(spikes.threshold_uv, 25.0);
        assert!((spikes.spike_rate_hz - 100.0).abs() < 1e-9);
        assert!(spikes.stream.validate().is_ok());
    }

    #[test]
    fn sign_selects_polarity() {
        let positive = SpikeDetectionConfig {
            peak_sign: PeakSign::Positive,
            ..SpikeDetectionConfig::default()
        };
        assert_eq!(detect_spikes("a", 0, &trace(), 30_000.0, &positive).spike_count(), 0);
        let both = SpikeDetectionConfig {
            peak_sign: PeakSign::Both,
            ..SpikeDetectionConfig::default()
        };
        assert_eq!(detect_spikes("a", 0, &trace(), 30_000.0, &both).stream.events, vec![130, 300]);
    }

    #[test]
    fn noise_floor_raises_threshold() {
        let noisy: Vec<f32> = (0..400).map(|i| if i % 2 == 0 { 10.0 } else { -10.0 }).collect();
        let spikes = detect_spikes("a", 0, &noisy, 30_000.0, &SpikeDetectionConfig::default());
        assert!(spikes.threshold_uv > 70.0);
        assert_eq!(spikes.spike_count(), 0);
    }

    #[test]
    fn channels_keep_input_order() {
        let channels = vec![("A-000".to_owned(), trace()), ("A-001".to_owned(), vec![0.0; 600])];
        let out = detect_channels(&channels, 0, 30_000.0, &SpikeDetectionConfig::default());
        assert_eq!(out[0].stream.channel_id, "A-000");
        assert_eq!(out[1].spike_count(), 0);
    }

    #[test]
    fn peak_sign_uses_short_names() {
        let sign: PeakSign = serde_json::from_str("\"neg\"").unwrap();
        assert_eq!(sign, PeakSign::Negative);
        assert_eq!(serde_json::to_string(&PeakSign::Both).unwrap(), "\"both\"");
    }
}
