use serde::{Deserialize, Serialize};

use crate::frames::FrameError;

/// Default acquisition rate of the recording rigs (Intan RHD).
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 30_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityWeighting {
    /// Number of events per bin.
    Count,
    /// Events per second per bin, summed over channels.
    Rate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxcarAlignment {
    /// Mean of the `window` samples ending at the current one.
    Trailing,
    Centered,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMode {
    /// `d c b a | a b c d | d c b a`
    Reflect,
    /// `d c b | a b c d | c b a`
    Mirror,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingSpec {
    pub boxcar_window: usize,
    pub boxcar_alignment: BoxcarAlignment,
    pub gaussian_sigma: f64,
    pub gaussian_truncate: f64,
    pub edge_mode: EdgeMode,
}

impl Default for SmoothingSpec {
    fn default() -> Self {
        Self {
            boxcar_window: 5,
            boxcar_alignment: BoxcarAlignment::Centered,
            gaussian_sigma: 3.0,
            gaussian_truncate: 4.0,
            edge_mode: EdgeMode::Reflect,
        }
    }
}

impl SmoothingSpec {
    /// Boxcar only, no Gaussian stage.
    pub fn boxcar(window: usize, alignment: BoxcarAlignment) -> Self {
        Self {
            boxcar_window: window,
            boxcar_alignment: alignment,
            gaussian_sigma: 0.0,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum BoundRule {
    /// Grow each side while the signal stays above `threshold_fraction * peak`.
    Adaptive {
        threshold_fraction: f64,
        max_search: usize,
    },
    /// Fixed offsets `[-before, +after]` around the center.
    Fixed { before: usize, after: usize },
}

impl BoundRule {
    /// Adaptive rule whose window can never outgrow `duration_ticks`.
    pub fn adaptive_for_duration(threshold_fraction: f64, duration_ticks: u64, bin_width: u64) -> Self {
        BoundRule::Adaptive {
            threshold_fraction,
            max_search: max_search_for_duration(duration_ticks, bin_width),
        }
    }
}

/// Per-side search limit, in bins, for an extraction of `duration_ticks`.
pub fn max_search_for_duration(duration_ticks: u64, bin_width: u64) -> usize {
    let bins = duration_ticks / bin_width.max(1);
    (bins / 2) as usize
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RasterMode {
    Sparse,
    /// Sparse indices plus a `[channel x local bin]` boolean matrix.
    Dense,
}

/// Frame extraction parameter sets used for the active-frame analyses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameParamset {
    pub num_frames: usize,
    pub minutes_per_frame: usize,
}

impl FrameParamset {
    pub fn preset(idx: u32) -> Option<Self> {
        let (num_frames, minutes_per_frame) = match idx {
            1 => (12, 5),
            2 => (4, 15),
            3 => (8, 15),
            _ => return None,
        };
        Some(Self {
            num_frames,
            minutes_per_frame,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub sample_rate_hz: f64,
    /// Activity bin width in ticks.
    pub bin_width: u64,
    pub weighting: ActivityWeighting,
    pub smoothing: SmoothingSpec,
    pub min_height: f64,
    /// Minimum separation between selected centers, in bins.
    pub min_distance: usize,
    pub num_wanted: usize,
    pub bounds: BoundRule,
    pub raster: RasterMode,
    pub seed: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self::population_bursts(DEFAULT_SAMPLE_RATE_HZ)
    }
}

impl DetectionConfig {
    /// Millisecond bins, dual smoothing and adaptive bounds.
    pub fn population_bursts(sample_rate_hz: f64) -> Self {
        let bin_width = ((sample_rate_hz / 1000.0).round() as u64).max(1);
        Self {
            sample_rate_hz,
            bin_width,
            weighting: ActivityWeighting::Count,
            smoothing: SmoothingSpec::default(),
            min_height: 0.0,
            min_distance: 50,
            num_wanted: 10,
            bounds: BoundRule::Adaptive {
                threshold_fraction: 0.5,
                max_search: 250,
            },
            raster: RasterMode::Sparse,
            seed: 0,
        }
    }

    /// Minute bins of summed firing rate, trailing boxcar of one frame and a
    /// window covering exactly the frame that produced the peak.
    pub fn active_frames(paramset: FrameParamset, sample_rate_hz: f64) -> Self {
        let minutes = paramset.minutes_per_frame.max(1);
        Self {
            sample_rate_hz,
            bin_width: ((60.0 * sample_rate_hz).round() as u64).max(1),
            weighting: ActivityWeighting::Rate,
            smoothing: SmoothingSpec::boxcar(minutes, BoxcarAlignment::Trailing),
            min_height: 0.0,
            min_distance: minutes,
            num_wanted: paramset.num_frames,
            bounds: BoundRule::Fixed {
                before: minutes - 1,
                after: 0,
            },
            raster: RasterMode::Sparse,
            seed: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), FrameError> {
        let invalid = |msg: &str| Err(FrameError::InvalidConfig(msg.to_owned()));
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return invalid("sample rate must be greater than zero");
        }
        if self.bin_width == 0 {
            return invalid("bin width must be at least one tick");
        }
        if self.smoothing.boxcar_window == 0 {
            return invalid("boxcar window must be at least one sample");
        }
        if !(self.smoothing.gaussian_sigma.is_finite() && self.smoothing.gaussian_sigma >= 0.0) {
            return invalid("gaussian sigma must be finite and non-negative");
        }
        if !(self.smoothing.gaussian_truncate.is_finite() && self.smoothing.gaussian_truncate > 0.0) {
            return invalid("gaussian truncate factor must be positive");
        }
        if !self.min_height.is_finite() {
            return invalid("minimum height must be finite");
        }
        if self.min_distance == 0 {
            return invalid("minimum distance must be at least one bin");
        }
        if self.num_wanted == 0 {
            return invalid("at least one window must be requested");
        }
        if let BoundRule::Adaptive {
            threshold_fraction, ..
        } = self.bounds
        {
            if !(0.0..=1.0).contains(&threshold_fraction) {
                return invalid("bound threshold fraction must lie in [0, 1]");
            }
        }
        Ok(())
    }
}
