// src/types.rs
use std::fmt;

use serde::{Deserialize, Serialize};

// Caller-declared analysis range in ticks, end exclusive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisSpan {
    pub start: i64,
    pub end: i64,
}

impl AnalysisSpan {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        (self.end - self.start).max(0) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

// Which specimen / session / range a request belongs to
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub specimen_id: String,
    pub session_id: String,
    #[serde(default)]
    pub span: Option<AnalysisSpan>,
}

impl SessionKey {
    pub fn new(specimen_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            specimen_id: specimen_id.into(),
            session_id: session_id.into(),
            span: None,
        }
    }

    pub fn with_span(mut self, span: AnalysisSpan) -> Self {
        self.span = Some(span);
        self
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.specimen_id, self.session_id)?;
        if let Some(span) = self.span {
            write!(f, "[{}..{})", span.start, span.end)?;
        }
        Ok(())
    }
}

/// Events of one channel, as handed over by the acquisition layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelEventStream {
    pub channel_id: String,
    /// Absolute tick of local index 0.
    pub origin: i64,
    /// Number of ticks recorded from `origin`.
    pub coverage: u64,
    /// Local sample indices, non-decreasing.
    pub events: Vec<u64>,
    #[serde(default)]
    pub amplitudes: Option<Vec<f32>>,
}

impl ChannelEventStream {
    pub fn new(channel_id: impl Into<String>, origin: i64, coverage: u64, events: Vec<u64>) -> Self {
        Self {
            channel_id: channel_id.into(),
            origin,
            coverage,
            events,
            amplitudes: None,
        }
    }

    pub fn with_amplitudes(mut self, amplitudes: Vec<f32>) -> Self {
        self.amplitudes = Some(amplitudes);
        self
    }

    pub fn coverage_end(&self) -> i64 {
        self.origin + self.coverage as i64
    }

    pub fn absolute_events(&self) -> impl Iterator<Item = i64> + '_ {
        self.events.iter().map(move |&e| self.origin + e as i64)
    }

    /// Checks ordering, coverage and amplitude length; returns the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.events.windows(2).any(|w| w[1] < w[0]) {
            return Err("event indices are not monotonic".to_owned());
        }
        if let Some(&last) = self.events.last() {
            if last >= self.coverage {
                return Err(format!(
                    "event index {last} lies beyond coverage of {} ticks",
                    self.coverage
                ));
            }
        }
        if let Some(amplitudes) = &self.amplitudes {
            if amplitudes.len() != self.events.len() {
                return Err(format!(
                    "{} amplitudes for {} events",
                    amplitudes.len(),
                    self.events.len()
                ));
            }
        }
        Ok(())
    }
}

/// Regular-grid population activity. Gaps are zero-valued samples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivitySeries {
    pub time_vector: Vec<i64>,
    pub values: Vec<f64>,
    pub bin_width: u64,
    /// Exclusive end tick of the grid. Inside the last bin when it is partial.
    pub end: i64,
}

impl ActivitySeries {
    pub fn from_values(start: i64, bin_width: u64, values: Vec<f64>) -> Self {
        let time_vector = (0..values.len())
            .map(|i| start + (i as u64 * bin_width) as i64)
            .collect();
        let end = start + (values.len() as u64 * bin_width) as i64;
        Self {
            time_vector,
            values,
            bin_width,
            end,
        }
    }

    /// Cuts the grid short of its last full bin.
    pub fn with_end(mut self, end: i64) -> Self {
        self.end = self.end.min(end);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn start(&self) -> i64 {
        self.time_vector.first().copied().unwrap_or(0)
    }

    /// Bin holding an absolute tick, if it lies on the grid.
    pub fn bin_of(&self, tick: i64) -> Option<usize> {
        if tick < self.start() || tick >= self.end {
            return None;
        }
        Some(((tick - self.start()) as u64 / self.bin_width) as usize)
    }

    /// Exclusive end tick of `bin`, clipped to the grid end.
    pub fn bin_end(&self, bin: usize) -> i64 {
        (self.tick_of(bin) + self.bin_width as i64).min(self.end)
    }

    /// First tick of `bin`.
    pub fn tick_of(&self, bin: usize) -> i64 {
        self.start() + (bin as u64 * self.bin_width) as i64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeakCandidate {
    pub index: usize,
    pub height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowOrigin {
    Peak,
    Fallback,
}

/// Why a bound search stopped on one side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundStop {
    /// The signal dropped below the peak-relative threshold.
    Threshold,
    /// Clamped at the maximum search distance.
    MaxSearch,
    /// Clamped at the first or last sample of the series.
    SeriesEdge,
    /// Fixed-width window, no search.
    Fixed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectedWindow {
    pub center_index: usize,
    pub lower_bound_offset: i64,
    pub upper_bound_offset: i64,
    pub peak_height: f64,
    pub origin: WindowOrigin,
    pub lower_stop: Option<BoundStop>,
    pub upper_stop: Option<BoundStop>,
}

impl SelectedWindow {
    pub fn centered(center_index: usize, peak_height: f64, origin: WindowOrigin) -> Self {
        Self {
            center_index,
            lower_bound_offset: 0,
            upper_bound_offset: 0,
            peak_height,
            origin,
            lower_stop: None,
            upper_stop: None,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.lower_stop.is_some() && self.upper_stop.is_some()
    }

    pub fn start_index(&self) -> usize {
        (self.center_index as i64 + self.lower_bound_offset) as usize
    }

    /// Last index inside the window (inclusive).
    pub fn end_index(&self) -> usize {
        (self.center_index as i64 + self.upper_bound_offset) as usize
    }

    pub fn len(&self) -> usize {
        (self.upper_bound_offset - self.lower_bound_offset) as usize + 1
    }

    pub fn is_clamped(&self) -> bool {
        [self.lower_stop, self.upper_stop]
            .iter()
            .any(|s| matches!(s, Some(BoundStop::MaxSearch) | Some(BoundStop::SeriesEdge)))
    }
}

/// Events of one channel inside one window, relative to the window start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelRaster {
    pub window_index: usize,
    pub channel_id: String,
    pub electrode_index: u32,
    pub events: Vec<usize>,
    pub amplitudes: Option<Vec<f32>>,
}

impl ChannelRaster {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub start_tick: i64,
    /// Exclusive.
    pub end_tick: i64,
    /// Mean of the unsmoothed activity over the window.
    pub mean_activity: f64,
    pub total_events: usize,
    pub active_channels: usize,
}
