use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{DetectionConfig, RasterMode};
use crate::frames::activity::ActivityBuilder;
use crate::frames::bounds::BoundFinder;
use crate::frames::electrode::select_inside;
use crate::frames::error::{DetectionError, FrameError};
use crate::frames::peaks::PeakSelector;
use crate::frames::raster::{dense_raster, RasterExtractor};
use crate::frames::smoothing::SmoothingChain;
use crate::frames::source::{Recording, RecordingSource};
use crate::types::{ChannelRaster, SelectedWindow, SessionKey, WindowSummary};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedWindow {
    pub window: SelectedWindow,
    pub summary: WindowSummary,
    pub rasters: Vec<ChannelRaster>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dense: Option<Array2<bool>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub key: SessionKey,
    pub bin_width: u64,
    pub series_start: i64,
    pub series_len: usize,
    pub windows: Vec<DetectedWindow>,
}

impl DetectionReport {
    pub fn clamped_windows(&self) -> usize {
        self.windows.iter().filter(|w| w.window.is_clamped()).count()
    }
}

pub type Outcome = Result<DetectionReport, DetectionError>;

/// The full engine for one configuration. Holds no per-call state.
#[derive(Clone, Debug)]
pub struct FrameDetector {
    config: DetectionConfig,
    activity: ActivityBuilder,
    smoothing: SmoothingChain,
    selector: PeakSelector,
    bounds: BoundFinder,
}

impl FrameDetector {
    pub fn new(config: DetectionConfig) -> Result<Self, FrameError> {
        config.validate()?;
        Ok(Self {
            activity: ActivityBuilder::new(config.bin_width, config.weighting, config.sample_rate_hz)?,
            smoothing: SmoothingChain::from_spec(&config.smoothing),
            selector: PeakSelector::new(config.min_height, config.min_distance, config.num_wanted),
            bounds: BoundFinder::new(config.bounds),
            config,
        })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Runs every stage on one recording. Nothing is returned on failure.
    pub fn detect(&self, recording: &Recording) -> Outcome {
        log::debug!(
            "{}: {} channels, {} events",
            recording.key,
            recording.num_channels(),
            recording.num_events()
        );
        self.run(recording)
            .map_err(|source| DetectionError::new(recording.key.clone(), source))
    }

    /// Independent recordings in parallel, results in input order.
    pub fn detect_all(&self, recordings: &[Recording]) -> Vec<Outcome> {
        recordings.par_iter().map(|r| self.detect(r)).collect()
    }

    fn run(&self, recording: &Recording) -> Result<DetectionReport, FrameError> {
        let streams = select_inside(&recording.electrode_map, &recording.streams)?;
        let series = self.activity.build(&streams, recording.key.span)?;
        let smoothed = self.smoothing.apply(&series.values);
        let windows = self.selector.select(&smoothed, self.config.seed)?;
        let windows = self.bounds.complete_all(windows, &smoothed);

        let extractor = RasterExtractor::new(&series);
        let detected: Vec<DetectedWindow> = windows
            .into_iter()
            .enumerate()
            .map(|(i, window)| {
                let rasters = extractor.extract(i, &window, &streams);
                let summary = extractor.summarize(&window, &rasters);
                let dense = match self.config.raster {
                    RasterMode::Dense => Some(dense_raster(&rasters, window.len())),
                    RasterMode::Sparse => None,
                };
                DetectedWindow {
                    window,
                    summary,
                    rasters,
                    dense,
                }
            })
            .collect();

        let report = DetectionReport {
            key: recording.key.clone(),
            bin_width: series.bin_width,
            series_start: series.start(),
            series_len: series.len(),
            windows: detected,
        };
        log::info!(
            "{}: {} windows from {} channels over {} bins ({} clamped)",
            report.key,
            report.windows.len(),
            streams.len(),
            report.series_len,
            report.clamped_windows()
        );
        Ok(report)
    }
}

/// Pulls recordings from a source and runs them through a detector.
pub struct FramePipeline<S: RecordingSource> {
    source: S,
    detector: FrameDetector,
}

impl<S: RecordingSource> FramePipeline<S> {
    pub fn new(source: S, detector: FrameDetector) -> Self {
        Self { source, detector }
    }

    pub fn detector(&self) -> &FrameDetector {
        &self.detector
    }

    /// `Ok(None)` once the source is exhausted. Source failures are the outer error.
    pub fn pump_once(&mut self) -> Result<Option<Outcome>, FrameError> {
        let Some(recording) = self.source.next_recording()? else {
            return Ok(None);
        };
        Ok(Some(self.detector.detect(&recording)))
    }

    /// Empties the source, then runs all recordings in parallel.
    pub fn drain(&mut self) -> Result<Vec<Outcome>, FrameError> {
        let mut recordings = Vec::new();
        while let Some(recording) = self.source.next_recording()? {
            recordings.push(recording);
        }
        Ok(self.detector.detect_all(&recordings))
    }
}
