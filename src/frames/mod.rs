// src/frames/mod.rs
// Detection engine: electrodes -> activity -> smoothing -> peaks -> bounds -> rasters
pub mod activity;
pub mod bounds;
pub mod electrode;
pub mod error;
pub mod peaks;
pub mod pipeline;
pub mod raster;
pub mod smoothing;
pub mod source;

pub use activity::ActivityBuilder;
pub use bounds::BoundFinder;
pub use electrode::{select_inside, ElectrodeMap, QualifiedStream};
pub use error::{DetectionError, FrameError};
pub use peaks::{find_peaks, local_maxima, PeakSelector};
pub use pipeline::{DetectedWindow, DetectionReport, FrameDetector, FramePipeline, Outcome};
pub use raster::{dense_raster, RasterExtractor};
pub use smoothing::{SmoothingChain, SmoothingStage};
pub use source::{ManualSource, Recording, RecordingSource};
