// src/lib.rs
pub mod config;
pub mod frames;
pub mod recorder;
pub mod spikes;
pub mod types;

pub use config::{DetectionConfig, FrameParamset};
pub use frames::{DetectionError, DetectionReport, FrameDetector, FrameError, Recording};
pub use types::{ActivitySeries, ChannelEventStream, ChannelRaster, SelectedWindow, SessionKey};
