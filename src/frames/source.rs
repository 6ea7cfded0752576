use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::frames::electrode::ElectrodeMap;
use crate::frames::FrameError;
use crate::types::{ChannelEventStream, SessionKey};

/// Everything the engine needs for one specimen/session/time range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub key: SessionKey,
    pub electrode_map: ElectrodeMap,
    pub streams: Vec<ChannelEventStream>,
}

impl Recording {
    pub fn new(key: SessionKey, electrode_map: ElectrodeMap, streams: Vec<ChannelEventStream>) -> Self {
        Self {
            key,
            electrode_map,
            streams,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.streams.len()
    }

    pub fn num_events(&self) -> usize {
        self.streams.iter().map(|s| s.events.len()).sum()
    }
}

/// Acquisition/storage side that hands recordings to the engine.
pub trait RecordingSource {
    fn next_recording(&mut self) -> Result<Option<Recording>, FrameError>;
}

/// In-memory source useful for tests and batch replays.
pub struct ManualSource {
    queue: VecDeque<Recording>,
}

impl ManualSource {
    pub fn new(recordings: impl IntoIterator<Item = Recording>) -> Self {
        Self {
            queue: recordings.into_iter().collect(),
        }
    }
}

impl RecordingSource for ManualSource {
    fn next_recording(&mut self) -> Result<Option<Recording>, FrameError> {
        Ok(self.queue.pop_front())
    }
}
