use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::frames::FrameError;
use crate::types::ChannelEventStream;

/// Channel id -> electrode index, plus the number of electrodes inside the specimen.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElectrodeMap {
    channels: BTreeMap<String, u32>,
    electrodes_inside: u32,
}

impl ElectrodeMap {
    pub fn new(electrodes_inside: u32) -> Self {
        Self {
            channels: BTreeMap::new(),
            electrodes_inside,
        }
    }

    pub fn from_pairs<I, S>(pairs: I, electrodes_inside: u32) -> Result<Self, FrameError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut map = Self::new(electrodes_inside);
        for (channel_id, electrode) in pairs {
            map.insert(channel_id, electrode)?;
        }
        Ok(map)
    }

    /// Registers a channel. Re-registering with the same electrode is a no-op.
    pub fn insert(&mut self, channel_id: impl Into<String>, electrode: u32) -> Result<(), FrameError> {
        let channel_id = channel_id.into();
        match self.channels.get(&channel_id) {
            Some(&existing) if existing != electrode => Err(FrameError::ConflictingMapping {
                channel_id,
                existing,
                requested: electrode,
            }),
            Some(_) => Ok(()),
            None => {
                self.channels.insert(channel_id, electrode);
                Ok(())
            }
        }
    }

    pub fn electrode_of(&self, channel_id: &str) -> Result<u32, FrameError> {
        self.channels
            .get(channel_id)
            .copied()
            .ok_or_else(|| FrameError::UnmappedChannel {
                channel_id: channel_id.to_owned(),
            })
    }

    pub fn electrodes_inside(&self) -> u32 {
        self.electrodes_inside
    }

    pub fn is_inside(&self, electrode: u32) -> bool {
        electrode < self.electrodes_inside
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// A stream that resolved to an electrode inside the specimen.
#[derive(Clone, Copy, Debug)]
pub struct QualifiedStream<'a> {
    pub electrode_index: u32,
    pub stream: &'a ChannelEventStream,
}

/// Resolves every stream, then keeps the ones inside the tissue.
///
/// All channels are resolved before filtering, so an unmapped channel fails the
/// batch even when it would have been discarded. The result is ordered by
/// electrode index, then channel id.
pub fn select_inside<'a>(
    map: &ElectrodeMap,
    streams: &'a [ChannelEventStream],
) -> Result<Vec<QualifiedStream<'a>>, FrameError> {
    let mut qualified = Vec::with_capacity(streams.len());
    for stream in streams {
        let electrode_index = map.electrode_of(&stream.channel_id)?;
        if map.is_inside(electrode_index) {
            qualified.push(QualifiedStream {
                electrode_index,
                stream,
            });
        }
    }
    qualified.sort_by(|a, b| {
        a.electrode_index
            .cmp(&b.electrode_index)
            .then_with(|| a.stream.channel_id.cmp(&b.stream.channel_id))
    });
    log::debug!(
        "{} of {} channels inside ({} electrodes)",
        qualified.len(),
        streams.len(),
        map.electrodes_inside()
    );
    Ok(qualified)
}
