use ndarray::Array2;

use crate::frames::electrode::QualifiedStream;
use crate::types::{ActivitySeries, ChannelRaster, SelectedWindow, WindowSummary};

/// Slices channel events into window-relative bin indices on a series grid.
///
/// When the series bin width is one tick the indices are plain sample
/// offsets from the window start.
pub struct RasterExtractor<'a> {
    series: &'a ActivitySeries,
}

impl<'a> RasterExtractor<'a> {
    pub fn new(series: &'a ActivitySeries) -> Self {
        Self { series }
    }

    /// One raster per stream, in stream order. Bounds are inclusive on both ends.
    pub fn extract(
        &self,
        window_index: usize,
        window: &SelectedWindow,
        streams: &[QualifiedStream<'_>],
    ) -> Vec<ChannelRaster> {
        let first_bin = window.start_index();
        let last_bin = window.end_index().min(self.series.len().saturating_sub(1));
        let start_tick = self.series.tick_of(first_bin);
        let end_tick = self.series.bin_end(last_bin);
        streams
            .iter()
            .map(|q| {
                let stream = q.stream;
                let lo = stream
                    .events
                    .partition_point(|&e| stream.origin + (e as i64) < start_tick);
                let hi = stream
                    .events
                    .partition_point(|&e| stream.origin + (e as i64) < end_tick);
                // Every event in lo..hi lies on the grid.
                let events = stream.events[lo..hi]
                    .iter()
                    .filter_map(|&e| self.series.bin_of(stream.origin + e as i64))
                    .map(|bin| bin - first_bin)
                    .collect();
                ChannelRaster {
                    window_index,
                    channel_id: stream.channel_id.clone(),
                    electrode_index: q.electrode_index,
                    events,
                    amplitudes: stream.amplitudes.as_ref().map(|a| a[lo..hi].to_vec()),
                }
            })
            .collect()
    }

    pub fn summarize(&self, window: &SelectedWindow, rasters: &[ChannelRaster]) -> WindowSummary {
        let first = window.start_index();
        let last = window.end_index().min(self.series.len().saturating_sub(1));
        let slice = &self.series.values[first..=last];
        WindowSummary {
            start_tick: self.series.tick_of(first),
            end_tick: self.series.bin_end(last),
            mean_activity: slice.iter().sum::<f64>() / slice.len() as f64,
            total_events: rasters.iter().map(|r| r.events.len()).sum(),
            active_channels: rasters.iter().filter(|r| !r.is_empty()).count(),
        }
    }
}

/// `[channel x local bin]` occupancy matrix for one window.
pub fn dense_raster(rasters: &[ChannelRaster], window_len: usize) -> Array2<bool> {
    let mut matrix = Array2::from_elem((rasters.len(), window_len), false);
    for (row, raster) in rasters.iter().enumerate() {
        for &col in raster.events.iter().filter(|&&c| c < window_len) {
            matrix[[row, col]] = true;
        }
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelEventStream, WindowOrigin};

    fn bounded(center: usize, lower: i64, upper: i64) -> SelectedWindow {
        let mut w = SelectedWindow::centered(center, 1.0, WindowOrigin::Peak);
        w.lower_bound_offset = lower;
        w.upper_bound_offset = upper;
        w
    }

    fn qualify(streams: &[ChannelEventStream]) -> Vec<QualifiedStream<'_>> {
        streams
            .iter()
            .map(|stream| QualifiedStream {
                electrode_index: 0,
                stream,
            })
            .collect()
    }

    #[test]
    fn events_are_relative_to_window_start() {
        let series = ActivitySeries::from_values(0, 1, vec![0.0; 30]);
        // local [2, 5, 5, 9, 12] from origin 8 -> global [10, 13, 13, 17, 20]
        let streams = vec![
            ChannelEventStream::new("A-000", 8, 20, vec![2, 5, 5, 9, 12]).with_amplitudes(vec![
                -40.0, -31.0, -55.0, -29.0, -60.0,
            ]),
        ];
        let window = bounded(12, -3, 5);
        let rasters = RasterExtractor::new(&series).extract(0, &window, &qualify(&streams));
        assert_eq!(rasters[0].events, vec![1, 4, 4, 8]);
        assert_eq!(
            rasters[0].amplitudes.as_deref(),
            Some(&[-40.0, -31.0, -55.0, -29.0][..])
        );
    }

    #[test]
    fn boundary_events_are_inclusive() {
        let series = ActivitySeries::from_values(0, 1, vec![0.0; 20]);
        let streams = vec![ChannelEventStream::new("a", 0, 20, vec![6, 7, 14, 15])];
        let window = bounded(10, -3, 4);
        let rasters = RasterExtractor::new(&series).extract(0, &window, &qualify(&streams));
        assert_eq!(rasters[0].events, vec![0, 7]);
    }

    #[test]
    fn indices_stay_inside_window() {
        let series = ActivitySeries::from_values(100, 10, vec![0.0; 50]);
        let streams = vec![
            ChannelEventStream::new("a", 90, 600, (0..600).step_by(3).collect()),
            ChannelEventStream::new("b", 350, 10, vec![]),
        ];
        let window = bounded(20, -6, 9);
        let rasters = RasterExtractor::new(&series).extract(3, &window, &qualify(&streams));
        let span = (window.upper_bound_offset - window.lower_bound_offset) as usize;
        assert!(rasters[0].events.iter().all(|&e| e <= span));
        assert!(!rasters[0].is_empty());
        assert!(rasters[1].is_empty());
        assert_eq!(rasters[1].window_index, 3);
    }

    #[test]
    fn partial_last_bin_stops_at_span_end() {
        use crate::config::ActivityWeighting;
        use crate::frames::activity::ActivityBuilder;
        use crate::types::AnalysisSpan;

        let streams = vec![ChannelEventStream::new("a", 0, 100, vec![5, 15, 45, 46, 47, 97])];
        let qualified = qualify(&streams);
        let series = ActivityBuilder::new(10, ActivityWeighting::Count, 1000.0)
            .unwrap()
            .build(&qualified, Some(AnalysisSpan::new(0, 95)))
            .unwrap();
        assert_eq!(series.len(), 10);
        assert_eq!(series.end, 95);
        assert_eq!(series.values.iter().sum::<f64>(), 5.0);

        let window = bounded(4, -4, 5);
        let extractor = RasterExtractor::new(&series);
        let rasters = extractor.extract(0, &window, &qualified);
        assert_eq!(rasters[0].events, vec![0, 1, 4, 4, 4]);
        let summary = extractor.summarize(&window, &rasters);
        assert_eq!((summary.start_tick, summary.end_tick), (0, 95));
        assert_eq!(summary.total_events, 5);
        assert_eq!(series.bin_of(97), None);
        assert_eq!(series.bin_of(94), Some(9));
    }

    #[test]
    fn summary_and_dense_matrix() {
        let series = ActivitySeries::from_values(0, 1, vec![0.0, 2.0, 4.0, 6.0, 0.0]);
        let streams = vec![
            ChannelEventStream::new("a", 0, 5, vec![1, 3]),
            ChannelEventStream::new("b", 0, 5, vec![4]),
        ];
        let window = bounded(2, -1, 1);
        let extractor = RasterExtractor::new(&series);
        let rasters = extractor.extract(0, &window, &qualify(&streams));
        let summary = extractor.summarize(&window, &rasters);
        assert_eq!((summary.start_tick, summary.end_tick), (1, 4));
        assert_eq!(summary.mean_activity, 4.0);
        assert_eq!((summary.total_events, summary.active_channels), (2, 1));

        let dense = dense_raster(&rasters, window.len());
        assert_eq!(dense.shape(), &[2, 3]);
        assert!(dense[[0, 0]] && dense[[0, 2]] && !dense[[0, 1]]);
        assert!(dense.row(1).iter().all(|&b| !b));
    }
}
