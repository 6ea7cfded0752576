use rayon::prelude::*;

use crate::config::ActivityWeighting;
use crate::frames::electrode::QualifiedStream;
use crate::frames::FrameError;
use crate::types::{ActivitySeries, AnalysisSpan};

/// Aggregates qualifying channel streams into one regular activity series.
#[derive(Clone, Debug)]
pub struct ActivityBuilder {
    bin_width: u64,
    weighting: ActivityWeighting,
    sample_rate_hz: f64,
}

struct Grid {
    start: i64,
    end: i64,
    bins: usize,
}

impl ActivityBuilder {
    pub fn new(
        bin_width: u64,
        weighting: ActivityWeighting,
        sample_rate_hz: f64,
    ) -> Result<Self, FrameError> {
        if bin_width == 0 {
            return Err(FrameError::InvalidConfig(
                "bin width must be at least one tick".to_owned(),
            ));
        }
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(FrameError::InvalidConfig(
                "sample rate must be greater than zero".to_owned(),
            ));
        }
        Ok(Self {
            bin_width,
            weighting,
            sample_rate_hz,
        })
    }

    pub fn bin_width(&self) -> u64 {
        self.bin_width
    }

    /// Builds the series over `span`, or over the union of stream coverage
    /// when no span is declared.
    ///
    /// With a declared span every bin must be covered by at least one stream,
    /// otherwise `IncompleteCoverage` is returned and nothing is built.
    pub fn build(
        &self,
        streams: &[QualifiedStream<'_>],
        span: Option<AnalysisSpan>,
    ) -> Result<ActivitySeries, FrameError> {
        for q in streams {
            q.stream
                .validate()
                .map_err(|reason| FrameError::MalformedStream {
                    channel_id: q.stream.channel_id.clone(),
                    reason,
                })?;
        }
        let grid = self.grid(streams, span)?;
        let covered = self.coverage_mask(streams, &grid);
        let covered_bins = covered.iter().filter(|&&c| c).count();
        if span.is_some() && covered_bins < grid.bins {
            return Err(FrameError::IncompleteCoverage {
                required: grid.bins,
                covered: covered_bins,
            });
        }
        if covered_bins < grid.bins {
            log::debug!(
                "{} of {} bins without data, filled with zeros",
                grid.bins - covered_bins,
                grid.bins
            );
        }

        // Integer counts keep the reduction independent of channel order.
        let counts = streams
            .par_iter()
            .fold(
                || vec![0u64; grid.bins],
                |mut acc, q| {
                    self.accumulate(&mut acc, q, &grid);
                    acc
                },
            )
            .reduce(
                || vec![0u64; grid.bins],
                |mut a, b| {
                    a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                    a
                },
            );

        let values = counts
            .iter()
            .enumerate()
            .map(|(bin, &count)| match self.weighting {
                ActivityWeighting::Count => count as f64,
                ActivityWeighting::Rate => count as f64 / self.bin_seconds(bin, &grid),
            })
            .collect();
        Ok(ActivitySeries::from_values(grid.start, self.bin_width, values).with_end(grid.end))
    }

    fn grid(
        &self,
        streams: &[QualifiedStream<'_>],
        span: Option<AnalysisSpan>,
    ) -> Result<Grid, FrameError> {
        let (start, end) = match span {
            Some(span) if span.is_empty() => {
                return Err(FrameError::InvalidConfig(format!(
                    "analysis span [{}, {}) is empty",
                    span.start, span.end
                )))
            }
            Some(span) => (span.start, span.end),
            None => {
                let covering = streams.iter().filter(|q| q.stream.coverage > 0);
                let start = covering.clone().map(|q| q.stream.origin).min();
                let end = covering.map(|q| q.stream.coverage_end()).max();
                match (start, end) {
                    (Some(start), Some(end)) => (start, end),
                    _ => return Err(FrameError::EmptyRecording),
                }
            }
        };
        let len = (end - start) as u64;
        let bins = ((len + self.bin_width - 1) / self.bin_width) as usize;
        Ok(Grid { start, end, bins })
    }

    fn bin_index(&self, tick: i64, grid: &Grid) -> Option<usize> {
        if tick < grid.start || tick >= grid.end {
            return None;
        }
        Some(((tick - grid.start) as u64 / self.bin_width) as usize)
    }

    fn coverage_mask(&self, streams: &[QualifiedStream<'_>], grid: &Grid) -> Vec<bool> {
        let mut covered = vec![false; grid.bins];
        for q in streams.iter().filter(|q| q.stream.coverage > 0) {
            let first = q.stream.origin.max(grid.start);
            let last = (q.stream.coverage_end() - 1).min(grid.end - 1);
            if first > last {
                continue;
            }
            if let (Some(a), Some(b)) = (self.bin_index(first, grid), self.bin_index(last, grid)) {
                covered[a..=b].iter_mut().for_each(|c| *c = true);
            }
        }
        covered
    }

    fn accumulate(&self, acc: &mut [u64], q: &QualifiedStream<'_>, grid: &Grid) {
        for tick in q.stream.absolute_events() {
            if let Some(bin) = self.bin_index(tick, grid) {
                acc[bin] += 1;
            }
        }
    }

    // The final bin may be partial.
    fn bin_seconds(&self, bin: usize, grid: &Grid) -> f64 {
        let bin_start = grid.start + (bin as u64 * self.bin_width) as i64;
        let ticks = (grid.end - bin_start).min(self.bin_width as i64);
        ticks as f64 / self.sample_rate_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelEventStream;

    fn qualify(streams: &[ChannelEventStream]) -> Vec<QualifiedStream<'_>> {
        streams
            .iter()
            .enumerate()
            .map(|(i, stream)| QualifiedStream {
                electrode_index: i as u32,
                stream,
            })
            .collect()
    }

    #[test]
    fn sums_events_across_channels() {
        let streams = vec![
            ChannelEventStream::new("a", 0, 40, vec![0, 3, 12, 39]),
            ChannelEventStream::new("b", 10, 30, vec![0, 1, 5]),
        ];
        let builder = ActivityBuilder::new(10, ActivityWeighting::Count, 1000.0).unwrap();
        let series = builder.build(&qualify(&streams), None).unwrap();
        assert_eq!(series.time_vector, vec![0, 10, 20, 30]);
        assert_eq!(series.values, vec![2.0, 4.0, 0.0, 1.0]);
    }

    #[test]
    fn grid_is_regular_and_includes_partial_bin() {
        let streams = vec![ChannelEventStream::new("a", 5, 23, vec![22])];
        let builder = ActivityBuilder::new(10, ActivityWeighting::Count, 1000.0).unwrap();
        let series = builder.build(&qualify(&streams), None).unwrap();
        assert_eq!(series.time_vector.len(), series.values.len());
        assert_eq!(series.time_vector, vec![5, 15, 25]);
        assert!(series.time_vector.windows(2).all(|w| w[1] - w[0] == 10));
        assert_eq!(series.values[2], 1.0);
    }

    #[test]
    fn gaps_become_zero_bins() {
        let streams = vec![
            ChannelEventStream::new("a", 0, 10, vec![1, 2]),
            ChannelEventStream::new("a", 30, 10, vec![4]),
        ];
        let builder = ActivityBuilder::new(10, ActivityWeighting::Count, 1000.0).unwrap();
        let series = builder.build(&qualify(&streams), None).unwrap();
        assert_eq!(series.values, vec![2.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn channel_order_does_not_change_the_sum() {
        let mut streams: Vec<_> = (0..16)
            .map(|c| ChannelEventStream::new(format!("c{c}"), 0, 100, (0..100).step_by(c + 1).collect()))
            .collect();
        let builder = ActivityBuilder::new(7, ActivityWeighting::Rate, 30_000.0).unwrap();
        let forward = builder.build(&qualify(&streams), None).unwrap();
        streams.reverse();
        let backward = builder.build(&qualify(&streams), None).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn rate_weighting_divides_by_bin_duration() {
        let streams = vec![ChannelEventStream::new("a", 0, 1500, vec![0, 10, 1200])];
        let builder = ActivityBuilder::new(1000, ActivityWeighting::Rate, 1000.0).unwrap();
        let series = builder.build(&qualify(&streams), None).unwrap();
        assert_eq!(series.values, vec![2.0, 2.0]);
    }

    #[test]
    fn incomplete_span_is_reported() {
        // 12 bins requested, the data covers 8 of them.
        let streams = vec![
            ChannelEventStream::new("a", 0, 50, vec![3]),
            ChannelEventStream::new("b", 50, 30, vec![]),
        ];
        let builder = ActivityBuilder::new(10, ActivityWeighting::Count, 1000.0).unwrap();
        let err = builder
            .build(&qualify(&streams), Some(AnalysisSpan::new(0, 120)))
            .unwrap_err();
        assert_eq!(
            err,
            FrameError::IncompleteCoverage {
                required: 12,
                covered: 8
            }
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn declared_span_clips_events() {
        let streams = vec![ChannelEventStream::new("a", 0, 100, vec![5, 25, 95])];
        let builder = ActivityBuilder::new(10, ActivityWeighting::Count, 1000.0).unwrap();
        let series = builder
            .build(&qualify(&streams), Some(AnalysisSpan::new(20, 60)))
            .unwrap();
        assert_eq!(series.time_vector, vec![20, 30, 40, 50]);
        assert_eq!(series.values, vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn no_coverage_is_an_empty_recording() {
        let builder = ActivityBuilder::new(10, ActivityWeighting::Count, 1000.0).unwrap();
        assert_eq!(builder.build(&[], None), Err(FrameError::EmptyRecording));
    }

    #[test]
    fn malformed_stream_is_rejected() {
        let streams = vec![ChannelEventStream::new("a", 0, 10, vec![4, 2])];
        let builder = ActivityBuilder::new(10, ActivityWeighting::Count, 1000.0).unwrap();
        assert!(matches!(
            builder.build(&qualify(&streams), None),
            Err(FrameError::MalformedStream { .. })
        ));
    }
}
