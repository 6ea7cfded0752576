use crate::config::BoundRule;
use crate::types::{BoundStop, SelectedWindow};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Backward,
    Forward,
}

/// Completes selected windows with lower/upper offsets around their centers.
#[derive(Clone, Debug)]
pub struct BoundFinder {
    rule: BoundRule,
}

impl BoundFinder {
    pub fn new(rule: BoundRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> BoundRule {
        self.rule
    }

    pub fn complete(&self, mut window: SelectedWindow, values: &[f64]) -> SelectedWindow {
        let ((lower, lower_stop), (upper, upper_stop)) = match self.rule {
            BoundRule::Adaptive {
                threshold_fraction,
                max_search,
            } => {
                let threshold = threshold_fraction * window.peak_height;
                (
                    search(values, window.center_index, threshold, max_search, Direction::Backward),
                    search(values, window.center_index, threshold, max_search, Direction::Forward),
                )
            }
            BoundRule::Fixed { before, after } => (
                fixed(values.len(), window.center_index, before, Direction::Backward),
                fixed(values.len(), window.center_index, after, Direction::Forward),
            ),
        };
        window.lower_bound_offset = -(lower as i64);
        window.upper_bound_offset = upper as i64;
        window.lower_stop = Some(lower_stop);
        window.upper_stop = Some(upper_stop);
        if window.is_clamped() {
            log::debug!(
                "window at {} clamped ({:?}/{:?})",
                window.center_index,
                lower_stop,
                upper_stop
            );
        }
        window
    }

    pub fn complete_all(&self, windows: Vec<SelectedWindow>, values: &[f64]) -> Vec<SelectedWindow> {
        windows
            .into_iter()
            .map(|w| self.complete(w, values))
            .collect()
    }
}

fn step(center: usize, k: usize, dir: Direction, len: usize) -> Option<usize> {
    match dir {
        Direction::Backward => center.checked_sub(k),
        Direction::Forward => Some(center + k).filter(|&i| i < len),
    }
}

// Largest k <= max_search such that every sample at offsets 1..=k is >= threshold.
fn search(
    values: &[f64],
    center: usize,
    threshold: f64,
    max_search: usize,
    dir: Direction,
) -> (usize, BoundStop) {
    let mut k = 0;
    loop {
        if k >= max_search {
            return (k, BoundStop::MaxSearch);
        }
        let Some(next) = step(center, k + 1, dir, values.len()) else {
            return (k, BoundStop::SeriesEdge);
        };
        // NaN stops the search too.
        if !(values[next] >= threshold) {
            return (k, BoundStop::Threshold);
        }
        k += 1;
    }
}

fn fixed(len: usize, center: usize, extent: usize, dir: Direction) -> (usize, BoundStop) {
    let room = match dir {
        Direction::Backward => center,
        Direction::Forward => len.saturating_sub(center + 1),
    };
    if extent > room {
        (room, BoundStop::SeriesEdge)
    } else {
        (extent, BoundStop::Fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WindowOrigin;

    fn window(center: usize, height: f64) -> SelectedWindow {
        SelectedWindow::centered(center, height, WindowOrigin::Peak)
    }

    #[test]
    fn grows_asymmetrically_until_threshold() {
        let v = [0.0, 1.0, 6.0, 7.0, 10.0, 8.0, 2.0, 0.0];
        let finder = BoundFinder::new(BoundRule::Adaptive {
            threshold_fraction: 0.5,
            max_search: 10,
        });
        let w = finder.complete(window(4, 10.0), &v);
        assert_eq!((w.lower_bound_offset, w.upper_bound_offset), (-2, 1));
        assert_eq!(w.lower_stop, Some(BoundStop::Threshold));
        assert_eq!(w.upper_stop, Some(BoundStop::Threshold));
        assert_eq!((w.start_index(), w.end_index(), w.len()), (2, 5, 4));
        assert!(!w.is_clamped());
    }

    #[test]
    fn clamps_at_max_search() {
        let v = [9.0; 30];
        let finder = BoundFinder::new(BoundRule::Adaptive {
            threshold_fraction: 0.9,
            max_search: 4,
        });
        let w = finder.complete(window(15, 9.0), &v);
        assert_eq!((w.lower_bound_offset, w.upper_bound_offset), (-4, 4));
        assert_eq!(w.upper_stop, Some(BoundStop::MaxSearch));
        assert!(w.is_clamped());
    }

    #[test]
    fn clamps_at_series_edge() {
        let v = [5.0, 5.0, 6.0, 5.0, 0.0];
        let finder = BoundFinder::new(BoundRule::Adaptive {
            threshold_fraction: 0.5,
            max_search: 10,
        });
        let w = finder.complete(window(2, 6.0), &v);
        assert_eq!((w.lower_bound_offset, w.upper_bound_offset), (-2, 1));
        assert_eq!(w.lower_stop, Some(BoundStop::SeriesEdge));
        assert_eq!(w.upper_stop, Some(BoundStop::Threshold));
    }

    #[test]
    fn offsets_never_exceed_max_search() {
        let v: Vec<f64> = (0..100).map(|i| 50.0 - (i as f64 - 50.0).abs()).collect();
        for max_search in [0, 1, 5, 60] {
            let finder = BoundFinder::new(BoundRule::Adaptive {
                threshold_fraction: 0.0,
                max_search,
            });
            for center in [0, 10, 50, 99] {
                let w = finder.complete(window(center, v[center]), &v);
                assert!(-w.lower_bound_offset <= max_search as i64);
                assert!(w.upper_bound_offset <= max_search as i64);
                assert!(w.lower_bound_offset <= 0 && w.upper_bound_offset >= 0);
            }
        }
    }

    #[test]
    fn fixed_rule_is_clipped_to_series() {
        let finder = BoundFinder::new(BoundRule::Fixed { before: 4, after: 0 });
        let windows = finder.complete_all(vec![window(10, 1.0), window(2, 1.0)], &[0.0; 12]);
        assert_eq!((windows[0].lower_bound_offset, windows[0].upper_bound_offset), (-4, 0));
        assert_eq!(windows[0].lower_stop, Some(BoundStop::Fixed));
        assert_eq!(windows[1].lower_bound_offset, -2);
        assert_eq!(windows[1].lower_stop, Some(BoundStop::SeriesEdge));
        assert!(windows.iter().all(|w| w.is_bounded()));
    }
}
