use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::frames::FrameError;
use crate::types::{PeakCandidate, SelectedWindow, WindowOrigin};

/// Fallback draws allowed per non-overlapping slot of the valid range.
pub const FALLBACK_ATTEMPTS_PER_SLOT: usize = 10;

/// Local maxima of `values`. Flat tops count once, at their middle sample.
/// The first and last samples never qualify.
pub fn local_maxima(values: &[f64]) -> Vec<usize> {
    let n = values.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let mut i = 1;
    while i < n - 1 {
        if values[i - 1] < values[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

// Height descending, then earlier index.
fn by_rank(a: &PeakCandidate, b: &PeakCandidate) -> Ordering {
    b.height
        .partial_cmp(&a.height)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.index.cmp(&b.index))
}

/// Local maxima at least `min_height` tall, thinned so no two retained peaks
/// are closer than `min_distance`. Returned in index order.
pub fn find_peaks(values: &[f64], min_height: f64, min_distance: usize) -> Vec<PeakCandidate> {
    let mut ranked: Vec<PeakCandidate> = local_maxima(values)
        .into_iter()
        .filter(|&i| values[i] >= min_height)
        .map(|index| PeakCandidate {
            index,
            height: values[index],
        })
        .collect();
    ranked.sort_by(by_rank);

    let mut kept: Vec<PeakCandidate> = Vec::with_capacity(ranked.len());
    for cand in ranked {
        if kept.iter().all(|k| k.index.abs_diff(cand.index) >= min_distance) {
            kept.push(cand);
        }
    }
    kept.sort_by_key(|p| p.index);
    kept
}

/// Picks the `num_wanted` most salient, well separated peaks of a smoothed series.
#[derive(Clone, Debug)]
pub struct PeakSelector {
    min_height: f64,
    min_distance: usize,
    num_wanted: usize,
}

impl PeakSelector {
    pub fn new(min_height: f64, min_distance: usize, num_wanted: usize) -> Self {
        Self {
            min_height,
            min_distance: min_distance.max(1),
            num_wanted,
        }
    }

    /// Indices that can still support a full window on both sides.
    pub fn valid_range(&self, len: usize) -> Option<(usize, usize)> {
        let lo = self.min_distance;
        let hi = len.checked_sub(1)?.checked_sub(self.min_distance)?;
        (lo <= hi).then_some((lo, hi))
    }

    /// Ranked peaks, topped up with seeded random windows when too few exist.
    ///
    /// Peak windows come first in rank order, fallback windows follow in draw
    /// order. Fails with `InsufficientActivity` instead of drawing forever.
    pub fn select(&self, values: &[f64], seed: u64) -> Result<Vec<SelectedWindow>, FrameError> {
        let mut candidates: Vec<PeakCandidate> = find_peaks(values, self.min_height, self.min_distance)
            .into_iter()
            .filter(|p| {
                p.index >= self.min_distance && values.len() - 1 - p.index >= self.min_distance
            })
            .collect();
        candidates.sort_by(by_rank);
        candidates.truncate(self.num_wanted);

        let mut selected: Vec<SelectedWindow> = candidates
            .iter()
            .map(|p| SelectedWindow::centered(p.index, p.height, WindowOrigin::Peak))
            .collect();
        if selected.len() < self.num_wanted {
            log::debug!(
                "{} of {} windows from peaks, filling the rest at random",
                selected.len(),
                self.num_wanted
            );
            self.fill_fallback(values, seed, &mut selected)?;
        }
        Ok(selected)
    }

    fn fill_fallback(
        &self,
        values: &[f64],
        seed: u64,
        selected: &mut Vec<SelectedWindow>,
    ) -> Result<(), FrameError> {
        let insufficient = |filled: usize, attempts: usize| FrameError::InsufficientActivity {
            wanted: self.num_wanted,
            filled,
            attempts,
        };
        let Some((lo, hi)) = self.valid_range(values.len()) else {
            return Err(insufficient(selected.len(), 0));
        };
        let slots = (hi - lo) / self.min_distance + 1;
        if self.num_wanted > slots {
            return Err(insufficient(selected.len(), 0));
        }
        let max_attempts = FALLBACK_ATTEMPTS_PER_SLOT * slots;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut attempts = 0;
        while selected.len() < self.num_wanted {
            if attempts == max_attempts {
                log::warn!(
                    "fallback gave up after {} draws with {} of {} windows",
                    attempts,
                    selected.len(),
                    self.num_wanted
                );
                return Err(insufficient(selected.len(), attempts));
            }
            attempts += 1;
            let idx = rng.gen_range(lo..=hi);
            let collides = selected
                .iter()
                .any(|w| w.center_index.abs_diff(idx) < self.min_distance);
            if !collides {
                selected.push(SelectedWindow::centered(idx, values[idx], WindowOrigin::Fallback));
            }
        }
        Ok(())
    }
}
