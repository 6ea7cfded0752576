use crate::config::{BoxcarAlignment, EdgeMode, SmoothingSpec};

#[derive(Clone, Debug, PartialEq)]
pub enum SmoothingStage {
    Boxcar {
        window: usize,
        alignment: BoxcarAlignment,
    },
    Gaussian {
        kernel: Vec<f64>,
        edge_mode: EdgeMode,
    },
}

impl SmoothingStage {
    fn apply(&self, input: &[f64]) -> Vec<f64> {
        match self {
            SmoothingStage::Boxcar { window, alignment } => moving_mean(input, *window, *alignment),
            SmoothingStage::Gaussian { kernel, edge_mode } => convolve(input, kernel, *edge_mode),
        }
    }
}

/// Boxcar followed by Gaussian, resolved once from a [`SmoothingSpec`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SmoothingChain {
    stages: Vec<SmoothingStage>,
}

impl SmoothingChain {
    pub fn empty() -> Self {
        Self { stages: vec![] }
    }

    pub fn from_spec(spec: &SmoothingSpec) -> Self {
        let mut stages = Vec::new();
        if spec.boxcar_window > 1 {
            stages.push(SmoothingStage::Boxcar {
                window: spec.boxcar_window,
                alignment: spec.boxcar_alignment,
            });
        }
        let kernel = gaussian_kernel_1d(spec.gaussian_sigma, spec.gaussian_truncate);
        if kernel.len() > 1 {
            stages.push(SmoothingStage::Gaussian {
                kernel,
                edge_mode: spec.edge_mode,
            });
        }
        Self { stages }
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stages(&self) -> &[SmoothingStage] {
        &self.stages
    }

    /// Returns a smoothed copy; the output always has the input's length.
    pub fn apply(&self, input: &[f64]) -> Vec<f64> {
        let mut out = input.to_vec();
        for stage in &self.stages {
            out = stage.apply(&out);
        }
        out
    }
}

/// Moving average that only averages the samples available at the edges.
pub fn moving_mean(input: &[f64], window: usize, alignment: BoxcarAlignment) -> Vec<f64> {
    let n = input.len();
    if n == 0 || window <= 1 {
        return input.to_vec();
    }
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for &v in input {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + v);
    }
    let (before, after) = match alignment {
        BoxcarAlignment::Trailing => (window - 1, 0),
        BoxcarAlignment::Centered => ((window - 1) / 2, window - 1 - (window - 1) / 2),
    };
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(before);
            let hi = (i + after).min(n - 1);
            (prefix[hi + 1] - prefix[lo]) / (hi + 1 - lo) as f64
        })
        .collect()
}

/// Normalized Gaussian taps of radius `floor(truncate * sigma + 0.5)`.
pub fn gaussian_kernel_1d(sigma: f64, truncate: f64) -> Vec<f64> {
    if !(sigma > 0.0) || !(truncate > 0.0) {
        return vec![1.0];
    }
    let radius = (truncate * sigma + 0.5) as i64;
    if radius < 1 {
        return vec![1.0];
    }
    let two_s2 = 2.0 * sigma * sigma;
    let mut w: Vec<f64> = (-radius..=radius)
        .map(|dx| {
            let x = dx as f64;
            (-x * x / two_s2).exp()
        })
        .collect();
    let sum: f64 = w.iter().sum();
    if sum > 0.0 {
        for v in &mut w {
            *v /= sum;
        }
    }
    w
}

fn extend_index(i: isize, n: usize, mode: EdgeMode) -> usize {
    let n = n as isize;
    match mode {
        EdgeMode::Reflect => {
            let m = i.rem_euclid(2 * n);
            (if m < n { m } else { 2 * n - 1 - m }) as usize
        }
        EdgeMode::Mirror => {
            if n == 1 {
                return 0;
            }
            let period = 2 * n - 2;
            let m = i.rem_euclid(period);
            (if m < n { m } else { period - m }) as usize
        }
    }
}

fn convolve(input: &[f64], kernel: &[f64], mode: EdgeMode) -> Vec<f64> {
    let n = input.len();
    if n == 0 {
        return Vec::new();
    }
    let radius = (kernel.len() / 2) as isize;
    (0..n as isize)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, &w)| w * input[extend_index(i + k as isize - radius, n, mode)])
                .sum()
        })
        .collect()
}
