use nalgebra::DMatrix;
use ndarray::Array2;

/// Rescale to `[0, 1]`; a flat array maps to all zeros.
pub fn min_max_normalize(x: &Array2<f32>) -> Array2<f32> {
    let min = x.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = x.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

    if !(max - min).is_normal() {
        return Array2::zeros(x.dim());
    }

    x.mapv(|v| (v - min) / (max - min))
}

pub fn to_dmatrix(x: &Array2<f32>) -> DMatrix<f32> {
    let (nr, nc) = x.dim();
    DMatrix::from_row_iterator(nr, nc, x.iter().cloned())
}

pub fn from_dmatrix(x: &DMatrix<f32>) -> Array2<f32> {
    let (nr, nc) = x.shape();
    Array2::from_shape_fn((nr, nc), |(i, j)| x[(i, j)])
}

/// Pearson correlation over paired samples; 0 when either side is flat
/// or fewer than two pairs are given.
pub fn pearson_correlation(xs: &[f32], ys: &[f32]) -> f32 {
    let nn = xs.len().min(ys.len());
    if nn < 2 {
        return 0.0;
    }

    let nf = nn as f32;
    let mx = xs[..nn].iter().sum::<f32>() / nf;
    let my = ys[..nn].iter().sum::<f32>() / nf;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs[..nn].iter().zip(ys[..nn].iter()) {
        let dx = x - mx;
        let dy = y - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let denom = (sxx * syy).sqrt();
    if denom > 0.0 {
        sxy / denom
    } else {
        0.0
    }
}
