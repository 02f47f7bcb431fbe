use ndarray::Array2;

/// Minimum overlapping bins for an offset to contribute
const MIN_OVERLAP: usize = 2;

///
/// Full spatial autocorrelogram of a rate map.
///
/// For every offset `(dr, dc)` the Pearson correlation is computed over
/// the overlapping region of the map and its shifted copy, so the
/// output has shape `[2 nr - 1, 2 nc - 1]` with the zero offset at the
/// centre. Offsets with too little overlap (or a flat overlap) are 0.
///
pub fn spatial_autocorrelogram(rate_map: &Array2<f32>) -> Array2<f32> {
    let (nr, nc) = rate_map.dim();
    let mut sac = Array2::<f32>::zeros((2 * nr - 1, 2 * nc - 1));

    for dr in -(nr as i64 - 1)..=(nr as i64 - 1) {
        for dc in -(nc as i64 - 1)..=(nc as i64 - 1) {
            let r0 = dr.max(0) as usize;
            let r1 = (nr as i64 + dr.min(0)) as usize;
            let c0 = dc.max(0) as usize;
            let c1 = (nc as i64 + dc.min(0)) as usize;

            let count = (r1 - r0) * (c1 - c0);
            if count < MIN_OVERLAP {
                continue;
            }

            let mut xs = Vec::with_capacity(count);
            let mut ys = Vec::with_capacity(count);
            for r in r0..r1 {
                for c in c0..c1 {
                    xs.push(rate_map[[r, c]]);
                    ys.push(rate_map[[(r as i64 - dr) as usize, (c as i64 - dc) as usize]]);
                }
            }

            let rho = matrix_util::ndarray_util::pearson_correlation(&xs, &ys);
            sac[[(dr + nr as i64 - 1) as usize, (dc + nc as i64 - 1) as usize]] = rho;
        }
    }

    sac
}
