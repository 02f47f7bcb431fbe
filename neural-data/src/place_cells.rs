//! Synthetic place cells on a circular track: a simulated animal steps
//! through the cells in order, and each visited cell fires together
//! with its circular neighbours.

use crate::labels::LabelTable;
use crate::Mat;

use log::info;
use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::Poisson;

/// Poisson rates at circular distance 0, 1, 2 from the active cell
const NEIGHBOUR_RATES: [f64; 3] = [4.0, 2.0, 1.0];

///
/// Returns `(firings, labels)` with Poisson counts of shape
/// `[n_times, n_cells]` (n_times rounded down to a multiple of
/// n_cells) and the track angle in degrees as labels.
///
pub fn load_place_cells(
    n_times: usize,
    n_cells: usize,
    seed: u64,
) -> anyhow::Result<(Mat, LabelTable)> {
    if n_cells < 5 {
        return Err(anyhow::anyhow!(
            "need at least 5 place cells, got {}",
            n_cells
        ));
    }

    info!("Generating dataset of synthetic place cells");

    let n_laps = n_times / n_cells;
    let nn = n_laps * n_cells;

    let mut rng = SmallRng::seed_from_u64(seed);
    let rates: Vec<Poisson<f64>> = NEIGHBOUR_RATES
        .iter()
        .map(|&r| Poisson::new(r).expect("positive rate"))
        .collect();

    let mut firings = Mat::zeros(nn, n_cells);
    let mut angles = Vec::with_capacity(nn);

    let mut row = 0;
    for _ in 0..n_laps {
        for i_cell in 0..n_cells {
            for offset in -2i64..=2 {
                let j = (i_cell as i64 + offset).rem_euclid(n_cells as i64) as usize;
                let rate = &rates[offset.unsigned_abs() as usize];
                firings[(row, j)] = rng.sample(rate) as f32;
            }
            angles.push(i_cell as f32 / n_cells as f32 * 360.0);
            row += 1;
        }
    }

    let labels = LabelTable::new().with_column("angle", angles);
    Ok((firings, labels))
}
