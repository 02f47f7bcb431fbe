//! Synthetic grid-cell firing-rate maps: three plane waves at 60
//! degrees with per-cell orientation jitter and random spatial phase,
//! sampled on a square arena walk.

use crate::labels::LabelTable;
use crate::Mat;

use log::info;
use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::Normal;

#[derive(Clone, Debug)]
pub struct GridFieldConfig {
    /// spacing of the hexagonal lattice (arena units)
    pub grid_scale: f32,
    /// side length of the square arena
    pub arena_len: f32,
    pub n_cells: usize,
    pub orientation_mean_deg: f32,
    pub orientation_std_deg: f32,
    /// sharpness of the firing fields; smaller is more peaked
    pub field_width: f32,
    /// sampling positions per arena side
    pub resolution: usize,
    pub seed: u64,
}

impl Default for GridFieldConfig {
    fn default() -> Self {
        Self {
            grid_scale: 1.0,
            arena_len: 8.0,
            n_cells: 12,
            orientation_mean_deg: 0.0,
            orientation_std_deg: 6.0,
            field_width: 0.05,
            resolution: 50,
            seed: 0,
        }
    }
}

///
/// Returns `(rates, labels)` with firing rates of shape
/// `[resolution^2, n_cells]` in `[0, 1]` and position labels `x`, `y`.
///
pub fn load_grid_cells(config: &GridFieldConfig) -> anyhow::Result<(Mat, LabelTable)> {
    info!("Generating dataset of synthetic grid cells");

    let mut rng = SmallRng::seed_from_u64(config.seed);
    let orientation = Normal::new(
        config.orientation_mean_deg as f64,
        config.orientation_std_deg.max(0.0) as f64 + 1e-12,
    )
    .map_err(|e| anyhow::anyhow!("orientation jitter: {}", e))?;

    // wave vector magnitude of a hexagonal lattice with spacing `scale`
    let k_mag = 4.0 * std::f32::consts::PI / (3f32.sqrt() * config.grid_scale);

    struct Cell {
        ks: [[f32; 2]; 3],
        phase: [f32; 2],
    }

    let cells: Vec<Cell> = (0..config.n_cells)
        .map(|_| {
            let base: f32 = (rng.sample(orientation) as f32).to_radians();
            let mut ks = [[0f32; 2]; 3];
            for (a, k) in ks.iter_mut().enumerate() {
                let angle = base + std::f32::consts::PI / 3.0 * a as f32;
                *k = [k_mag * angle.cos(), k_mag * angle.sin()];
            }
            let phase = [
                rng.random::<f32>() * config.grid_scale,
                rng.random::<f32>() * config.grid_scale,
            ];
            Cell { ks, phase }
        })
        .collect();

    let res = config.resolution;
    let nn = res * res;
    let mut rates = Mat::zeros(nn, config.n_cells);
    let mut xs = Vec::with_capacity(nn);
    let mut ys = Vec::with_capacity(nn);

    let sharpness = 1.0 / (3.0 * config.field_width.max(1e-3));

    for row in 0..nn {
        let xi = (row / res) as f32 / res as f32 * config.arena_len;
        let yi = (row % res) as f32 / res as f32 * config.arena_len;

        for (j, cell) in cells.iter().enumerate() {
            let mut g = 0f32;
            for k in cell.ks.iter() {
                let dx = xi - cell.phase[0];
                let dy = yi - cell.phase[1];
                g += (k[0] * dx + k[1] * dy).cos();
            }
            // peak of the three-cosine sum is 3; sharpen into bumps
            rates[(row, j)] = ((g - 3.0) * sharpness).exp();
        }

        xs.push(xi);
        ys.push(yi);
    }

    let labels = LabelTable::new().with_column("x", xs).with_column("y", ys);
    Ok((rates, labels))
}
