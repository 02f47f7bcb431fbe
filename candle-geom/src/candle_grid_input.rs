//! Batch samplers for grid-cell training: uniform arena positions for
//! the place-kernel term, bounded random walks for the transition term,
//! and per-module displacement pairs for the isometry term.

use candle_core::{Device, Tensor};
use rand::prelude::*;
use rand::rngs::SmallRng;

pub struct GridBatch {
    /// positions for the kernel loss, `[n, 2]`
    pub x_kernel: Tensor,
    /// trajectory positions, `[n, rnn_step + 1, 2]`
    pub traj_x: Tensor,
    /// trajectory displacements, `[n, rnn_step, 2]`
    pub traj_dx: Tensor,
    /// per-module isometry anchors, each `[n, 2]`
    pub iso_x: Vec<Tensor>,
    /// per-module isometry displacements, each `[n, 2]`
    pub iso_dx: Vec<Tensor>,
}

pub struct EvalTrajectories {
    pub x0: Tensor,     // [n, 2]
    pub x_true: Tensor, // [n, steps, 2]
    pub dx: Tensor,     // [n, steps, 2]
}

pub struct GridBatchSamplerArgs {
    pub num_grid: usize,
    pub batch_size: usize,
    pub rnn_step: usize,
    pub num_blocks: usize,
    /// largest single-step displacement (grid units)
    pub max_dr_trans: f32,
    /// largest isometry displacement (grid units)
    pub max_dr_isometry: f32,
    pub seed: u64,
}

pub struct GridBatchSampler {
    num_grid: usize,
    batch_size: usize,
    rnn_step: usize,
    num_blocks: usize,
    max_dr_trans: f32,
    max_dr_isometry: f32,
    /// per-module multiplier on the isometry displacement range,
    /// updated by the adaptive grid-scale feedback
    scale_vector: Vec<f32>,
    rng: SmallRng,
    device: Device,
}

impl GridBatchSampler {
    pub fn new(args: GridBatchSamplerArgs, device: &Device) -> Self {
        Self {
            num_grid: args.num_grid,
            batch_size: args.batch_size,
            rnn_step: args.rnn_step,
            num_blocks: args.num_blocks,
            max_dr_trans: args.max_dr_trans,
            max_dr_isometry: args.max_dr_isometry,
            scale_vector: vec![1.0; args.num_blocks],
            rng: SmallRng::seed_from_u64(args.seed),
            device: device.clone(),
        }
    }

    pub fn scale_vector(&self) -> &[f32] {
        &self.scale_vector
    }

    pub fn set_scale_vector(&mut self, scales: Vec<f32>) {
        if scales.len() == self.num_blocks {
            self.scale_vector = scales
                .into_iter()
                .map(|s| s.clamp(0.05, 1.0))
                .collect();
        }
    }

    fn uniform_position(&mut self) -> [f32; 2] {
        let hi = (self.num_grid - 1) as f32;
        [
            self.rng.random::<f32>() * hi,
            self.rng.random::<f32>() * hi,
        ]
    }

    /// step from `x`, reflecting at the arena walls
    fn bounded_step(&mut self, x: [f32; 2], max_dr: f32) -> ([f32; 2], [f32; 2]) {
        let hi = (self.num_grid - 1) as f32;
        let angle = self.rng.random::<f32>() * std::f32::consts::TAU;
        let radius = self.rng.random::<f32>() * max_dr;

        let mut dx = [radius * angle.cos(), radius * angle.sin()];
        let mut next = [x[0] + dx[0], x[1] + dx[1]];

        for d in 0..2 {
            if next[d] < 0.0 {
                next[d] = -next[d];
            }
            if next[d] > hi {
                next[d] = (2.0 * hi - next[d]).clamp(0.0, hi);
            }
            dx[d] = next[d] - x[d];
        }

        (next, dx)
    }

    pub fn sample_batch(&mut self) -> anyhow::Result<GridBatch> {
        let nn = self.batch_size;

        let mut kernel = Vec::with_capacity(nn * 2);
        for _ in 0..nn {
            kernel.extend_from_slice(&self.uniform_position());
        }
        let x_kernel = Tensor::from_vec(kernel, (nn, 2), &self.device)?;

        // bounded random walks
        let tt = self.rnn_step;
        let mut walk = Vec::with_capacity(nn * (tt + 1) * 2);
        let mut steps = Vec::with_capacity(nn * tt * 2);
        for _ in 0..nn {
            let mut x = self.uniform_position();
            walk.extend_from_slice(&x);
            for _ in 0..tt {
                let (next, dx) = self.bounded_step(x, self.max_dr_trans);
                walk.extend_from_slice(&next);
                steps.extend_from_slice(&dx);
                x = next;
            }
        }
        let traj_x = Tensor::from_vec(walk, (nn, tt + 1, 2), &self.device)?;
        let traj_dx = Tensor::from_vec(steps, (nn, tt, 2), &self.device)?;

        // per-module isometry pairs with module-specific ranges
        let mut iso_x = Vec::with_capacity(self.num_blocks);
        let mut iso_dx = Vec::with_capacity(self.num_blocks);
        for b in 0..self.num_blocks {
            let max_dr = self.max_dr_isometry * self.scale_vector[b];
            let mut anchors = Vec::with_capacity(nn * 2);
            let mut moves = Vec::with_capacity(nn * 2);
            for _ in 0..nn {
                let x = self.uniform_position();
                let (_, dx) = self.bounded_step(x, max_dr);
                anchors.extend_from_slice(&x);
                moves.extend_from_slice(&dx);
            }
            iso_x.push(Tensor::from_vec(anchors, (nn, 2), &self.device)?);
            iso_dx.push(Tensor::from_vec(moves, (nn, 2), &self.device)?);
        }

        Ok(GridBatch {
            x_kernel,
            traj_x,
            traj_dx,
            iso_x,
            iso_dx,
        })
    }

    pub fn sample_eval(
        &mut self,
        n_traj: usize,
        n_steps: usize,
    ) -> anyhow::Result<EvalTrajectories> {
        let mut starts = Vec::with_capacity(n_traj * 2);
        let mut truth = Vec::with_capacity(n_traj * n_steps * 2);
        let mut steps = Vec::with_capacity(n_traj * n_steps * 2);

        for _ in 0..n_traj {
            let mut x = self.uniform_position();
            starts.extend_from_slice(&x);
            for _ in 0..n_steps {
                let (next, dx) = self.bounded_step(x, self.max_dr_trans);
                truth.extend_from_slice(&next);
                steps.extend_from_slice(&dx);
                x = next;
            }
        }

        Ok(EvalTrajectories {
            x0: Tensor::from_vec(starts, (n_traj, 2), &self.device)?,
            x_true: Tensor::from_vec(truth, (n_traj, n_steps, 2), &self.device)?,
            dx: Tensor::from_vec(steps, (n_traj, n_steps, 2), &self.device)?,
        })
    }
}
