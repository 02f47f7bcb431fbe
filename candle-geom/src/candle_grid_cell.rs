//! Grid-cell path-integration model: a learnable position field
//! (encoder), a velocity-driven nonlinear transition, and a heatmap
//! position decoder, trained with place-kernel, transition, and
//! conformal isometry losses.

use crate::candle_grid_input::{EvalTrajectories, GridBatch};

use candle_core::{Device, Result, Tensor, Var, D};

#[derive(Clone, Debug)]
pub struct GridCellConfig {
    /// arena bins per side
    pub num_grid: usize,
    pub num_neurons: usize,
    /// neurons per module; must divide `num_neurons`
    pub block_size: usize,
    /// place kernel bandwidth as a fraction of the arena side
    pub sigma: f64,
    /// unrolled transition steps per batch
    pub rnn_step: usize,
    pub w_kernel: f64,
    pub w_trans: f64,
    pub w_isometry: f64,
    pub w_reg_u: f64,
    /// decoder regularizer decays linearly to zero by this step
    pub reg_decay_until: usize,
    /// conformal scale: latent displacement energy per unit step
    pub s_0: f64,
    pub positive_v: bool,
    pub norm_v: bool,
}

impl GridCellConfig {
    pub fn num_blocks(&self) -> usize {
        self.num_neurons / self.block_size
    }

    pub fn sigma_bins(&self) -> f64 {
        self.sigma * self.num_grid as f64
    }
}

/// Scalar loss components of one training step
#[derive(Clone, Copy, Debug)]
pub struct GridMetrics {
    pub total: f32,
    pub kernel: f32,
    pub trans: f32,
    pub isometry: f32,
    pub reg: f32,
}

pub struct PathIntegrationOutput {
    /// latent rollout only
    pub err_vanilla: f32,
    /// re-encode the decoded position at every step
    pub err_reencode: f32,
}

///
/// Learnable firing field `v` over the arena; `encode` reads the field
/// at continuous positions with bilinear interpolation. Gradients flow
/// into `v`, not into the query positions.
///
pub struct PositionEncoder {
    v: Var, // [neurons, grid * grid]
    num_grid: usize,
}

impl PositionEncoder {
    pub fn new(num_neurons: usize, num_grid: usize, dev: &Device) -> Result<Self> {
        let init = (Tensor::randn(0f32, 1f32, (num_neurons, num_grid * num_grid), dev)? * 0.01)?;
        Ok(Self {
            v: Var::from_tensor(&init)?,
            num_grid,
        })
    }

    pub fn field(&self) -> &Var {
        &self.v
    }

    /// `v(x)` for positions in grid units `[0, num_grid - 1]`
    pub fn encode(&self, x_n2: &Tensor) -> Result<Tensor> {
        let gg = self.num_grid;
        let dev = x_n2.device();
        let pos: Vec<Vec<f32>> = x_n2.to_vec2::<f32>()?;
        let nn = pos.len();

        let mut idx = [vec![0u32; nn], vec![0u32; nn], vec![0u32; nn], vec![0u32; nn]];
        let mut wgt = [vec![0f32; nn], vec![0f32; nn], vec![0f32; nn], vec![0f32; nn]];

        let hi = (gg - 1) as f32;
        for (i, p) in pos.iter().enumerate() {
            let r = p[0].clamp(0.0, hi - 1e-4);
            let c = p[1].clamp(0.0, hi - 1e-4);
            let (r0, c0) = (r.floor(), c.floor());
            let (wr, wc) = (r - r0, c - c0);
            let (r0u, c0u) = (r0 as usize, c0 as usize);
            let r1u = (r0u + 1).min(gg - 1);
            let c1u = (c0u + 1).min(gg - 1);

            idx[0][i] = (r0u * gg + c0u) as u32;
            idx[1][i] = (r0u * gg + c1u) as u32;
            idx[2][i] = (r1u * gg + c0u) as u32;
            idx[3][i] = (r1u * gg + c1u) as u32;
            wgt[0][i] = (1.0 - wr) * (1.0 - wc);
            wgt[1][i] = (1.0 - wr) * wc;
            wgt[2][i] = wr * (1.0 - wc);
            wgt[3][i] = wr * wc;
        }

        let vt = self.v.as_tensor().t()?.contiguous()?; // [grid * grid, neurons]

        let mut acc: Option<Tensor> = None;
        for corner in 0..4 {
            let take = Tensor::from_vec(idx[corner].clone(), (nn,), dev)?;
            let w_n1 = Tensor::from_vec(wgt[corner].clone(), (nn, 1), dev)?;
            let term = vt.index_select(&take, 0)?.broadcast_mul(&w_n1)?;
            acc = Some(match acc {
                Some(prev) => (prev + term)?,
                None => term,
            });
        }

        acc.ok_or_else(|| candle_core::Error::Msg("empty position batch".into()))
    }
}

///
/// One nonlinear recurrent step `v' = relu(v w + dx b)`; the velocity
/// projection `b` is kept non-negative by the training loop.
///
pub struct VelocityTransition {
    w: Var, // [neurons, neurons]
    b: Var, // [2, neurons]
}

impl VelocityTransition {
    pub fn new(num_neurons: usize, dev: &Device) -> Result<Self> {
        let eye = Tensor::eye(num_neurons, candle_core::DType::F32, dev)?;
        let noise = (Tensor::randn(0f32, 1f32, (num_neurons, num_neurons), dev)? * 0.001)?;
        let w = Var::from_tensor(&(eye + noise)?)?;

        let b_init = (Tensor::randn(0f32, 1f32, (2, num_neurons), dev)? * 0.01)?.abs()?;
        let b = Var::from_tensor(&b_init)?;

        Ok(Self { w, b })
    }

    pub fn velocity_weight(&self) -> &Var {
        &self.b
    }

    pub fn recurrent_weight(&self) -> &Var {
        &self.w
    }

    pub fn trans(&self, v_xn: &Tensor, dx_n2: &Tensor) -> Result<Tensor> {
        (v_xn.matmul(self.w.as_tensor())? + dx_n2.matmul(self.b.as_tensor())?)?.relu()
    }
}

///
/// Heatmap read-out `u`; decoding takes the arg-max bin of the heatmap
/// (evaluation only, not differentiable).
///
pub struct PositionDecoder {
    u: Var, // [neurons, grid * grid]
    num_grid: usize,
}

impl PositionDecoder {
    pub fn new(num_neurons: usize, num_grid: usize, dev: &Device) -> Result<Self> {
        let init = (Tensor::randn(0f32, 1f32, (num_neurons, num_grid * num_grid), dev)? * 0.01)?;
        Ok(Self {
            u: Var::from_tensor(&init)?,
            num_grid,
        })
    }

    pub fn readout(&self) -> &Var {
        &self.u
    }

    pub fn heatmap(&self, v_xn: &Tensor) -> Result<Tensor> {
        v_xn.matmul(self.u.as_tensor())
    }

    /// arg-max position in grid units, `[n, 2]`
    pub fn decode_position(&self, heatmap_ng: &Tensor) -> Result<Tensor> {
        let gg = self.num_grid;
        let flat: Vec<u32> = heatmap_ng.argmax(D::Minus1)?.to_vec1::<u32>()?;
        let pos: Vec<f32> = flat
            .iter()
            .flat_map(|&k| [(k as usize / gg) as f32, (k as usize % gg) as f32])
            .collect();
        Tensor::from_vec(pos, (flat.len(), 2), heatmap_ng.device())
    }
}

pub struct GridCellModel {
    pub config: GridCellConfig,
    pub encoder: PositionEncoder,
    pub trans: VelocityTransition,
    pub decoder: PositionDecoder,
    grid_coord: Tensor, // [grid * grid, 2]
}

impl GridCellModel {
    pub fn new(config: GridCellConfig, dev: &Device) -> Result<Self> {
        if config.block_size == 0 || config.num_neurons % config.block_size != 0 {
            candle_core::bail!(
                "block size {} must divide the number of neurons {}",
                config.block_size,
                config.num_neurons
            );
        }

        let gg = config.num_grid;
        let coords: Vec<f32> = (0..gg * gg)
            .flat_map(|k| [(k / gg) as f32, (k % gg) as f32])
            .collect();
        let grid_coord = Tensor::from_vec(coords, (gg * gg, 2), dev)?;

        Ok(Self {
            encoder: PositionEncoder::new(config.num_neurons, gg, dev)?,
            trans: VelocityTransition::new(config.num_neurons, dev)?,
            decoder: PositionDecoder::new(config.num_neurons, gg, dev)?,
            grid_coord,
            config,
        })
    }

    pub fn all_vars(&self) -> Vec<Var> {
        vec![
            self.encoder.v.clone(),
            self.trans.w.clone(),
            self.trans.b.clone(),
            self.decoder.u.clone(),
        ]
    }

    /// Gaussian place kernel around each position, `[n, grid * grid]`
    pub fn place_kernel(&self, x_n2: &Tensor) -> Result<Tensor> {
        let sigma = self.config.sigma_bins();
        let x_n12 = x_n2.unsqueeze(1)?;
        let g_1g2 = self.grid_coord.unsqueeze(0)?;
        let sq_ng = x_n12.broadcast_sub(&g_1g2)?.sqr()?.sum(D::Minus1)?;
        (sq_ng * (-0.5 / (sigma * sigma)))?.exp()
    }

    /// Loss components for one sampled batch at training `step`
    pub fn loss(&self, batch: &GridBatch, step: usize) -> Result<(Tensor, GridMetrics)> {
        let cfg = &self.config;

        // (1) place-kernel reconstruction through the decoder
        let v_xn = self.encoder.encode(&batch.x_kernel)?;
        let heat_ng = self.decoder.heatmap(&v_xn)?;
        let kernel_ng = self.place_kernel(&batch.x_kernel)?;
        let loss_kernel = heat_ng.sub(&kernel_ng)?.sqr()?.sum(D::Minus1)?.mean_all()?;

        // (2) unrolled transition error against re-encoded positions
        let x_0 = batch.traj_x.narrow(1, 0, 1)?.squeeze(1)?;
        let mut v_hat = self.encoder.encode(&x_0)?;
        let mut loss_trans: Option<Tensor> = None;
        for t in 0..cfg.rnn_step {
            let dx_t = batch.traj_dx.narrow(1, t, 1)?.squeeze(1)?;
            v_hat = self.trans.trans(&v_hat, &dx_t)?;
            let x_t = batch.traj_x.narrow(1, t + 1, 1)?.squeeze(1)?;
            let v_true = self.encoder.encode(&x_t)?;
            let err = v_hat.sub(&v_true)?.sqr()?.sum(D::Minus1)?.mean_all()?;
            loss_trans = Some(match loss_trans {
                Some(prev) => (prev + err)?,
                None => err,
            });
        }
        let loss_trans = (loss_trans
            .ok_or_else(|| candle_core::Error::Msg("rnn_step must be positive".into()))?
            / cfg.rnn_step as f64)?;

        // (3) conformal isometry per module
        let ss = cfg.s_0 * cfg.s_0;
        let mut loss_iso: Option<Tensor> = None;
        for (b, (x_b, dx_b)) in batch.iso_x.iter().zip(batch.iso_dx.iter()).enumerate() {
            let lb = b * cfg.block_size;
            let v_1 = self.encoder.encode(x_b)?.narrow(1, lb, cfg.block_size)?;
            let x_moved = x_b.add(dx_b)?;
            let v_2 = self.encoder.encode(&x_moved)?.narrow(1, lb, cfg.block_size)?;

            let energy_n = v_2.sub(&v_1)?.sqr()?.sum(D::Minus1)?;
            let target_n = (dx_b.sqr()?.sum(D::Minus1)? * ss)?;
            let dev_n = energy_n.sub(&target_n)?.sqr()?.mean_all()?;
            loss_iso = Some(match loss_iso {
                Some(prev) => (prev + dev_n)?,
                None => dev_n,
            });
        }
        let loss_iso = (loss_iso
            .ok_or_else(|| candle_core::Error::Msg("isometry batch is empty".into()))?
            / batch.iso_x.len() as f64)?;

        // (4) decoder regularizer, decaying to zero
        let decay = (1.0 - step as f64 / cfg.reg_decay_until.max(1) as f64).max(0.0);
        let loss_reg = (self.decoder.u.as_tensor().sqr()?.mean_all()? * decay)?;

        let total = ((loss_kernel.clone() * cfg.w_kernel)?
            + ((loss_trans.clone() * cfg.w_trans)?
                + ((loss_iso.clone() * cfg.w_isometry)? + (loss_reg.clone() * cfg.w_reg_u)?)?)?)?;

        let metrics = GridMetrics {
            total: total.to_scalar::<f32>()?,
            kernel: loss_kernel.to_scalar::<f32>()?,
            trans: loss_trans.to_scalar::<f32>()?,
            isometry: loss_iso.to_scalar::<f32>()?,
            reg: loss_reg.to_scalar::<f32>()?,
        };

        Ok((total, metrics))
    }

    /// Roll trajectories through the transition and decode positions;
    /// `reencode` feeds the decoded position back into the encoder.
    pub fn path_integration(&self, eval: &EvalTrajectories) -> Result<PathIntegrationOutput> {
        let (_, n_steps, _) = eval.dx.dims3()?;

        let mut v_vanilla = self.encoder.encode(&eval.x0)?;
        let mut x_reencode = eval.x0.clone();

        let mut err_vanilla = 0f32;
        let mut err_reencode = 0f32;

        for t in 0..n_steps {
            let dx_t = eval.dx.narrow(1, t, 1)?.squeeze(1)?;
            let x_true = eval.x_true.narrow(1, t, 1)?.squeeze(1)?;

            v_vanilla = self.trans.trans(&v_vanilla, &dx_t)?;
            let x_hat = self
                .decoder
                .decode_position(&self.decoder.heatmap(&v_vanilla)?)?;
            err_vanilla += euclidean_error(&x_hat, &x_true)?;

            let v_re = self.encoder.encode(&x_reencode)?;
            let v_re = self.trans.trans(&v_re, &dx_t)?;
            x_reencode = self
                .decoder
                .decode_position(&self.decoder.heatmap(&v_re)?)?;
            err_reencode += euclidean_error(&x_reencode, &x_true)?;
        }

        Ok(PathIntegrationOutput {
            err_vanilla: err_vanilla / n_steps as f32,
            err_reencode: err_reencode / n_steps as f32,
        })
    }

    /// Decoding errors at zero velocity over the whole arena:
    /// `decode(trans(v(x), 0))` vs `x`, and `decode(v(x))` vs `x`.
    pub fn fixed_point_error(&self) -> Result<(f32, f32)> {
        let gg = self.config.num_grid;
        let dev = self.grid_coord.device();

        let mut err_fixed = 0f32;
        let mut err_zero = 0f32;

        for i in 0..gg {
            let x_g2 = self.grid_coord.narrow(0, i * gg, gg)?;
            let v_xn = self.encoder.encode(&x_g2)?;

            let zeros = Tensor::zeros((gg, 2), candle_core::DType::F32, dev)?;
            let v_t = self.trans.trans(&v_xn, &zeros)?;

            let x_fixed = self.decoder.decode_position(&self.decoder.heatmap(&v_t)?)?;
            let x_zero = self.decoder.decode_position(&self.decoder.heatmap(&v_xn)?)?;

            err_fixed += x_fixed.sub(&x_g2)?.sqr()?.sum_all()?.to_scalar::<f32>()?;
            err_zero += x_zero.sub(&x_g2)?.sqr()?.sum_all()?.to_scalar::<f32>()?;
        }

        let denom = (gg * gg) as f32;
        Ok((err_fixed / denom, err_zero / denom))
    }

    /// Constraint projections applied after each optimizer step:
    /// clamp the field non-negative, normalize it within modules, and
    /// keep the velocity projection non-negative.
    pub fn apply_projections(&self) -> Result<()> {
        let cfg = &self.config;

        if cfg.positive_v {
            let v = self.encoder.v.as_tensor().relu()?;
            self.encoder.v.set(&v)?;
        }

        if cfg.norm_v {
            let nb = cfg.num_blocks();
            let gg2 = cfg.num_grid * cfg.num_grid;
            let v_bkg = self
                .encoder
                .v
                .as_tensor()
                .reshape((nb, cfg.block_size, gg2))?;
            let norm = v_bkg
                .sqr()?
                .sum_keepdim(1)?
                .sqrt()?
                .clamp(1e-8, f64::INFINITY)?;
            let v_bkg = (v_bkg.broadcast_div(&norm)? / (nb as f64).sqrt())?;
            self.encoder
                .v
                .set(&v_bkg.reshape((cfg.num_neurons, gg2))?)?;
        }

        let b_abs = self.trans.b.as_tensor().abs()?;
        self.trans.b.set(&b_abs)?;

        Ok(())
    }
}

fn euclidean_error(x_hat: &Tensor, x_true: &Tensor) -> Result<f32> {
    x_hat
        .sub(x_true)?
        .sqr()?
        .sum(D::Minus1)?
        .sqrt()?
        .mean_all()?
        .to_scalar::<f32>()
}
