use crate::candle_data_loader::*;
use crate::candle_loss_functions::circular_alignment_loss;
use crate::candle_model_traits::{DecoderModuleT, EncoderModuleT};

use candle_core::{Device, Result, Tensor};
use candle_nn::{AdamW, Optimizer};
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::info;
use matrix_util::traits::ConvertMatOps;
use nalgebra::DMatrix;
use rayon::prelude::*;

pub struct VaeTrainConfig {
    pub learning_rate: f32,
    pub batch_size: usize,
    pub num_epochs: usize,
    /// weight for the KL term
    pub beta: f64,
    /// weight for the latent-geometry alignment term
    pub gamma: f64,
    /// halve the learning rate when the loss stops improving
    pub plateau_scheduler: bool,
    pub device: Device,
    pub verbose: bool,
    pub show_progress: bool,
}

/// Per-epoch averages accumulated over minibatches
pub struct VaeTrainTrace {
    pub total: Vec<f32>,
    pub llik: Vec<f32>,
    pub kl: Vec<f32>,
    pub latent: Vec<f32>,
}

pub struct Vae<'a, Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    pub encoder: &'a Enc,
    pub decoder: &'a Dec,
    pub variable_map: &'a candle_nn::VarMap,
}

pub trait VaeT<'a, Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    /// Train the VAE model
    /// * `data` - data loader should have `minibatch_shuffled`
    /// * `llik` - log likelihood function
    /// * `train_config` - training configuration
    fn train_encoder_decoder<DataL, LlikFn>(
        &mut self,
        data: &mut DataL,
        llik: &LlikFn,
        train_config: &VaeTrainConfig,
    ) -> anyhow::Result<VaeTrainTrace>
    where
        DataL: DataLoader,
        LlikFn: Fn(&Tensor, &Tensor) -> Result<Tensor>;

    /// Build a VAE model
    /// * `encoder` - encoder module
    /// * `decoder` - decoder module
    fn build(encoder: &'a Enc, decoder: &'a Dec, variable_map: &'a candle_nn::VarMap) -> Self;
}

impl<'a, Enc, Dec> VaeT<'a, Enc, Dec> for Vae<'a, Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    fn train_encoder_decoder<DataL, LlikFn>(
        &mut self,
        data: &mut DataL,
        llik_func: &LlikFn,
        train_config: &VaeTrainConfig,
    ) -> anyhow::Result<VaeTrainTrace>
    where
        DataL: DataLoader,
        LlikFn: Fn(&Tensor, &Tensor) -> Result<Tensor>,
    {
        let device = &train_config.device;
        let mut adam = AdamW::new_lr(
            self.variable_map.all_vars(),
            train_config.learning_rate.into(),
        )?;

        let pb = ProgressBar::new(train_config.num_epochs as u64);

        if !train_config.show_progress || train_config.verbose {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }

        let mut trace = VaeTrainTrace {
            total: vec![],
            llik: vec![],
            kl: vec![],
            latent: vec![],
        };

        data.shuffle_minibatch(train_config.batch_size)?;

        let num_minibatches = data.num_minibatch();

        let minibatch_vec = (0..num_minibatches)
            .map(|b| data.minibatch_shuffled(b, device))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut scheduler = PlateauScheduler::new(train_config.learning_rate as f64);

        for epoch in 0..train_config.num_epochs {
            let mut llik_tot = 0f32;
            let mut kl_tot = 0f32;
            let mut latent_tot = 0f32;
            let mut loss_tot = 0f32;

            for mb in minibatch_vec.iter() {
                let x_nd = &mb.input;

                let (z_nk, kl_n) = self.encoder.forward_t(x_nd, true)?;
                let (_, llik_n) = self.decoder.forward_with_llik(&z_nk, x_nd, llik_func)?;

                let mut loss = ((&kl_n * train_config.beta)? - &llik_n)?;

                let latent_val = match (mb.labels.as_ref(), train_config.gamma > 0.0) {
                    (Some(labels), true) => {
                        let angle_n1 = labels.narrow(1, 0, 1)?;
                        let latent_n = circular_alignment_loss(&z_nk, &angle_n1)?;
                        loss = (loss + (&latent_n * train_config.gamma)?)?;
                        latent_n.mean_all()?.to_scalar::<f32>()?
                    }
                    _ => 0f32,
                };

                let loss = loss.mean_all()?;
                let loss_val = loss.to_scalar::<f32>()?;

                if !loss_val.is_finite() {
                    return Err(anyhow::anyhow!(
                        "loss diverged (non-finite) at epoch {}",
                        epoch + 1
                    ));
                }

                adam.backward_step(&loss)?;

                llik_tot += llik_n.mean_all()?.to_scalar::<f32>()?;
                kl_tot += kl_n.mean_all()?.to_scalar::<f32>()?;
                latent_tot += latent_val;
                loss_tot += loss_val;
            }

            let denom = num_minibatches.max(1) as f32;
            trace.total.push(loss_tot / denom);
            trace.llik.push(llik_tot / denom);
            trace.kl.push(kl_tot / denom);
            trace.latent.push(latent_tot / denom);

            if train_config.plateau_scheduler {
                if let Some(new_lr) = scheduler.step(loss_tot / denom) {
                    adam.set_learning_rate(new_lr);
                    if train_config.verbose {
                        info!("[{}] reducing learning rate to {}", epoch + 1, new_lr);
                    }
                }
            }

            pb.inc(1);
            if train_config.verbose {
                info!(
                    "[{}] total: {:.4} llik: {:.4} kl: {:.4}",
                    epoch + 1,
                    loss_tot / denom,
                    llik_tot / denom,
                    kl_tot / denom
                );
            }
        } // each epoch

        pb.finish_and_clear();
        Ok(trace)
    }

    fn build(encoder: &'a Enc, decoder: &'a Dec, variable_map: &'a candle_nn::VarMap) -> Self {
        assert_eq!(encoder.dim_latent(), decoder.dim_latent());

        Self {
            encoder,
            decoder,
            variable_map,
        }
    }
}

/// Reduce-on-plateau: halve the learning rate after `patience` epochs
/// without relative improvement.
struct PlateauScheduler {
    lr: f64,
    best: f32,
    stall: usize,
    patience: usize,
    factor: f64,
    min_lr: f64,
}

impl PlateauScheduler {
    fn new(lr: f64) -> Self {
        Self {
            lr,
            best: f32::INFINITY,
            stall: 0,
            patience: 10,
            factor: 0.5,
            min_lr: 1e-6,
        }
    }

    fn step(&mut self, loss: f32) -> Option<f64> {
        let improved = !self.best.is_finite() || loss < self.best - self.best.abs() * 1e-4;
        if improved {
            self.best = loss;
            self.stall = 0;
            return None;
        }

        self.stall += 1;
        if self.stall >= self.patience && self.lr > self.min_lr {
            self.stall = 0;
            self.lr = (self.lr * self.factor).max(self.min_lr);
            return Some(self.lr);
        }
        None
    }
}

/// Evaluate posterior locations for the whole dataset (eval mode),
/// block by block in parallel.
pub fn evaluate_latent_by_encoder<Enc>(
    encoder: &Enc,
    data: &DMatrix<f32>,
    block_size: usize,
    dev: &Device,
) -> anyhow::Result<DMatrix<f32>>
where
    Enc: EncoderModuleT + Send + Sync,
{
    let ntot = data.nrows();
    let block_size = block_size.max(1);

    let jobs: Vec<(usize, usize)> = (0..ntot)
        .step_by(block_size)
        .map(|lb| (lb, (lb + block_size).min(ntot)))
        .collect();

    let mut chunks = jobs
        .par_iter()
        .map(|&(lb, ub)| -> anyhow::Result<(usize, DMatrix<f32>)> {
            let x_nd = data.rows(lb, ub - lb).into_owned().to_tensor(dev)?;
            let params = encoder.posterior_params(&x_nd, false)?;
            let loc = params.loc.to_device(&Device::Cpu)?;
            Ok((lb, DMatrix::<f32>::from_tensor(&loc)?))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    chunks.sort_by_key(|&(lb, _)| lb);

    let kk = chunks
        .first()
        .map(|(_, z)| z.ncols())
        .ok_or(anyhow::anyhow!("empty data"))?;

    let mut ret = DMatrix::<f32>::zeros(ntot, kk);
    let mut lb = 0;
    for (_, z) in chunks {
        let ub = lb + z.nrows();
        ret.rows_range_mut(lb..ub).copy_from(&z);
        lb = ub;
    }
    Ok(ret)
}
