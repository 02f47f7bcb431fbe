use crate::candle_grid_cell::{GridCellModel, GridMetrics};
use crate::candle_grid_input::GridBatchSampler;

use candle_nn::Optimizer;
use grid_score::{score_population, GridScorer};
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::info;
use ndarray::Array2;

pub struct GridTrainConfig {
    pub num_steps: usize,
    pub learning_rate: f64,
    /// constant learning rate until here, then linear decay to 10%
    pub lr_decay_from: usize,
    pub steps_per_logging: usize,
    pub steps_per_integration: usize,
    pub n_eval_traj: usize,
    pub n_eval_steps: usize,
    /// rescale the isometry displacement ranges from the scored module
    /// scales once the population score clears `score_threshold`
    pub adaptive_dr: bool,
    pub score_threshold: f32,
    pub verbose: bool,
    pub show_progress: bool,
}

/// Windowed training metrics plus periodic evaluation results
pub struct GridTrainTrace {
    pub steps: Vec<usize>,
    pub total: Vec<f32>,
    pub kernel: Vec<f32>,
    pub trans: Vec<f32>,
    pub isometry: Vec<f32>,
    pub reg: Vec<f32>,

    pub eval_steps: Vec<usize>,
    pub err_vanilla: Vec<f32>,
    pub err_reencode: Vec<f32>,
    pub err_fixed: Vec<f32>,
    pub err_fixed_zero: Vec<f32>,
    pub grid_score: Vec<f32>,
    pub grid_scale: Vec<f32>,
}

impl GridTrainTrace {
    fn new() -> Self {
        Self {
            steps: vec![],
            total: vec![],
            kernel: vec![],
            trans: vec![],
            isometry: vec![],
            reg: vec![],
            eval_steps: vec![],
            err_vanilla: vec![],
            err_reencode: vec![],
            err_fixed: vec![],
            err_fixed_zero: vec![],
            grid_score: vec![],
            grid_scale: vec![],
        }
    }
}

/// Extract per-neuron rate maps from the encoder field
pub fn rate_maps_from_field(model: &GridCellModel) -> anyhow::Result<Vec<Array2<f32>>> {
    let gg = model.config.num_grid;
    let field: Vec<Vec<f32>> = model
        .encoder
        .field()
        .as_tensor()
        .to_device(&candle_core::Device::Cpu)?
        .to_vec2::<f32>()?;

    field
        .into_iter()
        .map(|row| Ok(Array2::from_shape_vec((gg, gg), row)?))
        .collect()
}

///
/// Train the grid-cell model with periodic path-integration and grid
/// scoring. Constraint projections (non-negative field, module
/// normalization, non-negative velocity weights) run after every
/// optimizer step, matching the reference training procedure.
///
pub fn train_grid_cell(
    model: &GridCellModel,
    sampler: &mut GridBatchSampler,
    config: &GridTrainConfig,
) -> anyhow::Result<GridTrainTrace> {
    let mut adam = candle_nn::AdamW::new_lr(model.all_vars(), config.learning_rate)?;

    let pb = ProgressBar::new(config.num_steps as u64);
    if !config.show_progress || config.verbose {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    let scorer = GridScorer::new(model.config.num_grid, grid_score::default_mask_params());

    let mut trace = GridTrainTrace::new();
    let mut window: Vec<GridMetrics> = vec![];

    for step in 1..=config.num_steps {
        adam.set_learning_rate(scheduled_lr(config, step));

        let batch = sampler.sample_batch()?;
        let (loss, metrics) = model.loss(&batch, step)?;

        if !metrics.total.is_finite() {
            return Err(anyhow::anyhow!(
                "grid-cell loss diverged (non-finite) at step {}",
                step
            ));
        }

        adam.backward_step(&loss)?;
        model.apply_projections()?;

        window.push(metrics);

        if step % config.steps_per_logging == 0 || step == 1 {
            let nn = window.len() as f32;
            let mean = |f: fn(&GridMetrics) -> f32| window.iter().map(f).sum::<f32>() / nn;

            trace.steps.push(step);
            trace.total.push(mean(|m| m.total));
            trace.kernel.push(mean(|m| m.kernel));
            trace.trans.push(mean(|m| m.trans));
            trace.isometry.push(mean(|m| m.isometry));
            trace.reg.push(mean(|m| m.reg));

            if config.verbose {
                info!(
                    "[{}] total: {:.4} kernel: {:.4} trans: {:.4} isometry: {:.4}",
                    step,
                    trace.total.last().copied().unwrap_or_default(),
                    trace.kernel.last().copied().unwrap_or_default(),
                    trace.trans.last().copied().unwrap_or_default(),
                    trace.isometry.last().copied().unwrap_or_default(),
                );
            }
            window.clear();
        }

        if step % config.steps_per_integration == 0 || step == 1 {
            let eval = sampler.sample_eval(config.n_eval_traj, config.n_eval_steps)?;
            let errors = model.path_integration(&eval)?;
            let (err_fixed, err_fixed_zero) = model.fixed_point_error()?;

            let maps = rate_maps_from_field(model)?;
            let population = score_population(
                &maps,
                model.config.block_size,
                &scorer,
                config.score_threshold,
            )?;

            if config.adaptive_dr
                && population.score_mean > config.score_threshold
                && population.max_scale > 0.0
            {
                let scales: Vec<f32> = population
                    .scale_per_block
                    .iter()
                    .map(|&s| s / population.max_scale)
                    .collect();
                sampler.set_scale_vector(scales);
                if config.verbose {
                    info!("[{}] rescaled modules: {:?}", step, sampler.scale_vector());
                }
            }

            trace.eval_steps.push(step);
            trace.err_vanilla.push(errors.err_vanilla);
            trace.err_reencode.push(errors.err_reencode);
            trace.err_fixed.push(err_fixed);
            trace.err_fixed_zero.push(err_fixed_zero);
            trace.grid_score.push(population.score_mean);
            trace
                .grid_scale
                .push(population.max_scale * model.config.num_grid as f32);

            if config.verbose {
                info!(
                    "[{}] path integration: vanilla {:.3} reencode {:.3} score {:.3}",
                    step, errors.err_vanilla, errors.err_reencode, population.score_mean
                );
            }
        }

        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(trace)
}

fn scheduled_lr(config: &GridTrainConfig, step: usize) -> f64 {
    if step <= config.lr_decay_from || config.num_steps <= config.lr_decay_from {
        return config.learning_rate;
    }

    let progress = (step - config.lr_decay_from) as f64
        / (config.num_steps - config.lr_decay_from) as f64;
    config.learning_rate * (1.0 - 0.9 * progress)
}
