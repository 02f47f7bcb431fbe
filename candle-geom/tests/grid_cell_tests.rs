use candle_core::Device;
use candle_geom::candle_grid_cell::*;
use candle_geom::candle_grid_inference::*;
use candle_geom::candle_grid_input::*;

fn small_config() -> GridCellConfig {
    GridCellConfig {
        num_grid: 8,
        num_neurons: 12,
        block_size: 4,
        sigma: 0.1,
        rnn_step: 2,
        w_kernel: 1.0,
        w_trans: 0.1,
        w_isometry: 0.005,
        w_reg_u: 0.2,
        reg_decay_until: 100,
        s_0: 0.2,
        positive_v: true,
        norm_v: true,
    }
}

fn small_sampler(cfg: &GridCellConfig, seed: u64) -> GridBatchSampler {
    GridBatchSampler::new(
        GridBatchSamplerArgs {
            num_grid: cfg.num_grid,
            batch_size: 16,
            rnn_step: cfg.rnn_step,
            num_blocks: cfg.num_blocks(),
            max_dr_trans: 1.5,
            max_dr_isometry: 3.0,
            seed,
        },
        &Device::Cpu,
    )
}

#[test]
fn encoder_lookup_shapes_test() -> anyhow::Result<()> {
    let cfg = small_config();
    let model = GridCellModel::new(cfg.clone(), &Device::Cpu)?;

    let x = candle_core::Tensor::from_vec(vec![3.0f32, 4.0, 0.0, 0.0, 6.9, 6.9], (3, 2), &Device::Cpu)?;
    let v_xn = model.encoder.encode(&x)?;
    assert_eq!(v_xn.dims(), &[3, cfg.num_neurons]);
    Ok(())
}

#[test]
fn place_kernel_peaks_at_position_test() -> anyhow::Result<()> {
    let cfg = small_config();
    let model = GridCellModel::new(cfg.clone(), &Device::Cpu)?;

    let x = candle_core::Tensor::from_vec(vec![3.0f32, 4.0], (1, 2), &Device::Cpu)?;
    let kernel = model.place_kernel(&x)?.flatten_all()?.to_vec1::<f32>()?;

    let peak = 3 * cfg.num_grid + 4;
    let (argmax, max) = kernel
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |acc, (i, &v)| {
            if v > acc.1 {
                (i, v)
            } else {
                acc
            }
        });

    assert_eq!(argmax, peak);
    assert!((max - 1.0).abs() < 1e-5);
    Ok(())
}

#[test]
fn loss_components_finite_test() -> anyhow::Result<()> {
    let cfg = small_config();
    let model = GridCellModel::new(cfg.clone(), &Device::Cpu)?;
    let mut sampler = small_sampler(&cfg, 11);

    let batch = sampler.sample_batch()?;
    let (_, metrics) = model.loss(&batch, 1)?;

    assert!(metrics.total.is_finite());
    assert!(metrics.kernel.is_finite());
    assert!(metrics.trans.is_finite());
    assert!(metrics.isometry.is_finite());
    assert!(metrics.reg > 0.0);
    Ok(())
}

#[test]
fn projections_enforce_constraints_test() -> anyhow::Result<()> {
    let cfg = small_config();
    let model = GridCellModel::new(cfg.clone(), &Device::Cpu)?;

    model.apply_projections()?;

    let v_min = model
        .encoder
        .field()
        .as_tensor()
        .min_all()?
        .to_scalar::<f32>()?;
    assert!(v_min >= 0.0);

    let b_min = model
        .trans
        .velocity_weight()
        .as_tensor()
        .min_all()?
        .to_scalar::<f32>()?;
    assert!(b_min >= 0.0);
    Ok(())
}

#[test]
fn path_integration_bounded_test() -> anyhow::Result<()> {
    let cfg = small_config();
    let model = GridCellModel::new(cfg.clone(), &Device::Cpu)?;
    let mut sampler = small_sampler(&cfg, 5);

    let eval = sampler.sample_eval(6, 4)?;
    let errors = model.path_integration(&eval)?;

    // decoded positions stay in the arena, so errors are bounded by its diagonal
    let diag = (2.0f32).sqrt() * (cfg.num_grid as f32 - 1.0);
    assert!(errors.err_vanilla.is_finite() && errors.err_vanilla <= diag);
    assert!(errors.err_reencode.is_finite() && errors.err_reencode <= diag);
    Ok(())
}

#[test]
fn sampler_is_deterministic_test() -> anyhow::Result<()> {
    let cfg = small_config();
    let mut s1 = small_sampler(&cfg, 99);
    let mut s2 = small_sampler(&cfg, 99);

    let b1 = s1.sample_batch()?;
    let b2 = s2.sample_batch()?;

    let a = b1.x_kernel.flatten_all()?.to_vec1::<f32>()?;
    let b = b2.x_kernel.flatten_all()?.to_vec1::<f32>()?;
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn short_training_run_test() -> anyhow::Result<()> {
    let cfg = small_config();
    let model = GridCellModel::new(cfg.clone(), &Device::Cpu)?;
    let mut sampler = small_sampler(&cfg, 21);

    let config = GridTrainConfig {
        num_steps: 6,
        learning_rate: 1e-3,
        lr_decay_from: 4,
        steps_per_logging: 2,
        steps_per_integration: 6,
        n_eval_traj: 4,
        n_eval_steps: 3,
        adaptive_dr: false,
        score_threshold: 0.37,
        verbose: false,
        show_progress: false,
    };

    let trace = train_grid_cell(&model, &mut sampler, &config)?;

    assert!(!trace.steps.is_empty());
    assert_eq!(trace.total.len(), trace.steps.len());
    assert!(!trace.eval_steps.is_empty());
    assert_eq!(trace.err_vanilla.len(), trace.eval_steps.len());
    assert_eq!(trace.grid_score.len(), trace.eval_steps.len());
    assert!(trace.total.iter().all(|x| x.is_finite()));
    Ok(())
}
