use crate::geom_common::*;
use crate::run_log::*;

use candle_geom::candle_grid_cell::{GridCellConfig, GridCellModel};
use candle_geom::candle_grid_inference::*;
use candle_geom::candle_grid_input::{GridBatchSampler, GridBatchSamplerArgs};
use matrix_util::traits::{ConvertMatOps, IoOps};
use serde_json::json;

#[derive(Args, Debug)]
pub struct FitGridRnnArgs {
    #[arg(
        long,
        short,
        required = true,
        help = "Output header",
        long_help = "Output header for results.\n\
		     Generated files:\n\
		     - {out}.metrics.parquet\n\
		     - {out}.path_integration.parquet\n\
		     - {out}.rate_maps.parquet\n\
		     - {out}.config.json\n"
    )]
    pub out: Box<str>,

    #[arg(long, default_value_t = 40, help = "Arena bins per side")]
    pub num_grid: usize,

    #[arg(
        long,
        default_value_t = 480,
        help = "Number of neurons",
        long_help = "Number of neurons in the position field.\n\
		     Must be a multiple of the block size."
    )]
    pub num_neurons: usize,

    #[arg(long, default_value_t = 12, help = "Neurons per module")]
    pub block_size: usize,

    #[arg(
        long,
        default_value_t = 0.07,
        help = "Place kernel bandwidth",
        long_help = "Bandwidth of the Gaussian place kernel,\n\
		     as a fraction of the arena side."
    )]
    pub sigma: f64,

    #[arg(long, default_value_t = 10, help = "Unrolled transition steps")]
    pub rnn_step: usize,

    #[arg(long, default_value_t = 1.05, help = "Weight of the place-kernel loss")]
    pub w_kernel: f64,

    #[arg(long, default_value_t = 0.1, help = "Weight of the transition loss")]
    pub w_trans: f64,

    #[arg(long, default_value_t = 0.005, help = "Weight of the isometry loss")]
    pub w_isometry: f64,

    #[arg(long, default_value_t = 0.2, help = "Weight of the decoder regularizer")]
    pub w_reg_u: f64,

    #[arg(
        long,
        default_value_t = 15000,
        help = "Regularizer decay horizon (steps)"
    )]
    pub reg_decay_until: usize,

    #[arg(long, default_value_t = 0.2, help = "Conformal scale factor")]
    pub s_0: f64,

    #[arg(long, default_value_t = 3.0, help = "Largest transition step (bins)")]
    pub max_dr_trans: f32,

    #[arg(long, default_value_t = 15.0, help = "Largest isometry step (bins)")]
    pub max_dr_isometry: f32,

    #[arg(long, default_value_t = 25000, help = "Training steps")]
    pub num_steps: usize,

    #[arg(long, default_value_t = 0.006, help = "Learning rate")]
    pub learning_rate: f64,

    #[arg(
        long,
        default_value_t = 10000,
        help = "Learning-rate decay start (steps)"
    )]
    pub lr_decay_from: usize,

    #[arg(long, default_value_t = 1024, help = "Batch size")]
    pub batch_size: usize,

    #[arg(long, default_value_t = 20, help = "Steps per metric logging")]
    pub steps_per_logging: usize,

    #[arg(
        long,
        default_value_t = 2000,
        help = "Steps per path-integration evaluation"
    )]
    pub steps_per_integration: usize,

    #[arg(long, default_value_t = 100, help = "Evaluation trajectories")]
    pub n_eval_traj: usize,

    #[arg(long, default_value_t = 30, help = "Evaluation trajectory length")]
    pub n_eval_steps: usize,

    #[arg(
        long,
        default_value_t = false,
        help = "Disable adaptive module displacement ranges",
        long_help = "By default the per-module isometry displacement ranges are\n\
		     rescaled from the scored grid scales once the population\n\
		     score clears the threshold; this turns that feedback off."
    )]
    pub no_adaptive_dr: bool,

    #[arg(long, default_value_t = 0.37, help = "Grid-score gate")]
    pub score_threshold: f32,

    #[arg(
        long,
        default_value_t = false,
        help = "Allow negative field values",
        long_help = "Skip the non-negativity projection of the position field."
    )]
    pub allow_negative_v: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "Skip module normalization",
        long_help = "Skip the per-module normalization of the position field."
    )]
    pub skip_norm_v: bool,

    #[arg(long, default_value_t = 0, help = "Random seed")]
    pub seed: u64,

    #[arg(
        long,
        value_enum,
        default_value = "cpu",
        help = "Candle device",
        long_help = "Candle device to use for computation.\n\
		     Options: cpu, cuda, metal."
    )]
    pub device: ComputeDevice,

    #[arg(long, default_value_t = 0, help = "Device number (cuda/metal)")]
    pub device_no: usize,

    #[arg(long, short, help = "Verbosity")]
    pub verbose: bool,
}

pub fn fit_grid_rnn(args: &FitGridRnnArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::try_init().ok();

    let dev = select_device(args.device, args.device_no)?;

    let config = GridCellConfig {
        num_grid: args.num_grid,
        num_neurons: args.num_neurons,
        block_size: args.block_size,
        sigma: args.sigma,
        rnn_step: args.rnn_step,
        w_kernel: args.w_kernel,
        w_trans: args.w_trans,
        w_isometry: args.w_isometry,
        w_reg_u: args.w_reg_u,
        reg_decay_until: args.reg_decay_until,
        s_0: args.s_0,
        positive_v: !args.allow_negative_v,
        norm_v: !args.skip_norm_v,
    };

    info!(
        "grid-cell model: {} neurons in {} modules over a {}^2 arena",
        config.num_neurons,
        config.num_blocks(),
        config.num_grid
    );

    let model = GridCellModel::new(config.clone(), &dev)?;

    let mut sampler = GridBatchSampler::new(
        GridBatchSamplerArgs {
            num_grid: config.num_grid,
            batch_size: args.batch_size,
            rnn_step: config.rnn_step,
            num_blocks: config.num_blocks(),
            max_dr_trans: args.max_dr_trans,
            max_dr_isometry: args.max_dr_isometry,
            seed: args.seed,
        },
        &dev,
    );

    let train_config = GridTrainConfig {
        num_steps: args.num_steps,
        learning_rate: args.learning_rate,
        lr_decay_from: args.lr_decay_from,
        steps_per_logging: args.steps_per_logging,
        steps_per_integration: args.steps_per_integration,
        n_eval_traj: args.n_eval_traj,
        n_eval_steps: args.n_eval_steps,
        adaptive_dr: !args.no_adaptive_dr,
        score_threshold: args.score_threshold,
        verbose: args.verbose,
        show_progress: true,
    };

    info!("Start training the grid-cell network...");
    let trace = train_grid_cell(&model, &mut sampler, &train_config)?;
    info!("done model training");

    matrix_util::common_io::mkdir_for(args.out.as_ref())?;

    MetricTrace::new("step")
        .with_row_names(&trace.steps)
        .push_column("total", &trace.total)
        .push_column("kernel", &trace.kernel)
        .push_column("trans", &trace.trans)
        .push_column("isometry", &trace.isometry)
        .push_column("reg", &trace.reg)
        .to_parquet(&format!("{}.metrics.parquet", args.out))?;

    MetricTrace::new("step")
        .with_row_names(&trace.eval_steps)
        .push_column("err_vanilla", &trace.err_vanilla)
        .push_column("err_reencode", &trace.err_reencode)
        .push_column("err_fixed", &trace.err_fixed)
        .push_column("err_fixed_zero", &trace.err_fixed_zero)
        .push_column("grid_score", &trace.grid_score)
        .push_column("grid_scale", &trace.grid_scale)
        .to_parquet(&format!("{}.path_integration.parquet", args.out))?;

    info!("Writing down the firing-rate maps");

    let field = Mat::from_tensor(
        &model
            .encoder
            .field()
            .as_tensor()
            .to_device(&candle_core::Device::Cpu)?,
    )?;

    let neuron_names: Vec<Box<str>> = (0..field.nrows())
        .map(|i| format!("neuron{}", i).into_boxed_str())
        .collect();

    field.to_parquet_with_names(
        &format!("{}.rate_maps.parquet", args.out),
        (Some(&neuron_names), Some("neuron")),
        None,
    )?;

    write_run_config(
        &json!({
            "command": "fit-grid-rnn",
            "num_grid": args.num_grid,
            "num_neurons": args.num_neurons,
            "block_size": args.block_size,
            "sigma": args.sigma,
            "rnn_step": args.rnn_step,
            "w_kernel": args.w_kernel,
            "w_trans": args.w_trans,
            "w_isometry": args.w_isometry,
            "w_reg_u": args.w_reg_u,
            "reg_decay_until": args.reg_decay_until,
            "s_0": args.s_0,
            "max_dr_trans": args.max_dr_trans,
            "max_dr_isometry": args.max_dr_isometry,
            "num_steps": args.num_steps,
            "learning_rate": args.learning_rate,
            "lr_decay_from": args.lr_decay_from,
            "batch_size": args.batch_size,
            "steps_per_logging": args.steps_per_logging,
            "steps_per_integration": args.steps_per_integration,
            "adaptive_dr": !args.no_adaptive_dr,
            "score_threshold": args.score_threshold,
            "seed": args.seed,
            "device": args.device.to_string(),
        }),
        &format!("{}.config.json", args.out),
    )?;

    info!("Done");
    Ok(())
}
