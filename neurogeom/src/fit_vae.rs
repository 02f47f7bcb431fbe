use crate::curvature::{evaluate_curvature, CurvatureInputs};
use crate::geom_common::*;
use crate::run_log::*;

use candle_geom::candle_data_loader::*;
use candle_geom::candle_decoder_fc::FcDecoder;
use candle_geom::candle_encoder_fc::{FcEncoder, FcEncoderArgs};
use candle_geom::candle_loss_functions::{gaussian_likelihood, poisson_likelihood_logits};
use candle_geom::candle_model_traits::*;
use candle_geom::candle_posterior::PosteriorKind;
use candle_geom::candle_vae_inference::*;
use matrix_util::traits::{ConvertMatOps, IoOps};
use serde_json::json;

#[derive(Args, Debug)]
pub struct FitVaeArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[arg(
        long,
        short,
        required = true,
        help = "Output header",
        long_help = "Output header for results.\n\
		     Generated files:\n\
		     - {out}.loss.parquet\n\
		     - {out}.latent.parquet\n\
		     - {out}.labels.parquet\n\
		     - {out}.recon.parquet\n\
		     - {out}.config.json\n\
		     - {out}.curvature_{true,learned}.parquet (synthetic manifolds)\n"
    )]
    pub out: Box<str>,

    #[arg(
        long,
        value_enum,
        help = "Posterior family",
        long_help = "Posterior family of the latent variable.\n\
		     Defaults per dataset: hyperspherical for S1/S2 and\n\
		     place cells, toroidal for T2 and grid cells, Gaussian\n\
		     for images, projections and points."
    )]
    pub posterior: Option<PosteriorArg>,

    #[arg(
        long,
        help = "Latent dimension",
        long_help = "Ambient latent dimension (Gaussian, hyperspherical) or\n\
		     the number of latent circles (toroidal).\n\
		     Defaults to the dimension matching the dataset's manifold."
    )]
    pub latent_dim: Option<usize>,

    #[arg(
        long,
        value_enum,
        default_value = "gaussian",
        help = "Generative likelihood",
        long_help = "Generative likelihood of the decoder output.\n\
		     Use poisson for firing-count data (place cells)."
    )]
    pub gen_likelihood: LikelihoodArg,

    #[arg(long, default_value_t = 128, help = "Encoder hidden width")]
    pub encoder_width: usize,

    #[arg(long, default_value_t = 2, help = "Encoder hidden depth")]
    pub encoder_depth: usize,

    #[arg(long, default_value_t = 128, help = "Decoder hidden width")]
    pub decoder_width: usize,

    #[arg(long, default_value_t = 2, help = "Decoder hidden depth")]
    pub decoder_depth: usize,

    #[arg(
        long,
        default_value_t = 4.5,
        help = "Softplus sharpness for concentrations"
    )]
    pub sftbeta: f64,

    #[arg(
        long,
        default_value_t = 0.03,
        help = "KL weight",
        long_help = "Weight of the KL term in the loss."
    )]
    pub beta: f64,

    #[arg(
        long,
        default_value_t = 0.0,
        help = "Latent-geometry weight",
        long_help = "Weight of the latent-geometry alignment term.\n\
		     Uses the labelled generative angle; set to 0 to disable."
    )]
    pub gamma: f64,

    #[arg(long, short = 'i', default_value_t = 100, help = "Training epochs")]
    pub epochs: usize,

    #[arg(long, default_value_t = 64, help = "Minibatch size")]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-3, help = "Learning rate")]
    pub learning_rate: f32,

    #[arg(
        long,
        default_value_t = false,
        help = "Reduce-on-plateau scheduler",
        long_help = "Halve the learning rate when the training loss plateaus."
    )]
    pub scheduler: bool,

    #[arg(long, default_value_t = 100, help = "Evaluation block size")]
    pub eval_block_size: usize,

    #[arg(
        long,
        default_value_t = false,
        help = "Skip curvature evaluation",
        long_help = "Skip the learned-vs-true curvature evaluation that runs\n\
		     after training on the synthetic manifolds."
    )]
    pub skip_curvature: bool,

    #[arg(
        long,
        default_value_t = 100,
        help = "Curvature grid size",
        long_help = "Latent grid resolution for curvature profiles:\n\
		     point count on S1, grid side on S2/T2."
    )]
    pub curvature_grid: usize,

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

pub fn fit_vae(args: &FitVaeArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::try_init().ok();

    // 1. Generate the data with generative labels
    let (data, label_table) = load_dataset(&args.data)?;
    let labels_mat = training_labels(args.data.dataset, &label_table)?;
    let (ntot, data_dim) = data.shape();

    info!("Dataset {}: {} x {}", args.data.dataset, ntot, data_dim);

    let posterior: PosteriorKind = args
        .posterior
        .map(Into::into)
        .unwrap_or_else(|| args.data.dataset.default_posterior());

    let latent_dim = args
        .latent_dim
        .unwrap_or_else(|| args.data.dataset.default_latent_dim(posterior));

    let dev = select_device(args.device, args.device_no)?;

    // 2. Build the encoder-decoder pair
    let parameters = candle_nn::VarMap::new();
    let param_builder =
        candle_nn::VarBuilder::from_varmap(&parameters, candle_core::DType::F32, &dev);

    let encoder = FcEncoder::new(
        FcEncoderArgs {
            data_dim,
            latent_dim,
            width: args.encoder_width,
            depth: args.encoder_depth,
            posterior,
            sftbeta: args.sftbeta,
        },
        param_builder.clone(),
    )?;

    let decoder = FcDecoder::new(
        encoder.dim_latent(),
        data_dim,
        args.decoder_width,
        args.decoder_depth,
        param_builder.clone(),
    )?;

    info!(
        "input: {} -> {} encoder -> z: {} -> decoder -> output: {}",
        data_dim,
        posterior,
        encoder.dim_latent(),
        data_dim
    );

    // 3. Train
    let mut data_loader = InMemoryData::new_with_labels(&data, &labels_mat)?;

    let train_config = VaeTrainConfig {
        learning_rate: args.learning_rate,
        batch_size: args.batch_size,
        num_epochs: args.epochs,
        beta: args.beta,
        gamma: args.gamma,
        plateau_scheduler: args.scheduler,
        device: dev.clone(),
        verbose: args.verbose,
        show_progress: true,
    };

    let mut vae = Vae::build(&encoder, &decoder, &parameters);

    info!("Start training VAE...");
    let trace = match args.gen_likelihood {
        LikelihoodArg::Gaussian => {
            vae.train_encoder_decoder(&mut data_loader, &gaussian_likelihood, &train_config)?
        }
        LikelihoodArg::Poisson => {
            vae.train_encoder_decoder(&mut data_loader, &poisson_likelihood_logits, &train_config)?
        }
    };
    info!("done model training");

    // 4. Write down losses, latent states and reconstructions
    matrix_util::common_io::mkdir_for(args.out.as_ref())?;

    let epochs: Vec<usize> = (1..=trace.total.len()).collect();
    MetricTrace::new("epoch")
        .with_row_names(&epochs)
        .push_column("total", &trace.total)
        .push_column("log_likelihood", &trace.llik)
        .push_column("kl_divergence", &trace.kl)
        .push_column("latent_loss", &trace.latent)
        .to_parquet(&format!("{}.loss.parquet", args.out))?;

    info!("Writing down the latent states");
    let z_nk = evaluate_latent_by_encoder(&encoder, &data, args.eval_block_size, &dev)?;

    let z_names: Vec<Box<str>> = (0..z_nk.ncols())
        .map(|j| format!("z{}", j).into_boxed_str())
        .collect();

    z_nk.to_parquet_with_names(
        &format!("{}.latent.parquet", args.out),
        (None, Some("obs")),
        Some(&z_names),
    )?;

    label_table.to_parquet(&format!("{}.labels.parquet", args.out))?;

    let recon = reconstruct_by_decoder(&decoder, &z_nk, args.eval_block_size, &dev)?;
    recon.to_parquet_with_names(
        &format!("{}.recon.parquet", args.out),
        (None, Some("obs")),
        None,
    )?;

    write_run_config(
        &json!({
            "command": "fit-vae",
            "dataset": args.data.dataset.to_string(),
            "n_times": args.data.n_times,
            "embedding_dim": args.data.embedding_dim,
            "radius": args.data.radius,
            "major_radius": args.data.major_radius,
            "minor_radius": args.data.minor_radius,
            "distortion_amp": args.data.distortion_amp,
            "n_wiggles": args.data.n_wiggles,
            "noise_var": args.data.noise_var,
            "seed": args.data.seed,
            "posterior": posterior.to_string(),
            "latent_dim": latent_dim,
            "gen_likelihood": args.gen_likelihood.to_string(),
            "encoder_width": args.encoder_width,
            "encoder_depth": args.encoder_depth,
            "decoder_width": args.decoder_width,
            "decoder_depth": args.decoder_depth,
            "sftbeta": args.sftbeta,
            "beta": args.beta,
            "gamma": args.gamma,
            "epochs": args.epochs,
            "batch_size": args.batch_size,
            "learning_rate": args.learning_rate,
            "scheduler": args.scheduler,
            "device": args.device.to_string(),
        }),
        &format!("{}.config.json", args.out),
    )?;

    // 5. Curvature of the learned manifold vs. the generative one
    if args.data.dataset.is_synthetic_manifold() && !args.skip_curvature {
        evaluate_curvature(&CurvatureInputs {
            dataset: args.data.dataset,
            decoder: &decoder,
            manifold: args.data.manifold_config(),
            n_grid: args.curvature_grid,
            device: dev,
            out: args.out.to_string(),
        })?;
    }

    info!("Done");
    Ok(())
}

fn reconstruct_by_decoder<Dec>(
    decoder: &Dec,
    z_nk: &Mat,
    block_size: usize,
    dev: &candle_core::Device,
) -> anyhow::Result<Mat>
where
    Dec: DecoderModuleT,
{
    let ntot = z_nk.nrows();
    let block_size = block_size.max(1);
    let mut ret = Mat::zeros(ntot, decoder.dim_obs());

    let mut lb = 0;
    while lb < ntot {
        let ub = (lb + block_size).min(ntot);
        let z_block = z_nk.rows(lb, ub - lb).into_owned().to_tensor(dev)?;
        let recon = decoder.forward(&z_block)?.to_device(&candle_core::Device::Cpu)?;
        ret.rows_range_mut(lb..ub)
            .copy_from(&Mat::from_tensor(&recon)?);
        lb = ub;
    }

    Ok(ret)
}
