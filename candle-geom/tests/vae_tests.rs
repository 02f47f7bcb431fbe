use candle_core::{DType, Device};
use candle_geom::candle_data_loader::*;
use candle_geom::candle_decoder_fc::FcDecoder;
use candle_geom::candle_encoder_fc::{FcEncoder, FcEncoderArgs};
use candle_geom::candle_loss_functions::gaussian_likelihood;
use candle_geom::candle_model_traits::*;
use candle_geom::candle_posterior::PosteriorKind;
use candle_geom::candle_vae_inference::*;
use nalgebra::DMatrix;
use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::StandardNormal;

fn new_model(
    posterior: PosteriorKind,
    data_dim: usize,
    latent_dim: usize,
) -> candle_core::Result<(FcEncoder, FcDecoder, candle_nn::VarMap)> {
    let dev = Device::Cpu;
    let varmap = candle_nn::VarMap::new();
    let vs = candle_nn::VarBuilder::from_varmap(&varmap, DType::F32, &dev);

    let encoder = FcEncoder::new(
        FcEncoderArgs {
            data_dim,
            latent_dim,
            width: 16,
            depth: 1,
            posterior,
            sftbeta: 4.5,
        },
        vs.clone(),
    )?;

    let decoder = FcDecoder::new(encoder.dim_latent(), data_dim, 16, 1, vs)?;
    Ok((encoder, decoder, varmap))
}

/// noisy line through a 4-dimensional space with angle labels
fn toy_dataset(nn: usize, seed: u64) -> (DMatrix<f32>, DMatrix<f32>) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut data = DMatrix::<f32>::zeros(nn, 4);
    let mut labels = DMatrix::<f32>::zeros(nn, 1);

    for i in 0..nn {
        let theta = std::f32::consts::TAU * (i as f32) / (nn as f32);
        let noise: f32 = rng.sample(StandardNormal);
        data[(i, 0)] = theta.cos();
        data[(i, 1)] = theta.sin();
        data[(i, 2)] = 0.5 * theta.cos() + 0.01 * noise;
        data[(i, 3)] = -theta.sin();
        labels[(i, 0)] = theta;
    }

    (data, labels)
}

#[test]
fn encoder_shapes_per_family_test() -> candle_core::Result<()> {
    let dev = Device::Cpu;
    let x = candle_core::Tensor::randn(0f32, 1f32, (10, 6), &dev)?;

    let (enc, dec, _) = new_model(PosteriorKind::Gaussian, 6, 2)?;
    let (z, kl) = enc.forward_t(&x, true)?;
    assert_eq!(z.dims(), &[10, 2]);
    assert_eq!(kl.dims(), &[10]);
    assert_eq!(dec.forward(&z)?.dims(), &[10, 6]);

    let (enc, dec, _) = new_model(PosteriorKind::Hyperspherical, 6, 3)?;
    let (z, kl) = enc.forward_t(&x, true)?;
    assert_eq!(z.dims(), &[10, 3]);
    assert_eq!(kl.dims(), &[10]);
    assert_eq!(dec.forward(&z)?.dims(), &[10, 6]);

    // unit-norm latents
    let norms = z.sqr()?.sum(1)?.sqrt()?.to_vec1::<f32>()?;
    for n in norms {
        assert!((n - 1.0).abs() < 1e-4);
    }

    let (enc, dec, _) = new_model(PosteriorKind::Toroidal, 6, 2)?;
    assert_eq!(enc.dim_latent(), 4);
    let (z, _) = enc.forward_t(&x, true)?;
    assert_eq!(z.dims(), &[10, 4]);
    assert_eq!(dec.forward(&z)?.dims(), &[10, 6]);
    Ok(())
}

#[test]
fn hyperspherical_rejects_bad_latent_dim_test() {
    assert!(new_model(PosteriorKind::Hyperspherical, 6, 5).is_err());
}

#[test]
fn eval_mode_is_deterministic_test() -> candle_core::Result<()> {
    let dev = Device::Cpu;
    let x = candle_core::Tensor::randn(0f32, 1f32, (7, 6), &dev)?;

    for posterior in [
        PosteriorKind::Gaussian,
        PosteriorKind::Hyperspherical,
        PosteriorKind::Toroidal,
    ] {
        let (enc, _, _) = new_model(posterior, 6, 2)?;
        let (z1, _) = enc.forward_t(&x, false)?;
        let (z2, _) = enc.forward_t(&x, false)?;

        let a = z1.flatten_all()?.to_vec1::<f32>()?;
        let b = z2.flatten_all()?.to_vec1::<f32>()?;
        assert_eq!(a, b);
    }
    Ok(())
}

#[test]
fn data_loader_round_trip_test() -> anyhow::Result<()> {
    let (data, labels) = toy_dataset(37, 42);
    let mut loader = InMemoryData::new_with_labels(&data, &labels)?;

    loader.shuffle_minibatch(10)?;
    assert_eq!(loader.num_minibatch(), 4);
    assert_eq!(loader.num_samples(), 37);

    let dev = Device::Cpu;
    let mb = loader.minibatch_shuffled(0, &dev)?;
    assert_eq!(mb.input.dims(), &[10, 4]);
    assert_eq!(mb.labels.as_ref().map(|l| l.dims().to_vec()), Some(vec![10, 1]));

    // ordered access preserves the original row order
    let mb = loader.minibatch_ordered(0, &dev)?;
    let first = mb.input.narrow(0, 0, 1)?.flatten_all()?.to_vec1::<f32>()?;
    for (j, v) in first.iter().enumerate() {
        assert!((v - data[(0, j)]).abs() < 1e-6);
    }
    Ok(())
}

#[test]
fn training_decreases_loss_test() -> anyhow::Result<()> {
    let (data, labels) = toy_dataset(64, 7);
    let mut loader = InMemoryData::new_with_labels(&data, &labels)?;

    let (encoder, decoder, varmap) = new_model(PosteriorKind::Gaussian, 4, 2)?;
    let mut vae = Vae::build(&encoder, &decoder, &varmap);

    let config = VaeTrainConfig {
        learning_rate: 1e-2,
        batch_size: 16,
        num_epochs: 40,
        beta: 0.1,
        gamma: 0.0,
        plateau_scheduler: false,
        device: Device::Cpu,
        verbose: false,
        show_progress: false,
    };

    let trace = vae.train_encoder_decoder(&mut loader, &gaussian_likelihood, &config)?;

    assert_eq!(trace.total.len(), 40);
    let first = trace.total[0];
    let last = *trace.total.last().ok_or(anyhow::anyhow!("empty trace"))?;
    assert!(
        last < first,
        "loss did not decrease: first {} last {}",
        first,
        last
    );
    Ok(())
}

#[test]
fn latent_evaluation_shapes_test() -> anyhow::Result<()> {
    let (data, _) = toy_dataset(25, 3);
    let (encoder, _, _) = new_model(PosteriorKind::Hyperspherical, 4, 2)?;

    let z = evaluate_latent_by_encoder(&encoder, &data, 8, &Device::Cpu)?;
    assert_eq!(z.shape(), (25, 2));
    Ok(())
}
