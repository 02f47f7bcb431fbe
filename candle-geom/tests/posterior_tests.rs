use approx::assert_abs_diff_eq;
use candle_core::{Device, Tensor};
use candle_geom::candle_loss_functions::*;
use candle_geom::candle_posterior::*;
use candle_geom::candle_special_fn::*;

fn scalar_eval(f: impl Fn(&Tensor) -> candle_core::Result<Tensor>, x: f32) -> f32 {
    let dev = Device::Cpu;
    let t = Tensor::from_vec(vec![x], (1, 1), &dev).unwrap();
    f(&t).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap()[0]
}

#[test]
fn bessel_reference_values_test() {
    // Abramowitz & Stegun tables
    assert_abs_diff_eq!(scalar_eval(bessel_i0, 1.0), 1.2660658, epsilon = 1e-3);
    assert_abs_diff_eq!(scalar_eval(bessel_i0, 5.0), 27.239871, epsilon = 3e-2);
    assert_abs_diff_eq!(scalar_eval(bessel_i1, 1.0), 0.5651591, epsilon = 1e-3);
    assert_abs_diff_eq!(
        scalar_eval(bessel_i1_i0_ratio, 2.0),
        0.6977746,
        epsilon = 1e-3
    );
    assert_abs_diff_eq!(scalar_eval(log_bessel_i0, 10.0), 2815.7166_f32.ln(), epsilon = 1e-2);
}

#[test]
fn log_sinh_stable_test() {
    assert_abs_diff_eq!(scalar_eval(log_sinh, 1.0), 1.1752012_f32.ln(), epsilon = 1e-4);
    // naive sinh overflows f32 around x = 90; the stable form must not
    let big = scalar_eval(log_sinh, 200.0);
    assert_abs_diff_eq!(big, 200.0 - std::f32::consts::LN_2, epsilon = 1e-3);
}

#[test]
fn gaussian_kl_zero_at_prior_test() -> candle_core::Result<()> {
    let dev = Device::Cpu;
    let mean = Tensor::zeros((4, 3), candle_core::DType::F32, &dev)?;
    let lnvar = Tensor::zeros((4, 3), candle_core::DType::F32, &dev)?;

    let kl = gaussian_kl_loss(&mean, &lnvar)?.to_vec1::<f32>()?;
    for v in kl {
        assert_abs_diff_eq!(v, 0.0, epsilon = 1e-6);
    }
    Ok(())
}

#[test]
fn von_mises_kl_reference_test() {
    // kappa * I1/I0 - log I0 at kappa = 2
    let kl = scalar_eval(von_mises_kl_loss, 2.0);
    assert_abs_diff_eq!(kl, 0.5715, epsilon = 5e-3);
    // vanishes with the concentration
    assert_abs_diff_eq!(scalar_eval(von_mises_kl_loss, 0.0), 0.0, epsilon = 1e-4);
}

#[test]
fn hyperspherical_kl_s2_reference_test() {
    // kappa coth(kappa) - 1 + log kappa - log sinh(kappa) at kappa = 1
    let dev = Device::Cpu;
    let kappa = Tensor::from_vec(vec![1f32], (1, 1), &dev).unwrap();
    let kl = hyperspherical_kl_loss(&kappa, 3)
        .unwrap()
        .to_vec1::<f32>()
        .unwrap()[0];
    assert_abs_diff_eq!(kl, 0.15154, epsilon = 1e-3);
}

#[test]
fn hyperspherical_kl_rejects_high_dim_test() {
    let dev = Device::Cpu;
    let kappa = Tensor::from_vec(vec![1f32], (1, 1), &dev).unwrap();
    assert!(hyperspherical_kl_loss(&kappa, 5).is_err());
}

#[test]
fn vmf_samples_unit_norm_test() -> candle_core::Result<()> {
    let dev = Device::Cpu;
    let nn = 64;

    let mu = Tensor::from_vec(vec![0.0f32, 0.0, 1.0], (1, 3), &dev)?
        .broadcast_as((nn, 3))?
        .contiguous()?;
    let kappa = Tensor::from_vec(vec![50f32; nn], (nn, 1), &dev)?;

    let z = vmf_reparameterize(&mu, &kappa, true)?;
    assert_eq!(z.dims(), &[nn, 3]);

    let norms = z.sqr()?.sum(1)?.sqrt()?.to_vec1::<f32>()?;
    for norm in norms {
        assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-4);
    }

    // concentrated near the mean direction
    let mean_dot = z.mul(&mu)?.sum(1)?.mean_all()?.to_scalar::<f32>()?;
    assert!(mean_dot > 0.9, "mean resultant {}", mean_dot);
    Ok(())
}

#[test]
fn vmf_eval_mode_returns_mode_test() -> candle_core::Result<()> {
    let dev = Device::Cpu;
    let mu = Tensor::from_vec(vec![3.0f32, 4.0], (1, 2), &dev)?;
    let kappa = Tensor::from_vec(vec![10f32], (1, 1), &dev)?;

    let z = vmf_reparameterize(&mu, &kappa, false)?.to_vec2::<f32>()?;
    assert_abs_diff_eq!(z[0][0], 0.6, epsilon = 1e-5);
    assert_abs_diff_eq!(z[0][1], 0.8, epsilon = 1e-5);
    Ok(())
}

#[test]
fn toroidal_samples_unit_circles_test() -> candle_core::Result<()> {
    let dev = Device::Cpu;
    let nn = 16;

    let mu = Tensor::randn(0f32, 1f32, (nn, 4), &dev)?;
    let mu = candle_geom::candle_aux_layers::unit_normalize(&mu.reshape((nn * 2, 2))?)?
        .reshape((nn, 4))?;
    let kappa = Tensor::from_vec(vec![20f32; nn * 2], (nn, 2), &dev)?;

    let z = toroidal_reparameterize(&mu, &kappa, true)?;
    assert_eq!(z.dims(), &[nn, 4]);

    let z_rows = z.to_vec2::<f32>()?;
    for row in z_rows {
        let n1 = (row[0] * row[0] + row[1] * row[1]).sqrt();
        let n2 = (row[2] * row[2] + row[3] * row[3]).sqrt();
        assert_abs_diff_eq!(n1, 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(n2, 1.0, epsilon = 1e-4);
    }
    Ok(())
}

#[test]
fn circular_alignment_zero_when_matched_test() -> candle_core::Result<()> {
    let dev = Device::Cpu;
    let angles = vec![0.3f32, 1.2, 4.5];
    let z: Vec<f32> = angles.iter().flat_map(|a| [a.cos(), a.sin()]).collect();

    let z_nk = Tensor::from_vec(z, (3, 2), &dev)?;
    let angle_n1 = Tensor::from_vec(angles, (3, 1), &dev)?;

    let loss = circular_alignment_loss(&z_nk, &angle_n1)?.to_vec1::<f32>()?;
    for v in loss {
        assert_abs_diff_eq!(v, 0.0, epsilon = 1e-5);
    }
    Ok(())
}
