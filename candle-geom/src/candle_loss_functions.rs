use crate::candle_aux_layers::unit_normalize;
use crate::candle_special_fn::*;

use candle_core::{Result, Tensor};

/// KL divergence loss between two Gaussian distributions
///
/// -0.5 * (1 + log(sigma^2) - mu^2 - sigma^2)
///
/// * `z_mean` - mean of Gaussian distribution
/// * `z_lnvar` - log variance of Gaussian distribution
///
pub fn gaussian_kl_loss(z_mean: &Tensor, z_lnvar: &Tensor) -> Result<Tensor> {
    let z_var = z_lnvar.exp()?;
    (z_var - 1. + z_mean.powf(2.)? - z_lnvar)?.sum(z_mean.rank() - 1)? * 0.5
}

/// KL divergence of a von Mises posterior against the uniform
/// distribution on the circle, per concentration
///
/// kappa * I1(kappa)/I0(kappa) - log I0(kappa)
///
/// * `kappa_nk` - one concentration per circle (n x k)
///
/// Returns the sum over circles (n)
pub fn von_mises_kl_loss(kappa_nk: &Tensor) -> Result<Tensor> {
    let ratio = bessel_i1_i0_ratio(kappa_nk)?;
    kappa_nk
        .mul(&ratio)?
        .sub(&log_bessel_i0(kappa_nk)?)?
        .sum(kappa_nk.rank() - 1)
}

/// KL divergence of a von Mises-Fisher posterior against the uniform
/// distribution on `S^{k-1}`; closed forms for the circle (k = 2) and
/// the 2-sphere (k = 3), the only latent spaces the experiments use
///
/// * `kappa_n1` - concentrations (n x 1)
/// * `ambient_dim` - k, the ambient latent dimension
pub fn hyperspherical_kl_loss(kappa_n1: &Tensor, ambient_dim: usize) -> Result<Tensor> {
    match ambient_dim {
        2 => von_mises_kl_loss(kappa_n1),
        3 => {
            // E_q[kappa cos] = kappa (coth(kappa) - 1/kappa);
            // log C(kappa) = log kappa - log(4 pi) - log sinh(kappa);
            // KL = E_q[kappa cos] + log C(kappa) + log |S^2|
            let expected_dot = (kappa_n1.mul(&coth(kappa_n1)?)? - 1.0)?;
            let log_norm = (kappa_n1.clamp(1e-8, f64::INFINITY)?.log()?
                - log_sphere_surface(3))?
            .sub(&log_sinh(kappa_n1)?)?;
            let kl = (expected_dot.add(&log_norm)? + log_sphere_surface(3))?;
            kl.sum(kappa_n1.rank() - 1)
        }
        _ => candle_core::bail!(
            "hyperspherical posterior supports ambient dim 2 or 3, got {}",
            ambient_dim
        ),
    }
}

/// Gaussian log-likelihood of the reconstruction
///
/// llik(i) = -0.5 * sum_d [ x(i,d) - xhat(i,d) ]^2
///
/// * `x_nd` - data tensor (observed data)
/// * `hat_nd` - reconstruction tensor
///
pub fn gaussian_likelihood(x_nd: &Tensor, hat_nd: &Tensor) -> Result<Tensor> {
    x_nd.sub(hat_nd)?.powf(2.)?.sum(x_nd.rank() - 1)? * (-0.5)
}

/// Poisson log-likelihood of count data
///
/// llik(i) = sum_d x(i,d) * log(rate(i,d)) - rate(i,d)
///
/// * `x_nd` - data tensor (observed counts)
/// * `rate_nd` - positive rate tensor
///
pub fn poisson_likelihood(x_nd: &Tensor, rate_nd: &Tensor) -> Result<Tensor> {
    let rate_nd = rate_nd.clamp(1e-8, f64::INFINITY)?;
    x_nd.clamp(0.0, f64::INFINITY)?
        .mul(&rate_nd.log()?)?
        .sub(&rate_nd)?
        .sum(x_nd.rank() - 1)
}

/// Poisson log-likelihood with an unconstrained reconstruction head;
/// the rate is `softplus(hat)`
pub fn poisson_likelihood_logits(x_nd: &Tensor, hat_nd: &Tensor) -> Result<Tensor> {
    poisson_likelihood(x_nd, &softplus_beta(hat_nd, 1.0)?)
}

/// Latent-geometry alignment of the first latent circle with a labelled
/// generative angle; avoids atan2 by comparing unit vectors
///
/// loss(i) = 1 - cos(theta_z(i) - theta_label(i))
///
/// * `z_nk` - latent representation; only `z[, 0:2]` is read
/// * `angle_n1` - labelled angles in radians (n x 1)
///
pub fn circular_alignment_loss(z_nk: &Tensor, angle_n1: &Tensor) -> Result<Tensor> {
    let z_n2 = unit_normalize(&z_nk.narrow(1, 0, 2)?)?;
    let target_n2 = Tensor::cat(&[&angle_n1.cos()?, &angle_n1.sin()?], 1)?;

    (z_n2.mul(&target_n2)?.sum(1)?.neg()? + 1.0)
}
