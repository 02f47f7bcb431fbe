//! Posterior family dispatch: reparameterized sampling for Gaussian,
//! hyperspherical (von Mises-Fisher) and toroidal (product of circular
//! von Mises) approximate posteriors.

use crate::candle_aux_layers::unit_normalize;

use candle_core::{Result, Tensor};
use rand::prelude::*;
use rand_distr::Beta;

/// Approximate posterior families supported by the fully-connected VAE.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PosteriorKind {
    Gaussian,
    Hyperspherical,
    Toroidal,
}

impl std::fmt::Display for PosteriorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PosteriorKind::Gaussian => write!(f, "gaussian"),
            PosteriorKind::Hyperspherical => write!(f, "hyperspherical"),
            PosteriorKind::Toroidal => write!(f, "toroidal"),
        }
    }
}

/// `z = mu + exp(lnvar / 2) * eps` where `eps ~ N(0, 1)`
pub fn gaussian_reparameterize(
    z_mean_nk: &Tensor,
    z_lnvar_nk: &Tensor,
    train: bool,
) -> Result<Tensor> {
    if train {
        let eps = Tensor::randn_like(z_mean_nk, 0., 1.)?;
        z_mean_nk + (z_lnvar_nk * 0.5)?.exp()? * eps
    } else {
        Ok(z_mean_nk.clone())
    }
}

/// Reparameterized von Mises-Fisher sample on the unit sphere `S^{k-1}`.
///
/// Wood's rejection sampler draws the marginal along the mean direction;
/// the acceptance loop runs on detached host values while the accepted
/// Beta draw is folded back through `kappa` on the graph, so gradients
/// reach the concentration. A Householder reflection carries the
/// north-pole frame onto `mu`.
///
/// * `mu_nk` - mean directions, normalized internally (n x k)
/// * `kappa_n1` - concentrations (n x 1)
pub fn vmf_reparameterize(mu_nk: &Tensor, kappa_n1: &Tensor, train: bool) -> Result<Tensor> {
    let mu_nk = unit_normalize(mu_nk)?;

    if !train {
        return Ok(mu_nk);
    }

    let (nn, kk) = mu_nk.dims2()?;
    if kk < 2 {
        candle_core::bail!("hyperspherical latent needs at least 2 ambient dimensions");
    }

    let dev = mu_nk.device();
    let dim = (kk - 1) as f64;

    // detached acceptance draws, one per row
    let kappa_host: Vec<f32> = kappa_n1.detach().flatten_all()?.to_vec1::<f32>()?;
    let mut rng = rand::rng();
    let eps_host: Vec<f32> = kappa_host
        .iter()
        .map(|&kappa| sample_wood_eps(kappa as f64, dim, &mut rng))
        .collect::<Result<_>>()?;

    let eps_n1 = Tensor::from_vec(eps_host, (nn, 1), dev)?;

    // w recomputed on the graph: b depends on kappa
    let srt = ((kappa_n1.sqr()? * 4.0)? + dim * dim)?.sqrt()?;
    let b_n1 = ((srt + (kappa_n1 * 2.0)?)?.recip()? * dim)?;
    let w_n1 = ((b_n1.affine(1.0, 1.0)?.mul(&eps_n1)?.neg()? + 1.0)?
        .div(&(b_n1.affine(-1.0, 1.0)?.mul(&eps_n1)?.neg()? + 1.0)?)?)
    .clamp(-1.0 + 1e-6, 1.0 - 1e-6)?;

    // tangent direction, uniform on S^{k-2}
    let v_nk1 = unit_normalize(&Tensor::randn(0f32, 1f32, (nn, kk - 1), dev)?)?.detach();

    let rest = v_nk1.broadcast_mul(&(w_n1.sqr()?.neg()? + 1.0)?.clamp(0.0, 1.0)?.sqrt()?)?;
    let z_north = Tensor::cat(&[&w_n1, &rest], 1)?;

    householder_rotate(&z_north, &mu_nk)
}

/// Reparameterized sample on a product of circles; `mu_n2k` holds one
/// unit 2-vector per circle and `kappa_nk` one concentration per circle.
pub fn toroidal_reparameterize(
    mu_n2k: &Tensor,
    kappa_nk: &Tensor,
    train: bool,
) -> Result<Tensor> {
    let (_, two_k) = mu_n2k.dims2()?;
    if two_k % 2 != 0 {
        candle_core::bail!("toroidal location must stack unit 2-vectors");
    }
    let n_circles = two_k / 2;

    let mut circles = Vec::with_capacity(n_circles);
    for j in 0..n_circles {
        let mu_j = mu_n2k.narrow(1, 2 * j, 2)?;
        let kappa_j = kappa_nk.narrow(1, j, 1)?;
        circles.push(vmf_reparameterize(&mu_j, &kappa_j, train)?);
    }

    Tensor::cat(&circles, 1)
}

/// Reflect the north-pole frame so that `e1` lands on `mu`;
/// `z' = z - 2 <z, u> u` with `u = (e1 - mu) / |e1 - mu|`
fn householder_rotate(z_nk: &Tensor, mu_nk: &Tensor) -> Result<Tensor> {
    let (_, kk) = mu_nk.dims2()?;
    let dev = mu_nk.device();

    let mut e1 = vec![0f32; kk];
    e1[0] = 1.0;
    let e1 = Tensor::from_vec(e1, (1, kk), dev)?;

    let u_nk = e1.broadcast_sub(mu_nk)?;
    let norm = u_nk
        .sqr()?
        .sum_keepdim(1)?
        .sqrt()?
        .clamp(1e-8, f64::INFINITY)?;
    let u_nk = u_nk.broadcast_div(&norm)?;

    let proj_n1 = z_nk.mul(&u_nk)?.sum_keepdim(1)?;
    z_nk.sub(&(u_nk.broadcast_mul(&proj_n1)? * 2.0)?)
}

/// One accepted draw of Wood's envelope; returns the Beta variate so
/// the caller can reconstruct `w` differentiably.
fn sample_wood_eps(kappa: f64, dim: f64, rng: &mut impl Rng) -> Result<f32> {
    let kappa = kappa.max(1e-6);
    let b = dim / ((4.0 * kappa * kappa + dim * dim).sqrt() + 2.0 * kappa);
    let x0 = (1.0 - b) / (1.0 + b);
    let c = kappa * x0 + dim * (1.0 - x0 * x0).ln();

    let beta = Beta::new(dim / 2.0, dim / 2.0)
        .map_err(|e| candle_core::Error::Msg(format!("beta envelope: {}", e)))?;

    // acceptance is fast (>= 66% for any kappa); the cap is a guard
    for _ in 0..256 {
        let eps: f64 = beta.sample(rng);
        let w = (1.0 - (1.0 + b) * eps) / (1.0 - (1.0 - b) * eps);
        let u: f64 = rng.random::<f64>().max(1e-12);

        if kappa * w + dim * (1.0 - x0 * w).ln() - c >= u.ln() {
            return Ok(eps as f32);
        }
    }

    // mode of the envelope
    Ok((1.0 / (1.0 + b)) as f32)
}
