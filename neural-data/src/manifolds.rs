//! Noisy immersions of S1, S2 and T2 with known generative angles,
//! optionally distorted, isometrically embedded into a higher
//! dimensional space and corrupted by Gaussian noise.

use crate::labels::LabelTable;
use crate::Mat;

use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::StandardNormal;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Distortion {
    Flat,
    /// a single Gaussian bump of the radius at `theta = pi`
    Bump,
    /// `n_wiggles` cosine wiggles of the radius
    Wiggles,
}

/// width (radians) of the `Bump` radial distortion
pub const BUMP_WIDTH: f32 = 0.5;

#[derive(Clone, Debug)]
pub struct SyntheticManifoldConfig {
    /// number of observations; S2/T2 use the largest square below it
    pub n_times: usize,
    pub embedding_dim: usize,
    pub radius: f32,
    pub major_radius: f32,
    pub minor_radius: f32,
    pub distortion_amp: f32,
    pub n_wiggles: usize,
    pub distortion: Distortion,
    /// embed with a random orthogonal rotation instead of the identity
    pub random_rotation: bool,
    pub noise_var: f32,
    pub seed: u64,
}

impl Default for SyntheticManifoldConfig {
    fn default() -> Self {
        Self {
            n_times: 1000,
            embedding_dim: 5,
            radius: 1.0,
            major_radius: 2.0,
            minor_radius: 1.0,
            distortion_amp: 0.4,
            n_wiggles: 3,
            distortion: Distortion::Bump,
            random_rotation: false,
            noise_var: 1e-3,
            seed: 0,
        }
    }
}

/// Distorted radial profile of the synthetic circle
pub fn s1_radial(theta: f32, config: &SyntheticManifoldConfig) -> f32 {
    let shape = match config.distortion {
        Distortion::Flat => 0.0,
        Distortion::Bump => {
            let d = theta - std::f32::consts::PI;
            (-d * d / (2.0 * BUMP_WIDTH * BUMP_WIDTH)).exp()
        }
        Distortion::Wiggles => (config.n_wiggles as f32 * theta).cos(),
    };
    config.radius * (1.0 + config.distortion_amp * shape)
}

/// Immersion of the (distorted) circle into the plane
pub fn s1_point(theta: f32, config: &SyntheticManifoldConfig) -> [f32; 2] {
    let r = s1_radial(theta, config);
    [r * theta.cos(), r * theta.sin()]
}

/// Round sphere; `theta` polar in `(0, pi)`, `phi` azimuth
pub fn s2_point(theta: f32, phi: f32, radius: f32) -> [f32; 3] {
    [
        radius * theta.sin() * phi.cos(),
        radius * theta.sin() * phi.sin(),
        radius * theta.cos(),
    ]
}

/// Torus of revolution; `theta` minor angle, `phi` major angle
pub fn t2_point(theta: f32, phi: f32, config: &SyntheticManifoldConfig) -> [f32; 3] {
    let rr = config.major_radius + config.minor_radius * theta.cos();
    [
        rr * phi.cos(),
        rr * phi.sin(),
        config.minor_radius * theta.sin(),
    ]
}

pub fn s1_synthetic(config: &SyntheticManifoldConfig) -> anyhow::Result<(Mat, LabelTable)> {
    let nn = config.n_times;
    let mut coords = Mat::zeros(nn, 2);
    let mut angles = Vec::with_capacity(nn);

    for i in 0..nn {
        let theta = std::f32::consts::TAU * i as f32 / nn as f32;
        let p = s1_point(theta, config);
        coords[(i, 0)] = p[0];
        coords[(i, 1)] = p[1];
        angles.push(theta);
    }

    let data = embed(&coords, config)?;
    let labels = LabelTable::new().with_column("angle", angles);
    Ok((data, labels))
}

pub fn s2_synthetic(config: &SyntheticManifoldConfig) -> anyhow::Result<(Mat, LabelTable)> {
    let side = integer_side(config.n_times)?;
    let nn = side * side;

    let mut coords = Mat::zeros(nn, 3);
    let mut azimuths = Vec::with_capacity(nn);
    let mut polars = Vec::with_capacity(nn);

    let mut row = 0;
    for j in 0..side {
        let theta = std::f32::consts::PI * (j as f32 + 0.5) / side as f32;
        for i in 0..side {
            let phi = std::f32::consts::TAU * i as f32 / side as f32;
            let p = s2_point(theta, phi, config.radius);
            for d in 0..3 {
                coords[(row, d)] = p[d];
            }
            azimuths.push(phi);
            polars.push(theta);
            row += 1;
        }
    }

    let data = embed(&coords, config)?;
    let labels = LabelTable::new()
        .with_column("angle", azimuths)
        .with_column("angle2", polars);
    Ok((data, labels))
}

pub fn t2_synthetic(config: &SyntheticManifoldConfig) -> anyhow::Result<(Mat, LabelTable)> {
    let side = integer_side(config.n_times)?;
    let nn = side * side;

    let mut coords = Mat::zeros(nn, 3);
    let mut majors = Vec::with_capacity(nn);
    let mut minors = Vec::with_capacity(nn);

    let mut row = 0;
    for j in 0..side {
        let theta = std::f32::consts::TAU * j as f32 / side as f32;
        for i in 0..side {
            let phi = std::f32::consts::TAU * i as f32 / side as f32;
            let p = t2_point(theta, phi, config);
            for d in 0..3 {
                coords[(row, d)] = p[d];
            }
            majors.push(phi);
            minors.push(theta);
            row += 1;
        }
    }

    let data = embed(&coords, config)?;
    let labels = LabelTable::new()
        .with_column("angle", majors)
        .with_column("angle2", minors);
    Ok((data, labels))
}

fn integer_side(n_times: usize) -> anyhow::Result<usize> {
    let side = (n_times as f64).sqrt().floor() as usize;
    if side < 2 {
        return Err(anyhow::anyhow!("n_times = {} is too small", n_times));
    }
    Ok(side)
}

///
/// Zero-pad the intrinsic coordinates to `embedding_dim`, optionally
/// rotate by a random orthogonal matrix (QR of a seeded Gaussian), and
/// add `N(0, noise_var)` observation noise.
///
fn embed(coords: &Mat, config: &SyntheticManifoldConfig) -> anyhow::Result<Mat> {
    let (nn, mm) = coords.shape();
    let dd = config.embedding_dim;

    if dd < mm {
        return Err(anyhow::anyhow!(
            "embedding dim {} below the manifold's ambient dim {}",
            dd,
            mm
        ));
    }

    let mut padded = Mat::zeros(nn, dd);
    padded.view_mut((0, 0), (nn, mm)).copy_from(coords);

    let mut rng = SmallRng::seed_from_u64(config.seed);

    let mut data = if config.random_rotation {
        let gauss = Mat::from_fn(dd, dd, |_, _| rng.sample(StandardNormal));
        let q = gauss.qr().q();
        padded * q.transpose()
    } else {
        padded
    };

    if config.noise_var > 0.0 {
        let sd = config.noise_var.sqrt();
        for x in data.iter_mut() {
            let eps: f32 = rng.sample(StandardNormal);
            *x += sd * eps;
        }
    }

    Ok(data)
}
