//! Synthetic image datasets: a fixed base scene acted on by SO(2)
//! (rotation) and a positive scale group (Gaussian blur), with additive
//! pixel noise. Labels record the acting angle and blur scale.

use crate::labels::LabelTable;
use crate::Mat;

use log::info;
use matrix_util::image_ops::{gaussian_blur, rotate_bilinear};
use ndarray::Array2;
use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::Normal;
use rayon::prelude::*;

#[derive(Clone, Debug)]
pub struct ImageConfig {
    /// number of blur scales per angle
    pub n_scalars: usize,
    /// number of rotation angles
    pub n_angles: usize,
    pub img_size: usize,
    pub noise_sd: f32,
    pub seed: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            n_scalars: 4,
            n_angles: 2000,
            img_size: 128,
            noise_sd: 0.05,
            seed: 0,
        }
    }
}

/// Deterministic, rotation-identifiable base scene: three off-centre
/// anisotropic bumps on a shallow gradient, in `[0, 1]`.
pub fn base_image(img_size: usize) -> Array2<f32> {
    let s = img_size as f32;
    let bumps: [(f32, f32, f32, f32); 3] = [
        (0.30, 0.40, 0.08, 1.0),
        (0.62, 0.30, 0.12, 0.7),
        (0.45, 0.70, 0.05, 0.9),
    ];

    let mut img = Array2::from_shape_fn((img_size, img_size), |(r, c)| {
        0.1 * (r as f32 + c as f32) / (2.0 * s)
    });

    for (r0, c0, width, amp) in bumps {
        for r in 0..img_size {
            for c in 0..img_size {
                let dr = r as f32 / s - r0;
                let dc = c as f32 / s - c0;
                img[[r, c]] += amp * (-(dr * dr + dc * dc) / (2.0 * width * width)).exp();
            }
        }
    }

    let max = img.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    img.mapv(|v| v / max)
}

fn generate_images(config: &ImageConfig) -> Vec<(Array2<f32>, f32, f32)> {
    let image = base_image(config.img_size);

    (0..config.n_angles)
        .into_par_iter()
        .flat_map(|i_angle| {
            let angle = 360.0 * i_angle as f32 / config.n_angles as f32;
            let rotated = rotate_bilinear(&image, angle);

            let mut rng = SmallRng::seed_from_u64(config.seed.wrapping_add(i_angle as u64));
            let noise = Normal::new(0.0, config.noise_sd.max(0.0) as f64)
                .expect("noise sd must be non-negative");

            (0..config.n_scalars)
                .map(|i_scalar| {
                    let scalar = 1.0 + 0.2 * i_scalar as f32;
                    let mut blurred = gaussian_blur(&rotated, scalar);
                    blurred.mapv_inplace(|v| v + rng.sample(noise) as f32);
                    (blurred, angle, scalar)
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

///
/// A dataset of flattened images with different orientations and blurs.
///
/// Returns `(data, labels)` where data is
/// `[n_angles * n_scalars, img_size^2]` and the labels carry `angle`
/// (degrees) and `scalar` columns.
///
pub fn load_images(config: &ImageConfig) -> anyhow::Result<(Mat, LabelTable)> {
    info!("Generating dataset of synthetic images");
    let images = generate_images(config);

    let dd = config.img_size * config.img_size;
    let mut data = Mat::zeros(images.len(), dd);
    let mut angles = Vec::with_capacity(images.len());
    let mut scalars = Vec::with_capacity(images.len());

    for (i, (img, angle, scalar)) in images.iter().enumerate() {
        for (j, &v) in img.iter().enumerate() {
            data[(i, j)] = v;
        }
        angles.push(*angle);
        scalars.push(*scalar);
    }

    let labels = LabelTable::new()
        .with_column("angle", angles)
        .with_column("scalar", scalars);

    Ok((data, labels))
}

///
/// 1D projections of the image dataset: each image is summed along its
/// rows, giving `[n_angles * n_scalars, img_size]`.
///
pub fn load_projections(config: &ImageConfig) -> anyhow::Result<(Mat, LabelTable)> {
    info!("Generating dataset of synthetic 1d projections");
    let images = generate_images(config);

    let mut data = Mat::zeros(images.len(), config.img_size);
    let mut angles = Vec::with_capacity(images.len());
    let mut scalars = Vec::with_capacity(images.len());

    for (i, (img, angle, scalar)) in images.iter().enumerate() {
        for r in 0..config.img_size {
            data[(i, r)] = img.row(r).sum();
        }
        angles.push(*angle);
        scalars.push(*scalar);
    }

    let labels = LabelTable::new()
        .with_column("angle", angles)
        .with_column("scalar", scalars);

    Ok((data, labels))
}
