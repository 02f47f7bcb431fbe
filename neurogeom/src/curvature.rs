//! Learned vs. true mean curvature of the fitted manifold.
//!
//! The true profile differentiates the generative immersion; the
//! learned profile pushes a latent grid through the trained decoder and
//! differentiates the decoded immersion by central finite differences.
//! Both use the same discrete-geometry routines so the comparison is
//! apples to apples.

use crate::geom_common::*;
use crate::run_log::MetricTrace;

use candle_geom::candle_model_traits::DecoderModuleT;
use matrix_util::traits::ConvertMatOps;
use neural_data::manifolds::{s1_point, s2_point, t2_point, SyntheticManifoldConfig};

pub struct CurvatureInputs<'a, Dec>
where
    Dec: DecoderModuleT,
{
    pub dataset: DatasetKind,
    pub decoder: &'a Dec,
    pub manifold: SyntheticManifoldConfig,
    /// point count on S1, grid side on S2/T2
    pub n_grid: usize,
    pub device: candle_core::Device,
    pub out: String,
}

///
/// Compute both curvature profiles, write them next to the other
/// outputs, and log the normalized curvature error.
///
pub fn evaluate_curvature<Dec>(inputs: &CurvatureInputs<'_, Dec>) -> anyhow::Result<Option<f32>>
where
    Dec: DecoderModuleT,
{
    let (angles, angles2, curv_true, curv_learned) = match inputs.dataset {
        DatasetKind::S1Synthetic => {
            if inputs.decoder.dim_latent() != 2 {
                info!(
                    "latent dim {} does not parameterize a circle; skipping curvature",
                    inputs.decoder.dim_latent()
                );
                return Ok(None);
            }
            curvature_s1(inputs)?
        }
        DatasetKind::S2Synthetic => {
            if inputs.decoder.dim_latent() != 3 {
                info!(
                    "latent dim {} does not parameterize a sphere; skipping curvature",
                    inputs.decoder.dim_latent()
                );
                return Ok(None);
            }
            curvature_s2(inputs)?
        }
        DatasetKind::T2Synthetic => {
            if inputs.decoder.dim_latent() != 4 {
                info!(
                    "latent dim {} does not parameterize a torus; skipping curvature",
                    inputs.decoder.dim_latent()
                );
                return Ok(None);
            }
            curvature_t2(inputs)?
        }
        _ => return Ok(None),
    };

    let error = curvature_error(&curv_learned, &curv_true);

    let mut true_trace = MetricTrace::new("idx").push_column("angle", &angles);
    let mut learned_trace = MetricTrace::new("idx").push_column("angle", &angles);
    if let Some(angles2) = &angles2 {
        true_trace = true_trace.push_column("angle2", angles2);
        learned_trace = learned_trace.push_column("angle2", angles2);
    }

    true_trace
        .push_column("mean_curvature", &curv_true)
        .to_parquet(&format!("{}.curvature_true.parquet", inputs.out))?;
    learned_trace
        .push_column("mean_curvature", &curv_learned)
        .to_parquet(&format!("{}.curvature_learned.parquet", inputs.out))?;

    info!("curvature error: {:.4}", error);
    Ok(Some(error))
}

/// `|H_learned - H_true|_2 / |H_true|_2` over the shared latent grid
pub fn curvature_error(learned: &[f32], truth: &[f32]) -> f32 {
    let num: f32 = learned
        .iter()
        .zip(truth.iter())
        .map(|(l, t)| (l - t) * (l - t))
        .sum();
    let denom: f32 = truth.iter().map(|t| t * t).sum();

    if denom > 0.0 {
        (num / denom).sqrt()
    } else {
        num.sqrt()
    }
}

type Profile = (Vec<f32>, Option<Vec<f32>>, Vec<f32>, Vec<f32>);

fn curvature_s1<Dec>(inputs: &CurvatureInputs<'_, Dec>) -> anyhow::Result<Profile>
where
    Dec: DecoderModuleT,
{
    let nn = inputs.n_grid.max(8);
    let h = std::f32::consts::TAU / nn as f32;
    let thetas: Vec<f32> = (0..nn).map(|i| i as f32 * h).collect();

    // true: the generative immersion sampled on the same grid
    let mut true_points = Mat::zeros(nn, 2);
    for (i, &theta) in thetas.iter().enumerate() {
        let p = s1_point(theta, &inputs.manifold);
        true_points[(i, 0)] = p[0];
        true_points[(i, 1)] = p[1];
    }
    let curv_true = closed_curve_mean_curvature(&true_points, h);

    // learned: the decoded unit circle
    let mut z_grid = Mat::zeros(nn, 2);
    for (i, &theta) in thetas.iter().enumerate() {
        z_grid[(i, 0)] = theta.cos();
        z_grid[(i, 1)] = theta.sin();
    }
    let decoded = decode_grid(inputs.decoder, &z_grid, &inputs.device)?;
    let curv_learned = closed_curve_mean_curvature(&decoded, h);

    Ok((thetas, None, curv_true, curv_learned))
}

fn curvature_s2<Dec>(inputs: &CurvatureInputs<'_, Dec>) -> anyhow::Result<Profile>
where
    Dec: DecoderModuleT,
{
    let mm = inputs.n_grid.max(8);
    let hu = std::f32::consts::PI / (mm + 1) as f32; // polar, interior
    let hv = std::f32::consts::TAU / mm as f32; // azimuth, periodic

    let polars: Vec<f32> = (0..mm).map(|j| hu * (j + 1) as f32).collect();
    let azimuths: Vec<f32> = (0..mm).map(|i| hv * i as f32).collect();

    let mut z_grid = Mat::zeros(mm * mm, 3);
    for (j, &theta) in polars.iter().enumerate() {
        for (i, &phi) in azimuths.iter().enumerate() {
            let p = s2_point(theta, phi, 1.0);
            for d in 0..3 {
                z_grid[(j * mm + i, d)] = p[d];
            }
        }
    }

    let decoded = decode_grid(inputs.decoder, &z_grid, &inputs.device)?;
    let surface = SurfaceGrid {
        points: &decoded,
        side: mm,
        hu,
        hv,
        periodic_u: false,
        periodic_v: true,
    };

    let (kept, curv_learned) = surface.mean_curvature();

    let curv_true = vec![1.0 / inputs.manifold.radius; kept.len()];

    let mut angle_out = Vec::with_capacity(kept.len());
    let mut angle2_out = Vec::with_capacity(kept.len());
    for &(j, i) in kept.iter() {
        angle_out.push(azimuths[i]);
        angle2_out.push(polars[j]);
    }

    Ok((angle_out, Some(angle2_out), curv_true, curv_learned))
}

fn curvature_t2<Dec>(inputs: &CurvatureInputs<'_, Dec>) -> anyhow::Result<Profile>
where
    Dec: DecoderModuleT,
{
    let mm = inputs.n_grid.max(8);
    let h = std::f32::consts::TAU / mm as f32;

    let minors: Vec<f32> = (0..mm).map(|j| h * j as f32).collect();
    let majors: Vec<f32> = (0..mm).map(|i| h * i as f32).collect();

    // first latent circle tracks the labelled major angle
    let mut z_grid = Mat::zeros(mm * mm, 4);
    for (j, &theta) in minors.iter().enumerate() {
        for (i, &phi) in majors.iter().enumerate() {
            let row = j * mm + i;
            z_grid[(row, 0)] = phi.cos();
            z_grid[(row, 1)] = phi.sin();
            z_grid[(row, 2)] = theta.cos();
            z_grid[(row, 3)] = theta.sin();
        }
    }

    let decoded = decode_grid(inputs.decoder, &z_grid, &inputs.device)?;
    let surface = SurfaceGrid {
        points: &decoded,
        side: mm,
        hu: h,
        hv: h,
        periodic_u: true,
        periodic_v: true,
    };

    let (kept, curv_learned) = surface.mean_curvature();

    // |H| = |R + 2 r cos(theta)| / (2 r (R + r cos(theta)))
    let rr = inputs.manifold.major_radius;
    let r = inputs.manifold.minor_radius;
    let mut curv_true = Vec::with_capacity(kept.len());
    let mut angle_out = Vec::with_capacity(kept.len());
    let mut angle2_out = Vec::with_capacity(kept.len());
    for &(j, i) in kept.iter() {
        let theta = minors[j];
        curv_true.push((rr + 2.0 * r * theta.cos()).abs() / (2.0 * r * (rr + r * theta.cos())));
        angle_out.push(majors[i]);
        angle2_out.push(theta);
    }

    Ok((angle_out, Some(angle2_out), curv_true, curv_learned))
}

fn decode_grid<Dec>(
    decoder: &Dec,
    z_grid: &Mat,
    dev: &candle_core::Device,
) -> anyhow::Result<Mat>
where
    Dec: DecoderModuleT,
{
    let z = z_grid.to_tensor(dev)?;
    let decoded = decoder.forward(&z)?.to_device(&candle_core::Device::Cpu)?;
    Ok(Mat::from_tensor(&decoded)?)
}

///
/// Mean curvature norm of a closed curve sampled at uniform parameter
/// steps `h`: `|f'' - (f'' . T) T| / |f'|^2` with periodic central
/// differences.
///
fn closed_curve_mean_curvature(points: &Mat, h: f32) -> Vec<f32> {
    let nn = points.nrows();
    let mut curv = Vec::with_capacity(nn);

    for i in 0..nn {
        let prev = points.row((i + nn - 1) % nn);
        let here = points.row(i);
        let next = points.row((i + 1) % nn);

        let d1 = (next - prev) / (2.0 * h);
        let d2 = (next + prev - here * 2.0) / (h * h);

        let speed_sq = d1.dot(&d1).max(1e-12);
        let tangent = d1 / speed_sq.sqrt();
        let normal_part = &d2 - &tangent * d2.dot(&tangent);

        curv.push(normal_part.norm() / speed_sq);
    }

    curv
}

///
/// A surface sampled on a parameter grid (`side x side` rows, row index
/// `j * side + i` with `u` along `j` and `v` along `i`).
///
struct SurfaceGrid<'a> {
    points: &'a Mat,
    side: usize,
    hu: f32,
    hv: f32,
    periodic_u: bool,
    periodic_v: bool,
}

impl SurfaceGrid<'_> {
    fn row(&self, j: i64, i: i64) -> nalgebra::RowDVector<f32> {
        let side = self.side as i64;
        let j = if self.periodic_u {
            j.rem_euclid(side)
        } else {
            j.clamp(0, side - 1)
        };
        let i = if self.periodic_v {
            i.rem_euclid(side)
        } else {
            i.clamp(0, side - 1)
        };
        self.points.row((j * side + i) as usize).into_owned()
    }

    ///
    /// Mean curvature vector norm via the fundamental forms:
    /// `H = (G f_uu - 2 F f_uv + E f_vv)_perp / (2 (E G - F^2))`,
    /// with tangential components removed. Boundary rows of a
    /// non-periodic direction are skipped; returns the kept `(j, i)`
    /// indices and their curvature norms.
    ///
    fn mean_curvature(&self) -> (Vec<(usize, usize)>, Vec<f32>) {
        let side = self.side;
        let (hu, hv) = (self.hu, self.hv);

        let j_range: Vec<usize> = if self.periodic_u {
            (0..side).collect()
        } else {
            (1..side - 1).collect()
        };
        let i_range: Vec<usize> = if self.periodic_v {
            (0..side).collect()
        } else {
            (1..side - 1).collect()
        };

        let mut kept = Vec::with_capacity(j_range.len() * i_range.len());
        let mut curv = Vec::with_capacity(j_range.len() * i_range.len());

        for &j in j_range.iter() {
            for &i in i_range.iter() {
                let (jj, ii) = (j as i64, i as i64);

                let f_u = (self.row(jj + 1, ii) - self.row(jj - 1, ii)) / (2.0 * hu);
                let f_v = (self.row(jj, ii + 1) - self.row(jj, ii - 1)) / (2.0 * hv);

                let centre = self.row(jj, ii);
                let f_uu =
                    (self.row(jj + 1, ii) + self.row(jj - 1, ii) - &centre * 2.0) / (hu * hu);
                let f_vv =
                    (self.row(jj, ii + 1) + self.row(jj, ii - 1) - &centre * 2.0) / (hv * hv);
                let f_uv = (self.row(jj + 1, ii + 1) - self.row(jj + 1, ii - 1)
                    - self.row(jj - 1, ii + 1)
                    + self.row(jj - 1, ii - 1))
                    / (4.0 * hu * hv);

                let ee = f_u.dot(&f_u);
                let ff = f_u.dot(&f_v);
                let gg = f_v.dot(&f_v);
                let det = (ee * gg - ff * ff).max(1e-12);

                let w = (&f_uu * gg - &f_uv * (2.0 * ff) + &f_vv * ee) / (2.0 * det);

                // remove tangential components: solve I [a, b]^T = [w.fu, w.fv]
                let wu = w.dot(&f_u);
                let wv = w.dot(&f_v);
                let a = (gg * wu - ff * wv) / det;
                let b = (ee * wv - ff * wu) / det;
                let w_perp = &w - &f_u * a - &f_v * b;

                kept.push((j, i));
                curv.push(w_perp.norm());
            }
        }

        (kept, curv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn circle_curvature_is_inverse_radius() {
        let nn = 256;
        let radius = 2.0f32;
        let h = std::f32::consts::TAU / nn as f32;

        let mut points = Mat::zeros(nn, 2);
        for i in 0..nn {
            let theta = i as f32 * h;
            points[(i, 0)] = radius * theta.cos();
            points[(i, 1)] = radius * theta.sin();
        }

        let curv = closed_curve_mean_curvature(&points, h);
        for v in curv {
            assert_abs_diff_eq!(v, 1.0 / radius, epsilon = 1e-3);
        }
    }

    #[test]
    fn sphere_mean_curvature_is_inverse_radius() {
        let mm = 48;
        let radius = 1.5f32;
        let hu = std::f32::consts::PI / (mm + 1) as f32;
        let hv = std::f32::consts::TAU / mm as f32;

        let mut points = Mat::zeros(mm * mm, 3);
        for j in 0..mm {
            let theta = hu * (j + 1) as f32;
            for i in 0..mm {
                let phi = hv * i as f32;
                let p = s2_point(theta, phi, radius);
                for d in 0..3 {
                    points[(j * mm + i, d)] = p[d];
                }
            }
        }

        let surface = SurfaceGrid {
            points: &points,
            side: mm,
            hu,
            hv,
            periodic_u: false,
            periodic_v: true,
        };

        let (_, curv) = surface.mean_curvature();
        for v in curv {
            assert_abs_diff_eq!(v, 1.0 / radius, epsilon = 2e-2);
        }
    }

    #[test]
    fn torus_mean_curvature_matches_closed_form() {
        let mm = 64;
        let config = SyntheticManifoldConfig {
            major_radius: 2.0,
            minor_radius: 0.5,
            ..Default::default()
        };
        let h = std::f32::consts::TAU / mm as f32;

        let mut points = Mat::zeros(mm * mm, 3);
        for j in 0..mm {
            let theta = h * j as f32;
            for i in 0..mm {
                let phi = h * i as f32;
                let p = t2_point(theta, phi, &config);
                for d in 0..3 {
                    points[(j * mm + i, d)] = p[d];
                }
            }
        }

        let surface = SurfaceGrid {
            points: &points,
            side: mm,
            hu: h,
            hv: h,
            periodic_u: true,
            periodic_v: true,
        };

        let (kept, curv) = surface.mean_curvature();
        let (rr, r) = (config.major_radius, config.minor_radius);

        for (&(j, _), &v) in kept.iter().zip(curv.iter()) {
            let theta = h * j as f32;
            let expected =
                (rr + 2.0 * r * theta.cos()).abs() / (2.0 * r * (rr + r * theta.cos()));
            assert_abs_diff_eq!(v, expected, epsilon = 2e-2);
        }
    }
}
