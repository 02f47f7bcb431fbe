use crate::sac::spatial_autocorrelogram;

use matrix_util::image_ops::rotate_bilinear;
use matrix_util::ndarray_util::{min_max_normalize, pearson_correlation};
use ndarray::Array2;
use rayon::prelude::*;

const ROTATIONS: [f32; 7] = [30.0, 45.0, 60.0, 90.0, 120.0, 135.0, 150.0];

/// Rotational-correlation scores of one rate map
#[derive(Clone, Copy, Debug)]
pub struct SacScores {
    /// hexagonal periodicity: `min(r60, r120) - max(r30, r90, r150)`
    pub score_60: f32,
    /// square periodicity: `r90 - max(r45, r135)`
    pub score_90: f32,
    /// `(inner, outer)` annulus (fractions of the map side) that
    /// maximized the 60-degree score; the outer radius reads off the
    /// module's grid scale
    pub mask_60: (f32, f32),
    pub mask_90: (f32, f32),
}

/// Population summary used by the adaptive displacement feedback
#[derive(Clone, Debug)]
pub struct PopulationScores {
    pub score_mean: f32,
    pub scale_per_block: Vec<f32>,
    /// largest scale among maps whose score clears the gate; 0 when
    /// none does
    pub max_scale: f32,
}

/// The canonical sweep: fixed inner radius, outer radius from 0.2 to
/// 1.4 of the map side in 20 steps
pub fn default_mask_params() -> Vec<(f32, f32)> {
    let n_masks = 20;
    (0..n_masks)
        .map(|i| {
            let end = 0.2 + 1.2 * i as f32 / (n_masks - 1) as f32;
            (0.1, end)
        })
        .collect()
}

pub struct GridScorer {
    nbins: usize,
    mask_params: Vec<(f32, f32)>,
}

impl GridScorer {
    pub fn new(nbins: usize, mask_params: Vec<(f32, f32)>) -> Self {
        Self { nbins, mask_params }
    }

    /// Score one `nbins x nbins` rate map.
    pub fn get_scores(&self, rate_map: &Array2<f32>) -> anyhow::Result<SacScores> {
        if rate_map.dim() != (self.nbins, self.nbins) {
            return Err(anyhow::anyhow!(
                "rate map shape {:?} != ({}, {})",
                rate_map.dim(),
                self.nbins,
                self.nbins
            ));
        }

        let sac = spatial_autocorrelogram(rate_map);
        let rotated: Vec<Array2<f32>> = ROTATIONS
            .iter()
            .map(|&angle| rotate_bilinear(&sac, angle))
            .collect();

        let mut best = SacScores {
            score_60: f32::NEG_INFINITY,
            score_90: f32::NEG_INFINITY,
            mask_60: self.mask_params.first().copied().unwrap_or((0.1, 0.2)),
            mask_90: self.mask_params.first().copied().unwrap_or((0.1, 0.2)),
        };

        for &(start, end) in self.mask_params.iter() {
            let ring = self.ring_indices(&sac, start, end);
            if ring.len() < 2 {
                continue;
            }

            let base: Vec<f32> = ring.iter().map(|&(r, c)| sac[[r, c]]).collect();
            let corr: Vec<f32> = rotated
                .iter()
                .map(|rot| {
                    let turned: Vec<f32> = ring.iter().map(|&(r, c)| rot[[r, c]]).collect();
                    pearson_correlation(&base, &turned)
                })
                .collect();

            // corr indexes follow ROTATIONS
            let score_60 = corr[2].min(corr[4]) - corr[0].max(corr[3]).max(corr[6]);
            let score_90 = corr[3] - corr[1].max(corr[5]);

            if score_60 > best.score_60 {
                best.score_60 = score_60;
                best.mask_60 = (start, end);
            }
            if score_90 > best.score_90 {
                best.score_90 = score_90;
                best.mask_90 = (start, end);
            }
        }

        if !best.score_60.is_finite() || !best.score_90.is_finite() {
            return Err(anyhow::anyhow!("no usable annulus mask"));
        }

        Ok(best)
    }

    /// Annulus around the SAC centre; radii are fractions of the rate
    /// map side, converted to SAC pixels.
    fn ring_indices(&self, sac: &Array2<f32>, start: f32, end: f32) -> Vec<(usize, usize)> {
        let (nr, nc) = sac.dim();
        let centre_r = (nr - 1) as f32 * 0.5;
        let centre_c = (nc - 1) as f32 * 0.5;
        let inner = start * self.nbins as f32;
        let outer = end * self.nbins as f32;

        let mut ring = vec![];
        for r in 0..nr {
            for c in 0..nc {
                let dist = ((r as f32 - centre_r).powi(2) + (c as f32 - centre_c).powi(2)).sqrt();
                if dist > inner && dist <= outer {
                    ring.push((r, c));
                }
            }
        }
        ring
    }
}

///
/// Score every neuron's rate map, min-max normalized, then summarize
/// per module: the per-block mean grid scale and the population mean
/// score. `block_size` neurons form one module.
///
pub fn score_population(
    rate_maps: &[Array2<f32>],
    block_size: usize,
    scorer: &GridScorer,
    score_gate: f32,
) -> anyhow::Result<PopulationScores> {
    if rate_maps.is_empty() || block_size == 0 || rate_maps.len() % block_size != 0 {
        return Err(anyhow::anyhow!(
            "population of {} maps does not split into blocks of {}",
            rate_maps.len(),
            block_size
        ));
    }

    let scored: Vec<(f32, f32)> = rate_maps
        .par_iter()
        .map(|rate_map| {
            let normalized = min_max_normalize(rate_map);
            scorer
                .get_scores(&normalized)
                .map(|s| (s.score_60, s.mask_60.1))
        })
        .collect::<anyhow::Result<_>>()?;

    let num_blocks = rate_maps.len() / block_size;
    let scale_per_block: Vec<f32> = (0..num_blocks)
        .map(|b| {
            let block = &scored[b * block_size..(b + 1) * block_size];
            block.iter().map(|&(_, scale)| scale).sum::<f32>() / block_size as f32
        })
        .collect();

    let score_mean = scored.iter().map(|&(s, _)| s).sum::<f32>() / scored.len() as f32;

    let max_scale = scored
        .iter()
        .filter(|&&(s, _)| s > score_gate)
        .map(|&(_, scale)| scale)
        .fold(0f32, f32::max);

    Ok(PopulationScores {
        score_mean,
        scale_per_block,
        max_scale,
    })
}
