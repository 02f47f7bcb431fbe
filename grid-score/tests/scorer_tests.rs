use approx::assert_abs_diff_eq;
use grid_score::*;
use ndarray::Array2;

fn plane_wave_map(nbins: usize, orientations_deg: &[f32], wavelength: f32) -> Array2<f32> {
    Array2::from_shape_fn((nbins, nbins), |(r, c)| {
        orientations_deg
            .iter()
            .map(|deg| {
                let theta = deg.to_radians();
                let k = std::f32::consts::TAU / wavelength;
                (k * (theta.cos() * r as f32 + theta.sin() * c as f32)).cos()
            })
            .sum()
    })
}

#[test]
fn sac_centre_and_symmetry_test() {
    let map = plane_wave_map(20, &[0.0, 60.0, 120.0], 8.0);
    let sac = spatial_autocorrelogram(&map);

    let (nr, nc) = sac.dim();
    assert_eq!((nr, nc), (39, 39));
    assert_abs_diff_eq!(sac[[19, 19]], 1.0, epsilon = 1e-4);

    for r in 0..nr {
        for c in 0..nc {
            assert_abs_diff_eq!(sac[[r, c]], sac[[nr - 1 - r, nc - 1 - c]], epsilon = 1e-4);
        }
    }
}

#[test]
fn hexagonal_map_scores_60_test() -> anyhow::Result<()> {
    let nbins = 40;
    let map = plane_wave_map(nbins, &[0.0, 60.0, 120.0], 10.0);
    let scorer = GridScorer::new(nbins, default_mask_params());

    let scores = scorer.get_scores(&map)?;
    assert!(
        scores.score_60 > 0.3,
        "hexagonal map scored {}",
        scores.score_60
    );
    assert!(scores.score_60 > scores.score_90);
    Ok(())
}

#[test]
fn square_map_scores_90_test() -> anyhow::Result<()> {
    let nbins = 40;
    let map = plane_wave_map(nbins, &[0.0, 90.0], 10.0);
    let scorer = GridScorer::new(nbins, default_mask_params());

    let scores = scorer.get_scores(&map)?;
    assert!(
        scores.score_90 > 0.3,
        "square map scored {}",
        scores.score_90
    );
    assert!(scores.score_90 > scores.score_60);
    Ok(())
}

#[test]
fn flat_map_scores_zero_test() -> anyhow::Result<()> {
    let nbins = 20;
    let map = Array2::from_elem((nbins, nbins), 1.0);
    let scorer = GridScorer::new(nbins, default_mask_params());

    let scores = scorer.get_scores(&map)?;
    assert_abs_diff_eq!(scores.score_60, 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(scores.score_90, 0.0, epsilon = 1e-6);
    Ok(())
}

#[test]
fn population_scores_test() -> anyhow::Result<()> {
    let nbins = 20;
    let maps: Vec<Array2<f32>> = (0..4)
        .map(|i| plane_wave_map(nbins, &[0.0, 60.0, 120.0], 6.0 + i as f32))
        .collect();

    let scorer = GridScorer::new(nbins, default_mask_params());
    let population = score_population(&maps, 2, &scorer, 0.37)?;

    assert_eq!(population.scale_per_block.len(), 2);
    assert!(population.scale_per_block.iter().all(|&s| s > 0.0));
    assert!(population.max_scale <= 1.4);
    Ok(())
}
