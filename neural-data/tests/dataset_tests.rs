use approx::assert_abs_diff_eq;
use neural_data::grid_fields::*;
use neural_data::images::*;
use neural_data::manifolds::*;
use neural_data::place_cells::*;
use neural_data::points::*;

#[test]
fn images_shapes_and_labels_test() -> anyhow::Result<()> {
    let config = ImageConfig {
        n_scalars: 2,
        n_angles: 6,
        img_size: 16,
        noise_sd: 0.05,
        seed: 1,
    };

    let (data, labels) = load_images(&config)?;
    assert_eq!(data.shape(), (12, 256));
    assert_eq!(labels.len(), 12);

    let angles = labels.column("angle").ok_or(anyhow::anyhow!("angle"))?;
    assert!(angles.iter().all(|&a| (0.0..360.0).contains(&a)));

    let scalars = labels.column("scalar").ok_or(anyhow::anyhow!("scalar"))?;
    assert_abs_diff_eq!(scalars[0], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(scalars[1], 1.2, epsilon = 1e-6);
    Ok(())
}

#[test]
fn images_deterministic_under_seed_test() -> anyhow::Result<()> {
    let config = ImageConfig {
        n_scalars: 1,
        n_angles: 3,
        img_size: 12,
        noise_sd: 0.05,
        seed: 9,
    };

    let (a, _) = load_images(&config)?;
    let (b, _) = load_images(&config)?;
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn projections_reduce_width_test() -> anyhow::Result<()> {
    let config = ImageConfig {
        n_scalars: 1,
        n_angles: 4,
        img_size: 16,
        noise_sd: 0.0,
        seed: 0,
    };

    let (proj, labels) = load_projections(&config)?;
    assert_eq!(proj.shape(), (4, 16));
    assert_eq!(labels.len(), 4);
    Ok(())
}

#[test]
fn cone_points_scale_with_labels_test() -> anyhow::Result<()> {
    let (points, labels) = load_points(3, 8)?;
    assert_eq!(points.shape(), (24, 3));

    let scalars = labels.column("scalar").ok_or(anyhow::anyhow!("scalar"))?;
    let base_norm = 3f32.sqrt();

    for i in 0..points.nrows() {
        let norm = points.row(i).norm();
        assert_abs_diff_eq!(norm, scalars[i] * base_norm, epsilon = 1e-4);
    }
    Ok(())
}

#[test]
fn place_cells_counts_test() -> anyhow::Result<()> {
    let (firings, labels) = load_place_cells(120, 12, 3)?;
    assert_eq!(firings.shape(), (120, 12));
    assert_eq!(labels.len(), 120);

    assert!(firings.iter().all(|&x| x >= 0.0 && x.fract() == 0.0));

    // active cell and its circular neighbours carry the firing mass
    let angles = labels.column("angle").ok_or(anyhow::anyhow!("angle"))?;
    assert_abs_diff_eq!(angles[0], 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(angles[1], 30.0, epsilon = 1e-4);
    Ok(())
}

#[test]
fn s1_flat_circle_has_exact_radius_test() -> anyhow::Result<()> {
    let config = SyntheticManifoldConfig {
        n_times: 50,
        embedding_dim: 4,
        distortion: Distortion::Flat,
        noise_var: 0.0,
        random_rotation: false,
        ..Default::default()
    };

    let (data, labels) = s1_synthetic(&config)?;
    assert_eq!(data.shape(), (50, 4));
    assert_eq!(labels.len(), 50);

    for i in 0..data.nrows() {
        let norm = data.row(i).norm();
        assert_abs_diff_eq!(norm, config.radius, epsilon = 1e-5);
    }
    Ok(())
}

#[test]
fn random_rotation_preserves_norms_test() -> anyhow::Result<()> {
    let config = SyntheticManifoldConfig {
        n_times: 40,
        embedding_dim: 6,
        distortion: Distortion::Wiggles,
        noise_var: 0.0,
        random_rotation: true,
        seed: 4,
        ..Default::default()
    };

    let flat = SyntheticManifoldConfig {
        random_rotation: false,
        ..config.clone()
    };

    let (rotated, _) = s1_synthetic(&config)?;
    let (plain, _) = s1_synthetic(&flat)?;

    for i in 0..rotated.nrows() {
        assert_abs_diff_eq!(rotated.row(i).norm(), plain.row(i).norm(), epsilon = 1e-4);
    }
    Ok(())
}

#[test]
fn s2_points_on_sphere_test() -> anyhow::Result<()> {
    let config = SyntheticManifoldConfig {
        n_times: 100,
        embedding_dim: 5,
        noise_var: 0.0,
        ..Default::default()
    };

    let (data, labels) = s2_synthetic(&config)?;
    assert_eq!(data.shape(), (100, 5));
    assert!(labels.column("angle2").is_some());

    for i in 0..data.nrows() {
        assert_abs_diff_eq!(data.row(i).norm(), config.radius, epsilon = 1e-5);
    }
    Ok(())
}

#[test]
fn t2_points_on_torus_test() -> anyhow::Result<()> {
    let config = SyntheticManifoldConfig {
        n_times: 64,
        embedding_dim: 3,
        noise_var: 0.0,
        ..Default::default()
    };

    let (data, _) = t2_synthetic(&config)?;
    assert_eq!(data.shape(), (64, 3));

    // (sqrt(x^2 + y^2) - R)^2 + z^2 = r^2
    for i in 0..data.nrows() {
        let planar = (data[(i, 0)].powi(2) + data[(i, 1)].powi(2)).sqrt();
        let tube = ((planar - config.major_radius).powi(2) + data[(i, 2)].powi(2)).sqrt();
        assert_abs_diff_eq!(tube, config.minor_radius, epsilon = 1e-4);
    }
    Ok(())
}

#[test]
fn grid_fields_bounded_rates_test() -> anyhow::Result<()> {
    let config = GridFieldConfig {
        resolution: 10,
        n_cells: 6,
        ..Default::default()
    };

    let (rates, labels) = load_grid_cells(&config)?;
    assert_eq!(rates.shape(), (100, 6));
    assert_eq!(labels.len(), 100);
    assert!(rates.iter().all(|&r| (0.0..=1.0).contains(&r)));

    let xs = labels.column("x").ok_or(anyhow::anyhow!("x"))?;
    assert!(xs.iter().all(|&x| (0.0..config.arena_len).contains(&x)));
    Ok(())
}

#[test]
fn label_table_round_trip_test() -> anyhow::Result<()> {
    let (_, labels) = load_points(2, 5)?;

    let mat = labels.to_mat()?;
    assert_eq!(mat.shape(), (10, 2));

    let dir = tempfile::tempdir()?;
    let file = dir.path().join("labels.parquet");
    labels.to_parquet(file.to_str().ok_or(anyhow::anyhow!("tmp path"))?)?;
    Ok(())
}
