use approx::assert_abs_diff_eq;
use matrix_util::traits::{MatOps, SampleOps};
use nalgebra::DMatrix;

#[test]
fn runif_range_test() {
    let xx = DMatrix::<f32>::runif(100, 10);
    assert_eq!(xx.shape(), (100, 10));
    assert!(xx.iter().all(|&x| (0.0..=1.0).contains(&x)));
}

#[test]
fn rnorm_moments_test() {
    let xx = DMatrix::<f32>::rnorm(200, 50);
    let mean = xx.iter().sum::<f32>() / (xx.len() as f32);
    assert_abs_diff_eq!(mean, 0.0, epsilon = 5e-2);
}

#[test]
fn rpois_non_negative_test() {
    let xx = DMatrix::<f32>::rpois(50, 20, 2.0);
    assert!(xx.iter().all(|&x| x >= 0.0 && x.fract() == 0.0));
}

#[test]
fn normalize_columns_test() {
    let mut xx = DMatrix::<f32>::runif(100, 10);
    xx.normalize_columns_inplace();

    for j in 0..xx.ncols() {
        let norm = xx.column(j).norm();
        assert!(norm <= 1.0 + 1e-4);
    }
}

#[test]
fn centre_columns_test() {
    let xx = DMatrix::<f32>::rnorm(100, 5).centre_columns();

    for j in 0..xx.ncols() {
        let mean = xx.column(j).mean();
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-5);
    }
}
