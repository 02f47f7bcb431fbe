use approx::assert_abs_diff_eq;
use matrix_util::image_ops::*;
use ndarray::Array2;

#[test]
fn gaussian_kernel_normalized_test() {
    for sigma in [0.5_f32, 1.0, 2.5] {
        let kernel = gaussian_kernel_1d(sigma);
        let tot: f32 = kernel.iter().sum();
        assert_abs_diff_eq!(tot, 1.0, epsilon = 1e-5);
    }
}

#[test]
fn rotate_identity_test() {
    let img = Array2::from_shape_fn((16, 16), |(r, c)| (r * 31 + c * 7) as f32 / 100.0);
    let rot = rotate_bilinear(&img, 0.0);

    for (a, b) in img.iter().zip(rot.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-4);
    }
}

#[test]
fn rotate_full_turn_test() {
    let img = Array2::from_shape_fn((16, 16), |(r, c)| ((r + 2 * c) % 5) as f32);
    let rot = rotate_bilinear(&img, 360.0);

    // interior pixels come back; the border may pick up padding
    for r in 2..14 {
        for c in 2..14 {
            assert_abs_diff_eq!(img[[r, c]], rot[[r, c]], epsilon = 1e-3);
        }
    }
}

#[test]
fn blur_constant_image_test() {
    let img = Array2::from_elem((12, 12), 0.7_f32);
    let out = gaussian_blur(&img, 1.5);

    for x in out.iter() {
        assert_abs_diff_eq!(*x, 0.7, epsilon = 1e-4);
    }
}

#[test]
fn blur_smooths_peak_test() {
    let mut img = Array2::<f32>::zeros((15, 15));
    img[[7, 7]] = 1.0;
    let out = gaussian_blur(&img, 1.0);

    assert!(out[[7, 7]] < 1.0);
    assert!(out[[7, 8]] > 0.0);
    // mass is conserved under edge clamping away from borders
    let tot: f32 = out.iter().sum();
    assert_abs_diff_eq!(tot, 1.0, epsilon = 1e-3);
}
