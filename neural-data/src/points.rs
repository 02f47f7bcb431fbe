//! Points on a cone in R^3: rotations of `(1, 1, 1)` about the z-axis
//! scaled by positive integers.

use crate::labels::LabelTable;
use crate::Mat;

///
/// Returns `(points, labels)` with points of shape
/// `[n_scalars * n_angles, 3]` and labels `angle` (radians) and
/// `scalar`.
///
pub fn load_points(n_scalars: usize, n_angles: usize) -> anyhow::Result<(Mat, LabelTable)> {
    let nn = n_scalars * n_angles;
    let mut points = Mat::zeros(nn, 3);
    let mut angles = Vec::with_capacity(nn);
    let mut scalars = Vec::with_capacity(nn);

    let base = [1.0f32, 1.0, 1.0];
    let mut row = 0;

    for i_angle in 0..n_angles {
        let angle = std::f32::consts::TAU * i_angle as f32 / n_angles as f32;
        let (sin_t, cos_t) = angle.sin_cos();

        let rotated = [
            cos_t * base[0] - sin_t * base[1],
            sin_t * base[0] + cos_t * base[1],
            base[2],
        ];

        for i_scalar in 0..n_scalars {
            let scalar = 1.0 + i_scalar as f32;
            for d in 0..3 {
                points[(row, d)] = scalar * rotated[d];
            }
            angles.push(angle);
            scalars.push(scalar);
            row += 1;
        }
    }

    let labels = LabelTable::new()
        .with_column("angle", angles)
        .with_column("scalar", scalars);

    Ok((points, labels))
}
