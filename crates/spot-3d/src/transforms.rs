use crate::linalg::{det_mat33, matmul33, transpose33};

/// Error types for the transforms module.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// The rotation axis has a (near) zero norm.
    #[error("cannot compute rotation matrix from a zero vector")]
    ZeroAxis,
}

/// Compute the rotation matrix from an axis and angle.
///
/// # Arguments
///
/// * `axis` - The axis of rotation. It does not need to be normalized.
/// * `angle` - The angle of rotation in radians.
///
/// # Returns
///
/// The rotation matrix.
///
/// Example:
///
/// ```
/// use spot_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let axis = [1.0, 0.0, 0.0];
/// let angle = std::f64::consts::PI / 2.0;
/// let rotation = axis_angle_to_rotation_matrix(&axis, angle).unwrap();
/// assert!((rotation[1][2] + 1.0).abs() < 1e-12);
/// ```
pub fn axis_angle_to_rotation_matrix(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], TransformError> {
    let magnitude = (axis[0].powi(2) + axis[1].powi(2) + axis[2].powi(2)).sqrt();
    if magnitude < 1e-10 {
        return Err(TransformError::ZeroAxis);
    }

    let x = axis[0] / magnitude;
    let y = axis[1] / magnitude;
    let z = axis[2] / magnitude;

    let (s, c) = angle.sin_cos();
    let t = 1.0 - c;

    let (xy, xz, yz) = (x * y * t, x * z * t, y * z * t);

    Ok([
        [c + x * x * t, xy - z * s, xz + y * s],
        [xy + z * s, c + y * y * t, yz - x * s],
        [xz - y * s, yz + x * s, c + z * z * t],
    ])
}

/// Compute the angle in radians, in `[0, pi]`, of the rotation encoded by `rotation`.
///
/// Uses `atan2(sin, cos)` so that small angles keep their precision.
pub fn rotation_matrix_to_angle(rotation: &[[f64; 3]; 3]) -> f64 {
    let cos = (rotation[0][0] + rotation[1][1] + rotation[2][2] - 1.0) * 0.5;
    // the skew-symmetric part of R is sin(angle) times the unit axis
    let axis = [
        rotation[2][1] - rotation[1][2],
        rotation[0][2] - rotation[2][0],
        rotation[1][0] - rotation[0][1],
    ];
    let sin = 0.5 * (axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2]).sqrt();
    sin.atan2(cos)
}

/// Check that `rotation` is orthonormal with determinant +1 within `tolerance`.
pub fn is_rotation_matrix(rotation: &[[f64; 3]; 3], tolerance: f64) -> bool {
    let mut rrt = [[0.0; 3]; 3];
    matmul33(rotation, &transpose33(rotation), &mut rrt);
    for (i, row) in rrt.iter().enumerate() {
        for (j, val) in row.iter().enumerate() {
            let expected = if i == j { 1.0 } else { 0.0 };
            if (val - expected).abs() > tolerance {
                return false;
            }
        }
    }
    (det_mat33(rotation) - 1.0).abs() <= tolerance
}
