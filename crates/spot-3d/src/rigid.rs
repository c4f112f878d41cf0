use serde::{Deserialize, Serialize};

use crate::linalg::{mat33_mul_vec3, matmul33, transpose33, IDENTITY33};
use crate::transforms::rotation_matrix_to_angle;

/// A similarity transform `p -> scale * rotation * p + translation`.
///
/// For rigid registration the scale is always `1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    /// Rotation matrix, row-major, orthonormal with determinant +1.
    pub rotation: [[f64; 3]; 3],
    /// Translation vector.
    pub translation: [f64; 3],
    /// Isotropic scale factor.
    pub scale: f64,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// The identity transform.
    pub const fn identity() -> Self {
        Self {
            rotation: IDENTITY33,
            translation: [0.0; 3],
            scale: 1.0,
        }
    }

    /// Create a rigid transform with unit scale.
    pub fn new(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Self {
        Self {
            rotation,
            translation,
            scale: 1.0,
        }
    }

    /// Create a similarity transform.
    pub fn with_scale(rotation: [[f64; 3]; 3], translation: [f64; 3], scale: f64) -> Self {
        Self {
            rotation,
            translation,
            scale,
        }
    }

    /// The rotation matrix.
    #[inline]
    pub fn matrix(&self) -> &[[f64; 3]; 3] {
        &self.rotation
    }

    /// The translation vector.
    #[inline]
    pub fn translation(&self) -> &[f64; 3] {
        &self.translation
    }

    /// The isotropic scale.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Apply the transform to a point.
    #[inline]
    pub fn apply(&self, point: &[f64; 3]) -> [f64; 3] {
        let r = mat33_mul_vec3(&self.rotation, point);
        [
            self.scale * r[0] + self.translation[0],
            self.scale * r[1] + self.translation[1],
            self.scale * r[2] + self.translation[2],
        ]
    }

    /// Compose two transforms: the result applies `other` first, then `self`.
    ///
    /// `(s1 R1, t1) ∘ (s2 R2, t2) = (s1 s2 R1 R2, s1 R1 t2 + t1)`
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        let mut rotation = [[0.0; 3]; 3];
        matmul33(&self.rotation, &other.rotation, &mut rotation);
        RigidTransform {
            rotation,
            translation: self.apply(&other.translation),
            scale: self.scale * other.scale,
        }
    }

    /// The inverse transform.
    ///
    /// PRECONDITION: the scale is not zero.
    pub fn inverse(&self) -> RigidTransform {
        let rotation = transpose33(&self.rotation);
        let inv_scale = 1.0 / self.scale;
        let rt = mat33_mul_vec3(&rotation, &self.translation);
        RigidTransform {
            rotation,
            translation: [-inv_scale * rt[0], -inv_scale * rt[1], -inv_scale * rt[2]],
            scale: inv_scale,
        }
    }

    /// The angle in radians of the rotation part.
    pub fn rotation_angle(&self) -> f64 {
        rotation_matrix_to_angle(&self.rotation)
    }

    /// The homogeneous 4x4 matrix, row-major.
    pub fn matrix4(&self) -> [[f64; 4]; 4] {
        let mut m = [[0.0; 4]; 4];
        for i in 0..3 {
            for j in 0..3 {
                m[i][j] = self.scale * self.rotation[i][j];
            }
            m[i][3] = self.translation[i];
        }
        m[3][3] = 1.0;
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::axis_angle_to_rotation_matrix;
    use approx::assert_relative_eq;

    fn assert_points_eq(a: &[f64; 3], b: &[f64; 3]) {
        for k in 0..3 {
            assert_relative_eq!(a[k], b[k], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_identity() {
        let t = RigidTransform::identity();
        assert_eq!(t, RigidTransform::default());
        assert_eq!(t.apply(&[1.0, 2.0, 3.0]), [1.0, 2.0, 3.0]);
        assert_eq!(t.rotation_angle(), 0.0);
    }

    #[test]
    fn test_compose_matches_sequential_apply() -> Result<(), Box<dyn std::error::Error>> {
        let a = RigidTransform::with_scale(
            axis_angle_to_rotation_matrix(&[0.0, 1.0, 1.0], 0.4)?,
            [1.0, -2.0, 0.5],
            1.5,
        );
        let b = RigidTransform::new(
            axis_angle_to_rotation_matrix(&[1.0, 0.0, 0.0], -1.1)?,
            [0.3, 0.0, 2.0],
        );
        let p = [0.2, -0.7, 3.0];
        assert_points_eq(&a.compose(&b).apply(&p), &a.apply(&b.apply(&p)));
        assert_relative_eq!(a.compose(&b).scale(), 1.5);
        Ok(())
    }

    #[test]
    fn test_inverse_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
        let t = RigidTransform::with_scale(
            axis_angle_to_rotation_matrix(&[1.0, 2.0, 3.0], 2.0)?,
            [4.0, 5.0, -6.0],
            0.8,
        );
        let p = [1.0, -1.0, 0.25];
        assert_points_eq(&t.inverse().apply(&t.apply(&p)), &p);

        let id = t.compose(&t.inverse());
        assert_relative_eq!(id.rotation_angle(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(id.scale(), 1.0, epsilon = 1e-12);
        assert_points_eq(id.translation(), &[0.0; 3]);
        Ok(())
    }

    #[test]
    fn test_matrix4() {
        let t = RigidTransform::with_scale(IDENTITY33, [1.0, 2.0, 3.0], 2.0);
        let m = t.matrix4();
        assert_eq!(m[0], [2.0, 0.0, 0.0, 1.0]);
        assert_eq!(m[1], [0.0, 2.0, 0.0, 2.0]);
        assert_eq!(m[2], [0.0, 0.0, 2.0, 3.0]);
        assert_eq!(m[3], [0.0, 0.0, 0.0, 1.0]);
    }
}
