/// Singular value decomposition of a 3x3 matrix `m = u * diag(s) * v^T`.
///
/// The singular values are sorted in non-increasing order.
#[derive(Debug, Clone)]
pub struct Svd3 {
    /// Left singular vectors, stored row-major.
    pub u: [[f64; 3]; 3],
    /// Singular values.
    pub s: [f64; 3],
    /// Right singular vectors, stored row-major.
    pub v: [[f64; 3]; 3],
}

/// The 3x3 identity matrix.
pub const IDENTITY33: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Compute the dot product of two 3d vectors.
#[inline]
pub fn dot_product3(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Compute the euclidean norm of a 3d vector.
#[inline]
pub fn norm3(a: &[f64; 3]) -> f64 {
    dot_product3(a, a).sqrt()
}

/// Multiply two 3x3 matrices `m = a * b`.
///
/// Example:
///
/// ```
/// use spot_3d::linalg::{matmul33, IDENTITY33};
///
/// let a = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
/// let mut m = [[0.0; 3]; 3];
/// matmul33(&a, &IDENTITY33, &mut m);
/// assert_eq!(m, a);
/// ```
pub fn matmul33(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3], m: &mut [[f64; 3]; 3]) {
    for (i, row) in m.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
}

/// Return the transpose of a 3x3 matrix.
pub fn transpose33(a: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    [
        [a[0][0], a[1][0], a[2][0]],
        [a[0][1], a[1][1], a[2][1]],
        [a[0][2], a[1][2], a[2][2]],
    ]
}

/// Compute the determinant of a 3x3 matrix.
pub fn det_mat33(a: &[[f64; 3]; 3]) -> f64 {
    a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
        - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
        + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0])
}

/// Multiply a 3x3 matrix by a 3d vector.
#[inline]
pub fn mat33_mul_vec3(m: &[[f64; 3]; 3], v: &[f64; 3]) -> [f64; 3] {
    [
        dot_product3(&m[0], v),
        dot_product3(&m[1], v),
        dot_product3(&m[2], v),
    ]
}

/// Compute the singular value decomposition of a 3x3 matrix.
pub fn svd3(m: &[[f64; 3]; 3]) -> Svd3 {
    let mat = faer::Mat::<f64>::from_fn(3, 3, |i, j| m[i][j]);
    let svd = mat.svd();

    let (u_mat, v_mat, s_col) = (svd.u(), svd.v(), svd.s_diagonal());

    let mut u = [[0.0; 3]; 3];
    let mut v = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            u[i][j] = u_mat.read(i, j);
            v[i][j] = v_mat.read(i, j);
        }
    }

    Svd3 {
        u,
        s: [s_col.read(0), s_col.read(1), s_col.read(2)],
        v,
    }
}
