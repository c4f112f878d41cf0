use spot_3d::linalg::{det_mat33, mat33_mul_vec3, matmul33, svd3, transpose33};
use spot_3d::rigid::RigidTransform;

/// Error types for the rigid fit.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RigidFitError {
    /// The input buffers have different lengths.
    #[error("Mismatched lengths: source ({0}), targets ({1}), weights ({2})")]
    MismatchedLengths(usize, usize, usize),

    /// Not enough well spread weighted points to fix a rotation.
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),
}

// relative threshold on the second singular value of the cross-covariance
const RANK_TOLERANCE: f64 = 1e-9;

fn weighted_centroid(points: &[[f64; 3]], weights: &[f64], total: f64) -> [f64; 3] {
    let mut c = [0.0; 3];
    for (p, &w) in points.iter().zip(weights.iter()) {
        if w <= 0.0 {
            continue;
        }
        c[0] += w * p[0];
        c[1] += w * p[1];
        c[2] += w * p[2];
    }
    [c[0] / total, c[1] / total, c[2] / total]
}

/// Fit the transform that moves `source` onto `targets` in the weighted
/// least-squares sense.
///
/// Implements the weighted Kabsch algorithm: with `H = Σ wᵢ (sᵢ - c_s)(tᵢ - c_t)ᵀ = U Σ Vᵀ`
/// the rotation is `R = V diag(1, 1, det(V Uᵀ)) Uᵀ`, which is never a reflection,
/// and `t = c_t - s R c_s`. When `estimate_scale` is set the isotropic scale `s`
/// is estimated as in Umeyama's method, otherwise it is `1`.
///
/// # Errors
///
/// * [`RigidFitError::MismatchedLengths`] when the three slices differ in length.
/// * [`RigidFitError::DegenerateInput`] with fewer than 3 positively weighted
///   points or when the points are collinear (rank of `H` below 2).
pub fn fit_transformation(
    source: &[[f64; 3]],
    targets: &[[f64; 3]],
    weights: &[f64],
    estimate_scale: bool,
) -> Result<RigidTransform, RigidFitError> {
    if source.len() != targets.len() || source.len() != weights.len() {
        return Err(RigidFitError::MismatchedLengths(
            source.len(),
            targets.len(),
            weights.len(),
        ));
    }

    let num_weighted = weights.iter().filter(|&&w| w > 0.0).count();
    if num_weighted < 3 {
        return Err(RigidFitError::DegenerateInput(format!(
            "{num_weighted} weighted points, at least 3 are needed"
        )));
    }
    let total: f64 = weights.iter().filter(|&&w| w > 0.0).sum();

    let c_s = weighted_centroid(source, weights, total);
    let c_t = weighted_centroid(targets, weights, total);

    // H = Σ wᵢ (sᵢ - c_s)(tᵢ - c_t)ᵀ
    let mut h = [[0.0; 3]; 3];
    let mut source_spread = 0.0;
    for ((s, t), &w) in source.iter().zip(targets.iter()).zip(weights.iter()) {
        if w <= 0.0 {
            continue;
        }
        let ds = [s[0] - c_s[0], s[1] - c_s[1], s[2] - c_s[2]];
        let dt = [t[0] - c_t[0], t[1] - c_t[1], t[2] - c_t[2]];
        for i in 0..3 {
            for j in 0..3 {
                h[i][j] += w * ds[i] * dt[j];
            }
        }
        source_spread += w * (ds[0] * ds[0] + ds[1] * ds[1] + ds[2] * ds[2]);
    }

    let svd = svd3(&h);
    let [s0, s1, s2] = svd.s;
    if !s0.is_finite() || s1 <= RANK_TOLERANCE * s0 {
        return Err(RigidFitError::DegenerateInput(format!(
            "rank deficient cross-covariance, singular values {s0:e} {s1:e} {s2:e}"
        )));
    }

    let ut = transpose33(&svd.u);
    let mut vut = [[0.0; 3]; 3];
    matmul33(&svd.v, &ut, &mut vut);
    let d = if det_mat33(&vut) < 0.0 { -1.0 } else { 1.0 };

    // R = V * diag(1, 1, d) * U^T
    let mut vd = svd.v;
    for row in vd.iter_mut() {
        row[2] *= d;
    }
    let mut rotation = [[0.0; 3]; 3];
    matmul33(&vd, &ut, &mut rotation);

    let scale = if estimate_scale {
        (s0 + s1 + d * s2) / source_spread
    } else {
        1.0
    };

    let rc_s = mat33_mul_vec3(&rotation, &c_s);
    let translation = [
        c_t[0] - scale * rc_s[0],
        c_t[1] - scale * rc_s[1],
        c_t[2] - scale * rc_s[2],
    ];

    Ok(RigidTransform::with_scale(rotation, translation, scale))
}
