use num_traits::Float;

use crate::rigid::RigidTransform;

/// Storage precision of the points of a [`PointCloud`].
///
/// All the geometry is computed in `f64`; the scalar only decides how points
/// are stored.
pub trait Scalar: Float + Copy + Send + Sync + std::fmt::Debug + 'static {
    /// Widen the value to `f64`.
    fn as_f64(self) -> f64;

    /// Build a value from an `f64`, rounding if needed.
    fn cast_from(value: f64) -> Self;
}

impl Scalar for f32 {
    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn cast_from(value: f64) -> Self {
        value as f32
    }
}

impl Scalar for f64 {
    #[inline]
    fn as_f64(self) -> f64 {
        self
    }

    #[inline]
    fn cast_from(value: f64) -> Self {
        value
    }
}

/// An ordered set of 3d points.
///
/// The number of points is fixed at construction and the index of a point is
/// its identity for the whole lifetime of the cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud<T: Scalar = f64> {
    // The points in the point cloud.
    points: Vec<[T; 3]>,
}

impl<T: Scalar> PointCloud<T> {
    /// Create a new point cloud from a list of points.
    pub fn new(points: Vec<[T; 3]>) -> Self {
        Self { points }
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[T; 3]] {
        &self.points
    }

    /// Get the point at `index` widened to `f64`.
    ///
    /// PRECONDITION: `index < self.len()`.
    #[inline]
    pub fn point_f64(&self, index: usize) -> [f64; 3] {
        let p = &self.points[index];
        [p[0].as_f64(), p[1].as_f64(), p[2].as_f64()]
    }

    /// Iterate over the points widened to `f64`.
    pub fn iter_f64(&self) -> impl Iterator<Item = [f64; 3]> + '_ {
        self.points
            .iter()
            .map(|p| [p[0].as_f64(), p[1].as_f64(), p[2].as_f64()])
    }

    /// Copy the points into a `f64` buffer.
    pub fn to_f64_points(&self) -> Vec<[f64; 3]> {
        self.iter_f64().collect()
    }

    /// Compute the centroid of the point cloud.
    ///
    /// Returns the origin for an empty cloud.
    pub fn centroid(&self) -> [f64; 3] {
        if self.points.is_empty() {
            return [0.0; 3];
        }
        let mut sum = [0.0; 3];
        for p in self.iter_f64() {
            sum[0] += p[0];
            sum[1] += p[1];
            sum[2] += p[2];
        }
        let n = self.points.len() as f64;
        [sum[0] / n, sum[1] / n, sum[2] / n]
    }

    /// Get the minimum bound of the point cloud.
    pub fn min_bound(&self) -> [f64; 3] {
        if self.points.is_empty() {
            return [0.0; 3];
        }
        self.iter_f64()
            .fold([f64::INFINITY; 3], |a, b| {
                [a[0].min(b[0]), a[1].min(b[1]), a[2].min(b[2])]
            })
    }

    /// Get the maximum bound of the point cloud.
    pub fn max_bound(&self) -> [f64; 3] {
        if self.points.is_empty() {
            return [0.0; 3];
        }
        self.iter_f64()
            .fold([f64::NEG_INFINITY; 3], |a, b| {
                [a[0].max(b[0]), a[1].max(b[1]), a[2].max(b[2])]
            })
    }

    /// Return a copy of the point cloud moved by `transform`.
    pub fn transformed(&self, transform: &RigidTransform) -> Self {
        let mut out = self.clone();
        out.transform_inplace(transform);
        out
    }

    /// Move every point of the cloud by `transform`.
    pub fn transform_inplace(&mut self, transform: &RigidTransform) {
        for p in self.points.iter_mut() {
            let q = transform.apply(&[p[0].as_f64(), p[1].as_f64(), p[2].as_f64()]);
            *p = [T::cast_from(q[0]), T::cast_from(q[1]), T::cast_from(q[2])];
        }
    }
}

impl<T: Scalar> From<Vec<[T; 3]>> for PointCloud<T> {
    fn from(points: Vec<[T; 3]>) -> Self {
        Self::new(points)
    }
}
