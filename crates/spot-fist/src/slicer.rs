use spot_3d::pointcloud::{PointCloud, Scalar};

use crate::sampler::Direction;

/// The projection of one point on a slice direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Signed distance along the direction.
    pub value: f64,
    /// Index of the point in its cloud.
    pub index: usize,
}

/// Project every point of `cloud` on `direction`, sorted ascending.
///
/// Ties are broken by the point index so the order is total and
/// reproducible.
pub fn project<T: Scalar>(cloud: &PointCloud<T>, direction: &Direction) -> Vec<Projection> {
    let mut out = Vec::with_capacity(cloud.len());
    project_into(cloud, direction, &mut out);
    out
}

/// Same as [`project`] but reuses the allocation of `out`.
pub fn project_into<T: Scalar>(
    cloud: &PointCloud<T>,
    direction: &Direction,
    out: &mut Vec<Projection>,
) {
    let d = direction.as_array();
    out.clear();
    out.extend(cloud.iter_f64().enumerate().map(|(index, p)| Projection {
        value: p[0] * d[0] + p[1] * d[1] + p[2] * d[2],
        index,
    }));
    out.sort_unstable_by(|a, b| a.value.total_cmp(&b.value).then(a.index.cmp(&b.index)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_sorted() {
        let cloud = PointCloud::new(vec![
            [3.0, 9.0, 1.0],
            [-1.0, 0.0, 0.0],
            [2.0, -5.0, 7.0],
        ]);
        let direction = Direction::new([1.0, 0.0, 0.0]).unwrap();
        let proj = project(&cloud, &direction);

        let indices = proj.iter().map(|p| p.index).collect::<Vec<_>>();
        let values = proj.iter().map(|p| p.value).collect::<Vec<_>>();
        assert_eq!(indices, vec![1, 2, 0]);
        assert_eq!(values, vec![-1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_project_ties_by_index() {
        let cloud = PointCloud::new(vec![[1.0f32, 5.0, 0.0], [1.0, -5.0, 0.0], [0.0, 0.0, 0.0]]);
        let direction = Direction::new([1.0, 0.0, 0.0]).unwrap();
        let mut buffer = Vec::new();
        project_into(&cloud, &direction, &mut buffer);

        let indices = buffer.iter().map(|p| p.index).collect::<Vec<_>>();
        assert_eq!(indices, vec![2, 0, 1]);
    }

    #[test]
    fn test_project_empty() {
        let cloud = PointCloud::<f64>::new(vec![]);
        let direction = Direction::new([0.0, 1.0, 0.0]).unwrap();
        assert!(project(&cloud, &direction).is_empty());
    }
}
