use scanmerge_3d::PointCloud;

/// Coarse frame-to-frame motion: the offset that moves the centroid of
/// `current` onto the centroid of `previous`.
///
/// Much cheaper than full ICP and blind to rotation. Returns `None` if either
/// cloud is empty.
///
/// Example:
///
/// ```
/// use scanmerge_3d::PointCloud;
/// use scanmerge_fusion::fast_align;
///
/// let previous = PointCloud::from_points(vec![[1.0, 0.0, 0.0], [3.0, 0.0, 0.0]]);
/// let current = PointCloud::from_points(vec![[0.0, 1.0, 0.0]]);
/// assert_eq!(fast_align(&current, &previous), Some([2.0, -1.0, 0.0]));
/// ```
pub fn fast_align(current: &PointCloud, previous: &PointCloud) -> Option<[f64; 3]> {
    let c = current.centroid()?;
    let p = previous.centroid()?;
    Some([p[0] - c[0], p[1] - c[1], p[2] - c[2]])
}

/// Euclidean norm of an offset.
pub fn offset_norm(offset: &[f64; 3]) -> f64 {
    (offset[0] * offset[0] + offset[1] * offset[1] + offset[2] * offset[2]).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use scanmerge_3d::RigidTransform;

    #[test]
    fn test_translation_is_recovered() {
        let previous = PointCloud::from_points(vec![
            [0.0, 0.0, 1.0],
            [0.2, 0.1, 1.1],
            [-0.3, 0.4, 0.9],
        ]);
        let current = previous.transformed(&RigidTransform::from_translation([0.05, -0.1, 0.02]));

        let offset = fast_align(&current, &previous).unwrap();
        assert_relative_eq!(offset[0], -0.05, epsilon = 1e-12);
        assert_relative_eq!(offset[1], 0.1, epsilon = 1e-12);
        assert_relative_eq!(offset[2], -0.02, epsilon = 1e-12);
        assert_relative_eq!(offset_norm(&offset), 0.0129f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_empty_clouds() {
        let cloud = PointCloud::from_points(vec![[1.0, 2.0, 3.0]]);
        let empty = PointCloud::default();
        assert_eq!(fast_align(&empty, &cloud), None);
        assert_eq!(fast_align(&cloud, &empty), None);
    }
}
