use crate::pointcloud::PointCloud;

/// Error types for the point cloud operations.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum OpsError {
    /// The downsampling stride must be at least one.
    #[error("Invalid downsample stride: {0}. The stride must be positive")]
    InvalidStride(usize),
}

/// Utility function to compute the Euclidean distance between two points.
///
/// # Arguments
///
/// * `a` - A point in 3D space.
/// * `b` - Another point in 3D space.
///
/// # Returns
///
/// The Euclidean distance between the two points.
///
/// Example:
/// ```
/// use scanmerge_3d::ops::euclidean_distance;
///
/// let a = [1.0, 2.0, 3.0];
/// let b = [4.0, 5.0, 6.0];
/// let dst = euclidean_distance(&a, &b);
/// assert!((dst - 27f64.sqrt()).abs() < 1e-12);
/// ```
pub fn euclidean_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    squared_distance(a, b).sqrt()
}

/// Squared Euclidean distance between two points.
#[inline]
pub fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

/// Component-wise mean of a set of points, `None` if the set is empty.
pub fn centroid(points: &[[f64; 3]]) -> Option<[f64; 3]> {
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold([0.0; 3], |mut acc, p| {
        acc[0] += p[0];
        acc[1] += p[1];
        acc[2] += p[2];
        acc
    });
    let n = points.len() as f64;
    Some([sum[0] / n, sum[1] / n, sum[2] / n])
}

/// Keep every `stride`-th point of a cloud, starting with the first one.
///
/// The output holds the points at index `0, stride, 2 * stride, ...` in their
/// original order, i.e. `ceil(len / stride)` points.
///
/// # Errors
///
/// Returns [`OpsError::InvalidStride`] if `stride` is zero.
///
/// Example:
/// ```
/// use scanmerge_3d::{ops::downsample, pointcloud::PointCloud};
///
/// let cloud = PointCloud::from_points(vec![[0.0; 3]; 25]);
/// let reduced = downsample(&cloud, 10).unwrap();
/// assert_eq!(reduced.len(), 3);
/// ```
pub fn downsample(cloud: &PointCloud, stride: usize) -> Result<PointCloud, OpsError> {
    if stride == 0 {
        return Err(OpsError::InvalidStride(stride));
    }
    Ok(cloud.iter().step_by(stride).collect())
}
