use scanmerge_3d::{
    linalg::{determinant33, mat33_mul_vec3, matmul33, transpose33},
    utils::faer_mat_to_array33,
    RigidTransform,
};

use crate::{correspondence::Correspondence, IcpError};

/// Estimate the rigid transform that best maps matched source points onto
/// their target points in the least-squares sense.
///
/// Closed-form Kabsch solution: the rotation comes from the SVD of the
/// cross-covariance of the centered point pairs, with the third column of `V`
/// negated when the solution is a reflection. The returned rotation always
/// has determinant +1.
///
/// # Arguments
///
/// * `correspondences` - Index pairs into `source` and `target`.
/// * `source` - The source points.
/// * `target` - The target points.
///
/// # Errors
///
/// [`IcpError::EmptyCorrespondences`] if there is nothing to fit, and
/// [`IcpError::IndexOutOfBounds`] if a pair refers outside either cloud.
pub fn estimate_rigid_transform(
    correspondences: &[Correspondence],
    source: &[[f64; 3]],
    target: &[[f64; 3]],
) -> Result<RigidTransform, IcpError> {
    if correspondences.is_empty() {
        return Err(IcpError::EmptyCorrespondences);
    }

    if let Some(c) = correspondences
        .iter()
        .find(|c| c.source_index >= source.len() || c.target_index >= target.len())
    {
        return Err(IcpError::IndexOutOfBounds {
            source_index: c.source_index,
            target_index: c.target_index,
            source_len: source.len(),
            target_len: target.len(),
        });
    }

    let (source_centroid, target_centroid) = compute_centroids(correspondences, source, target);

    // H = sum (s - cs) (t - ct)^T
    let mut h = [[0.0; 3]; 3];
    for c in correspondences {
        let s = source[c.source_index];
        let t = target[c.target_index];
        let ds = [
            s[0] - source_centroid[0],
            s[1] - source_centroid[1],
            s[2] - source_centroid[2],
        ];
        let dt = [
            t[0] - target_centroid[0],
            t[1] - target_centroid[1],
            t[2] - target_centroid[2],
        ];
        for (i, row) in h.iter_mut().enumerate() {
            for (j, val) in row.iter_mut().enumerate() {
                *val += ds[i] * dt[j];
            }
        }
    }

    let h = faer::Mat::<f64>::from_fn(3, 3, |i, j| h[i][j]);
    let svd = h.svd();
    let u = faer_mat_to_array33(svd.u());
    let mut v = faer_mat_to_array33(svd.v());

    // R = V * U^T
    let ut = transpose33(&u);
    let mut rotation = [[0.0; 3]; 3];
    matmul33(&v, &ut, &mut rotation);

    if determinant33(&rotation) < 0.0 {
        for row in v.iter_mut() {
            row[2] = -row[2];
        }
        matmul33(&v, &ut, &mut rotation);
    }

    let rotated = mat33_mul_vec3(&rotation, &source_centroid);
    let translation = [
        target_centroid[0] - rotated[0],
        target_centroid[1] - rotated[1],
        target_centroid[2] - rotated[2],
    ];

    Ok(RigidTransform::new(rotation, translation))
}

/// Centroids of the matched source and target points.
pub(crate) fn compute_centroids(
    correspondences: &[Correspondence],
    source: &[[f64; 3]],
    target: &[[f64; 3]],
) -> ([f64; 3], [f64; 3]) {
    let mut source_centroid = [0.0; 3];
    let mut target_centroid = [0.0; 3];

    for c in correspondences {
        let s = source[c.source_index];
        let t = target[c.target_index];
        for i in 0..3 {
            source_centroid[i] += s[i];
            target_centroid[i] += t[i];
        }
    }

    let n = correspondences.len() as f64;
    for i in 0..3 {
        source_centroid[i] /= n;
        target_centroid[i] /= n;
    }

    (source_centroid, target_centroid)
}
