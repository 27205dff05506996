use crate::utils;

/// Transform a set of points using a rotation and translation.
///
/// # Arguments
///
/// * `src_points` - A set of points to be transformed.
/// * `dst_r_src` - A rotation matrix.
/// * `dst_t_src` - A translation vector.
/// * `dst_points` - A pre-allocated vector to store the transformed points.
///
/// PRECONDITION: dst_points is a pre-allocated vector of the same size as source.
///
/// Example:
///
/// ```
/// use scanmerge_3d::linalg::transform_points;
///
/// let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
/// let rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
/// let translation = [0.0, 0.0, 0.0];
/// let mut dst_points = vec![[0.0; 3]; src_points.len()];
/// transform_points(&src_points, &rotation, &translation, &mut dst_points);
/// assert_eq!(dst_points, src_points);
/// ```
pub fn transform_points(
    src_points: &[[f64; 3]],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
    dst_points: &mut [[f64; 3]],
) {
    assert_eq!(src_points.len(), dst_points.len());

    if src_points.is_empty() {
        return;
    }

    let dst_r_src_mat = utils::array33_to_faer_mat(dst_r_src);

    // 3xN matrix, one point per column
    let points_in_src = utils::points_to_faer_mat(src_points);

    let points_in_dst = &dst_r_src_mat * &points_in_src;

    for (j, dst) in dst_points.iter_mut().enumerate() {
        for (i, val) in dst.iter_mut().enumerate() {
            *val = points_in_dst.read(i, j) + dst_t_src[i];
        }
    }
}

/// Apply a rotation and translation to a single point.
#[inline]
pub fn transform_point(
    point: &[f64; 3],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
) -> [f64; 3] {
    let rotated = mat33_mul_vec3(dst_r_src, point);
    [
        rotated[0] + dst_t_src[0],
        rotated[1] + dst_t_src[1],
        rotated[2] + dst_t_src[2],
    ]
}

/// Dot product of two 3-vectors.
#[inline]
pub fn dot_product3(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Multiply two 3x3 matrices, `m = a * b`.
pub fn matmul33(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3], m: &mut [[f64; 3]; 3]) {
    for (i, row) in m.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
}

/// Multiply a 3x3 matrix by a 3-vector.
#[inline]
pub fn mat33_mul_vec3(m: &[[f64; 3]; 3], v: &[f64; 3]) -> [f64; 3] {
    [
        dot_product3(&m[0], v),
        dot_product3(&m[1], v),
        dot_product3(&m[2], v),
    ]
}

/// Transpose of a 3x3 matrix.
pub fn transpose33(m: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    [
        [m[0][0], m[1][0], m[2][0]],
        [m[0][1], m[1][1], m[2][1]],
        [m[0][2], m[1][2], m[2][2]],
    ]
}

/// Determinant of a 3x3 matrix.
pub fn determinant33(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}
