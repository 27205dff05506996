/// Utility function to convert a row-major 3x3 array to a faer matrix.
///
/// # Arguments
///
/// * `array` - A 3x3 array, indexed as `array[row][col]`.
///
/// # Returns
///
/// A faer matrix 3x3.
pub fn array33_to_faer_mat(array: &[[f64; 3]; 3]) -> faer::Mat<f64> {
    faer::Mat::<f64>::from_fn(3, 3, |i, j| array[i][j])
}

/// Utility function to convert a faer 3x3 matrix back to a row-major array.
pub fn faer_mat_to_array33(mat: faer::MatRef<'_, f64>) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = mat.read(i, j);
        }
    }
    out
}

/// Utility function to lay out a set of points as a 3xN faer matrix.
///
/// Each column holds one point.
pub fn points_to_faer_mat(points: &[[f64; 3]]) -> faer::Mat<f64> {
    faer::Mat::<f64>::from_fn(3, points.len(), |i, j| points[j][i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array33_to_mat33() {
        let array = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let mat = array33_to_faer_mat(&array);
        assert_eq!(mat.read(0, 0), 1.0);
        assert_eq!(mat.read(0, 2), 3.0);
        assert_eq!(mat.read(1, 0), 4.0);
        assert_eq!(mat.read(2, 1), 8.0);
        assert_eq!(faer_mat_to_array33(mat.as_ref()), array);
    }

    #[test]
    fn test_points_to_mat() {
        let points = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let mat = points_to_faer_mat(&points);
        assert_eq!(mat.nrows(), 3);
        assert_eq!(mat.ncols(), 2);
        assert_eq!(mat.read(0, 1), 4.0);
        assert_eq!(mat.read(2, 0), 3.0);
    }
}
