use crate::linalg;

/// Error types for the transforms module.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TransformError {
    /// The rotation axis has (close to) zero length.
    #[error("Cannot compute a rotation matrix from a zero vector")]
    ZeroAxis,
}

/// Compute the rotation matrix from an axis and angle.
///
/// # Arguments
///
/// * `axis` - The axis of rotation. It does not need to be normalized.
/// * `angle` - The angle of rotation in radians.
///
/// # Returns
///
/// The rotation matrix.
///
/// Example:
///
/// ```
/// use scanmerge_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let axis = [1.0, 0.0, 0.0];
/// let angle = std::f64::consts::PI / 2.0;
/// let rotation = axis_angle_to_rotation_matrix(&axis, angle).unwrap();
/// assert!((rotation[1][2] + 1.0).abs() < 1e-12);
/// ```
pub fn axis_angle_to_rotation_matrix(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], TransformError> {
    // normalize the vector
    let magnitude = linalg::dot_product3(axis, axis).sqrt();
    if magnitude < 1e-10 {
        return Err(TransformError::ZeroAxis);
    }
    let [x, y, z] = [axis[0] / magnitude, axis[1] / magnitude, axis[2] / magnitude];

    let c = angle.cos();
    let s = angle.sin();
    let t = 1.0 - c;

    Ok([
        [c + x * x * t, x * y * t - z * s, x * z * t + y * s],
        [x * y * t + z * s, c + y * y * t, y * z * t - x * s],
        [x * z * t - y * s, y * z * t + x * s, c + z * z * t],
    ])
}

/// A proper rigid motion: rotation followed by translation.
///
/// A point `p` maps to `rotation * p + translation`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RigidTransform {
    /// Row-major 3x3 rotation matrix.
    pub rotation: [[f64; 3]; 3],
    /// Translation vector.
    pub translation: [f64; 3],
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// Create a transform from a rotation matrix and a translation vector.
    pub fn new(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The neutral element of composition.
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }

    /// A pure translation.
    pub fn from_translation(translation: [f64; 3]) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    /// A rotation of `angle` radians about `axis`, followed by `translation`.
    pub fn from_axis_angle(
        axis: &[f64; 3],
        angle: f64,
        translation: [f64; 3],
    ) -> Result<Self, TransformError> {
        Ok(Self {
            rotation: axis_angle_to_rotation_matrix(axis, angle)?,
            translation,
        })
    }

    /// Apply the transform to a single point.
    #[inline]
    pub fn apply(&self, point: &[f64; 3]) -> [f64; 3] {
        linalg::transform_point(point, &self.rotation, &self.translation)
    }

    /// Compose two transforms as `self * other`: `other` is applied first.
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        let mut rotation = [[0.0; 3]; 3];
        linalg::matmul33(&self.rotation, &other.rotation, &mut rotation);
        RigidTransform {
            rotation,
            translation: self.apply(&other.translation),
        }
    }

    /// The inverse motion, `R^T` and `-R^T t`.
    pub fn inverse(&self) -> RigidTransform {
        let rotation = linalg::transpose33(&self.rotation);
        let t = linalg::mat33_mul_vec3(&rotation, &self.translation);
        RigidTransform {
            rotation,
            translation: [-t[0], -t[1], -t[2]],
        }
    }

    /// Determinant of the rotation block; +1 for a proper rotation.
    pub fn determinant(&self) -> f64 {
        linalg::determinant33(&self.rotation)
    }

    /// Rotation angle in radians, recovered from the trace.
    pub fn rotation_angle(&self) -> f64 {
        let trace = self.rotation[0][0] + self.rotation[1][1] + self.rotation[2][2];
        ((trace - 1.0) / 2.0).clamp(-1.0, 1.0).acos()
    }

    /// Length of the translation vector.
    pub fn translation_norm(&self) -> f64 {
        linalg::dot_product3(&self.translation, &self.translation).sqrt()
    }

    /// Homogeneous 4x4 row-major representation.
    pub fn to_matrix4(&self) -> [[f64; 4]; 4] {
        let r = &self.rotation;
        let t = &self.translation;
        [
            [r[0][0], r[0][1], r[0][2], t[0]],
            [r[1][0], r[1][1], r[1][2], t[1]],
            [r[2][0], r[2][1], r[2][2], t[2]],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }
}
