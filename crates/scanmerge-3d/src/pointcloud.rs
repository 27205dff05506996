use crate::{linalg, transforms::RigidTransform};

/// Error types for the point cloud container.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PointCloudError {
    /// The positions and colors vectors have different lengths.
    #[error("Mismatched point cloud buffers: {points} points and {colors} colors")]
    MismatchedLengths {
        /// Number of positions.
        points: usize,
        /// Number of colors.
        colors: usize,
    },
}

/// A single colored sample in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// The x, y, z coordinates.
    pub position: [f64; 3],
    /// The red, green, blue channels.
    pub color: [u8; 3],
}

impl Point {
    /// Create a new point from a position and a color.
    pub fn new(position: [f64; 3], color: [u8; 3]) -> Self {
        Self { position, color }
    }
}

/// An ordered collection of colored points.
///
/// Positions and colors are kept in two parallel buffers so that the geometric
/// routines can work on plain `[f64; 3]` slices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    // The positions of the points.
    points: Vec<[f64; 3]>,
    // The colors of the points.
    colors: Vec<[u8; 3]>,
}

impl PointCloud {
    /// Create a new point cloud from positions and their colors.
    ///
    /// Both buffers must have the same length.
    pub fn new(points: Vec<[f64; 3]>, colors: Vec<[u8; 3]>) -> Result<Self, PointCloudError> {
        if points.len() != colors.len() {
            return Err(PointCloudError::MismatchedLengths {
                points: points.len(),
                colors: colors.len(),
            });
        }
        Ok(Self { points, colors })
    }

    /// Create a point cloud from positions only, painting every point white.
    pub fn from_points(points: Vec<[f64; 3]>) -> Self {
        let colors = vec![[255, 255, 255]; points.len()];
        Self { points, colors }
    }

    /// Create an empty point cloud with room for `capacity` points.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
        }
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

    /// Get as reference the positions of the points.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get as reference the colors of the points.
    pub fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }

    /// Get the point stored at `index`.
    pub fn get(&self, index: usize) -> Option<Point> {
        let position = *self.points.get(index)?;
        let color = *self.colors.get(index)?;
        Some(Point { position, color })
    }

    /// Append a point at the end of the cloud.
    pub fn push(&mut self, point: Point) {
        self.points.push(point.position);
        self.colors.push(point.color);
    }

    /// Append all the points of `other`, preserving their order.
    pub fn append(&mut self, other: &PointCloud) {
        self.points.extend_from_slice(&other.points);
        self.colors.extend_from_slice(&other.colors);
    }

    /// Iterate over the points in insertion order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Point> + '_ {
        self.points
            .iter()
            .zip(self.colors.iter())
            .map(|(&position, &color)| Point { position, color })
    }

    /// Split the cloud back into its position and color buffers.
    pub fn into_parts(self) -> (Vec<[f64; 3]>, Vec<[u8; 3]>) {
        (self.points, self.colors)
    }

    /// Component-wise mean of the positions, `None` for an empty cloud.
    pub fn centroid(&self) -> Option<[f64; 3]> {
        crate::ops::centroid(&self.points)
    }

    /// Axis-aligned bounding box as `(min, max)`, `None` for an empty cloud.
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(mut lo, mut hi), p| {
            for i in 0..3 {
                lo[i] = lo[i].min(p[i]);
                hi[i] = hi[i].max(p[i]);
            }
            (lo, hi)
        }))
    }

    /// Return a copy of the cloud with `transform` applied to every position.
    ///
    /// Colors are carried over unchanged.
    pub fn transformed(&self, transform: &RigidTransform) -> PointCloud {
        let mut points = vec![[0.0; 3]; self.points.len()];
        linalg::transform_points(
            &self.points,
            &transform.rotation,
            &transform.translation,
            &mut points,
        );
        PointCloud {
            points,
            colors: self.colors.clone(),
        }
    }

    /// Apply `transform` to every position of this cloud.
    pub fn transform_in_place(&mut self, transform: &RigidTransform) {
        let mut points = vec![[0.0; 3]; self.points.len()];
        linalg::transform_points(
            &self.points,
            &transform.rotation,
            &transform.translation,
            &mut points,
        );
        self.points = points;
    }
}

impl FromIterator<Point> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        let mut cloud = PointCloud::default();
        cloud.extend(iter);
        cloud
    }
}

impl Extend<Point> for PointCloud {
    fn extend<I: IntoIterator<Item = Point>>(&mut self, iter: I) {
        for point in iter {
            self.push(point);
        }
    }
}
