use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use scanmerge_3d::{Point, PointCloud};

use crate::FusionError;

/// Integer coordinates of the cubic cell holding a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoxelKey(pub i64, pub i64, pub i64);

impl VoxelKey {
    /// Floor-divide a position by the voxel edge length.
    pub fn from_position(position: &[f64; 3], voxel_size: f64) -> Self {
        Self(
            (position[0] / voxel_size).floor() as i64,
            (position[1] / voxel_size).floor() as i64,
            (position[2] / voxel_size).floor() as i64,
        )
    }
}

/// A thread-safe spatial hash keeping the last point written to each voxel.
///
/// Every operation takes the same map-wide lock, so a capture thread can
/// [`add`](Self::add) points while a display thread calls
/// [`export`](Self::export), [`size`](Self::size) or [`clear`](Self::clear).
///
/// Example:
///
/// ```
/// use scanmerge_3d::Point;
/// use scanmerge_fusion::VoxelFusionMap;
///
/// let map = VoxelFusionMap::new(0.03).unwrap();
/// map.add(Point::new([0.001, 0.0, 0.0], [255, 0, 0]));
/// map.add(Point::new([0.002, 0.0, 0.0], [0, 255, 0]));
/// assert_eq!(map.size(), 1);
/// assert_eq!(map.export().colors(), &[[0, 255, 0]]);
/// ```
#[derive(Debug)]
pub struct VoxelFusionMap {
    voxel_size: f64,
    voxels: Mutex<HashMap<VoxelKey, Point>>,
}

impl VoxelFusionMap {
    /// Create an empty map with cubic cells of edge `voxel_size` meters.
    ///
    /// # Errors
    ///
    /// [`FusionError::InvalidVoxelSize`] unless `voxel_size` is positive and finite.
    pub fn new(voxel_size: f64) -> Result<Self, FusionError> {
        if !(voxel_size.is_finite() && voxel_size > 0.0) {
            return Err(FusionError::InvalidVoxelSize(voxel_size));
        }
        Ok(Self {
            voxel_size,
            voxels: Mutex::new(HashMap::new()),
        })
    }

    /// The voxel edge length in meters.
    pub fn voxel_size(&self) -> f64 {
        self.voxel_size
    }

    /// The cell a point falls into.
    pub fn key_of(&self, point: &Point) -> VoxelKey {
        VoxelKey::from_position(&point.position, self.voxel_size)
    }

    // a panicking holder cannot leave the table half-updated
    fn lock(&self) -> MutexGuard<'_, HashMap<VoxelKey, Point>> {
        self.voxels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a point, replacing whatever occupied its voxel.
    pub fn add(&self, point: Point) {
        let key = self.key_of(&point);
        self.lock().insert(key, point);
    }

    /// Insert every point of a cloud under a single lock acquisition.
    ///
    /// Later points overwrite earlier ones sharing a voxel.
    pub fn extend(&self, cloud: &PointCloud) {
        let keyed = cloud
            .iter()
            .map(|p| (self.key_of(&p), p))
            .collect::<Vec<_>>();
        self.lock().extend(keyed);
    }

    /// Copy the current contents into a new cloud, in no particular order.
    pub fn export(&self) -> PointCloud {
        self.lock().values().copied().collect()
    }

    /// Number of occupied voxels.
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// Whether no voxel is occupied.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove every point.
    pub fn clear(&self) {
        self.lock().clear();
    }
}
