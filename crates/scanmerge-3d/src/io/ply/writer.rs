use std::io::Write;
use std::path::Path;

use super::{properties::record_config, PlyError, XyzRgbRecord, XYZ_RGB_LAYOUT};
use crate::pointcloud::PointCloud;

/// Write a colored point cloud as a binary PLY stream into any writer.
pub fn write_ply_to<W: Write>(writer: &mut W, cloud: &PointCloud) -> Result<(), PlyError> {
    let mut header = String::from("ply\nformat binary_little_endian 1.0\n");
    header.push_str(&format!("element vertex {}\n", cloud.len()));
    for (name, data_type) in XYZ_RGB_LAYOUT.iter() {
        header.push_str(&format!("property {} {}\n", data_type.as_str(), name));
    }
    header.push_str("end_header\n");
    writer.write_all(header.as_bytes())?;

    for point in cloud.iter() {
        let record = XyzRgbRecord::from(point);
        bincode::encode_into_std_write(record, &mut *writer, record_config())?;
    }

    writer.flush()?;
    Ok(())
}

/// Write a colored point cloud to a binary little-endian PLY file.
///
/// An existing file at `path` is overwritten. Positions are narrowed to `f32`.
pub fn write_ply(path: impl AsRef<Path>, cloud: &PointCloud) -> Result<(), PlyError> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    write_ply_to(&mut writer, cloud)
}
