use std::io::{BufRead, Read};
use std::path::Path;

use super::{
    properties::{record_config, validate_layout, PlyDataType, PlyPropertyDefinition},
    PlyError, XyzRgbRecord, XYZ_RGB_RECORD_SIZE,
};
use crate::pointcloud::PointCloud;

// cap on the upfront allocation, a bogus header must not reserve gigabytes
const MAX_PREALLOCATED_VERTICES: usize = 1 << 22;

struct PlyHeader {
    pub vertex_count: usize,
    pub properties: Vec<PlyPropertyDefinition>,
}

fn parse_header<R: BufRead>(reader: &mut R) -> Result<PlyHeader, PlyError> {
    let mut line = String::new();
    let mut vertex_count = None;
    let mut format = None;
    let mut properties = Vec::new();
    let mut in_vertex_element = false;

    // the first line must be the magic
    if reader.read_line(&mut line)? == 0 || line.trim() != "ply" {
        return Err(PlyError::MissingMagic);
    }

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(PlyError::UnterminatedHeader);
        }
        let trimmed = line.trim();

        if trimmed == "end_header" {
            break;
        }

        let mut parts = trimmed.split_whitespace();
        match parts.next() {
            Some("format") => {
                format = Some(parts.collect::<Vec<_>>().join(" "));
            }
            Some("element") => {
                in_vertex_element = parts.next() == Some("vertex");
                if in_vertex_element {
                    let count = parts
                        .next()
                        .and_then(|s| s.parse::<usize>().ok())
                        .ok_or(PlyError::MissingVertexCount)?;
                    vertex_count = Some(count);
                }
            }
            Some("property") if in_vertex_element => {
                let parts = parts.collect::<Vec<_>>();
                match parts.as_slice() {
                    [data_type, name] => properties.push(PlyPropertyDefinition {
                        name: name.to_string(),
                        data_type: PlyDataType::parse(data_type)?,
                    }),
                    _ => {
                        return Err(PlyError::UnsupportedProperty(format!(
                            "unsupported property line `{trimmed}`"
                        )))
                    }
                }
            }
            // comments, obj_info, blank lines and properties of other elements
            _ => {}
        }
    }

    match format.as_deref() {
        Some("binary_little_endian 1.0") => {}
        Some(other) => return Err(PlyError::UnsupportedFormat(other.to_string())),
        None => return Err(PlyError::UnsupportedFormat("<missing>".to_string())),
    }

    let vertex_count = vertex_count.ok_or(PlyError::MissingVertexCount)?;
    validate_layout(&properties)?;

    Ok(PlyHeader {
        vertex_count,
        properties,
    })
}

fn read_body<R: Read>(reader: &mut R, vertex_count: usize) -> Result<PointCloud, PlyError> {
    let mut buffer = [0u8; XYZ_RGB_RECORD_SIZE];
    let mut cloud = PointCloud::with_capacity(vertex_count.min(MAX_PREALLOCATED_VERTICES));

    for read in 0..vertex_count {
        if let Err(err) = reader.read_exact(&mut buffer) {
            return Err(match err.kind() {
                std::io::ErrorKind::UnexpectedEof => PlyError::Truncated {
                    expected: vertex_count,
                    read,
                },
                _ => PlyError::Io(err),
            });
        }
        let (record, _): (XyzRgbRecord, usize) =
            bincode::decode_from_slice(&buffer, record_config())?;
        cloud.push(record.into());
    }

    Ok(cloud)
}

/// Read a colored point cloud from any reader holding a binary PLY stream.
pub fn read_ply_from<R: BufRead>(reader: &mut R) -> Result<PointCloud, PlyError> {
    let header = parse_header(reader)?;
    log::trace!(
        "PLY header: {} vertices, {} properties",
        header.vertex_count,
        header.properties.len()
    );
    read_body(reader, header.vertex_count)
}

/// Read a binary little-endian PLY file with `x y z red green blue` vertices.
///
/// Exactly the number of vertices declared in the header is read; trailing
/// bytes are ignored.
///
/// # Errors
///
/// Fails if the file cannot be opened, the header is malformed or declares a
/// different vertex layout, or the body is shorter than declared.
pub fn read_ply(path: impl AsRef<Path>) -> Result<PointCloud, PlyError> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    read_ply_from(&mut reader)
}

/// Read a PLY file, returning an empty cloud if it cannot be read.
///
/// The failure is reported through the `log` facade.
pub fn load_ply(path: impl AsRef<Path>) -> PointCloud {
    let path = path.as_ref();
    match read_ply(path) {
        Ok(cloud) => {
            log::debug!("Loaded {} with {} points", path.display(), cloud.len());
            cloud
        }
        Err(err) => {
            log::warn!("Failed to load {}: {}", path.display(), err);
            PointCloud::default()
        }
    }
}
