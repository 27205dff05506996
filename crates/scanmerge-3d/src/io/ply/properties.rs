use bincode::{Decode, Encode};

use super::PlyError;
use crate::pointcloud::Point;

/// Size in bytes of one encoded [`XyzRgbRecord`]: three `f32` and three `u8`.
pub const XYZ_RGB_RECORD_SIZE: usize = 3 * 4 + 3;

/// Vertex property layout written and accepted by this module.
pub const XYZ_RGB_LAYOUT: [(&str, PlyDataType); 6] = [
    ("x", PlyDataType::Float32),
    ("y", PlyDataType::Float32),
    ("z", PlyDataType::Float32),
    ("red", PlyDataType::UInt8),
    ("green", PlyDataType::UInt8),
    ("blue", PlyDataType::UInt8),
];

/// Scalar types that may appear in a PLY `property` line.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum PlyDataType {
    /// `float` / `float32`
    Float32,
    /// `double` / `float64`
    Float64,
    /// `char` / `int8`
    Int8,
    /// `uchar` / `uint8`
    UInt8,
    /// `short` / `int16`
    Int16,
    /// `ushort` / `uint16`
    UInt16,
    /// `int` / `int32`
    Int32,
    /// `uint` / `uint32`
    UInt32,
}

impl PlyDataType {
    /// Parse the type name used in a PLY header.
    pub fn parse(type_str: &str) -> Result<Self, PlyError> {
        match type_str {
            "float" | "float32" => Ok(PlyDataType::Float32),
            "double" | "float64" => Ok(PlyDataType::Float64),
            "char" | "int8" => Ok(PlyDataType::Int8),
            "uchar" | "uint8" => Ok(PlyDataType::UInt8),
            "short" | "int16" => Ok(PlyDataType::Int16),
            "ushort" | "uint16" => Ok(PlyDataType::UInt16),
            "int" | "int32" => Ok(PlyDataType::Int32),
            "uint" | "uint32" => Ok(PlyDataType::UInt32),
            _ => Err(PlyError::UnsupportedProperty(format!(
                "unknown data type `{type_str}`"
            ))),
        }
    }

    /// The name written to PLY headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlyDataType::Float32 => "float",
            PlyDataType::Float64 => "double",
            PlyDataType::Int8 => "char",
            PlyDataType::UInt8 => "uchar",
            PlyDataType::Int16 => "short",
            PlyDataType::UInt16 => "ushort",
            PlyDataType::Int32 => "int",
            PlyDataType::UInt32 => "uint",
        }
    }
}

/// A `property <type> <name>` line of the vertex element.
#[derive(Debug, PartialEq, Clone)]
pub struct PlyPropertyDefinition {
    /// Property name, e.g. `x` or `red`.
    pub name: String,
    /// Scalar type of the property.
    pub data_type: PlyDataType,
}

/// Check that the vertex properties are exactly [`XYZ_RGB_LAYOUT`].
pub(crate) fn validate_layout(properties: &[PlyPropertyDefinition]) -> Result<(), PlyError> {
    let matches = properties.len() == XYZ_RGB_LAYOUT.len()
        && properties
            .iter()
            .zip(XYZ_RGB_LAYOUT.iter())
            .all(|(p, (name, data_type))| p.name == *name && p.data_type == *data_type);

    if matches {
        Ok(())
    } else {
        let found = properties
            .iter()
            .map(|p| format!("{} {}", p.data_type.as_str(), p.name))
            .collect::<Vec<_>>()
            .join(", ");
        Err(PlyError::UnsupportedProperty(format!(
            "expected float x/y/z and uchar red/green/blue, found [{found}]"
        )))
    }
}

/// One binary vertex record.
#[derive(Debug, Clone, Copy, PartialEq, Encode, Decode)]
pub struct XyzRgbRecord {
    /// x coordinate
    pub x: f32,
    /// y coordinate
    pub y: f32,
    /// z coordinate
    pub z: f32,
    /// red channel
    pub red: u8,
    /// green channel
    pub green: u8,
    /// blue channel
    pub blue: u8,
}

impl From<Point> for XyzRgbRecord {
    fn from(point: Point) -> Self {
        let [x, y, z] = point.position;
        let [red, green, blue] = point.color;
        Self {
            x: x as f32,
            y: y as f32,
            z: z as f32,
            red,
            green,
            blue,
        }
    }
}

impl From<XyzRgbRecord> for Point {
    fn from(record: XyzRgbRecord) -> Self {
        Point::new(
            [record.x as f64, record.y as f64, record.z as f64],
            [record.red, record.green, record.blue],
        )
    }
}

/// The bincode configuration matching the PLY binary body layout.
pub(crate) fn record_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_parsing() {
        assert_eq!(PlyDataType::parse("float").unwrap(), PlyDataType::Float32);
        assert_eq!(PlyDataType::parse("uchar").unwrap(), PlyDataType::UInt8);
        assert_eq!(PlyDataType::parse("double").unwrap(), PlyDataType::Float64);
        assert!(PlyDataType::parse("invalid").is_err());
    }

    #[test]
    fn test_record_is_fifteen_little_endian_bytes() {
        let record = XyzRgbRecord {
            x: 1.0,
            y: -2.5,
            z: 0.125,
            red: 255,
            green: 128,
            blue: 0,
        };
        let bytes = bincode::encode_to_vec(record, record_config()).unwrap();
        assert_eq!(bytes.len(), XYZ_RGB_RECORD_SIZE);
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &(-2.5f32).to_le_bytes());
        assert_eq!(&bytes[8..12], &0.125f32.to_le_bytes());
        assert_eq!(&bytes[12..], &[255, 128, 0]);

        let (decoded, read): (XyzRgbRecord, usize) =
            bincode::decode_from_slice(&bytes, record_config()).unwrap();
        assert_eq!(read, XYZ_RGB_RECORD_SIZE);
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_validate_layout() {
        let good = XYZ_RGB_LAYOUT
            .iter()
            .map(|(name, data_type)| PlyPropertyDefinition {
                name: name.to_string(),
                data_type: *data_type,
            })
            .collect::<Vec<_>>();
        assert!(validate_layout(&good).is_ok());

        let mut with_alpha = good.clone();
        with_alpha.push(PlyPropertyDefinition {
            name: "alpha".to_string(),
            data_type: PlyDataType::UInt8,
        });
        assert!(validate_layout(&with_alpha).is_err());

        let mut doubles = good;
        doubles[0].data_type = PlyDataType::Float64;
        assert!(validate_layout(&doubles).is_err());
    }
}
