mod parser;
mod properties;
mod writer;

pub use parser::*;
pub use properties::*;
pub use writer::*;

/// Error types for the PLY module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PlyError {
    /// Failed to read or write the PLY file
    #[error("Failed to access PLY file. {0}")]
    Io(#[from] std::io::Error),

    /// Failed to decode a vertex record
    #[error("Failed to decode PLY vertex record. {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// Failed to encode a vertex record
    #[error("Failed to encode PLY vertex record. {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// The file does not start with the `ply` magic line
    #[error("Missing `ply` magic line")]
    MissingMagic,

    /// The header ended before an `end_header` line
    #[error("Unterminated PLY header")]
    UnterminatedHeader,

    /// Only `binary_little_endian 1.0` bodies are supported
    #[error("Unsupported PLY format: {0}")]
    UnsupportedFormat(String),

    /// The header does not declare an `element vertex <N>` line
    #[error("Missing or malformed `element vertex` declaration")]
    MissingVertexCount,

    /// The vertex properties are not `x y z red green blue` as float/uchar
    #[error("Unsupported PLY vertex layout: {0}")]
    UnsupportedProperty(String),

    /// The body holds fewer records than the header declares
    #[error("Truncated PLY body: expected {expected} vertices, read {read}")]
    Truncated {
        /// Vertex count declared in the header.
        expected: usize,
        /// Complete records actually read.
        read: usize,
    },
}
