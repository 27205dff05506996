#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod correspondence;
pub use correspondence::{
    find_correspondences, Correspondence, CorrespondenceBackend, KdTreeSearch,
    EARLY_EXIT_SQUARED_DISTANCE,
};

mod estimate;
pub use estimate::estimate_rigid_transform;

mod icp;
pub use icp::{align, IcpConfig, IcpResult, IcpTermination};

/// Batch merging of a sequence of scans into one cloud.
pub mod pipeline;

/// Error types for the registration routines.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum IcpError {
    /// A rigid transform needs at least one correspondence.
    #[error("Cannot estimate a rigid transform from an empty correspondence set")]
    EmptyCorrespondences,

    /// A correspondence refers to a point outside its cloud.
    #[error(
        "Correspondence ({source_index}, {target_index}) is out of bounds for clouds of {source_len} and {target_len} points"
    )]
    IndexOutOfBounds {
        /// Offending source index.
        source_index: usize,
        /// Offending target index.
        target_index: usize,
        /// Source cloud size.
        source_len: usize,
        /// Target cloud size.
        target_len: usize,
    },

    /// The ICP parameters cannot be used.
    #[error("Invalid ICP configuration: {0}")]
    InvalidConfig(String),
}
