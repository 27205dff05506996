#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod align;
pub use align::{fast_align, offset_norm};

mod error;
pub use error::FusionError;

/// Frame producers feeding the fusion loop.
pub mod source;

mod voxel_map;
pub use voxel_map::{VoxelFusionMap, VoxelKey};

mod worker;
pub use worker::{
    CancellationToken, FrameOutcome, FusionConfig, FusionStats, FusionTracker, FusionWorker,
};
