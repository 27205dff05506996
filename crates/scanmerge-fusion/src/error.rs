use scanmerge_3d::ops::OpsError;
use scanmerge_icp::IcpError;

/// Error types for the fusion crate.
#[derive(Debug, thiserror::Error)]
pub enum FusionError {
    /// The voxel edge length must be positive and finite.
    #[error("Invalid voxel size: {0}. The size must be positive and finite")]
    InvalidVoxelSize(f64),

    /// A fusion parameter is out of range.
    #[error("Invalid fusion configuration: {0}")]
    InvalidConfig(String),

    /// The worker thread could not be started.
    #[error("Failed to spawn the fusion worker")]
    Spawn(#[from] std::io::Error),

    /// The worker thread panicked.
    #[error("The fusion worker panicked")]
    WorkerPanicked,

    /// Re-registration failed.
    #[error(transparent)]
    Icp(#[from] IcpError),

    /// Invalid downsampling stride.
    #[error(transparent)]
    Downsample(#[from] OpsError),
}
