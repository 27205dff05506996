use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use scanmerge_3d::{ops::downsample, PointCloud, RigidTransform};
use scanmerge_icp::{align, IcpConfig, IcpTermination};

use crate::{
    align::{fast_align, offset_norm},
    source::{FrameGrab, FrameSource},
    FusionError, VoxelFusionMap,
};

/// Parameters of the live fusion loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Voxel edge length of the map, in meters.
    #[serde(default = "default_voxel_size")]
    pub voxel_size: f64,

    /// Process every n-th received frame.
    #[serde(default = "default_frame_decimation")]
    pub frame_decimation: usize,

    /// Frame-to-frame offsets at least this long are rejected, in meters.
    #[serde(default = "default_max_offset")]
    pub max_offset: f64,

    /// How long a single poll of the frame source may block.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Track motion with the centroid offset. When off, frames are fused
    /// with the current pose unchanged.
    #[serde(default = "default_fast_align")]
    pub fast_align: bool,

    /// Run full ICP against the map after this many consecutive rejections.
    #[serde(default = "default_reregister_after")]
    pub reregister_after: Option<usize>,

    /// ICP parameters used for re-registration.
    #[serde(default)]
    pub reregister_icp: IcpConfig,

    /// Stride used to thin the frame and the map before re-registration.
    #[serde(default = "default_reregister_stride")]
    pub reregister_stride: usize,
}

fn default_voxel_size() -> f64 {
    0.03
}

fn default_frame_decimation() -> usize {
    10
}

fn default_max_offset() -> f64 {
    0.5
}

fn default_poll_timeout_ms() -> u64 {
    1000
}

fn default_fast_align() -> bool {
    true
}

fn default_reregister_after() -> Option<usize> {
    Some(5)
}

fn default_reregister_stride() -> usize {
    10
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            voxel_size: default_voxel_size(),
            frame_decimation: default_frame_decimation(),
            max_offset: default_max_offset(),
            poll_timeout_ms: default_poll_timeout_ms(),
            fast_align: default_fast_align(),
            reregister_after: default_reregister_after(),
            reregister_icp: IcpConfig::default(),
            reregister_stride: default_reregister_stride(),
        }
    }
}

impl FusionConfig {
    /// Defaults for replaying recorded scans, where every file is a distinct
    /// capture and none is decimated away.
    pub fn replay() -> Self {
        Self {
            frame_decimation: 1,
            ..Default::default()
        }
    }

    /// Check the parameters the fusion loop relies on.
    pub fn validate(&self) -> Result<(), FusionError> {
        if !(self.voxel_size.is_finite() && self.voxel_size > 0.0) {
            return Err(FusionError::InvalidVoxelSize(self.voxel_size));
        }
        if self.frame_decimation == 0 {
            return Err(FusionError::InvalidConfig(
                "frame_decimation must be at least 1".to_string(),
            ));
        }
        if !(self.max_offset.is_finite() && self.max_offset > 0.0) {
            return Err(FusionError::InvalidConfig(format!(
                "max_offset must be positive, got {}",
                self.max_offset
            )));
        }
        if self.reregister_stride == 0 {
            return Err(FusionError::InvalidConfig(
                "reregister_stride must be at least 1".to_string(),
            ));
        }
        if self.reregister_after == Some(0) {
            return Err(FusionError::InvalidConfig(
                "reregister_after must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// The poll timeout as a [`Duration`].
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

/// Counters reported by the fusion loop.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FusionStats {
    /// Frames delivered by the source.
    pub frames_received: usize,
    /// Frames kept by decimation.
    pub frames_processed: usize,
    /// Frames written into the map.
    pub frames_fused: usize,
    /// Frames dropped because of an implausible offset.
    pub frames_rejected: usize,
    /// Frames placed by full ICP after repeated rejections.
    pub reregistrations: usize,
    /// Polls that returned no data.
    pub timeouts: usize,
}

/// What happened to a processed frame.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// The first frame, fused as-is.
    Reference,
    /// Fused after a plausible centroid offset.
    Fused {
        /// Offset applied on top of the previous pose.
        offset: [f64; 3],
    },
    /// Dropped because the offset was too large.
    Rejected {
        /// Length of the rejected offset.
        offset_norm: f64,
    },
    /// Placed by full ICP against the map after repeated rejections.
    Reregistered {
        /// Final ICP residual.
        rmse: f64,
    },
    /// Nothing to fuse.
    Empty,
}

/// Frame-to-frame pose tracking and map integration.
///
/// Holds the running pose and the last accepted frame; owned by the fusion
/// thread.
pub struct FusionTracker {
    config: FusionConfig,
    pose: RigidTransform,
    previous: Option<PointCloud>,
    consecutive_rejections: usize,
}

impl FusionTracker {
    /// Create a tracker at the identity pose.
    pub fn new(config: FusionConfig) -> Self {
        Self {
            config,
            pose: RigidTransform::identity(),
            previous: None,
            consecutive_rejections: 0,
        }
    }

    /// The pose applied to the last fused frame.
    pub fn pose(&self) -> &RigidTransform {
        &self.pose
    }

    /// Forget the reference frame and return to the identity pose.
    pub fn reset(&mut self) {
        self.pose = RigidTransform::identity();
        self.previous = None;
        self.consecutive_rejections = 0;
    }

    /// Place a frame in the map frame and add it to `map`, or drop it.
    pub fn integrate(
        &mut self,
        frame: PointCloud,
        map: &VoxelFusionMap,
    ) -> Result<FrameOutcome, FusionError> {
        if frame.is_empty() {
            return Ok(FrameOutcome::Empty);
        }

        if self.previous.is_none() {
            map.extend(&frame.transformed(&self.pose));
            self.previous = Some(frame);
            return Ok(FrameOutcome::Reference);
        }

        if !self.config.fast_align {
            map.extend(&frame.transformed(&self.pose));
            self.previous = Some(frame);
            return Ok(FrameOutcome::Fused { offset: [0.0; 3] });
        }

        // both clouds are non-empty here
        let offset = self
            .previous
            .as_ref()
            .and_then(|previous| fast_align(&frame, previous))
            .unwrap_or([0.0; 3]);
        let norm = offset_norm(&offset);

        if norm < self.config.max_offset {
            // the offset is measured in the sensor frame, before the pose
            self.pose = self.pose.compose(&RigidTransform::from_translation(offset));
            map.extend(&frame.transformed(&self.pose));
            self.previous = Some(frame);
            self.consecutive_rejections = 0;
            return Ok(FrameOutcome::Fused { offset });
        }

        self.consecutive_rejections += 1;
        log::debug!(
            "Rejected frame with offset {:.3} m ({} in a row)",
            norm,
            self.consecutive_rejections
        );

        match self.config.reregister_after {
            Some(limit) if self.consecutive_rejections >= limit => self.reregister(frame, map, norm),
            _ => Ok(FrameOutcome::Rejected { offset_norm: norm }),
        }
    }

    fn reregister(
        &mut self,
        frame: PointCloud,
        map: &VoxelFusionMap,
        offset_norm: f64,
    ) -> Result<FrameOutcome, FusionError> {
        let stride = self.config.reregister_stride;
        let source = downsample(&frame.transformed(&self.pose), stride)?;
        let target = downsample(&map.export(), stride)?;

        let result = align(&source, &target, &self.config.reregister_icp)?;
        match result.termination {
            IcpTermination::Converged | IcpTermination::MaxIterations => {
                self.pose = result.transform.compose(&self.pose);
                map.extend(&frame.transformed(&self.pose));
                self.previous = Some(frame);
                self.consecutive_rejections = 0;
                log::info!(
                    "Re-registered frame against the map: {:?} after {} iterations, rmse {:.4}",
                    result.termination,
                    result.num_iterations,
                    result.rmse
                );
                Ok(FrameOutcome::Reregistered { rmse: result.rmse })
            }
            IcpTermination::InsufficientCorrespondences => {
                log::warn!(
                    "Re-registration found {} correspondences, dropping frame",
                    result.num_correspondences
                );
                Ok(FrameOutcome::Rejected { offset_norm })
            }
        }
    }
}

/// A cloneable flag asking a worker to stop.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A fresh, not cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Background thread feeding frames from a [`FrameSource`] into a shared map.
///
/// The thread checks its [`CancellationToken`] once per poll, so it stops at
/// most one poll timeout after [`stop`](Self::stop). Dropping the worker
/// stops and joins it.
pub struct FusionWorker {
    token: CancellationToken,
    handle: Option<JoinHandle<FusionStats>>,
}

impl FusionWorker {
    /// Start the fusion loop on a new thread.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration or if the thread cannot be spawned.
    pub fn spawn<S>(
        source: S,
        map: Arc<VoxelFusionMap>,
        config: FusionConfig,
    ) -> Result<Self, FusionError>
    where
        S: FrameSource + 'static,
    {
        config.validate()?;

        let token = CancellationToken::new();
        let handle = std::thread::Builder::new()
            .name("scanmerge-fusion".to_string())
            .spawn({
                let token = token.clone();
                move || run_fusion_loop(source, &map, config, &token)
            })?;

        Ok(Self {
            token,
            handle: Some(handle),
        })
    }

    /// A handle that stops this worker when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Ask the loop to exit after the current iteration.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Whether the loop has exited, on cancellation or a closed source.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the loop to exit and collect its counters.
    ///
    /// This does not stop the worker; call [`stop`](Self::stop) first unless
    /// the source is known to close.
    pub fn join(mut self) -> Result<FusionStats, FusionError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| FusionError::WorkerPanicked),
            None => Ok(FusionStats::default()),
        }
    }
}

impl Drop for FusionWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.token.cancel();
            if handle.join().is_err() {
                log::error!("The fusion worker panicked");
            }
        }
    }
}

fn run_fusion_loop<S: FrameSource>(
    mut source: S,
    map: &VoxelFusionMap,
    config: FusionConfig,
    token: &CancellationToken,
) -> FusionStats {
    let timeout = config.poll_timeout();
    let decimation = config.frame_decimation.max(1);
    let mut tracker = FusionTracker::new(config);
    let mut stats = FusionStats::default();

    log::info!("Fusion worker started");

    while !token.is_cancelled() {
        let frame = match source.grab(timeout) {
            FrameGrab::Frame(frame) => frame,
            FrameGrab::NoData => {
                stats.timeouts += 1;
                continue;
            }
            FrameGrab::Closed => {
                log::info!("Frame source closed");
                break;
            }
        };

        stats.frames_received += 1;
        if stats.frames_received % decimation != 0 {
            continue;
        }
        stats.frames_processed += 1;

        match tracker.integrate(frame, map) {
            Ok(FrameOutcome::Reference) => {
                stats.frames_fused += 1;
                log::info!("First frame added. Voxels: {}", map.size());
            }
            Ok(FrameOutcome::Fused { .. }) => {
                stats.frames_fused += 1;
                log::debug!("Frame added. Voxels: {}", map.size());
            }
            Ok(FrameOutcome::Reregistered { .. }) => {
                stats.frames_fused += 1;
                stats.reregistrations += 1;
            }
            Ok(FrameOutcome::Rejected { .. }) => stats.frames_rejected += 1,
            Ok(FrameOutcome::Empty) => log::debug!("Skipping empty frame"),
            Err(err) => log::warn!("Failed to integrate frame: {}", err),
        }
    }

    log::info!("Fusion worker stopped: {:?}", stats);
    stats
}
