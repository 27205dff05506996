//! Merge a set of scans into one cloud by aligning each scan against the
//! cloud accumulated so far.
//!
//! The first scan defines the reference frame. Every following scan is
//! downsampled, registered against the downsampled merged cloud with
//! [`align`], and its full resolution points are moved into place and
//! appended.

use std::path::{Path, PathBuf};

use scanmerge_3d::{
    io::ply::{read_ply, write_ply, PlyError},
    ops::{downsample, OpsError},
    PointCloud, RigidTransform,
};

use crate::{align, IcpConfig, IcpError, IcpTermination};

/// Error types for the batch pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A scan could not be read.
    #[error("Failed to load scan {}", .path.display())]
    Load {
        /// The scan file.
        path: PathBuf,
        /// The codec failure.
        source: PlyError,
    },

    /// A scan was read but holds no points.
    #[error("Scan {} holds no points", .path.display())]
    EmptyScan {
        /// The scan file.
        path: PathBuf,
    },

    /// There was nothing to merge.
    #[error("No scans to merge")]
    NoScans,

    /// The merged cloud could not be written.
    #[error("Failed to write merged cloud to {}", .path.display())]
    Write {
        /// The output file.
        path: PathBuf,
        /// The codec failure.
        source: PlyError,
    },

    /// Invalid downsampling stride.
    #[error(transparent)]
    Downsample(#[from] OpsError),

    /// Registration failure.
    #[error(transparent)]
    Icp(#[from] IcpError),
}

/// Parameters of the batch pipeline.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the scans.
    pub scan_dir: PathBuf,
    /// File name prefix, scans are named `<prefix><index>.ply`.
    pub scan_prefix: String,
    /// Number of scans to load, starting from index 0.
    pub num_scans: usize,
    /// Output file, `<scan_dir>/merged.ply` if unset.
    pub output: Option<PathBuf>,
    /// Stride used to thin both clouds before registration.
    pub downsample_stride: usize,
    /// Registration parameters.
    pub icp: IcpConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scan_dir: PathBuf::from("scans"),
            scan_prefix: "scan_".to_string(),
            num_scans: 8,
            output: None,
            downsample_stride: 10,
            icp: IcpConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Path of the scan with the given index.
    pub fn scan_path(&self, index: usize) -> PathBuf {
        self.scan_dir
            .join(format!("{}{}.ply", self.scan_prefix, index))
    }

    /// Path the merged cloud is written to.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.scan_dir.join("merged.ply"))
    }
}

/// How one scan was placed into the merged cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanAlignment {
    /// Position of the scan in the input sequence.
    pub index: usize,
    /// Transform applied to the scan.
    pub transform: RigidTransform,
    /// ICP stop reason, `None` for the reference scan.
    pub termination: Option<IcpTermination>,
    /// Final ICP residual, zero for the reference scan.
    pub rmse: f64,
    /// Full resolution points contributed.
    pub num_points: usize,
}

/// Output of [`merge_scans`].
#[derive(Debug, Clone)]
pub struct MergeReport {
    /// All scans in the frame of the first one.
    pub merged: PointCloud,
    /// One entry per input scan, in order.
    pub alignments: Vec<ScanAlignment>,
}

/// Read `num_scans` scans from the configured directory.
///
/// Any unreadable or empty scan aborts the whole run.
pub fn load_scans(config: &PipelineConfig) -> Result<Vec<PointCloud>, PipelineError> {
    (0..config.num_scans)
        .map(|i| load_scan(&config.scan_path(i)))
        .collect()
}

fn load_scan(path: &Path) -> Result<PointCloud, PipelineError> {
    let cloud = read_ply(path).map_err(|source| PipelineError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    if cloud.is_empty() {
        return Err(PipelineError::EmptyScan {
            path: path.to_path_buf(),
        });
    }
    log::info!("Loaded {} ({} points)", path.display(), cloud.len());
    Ok(cloud)
}

/// Align every scan against the growing merged cloud and concatenate them.
///
/// The first scan is copied unmodified. For each following scan the transform
/// is estimated on downsampled copies and applied to the full resolution
/// scan, so the merged cloud holds the sum of all input point counts.
///
/// A registration that runs out of correspondences is not an error: the scan
/// is merged with the transform found so far and a warning is logged.
pub fn merge_scans(
    scans: &[PointCloud],
    config: &PipelineConfig,
) -> Result<MergeReport, PipelineError> {
    let (first, rest) = scans.split_first().ok_or(PipelineError::NoScans)?;

    let total = scans.iter().map(PointCloud::len).sum();
    let mut merged = PointCloud::with_capacity(total);
    merged.append(first);

    let mut alignments = Vec::with_capacity(scans.len());
    alignments.push(ScanAlignment {
        index: 0,
        transform: RigidTransform::identity(),
        termination: None,
        rmse: 0.0,
        num_points: first.len(),
    });

    for (offset, scan) in rest.iter().enumerate() {
        let index = offset + 1;

        let source = downsample(scan, config.downsample_stride)?;
        let target = downsample(&merged, config.downsample_stride)?;

        let result = align(&source, &target, &config.icp)?;
        if result.termination == IcpTermination::InsufficientCorrespondences {
            log::warn!(
                "Scan {}: registration stopped after {} iterations with {} correspondences",
                index,
                result.num_iterations,
                result.num_correspondences
            );
        }

        merged.append(&scan.transformed(&result.transform));

        log::info!(
            "Scan {}: {:?} after {} iterations, rmse {:.4}, merged cloud has {} points",
            index,
            result.termination,
            result.num_iterations,
            result.rmse,
            merged.len()
        );

        alignments.push(ScanAlignment {
            index,
            transform: result.transform,
            termination: Some(result.termination),
            rmse: result.rmse,
            num_points: scan.len(),
        });
    }

    Ok(MergeReport { merged, alignments })
}

/// Load the configured scans, merge them and write the result.
///
/// Nothing is written unless every scan loads and registers.
pub fn run_pipeline(config: &PipelineConfig) -> Result<MergeReport, PipelineError> {
    if config.num_scans == 0 {
        return Err(PipelineError::NoScans);
    }

    let scans = load_scans(config)?;
    let report = merge_scans(&scans, config)?;

    let output = config.output_path();
    write_ply(&output, &report.merged).map_err(|source| PipelineError::Write {
        path: output.clone(),
        source,
    })?;
    log::info!(
        "Saved {} points to {}",
        report.merged.len(),
        output.display()
    );

    Ok(report)
}
