use scanmerge_3d::{linalg::transform_points, PointCloud, RigidTransform};

use crate::{
    correspondence::{CorrespondenceBackend, TargetIndex},
    estimate::estimate_rigid_transform,
    IcpError,
};

/// Parameters of the ICP loop.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct IcpConfig {
    /// Maximum number of iterations to perform.
    pub max_iterations: usize,
    /// Radius of the correspondence gate, in meters.
    pub max_correspondence_distance: f64,
    /// Stop once the mean residual drops below this value, in meters.
    pub convergence_rmse: f64,
    /// Stop when fewer correspondences than this are found.
    pub min_correspondences: usize,
    /// Nearest neighbour strategy.
    pub backend: CorrespondenceBackend,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_correspondence_distance: 0.5,
            convergence_rmse: 0.01,
            min_correspondences: 10,
            backend: CorrespondenceBackend::BruteForce,
        }
    }
}

/// Why the ICP loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum IcpTermination {
    /// The mean residual fell below the convergence threshold.
    Converged,
    /// The iteration budget was exhausted.
    MaxIterations,
    /// Too few correspondences to continue, or an empty input cloud.
    InsufficientCorrespondences,
}

/// Result of the ICP algorithm.
///
/// The transformation is from the source to the target frame.
#[derive(Debug, Clone, PartialEq)]
pub struct IcpResult {
    /// The accumulated source-to-target transform.
    pub transform: RigidTransform,
    /// The number of completed iterations.
    pub num_iterations: usize,
    /// Last computed mean residual, infinite if no iteration completed.
    pub rmse: f64,
    /// Correspondences found in the last search.
    pub num_correspondences: usize,
    /// The stop reason.
    pub termination: IcpTermination,
}

/// Iterative Closest Point using point to point distances.
///
/// Each iteration matches the working copy of `source` against `target`,
/// estimates the incremental motion, moves the working copy and left-multiplies
/// the accumulated transform by the increment. The residual of an iteration is
/// measured on the correspondences found at its start.
///
/// Running out of correspondences is a normal outcome: the transform
/// accumulated so far is returned with
/// [`IcpTermination::InsufficientCorrespondences`].
///
/// # Arguments
///
/// * `source` - Source point cloud, usually downsampled.
/// * `target` - Target point cloud, usually downsampled.
/// * `config` - Loop parameters.
///
/// # Errors
///
/// Fails on a non-positive or non-finite correspondence distance.
pub fn align(
    source: &PointCloud,
    target: &PointCloud,
    config: &IcpConfig,
) -> Result<IcpResult, IcpError> {
    if !(config.max_correspondence_distance.is_finite() && config.max_correspondence_distance > 0.0)
    {
        return Err(IcpError::InvalidConfig(format!(
            "max_correspondence_distance must be positive, got {}",
            config.max_correspondence_distance
        )));
    }

    let mut result = IcpResult {
        transform: RigidTransform::identity(),
        num_iterations: 0,
        rmse: f64::INFINITY,
        num_correspondences: 0,
        termination: IcpTermination::MaxIterations,
    };

    if source.is_empty() || target.is_empty() {
        log::debug!(
            "ICP skipped: source has {} points, target has {}",
            source.len(),
            target.len()
        );
        result.termination = IcpTermination::InsufficientCorrespondences;
        return Ok(result);
    }

    let max_squared_distance = config.max_correspondence_distance.powi(2);
    let min_correspondences = config.min_correspondences.max(1);
    let index = TargetIndex::build(target.points(), config.backend);

    let mut current_source = source.points().to_vec();
    let mut transformed_points = vec![[0.0; 3]; current_source.len()];

    for i in 0..config.max_iterations {
        let now = std::time::Instant::now();

        let correspondences = index.find(&current_source, max_squared_distance);
        result.num_correspondences = correspondences.len();

        if correspondences.len() < min_correspondences {
            log::debug!(
                "ICP iteration {}: only {} correspondences, stopping",
                i,
                correspondences.len()
            );
            result.termination = IcpTermination::InsufficientCorrespondences;
            return Ok(result);
        }

        let delta = estimate_rigid_transform(&correspondences, &current_source, target.points())?;

        transform_points(
            &current_source,
            &delta.rotation,
            &delta.translation,
            &mut transformed_points,
        );
        std::mem::swap(&mut current_source, &mut transformed_points);

        // later increments apply last
        result.transform = delta.compose(&result.transform);
        result.num_iterations += 1;

        let sum = correspondences
            .iter()
            .map(|c| c.squared_distance)
            .sum::<f64>();
        result.rmse = (sum / correspondences.len() as f64).sqrt();

        log::debug!(
            "ICP iteration {}: {} correspondences, rmse {:.6}, elapsed {:?}",
            i,
            correspondences.len(),
            result.rmse,
            now.elapsed()
        );

        if result.rmse < config.convergence_rmse {
            result.termination = IcpTermination::Converged;
            return Ok(result);
        }
    }

    Ok(result)
}
