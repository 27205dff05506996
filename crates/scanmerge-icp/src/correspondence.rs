use kiddo::immutable::float::kdtree::ImmutableKdTree;
use scanmerge_3d::ops::squared_distance;

/// Squared distance below which a candidate is accepted without scanning the
/// rest of the target cloud.
pub const EARLY_EXIT_SQUARED_DISTANCE: f64 = 1e-3;

/// A matched pair of points between a source and a target cloud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// Index of the point in the source cloud.
    pub source_index: usize,
    /// Index of the matched point in the target cloud.
    pub target_index: usize,
    /// Squared Euclidean distance between the two points.
    pub squared_distance: f64,
}

/// Nearest neighbour strategy used to build correspondences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrespondenceBackend {
    /// Exhaustive scan of the target with early exit on near-exact matches.
    #[default]
    BruteForce,
    /// Exact nearest neighbour through a kd-tree built once per target.
    KdTree,
}

/// Find, for every source point, its closest target point.
///
/// The scan over the target stops as soon as a candidate is closer than
/// [`EARLY_EXIT_SQUARED_DISTANCE`], so the match is not always the exact
/// nearest neighbour. A source point whose best squared distance is not below
/// `max_squared_distance` produces no correspondence.
///
/// The cost is `O(|source| * |target|)`: downsample dense clouds first.
///
/// # Arguments
///
/// * `source` - The points to match.
/// * `target` - The points to search.
/// * `max_squared_distance` - The squared distance gate.
///
/// # Returns
///
/// The accepted correspondences, ordered by source index.
///
/// Example:
///
/// ```
/// use scanmerge_icp::find_correspondences;
///
/// let source = vec![[0.0, 0.0, 0.0], [5.0, 0.0, 0.0]];
/// let target = vec![[0.1, 0.0, 0.0]];
/// let matches = find_correspondences(&source, &target, 0.25);
/// assert_eq!(matches.len(), 1);
/// assert_eq!(matches[0].target_index, 0);
/// ```
pub fn find_correspondences(
    source: &[[f64; 3]],
    target: &[[f64; 3]],
    max_squared_distance: f64,
) -> Vec<Correspondence> {
    let mut correspondences = Vec::with_capacity(source.len());

    for (source_index, p) in source.iter().enumerate() {
        let mut best_distance = f64::INFINITY;
        let mut best_index = None;

        for (target_index, q) in target.iter().enumerate() {
            let d = squared_distance(p, q);
            if d < best_distance {
                best_distance = d;
                best_index = Some(target_index);
                if d < EARLY_EXIT_SQUARED_DISTANCE {
                    break;
                }
            }
        }

        if let Some(target_index) = best_index {
            if best_distance < max_squared_distance {
                correspondences.push(Correspondence {
                    source_index,
                    target_index,
                    squared_distance: best_distance,
                });
            }
        }
    }

    correspondences
}

/// Kd-tree index over a target cloud for exact nearest neighbour queries.
pub struct KdTreeSearch {
    tree: Option<ImmutableKdTree<f64, u32, 3, 32>>,
}

impl KdTreeSearch {
    /// Build the index over `target`.
    pub fn new(target: &[[f64; 3]]) -> Self {
        // the tree cannot be built from an empty slice
        let tree = if target.is_empty() {
            None
        } else {
            Some(ImmutableKdTree::new_from_slice(target))
        };
        Self { tree }
    }

    /// Same contract as [`find_correspondences`], with exact nearest neighbours.
    pub fn find_correspondences(
        &self,
        source: &[[f64; 3]],
        max_squared_distance: f64,
    ) -> Vec<Correspondence> {
        let Some(tree) = &self.tree else {
            return Vec::new();
        };

        source
            .iter()
            .enumerate()
            .filter_map(|(source_index, p)| {
                let nn = tree.nearest_one::<kiddo::SquaredEuclidean>(p);
                (nn.distance < max_squared_distance).then_some(Correspondence {
                    source_index,
                    target_index: nn.item as usize,
                    squared_distance: nn.distance,
                })
            })
            .collect()
    }
}

/// A target cloud prepared for repeated correspondence queries.
pub(crate) enum TargetIndex<'a> {
    BruteForce(&'a [[f64; 3]]),
    KdTree(KdTreeSearch),
}

impl<'a> TargetIndex<'a> {
    pub fn build(target: &'a [[f64; 3]], backend: CorrespondenceBackend) -> Self {
        match backend {
            CorrespondenceBackend::BruteForce => TargetIndex::BruteForce(target),
            CorrespondenceBackend::KdTree => TargetIndex::KdTree(KdTreeSearch::new(target)),
        }
    }

    pub fn find(&self, source: &[[f64; 3]], max_squared_distance: f64) -> Vec<Correspondence> {
        match self {
            TargetIndex::BruteForce(target) => {
                find_correspondences(source, target, max_squared_distance)
            }
            TargetIndex::KdTree(search) => search.find_correspondences(source, max_squared_distance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(n: usize, spacing: f64, offset: [f64; 3]) -> Vec<[f64; 3]> {
        let mut points = Vec::with_capacity(n * n * n);
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    points.push([
                        i as f64 * spacing + offset[0],
                        j as f64 * spacing + offset[1],
                        k as f64 * spacing + offset[2],
                    ]);
                }
            }
        }
        points
    }

    #[test]
    fn test_identical_clouds_match_one_to_one() {
        let points = grid(4, 0.25, [0.0; 3]);
        let matches = find_correspondences(&points, &points, 0.25);
        assert_eq!(matches.len(), points.len());
        for (i, m) in matches.iter().enumerate() {
            assert_eq!(m.source_index, i);
            assert_eq!(m.target_index, i);
            assert_eq!(m.squared_distance, 0.0);
        }
    }

    #[test]
    fn test_shifted_cloud_matches_nearest() {
        let source = grid(3, 0.5, [0.0; 3]);
        let target = grid(3, 0.5, [0.1, 0.0, 0.0]);
        let matches = find_correspondences(&source, &target, 0.25);
        assert_eq!(matches.len(), source.len());
        for m in matches.iter() {
            assert_eq!(m.source_index, m.target_index);
            assert_relative_eq!(m.squared_distance, 0.01, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_gate_rejects_far_points() {
        // smallest gap between the two cubes is 0.6 m
        let source = grid(5, 0.1, [0.0; 3]);
        let target = grid(5, 0.1, [1.0, 0.0, 0.0]);
        assert!(find_correspondences(&source, &target, 0.25).is_empty());
        assert!(KdTreeSearch::new(&target)
            .find_correspondences(&source, 0.25)
            .is_empty());
    }

    #[test]
    fn test_gate_is_strict() {
        let source = vec![[0.0, 0.0, 0.0]];
        let target = vec![[0.5, 0.0, 0.0]];
        assert!(find_correspondences(&source, &target, 0.25).is_empty());
        assert_eq!(find_correspondences(&source, &target, 0.2501).len(), 1);
    }

    #[test]
    fn test_early_exit_takes_first_close_candidate() {
        // both candidates are within the early exit radius, the first one wins
        let source = vec![[0.0, 0.0, 0.0]];
        let target = vec![[0.02, 0.0, 0.0], [0.0, 0.0, 0.0]];
        let brute = find_correspondences(&source, &target, 0.25);
        assert_eq!(brute[0].target_index, 0);

        let exact = KdTreeSearch::new(&target).find_correspondences(&source, 0.25);
        assert_eq!(exact[0].target_index, 1);
    }

    #[test]
    fn test_empty_inputs() {
        let points = grid(2, 1.0, [0.0; 3]);
        assert!(find_correspondences(&[], &points, 1.0).is_empty());
        assert!(find_correspondences(&points, &[], 1.0).is_empty());
        assert!(KdTreeSearch::new(&[]).find_correspondences(&points, 1.0).is_empty());
    }

    #[test]
    fn test_backends_agree_on_well_separated_points() {
        let source = grid(4, 0.3, [0.05, -0.02, 0.01]);
        let target = grid(4, 0.3, [0.0; 3]);
        let brute = TargetIndex::build(&target, CorrespondenceBackend::BruteForce).find(&source, 0.25);
        let tree = TargetIndex::build(&target, CorrespondenceBackend::KdTree).find(&source, 0.25);
        assert_eq!(brute.len(), tree.len());
        for (a, b) in brute.iter().zip(tree.iter()) {
            assert_eq!(a.source_index, b.source_index);
            assert_eq!(a.target_index, b.target_index);
            assert_relative_eq!(a.squared_distance, b.squared_distance, epsilon = 1e-12);
        }
    }
}
