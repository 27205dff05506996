use argh::FromArgs;
use std::path::PathBuf;

use scanmerge_icp::{
    pipeline::{run_pipeline, PipelineConfig},
    CorrespondenceBackend,
};

#[derive(FromArgs, Debug)]
/// Merge a directory of scans into a single point cloud with ICP
struct Args {
    /// optional JSON file with the pipeline configuration
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// directory holding scan_<i>.ply files
    #[argh(option, short = 'd')]
    scan_dir: Option<PathBuf>,

    /// number of scans to merge
    #[argh(option, short = 'n')]
    num_scans: Option<usize>,

    /// where to write the merged cloud, defaults to <scan_dir>/merged.ply
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// keep every n-th point for registration
    #[argh(option)]
    stride: Option<usize>,

    /// maximum number of ICP iterations per scan
    #[argh(option)]
    max_iterations: Option<usize>,

    /// use a kd-tree for nearest neighbour search
    #[argh(switch)]
    kdtree: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let mut config = match &args.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };

    // command line flags take precedence over the file
    if let Some(scan_dir) = args.scan_dir {
        config.scan_dir = scan_dir;
    }
    if let Some(num_scans) = args.num_scans {
        config.num_scans = num_scans;
    }
    if let Some(output) = args.output {
        config.output = Some(output);
    }
    if let Some(stride) = args.stride {
        config.downsample_stride = stride;
    }
    if let Some(max_iterations) = args.max_iterations {
        config.icp.max_iterations = max_iterations;
    }
    if args.kdtree {
        config.icp.backend = CorrespondenceBackend::KdTree;
    }

    log::debug!("Pipeline configuration: {:?}", config);

    let report = match run_pipeline(&config) {
        Ok(report) => report,
        Err(err) => {
            log::error!("Scan merging failed: {}", err);
            return Err(err.into());
        }
    };

    for alignment in report.alignments.iter() {
        println!(
            "scan {}: {} points, {:?}, rmse {:.4} m, rotation {:.2} deg, translation {:.3} m",
            alignment.index,
            alignment.num_points,
            alignment.termination,
            alignment.rmse,
            alignment.transform.rotation_angle().to_degrees(),
            alignment.transform.translation_norm()
        );
    }
    println!(
        "Saved {} points to {}",
        report.merged.len(),
        config.output_path().display()
    );

    Ok(())
}
