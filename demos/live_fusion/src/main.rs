use argh::FromArgs;
use std::{
    io::BufRead,
    path::PathBuf,
    sync::{mpsc, Arc},
    time::Duration,
};

use scanmerge_3d::{io::ply::write_ply, PointCloud};
use scanmerge_fusion::{
    source::PlySequenceSource, FusionConfig, FusionWorker, VoxelFusionMap,
};

#[derive(FromArgs, Debug)]
/// Fuse a stream of scans into a voxel map while displaying it
struct Args {
    /// optional JSON file with the fusion configuration
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// directory holding the scan_<i>.ply frames to replay
    #[argh(option, short = 'd', default = "PathBuf::from(\"scans\")")]
    scan_dir: PathBuf,

    /// file name prefix of the replayed frames
    #[argh(option, default = "String::from(\"scan_\")")]
    prefix: String,

    /// number of frames to replay
    #[argh(option, short = 'n', default = "8")]
    num_frames: usize,

    /// delay between replayed frames in milliseconds
    #[argh(option, default = "100")]
    frame_interval_ms: u64,

    /// process every n-th frame, overrides the configuration (replay
    /// defaults to every frame)
    #[argh(option)]
    decimation: Option<usize>,

    /// voxel edge length in meters, overrides the configuration
    #[argh(option)]
    voxel_size: Option<f64>,

    /// how often the display loop refreshes, in milliseconds
    #[argh(option, default = "500")]
    refresh_ms: u64,

    /// stream the map to a rerun viewer
    #[argh(switch, short = 'v')]
    visualize: bool,

    /// save the final map to this file
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let mut config: FusionConfig = match &args.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => FusionConfig::replay(),
    };
    if let Some(decimation) = args.decimation {
        config.frame_decimation = decimation;
    }
    if args.num_frames < config.frame_decimation {
        log::warn!(
            "Replaying {} frames with decimation {}, no frame will be fused",
            args.num_frames,
            config.frame_decimation
        );
    }
    if let Some(voxel_size) = args.voxel_size {
        config.voxel_size = voxel_size;
    }

    let rec = if args.visualize {
        Some(rerun::RecordingStreamBuilder::new("scanmerge live fusion").spawn()?)
    } else {
        None
    };

    let map = Arc::new(VoxelFusionMap::new(config.voxel_size)?);

    let source = PlySequenceSource::new(&args.scan_dir, args.prefix.clone(), args.num_frames)
        .with_interval(Duration::from_millis(args.frame_interval_ms));
    let worker = FusionWorker::spawn(source, map.clone(), config)?;

    ctrlc::set_handler({
        let cancel_token = worker.cancel_token();
        move || {
            println!("Received Ctrl-C signal. Sending cancel signal !!");
            cancel_token.cancel();
        }
    })?;

    let commands = spawn_command_reader();
    println!("Type `c` and enter to clear the map, `q` to quit.");

    let cancel_token = worker.cancel_token();
    while !cancel_token.is_cancelled() && !worker.is_finished() {
        std::thread::sleep(Duration::from_millis(args.refresh_ms));

        while let Ok(command) = commands.try_recv() {
            match command.trim() {
                "c" => {
                    map.clear();
                    println!("Map cleared");
                }
                "q" => cancel_token.cancel(),
                _ => {}
            }
        }

        let snapshot = map.export();
        log::info!("Map holds {} voxels", snapshot.len());
        if let Some(rec) = &rec {
            log_pointcloud(rec, "map", &snapshot)?;
        }
    }

    // the worker must be gone before the map is torn down
    worker.stop();
    let stats = worker.join()?;
    println!("Fusion stats: {}", serde_json::to_string_pretty(&stats)?);
    println!("Final: {} voxels", map.size());

    if let Some(output) = &args.output {
        let snapshot = map.export();
        write_ply(output, &snapshot)?;
        println!("Saved {} points to {}", snapshot.len(), output.display());
    }

    Ok(())
}

// stdin is read on its own thread, the display loop only polls the channel
fn spawn_command_reader() -> mpsc::Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

fn log_pointcloud(
    rec: &rerun::RecordingStream,
    name: &str,
    pointcloud: &PointCloud,
) -> Result<(), Box<dyn std::error::Error>> {
    let points = pointcloud
        .points()
        .iter()
        .map(|p| rerun::Position3D::new(p[0] as f32, p[1] as f32, p[2] as f32))
        .collect::<Vec<_>>();

    let colors = pointcloud
        .colors()
        .iter()
        .map(|c| rerun::Color::from_rgb(c[0], c[1], c[2]))
        .collect::<Vec<_>>();

    rec.log(name, &rerun::Points3D::new(points).with_colors(colors))?;

    Ok(())
}
