use std::sync::Arc;
use std::time::{Duration, Instant};

use scanmerge_3d::{io::ply::write_ply, Point, PointCloud};
use scanmerge_fusion::{
    source::{ChannelSource, FrameGrab, FrameSource, PlySequenceSource},
    FusionConfig, FusionError, FusionWorker, VoxelFusionMap,
};

fn frame(shift: f64) -> PointCloud {
    (0..8)
        .flat_map(|i| {
            (0..8).map(move |j| {
                Point::new(
                    [i as f64 * 0.1 + 0.015 + shift, j as f64 * 0.1 + 0.015, 1.015],
                    [i as u8 * 30, j as u8 * 30, 100],
                )
            })
        })
        .collect()
}

fn fast_config(decimation: usize) -> FusionConfig {
    FusionConfig {
        frame_decimation: decimation,
        poll_timeout_ms: 10,
        ..Default::default()
    }
}

#[test]
fn worker_fuses_channel_frames() -> Result<(), FusionError> {
    let map = Arc::new(VoxelFusionMap::new(0.03)?);
    let (sender, source) = ChannelSource::channel();
    let worker = FusionWorker::spawn(source, map.clone(), fast_config(2))?;

    // frames 2, 4 and 6 are processed, the rest are decimated away
    for i in 0..6 {
        sender.send(frame(-0.02 * i as f64)).unwrap();
    }
    drop(sender);

    let stats = worker.join()?;
    assert_eq!(stats.frames_received, 6);
    assert_eq!(stats.frames_processed, 3);
    assert_eq!(stats.frames_fused, 3);
    assert_eq!(stats.frames_rejected, 0);

    // every frame was compensated back onto the first processed one
    assert_eq!(map.size(), frame(0.0).len());
    Ok(())
}

#[test]
fn worker_rejects_jumps_and_keeps_streaming() -> Result<(), FusionError> {
    let map = Arc::new(VoxelFusionMap::new(0.03)?);
    let (sender, source) = ChannelSource::channel();
    let config = FusionConfig {
        reregister_after: None,
        ..fast_config(1)
    };
    let worker = FusionWorker::spawn(source, map.clone(), config)?;

    sender.send(frame(0.0)).unwrap();
    sender.send(frame(2.0)).unwrap();
    sender.send(frame(0.05)).unwrap();
    drop(sender);

    let stats = worker.join()?;
    assert_eq!(stats.frames_processed, 3);
    assert_eq!(stats.frames_fused, 2);
    assert_eq!(stats.frames_rejected, 1);
    Ok(())
}

#[test]
fn stop_interrupts_an_idle_worker() -> Result<(), FusionError> {
    let map = Arc::new(VoxelFusionMap::new(0.03)?);
    let (sender, source) = ChannelSource::channel();
    let worker = FusionWorker::spawn(source, map, fast_config(1))?;

    std::thread::sleep(Duration::from_millis(50));
    assert!(!worker.is_finished());

    let token = worker.cancel_token();
    token.cancel();

    let started = Instant::now();
    let stats = worker.join()?;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(stats.timeouts > 0);
    assert_eq!(stats.frames_received, 0);
    drop(sender);
    Ok(())
}

#[test]
fn dropping_the_worker_stops_it() -> Result<(), FusionError> {
    let map = Arc::new(VoxelFusionMap::new(0.03)?);
    let (sender, source) = ChannelSource::channel();
    let worker = FusionWorker::spawn(source, map.clone(), fast_config(1))?;
    sender.send(frame(0.0)).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while map.is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    drop(worker);

    assert_eq!(map.size(), frame(0.0).len());
    Ok(())
}

#[test]
fn consumer_can_export_and_clear_while_fusing() -> Result<(), Box<dyn std::error::Error>> {
    let map = Arc::new(VoxelFusionMap::new(0.03)?);
    let (sender, source) = ChannelSource::channel();
    let worker = FusionWorker::spawn(source, map.clone(), fast_config(1))?;

    let producer = std::thread::spawn(move || {
        for i in 0..200 {
            if sender.send(frame(0.001 * (i % 5) as f64)).is_err() {
                break;
            }
        }
    });

    for _ in 0..50 {
        let snapshot = map.export();
        assert!(snapshot.len() <= 2 * frame(0.0).len());
        if map.size() > 0 {
            map.clear();
        }
    }
    producer.join().expect("producer panicked");

    let stats = worker.join()?;
    assert_eq!(stats.frames_received, 200);
    Ok(())
}

#[test]
fn ply_sequence_replay_feeds_the_map() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    for i in 0..4 {
        write_ply(dir.path().join(format!("scan_{i}.ply")), &frame(-0.03 * i as f64))?;
    }

    let map = Arc::new(VoxelFusionMap::new(0.03)?);
    let source = PlySequenceSource::new(dir.path(), "scan_", 4);
    let worker = FusionWorker::spawn(source, map.clone(), fast_config(1))?;
    let stats = worker.join()?;

    assert_eq!(stats.frames_received, 4);
    assert_eq!(stats.frames_fused, 4);
    assert_eq!(map.size(), frame(0.0).len());
    Ok(())
}

struct FlakySource {
    polls: usize,
}

impl FrameSource for FlakySource {
    fn grab(&mut self, _timeout: Duration) -> FrameGrab {
        self.polls += 1;
        match self.polls {
            1 | 3 => FrameGrab::NoData,
            2 | 4 => FrameGrab::Frame(frame(0.0)),
            _ => FrameGrab::Closed,
        }
    }
}

#[test]
fn timeouts_are_retried() -> Result<(), FusionError> {
    let map = Arc::new(VoxelFusionMap::new(0.03)?);
    let worker = FusionWorker::spawn(FlakySource { polls: 0 }, map, fast_config(1))?;
    let stats = worker.join()?;
    assert_eq!(stats.timeouts, 2);
    assert_eq!(stats.frames_fused, 2);
    Ok(())
}

#[test]
fn invalid_config_is_rejected_before_spawning() -> Result<(), FusionError> {
    let map = Arc::new(VoxelFusionMap::new(0.03)?);
    let (_sender, source) = ChannelSource::channel();
    let config = FusionConfig {
        max_offset: 0.0,
        ..Default::default()
    };
    assert!(matches!(
        FusionWorker::spawn(source, map, config),
        Err(FusionError::InvalidConfig(_))
    ));
    Ok(())
}

#[test]
fn replay_defaults_fuse_a_short_sequence() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    for i in 0..8 {
        write_ply(dir.path().join(format!("scan_{i}.ply")), &frame(-0.02 * i as f64))?;
    }

    let config = FusionConfig {
        poll_timeout_ms: 10,
        ..FusionConfig::replay()
    };
    let map = Arc::new(VoxelFusionMap::new(config.voxel_size)?);
    let source = PlySequenceSource::new(dir.path(), "scan_", 8);
    let worker = FusionWorker::spawn(source, map.clone(), config)?;
    let stats = worker.join()?;

    assert_eq!(stats.frames_received, 8);
    assert_eq!(stats.frames_processed, 8);
    assert!(stats.frames_fused > 0);
    assert!(!map.is_empty());
    Ok(())
}
