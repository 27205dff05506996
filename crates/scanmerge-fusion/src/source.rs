use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use scanmerge_3d::{io::ply::load_ply, PointCloud};

/// Outcome of a single poll of a [`FrameSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum FrameGrab {
    /// A projected point cloud.
    Frame(PointCloud),
    /// Nothing arrived within the timeout, try again.
    NoData,
    /// The source is exhausted and will never produce another frame.
    Closed,
}

/// A producer of projected point clouds, e.g. an RGB-D sensor driver.
pub trait FrameSource: Send {
    /// Wait at most `timeout` for the next frame.
    fn grab(&mut self, timeout: Duration) -> FrameGrab;
}

/// Sending half of a [`ChannelSource`].
pub type FrameSender = mpsc::Sender<PointCloud>;

/// Frames pushed through an in-process channel by an external driver.
pub struct ChannelSource {
    receiver: mpsc::Receiver<PointCloud>,
}

impl ChannelSource {
    /// Wrap an existing receiver.
    pub fn new(receiver: mpsc::Receiver<PointCloud>) -> Self {
        Self { receiver }
    }

    /// Create a connected sender and source pair.
    ///
    /// The source closes once every sender is dropped and the queue drained.
    pub fn channel() -> (FrameSender, Self) {
        let (sender, receiver) = mpsc::channel();
        (sender, Self::new(receiver))
    }
}

impl FrameSource for ChannelSource {
    fn grab(&mut self, timeout: Duration) -> FrameGrab {
        match self.receiver.recv_timeout(timeout) {
            Ok(frame) => FrameGrab::Frame(frame),
            Err(mpsc::RecvTimeoutError::Timeout) => FrameGrab::NoData,
            Err(mpsc::RecvTimeoutError::Disconnected) => FrameGrab::Closed,
        }
    }
}

/// Replays `<dir>/<prefix><i>.ply` for `i` in `0..count` as a frame stream.
///
/// Files are soft-loaded: an unreadable file yields an empty frame and a
/// warning. Frames are paced at `interval` to mimic a sensor rate.
pub struct PlySequenceSource {
    dir: PathBuf,
    prefix: String,
    count: usize,
    next_index: usize,
    interval: Duration,
    last_frame: Option<Instant>,
}

impl PlySequenceSource {
    /// Replay `count` files from `dir` without pacing.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, count: usize) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            count,
            next_index: 0,
            interval: Duration::ZERO,
            last_frame: None,
        }
    }

    /// Emit at most one frame per `interval`.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Path of the file replayed as frame `index`.
    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}{}.ply", self.prefix, index))
    }

    /// Number of frames not yet emitted.
    pub fn remaining(&self) -> usize {
        self.count.saturating_sub(self.next_index)
    }
}

impl FrameSource for PlySequenceSource {
    fn grab(&mut self, timeout: Duration) -> FrameGrab {
        if self.remaining() == 0 {
            return FrameGrab::Closed;
        }

        if let Some(last) = self.last_frame {
            let wait = (last + self.interval).saturating_duration_since(Instant::now());
            if wait > timeout {
                std::thread::sleep(timeout);
                return FrameGrab::NoData;
            }
            std::thread::sleep(wait);
        }

        let path = self.frame_path(self.next_index);
        self.next_index += 1;
        self.last_frame = Some(Instant::now());

        FrameGrab::Frame(load_ply(&path))
    }
}
