//! Pose sources: "current rigid transform between two named frames".
//!
//! A lookup of `(target_frame, source_frame)` returns the pose of
//! `source_frame` expressed in `target_frame`. The robot chain is looked up as
//! `(base, effector)` and the camera chain as `(fiducial, camera)`.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::{Duration, Instant};

use handeye_core::{iso_from_matrix_projected, iso_to_matrix, matrix_from_rows, matrix_to_rows};
use handeye_core::{Iso3, MatRows};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PoseLookupError};

type FramePair = (String, String);

fn frame_pair(target_frame: &str, source_frame: &str) -> FramePair {
    (target_frame.to_string(), source_frame.to_string())
}

fn timeout_error(target_frame: &str, source_frame: &str, timeout: Duration) -> PoseLookupError {
    PoseLookupError::Timeout {
        target_frame: target_frame.to_string(),
        source_frame: source_frame.to_string(),
        timeout,
    }
}

/// Source of rigid transforms between named frames.
pub trait PoseSource {
    /// Look up the pose of `source_frame` in `target_frame`, waiting at most
    /// `timeout` for it to become available.
    fn lookup(
        &mut self,
        target_frame: &str,
        source_frame: &str,
        timeout: Duration,
    ) -> Result<Iso3, PoseLookupError>;
}

impl<P: PoseSource + ?Sized> PoseSource for Box<P> {
    fn lookup(
        &mut self,
        target_frame: &str,
        source_frame: &str,
        timeout: Duration,
    ) -> Result<Iso3, PoseLookupError> {
        (**self).lookup(target_frame, source_frame, timeout)
    }
}

impl<P: PoseSource + ?Sized> PoseSource for &mut P {
    fn lookup(
        &mut self,
        target_frame: &str,
        source_frame: &str,
        timeout: Duration,
    ) -> Result<Iso3, PoseLookupError> {
        (**self).lookup(target_frame, source_frame, timeout)
    }
}

/// A transform between two named frames, as published or recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedTransform {
    pub target_frame: String,
    pub source_frame: String,
    /// Homogeneous 4×4 matrix, row-major.
    pub transform: MatRows,
}

impl StampedTransform {
    pub fn new(target_frame: impl Into<String>, source_frame: impl Into<String>, iso: &Iso3) -> Self {
        Self {
            target_frame: target_frame.into(),
            source_frame: source_frame.into(),
            transform: matrix_to_rows(&iso_to_matrix(iso)),
        }
    }

    /// Convert to an isometry, projecting slightly non-orthonormal rotations.
    pub fn to_isometry(&self) -> Result<Iso3, PoseLookupError> {
        iso_from_matrix_projected(&matrix_from_rows(&self.transform)).map_err(|reason| {
            PoseLookupError::NotRigid {
                target_frame: self.target_frame.clone(),
                source_frame: self.source_frame.clone(),
                reason,
            }
        })
    }

    fn key(&self) -> FramePair {
        frame_pair(&self.target_frame, &self.source_frame)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Static
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed transform per frame pair. Lookups never wait.
#[derive(Debug, Clone, Default)]
pub struct StaticPoseSource {
    transforms: HashMap<FramePair, Iso3>,
}

impl StaticPoseSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the transform for a frame pair.
    pub fn insert(&mut self, target_frame: &str, source_frame: &str, iso: Iso3) {
        self.transforms
            .insert(frame_pair(target_frame, source_frame), iso);
    }

    pub fn remove(&mut self, target_frame: &str, source_frame: &str) -> Option<Iso3> {
        self.transforms
            .remove(&frame_pair(target_frame, source_frame))
    }
}

impl PoseSource for StaticPoseSource {
    fn lookup(
        &mut self,
        target_frame: &str,
        source_frame: &str,
        timeout: Duration,
    ) -> Result<Iso3, PoseLookupError> {
        self.transforms
            .get(&frame_pair(target_frame, source_frame))
            .copied()
            .ok_or_else(|| timeout_error(target_frame, source_frame, timeout))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Replay
// ─────────────────────────────────────────────────────────────────────────────

/// Recorded transforms consumed in order, independently per frame pair.
///
/// An exhausted frame pair times out immediately: no more data will arrive.
#[derive(Debug, Clone, Default)]
pub struct ReplayPoseSource {
    queues: HashMap<FramePair, VecDeque<Iso3>>,
}

impl ReplayPoseSource {
    pub fn from_transforms(
        transforms: impl IntoIterator<Item = StampedTransform>,
    ) -> Result<Self, PoseLookupError> {
        let mut queues: HashMap<FramePair, VecDeque<Iso3>> = HashMap::new();
        for stamped in transforms {
            let iso = stamped.to_isometry()?;
            queues.entry(stamped.key()).or_default().push_back(iso);
        }
        Ok(Self { queues })
    }

    /// Load a JSON array of [`StampedTransform`]s.
    pub fn from_json_file(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(PipelineError::io("read", path))?;
        let transforms: Vec<StampedTransform> = serde_json::from_str(&text)
            .map_err(|e| PipelineError::format(path, e.to_string()))?;
        let source = Self::from_transforms(transforms)
            .map_err(|e| PipelineError::format(path, e.to_string()))?;
        debug!(
            "loaded replay of {} transforms over {} frame pairs from {}",
            source.queues.values().map(VecDeque::len).sum::<usize>(),
            source.queues.len(),
            path.display()
        );
        Ok(source)
    }

    /// Transforms left for a frame pair.
    pub fn remaining(&self, target_frame: &str, source_frame: &str) -> usize {
        self.queues
            .get(&frame_pair(target_frame, source_frame))
            .map_or(0, VecDeque::len)
    }
}

impl PoseSource for ReplayPoseSource {
    fn lookup(
        &mut self,
        target_frame: &str,
        source_frame: &str,
        timeout: Duration,
    ) -> Result<Iso3, PoseLookupError> {
        self.queues
            .get_mut(&frame_pair(target_frame, source_frame))
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| timeout_error(target_frame, source_frame, timeout))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Channel
// ─────────────────────────────────────────────────────────────────────────────

/// Latest-value buffer fed by producer threads over an mpsc channel.
///
/// A lookup first drains everything already sent, then waits for the frame
/// pair until the timeout expires. The latest transform per frame pair is
/// kept, so a stationary robot can be captured repeatedly.
#[derive(Debug)]
pub struct ChannelPoseSource {
    rx: Receiver<StampedTransform>,
    latest: HashMap<FramePair, Iso3>,
    disconnected: bool,
}

impl ChannelPoseSource {
    pub fn new(rx: Receiver<StampedTransform>) -> Self {
        Self {
            rx,
            latest: HashMap::new(),
            disconnected: false,
        }
    }

    /// Create a source together with the sender producers publish into.
    pub fn channel() -> (Sender<StampedTransform>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }

    /// Keep `stamped` as the latest value of its frame pair. A malformed
    /// message is dropped with a warning; the previous value stays.
    fn store(&mut self, stamped: StampedTransform) {
        match stamped.to_isometry() {
            Ok(iso) => {
                self.latest.insert(stamped.key(), iso);
            }
            Err(err) => warn!("dropping published transform: {err}"),
        }
    }

    fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(stamped) => self.store(stamped),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    return;
                }
            }
        }
    }
}

impl PoseSource for ChannelPoseSource {
    fn lookup(
        &mut self,
        target_frame: &str,
        source_frame: &str,
        timeout: Duration,
    ) -> Result<Iso3, PoseLookupError> {
        let key = frame_pair(target_frame, source_frame);
        let deadline = Instant::now() + timeout;

        self.drain();
        loop {
            if let Some(iso) = self.latest.get(&key) {
                return Ok(*iso);
            }
            if self.disconnected {
                return Err(PoseLookupError::Disconnected);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(stamped) => self.store(stamped),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(timeout_error(target_frame, source_frame, timeout));
                }
                Err(RecvTimeoutError::Disconnected) => self.disconnected = true,
            }
        }
    }
}
