//! Ordered pose pairs plus the motion lists derived from them.

use handeye_core::{PosePair, RelativeMotion};

use crate::error::PipelineError;
use crate::reducer::Reference;

/// What an [`TransformPairStore::append`] added.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Appended {
    /// The pair became the reference; no motion was produced.
    Reference,
    /// The pair produced motion `index` in both lists.
    Motion {
        index: usize,
        robot: RelativeMotion,
        camera: RelativeMotion,
    },
}

/// Pose pairs of a session with index-aligned robot and camera motions.
///
/// Whenever the store is non-empty, `pairs[0]` is the reference and both
/// motion lists hold `len() - 1` entries. Every mutation keeps all three in
/// step.
#[derive(Debug, Clone, Default)]
pub struct TransformPairStore {
    pairs: Vec<PosePair>,
    reference: Option<Reference>,
    robot_motions: Vec<RelativeMotion>,
    camera_motions: Vec<RelativeMotion>,
}

impl TransformPairStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store (reference and motions included) from raw pairs.
    pub fn from_pairs(pairs: Vec<PosePair>) -> Self {
        let mut store = Self::new();
        for pair in pairs {
            store.append(pair);
        }
        store
    }

    pub fn append(&mut self, pair: PosePair) -> Appended {
        let appended = match &self.reference {
            None => {
                self.reference = Some(Reference::new(&pair));
                Appended::Reference
            }
            Some(reference) => {
                let (robot, camera) = reference.relative(&pair);
                self.robot_motions.push(robot);
                self.camera_motions.push(camera);
                Appended::Motion {
                    index: self.robot_motions.len() - 1,
                    robot,
                    camera,
                }
            }
        };
        self.pairs.push(pair);
        appended
    }

    /// Remove the most recent pair. `None` when the store is empty.
    ///
    /// Removing the last remaining pair clears the reference.
    pub fn remove_last(&mut self) -> Option<PosePair> {
        let pair = self.pairs.pop()?;
        if self.pairs.is_empty() {
            self.reference = None;
        } else {
            self.robot_motions.pop();
            self.camera_motions.pop();
        }
        Some(pair)
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Number of raw pairs, reference included.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of motion pairs handed to the solver.
    pub fn num_motions(&self) -> usize {
        self.robot_motions.len()
    }

    pub fn pairs(&self) -> &[PosePair] {
        &self.pairs
    }

    pub fn reference(&self) -> Option<&Reference> {
        self.reference.as_ref()
    }

    pub fn robot_motions(&self) -> &[RelativeMotion] {
        &self.robot_motions
    }

    pub fn camera_motions(&self) -> &[RelativeMotion] {
        &self.camera_motions
    }

    /// Verify the length invariant between pairs and motion lists.
    pub fn check_consistency(&self) -> Result<(), PipelineError> {
        let expected = self.pairs.len().saturating_sub(1);
        if self.robot_motions.len() != expected || self.camera_motions.len() != expected {
            return Err(PipelineError::DataInconsistency(format!(
                "{} pairs but {} robot / {} camera motions",
                self.pairs.len(),
                self.robot_motions.len(),
                self.camera_motions.len()
            )));
        }
        if self.reference.is_some() == self.pairs.is_empty() {
            return Err(PipelineError::DataInconsistency(format!(
                "reference presence does not match {} stored pairs",
                self.pairs.len()
            )));
        }
        Ok(())
    }
}
