//! Calibration session: capture, undo and finalize.
//!
//! A [`Session`] owns the configuration, the pair store and the state. The
//! [`SessionController`] binds a session to a [`PoseSource`] and a solver and
//! drives it from a [`CommandSource`].
//!
//! ```text
//! Idle --capture--> Collecting --finalize--> Calibrating --> Done
//!   ^                   |
//!   +--undo reference---+
//! ```

pub mod command;

pub use command::{Command, CommandSource, ReaderCommands, ScriptedCommands};

use std::thread;

use handeye_core::PosePair;
use handeye_solver::HandEyeSolver;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::codec::{read_pairs, write_pairs, write_result};
use crate::config::SessionConfig;
use crate::error::PipelineError;
use crate::orchestrator::{CalibrationOrchestrator, CalibrationResult};
use crate::pose_source::PoseSource;
use crate::store::{Appended, TransformPairStore};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No pairs captured.
    Idle,
    /// At least the reference pair captured.
    Collecting,
    /// Solver running.
    Calibrating,
    /// Result produced (or solve failed); no further commands are accepted.
    Done,
}

/// What a single command did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Captured { pairs: usize, motions: usize },
    /// A pose lookup failed; nothing was stored.
    CaptureSkipped,
    Undone { remaining: usize },
    NothingToUndo,
    /// `insufficient_data` is set when fewer than `min_motions` motions were
    /// solved from.
    Calibrated { insufficient_data: bool },
    Ignored(char),
    /// The session is done; the command had no effect.
    SessionClosed,
}

/// Mutable state of one calibration session.
#[derive(Debug, Clone)]
pub struct Session {
    config: SessionConfig,
    store: TransformPairStore,
    state: SessionState,
    result: Option<CalibrationResult>,
}

impl Session {
    // ─────────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────────

    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            store: TransformPairStore::new(),
            state: SessionState::Idle,
            result: None,
        }
    }

    /// Start from previously recorded pairs (reference and motions rebuilt).
    pub fn with_pairs(config: SessionConfig, pairs: Vec<PosePair>) -> Self {
        let store = TransformPairStore::from_pairs(pairs);
        let state = if store.is_empty() {
            SessionState::Idle
        } else {
            SessionState::Collecting
        };
        Self {
            config,
            store,
            state,
            result: None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn store(&self) -> &TransformPairStore {
        &self.store
    }

    pub fn result(&self) -> Option<&CalibrationResult> {
        self.result.as_ref()
    }

    /// [`PipelineError::InsufficientData`] if fewer than `min_motions`
    /// motions are stored.
    pub fn data_shortfall(&self) -> Option<PipelineError> {
        let motions = self.store.num_motions();
        let required = self.config.min_motions;
        (motions < required).then_some(PipelineError::InsufficientData { motions, required })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up both pose chains and append the pair.
    ///
    /// A failed lookup on either chain discards the capture with a warning.
    ///
    /// # Errors
    ///
    /// Only [`PipelineError::DataInconsistency`] if the store invariant is
    /// broken after the append.
    pub fn capture<P: PoseSource + ?Sized>(
        &mut self,
        poses: &mut P,
    ) -> Result<StepOutcome, PipelineError> {
        if self.state == SessionState::Done {
            return Ok(StepOutcome::SessionClosed);
        }

        let timeout = self.config.lookup_timeout();
        let frames = &self.config.frames;
        let camera = poses.lookup(&frames.fiducial, &frames.camera, timeout);
        let robot = poses.lookup(&frames.robot_base, &frames.robot_effector, timeout);

        let pair = match (robot, camera) {
            (Ok(robot), Ok(camera)) => PosePair::new(robot, camera),
            (robot, camera) => {
                for err in [robot.err(), camera.err()].into_iter().flatten() {
                    warn!("capture skipped: {err}");
                }
                return Ok(StepOutcome::CaptureSkipped);
            }
        };

        match self.store.append(pair) {
            Appended::Reference => info!("captured reference pair"),
            Appended::Motion { index, .. } => info!("captured motion pair {}", index + 1),
        }
        self.store.check_consistency()?;
        if self.state == SessionState::Idle {
            self.state = SessionState::Collecting;
        }
        self.persist();

        Ok(StepOutcome::Captured {
            pairs: self.store.len(),
            motions: self.store.num_motions(),
        })
    }

    /// Drop the most recent pair. A no-op (with a notice) on an empty store.
    pub fn undo(&mut self) -> Result<StepOutcome, PipelineError> {
        if self.state == SessionState::Done {
            return Ok(StepOutcome::SessionClosed);
        }
        if self.store.remove_last().is_none() {
            info!("nothing to remove");
            return Ok(StepOutcome::NothingToUndo);
        }
        self.store.check_consistency()?;
        if self.store.is_empty() {
            info!("reference pair removed, next capture starts a new reference");
            self.state = SessionState::Idle;
        } else {
            info!(
                "removed last pair, {} pairs ({} motions) left",
                self.store.len(),
                self.store.num_motions()
            );
        }
        self.persist();

        Ok(StepOutcome::Undone {
            remaining: self.store.len(),
        })
    }

    /// Solve from the collected motions, write the result file and close the
    /// session.
    ///
    /// Fewer than `min_motions` motions only warn. The session is closed even
    /// when the solver fails. Finalizing a closed session returns the stored
    /// result without solving or writing again.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Solver`] or [`PipelineError::DataInconsistency`] from
    /// the orchestrator, [`PipelineError::SessionClosed`] if an earlier
    /// finalize failed. A failed result write is logged, not returned.
    pub fn finalize<S: HandEyeSolver>(
        &mut self,
        orchestrator: &CalibrationOrchestrator<S>,
    ) -> Result<&CalibrationResult, PipelineError> {
        if self.state == SessionState::Done {
            return self.result.as_ref().ok_or(PipelineError::SessionClosed);
        }
        self.state = SessionState::Calibrating;

        if let Some(shortfall) = self.data_shortfall() {
            warn!("{shortfall}");
        }

        let estimated =
            orchestrator.estimate(self.store.robot_motions(), self.store.camera_motions());
        let result = match estimated {
            Ok(result) => result,
            Err(err) => {
                self.state = SessionState::Done;
                return Err(err);
            }
        };

        if let Err(err) = write_result(&result, &self.config.result_file) {
            warn!("{err}");
        } else {
            info!("result written to {}", self.config.result_file.display());
        }
        self.state = SessionState::Done;
        Ok(self.result.insert(result))
    }

    fn persist(&self) {
        if let Err(err) = write_pairs(self.store.pairs(), &self.config.record_file) {
            warn!("{err}; continuing with in-memory pairs");
        }
    }
}

/// Drives a [`Session`] from commands, with poses and a solver attached.
pub struct SessionController<P, S> {
    session: Session,
    poses: P,
    orchestrator: CalibrationOrchestrator<S>,
}

impl<P: PoseSource, S: HandEyeSolver> SessionController<P, S> {
    pub fn new(config: SessionConfig, poses: P, solver: S) -> Self {
        Self::with_session(Session::new(config), poses, solver)
    }

    pub fn with_session(session: Session, poses: P, solver: S) -> Self {
        Self {
            session,
            poses,
            orchestrator: CalibrationOrchestrator::new(solver),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn orchestrator(&self) -> &CalibrationOrchestrator<S> {
        &self.orchestrator
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    pub fn handle(&mut self, command: Command) -> Result<StepOutcome, PipelineError> {
        if self.session.state() == SessionState::Done {
            return Ok(StepOutcome::SessionClosed);
        }
        match command {
            Command::Capture => self.session.capture(&mut self.poses),
            Command::Undo => self.session.undo(),
            Command::Finalize => {
                let insufficient_data = self.session.data_shortfall().is_some();
                self.session.finalize(&self.orchestrator)?;
                Ok(StepOutcome::Calibrated { insufficient_data })
            }
            Command::Unknown(c) => {
                info!("'{c}' is not a command (s: capture, d: undo, q: finalize)");
                Ok(StepOutcome::Ignored(c))
            }
        }
    }

    /// Process commands until the session is done or the input runs out.
    ///
    /// Returns the result if the session was finalized. Running out of input
    /// first leaves the captured pairs in the record file.
    pub fn run<C: CommandSource + ?Sized>(
        &mut self,
        commands: &mut C,
    ) -> Result<Option<CalibrationResult>, PipelineError> {
        info!("s: capture pose pair, d: remove last pair, q: calibrate and quit");
        let poll = self.session.config().poll_interval();

        while self.session.state() != SessionState::Done {
            let Some(command) = commands.next_command() else {
                warn!(
                    "command input closed before finalize; {} pairs kept in {}",
                    self.session.store().len(),
                    self.session.config().record_file.display()
                );
                break;
            };
            self.handle(command)?;
            if self.session.state() != SessionState::Done && !poll.is_zero() {
                thread::sleep(poll);
            }
        }
        Ok(self.session.result().cloned())
    }
}

/// Load recorded pairs and calibrate without interactive capture.
///
/// # Errors
///
/// Fails if the load file cannot be read or parsed, or if the solver fails.
pub fn calibrate_from_file<S: HandEyeSolver>(
    config: SessionConfig,
    solver: S,
) -> Result<CalibrationResult, PipelineError> {
    let pairs = read_pairs(&config.load_file)?;
    info!(
        "loaded {} transform pairs from {}",
        pairs.len(),
        config.load_file.display()
    );
    let mut session = Session::with_pairs(config, pairs);
    session
        .finalize(&CalibrationOrchestrator::new(solver))
        .cloned()
}
