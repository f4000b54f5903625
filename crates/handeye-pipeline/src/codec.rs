//! Record and result files.
//!
//! Record file (raw pairs only, motions are recomputed on load):
//!
//! ```json
//! { "frameCount": 2, "T1_0": [[...4]...4], "T2_0": [[...]], "T1_1": ..., "T2_1": ... }
//! ```
//!
//! `T1_i` is the robot pose `base_se3_effector` of capture `i`, `T2_i` the
//! camera pose `fiducial_se3_camera`, both as row-major 4×4 arrays.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use handeye_core::{
    iso_from_matrix_projected, iso_to_matrix, matrix_from_rows, matrix_to_rows, Iso3, MatRows,
    PosePair, Real, RigidityError,
};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PipelineError;
use crate::orchestrator::CalibrationResult;

pub const FRAME_COUNT_KEY: &str = "frameCount";

/// Key of the robot pose block of capture `i`.
pub fn robot_key(i: usize) -> String {
    format!("T1_{i}")
}

/// Key of the camera pose block of capture `i`.
pub fn camera_key(i: usize) -> String {
    format!("T2_{i}")
}

fn write_json(value: &impl Serialize, path: &Path) -> Result<(), PipelineError> {
    let file = File::create(path).map_err(PipelineError::io("create", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| PipelineError::io("write", path)(e.into()))?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .map_err(PipelineError::io("write", path))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    let text = std::fs::read_to_string(path).map_err(PipelineError::io("read", path))?;
    serde_json::from_str(&text).map_err(|e| PipelineError::format(path, e.to_string()))
}

/// Overwrite `path` with the full pair sequence.
pub fn write_pairs(pairs: &[PosePair], path: &Path) -> Result<(), PipelineError> {
    let mut doc = Map::new();
    doc.insert(FRAME_COUNT_KEY.to_string(), Value::from(pairs.len()));
    for (i, pair) in pairs.iter().enumerate() {
        doc.insert(robot_key(i), rows_value(&pair.robot));
        doc.insert(camera_key(i), rows_value(&pair.camera));
    }
    write_json(&Value::Object(doc), path)?;
    debug!("wrote {} transform pairs to {}", pairs.len(), path.display());
    Ok(())
}

fn rows_value(iso: &Iso3) -> Value {
    let rows = matrix_to_rows(&iso_to_matrix(iso));
    Value::Array(
        rows.iter()
            .map(|row| Value::Array(row.iter().map(|&v| Value::from(v)).collect()))
            .collect(),
    )
}

/// Read a pair sequence written by [`write_pairs`].
///
/// Blocks are read in index order; a missing or ill-shaped block is a
/// [`PipelineError::Format`] naming the key.
pub fn read_pairs(path: &Path) -> Result<Vec<PosePair>, PipelineError> {
    let doc: Map<String, Value> = read_json(path)?;
    let count = doc
        .get(FRAME_COUNT_KEY)
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            PipelineError::format(path, format!("missing or invalid `{FRAME_COUNT_KEY}`"))
        })?;
    // Each pair needs two blocks; a larger count cannot be satisfied.
    let blocks = doc.len() - 1;
    let count = usize::try_from(count)
        .ok()
        .filter(|&n| n <= blocks / 2 + blocks % 2)
        .ok_or_else(|| {
            PipelineError::format(
                path,
                format!("`{FRAME_COUNT_KEY}` is {count} but the file holds {blocks} blocks"),
            )
        })?;

    let mut pairs = Vec::with_capacity(count);
    for i in 0..count {
        let robot = read_block(&doc, &robot_key(i), path)?;
        let camera = read_block(&doc, &camera_key(i), path)?;
        pairs.push(PosePair::new(robot, camera));
    }
    debug!("read {} transform pairs from {}", pairs.len(), path.display());
    Ok(pairs)
}

fn read_block(doc: &Map<String, Value>, key: &str, path: &Path) -> Result<Iso3, PipelineError> {
    let value = doc
        .get(key)
        .ok_or_else(|| PipelineError::format(path, format!("missing block `{key}`")))?;
    let rows: MatRows = serde_json::from_value(value.clone())
        .map_err(|e| PipelineError::format(path, format!("block `{key}`: {e}")))?;
    iso_from_matrix_projected(&matrix_from_rows(&rows))
        .map_err(|e| PipelineError::format(path, format!("block `{key}`: {e}")))
}

/// Structured result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFile {
    /// `[tx, ty, tz, qx, qy, qz, qw]` of `effector_se3_camera`.
    #[serde(rename = "handToEyeTF")]
    pub hand_to_eye_tf: [Real; 7],
    #[serde(rename = "handToEyeTransform")]
    pub hand_to_eye_transform: MatRows,
    pub initial_cost: Real,
    pub final_cost: Real,
    pub change_cost: Real,
    pub termination_type: String,
    pub num_successful_iteration: usize,
    pub num_unsuccessful_iteration: usize,
    pub num_iteration: usize,
}

impl ResultFile {
    pub fn from_result(result: &CalibrationResult) -> Self {
        let x = &result.effector_se3_camera;
        let t = x.translation.vector;
        let q = x.rotation.quaternion().coords; // (i, j, k, w)
        let report = &result.report;
        Self {
            hand_to_eye_tf: [t.x, t.y, t.z, q.x, q.y, q.z, q.w],
            hand_to_eye_transform: matrix_to_rows(&iso_to_matrix(x)),
            initial_cost: report.initial_cost,
            final_cost: report.final_cost,
            change_cost: report.change_cost(),
            termination_type: report.termination.to_string(),
            num_successful_iteration: report.num_successful_steps,
            num_unsuccessful_iteration: report.num_unsuccessful_steps,
            num_iteration: report.num_iterations(),
        }
    }

    /// The stored transform, from its matrix form.
    pub fn transform(&self) -> Result<Iso3, RigidityError> {
        iso_from_matrix_projected(&matrix_from_rows(&self.hand_to_eye_transform))
    }
}

pub fn write_result(result: &CalibrationResult, path: &Path) -> Result<(), PipelineError> {
    write_json(&ResultFile::from_result(result), path)?;
    debug!("wrote calibration result to {}", path.display());
    Ok(())
}

pub fn read_result(path: &Path) -> Result<ResultFile, PipelineError> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use handeye_core::Vec3;
    use handeye_solver::{SolverReport, TerminationType};
    use tempfile::tempdir;

    fn sample_pairs() -> Vec<PosePair> {
        (0..3)
            .map(|i| {
                let s = i as f64 * 0.25;
                PosePair::new(
                    Iso3::new(Vec3::new(0.4, -s, 0.3), Vec3::new(s, 0.1, 0.0)),
                    Iso3::new(Vec3::new(s, 0.0, 0.8), Vec3::new(0.0, -s, 0.2)),
                )
            })
            .collect()
    }

    #[test]
    fn record_file_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pairs.json");
        write_pairs(&sample_pairs(), &path).unwrap();

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["frameCount"], 3);
        assert_eq!(doc["T1_2"].as_array().unwrap().len(), 4);
        assert_eq!(doc["T2_0"][3], serde_json::json!([0.0, 0.0, 0.0, 1.0]));
        assert!(doc.get("T1_3").is_none());
    }

    #[test]
    fn empty_sequence_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.json");
        write_pairs(&[], &path).unwrap();
        assert!(read_pairs(&path).unwrap().is_empty());
    }

    #[test]
    fn missing_block_names_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        write_pairs(&sample_pairs(), &path).unwrap();

        let mut doc: Map<String, Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        doc.remove("T2_1");
        std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

        let err = read_pairs(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Format { .. }));
        assert!(err.to_string().contains("T2_1"));
    }

    #[test]
    fn oversized_frame_count_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.json");
        write_pairs(&sample_pairs(), &path).unwrap();

        for bogus in [u64::MAX, 1_000_000_000_000, 4] {
            let mut doc: Map<String, Value> =
                serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
            doc.insert(FRAME_COUNT_KEY.to_string(), Value::from(bogus));
            let broken = dir.path().join(format!("huge-{bogus}.json"));
            std::fs::write(&broken, serde_json::to_string(&doc).unwrap()).unwrap();

            let err = read_pairs(&broken).unwrap_err();
            assert!(matches!(err, PipelineError::Format { .. }), "{err}");
            assert!(err.to_string().contains("frameCount"));
            assert!(err.to_string().contains("huge-"));
        }
    }

    #[test]
    fn ill_shaped_block_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shape.json");
        std::fs::write(
            &path,
            r#"{ "frameCount": 1, "T1_0": [[1, 0, 0], [0, 1, 0]], "T2_0": [] }"#,
        )
        .unwrap();
        let err = read_pairs(&path).unwrap_err();
        assert!(err.to_string().contains("T1_0"));
    }

    #[test]
    fn missing_file_is_io_error_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.json");
        let err = read_pairs(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
        assert!(err.to_string().contains("nope.json"));
    }

    #[test]
    fn result_file_fields() {
        let x = Iso3::new(Vec3::new(0.01, 0.02, 0.1), Vec3::new(0.0, 0.0, 0.3));
        let result = CalibrationResult {
            effector_se3_camera: x,
            report: SolverReport {
                initial_cost: 3.0,
                final_cost: 1.0,
                termination: TerminationType::Convergence,
                message: String::new(),
                num_successful_steps: 7,
                num_unsuccessful_steps: 2,
            },
        };
        let dir = tempdir().unwrap();
        let path = dir.path().join("result.json");
        write_result(&result, &path).unwrap();

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["termination_type"], "CONVERGENCE");
        assert_eq!(doc["num_iteration"], 9);
        assert_eq!(doc["change_cost"], 2.0);
        assert_eq!(doc["handToEyeTF"].as_array().unwrap().len(), 7);

        let back = read_result(&path).unwrap();
        let tf = back.hand_to_eye_tf;
        assert!((tf[2] - 0.1).abs() < 1e-12);
        assert!((tf[5] - (0.15f64).sin()).abs() < 1e-12);
        assert!((tf[6] - (0.15f64).cos()).abs() < 1e-12);
        let restored = back.transform().unwrap();
        assert!((restored.to_homogeneous() - x.to_homogeneous()).norm() < 1e-12);
    }
}
