//! Workspace Protocol (SPEC_FULL.md §4.F): a file-based mailbox between the
//! harness and the agent.
//!
//! Every harness→agent document is written via a write-temp-then-rename
//! pattern so a concurrent reader never observes a half-written file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;

use crate::error::BenchError;
use crate::types::{Feedback, InitialTaskMessage, PhaseMessage, TaskConfig};

pub struct Workspace {
    dir: PathBuf,
    pretty: bool,
}

impl Workspace {
    pub fn new(dir: PathBuf, pretty: bool) -> Self {
        Self { dir, pretty }
    }

    pub fn problem_file(&self) -> PathBuf {
        self.dir.join("problem.md")
    }

    pub fn task_file(&self) -> PathBuf {
        self.dir.join("task.json")
    }

    pub fn phase_file(&self) -> PathBuf {
        self.dir.join("phase.json")
    }

    pub fn solution_file(&self) -> PathBuf {
        self.dir.join("solution.phase")
    }

    pub fn feedback_file(&self) -> PathBuf {
        self.dir.join("feedback.json")
    }

    pub fn report_file(&self) -> PathBuf {
        self.dir.join("report.json")
    }

    /// Writes the write-once `problem.md` and `task.json` documents, the
    /// initial `phase.json`, and an empty solution file if one doesn't
    /// already exist (SPEC_FULL.md §4.F `setup_workspace`).
    pub fn setup(&self, config: &TaskConfig, problem: &str) -> Result<(), BenchError> {
        fs::create_dir_all(&self.dir).map_err(|e| self.io_err(&self.dir, e))?;

        self.write_atomic(&self.problem_file(), problem.as_bytes())?;

        let initial = InitialTaskMessage {
            task_id: config.id.clone(),
            problem: problem.to_string(),
            interface: config.interface.clone(),
            limits: crate::types::TaskLimitsMessage {
                total_phases: config.phases.len() as u32,
                max_attempts_per_phase: config.limits.max_attempts_per_phase,
                max_total_attempts: config.limits.max_total_attempts,
            },
        };
        self.write_json(&self.task_file(), &initial)?;

        self.write_phase_info(&config.id, config.phases[0].id, &config.phases[0].rules, false, None, None)?;

        let solution_path = self.solution_file();
        if !solution_path.exists() {
            self.write_atomic(&solution_path, b"")?;
        }

        Ok(())
    }

    /// Rewrites `phase.json` on every phase transition.
    pub fn write_phase_info(
        &self,
        task_id: &str,
        phase_id: u32,
        rules: &[crate::types::Rule],
        phase_transition: bool,
        previous_feedback: Option<Feedback>,
        implicit_evaluation: Option<Feedback>,
    ) -> Result<(), BenchError> {
        let message = PhaseMessage {
            task_id: task_id.to_string(),
            phase_id,
            phase_transition,
            rules: rules
                .iter()
                .map(|r| crate::types::RuleDescriptor {
                    id: r.id.clone(),
                    description: r.description.clone(),
                })
                .collect(),
            previous_feedback,
            implicit_evaluation,
        };
        self.write_json(&self.phase_file(), &message)
    }

    pub fn write_feedback(&self, feedback: &Feedback) -> Result<(), BenchError> {
        self.write_json(&self.feedback_file(), feedback)
    }

    pub fn write_report(&self, report: &crate::types::MetricsReport) -> Result<(), BenchError> {
        self.write_json(&self.report_file(), report)
    }

    /// Returns the candidate source, or an empty string if the solution file
    /// doesn't exist yet.
    pub fn read_solution(&self) -> Result<String, BenchError> {
        let path = self.solution_file();
        if !path.exists() {
            return Ok(String::new());
        }
        fs::read_to_string(&path).map_err(|e| self.io_err(&path, e))
    }

    /// Modification time of the solution file, or `None` if it doesn't exist.
    pub fn solution_mtime(&self) -> Result<Option<SystemTime>, BenchError> {
        let path = self.solution_file();
        if !path.exists() {
            return Ok(None);
        }
        let meta = fs::metadata(&path).map_err(|e| self.io_err(&path, e))?;
        meta.modified().map(Some).map_err(|e| self.io_err(&path, e))
    }

    fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<(), BenchError> {
        let body = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .map_err(|e| BenchError::Workspace {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        self.write_atomic(path, body.as_bytes())
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), BenchError> {
        let parent = path.parent().unwrap_or(&self.dir);
        fs::create_dir_all(parent).map_err(|e| self.io_err(parent, e))?;

        let temp_file = NamedTempFile::new_in(parent).map_err(|e| self.io_err(parent, e))?;
        fs::write(temp_file.path(), contents).map_err(|e| self.io_err(path, e))?;

        let file = fs::File::open(temp_file.path()).map_err(|e| self.io_err(path, e))?;
        file.sync_all().map_err(|e| self.io_err(path, e))?;

        temp_file.persist(path).map_err(|e| self.io_err(path, e.error))?;
        Ok(())
    }

    fn io_err(&self, path: &Path, source: std::io::Error) -> BenchError {
        BenchError::Workspace {
            path: path.to_path_buf(),
            source,
        }
    }
}
