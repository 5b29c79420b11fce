//! Metrics Aggregator (SPEC_FULL.md §4.G), grounded on
//! `original_source/saotri_bench/metrics.py`'s `MetricsCollector`.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;

use crate::types::{MetricsReport, OverallResult, PhaseReport, PhaseStatus, TaskStatus};

struct PhaseMetrics {
    attempts: u32,
    final_coverage: f64,
    start: Instant,
    end: Option<Instant>,
    status: PhaseStatus,
}

impl PhaseMetrics {
    fn new() -> Self {
        Self {
            attempts: 0,
            final_coverage: 0.0,
            start: Instant::now(),
            end: None,
            status: PhaseStatus::InProgress,
        }
    }

    fn duration_seconds(&self) -> f64 {
        self.end.unwrap_or_else(Instant::now).duration_since(self.start).as_secs_f64()
    }
}

pub struct MetricsCollector {
    task_id: String,
    agent_id: String,
    start: Instant,
    phases: BTreeMap<u32, PhaseMetrics>,
    total_attempts: u32,
    total_phases: u32,
}

impl MetricsCollector {
    /// `total_phases` is the task's *declared* phase count
    /// (`task.config.phases.len()`), independent of how many phases a given
    /// session actually reaches before completing or hitting a cap — a
    /// session that fails at phase 2 of a 5-phase task must still report
    /// `total_phases=5`, not 3 (SPEC_FULL.md §4.G / Report JSON).
    pub fn new(task_id: impl Into<String>, agent_id: impl Into<String>, total_phases: u32) -> Self {
        Self {
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            start: Instant::now(),
            phases: BTreeMap::new(),
            total_attempts: 0,
            total_phases,
        }
    }

    fn ensure_phase(&mut self, phase_id: u32) -> &mut PhaseMetrics {
        self.phases.entry(phase_id).or_insert_with(PhaseMetrics::new)
    }

    /// Records one completed attempt's coverage against the phase it ran under.
    pub fn record_attempt(&mut self, phase_id: u32, coverage: f64) {
        let phase = self.ensure_phase(phase_id);
        phase.attempts += 1;
        phase.final_coverage = coverage;
        self.total_attempts += 1;
    }

    pub fn complete_phase(&mut self, phase_id: u32) {
        let phase = self.ensure_phase(phase_id);
        phase.status = PhaseStatus::Valid;
        phase.end = Some(Instant::now());
        phase.final_coverage = 1.0;
    }

    pub fn fail_phase(&mut self, phase_id: u32) {
        let phase = self.ensure_phase(phase_id);
        phase.status = PhaseStatus::Failed;
        phase.end = Some(Instant::now());
    }

    pub fn generate_report(&self) -> MetricsReport {
        let total_duration = Instant::now().duration_since(self.start).as_secs_f64();

        let mut phase_reports = Vec::with_capacity(self.phases.len());
        let mut phases_completed = 0u32;
        for (&phase_id, phase) in &self.phases {
            phase_reports.push(PhaseReport {
                phase_id,
                status: phase.status,
                attempts: phase.attempts,
                final_coverage: phase.final_coverage,
                duration_seconds: phase.duration_seconds(),
            });
            if phase.status == PhaseStatus::Valid {
                phases_completed += 1;
            }
        }

        let overall_status = if self.total_phases > 0 && phases_completed == self.total_phases {
            TaskStatus::Completed
        } else if self.phases.values().any(|p| p.status == PhaseStatus::Failed) {
            TaskStatus::Failed
        } else {
            TaskStatus::InProgress
        };

        MetricsReport {
            task_id: self.task_id.clone(),
            agent_id: self.agent_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            phases: phase_reports,
            overall: OverallResult {
                status: overall_status,
                total_attempts: self.total_attempts,
                total_phases: self.total_phases,
                phases_completed,
                total_duration_seconds: total_duration,
            },
        }
    }
}
