use chrono::{DateTime, Utc};
use serde::Serialize;

/// Overall status of a reload operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    RolledBack,
}

/// The seven staged steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadStep {
    ValidateNewPlugin,
    BackupCurrent,
    QuiesceOld,
    ShutdownOld,
    RegisterNew,
    InitializeNew,
    UpdateDependencies,
}

impl ReloadStep {
    pub const ORDER: [ReloadStep; 7] = [
        ReloadStep::ValidateNewPlugin,
        ReloadStep::BackupCurrent,
        ReloadStep::QuiesceOld,
        ReloadStep::ShutdownOld,
        ReloadStep::RegisterNew,
        ReloadStep::InitializeNew,
        ReloadStep::UpdateDependencies,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ReloadStep::ValidateNewPlugin => "validate_new_plugin",
            ReloadStep::BackupCurrent => "backup_current",
            ReloadStep::QuiesceOld => "quiesce_old",
            ReloadStep::ShutdownOld => "shutdown_old",
            ReloadStep::RegisterNew => "register_new",
            ReloadStep::InitializeNew => "initialize_new",
            ReloadStep::UpdateDependencies => "update_dependencies",
        }
    }

    /// Cancellation is permitted strictly before this step begins.
    pub fn is_point_of_no_return(&self) -> bool {
        matches!(self, ReloadStep::RegisterNew)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: ReloadStep,
    pub status: StepStatus,
    pub detail: Option<String>,
}

/// A single reload's full audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadOperation {
    pub id: String,
    pub plugin_name: String,
    pub old_version: Option<String>,
    pub new_version: String,
    pub status: ReloadStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub steps: Vec<StepRecord>,
    pub affected_plugins: Vec<String>,
}

impl ReloadOperation {
    pub fn new(id: String, plugin_name: String, old_version: Option<String>, new_version: String, start_time: DateTime<Utc>) -> Self {
        Self {
            id,
            plugin_name,
            old_version,
            new_version,
            status: ReloadStatus::Pending,
            start_time,
            end_time: None,
            steps: ReloadStep::ORDER
                .iter()
                .map(|&step| StepRecord { step, status: StepStatus::Pending, detail: None })
                .collect(),
            affected_plugins: Vec::new(),
        }
    }

    pub fn mark_step(&mut self, step: ReloadStep, status: StepStatus, detail: Option<String>) {
        if let Some(record) = self.steps.iter_mut().find(|r| r.step == step) {
            record.status = status;
            record.detail = detail;
        }
    }
}
