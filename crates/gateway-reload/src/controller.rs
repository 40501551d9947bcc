//! Staged hot-reload protocol: validate, backup, quiesce,
//! shutdown, register, initialize, update-dependencies, with cancellation up
//! to the point of no return and auto-rollback on failure.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gateway_adapter::capability::AdapterCapability;
use gateway_context::context::{RequestContext, RequestIdentity, ResourceSnapshot};
use gateway_protocol::definitions::CapabilityManifest;
use gateway_registry::registry::ServiceRegistry;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::ReloadError;
use crate::operation::{ReloadOperation, ReloadStatus, ReloadStep, StepStatus};

#[derive(Debug, Clone)]
pub struct ReloadConfig {
    pub max_concurrent_reloads: usize,
    pub require_version_upgrade: bool,
    pub backup_retention_period: Duration,
    pub reload_timeout: Duration,
    pub auto_rollback_on_failure: bool,
    pub history_limit: usize,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reloads: 2,
            require_version_upgrade: true,
            backup_retention_period: Duration::from_secs(24 * 3600),
            reload_timeout: Duration::from_secs(30),
            auto_rollback_on_failure: true,
            history_limit: 200,
        }
    }
}

/// Snapshot retained by `backup_current`
struct Backup {
    manifest: CapabilityManifest,
    config: HashMap<String, Value>,
    adapter: Arc<dyn AdapterCapability>,
    weight: f64,
    #[allow(dead_code)]
    created_at: chrono::DateTime<Utc>,
}

/// Orchestrates a single plugin's version swap without dropping in-flight
/// traffic. One controller per gateway process, shared via `Arc` with the
/// admin HTTP surface and the `SIGHUP` handler.
pub struct HotReloadController {
    registry: Arc<ServiceRegistry>,
    config: ReloadConfig,
    active: parking_lot::Mutex<HashMap<String, (ReloadOperation, CancellationToken)>>,
    history: parking_lot::Mutex<VecDeque<ReloadOperation>>,
    backups: parking_lot::Mutex<HashMap<String, Backup>>,
}

fn probe_ctx() -> RequestContext {
    RequestContext::new(
        RequestIdentity::new(None, None, None, None),
        None,
        ResourceSnapshot { memory_bytes: 0, task_count: 0 },
    )
}

/// Parses a dotted version string into comparable numeric components;
/// non-numeric components fall back to a lexicographic comparison of the
/// raw strings so malformed versions still produce a deterministic (if not
/// semantically meaningful) ordering rather than a panic.
fn version_less_than(old: &str, new: &str) -> bool {
    fn parts(v: &str) -> Option<Vec<u64>> {
        v.trim_start_matches('v').split('.').map(|p| p.parse().ok()).collect()
    }
    match (parts(old), parts(new)) {
        (Some(a), Some(b)) => a < b,
        _ => old < new,
    }
}

impl HotReloadController {
    pub fn new(registry: Arc<ServiceRegistry>, config: ReloadConfig) -> Self {
        Self {
            registry,
            config,
            active: parking_lot::Mutex::new(HashMap::new()),
            history: parking_lot::Mutex::new(VecDeque::new()),
            backups: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn get_status(&self, op_id: &str) -> Option<ReloadOperation> {
        if let Some((op, _)) = self.active.lock().values().find(|(op, _)| op.id == op_id) {
            return Some(op.clone());
        }
        self.history.lock().iter().find(|op| op.id == op_id).cloned()
    }

    pub fn get_active_reloads(&self) -> Vec<ReloadOperation> {
        self.active.lock().values().map(|(op, _)| op.clone()).collect()
    }

    pub fn history(&self) -> Vec<ReloadOperation> {
        self.history.lock().iter().cloned().collect()
    }

    /// Cancels an in-flight reload. Returns `false` if the reload isn't
    /// active or has already passed `register_new`, the point of no return.
    pub fn cancel(&self, plugin_name: &str) -> bool {
        let active = self.active.lock();
        match active.get(plugin_name) {
            Some((op, token)) if !op.steps.iter().any(|s| s.step == ReloadStep::RegisterNew && s.status != StepStatus::Pending) => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Runs the full seven-step protocol for swapping `plugin_name` to
    /// `new_adapter`. `service_type` identifies the registry bucket the new
    /// adapter joins (it must match the old adapter's, if one exists).
    pub async fn reload(
        &self,
        service_type: &str,
        plugin_name: &str,
        new_adapter: Arc<dyn AdapterCapability>,
        weight: f64,
        new_config: HashMap<String, Value>,
    ) -> Result<ReloadOperation, ReloadError> {
        {
            let active = self.active.lock();
            if active.len() >= self.config.max_concurrent_reloads {
                return Err(ReloadError::ValidationFailed(format!(
                    "max_concurrent_reloads ({}) reached",
                    self.config.max_concurrent_reloads
                )));
            }
            if active.contains_key(plugin_name) {
                return Err(ReloadError::DuplicateReload(plugin_name.to_string()));
            }
        }

        let existing = self.registry.find_by_name(service_type, plugin_name);
        let old_version = existing.as_ref().map(|r| r.adapter.metadata().version.clone());
        let new_version = new_adapter.metadata().version.clone();

        let op_id = Uuid::new_v4().to_string();
        let mut op = ReloadOperation::new(op_id.clone(), plugin_name.to_string(), old_version.clone(), new_version.clone(), Utc::now());
        op.status = ReloadStatus::InProgress;

        let token = CancellationToken::new();
        self.active.lock().insert(plugin_name.to_string(), (op.clone(), token.clone()));

        // `run_steps` records the terminal status (`Completed`, `Failed`, or
        // `RolledBack`) directly on `op` as it goes; the `Result` here only
        // distinguishes "ran to a terminal status" from "never attempted"
        // (duplicate/max-concurrent rejections, handled above).
        self.run_steps(service_type, plugin_name, &existing, Arc::clone(&new_adapter), weight, new_config, &mut op, &token).await;
        if op.status == ReloadStatus::InProgress {
            op.status = ReloadStatus::Completed;
        }
        op.end_time = Some(Utc::now());

        self.active.lock().remove(plugin_name);
        self.push_history(op.clone());
        Ok(op)
    }

    fn push_history(&self, op: ReloadOperation) {
        let mut history = self.history.lock();
        history.push_back(op);
        while history.len() > self.config.history_limit {
            history.pop_front();
        }
    }

    async fn run_steps(
        &self,
        service_type: &str,
        plugin_name: &str,
        existing: &Option<Arc<gateway_registry::record::RegisteredService>>,
        new_adapter: Arc<dyn AdapterCapability>,
        weight: f64,
        new_config: HashMap<String, Value>,
        op: &mut ReloadOperation,
        token: &CancellationToken,
    ) {
        // Step 1: validate_new_plugin
        self.record_step(plugin_name, op, ReloadStep::ValidateNewPlugin, StepStatus::Running, None);
        if new_adapter.metadata().name.is_empty() || new_adapter.metadata().version.is_empty() {
            self.record_step(plugin_name, op, ReloadStep::ValidateNewPlugin, StepStatus::Failed, Some("name/version missing".into()));
            self.set_status(plugin_name, op, ReloadStatus::Failed);
            return;
        }
        for tool in new_adapter.get_tools() {
            if !tool.input_schema.is_object() {
                self.record_step(
                    plugin_name,
                    op,
                    ReloadStep::ValidateNewPlugin,
                    StepStatus::Failed,
                    Some(format!("tool '{}' has a non-object inputSchema", tool.name)),
                );
                self.set_status(plugin_name, op, ReloadStatus::Failed);
                return;
            }
        }
        if self.config.require_version_upgrade {
            if let Some(old_version) = &op.old_version {
                if !version_less_than(old_version, &new_adapter.metadata().version) {
                    self.record_step(
                        plugin_name,
                        op,
                        ReloadStep::ValidateNewPlugin,
                        StepStatus::Failed,
                        Some("new_version must exceed old_version".into()),
                    );
                    self.set_status(plugin_name, op, ReloadStatus::Failed);
                    return;
                }
            }
        }
        self.record_step(plugin_name, op, ReloadStep::ValidateNewPlugin, StepStatus::Succeeded, None);
        if self.check_cancelled(token, op) {
            self.set_status(plugin_name, op, ReloadStatus::Failed);
            return;
        }

        // Step 2: backup_current
        self.record_step(plugin_name, op, ReloadStep::BackupCurrent, StepStatus::Running, None);
        if let Some(old) = existing {
            let backup = Backup {
                manifest: CapabilityManifest {
                    tools: old.adapter.get_tools(),
                    resources: old.adapter.get_resources(),
                    prompts: old.adapter.get_prompts(),
                },
                config: old.adapter.metadata().config.clone(),
                adapter: Arc::clone(&old.adapter),
                weight: old.weight,
                created_at: Utc::now(),
            };
            self.backups.lock().insert(plugin_name.to_string(), backup);
        }
        self.record_step(plugin_name, op, ReloadStep::BackupCurrent, StepStatus::Succeeded, None);
        if self.check_cancelled(token, op) {
            self.set_status(plugin_name, op, ReloadStatus::Failed);
            return;
        }

        // Step 3: quiesce_old
        self.record_step(plugin_name, op, ReloadStep::QuiesceOld, StepStatus::Running, None);
        if let Some(old) = existing {
            old.adapter.quiesce();
        }
        self.record_step(plugin_name, op, ReloadStep::QuiesceOld, StepStatus::Succeeded, None);
        if self.check_cancelled(token, op) {
            self.set_status(plugin_name, op, ReloadStatus::Failed);
            return;
        }

        // Step 4: shutdown_old
        self.record_step(plugin_name, op, ReloadStep::ShutdownOld, StepStatus::Running, None);
        if let Some(old) = existing {
            let ctx = probe_ctx();
            match tokio::time::timeout(self.config.reload_timeout, old.adapter.stop(&ctx)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::warn!(plugin_name, error = %err, "old adapter stop() returned an error; continuing reload"),
                Err(_) => tracing::warn!(plugin_name, "old adapter stop() did not complete within reload_timeout"),
            }
        }
        self.record_step(plugin_name, op, ReloadStep::ShutdownOld, StepStatus::Succeeded, None);
        if self.check_cancelled(token, op) {
            self.set_status(plugin_name, op, ReloadStatus::Failed);
            return;
        }

        // Step 5: register_new — the point of no return. From here on,
        // failures trigger rollback rather than cancellation.
        self.record_step(plugin_name, op, ReloadStep::RegisterNew, StepStatus::Running, None);
        if existing.is_some() {
            let _ = self.registry.deregister(&existing.as_ref().unwrap().adapter.metadata().id);
        }
        if let Err(err) = self.registry.register(Arc::clone(&new_adapter), weight) {
            self.record_step(plugin_name, op, ReloadStep::RegisterNew, StepStatus::Failed, Some(err.to_string()));
            self.rollback(service_type, plugin_name, op).await;
            if op.status != ReloadStatus::RolledBack {
                self.set_status(plugin_name, op, ReloadStatus::Failed);
            }
            return;
        }
        self.record_step(plugin_name, op, ReloadStep::RegisterNew, StepStatus::Succeeded, None);

        // Step 6: initialize_new + health_check
        self.record_step(plugin_name, op, ReloadStep::InitializeNew, StepStatus::Running, None);
        let ctx = probe_ctx();
        let init_result = async {
            new_adapter.initialize(new_config).await?;
            new_adapter.start(&ctx).await?;
            new_adapter.health_check(&ctx).await
        }
        .await;
        match init_result {
            Ok(()) => {
                self.record_step(plugin_name, op, ReloadStep::InitializeNew, StepStatus::Succeeded, None);
            }
            Err(err) => {
                self.record_step(plugin_name, op, ReloadStep::InitializeNew, StepStatus::Failed, Some(err.to_string()));
                self.rollback(service_type, plugin_name, op).await;
                if op.status != ReloadStatus::RolledBack {
                    self.set_status(plugin_name, op, ReloadStatus::Failed);
                }
                return;
            }
        }

        // Step 7: update_dependencies
        self.record_step(plugin_name, op, ReloadStep::UpdateDependencies, StepStatus::Running, None);
        op.affected_plugins = self.registry.reverse_dependents(plugin_name);
        for dependent in &op.affected_plugins {
            tracing::info!(plugin_name, dependent, "notifying reverse-dependent of reload");
        }
        self.record_step(plugin_name, op, ReloadStep::UpdateDependencies, StepStatus::Succeeded, None);

        self.evict_expired_backups();
    }

    /// Mutates `op`'s step record and mirrors the change into the `active`
    /// map so `get_status`/`get_active_reloads` observe real-time progress
    /// instead of the pre-run_steps snapshot taken at submission time.
    fn record_step(&self, plugin_name: &str, op: &mut ReloadOperation, step: ReloadStep, status: StepStatus, detail: Option<String>) {
        op.mark_step(step, status, detail);
        self.sync_active(plugin_name, op);
    }

    fn set_status(&self, plugin_name: &str, op: &mut ReloadOperation, status: ReloadStatus) {
        op.status = status;
        self.sync_active(plugin_name, op);
    }

    fn sync_active(&self, plugin_name: &str, op: &ReloadOperation) {
        if let Some(entry) = self.active.lock().get_mut(plugin_name) {
            entry.0 = op.clone();
        }
    }

    fn check_cancelled(&self, token: &CancellationToken, op: &ReloadOperation) -> bool {
        if token.is_cancelled() {
            tracing::info!(plugin_name = %op.plugin_name, "reload cancelled before point of no return");
            true
        } else {
            false
        }
    }

    /// Auto-rollback: re-registers and re-initializes the
    /// backed-up adapter, leaving the operation `rolled_back`.
    async fn rollback(&self, service_type: &str, plugin_name: &str, op: &mut ReloadOperation) {
        if !self.config.auto_rollback_on_failure {
            return;
        }
        let Some(backup) = self.backups.lock().remove(plugin_name) else {
            tracing::warn!(plugin_name, "rollback requested but no backup is available");
            self.set_status(plugin_name, op, ReloadStatus::Failed);
            return;
        };
        if self.registry.find_by_name(service_type, plugin_name).is_none() {
            if let Err(err) = self.registry.register(Arc::clone(&backup.adapter), backup.weight) {
                tracing::error!(plugin_name, error = %err, "rollback failed to re-register backed-up adapter");
                self.set_status(plugin_name, op, ReloadStatus::Failed);
                return;
            }
        }
        let ctx = probe_ctx();
        if let Err(err) = backup.adapter.initialize(backup.config.clone()).await {
            tracing::error!(plugin_name, error = %err, "rollback failed to re-initialize backed-up adapter");
            self.set_status(plugin_name, op, ReloadStatus::Failed);
            return;
        }
        if let Err(err) = backup.adapter.start(&ctx).await {
            tracing::error!(plugin_name, error = %err, "rollback failed to restart backed-up adapter");
            self.set_status(plugin_name, op, ReloadStatus::Failed);
            return;
        }
        self.set_status(plugin_name, op, ReloadStatus::RolledBack);
        tracing::warn!(plugin_name, "reload rolled back to previous version");
    }

    fn evict_expired_backups(&self) {
        let retention = self.config.backup_retention_period;
        self.backups.lock().retain(|_, b| Utc::now().signed_duration_since(b.created_at).to_std().map(|age| age < retention).unwrap_or(true));
    }
}
