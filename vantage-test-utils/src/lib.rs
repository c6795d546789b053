//! VANTAGE Test Utilities
//!
//! Centralized test infrastructure for the VANTAGE workspace:
//! - A scripted mock transport for exercising the client without a backend
//! - Fixtures for common entity shapes
//! - Proptest generators for entity types

pub use vantage_client::{ClientError, ClientResult, Transport};
pub use vantage_core::{
    new_entity_id, Alert, AlertSeverity, CreateEngineRequest, CreateStrategyRequest, Engine,
    EngineKind, EngineStatus, EntityId, ErrorCode, JobResult, JobStatus, MonitoringSnapshot,
    OptimizationJob, PushEvent, ResourceUsage, StartJobRequest, Strategy, StrategyTarget,
    StrategyTemplate, UpdateEngineRequest, UpdateStrategyRequest, UsageReport,
};

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// MOCK TRANSPORT
// ============================================================================

/// Scripted failure for one transport method.
#[derive(Debug, Clone, Copy)]
struct FailurePlan {
    /// `None` means fail forever.
    remaining: Option<u32>,
    code: ErrorCode,
}

/// In-memory transport with per-method failure scripting.
///
/// Seed it with fixtures, script failures with [`fail_times`](Self::fail_times)
/// or [`fail_always`](Self::fail_always), then hand it to `VantageClient`.
/// Scripted errors are classified transient/terminal by the error code, the
/// same way the HTTP transport classifies envelope errors. Call counts let
/// tests assert how often the wire was actually touched.
#[derive(Default)]
pub struct MockTransport {
    engines: Mutex<Vec<Engine>>,
    strategies: Mutex<Vec<Strategy>>,
    templates: Mutex<Vec<StrategyTemplate>>,
    jobs: Mutex<Vec<OptimizationJob>>,
    alerts: Mutex<Vec<Alert>>,
    usage: Mutex<Option<UsageReport>>,
    monitoring: Mutex<Option<MonitoringSnapshot>>,
    failures: Mutex<HashMap<&'static str, FailurePlan>>,
    calls: Mutex<HashMap<&'static str, u64>>,
    latency: Mutex<Option<Duration>>,
    push_sender: Mutex<Option<mpsc::Sender<PushEvent>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engines(self, engines: Vec<Engine>) -> Self {
        *lock(&self.engines) = engines;
        self
    }

    pub fn with_strategies(self, strategies: Vec<Strategy>) -> Self {
        *lock(&self.strategies) = strategies;
        self
    }

    pub fn with_templates(self, templates: Vec<StrategyTemplate>) -> Self {
        *lock(&self.templates) = templates;
        self
    }

    pub fn with_jobs(self, jobs: Vec<OptimizationJob>) -> Self {
        *lock(&self.jobs) = jobs;
        self
    }

    pub fn with_alerts(self, alerts: Vec<Alert>) -> Self {
        *lock(&self.alerts) = alerts;
        self
    }

    pub fn with_usage(self, report: UsageReport) -> Self {
        *lock(&self.usage) = Some(report);
        self
    }

    pub fn with_monitoring(self, snapshot: MonitoringSnapshot) -> Self {
        *lock(&self.monitoring) = Some(snapshot);
        self
    }

    /// Delay every call by `latency` before responding.
    pub fn with_latency(self, latency: Duration) -> Self {
        *lock(&self.latency) = Some(latency);
        self
    }

    /// Fail the next `times` calls to `method` with `code`, then succeed.
    pub fn fail_times(&self, method: &'static str, times: u32, code: ErrorCode) {
        lock(&self.failures).insert(
            method,
            FailurePlan {
                remaining: Some(times),
                code,
            },
        );
    }

    /// Fail every call to `method` with `code` until rescripted.
    pub fn fail_always(&self, method: &'static str, code: ErrorCode) {
        lock(&self.failures).insert(
            method,
            FailurePlan {
                remaining: None,
                code,
            },
        );
    }

    /// How many times `method` reached the mock (including scripted failures).
    pub fn calls(&self, method: &'static str) -> u64 {
        lock(&self.calls).get(method).copied().unwrap_or(0)
    }

    /// Emit a push event to the current subscriber, if any.
    pub async fn push(&self, event: PushEvent) -> bool {
        let sender = lock(&self.push_sender).clone();
        match sender {
            Some(sender) => sender.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Drop the subscriber side, simulating a channel disconnect.
    pub fn drop_subscriber(&self) {
        lock(&self.push_sender).take();
    }

    async fn enter(&self, method: &'static str) -> ClientResult<()> {
        *lock(&self.calls).entry(method).or_insert(0) += 1;
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut failures = lock(&self.failures);
        if let Some(plan) = failures.get(method).copied() {
            match plan.remaining {
                Some(0) => {
                    failures.remove(method);
                }
                Some(n) => {
                    failures.insert(
                        method,
                        FailurePlan {
                            remaining: Some(n - 1),
                            code: plan.code,
                        },
                    );
                    drop(failures);
                    return Err(scripted_error(plan.code, method));
                }
                None => {
                    drop(failures);
                    return Err(scripted_error(plan.code, method));
                }
            }
        }
        Ok(())
    }
}

fn scripted_error(code: ErrorCode, method: &str) -> ClientError {
    let message = format!("scripted {method} failure");
    if code.is_transient() {
        ClientError::transient(code, message)
    } else {
        ClientError::terminal(code, message)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Transport for MockTransport {
    async fn list_engines(&self) -> ClientResult<Vec<Engine>> {
        self.enter("list_engines").await?;
        Ok(lock(&self.engines).clone())
    }

    async fn get_engine(&self, id: EntityId) -> ClientResult<Engine> {
        self.enter("get_engine").await?;
        lock(&self.engines)
            .iter()
            .find(|e| e.engine_id == id)
            .cloned()
            .ok_or_else(|| ClientError::terminal(ErrorCode::EntityNotFound, format!("engine {id}")))
    }

    async fn list_strategies(&self) -> ClientResult<Vec<Strategy>> {
        self.enter("list_strategies").await?;
        Ok(lock(&self.strategies).clone())
    }

    async fn list_templates(&self) -> ClientResult<Vec<StrategyTemplate>> {
        self.enter("list_templates").await?;
        Ok(lock(&self.templates).clone())
    }

    async fn list_jobs(&self) -> ClientResult<Vec<OptimizationJob>> {
        self.enter("list_jobs").await?;
        Ok(lock(&self.jobs).clone())
    }

    async fn list_alerts(&self) -> ClientResult<Vec<Alert>> {
        self.enter("list_alerts").await?;
        Ok(lock(&self.alerts).clone())
    }

    async fn get_usage(&self) -> ClientResult<UsageReport> {
        self.enter("get_usage").await?;
        lock(&self.usage)
            .clone()
            .ok_or_else(|| ClientError::terminal(ErrorCode::EntityNotFound, "no usage report"))
    }

    async fn get_monitoring(&self) -> ClientResult<MonitoringSnapshot> {
        self.enter("get_monitoring").await?;
        lock(&self.monitoring)
            .clone()
            .ok_or_else(|| ClientError::terminal(ErrorCode::EntityNotFound, "no monitoring data"))
    }

    async fn create_engine(&self, req: &CreateEngineRequest) -> ClientResult<Engine> {
        self.enter("create_engine").await?;
        let now = Utc::now();
        let engine = Engine {
            engine_id: new_entity_id(),
            name: req.name.clone(),
            kind: req.kind,
            status: EngineStatus::Active,
            version: req.version.clone(),
            capabilities: req.capabilities.clone(),
            created_at: now,
            updated_at: now,
        };
        lock(&self.engines).push(engine.clone());
        Ok(engine)
    }

    async fn update_engine(&self, id: EntityId, req: &UpdateEngineRequest) -> ClientResult<Engine> {
        self.enter("update_engine").await?;
        let mut engines = lock(&self.engines);
        let engine = engines
            .iter_mut()
            .find(|e| e.engine_id == id)
            .ok_or_else(|| {
                ClientError::terminal(ErrorCode::EntityNotFound, format!("engine {id}"))
            })?;
        if let Some(name) = &req.name {
            engine.name = name.clone();
        }
        if let Some(status) = req.status {
            engine.status = status;
        }
        if let Some(version) = &req.version {
            engine.version = version.clone();
        }
        if let Some(capabilities) = &req.capabilities {
            engine.capabilities = capabilities.clone();
        }
        engine.updated_at = Utc::now();
        Ok(engine.clone())
    }

    async fn delete_engine(&self, id: EntityId) -> ClientResult<()> {
        self.enter("delete_engine").await?;
        let mut engines = lock(&self.engines);
        let before = engines.len();
        engines.retain(|e| e.engine_id != id);
        if engines.len() == before {
            return Err(ClientError::terminal(
                ErrorCode::EntityNotFound,
                format!("engine {id}"),
            ));
        }
        Ok(())
    }

    async fn create_strategy(&self, req: &CreateStrategyRequest) -> ClientResult<Strategy> {
        self.enter("create_strategy").await?;
        let now = Utc::now();
        let strategy = Strategy {
            strategy_id: new_entity_id(),
            name: req.name.clone(),
            target: req.target,
            enabled: req.enabled,
            parameters: req.parameters.clone(),
            created_at: now,
            updated_at: now,
        };
        lock(&self.strategies).push(strategy.clone());
        Ok(strategy)
    }

    async fn update_strategy(
        &self,
        id: EntityId,
        req: &UpdateStrategyRequest,
    ) -> ClientResult<Strategy> {
        self.enter("update_strategy").await?;
        let mut strategies = lock(&self.strategies);
        let strategy = strategies
            .iter_mut()
            .find(|s| s.strategy_id == id)
            .ok_or_else(|| {
                ClientError::terminal(ErrorCode::EntityNotFound, format!("strategy {id}"))
            })?;
        if let Some(name) = &req.name {
            strategy.name = name.clone();
        }
        if let Some(enabled) = req.enabled {
            strategy.enabled = enabled;
        }
        if let Some(parameters) = &req.parameters {
            strategy.parameters = parameters.clone();
        }
        strategy.updated_at = Utc::now();
        Ok(strategy.clone())
    }

    async fn delete_strategy(&self, id: EntityId) -> ClientResult<()> {
        self.enter("delete_strategy").await?;
        let mut strategies = lock(&self.strategies);
        let before = strategies.len();
        strategies.retain(|s| s.strategy_id != id);
        if strategies.len() == before {
            return Err(ClientError::terminal(
                ErrorCode::EntityNotFound,
                format!("strategy {id}"),
            ));
        }
        Ok(())
    }

    async fn start_job(&self, req: &StartJobRequest) -> ClientResult<OptimizationJob> {
        self.enter("start_job").await?;
        let job = OptimizationJob {
            job_id: new_entity_id(),
            engine_id: req.engine_id,
            strategy_id: req.strategy_id,
            status: JobStatus::Running,
            progress: 0.0,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        };
        lock(&self.jobs).push(job.clone());
        Ok(job)
    }

    async fn stop_job(&self, id: EntityId) -> ClientResult<OptimizationJob> {
        self.enter("stop_job").await?;
        let mut jobs = lock(&self.jobs);
        let job = jobs.iter_mut().find(|j| j.job_id == id).ok_or_else(|| {
            ClientError::terminal(ErrorCode::EntityNotFound, format!("job {id}"))
        })?;
        job.status = JobStatus::Cancelled;
        job.finished_at = Some(Utc::now());
        Ok(job.clone())
    }

    async fn apply_strategy(&self, id: EntityId) -> ClientResult<Strategy> {
        self.enter("apply_strategy").await?;
        let mut strategies = lock(&self.strategies);
        let strategy = strategies
            .iter_mut()
            .find(|s| s.strategy_id == id)
            .ok_or_else(|| {
                ClientError::terminal(ErrorCode::EntityNotFound, format!("strategy {id}"))
            })?;
        strategy.enabled = true;
        strategy.updated_at = Utc::now();
        Ok(strategy.clone())
    }

    async fn subscribe(&self) -> ClientResult<mpsc::Receiver<PushEvent>> {
        self.enter("subscribe").await?;
        let (sender, receiver) = mpsc::channel(64);
        *lock(&self.push_sender) = Some(sender);
        Ok(receiver)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub fn sample_engine(name: &str) -> Engine {
    let now = Utc::now();
    Engine {
        engine_id: new_entity_id(),
        name: name.to_string(),
        kind: EngineKind::CostBased,
        status: EngineStatus::Active,
        version: "2.3.1".to_string(),
        capabilities: vec![
            "partition-pruning".to_string(),
            "index-advisor".to_string(),
        ],
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_strategy(name: &str) -> Strategy {
    let now = Utc::now();
    Strategy {
        strategy_id: new_entity_id(),
        name: name.to_string(),
        target: StrategyTarget::Storage,
        enabled: true,
        parameters: serde_json::json!({ "compaction_threshold": 0.7 }),
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_template(name: &str) -> StrategyTemplate {
    StrategyTemplate {
        template_id: new_entity_id(),
        name: name.to_string(),
        description: Some("cold data tiering".to_string()),
        target: StrategyTarget::Storage,
        parameters: serde_json::json!({ "age_days": 90 }),
    }
}

pub fn sample_job(engine_id: EntityId, strategy_id: EntityId) -> OptimizationJob {
    OptimizationJob {
        job_id: new_entity_id(),
        engine_id,
        strategy_id,
        status: JobStatus::Running,
        progress: 0.4,
        started_at: Utc::now(),
        finished_at: None,
        error: None,
    }
}

pub fn sample_job_result(job_id: EntityId) -> JobResult {
    JobResult {
        job_id,
        savings_estimate: 1250.0,
        recommendations: vec!["drop unused index idx_raw_events_ts".to_string()],
        completed_at: Utc::now(),
    }
}

pub fn sample_alert(message: &str) -> Alert {
    Alert {
        alert_id: new_entity_id(),
        severity: AlertSeverity::Warning,
        message: message.to_string(),
        resource: Some("warehouse/sales".to_string()),
        acknowledged: false,
        raised_at: Utc::now(),
    }
}

pub fn sample_usage_report() -> UsageReport {
    UsageReport {
        generated_at: Utc::now(),
        total_queries: 48_210,
        active_datasets: 312,
        top_resources: vec![
            ResourceUsage {
                resource: "warehouse/sales".to_string(),
                hits: 9_410,
            },
            ResourceUsage {
                resource: "lake/raw_events".to_string(),
                hits: 7_122,
            },
        ],
    }
}

pub fn sample_monitoring() -> MonitoringSnapshot {
    MonitoringSnapshot {
        captured_at: Utc::now(),
        healthy: true,
        active_jobs: 2,
        queue_depth: 5,
        error_rate: 0.004,
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;
    // The prelude's `Strategy` trait collides with the domain `Strategy`
    // record, so the trait goes by an alias here.
    use proptest::strategy::Strategy as PropStrategy;

    pub fn arb_engine_kind() -> impl PropStrategy<Value = EngineKind> {
        prop_oneof![
            Just(EngineKind::CostBased),
            Just(EngineKind::Heuristic),
            Just(EngineKind::Learned),
        ]
    }

    pub fn arb_engine_status() -> impl PropStrategy<Value = EngineStatus> {
        prop_oneof![
            Just(EngineStatus::Active),
            Just(EngineStatus::Degraded),
            Just(EngineStatus::Maintenance),
            Just(EngineStatus::Offline),
        ]
    }

    pub fn arb_strategy_target() -> impl PropStrategy<Value = StrategyTarget> {
        prop_oneof![
            Just(StrategyTarget::Storage),
            Just(StrategyTarget::Compute),
            Just(StrategyTarget::Query),
            Just(StrategyTarget::Lineage),
        ]
    }

    pub fn arb_job_status() -> impl PropStrategy<Value = JobStatus> {
        prop_oneof![
            Just(JobStatus::Queued),
            Just(JobStatus::Running),
            Just(JobStatus::Completed),
            Just(JobStatus::Failed),
            Just(JobStatus::Cancelled),
        ]
    }

    pub fn arb_engine() -> impl PropStrategy<Value = Engine> {
        ("[a-z][a-z0-9-]{0,23}", arb_engine_kind(), arb_engine_status()).prop_map(
            |(name, kind, status)| {
                let now = Utc::now();
                Engine {
                    engine_id: new_entity_id(),
                    name,
                    kind,
                    status,
                    version: "1.0.0".to_string(),
                    capabilities: vec![],
                    created_at: now,
                    updated_at: now,
                }
            },
        )
    }

    pub fn arb_strategy() -> impl PropStrategy<Value = Strategy> {
        ("[a-z][a-z0-9-]{0,23}", arb_strategy_target(), any::<bool>()).prop_map(
            |(name, target, enabled)| {
                let now = Utc::now();
                Strategy {
                    strategy_id: new_entity_id(),
                    name,
                    target,
                    enabled,
                    parameters: serde_json::json!({}),
                    created_at: now,
                    updated_at: now,
                }
            },
        )
    }

    pub fn arb_job() -> impl PropStrategy<Value = OptimizationJob> {
        (arb_job_status(), 0.0f32..=1.0f32).prop_map(|(status, progress)| OptimizationJob {
            job_id: new_entity_id(),
            engine_id: new_entity_id(),
            strategy_id: new_entity_id(),
            status,
            progress,
            started_at: Utc::now(),
            finished_at: status.is_terminal().then(Utc::now),
            error: None,
        })
    }
}
