//! Shared console state.
//!
//! One state-of-truth for everything the client knows about the backend:
//! manual calls, refresh ticks, and push events all write here. Collections
//! are a disposable projection of backend data; the backend is authoritative.
//! Push and poll both apply last-write-wins.

use vantage_core::{
    Alert, Engine, EntityId, ErrorCode, JobResult, MonitoringSnapshot, OptimizationJob, PushEvent,
    Strategy, StrategyTemplate, Timestamp, UsageReport,
};

/// Last failure surfaced to the console, kept alongside the (stale but
/// still usable) data it failed to refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateError {
    pub code: ErrorCode,
    pub message: String,
}

/// Live-channel status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveStatus {
    pub connected: bool,
    pub last_update: Option<Timestamp>,
    pub update_count: u64,
}

/// Everything the console renders, behind the client's `RwLock`.
#[derive(Debug, Default)]
pub struct ConsoleState {
    pub engines: Vec<Engine>,
    pub strategies: Vec<Strategy>,
    pub templates: Vec<StrategyTemplate>,
    pub jobs: Vec<OptimizationJob>,
    pub results: Vec<JobResult>,
    pub alerts: Vec<Alert>,
    pub usage: Option<UsageReport>,
    pub monitoring: Option<MonitoringSnapshot>,
    pub last_error: Option<StateError>,
    pub live: LiveStatus,
}

impl ConsoleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an engine by id.
    pub fn upsert_engine(&mut self, engine: Engine) {
        match self
            .engines
            .iter_mut()
            .find(|e| e.engine_id == engine.engine_id)
        {
            Some(existing) => *existing = engine,
            None => self.engines.push(engine),
        }
    }

    pub fn remove_engine(&mut self, id: EntityId) {
        self.engines.retain(|e| e.engine_id != id);
    }

    pub fn upsert_strategy(&mut self, strategy: Strategy) {
        match self
            .strategies
            .iter_mut()
            .find(|s| s.strategy_id == strategy.strategy_id)
        {
            Some(existing) => *existing = strategy,
            None => self.strategies.push(strategy),
        }
    }

    pub fn remove_strategy(&mut self, id: EntityId) {
        self.strategies.retain(|s| s.strategy_id != id);
    }

    pub fn upsert_job(&mut self, job: OptimizationJob) {
        match self.jobs.iter_mut().find(|j| j.job_id == job.job_id) {
            Some(existing) => *existing = job,
            None => self.jobs.push(job),
        }
    }

    pub fn upsert_result(&mut self, result: JobResult) {
        match self
            .results
            .iter_mut()
            .find(|r| r.job_id == result.job_id)
        {
            Some(existing) => *existing = result,
            None => self.results.push(result),
        }
    }

    pub fn upsert_alert(&mut self, alert: Alert) {
        match self
            .alerts
            .iter_mut()
            .find(|a| a.alert_id == alert.alert_id)
        {
            Some(existing) => *existing = alert,
            None => self.alerts.push(alert),
        }
    }

    pub fn remove_alert(&mut self, id: EntityId) {
        self.alerts.retain(|a| a.alert_id != id);
    }

    pub fn set_error(&mut self, code: ErrorCode, message: impl Into<String>) {
        self.last_error = Some(StateError {
            code,
            message: message.into(),
        });
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Apply one push event. Resource events bump the live counters;
    /// channel-state events only flip `connected`.
    pub fn apply_push_event(&mut self, event: PushEvent) {
        if event.is_resource_event() {
            self.live.update_count += 1;
            self.live.last_update = Some(chrono::Utc::now());
        }
        match event {
            PushEvent::EngineCreated { engine } | PushEvent::EngineUpdated { engine } => {
                self.upsert_engine(engine);
            }
            PushEvent::EngineDeleted { id } => {
                self.remove_engine(id);
            }
            PushEvent::StrategyCreated { strategy } | PushEvent::StrategyUpdated { strategy } => {
                self.upsert_strategy(strategy);
            }
            PushEvent::StrategyDeleted { id } => {
                self.remove_strategy(id);
            }
            PushEvent::JobStarted { job } | PushEvent::JobUpdated { job } => {
                self.upsert_job(job);
            }
            PushEvent::JobCompleted { job, result } => {
                self.upsert_job(job);
                self.upsert_result(result);
            }
            PushEvent::AlertRaised { alert } => {
                self.upsert_alert(alert);
            }
            PushEvent::AlertCleared { id } => {
                self.remove_alert(id);
            }
            PushEvent::UsageUpdated { report } => {
                self.usage = Some(report);
            }
            PushEvent::MonitoringUpdated { snapshot } => {
                self.monitoring = Some(snapshot);
            }
            PushEvent::Connected => {
                self.live.connected = true;
            }
            PushEvent::Disconnected { reason } => {
                self.live.connected = false;
                tracing::warn!(reason = %reason, "live channel disconnected");
            }
            PushEvent::Error { message } => {
                tracing::warn!(message = %message, "live channel error");
            }
        }
    }
}
