//! VANTAGE Core - Entity Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types - no business logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Duration in milliseconds for TTL and timeout values.
pub type DurationMs = u64;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

// ============================================================================
// ENUMS
// ============================================================================

/// Resource type discriminator for cache keys and push events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Engine,
    Strategy,
    Template,
    Job,
    Result,
    Alert,
    Usage,
    Monitoring,
}

impl ResourceKind {
    /// Stable lowercase name, used as a cache-key prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Engine => "engine",
            ResourceKind::Strategy => "strategy",
            ResourceKind::Template => "template",
            ResourceKind::Job => "job",
            ResourceKind::Result => "result",
            ResourceKind::Alert => "alert",
            ResourceKind::Usage => "usage",
            ResourceKind::Monitoring => "monitoring",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of optimization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    /// Cost-model driven optimizer
    CostBased,
    /// Rule/heuristic driven optimizer
    Heuristic,
    /// Learned-model driven optimizer
    Learned,
}

/// Operational status of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineStatus {
    Active,
    Degraded,
    Maintenance,
    Offline,
}

/// What a tuning strategy optimizes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyTarget {
    Storage,
    Compute,
    Query,
    Lineage,
}

/// Status of an optimization job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether the job has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Severity of a governance alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

// ============================================================================
// ENTITY RECORDS
// ============================================================================

/// An optimization engine registered with the governance backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engine {
    pub engine_id: EntityId,
    pub name: String,
    pub kind: EngineKind,
    pub status: EngineStatus,
    pub version: String,
    /// Optimization capabilities advertised by the engine (free-form tags).
    pub capabilities: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A tuning strategy that an engine can apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub strategy_id: EntityId,
    pub name: String,
    pub target: StrategyTarget,
    pub enabled: bool,
    /// Engine-specific parameters, validated server-side.
    pub parameters: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A reusable strategy template from the backend catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyTemplate {
    pub template_id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub target: StrategyTarget,
    pub parameters: serde_json::Value,
}

/// A running or finished optimization job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationJob {
    pub job_id: EntityId,
    pub engine_id: EntityId,
    pub strategy_id: EntityId,
    pub status: JobStatus,
    /// Completion fraction in `[0.0, 1.0]`.
    pub progress: f32,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub error: Option<String>,
}

/// Outcome of a completed optimization job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: EntityId,
    /// Estimated monthly savings in the deployment's billing currency.
    pub savings_estimate: f64,
    pub recommendations: Vec<String>,
    pub completed_at: Timestamp,
}

/// Per-resource usage figure inside a [`UsageReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub resource: String,
    pub hits: u64,
}

/// Popularity/usage analytics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub generated_at: Timestamp,
    pub total_queries: u64,
    pub active_datasets: u64,
    pub top_resources: Vec<ResourceUsage>,
}

/// Health snapshot of the optimization service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringSnapshot {
    pub captured_at: Timestamp,
    pub healthy: bool,
    pub active_jobs: u32,
    pub queue_depth: u32,
    pub error_rate: f32,
}

/// A governance alert raised by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: EntityId,
    pub severity: AlertSeverity,
    pub message: String,
    /// Resource the alert refers to, when applicable.
    pub resource: Option<String>,
    pub acknowledged: bool,
    pub raised_at: Timestamp,
}

// ============================================================================
// REQUEST TYPES
// ============================================================================

/// Request to register a new engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateEngineRequest {
    pub name: String,
    pub kind: EngineKind,
    pub version: String,
    pub capabilities: Vec<String>,
}

/// Request to update an existing engine. `None` fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateEngineRequest {
    pub name: Option<String>,
    pub status: Option<EngineStatus>,
    pub version: Option<String>,
    pub capabilities: Option<Vec<String>>,
}

/// Request to create a new strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateStrategyRequest {
    pub name: String,
    pub target: StrategyTarget,
    pub enabled: bool,
    pub parameters: serde_json::Value,
    /// Template the strategy was instantiated from, if any.
    pub template_id: Option<EntityId>,
}

/// Request to update an existing strategy. `None` fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateStrategyRequest {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub parameters: Option<serde_json::Value>,
}

/// Request to start an optimization job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartJobRequest {
    pub engine_id: EntityId,
    pub strategy_id: EntityId,
}

// ============================================================================
// RESPONSE ENVELOPE
// ============================================================================

/// Error codes carried inside the response envelope.
///
/// Each code maps to a category of failure; transport-level retry decisions
/// branch on [`ErrorCode::is_transient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request lacks valid authentication credentials
    Unauthorized,
    /// Request is authenticated but lacks permission for the resource
    Forbidden,
    /// Request validation failed
    ValidationFailed,
    /// Request contains invalid input data
    InvalidInput,
    /// Requested entity does not exist
    EntityNotFound,
    /// Request conflicts with current resource state
    Conflict,
    /// Caller is being rate limited
    RateLimited,
    /// Backend timed out serving the request
    Timeout,
    /// Backend is temporarily unavailable
    Unavailable,
    /// Unexpected backend failure
    Internal,
    /// Response body did not match the expected schema
    MalformedResponse,
}

impl ErrorCode {
    /// Whether a failure with this code is worth retrying.
    ///
    /// Validation and auth failures will fail the same way on every attempt;
    /// only capacity/availability failures are transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::RateLimited
                | ErrorCode::Timeout
                | ErrorCode::Unavailable
                | ErrorCode::Internal
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Structured error carried by a failed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorInfo {}

/// Uniform response envelope returned by every backend endpoint.
///
/// The client branches solely on `success`; `data` is present on success and
/// `error` on failure. Anything else is a malformed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl<T> Envelope<T> {
    /// Build a successful envelope.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Build a failed envelope.
    pub fn fail(error: ErrorInfo) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    /// Collapse the envelope into a `Result`, treating shape violations
    /// (success without data, failure without error) as malformed responses.
    pub fn into_result(self) -> Result<T, ErrorInfo> {
        if self.success {
            self.data.ok_or_else(|| {
                ErrorInfo::new(
                    ErrorCode::MalformedResponse,
                    "success envelope without data",
                )
            })
        } else {
            Err(self.error.unwrap_or_else(|| {
                ErrorInfo::new(
                    ErrorCode::MalformedResponse,
                    "failure envelope without error",
                )
            }))
        }
    }
}

// ============================================================================
// PUSH EVENTS
// ============================================================================

/// Push events broadcast by the backend over the live channel.
///
/// Every mutation on a governance resource produces a corresponding event so
/// connected consoles converge without polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PushEvent {
    /// A new engine was registered.
    EngineCreated { engine: Engine },
    /// An existing engine was updated.
    EngineUpdated { engine: Engine },
    /// An engine was removed.
    EngineDeleted { id: EntityId },

    /// A new strategy was created.
    StrategyCreated { strategy: Strategy },
    /// An existing strategy was updated.
    StrategyUpdated { strategy: Strategy },
    /// A strategy was removed.
    StrategyDeleted { id: EntityId },

    /// An optimization job started.
    JobStarted { job: OptimizationJob },
    /// A job reported progress or changed status.
    JobUpdated { job: OptimizationJob },
    /// A job finished and produced a result.
    JobCompleted {
        job: OptimizationJob,
        result: JobResult,
    },

    /// A governance alert was raised.
    AlertRaised { alert: Alert },
    /// An alert was acknowledged or resolved.
    AlertCleared { id: EntityId },

    /// Fresh usage analytics are available.
    UsageUpdated { report: UsageReport },
    /// Fresh monitoring data is available.
    MonitoringUpdated { snapshot: MonitoringSnapshot },

    /// Live channel established.
    Connected,
    /// Live channel lost.
    Disconnected { reason: String },
    /// Channel-level error.
    Error { message: String },
}

impl PushEvent {
    /// Get the event type as a string for logging/debugging.
    pub fn event_type(&self) -> &'static str {
        match self {
            PushEvent::EngineCreated { .. } => "EngineCreated",
            PushEvent::EngineUpdated { .. } => "EngineUpdated",
            PushEvent::EngineDeleted { .. } => "EngineDeleted",
            PushEvent::StrategyCreated { .. } => "StrategyCreated",
            PushEvent::StrategyUpdated { .. } => "StrategyUpdated",
            PushEvent::StrategyDeleted { .. } => "StrategyDeleted",
            PushEvent::JobStarted { .. } => "JobStarted",
            PushEvent::JobUpdated { .. } => "JobUpdated",
            PushEvent::JobCompleted { .. } => "JobCompleted",
            PushEvent::AlertRaised { .. } => "AlertRaised",
            PushEvent::AlertCleared { .. } => "AlertCleared",
            PushEvent::UsageUpdated { .. } => "UsageUpdated",
            PushEvent::MonitoringUpdated { .. } => "MonitoringUpdated",
            PushEvent::Connected => "Connected",
            PushEvent::Disconnected { .. } => "Disconnected",
            PushEvent::Error { .. } => "Error",
        }
    }

    /// Whether this event carries resource data (as opposed to channel state).
    pub fn is_resource_event(&self) -> bool {
        !matches!(
            self,
            PushEvent::Connected | PushEvent::Disconnected { .. } | PushEvent::Error { .. }
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
