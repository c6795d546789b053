//! Transport boundary between the orchestrator and the wire.
//!
//! The orchestrator never touches HTTP or WebSockets directly; it talks to a
//! [`Transport`] object. Production code uses `HttpTransport`; tests inject a
//! scripted mock. Every method resolves the backend's uniform envelope before
//! returning, so nothing untyped crosses this boundary.

use crate::error::ClientResult;
use async_trait::async_trait;
use tokio::sync::mpsc;
use vantage_core::{
    Alert, CreateEngineRequest, CreateStrategyRequest, Engine, EntityId, MonitoringSnapshot,
    OptimizationJob, PushEvent, StartJobRequest, Strategy, StrategyTemplate, UpdateEngineRequest,
    UpdateStrategyRequest, UsageReport,
};

#[async_trait]
pub trait Transport: Send + Sync {
    // Reads.
    async fn list_engines(&self) -> ClientResult<Vec<Engine>>;
    async fn get_engine(&self, id: EntityId) -> ClientResult<Engine>;
    async fn list_strategies(&self) -> ClientResult<Vec<Strategy>>;
    async fn list_templates(&self) -> ClientResult<Vec<StrategyTemplate>>;
    async fn list_jobs(&self) -> ClientResult<Vec<OptimizationJob>>;
    async fn list_alerts(&self) -> ClientResult<Vec<Alert>>;
    async fn get_usage(&self) -> ClientResult<UsageReport>;
    async fn get_monitoring(&self) -> ClientResult<MonitoringSnapshot>;

    // Mutations.
    async fn create_engine(&self, req: &CreateEngineRequest) -> ClientResult<Engine>;
    async fn update_engine(&self, id: EntityId, req: &UpdateEngineRequest) -> ClientResult<Engine>;
    async fn delete_engine(&self, id: EntityId) -> ClientResult<()>;
    async fn create_strategy(&self, req: &CreateStrategyRequest) -> ClientResult<Strategy>;
    async fn update_strategy(
        &self,
        id: EntityId,
        req: &UpdateStrategyRequest,
    ) -> ClientResult<Strategy>;
    async fn delete_strategy(&self, id: EntityId) -> ClientResult<()>;

    // Domain actions.
    async fn start_job(&self, req: &StartJobRequest) -> ClientResult<OptimizationJob>;
    async fn stop_job(&self, id: EntityId) -> ClientResult<OptimizationJob>;
    async fn apply_strategy(&self, id: EntityId) -> ClientResult<Strategy>;

    /// Open the live push channel. Events arrive on the returned receiver
    /// until the channel drops or the transport shuts down.
    async fn subscribe(&self) -> ClientResult<mpsc::Receiver<PushEvent>>;
}
