//! Request orchestrator.
//!
//! `VantageClient` ties the cache, retry controller, metrics, and shared
//! state together over an injected [`Transport`]. Reads go through the cache
//! with a per-key in-flight latch so concurrent misses share one upstream
//! fetch. Mutations bypass the cache and commit to state only after the
//! backend confirms. Background refresh and the live channel are owned by
//! `open()`/`close()`.

use crate::cache::TtlCache;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::metrics::{ClientMetrics, MetricsSnapshot};
use crate::refresh;
use crate::realtime;
use crate::retry::RetryPolicy;
use crate::state::ConsoleState;
use crate::transport::Transport;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use vantage_core::{
    Alert, CreateEngineRequest, CreateStrategyRequest, Engine, EntityId, MonitoringSnapshot,
    OptimizationJob, ResourceKind, StartJobRequest, Strategy, StrategyTemplate,
    UpdateEngineRequest, UpdateStrategyRequest, UsageReport,
};

const KEY_ENGINES: &str = "engines";
const KEY_STRATEGIES: &str = "strategies";
const KEY_TEMPLATES: &str = "templates";
const KEY_JOBS: &str = "jobs";
const KEY_ALERTS: &str = "alerts";
const KEY_USAGE: &str = "usage";
const KEY_MONITORING: &str = "monitoring";

fn engine_key(id: EntityId) -> String {
    format!("optimization-{}-{id}", ResourceKind::Engine)
}

/// One cached value. The cache is a single string-keyed store, so every
/// cacheable read wraps its payload in a slot variant.
#[derive(Debug, Clone)]
pub(crate) enum CacheSlot {
    Engines(Vec<Engine>),
    Engine(Engine),
    Strategies(Vec<Strategy>),
    Templates(Vec<StrategyTemplate>),
    Jobs(Vec<OptimizationJob>),
    Alerts(Vec<Alert>),
    Usage(UsageReport),
    Monitoring(MonitoringSnapshot),
}

pub struct VantageClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    cache: TtlCache<CacheSlot>,
    metrics: Arc<ClientMetrics>,
    retry: RetryPolicy,
    state: Arc<RwLock<ConsoleState>>,
    /// Per-key latch: the first miss fetches, concurrent misses wait and
    /// re-check the cache.
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    lifecycle: Mutex<Option<CancellationToken>>,
}

impl VantageClient {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let metrics = Arc::new(ClientMetrics::new());
        let cache = TtlCache::new(config.cache_ttl(), metrics.clone());
        let retry = RetryPolicy::from_config(&config.retry);
        Self {
            config,
            transport,
            cache,
            metrics,
            retry,
            state: Arc::new(RwLock::new(ConsoleState::new())),
            inflight: Mutex::new(HashMap::new()),
            lifecycle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Shared console state, for rendering and for the background tasks.
    pub fn state(&self) -> Arc<RwLock<ConsoleState>> {
        self.state.clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Drop every cached entry.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Start the auto-refresh and realtime tasks. Idempotent: a second call
    /// while open is a no-op.
    pub fn open(self: &Arc<Self>) {
        let mut lifecycle = lock_unpoisoned(&self.lifecycle);
        if lifecycle.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        refresh::spawn(self.clone(), cancel.clone());
        realtime::spawn(self.clone(), cancel.clone());
        *lifecycle = Some(cancel);
        tracing::debug!("client opened");
    }

    /// Cancel the background tasks. Idempotent; pending retries, refresh
    /// ticks, and reconnect sleeps are dropped with their tasks.
    pub fn close(&self) {
        let token = lock_unpoisoned(&self.lifecycle).take();
        if let Some(token) = token {
            token.cancel();
            tracing::debug!("client closed");
        }
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub async fn load_engines(&self) -> ClientResult<Vec<Engine>> {
        let transport = self.transport.clone();
        self.load_cached(
            KEY_ENGINES,
            |slot| match slot {
                CacheSlot::Engines(engines) => Some(engines.clone()),
                _ => None,
            },
            CacheSlot::Engines,
            move || {
                let transport = transport.clone();
                async move { transport.list_engines().await }
            },
            |state, engines| state.engines = engines.clone(),
        )
        .await
    }

    pub async fn get_engine(&self, id: EntityId) -> ClientResult<Engine> {
        let transport = self.transport.clone();
        self.load_cached(
            &engine_key(id),
            |slot| match slot {
                CacheSlot::Engine(engine) => Some(engine.clone()),
                _ => None,
            },
            CacheSlot::Engine,
            move || {
                let transport = transport.clone();
                async move { transport.get_engine(id).await }
            },
            |state, engine| state.upsert_engine(engine.clone()),
        )
        .await
    }

    pub async fn load_strategies(&self) -> ClientResult<Vec<Strategy>> {
        let transport = self.transport.clone();
        self.load_cached(
            KEY_STRATEGIES,
            |slot| match slot {
                CacheSlot::Strategies(strategies) => Some(strategies.clone()),
                _ => None,
            },
            CacheSlot::Strategies,
            move || {
                let transport = transport.clone();
                async move { transport.list_strategies().await }
            },
            |state, strategies| state.strategies = strategies.clone(),
        )
        .await
    }

    pub async fn load_templates(&self) -> ClientResult<Vec<StrategyTemplate>> {
        let transport = self.transport.clone();
        self.load_cached(
            KEY_TEMPLATES,
            |slot| match slot {
                CacheSlot::Templates(templates) => Some(templates.clone()),
                _ => None,
            },
            CacheSlot::Templates,
            move || {
                let transport = transport.clone();
                async move { transport.list_templates().await }
            },
            |state, templates| state.templates = templates.clone(),
        )
        .await
    }

    pub async fn load_jobs(&self) -> ClientResult<Vec<OptimizationJob>> {
        let transport = self.transport.clone();
        self.load_cached(
            KEY_JOBS,
            |slot| match slot {
                CacheSlot::Jobs(jobs) => Some(jobs.clone()),
                _ => None,
            },
            CacheSlot::Jobs,
            move || {
                let transport = transport.clone();
                async move { transport.list_jobs().await }
            },
            |state, jobs| state.jobs = jobs.clone(),
        )
        .await
    }

    pub async fn load_alerts(&self) -> ClientResult<Vec<Alert>> {
        let transport = self.transport.clone();
        self.load_cached(
            KEY_ALERTS,
            |slot| match slot {
                CacheSlot::Alerts(alerts) => Some(alerts.clone()),
                _ => None,
            },
            CacheSlot::Alerts,
            move || {
                let transport = transport.clone();
                async move { transport.list_alerts().await }
            },
            |state, alerts| state.alerts = alerts.clone(),
        )
        .await
    }

    pub async fn load_usage(&self) -> ClientResult<UsageReport> {
        let transport = self.transport.clone();
        self.load_cached(
            KEY_USAGE,
            |slot| match slot {
                CacheSlot::Usage(report) => Some(report.clone()),
                _ => None,
            },
            CacheSlot::Usage,
            move || {
                let transport = transport.clone();
                async move { transport.get_usage().await }
            },
            |state, report| state.usage = Some(report.clone()),
        )
        .await
    }

    pub async fn load_monitoring(&self) -> ClientResult<MonitoringSnapshot> {
        let transport = self.transport.clone();
        self.load_cached(
            KEY_MONITORING,
            |slot| match slot {
                CacheSlot::Monitoring(snapshot) => Some(snapshot.clone()),
                _ => None,
            },
            CacheSlot::Monitoring,
            move || {
                let transport = transport.clone();
                async move { transport.get_monitoring().await }
            },
            |state, snapshot| state.monitoring = Some(snapshot.clone()),
        )
        .await
    }

    // ------------------------------------------------------------------------
    // Mutations (single attempt, confirmed-commit)
    // ------------------------------------------------------------------------

    pub async fn create_engine(&self, req: &CreateEngineRequest) -> ClientResult<Engine> {
        let engine = self.mutate(self.transport.create_engine(req)).await?;
        self.cache.invalidate(KEY_ENGINES);
        self.state.write().await.upsert_engine(engine.clone());
        Ok(engine)
    }

    pub async fn update_engine(
        &self,
        id: EntityId,
        req: &UpdateEngineRequest,
    ) -> ClientResult<Engine> {
        let engine = self.mutate(self.transport.update_engine(id, req)).await?;
        self.cache.invalidate(KEY_ENGINES);
        self.cache.invalidate(&engine_key(id));
        self.state.write().await.upsert_engine(engine.clone());
        Ok(engine)
    }

    pub async fn delete_engine(&self, id: EntityId) -> ClientResult<()> {
        self.mutate(self.transport.delete_engine(id)).await?;
        self.cache.invalidate(KEY_ENGINES);
        self.cache.invalidate(&engine_key(id));
        self.state.write().await.remove_engine(id);
        Ok(())
    }

    pub async fn create_strategy(&self, req: &CreateStrategyRequest) -> ClientResult<Strategy> {
        let strategy = self.mutate(self.transport.create_strategy(req)).await?;
        self.cache.invalidate(KEY_STRATEGIES);
        self.state.write().await.upsert_strategy(strategy.clone());
        Ok(strategy)
    }

    pub async fn update_strategy(
        &self,
        id: EntityId,
        req: &UpdateStrategyRequest,
    ) -> ClientResult<Strategy> {
        let strategy = self.mutate(self.transport.update_strategy(id, req)).await?;
        self.cache.invalidate(KEY_STRATEGIES);
        self.state.write().await.upsert_strategy(strategy.clone());
        Ok(strategy)
    }

    pub async fn delete_strategy(&self, id: EntityId) -> ClientResult<()> {
        self.mutate(self.transport.delete_strategy(id)).await?;
        self.cache.invalidate(KEY_STRATEGIES);
        self.state.write().await.remove_strategy(id);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Domain actions
    // ------------------------------------------------------------------------

    pub async fn start_job(
        &self,
        engine_id: EntityId,
        strategy_id: EntityId,
    ) -> ClientResult<OptimizationJob> {
        let req = StartJobRequest {
            engine_id,
            strategy_id,
        };
        let job = self.mutate(self.transport.start_job(&req)).await?;
        self.cache.invalidate(KEY_JOBS);
        self.state.write().await.upsert_job(job.clone());
        self.metrics.record_job_started();
        Ok(job)
    }

    pub async fn stop_job(&self, id: EntityId) -> ClientResult<OptimizationJob> {
        let job = self.mutate(self.transport.stop_job(id)).await?;
        self.cache.invalidate(KEY_JOBS);
        self.state.write().await.upsert_job(job.clone());
        self.metrics.record_job_stopped();
        Ok(job)
    }

    pub async fn apply_strategy(&self, id: EntityId) -> ClientResult<Strategy> {
        let strategy = self.mutate(self.transport.apply_strategy(id)).await?;
        self.cache.invalidate(KEY_STRATEGIES);
        self.state.write().await.upsert_strategy(strategy.clone());
        self.metrics.record_strategy_applied();
        Ok(strategy)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    pub(crate) fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Cache-through read. Hit returns the cached value without touching
    /// state; miss takes the key's latch, re-checks, then fetches with retry.
    /// Success caches and commits to state; failure records the error on
    /// state and leaves prior data in place.
    async fn load_cached<T, F, Fut>(
        &self,
        key: &str,
        unwrap: impl Fn(&CacheSlot) -> Option<T>,
        wrap: impl FnOnce(T) -> CacheSlot,
        fetch: F,
        sink: impl FnOnce(&mut ConsoleState, &T),
    ) -> ClientResult<T>
    where
        T: Clone,
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        self.metrics.record_operation();

        if let Some(value) = self.cache.get(key).as_ref().and_then(&unwrap) {
            self.metrics.record_success();
            return Ok(value);
        }

        let latch = self.latch_for(key);
        let outcome = {
            let _held = latch.lock().await;

            // A concurrent fetch for this key may have landed while we waited.
            if let Some(value) = self.cache.peek(key).as_ref().and_then(&unwrap) {
                self.metrics.record_success();
                Ok(value)
            } else {
                match self.retry.run(&self.metrics, fetch).await {
                    Ok(value) => {
                        self.cache.put(key, wrap(value.clone()));
                        let mut state = self.state.write().await;
                        sink(&mut state, &value);
                        state.clear_error();
                        drop(state);
                        self.metrics.record_success();
                        Ok(value)
                    }
                    Err(err) => {
                        tracing::warn!(key, error = %err, "load failed, keeping prior data");
                        self.state.write().await.set_error(err.code(), err.to_string());
                        Err(err)
                    }
                }
            }
        };
        self.release_latch(key, &latch);
        outcome
    }

    /// Single-attempt mutation wrapper: counts the operation, and on failure
    /// records it on shared state without touching collections or cache.
    async fn mutate<T>(&self, fut: impl Future<Output = ClientResult<T>>) -> ClientResult<T> {
        self.metrics.record_operation();
        match fut.await {
            Ok(value) => {
                self.metrics.record_success();
                self.state.write().await.clear_error();
                Ok(value)
            }
            Err(err) => {
                self.metrics.record_failure();
                tracing::warn!(error = %err, "mutation failed, state unchanged");
                self.state.write().await.set_error(err.code(), err.to_string());
                Err(err)
            }
        }
    }

    fn latch_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = lock_unpoisoned(&self.inflight);
        inflight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop the key's latch once no caller is waiting on it, so per-id keys
    /// do not accumulate over the session. Latches are only cloned under the
    /// map lock, so the refcount check here is race-free.
    fn release_latch(&self, key: &str, latch: &Arc<tokio::sync::Mutex<()>>) {
        let mut inflight = lock_unpoisoned(&self.inflight);
        // Two refs: the map entry and our own clone.
        if Arc::strong_count(latch) <= 2 {
            inflight.remove(key);
        }
    }
}

impl Drop for VantageClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, CacheConfig, ReconnectConfig, RetryConfig};
    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::mpsc;
    use vantage_core::{new_entity_id, EngineKind, EngineStatus, ErrorCode, PushEvent};

    struct StubTransport;

    fn not_wired<T>() -> ClientResult<T> {
        Err(ClientError::terminal(ErrorCode::EntityNotFound, "not wired"))
    }

    fn stub_engine() -> Engine {
        let now = Utc::now();
        Engine {
            engine_id: new_entity_id(),
            name: "stub".to_string(),
            kind: EngineKind::Heuristic,
            status: EngineStatus::Active,
            version: "0.1.0".to_string(),
            capabilities: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn list_engines(&self) -> ClientResult<Vec<Engine>> {
            Ok(vec![stub_engine()])
        }
        async fn get_engine(&self, _id: EntityId) -> ClientResult<Engine> {
            not_wired()
        }
        async fn list_strategies(&self) -> ClientResult<Vec<Strategy>> {
            not_wired()
        }
        async fn list_templates(&self) -> ClientResult<Vec<StrategyTemplate>> {
            not_wired()
        }
        async fn list_jobs(&self) -> ClientResult<Vec<OptimizationJob>> {
            not_wired()
        }
        async fn list_alerts(&self) -> ClientResult<Vec<Alert>> {
            not_wired()
        }
        async fn get_usage(&self) -> ClientResult<UsageReport> {
            not_wired()
        }
        async fn get_monitoring(&self) -> ClientResult<MonitoringSnapshot> {
            not_wired()
        }
        async fn create_engine(&self, _req: &CreateEngineRequest) -> ClientResult<Engine> {
            not_wired()
        }
        async fn update_engine(
            &self,
            _id: EntityId,
            _req: &UpdateEngineRequest,
        ) -> ClientResult<Engine> {
            not_wired()
        }
        async fn delete_engine(&self, _id: EntityId) -> ClientResult<()> {
            not_wired()
        }
        async fn create_strategy(&self, _req: &CreateStrategyRequest) -> ClientResult<Strategy> {
            not_wired()
        }
        async fn update_strategy(
            &self,
            _id: EntityId,
            _req: &UpdateStrategyRequest,
        ) -> ClientResult<Strategy> {
            not_wired()
        }
        async fn delete_strategy(&self, _id: EntityId) -> ClientResult<()> {
            not_wired()
        }
        async fn start_job(&self, _req: &StartJobRequest) -> ClientResult<OptimizationJob> {
            not_wired()
        }
        async fn stop_job(&self, _id: EntityId) -> ClientResult<OptimizationJob> {
            not_wired()
        }
        async fn apply_strategy(&self, _id: EntityId) -> ClientResult<Strategy> {
            not_wired()
        }
        async fn subscribe(&self) -> ClientResult<mpsc::Receiver<PushEvent>> {
            not_wired()
        }
    }

    fn test_client() -> VantageClient {
        let config = ClientConfig {
            api_base_url: "http://localhost:8080".to_string(),
            ws_endpoint: "ws://localhost:8080/api/v1/events".to_string(),
            auth: AuthConfig {
                api_key: Some("test-key".to_string()),
                bearer_token: None,
            },
            request_timeout_ms: 5_000,
            refresh_interval_ms: 30_000,
            cache: CacheConfig { ttl_ms: 10_000 },
            retry: RetryConfig {
                max_retries: 3,
                base_delay_ms: 100,
                max_delay_ms: 5_000,
            },
            reconnect: ReconnectConfig {
                initial_ms: 500,
                max_ms: 30_000,
                multiplier: 2.0,
                jitter_ms: 0,
            },
        };
        VantageClient::new(config, Arc::new(StubTransport))
    }

    #[test]
    fn test_engine_key_embeds_resource_kind() {
        let id = new_entity_id();
        assert_eq!(engine_key(id), format!("optimization-engine-{id}"));
    }

    #[tokio::test]
    async fn test_latch_released_after_successful_load() {
        let client = test_client();
        client.load_engines().await.expect("load");
        assert!(lock_unpoisoned(&client.inflight).is_empty());
    }

    #[tokio::test]
    async fn test_latch_released_after_failed_load() {
        let client = test_client();
        assert!(client.load_jobs().await.is_err());
        assert!(lock_unpoisoned(&client.inflight).is_empty());

        // Per-engine keys are released too, not just the fixed list keys.
        assert!(client.get_engine(new_entity_id()).await.is_err());
        assert!(lock_unpoisoned(&client.inflight).is_empty());
    }
}
