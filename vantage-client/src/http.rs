//! HTTP + WebSocket transport implementation.
//!
//! `HttpTransport` speaks the backend's REST surface and live channel. Every
//! REST response is the uniform envelope; this module decodes it with typed
//! `serde` and collapses it into `ClientResult` so callers never see raw JSON.

use crate::config::{ClientConfig, ConfigError};
use crate::error::{ClientError, ClientResult};
use crate::transport::Transport;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::tungstenite::Message;
use vantage_core::{
    Alert, CreateEngineRequest, CreateStrategyRequest, Engine, Envelope, EntityId, ErrorCode,
    ErrorInfo, MonitoringSnapshot, OptimizationJob, PushEvent, StartJobRequest, Strategy,
    StrategyTemplate, UpdateEngineRequest, UpdateStrategyRequest, UsageReport,
};

/// Buffer between the WS reader task and the realtime consumer.
const PUSH_CHANNEL_CAPACITY: usize = 256;

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    ws_endpoint: String,
    auth_headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(ClientError::from_reqwest)?;
        let auth_headers = build_auth_headers(config)?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            ws_endpoint: config.ws_endpoint.clone(),
            auth_headers,
        })
    }

    async fn get_json<T>(&self, path: &str) -> ClientResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(url)
            .headers(self.auth_headers.clone())
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        parse_envelope(response).await
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(url)
            .headers(self.auth_headers.clone())
            .json(body)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        parse_envelope(response).await
    }

    async fn put_json<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .put(url)
            .headers(self.auth_headers.clone())
            .json(body)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        parse_envelope(response).await
    }

    /// DELETE returning an envelope whose `data` may be absent.
    async fn delete_ack(&self, path: &str) -> ClientResult<()> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .delete(url)
            .headers(self.auth_headers.clone())
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        parse_ack(response).await
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn list_engines(&self) -> ClientResult<Vec<Engine>> {
        self.get_json("/api/v1/optimization/engines").await
    }

    async fn get_engine(&self, id: EntityId) -> ClientResult<Engine> {
        self.get_json(&format!("/api/v1/optimization/engines/{id}"))
            .await
    }

    async fn list_strategies(&self) -> ClientResult<Vec<Strategy>> {
        self.get_json("/api/v1/optimization/strategies").await
    }

    async fn list_templates(&self) -> ClientResult<Vec<StrategyTemplate>> {
        self.get_json("/api/v1/optimization/templates").await
    }

    async fn list_jobs(&self) -> ClientResult<Vec<OptimizationJob>> {
        self.get_json("/api/v1/optimization/jobs").await
    }

    async fn list_alerts(&self) -> ClientResult<Vec<Alert>> {
        self.get_json("/api/v1/optimization/alerts").await
    }

    async fn get_usage(&self) -> ClientResult<UsageReport> {
        self.get_json("/api/v1/optimization/usage").await
    }

    async fn get_monitoring(&self) -> ClientResult<MonitoringSnapshot> {
        self.get_json("/api/v1/optimization/monitoring").await
    }

    async fn create_engine(&self, req: &CreateEngineRequest) -> ClientResult<Engine> {
        self.post_json("/api/v1/optimization/engines", req).await
    }

    async fn update_engine(&self, id: EntityId, req: &UpdateEngineRequest) -> ClientResult<Engine> {
        self.put_json(&format!("/api/v1/optimization/engines/{id}"), req)
            .await
    }

    async fn delete_engine(&self, id: EntityId) -> ClientResult<()> {
        self.delete_ack(&format!("/api/v1/optimization/engines/{id}"))
            .await
    }

    async fn create_strategy(&self, req: &CreateStrategyRequest) -> ClientResult<Strategy> {
        self.post_json("/api/v1/optimization/strategies", req).await
    }

    async fn update_strategy(
        &self,
        id: EntityId,
        req: &UpdateStrategyRequest,
    ) -> ClientResult<Strategy> {
        self.put_json(&format!("/api/v1/optimization/strategies/{id}"), req)
            .await
    }

    async fn delete_strategy(&self, id: EntityId) -> ClientResult<()> {
        self.delete_ack(&format!("/api/v1/optimization/strategies/{id}"))
            .await
    }

    async fn start_job(&self, req: &StartJobRequest) -> ClientResult<OptimizationJob> {
        self.post_json("/api/v1/optimization/jobs", req).await
    }

    async fn stop_job(&self, id: EntityId) -> ClientResult<OptimizationJob> {
        self.post_json(&format!("/api/v1/optimization/jobs/{id}/stop"), &())
            .await
    }

    async fn apply_strategy(&self, id: EntityId) -> ClientResult<Strategy> {
        self.post_json(&format!("/api/v1/optimization/strategies/{id}/apply"), &())
            .await
    }

    /// Open one WebSocket connection and forward decoded events.
    ///
    /// The returned receiver yields `Connected` first and `Disconnected`
    /// last; reconnection is the realtime layer's job, which simply calls
    /// `subscribe` again.
    async fn subscribe(&self) -> ClientResult<mpsc::Receiver<PushEvent>> {
        let mut request = Request::builder()
            .uri(self.ws_endpoint.clone())
            .body(())
            .map_err(|e| {
                ClientError::Config(ConfigError::InvalidValue {
                    field: "ws_endpoint",
                    reason: e.to_string(),
                })
            })?;
        let headers = request.headers_mut();
        for (name, value) in self.auth_headers.iter() {
            headers.insert(name, value.clone());
        }

        let (mut stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| ClientError::transient(ErrorCode::Unavailable, e.to_string()))?;

        let (sender, receiver) = mpsc::channel(PUSH_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let _ = sender.send(PushEvent::Connected).await;
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<PushEvent>(&text) {
                        Ok(event) => {
                            if sender.send(event).await.is_err() {
                                return;
                            }
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "undecodable push event, skipping");
                            let _ = sender
                                .send(PushEvent::Error {
                                    message: format!("push decode error: {err}"),
                                })
                                .await;
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        let _ = sender
                            .send(PushEvent::Error {
                                message: err.to_string(),
                            })
                            .await;
                        break;
                    }
                }
            }
            let _ = sender
                .send(PushEvent::Disconnected {
                    reason: "connection closed".to_string(),
                })
                .await;
        });

        Ok(receiver)
    }
}

/// Decode a response as `Envelope<T>` and collapse it into a result.
async fn parse_envelope<T>(response: reqwest::Response) -> ClientResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    let text = response.text().await.map_err(ClientError::from_reqwest)?;
    match serde_json::from_str::<Envelope<T>>(&text) {
        Ok(envelope) => envelope.into_result().map_err(ClientError::from_error_info),
        Err(err) => Err(classify_unenveloped(status, &err.to_string())),
    }
}

/// Like [`parse_envelope`] but tolerates a success envelope without `data`.
async fn parse_ack(response: reqwest::Response) -> ClientResult<()> {
    let status = response.status();
    let text = response.text().await.map_err(ClientError::from_reqwest)?;
    match serde_json::from_str::<Envelope<serde_json::Value>>(&text) {
        Ok(envelope) if envelope.success => Ok(()),
        Ok(envelope) => Err(ClientError::from_error_info(envelope.error.unwrap_or_else(
            || ErrorInfo::new(ErrorCode::MalformedResponse, "failure envelope without error"),
        ))),
        Err(err) => Err(classify_unenveloped(status, &err.to_string())),
    }
}

/// A body that is not an envelope at all. Classify by HTTP status: capacity
/// failures are transient, everything else is a schema violation.
fn classify_unenveloped(status: StatusCode, detail: &str) -> ClientError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        ClientError::transient(ErrorCode::RateLimited, format!("HTTP 429: {detail}"))
    } else if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        ClientError::transient(ErrorCode::Timeout, format!("HTTP {status}: {detail}"))
    } else if status.is_server_error() {
        ClientError::transient(ErrorCode::Unavailable, format!("HTTP {status}: {detail}"))
    } else {
        ClientError::terminal(
            ErrorCode::MalformedResponse,
            format!("HTTP {status}: {detail}"),
        )
    }
}

fn build_auth_headers(config: &ClientConfig) -> ClientResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = &config.auth.api_key {
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(api_key).map_err(|e| {
                ClientError::Config(ConfigError::InvalidValue {
                    field: "auth.api_key",
                    reason: e.to_string(),
                })
            })?,
        );
    }
    if let Some(token) = &config.auth.bearer_token {
        let value = format!("Bearer {token}");
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&value).map_err(|e| {
                ClientError::Config(ConfigError::InvalidValue {
                    field: "auth.bearer_token",
                    reason: e.to_string(),
                })
            })?,
        );
    }
    Ok(headers)
}
