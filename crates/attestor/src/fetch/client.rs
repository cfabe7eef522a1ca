//! Gateway retrieval with single-flight coalescing and a process-lifetime
//! cache.
//!
//! Content-addressed documents are immutable, so a successful fetch is
//! cached for the life of the process. Failures are evicted so a later call
//! retries. Concurrent calls for one identifier converge on one request;
//! gateway rate limits make duplicate in-flight fetches expensive.

use crate::config::AttestorConfig;
use crate::crypto::decode_cbor_value;
use crate::fetch::envelope::{
    parse_envelope, parse_reserve_metadata, MetadataEnvelope, ReserveMetadata, SchemaError,
};
use crate::fetch::gateway::{gateway_url, resolve_gateways};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

#[derive(Error, Clone, Debug)]
pub enum FetchError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("gateway status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("empty body from {0}")]
    EmptyBody(String),
    #[error("decode: {0}")]
    Decode(String),
    #[error("schema: {0}")]
    Schema(#[from] SchemaError),
    #[error("no gateways configured")]
    NoGateways,
}

impl FetchError {
    /// Schema violations are integrity failures; everything else is
    /// transport-shaped and downgrades to a recorded status upstream.
    pub fn is_schema(&self) -> bool {
        matches!(self, FetchError::Schema(_))
    }
}

#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// The HTTP seam. Production uses reqwest; tests script responses.
#[async_trait::async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<TransportResponse, String>;
    async fn head(&self, url: &str) -> Result<u16, String>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl GatewayTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, String> {
        let response = self
            .client
            .get(url)
            .header("accept", "application/json, application/cbor")
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| e.to_string())?.to_vec();
        Ok(TransportResponse {
            status,
            content_type,
            body,
        })
    }

    async fn head(&self, url: &str) -> Result<u16, String> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Ok(response.status().as_u16())
    }
}

enum Claim {
    Leader,
    Follower(broadcast::Receiver<Result<Value, FetchError>>),
}

pub struct IpfsFetcher {
    transport: Arc<dyn GatewayTransport>,
    gateways: Vec<String>,
    retry_delays: Vec<Duration>,
    completed: RwLock<HashMap<String, Value>>,
    in_flight: RwLock<HashMap<String, broadcast::Sender<Result<Value, FetchError>>>>,
    request_count: AtomicU64,
}

impl IpfsFetcher {
    pub fn new(config: &AttestorConfig) -> Result<Self, FetchError> {
        let transport = Arc::new(HttpTransport::new(Duration::from_secs(
            config.http_timeout_secs,
        ))?);
        Ok(Self::with_transport(
            transport,
            resolve_gateways(config),
            &config.retry_delays_ms,
        ))
    }

    pub fn with_transport(
        transport: Arc<dyn GatewayTransport>,
        gateways: Vec<String>,
        retry_delays_ms: &[u64],
    ) -> Self {
        Self {
            transport,
            gateways,
            retry_delays: retry_delays_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            completed: RwLock::new(HashMap::new()),
            in_flight: RwLock::new(HashMap::new()),
            request_count: AtomicU64::new(0),
        }
    }

    /// URL on the primary gateway, used when surfacing records.
    pub fn primary_url(&self, cid: &str) -> String {
        match self.gateways.first() {
            Some(base) => gateway_url(base, cid),
            None => cid.to_string(),
        }
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub async fn fetch_envelope(&self, cid: &str) -> Result<MetadataEnvelope, FetchError> {
        let raw = self.fetch_raw(cid).await?;
        Ok(parse_envelope(&raw)?)
    }

    /// Reserve documents are referenced by hash memos that may land on
    /// chain before gateway propagation finishes; probe for existence
    /// before committing to the full fetch.
    pub async fn fetch_reserve(&self, cid: &str) -> Result<ReserveMetadata, FetchError> {
        self.probe(cid).await?;
        let raw = self.fetch_raw(cid).await?;
        Ok(parse_reserve_metadata(&raw)?)
    }

    async fn fetch_raw(&self, cid: &str) -> Result<Value, FetchError> {
        if let Some(value) = self.completed.read().await.get(cid) {
            debug!(cid = %cid, "metadata cache hit");
            return Ok(value.clone());
        }
        match self.claim(cid).await {
            Claim::Follower(mut rx) => match rx.recv().await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Transport("in-flight fetch dropped".to_string())),
            },
            Claim::Leader => {
                // the previous leader may have completed between our cache
                // check and the claim
                let cached = self.completed.read().await.get(cid).cloned();
                if let Some(value) = cached {
                    self.complete(cid, &Ok(value.clone())).await;
                    return Ok(value);
                }
                let result = self.fetch_uncached(cid).await;
                self.complete(cid, &result).await;
                result
            }
        }
    }

    async fn claim(&self, cid: &str) -> Claim {
        let mut in_flight = self.in_flight.write().await;
        if let Some(sender) = in_flight.get(cid) {
            return Claim::Follower(sender.subscribe());
        }
        let (sender, _) = broadcast::channel(1);
        in_flight.insert(cid.to_string(), sender);
        Claim::Leader
    }

    async fn complete(&self, cid: &str, result: &Result<Value, FetchError>) {
        if let Ok(value) = result {
            self.completed
                .write()
                .await
                .insert(cid.to_string(), value.clone());
        }
        let sender = self.in_flight.write().await.remove(cid);
        if let Some(sender) = sender {
            let _ = sender.send(result.clone());
        }
    }

    async fn fetch_uncached(&self, cid: &str) -> Result<Value, FetchError> {
        if self.gateways.is_empty() {
            return Err(FetchError::NoGateways);
        }
        let mut last_err: Option<FetchError> = None;
        let attempts = self.retry_delays.len();
        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }
            for base in &self.gateways {
                let url = gateway_url(base, cid);
                self.request_count.fetch_add(1, Ordering::Relaxed);
                match self.transport.get(&url).await {
                    Ok(response) if (200..300).contains(&response.status) => {
                        match decode_body(&response, &url) {
                            Ok(value) => {
                                debug!(cid = %cid, url = %url, "metadata fetched");
                                return Ok(value);
                            }
                            Err(err) => last_err = Some(err),
                        }
                    }
                    Ok(response) => {
                        last_err = Some(FetchError::Status {
                            status: response.status,
                            url,
                        });
                    }
                    Err(message) => last_err = Some(FetchError::Transport(message)),
                }
            }
            if attempt + 1 < attempts {
                warn!(cid = %cid, attempt = attempt + 1, "all gateways failed, will retry");
            }
        }
        Err(last_err.unwrap_or(FetchError::NoGateways))
    }

    async fn probe(&self, cid: &str) -> Result<(), FetchError> {
        if self.gateways.is_empty() {
            return Err(FetchError::NoGateways);
        }
        let mut last_err: Option<FetchError> = None;
        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }
            for base in &self.gateways {
                let url = gateway_url(base, cid);
                match self.transport.head(&url).await {
                    // some gateways reject probes outright but serve full
                    // requests, so method-not-allowed counts as present
                    Ok(status) if (200..300).contains(&status) || status == 405 => {
                        debug!(cid = %cid, url = %url, status, "probe ok");
                        return Ok(());
                    }
                    Ok(status) => last_err = Some(FetchError::Status { status, url }),
                    Err(message) => last_err = Some(FetchError::Transport(message)),
                }
            }
            debug!(cid = %cid, attempt = attempt + 1, "probe retry");
        }
        Err(last_err.unwrap_or(FetchError::NoGateways))
    }
}

fn decode_body(response: &TransportResponse, url: &str) -> Result<Value, FetchError> {
    if response.body.is_empty() {
        return Err(FetchError::EmptyBody(url.to_string()));
    }
    let content_type = response
        .content_type
        .as_deref()
        .unwrap_or("")
        .to_ascii_lowercase();
    if content_type.contains("json") || content_type.starts_with("text/") {
        return serde_json::from_slice(&response.body)
            .map_err(|e| FetchError::Decode(format!("json: {e}")));
    }
    match decode_cbor_value(&response.body) {
        Ok(value) => Ok(value),
        Err(_) => serde_json::from_slice(&response.body)
            .map_err(|e| FetchError::Decode(format!("json: {e}"))),
    }
}
