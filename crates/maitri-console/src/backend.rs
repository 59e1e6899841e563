//! Request/response access to the backend: the chat fallback used while the
//! link is down and the periodic vitals poll.

use crate::shutdown_requested;
use crate::store::{Update, WeakStore};
use async_trait::async_trait;
use maitri_core::wire::{vitals_from_data, ChatReply, ChatRequest};
use maitri_core::VitalsPatch;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use url::Url;

pub const CONNECTION_ERROR_REPLY: &str = "Connection error. Please check if backend is running.";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const CHAT_PATH: &str = "api/chat";
const VITALS_PATH: &str = "api/vitals";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("invalid endpoint {path}: {reason}")]
    Endpoint { path: &'static str, reason: String },
    #[error("request failed: {0}")]
    Request(String),
    #[error("response body unreadable: {0}")]
    Decode(String),
    #[error("response carried no vitals")]
    MissingVitals,
}

#[async_trait]
pub trait Backend: Send + Sync + 'static {
    async fn chat(&self, text: &str) -> Result<ChatReply, BackendError>;
    async fn vitals(&self) -> Result<VitalsPatch, BackendError>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    api_url: Url,
}

impl HttpBackend {
    pub fn new(api_url: Url, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| BackendError::Request(err.to_string()))?;
        Ok(Self { client, api_url })
    }

    fn endpoint(&self, path: &'static str) -> Result<Url, BackendError> {
        endpoint_url(&self.api_url, path)
    }
}

/// Joins `path` onto the base even when the base lacks a trailing slash.
fn endpoint_url(base: &Url, path: &'static str) -> Result<Url, BackendError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path).map_err(|err| BackendError::Endpoint {
        path,
        reason: err.to_string(),
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn chat(&self, text: &str) -> Result<ChatReply, BackendError> {
        let url = self.endpoint(CHAT_PATH)?;
        let response = self
            .client
            .post(url)
            .json(&ChatRequest {
                text: text.to_string(),
            })
            .send()
            .await
            .map_err(|err| BackendError::Request(err.to_string()))?;
        response
            .json::<ChatReply>()
            .await
            .map_err(|err| BackendError::Decode(err.to_string()))
    }

    async fn vitals(&self) -> Result<VitalsPatch, BackendError> {
        let url = self.endpoint(VITALS_PATH)?;
        let body = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| BackendError::Request(err.to_string()))?
            .json::<Value>()
            .await
            .map_err(|err| BackendError::Decode(err.to_string()))?;
        vitals_from_data(&body).ok_or(BackendError::MissingVitals)
    }
}

/// Reply text for a fallback chat call, whatever the outcome.
pub fn fallback_reply_text(result: Result<ChatReply, BackendError>) -> String {
    match result {
        Ok(reply) => reply.into_text(),
        Err(err) => {
            debug!("chat_fallback_error: {err}");
            CONNECTION_ERROR_REPLY.to_string()
        }
    }
}

/// Polls vitals every `every`, first tick immediately. Stops when `shutdown`
/// fires or the store is gone.
pub fn spawn_vitals_poll(
    backend: Arc<dyn Backend>,
    store: WeakStore,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
            let result = tokio::select! {
                result = backend.vitals() => result,
                _ = shutdown_requested(&mut shutdown) => break,
            };
            let Some(store) = store.upgrade() else {
                break;
            };
            match result {
                Ok(patch) => store.apply(Update::Vitals(patch)),
                Err(err) => debug!("vitals_poll_error: {err}"),
            }
        }
        info!("vitals_poll_stopped");
    })
}
