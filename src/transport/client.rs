//! Transport Client
//!
//! HTTP calls to the backend, with optional streamed callbacks delivered
//! over the shared push channel.
//!
//! A streamed call goes through these steps:
//! 1. Acquire the push channel and wait for the server-assigned session id
//! 2. `POST /<path>/<session id>`, answered with the request id and the
//!    callback names the server will emit
//! 3. Register the caller's callbacks under that request id and replay any
//!    frames that outran the HTTP response
//! 4. Resolve with the `finish` frame and release the channel

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use url::Url;

use super::connection::{Channel, ConnectionState, TransportEvent};
use super::dispatch::CallbackMap;
use super::error::{TransportError, TransportResult};
use super::frames::StreamStart;
use super::ShellTransport;
use crate::config::{ShellConfig, TransportSettings};

/// Client for one backend
pub struct TransportClient {
    /// HTTP client with configured timeouts
    http: Client,
    request_timeout: Duration,
    /// Base URL for HTTP calls, always ends with '/'
    base_url: Url,
    /// How long a streamed call waits for a session id
    session_wait: Duration,
    /// Push channel shared by every streamed call
    channel: Arc<Channel>,
}

/// Holds one reference on the push channel for the lifetime of a streamed
/// call, including calls whose future is dropped before finishing.
struct StreamLease {
    channel: Arc<Channel>,
    request_uuid: Option<String>,
}

impl StreamLease {
    fn acquire(channel: &Arc<Channel>) -> Self {
        channel.acquire();
        Self {
            channel: channel.clone(),
            request_uuid: None,
        }
    }
}

impl Drop for StreamLease {
    fn drop(&mut self) {
        if let Some(request_uuid) = self.request_uuid.take() {
            self.channel.dispatcher.lock().discard(&request_uuid);
        }
        self.channel.release();
    }
}

impl TransportClient {
    /// Create a client for the backend described by `config`
    pub fn new(config: &ShellConfig) -> TransportResult<Self> {
        Self::with_urls(
            &config.backend.http_url(),
            &config.backend.ws_url(),
            &config.transport,
        )
    }

    /// Create a client with explicit HTTP and WebSocket endpoints
    pub fn with_urls(
        http_url: &str,
        ws_url: &str,
        settings: &TransportSettings,
    ) -> TransportResult<Self> {
        let mut base_url = Url::parse(http_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Url::parse(ws_url)?;

        let http = Client::builder()
            .timeout(settings.request_timeout())
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            http,
            request_timeout: settings.request_timeout(),
            base_url,
            session_wait: settings.session_wait(),
            channel: Channel::new(ws_url, settings.reconnect.clone()),
        })
    }

    fn url(&self, path: &str) -> TransportResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn request_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::ConnectionTimeout(self.request_timeout.as_millis() as u64)
        } else {
            err.into()
        }
    }

    /// Send a request and decode its JSON body, failing on non-2xx
    async fn send_json(&self, request: RequestBuilder) -> TransportResult<Value> {
        let response = request.send().await.map_err(|e| self.request_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.request_error(e))?;

        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| TransportError::InvalidResponse(format!("{}: {}", e, text)))
    }

    fn with_body(request: RequestBuilder, body: Option<&Value>) -> RequestBuilder {
        match body {
            Some(body) => request.json(body),
            None => request,
        }
    }

    pub async fn get(&self, path: &str) -> TransportResult<Value> {
        let url = self.url(path)?;
        debug!("GET {}", url);
        self.send_json(self.http.get(url)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> TransportResult<Value> {
        let url = self.url(path)?;
        debug!("PUT {}", url);
        self.send_json(self.http.put(url).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> TransportResult<Value> {
        let url = self.url(path)?;
        debug!("DELETE {}", url);
        self.send_json(self.http.delete(url)).await
    }

    /// POST to `path`.
    ///
    /// Without callbacks this is a plain JSON request. With callbacks the
    /// call is streamed: each named callback receives its payloads as the
    /// backend pushes them, and the returned value is the `finish` frame.
    pub async fn post(
        &self,
        path: &str,
        body: Option<&Value>,
        callbacks: Option<CallbackMap>,
    ) -> TransportResult<Value> {
        match callbacks {
            Some(callbacks) => self.post_streaming(path, body, callbacks).await,
            None => {
                let url = self.url(path)?;
                debug!("POST {}", url);
                self.send_json(Self::with_body(self.http.post(url), body)).await
            }
        }
    }

    async fn post_streaming(
        &self,
        path: &str,
        body: Option<&Value>,
        callbacks: CallbackMap,
    ) -> TransportResult<Value> {
        let mut lease = StreamLease::acquire(&self.channel);

        let session_id = self
            .channel
            .wait_for_session(self.session_wait)
            .await
            .ok_or(TransportError::SessionUnavailable(
                self.session_wait.as_millis() as u64,
            ))?;

        let url = self.url(&format!("{}/{}", path.trim_end_matches('/'), session_id))?;
        debug!("POST {} (streamed, {} callback(s))", url, callbacks.len());

        let response = self
            .send_json(Self::with_body(self.http.post(url), body))
            .await?;
        let start: StreamStart = serde_json::from_value(response)
            .map_err(|e| TransportError::InvalidResponse(format!("streamed call: {}", e)))?;

        // Frames cached under this id are dropped with the lease on error
        lease.request_uuid = Some(start.request_uuid.clone());

        if let Some(name) = callbacks
            .names()
            .find(|name| !start.callbacks.iter().any(|c| c == name))
        {
            warn!(
                "Callback '{}' not offered by {} (available: {:?})",
                name, path, start.callbacks
            );
            return Err(TransportError::UnadvertisedCallback {
                name: name.to_string(),
                advertised: start.callbacks,
            });
        }

        let (finish_tx, finish_rx) = oneshot::channel();
        let replayed = self
            .channel
            .dispatcher
            .lock()
            .register(&start.request_uuid, callbacks, finish_tx);
        info!(
            "Streaming {} as {} ({} early frame(s))",
            path, start.request_uuid, replayed
        );

        let finish = finish_rx
            .await
            .map_err(|_| TransportError::Abandoned(start.request_uuid.clone()))?;
        debug!("Streamed call {} finished", start.request_uuid);
        Ok(finish)
    }

    /// Current push channel state
    pub fn state(&self) -> ConnectionState {
        self.channel.state()
    }

    /// Session id of the open push channel
    pub fn session_id(&self) -> Option<String> {
        self.channel.session_id()
    }

    /// Number of streamed calls currently holding the push channel
    pub fn active_requests(&self) -> usize {
        self.channel.refcount()
    }

    /// Subscribe to push channel events
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.channel.subscribe()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl Drop for TransportClient {
    fn drop(&mut self) {
        self.channel.abort();
    }
}

impl std::fmt::Debug for TransportClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportClient")
            .field("base_url", &self.base_url.as_str())
            .field("state", &self.state())
            .field("active_requests", &self.active_requests())
            .finish()
    }
}

#[async_trait]
impl ShellTransport for TransportClient {
    async fn get(&self, path: &str) -> TransportResult<Value> {
        TransportClient::get(self, path).await
    }

    async fn put(&self, path: &str, body: &Value) -> TransportResult<Value> {
        TransportClient::put(self, path, body).await
    }

    async fn delete(&self, path: &str) -> TransportResult<Value> {
        TransportClient::delete(self, path).await
    }

    async fn post(
        &self,
        path: &str,
        body: Option<&Value>,
        callbacks: Option<CallbackMap>,
    ) -> TransportResult<Value> {
        TransportClient::post(self, path, body, callbacks).await
    }

    fn transport_type(&self) -> &'static str {
        "http+ws"
    }
}
