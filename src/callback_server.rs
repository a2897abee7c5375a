// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Blind-XSS Callback Infrastructure
 * Correlation tracker and out-of-band HTTP listener
 *
 * The listener answers every request with 200/OK: the victim browser
 * executing an injected payload must never see an error. Correlation
 * happens server-side against previously registered payload tokens.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::errors::CallbackError;

/// Grace period for the listener to drain in-flight requests on stop.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle of an injected payload. `Executed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadStatus {
    Injected,
    Executed,
}

/// One out-of-band payload handed to a target field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadInfo {
    pub payload_id: String,
    pub timestamp: String,
    pub field_id: Option<String>,
    pub field_name: Option<String>,
    pub payload: String,
    pub origin_url: String,
    pub status: PayloadStatus,
    pub callback_id: Option<String>,
    pub executed_at: Option<String>,
}

/// One inbound ping on the listener. Recorded for every request,
/// correlated or not, to support manual review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackInfo {
    pub callback_id: String,
    pub timestamp: String,
    pub payload_id: Option<String>,
    pub client_ip: String,
    pub client_port: u16,
    pub path: String,
    pub query: HashMap<String, Vec<String>>,
    pub full_path: String,
    pub user_agent: String,
    pub referer: String,
}

#[derive(Default)]
struct TrackerMaps {
    injected: HashMap<String, PayloadInfo>,
    received: HashMap<String, CallbackInfo>,
}

/// Correlation table shared between the scanner (which registers
/// payloads) and the listener (which records callbacks and flips
/// payloads to executed). Both maps sit behind one mutex; it is the
/// only cross-thread mutable state in the pipeline.
#[derive(Default)]
pub struct PayloadTracker {
    maps: Mutex<TrackerMaps>,
}

impl PayloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh payload and return its correlation token.
    pub fn register_payload(
        &self,
        field_id: Option<&str>,
        field_name: Option<&str>,
        payload: &str,
        origin_url: &str,
    ) -> String {
        let mut maps = self.maps.lock();
        let payload_id = unique_token(|token| !maps.injected.contains_key(token));

        let info = PayloadInfo {
            payload_id: payload_id.clone(),
            timestamp: now(),
            field_id: field_id.map(String::from),
            field_name: field_name.map(String::from),
            payload: payload.to_string(),
            origin_url: origin_url.to_string(),
            status: PayloadStatus::Injected,
            callback_id: None,
            executed_at: None,
        };
        maps.injected.insert(payload_id.clone(), info);
        payload_id
    }

    /// Fill in the rendered payload text once the template has been
    /// interpolated and delivered.
    pub fn update_payload_body(&self, payload_id: &str, payload: &str) {
        let mut maps = self.maps.lock();
        if let Some(info) = maps.injected.get_mut(payload_id) {
            info.payload = payload.to_string();
        }
    }

    /// Record an inbound callback and, when the token matches a payload
    /// still in `Injected`, flip it to `Executed`.
    ///
    /// First write wins: a second callback for an executed payload is
    /// logged as a new `CallbackInfo` but leaves the payload untouched.
    pub fn record_callback(
        &self,
        payload_id: Option<&str>,
        client: SocketAddr,
        path: &str,
        query: HashMap<String, Vec<String>>,
        full_path: &str,
        user_agent: &str,
        referer: &str,
    ) -> CallbackInfo {
        let mut maps = self.maps.lock();
        let callback_id = unique_token(|token| !maps.received.contains_key(token));
        let timestamp = now();

        let info = CallbackInfo {
            callback_id: callback_id.clone(),
            timestamp: timestamp.clone(),
            payload_id: payload_id.map(String::from),
            client_ip: client.ip().to_string(),
            client_port: client.port(),
            path: path.to_string(),
            query,
            full_path: full_path.to_string(),
            user_agent: user_agent.to_string(),
            referer: referer.to_string(),
        };
        maps.received.insert(callback_id.clone(), info.clone());

        if let Some(id) = payload_id {
            if let Some(payload) = maps.injected.get_mut(id) {
                if payload.status == PayloadStatus::Injected {
                    payload.status = PayloadStatus::Executed;
                    payload.callback_id = Some(callback_id);
                    payload.executed_at = Some(timestamp);
                }
            }
        }

        info
    }

    pub fn injected_snapshot(&self) -> Vec<PayloadInfo> {
        self.maps.lock().injected.values().cloned().collect()
    }

    pub fn received_snapshot(&self) -> Vec<CallbackInfo> {
        self.maps.lock().received.values().cloned().collect()
    }

    pub fn executed_payloads(&self) -> Vec<PayloadInfo> {
        self.maps
            .lock()
            .injected
            .values()
            .filter(|p| p.status == PayloadStatus::Executed)
            .cloned()
            .collect()
    }

    pub fn payload(&self, payload_id: &str) -> Option<PayloadInfo> {
        self.maps.lock().injected.get(payload_id).cloned()
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// 8-hex-char token, re-rolled until it clears the freshness check.
fn unique_token(is_fresh: impl Fn(&str) -> bool) -> String {
    let mut rng = rand::rng();
    loop {
        let token = format!("{:08x}", rng.random::<u32>());
        if is_fresh(&token) {
            return token;
        }
    }
}

/// Background HTTP listener confirming blind-XSS execution.
pub struct CallbackServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind and start serving. A bind failure is fatal to the scan.
    pub async fn start(
        port: u16,
        tracker: Arc<PayloadTracker>,
    ) -> Result<Self, CallbackError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| CallbackError::Bind {
                port,
                reason: e.to_string(),
            })?;
        let addr = listener.local_addr().map_err(|e| CallbackError::Bind {
            port,
            reason: e.to_string(),
        })?;

        let app = Router::new()
            .fallback(handle_callback)
            .with_state(tracker);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        let handle = tokio::spawn(async move {
            if let Err(e) = server.await {
                error!("[Callback] Listener task failed: {}", e);
            }
        });

        info!("[Callback] Listening on {}", addr);
        Ok(Self {
            addr,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Close the listener and join its task within the grace period.
    /// In-flight request handling is allowed to finish.
    pub async fn stop(mut self) -> Result<(), CallbackError> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(handle) = self.handle.take() {
            tokio::time::timeout(SHUTDOWN_GRACE, handle)
                .await
                .map_err(|_| CallbackError::ShutdownTimeout {
                    grace: SHUTDOWN_GRACE,
                })?
                .map_err(|e| CallbackError::Task {
                    reason: e.to_string(),
                })?;
        }

        info!("[Callback] Listener stopped");
        Ok(())
    }
}

/// Answer absolutely everything with 200/OK, recording the hit.
async fn handle_callback(
    State(tracker): State<Arc<PayloadTracker>>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    let query = parse_query(uri.query().unwrap_or(""));
    let payload_id = query
        .get("id")
        .and_then(|values| values.first())
        .cloned();

    let full_path = uri
        .path_and_query()
        .map(|pq| pq.to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let user_agent = header_value(&headers, "user-agent");
    let referer = header_value(&headers, "referer");

    let info = tracker.record_callback(
        payload_id.as_deref(),
        client,
        uri.path(),
        query,
        &full_path,
        &user_agent,
        &referer,
    );

    debug!(
        "[Callback] {} {} from {} (payload: {:?})",
        info.callback_id, info.full_path, info.client_ip, info.payload_id
    );

    (StatusCode::OK, "OK")
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("Unknown")
        .to_string()
}

fn parse_query(raw: &str) -> HashMap<String, Vec<String>> {
    let mut query: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        query
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    query
}
