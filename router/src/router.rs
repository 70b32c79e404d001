//! Failover dispatch.
//!
//! A dispatch takes a snapshot of the registry's endpoints and walks it in
//! priority order, one attempt per endpoint, until an attempt succeeds or the
//! snapshot is exhausted:
//!
//! ```text
//! Init ──(empty)──────────────────────────────► AllEndpointsFailed(NoEndpoints)
//!   │
//!   ▼
//! Attempt(i) ──► Classify ──(success)─────────► Success(body)
//!   ▲               │
//!   └──(i + 1)──────┤ (failure, more endpoints)
//!                   │
//!                   └──(failure, last endpoint)► AllEndpointsFailed(last failure)
//! ```
//!
//! Attempts are strictly sequential. There is no retry beyond the single pass
//! and no deadline across attempts; each attempt is bounded by the operation's
//! timeout only.

use crate::errors::{FailureKind, Result, RouterError};
use crate::metrics_defs::{
    DISPATCH_ATTEMPTS, DISPATCH_DURATION, DISPATCH_EXHAUSTED, DISPATCH_FAILURES,
};
use crate::operation::Operation;
use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};
use registry::{Endpoint, EndpointRegistry};
use serde_json::Value;
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Outcome of a single endpoint attempt.
#[derive(Debug, PartialEq)]
pub enum AttemptOutcome {
    Success(Value),
    Failure(FailureKind),
}

struct LastFailure {
    endpoint: Option<String>,
    kind: FailureKind,
}

// Aborts the attempt task if the dispatch is dropped or times out.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Clone)]
pub struct FailoverRouter {
    registry: Arc<EndpointRegistry>,
    transport: Arc<dyn Transport>,
}

impl FailoverRouter {
    pub fn new(registry: Arc<EndpointRegistry>, transport: Arc<dyn Transport>) -> Self {
        FailoverRouter {
            registry,
            transport,
        }
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    /// Sends `operation` to each endpoint in priority order and returns the
    /// first successful JSON body.
    ///
    /// Never returns a per-endpoint error: failures are logged where they
    /// happen and only the last one is carried in
    /// [`RouterError::AllEndpointsFailed`].
    pub async fn dispatch(&self, operation: &Operation) -> Result<Value> {
        let started = Instant::now();
        let path = operation.path();

        // Later registry updates do not affect this dispatch
        let endpoints = match self.snapshot().await {
            Ok(endpoints) => endpoints,
            Err(kind) => {
                return Err(self.exhausted(
                    0,
                    LastFailure {
                        endpoint: None,
                        kind,
                    },
                    started,
                ));
            }
        };

        if endpoints.is_empty() {
            tracing::error!(path = %path, "No endpoints configured");
            return Err(self.exhausted(
                0,
                LastFailure {
                    endpoint: None,
                    kind: FailureKind::NoEndpoints,
                },
                started,
            ));
        }

        let total = endpoints.len();
        let mut state: std::result::Result<Value, LastFailure> = Err(LastFailure {
            endpoint: None,
            kind: FailureKind::NoEndpoints,
        });
        let mut attempts = 0;

        for endpoint in endpoints.iter() {
            attempts += 1;
            counter!(DISPATCH_ATTEMPTS).increment(1);
            tracing::info!(
                endpoint = %endpoint.address,
                priority = endpoint.priority,
                attempt = attempts,
                total,
                path = %path,
                "Sending request"
            );

            state = match self.attempt(endpoint, operation).await {
                AttemptOutcome::Success(body) => Ok(body),
                AttemptOutcome::Failure(kind) => {
                    counter!(DISPATCH_FAILURES, "kind" => kind.as_str()).increment(1);
                    tracing::warn!(
                        endpoint = %endpoint.address,
                        attempt = attempts,
                        total,
                        error = %kind,
                        "Endpoint attempt failed"
                    );
                    Err(LastFailure {
                        endpoint: Some(endpoint.address.clone()),
                        kind,
                    })
                }
            };

            if state.is_ok() {
                break;
            }
        }

        match state {
            Ok(body) => {
                histogram!(DISPATCH_DURATION, "outcome" => "success")
                    .record(started.elapsed().as_secs_f64());
                self.apply_server_list(&body).await;
                Ok(body)
            }
            Err(last) => Err(self.exhausted(attempts, last, started)),
        }
    }

    fn exhausted(&self, attempts: usize, last: LastFailure, started: Instant) -> RouterError {
        counter!(DISPATCH_EXHAUSTED).increment(1);
        histogram!(DISPATCH_DURATION, "outcome" => "exhausted")
            .record(started.elapsed().as_secs_f64());

        let err = RouterError::AllEndpointsFailed {
            attempts,
            last_endpoint: last.endpoint,
            last_failure: last.kind,
        };
        tracing::error!(error = %err, "All endpoints are unavailable");
        err
    }

    async fn attempt(&self, endpoint: &Endpoint, operation: &Operation) -> AttemptOutcome {
        let url = match operation.url_for(&endpoint.address) {
            Ok(url) => url,
            Err(e) => return AttemptOutcome::Failure(FailureKind::Unexpected(e.to_string())),
        };

        let request = TransportRequest {
            method: operation.method.clone(),
            url,
            payload: operation.payload.clone(),
            timeout: operation.timeout,
        };

        // The transport runs on its own task so a panic stays inside this attempt
        let transport = self.transport.clone();
        let mut task = AbortOnDrop(tokio::spawn(
            async move { transport.perform(request).await },
        ));

        match timeout(operation.timeout, &mut task.0).await {
            Err(_elapsed) => AttemptOutcome::Failure(FailureKind::Timeout),
            Ok(Err(join_error)) => AttemptOutcome::Failure(FailureKind::Unexpected(format!(
                "transport task failed: {join_error}"
            ))),
            Ok(Ok(result)) => classify(result),
        }
    }

    // The first load may read and decrypt the blob from disk.
    async fn snapshot(&self) -> std::result::Result<Arc<Vec<Endpoint>>, FailureKind> {
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || registry.load())
            .await
            .map_err(|e| FailureKind::Unexpected(format!("endpoint registry load failed: {e}")))
    }

    async fn apply_server_list(&self, body: &Value) {
        let Some(servers) = body.get("servers") else {
            return;
        };

        tracing::info!("Response carries a new endpoint list");

        // Persisting writes and syncs the blob, so it runs off the runtime threads
        let registry = self.registry.clone();
        let servers = servers.clone();
        match tokio::task::spawn_blocking(move || registry.update(&servers)).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("Endpoint list from response was not applied"),
            Err(e) => tracing::error!(error = %e, "Endpoint list update task failed"),
        }
    }
}

/// Maps a transport result to an attempt outcome.
pub fn classify(
    result: std::result::Result<TransportResponse, TransportError>,
) -> AttemptOutcome {
    let response = match result {
        Ok(response) => response,
        Err(TransportError::Timeout) => return AttemptOutcome::Failure(FailureKind::Timeout),
        Err(TransportError::Connection(message)) => {
            return AttemptOutcome::Failure(FailureKind::TransportError(message));
        }
        Err(TransportError::Other(message)) => {
            return AttemptOutcome::Failure(FailureKind::Unexpected(message));
        }
    };

    if !response.status.is_success() {
        return AttemptOutcome::Failure(FailureKind::BadStatus(response.status.as_u16()));
    }

    match serde_json::from_slice(&response.body) {
        Ok(body) => AttemptOutcome::Success(body),
        Err(e) => AttemptOutcome::Failure(FailureKind::MalformedResponse(e.to_string())),
    }
}
