use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};
use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use registry::store::MemoryEndpointStore;
use registry::{Endpoint, EndpointRegistry};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

/// Serves `app` on an ephemeral local port.
pub async fn spawn_server(app: axum::Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to address");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

pub fn registry_with(addresses: &[&str]) -> Arc<EndpointRegistry> {
    let endpoints = addresses
        .iter()
        .enumerate()
        .map(|(i, address)| Endpoint::new(*address, i as i64 + 1, "", ""))
        .collect();

    Arc::new(EndpointRegistry::new(Arc::new(
        MemoryEndpointStore::with_endpoints(endpoints),
    )))
}

#[derive(Clone)]
pub enum Step {
    Respond(u16, &'static str),
    Fail(TransportError),
    Hang,
    Panic,
}

impl Step {
    pub fn json(body: &'static str) -> Self {
        Step::Respond(200, body)
    }
}

/// Transport double that answers by endpoint host and records every call.
#[derive(Default)]
pub struct ScriptedTransport {
    steps: HashMap<String, Step>,
    calls: Mutex<Vec<Url>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, host: &str, step: Step) -> Self {
        self.steps.insert(host.to_string(), step);
        self
    }

    pub fn calls(&self) -> Vec<Url> {
        self.calls.lock().unwrap().clone()
    }

    pub fn hosts_called(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|url| url.host_str().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn perform(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push(request.url.clone());

        let host = request.url.host_str().unwrap_or_default();
        let step = self
            .steps
            .get(host)
            .cloned()
            .unwrap_or(Step::Fail(TransportError::Connection(format!(
                "no route to {host}"
            ))));

        match step {
            Step::Respond(status, body) => Ok(TransportResponse {
                status: StatusCode::from_u16(status).unwrap(),
                body: Bytes::from_static(body.as_bytes()),
            }),
            Step::Fail(err) => Err(err),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TransportError::Timeout)
            }
            Step::Panic => panic!("transport blew up"),
        }
    }
}
