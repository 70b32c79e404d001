use crate::operation::{MultipartForm, Payload};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use reqwest::multipart::{Form, Part};
use std::error::Error as _;
use std::time::Duration;
use url::Url;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Connection(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub payload: Payload,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Performs a single HTTP exchange with one endpoint.
///
/// Implementations report a response for any status code; deciding whether a
/// status counts as success is left to the router.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(&self, request: TransportRequest)
    -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        ReqwestTransport { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let builder = self
            .client
            .request(request.method, request.url)
            .timeout(request.timeout);

        let builder = match &request.payload {
            Payload::Query(params) if params.is_empty() => builder,
            Payload::Query(params) => builder.query(&params.pairs()),
            Payload::Multipart(form) => builder.multipart(build_form(form)?),
        };

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let body = response.bytes().await.map_err(classify)?;

        Ok(TransportResponse { status, body })
    }
}

fn build_form(form: &MultipartForm) -> Result<Form, TransportError> {
    let mut out = Form::new();

    for (key, value) in &form.fields {
        out = out.text(key.clone(), value.clone());
    }

    for file in &form.files {
        let part = Part::bytes(file.data.to_vec())
            .file_name(file.filename.clone())
            .mime_str(&file.content_type)
            .map_err(|e| TransportError::Other(format!("invalid content type: {e}")))?;
        out = out.part(file.field.clone(), part);
    }

    Ok(out)
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_builder() {
        TransportError::Other(describe(&err))
    } else {
        TransportError::Connection(describe(&err))
    }
}

// reqwest's top-level message omits the cause, e.g. "connection refused".
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
