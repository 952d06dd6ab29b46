use crate::{
    config::{ClientConfig, CustomRequestConfig},
    error::Result,
    response::RawResponse,
    types::{CompletionPostRequest, CompletionPostResponse, CompletionPostResponseChunk, ErrorResponse},
    OrchestrationError,
};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::{header::ACCEPT, Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use std::pin::Pin;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Header naming the resource group a call is scoped to.
pub const RESOURCE_GROUP_HEADER: &str = "AI-Resource-Group";

/// Sequence of parsed stream chunks, in arrival order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<CompletionPostResponseChunk>> + Send>>;

/// Where a call goes: a path relative to the API base, and its resource group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub url: String,
    pub resource_group: Option<String>,
}

/// A decoded non-streaming response with the HTTP details it arrived with.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub data: CompletionPostResponse,
    pub raw: RawResponse,
}

/// Executes composed requests against the orchestration service.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and wait for the complete response.
    async fn execute(
        &self,
        target: &RequestTarget,
        body: &CompletionPostRequest,
        config: &CustomRequestConfig,
    ) -> Result<TransportResponse>;

    /// Send the request and return its chunk sequence.
    ///
    /// Cancelling `cancel` aborts the request if the response has not arrived yet.
    async fn execute_stream(
        &self,
        target: &RequestTarget,
        body: &CompletionPostRequest,
        config: &CustomRequestConfig,
        cancel: CancellationToken,
    ) -> Result<ChunkStream>;
}

/// [`Transport`] over HTTP using `reqwest`, with server-sent events for streams.
#[derive(Debug)]
pub struct HttpTransport {
    http: Client,
    api_url: String,
    auth_token: Option<SecretString>,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            auth_token: None,
            timeout: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let mut transport = Self::new(&config.api_url).with_timeout(config.timeout);
        if let Some(token) = &config.auth_token {
            transport = transport.with_auth_token(token.expose_secret());
        }
        transport
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        let token: String = token.into();
        self.auth_token = Some(SecretString::from(token));
        self
    }

    /// Default timeout for non-streaming calls.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(
        &self,
        target: &RequestTarget,
        body: &CompletionPostRequest,
        config: &CustomRequestConfig,
    ) -> RequestBuilder {
        let url = format!("{}/v2{}", self.api_url, target.url);
        let mut request = self.http.post(&url).json(body);

        if let Some(group) = &target.resource_group {
            request = request.header(RESOURCE_GROUP_HEADER, group);
        }
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }
        for (name, value) in &config.headers {
            request = request.header(name, value);
        }
        request
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        target: &RequestTarget,
        body: &CompletionPostRequest,
        config: &CustomRequestConfig,
    ) -> Result<TransportResponse> {
        let mut request = self.request(target, body, config);
        if let Some(timeout) = config.timeout.or(self.timeout) {
            request = request.timeout(timeout);
        }

        tracing::debug!(url = %target.url, "sending orchestration request");
        let resp = send(request).await?;
        let raw = RawResponse {
            status: resp.status().as_u16(),
            headers: resp
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    Some((name.as_str().to_string(), value.to_str().ok()?.to_string()))
                })
                .collect(),
        };
        let text = resp.text().await?;
        Ok(TransportResponse {
            data: serde_json::from_str(&text)?,
            raw,
        })
    }

    async fn execute_stream(
        &self,
        target: &RequestTarget,
        body: &CompletionPostRequest,
        config: &CustomRequestConfig,
        cancel: CancellationToken,
    ) -> Result<ChunkStream> {
        // The default timeout covers the whole body, so streams only honor a per-call one.
        let mut request = self
            .request(target, body, config)
            .header(ACCEPT, "text/event-stream");
        if let Some(timeout) = config.timeout {
            request = request.timeout(timeout);
        }

        tracing::debug!(url = %target.url, "opening orchestration stream");
        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OrchestrationError::Cancelled),
            resp = send(request) => resp?,
        };

        let mut events = Box::pin(resp.bytes_stream().eventsource());
        let chunks = async_stream::stream! {
            let mut done = false;
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        done = true;
                        yield Err(OrchestrationError::Stream(format!("SSE parsing error: {e}")));
                        break;
                    }
                };

                let data = event.data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == "[DONE]" {
                    done = true;
                    break;
                }
                match parse_chunk(data) {
                    Ok(chunk) => yield Ok(chunk),
                    Err(e) => {
                        done = true;
                        yield Err(e);
                        break;
                    }
                }
            }
            if !done {
                yield Err(OrchestrationError::Stream("stream ended before [DONE]".to_string()));
            }
        };

        Ok(Box::pin(chunks))
    }
}

/// Send a request, turning non-success statuses into errors.
async fn send(request: RequestBuilder) -> Result<Response> {
    let resp = request.send().await?;
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(error_from_body(status, body));
    }
    Ok(resp)
}

/// Prefer the service's own error payload; fall back to the raw body.
pub(crate) fn error_from_body(status: u16, body: String) -> OrchestrationError {
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) => err.into(),
        Err(_) => OrchestrationError::Http { status, body },
    }
}

/// Decode one stream event. An error payload mid-stream ends the stream with that error.
fn parse_chunk(data: &str) -> Result<CompletionPostResponseChunk> {
    if let Ok(err) = serde_json::from_str::<ErrorResponse>(data) {
        return Err(err.into());
    }
    serde_json::from_str(data)
        .map_err(|e| OrchestrationError::Stream(format!("Malformed chunk: {e}")))
}
