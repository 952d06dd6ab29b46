use crate::{
    config::{ClientConfig, CustomRequestConfig, ResourceGroupConfig},
    deployment::{DeploymentQuery, DeploymentResolver, HttpDeploymentResolver},
    error::Result,
    request::construct_completion_post_request,
    response::OrchestrationResponse,
    stream::OrchestrationStream,
    transport::{HttpTransport, RequestTarget, Transport, TransportResponse},
    types::{OrchestrationModuleConfig, Prompt},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Client for the orchestration service.
///
/// Holds an immutable module configuration and sends one request per call,
/// either waiting for the full completion or returning a stream that
/// reassembles it chunk by chunk. Deployment lookup and HTTP are delegated to
/// a [`DeploymentResolver`] and a [`Transport`].
///
/// # Example
/// ```no_run
/// use orchestration_client::*;
///
/// # async fn example() -> orchestration_client::Result<()> {
/// let config = OrchestrationModuleConfig::new(
///     TemplatingModuleConfig::new(vec![ChatMessage::user("Translate to German: {{?text}}")]),
///     LlmModuleConfig::new("gpt-4o"),
/// );
/// let client = OrchestrationClient::from_client_config(
///     config,
///     &ClientConfig::builder("https://api.ai.example.com").with_auth_token("token").build(),
/// );
///
/// let prompt = Prompt::new().with_input_param("text", "Good morning");
/// let response = client.chat_completion(Some(&prompt), None).await?;
/// println!("{:?}", response.content(0)?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct OrchestrationClient {
    config: Arc<OrchestrationModuleConfig>,
    deployment_config: ResourceGroupConfig,
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn DeploymentResolver>,
}

impl std::fmt::Debug for OrchestrationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestrationClient")
            .field("model", &self.config.llm.model_name)
            .field("resource_group", &self.deployment_config.resource_group)
            .finish()
    }
}

impl OrchestrationClient {
    pub fn new(
        config: OrchestrationModuleConfig,
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn DeploymentResolver>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            deployment_config: ResourceGroupConfig::default(),
            transport,
            resolver,
        }
    }

    /// Build a client on the bundled HTTP transport and deployment resolver.
    pub fn from_client_config(config: OrchestrationModuleConfig, client_config: &ClientConfig) -> Self {
        let client = Self::new(
            config,
            Arc::new(HttpTransport::from_config(client_config)),
            Arc::new(HttpDeploymentResolver::from_config(client_config)),
        );
        match &client_config.resource_group {
            Some(group) => client.with_resource_group(group.clone()),
            None => client,
        }
    }

    pub fn with_resource_group(mut self, resource_group: impl Into<String>) -> Self {
        self.deployment_config = ResourceGroupConfig::new(resource_group);
        self
    }

    pub fn module_config(&self) -> &OrchestrationModuleConfig {
        &self.config
    }

    pub fn resource_group(&self) -> Option<&str> {
        self.deployment_config.resource_group.as_deref()
    }

    /// Create a completion and wait for the full response.
    pub async fn chat_completion(
        &self,
        prompt: Option<&Prompt>,
        request_config: Option<&CustomRequestConfig>,
    ) -> Result<OrchestrationResponse> {
        self.config.validate()?;
        let body = construct_completion_post_request(&self.config, prompt, false);
        let target = self.resolve_target().await?;

        let TransportResponse { data, raw } = self
            .transport
            .execute(&target, &body, request_config.unwrap_or(&CustomRequestConfig::default()))
            .await?;

        tracing::debug!(
            request_id = %data.request_id,
            status = raw.status,
            "orchestration completion received"
        );
        Ok(OrchestrationResponse::new(data).with_raw_response(raw))
    }

    /// Create a streaming completion bound to `cancel`.
    ///
    /// Cancelling the token aborts the in-flight request and stops the
    /// returned stream at its next chunk.
    pub async fn create_stream(
        &self,
        cancel: CancellationToken,
        prompt: Option<&Prompt>,
        request_config: Option<&CustomRequestConfig>,
    ) -> Result<OrchestrationStream> {
        self.config.validate()?;
        let body = construct_completion_post_request(&self.config, prompt, true);
        let target = self.resolve_target().await?;

        let chunks = self
            .transport
            .execute_stream(
                &target,
                &body,
                request_config.unwrap_or(&CustomRequestConfig::default()),
                cancel.clone(),
            )
            .await?;

        Ok(OrchestrationStream::new(chunks, cancel))
    }

    /// Like [`create_stream`](Self::create_stream) with a fresh token,
    /// reachable afterwards through [`OrchestrationStream::cancel_token`].
    pub async fn stream(
        &self,
        prompt: Option<&Prompt>,
        request_config: Option<&CustomRequestConfig>,
    ) -> Result<OrchestrationStream> {
        self.create_stream(CancellationToken::new(), prompt, request_config)
            .await
    }

    async fn resolve_target(&self) -> Result<RequestTarget> {
        let resource_group = self.deployment_config.resource_group.clone();
        let deployment_id = self
            .resolver
            .resolve(&DeploymentQuery::orchestration(resource_group.clone()))
            .await?;

        Ok(RequestTarget {
            url: format!("/inference/deployments/{deployment_id}/completion"),
            resource_group,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        deployment::StaticDeployment,
        response::{CompletionAccess, RawResponse},
        stream::StreamState,
        transport::ChunkStream,
        types::*,
        OrchestrationError,
    };
    use async_trait::async_trait;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    #[derive(Debug, Clone)]
    struct Call {
        target: RequestTarget,
        body: CompletionPostRequest,
        config: CustomRequestConfig,
    }

    /// Transport that records calls and replays canned results.
    #[derive(Default)]
    struct RecordingTransport {
        calls: Mutex<Vec<Call>>,
        fail_with_status: Option<u16>,
    }

    impl RecordingTransport {
        fn failing(status: u16) -> Self {
            Self {
                fail_with_status: Some(status),
                ..Default::default()
            }
        }

        fn record(&self, target: &RequestTarget, body: &CompletionPostRequest, config: &CustomRequestConfig) {
            self.calls.lock().unwrap().push(Call {
                target: target.clone(),
                body: body.clone(),
                config: config.clone(),
            });
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn check_failure(&self) -> Result<()> {
            match self.fail_with_status {
                Some(status) => Err(OrchestrationError::Http {
                    status,
                    body: "upstream unavailable".to_string(),
                }),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn execute(
            &self,
            target: &RequestTarget,
            body: &CompletionPostRequest,
            config: &CustomRequestConfig,
        ) -> Result<TransportResponse> {
            self.record(target, body, config);
            self.check_failure()?;
            let data: CompletionPostResponse = serde_json::from_value(serde_json::json!({
                "request_id": "req-1",
                "orchestration_result": {
                    "choices": [{"index": 0, "message": {"role": "assistant", "content": "Guten Morgen"}, "finish_reason": "stop"}],
                    "usage": {"completion_tokens": 2, "prompt_tokens": 9, "total_tokens": 11}
                }
            }))?;
            Ok(TransportResponse {
                data,
                raw: RawResponse {
                    status: 200,
                    ..Default::default()
                },
            })
        }

        async fn execute_stream(
            &self,
            target: &RequestTarget,
            body: &CompletionPostRequest,
            config: &CustomRequestConfig,
            cancel: CancellationToken,
        ) -> Result<ChunkStream> {
            self.record(target, body, config);
            self.check_failure()?;
            if cancel.is_cancelled() {
                return Err(OrchestrationError::Cancelled);
            }
            let chunks = vec![
                chunk(serde_json::json!({
                    "orchestration_result": {"choices": [{"index": 0, "delta": {"content": "Guten"}}]}
                })),
                chunk(serde_json::json!({
                    "orchestration_result": {"choices": [{"index": 0, "delta": {"content": " Morgen"}}]}
                })),
                chunk(serde_json::json!({
                    "orchestration_result": {
                        "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}],
                        "usage": {"completion_tokens": 2, "prompt_tokens": 9, "total_tokens": 11}
                    }
                })),
            ];
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    fn chunk(value: serde_json::Value) -> Result<CompletionPostResponseChunk> {
        Ok(serde_json::from_value(value)?)
    }

    struct CountingResolver {
        calls: AtomicUsize,
        seen: Mutex<Vec<DeploymentQuery>>,
        missing: bool,
    }

    impl CountingResolver {
        fn new(missing: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                missing,
            }
        }
    }

    #[async_trait]
    impl DeploymentResolver for CountingResolver {
        async fn resolve(&self, query: &DeploymentQuery) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(query.clone());
            if self.missing {
                return Err(OrchestrationError::DeploymentNotFound {
                    scenario_id: query.scenario_id.clone(),
                    resource_group: query.resource_group_or_default().to_string(),
                });
            }
            Ok("d-123".to_string())
        }
    }

    fn module_config() -> OrchestrationModuleConfig {
        OrchestrationModuleConfig::new(
            TemplatingModuleConfig::new(vec![ChatMessage::user("Translate: {{?text}}")]),
            LlmModuleConfig::new("gpt-4o"),
        )
        .with_filtering(FilteringModuleConfig::default())
    }

    fn client_with(transport: Arc<RecordingTransport>, resolver: Arc<CountingResolver>) -> OrchestrationClient {
        OrchestrationClient::new(module_config(), transport, resolver)
    }

    #[tokio::test]
    async fn test_chat_completion_composes_non_streaming_request() {
        let transport = Arc::new(RecordingTransport::default());
        let resolver = Arc::new(CountingResolver::new(false));
        let client = client_with(transport.clone(), resolver.clone()).with_resource_group("team-a");

        let prompt = Prompt::new().with_input_param("text", "Good morning");
        let response = client.chat_completion(Some(&prompt), None).await.unwrap();

        assert_eq!(response.content(0).unwrap(), Some("Guten Morgen"));
        assert_eq!(response.token_usage().unwrap().total_tokens, 11);
        assert_eq!(response.raw_response().unwrap().status, 200);

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.target.url, "/inference/deployments/d-123/completion");
        assert_eq!(call.target.resource_group.as_deref(), Some("team-a"));
        assert!(!call.body.orchestration_config.stream);
        assert!(call
            .body
            .orchestration_config
            .module_configurations
            .filtering_module_config
            .is_none());
        assert_eq!(call.body.input_params, prompt.input_params);
        assert!(call.body.messages_history.is_none());
        assert_eq!(call.config, CustomRequestConfig::default());

        let seen = resolver.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![DeploymentQuery::orchestration(Some("team-a".to_string()))]);
    }

    #[tokio::test]
    async fn test_request_config_is_passed_through() {
        let transport = Arc::new(RecordingTransport::default());
        let client = client_with(transport.clone(), Arc::new(CountingResolver::new(false)));

        let request_config = CustomRequestConfig::new().with_header("x-trace-id", "t-1");
        client.chat_completion(None, Some(&request_config)).await.unwrap();

        assert_eq!(transport.calls()[0].config, request_config);
        assert_eq!(transport.calls()[0].target.resource_group, None);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_any_call() {
        let transport = Arc::new(RecordingTransport::default());
        let resolver = Arc::new(CountingResolver::new(false));
        let mut config = module_config();
        config.llm.model_name.clear();
        let client = OrchestrationClient::new(config, transport.clone(), resolver.clone());

        let err = client.chat_completion(None, None).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidConfig(_)));
        let err = client.stream(None, None).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidConfig(_)));

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_resolution_error_propagates_unchanged() {
        let transport = Arc::new(RecordingTransport::default());
        let client = client_with(transport.clone(), Arc::new(CountingResolver::new(true)));

        match client.chat_completion(None, None).await.unwrap_err() {
            OrchestrationError::DeploymentNotFound { scenario_id, resource_group } => {
                assert_eq!(scenario_id, "orchestration");
                assert_eq!(resource_group, "default");
            }
            other => panic!("Expected DeploymentNotFound, got {other:?}"),
        }
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_propagates_unchanged() {
        let transport = Arc::new(RecordingTransport::failing(503));
        let client = client_with(transport, Arc::new(CountingResolver::new(false)));

        match client.chat_completion(None, None).await.unwrap_err() {
            OrchestrationError::Http { status, .. } => assert_eq!(status, 503),
            other => panic!("Expected Http error, got {other:?}"),
        }
        assert!(matches!(
            client.stream(None, None).await.unwrap_err(),
            OrchestrationError::Http { status: 503, .. }
        ));
    }

    #[tokio::test]
    async fn test_create_stream_composes_streaming_request() {
        let transport = Arc::new(RecordingTransport::default());
        let client = client_with(transport.clone(), Arc::new(CountingResolver::new(false)));

        let cancel = CancellationToken::new();
        let history = vec![ChatMessage::user("Hi"), ChatMessage::assistant("Hallo")];
        let prompt = Prompt::new().with_messages_history(history.clone());
        let mut stream = client
            .create_stream(cancel.clone(), Some(&prompt), None)
            .await
            .unwrap();
        stream.finish().await.unwrap();

        assert_eq!(stream.state(), StreamState::Closed);
        assert_eq!(stream.content(0).unwrap(), Some("Guten Morgen"));
        assert_eq!(stream.finish_reason(0), Some("stop"));
        assert_eq!(stream.token_usage().unwrap().total_tokens, 11);

        let call = &transport.calls()[0];
        assert!(call.body.orchestration_config.stream);
        assert_eq!(call.body.messages_history, Some(history));
        assert!(call.body.input_params.is_none());
    }

    #[tokio::test]
    async fn test_stream_shares_cancellation_handle() {
        let client = client_with(
            Arc::new(RecordingTransport::default()),
            Arc::new(CountingResolver::new(false)),
        );
        let cancel = CancellationToken::new();
        let mut stream = client.create_stream(cancel.clone(), None, None).await.unwrap();

        assert!(stream.next().await.is_some());
        cancel.cancel();
        assert!(stream.next().await.is_none());
        assert_eq!(stream.state(), StreamState::Cancelled);
        assert_eq!(stream.content(0).unwrap(), Some("Guten"));

        let mut own = client.stream(None, None).await.unwrap();
        own.cancel_token().cancel();
        assert!(own.next().await.is_none());
        assert_eq!(own.state(), StreamState::Cancelled);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_aborts_transport_call() {
        let client = client_with(
            Arc::new(RecordingTransport::default()),
            Arc::new(CountingResolver::new(false)),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            client.create_stream(cancel, None, None).await.unwrap_err(),
            OrchestrationError::Cancelled
        ));
    }

    #[test]
    fn test_from_client_config_uses_resource_group() {
        let client = OrchestrationClient::from_client_config(
            module_config(),
            &ClientConfig::builder("https://api.example.com")
                .with_resource_group("team-b")
                .build(),
        );
        assert_eq!(client.resource_group(), Some("team-b"));
        assert_eq!(client.module_config().llm.model_name, "gpt-4o");
    }

    #[test]
    fn test_static_deployment_client_debug() {
        let client = OrchestrationClient::new(
            module_config(),
            Arc::new(RecordingTransport::default()),
            Arc::new(StaticDeployment::new("d-1")),
        );
        let debug = format!("{client:?}");
        assert!(debug.contains("gpt-4o"));
    }
}
