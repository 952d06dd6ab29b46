//! # Orchestration Client
//!
//! Async client for a multi-stage LLM orchestration service: templating,
//! LLM invocation, and optional masking, filtering and grounding stages,
//! executed server-side from one request.
//!
//! ## Features
//!
//! - **Request composition** — merges the static module configuration with
//!   a per-call prompt; optional modules are sent only when configured
//! - **Typed accessors** — content, finish reason, token usage and
//!   per-module results, looked up by choice `index`
//! - **Filter detection** — output suppressed by the content filter is an
//!   explicit [`OrchestrationError::ContentFiltered`], never empty content
//! - **Streaming** — chunks are reassembled into a response with the same
//!   accessors as the non-streaming path
//! - **Cancellation** — a shared `CancellationToken` aborts the request and
//!   stops the stream, releasing the connection exactly once
//! - **Pluggable collaborators** — deployment lookup and HTTP sit behind the
//!   [`DeploymentResolver`] and [`Transport`] traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use orchestration_client::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = OrchestrationModuleConfig::new(
//!         TemplatingModuleConfig::new(vec![ChatMessage::user("Summarize: {{?text}}")]),
//!         LlmModuleConfig::new("gpt-4o").with_max_tokens(200),
//!     );
//!     let client = OrchestrationClient::from_client_config(
//!         config,
//!         &ClientConfig::builder("https://api.ai.example.com")
//!             .with_auth_token("token")
//!             .build(),
//!     );
//!
//!     let prompt = Prompt::new().with_input_param("text", "Your text here");
//!     let mut stream = client.stream(Some(&prompt), None).await?;
//!     while let Some(chunk) = stream.next().await {
//!         print!("{}", chunk?.delta_content(0).unwrap_or_default());
//!     }
//!
//!     println!("\nfinish reason: {:?}", stream.finish_reason(0));
//!     println!("tokens: {}", stream.token_usage()?.total_tokens);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod deployment;
pub mod error;
pub mod request;
pub mod response;
pub mod stream;
pub mod transport;
pub mod types;

pub use client::OrchestrationClient;
pub use config::{ClientConfig, ClientConfigBuilder, CustomRequestConfig, ResourceGroupConfig};
pub use deployment::{DeploymentQuery, DeploymentResolver, HttpDeploymentResolver, StaticDeployment};
pub use error::{OrchestrationError, Result};
pub use request::construct_completion_post_request;
pub use response::{CompletionAccess, OrchestrationResponse, RawResponse};
pub use stream::{OrchestrationStream, StreamState};
pub use transport::{ChunkStream, HttpTransport, RequestTarget, Transport, TransportResponse};
pub use types::{
    ChatMessage, ChatRole, CompletionPostRequest, CompletionPostResponse,
    CompletionPostResponseChunk, FilterConfig, FilterStageConfig, FilteringModuleConfig,
    GenericModuleResult, GroundingModuleConfig, LlmModuleConfig, MaskingModuleConfig,
    ModuleResults, OrchestrationModuleConfig, Prompt, TemplatingModuleConfig, TokenUsage,
};
