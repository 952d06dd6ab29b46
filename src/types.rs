use crate::{error::Result, OrchestrationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Finish reason the service reports when the output filter suppressed a choice.
pub const CONTENT_FILTER_FINISH_REASON: &str = "content_filter";

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
    /// Any role this client does not know about.
    #[serde(other)]
    Unknown,
}

/// A single role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

/// Templating module: the chat template rendered server-side with `{{?name}}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplatingModuleConfig {
    pub template: Vec<ChatMessage>,
}

impl TemplatingModuleConfig {
    pub fn new(template: Vec<ChatMessage>) -> Self {
        Self { template }
    }
}

/// LLM module: which model to invoke and its sampling parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmModuleConfig {
    pub model_name: String,

    /// Sampling parameters passed through to the model (`temperature`, `max_tokens`, ...).
    #[serde(default)]
    pub model_params: Map<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl LlmModuleConfig {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Default::default()
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.model_params.insert(key.into(), value.into());
        self
    }

    pub fn with_temperature(self, temperature: f64) -> Self {
        self.with_param("temperature", temperature)
    }

    pub fn with_max_tokens(self, max_tokens: u32) -> Self {
        self.with_param("max_tokens", max_tokens)
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }
}

/// One filter provider and its provider-specific settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(rename = "type")]
    pub filter_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl FilterConfig {
    pub fn new(filter_type: impl Into<String>, config: Value) -> Self {
        Self {
            filter_type: filter_type.into(),
            config: Some(config),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterStageConfig {
    pub filters: Vec<FilterConfig>,
}

/// Filtering module: input and/or output content filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilteringModuleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<FilterStageConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<FilterStageConfig>,
}

impl FilteringModuleConfig {
    /// True when the object would serialize without any keys.
    pub fn is_empty(&self) -> bool {
        self.input.is_none() && self.output.is_none()
    }
}

/// Masking module: anonymization/pseudonymization providers applied to the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaskingModuleConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub masking_providers: Vec<Value>,
}

impl MaskingModuleConfig {
    pub fn is_empty(&self) -> bool {
        self.masking_providers.is_empty()
    }
}

/// Grounding module: retrieval settings used to enrich the template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingModuleConfig {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub grounding_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl GroundingModuleConfig {
    pub fn is_empty(&self) -> bool {
        self.grounding_type.is_none() && self.config.is_none()
    }
}

/// Static module configuration of an orchestration client.
///
/// Set once at client construction and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrchestrationModuleConfig {
    pub templating: TemplatingModuleConfig,
    pub llm: LlmModuleConfig,
    pub filtering: Option<FilteringModuleConfig>,
    pub masking: Option<MaskingModuleConfig>,
    pub grounding: Option<GroundingModuleConfig>,
}

impl OrchestrationModuleConfig {
    pub fn new(templating: TemplatingModuleConfig, llm: LlmModuleConfig) -> Self {
        Self {
            templating,
            llm,
            ..Default::default()
        }
    }

    pub fn with_filtering(mut self, filtering: FilteringModuleConfig) -> Self {
        self.filtering = Some(filtering);
        self
    }

    pub fn with_masking(mut self, masking: MaskingModuleConfig) -> Self {
        self.masking = Some(masking);
        self
    }

    pub fn with_grounding(mut self, grounding: GroundingModuleConfig) -> Self {
        self.grounding = Some(grounding);
        self
    }

    /// Check the mandatory modules before anything is sent.
    pub fn validate(&self) -> Result<()> {
        if self.templating.template.is_empty() {
            return Err(OrchestrationError::InvalidConfig(
                "Templating module requires at least one template message".to_string(),
            ));
        }
        if self.llm.model_name.trim().is_empty() {
            return Err(OrchestrationError::InvalidConfig(
                "LLM module requires a model name".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-call prompt input.
///
/// A field that is `None` is omitted from the request; `Some` is sent even if empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prompt {
    pub input_params: Option<HashMap<String, String>>,
    pub messages_history: Option<Vec<ChatMessage>>,
}

impl Prompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template substitution value.
    pub fn with_input_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.input_params
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_input_params(mut self, params: HashMap<String, String>) -> Self {
        self.input_params = Some(params);
        self
    }

    pub fn with_messages_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.messages_history = Some(history);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionPostRequest {
    pub orchestration_config: OrchestrationConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_params: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_history: Option<Vec<ChatMessage>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    pub stream: bool,
    pub module_configurations: ModuleConfigurations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfigurations {
    pub templating_module_config: TemplatingModuleConfig,
    pub llm_module_config: LlmModuleConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtering_module_config: Option<FilteringModuleConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masking_module_config: Option<MaskingModuleConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_module_config: Option<GroundingModuleConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub completion_tokens: u32,
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}

/// Output of a pipeline stage other than the LLM call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericModuleResult {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Per-stage results, keyed by module. A stage that did not run is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templating: Option<Vec<ChatMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_masking: Option<GenericModuleResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_filtering: Option<GenericModuleResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_filtering: Option<GenericModuleResult>,
}

impl ModuleResults {
    /// Overwrite every module result present in `other`, keeping the rest.
    pub(crate) fn merge(&mut self, other: ModuleResults) {
        if other.templating.is_some() {
            self.templating = other.templating;
        }
        if other.input_masking.is_some() {
            self.input_masking = other.input_masking;
        }
        if other.input_filtering.is_some() {
            self.input_filtering = other.input_filtering;
        }
        if other.output_filtering.is_some() {
            self.output_filtering = other.output_filtering;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ChatRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One candidate completion, identified by `index` rather than array position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmChoice {
    pub index: u32,
    #[serde(default)]
    pub message: ResponseChatMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmModuleResult {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
    #[serde(default)]
    pub choices: Vec<LlmChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionPostResponse {
    #[serde(default)]
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_results: Option<ModuleResults>,
    pub orchestration_result: LlmModuleResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ChatRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmChoiceChunk {
    pub index: u32,
    #[serde(default)]
    pub delta: ChatDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmModuleResultChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
    #[serde(default)]
    pub choices: Vec<LlmChoiceChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// A partial response carrying deltas for one or more choices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionPostResponseChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_results: Option<ModuleResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestration_result: Option<LlmModuleResultChunk>,
}

impl CompletionPostResponseChunk {
    fn choice(&self, choice_index: u32) -> Option<&LlmChoiceChunk> {
        self.orchestration_result
            .as_ref()?
            .choices
            .iter()
            .find(|c| c.index == choice_index)
    }

    /// Content fragment this chunk carries for the given choice.
    pub fn delta_content(&self, choice_index: u32) -> Option<&str> {
        self.choice(choice_index)?.delta.content.as_deref()
    }

    pub fn finish_reason(&self, choice_index: u32) -> Option<&str> {
        self.choice(choice_index)?.finish_reason.as_deref()
    }

    pub fn token_usage(&self) -> Option<&TokenUsage> {
        self.orchestration_result.as_ref()?.usage.as_ref()
    }
}

/// Error payload returned by the service, either as an HTTP body or a stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub request_id: String,
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub location: String,
}

impl From<ErrorResponse> for OrchestrationError {
    fn from(err: ErrorResponse) -> Self {
        OrchestrationError::Service {
            code: err.code,
            message: err.message,
            location: err.location,
        }
    }
}
