use crate::{
    error::Result,
    types::{
        CompletionPostResponse, LlmChoice, ModuleResults, TokenUsage,
        CONTENT_FILTER_FINISH_REASON,
    },
    OrchestrationError,
};
use std::collections::HashMap;

/// Read-only accessors over a completion response.
///
/// Implemented by [`OrchestrationResponse`] and by the stream reassembler, so a
/// finished stream answers exactly like a non-streaming call.
pub trait CompletionAccess {
    /// The response data the accessors read from.
    fn data(&self) -> &CompletionPostResponse;

    /// Token usage of the completion.
    ///
    /// Non-streaming responses always carry usage; a stream only has it once
    /// the final chunk has arrived. Absence is reported as
    /// [`OrchestrationError::MissingUsage`].
    fn token_usage(&self) -> Result<&TokenUsage> {
        self.data()
            .orchestration_result
            .usage
            .as_ref()
            .ok_or(OrchestrationError::MissingUsage)
    }

    /// Reason the model stopped generating the given choice.
    fn finish_reason(&self, choice_index: u32) -> Option<&str> {
        self.choice(choice_index)?.finish_reason.as_deref()
    }

    /// Content of the given choice.
    ///
    /// Empty content combined with the `content_filter` finish reason is
    /// reported as [`OrchestrationError::ContentFiltered`] so callers can tell
    /// "filtered" apart from "nothing generated".
    fn content(&self, choice_index: u32) -> Result<Option<&str>> {
        let Some(choice) = self.choice(choice_index) else {
            return Ok(None);
        };
        let content = choice.message.content.as_deref();
        if content == Some("")
            && choice.finish_reason.as_deref() == Some(CONTENT_FILTER_FINISH_REASON)
        {
            return Err(OrchestrationError::ContentFiltered);
        }
        Ok(content)
    }

    fn module_results(&self) -> Option<&ModuleResults> {
        self.data().module_results.as_ref()
    }

    fn choices(&self) -> &[LlmChoice] {
        &self.data().orchestration_result.choices
    }

    /// Choice whose `index` field equals `choice_index`, regardless of its position.
    fn choice(&self, choice_index: u32) -> Option<&LlmChoice> {
        self.choices().iter().find(|c| c.index == choice_index)
    }
}

/// HTTP status and headers of the call that produced a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Header names are lowercase. Values that are not valid UTF-8 are dropped.
    pub headers: HashMap<String, String>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// A completed, non-streaming orchestration response.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestrationResponse {
    data: CompletionPostResponse,
    raw: Option<RawResponse>,
}

impl OrchestrationResponse {
    pub fn new(data: CompletionPostResponse) -> Self {
        Self { data, raw: None }
    }

    pub fn with_raw_response(mut self, raw: RawResponse) -> Self {
        self.raw = Some(raw);
        self
    }

    /// HTTP details of the call. Absent for responses reassembled from a stream.
    pub fn raw_response(&self) -> Option<&RawResponse> {
        self.raw.as_ref()
    }

    pub fn request_id(&self) -> &str {
        &self.data.request_id
    }

    pub fn into_data(self) -> CompletionPostResponse {
        self.data
    }
}

impl CompletionAccess for OrchestrationResponse {
    fn data(&self) -> &CompletionPostResponse {
        &self.data
    }
}

impl From<CompletionPostResponse> for OrchestrationResponse {
    fn from(data: CompletionPostResponse) -> Self {
        Self::new(data)
    }
}
