use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No running deployment found for scenario '{scenario_id}' in resource group '{resource_group}'")]
    DeploymentNotFound {
        scenario_id: String,
        resource_group: String,
    },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Orchestration service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Error payload reported by the orchestration service itself.
    #[error("Orchestration service error {code} at {location}: {message}")]
    Service {
        code: u16,
        message: String,
        location: String,
    },

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Content generated by the LLM was filtered by the output filter. Please try again with a different prompt or filter configuration.")]
    ContentFiltered,

    #[error("Token usage is not available on this response")]
    MissingUsage,

    #[error("Stream failed: {0}")]
    Stream(String),

    #[error("Stream was cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl OrchestrationError {
    /// Rebuild an equivalent error. Wrapped library errors keep only their message.
    pub(crate) fn replay(&self) -> Self {
        match self {
            Self::InvalidConfig(msg) => Self::InvalidConfig(msg.clone()),
            Self::DeploymentNotFound {
                scenario_id,
                resource_group,
            } => Self::DeploymentNotFound {
                scenario_id: scenario_id.clone(),
                resource_group: resource_group.clone(),
            },
            Self::Request(e) => Self::Stream(e.to_string()),
            Self::Http { status, body } => Self::Http {
                status: *status,
                body: body.clone(),
            },
            Self::Service {
                code,
                message,
                location,
            } => Self::Service {
                code: *code,
                message: message.clone(),
                location: location.clone(),
            },
            Self::Json(e) => Self::Stream(e.to_string()),
            Self::ContentFiltered => Self::ContentFiltered,
            Self::MissingUsage => Self::MissingUsage,
            Self::Stream(msg) => Self::Stream(msg.clone()),
            Self::Cancelled => Self::Cancelled,
            Self::Other(msg) => Self::Other(msg.clone()),
        }
    }
}

impl From<anyhow::Error> for OrchestrationError {
    fn from(err: anyhow::Error) -> Self {
        OrchestrationError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrchestrationError>;
