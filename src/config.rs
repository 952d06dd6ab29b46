use secrecy::SecretString;
use std::collections::HashMap;
use std::time::Duration;

/// Resource group the orchestration deployment lives in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceGroupConfig {
    /// `None` lets the service use its default resource group.
    pub resource_group: Option<String>,
}

impl ResourceGroupConfig {
    pub fn new(resource_group: impl Into<String>) -> Self {
        Self {
            resource_group: Some(resource_group.into()),
        }
    }
}

/// Per-call transport settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomRequestConfig {
    /// Extra HTTP headers sent with this call only.
    pub headers: HashMap<String, String>,

    /// Overrides the transport's default timeout for this call.
    pub timeout: Option<Duration>,
}

impl CustomRequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Connection settings for the bundled HTTP transport and deployment resolver.
///
/// Use [`ClientConfig::builder()`] to construct one.
#[derive(Debug)]
pub struct ClientConfig {
    /// Base URL of the AI API, without the `/v2` suffix.
    pub api_url: String,

    /// Bearer token sent on every call. Obtaining it is up to the caller.
    pub auth_token: Option<SecretString>,

    /// Default timeout for non-streaming calls.
    pub timeout: Duration,

    pub resource_group: Option<String>,
}

impl ClientConfig {
    /// Start building a config for the given API base URL.
    pub fn builder(api_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: ClientConfig {
                api_url: api_url.into().trim_end_matches('/').to_string(),
                auth_token: None,
                timeout: Duration::from_secs(60),
                resource_group: None,
            },
        }
    }
}

/// Builder for [`ClientConfig`].
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        let token: String = token.into();
        self.config.auth_token = Some(SecretString::from(token));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_resource_group(mut self, resource_group: impl Into<String>) -> Self {
        self.config.resource_group = Some(resource_group.into());
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
