use crate::{
    config::ClientConfig, error::Result, transport::RESOURCE_GROUP_HEADER, OrchestrationError,
};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;

/// Scenario id under which orchestration deployments are registered.
pub const ORCHESTRATION_SCENARIO: &str = "orchestration";

/// Resource group used when none is configured.
pub const DEFAULT_RESOURCE_GROUP: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentQuery {
    pub scenario_id: String,
    pub resource_group: Option<String>,
}

impl DeploymentQuery {
    pub fn orchestration(resource_group: Option<String>) -> Self {
        Self {
            scenario_id: ORCHESTRATION_SCENARIO.to_string(),
            resource_group,
        }
    }

    pub fn resource_group_or_default(&self) -> &str {
        self.resource_group.as_deref().unwrap_or(DEFAULT_RESOURCE_GROUP)
    }
}

/// Maps a scenario and resource group to a concrete deployment id.
#[async_trait]
pub trait DeploymentResolver: Send + Sync {
    async fn resolve(&self, query: &DeploymentQuery) -> Result<String>;
}

/// Resolver that always answers with a fixed deployment id.
#[derive(Debug, Clone)]
pub struct StaticDeployment {
    id: String,
}

impl StaticDeployment {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl DeploymentResolver for StaticDeployment {
    async fn resolve(&self, _query: &DeploymentQuery) -> Result<String> {
        Ok(self.id.clone())
    }
}

#[derive(Debug, Deserialize)]
struct DeploymentList {
    #[serde(default)]
    resources: Vec<Deployment>,
}

#[derive(Debug, Deserialize)]
struct Deployment {
    id: String,
}

/// Resolver that asks the AI API for running deployments of the scenario.
///
/// Resolved ids are cached per query for the resolver's lifetime.
#[derive(Debug)]
pub struct HttpDeploymentResolver {
    http: Client,
    api_url: String,
    auth_token: Option<SecretString>,
    cache: RwLock<HashMap<DeploymentQuery, String>>,
}

impl HttpDeploymentResolver {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            auth_token: None,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let mut resolver = Self::new(&config.api_url);
        if let Some(token) = &config.auth_token {
            resolver = resolver.with_auth_token(token.expose_secret());
        }
        resolver
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        let token: String = token.into();
        self.auth_token = Some(SecretString::from(token));
        self
    }

    /// Forget all cached deployment ids.
    pub fn clear_cache(&self) {
        match self.cache.write() {
            Ok(mut cache) => cache.clear(),
            Err(e) => tracing::warn!(error = %e, "deployment cache lock poisoned"),
        }
    }

    fn cached(&self, query: &DeploymentQuery) -> Option<String> {
        self.cache.read().ok()?.get(query).cloned()
    }

    fn remember(&self, query: &DeploymentQuery, id: &str) {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(query.clone(), id.to_string());
        }
    }
}

#[async_trait]
impl DeploymentResolver for HttpDeploymentResolver {
    async fn resolve(&self, query: &DeploymentQuery) -> Result<String> {
        if let Some(id) = self.cached(query) {
            tracing::debug!(deployment_id = %id, "using cached deployment");
            return Ok(id);
        }

        let url = format!("{}/v2/lm/deployments", self.api_url);
        let mut request = self
            .http
            .get(&url)
            .query(&[
                ("scenarioId", query.scenario_id.as_str()),
                ("status", "RUNNING"),
            ])
            .header(RESOURCE_GROUP_HEADER, query.resource_group_or_default());
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(OrchestrationError::Http { status, body });
        }

        let list: DeploymentList = serde_json::from_str(&resp.text().await?)?;
        let id = list
            .resources
            .into_iter()
            .next()
            .map(|d| d.id)
            .ok_or_else(|| OrchestrationError::DeploymentNotFound {
                scenario_id: query.scenario_id.clone(),
                resource_group: query.resource_group_or_default().to_string(),
            })?;

        tracing::info!(
            scenario_id = %query.scenario_id,
            resource_group = query.resource_group_or_default(),
            deployment_id = %id,
            "resolved deployment"
        );
        self.remember(query, &id);
        Ok(id)
    }
}
