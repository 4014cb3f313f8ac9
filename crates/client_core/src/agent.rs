use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Activity, ActivityId},
    error::ApiError,
};
use tracing::debug;
use url::Url;

use crate::{config::ClientSettings, error::AgentError};

pub type AgentResult<T> = std::result::Result<T, AgentError>;

#[async_trait]
pub trait ActivityAgent: Send + Sync {
    async fn list(&self) -> AgentResult<Vec<Activity>>;
    /// `None` when the server acknowledges without echoing the entity.
    async fn create(&self, activity: &Activity) -> AgentResult<Option<Activity>>;
    async fn update(&self, activity: &Activity) -> AgentResult<Option<Activity>>;
    async fn delete(&self, id: &ActivityId) -> AgentResult<()>;
}

pub struct HttpActivityAgent {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpActivityAgent {
    pub fn new(base_url: &str) -> AgentResult<Self> {
        Self::with_client(Client::new(), base_url, None)
    }

    pub fn from_settings(settings: &ClientSettings) -> AgentResult<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = settings.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().map_err(|source| AgentError::Transport {
            url: settings.api_base_url.clone(),
            source,
        })?;
        Self::with_client(http, &settings.api_base_url, settings.api_token.clone())
    }

    pub fn with_client(http: Client, base_url: &str, token: Option<String>) -> AgentResult<Self> {
        let mut base_url = Url::parse(base_url.trim())?;
        // Url::join replaces the last segment unless the base ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn collection_url(&self) -> AgentResult<Url> {
        Ok(self.base_url.join("activities")?)
    }

    fn item_url(&self, id: &ActivityId) -> AgentResult<Url> {
        let mut url = self.collection_url()?;
        url.path_segments_mut()
            .map_err(|_| AgentError::Other(format!("cannot append to {}", self.base_url)))?
            .push(id.as_str());
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, url: &Url, request: RequestBuilder) -> AgentResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|source| AgentError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body
        };
        Err(ApiError::new(status.as_u16(), message).into())
    }

    async fn read_optional<T: DeserializeOwned>(
        url: &Url,
        response: Response,
    ) -> AgentResult<Option<T>> {
        let bytes = response
            .bytes()
            .await
            .map_err(|source| AgentError::Transport {
                url: url.to_string(),
                source,
            })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| AgentError::Decode {
                url: url.to_string(),
                source,
            })
    }
}

#[async_trait]
impl ActivityAgent for HttpActivityAgent {
    async fn list(&self) -> AgentResult<Vec<Activity>> {
        let url = self.collection_url()?;
        debug!(%url, "agent: list activities");
        let response = self.send(&url, self.http.get(url.clone())).await?;
        Ok(Self::read_optional(&url, response).await?.unwrap_or_default())
    }

    async fn create(&self, activity: &Activity) -> AgentResult<Option<Activity>> {
        let url = self.collection_url()?;
        debug!(%url, activity_id = %activity.id, "agent: create activity");
        let response = self
            .send(&url, self.http.post(url.clone()).json(activity))
            .await?;
        Self::read_optional(&url, response).await
    }

    async fn update(&self, activity: &Activity) -> AgentResult<Option<Activity>> {
        let url = self.item_url(&activity.id)?;
        debug!(%url, activity_id = %activity.id, "agent: update activity");
        let response = self
            .send(&url, self.http.put(url.clone()).json(activity))
            .await?;
        Self::read_optional(&url, response).await
    }

    async fn delete(&self, id: &ActivityId) -> AgentResult<()> {
        let url = self.item_url(id)?;
        debug!(%url, activity_id = %id, "agent: delete activity");
        self.send(&url, self.http.delete(url.clone())).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/agent_tests.rs"]
mod tests;
