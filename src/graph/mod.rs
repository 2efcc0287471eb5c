use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::graph::model::{
    AdVideo, AdVideoPage, CreativeInfo, DataEnvelope, ErrorEnvelope, IdResponse, MeResponse,
    SuccessResponse,
};
use crate::model::{Account, AdAccount, Page, Thumbnail};

pub mod model;

pub const GRAPH_API_BASE: &str = "https://graph.facebook.com/v10.0/";

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to reach Graph API: {0}")]
    Http(#[from] reqwest::Error),
    #[error("graph api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("rate limited by Graph API: {0}")]
    RateLimited(String),
    #[error("invalid Graph API response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("graph response is missing `{0}`")]
    MissingField(&'static str),
    #[error("graph api rejected the publish request")]
    PublishRejected,
    #[error("invalid Graph API url: {0}")]
    InvalidUrl(String),
}

/// The Graph API calls the resolve and publish workflows depend on.
#[async_trait]
pub trait GraphService: Send + Sync {
    /// `GET /{id}?fields=...` returning the raw object.
    async fn get_object(
        &self,
        id: &str,
        fields: &str,
        access_token: &str,
    ) -> Result<Value, GraphError>;

    /// `POST /{ad_account}/adcreatives`; the payload carries its own token.
    async fn create_creative(
        &self,
        ad_account_id: &str,
        payload: &Value,
    ) -> Result<String, GraphError>;

    async fn creative_story_id(
        &self,
        creative_id: &str,
        access_token: &str,
    ) -> Result<String, GraphError>;

    /// `POST /{story_id}` with either `is_published` or `scheduled_publish_time`.
    async fn publish_story(&self, story_id: &str, body: &Value) -> Result<(), GraphError>;

    async fn thumbnails(
        &self,
        video_id: &str,
        access_token: &str,
    ) -> Result<Vec<Thumbnail>, GraphError>;
}

#[derive(Debug, Clone)]
pub struct GraphOptions {
    pub base_url: Url,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl GraphOptions {
    pub fn from_config(cfg: &Config) -> Result<Self, GraphError> {
        let base_url = Url::parse(&cfg.graph.base_url)
            .map_err(|err| GraphError::InvalidUrl(format!("{}: {}", cfg.graph.base_url, err)))?;
        Ok(Self {
            base_url,
            request_timeout: Duration::from_secs(cfg.graph.request_timeout_secs),
            connect_timeout: Duration::from_secs(cfg.graph.connect_timeout_secs),
        })
    }
}

#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GraphClient {
    pub fn new(options: GraphOptions) -> Result<Self, GraphError> {
        let http = Client::builder()
            .user_agent("fb-carousel/0.1")
            .timeout(options.request_timeout)
            .connect_timeout(options.connect_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: options.base_url,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, GraphError> {
        Self::new(GraphOptions::from_config(cfg)?)
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, GraphError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| GraphError::InvalidUrl(format!("{}: {}", path, err)))
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GraphError> {
        let request = request.build()?;
        // The query string carries the access token; only the path is logged.
        debug!(method = %request.method(), path = %request.url().path(), "graph request");

        let res = self.http.execute(request).await?;
        let status = res.status();
        let body = res.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            let message = error_message(&body);
            warn!(%message, "rate limited by Graph API");
            return Err(GraphError::RateLimited(message));
        }
        if !status.is_success() {
            let message = error_message(&body);
            warn!(status = status.as_u16(), %message, "graph api error");
            return Err(GraphError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, GraphError> {
        let url = self.endpoint(path)?;
        self.execute(self.http.get(url).query(params)).await
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, GraphError> {
        let url = self.endpoint(path)?;
        self.execute(self.http.post(url).json(body)).await
    }

    /// Look up the profile behind a pasted access token.
    pub async fn me(&self, access_token: &str) -> Result<Account, GraphError> {
        let me: MeResponse = self
            .get(
                "me",
                &[
                    ("fields", "id,name,picture{url,width,height}"),
                    ("access_token", access_token),
                ],
            )
            .await?;
        Ok(Account {
            id: me.id,
            name: me.name,
            picture: me.picture.map(|p| p.data.url).unwrap_or_default(),
            access_token: access_token.to_string(),
        })
    }

    pub async fn pages(&self, account_id: &str, access_token: &str) -> Result<Vec<Page>, GraphError> {
        let envelope: DataEnvelope<Page> = self
            .get(
                &format!("{}/accounts", account_id),
                &[
                    ("limit", "100"),
                    ("fields", "id,name,access_token"),
                    ("access_token", access_token),
                ],
            )
            .await?;
        Ok(envelope.data)
    }

    pub async fn ad_accounts(
        &self,
        account_id: &str,
        access_token: &str,
    ) -> Result<Vec<AdAccount>, GraphError> {
        let envelope: DataEnvelope<AdAccount> = self
            .get(
                &format!("{}/adaccounts", account_id),
                &[("fields", "id,account_id"), ("access_token", access_token)],
            )
            .await?;
        Ok(envelope.data)
    }

    /// One page of the ad account's video library, newest first.
    pub async fn ad_videos(
        &self,
        ad_account_id: &str,
        access_token: &str,
        after: Option<&str>,
        limit: u32,
    ) -> Result<AdVideoPage, GraphError> {
        let limit = limit.to_string();
        let mut params = vec![
            ("fields", "source,picture"),
            ("limit", limit.as_str()),
            ("access_token", access_token),
        ];
        if let Some(after) = after.filter(|a| !a.is_empty()) {
            params.push(("after", after));
        }
        let envelope: DataEnvelope<AdVideo> = self
            .get(&format!("{}/advideos", ad_account_id), &params)
            .await?;
        let paging = envelope.paging.unwrap_or_default();
        Ok(AdVideoPage {
            videos: envelope.data,
            after: paging.cursors.and_then(|c| c.after),
            has_more: paging.next.is_some(),
        })
    }

    /// Register a hosted video file with the ad account and return the new video id.
    pub async fn create_ad_video(
        &self,
        ad_account_id: &str,
        file_url: &str,
        access_token: &str,
    ) -> Result<String, GraphError> {
        let url = self.endpoint(&format!("{}/advideos", ad_account_id))?;
        let form = reqwest::multipart::Form::new()
            .text("file_url", file_url.to_string())
            .text("access_token", access_token.to_string());
        let created: IdResponse = self.execute(self.http.post(url).multipart(form)).await?;
        info!(video_id = %created.id, "created ad video");
        Ok(created.id)
    }
}

#[async_trait]
impl GraphService for GraphClient {
    async fn get_object(
        &self,
        id: &str,
        fields: &str,
        access_token: &str,
    ) -> Result<Value, GraphError> {
        self.get(id, &[("fields", fields), ("access_token", access_token)])
            .await
    }

    async fn create_creative(&self, ad_account_id: &str, payload: &Value) -> Result<String, GraphError> {
        let created: IdResponse = self
            .post_json(&format!("{}/adcreatives", ad_account_id), payload)
            .await?;
        info!(creative_id = %created.id, "created ad creative");
        Ok(created.id)
    }

    async fn creative_story_id(&self, creative_id: &str, access_token: &str) -> Result<String, GraphError> {
        let info: CreativeInfo = self
            .get(
                creative_id,
                &[
                    ("fields", "effective_object_story_id"),
                    ("access_token", access_token),
                ],
            )
            .await?;
        info.effective_object_story_id
            .filter(|id| !id.is_empty())
            .ok_or(GraphError::MissingField("effective_object_story_id"))
    }

    async fn publish_story(&self, story_id: &str, body: &Value) -> Result<(), GraphError> {
        let res: SuccessResponse = self.post_json(story_id, body).await?;
        match res.success {
            Some(false) => Err(GraphError::PublishRejected),
            _ => Ok(()),
        }
    }

    async fn thumbnails(&self, video_id: &str, access_token: &str) -> Result<Vec<Thumbnail>, GraphError> {
        let envelope: DataEnvelope<Thumbnail> = self
            .get(
                &format!("{}/thumbnails", video_id),
                &[("access_token", access_token)],
            )
            .await?;
        Ok(envelope.data)
    }
}

/// Prefer the Graph error envelope's message; fall back to the raw body.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.to_string(),
    }
}

/// Body of the publish call, authenticated with the page's own token.
pub fn publish_body(page_access_token: &str, scheduled_unix: Option<i64>) -> Value {
    match scheduled_unix {
        Some(at) => json!({
            "access_token": page_access_token,
            "scheduled_publish_time": at,
        }),
        None => json!({
            "access_token": page_access_token,
            "is_published": true,
        }),
    }
}
