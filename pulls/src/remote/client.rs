use std::time::Duration;

use async_trait::async_trait;
use corelib::{PullId, Role, UserId};
use reqwest::{Client, RequestBuilder, Response, header::AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::PullsConfig;
use crate::remote::errors::GatewayError;
use crate::remote::types::{CreatePullRequest, PullDto, UpdatePullRequest};
use crate::remote::{Auth, PullGateway};

/// `reqwest`-backed gateway against `{base}/{pull_path}`.
#[derive(Clone)]
pub struct HttpPullGateway {
    http: Client,
    url: String,
}

impl HttpPullGateway {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            url: url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &PullsConfig) -> Result<Self, GatewayError> {
        Self::new(cfg.pull_endpoint(), cfg.http_timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn authorized(&self, req: RequestBuilder, auth: &Auth) -> RequestBuilder {
        req.header(AUTHORIZATION, auth.header_value())
    }
}

/// Turns non-2xx answers into `GatewayError::Status`, keeping the body text.
async fn check(resp: Response) -> Result<Response, GatewayError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), body = %body, "pull endpoint returned error status");
    Err(GatewayError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, GatewayError> {
    let bytes = check(resp).await?.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl PullGateway for HttpPullGateway {
    #[instrument(
        skip(self, auth, request),
        fields(gig_id = request.gig_id, buyer_id = request.buyer_id),
        level = "debug"
    )]
    async fn create(
        &self,
        auth: &Auth,
        request: &CreatePullRequest,
    ) -> Result<PullDto, GatewayError> {
        let req = self.authorized(self.http.post(&self.url), auth).json(request);
        let dto: PullDto = decode(req.send().await?).await?;

        debug!(pull_id = dto.id, "pull created remotely");
        Ok(dto)
    }

    #[instrument(skip(self, auth), level = "debug")]
    async fn list_all(&self, auth: &Auth) -> Result<Value, GatewayError> {
        let req = self.authorized(self.http.get(&self.url), auth);
        decode(req.send().await?).await
    }

    #[instrument(skip(self, auth), level = "debug")]
    async fn get_by_id(&self, id: PullId, auth: &Auth) -> Result<PullDto, GatewayError> {
        let url = format!("{}/{}", self.url, id);
        let req = self.authorized(self.http.get(&url), auth);
        decode(req.send().await?).await
    }

    #[instrument(skip(self, auth), level = "debug")]
    async fn list_by_role(
        &self,
        auth: &Auth,
        role: Role,
        user_id: UserId,
    ) -> Result<Value, GatewayError> {
        let url = format!("{}/by-role", self.url);
        let req = self
            .authorized(self.http.get(&url), auth)
            .query(&[("role", role.as_str().to_string()), ("userId", user_id.to_string())]);
        decode(req.send().await?).await
    }

    #[instrument(skip(self, auth, request), level = "debug")]
    async fn update(
        &self,
        id: PullId,
        auth: &Auth,
        request: &UpdatePullRequest,
    ) -> Result<PullDto, GatewayError> {
        let url = format!("{}/{}", self.url, id);
        let req = self.authorized(self.http.put(&url), auth).json(request);
        decode(req.send().await?).await
    }

    #[instrument(skip(self, auth), level = "debug")]
    async fn close(&self, id: PullId, auth: &Auth) -> Result<PullDto, GatewayError> {
        let url = format!("{}/{}/close", self.url, id);
        let req = self.authorized(self.http.put(&url), auth);
        decode(req.send().await?).await
    }
}
