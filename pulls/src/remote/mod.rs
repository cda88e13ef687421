pub mod client;
pub mod errors;
pub mod payload;
pub mod types;

use async_trait::async_trait;
use corelib::{PullId, Role, UserId};
use serde_json::Value;

pub use client::HttpPullGateway;
pub use errors::GatewayError;
pub use types::{CreatePullRequest, PullDto, UpdatePullRequest};

/// Bearer credential attached to every gateway call.
#[derive(Clone, PartialEq, Eq)]
pub struct Auth(String);

impl Auth {
    /// Wraps a raw token; blank tokens, with or without a `Bearer` scheme,
    /// are treated as absent.
    pub fn bearer(token: impl Into<String>) -> Option<Self> {
        let raw = token.into();
        let raw = raw.trim();
        let token = match raw.strip_prefix("Bearer") {
            Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
                rest.trim_start()
            }
            _ => raw,
        };

        if token.is_empty() {
            None
        } else {
            Some(Self(token.to_string()))
        }
    }

    pub fn token(&self) -> &str {
        &self.0
    }

    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Auth(<redacted>)")
    }
}

/// Typed binding to the backend's pull endpoints.
///
/// Implementations decode bodies structurally and nothing more; list
/// endpoints hand back the raw JSON because the backend wraps arrays
/// inconsistently (see [`payload::normalize`]).
#[async_trait]
pub trait PullGateway: Send + Sync {
    async fn create(
        &self,
        auth: &Auth,
        request: &CreatePullRequest,
    ) -> Result<PullDto, GatewayError>;

    async fn list_all(&self, auth: &Auth) -> Result<Value, GatewayError>;

    async fn get_by_id(&self, id: PullId, auth: &Auth) -> Result<PullDto, GatewayError>;

    async fn list_by_role(
        &self,
        auth: &Auth,
        role: Role,
        user_id: UserId,
    ) -> Result<Value, GatewayError>;

    async fn update(
        &self,
        id: PullId,
        auth: &Auth,
        request: &UpdatePullRequest,
    ) -> Result<PullDto, GatewayError>;

    async fn close(&self, id: PullId, auth: &Auth) -> Result<PullDto, GatewayError>;
}
