use corelib::{GigId, PullId};
use thiserror::Error;

use crate::identity::IdentityError;
use crate::remote::GatewayError;

pub type PullResult<T> = Result<T, PullError>;

pub const SIGN_IN_REQUIRED: &str = "You must sign in.";

/// Failure of a repository operation. `Display` is the user-facing text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PullError {
    /// Bad input caught locally; nothing was sent.
    #[error("{0}")]
    Validation(String),

    /// No credential, or the backend rejected it.
    #[error("{0}")]
    Unauthenticated(String),

    /// The session credential does not yield a usable user id.
    #[error("Could not identify your user ({0}). Please sign out and sign in again.")]
    Identity(String),

    /// An earlier pull already ties this buyer to the gig.
    #[error("{}", conflict_message(.pull_id, .gig_id, .existing_gig_ids))]
    Conflict {
        pull_id: Option<PullId>,
        gig_id: GigId,
        existing_gig_ids: Vec<GigId>,
    },

    /// The pull route itself answered 404: client and backend disagree on the URL.
    #[error("Endpoint not found (404). Check the pull route: {0}")]
    EndpointNotFound(String),

    #[error("Error {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Unexpected response from server: {0}")]
    Decode(String),
}

/// Coarse classification for UI branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Conflict,
    NotFound,
    Remote,
    Transport,
}

impl PullError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PullError::Validation(_) => ErrorKind::Validation,
            PullError::Unauthenticated(_) | PullError::Identity(_) => ErrorKind::Authentication,
            PullError::Conflict { .. } => ErrorKind::Conflict,
            PullError::EndpointNotFound(_) => ErrorKind::NotFound,
            PullError::Remote { .. } => ErrorKind::Remote,
            PullError::Transport(_) | PullError::Decode(_) => ErrorKind::Transport,
        }
    }

    /// The UI should send the user back to the login screen.
    pub fn requires_sign_in(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        PullError::Validation(msg.into())
    }

    pub fn sign_in_required() -> Self {
        PullError::Unauthenticated(SIGN_IN_REQUIRED.to_string())
    }
}

impl From<IdentityError> for PullError {
    fn from(e: IdentityError) -> Self {
        PullError::Identity(e.to_string())
    }
}

impl From<GatewayError> for PullError {
    /// Generic mapping shared by every operation; `create_pull` refines
    /// 400/404/409 before falling back to it.
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Status { status: 401, .. } => PullError::Unauthenticated(
                "Not authorized (401). Your session may have expired; sign in again.".to_string(),
            ),
            GatewayError::Status { status, body } => PullError::Remote {
                status,
                body: if body.trim().is_empty() {
                    "no details".to_string()
                } else {
                    body
                },
            },
            GatewayError::Timeout => PullError::Transport("the request timed out".to_string()),
            GatewayError::Http(msg) => PullError::Transport(msg),
            GatewayError::Decode(msg) => PullError::Decode(msg),
        }
    }
}

fn conflict_message(pull_id: &Option<PullId>, gig_id: &GigId, existing: &[GigId]) -> String {
    let mut msg = match pull_id {
        Some(id) => format!("You already opened a pull for this gig (Pull #{id}, GigId: {gig_id})."),
        None => format!("A pull for this gig already exists (GigId: {gig_id})."),
    };

    if !existing.is_empty() {
        let ids: Vec<String> = existing.iter().map(ToString::to_string).collect();
        msg.push_str(&format!(" Existing pulls (GigIds): [{}].", ids.join(", ")));
    }

    msg.push_str(" You can still open pulls for other gigs.");
    msg
}
