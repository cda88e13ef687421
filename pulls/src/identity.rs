//! Identity extraction from the session bearer credential.
//!
//! The client does not hold the signing key, so this only *reads* the
//! subject claim of a `header.payload.signature` token; it does not verify
//! it. Every failure is reported as such: there is no fallback id.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use corelib::UserId;
use serde_json::Value;
use thiserror::Error;

/// Claim under which the backend places the numeric user id.
pub const SUBJECT_CLAIM: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/sid";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("credential must have 3 segments, found {0}")]
    SegmentCount(usize),

    #[error("credential payload is not base64url: {0}")]
    Base64(String),

    #[error("credential payload is not JSON: {0}")]
    Json(String),

    #[error("credential payload is not a JSON object")]
    NotAnObject,

    #[error("credential has no subject claim")]
    MissingClaim,

    #[error("subject claim {0} is not a positive integer")]
    InvalidClaim(String),
}

/// Derives the acting user's id from a bearer credential.
///
/// Accepts the raw token or an `Authorization` value (`Bearer <token>`).
pub fn extract_user_id(credential: &str) -> Result<UserId, IdentityError> {
    let token = credential.trim();
    let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(IdentityError::SegmentCount(segments.len()));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|e| IdentityError::Base64(e.to_string()))?;

    let doc: Value =
        serde_json::from_slice(&payload).map_err(|e| IdentityError::Json(e.to_string()))?;
    let claims = doc.as_object().ok_or(IdentityError::NotAnObject)?;

    let claim = claims.get(SUBJECT_CLAIM).ok_or(IdentityError::MissingClaim)?;
    parse_subject(claim)
}

fn parse_subject(claim: &Value) -> Result<UserId, IdentityError> {
    let id = match claim {
        Value::String(s) => s.trim().parse::<UserId>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    };

    match id {
        Some(id) if id > 0 => Ok(id),
        _ => Err(IdentityError::InvalidClaim(claim.to_string())),
    }
}
