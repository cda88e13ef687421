use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle of a pull.
///
/// ```text
/// pending ──► in_process ──► payed ──► complete
///    │             │                      ▲
///    └─────────────┴──────────────────────┘
/// ```
///
/// Status strings the client does not recognise are kept verbatim in
/// [`PullState::Unknown`] instead of being folded into `Pending`, so a new
/// server-side status never masquerades as an open negotiation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PullState {
    #[default]
    Pending,
    InProcess,
    Payed,
    Complete,
    Unknown(String),
}

impl PullState {
    pub const PENDING: &'static str = "pending";
    pub const IN_PROCESS: &'static str = "in_process";
    pub const PAYED: &'static str = "payed";
    pub const COMPLETE: &'static str = "complete";

    /// Case-insensitive decode of the wire token.
    pub fn decode(text: &str) -> Self {
        let token = text.trim();
        if token.eq_ignore_ascii_case(Self::PENDING) {
            PullState::Pending
        } else if token.eq_ignore_ascii_case(Self::IN_PROCESS) {
            PullState::InProcess
        } else if token.eq_ignore_ascii_case(Self::PAYED) {
            PullState::Payed
        } else if token.eq_ignore_ascii_case(Self::COMPLETE) {
            PullState::Complete
        } else {
            PullState::Unknown(text.to_string())
        }
    }

    /// Canonical wire token; `Unknown` echoes the raw value it was decoded from.
    pub fn encode(&self) -> &str {
        match self {
            PullState::Pending => Self::PENDING,
            PullState::InProcess => Self::IN_PROCESS,
            PullState::Payed => Self::PAYED,
            PullState::Complete => Self::COMPLETE,
            PullState::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, PullState::Unknown(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PullState::Complete)
    }
}

impl fmt::Display for PullState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encode())
    }
}

impl FromStr for PullState {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PullState::decode(s))
    }
}

impl From<String> for PullState {
    fn from(value: String) -> Self {
        PullState::decode(&value)
    }
}

impl From<PullState> for String {
    fn from(value: PullState) -> Self {
        match value {
            PullState::Unknown(raw) => raw,
            known => known.encode().to_string(),
        }
    }
}
