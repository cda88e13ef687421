mod price;
mod pull;
mod state;

pub use price::{Price, PriceError};
pub use pull::{NewPull, Pull};
pub use state::PullState;

use serde::{Deserialize, Serialize};

/// Identity assigned by the remote authority; `0` before assignment.
pub type PullId = i64;
pub type UserId = i64;
pub type GigId = i64;

/// Side of a negotiation a user plays.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Buyer,
    Seller,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
