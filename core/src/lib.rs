//! Domain model of gig negotiations ("pulls"): the pull record, its
//! lifecycle state and the money type used for negotiated prices.

pub mod models;

pub use models::{GigId, NewPull, Price, PriceError, Pull, PullId, PullState, Role, UserId};
