use serde::{Deserialize, Serialize};

use super::{GigId, Price, PullId, PullState, UserId};

/// A negotiation between one buyer and one seller over one gig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pull {
    pub id: PullId,
    pub seller_id: UserId,
    pub buyer_id: UserId,
    pub gig_id: GigId,

    /// Price proposed when the pull was opened. Never changes afterwards.
    pub price_init: Price,
    /// Current negotiated price.
    pub price_update: Price,

    pub state: PullState,
}

impl Pull {
    pub const UNASSIGNED_ID: PullId = 0;

    pub fn is_assigned(&self) -> bool {
        self.id > Self::UNASSIGNED_ID
    }

    /// Seller, buyer and gig all carry positive identities.
    pub fn has_valid_parties(&self) -> bool {
        self.seller_id > 0 && self.buyer_id > 0 && self.gig_id > 0
    }
}

/// Buyer intent to open a pull on a gig.
///
/// `claimed_buyer_id` is whatever the UI believed the buyer to be. The
/// repository never uses it: the acting buyer is always re-derived from
/// the session credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPull {
    pub seller_id: UserId,
    pub gig_id: GigId,
    pub price_init: Price,
    pub price_update: Price,
    pub claimed_buyer_id: UserId,
    pub state: PullState,
}

impl NewPull {
    /// Opening offer at the gig's price, in `pending` state.
    pub fn new(seller_id: UserId, gig_id: GigId, price: Price) -> Self {
        Self {
            seller_id,
            gig_id,
            price_init: price,
            price_update: price,
            claimed_buyer_id: 0,
            state: PullState::Pending,
        }
    }

    pub fn with_price_update(mut self, price: Price) -> Self {
        self.price_update = price;
        self
    }

    pub fn with_claimed_buyer(mut self, buyer_id: UserId) -> Self {
        self.claimed_buyer_id = buyer_id;
        self
    }

    pub fn with_state(mut self, state: PullState) -> Self {
        self.state = state;
        self
    }
}
