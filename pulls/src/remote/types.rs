use corelib::{GigId, Price, PriceError, Pull, PullId, PullState, UserId};
use serde::{Deserialize, Serialize};

/// Pull as the backend serialises it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullDto {
    pub id: PullId,
    pub seller_id: UserId,
    pub buyer_id: UserId,
    pub gig_id: GigId,
    pub price_init: f64,
    pub price_update: f64,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePullRequest {
    pub seller_id: UserId,
    pub gig_id: GigId,
    pub price_init: f64,
    pub price_update: f64,
    pub buyer_id: UserId,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePullRequest {
    pub new_price: f64,
    pub new_state: String,
}

impl UpdatePullRequest {
    pub fn new(new_price: Price, new_state: &PullState) -> Self {
        Self {
            new_price: new_price.to_major(),
            new_state: new_state.encode().to_string(),
        }
    }
}

impl TryFrom<PullDto> for Pull {
    type Error = PriceError;

    fn try_from(dto: PullDto) -> Result<Self, Self::Error> {
        Ok(Pull {
            id: dto.id,
            seller_id: dto.seller_id,
            buyer_id: dto.buyer_id,
            gig_id: dto.gig_id,
            price_init: Price::try_from_major(dto.price_init)?,
            price_update: Price::try_from_major(dto.price_update)?,
            state: PullState::decode(&dto.state),
        })
    }
}

impl From<&Pull> for PullDto {
    fn from(p: &Pull) -> Self {
        Self {
            id: p.id,
            seller_id: p.seller_id,
            buyer_id: p.buyer_id,
            gig_id: p.gig_id,
            price_init: p.price_init.to_major(),
            price_update: p.price_update.to_major(),
            state: p.state.encode().to_string(),
        }
    }
}
