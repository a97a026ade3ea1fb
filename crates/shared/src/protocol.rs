use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Amount, CardReveal, PackTypeId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    pub pack_type_id: PackTypeId,
    pub unit_price: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub unit_count: u32,
    /// Address of the signer that authorizes the payment.
    pub signer: String,
}

/// Raw outcome of a mint call. `cards` is present only when `success` is set,
/// `error` only when it is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<CardReveal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PurchaseResponse {
    pub fn succeeded(cards: Vec<CardReveal>) -> Self {
        Self {
            success: true,
            cards: Some(cards),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            cards: None,
            error: Some(error.into()),
        }
    }
}

/// A settled purchase, as handed from the gateway to the reveal flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub cards: Vec<CardReveal>,
    pub settled_at: DateTime<Utc>,
}
