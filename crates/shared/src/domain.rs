use std::{cmp::Reverse, fmt};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(CardId);
id_newtype!(PackTypeId);

/// Identity of one open reveal flow. Anything tagged with a session id that is
/// no longer live gets dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub const ALL: [Rarity; 5] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Integer currency amount in the smallest unit of the payment token.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(pub u64);

impl Amount {
    pub fn base_units(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One card out of a purchased bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardReveal {
    pub card_id: CardId,
    pub name: String,
    pub image_url: String,
    pub rarity: Rarity,
    /// Scoring multiplier in percent, so 150 reads as 1.5x.
    pub multiplier_pct: u32,
}

/// Stable sort, rarest first. Cards of equal rarity keep the order the
/// purchase returned them in.
pub fn sort_rarest_first(cards: &mut [CardReveal]) {
    cards.sort_by_key(|card| Reverse(card.rarity));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: i64, rarity: Rarity) -> CardReveal {
        CardReveal {
            card_id: CardId(id),
            name: format!("card-{id}"),
            image_url: format!("https://cdn.example/cards/{id}.png"),
            rarity,
            multiplier_pct: 100,
        }
    }

    #[test]
    fn rarest_first_is_stable_within_a_tier() {
        let mut cards = vec![
            card(1, Rarity::Common),
            card(2, Rarity::Legendary),
            card(3, Rarity::Common),
            card(4, Rarity::Rare),
            card(5, Rarity::Legendary),
        ];
        sort_rarest_first(&mut cards);

        let ids: Vec<i64> = cards.iter().map(|c| c.card_id.0).collect();
        assert_eq!(ids, vec![2, 5, 4, 1, 3]);
    }

    #[test]
    fn rarity_serializes_as_snake_case() {
        let raw = serde_json::to_string(&Rarity::Legendary).expect("serialize");
        assert_eq!(raw, "\"legendary\"");
        assert!(Rarity::Epic > Rarity::Rare);
    }

    #[test]
    fn amount_is_a_bare_number_on_the_wire() {
        let raw = serde_json::to_string(&Amount(2_500_000)).expect("serialize");
        assert_eq!(raw, "2500000");
    }
}
