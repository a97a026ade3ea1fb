//! The reveal state machine.
//!
//! ```text
//! Idle ──(auto, once)──┐
//!                      ▼
//! Select ──► Buying ──► Tearing ──► Exploding ──► Dealing ──► Finished
//!    ▲          │                                              ▲
//!    └─failure──┤                                              │
//!               └──────────── bundle success ──────────────────┘
//! ```
//!
//! [`PurchaseSession::step`] is pure: it returns the next session together with
//! the effects the orchestrator has to carry out. Events that are not valid for
//! the current stage are ignored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use shared::{
    domain::{sort_rarest_first, Amount, CardReveal, Rarity, SessionId},
    protocol::PurchaseReceipt,
};
use tracing::debug;

use crate::{
    config::RevealSettings,
    gateway::{PurchaseError, WalletGate},
    scheduler::{AnimationSequence, SettleKind},
    stack::SlotIndex,
    tear::TearPath,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    Select,
    Buying,
    Tearing,
    Exploding,
    Dealing,
    Finished,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Select => "select",
            Stage::Buying => "buying",
            Stage::Tearing => "tearing",
            Stage::Exploding => "exploding",
            Stage::Dealing => "dealing",
            Stage::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowMode {
    /// The user picks a unit count and confirms.
    #[default]
    Select,
    /// The purchase fires once as soon as the flow opens.
    AutoPurchase,
}

#[derive(Debug, Clone)]
pub enum RevealEvent {
    SetUnitCount(u32),
    Confirm(WalletGate),
    PurchaseSucceeded(PurchaseReceipt),
    PurchaseFailed(PurchaseError),
    TapPack(TearPath),
    FlashFinished,
    StackPrepareDue,
    TapReveal,
    SettleFinished,
    Dismiss,
}

impl RevealEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RevealEvent::SetUnitCount(_) => "set_unit_count",
            RevealEvent::Confirm(_) => "confirm",
            RevealEvent::PurchaseSucceeded(_) => "purchase_succeeded",
            RevealEvent::PurchaseFailed(_) => "purchase_failed",
            RevealEvent::TapPack(_) => "tap_pack",
            RevealEvent::FlashFinished => "flash_finished",
            RevealEvent::StackPrepareDue => "stack_prepare_due",
            RevealEvent::TapReveal => "tap_reveal",
            RevealEvent::SettleFinished => "settle_finished",
            RevealEvent::Dismiss => "dismiss",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RequestConnect,
    RequestNetworkSwitch,
    SubmitPurchase { unit_count: u32 },
    NotifyBalance,
    Run(AnimationSequence),
    /// Measure the slot arena and collapse it into the face-down stack.
    PrepareStack,
    DealSlot(SlotIndex),
    /// The session is done and must be discarded.
    Retire,
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub session: PurchaseSession,
    pub effects: Vec<Effect>,
}

/// Result view shown once the flow reaches [`Stage::Finished`].
#[derive(Debug, Clone, PartialEq)]
pub struct RevealSummary {
    pub cards: Vec<CardReveal>,
    pub by_rarity: BTreeMap<Rarity, usize>,
    pub best: Option<Rarity>,
    pub total_multiplier_pct: u64,
    pub settled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseSession {
    id: SessionId,
    mode: FlowMode,
    stage: Stage,
    unit_count: u32,
    unit_price: Option<Amount>,
    tear_events: Vec<TearPath>,
    revealed_count: usize,
    /// Visible cards. Stays `None` until the explosion finishes.
    cards: Option<Vec<CardReveal>>,
    /// Purchase result held back until the explosion finishes.
    held: Option<PurchaseReceipt>,
    settled_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    auto_purchase_fired: bool,
    finish_scheduled: bool,
}

impl PurchaseSession {
    pub fn new(mode: FlowMode, unit_price: Option<Amount>) -> Self {
        Self {
            id: SessionId::new(),
            mode,
            stage: match mode {
                FlowMode::Select => Stage::Select,
                FlowMode::AutoPurchase => Stage::Idle,
            },
            unit_count: 1,
            unit_price,
            tear_events: Vec::new(),
            revealed_count: 0,
            cards: None,
            held: None,
            settled_at: None,
            last_error: None,
            auto_purchase_fired: false,
            finish_scheduled: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn mode(&self) -> FlowMode {
        self.mode
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn unit_count(&self) -> u32 {
        self.unit_count
    }

    pub fn unit_price(&self) -> Option<Amount> {
        self.unit_price
    }

    pub fn tear_events(&self) -> &[TearPath] {
        &self.tear_events
    }

    pub fn revealed_count(&self) -> usize {
        self.revealed_count
    }

    pub fn cards(&self) -> Option<&[CardReveal]> {
        self.cards.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.settled_at
    }

    pub fn accepts_tear(&self, settings: &RevealSettings) -> bool {
        self.stage == Stage::Tearing && self.tear_events.len() < settings.max_taps
    }

    fn card_count(&self) -> usize {
        self.cards.as_ref().map_or(0, Vec::len)
    }

    pub fn summary(&self) -> Option<RevealSummary> {
        if self.stage != Stage::Finished {
            return None;
        }
        let cards = self.cards.clone().unwrap_or_default();
        let mut by_rarity = BTreeMap::new();
        for card in &cards {
            *by_rarity.entry(card.rarity).or_insert(0) += 1;
        }
        Some(RevealSummary {
            best: cards.iter().map(|card| card.rarity).max(),
            total_multiplier_pct: cards.iter().map(|card| u64::from(card.multiplier_pct)).sum(),
            by_rarity,
            cards,
            settled_at: self.settled_at,
        })
    }

    pub fn step(mut self, event: RevealEvent, settings: &RevealSettings) -> Transition {
        let mut effects = Vec::new();

        match (self.stage, event) {
            (Stage::Select, RevealEvent::SetUnitCount(count)) => {
                if (1..=settings.max_units).contains(&count) {
                    self.unit_count = count;
                } else {
                    debug!(
                        session = %self.id,
                        count,
                        max = settings.max_units,
                        "reveal: ignoring out-of-range unit count"
                    );
                }
            }
            (Stage::Select, RevealEvent::Confirm(gate)) => self.confirm(gate, &mut effects),
            (Stage::Idle, RevealEvent::Confirm(gate)) if !self.auto_purchase_fired => {
                self.auto_purchase_fired = true;
                self.confirm(gate, &mut effects);
            }
            (Stage::Buying, RevealEvent::PurchaseSucceeded(receipt)) => {
                effects.push(Effect::NotifyBalance);
                if self.unit_count > 1 {
                    let PurchaseReceipt {
                        mut cards,
                        settled_at,
                    } = receipt;
                    sort_rarest_first(&mut cards);
                    self.cards = Some(cards);
                    self.settled_at = Some(settled_at);
                    self.stage = Stage::Finished;
                } else {
                    self.held = Some(receipt);
                    self.stage = Stage::Tearing;
                }
            }
            (Stage::Buying, RevealEvent::PurchaseFailed(error)) => {
                self.stage = Stage::Select;
                self.last_error = if error.is_connectivity() {
                    None
                } else {
                    Some(error.reason())
                };
            }
            (Stage::Tearing, RevealEvent::TapPack(path))
                if self.tear_events.len() < settings.max_taps =>
            {
                effects.push(Effect::Run(AnimationSequence::PackJitter { tap: path.ordinal }));
                self.tear_events.push(path);
                if self.tear_events.len() == settings.max_taps {
                    self.stage = Stage::Exploding;
                    effects.push(Effect::Run(AnimationSequence::Flash));
                }
            }
            (Stage::Exploding, RevealEvent::FlashFinished) => {
                let (cards, settled_at) = self
                    .held
                    .take()
                    .map(|receipt| (receipt.cards, Some(receipt.settled_at)))
                    .unwrap_or_default();
                self.cards = Some(cards);
                self.settled_at = settled_at;
                self.revealed_count = 0;
                self.stage = Stage::Dealing;
                effects.push(Effect::Run(AnimationSequence::Settle(
                    SettleKind::StackPrepare,
                )));
                if self.card_count() == 0 {
                    self.schedule_finish(&mut effects);
                }
            }
            (Stage::Dealing, RevealEvent::StackPrepareDue) => effects.push(Effect::PrepareStack),
            (Stage::Dealing, RevealEvent::TapReveal)
                if self.revealed_count < self.card_count() =>
            {
                effects.push(Effect::DealSlot(SlotIndex(self.revealed_count)));
                self.revealed_count += 1;
                if self.revealed_count == self.card_count() {
                    self.schedule_finish(&mut effects);
                }
            }
            (Stage::Dealing, RevealEvent::SettleFinished)
                if self.finish_scheduled && self.revealed_count == self.card_count() =>
            {
                self.stage = Stage::Finished;
            }
            (Stage::Finished, RevealEvent::Dismiss) => effects.push(Effect::Retire),
            (stage, event) => debug!(
                session = %self.id,
                stage = stage.name(),
                event = event.name(),
                "reveal: ignoring out-of-stage event"
            ),
        }

        Transition {
            session: self,
            effects,
        }
    }

    fn confirm(&mut self, gate: WalletGate, effects: &mut Vec<Effect>) {
        match gate {
            WalletGate::NeedsConnection => {
                self.stage = Stage::Select;
                effects.push(Effect::RequestConnect);
            }
            WalletGate::WrongNetwork => {
                self.stage = Stage::Select;
                effects.push(Effect::RequestNetworkSwitch);
            }
            WalletGate::Ready => {
                self.last_error = None;
                self.stage = Stage::Buying;
                effects.push(Effect::SubmitPurchase {
                    unit_count: self.unit_count,
                });
            }
        }
    }

    fn schedule_finish(&mut self, effects: &mut Vec<Effect>) {
        if !self.finish_scheduled {
            self.finish_scheduled = true;
            effects.push(Effect::Run(AnimationSequence::Settle(SettleKind::Finish)));
        }
    }
}

#[cfg(test)]
#[path = "tests/machine_tests.rs"]
mod tests;
