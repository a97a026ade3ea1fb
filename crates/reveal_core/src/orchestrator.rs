use std::{collections::HashMap, sync::Arc};

use rand::{rngs::StdRng, RngCore, SeedableRng};
use shared::{
    domain::{CardReveal, SessionId},
    protocol::PurchaseReceipt,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::{
    config::RevealSettings,
    gateway::{PurchaseError, PurchaseGateway},
    machine::{Effect, FlowMode, PurchaseSession, RevealEvent, RevealSummary, Stage, Transition},
    scheduler::{AnimationScheduler, AnimationSequence, Completion, SequenceId, SettleKind},
    stack::{plan_stack, SlotArena, SlotBounds, SlotIndex, StackAnchor, StackStyle},
    tear::{generate_tear_path, TearPath},
    BalanceNotifier, MissingPriceOracle, NoopBalanceNotifier, PriceOracle,
};

/// Asynchronous input fed back into the orchestrator.
#[derive(Debug)]
pub(crate) enum Signal {
    PurchaseSettled {
        session: SessionId,
        outcome: Result<PurchaseReceipt, PurchaseError>,
    },
    SequenceDone {
        session: SessionId,
        id: SequenceId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RevealUpdate {
    Opened {
        session: SessionId,
        mode: FlowMode,
    },
    StageChanged {
        session: SessionId,
        from: Stage,
        to: Stage,
    },
    TearAdded {
        session: SessionId,
        path: TearPath,
    },
    CardDealt {
        session: SessionId,
        slot: SlotIndex,
        card: CardReveal,
    },
    PurchaseFailed {
        session: SessionId,
        reason: String,
    },
    Closed {
        session: SessionId,
    },
}

/// Drives one reveal flow at a time. UI input arrives through the public
/// methods; purchase results and animation completions arrive through
/// [`RevealOrchestrator::process_next`].
pub struct RevealOrchestrator {
    settings: RevealSettings,
    gateway: Arc<PurchaseGateway>,
    prices: Arc<dyn PriceOracle>,
    balance: Arc<dyn BalanceNotifier>,
    scheduler: Arc<dyn AnimationScheduler>,
    rng: Box<dyn RngCore + Send>,
    session: Option<PurchaseSession>,
    arena: SlotArena,
    anchor: Option<StackAnchor>,
    pending: HashMap<SequenceId, AnimationSequence>,
    purchases_in_flight: usize,
    next_sequence: u64,
    signals_tx: mpsc::UnboundedSender<Signal>,
    signals_rx: mpsc::UnboundedReceiver<Signal>,
    updates: broadcast::Sender<RevealUpdate>,
}

impl RevealOrchestrator {
    pub fn new(
        settings: RevealSettings,
        gateway: Arc<PurchaseGateway>,
        scheduler: Arc<dyn AnimationScheduler>,
    ) -> Self {
        Self::new_with_dependencies(
            settings,
            gateway,
            Arc::new(MissingPriceOracle),
            Arc::new(NoopBalanceNotifier),
            scheduler,
            Box::new(StdRng::from_entropy()),
        )
    }

    pub fn new_with_dependencies(
        settings: RevealSettings,
        gateway: Arc<PurchaseGateway>,
        prices: Arc<dyn PriceOracle>,
        balance: Arc<dyn BalanceNotifier>,
        scheduler: Arc<dyn AnimationScheduler>,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(256);
        Self {
            settings,
            gateway,
            prices,
            balance,
            scheduler,
            rng,
            session: None,
            arena: SlotArena::default(),
            anchor: None,
            pending: HashMap::new(),
            purchases_in_flight: 0,
            next_sequence: 0,
            signals_tx,
            signals_rx,
            updates,
        }
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<RevealUpdate> {
        self.updates.subscribe()
    }

    pub fn settings(&self) -> &RevealSettings {
        &self.settings
    }

    pub fn session(&self) -> Option<&PurchaseSession> {
        self.session.as_ref()
    }

    pub fn stage(&self) -> Option<Stage> {
        self.session.as_ref().map(PurchaseSession::stage)
    }

    pub fn summary(&self) -> Option<RevealSummary> {
        self.session.as_ref().and_then(PurchaseSession::summary)
    }

    pub fn arena(&self) -> &SlotArena {
        &self.arena
    }

    pub fn pending_sequences(&self) -> usize {
        self.pending.len()
    }

    /// Starts a fresh session, discarding any session that is still open.
    pub async fn open(&mut self, mode: FlowMode) -> SessionId {
        self.close();

        let unit_price = match self.prices.unit_price().await {
            Ok(price) => Some(price),
            Err(error) => {
                warn!(%error, "reveal: unit price unavailable");
                None
            }
        };

        let session = PurchaseSession::new(mode, unit_price);
        let id = session.id();
        info!(
            session = %id,
            ?mode,
            stage = session.stage().name(),
            "reveal: session opened"
        );
        self.session = Some(session);
        self.publish(RevealUpdate::Opened { session: id, mode });

        if mode == FlowMode::AutoPurchase {
            self.confirm();
        }
        id
    }

    pub fn set_unit_count(&mut self, unit_count: u32) {
        self.dispatch(RevealEvent::SetUnitCount(unit_count));
    }

    pub fn confirm(&mut self) {
        let gate = self.gateway.wallet_gate();
        self.dispatch(RevealEvent::Confirm(gate));
    }

    pub fn tap_pack(&mut self) {
        let Some(session) = self.session.as_ref() else {
            debug!("reveal: pack tap without an open session");
            return;
        };
        if !session.accepts_tear(&self.settings) {
            debug!(
                session = %session.id(),
                stage = session.stage().name(),
                tears = session.tear_events().len(),
                "reveal: ignoring pack tap"
            );
            return;
        }
        let ordinal = session.tear_events().len();
        let path = generate_tear_path(ordinal, &mut *self.rng);
        self.dispatch(RevealEvent::TapPack(path));
    }

    pub fn tap_reveal(&mut self) {
        self.dispatch(RevealEvent::TapReveal);
    }

    pub fn dismiss(&mut self) {
        self.dispatch(RevealEvent::Dismiss);
    }

    /// Closes the flow at any stage. Pending sequences are reverted; an
    /// in-flight purchase keeps running but its result is dropped.
    pub fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        self.scheduler.revert_all();
        self.pending.clear();
        self.arena = SlotArena::default();
        info!(
            session = %session.id(),
            stage = session.stage().name(),
            "reveal: session closed"
        );
        self.publish(RevealUpdate::Closed {
            session: session.id(),
        });
    }

    pub fn register_viewport(&mut self, width: f64, height: f64) {
        self.anchor = Some(StackAnchor::bottom_center(
            width,
            height,
            self.settings.stack_bottom_margin,
        ));
    }

    pub fn register_slot(&mut self, index: SlotIndex, bounds: SlotBounds) -> bool {
        let registered = self.arena.register(index, bounds);
        if !registered {
            debug!(
                slot = index.0,
                slots = self.arena.len(),
                "reveal: ignoring bounds for unknown slot"
            );
        }
        registered
    }

    /// Waits for the next purchase result or sequence completion and applies
    /// it. Returns the stage afterwards, `None` when no session is open.
    /// Returns without waiting when no purchase or sequence is outstanding.
    pub async fn process_next(&mut self) -> Option<Stage> {
        if self.is_idle() {
            debug!("reveal: nothing outstanding to wait for");
            return self.stage();
        }
        if let Some(signal) = self.signals_rx.recv().await {
            self.handle_signal(signal);
        }
        self.stage()
    }

    /// Applies every signal that is already queued without waiting.
    pub fn process_ready(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(signal) = self.signals_rx.try_recv() {
            self.handle_signal(signal);
            handled += 1;
        }
        handled
    }

    /// Processes signals until the session reaches `target`. Gives up when the
    /// session closes or nothing that could move it forward is outstanding.
    pub async fn wait_for_stage(&mut self, target: Stage) -> bool {
        loop {
            match self.stage() {
                Some(stage) if stage == target => return true,
                None => return false,
                Some(_) if self.is_idle() => return false,
                Some(_) => {}
            }
            self.process_next().await;
        }
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.purchases_in_flight == 0
    }

    fn is_live(&self, session: SessionId) -> bool {
        self.session
            .as_ref()
            .is_some_and(|current| current.id() == session)
    }

    fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::PurchaseSettled { session, outcome } => {
                self.purchases_in_flight = self.purchases_in_flight.saturating_sub(1);
                if !self.is_live(session) {
                    warn!(
                        session = %session,
                        succeeded = outcome.is_ok(),
                        "reveal: discarding purchase result for a closed session"
                    );
                    return;
                }
                let event = match outcome {
                    Ok(receipt) => RevealEvent::PurchaseSucceeded(receipt),
                    Err(error) => RevealEvent::PurchaseFailed(error),
                };
                self.dispatch(event);
            }
            Signal::SequenceDone { session, id } => {
                if !self.is_live(session) {
                    debug!(session = %session, id = id.0, "reveal: stale sequence completion");
                    return;
                }
                let Some(sequence) = self.pending.remove(&id) else {
                    debug!(id = id.0, "reveal: completion for unknown sequence");
                    return;
                };
                let follow_up = match sequence {
                    AnimationSequence::Flash => Some(RevealEvent::FlashFinished),
                    AnimationSequence::Settle(SettleKind::StackPrepare) => {
                        Some(RevealEvent::StackPrepareDue)
                    }
                    AnimationSequence::Settle(SettleKind::Finish) => {
                        Some(RevealEvent::SettleFinished)
                    }
                    _ => None,
                };
                if let Some(event) = follow_up {
                    self.dispatch(event);
                }
            }
        }
    }

    fn dispatch(&mut self, event: RevealEvent) {
        let Some(session) = self.session.take() else {
            debug!(event = event.name(), "reveal: no open session");
            return;
        };

        let from = session.stage();
        let tears_before = session.tear_events().len();
        let Transition { session, effects } = session.step(event, &self.settings);
        let id = session.id();
        let to = session.stage();

        if session.tear_events().len() > tears_before {
            if let Some(path) = session.tear_events().last() {
                self.publish(RevealUpdate::TearAdded {
                    session: id,
                    path: path.clone(),
                });
            }
        }

        if from != to {
            info!(
                session = %id,
                from = from.name(),
                to = to.name(),
                "reveal: stage transition"
            );
            if to == Stage::Dealing {
                self.arena = SlotArena::new(session.cards().map_or(0, <[CardReveal]>::len));
            }
            if from == Stage::Buying && to == Stage::Select {
                if let Some(reason) = session.last_error() {
                    self.publish(RevealUpdate::PurchaseFailed {
                        session: id,
                        reason: reason.to_string(),
                    });
                }
            }
            self.publish(RevealUpdate::StageChanged {
                session: id,
                from,
                to,
            });
        }

        self.session = Some(session);
        for effect in effects {
            self.apply(id, effect);
        }
    }

    fn apply(&mut self, session: SessionId, effect: Effect) {
        match effect {
            Effect::RequestConnect => {
                let gateway = Arc::clone(&self.gateway);
                tokio::spawn(async move { gateway.request_connect().await });
            }
            Effect::RequestNetworkSwitch => {
                let gateway = Arc::clone(&self.gateway);
                tokio::spawn(async move { gateway.request_network_switch().await });
            }
            Effect::SubmitPurchase { unit_count } => {
                self.purchases_in_flight += 1;
                let gateway = Arc::clone(&self.gateway);
                let signals = self.signals_tx.clone();
                tokio::spawn(async move {
                    let outcome = gateway.purchase(unit_count).await;
                    let _ = signals.send(Signal::PurchaseSettled { session, outcome });
                });
            }
            Effect::NotifyBalance => self.balance.balance_changed(),
            Effect::Run(sequence) => self.run_sequence(session, sequence),
            Effect::PrepareStack => self.prepare_stack(session),
            Effect::DealSlot(slot) => self.deal_slot(session, slot),
            Effect::Retire => self.close(),
        }
    }

    fn run_sequence(&mut self, session: SessionId, sequence: AnimationSequence) {
        let id = SequenceId(self.next_sequence);
        self.next_sequence += 1;
        let duration = sequence.nominal_duration(&self.settings);
        self.pending.insert(id, sequence.clone());
        self.scheduler.run(
            sequence,
            duration,
            Completion::new(session, id, self.signals_tx.clone()),
        );
    }

    fn prepare_stack(&mut self, session: SessionId) {
        let style = StackStyle {
            scale: self.settings.stack_scale,
            max_rotation_deg: self.settings.stack_max_rotation_deg,
        };
        let plan = self
            .anchor
            .and_then(|anchor| plan_stack(&self.arena, anchor, style, &mut *self.rng));

        if plan.is_none() {
            warn!(
                session = %session,
                slots = self.arena.len(),
                "reveal: slot layout not measured, stacking without collapse"
            );
        }
        self.arena.stack(plan.as_deref());
        if let Some(placements) = plan {
            self.run_sequence(session, AnimationSequence::CollapseToStack { placements });
        }
    }

    fn deal_slot(&mut self, session: SessionId, slot: SlotIndex) {
        if self.arena.deal(slot).is_none() {
            debug!(slot = slot.0, "reveal: dealing a slot outside the arena");
        }
        let card = self
            .session
            .as_ref()
            .and_then(PurchaseSession::cards)
            .and_then(|cards| cards.get(slot.0))
            .cloned();
        if let Some(card) = card {
            self.publish(RevealUpdate::CardDealt {
                session,
                slot,
                card,
            });
        }
        self.run_sequence(session, AnimationSequence::DealOut { slot });
    }

    fn publish(&self, update: RevealUpdate) {
        let _ = self.updates.send(update);
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
