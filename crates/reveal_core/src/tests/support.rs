//! Test doubles for the reveal flow's collaborators.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{Amount, CardId, CardReveal, Rarity},
    protocol::PurchaseResponse,
};
use tokio::sync::Notify;
use wallet_integration::{NetworkId, TransactionSigner, WalletSession, WalletStatus};

use crate::{
    scheduler::{AnimationScheduler, AnimationSequence, Completion},
    BalanceNotifier, PriceOracle, PurchaseService,
};

pub const TEST_NETWORK: NetworkId = NetworkId(8453);

pub fn card(id: i64, rarity: Rarity) -> CardReveal {
    CardReveal {
        card_id: CardId(id),
        name: format!("card-{id}"),
        image_url: format!("https://cdn.example/cards/{id}.png"),
        rarity,
        multiplier_pct: 100 + id as u32,
    }
}

pub fn common_cards(count: usize) -> Vec<CardReveal> {
    (0..count as i64)
        .map(|id| card(id, Rarity::Common))
        .collect()
}

/// Cards cycling through every rarity, least rare first.
pub fn mixed_cards(count: usize) -> Vec<CardReveal> {
    (0..count)
        .map(|index| card(index as i64, Rarity::ALL[index % Rarity::ALL.len()]))
        .collect()
}

pub struct ScriptedWallet {
    status: Mutex<WalletStatus>,
    signer: Mutex<Option<TransactionSigner>>,
    connect_calls: AtomicUsize,
    switch_calls: AtomicUsize,
}

impl ScriptedWallet {
    fn with(status: WalletStatus, signer: Option<TransactionSigner>) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            signer: Mutex::new(signer),
            connect_calls: AtomicUsize::new(0),
            switch_calls: AtomicUsize::new(0),
        })
    }

    fn test_signer() -> TransactionSigner {
        TransactionSigner {
            address: "0xabc0000000000000000000000000000000000001".to_string(),
            network: TEST_NETWORK,
        }
    }

    pub fn ready() -> Arc<Self> {
        Self::with(
            WalletStatus {
                connected: true,
                network: Some(TEST_NETWORK),
            },
            Some(Self::test_signer()),
        )
    }

    pub fn disconnected() -> Arc<Self> {
        Self::with(WalletStatus::disconnected(), None)
    }

    pub fn wrong_network() -> Arc<Self> {
        Self::with(
            WalletStatus {
                connected: true,
                network: Some(NetworkId(1)),
            },
            Some(Self::test_signer()),
        )
    }

    pub fn without_signer() -> Arc<Self> {
        Self::with(
            WalletStatus {
                connected: true,
                network: Some(TEST_NETWORK),
            },
            None,
        )
    }

    pub fn set_status(&self, status: WalletStatus) {
        *self.status.lock().expect("status lock") = status;
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn switch_calls(&self) -> usize {
        self.switch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletSession for ScriptedWallet {
    fn status(&self) -> WalletStatus {
        *self.status.lock().expect("status lock")
    }

    fn required_network(&self) -> NetworkId {
        TEST_NETWORK
    }

    async fn connect(&self) -> Result<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn switch_network(&self, _network: NetworkId) -> Result<()> {
        self.switch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn signer(&self) -> Result<Option<TransactionSigner>> {
        Ok(self.signer.lock().expect("signer lock").clone())
    }
}

pub struct ScriptedPurchaseService {
    responses: Mutex<VecDeque<Result<PurchaseResponse, String>>>,
    calls: Mutex<Vec<(&'static str, u32)>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedPurchaseService {
    pub fn new(responses: Vec<Result<PurchaseResponse, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn succeeding(cards: Vec<CardReveal>) -> Self {
        Self::new(vec![Ok(PurchaseResponse::succeeded(cards))])
    }

    pub fn failing(error: impl Into<String>) -> Self {
        Self::new(vec![Err(error.into())])
    }

    /// Holds every call until the gate is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<(&'static str, u32)> {
        self.calls.lock().expect("calls lock").clone()
    }

    async fn respond(&self, entry: &'static str, unit_count: u32) -> Result<PurchaseResponse> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((entry, unit_count));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.responses.lock().expect("responses lock").pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(error)) => Err(anyhow!(error)),
            None => Err(anyhow!("no scripted purchase response left")),
        }
    }
}

#[async_trait]
impl PurchaseService for ScriptedPurchaseService {
    async fn buy_single(&self, _signer: &TransactionSigner) -> Result<PurchaseResponse> {
        self.respond("single", 1).await
    }

    async fn buy_bundle(
        &self,
        _signer: &TransactionSigner,
        unit_count: u32,
    ) -> Result<PurchaseResponse> {
        self.respond("bundle", unit_count).await
    }
}

pub struct FixedPrice(pub Amount);

#[async_trait]
impl PriceOracle for FixedPrice {
    async fn unit_price(&self) -> Result<Amount> {
        Ok(self.0)
    }
}

#[derive(Default)]
pub struct CountingNotifier {
    calls: AtomicUsize,
}

impl CountingNotifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BalanceNotifier for CountingNotifier {
    fn balance_changed(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

struct StartedSequence {
    sequence: AnimationSequence,
    duration: Duration,
    completion: Option<Completion>,
}

/// Records sequences and completes them only when a test says so.
#[derive(Default)]
pub struct RecordingScheduler {
    started: Mutex<Vec<StartedSequence>>,
    reverts: AtomicUsize,
}

impl RecordingScheduler {
    pub fn names(&self) -> Vec<&'static str> {
        self.started
            .lock()
            .expect("started lock")
            .iter()
            .map(|started| started.sequence.name())
            .collect()
    }

    pub fn sequences(&self) -> Vec<AnimationSequence> {
        self.started
            .lock()
            .expect("started lock")
            .iter()
            .map(|started| started.sequence.clone())
            .collect()
    }

    pub fn duration_of(&self, name: &str) -> Option<Duration> {
        self.started
            .lock()
            .expect("started lock")
            .iter()
            .find(|started| started.sequence.name() == name)
            .map(|started| started.duration)
    }

    pub fn outstanding(&self) -> usize {
        self.started
            .lock()
            .expect("started lock")
            .iter()
            .filter(|started| started.completion.is_some())
            .count()
    }

    /// Completes the oldest outstanding sequence called `name`.
    pub fn complete(&self, name: &str) -> bool {
        let completion = self
            .started
            .lock()
            .expect("started lock")
            .iter_mut()
            .find(|started| started.sequence.name() == name && started.completion.is_some())
            .and_then(|started| started.completion.take());
        match completion {
            Some(completion) => {
                completion.complete();
                true
            }
            None => false,
        }
    }

    pub fn reverts(&self) -> usize {
        self.reverts.load(Ordering::SeqCst)
    }
}

impl AnimationScheduler for RecordingScheduler {
    fn run(&self, sequence: AnimationSequence, duration: Duration, completion: Completion) {
        self.started
            .lock()
            .expect("started lock")
            .push(StartedSequence {
                sequence,
                duration,
                completion: Some(completion),
            });
    }

    fn revert_all(&self) {
        self.reverts.fetch_add(1, Ordering::SeqCst);
        for started in self.started.lock().expect("started lock").iter_mut() {
            started.completion = None;
        }
    }
}
