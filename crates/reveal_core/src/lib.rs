use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{domain::Amount, protocol::PurchaseResponse};
use wallet_integration::TransactionSigner;

pub mod config;
pub mod gateway;
pub mod machine;
pub mod orchestrator;
pub mod remote;
pub mod scheduler;
pub mod stack;
pub mod tear;

pub use config::{load_settings, RevealSettings, SettingsError};
pub use gateway::{PurchaseError, PurchaseGateway, WalletGate};
pub use machine::{Effect, FlowMode, PurchaseSession, RevealEvent, RevealSummary, Stage};
pub use orchestrator::{RevealOrchestrator, RevealUpdate};
pub use remote::HttpPackBackend;
pub use scheduler::{AnimationScheduler, AnimationSequence, Completion, SequenceId, TimelineScheduler};
pub use stack::{SlotArena, SlotBounds, SlotIndex, SlotPlacement, StackAnchor};
pub use tear::{generate_tear_path, TearOrientation, TearPath, TearPoint};

/// The mint backend. Single and bundle purchases are separate entry points.
#[async_trait]
pub trait PurchaseService: Send + Sync {
    async fn buy_single(&self, signer: &TransactionSigner) -> Result<PurchaseResponse>;
    async fn buy_bundle(
        &self,
        signer: &TransactionSigner,
        unit_count: u32,
    ) -> Result<PurchaseResponse>;
}

pub struct MissingPurchaseService;

#[async_trait]
impl PurchaseService for MissingPurchaseService {
    async fn buy_single(&self, _signer: &TransactionSigner) -> Result<PurchaseResponse> {
        Err(anyhow!("pack purchase service is unavailable"))
    }

    async fn buy_bundle(
        &self,
        _signer: &TransactionSigner,
        unit_count: u32,
    ) -> Result<PurchaseResponse> {
        Err(anyhow!(
            "pack purchase service is unavailable for a bundle of {unit_count}"
        ))
    }
}

#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn unit_price(&self) -> Result<Amount>;
}

pub struct MissingPriceOracle;

#[async_trait]
impl PriceOracle for MissingPriceOracle {
    async fn unit_price(&self) -> Result<Amount> {
        Err(anyhow!("pack price oracle is unavailable"))
    }
}

/// Fire-and-forget signal so balance displays outside the reveal flow refresh.
/// Implementations must return immediately.
pub trait BalanceNotifier: Send + Sync {
    fn balance_changed(&self);
}

pub struct NoopBalanceNotifier;

impl BalanceNotifier for NoopBalanceNotifier {
    fn balance_changed(&self) {}
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
