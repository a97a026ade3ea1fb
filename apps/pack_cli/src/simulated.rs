use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use reveal_core::{BalanceNotifier, PriceOracle, PurchaseService};
use shared::{
    domain::{Amount, CardId, CardReveal, Rarity},
    protocol::PurchaseResponse,
};
use tracing::info;
use wallet_integration::{NetworkId, TransactionSigner, WalletSession, WalletStatus};

pub const CARDS_PER_PACK: usize = 5;

/// Wallet that connects and switches networks instantly when asked.
pub struct SimulatedWallet {
    status: Mutex<WalletStatus>,
    required: NetworkId,
    address: String,
}

impl SimulatedWallet {
    pub fn new(required: NetworkId, connected: bool) -> Self {
        let status = if connected {
            WalletStatus {
                connected: true,
                network: Some(required),
            }
        } else {
            WalletStatus::disconnected()
        };
        Self {
            status: Mutex::new(status),
            required,
            address: "0x5eed000000000000000000000000000000000001".to_string(),
        }
    }

    fn update(&self, status: WalletStatus) {
        match self.status.lock() {
            Ok(mut guard) => *guard = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }
    }
}

#[async_trait]
impl WalletSession for SimulatedWallet {
    fn status(&self) -> WalletStatus {
        match self.status.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn required_network(&self) -> NetworkId {
        self.required
    }

    async fn connect(&self) -> Result<()> {
        info!(address = %self.address, "wallet: connected");
        self.update(WalletStatus {
            connected: true,
            network: Some(self.required),
        });
        Ok(())
    }

    async fn switch_network(&self, network: NetworkId) -> Result<()> {
        info!(%network, "wallet: switched network");
        self.update(WalletStatus {
            connected: true,
            network: Some(network),
        });
        Ok(())
    }

    async fn signer(&self) -> Result<Option<TransactionSigner>> {
        let status = self.status();
        Ok(status.connected.then(|| TransactionSigner {
            address: self.address.clone(),
            network: status.network.unwrap_or(self.required),
        }))
    }
}

/// Local mint that draws five cards per pack from a weighted rarity table.
pub struct SimulatedPackBackend {
    rng: Mutex<StdRng>,
    unit_price: Amount,
    reject_with: Option<String>,
}

impl SimulatedPackBackend {
    pub fn new(seed: u64, unit_price: Amount, reject_with: Option<String>) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            unit_price,
            reject_with,
        }
    }

    fn draw(&self, unit_count: u32) -> Result<Vec<CardReveal>> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| anyhow!("simulated mint state is poisoned"))?;
        let total = unit_count as usize * CARDS_PER_PACK;
        Ok((0..total)
            .map(|_| {
                let id: i64 = rng.gen_range(1..10_000);
                let rarity = roll_rarity(rng.gen_range(0..100));
                CardReveal {
                    card_id: CardId(id),
                    name: format!("{} #{id}", rarity.label()),
                    image_url: format!("https://cards.local/{id}.png"),
                    rarity,
                    multiplier_pct: multiplier_for(rarity),
                }
            })
            .collect())
    }

    fn mint(&self, unit_count: u32) -> Result<PurchaseResponse> {
        if let Some(reason) = &self.reject_with {
            return Ok(PurchaseResponse::failed(reason.clone()));
        }
        Ok(PurchaseResponse::succeeded(self.draw(unit_count)?))
    }
}

fn roll_rarity(roll: u32) -> Rarity {
    match roll {
        0..=59 => Rarity::Common,
        60..=84 => Rarity::Uncommon,
        85..=94 => Rarity::Rare,
        95..=98 => Rarity::Epic,
        _ => Rarity::Legendary,
    }
}

fn multiplier_for(rarity: Rarity) -> u32 {
    match rarity {
        Rarity::Common => 100,
        Rarity::Uncommon => 125,
        Rarity::Rare => 150,
        Rarity::Epic => 200,
        Rarity::Legendary => 300,
    }
}

#[async_trait]
impl PriceOracle for SimulatedPackBackend {
    async fn unit_price(&self) -> Result<Amount> {
        Ok(self.unit_price)
    }
}

#[async_trait]
impl PurchaseService for SimulatedPackBackend {
    async fn buy_single(&self, signer: &TransactionSigner) -> Result<PurchaseResponse> {
        info!(signer = %signer.address, "mint: single pack");
        self.mint(1)
    }

    async fn buy_bundle(
        &self,
        signer: &TransactionSigner,
        unit_count: u32,
    ) -> Result<PurchaseResponse> {
        info!(signer = %signer.address, unit_count, "mint: bundle");
        self.mint(unit_count)
    }
}

pub struct LoggingBalanceNotifier;

impl BalanceNotifier for LoggingBalanceNotifier {
    fn balance_changed(&self) {
        info!("wallet: balance changed, refresh requested");
    }
}
