use std::sync::Arc;

use chrono::Utc;
use shared::protocol::PurchaseReceipt;
use thiserror::Error;
use tracing::{info, warn};
use wallet_integration::{NetworkId, WalletSession};

use crate::PurchaseService;

/// Whether the wallet is ready to submit a purchase right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletGate {
    Ready,
    NeedsConnection,
    WrongNetwork,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PurchaseError {
    #[error("wallet is not connected")]
    WalletDisconnected,
    #[error("wallet is on the wrong network (expected {expected}, active {actual:?})")]
    WrongNetwork {
        expected: NetworkId,
        actual: Option<NetworkId>,
    },
    #[error("no transaction signer available; reconnect your wallet and retry")]
    SignerUnavailable,
    #[error("cannot buy {requested} packs at once (limit {max})")]
    InvalidUnitCount { requested: u32, max: u32 },
    #[error("{0}")]
    Transaction(String),
}

impl PurchaseError {
    /// Connectivity gates are recoverable and are not shown as purchase failures.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            PurchaseError::WalletDisconnected | PurchaseError::WrongNetwork { .. }
        )
    }

    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Boundary between the reveal flow and the wallet plus mint backend. Every
/// failure leaves here as a [`PurchaseError`].
pub struct PurchaseGateway {
    wallet: Arc<dyn WalletSession>,
    service: Arc<dyn PurchaseService>,
    max_units: u32,
}

impl PurchaseGateway {
    pub fn new(
        wallet: Arc<dyn WalletSession>,
        service: Arc<dyn PurchaseService>,
        max_units: u32,
    ) -> Self {
        Self {
            wallet,
            service,
            max_units,
        }
    }

    pub fn wallet_gate(&self) -> WalletGate {
        if !self.wallet.is_connected() {
            WalletGate::NeedsConnection
        } else if !self.wallet.is_correct_network() {
            WalletGate::WrongNetwork
        } else {
            WalletGate::Ready
        }
    }

    pub async fn request_connect(&self) {
        info!("gateway: requesting wallet connection");
        if let Err(error) = self.wallet.connect().await {
            warn!(%error, "gateway: wallet connection request failed");
        }
    }

    pub async fn request_network_switch(&self) {
        let network = self.wallet.required_network();
        info!(%network, "gateway: requesting network switch");
        if let Err(error) = self.wallet.switch_network(network).await {
            warn!(%network, %error, "gateway: network switch request failed");
        }
    }

    pub async fn purchase(&self, unit_count: u32) -> Result<PurchaseReceipt, PurchaseError> {
        if unit_count == 0 || unit_count > self.max_units {
            return Err(PurchaseError::InvalidUnitCount {
                requested: unit_count,
                max: self.max_units,
            });
        }

        match self.wallet_gate() {
            WalletGate::Ready => {}
            WalletGate::NeedsConnection => {
                self.request_connect().await;
                return Err(PurchaseError::WalletDisconnected);
            }
            WalletGate::WrongNetwork => {
                self.request_network_switch().await;
                return Err(PurchaseError::WrongNetwork {
                    expected: self.wallet.required_network(),
                    actual: self.wallet.status().network,
                });
            }
        }

        let signer = match self.wallet.signer().await {
            Ok(Some(signer)) => signer,
            Ok(None) => return Err(PurchaseError::SignerUnavailable),
            Err(error) => {
                warn!(%error, "gateway: signer lookup failed");
                return Err(PurchaseError::SignerUnavailable);
            }
        };

        info!(
            unit_count,
            signer = %signer.address,
            "gateway: submitting pack purchase"
        );
        let response = if unit_count > 1 {
            self.service.buy_bundle(&signer, unit_count).await
        } else {
            self.service.buy_single(&signer).await
        };

        match response {
            Ok(response) if response.success => {
                let cards = response.cards.unwrap_or_default();
                info!(
                    unit_count,
                    cards = cards.len(),
                    "gateway: pack purchase settled"
                );
                Ok(PurchaseReceipt {
                    cards,
                    settled_at: Utc::now(),
                })
            }
            Ok(response) => {
                let reason = response
                    .error
                    .unwrap_or_else(|| "purchase was not completed".to_string());
                warn!(unit_count, %reason, "gateway: pack purchase failed");
                Err(PurchaseError::Transaction(reason))
            }
            Err(error) => {
                warn!(unit_count, %error, "gateway: pack purchase failed");
                Err(PurchaseError::Transaction(error.to_string()))
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
