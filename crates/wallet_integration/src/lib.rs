use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkId(pub u64);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "network {}", self.0)
    }
}

/// Handle that can authorize one transaction on behalf of the connected account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSigner {
    pub address: String,
    pub network: NetworkId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletStatus {
    pub connected: bool,
    pub network: Option<NetworkId>,
}

impl WalletStatus {
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            network: None,
        }
    }

    pub fn is_on(&self, network: NetworkId) -> bool {
        self.network == Some(network)
    }
}

#[async_trait]
pub trait WalletSession: Send + Sync {
    fn status(&self) -> WalletStatus;
    /// Network every purchase must be submitted on.
    fn required_network(&self) -> NetworkId;
    async fn connect(&self) -> anyhow::Result<()>;
    async fn switch_network(&self, network: NetworkId) -> anyhow::Result<()>;
    async fn signer(&self) -> anyhow::Result<Option<TransactionSigner>>;

    fn is_connected(&self) -> bool {
        self.status().connected
    }

    fn is_correct_network(&self) -> bool {
        self.status().is_on(self.required_network())
    }
}

pub struct MissingWalletSession {
    pub network: NetworkId,
}

#[async_trait]
impl WalletSession for MissingWalletSession {
    fn status(&self) -> WalletStatus {
        WalletStatus::disconnected()
    }

    fn required_network(&self) -> NetworkId {
        self.network
    }

    async fn connect(&self) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("wallet provider is unavailable"))
    }

    async fn switch_network(&self, _network: NetworkId) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("wallet provider is unavailable"))
    }

    async fn signer(&self) -> anyhow::Result<Option<TransactionSigner>> {
        Ok(None)
    }
}
