use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::Amount,
    error::{ApiError, ApiException},
    protocol::{PriceQuote, PurchaseRequest, PurchaseResponse},
};
use tracing::{debug, info};
use url::Url;
use wallet_integration::TransactionSigner;

use crate::{PriceOracle, PurchaseService};

/// Pack backend reached over HTTP. Serves the unit price and both purchase
/// entry points from the same base URL.
#[derive(Clone)]
pub struct HttpPackBackend {
    http: Client,
    base_url: Url,
}

impl HttpPackBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: &str, http: Client) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .with_context(|| format!("invalid pack backend url '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("pack backend url '{base_url}' cannot carry a path"));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("failed to build pack backend url for '{path}'"))
    }

    async fn purchase(
        &self,
        signer: &TransactionSigner,
        unit_count: u32,
    ) -> Result<PurchaseResponse> {
        let url = self.endpoint("packs/purchase")?;
        let request = PurchaseRequest {
            unit_count,
            signer: signer.address.clone(),
        };
        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .context("pack purchase request failed")?;
        let response: PurchaseResponse = decode(response).await?;
        info!(
            unit_count,
            success = response.success,
            cards = response.cards.as_ref().map_or(0, Vec::len),
            "remote: purchase settled"
        );
        Ok(response)
    }
}

/// Decodes a success body, or turns the backend's error body into an
/// [`ApiException`] so its message reaches the player unchanged.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .with_context(|| format!("malformed pack backend response ({status})"));
    }

    let body = response.text().await.unwrap_or_default();
    debug!(%status, body = %body, "remote: backend rejected request");
    match serde_json::from_str::<ApiError>(&body) {
        Ok(error) => Err(ApiException::from(error).into()),
        Err(_) => Err(anyhow!("pack backend returned {status}")),
    }
}

#[async_trait]
impl PriceOracle for HttpPackBackend {
    async fn unit_price(&self) -> Result<Amount> {
        let url = self.endpoint("packs/price")?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("pack price request failed")?;
        let quote: PriceQuote = decode(response).await?;
        debug!(
            pack_type = quote.pack_type_id.0,
            unit_price = quote.unit_price.0,
            "remote: price quote"
        );
        Ok(quote.unit_price)
    }
}

#[async_trait]
impl PurchaseService for HttpPackBackend {
    async fn buy_single(&self, signer: &TransactionSigner) -> Result<PurchaseResponse> {
        self.purchase(signer, 1).await
    }

    async fn buy_bundle(
        &self,
        signer: &TransactionSigner,
        unit_count: u32,
    ) -> Result<PurchaseResponse> {
        self.purchase(signer, unit_count).await
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
