mod simulated;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use reveal_core::{
    config::load_settings_from, load_settings, FlowMode, HttpPackBackend, PriceOracle,
    PurchaseGateway, PurchaseService, RevealOrchestrator, RevealUpdate, SlotBounds, SlotIndex,
    Stage, TimelineScheduler,
};
use shared::domain::Amount;
use simulated::{LoggingBalanceNotifier, SimulatedPackBackend, SimulatedWallet};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wallet_integration::NetworkId;

const VIEWPORT: (f64, f64) = (1280.0, 720.0);
const CONNECT_ATTEMPTS: usize = 3;

#[derive(Parser, Debug)]
struct Args {
    /// Number of packs to buy. More than one skips the tear animation.
    #[arg(long, default_value_t = 1)]
    units: u32,
    /// Buy a single pack as soon as the flow opens.
    #[arg(long)]
    auto: bool,
    /// Pack backend base url. The local simulated mint is used when absent.
    #[arg(long)]
    backend_url: Option<String>,
    /// Make the simulated mint reject purchases with this reason.
    #[arg(long)]
    reject_with: Option<String>,
    /// Start with the wallet disconnected.
    #[arg(long)]
    disconnected: bool,
    #[arg(long, default_value_t = 8453)]
    network: u64,
    #[arg(long)]
    seed: Option<u64>,
    /// Settings file, defaults to reveal.toml in the working directory.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 200)]
    tap_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .init();
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => load_settings_from(path),
        None => load_settings(),
    };
    let seed = args.seed.unwrap_or_else(rand::random);
    info!(seed, units = args.units, auto = args.auto, "cli: starting reveal");

    let (prices, service): (Arc<dyn PriceOracle>, Arc<dyn PurchaseService>) =
        match &args.backend_url {
            Some(url) => {
                let backend = Arc::new(HttpPackBackend::new(url)?);
                (
                    backend.clone() as Arc<dyn PriceOracle>,
                    backend as Arc<dyn PurchaseService>,
                )
            }
            None => {
                let backend = Arc::new(SimulatedPackBackend::new(
                    seed,
                    Amount(2_500),
                    args.reject_with.clone(),
                ));
                (
                    backend.clone() as Arc<dyn PriceOracle>,
                    backend as Arc<dyn PurchaseService>,
                )
            }
        };
    let wallet = Arc::new(SimulatedWallet::new(
        NetworkId(args.network),
        !args.disconnected,
    ));
    let gateway = Arc::new(PurchaseGateway::new(wallet, service, settings.max_units));

    let mut orchestrator = RevealOrchestrator::new_with_dependencies(
        settings.clone(),
        gateway,
        prices,
        Arc::new(LoggingBalanceNotifier),
        Arc::new(TimelineScheduler::new()),
        Box::new(StdRng::seed_from_u64(seed)),
    );
    spawn_update_printer(&orchestrator);

    let mode = if args.auto {
        FlowMode::AutoPurchase
    } else {
        FlowMode::Select
    };
    orchestrator.open(mode).await;
    if !args.auto {
        orchestrator.set_unit_count(args.units);
    }
    if orchestrator.stage() == Some(Stage::Select) {
        confirm_with_retries(&mut orchestrator).await;
    }

    while orchestrator.stage() == Some(Stage::Buying) {
        orchestrator.process_next().await;
    }

    match orchestrator.stage() {
        Some(Stage::Tearing) => {
            let tap_interval = Duration::from_millis(args.tap_interval_ms);
            for _ in 0..settings.max_taps {
                tokio::time::sleep(tap_interval).await;
                orchestrator.tap_pack();
                orchestrator.process_ready();
            }
            if !orchestrator.wait_for_stage(Stage::Dealing).await {
                return Err(anyhow!("reveal stopped before dealing"));
            }
            lay_out_slots(&mut orchestrator);
            let card_count = orchestrator.arena().len();
            for _ in 0..card_count {
                tokio::time::sleep(tap_interval).await;
                orchestrator.process_ready();
                orchestrator.tap_reveal();
            }
            if !orchestrator.wait_for_stage(Stage::Finished).await {
                return Err(anyhow!("reveal stopped before finishing"));
            }
        }
        Some(Stage::Finished) => {}
        Some(_) => {
            let reason = orchestrator
                .session()
                .and_then(|session| session.last_error())
                .unwrap_or("wallet is not ready")
                .to_string();
            orchestrator.close();
            return Err(anyhow!("purchase failed: {reason}"));
        }
        None => return Err(anyhow!("reveal flow closed unexpectedly")),
    }

    if let Some(summary) = orchestrator.summary() {
        println!("{}", serde_json::to_string_pretty(&summary.cards)?);
        for (rarity, count) in summary.by_rarity.iter().rev() {
            println!("{:>10}: {count}", rarity.label());
        }
        println!(
            "total multiplier: {:.2}x",
            summary.total_multiplier_pct as f64 / 100.0
        );
    }
    orchestrator.dismiss();
    Ok(())
}

/// `RUST_LOG` directives when they parse, `info` otherwise.
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Confirms, giving the wallet a moment to connect or switch networks when
/// the first attempt is gated.
async fn confirm_with_retries(orchestrator: &mut RevealOrchestrator) {
    for attempt in 1..=CONNECT_ATTEMPTS {
        orchestrator.confirm();
        if orchestrator.stage() != Some(Stage::Select) {
            return;
        }
        if orchestrator
            .session()
            .is_some_and(|session| session.last_error().is_some())
        {
            return;
        }
        warn!(attempt, "cli: wallet not ready, retrying");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

fn lay_out_slots(orchestrator: &mut RevealOrchestrator) {
    let (width, height) = VIEWPORT;
    orchestrator.register_viewport(width, height);
    let count = orchestrator.arena().len();
    let card_width = 160.0;
    let gap = 24.0;
    let row_width = count as f64 * card_width + count.saturating_sub(1) as f64 * gap;
    let left = (width - row_width) / 2.0;
    for index in 0..count {
        orchestrator.register_slot(
            SlotIndex(index),
            SlotBounds {
                x: left + index as f64 * (card_width + gap),
                y: 120.0,
                width: card_width,
                height: 224.0,
            },
        );
    }
}

fn spawn_update_printer(orchestrator: &RevealOrchestrator) {
    let mut updates = orchestrator.subscribe_updates();
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(RevealUpdate::TearAdded { path, .. }) => {
                    println!("tear {}: {}", path.ordinal + 1, path.to_svg_path());
                }
                Ok(RevealUpdate::CardDealt { slot, card, .. }) => {
                    println!(
                        "card {}: {} ({}, {}%)",
                        slot.0 + 1,
                        card.name,
                        card.rarity,
                        card.multiplier_pct
                    );
                }
                Ok(RevealUpdate::PurchaseFailed { reason, .. }) => {
                    println!("purchase failed: {reason}");
                }
                Ok(update) => info!(?update, "cli: reveal update"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "cli: update printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_filter_defaults_to_info_and_honors_directives() {
        assert_eq!(log_filter(None).to_string(), "info");
        assert_eq!(
            log_filter(Some("reveal_core=debug".to_string())).to_string(),
            "reveal_core=debug"
        );
    }
}
