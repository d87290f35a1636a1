use std::sync::Arc;

use anyhow::Context;

use darkpool::config::{AppConfig, LogFormat};
use darkpool::ledger::ManualClock;
use darkpool::metrics::init_metrics;
use darkpool::models::amount::{from_base_units, to_base_units};
use darkpool::models::{Address, Outcome, NATIVE_DECIMALS, NATIVE_MINT};
use darkpool::services::MarketParams;
use darkpool::LocalNetwork;

const DEMO_MARKET_ID: u64 = 1;
const NON_NATIVE_DECIMALS: u8 = 6;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);
    let metrics_handle = init_metrics()?;

    // Demo time only moves when the round advances it.
    let clock = ManualClock::starting_now();
    let network = LocalNetwork::start(&config, Arc::new(clock.clone()))?;
    let ledger = &network.ledger;
    let darkpool = &network.orchestrator;

    // --- Participants and funding ---
    let authority = Address::new_unique();
    let alice = Address::new_unique();
    let bob = Address::new_unique();
    let mint = config.settlement_mint;

    let decimals = if mint == NATIVE_MINT {
        NATIVE_DECIMALS
    } else {
        ledger.create_mint(mint, NON_NATIVE_DECIMALS).await?;
        NON_NATIVE_DECIMALS
    };
    let stake = to_base_units(config.demo_bet_amount, decimals)?;
    let funding = stake.checked_mul(10).context("demo stake too large")?;
    for wallet in [authority, alice, bob] {
        ledger.airdrop(&wallet, funding).await?;
        if mint != NATIVE_MINT {
            ledger.mint_to(&mint, wallet, funding).await?;
        }
    }
    tracing::info!(mint = %mint, stake, "Participants funded");

    // --- Market ---
    let now = ledger.now();
    let accounts = darkpool
        .create_market(
            authority,
            MarketParams {
                market_id: DEMO_MARKET_ID,
                question: "Will the demo round settle?".into(),
                betting_start_ts: now + 10,
                betting_end_ts: now + 3_600,
                resolution_end_ts: now + 7_200,
                token_mint: mint,
            },
        )
        .await?;
    darkpool.open_market(authority, DEMO_MARKET_ID).await?;
    clock.advance(10);

    // --- Wagers ---
    let alice_bet = darkpool
        .place_bet_decimal(alice, DEMO_MARKET_ID, Outcome::Yes, config.demo_bet_amount)
        .await?;
    darkpool.await_job(&alice_bet.ticket, None).await?;

    // Admission control holds the second bet until the first is applied.
    let bob_bet = darkpool
        .place_bet_decimal(bob, DEMO_MARKET_ID, Outcome::No, config.demo_bet_amount)
        .await?;
    darkpool.await_job(&bob_bet.ticket, None).await?;

    let pool = darkpool.pool_state(DEMO_MARKET_ID).await?;
    let escrowed = darkpool.vault_balance(DEMO_MARKET_ID).await?;
    tracing::info!(
        vault = %accounts.vault,
        escrowed = %from_base_units(escrowed, decimals)?,
        state_version = pool.state_version,
        "Wagers processed"
    );

    // --- Resolution ---
    clock.advance(3_600);
    darkpool.close_betting(authority, DEMO_MARKET_ID).await?;
    darkpool.resolve_market(authority, DEMO_MARKET_ID, Outcome::Yes).await?;

    for owner in [alice, bob] {
        let ticket = darkpool.compute_payout(authority, DEMO_MARKET_ID, owner).await?;
        darkpool.await_job(&ticket, None).await?;
        let position = darkpool.position(DEMO_MARKET_ID, &owner).await?;
        let payout = position.payout_amount;
        tracing::info!(
            owner = %owner.short(),
            payout = %from_base_units(payout, decimals)?,
            "Payout computed"
        );
        if payout > 0 {
            darkpool.claim_payout(owner, DEMO_MARKET_ID).await?;
        }
    }

    darkpool.settle_market(authority, DEMO_MARKET_ID).await?;
    let view = darkpool.market_view(DEMO_MARKET_ID).await?;
    tracing::info!(
        market_id = view.market_id,
        status = %view.status,
        vault_remaining = darkpool.vault_balance(DEMO_MARKET_ID).await?,
        "Round complete"
    );
    tracing::debug!(metrics = %metrics_handle.render(), "Metrics snapshot");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let registry = tracing_subscriber::registry().with(EnvFilter::from_default_env());
    match format {
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}
