use std::sync::Arc;

use tokio::sync::mpsc;

use darkpool::config::AppConfig;
use darkpool::ledger::{InMemoryLedger, ManualClock};
use darkpool::models::{Address, JobFinalized, JobSubmitted};
use darkpool::network::SimulatedCluster;
use darkpool::pda::MarketAccounts;
use darkpool::services::{JobReconciler, MarketParams, SettlementOrchestrator};
use darkpool::{orchestrator, program_config, LocalNetwork};

pub const GENESIS_TS: i64 = 1_750_000_000;
pub const STARTING_LAMPORTS: u64 = 1_000_000_000;

/// Fast timings; no artificial cluster latency.
pub fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "FINALIZE_TIMEOUT_SECS" => Some("5".into()),
        "FINALIZE_POLL_INTERVAL_MS" => Some("10".into()),
        "SIMULATED_COMPUTE_LATENCY_MS" => Some("0".into()),
        "JOB_CHANNEL_CAPACITY" => Some("16".into()),
        _ => None,
    })
    .expect("test config")
}

/// Ledger, simulated cluster and reconciler running as tasks.
#[allow(dead_code)]
pub struct Harness {
    pub clock: ManualClock,
    pub ledger: InMemoryLedger,
    pub cluster: SimulatedCluster,
    pub darkpool: SettlementOrchestrator,
    pub authority: Address,
}

#[allow(dead_code)]
pub async fn start() -> Harness {
    let clock = ManualClock::new(GENESIS_TS);
    let network = LocalNetwork::start(&test_config(), Arc::new(clock.clone()))
        .expect("local network should start");
    let authority = funded_wallet(&network.ledger).await;
    Harness {
        clock,
        ledger: network.ledger,
        cluster: network.cluster,
        darkpool: network.orchestrator,
        authority,
    }
}

/// Nothing processes jobs on its own. Tests pull submitted jobs off
/// `jobs_rx` and decide what result, if any, reaches the ledger.
#[allow(dead_code)]
pub struct ManualHarness {
    pub clock: ManualClock,
    pub ledger: InMemoryLedger,
    pub cluster: SimulatedCluster,
    pub darkpool: SettlementOrchestrator,
    pub authority: Address,
    pub jobs_rx: mpsc::Receiver<JobSubmitted>,
    pub reconciler: JobReconciler,
}

#[allow(dead_code)]
impl ManualHarness {
    pub async fn next_job(&mut self) -> JobSubmitted {
        self.jobs_rx.recv().await.expect("a submitted job")
    }

    /// Evaluate the next submitted job on the cluster without applying it.
    pub async fn evaluate_next(&mut self) -> JobFinalized {
        let job = self.next_job().await;
        self.cluster.execute(&self.ledger, &job).await
    }

    /// Evaluate the next job and apply its result.
    pub async fn finalize_next(&mut self) {
        let result = self.evaluate_next().await;
        self.reconciler
            .apply(result)
            .await
            .expect("result should apply");
    }
}

#[allow(dead_code)]
pub async fn start_manual() -> ManualHarness {
    let config = test_config();
    let clock = ManualClock::new(GENESIS_TS);
    let cluster = SimulatedCluster::new(config.simulated_compute_latency);
    let ledger = InMemoryLedger::new(program_config(&config, &cluster), Arc::new(clock.clone()));
    let (jobs_tx, jobs_rx) = mpsc::channel(config.job_channel_capacity);
    let darkpool = orchestrator(&config, &ledger, &cluster, jobs_tx).expect("orchestrator");
    let authority = funded_wallet(&ledger).await;
    ManualHarness {
        clock,
        reconciler: JobReconciler::new(ledger.clone()),
        ledger,
        cluster,
        darkpool,
        authority,
        jobs_rx,
    }
}

#[allow(dead_code)]
pub async fn funded_wallet(ledger: &InMemoryLedger) -> Address {
    let wallet = Address::new_unique();
    ledger
        .airdrop(&wallet, STARTING_LAMPORTS)
        .await
        .expect("airdrop");
    wallet
}

/// Window `[now+5, now+3600)`, resolution at `now+7200`, settled in the
/// native coin.
#[allow(dead_code)]
pub fn market_params(market_id: u64, now: i64) -> MarketParams {
    MarketParams {
        market_id,
        question: "Will X happen?".into(),
        betting_start_ts: now + 5,
        betting_end_ts: now + 3_600,
        resolution_end_ts: now + 7_200,
        token_mint: darkpool::models::NATIVE_MINT,
    }
}

/// Create and open a market, then move the clock into its betting window.
#[allow(dead_code)]
pub async fn open_market(
    darkpool: &SettlementOrchestrator,
    ledger: &InMemoryLedger,
    clock: &ManualClock,
    authority: Address,
    market_id: u64,
) -> MarketAccounts {
    let accounts = darkpool
        .create_market(authority, market_params(market_id, ledger.now()))
        .await
        .expect("create market");
    darkpool
        .open_market(authority, market_id)
        .await
        .expect("open market");
    clock.advance(5);
    accounts
}
