pub mod config;
pub mod crypto;
pub mod errors;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod network;
pub mod pda;
pub mod program;
pub mod services;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::crypto::CryptoSession;
use crate::errors::SettlementError;
use crate::ledger::{Clock, InMemoryLedger};
use crate::models::{JobFinalized, JobSubmitted};
use crate::network::{run_simulated_cluster, SimulatedCluster};
use crate::pda::{AddressDeriver, NetworkAddresses};
use crate::program::ProgramConfig;
use crate::services::{run_reconciler, JobClient, SettlementOrchestrator, VaultCustodian};

/// A ledger, a simulated cluster and the client services, wired together
/// in one process. The cluster and reconciler tasks run until the
/// orchestrator (and every clone of its job client) is dropped.
#[derive(Clone)]
pub struct LocalNetwork {
    pub ledger: InMemoryLedger,
    pub cluster: SimulatedCluster,
    pub orchestrator: SettlementOrchestrator,
}

impl LocalNetwork {
    /// Must be called inside a Tokio runtime.
    pub fn start(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self, SettlementError> {
        let cluster = SimulatedCluster::new(config.simulated_compute_latency);
        let ledger = InMemoryLedger::new(program_config(config, &cluster), clock);

        let (jobs_tx, jobs_rx) = mpsc::channel::<JobSubmitted>(config.job_channel_capacity);
        let (results_tx, results_rx) = mpsc::channel::<JobFinalized>(config.job_channel_capacity);

        tokio::spawn(run_simulated_cluster(
            cluster.clone(),
            ledger.clone(),
            jobs_rx,
            results_tx,
        ));
        tokio::spawn(run_reconciler(ledger.clone(), results_rx));

        let orchestrator = orchestrator(config, &ledger, &cluster, jobs_tx)?;
        tracing::info!(
            program_id = %config.program_id,
            cluster_offset = config.cluster_offset,
            "Local network started"
        );
        Ok(Self {
            ledger,
            cluster,
            orchestrator,
        })
    }
}

/// Genesis configuration trusting `cluster`'s result signatures.
pub fn program_config(config: &AppConfig, cluster: &SimulatedCluster) -> ProgramConfig {
    ProgramConfig {
        deriver: AddressDeriver::new(config.program_id),
        network: NetworkAddresses::new(
            config.network_program_id,
            config.program_id,
            config.cluster_offset,
        ),
        cluster_key: cluster.verifying_key(),
    }
}

/// Client services over `ledger`, submitting jobs on `jobs_tx`.
pub fn orchestrator(
    config: &AppConfig,
    ledger: &InMemoryLedger,
    cluster: &SimulatedCluster,
    jobs_tx: mpsc::Sender<JobSubmitted>,
) -> Result<SettlementOrchestrator, SettlementError> {
    let crypto = CryptoSession::new(cluster.encryption_key())?;
    let custodian = VaultCustodian::new(ledger.clone(), ledger.config().deriver);
    let jobs = JobClient::new(ledger.clone(), jobs_tx, config.finalize_poll_interval);
    Ok(SettlementOrchestrator::new(
        ledger.clone(),
        crypto,
        custodian,
        jobs,
        config.finalize_timeout,
    ))
}
