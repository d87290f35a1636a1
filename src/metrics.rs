use anyhow::Context;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const BETS_PLACED: &str = "darkpool_bets_placed_total";
pub const COMPUTATIONS_SUBMITTED: &str = "darkpool_computations_submitted_total";
pub const COMPUTATIONS_FINALIZED: &str = "darkpool_computations_finalized_total";
pub const COMPUTATIONS_ABORTED: &str = "darkpool_computations_aborted_total";
pub const FINALIZE_TIMEOUTS: &str = "darkpool_finalize_timeouts_total";
pub const PAYOUTS_CLAIMED: &str = "darkpool_payouts_claimed_total";
pub const REFUNDS_CLAIMED: &str = "darkpool_refunds_claimed_total";
pub const PENDING_COMPUTATIONS: &str = "darkpool_pending_computations";
pub const FINALIZE_WAIT_SECONDS: &str = "darkpool_finalize_wait_seconds";

/// Install the Prometheus exporter and register all settlement metrics.
/// The returned handle's `render()` produces the scrape payload.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    // Pre-register so they appear before the first increment.
    for name in [
        BETS_PLACED,
        COMPUTATIONS_SUBMITTED,
        COMPUTATIONS_FINALIZED,
        COMPUTATIONS_ABORTED,
        FINALIZE_TIMEOUTS,
        PAYOUTS_CLAIMED,
        REFUNDS_CLAIMED,
    ] {
        counter!(name).absolute(0);
    }
    gauge!(PENDING_COMPUTATIONS).set(0.0);
    histogram!(FINALIZE_WAIT_SECONDS).record(0.0);

    Ok(handle)
}
