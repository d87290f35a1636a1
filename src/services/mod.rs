pub mod job_client;
pub mod reconciler;
pub mod settlement;
pub mod vault_custodian;

pub use job_client::{JobClient, JobRequest};
pub use reconciler::{run_reconciler, JobReconciler, Reconciled};
pub use settlement::{MarketParams, PlacedBet, SettlementOrchestrator};
pub use vault_custodian::VaultCustodian;
