//! Compute-network boundary.
//!
//! The network only ever sees [`JobSubmitted`](crate::models::JobSubmitted)
//! and answers with [`JobFinalized`](crate::models::JobFinalized). The
//! simulated cluster here speaks that protocol in-process.

pub mod circuits;
pub mod simulator;

pub use simulator::{run_simulated_cluster, SimulatedCluster};
