use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{find_program_address, DerivationError};
use crate::models::{Address, ComputationKind};

const MXE_SEED: &[u8] = b"MXEAccount";
const MEMPOOL_SEED: &[u8] = b"Mempool";
const EXECPOOL_SEED: &[u8] = b"Execpool";
const CLUSTER_SEED: &[u8] = b"Cluster";
const COMP_DEF_SEED: &[u8] = b"ComputationDefinitionAccount";
const COMPUTATION_SEED: &[u8] = b"ComputationAccount";
const SIGNER_SEED: &[u8] = b"ArciumSignerAccount";

/// Computation-definition offset: first four bytes (LE) of SHA-256(circuit name).
pub fn comp_def_offset(circuit_name: &str) -> u32 {
    let digest = Sha256::digest(circuit_name.as_bytes());
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Addresses of the compute network's accounts for one cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkAddresses {
    network_program_id: Address,
    program_id: Address,
    cluster_offset: u32,
}

/// Every network account a queueing transaction touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueAccounts {
    pub mxe: Address,
    pub mempool: Address,
    pub executing_pool: Address,
    pub cluster: Address,
    pub comp_def: Address,
    pub computation: Address,
    pub signer: Address,
}

impl NetworkAddresses {
    pub fn new(network_program_id: Address, program_id: Address, cluster_offset: u32) -> Self {
        Self {
            network_program_id,
            program_id,
            cluster_offset,
        }
    }

    pub fn cluster_offset(&self) -> u32 {
        self.cluster_offset
    }

    pub fn mxe(&self) -> Result<Address, DerivationError> {
        self.derive(&[MXE_SEED, self.program_id.as_ref()])
    }

    pub fn mempool(&self) -> Result<Address, DerivationError> {
        self.derive(&[MEMPOOL_SEED, &self.cluster_offset.to_le_bytes()])
    }

    pub fn executing_pool(&self) -> Result<Address, DerivationError> {
        self.derive(&[EXECPOOL_SEED, &self.cluster_offset.to_le_bytes()])
    }

    pub fn cluster(&self) -> Result<Address, DerivationError> {
        self.derive(&[CLUSTER_SEED, &self.cluster_offset.to_le_bytes()])
    }

    pub fn comp_def(&self, kind: ComputationKind) -> Result<Address, DerivationError> {
        let offset = comp_def_offset(kind.circuit_name());
        self.derive(&[
            COMP_DEF_SEED,
            self.program_id.as_ref(),
            &offset.to_le_bytes(),
        ])
    }

    /// Account that records one queued job.
    pub fn computation(&self, computation_offset: u64) -> Result<Address, DerivationError> {
        self.derive(&[
            COMPUTATION_SEED,
            &self.cluster_offset.to_le_bytes(),
            &computation_offset.to_le_bytes(),
        ])
    }

    /// Signer account owned by the settlement program itself.
    pub fn program_signer(&self) -> Result<Address, DerivationError> {
        find_program_address(&[SIGNER_SEED], &self.program_id).map(|d| d.address)
    }

    pub fn queue_accounts(
        &self,
        kind: ComputationKind,
        computation_offset: u64,
    ) -> Result<QueueAccounts, DerivationError> {
        Ok(QueueAccounts {
            mxe: self.mxe()?,
            mempool: self.mempool()?,
            executing_pool: self.executing_pool()?,
            cluster: self.cluster()?,
            comp_def: self.comp_def(kind)?,
            computation: self.computation(computation_offset)?,
            signer: self.program_signer()?,
        })
    }

    fn derive(&self, seeds: &[&[u8]]) -> Result<Address, DerivationError> {
        find_program_address(seeds, &self.network_program_id).map(|d| d.address)
    }
}
