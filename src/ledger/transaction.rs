use serde::Serialize;
use uuid::Uuid;

use crate::models::{Address, LedgerEvent};
use crate::program::Instruction;

/// Instructions applied in order, all-or-nothing, under the listed signers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub instructions: Vec<Instruction>,
    pub signers: Vec<Address>,
}

impl Transaction {
    pub fn new(instructions: Vec<Instruction>, signers: Vec<Address>) -> Self {
        Self {
            instructions,
            signers,
        }
    }

    pub fn single(instruction: Instruction, signer: Address) -> Self {
        Self::new(vec![instruction], vec![signer])
    }

    /// A transaction that needs no signature (network-relayed results).
    pub fn unsigned(instruction: Instruction) -> Self {
        Self::new(vec![instruction], Vec::new())
    }
}

/// Confirmation of a committed transaction.
#[derive(Debug, Clone, Serialize)]
pub struct TxReceipt {
    pub tx_id: Uuid,
    pub slot: u64,
    pub events: Vec<LedgerEvent>,
}
