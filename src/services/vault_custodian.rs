use crate::errors::{ProgramError, SettlementError};
use crate::ledger::InMemoryLedger;
use crate::models::{Address, NATIVE_MINT};
use crate::pda::{associated_token_address, AddressDeriver};
use crate::program::Instruction;

/// Client side of escrow: builds the funding and payout-account steps that
/// ride in the same transaction as the bet or claim they serve.
#[derive(Clone)]
pub struct VaultCustodian {
    ledger: InMemoryLedger,
    deriver: AddressDeriver,
}

impl VaultCustodian {
    pub fn new(ledger: InMemoryLedger, deriver: AddressDeriver) -> Self {
        Self { ledger, deriver }
    }

    async fn holding_account(
        &self,
        owner: &Address,
        mint: &Address,
    ) -> Result<(Address, bool), SettlementError> {
        let account = associated_token_address(owner, mint).map_err(ProgramError::from)?;
        let exists = self.ledger.token_account(&account).await.is_some();
        Ok((account, exists))
    }

    /// Steps that leave `payer`'s holding account with `amount` ready to
    /// deposit. For the native coin: create the wrapped account if absent,
    /// move the lamports in, sync. Other assets must already be held.
    pub async fn deposit_instructions(
        &self,
        payer: Address,
        mint: Address,
        amount: u64,
    ) -> Result<Vec<Instruction>, SettlementError> {
        let (account, exists) = self.holding_account(&payer, &mint).await?;
        if mint != NATIVE_MINT {
            if !exists {
                return Err(SettlementError::AccountNotFound(account));
            }
            return Ok(Vec::new());
        }

        let mut instructions = Vec::with_capacity(3);
        if !exists {
            instructions.push(Instruction::CreateAssociatedTokenAccount {
                payer,
                owner: payer,
                mint,
            });
        }
        instructions.push(Instruction::TransferNative {
            from: payer,
            to: account,
            lamports: amount,
        });
        instructions.push(Instruction::SyncNative { account });
        tracing::debug!(
            payer = %payer,
            amount,
            create = !exists,
            "Custodian: wrapping native deposit"
        );
        Ok(instructions)
    }

    /// Creates the claimer's holding account when it does not exist yet.
    pub async fn payout_account_instructions(
        &self,
        claimer: Address,
        mint: Address,
    ) -> Result<Vec<Instruction>, SettlementError> {
        let (_, exists) = self.holding_account(&claimer, &mint).await?;
        if exists {
            return Ok(Vec::new());
        }
        Ok(vec![Instruction::CreateAssociatedTokenAccount {
            payer: claimer,
            owner: claimer,
            mint,
        }])
    }

    pub async fn vault_balance(&self, market_id: u64) -> Result<u64, SettlementError> {
        let vault = self
            .deriver
            .vault(market_id)
            .map_err(ProgramError::from)?
            .address;
        self.ledger
            .token_account(&vault)
            .await
            .map(|a| a.amount)
            .ok_or(SettlementError::AccountNotFound(vault))
    }
}
