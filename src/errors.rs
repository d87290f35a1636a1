use std::time::Duration;

use thiserror::Error;

use crate::models::amount::AmountError;
use crate::models::Address;

/// First custom error code; codes are contiguous from here.
pub const ERROR_CODE_BASE: u32 = 6000;

/// Error taxonomy used for logging, metrics and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    StateTransition,
    Authorization,
    Duplicate,
    Custody,
    Computation,
    Timeout,
}

/// Program errors with fixed numeric codes. Raised synchronously by an
/// instruction; the enclosing transaction changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProgramError {
    #[error("Question exceeds maximum length of 200 characters")]
    QuestionTooLong,

    #[error("Betting end time must be before resolution end time")]
    InvalidTimeOrdering,

    #[error("Deadline cannot be in the past")]
    DeadlineInPast,

    #[error("Market is not open for betting")]
    MarketNotOpen,

    #[error("Betting period has not started yet")]
    NotYetStarted,

    #[error("Betting period has ended")]
    BettingEnded,

    #[error("Betting period has not ended yet")]
    DeadlineNotReached,

    #[error("Market has not been resolved")]
    MarketNotResolved,

    #[error("Market has already been resolved")]
    MarketAlreadyResolved,

    #[error("Market is not cancelled")]
    MarketNotCancelled,

    #[error("Invalid market status for this operation")]
    InvalidStateTransition,

    #[error("Bet amount must be greater than zero")]
    InvalidBetAmount,

    #[error("Encrypted bet data size is invalid")]
    InvalidEncryptedBetSize,

    #[error("Invalid outcome - must be 0 (NO) or 1 (YES)")]
    InvalidOutcome,

    #[error("Position has already been claimed")]
    AlreadyClaimed,

    #[error("No payout available for this position")]
    NoPayout,

    #[error("Payout has not been computed yet")]
    PayoutNotComputed,

    #[error("Unauthorized - only market authority can perform this action")]
    Unauthorized,

    #[error("Invalid token account owner")]
    InvalidTokenAccountOwner,

    #[error("Token mint does not match market")]
    InvalidTokenMint,

    #[error("Vault does not match market")]
    InvalidVault,

    #[error("Pool state does not match market")]
    InvalidPoolState,

    #[error("Position does not belong to this market")]
    InvalidPosition,

    #[error("Pool state has not been initialized")]
    PoolStateNotInitialized,

    #[error("Encrypted state exceeds maximum size")]
    EncryptedStateTooLarge,

    #[error("Computation was aborted")]
    ComputationAborted,

    #[error("Cluster not set in MXE account")]
    ClusterNotSet,

    #[error("Invalid computation result")]
    InvalidComputationResult,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Arithmetic underflow")]
    Underflow,

    #[error("Position already exists for this bettor in this market")]
    PositionAlreadyExists,

    #[error("A computation is already in flight for this market")]
    ComputationInFlight,

    #[error("Computation offset is not known to the ledger")]
    UnknownComputation,

    #[error("Insufficient funds for this transfer")]
    InsufficientFunds,

    #[error("Account does not exist")]
    AccountNotFound,

    #[error("Computation offset is already in use")]
    ComputationOffsetInUse,

    #[error("Account already exists")]
    AccountAlreadyExists,

    #[error("Computation result signature is invalid")]
    InvalidComputationSignature,

    #[error("Could not derive account address")]
    AddressDerivationFailed,
}

impl ProgramError {
    const ALL: [ProgramError; 39] = [
        ProgramError::QuestionTooLong,
        ProgramError::InvalidTimeOrdering,
        ProgramError::DeadlineInPast,
        ProgramError::MarketNotOpen,
        ProgramError::NotYetStarted,
        ProgramError::BettingEnded,
        ProgramError::DeadlineNotReached,
        ProgramError::MarketNotResolved,
        ProgramError::MarketAlreadyResolved,
        ProgramError::MarketNotCancelled,
        ProgramError::InvalidStateTransition,
        ProgramError::InvalidBetAmount,
        ProgramError::InvalidEncryptedBetSize,
        ProgramError::InvalidOutcome,
        ProgramError::AlreadyClaimed,
        ProgramError::NoPayout,
        ProgramError::PayoutNotComputed,
        ProgramError::Unauthorized,
        ProgramError::InvalidTokenAccountOwner,
        ProgramError::InvalidTokenMint,
        ProgramError::InvalidVault,
        ProgramError::InvalidPoolState,
        ProgramError::InvalidPosition,
        ProgramError::PoolStateNotInitialized,
        ProgramError::EncryptedStateTooLarge,
        ProgramError::ComputationAborted,
        ProgramError::ClusterNotSet,
        ProgramError::InvalidComputationResult,
        ProgramError::Overflow,
        ProgramError::Underflow,
        ProgramError::PositionAlreadyExists,
        ProgramError::ComputationInFlight,
        ProgramError::UnknownComputation,
        ProgramError::InsufficientFunds,
        ProgramError::AccountNotFound,
        ProgramError::ComputationOffsetInUse,
        ProgramError::AccountAlreadyExists,
        ProgramError::InvalidComputationSignature,
        ProgramError::AddressDerivationFailed,
    ];

    pub fn code(self) -> u32 {
        // Position in ALL is the offset from the base code.
        let index = Self::ALL
            .iter()
            .position(|e| *e == self)
            .unwrap_or_default();
        ERROR_CODE_BASE + index as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        let index = code.checked_sub(ERROR_CODE_BASE)? as usize;
        Self::ALL.get(index).copied()
    }

    pub fn kind(self) -> ErrorKind {
        match self {
            ProgramError::QuestionTooLong
            | ProgramError::InvalidTimeOrdering
            | ProgramError::DeadlineInPast
            | ProgramError::NotYetStarted
            | ProgramError::BettingEnded
            | ProgramError::DeadlineNotReached
            | ProgramError::InvalidBetAmount
            | ProgramError::InvalidEncryptedBetSize
            | ProgramError::InvalidOutcome
            | ProgramError::NoPayout
            | ProgramError::InvalidTokenAccountOwner
            | ProgramError::InvalidTokenMint
            | ProgramError::InvalidVault
            | ProgramError::InvalidPoolState
            | ProgramError::InvalidPosition
            | ProgramError::EncryptedStateTooLarge
            | ProgramError::Overflow
            | ProgramError::Underflow
            | ProgramError::InsufficientFunds
            | ProgramError::AccountNotFound
            | ProgramError::AddressDerivationFailed => ErrorKind::Validation,

            ProgramError::MarketNotOpen
            | ProgramError::MarketNotResolved
            | ProgramError::MarketAlreadyResolved
            | ProgramError::MarketNotCancelled
            | ProgramError::InvalidStateTransition
            | ProgramError::PayoutNotComputed
            | ProgramError::PoolStateNotInitialized => ErrorKind::StateTransition,

            ProgramError::Unauthorized => ErrorKind::Authorization,

            ProgramError::AlreadyClaimed
            | ProgramError::PositionAlreadyExists
            | ProgramError::ComputationInFlight
            | ProgramError::ComputationOffsetInUse
            | ProgramError::AccountAlreadyExists => ErrorKind::Duplicate,

            ProgramError::ComputationAborted
            | ProgramError::ClusterNotSet
            | ProgramError::InvalidComputationResult
            | ProgramError::UnknownComputation
            | ProgramError::InvalidComputationSignature => ErrorKind::Computation,
        }
    }
}

/// Map a numeric error code to its fixed message.
pub fn describe_error_code(code: u32) -> String {
    match ProgramError::from_code(code) {
        Some(e) => e.to_string(),
        None => format!("unknown error: {code}"),
    }
}

/// Extract and describe a `custom program error: 0x....` code from a raw
/// transaction log or RPC error message. Other messages pass through.
pub fn describe_program_log(message: &str) -> String {
    const MARKER: &str = "custom program error: 0x";
    let Some(start) = message.find(MARKER) else {
        return message.to_string();
    };
    let hex_digits: String = message[start + MARKER.len()..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    match u32::from_str_radix(&hex_digits, 16) {
        Ok(code) => describe_error_code(code),
        Err(_) => message.to_string(),
    }
}

/// The vault was asked to release more than it holds. Accounting elsewhere
/// is wrong; never a user-correctable condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("custody violation: vault {vault} holds {balance}, release of {requested} requested")]
pub struct CustodyViolation {
    pub vault: Address,
    pub balance: u64,
    pub requested: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstructionError {
    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error(transparent)]
    Custody(#[from] CustodyViolation),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("instruction {index} failed: {source}")]
    InstructionFailed {
        index: usize,
        #[source]
        source: InstructionError,
    },

    #[error("missing required signature for {0}")]
    MissingSignature(Address),

    #[error("transaction has no instructions")]
    EmptyTransaction,
}

impl LedgerError {
    pub fn program_error(&self) -> Option<ProgramError> {
        match self {
            LedgerError::InstructionFailed {
                source: InstructionError::Program(e),
                ..
            } => Some(*e),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("network public key is not a valid x25519 point")]
    InvalidNetworkKey,

    #[error("ciphertext must be {expected} bytes, got {actual}")]
    CiphertextLength { expected: usize, actual: usize },

    #[error("decrypted block does not hold a valid value")]
    MalformedPlaintext,

    #[error("MAC key setup failed: {0}")]
    Mac(String),
}

/// Client-facing error for every settlement operation.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("transaction rejected: {0}")]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    Rejected(#[from] ProgramError),

    #[error("timed out after {waited:?} waiting for computation {offset}")]
    TimedOut { offset: u64, waited: Duration },

    #[error("computation {offset} aborted: {reason}")]
    ComputationAborted { offset: u64, reason: String },

    #[error("account {0} not found")]
    AccountNotFound(Address),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    InvalidAmount(#[from] AmountError),

    #[error("compute network is unreachable")]
    NetworkUnavailable,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SettlementError {
    pub fn program_error(&self) -> Option<ProgramError> {
        match self {
            SettlementError::Ledger(e) => e.program_error(),
            SettlementError::Rejected(e) => Some(*e),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<u32> {
        self.program_error().map(ProgramError::code)
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            SettlementError::Ledger(LedgerError::InstructionFailed {
                source: InstructionError::Custody(_),
                ..
            }) => Some(ErrorKind::Custody),
            SettlementError::Ledger(LedgerError::MissingSignature(_)) => {
                Some(ErrorKind::Authorization)
            }
            SettlementError::TimedOut { .. } => Some(ErrorKind::Timeout),
            SettlementError::ComputationAborted { .. } => Some(ErrorKind::Computation),
            SettlementError::InvalidAmount(_) => Some(ErrorKind::Validation),
            other => other.program_error().map(ProgramError::kind),
        }
    }

    /// Message suitable for an end user.
    pub fn user_message(&self) -> String {
        match self.code() {
            Some(code) => describe_error_code(code),
            None => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_contiguous_from_base() {
        assert_eq!(ProgramError::QuestionTooLong.code(), 6000);
        assert_eq!(ProgramError::Unauthorized.code(), 6017);
        assert_eq!(ProgramError::Underflow.code(), 6029);
        assert_eq!(ProgramError::PositionAlreadyExists.code(), 6030);
        for (i, e) in ProgramError::ALL.iter().enumerate() {
            assert_eq!(e.code(), ERROR_CODE_BASE + i as u32);
            assert_eq!(ProgramError::from_code(e.code()), Some(*e));
        }
    }

    #[test]
    fn unknown_codes_are_reported_verbatim() {
        assert_eq!(describe_error_code(42), "unknown error: 42");
        assert_eq!(describe_error_code(9999), "unknown error: 9999");
        assert_eq!(
            describe_error_code(6014),
            "Position has already been claimed"
        );
    }

    #[test]
    fn program_log_codes_are_decoded() {
        // 0x1770 == 6000
        let msg = "Transaction simulation failed: custom program error: 0x1770";
        assert_eq!(
            describe_program_log(msg),
            "Question exceeds maximum length of 200 characters"
        );
        assert_eq!(describe_program_log("blockhash not found"), "blockhash not found");
    }

    #[test]
    fn settlement_error_surfaces_instruction_code() {
        let err = SettlementError::from(LedgerError::InstructionFailed {
            index: 2,
            source: ProgramError::AlreadyClaimed.into(),
        });
        assert_eq!(err.code(), Some(6014));
        assert_eq!(err.kind(), Some(ErrorKind::Duplicate));
        assert_eq!(err.user_message(), "Position has already been claimed");
    }

    #[test]
    fn custody_violation_is_its_own_kind() {
        let err = SettlementError::from(LedgerError::InstructionFailed {
            index: 0,
            source: CustodyViolation {
                vault: Address::default(),
                balance: 10,
                requested: 20,
            }
            .into(),
        });
        assert_eq!(err.code(), None);
        assert_eq!(err.kind(), Some(ErrorKind::Custody));
    }
}
