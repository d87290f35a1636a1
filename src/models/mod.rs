pub mod address;
pub mod amount;
pub mod event;
pub mod job;
pub mod market;
pub mod pool;
pub mod position;
pub mod token;

pub use address::{Address, ASSOCIATED_TOKEN_PROGRAM_ID, NATIVE_MINT, TOKEN_PROGRAM_ID};
pub use event::LedgerEvent;
pub use job::{
    ComputationKind, ComputationOutput, ComputationRecord, ComputationStatus, JobFinalized,
    JobSubmitted, JobTicket,
};
pub use market::{Market, MarketStatus, MarketView, Outcome, MAX_QUESTION_LEN};
pub use pool::{PoolState, ENCRYPTED_STATE_SIZE};
pub use position::{Position, PositionStatus, ENCRYPTED_BET_SIZE};
pub use token::{Mint, TokenAccount, MAX_DECIMALS, NATIVE_DECIMALS};
