//! Per-bettor position lifecycle.
//!
//! `Pending -> Processed -> PayoutComputed -> Claimed`, plus `Refunded` from
//! any pre-claim status once the market is cancelled.

use crate::errors::ProgramError;
use crate::models::{
    Address, Market, MarketStatus, Position, PositionStatus, ENCRYPTED_BET_SIZE,
};

#[derive(Debug, Clone)]
pub struct NewBet {
    pub owner: Address,
    pub encrypted_bet: Vec<u8>,
    pub user_pubkey: [u8; 32],
    pub nonce: u128,
    pub deposit_amount: u64,
    pub computation_id: u64,
}

/// Wager admission checks, in the order the program applies them.
pub fn check_bet(market: &Market, bet: &NewBet, now: i64) -> Result<(), ProgramError> {
    if market.status != MarketStatus::Open {
        return Err(ProgramError::MarketNotOpen);
    }
    if now < market.betting_start_ts {
        return Err(ProgramError::NotYetStarted);
    }
    if now >= market.betting_end_ts {
        return Err(ProgramError::BettingEnded);
    }
    if bet.deposit_amount == 0 {
        return Err(ProgramError::InvalidBetAmount);
    }
    if bet.encrypted_bet.len() != ENCRYPTED_BET_SIZE {
        return Err(ProgramError::InvalidEncryptedBetSize);
    }
    Ok(())
}

/// Build the position for a first bet. `existing` is whatever already lives
/// at the derived position address.
pub fn record_bet(
    market_address: Address,
    market: &Market,
    existing: Option<&Position>,
    bet: NewBet,
    now: i64,
) -> Result<Position, ProgramError> {
    // The position account is claimed before anything about the bet is read.
    if existing.is_some() {
        return Err(ProgramError::PositionAlreadyExists);
    }
    check_bet(market, &bet, now)?;
    Ok(Position {
        market: market_address,
        owner: bet.owner,
        encrypted_bet: bet.encrypted_bet,
        user_pubkey: bet.user_pubkey,
        nonce: bet.nonce,
        deposit_amount: bet.deposit_amount,
        payout_amount: 0,
        status: PositionStatus::Pending,
        computation_id: bet.computation_id,
        created_at: now,
        processed_at: None,
        claimed_at: None,
    })
}

pub fn apply_process_result(position: &mut Position, now: i64) -> Result<(), ProgramError> {
    if position.status != PositionStatus::Pending {
        return Err(ProgramError::InvalidPosition);
    }
    position.status = PositionStatus::Processed;
    position.processed_at = Some(now);
    Ok(())
}

pub fn apply_payout_result(
    position: &mut Position,
    market: &Market,
    payout_amount: u64,
) -> Result<(), ProgramError> {
    if market.status != MarketStatus::Resolved {
        return Err(ProgramError::MarketNotResolved);
    }
    if position.status != PositionStatus::Processed {
        return Err(ProgramError::InvalidPosition);
    }
    position.payout_amount = payout_amount;
    position.status = PositionStatus::PayoutComputed;
    Ok(())
}

/// Marks the position claimed and returns the amount to release.
pub fn claim(
    position: &mut Position,
    market: &Market,
    claimer: &Address,
    now: i64,
) -> Result<u64, ProgramError> {
    if !market.status.accepts_claims() {
        return Err(ProgramError::MarketNotResolved);
    }
    if position.owner != *claimer {
        return Err(ProgramError::Unauthorized);
    }
    match position.status {
        PositionStatus::PayoutComputed => {}
        PositionStatus::Claimed => return Err(ProgramError::AlreadyClaimed),
        PositionStatus::Pending | PositionStatus::Processed | PositionStatus::Refunded => {
            return Err(ProgramError::PayoutNotComputed)
        }
    }
    if position.payout_amount == 0 {
        return Err(ProgramError::NoPayout);
    }
    position.status = PositionStatus::Claimed;
    position.claimed_at = Some(now);
    Ok(position.payout_amount)
}

/// Marks the position refunded and returns the deposit to release.
pub fn refund(
    position: &mut Position,
    market: &Market,
    claimer: &Address,
    now: i64,
) -> Result<u64, ProgramError> {
    if market.status != MarketStatus::Cancelled {
        return Err(ProgramError::MarketNotCancelled);
    }
    if position.owner != *claimer {
        return Err(ProgramError::Unauthorized);
    }
    if !position.can_claim_refund() {
        return Err(ProgramError::AlreadyClaimed);
    }
    position.status = PositionStatus::Refunded;
    position.claimed_at = Some(now);
    Ok(position.deposit_amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 10_000;

    fn owner() -> Address {
        Address::new_from_array([5; 32])
    }

    fn market(status: MarketStatus) -> Market {
        Market {
            market_id: 1,
            authority: Address::new_from_array([1; 32]),
            question: "q".into(),
            token_mint: Address::new_from_array([2; 32]),
            vault: Address::new_from_array([3; 32]),
            pool_state: Address::new_from_array([4; 32]),
            betting_start_ts: NOW - 100,
            betting_end_ts: NOW + 100,
            resolution_end_ts: NOW + 200,
            status,
            winning_outcome: None,
            total_positions: 0,
            state_commitment: [0; 32],
            created_at: NOW - 200,
            resolved_at: None,
        }
    }

    fn bet(amount: u64) -> NewBet {
        NewBet {
            owner: owner(),
            encrypted_bet: vec![7; ENCRYPTED_BET_SIZE],
            user_pubkey: [8; 32],
            nonce: 99,
            deposit_amount: amount,
            computation_id: 1234,
        }
    }

    fn pending_position() -> Position {
        record_bet(Address::default(), &market(MarketStatus::Open), None, bet(100), NOW).unwrap()
    }

    #[test]
    fn record_bet_creates_pending_position() {
        let p = pending_position();
        assert_eq!(p.status, PositionStatus::Pending);
        assert_eq!(p.deposit_amount, 100);
        assert_eq!(p.payout_amount, 0);
        assert_eq!(p.computation_id, 1234);
    }

    #[test]
    fn second_bet_always_rejected() {
        let existing = pending_position();
        for amount in [1, 100, 5_000, u64::MAX] {
            let err = record_bet(
                Address::default(),
                &market(MarketStatus::Open),
                Some(&existing),
                bet(amount),
                NOW,
            )
            .unwrap_err();
            assert_eq!(err, ProgramError::PositionAlreadyExists);
        }
    }

    #[test]
    fn second_bet_rejected_before_window_and_amount_checks() {
        let existing = pending_position();
        let cases = [
            (MarketStatus::Open, NOW + 500, 100),
            (MarketStatus::Open, NOW - 500, 100),
            (MarketStatus::Open, NOW, 0),
            (MarketStatus::BettingClosed, NOW, 100),
            (MarketStatus::Cancelled, NOW, 0),
        ];
        for (status, now, amount) in cases {
            let err = record_bet(
                Address::default(),
                &market(status),
                Some(&existing),
                bet(amount),
                now,
            )
            .unwrap_err();
            assert_eq!(err, ProgramError::PositionAlreadyExists);
        }
    }

    #[test]
    fn bet_window_and_amount_checks() {
        let m = market(MarketStatus::Open);
        assert_eq!(
            check_bet(&m, &bet(1), NOW - 101).unwrap_err(),
            ProgramError::NotYetStarted
        );
        assert_eq!(
            check_bet(&m, &bet(1), NOW + 100).unwrap_err(),
            ProgramError::BettingEnded
        );
        assert_eq!(
            check_bet(&m, &bet(0), NOW).unwrap_err(),
            ProgramError::InvalidBetAmount
        );
        let mut short = bet(1);
        short.encrypted_bet.truncate(32);
        assert_eq!(
            check_bet(&m, &short, NOW).unwrap_err(),
            ProgramError::InvalidEncryptedBetSize
        );
        assert_eq!(
            check_bet(&market(MarketStatus::Created), &bet(1), NOW).unwrap_err(),
            ProgramError::MarketNotOpen
        );
    }

    #[test]
    fn claim_once_then_already_claimed() {
        let mut m = market(MarketStatus::Resolved);
        let mut p = pending_position();
        apply_process_result(&mut p, NOW).unwrap();
        apply_payout_result(&mut p, &m, 190).unwrap();

        assert_eq!(claim(&mut p, &m, &owner(), NOW).unwrap(), 190);
        assert_eq!(p.status, PositionStatus::Claimed);
        assert_eq!(
            claim(&mut p, &m, &owner(), NOW).unwrap_err(),
            ProgramError::AlreadyClaimed
        );

        m.status = MarketStatus::Settled;
        assert_eq!(
            claim(&mut p, &m, &owner(), NOW).unwrap_err(),
            ProgramError::AlreadyClaimed
        );
    }

    #[test]
    fn zero_payout_cannot_be_claimed() {
        let m = market(MarketStatus::Resolved);
        let mut p = pending_position();
        apply_process_result(&mut p, NOW).unwrap();
        apply_payout_result(&mut p, &m, 0).unwrap();
        assert_eq!(
            claim(&mut p, &m, &owner(), NOW).unwrap_err(),
            ProgramError::NoPayout
        );
        assert_eq!(p.status, PositionStatus::PayoutComputed);
    }

    #[test]
    fn claim_before_payout_is_rejected() {
        let m = market(MarketStatus::Resolved);
        let mut p = pending_position();
        assert_eq!(
            claim(&mut p, &m, &owner(), NOW).unwrap_err(),
            ProgramError::PayoutNotComputed
        );
        let m = market(MarketStatus::Open);
        assert_eq!(
            claim(&mut p, &m, &owner(), NOW).unwrap_err(),
            ProgramError::MarketNotResolved
        );
    }

    #[test]
    fn payout_result_needs_resolved_market_and_processed_position() {
        let mut p = pending_position();
        assert_eq!(
            apply_payout_result(&mut p, &market(MarketStatus::Resolved), 5).unwrap_err(),
            ProgramError::InvalidPosition
        );
        apply_process_result(&mut p, NOW).unwrap();
        assert_eq!(
            apply_payout_result(&mut p, &market(MarketStatus::Open), 5).unwrap_err(),
            ProgramError::MarketNotResolved
        );
    }

    #[test]
    fn refund_from_any_pre_claim_status() {
        let cancelled = market(MarketStatus::Cancelled);
        let mut p = pending_position();
        assert_eq!(refund(&mut p, &cancelled, &owner(), NOW).unwrap(), 100);
        assert_eq!(p.status, PositionStatus::Refunded);
        assert_eq!(
            refund(&mut p, &cancelled, &owner(), NOW).unwrap_err(),
            ProgramError::AlreadyClaimed
        );

        let mut p = pending_position();
        apply_process_result(&mut p, NOW).unwrap();
        assert_eq!(refund(&mut p, &cancelled, &owner(), NOW).unwrap(), 100);

        let mut p = pending_position();
        assert_eq!(
            refund(&mut p, &market(MarketStatus::Open), &owner(), NOW).unwrap_err(),
            ProgramError::MarketNotCancelled
        );
    }

    #[test]
    fn only_owner_may_claim_or_refund() {
        let stranger = Address::new_from_array([6; 32]);
        let mut p = pending_position();
        assert_eq!(
            refund(&mut p, &market(MarketStatus::Cancelled), &stranger, NOW).unwrap_err(),
            ProgramError::Unauthorized
        );
    }
}
