//! Market lifecycle.
//!
//! `Created -> Open -> BettingClosed -> Resolved -> Settled`, with
//! `Cancelled` reachable from `Created` or `Open` and `Resolved` reachable
//! straight from `Open` once betting has ended. Every transition here is a
//! pure function over the market record; the dispatcher persists the result.

use crate::errors::ProgramError;
use crate::models::{Address, Market, MarketStatus, Outcome, MAX_QUESTION_LEN};

/// Parameters for a new market, with its derived accounts already resolved.
#[derive(Debug, Clone)]
pub struct NewMarket<'a> {
    pub market_id: u64,
    pub authority: Address,
    pub question: &'a str,
    pub betting_start_ts: i64,
    pub betting_end_ts: i64,
    pub resolution_end_ts: i64,
    pub token_mint: Address,
    pub vault: Address,
    pub pool_state: Address,
}

pub fn create(params: NewMarket<'_>, now: i64) -> Result<Market, ProgramError> {
    // 1. Question bound, counted in characters
    if params.question.chars().count() > MAX_QUESTION_LEN {
        return Err(ProgramError::QuestionTooLong);
    }

    // 2. Strictly increasing window
    if params.betting_start_ts >= params.betting_end_ts
        || params.betting_end_ts >= params.resolution_end_ts
    {
        return Err(ProgramError::InvalidTimeOrdering);
    }

    // 3. All in the future (ordering makes start the earliest)
    if params.betting_start_ts <= now {
        return Err(ProgramError::DeadlineInPast);
    }

    Ok(Market {
        market_id: params.market_id,
        authority: params.authority,
        question: params.question.to_owned(),
        token_mint: params.token_mint,
        vault: params.vault,
        pool_state: params.pool_state,
        betting_start_ts: params.betting_start_ts,
        betting_end_ts: params.betting_end_ts,
        resolution_end_ts: params.resolution_end_ts,
        status: MarketStatus::Created,
        winning_outcome: None,
        total_positions: 0,
        state_commitment: [0; 32],
        created_at: now,
        resolved_at: None,
    })
}

fn require_authority(market: &Market, caller: &Address) -> Result<(), ProgramError> {
    if market.authority != *caller {
        return Err(ProgramError::Unauthorized);
    }
    Ok(())
}

pub fn open(market: &mut Market, caller: &Address) -> Result<(), ProgramError> {
    require_authority(market, caller)?;
    match market.status {
        MarketStatus::Created => {
            market.status = MarketStatus::Open;
            Ok(())
        }
        MarketStatus::Open
        | MarketStatus::BettingClosed
        | MarketStatus::Resolved
        | MarketStatus::Settled
        | MarketStatus::Cancelled => Err(ProgramError::InvalidStateTransition),
    }
}

pub fn close_betting(market: &mut Market, caller: &Address, now: i64) -> Result<(), ProgramError> {
    require_authority(market, caller)?;
    if market.status != MarketStatus::Open {
        return Err(ProgramError::InvalidStateTransition);
    }
    if now < market.betting_end_ts {
        return Err(ProgramError::DeadlineNotReached);
    }
    market.status = MarketStatus::BettingClosed;
    Ok(())
}

pub fn resolve(
    market: &mut Market,
    caller: &Address,
    winning_outcome: u8,
    now: i64,
) -> Result<Outcome, ProgramError> {
    require_authority(market, caller)?;
    match market.status {
        MarketStatus::Open | MarketStatus::BettingClosed => {}
        MarketStatus::Resolved | MarketStatus::Settled => {
            return Err(ProgramError::MarketAlreadyResolved)
        }
        MarketStatus::Created | MarketStatus::Cancelled => {
            return Err(ProgramError::InvalidStateTransition)
        }
    }
    if now < market.betting_end_ts {
        return Err(ProgramError::DeadlineNotReached);
    }
    let outcome = Outcome::from_u8(winning_outcome).ok_or(ProgramError::InvalidOutcome)?;

    market.status = MarketStatus::Resolved;
    market.winning_outcome = Some(outcome);
    market.resolved_at = Some(now);
    Ok(outcome)
}

pub fn cancel(market: &mut Market, caller: &Address) -> Result<(), ProgramError> {
    require_authority(market, caller)?;
    match market.status {
        MarketStatus::Created | MarketStatus::Open => {
            market.status = MarketStatus::Cancelled;
            Ok(())
        }
        MarketStatus::BettingClosed
        | MarketStatus::Resolved
        | MarketStatus::Settled
        | MarketStatus::Cancelled => Err(ProgramError::InvalidStateTransition),
    }
}

/// Final phase: only once no computation is outstanding for the market.
pub fn settle(
    market: &mut Market,
    caller: &Address,
    pending_computations: u32,
) -> Result<(), ProgramError> {
    require_authority(market, caller)?;
    if market.status != MarketStatus::Resolved {
        return Err(ProgramError::InvalidStateTransition);
    }
    if pending_computations > 0 {
        return Err(ProgramError::ComputationInFlight);
    }
    market.status = MarketStatus::Settled;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn authority() -> Address {
        Address::new_from_array([1; 32])
    }

    fn params(question: &str, start: i64, end: i64, resolution: i64) -> NewMarket<'_> {
        NewMarket {
            market_id: 1,
            authority: authority(),
            question,
            betting_start_ts: start,
            betting_end_ts: end,
            resolution_end_ts: resolution,
            token_mint: Address::new_from_array([2; 32]),
            vault: Address::new_from_array([3; 32]),
            pool_state: Address::new_from_array([4; 32]),
        }
    }

    fn market_in(status: MarketStatus) -> Market {
        let mut m = create(params("Will X happen?", NOW + 5, NOW + 3600, NOW + 7200), NOW).unwrap();
        m.status = status;
        m
    }

    const ALL_STATUSES: [MarketStatus; 6] = [
        MarketStatus::Created,
        MarketStatus::Open,
        MarketStatus::BettingClosed,
        MarketStatus::Resolved,
        MarketStatus::Settled,
        MarketStatus::Cancelled,
    ];

    #[test]
    fn create_accepts_every_valid_future_window() {
        for (start, end, resolution) in [
            (1, 2, 3),
            (5, 3600, 7200),
            (100, 101, 1_000_000),
            (1, i64::MAX / 4, i64::MAX / 2),
        ] {
            let m = create(params("q", NOW + start, NOW + end, NOW + resolution), NOW).unwrap();
            assert_eq!(m.status, MarketStatus::Created);
            assert_eq!(m.winning_outcome, None);
        }
    }

    #[test]
    fn create_validates_question_then_ordering_then_deadline() {
        let long = "x".repeat(201);
        assert_eq!(
            create(params(&long, NOW - 10, NOW - 20, NOW), NOW).unwrap_err(),
            ProgramError::QuestionTooLong
        );
        assert_eq!(
            create(params("q", NOW + 10, NOW + 10, NOW + 20), NOW).unwrap_err(),
            ProgramError::InvalidTimeOrdering
        );
        assert_eq!(
            create(params("q", NOW + 10, NOW + 20, NOW + 20), NOW).unwrap_err(),
            ProgramError::InvalidTimeOrdering
        );
        assert_eq!(
            create(params("q", NOW, NOW + 20, NOW + 30), NOW).unwrap_err(),
            ProgramError::DeadlineInPast
        );
    }

    #[test]
    fn question_length_counts_characters() {
        let exactly_200: String = "é".repeat(200);
        assert!(create(params(&exactly_200, NOW + 1, NOW + 2, NOW + 3), NOW).is_ok());
    }

    #[test]
    fn open_only_from_created() {
        let mut m = market_in(MarketStatus::Created);
        open(&mut m, &authority()).unwrap();
        assert_eq!(m.status, MarketStatus::Open);

        for status in ALL_STATUSES.into_iter().filter(|s| *s != MarketStatus::Created) {
            let mut m = market_in(status);
            assert_eq!(
                open(&mut m, &authority()).unwrap_err(),
                ProgramError::InvalidStateTransition,
                "{status}"
            );
            assert_eq!(m.status, status);
        }
    }

    #[test]
    fn non_authority_is_rejected_everywhere() {
        let stranger = Address::new_from_array([9; 32]);
        let mut m = market_in(MarketStatus::Created);
        assert_eq!(open(&mut m, &stranger).unwrap_err(), ProgramError::Unauthorized);
        assert_eq!(cancel(&mut m, &stranger).unwrap_err(), ProgramError::Unauthorized);

        let mut m = market_in(MarketStatus::Open);
        assert_eq!(
            resolve(&mut m, &stranger, 1, NOW + 4000).unwrap_err(),
            ProgramError::Unauthorized
        );
        assert_eq!(
            close_betting(&mut m, &stranger, NOW + 4000).unwrap_err(),
            ProgramError::Unauthorized
        );
    }

    #[test]
    fn resolve_before_betting_end_fails_for_any_outcome() {
        for outcome in 0..=u8::MAX {
            let mut m = market_in(MarketStatus::Open);
            assert_eq!(
                resolve(&mut m, &authority(), outcome, NOW + 3599).unwrap_err(),
                ProgramError::DeadlineNotReached
            );
        }
    }

    #[test]
    fn resolve_from_open_or_closed() {
        for status in [MarketStatus::Open, MarketStatus::BettingClosed] {
            let mut m = market_in(status);
            let outcome = resolve(&mut m, &authority(), 1, NOW + 3600).unwrap();
            assert_eq!(outcome, Outcome::Yes);
            assert_eq!(m.status, MarketStatus::Resolved);
            assert_eq!(m.winning_outcome, Some(Outcome::Yes));
            assert_eq!(m.resolved_at, Some(NOW + 3600));
        }

        let mut m = market_in(MarketStatus::Open);
        assert_eq!(
            resolve(&mut m, &authority(), 2, NOW + 3600).unwrap_err(),
            ProgramError::InvalidOutcome
        );
        let mut m = market_in(MarketStatus::Resolved);
        assert_eq!(
            resolve(&mut m, &authority(), 0, NOW + 3600).unwrap_err(),
            ProgramError::MarketAlreadyResolved
        );
    }

    #[test]
    fn close_betting_waits_for_end() {
        let mut m = market_in(MarketStatus::Open);
        assert_eq!(
            close_betting(&mut m, &authority(), NOW + 100).unwrap_err(),
            ProgramError::DeadlineNotReached
        );
        close_betting(&mut m, &authority(), NOW + 3600).unwrap();
        assert_eq!(m.status, MarketStatus::BettingClosed);
    }

    #[test]
    fn cancel_only_from_created_or_open() {
        for status in ALL_STATUSES {
            let mut m = market_in(status);
            let result = cancel(&mut m, &authority());
            match status {
                MarketStatus::Created | MarketStatus::Open => {
                    assert!(result.is_ok());
                    assert_eq!(m.status, MarketStatus::Cancelled);
                }
                _ => assert_eq!(result.unwrap_err(), ProgramError::InvalidStateTransition),
            }
        }
    }

    #[test]
    fn settle_requires_resolved_and_idle_pool() {
        let mut m = market_in(MarketStatus::Resolved);
        assert_eq!(
            settle(&mut m, &authority(), 1).unwrap_err(),
            ProgramError::ComputationInFlight
        );
        settle(&mut m, &authority(), 0).unwrap();
        assert_eq!(m.status, MarketStatus::Settled);

        let mut m = market_in(MarketStatus::Open);
        assert_eq!(
            settle(&mut m, &authority(), 0).unwrap_err(),
            ProgramError::InvalidStateTransition
        );
    }
}
