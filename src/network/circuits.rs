//! Plaintext versions of the two circuits the cluster evaluates.

use crate::models::Outcome;

/// Running stake totals per side. Only ever stored encrypted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub yes_pool: u64,
    pub no_pool: u64,
}

impl Tally {
    /// Fold one wager in. `None` on overflow.
    pub fn add(self, outcome: Outcome, amount: u64) -> Option<Self> {
        match outcome {
            Outcome::Yes => Some(Self {
                yes_pool: self.yes_pool.checked_add(amount)?,
                ..self
            }),
            Outcome::No => Some(Self {
                no_pool: self.no_pool.checked_add(amount)?,
                ..self
            }),
        }
    }

    fn sides(self, winning: Outcome) -> (u64, u64) {
        match winning {
            Outcome::Yes => (self.yes_pool, self.no_pool),
            Outcome::No => (self.no_pool, self.yes_pool),
        }
    }
}

/// Pari-mutuel payout: a winner gets its stake back plus its pro-rata share
/// of the losing side; a loser gets nothing. With no stake on the winning
/// side the stake is returned as-is.
pub fn payout(outcome: Outcome, stake: u64, winning: Outcome, tally: Tally) -> Option<u64> {
    if outcome != winning {
        return Some(0);
    }
    let (winning_pool, losing_pool) = tally.sides(winning);
    if winning_pool == 0 {
        return Some(stake);
    }
    let share = u128::from(stake) * u128::from(losing_pool) / u128::from(winning_pool);
    stake.checked_add(u64::try_from(share).ok()?)
}
