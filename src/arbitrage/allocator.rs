//! Stake allocation for detected opportunities

use crate::error::{ArbError, Result};
use crate::types::{ArbitrageOpportunity, StakeLeg, StakePlan};
use tracing::debug;

/// Splits a total stake so every outcome pays the same
#[derive(Debug, Clone, Copy, Default)]
pub struct StakeAllocator;

impl StakeAllocator {
    pub fn new() -> Self {
        Self
    }

    /// stake_i = (total / inverse_sum) * (1 / odds_i), so every leg returns
    /// total / inverse_sum. Amounts stay unrounded; see [`StakeLeg::stake_rounded`].
    pub fn allocate(&self, opp: &ArbitrageOpportunity, total_stake: f64) -> Result<StakePlan> {
        if !total_stake.is_finite() || total_stake <= 0.0 {
            return Err(ArbError::DegenerateAllocation(format!(
                "total stake must be positive, got {}",
                total_stake
            )));
        }

        let inverse_sum = opp.inverse_sum;
        if !inverse_sum.is_finite() || inverse_sum <= 0.0 {
            return Err(ArbError::DegenerateAllocation(format!(
                "inverse odds sum must be positive, got {}",
                inverse_sum
            )));
        }

        let payout = total_stake / inverse_sum;
        let mut legs = Vec::with_capacity(opp.best_odds.len());

        for best in opp.best_odds.iter() {
            if !best.odds.is_finite() || best.odds <= 1.0 {
                return Err(ArbError::DegenerateAllocation(format!(
                    "invalid odds {} for {}",
                    best.odds, best.outcome
                )));
            }

            let stake = payout * (1.0 / best.odds);
            legs.push(StakeLeg {
                outcome: best.outcome.clone(),
                bookmaker: best.bookmaker.clone(),
                odds: best.odds,
                stake,
                potential_return: stake * best.odds,
            });
        }

        let plan = StakePlan { total_stake, legs };

        debug!(
            "Calculated bets for {}: total stake ${:.2}, profit ${:.2}",
            opp.event.matchup(),
            total_stake,
            plan.profit()
        );

        Ok(plan)
    }
}
