//! Presentation of scan results
//!
//! Converts full-precision results into rounded, serializable views for
//! JSON output and terminal tables.

use crate::arbitrage::BatchReport;
use crate::types::{round_money, round_to, ArbitrageOpportunity, BestOddsMap, StakePlan};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::Write;

/// Percentages are shown with this many decimals
const PERCENT_DP: u32 = 2;

/// Result of a scan as returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct ArbsResponse {
    pub arbs: Vec<OpportunityView>,
    pub games_analyzed: usize,
    pub opportunities_found: usize,
    pub failures: Vec<FailureView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpportunityView {
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub sport_key: String,
    pub commence_time: DateTime<Utc>,
    pub best_odds: BestOddsMap,
    pub arb_percent: Decimal,
    pub inverse_sum: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stakes: Option<StakePlanView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StakePlanView {
    pub total_stake: Decimal,
    pub guaranteed_return: Decimal,
    pub profit: Decimal,
    pub legs: Vec<StakeLegView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StakeLegView {
    pub outcome: String,
    pub bookmaker: String,
    pub odds: f64,
    pub stake: Decimal,
    pub potential_return: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureView {
    pub event_id: String,
    pub reason: String,
}

impl ArbsResponse {
    pub fn from_report(report: &BatchReport) -> Self {
        let arbs: Vec<OpportunityView> = report
            .opportunities()
            .map(|(opp, plan)| OpportunityView::new(opp, plan))
            .collect();

        Self {
            games_analyzed: report.events_analyzed(),
            opportunities_found: arbs.len(),
            arbs,
            failures: report
                .failures()
                .map(|(event_id, reason)| FailureView {
                    event_id: event_id.to_string(),
                    reason: reason.to_string(),
                })
                .collect(),
        }
    }

    /// Plain-text rendering for the terminal
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "Analyzed {} games, found {} arbitrage opportunities\n",
            self.games_analyzed, self.opportunities_found
        );

        for arb in &self.arbs {
            let _ = writeln!(
                out,
                "\n{} vs {} [{}] {}",
                arb.home_team,
                arb.away_team,
                arb.sport_key,
                arb.commence_time.format("%Y-%m-%d %H:%M UTC")
            );
            let _ = writeln!(out, "  Profit: {}%", arb.arb_percent);

            match &arb.stakes {
                Some(plan) => {
                    for leg in &plan.legs {
                        let _ = writeln!(
                            out,
                            "  {:<24} {:>7.2} @ {:<14} stake ${:>9}  returns ${}",
                            leg.outcome, leg.odds, leg.bookmaker, leg.stake, leg.potential_return
                        );
                    }
                    let _ = writeln!(
                        out,
                        "  Total ${}  guaranteed ${}  profit ${}",
                        plan.total_stake, plan.guaranteed_return, plan.profit
                    );
                }
                None => {
                    for best in arb.best_odds.iter() {
                        let _ = writeln!(out, "  {:<24} {:>7.2} @ {}", best.outcome, best.odds, best.bookmaker);
                    }
                }
            }
        }

        if !self.failures.is_empty() {
            let _ = writeln!(out, "\n{} events failed:", self.failures.len());
            for failure in &self.failures {
                let _ = writeln!(out, "  {}: {}", failure.event_id, failure.reason);
            }
        }

        out
    }
}

impl OpportunityView {
    pub fn new(opp: &ArbitrageOpportunity, plan: Option<&StakePlan>) -> Self {
        Self {
            game_id: opp.event.id.clone(),
            home_team: opp.event.home_team.clone(),
            away_team: opp.event.away_team.clone(),
            sport_key: opp.event.sport_key.clone(),
            commence_time: opp.event.commence_time,
            best_odds: opp.best_odds.clone(),
            arb_percent: round_to(opp.percent(), PERCENT_DP),
            inverse_sum: opp.inverse_sum,
            stakes: plan.map(StakePlanView::from),
        }
    }
}

impl From<&StakePlan> for StakePlanView {
    fn from(plan: &StakePlan) -> Self {
        Self {
            total_stake: round_money(plan.total_stake),
            guaranteed_return: round_money(plan.guaranteed_return()),
            profit: round_money(plan.profit()),
            legs: plan
                .legs
                .iter()
                .map(|leg| StakeLegView {
                    outcome: leg.outcome.clone(),
                    bookmaker: leg.bookmaker.clone(),
                    odds: leg.odds,
                    stake: leg.stake_rounded(),
                    potential_return: leg.return_rounded(),
                })
                .collect(),
        }
    }
}
