//! Core types for events, odds, opportunities and stake plans

use crate::error::{ArbError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use tracing::warn;

/// Decimal places used for presented monetary values
pub const MONEY_DP: u32 = 2;

/// Round a monetary amount for presentation (banker's rounding)
pub fn round_money(value: f64) -> Decimal {
    round_to(value, MONEY_DP)
}

/// Round to `dp` decimals, saturating values `Decimal` cannot hold
pub fn round_to(value: f64, dp: u32) -> Decimal {
    match Decimal::try_from(value) {
        Ok(d) => d.round_dp(dp),
        Err(_) if value.is_nan() => {
            warn!("Cannot present NaN, showing 0");
            Decimal::ZERO
        }
        Err(_) if value > 0.0 => {
            warn!("{} exceeds decimal range, saturating", value);
            Decimal::MAX
        }
        Err(_) => {
            warn!("{} exceeds decimal range, saturating", value);
            Decimal::MIN
        }
    }
}

/// Market type tag as reported by the odds provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MarketKind {
    /// Head-to-head (moneyline), one outcome per competitor
    H2h,
    Spreads,
    Totals,
    Other(String),
}

impl From<&str> for MarketKind {
    fn from(key: &str) -> Self {
        match key {
            "h2h" => MarketKind::H2h,
            "spreads" => MarketKind::Spreads,
            "totals" => MarketKind::Totals,
            other => MarketKind::Other(other.to_string()),
        }
    }
}

impl From<String> for MarketKind {
    fn from(key: String) -> Self {
        MarketKind::from(key.as_str())
    }
}

impl From<MarketKind> for String {
    fn from(kind: MarketKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketKind::H2h => write!(f, "h2h"),
            MarketKind::Spreads => write!(f, "spreads"),
            MarketKind::Totals => write!(f, "totals"),
            MarketKind::Other(key) => write!(f, "{}", key),
        }
    }
}

/// One priced outcome inside a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomePrice {
    pub name: String,
    /// Decimal odds
    pub price: f64,
}

/// A bookmaker's market for an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub kind: MarketKind,
    pub outcomes: Vec<OutcomePrice>,
}

impl Market {
    pub fn new(kind: MarketKind, outcomes: Vec<OutcomePrice>) -> Self {
        Self { kind, outcomes }
    }

    /// Build a head-to-head market from (label, odds) pairs
    pub fn h2h<'a, I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        Self {
            kind: MarketKind::H2h,
            outcomes: outcomes
                .into_iter()
                .map(|(name, price)| OutcomePrice {
                    name: name.to_string(),
                    price,
                })
                .collect(),
        }
    }

    pub fn is_head_to_head(&self) -> bool {
        self.kind == MarketKind::H2h
    }
}

/// All markets quoted by one bookmaker for an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmakerQuote {
    /// Bookmaker identifier (e.g. "draftkings")
    pub key: String,
    /// Display name
    pub title: String,
    pub markets: Vec<Market>,
}

impl BookmakerQuote {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            markets: Vec::new(),
        }
    }

    pub fn with_market(mut self, market: Market) -> Self {
        self.markets.push(market);
        self
    }
}

/// A sporting event with its bookmaker quotes.
///
/// Built through [`Event::new`], which rejects empty identifiers and
/// competitor names, so downstream code never re-checks them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    id: String,
    commence_time: DateTime<Utc>,
    home_team: String,
    away_team: String,
    sport_key: String,
    bookmakers: Vec<BookmakerQuote>,
}

impl Event {
    pub fn new(
        id: impl Into<String>,
        commence_time: DateTime<Utc>,
        home_team: impl Into<String>,
        away_team: impl Into<String>,
        sport_key: impl Into<String>,
    ) -> Result<Self> {
        let id = id.into();
        let home_team = home_team.into();
        let away_team = away_team.into();
        let sport_key = sport_key.into();

        if id.trim().is_empty() {
            return Err(ArbError::InvalidEvent("event id is empty".to_string()));
        }
        if home_team.trim().is_empty() || away_team.trim().is_empty() {
            return Err(ArbError::InvalidEvent(format!(
                "event {} is missing a competitor name",
                id
            )));
        }
        if sport_key.trim().is_empty() {
            return Err(ArbError::InvalidEvent(format!(
                "event {} has no sport key",
                id
            )));
        }

        Ok(Self {
            id,
            commence_time,
            home_team,
            away_team,
            sport_key,
            bookmakers: Vec::new(),
        })
    }

    pub fn with_bookmaker(mut self, quote: BookmakerQuote) -> Self {
        self.bookmakers.push(quote);
        self
    }

    pub fn with_bookmakers(mut self, quotes: Vec<BookmakerQuote>) -> Self {
        self.bookmakers.extend(quotes);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn commence_time(&self) -> DateTime<Utc> {
        self.commence_time
    }

    pub fn home_team(&self) -> &str {
        &self.home_team
    }

    pub fn away_team(&self) -> &str {
        &self.away_team
    }

    pub fn sport_key(&self) -> &str {
        &self.sport_key
    }

    pub fn bookmakers(&self) -> &[BookmakerQuote] {
        &self.bookmakers
    }

    /// "Home vs Away"
    pub fn matchup(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }

    pub fn summary(&self) -> EventSummary {
        EventSummary {
            id: self.id.clone(),
            home_team: self.home_team.clone(),
            away_team: self.away_team.clone(),
            sport_key: self.sport_key.clone(),
            commence_time: self.commence_time,
        }
    }
}

/// Identifying fields of an event, carried by derived values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub sport_key: String,
    pub commence_time: DateTime<Utc>,
}

impl EventSummary {
    pub fn matchup(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }
}

/// Best-known odds for one outcome and the bookmaker offering them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeOdds {
    pub outcome: String,
    pub odds: f64,
    pub bookmaker: String,
}

impl OutcomeOdds {
    pub fn new(outcome: impl Into<String>, odds: f64, bookmaker: impl Into<String>) -> Self {
        Self {
            outcome: outcome.into(),
            odds,
            bookmaker: bookmaker.into(),
        }
    }

    /// Label must be non-empty and odds finite and above 1.0
    pub fn validate(&self) -> Result<()> {
        if self.outcome.trim().is_empty() {
            return Err(ArbError::InvalidOdds(format!(
                "empty outcome label from {}",
                self.bookmaker
            )));
        }
        if !self.odds.is_finite() || self.odds <= 1.0 {
            return Err(ArbError::InvalidOdds(format!(
                "{} for {} from {}",
                self.odds, self.outcome, self.bookmaker
            )));
        }
        Ok(())
    }

    pub fn implied_probability(&self) -> f64 {
        1.0 / self.odds
    }
}

/// Best odds per outcome for a two-outcome market.
///
/// Always holds exactly two entries with distinct labels and valid odds.
#[derive(Debug, Clone, PartialEq)]
pub struct BestOddsMap {
    entries: [OutcomeOdds; 2],
}

impl BestOddsMap {
    pub fn new(first: OutcomeOdds, second: OutcomeOdds) -> Result<Self> {
        first.validate()?;
        second.validate()?;
        if first.outcome == second.outcome {
            return Err(ArbError::InvalidOdds(format!(
                "duplicate outcome label '{}'",
                first.outcome
            )));
        }
        Ok(Self {
            entries: [first, second],
        })
    }

    pub fn get(&self, outcome: &str) -> Option<&OutcomeOdds> {
        self.entries.iter().find(|e| e.outcome == outcome)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutcomeOdds> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Sum of 1/odds over both outcomes, full precision
    pub fn inverse_sum(&self) -> f64 {
        self.entries.iter().map(OutcomeOdds::implied_probability).sum()
    }
}

impl Serialize for BestOddsMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Best<'a> {
            bookmaker: &'a str,
            odds: f64,
        }

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(
                &entry.outcome,
                &Best {
                    bookmaker: &entry.bookmaker,
                    odds: entry.odds,
                },
            )?;
        }
        map.end()
    }
}

/// A detected arbitrage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrageOpportunity {
    pub event: EventSummary,
    pub best_odds: BestOddsMap,
    /// Σ 1/odds, always < 1
    pub inverse_sum: f64,
    /// 1 - inverse_sum
    pub margin: f64,
    pub detected_at: DateTime<Utc>,
}

impl ArbitrageOpportunity {
    /// Guaranteed profit as a percentage of total stake
    pub fn percent(&self) -> f64 {
        self.margin * 100.0
    }
}

/// Stake on one outcome of a plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeLeg {
    pub outcome: String,
    pub bookmaker: String,
    pub odds: f64,
    pub stake: f64,
    pub potential_return: f64,
}

impl StakeLeg {
    pub fn stake_rounded(&self) -> Decimal {
        round_money(self.stake)
    }

    pub fn return_rounded(&self) -> Decimal {
        round_money(self.potential_return)
    }
}

/// Per-outcome stakes that equalize payout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakePlan {
    pub total_stake: f64,
    pub legs: Vec<StakeLeg>,
}

impl StakePlan {
    pub fn get(&self, outcome: &str) -> Option<&StakeLeg> {
        self.legs.iter().find(|l| l.outcome == outcome)
    }

    pub fn total_staked(&self) -> f64 {
        self.legs.iter().map(|l| l.stake).sum()
    }

    /// Smallest payout across outcomes
    pub fn guaranteed_return(&self) -> f64 {
        self.legs
            .iter()
            .map(|l| l.potential_return)
            .fold(f64::INFINITY, f64::min)
    }

    pub fn profit(&self) -> f64 {
        self.guaranteed_return() - self.total_stake
    }

    /// Sum of the rounded stakes, which can differ from `total_stake` by
    /// up to one cent per leg
    pub fn total_staked_rounded(&self) -> Decimal {
        self.legs.iter().map(StakeLeg::stake_rounded).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn kickoff() -> DateTime<Utc> {
        "2024-03-01T00:30:00Z".parse().unwrap()
    }

    #[test]
    fn test_market_kind_from_key() {
        assert_eq!(MarketKind::from("h2h"), MarketKind::H2h);
        assert_eq!(MarketKind::from("spreads"), MarketKind::Spreads);
        assert_eq!(
            MarketKind::from("player_points"),
            MarketKind::Other("player_points".to_string())
        );
        assert_eq!(MarketKind::Other("h2h_lay".into()).to_string(), "h2h_lay");
    }

    #[test]
    fn test_market_kind_serde() {
        let json = serde_json::to_string(&MarketKind::H2h).unwrap();
        assert_eq!(json, "\"h2h\"");
        let kind: MarketKind = serde_json::from_str("\"totals\"").unwrap();
        assert_eq!(kind, MarketKind::Totals);
    }

    #[test]
    fn test_event_requires_id() {
        let err = Event::new("", kickoff(), "Lakers", "Celtics", "basketball_nba").unwrap_err();
        assert!(matches!(err, ArbError::InvalidEvent(_)));
    }

    #[test]
    fn test_event_requires_competitors() {
        let err = Event::new("e1", kickoff(), "Lakers", "  ", "basketball_nba").unwrap_err();
        assert!(err.to_string().contains("competitor"));
    }

    #[test]
    fn test_event_with_no_quotes_is_valid() {
        let event = Event::new("e1", kickoff(), "Lakers", "Celtics", "basketball_nba").unwrap();
        assert!(event.bookmakers().is_empty());
        assert_eq!(event.matchup(), "Lakers vs Celtics");
        assert_eq!(event.summary().id, "e1");
    }

    #[test]
    fn test_outcome_odds_validation() {
        assert!(OutcomeOdds::new("Lakers", 2.1, "fanduel").validate().is_ok());
        assert!(OutcomeOdds::new("Lakers", 1.0, "fanduel").validate().is_err());
        assert!(OutcomeOdds::new("Lakers", 0.5, "fanduel").validate().is_err());
        assert!(OutcomeOdds::new("Lakers", f64::NAN, "fanduel").validate().is_err());
        assert!(OutcomeOdds::new("Lakers", f64::INFINITY, "fanduel").validate().is_err());
        assert!(OutcomeOdds::new("", 2.0, "fanduel").validate().is_err());
    }

    #[test]
    fn test_best_odds_map_rejects_duplicate_labels() {
        let a = OutcomeOdds::new("Lakers", 2.1, "fanduel");
        let b = OutcomeOdds::new("Lakers", 2.2, "betmgm");
        assert!(BestOddsMap::new(a, b).is_err());
    }

    #[test]
    fn test_best_odds_map_lookup() {
        let map = BestOddsMap::new(
            OutcomeOdds::new("Lakers", 2.1, "fanduel"),
            OutcomeOdds::new("Celtics", 2.05, "betmgm"),
        )
        .unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("Celtics").unwrap().bookmaker, "betmgm");
        assert!(map.get("Heat").is_none());
        assert!((map.inverse_sum() - (1.0 / 2.1 + 1.0 / 2.05)).abs() < 1e-12);
    }

    #[test]
    fn test_best_odds_map_serializes_as_map() {
        let map = BestOddsMap::new(
            OutcomeOdds::new("Lakers", 2.1, "fanduel"),
            OutcomeOdds::new("Celtics", 2.05, "betmgm"),
        )
        .unwrap();

        let value = serde_json::to_value(&map).unwrap();
        assert_eq!(value["Lakers"]["bookmaker"], "fanduel");
        assert_eq!(value["Celtics"]["odds"], 2.05);
    }

    #[test]
    fn test_round_money() {
        assert_eq!(round_money(49.397590), dec!(49.40));
        assert_eq!(round_money(103.734939), dec!(103.73));
        assert_eq!(round_money(f64::NAN), Decimal::ZERO);
    }

    #[test]
    fn test_round_money_saturates() {
        assert_eq!(round_money(f64::INFINITY), Decimal::MAX);
        assert_eq!(round_money(1e40), Decimal::MAX);
        assert_eq!(round_money(f64::NEG_INFINITY), Decimal::MIN);
        assert_eq!(round_money(-1e40), Decimal::MIN);
        assert_eq!(round_to(3.14159, 3), dec!(3.142));
    }
}
