//! The Odds API client
//!
//! Fetches sports and pre-match odds, then validates the records into events.

use super::{Ingest, OddsSource, RejectedEvent, SourceFailure};
use crate::config::OddsApiConfig;
use crate::error::{ArbError, Result};
use crate::types::{BookmakerQuote, Event, Market, MarketKind, OutcomePrice};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// The Odds API client
pub struct OddsApiClient {
    http: Client,
    config: OddsApiConfig,
    base_url: String,
}

/// A sport as listed by `/sports`
#[derive(Debug, Clone, Deserialize)]
pub struct Sport {
    pub key: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub active: bool,
    /// Futures markets with many outcomes
    #[serde(default)]
    pub has_outrights: bool,
}

/// Event record as returned by `/sports/{sport}/odds`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sport_key: Option<String>,
    #[serde(default)]
    pub commence_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub home_team: Option<String>,
    #[serde(default)]
    pub away_team: Option<String>,
    /// Raw entries, each converted on its own
    #[serde(default)]
    pub bookmakers: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiBookmaker {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub markets: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiMarket {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub outcomes: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiOutcome {
    #[serde(default)]
    pub name: Option<String>,
    /// Kept loose so one bad price does not fail the whole record
    #[serde(default)]
    pub price: Option<Value>,
}

impl OddsApiClient {
    /// Create a new client
    pub fn new(config: OddsApiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config,
        })
    }

    /// List available sports
    pub async fn get_sports(&self) -> Result<Vec<Sport>> {
        let url = format!("{}/sports/", self.base_url);
        info!("Fetching available sports from The Odds API");

        let resp = self
            .http
            .get(&url)
            .query(&[("apiKey", self.config.api_key.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ArbError::Api(format!("sports returned status {} - {}", status, body)));
        }

        let sports: Vec<Sport> = resp.json().await?;
        info!("Fetched {} available sports", sports.len());
        Ok(sports)
    }

    /// Fetch raw odds records for one sport. An unknown sport yields no events.
    pub async fn get_odds(&self, sport_key: &str) -> Result<Vec<Value>> {
        let url = format!("{}/sports/{}/odds/", self.base_url, sport_key);
        info!("Fetching odds for {}", sport_key);

        let resp = self
            .http
            .get(&url)
            .query(&self.odds_query())
            .send()
            .await?;

        if let Some(remaining) = resp.headers().get("x-requests-remaining") {
            debug!("Odds API requests remaining: {:?}", remaining);
        }

        match resp.status() {
            status if status.is_success() => {
                let records: Vec<Value> = resp.json().await?;
                info!("Fetched {} games for {}", records.len(), sport_key);
                Ok(records)
            }
            StatusCode::NOT_FOUND => {
                warn!("Sport {} not found", sport_key);
                Ok(Vec::new())
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(ArbError::Api(format!(
                    "odds for {} returned status {} - {}",
                    sport_key, status, body
                )))
            }
        }
    }

    fn odds_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("apiKey", self.config.api_key.clone()),
            ("markets", self.config.markets.clone()),
            ("oddsFormat", self.config.odds_format.clone()),
            ("dateFormat", "iso".to_string()),
        ];

        match &self.config.bookmakers {
            Some(bookmakers) if !bookmakers.is_empty() => {
                query.push(("bookmakers", bookmakers.join(",")));
            }
            _ => query.push(("regions", self.config.regions.clone())),
        }

        query
    }

    /// Sports to scan: configured list, or every active sport without outrights
    async fn sport_keys(&self) -> Result<Vec<String>> {
        if !self.config.sports.is_empty() {
            return Ok(self.config.sports.clone());
        }

        Ok(self
            .get_sports()
            .await?
            .into_iter()
            .filter(|s| s.active && !s.has_outrights)
            .map(|s| s.key)
            .collect())
    }
}

#[async_trait]
impl OddsSource for OddsApiClient {
    async fn fetch_events(&self) -> Result<Ingest> {
        let sports = self.sport_keys().await?;
        info!("Fetching odds for {} sports", sports.len());

        let mut results = Vec::with_capacity(sports.len());
        for sport in sports {
            let fetched = self.get_odds(&sport).await;
            results.push((sport, fetched));
        }

        collect_sport_results(results)
    }
}

/// Merge per-sport fetch results.
///
/// A failed sport is recorded in `failed_sources`; when every sport failed
/// the whole fetch is an error rather than an empty result.
pub fn collect_sport_results(results: Vec<(String, Result<Vec<Value>>)>) -> Result<Ingest> {
    let attempted = results.len();
    let mut all = Ingest::default();

    for (sport, fetched) in results {
        match fetched {
            Ok(records) => all.extend(ingest(records)),
            Err(e) => {
                warn!("Error fetching odds for {}: {}", sport, e);
                all.failed_sources.push(SourceFailure {
                    source: sport,
                    reason: e.to_string(),
                });
            }
        }
    }

    if attempted > 0 && all.failed_sources.len() == attempted {
        let reasons: Vec<String> = all
            .failed_sources
            .iter()
            .map(|f| format!("{}: {}", f.source, f.reason))
            .collect();
        return Err(ArbError::Api(format!(
            "all {} sports failed - {}",
            attempted,
            reasons.join("; ")
        )));
    }

    Ok(all)
}

/// Validate raw provider records into events.
///
/// A record that cannot form an event is rejected on its own; bookmakers,
/// markets and outcomes missing required fields are dropped with a warning.
pub fn ingest(records: Vec<Value>) -> Ingest {
    let mut out = Ingest::default();

    for (index, record) in records.into_iter().enumerate() {
        let fallback_id = record
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("record-{}", index));

        let parsed = serde_json::from_value::<ApiEvent>(record)
            .map_err(ArbError::from)
            .and_then(ApiEvent::into_event);

        match parsed {
            Ok(event) => out.events.push(event),
            Err(e) => {
                warn!("Rejecting event {}: {}", fallback_id, e);
                out.rejected.push(RejectedEvent {
                    event_id: fallback_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    out
}

impl ApiEvent {
    pub fn into_event(self) -> Result<Event> {
        let id = self.id.unwrap_or_default();
        let commence_time = self
            .commence_time
            .ok_or_else(|| ArbError::InvalidEvent(format!("event {} has no commence_time", id)))?;

        let event = Event::new(
            id,
            commence_time,
            self.home_team.unwrap_or_default(),
            self.away_team.unwrap_or_default(),
            self.sport_key.unwrap_or_default(),
        )?;

        let quotes: Vec<BookmakerQuote> =
            parse_entries::<ApiBookmaker>(self.bookmakers, event.id(), "bookmaker")
                .into_iter()
                .filter_map(|b| b.into_quote(event.id()))
                .collect();

        Ok(event.with_bookmakers(quotes))
    }
}

/// Deserialize each raw entry on its own, dropping the ones that do not fit
fn parse_entries<T: DeserializeOwned>(entries: Option<Vec<Value>>, event_id: &str, what: &str) -> Vec<T> {
    entries
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<T>(entry) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Event {}: dropping malformed {}: {}", event_id, what, e);
                None
            }
        })
        .collect()
}

impl ApiBookmaker {
    fn into_quote(self, event_id: &str) -> Option<BookmakerQuote> {
        let key = match self.key.filter(|k| !k.is_empty()) {
            Some(key) => key,
            None => {
                warn!("Event {}: dropping bookmaker without key", event_id);
                return None;
            }
        };

        let title = self.title.unwrap_or_else(|| key.clone());
        let markets = parse_entries::<ApiMarket>(self.markets, event_id, "market")
            .into_iter()
            .filter_map(|m| m.into_market(event_id, &key))
            .collect();

        Some(BookmakerQuote { key, title, markets })
    }
}

impl ApiMarket {
    fn into_market(self, event_id: &str, bookmaker: &str) -> Option<Market> {
        let kind = MarketKind::from(self.key?.as_str());

        let Some(raw_outcomes) = self.outcomes else {
            warn!("Event {}: dropping {} {} market without outcomes", event_id, bookmaker, kind);
            return None;
        };

        let outcomes = parse_entries::<ApiOutcome>(Some(raw_outcomes), event_id, "outcome")
            .into_iter()
            .filter_map(|o| {
                let name = o.name.filter(|n| !n.is_empty());
                let price = o.price.as_ref().and_then(Value::as_f64);
                match (name, price) {
                    (Some(name), Some(price)) => Some(OutcomePrice { name, price }),
                    (name, _) => {
                        warn!(
                            "Event {}: {} quote for {} has no usable price",
                            event_id,
                            bookmaker,
                            name.as_deref().unwrap_or("<unnamed>")
                        );
                        None
                    }
                }
            })
            .collect();

        Some(Market::new(kind, outcomes))
    }
}
