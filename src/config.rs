//! Configuration management

use crate::error::ArbError;
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub odds_api: OddsApiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub stake: StakeConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    pub alerts: Option<AlertConfig>,
    /// development | production
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Fallback log filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsApiConfig {
    /// The Odds API key
    pub api_key: String,
    /// API endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bookmaker regions (us, uk, eu, au)
    #[serde(default = "default_regions")]
    pub regions: String,
    /// Comma separated market keys
    #[serde(default = "default_markets")]
    pub markets: String,
    #[serde(default = "default_odds_format")]
    pub odds_format: String,
    /// Sport keys to scan; empty scans every active sport
    #[serde(default)]
    pub sports: Vec<String>,
    /// Restrict quotes to these bookmakers (overrides regions)
    #[serde(default)]
    pub bookmakers: Option<Vec<String>>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StakeConfig {
    /// Budget split across the outcomes of each opportunity
    pub total_stake: f64,
    /// Only alert on opportunities at or above this profit percentage
    #[serde(default)]
    pub min_profit_pct: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Seconds between scans in `run` mode
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    /// Run once a day at this UTC wall-clock time instead of on an interval
    #[serde(default)]
    pub daily_run_at: Option<NaiveTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    /// Twilio account SID
    pub account_sid: String,
    /// Twilio auth token
    pub auth_token: String,
    /// Sending phone number
    pub from_number: String,
    #[serde(default = "default_twilio_url")]
    pub api_url: String,
    /// Send each recipient stakes for their own unit; otherwise one shared summary
    #[serde(default = "default_personalized")]
    pub personalized: bool,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Recipient {
    #[serde(default = "default_recipient_name")]
    pub name: String,
    pub phone: String,
    /// Personal stake budget per opportunity
    #[serde(default = "default_unit")]
    pub unit: f64,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "https://api.the-odds-api.com/v4".to_string()
}

fn default_regions() -> String {
    "us".to_string()
}

fn default_markets() -> String {
    "h2h".to_string()
}

fn default_odds_format() -> String {
    "decimal".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_scan_interval_secs() -> u64 {
    86_400 // daily
}

fn default_twilio_url() -> String {
    "https://api.twilio.com/2010-04-01".to_string()
}

fn default_personalized() -> bool {
    true
}

fn default_recipient_name() -> String {
    "Friend".to_string()
}

fn default_unit() -> f64 {
    10.0
}

impl Config {
    /// Load configuration from file, overridden by ODDS_ARB__* environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let name = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("config path is not valid UTF-8: {}", path.display()))?;

        let settings = config::Config::builder()
            .add_source(config::File::with_name(name))
            .add_source(config::Environment::with_prefix("ODDS_ARB").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    /// Load from default locations
    pub fn load_default() -> anyhow::Result<Self> {
        let paths = ["config.toml", "config.yaml", "~/.config/odds-arb/config.toml"];

        for path in paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::load(expanded.as_ref());
            }
        }

        anyhow::bail!("No configuration file found")
    }

    /// Check required values, reporting every problem at once
    pub fn validate(&self) -> Result<(), ArbError> {
        let mut errors = Vec::new();

        if self.odds_api.api_key.trim().is_empty() {
            errors.push("odds_api.api_key is required".to_string());
        }
        if !self.stake.total_stake.is_finite() || self.stake.total_stake <= 0.0 {
            errors.push(format!(
                "stake.total_stake must be positive, got {}",
                self.stake.total_stake
            ));
        }
        if self.scanner.scan_interval_secs == 0 {
            errors.push("scanner.scan_interval_secs must be at least 1".to_string());
        }
        if let Some(alerts) = &self.alerts {
            if alerts.account_sid.is_empty() || alerts.auth_token.is_empty() || alerts.from_number.is_empty() {
                errors.push(
                    "alerts requires account_sid, auth_token and from_number".to_string(),
                );
            }
            for recipient in &alerts.recipients {
                if recipient.phone.trim().is_empty() {
                    errors.push(format!("recipient {} has no phone number", recipient.name));
                }
                if !recipient.unit.is_finite() || recipient.unit <= 0.0 {
                    errors.push(format!(
                        "recipient {} unit must be positive, got {}",
                        recipient.name, recipient.unit
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ArbError::Config(format!(
                "validation failed:\n{}",
                errors
                    .iter()
                    .map(|e| format!("  - {}", e))
                    .collect::<Vec<_>>()
                    .join("\n")
            )))
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "odds_arb.db".to_string(),
        }
    }
}

impl Default for StakeConfig {
    fn default() -> Self {
        Self {
            total_stake: 100.0,
            min_profit_pct: 0.0,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval_secs(),
            daily_run_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        environment = "production"

        [odds_api]
        api_key = "abc123"
        sports = ["basketball_nba", "icehockey_nhl"]
        bookmakers = ["draftkings", "fanduel"]

        [stake]
        total_stake = 250.0
        min_profit_pct = 1.5

        [scanner]
        daily_run_at = "11:00:00"

        [alerts]
        account_sid = "AC123"
        auth_token = "secret"
        from_number = "+15550000000"
        personalized = false

        [[alerts.recipients]]
        name = "Sam"
        phone = "+15551112222"
        unit = 25.0

        [[alerts.recipients]]
        phone = "+15553334444"
    "#;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(SAMPLE).unwrap();

        assert_eq!(config.odds_api.api_key, "abc123");
        assert_eq!(config.odds_api.base_url, "https://api.the-odds-api.com/v4");
        assert_eq!(config.odds_api.markets, "h2h");
        assert_eq!(config.odds_api.sports.len(), 2);
        assert_eq!(config.stake.total_stake, 250.0);
        assert_eq!(config.database.path, "odds_arb.db");
        assert_eq!(config.scanner.scan_interval_secs, 86_400);
        assert_eq!(
            config.scanner.daily_run_at,
            NaiveTime::from_hms_opt(11, 0, 0)
        );
        assert!(config.is_production());

        let alerts = config.alerts.as_ref().unwrap();
        assert!(!alerts.personalized);
        assert_eq!(alerts.recipients[0].unit, 25.0);
        assert_eq!(alerts.recipients[1].name, "Friend");
        assert_eq!(alerts.recipients[1].unit, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config: Config = toml::from_str("[odds_api]\napi_key = \"k\"\n").unwrap();

        assert!(config.alerts.is_none());
        assert!(config.scanner.daily_run_at.is_none());
        assert_eq!(config.stake.total_stake, 100.0);
        assert_eq!(config.environment, "development");
        assert_eq!(config.log_level, "info");
        assert!(!config.is_production());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.odds_api.api_key = String::new();
        config.stake.total_stake = 0.0;
        if let Some(alerts) = config.alerts.as_mut() {
            alerts.auth_token = String::new();
            alerts.recipients[0].phone = String::new();
        }

        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("api_key"));
        assert!(msg.contains("total_stake"));
        assert!(msg.contains("auth_token"));
        assert!(msg.contains("Sam has no phone"));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("odds-arb-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.odds_api.bookmakers.as_ref().unwrap()[1], "fanduel");

        std::fs::remove_file(&path).unwrap();
    }
}
