//! SMS notification module
//!
//! Sends arbitrage alerts to configured recipients through Twilio.


use crate::arbitrage::StakeAllocator;
use crate::config::{AlertConfig, Recipient};
use crate::error::{ArbError, Result};
use crate::types::{round_money, ArbitrageOpportunity};
use chrono::NaiveDate;
use reqwest::Client;
use std::fmt::Write;
use tracing::{error, info, warn};

/// Longest message body sent, leaving room under the SMS segment limit
pub const MAX_MESSAGE_LEN: usize = 1500;

/// Twilio SMS notifier
#[derive(Clone)]
pub struct Notifier {
    http: Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    api_url: String,
    recipients: Vec<Recipient>,
    personalized: bool,
    enabled: bool,
}

/// Delivery counts for one round of alerts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendSummary {
    pub sent: usize,
    pub failed: usize,
}

impl Notifier {
    pub fn twilio(config: AlertConfig) -> Self {
        Self {
            http: Client::new(),
            account_sid: config.account_sid,
            auth_token: config.auth_token,
            from_number: config.from_number,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            recipients: config.recipients,
            personalized: config.personalized,
            enabled: true,
        }
    }

    /// Create a disabled notifier (for when alerts are not configured)
    pub fn disabled() -> Self {
        Self {
            http: Client::new(),
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            api_url: String::new(),
            recipients: Vec::new(),
            personalized: false,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    /// Send one SMS
    pub async fn send_sms(&self, to: &str, body: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let url = format!("{}/Accounts/{}/Messages.json", self.api_url, self.account_sid);
        let body = truncate_message(body);

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ArbError::Notification(format!(
                "Twilio returned {} for {}: {}",
                status, to, error_text
            )));
        }

        info!("SMS sent to {}", to);
        Ok(())
    }

    /// Alert every recipient in the configured style
    pub async fn alert(&self, opps: &[ArbitrageOpportunity]) -> Result<SendSummary> {
        if self.personalized {
            self.alert_recipients(opps).await
        } else {
            self.alert_opportunities(opps).await
        }
    }

    /// Send the same opportunity summary to every recipient
    pub async fn alert_opportunities(&self, opps: &[ArbitrageOpportunity]) -> Result<SendSummary> {
        if !self.enabled || opps.is_empty() {
            return Ok(SendSummary::default());
        }

        let body = format_alert(opps);
        let mut summary = SendSummary::default();

        for recipient in &self.recipients {
            match self.send_sms(&recipient.phone, &body).await {
                Ok(()) => summary.sent += 1,
                Err(e) => {
                    error!("Failed to alert {} ({}): {}", recipient.name, recipient.phone, e);
                    summary.failed += 1;
                }
            }
        }

        info!("Alerts complete: {} sent, {} failed", summary.sent, summary.failed);
        Ok(summary)
    }

    /// Send each recipient stakes sized to their own unit
    pub async fn alert_recipients(&self, opps: &[ArbitrageOpportunity]) -> Result<SendSummary> {
        if !self.enabled || opps.is_empty() {
            return Ok(SendSummary::default());
        }

        let today = chrono::Utc::now().date_naive();
        let mut summary = SendSummary::default();

        for recipient in &self.recipients {
            let body = format_recipient_alert(recipient, opps, today);
            match self.send_sms(&recipient.phone, &body).await {
                Ok(()) => summary.sent += 1,
                Err(e) => {
                    error!("Failed to alert {} ({}): {}", recipient.name, recipient.phone, e);
                    summary.failed += 1;
                }
            }
        }

        info!("Personal alerts complete: {} sent, {} failed", summary.sent, summary.failed);
        Ok(summary)
    }
}

/// Numbered summary of opportunities with the best price per outcome
pub fn format_alert(opps: &[ArbitrageOpportunity]) -> String {
    let mut msg = format!("Arbitrage Opportunities ({} found):\n\n", opps.len());

    for (idx, opp) in opps.iter().enumerate() {
        let _ = writeln!(msg, "{}. {}", idx + 1, opp.event.matchup());
        let _ = writeln!(msg, "   Profit: {:.2}%", opp.percent());
        for best in opp.best_odds.iter() {
            let _ = writeln!(msg, "   {}: {:.2} @ {}", best.outcome, best.odds, best.bookmaker);
        }
        msg.push('\n');
    }

    truncate_message(&msg)
}

/// Personal message with a stake plan for the recipient's unit
pub fn format_recipient_alert(
    recipient: &Recipient,
    opps: &[ArbitrageOpportunity],
    date: NaiveDate,
) -> String {
    let allocator = StakeAllocator::new();
    let mut msg = format!(
        "Hi {}, here are your arbs for {}\nUnit size: ${}\n",
        recipient.name,
        date.format("%Y-%m-%d"),
        round_money(recipient.unit)
    );

    if opps.is_empty() {
        msg.push_str("\nNo arbitrage opportunities today.\n");
        return msg;
    }

    for opp in opps {
        let _ = writeln!(msg, "\n{} ({:.2}%)", opp.event.matchup(), opp.percent());
        match allocator.allocate(opp, recipient.unit) {
            Ok(plan) => {
                for leg in &plan.legs {
                    let _ = writeln!(
                        msg,
                        "  {}@{:.2} {}: ${}",
                        leg.outcome,
                        leg.odds,
                        leg.bookmaker,
                        leg.stake_rounded()
                    );
                }
                let _ = writeln!(msg, "  Returns ${}", round_money(plan.guaranteed_return()));
            }
            Err(e) => {
                warn!("Skipping stakes for {} in alert: {}", opp.event.id, e);
            }
        }
    }

    truncate_message(&msg)
}

/// Cut a message to [`MAX_MESSAGE_LEN`] characters, marking the cut with "..."
pub fn truncate_message(msg: &str) -> String {
    if msg.chars().count() <= MAX_MESSAGE_LEN {
        return msg.to_string();
    }

    let kept: String = msg.chars().take(MAX_MESSAGE_LEN - 3).collect();
    format!("{}...", kept)
}
