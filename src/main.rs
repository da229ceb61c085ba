//! Odds Arbitrage Scanner
//!
//! Scans bookmaker odds for two-outcome arbitrage and alerts on finds.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use odds_arb::{
    arbitrage::{ArbitragePipeline, EventOutcome},
    client::{FileSource, OddsApiClient, OddsSource},
    config::Config,
    notify::Notifier,
    report::ArbsResponse,
    scanner::{alertable, next_delay, Scanner},
    storage::Database,
    types::{BookmakerQuote, Event, Market},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "odds-arb")]
#[command(about = "Sports betting arbitrage scanner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan once and print opportunities
    Scan {
        /// Read events from a JSON file instead of the API
        #[arg(short, long)]
        file: Option<String>,
        /// Total stake to split across each opportunity
        #[arg(short, long)]
        stake: Option<f64>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
        /// Persist events and opportunities
        #[arg(long)]
        save: bool,
        /// Send SMS alerts for opportunities found
        #[arg(long)]
        alert: bool,
    },
    /// Scan periodically, persisting and alerting each cycle
    Run {
        /// Log alerts instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// List sports offered by the odds API
    Sports,
    /// Check two decimal odds for arbitrage
    Calc {
        /// Decimal odds, given twice
        #[arg(long = "odds", required = true, num_args = 1)]
        odds: Vec<f64>,
        #[arg(short, long, default_value = "100")]
        stake: f64,
    },
    /// Show stored active opportunities
    Active {
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Calc { .. } => None,
        Commands::Scan { file: Some(_), save: false, alert: false, .. } => Config::load(&cli.config).ok(),
        _ => Some(load_config(&cli.config)?),
    };

    let log_level = config.as_ref().map_or("info", |c| c.log_level.as_str());
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    match cli.command {
        Commands::Scan { file, stake, json, save, alert } => {
            scan_once(config, file, stake, json, save, alert).await
        }
        Commands::Run { dry_run } => run_scanner(required(config)?, dry_run).await,
        Commands::Sports => show_sports(required(config)?).await,
        Commands::Calc { odds, stake } => calc(&odds, stake),
        Commands::Active { limit } => show_active(required(config)?, limit).await,
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    let config = Config::load(path).with_context(|| format!("loading config from {}", path))?;
    config.validate()?;
    Ok(config)
}

fn required(config: Option<Config>) -> anyhow::Result<Config> {
    config.context("this command needs a configuration file")
}

async fn open_database(config: &Config) -> anyhow::Result<Database> {
    let path = shellexpand::tilde(&config.database.path);
    Ok(Database::connect(path.as_ref()).await?)
}

fn notifier(config: &Config) -> Notifier {
    match &config.alerts {
        Some(alerts) => Notifier::twilio(alerts.clone()),
        None => Notifier::disabled(),
    }
}

async fn scan_once(
    config: Option<Config>,
    file: Option<String>,
    stake: Option<f64>,
    json: bool,
    save: bool,
    alert: bool,
) -> anyhow::Result<()> {
    let total_stake = stake.or(config.as_ref().map(|c| c.stake.total_stake));

    let output = match file {
        Some(path) => Scanner::new(FileSource::new(path)).scan_batch(total_stake).await?,
        None => {
            let config = required(config.clone())?;
            Scanner::new(OddsApiClient::new(config.odds_api)?)
                .scan_batch(total_stake)
                .await?
        }
    };
    let report = output.report;

    if save || alert {
        let config = required(config)?;

        if save {
            let db = open_database(&config).await?;
            for event in &output.events {
                db.save_event(event).await?;
            }
            for (opp, _) in report.opportunities() {
                db.save_opportunity(opp).await?;
            }
            tracing::info!(
                "Saved {} events and {} opportunities",
                output.events.len(),
                report.opportunity_count()
            );
        }

        if alert {
            let opps = alertable(&report, config.stake.min_profit_pct);
            notifier(&config).alert(&opps).await?;
        }
    }

    let response = ArbsResponse::from_report(&report);
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", response.render_text());
    }

    Ok(())
}

async fn run_scanner(config: Config, dry_run: bool) -> anyhow::Result<()> {
    tracing::info!("Starting arbitrage scanner");

    if dry_run {
        tracing::warn!("Running in DRY RUN mode - alerts will be logged, not sent");
    }

    let db = open_database(&config).await?;
    let notifier = notifier(&config);
    let source = OddsApiClient::new(config.odds_api.clone())?;
    let scanner = Scanner::new(source);

    let mut first = true;

    loop {
        let delay = next_delay(&config.scanner, Utc::now(), first);
        first = false;
        tracing::info!("Next scan in {} seconds", delay.as_secs());

        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                if let Err(e) = run_cycle(&config, &scanner, &db, &notifier, dry_run).await {
                    tracing::error!("Scan cycle failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    let stats = scanner.stats().await;
    tracing::info!(
        "Completed {} scans: {} events, {} opportunities, {} failures",
        stats.total_scans,
        stats.events_analyzed,
        stats.opportunities_found,
        stats.failures
    );

    Ok(())
}

async fn run_cycle<S: OddsSource>(
    config: &Config,
    scanner: &Scanner<S>,
    db: &Database,
    notifier: &Notifier,
    dry_run: bool,
) -> anyhow::Result<()> {
    let expired = db.expire_started(Utc::now()).await?;
    if expired > 0 {
        tracing::info!("Expired {} opportunities for started events", expired);
    }

    let output = scanner.scan_batch(Some(config.stake.total_stake)).await?;
    let report = output.report;

    for event in &output.events {
        db.save_event(event).await?;
    }
    for (opp, _) in report.opportunities() {
        db.save_opportunity(opp).await?;
    }

    let opps = alertable(&report, config.stake.min_profit_pct);
    if opps.is_empty() {
        tracing::info!("No arbitrage opportunities this cycle");
        return Ok(());
    }

    if dry_run {
        tracing::info!("[DRY RUN] Would alert:\n{}", odds_arb::notify::format_alert(&opps));
        return Ok(());
    }

    let summary = notifier.alert(&opps).await?;
    tracing::info!("Alerted {} recipients ({} failed)", summary.sent, summary.failed);

    Ok(())
}

async fn show_sports(config: Config) -> anyhow::Result<()> {
    let client = OddsApiClient::new(config.odds_api)?;
    let sports = client.get_sports().await?;

    println!("\n{:<40} {:<24} {:>7} {:>10}", "Key", "Group", "Active", "Outrights");
    println!("{}", "-".repeat(84));

    for sport in sports {
        println!(
            "{:<40} {:<24} {:>7} {:>10}",
            sport.key, sport.group, sport.active, sport.has_outrights
        );
    }

    Ok(())
}

fn calc(odds: &[f64], stake: f64) -> anyhow::Result<()> {
    let [a, b] = odds else {
        anyhow::bail!("expected exactly two --odds values, got {}", odds.len());
    };

    let event = Event::new("manual", Utc::now(), "Outcome A", "Outcome B", "manual")?
        .with_bookmaker(
            BookmakerQuote::new("manual", "Manual")
                .with_market(Market::h2h([("Outcome A", *a), ("Outcome B", *b)])),
        );

    match ArbitragePipeline::new().evaluate(&event, Some(stake)) {
        EventOutcome::Opportunity { opportunity, plan } => {
            println!("Arbitrage: {:.2}% guaranteed profit", opportunity.percent());
            if let Some(plan) = plan {
                for leg in &plan.legs {
                    println!(
                        "  {} @ {:.2}: stake ${} returns ${}",
                        leg.outcome,
                        leg.odds,
                        leg.stake_rounded(),
                        leg.return_rounded()
                    );
                }
            }
        }
        EventOutcome::NoOpportunity { inverse_sum } => {
            println!("No arbitrage: inverse sum {:.4} >= 1", inverse_sum);
        }
        EventOutcome::NotEligible(reason) => println!("Not evaluable: {}", reason),
        EventOutcome::Failed { reason } => anyhow::bail!(reason),
    }

    Ok(())
}

async fn show_active(config: Config, limit: i64) -> anyhow::Result<()> {
    let db = open_database(&config).await?;
    db.expire_started(Utc::now()).await?;
    let opps = db.active_opportunities(limit).await?;

    if opps.is_empty() {
        println!("No active opportunities");
        return Ok(());
    }

    println!("\n{:<48} {:>8} {:<20}", "Game", "Profit", "Starts");
    println!("{}", "-".repeat(78));

    for opp in opps {
        println!(
            "{:<48} {:>7.2}% {:<20}",
            format!("{} vs {}", opp.home_team, opp.away_team),
            opp.arb_percent,
            opp.commence_time.format("%Y-%m-%d %H:%M UTC")
        );
    }

    Ok(())
}
