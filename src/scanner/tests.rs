//! Tests for scanner module

#[cfg(test)]
mod tests {
    use super::super::{alertable, next_daily_run, next_delay, ScanStats, Scanner};
    use crate::config::ScannerConfig;
    use chrono::{DateTime, NaiveTime, Utc};
    use std::time::Duration;
    use crate::arbitrage::EventOutcome;
    use crate::client::{Ingest, MockOddsSource, RejectedEvent, SourceFailure};
    use crate::error::ArbError;
    use crate::types::{BookmakerQuote, Event, Market};

    fn make_event(id: &str, x: f64, y: f64) -> Event {
        Event::new(
            id,
            "2024-03-01T00:30:00Z".parse().unwrap(),
            "Team X",
            "Team Y",
            "basketball_nba",
        )
        .unwrap()
        .with_bookmaker(
            BookmakerQuote::new("fanduel", "FanDuel")
                .with_market(Market::h2h([("Team X", x), ("Team Y", 1.50)])),
        )
        .with_bookmaker(
            BookmakerQuote::new("betmgm", "BetMGM")
                .with_market(Market::h2h([("Team X", 1.50), ("Team Y", y)])),
        )
    }

    fn sample_ingest() -> Ingest {
        Ingest {
            events: vec![
                make_event("small", 2.02, 2.02),
                make_event("none", 1.90, 1.90),
                make_event("large", 2.30, 2.20),
            ],
            rejected: vec![RejectedEvent {
                event_id: "broken".to_string(),
                reason: "event broken has no commence_time".to_string(),
            }],
            failed_sources: Vec::new(),
        }
    }

    fn scanner_with(ingest: Ingest) -> Scanner<MockOddsSource> {
        let mut source = MockOddsSource::new();
        source
            .expect_fetch_events()
            .returning(move || Ok(ingest.clone()));
        Scanner::new(source)
    }

    #[tokio::test]
    async fn test_scan_reports_every_event() {
        let scanner = scanner_with(sample_ingest());
        let report = scanner.scan(Some(100.0)).await.unwrap();

        assert_eq!(report.events_analyzed(), 4);
        assert_eq!(report.opportunity_count(), 2);
        assert!(matches!(
            report.reports[1].outcome,
            EventOutcome::NoOpportunity { .. }
        ));

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures, vec![("broken", "event broken has no commence_time")]);
    }

    #[tokio::test]
    async fn test_failed_sources_reported() {
        let mut ingest = sample_ingest();
        ingest.failed_sources.push(SourceFailure {
            source: "icehockey_nhl".to_string(),
            reason: "API error: status 500".to_string(),
        });

        let report = scanner_with(ingest).scan(None).await.unwrap();

        assert_eq!(report.events_analyzed(), 5);
        let failed: Vec<&str> = report.failures().map(|(id, _)| id).collect();
        assert_eq!(failed, vec!["broken", "icehockey_nhl"]);
    }

    #[tokio::test]
    async fn test_source_error_is_not_empty_report() {
        let mut source = MockOddsSource::new();
        source
            .expect_fetch_events()
            .times(1)
            .returning(|| Err(ArbError::Api("status 401".to_string())));

        let scanner = Scanner::new(source);
        let result = scanner.scan(None).await;

        assert!(matches!(result, Err(ArbError::Api(_))));
        assert_eq!(scanner.stats().await, ScanStats::default());
    }

    #[tokio::test]
    async fn test_stats_accumulate() {
        let scanner = scanner_with(sample_ingest());
        scanner.scan(None).await.unwrap();
        scanner.scan(None).await.unwrap();

        let stats = scanner.stats().await;
        assert_eq!(stats.total_scans, 2);
        assert_eq!(stats.events_analyzed, 8);
        assert_eq!(stats.opportunities_found, 4);
        assert_eq!(stats.failures, 2);
    }

    #[test]
    fn test_alertable_filters_and_sorts() {
        let scanner = scanner_with(sample_ingest());
        let report = tokio_test::block_on(scanner.scan(None)).unwrap();

        let all = alertable(&report, 0.0);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].event.id, "large");
        assert_eq!(all[1].event.id, "small");

        let strong = alertable(&report, 2.0);
        assert_eq!(strong.len(), 1);
        assert_eq!(strong[0].event.id, "large");
    }

    #[test]
    fn test_empty_source() {
        let scanner = scanner_with(Ingest::default());
        let report = tokio_test::block_on(scanner.scan(Some(50.0))).unwrap();

        assert_eq!(report.events_analyzed(), 0);
        assert!(!report.has_failures());
        assert!(alertable(&report, 0.0).is_empty());
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_next_daily_run_later_today() {
        let run_at = NaiveTime::from_hms_opt(11, 0, 0).unwrap();
        assert_eq!(
            next_daily_run(at("2024-03-01T08:15:00Z"), run_at),
            at("2024-03-01T11:00:00Z")
        );
    }

    #[test]
    fn test_next_daily_run_rolls_to_tomorrow() {
        let run_at = NaiveTime::from_hms_opt(11, 0, 0).unwrap();
        assert_eq!(
            next_daily_run(at("2024-03-01T11:00:00Z"), run_at),
            at("2024-03-02T11:00:00Z")
        );
        assert_eq!(
            next_daily_run(at("2024-03-31T23:59:00Z"), run_at),
            at("2024-04-01T11:00:00Z")
        );
    }

    #[test]
    fn test_next_delay_interval_mode() {
        let config = ScannerConfig {
            scan_interval_secs: 600,
            daily_run_at: None,
        };
        let now = at("2024-03-01T08:00:00Z");

        assert_eq!(next_delay(&config, now, true), Duration::ZERO);
        assert_eq!(next_delay(&config, now, false), Duration::from_secs(600));
    }

    #[test]
    fn test_next_delay_daily_mode() {
        let config = ScannerConfig {
            scan_interval_secs: 600,
            daily_run_at: NaiveTime::from_hms_opt(11, 0, 0),
        };
        let now = at("2024-03-01T10:30:00Z");

        assert_eq!(next_delay(&config, now, true), Duration::from_secs(1800));
        assert_eq!(next_delay(&config, now, false), Duration::from_secs(1800));
    }
}
