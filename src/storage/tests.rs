//! Tests for storage module

#[cfg(test)]
mod tests {
    use super::super::Database;
    use crate::arbitrage::ArbitrageDetector;
    use crate::types::{ArbitrageOpportunity, BestOddsMap, BookmakerQuote, Event, Market, OutcomeOdds};
    use chrono::{DateTime, Duration, Utc};

    fn kickoff() -> DateTime<Utc> {
        "2024-03-01T00:30:00Z".parse().unwrap()
    }

    fn make_event(id: &str) -> Event {
        Event::new(id, kickoff(), "Team X", "Team Y", "basketball_nba")
            .unwrap()
            .with_bookmaker(
                BookmakerQuote::new("fanduel", "FanDuel")
                    .with_market(Market::h2h([("Team X", 2.10), ("Team Y", 1.80)])),
            )
    }

    fn make_opportunity(id: &str, x: f64, y: f64) -> ArbitrageOpportunity {
        let best = BestOddsMap::new(
            OutcomeOdds::new("Team X", x, "fanduel"),
            OutcomeOdds::new("Team Y", y, "betmgm"),
        )
        .unwrap();
        ArbitrageDetector::new()
            .detect(&make_event(id), best)
            .opportunity()
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_read_opportunity() {
        let db = Database::in_memory().await.unwrap();
        let opp = make_opportunity("evt-1", 2.10, 2.05);

        let id = db.save_opportunity(&opp).await.unwrap();
        let stored = db.active_opportunities(10).await.unwrap();

        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
        assert_eq!(stored[0].event_id, "evt-1");
        assert_eq!(stored[0].commence_time, kickoff());
        assert!(stored[0].is_active);
        assert!((stored[0].arb_percent - opp.percent()).abs() < 1e-9);
        assert_eq!(stored[0].best_odds["Team Y"]["bookmaker"], "betmgm");
    }

    #[tokio::test]
    async fn test_active_ordered_by_profit() {
        let db = Database::in_memory().await.unwrap();
        db.save_opportunity(&make_opportunity("small", 2.02, 2.02)).await.unwrap();
        db.save_opportunity(&make_opportunity("large", 2.30, 2.20)).await.unwrap();

        let stored = db.active_opportunities(10).await.unwrap();
        assert_eq!(stored[0].event_id, "large");
        assert_eq!(stored[1].event_id, "small");

        let limited = db.active_opportunities(1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_newer_opportunity_replaces_older() {
        let db = Database::in_memory().await.unwrap();
        db.save_opportunity(&make_opportunity("evt-1", 2.10, 2.05)).await.unwrap();
        let newer = db.save_opportunity(&make_opportunity("evt-1", 2.20, 2.05)).await.unwrap();

        let stored = db.active_opportunities(10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, newer);
    }

    #[tokio::test]
    async fn test_failed_insert_keeps_previous_active() {
        let db = Database::in_memory().await.unwrap();
        let first = db.save_opportunity(&make_opportunity("evt-1", 2.10, 2.05)).await.unwrap();

        sqlx::query(
            "CREATE TRIGGER reject_wide BEFORE INSERT ON arbitrage_opportunities \
             WHEN NEW.inverse_sum < 0.9 BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let result = db.save_opportunity(&make_opportunity("evt-1", 2.30, 2.20)).await;
        assert!(result.is_err());

        let stored = db.active_opportunities(10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, first);
    }

    #[tokio::test]
    async fn test_undecodable_rows_skipped() {
        let db = Database::in_memory().await.unwrap();
        db.save_opportunity(&make_opportunity("good", 2.10, 2.05)).await.unwrap();

        sqlx::query(
            "INSERT INTO arbitrage_opportunities \
             (id, event_id, home_team, away_team, sport_key, best_odds, arb_percent, inverse_sum, commence_time, is_active, created_at) \
             VALUES ('bad', 'bad', 'A', 'B', 'nba', '{}', 50.0, 0.5, 'not-a-time', 1, 'not-a-time')",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let stored = db.active_opportunities(10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].event_id, "good");
    }

    #[tokio::test]
    async fn test_expire_started() {
        let db = Database::in_memory().await.unwrap();
        db.save_opportunity(&make_opportunity("evt-1", 2.10, 2.05)).await.unwrap();

        let before = db.expire_started(kickoff() - Duration::minutes(5)).await.unwrap();
        assert_eq!(before, 0);

        let after = db.expire_started(kickoff() + Duration::minutes(1)).await.unwrap();
        assert_eq!(after, 1);
        assert!(db.active_opportunities(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_event_upserts() {
        let db = Database::in_memory().await.unwrap();
        db.save_event(&make_event("evt-1")).await.unwrap();

        let updated = make_event("evt-1").with_bookmaker(
            BookmakerQuote::new("betmgm", "BetMGM")
                .with_market(Market::h2h([("Team X", 1.70), ("Team Y", 2.25)])),
        );
        db.save_event(&updated).await.unwrap();

        let odds = db.get_event_odds("evt-1").await.unwrap().unwrap();
        assert_eq!(odds["fanduel"]["h2h"]["Team X"], 2.10);
        assert_eq!(odds["betmgm"]["h2h"]["Team Y"], 2.25);
    }

    #[tokio::test]
    async fn test_missing_event_odds() {
        let db = Database::in_memory().await.unwrap();
        assert!(db.get_event_odds("nope").await.unwrap().is_none());
    }

    #[test]
    fn test_opportunity_serialization() {
        let opp = make_opportunity("evt-1", 2.10, 2.05);
        let json = serde_json::to_value(&opp).unwrap();

        assert_eq!(json["event"]["id"], "evt-1");
        assert_eq!(json["best_odds"]["Team X"]["odds"], 2.10);
        assert!(json["margin"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_connect_blocking() {
        let path = std::env::temp_dir().join(format!("odds-arb-{}.db", uuid::Uuid::new_v4()));
        let rt = tokio::runtime::Runtime::new().unwrap();

        let db = rt.block_on(Database::connect(&path)).unwrap();
        let saved = rt.block_on(db.save_opportunity(&make_opportunity("evt-1", 2.10, 2.05)));
        assert!(saved.is_ok());

        drop(db);
        let _ = std::fs::remove_file(&path);
    }
}
