//! Integration tests for the matchmaker
//!
//! These tests drive the ticket service, matching engine and expiration
//! sweeper together against the in-memory store on a simulated clock:
//! - Matching on `=`, `>` and `<` constraints
//! - Timeout relaxation and expiry
//! - Idempotent passes
//! - Garbage collection of expired tickets
//! - Store failures partway through a pass

mod fixtures;

use futures::future::join_all;
use matchmaker::config::MatchmakingSettings;
use matchmaker::error::MatchmakingError;
use matchmaker::matching::MatchingEngine;
use matchmaker::store::TicketStore;
use matchmaker::sweeper::ExpirationSweeper;
use matchmaker::ticket::TicketService;
use matchmaker::types::{MatchParameter, ParameterOperator, TicketStatus};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use fixtures::{
    base_time, constrained_request, create_test_system, equal_request, league_request,
    seconds_after_base, FaultInjectingStore,
};

fn settings(min: usize, max: usize, timeout_seconds: u64) -> MatchmakingSettings {
    MatchmakingSettings::new(min, max, Duration::from_secs(timeout_seconds))
}

async fn status_of(tickets: &TicketService, player_id: &str) -> TicketStatus {
    tickets.get_ticket(player_id).await.unwrap().status
}

#[tokio::test]
async fn test_equal_constraints_pair_only_compatible_players() {
    let (store, tickets) = create_test_system();
    let engine = MatchingEngine::new(store.clone()).unwrap();

    for (player, league, table) in [
        ("player_a", 1.0, 2.0),
        ("player_b", 7.0, 8.0),
        ("player_c", 7.0, 8.0),
        ("player_d", 7.0, 9.0),
        ("player_e", 3.0, 8.0),
    ] {
        tickets
            .create_ticket_at(equal_request(player, league, table), base_time())
            .await
            .unwrap();
    }

    let sessions = engine
        .run_pass(base_time(), &settings(2, 2, 60))
        .await
        .unwrap();

    assert_eq!(sessions.len(), 1);
    let members: HashSet<_> = sessions[0].player_ids.iter().cloned().collect();
    assert_eq!(
        members,
        HashSet::from(["player_b".to_string(), "player_c".to_string()])
    );

    for player in ["player_b", "player_c"] {
        let ticket = tickets.get_ticket(player).await.unwrap();
        assert_eq!(ticket.status, TicketStatus::Found);
        assert_eq!(ticket.game_session_id, Some(sessions[0].id));
        assert!(!store.is_indexed("league", player).unwrap());
        assert!(!store.is_indexed("table", player).unwrap());
    }
    for player in ["player_a", "player_d", "player_e"] {
        assert_eq!(status_of(&tickets, player).await, TicketStatus::Pending);
    }
}

#[tokio::test]
async fn test_greater_than_constraints_fill_session() {
    let (store, tickets) = create_test_system();
    let engine = MatchingEngine::new(store).unwrap();

    tickets
        .create_ticket_at(
            constrained_request(
                "seeker",
                vec![
                    MatchParameter::new("league", ParameterOperator::GreaterThan, 5.0),
                    MatchParameter::new("table", ParameterOperator::GreaterThan, 6.0),
                ],
                6.0,
                7.0,
            ),
            base_time(),
        )
        .await
        .unwrap();
    for (player, score) in [("high_1", 10.0), ("high_2", 11.0), ("high_3", 12.0)] {
        tickets
            .create_ticket_at(equal_request(player, score, score), base_time())
            .await
            .unwrap();
    }

    let sessions = engine
        .run_pass(base_time(), &settings(2, 4, 60))
        .await
        .unwrap();

    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].size(), 4);
    assert_eq!(sessions[0].player_ids[0], "seeker");
    for player in ["seeker", "high_1", "high_2", "high_3"] {
        assert!(sessions[0].contains(player));
        assert_eq!(status_of(&tickets, player).await, TicketStatus::Found);
    }
}

#[tokio::test]
async fn test_smaller_than_constraints_fill_session() {
    let (store, tickets) = create_test_system();
    let engine = MatchingEngine::new(store).unwrap();

    tickets
        .create_ticket_at(
            constrained_request(
                "seeker",
                vec![
                    MatchParameter::new("league", ParameterOperator::SmallerThan, 10.0),
                    MatchParameter::new("table", ParameterOperator::SmallerThan, 11.0),
                ],
                9.0,
                10.0,
            ),
            base_time(),
        )
        .await
        .unwrap();
    tickets
        .create_ticket_at(equal_request("low_1", 5.0, 5.0), base_time())
        .await
        .unwrap();
    tickets
        .create_ticket_at(equal_request("low_2", 6.0, 6.0), base_time())
        .await
        .unwrap();

    let sessions = engine
        .run_pass(base_time(), &settings(2, 3, 60))
        .await
        .unwrap();

    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].size(), 3);
    for player in ["seeker", "low_1", "low_2"] {
        assert!(sessions[0].contains(player));
    }
}

#[tokio::test]
async fn test_second_pass_forms_no_sessions() {
    let (store, tickets) = create_test_system();
    let engine = MatchingEngine::new(store).unwrap();

    tickets
        .create_ticket_at(equal_request("player_a", 7.0, 8.0), base_time())
        .await
        .unwrap();
    tickets
        .create_ticket_at(equal_request("player_b", 7.0, 8.0), base_time())
        .await
        .unwrap();

    let first = engine
        .run_pass(base_time(), &settings(2, 2, 60))
        .await
        .unwrap();
    let second = engine
        .run_pass(seconds_after_base(1), &settings(2, 2, 60))
        .await
        .unwrap();

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());

    let stats = engine.get_stats().await.unwrap();
    assert_eq!(stats.passes_completed, 2);
    assert_eq!(stats.sessions_created, 1);
    assert_eq!(stats.players_matched, 2);
}

#[tokio::test]
async fn test_lone_ticket_expires_without_relaxation() {
    let (store, tickets) = create_test_system();
    let engine = MatchingEngine::new(store.clone()).unwrap();
    let settings = settings(2, 2, 3);

    tickets
        .create_ticket_at(equal_request("loner", 7.0, 8.0), base_time())
        .await
        .unwrap();

    let immediate = engine.run_pass(base_time(), &settings).await.unwrap();
    assert!(immediate.is_empty());
    assert_eq!(status_of(&tickets, "loner").await, TicketStatus::Pending);

    let later = engine
        .run_pass(seconds_after_base(4), &settings)
        .await
        .unwrap();
    assert!(later.is_empty());
    assert_eq!(status_of(&tickets, "loner").await, TicketStatus::Expired);
    assert!(!store.is_indexed("league", "loner").unwrap());

    let stats = engine.get_stats().await.unwrap();
    assert_eq!(stats.tickets_expired, 1);
}

#[tokio::test]
async fn test_timed_out_ticket_accepts_smaller_session() {
    let (store, tickets) = create_test_system();
    let engine = MatchingEngine::new(store).unwrap();
    let settings = settings(2, 3, 3);

    tickets
        .create_ticket_at(league_request("early", 7.0), base_time())
        .await
        .unwrap();
    tickets
        .create_ticket_at(league_request("fresh", 7.0), seconds_after_base(10))
        .await
        .unwrap();

    let sessions = engine
        .run_pass(seconds_after_base(10), &settings)
        .await
        .unwrap();

    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].size(), 2);
    assert!(sessions[0].contains("early"));
    assert!(sessions[0].contains("fresh"));

    let stats = engine.get_stats().await.unwrap();
    assert_eq!(stats.relaxed_sessions, 1);
}

#[tokio::test]
async fn test_timed_out_ticket_expires_when_group_overshoots_target() {
    let (store, tickets) = create_test_system();
    let engine = MatchingEngine::new(store).unwrap();

    for player in ["player_a", "player_b", "player_c"] {
        tickets
            .create_ticket_at(equal_request(player, 7.0, 8.0), base_time())
            .await
            .unwrap();
    }

    let sessions = engine
        .run_pass(seconds_after_base(10), &settings(2, 3, 3))
        .await
        .unwrap();

    assert_eq!(status_of(&tickets, "player_a").await, TicketStatus::Expired);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].size(), 2);
    assert!(!sessions[0].contains("player_a"));
    assert_eq!(status_of(&tickets, "player_b").await, TicketStatus::Found);
    assert_eq!(status_of(&tickets, "player_c").await, TicketStatus::Found);
}

#[tokio::test]
async fn test_fresh_tickets_wait_for_full_session() {
    let (store, tickets) = create_test_system();
    let engine = MatchingEngine::new(store).unwrap();

    tickets
        .create_ticket_at(league_request("player_a", 7.0), base_time())
        .await
        .unwrap();
    tickets
        .create_ticket_at(league_request("player_b", 7.0), base_time())
        .await
        .unwrap();

    let sessions = engine
        .run_pass(seconds_after_base(1), &settings(2, 3, 60))
        .await
        .unwrap();

    assert!(sessions.is_empty());
    assert_eq!(status_of(&tickets, "player_a").await, TicketStatus::Pending);
    assert_eq!(status_of(&tickets, "player_b").await, TicketStatus::Pending);
}

#[tokio::test]
async fn test_expired_ticket_is_never_matched_later() {
    let (store, tickets) = create_test_system();
    let engine = MatchingEngine::new(store).unwrap();
    let settings = settings(2, 2, 3);

    tickets
        .create_ticket_at(league_request("stale", 7.0), base_time())
        .await
        .unwrap();
    engine
        .run_pass(seconds_after_base(10), &settings)
        .await
        .unwrap();
    assert_eq!(status_of(&tickets, "stale").await, TicketStatus::Expired);

    tickets
        .create_ticket_at(league_request("newcomer", 7.0), seconds_after_base(10))
        .await
        .unwrap();
    let sessions = engine
        .run_pass(seconds_after_base(11), &settings)
        .await
        .unwrap();

    assert!(sessions.is_empty());
    assert_eq!(status_of(&tickets, "stale").await, TicketStatus::Expired);
    assert_eq!(status_of(&tickets, "newcomer").await, TicketStatus::Pending);
}

#[tokio::test]
async fn test_sweeper_removes_only_expired_tickets_past_grace() {
    let (store, tickets) = create_test_system();
    let engine = MatchingEngine::new(store.clone()).unwrap();
    let sweeper = ExpirationSweeper::new(store.clone()).unwrap();
    let grace = Duration::from_secs(300);

    tickets
        .create_ticket_at(league_request("lapsed", 1.0), base_time())
        .await
        .unwrap();
    tickets
        .create_ticket_at(league_request("paired_a", 7.0), base_time())
        .await
        .unwrap();
    tickets
        .create_ticket_at(league_request("paired_b", 7.0), base_time())
        .await
        .unwrap();

    engine
        .run_pass(seconds_after_base(120), &settings(2, 2, 60))
        .await
        .unwrap();
    assert_eq!(status_of(&tickets, "lapsed").await, TicketStatus::Expired);

    tickets
        .create_ticket_at(league_request("waiting", 3.0), seconds_after_base(200))
        .await
        .unwrap();

    // Exactly at the grace boundary nothing is old enough yet
    let removed = sweeper
        .run_pass(seconds_after_base(300), grace, 2)
        .await
        .unwrap();
    assert_eq!(removed, 0);

    let removed = sweeper
        .run_pass(seconds_after_base(301), grace, 2)
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let err = tickets.get_ticket("lapsed").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MatchmakingError>(),
        Some(MatchmakingError::TicketNotFound { .. })
    ));
    assert_eq!(status_of(&tickets, "paired_a").await, TicketStatus::Found);
    assert_eq!(status_of(&tickets, "paired_b").await, TicketStatus::Found);
    assert_eq!(status_of(&tickets, "waiting").await, TicketStatus::Pending);
    assert_eq!(store.ticket_count().unwrap(), 3);
}

#[tokio::test]
async fn test_create_then_get_round_trips_parameters() {
    let (_store, tickets) = create_test_system();
    let request = equal_request("player_a", 7.0, 8.0);

    let created = tickets.create_ticket(request.clone()).await.unwrap();
    let fetched = tickets.get_ticket("player_a").await.unwrap();

    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.status, TicketStatus::Pending);
    assert_eq!(fetched.game_session_id, None);
    assert_eq!(fetched.match_parameters, request.match_parameters);
    assert_eq!(fetched.player_parameters, request.player_parameters);
}

#[tokio::test]
async fn test_concurrent_ticket_creation() {
    let (store, tickets) = create_test_system();
    let tickets = Arc::new(tickets);
    let engine = MatchingEngine::new(store.clone()).unwrap();

    let handles = (0..20).map(|i| {
        let tickets = tickets.clone();
        async move {
            tickets
                .create_ticket_at(league_request(&format!("player_{:02}", i), 7.0), base_time())
                .await
        }
    });

    let results = join_all(handles).await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(store.ticket_count().unwrap(), 20);
    assert_eq!(store.index_len("league").unwrap(), 20);

    let sessions = engine
        .run_pass(base_time(), &settings(2, 2, 60))
        .await
        .unwrap();

    assert_eq!(sessions.len(), 10);
    let matched: HashSet<_> = sessions
        .iter()
        .flat_map(|s| s.player_ids.iter().cloned())
        .collect();
    assert_eq!(matched.len(), 20);
    assert_eq!(store.index_len("league").unwrap(), 0);
}

#[tokio::test]
async fn test_store_failure_aborts_pass_and_keeps_earlier_sessions() {
    let (inner, tickets) = create_test_system();
    // The first session's two updates succeed, the next one fails
    let store = Arc::new(FaultInjectingStore::new(inner.clone(), 2));
    let engine = MatchingEngine::new(store.clone()).unwrap();
    let settings = settings(2, 2, 60);

    for player in ["player_a", "player_b", "player_c", "player_d"] {
        tickets
            .create_ticket_at(league_request(player, 7.0), base_time())
            .await
            .unwrap();
    }

    let err = engine.run_pass(base_time(), &settings).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MatchmakingError>(),
        Some(MatchmakingError::StoreUnavailable { .. })
    ));

    assert_eq!(status_of(&tickets, "player_a").await, TicketStatus::Found);
    assert_eq!(status_of(&tickets, "player_b").await, TicketStatus::Found);
    assert_eq!(status_of(&tickets, "player_c").await, TicketStatus::Pending);
    assert_eq!(status_of(&tickets, "player_d").await, TicketStatus::Pending);

    let stats = engine.get_stats().await.unwrap();
    assert_eq!(stats.passes_failed, 1);
    assert!(!stats.last_pass_succeeded());

    store.heal();
    let sessions = engine.run_pass(base_time(), &settings).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].contains("player_c"));
    assert!(sessions[0].contains("player_d"));
    assert!(engine.get_stats().await.unwrap().last_pass_succeeded());
}

#[tokio::test]
async fn test_unreadable_record_aborts_pass() {
    let (store, tickets) = create_test_system();
    let engine = MatchingEngine::new(store.clone()).unwrap();

    tickets
        .create_ticket_at(league_request("player_a", 7.0), base_time())
        .await
        .unwrap();
    store.insert_raw("corrupt", "{not json").unwrap();

    let err = engine
        .run_pass(base_time(), &settings(2, 2, 60))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MatchmakingError>(),
        Some(MatchmakingError::MalformedRecord { .. })
    ));
}

#[tokio::test]
async fn test_deleted_ticket_leaves_no_index_entries() {
    let (store, tickets) = create_test_system();

    tickets
        .create_ticket_at(equal_request("player_a", 7.0, 8.0), base_time())
        .await
        .unwrap();
    store.delete_ticket("player_a").await.unwrap();
    store.delete_ticket("player_a").await.unwrap();

    assert_eq!(store.ticket_count().unwrap(), 0);
    assert_eq!(store.index_len("league").unwrap(), 0);
    assert_eq!(store.index_len("table").unwrap(), 0);
}
