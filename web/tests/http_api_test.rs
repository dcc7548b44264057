//! HTTP API integration tests.
//!
//! Runs the full router over the in-memory stack with automatic resolution
//! disabled, so every round transition is driven by the requests below.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::http::StatusCode;
use axum_test::TestServer;
use duel_arena_core::{QuestionBuilder, SessionStore};
use duel_arena_runtime::{Arena, ArenaConfig};
use duel_arena_testing::ArenaFixture;
use duel_arena_web::{AppState, build_router};
use serde_json::{Value, json};
use std::sync::Arc;

async fn server() -> (TestServer, ArenaFixture) {
    let fixture = ArenaFixture::builder().build().await;
    let arena = Arena::new(
        fixture.store.clone(),
        fixture.cards.clone(),
        fixture.bus.clone(),
        Arc::new(fixture.clock.clone()),
        ArenaConfig::default().with_auto_resolve(false),
    );
    let server = TestServer::new(build_router(AppState::new(arena))).expect("Failed to build test server");
    (server, fixture)
}

/// Correct choice of the live round, computed the way the server does.
async fn correct_choice(fixture: &ArenaFixture) -> u8 {
    let round = fixture
        .store
        .latest_round(fixture.session.id)
        .await
        .unwrap()
        .expect("a round");
    QuestionBuilder::new()
        .build_for(&round, &fixture.deck)
        .correct_index
        .expect("answerable question")
}

#[tokio::test]
async fn health_is_ok() {
    let (server, _fixture) = server().await;
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "ok");
}

#[tokio::test]
async fn a_round_from_start_to_resolve() {
    let (server, fixture) = server().await;
    let ann = fixture.players[0].id;

    let started = server.post("/api/duels/duel42/start").await;
    started.assert_status_ok();
    let started: Value = started.json();
    assert_eq!(started["round"]["roundNo"], 1);
    assert_eq!(started["round"]["state"], "LIVE");
    assert_eq!(started["question"]["choices"].as_array().unwrap().len(), 4);
    assert!(started["question"].get("correctIndex").is_none());

    let next: Value = server.post("/api/duels/DUEL42/next").await.json();
    assert_eq!(next["status"], "already-live");
    assert_eq!(next["round"]["roundNo"], 1);

    let correct = correct_choice(&fixture).await;
    let answered = server
        .post("/api/duels/DUEL42/answer")
        .json(&json!({"playerId": ann, "choiceIndex": correct, "ms": 1830.9}))
        .await;
    answered.assert_status_ok();
    let answered: Value = answered.json();
    assert_eq!(answered["duplicate"], false);
    assert_eq!(answered["answer"]["isCorrect"], true);
    assert_eq!(answered["answer"]["responseMs"], 1830);

    let replay: Value = server
        .post("/api/duels/DUEL42/answer")
        .json(&json!({"playerId": ann, "choiceIndex": (correct + 1) % 4, "ms": 5}))
        .await
        .json();
    assert_eq!(replay["duplicate"], true);
    assert_eq!(replay["answer"]["choiceIndex"], correct);

    let live: Value = server.get("/api/duels/DUEL42/snapshot").await.json();
    assert_eq!(live["answeredCount"], 1);
    assert_eq!(live["totalPlayers"], 2);
    assert!(live["round"].get("correctIndex").is_none());

    let resolved: Value = server.post("/api/duels/DUEL42/resolve").await.json();
    assert_eq!(resolved["status"], "resolved");
    assert_eq!(resolved["correctIndex"], correct);

    let again: Value = server.post("/api/duels/DUEL42/resolve").await.json();
    assert_eq!(again["status"], "nothing-live");

    let done: Value = server.get("/api/duels/DUEL42/snapshot").await.json();
    assert_eq!(done["round"]["state"], "RESOLVED");
    assert_eq!(done["round"]["correctIndex"], correct);
    assert_eq!(done["scoreboard"][0]["playerId"], json!(ann));
    assert_eq!(done["scoreboard"][0]["correct"], 1);
    assert_eq!(fixture.bus.count_of("round-resolve"), 2);
}

#[tokio::test]
async fn unknown_code_is_not_found() {
    let (server, _fixture) = server().await;
    for path in ["/api/duels/NOPE/start", "/api/duels/NOPE/resolve"] {
        let response = server.post(path).await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["code"], "NOT_FOUND");
    }
    server
        .get("/api/duels/NOPE/snapshot")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn start_while_live_is_a_conflict() {
    let (server, _fixture) = server().await;
    server.post("/api/duels/DUEL42/start").await.assert_status_ok();

    let response = server.post("/api/duels/DUEL42/start").await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_STATE");
}

#[tokio::test]
async fn malformed_answers_are_rejected_before_lookup() {
    let (server, fixture) = server().await;
    let ann = fixture.players[0].id;

    // Unknown code, yet validation wins
    let response = server
        .post("/api/duels/NOPE/answer")
        .json(&json!({"playerId": ann, "choiceIndex": 7}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");

    server
        .post("/api/duels/NOPE/answer")
        .json(&json!({"choiceIndex": 1}))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    server
        .post("/api/duels/DUEL42/answer")
        .json(&json!({"playerId": "not-a-uuid", "choiceIndex": 1}))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(fixture.store.round_count(fixture.session.id).await, 0);
}

#[tokio::test]
async fn answering_without_a_live_round_is_a_conflict() {
    let (server, fixture) = server().await;
    let body = json!({"playerId": fixture.players[1].id, "choiceIndex": 0});

    server
        .post("/api/duels/DUEL42/answer")
        .json(&body)
        .await
        .assert_status(StatusCode::CONFLICT);

    server.post("/api/duels/DUEL42/start").await.assert_status_ok();
    server.post("/api/duels/DUEL42/resolve").await.assert_status_ok();

    server
        .post("/api/duels/DUEL42/answer")
        .json(&body)
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn non_numeric_ms_is_recorded_as_zero() {
    let (server, fixture) = server().await;
    server.post("/api/duels/DUEL42/start").await.assert_status_ok();

    let answered: Value = server
        .post("/api/duels/DUEL42/answer")
        .json(&json!({"playerId": fixture.players[1].id, "choiceIndex": 3, "ms": "soon"}))
        .await
        .json();
    assert_eq!(answered["answer"]["responseMs"], 0);
}

#[tokio::test]
async fn stranger_is_not_found() {
    let (server, _fixture) = server().await;
    server.post("/api/duels/DUEL42/start").await.assert_status_ok();

    let response = server
        .post("/api/duels/DUEL42/answer")
        .json(&json!({"playerId": duel_arena_core::PlayerId::new(), "choiceIndex": 0}))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}
