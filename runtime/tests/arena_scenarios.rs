//! End-to-end behaviour of the arena services over in-memory collaborators.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use duel_arena_core::environment::Clock;
use duel_arena_core::store::StoreFuture;
use duel_arena_core::{
    ArenaError, ArenaEvent, Card, CardRepository, JoinCode, PlayerId, RoundState, SessionStatus,
    SessionStore, SetId, StoreError, Topic,
};
use duel_arena_runtime::{AnswerRequest, Arena, ArenaConfig, NextOutcome, ResolveOutcome};
use duel_arena_testing::{ArenaFixture, InMemoryCardRepository, RecordingEventBus};
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn manual() -> ArenaConfig {
    ArenaConfig::default().with_auto_resolve(false)
}

fn arena(fixture: &ArenaFixture, config: ArenaConfig) -> Arena {
    Arena::new(
        fixture.store.clone(),
        fixture.cards.clone(),
        fixture.bus.clone(),
        Arc::new(fixture.clock.clone()),
        config,
    )
}

fn answer(player_id: PlayerId, choice_index: i64) -> AnswerRequest {
    AnswerRequest {
        player_id,
        choice_index,
        response_ms: Some(1250.7),
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn scenario_a_first_round_targets_first_card() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());

    let started = arena.start(fixture.code()).await.unwrap();
    assert_eq!(started.round.round_no, 1);
    assert_eq!(started.round.state, RoundState::Live);
    assert_eq!(started.round.question_card_id, fixture.card("A").unwrap().id);
    assert_eq!(started.round.timer_sec, 20);
    assert_eq!(started.question.prompt, "A");

    let mut choices = started.question.choices.clone();
    assert!(choices.contains(&"A-def".to_string()));
    choices.sort();
    choices.dedup();
    assert_eq!(choices.len(), 4);

    let resolved = arena.resolve(fixture.code()).await.unwrap();
    let ResolveOutcome::Resolved { correct_index, .. } = resolved else {
        panic!("expected the live round to resolve");
    };
    let correct = usize::from(correct_index.unwrap());
    assert_eq!(started.question.choices[correct], "A-def");
}

#[tokio::test]
async fn scenario_b_second_answer_returns_the_first() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());
    let started = arena.start(fixture.code()).await.unwrap();
    let ann = fixture.players[0].id;

    let first = arena.answer(fixture.code(), answer(ann, 1)).await.unwrap();
    let second = arena.answer(fixture.code(), answer(ann, 2)).await.unwrap();

    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(second.answer, first.answer);
    assert_eq!(second.answer.choice_index, 1);
    assert_eq!(first.answer.response_ms, 1250);
    assert_eq!(fixture.store.answer_count(started.round.id).await, 1);
    assert_eq!(fixture.bus.count_of("answer"), 2, "one answer event on each topic");
}

#[tokio::test]
async fn scenario_c_two_card_set_pads_choices() {
    let fixture = ArenaFixture::builder()
        .cards(&[("A", "A-def"), ("B", "B-def")])
        .build()
        .await;
    let arena = arena(&fixture, manual());

    let started = arena.start(fixture.code()).await.unwrap();
    let choices = &started.question.choices;
    assert_eq!(choices.len(), 4);
    assert_eq!(choices.iter().filter(|c| *c == "A-def").count(), 3);
    assert_eq!(choices.iter().filter(|c| *c == "B-def").count(), 1);
}

#[tokio::test]
async fn scenario_d_resolve_without_rounds_is_a_quiet_success() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());

    let outcome = arena.resolve(fixture.code()).await.unwrap();
    assert_eq!(outcome, ResolveOutcome::NothingLive);
    assert!(fixture.bus.published().is_empty());
    assert_eq!(fixture.store.round_count(fixture.session.id).await, 0);
}

// ============================================================================
// Round lifecycle
// ============================================================================

#[tokio::test]
async fn start_publishes_host_notice_and_round_start() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());
    let started = arena.start(fixture.code()).await.unwrap();

    let id_topic = Topic::session(fixture.session.id);
    let code_topic = Topic::code(fixture.code());

    let on_id = fixture.bus.events_on(id_topic.as_str());
    assert_eq!(on_id.len(), 2);
    assert_eq!(
        on_id[0],
        ArenaEvent::Start {
            round_no: 1,
            round_id: started.round.id,
            question_card_id: started.round.question_card_id,
        }
    );

    let on_code = fixture.bus.events_on(code_topic.as_str());
    assert_eq!(on_code.len(), 1, "the card id never reaches the public topic");
    assert_eq!(on_code[0].event_type(), "round-start");
    let json = serde_json::to_string(&on_code[0]).unwrap();
    assert!(!json.contains("correctIndex"));
    assert!(!json.contains(&started.round.question_card_id.to_string()));
}

#[tokio::test]
async fn next_while_live_changes_nothing() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());

    let first = arena.next(fixture.code()).await.unwrap();
    assert!(matches!(first, NextOutcome::Started(_)));
    fixture.bus.clear();

    let second = arena.next(fixture.code()).await.unwrap();
    assert!(matches!(second, NextOutcome::AlreadyLive { .. }));
    assert_eq!(second.round(), first.round());
    assert_eq!(fixture.store.round_count(fixture.session.id).await, 1);
    assert!(fixture.bus.published().is_empty());
}

#[tokio::test]
async fn next_after_resolve_opens_following_round() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());

    arena.next(fixture.code()).await.unwrap();
    arena.resolve(fixture.code()).await.unwrap();
    let second = arena.next(fixture.code()).await.unwrap();

    assert!(matches!(second, NextOutcome::Started(_)));
    assert_eq!(second.round().round_no, 2);
    assert_eq!(second.round().question_card_id, fixture.card("B").unwrap().id);
}

#[tokio::test]
async fn start_while_live_is_invalid_state() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());
    arena.start(fixture.code()).await.unwrap();

    let err = arena.start(fixture.code()).await.unwrap_err();
    assert!(matches!(err, ArenaError::InvalidState(_)));
    assert_eq!(fixture.store.round_count(fixture.session.id).await, 1);
}

#[tokio::test]
async fn start_requires_running_session() {
    let fixture = ArenaFixture::builder()
        .status(SessionStatus::Lobby)
        .build()
        .await;
    let arena = arena(&fixture, manual());

    let err = arena.start(fixture.code()).await.unwrap_err();
    assert!(matches!(err, ArenaError::InvalidState(ref m) if m.contains("LOBBY")));
}

#[tokio::test]
async fn start_with_empty_set_is_invalid_state() {
    let fixture = ArenaFixture::builder().cards(&[]).build().await;
    let arena = arena(&fixture, manual());

    let err = arena.start(fixture.code()).await.unwrap_err();
    assert!(matches!(err, ArenaError::InvalidState(ref m) if m == "study set has no cards"));
}

#[tokio::test]
async fn resolve_twice_broadcasts_once() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());
    arena.start(fixture.code()).await.unwrap();
    fixture.clock.advance(chrono::Duration::seconds(12));

    let first = arena.resolve(fixture.code()).await.unwrap();
    let second = arena.resolve(fixture.code()).await.unwrap();

    let ResolveOutcome::Resolved { round, .. } = first else {
        panic!("first resolve must change state");
    };
    assert_eq!(round.state, RoundState::Resolved);
    assert_eq!(round.ended_at, Some(fixture.clock.now()));
    assert_eq!(second, ResolveOutcome::NothingLive);
    assert_eq!(fixture.bus.count_of("round-resolve"), 2, "one per topic, first call only");
}

#[tokio::test]
async fn cards_cycle_least_used_first() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());

    let mut targets = Vec::new();
    for _ in 0..6 {
        let started = arena.start(fixture.code()).await.unwrap();
        targets.push(started.question.prompt);
        arena.resolve(fixture.code()).await.unwrap();
    }
    assert_eq!(targets, ["A", "B", "C", "D", "E", "A"]);
}

#[tokio::test]
async fn unknown_code_is_not_found() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());
    let code: JoinCode = "NOPE".parse().unwrap();

    assert!(matches!(arena.start(&code).await, Err(ArenaError::NotFound { .. })));
    assert!(matches!(arena.resolve(&code).await, Err(ArenaError::NotFound { .. })));
    assert!(matches!(arena.snapshot(&code).await, Err(ArenaError::NotFound { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_next_calls_create_one_round() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let arena = arena.clone();
            let code = fixture.code().clone();
            tokio::spawn(async move { arena.next(&code).await })
        })
        .collect();

    let mut started = 0;
    for handle in handles {
        if matches!(handle.await.unwrap().unwrap(), NextOutcome::Started(_)) {
            started += 1;
        }
    }
    assert_eq!(started, 1);
    assert_eq!(fixture.store.round_count(fixture.session.id).await, 1);
    assert_eq!(fixture.store.live_round_count(fixture.session.id).await, 1);
}

// ============================================================================
// Answers
// ============================================================================

#[tokio::test]
async fn answer_is_scored_by_the_server() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());
    let started = arena.start(fixture.code()).await.unwrap();
    let correct = started
        .question
        .choices
        .iter()
        .position(|c| c == "A-def")
        .unwrap();
    let wrong = (correct + 1) % 4;

    let ann = arena
        .answer(fixture.code(), answer(fixture.players[0].id, i64::try_from(correct).unwrap()))
        .await
        .unwrap();
    let bob = arena
        .answer(fixture.code(), answer(fixture.players[1].id, i64::try_from(wrong).unwrap()))
        .await
        .unwrap();

    assert!(ann.answer.is_correct);
    assert!(!bob.answer.is_correct);
}

#[tokio::test]
async fn answer_validation_happens_before_lookup() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());
    let unknown: JoinCode = "GHOST".parse().unwrap();

    let err = arena.answer(&unknown, answer(PlayerId::new(), 4)).await.unwrap_err();
    assert!(matches!(err, ArenaError::Validation(_)));
    let err = arena.answer(&unknown, answer(PlayerId::new(), -1)).await.unwrap_err();
    assert!(matches!(err, ArenaError::Validation(_)));
}

#[tokio::test]
async fn answer_without_rounds_or_after_resolve_is_invalid_state() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());
    let ann = fixture.players[0].id;

    let err = arena.answer(fixture.code(), answer(ann, 0)).await.unwrap_err();
    assert!(matches!(err, ArenaError::InvalidState(_)));

    arena.start(fixture.code()).await.unwrap();
    arena.resolve(fixture.code()).await.unwrap();
    let err = arena.answer(fixture.code(), answer(ann, 0)).await.unwrap_err();
    assert!(matches!(err, ArenaError::InvalidState(_)));
}

#[tokio::test]
async fn answer_from_stranger_is_not_found() {
    let fixture = ArenaFixture::builder().build().await;
    let other = ArenaFixture::builder().code("OTHER").build().await;
    let arena = arena(&fixture, manual());
    arena.start(fixture.code()).await.unwrap();

    for stranger in [PlayerId::new(), other.players[0].id] {
        let err = arena.answer(fixture.code(), answer(stranger, 0)).await.unwrap_err();
        assert!(matches!(err, ArenaError::NotFound { resource: "player", .. }));
    }
}

#[tokio::test]
async fn missing_or_negative_response_time_is_zero() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());
    arena.start(fixture.code()).await.unwrap();

    let request = |player_id, response_ms| AnswerRequest {
        player_id,
        choice_index: 0,
        response_ms,
    };
    let ann = arena
        .answer(fixture.code(), request(fixture.players[0].id, None))
        .await
        .unwrap();
    let bob = arena
        .answer(fixture.code(), request(fixture.players[1].id, Some(-40.0)))
        .await
        .unwrap();
    assert_eq!(ann.answer.response_ms, 0);
    assert_eq!(bob.answer.response_ms, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_keep_first_write() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());
    let started = arena.start(fixture.code()).await.unwrap();
    let ann = fixture.players[0].id;

    let handles: Vec<_> = (0..4_i64)
        .cycle()
        .take(12)
        .map(|choice| {
            let arena = arena.clone();
            let code = fixture.code().clone();
            tokio::spawn(async move { arena.answer(&code, answer(ann, choice)).await })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }
    let fresh: Vec<_> = outcomes.iter().filter(|o| !o.duplicate).collect();
    assert_eq!(fresh.len(), 1);
    assert!(outcomes.iter().all(|o| o.answer == fresh[0].answer));
    assert_eq!(fixture.store.answer_count(started.round.id).await, 1);
}

// ============================================================================
// Snapshots
// ============================================================================

#[tokio::test]
async fn snapshot_hides_key_until_resolved() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());

    let empty = arena.snapshot(fixture.code()).await.unwrap();
    assert!(empty.round.is_none());
    assert_eq!(empty.total_players, 2);
    assert_eq!(empty.answered_count, 0);

    let started = arena.start(fixture.code()).await.unwrap();
    arena
        .answer(fixture.code(), answer(fixture.players[0].id, 0))
        .await
        .unwrap();

    let live = arena.snapshot(fixture.code()).await.unwrap();
    let live_round = live.round.unwrap();
    assert_eq!(live_round.correct_index, None);
    assert_eq!(live_round.question, started.question);
    assert_eq!(live.answered_count, 1);

    let ResolveOutcome::Resolved { correct_index, .. } = arena.resolve(fixture.code()).await.unwrap() else {
        panic!("round should resolve");
    };
    let resolved = arena.snapshot(fixture.code()).await.unwrap();
    let resolved_round = resolved.round.unwrap();
    assert_eq!(resolved_round.state, RoundState::Resolved);
    assert_eq!(resolved_round.correct_index, correct_index);
    assert_eq!(resolved_round.question, started.question);
}

#[tokio::test]
async fn snapshot_works_without_any_events() {
    let fixture = ArenaFixture::builder()
        .bus(RecordingEventBus::failing())
        .build()
        .await;
    let arena = arena(&fixture, manual());

    // Every publish fails; the operations still succeed
    arena.start(fixture.code()).await.unwrap();
    arena
        .answer(fixture.code(), answer(fixture.players[1].id, 3))
        .await
        .unwrap();

    let snapshot = arena.snapshot(fixture.code()).await.unwrap();
    assert_eq!(snapshot.round.unwrap().round_no, 1);
    assert_eq!(snapshot.answered_count, 1);
    let bob_line = snapshot
        .scoreboard
        .iter()
        .find(|l| l.display_name == "bob")
        .unwrap();
    assert_eq!(bob_line.answered, 1);
}

#[tokio::test]
async fn snapshot_by_id_matches_snapshot_by_code() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());
    arena.start(fixture.code()).await.unwrap();

    let by_code = arena.snapshot(fixture.code()).await.unwrap();
    let by_id = arena
        .snapshots()
        .snapshot_by_id(fixture.session.id)
        .await
        .unwrap();
    assert_eq!(by_code, by_id);
}

// ============================================================================
// Live channel and timers
// ============================================================================

#[tokio::test]
async fn subscribers_receive_public_events() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, manual());
    let mut events = arena.subscribe(fixture.code()).await.unwrap();

    arena.start(fixture.code()).await.unwrap();
    arena.resolve(fixture.code()).await.unwrap();

    let first = events.next().await.unwrap().unwrap();
    let second = events.next().await.unwrap().unwrap();
    assert_eq!(first.event_type(), "round-start");
    assert_eq!(second.event_type(), "round-resolve");
}

#[tokio::test(start_paused = true)]
async fn timer_resolves_only_its_own_round() {
    let fixture = ArenaFixture::builder().build().await;
    let arena = arena(&fixture, ArenaConfig::default());

    let first = arena.start(fixture.code()).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    arena.resolve(fixture.code()).await.unwrap();
    let second = arena.next(fixture.code()).await.unwrap();

    // Round 1's timer fires at t=20 and must leave round 2 alone
    tokio::time::sleep(std::time::Duration::from_secs(16)).await;
    let round_two = fixture.store.latest_round(fixture.session.id).await.unwrap().unwrap();
    assert_eq!(round_two.id, second.round().id);
    assert_eq!(round_two.state, RoundState::Live);
    assert_ne!(round_two.id, first.round.id);

    // Round 2's timer fires at t=25
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    tokio::task::yield_now().await;
    let round_two = fixture.store.find_round(second.round().id).await.unwrap().unwrap();
    assert_eq!(round_two.state, RoundState::Resolved);
    assert_eq!(fixture.bus.count_of("round-resolve"), 4);
}

/// Card repository that fails exactly one read, the `fail_on`-th (1-based).
struct UnreliableCards {
    inner: Arc<InMemoryCardRepository>,
    reads: AtomicUsize,
    fail_on: usize,
}

impl CardRepository for UnreliableCards {
    fn cards_for_set(&self, set_id: SetId) -> StoreFuture<'_, Vec<Card>> {
        Box::pin(async move {
            let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            if read == self.fail_on {
                return Err(StoreError::Database("connection reset".to_string()));
            }
            self.inner.cards_for_set(set_id).await
        })
    }
}

#[tokio::test]
async fn failed_card_read_leaves_round_live_for_retry() {
    let fixture = ArenaFixture::builder().build().await;
    let cards = Arc::new(UnreliableCards {
        inner: fixture.cards.clone(),
        reads: AtomicUsize::new(0),
        fail_on: 2,
    });
    let arena = Arena::new(
        fixture.store.clone(),
        cards,
        fixture.bus.clone(),
        Arc::new(fixture.clock.clone()),
        manual(),
    );

    let started = arena.start(fixture.code()).await.unwrap();
    let failed = arena.resolve(fixture.code()).await;
    assert!(matches!(failed, Err(ArenaError::Storage(_))));

    let round = fixture.store.find_round(started.round.id).await.unwrap().unwrap();
    assert_eq!(round.state, RoundState::Live);
    assert_eq!(fixture.bus.count_of("round-resolve"), 0);

    let retried = arena.resolve(fixture.code()).await.unwrap();
    assert!(retried.is_resolved());
    // Session and code topics
    assert_eq!(fixture.bus.count_of("round-resolve"), 2);
}
