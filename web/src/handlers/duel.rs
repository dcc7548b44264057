//! Round orchestration, answers and snapshots over HTTP.
//!
//! | method | path                           | operation           |
//! |--------|--------------------------------|---------------------|
//! | POST   | `/api/duels/:code/start`       | open the next round |
//! | POST   | `/api/duels/:code/next`        | idempotent start    |
//! | POST   | `/api/duels/:code/resolve`     | reveal the answer   |
//! | POST   | `/api/duels/:code/answer`      | record an answer    |
//! | GET    | `/api/duels/:code/snapshot`    | full current state  |

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use duel_arena_core::{JoinCode, PlayerId};
use duel_arena_runtime::{AnswerRequest, NextOutcome, ResolveOutcome, Snapshot, StartOutcome, SubmitOutcome};
use serde::Deserialize;
use serde_json::Value;

/// Body of `POST /api/duels/:code/answer`.
///
/// `ms` is whatever the client measured; anything that is not a JSON number
/// counts as 0.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerBody {
    /// Answering player
    pub player_id: Option<PlayerId>,
    /// Chosen position, an integer in `0..=3`
    pub choice_index: Option<Value>,
    /// Client-measured response time in milliseconds
    #[serde(default)]
    pub ms: Option<Value>,
}

impl AnswerBody {
    fn into_request(self) -> Result<AnswerRequest, AppError> {
        let player_id = self
            .player_id
            .ok_or_else(|| AppError::validation("playerId is required"))?;
        let choice_index = self
            .choice_index
            .ok_or_else(|| AppError::validation("choiceIndex is required"))?
            .as_i64()
            .ok_or_else(|| AppError::validation("choiceIndex must be an integer"))?;
        Ok(AnswerRequest {
            player_id,
            choice_index,
            response_ms: self.ms.as_ref().and_then(Value::as_f64),
        })
    }
}

/// Parse a join code from the path. A malformed code cannot name a session.
pub(crate) fn join_code(raw: &str) -> Result<JoinCode, AppError> {
    raw.parse()
        .map_err(|_| AppError::not_found(format!("session not found: {raw}")))
}

/// `POST /api/duels/:code/start`
///
/// # Errors
///
/// 404 for an unknown code, 409 if a round is live, the session is not
/// running or its set is empty.
pub async fn start(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<StartOutcome>, AppError> {
    let code = join_code(&code)?;
    Ok(Json(state.arena.start(&code).await?))
}

/// `POST /api/duels/:code/next`
///
/// # Errors
///
/// As [`start`], except that a live round is returned instead of a 409.
pub async fn next(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<NextOutcome>, AppError> {
    let code = join_code(&code)?;
    Ok(Json(state.arena.next(&code).await?))
}

/// `POST /api/duels/:code/resolve`
///
/// # Errors
///
/// 404 for an unknown code.
pub async fn resolve(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ResolveOutcome>, AppError> {
    let code = join_code(&code)?;
    Ok(Json(state.arena.resolve(&code).await?))
}

/// `POST /api/duels/:code/answer`
///
/// # Errors
///
/// 422 for a missing or malformed field (before any lookup), 404 for an
/// unknown code or player, 409 if no round is live.
pub async fn answer(
    State(state): State<AppState>,
    Path(code): Path<String>,
    body: Result<Json<AnswerBody>, JsonRejection>,
) -> Result<Json<SubmitOutcome>, AppError> {
    let Json(body) = body?;
    let request = body.into_request()?;
    let code = join_code(&code)?;
    Ok(Json(state.arena.answer(&code, request).await?))
}

/// `GET /api/duels/:code/snapshot`
///
/// # Errors
///
/// 404 for an unknown code.
pub async fn snapshot(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Snapshot>, AppError> {
    let code = join_code(&code)?;
    Ok(Json(state.arena.snapshot(&code).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> AnswerBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn ms_accepts_any_json() {
        let player = PlayerId::new();
        for (ms, expected) in [
            (json!(812.6), Some(812.6)),
            (json!("fast"), None),
            (json!(null), None),
            (json!({"t": 1}), None),
        ] {
            let request = body(json!({"playerId": player, "choiceIndex": 1, "ms": ms}))
                .into_request()
                .unwrap();
            assert_eq!(request.response_ms, expected);
        }
    }

    #[test]
    fn missing_fields_are_validation_errors() {
        let err = body(json!({"choiceIndex": 1})).into_request().unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = body(json!({"playerId": PlayerId::new()})).into_request().unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = body(json!({"playerId": PlayerId::new(), "choiceIndex": "two"}))
            .into_request()
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn out_of_range_choice_passes_through_to_the_arena() {
        let request = body(json!({"playerId": PlayerId::new(), "choiceIndex": 9}))
            .into_request()
            .unwrap();
        assert_eq!(request.choice_index, 9);
        assert_eq!(request.response_ms, None);
    }

    #[test]
    fn malformed_code_is_not_found() {
        assert_eq!(join_code("no spaces!").unwrap_err().code(), "NOT_FOUND");
        assert_eq!(join_code("abc123").unwrap().as_str(), "ABC123");
    }
}
