/// Workout log
///
/// - `POST /api/workouts` - log a workout; idempotent on `client_ref`
/// - `GET  /api/workouts` - my workouts, newest first
///
/// The offline gateway replays queued writes with `client_ref` set to the
/// queue key, so a replay of a workout the server already stored returns
/// `200` with the existing row instead of `201` with a duplicate. Points are
/// only awarded when a row is actually inserted.

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{ApiJson, ApiQuery},
    routes::Pagination,
};
use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swanstudios_shared::{
    auth::middleware::AuthContext,
    gamification::Action,
    models::{
        gamification::{self, AwardError, AwardOutcome},
        workout::{CreateWorkout, Workout},
    },
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LogWorkoutRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    pub performed_at: Option<DateTime<Utc>>,

    #[validate(range(min = 1, max = 1440, message = "Duration must be 1-1440 minutes"))]
    pub duration_minutes: Option<i32>,

    #[serde(default = "empty_array")]
    pub exercises: serde_json::Value,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,

    #[validate(length(min = 1, max = 100, message = "client_ref must be 1-100 characters"))]
    pub client_ref: Option<String>,
}

fn empty_array() -> serde_json::Value {
    serde_json::Value::Array(Vec::new())
}

#[derive(Debug, Serialize)]
pub struct LogWorkoutResponse {
    pub workout: Workout,

    /// False when `client_ref` matched an existing workout
    pub created: bool,

    /// None on replays or once the daily points cap is hit
    pub points: Option<AwardOutcome>,
}

pub async fn log_workout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<LogWorkoutRequest>,
) -> ApiResult<(StatusCode, Json<LogWorkoutResponse>)> {
    req.validate()?;

    let mut tx = state.db.begin().await?;

    let (workout, created) = Workout::create_idempotent(
        &mut tx,
        CreateWorkout {
            user_id: auth.user_id,
            title: req.title.trim().to_string(),
            performed_at: req.performed_at,
            duration_minutes: req.duration_minutes,
            exercises: req.exercises,
            notes: req.notes,
            client_ref: req.client_ref,
        },
    )
    .await?;

    let points = if created {
        match gamification::award_action(&mut tx, auth.user_id, Action::WorkoutCompleted, None).await {
            Ok(outcome) => Some(outcome),
            Err(AwardError::Rules(reason)) => {
                tracing::debug!(user_id = %auth.user_id, %reason, "Workout logged without points");
                None
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        None
    };

    tx.commit().await?;

    if created {
        tracing::info!(workout_id = %workout.id, user_id = %auth.user_id, "Workout logged");
    } else {
        tracing::debug!(workout_id = %workout.id, "Duplicate workout replay ignored");
    }

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(LogWorkoutResponse {
            workout,
            created,
            points,
        }),
    ))
}

pub async fn list_workouts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Json<Vec<Workout>>> {
    let workouts = Workout::list_for_user(&state.db, auth.user_id, page.limit(), page.offset()).await?;
    Ok(Json(workouts))
}
