/// Gamification endpoints
///
/// - `GET  /api/v1/gamification/me` - points, level, streak, achievements
/// - `POST /api/v1/gamification/actions` - award points for an action
/// - `GET  /api/v1/gamification/leaderboard?limit=10`

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{ApiJson, ApiQuery},
};
use axum::{
    extract::State,
    Extension, Json,
};
use serde::Deserialize;
use swanstudios_shared::{
    auth::middleware::AuthContext,
    gamification::Action,
    models::gamification::{self, AwardOutcome, GamificationStatus, LeaderboardEntry},
};
use validator::Validate;

const DEFAULT_LEADERBOARD_SIZE: i64 = 10;
const MAX_LEADERBOARD_SIZE: i64 = 100;

#[derive(Debug, Deserialize, Validate)]
pub struct AwardRequest {
    /// Action name, e.g. `goal_achieved`
    pub action: String,

    /// 0-100; 95 or above unlocks Form Master
    #[validate(range(min = 0.0, max = 100.0, message = "Form score must be 0-100"))]
    pub form_score: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

pub async fn my_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<GamificationStatus>> {
    let mut conn = state.db.acquire().await?;
    let status = gamification::status(&mut conn, auth.user_id).await?;
    Ok(Json(status))
}

/// Awards points for `action`
///
/// # Errors
///
/// - `400` unknown action
/// - `429` the action's daily limit is used up
pub async fn award(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<AwardRequest>,
) -> ApiResult<Json<AwardOutcome>> {
    req.validate()?;
    let action: Action = req.action.trim().parse()?;

    let mut tx = state.db.begin().await?;
    let outcome = gamification::award_action(&mut tx, auth.user_id, action, req.form_score).await?;
    tx.commit().await?;

    Ok(Json(outcome))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LeaderboardQuery>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
        .clamp(1, MAX_LEADERBOARD_SIZE);

    let entries = gamification::leaderboard(&state.db, limit).await?;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn test_unknown_action_maps_to_bad_request() {
        let parsed: Result<Action, ApiError> = "juggling".parse::<Action>().map_err(Into::into);
        assert!(matches!(parsed, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_form_score_range() {
        let req = AwardRequest {
            action: "form_improvement".into(),
            form_score: Some(140.0),
        };
        assert!(req.validate().is_err());
    }
}
