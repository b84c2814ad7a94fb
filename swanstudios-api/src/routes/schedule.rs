/// Calendar view
///
/// ```text
/// GET /api/schedule?start=2025-03-01T00:00:00Z&end=2025-04-01T00:00:00Z&status=available,scheduled
/// ```
///
/// Admins see every session. Trainers and clients see sessions they take
/// part in plus open slots. Clients never see staff-only notes.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiQuery,
};
use axum::{
    extract::State,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swanstudios_shared::{
    auth::middleware::AuthContext,
    models::session::{ScheduleFilter, ScheduleScope, Session, SessionStatus},
};

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleQuery {
    /// Inclusive
    pub start: Option<DateTime<Utc>>,

    /// Exclusive
    pub end: Option<DateTime<Utc>>,

    /// Comma-separated statuses
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub sessions: Vec<Session>,
    pub count: usize,
}

/// Parses `available,scheduled` into statuses; empty means all
pub fn parse_statuses(raw: Option<&str>) -> ApiResult<Vec<SessionStatus>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    let mut statuses = Vec::new();
    for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let status: SessionStatus = part
            .parse()
            .map_err(|message: String| ApiError::invalid("status", message))?;
        if !statuses.contains(&status) {
            statuses.push(status);
        }
    }
    Ok(statuses)
}

/// Scope a caller is allowed to see
pub fn scope_for(auth: &AuthContext) -> ScheduleScope {
    if auth.is_admin() {
        ScheduleScope::All
    } else {
        ScheduleScope::ParticipantOrAvailable(auth.user_id)
    }
}

pub async fn get_schedule(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<ScheduleQuery>,
) -> ApiResult<Json<ScheduleResponse>> {
    if let (Some(start), Some(end)) = (query.start, query.end) {
        if start >= end {
            return Err(ApiError::invalid("end", "End must be after start"));
        }
    }

    let filter = ScheduleFilter {
        scope: scope_for(&auth),
        start: query.start,
        end: query.end,
        statuses: parse_statuses(query.status.as_deref())?,
    };

    let mut sessions = Session::list_schedule(&state.db, &filter).await?;
    if auth.is_client() {
        sessions = sessions.into_iter().map(Session::redacted_for_client).collect();
    }

    Ok(Json(ScheduleResponse {
        count: sessions.len(),
        sessions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use swanstudios_shared::models::user::UserRole;
    use uuid::Uuid;

    #[test]
    fn test_parse_statuses() {
        assert!(parse_statuses(None).unwrap().is_empty());
        assert_eq!(
            parse_statuses(Some("available, scheduled,available")).unwrap(),
            vec![SessionStatus::Available, SessionStatus::Scheduled]
        );
        assert!(matches!(
            parse_statuses(Some("available,booked")),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_scope_by_role() {
        let id = Uuid::new_v4();
        assert_eq!(scope_for(&AuthContext::new(id, UserRole::Admin)), ScheduleScope::All);
        assert_eq!(
            scope_for(&AuthContext::new(id, UserRole::Trainer)),
            ScheduleScope::ParticipantOrAvailable(id)
        );
        assert_eq!(
            scope_for(&AuthContext::new(id, UserRole::Client)),
            ScheduleScope::ParticipantOrAvailable(id)
        );
    }
}
