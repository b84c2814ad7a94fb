/// Training session endpoints
///
/// - `POST  /api/sessions` - admin creates open slots
/// - `POST  /api/sessions/recurring` - admin generates slots from a weekly pattern
/// - `GET   /api/sessions/:id`
/// - `POST  /api/sessions/book` - client books an open slot
/// - `POST  /api/sessions/request` - client proposes a time
/// - `PATCH /api/sessions/:id/cancel`
/// - `PATCH /api/sessions/:id/confirm`
/// - `PATCH /api/sessions/:id/complete`
/// - `PATCH /api/sessions/:id/assign-trainer`
/// - `PATCH /api/sessions/:id/notes`
///
/// Each mutation runs in one transaction. Credit changes and state moves
/// are guarded updates in `swanstudios_shared::models`, so the handlers only
/// decide what to write.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::{optional_json, ApiJson, ApiPath},
};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use swanstudios_shared::{
    auth::{
        authorization::{require_admin, require_role, require_session_participant, require_staff},
        middleware::AuthContext,
    },
    models::{
        session::{NewRequest, NewSlot, Session, SessionStatus},
        user::{User, UserRole},
    },
    scheduling::{
        self, Canceller, RecurrencePattern, ASSIGNABLE, COMPLETABLE, CONFIRMABLE,
        DEFAULT_DURATION_MINUTES, DEFAULT_LOCATION, DEFAULT_SESSION_TYPE,
    },
};
use uuid::Uuid;
use validator::Validate;

/// Upper bound on slots one recurring request may create
pub const MAX_RECURRING_SLOTS: usize = 500;

const MIN_DURATION: i32 = 15;
const MAX_DURATION: i32 = 480;

#[derive(Debug, Clone, Deserialize)]
pub struct SlotInput {
    pub session_date: DateTime<Utc>,
    pub duration: Option<i32>,
    pub trainer_id: Option<Uuid>,
    pub location: Option<String>,
    pub session_type: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSlotsRequest {
    pub sessions: Vec<SlotInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecurringRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    /// 0 = Sunday
    #[validate(length(min = 1, message = "Select at least one day of the week"))]
    pub days_of_week: Vec<u32>,

    /// `HH:MM`, UTC
    #[validate(length(min = 1, message = "Select at least one time"))]
    pub times: Vec<String>,

    #[validate(range(min = 15, max = 480, message = "Duration must be 15-480 minutes"))]
    pub duration: Option<i32>,

    pub trainer_id: Option<Uuid>,
    pub location: Option<String>,
    pub session_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub session_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RequestSessionRequest {
    pub session_date: DateTime<Utc>,

    #[validate(range(min = 15, max = 480, message = "Duration must be 15-480 minutes"))]
    pub duration: Option<i32>,

    pub location: Option<String>,
    pub session_type: Option<String>,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CancelRequest {
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,

    /// Ask for a no-charge cancel; honoured only outside the 24 h window
    #[serde(default)]
    pub early_cancel: bool,
}

#[derive(Debug, Deserialize)]
pub struct AssignTrainerRequest {
    pub trainer_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NotesRequest {
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: String,
}

#[derive(Debug, Serialize)]
pub struct SessionsCreatedResponse {
    pub message: String,
    pub sessions: Vec<Session>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub message: String,
    pub session: Session,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub message: String,
    pub session: Session,
    pub credit_deducted: bool,
    pub available_sessions: i32,
}

#[derive(Debug, Serialize)]
pub struct CancellationResponse {
    pub message: String,
    pub session: Session,
    pub refunded: bool,
    pub early_cancel: bool,
}

#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub message: String,
    pub session: Session,
    pub credit_deducted: bool,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Session not found".to_string())
}

fn blank_to_default(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Clients get staff-only fields stripped
fn for_viewer(auth: &AuthContext, session: Session) -> Session {
    if auth.is_client() {
        session.redacted_for_client()
    } else {
        session
    }
}

/// Checks a batch of admin-created slots before anything is written
pub fn validate_slots(slots: &[SlotInput], now: DateTime<Utc>) -> ApiResult<()> {
    if slots.is_empty() {
        return Err(ApiError::invalid("sessions", "At least one session is required"));
    }

    let mut details = Vec::new();
    for (i, slot) in slots.iter().enumerate() {
        if slot.session_date <= now {
            details.push(ValidationErrorDetail::new(
                format!("sessions[{}].session_date", i),
                "Cannot create sessions in the past",
            ));
        }
        if let Some(duration) = slot.duration {
            if !(MIN_DURATION..=MAX_DURATION).contains(&duration) {
                details.push(ValidationErrorDetail::new(
                    format!("sessions[{}].duration", i),
                    "Duration must be 15-480 minutes",
                ));
            }
        }
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(ApiError::ValidationError(details))
    }
}

/// Loads `trainer_id` and checks it belongs to a trainer
async fn require_trainer_account(conn: &mut PgConnection, trainer_id: Uuid) -> ApiResult<User> {
    let user = User::find_by_id(&mut *conn, trainer_id)
        .await?
        .ok_or_else(|| ApiError::invalid("trainer_id", "Trainer not found"))?;

    if user.role != UserRole::Trainer {
        return Err(ApiError::invalid("trainer_id", "User is not a trainer"));
    }

    Ok(user)
}

/// Explains why a guarded update matched nothing
async fn guard_failure(conn: &mut PgConnection, id: Uuid, action: &str) -> ApiError {
    match Session::find_by_id(&mut *conn, id).await {
        Ok(Some(session)) => ApiError::Conflict(format!(
            "Cannot {} a session that is {}",
            action, session.status
        )),
        Ok(None) => not_found(),
        Err(e) => e.into(),
    }
}

/// Admin creates one or more open slots
pub async fn create_slots(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateSlotsRequest>,
) -> ApiResult<(StatusCode, Json<SessionsCreatedResponse>)> {
    require_admin(&auth)?;
    validate_slots(&req.sessions, Utc::now())?;

    let mut tx = state.db.begin().await?;

    let mut checked: Vec<Uuid> = Vec::new();
    let mut sessions = Vec::with_capacity(req.sessions.len());

    for slot in req.sessions {
        if let Some(trainer_id) = slot.trainer_id {
            if !checked.contains(&trainer_id) {
                require_trainer_account(&mut tx, trainer_id).await?;
                checked.push(trainer_id);
            }
        }

        let created = Session::create_slot(
            &mut *tx,
            NewSlot {
                session_date: slot.session_date,
                duration: slot.duration.unwrap_or(DEFAULT_DURATION_MINUTES),
                trainer_id: slot.trainer_id,
                location: blank_to_default(slot.location, DEFAULT_LOCATION),
                session_type: blank_to_default(slot.session_type, DEFAULT_SESSION_TYPE),
                notes: slot.notes.unwrap_or_default(),
            },
        )
        .await?;
        sessions.push(created);
    }

    tx.commit().await?;

    tracing::info!(count = sessions.len(), admin_id = %auth.user_id, "Created available sessions");

    Ok((
        StatusCode::CREATED,
        Json(SessionsCreatedResponse {
            message: format!("Created {} sessions", sessions.len()),
            sessions,
        }),
    ))
}

/// Admin expands a weekly pattern into open slots
pub async fn create_recurring(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<RecurringRequest>,
) -> ApiResult<(StatusCode, Json<SessionsCreatedResponse>)> {
    require_admin(&auth)?;
    req.validate()?;

    let pattern = RecurrencePattern {
        start_date: req.start_date,
        end_date: req.end_date,
        days_of_week: req.days_of_week,
        times: req.times,
    };

    let starts = scheduling::expand_recurrence(&pattern, Utc::now()).map_err(ApiError::BadRequest)?;

    if starts.len() > MAX_RECURRING_SLOTS {
        return Err(ApiError::BadRequest(format!(
            "Pattern would create {} sessions; the limit is {}",
            starts.len(),
            MAX_RECURRING_SLOTS
        )));
    }

    let duration = req.duration.unwrap_or(DEFAULT_DURATION_MINUTES);
    let location = blank_to_default(req.location, DEFAULT_LOCATION);
    let session_type = blank_to_default(req.session_type, DEFAULT_SESSION_TYPE);

    let mut tx = state.db.begin().await?;

    if let Some(trainer_id) = req.trainer_id {
        require_trainer_account(&mut tx, trainer_id).await?;
    }

    let mut sessions = Vec::with_capacity(starts.len());
    for session_date in starts {
        let created = Session::create_slot(
            &mut *tx,
            NewSlot {
                session_date,
                duration,
                trainer_id: req.trainer_id,
                location: location.clone(),
                session_type: session_type.clone(),
                notes: String::new(),
            },
        )
        .await?;
        sessions.push(created);
    }

    tx.commit().await?;

    tracing::info!(count = sessions.len(), admin_id = %auth.user_id, "Created recurring sessions");

    Ok((
        StatusCode::CREATED,
        Json(SessionsCreatedResponse {
            message: format!("Created {} recurring sessions", sessions.len()),
            sessions,
        }),
    ))
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Session>> {
    let session = Session::find_by_id(&state.db, id).await?.ok_or_else(not_found)?;

    if auth.is_client()
        && session.client_id != Some(auth.user_id)
        && session.status != SessionStatus::Available
    {
        return Err(ApiError::Forbidden(
            "Not authorized to view this session".to_string(),
        ));
    }

    Ok(Json(for_viewer(&auth, session)))
}

/// Client books an open future slot
///
/// Inside the 24-hour window a credit is taken immediately when the client
/// has one; otherwise it is taken at completion.
pub async fn book_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<BookRequest>,
) -> ApiResult<Json<BookingResponse>> {
    require_role(&auth, UserRole::Client)?;

    let mut tx = state.db.begin().await?;

    let booked = match Session::book(&mut *tx, req.session_id, auth.user_id).await? {
        Some(session) => session,
        None => {
            let existing = Session::find_by_id(&mut *tx, req.session_id)
                .await?
                .ok_or_else(not_found)?;

            if existing.status == SessionStatus::Available && existing.is_past(Utc::now()) {
                return Err(ApiError::BadRequest("Cannot book a session in the past".to_string()));
            }
            return Err(ApiError::Conflict("Session is no longer available".to_string()));
        }
    };

    let mut session = booked;
    let mut credit_deducted = false;

    if scheduling::within_deduction_window(session.session_date, Utc::now())
        && User::deduct_session_credit(&mut *tx, auth.user_id).await?
    {
        if let Some(marked) = Session::mark_deducted(&mut *tx, session.id).await? {
            session = marked;
        }
        credit_deducted = true;
    }

    let available_sessions = User::find_by_id(&mut *tx, auth.user_id)
        .await?
        .map(|u| u.available_sessions)
        .unwrap_or_default();

    tx.commit().await?;

    tracing::info!(
        session_id = %session.id,
        client_id = %auth.user_id,
        credit_deducted,
        "Session booked"
    );

    Ok(Json(BookingResponse {
        message: "Session booked successfully".to_string(),
        session: session.redacted_for_client(),
        credit_deducted,
        available_sessions,
    }))
}

/// Client proposes a time for staff to pick up
pub async fn request_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<RequestSessionRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    require_role(&auth, UserRole::Client)?;
    req.validate()?;

    if req.session_date <= Utc::now() {
        return Err(ApiError::invalid("session_date", "Cannot request a session in the past"));
    }

    let duration = req.duration.unwrap_or(DEFAULT_DURATION_MINUTES);

    let mut tx = state.db.begin().await?;
    let session = Session::create_request(
        &mut *tx,
        NewRequest {
            client_id: auth.user_id,
            session_date: req.session_date,
            end_date: Some(scheduling::slot_end(req.session_date, duration)),
            duration,
            location: blank_to_default(req.location, DEFAULT_LOCATION),
            session_type: blank_to_default(req.session_type, DEFAULT_SESSION_TYPE),
            notes: req.notes.unwrap_or_default(),
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(session_id = %session.id, client_id = %auth.user_id, "Session requested");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            message: "Session request submitted".to_string(),
            session: session.redacted_for_client(),
        }),
    ))
}

/// Cancels a session, refunding the credit where the rules allow
pub async fn cancel_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    body: Bytes,
) -> ApiResult<Json<CancellationResponse>> {
    let req: CancelRequest = optional_json(&body)?;
    req.validate()?;

    let now = Utc::now();
    let mut tx = state.db.begin().await?;

    let session = Session::find_for_update(&mut *tx, id).await?.ok_or_else(not_found)?;
    require_session_participant(&auth, session.client_id, session.trainer_id)?;

    if session.status.is_terminal() {
        return Err(ApiError::Conflict(format!("Session is already {}", session.status)));
    }

    let canceller = if auth.is_admin() {
        Canceller::Admin
    } else {
        Canceller::Participant
    };

    if canceller == Canceller::Participant && session.is_past(now) {
        return Err(ApiError::BadRequest("Cannot cancel past sessions".to_string()));
    }

    let decision = scheduling::decide_cancellation(
        canceller,
        session.session_date,
        now,
        session.session_deducted,
        req.early_cancel,
        req.reason.as_deref(),
    );

    let cancelled = Session::cancel(&mut *tx, id, auth.user_id, &decision.reason, decision.refund)
        .await?
        .ok_or_else(|| ApiError::Conflict("Session can no longer be cancelled".to_string()))?;

    if decision.refund {
        if let Some(client_id) = session.client_id {
            User::refund_session_credit(&mut *tx, client_id).await?;
        }
    }

    tx.commit().await?;

    tracing::info!(
        session_id = %id,
        cancelled_by = %auth.user_id,
        refunded = decision.refund,
        early_cancel = decision.early_cancel,
        "Session cancelled"
    );

    Ok(Json(CancellationResponse {
        message: "Session cancelled".to_string(),
        session: for_viewer(&auth, cancelled),
        refunded: decision.refund,
        early_cancel: decision.early_cancel,
    }))
}

pub async fn confirm_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<SessionResponse>> {
    require_staff(&auth)?;

    let mut tx = state.db.begin().await?;
    let session = match Session::transition(&mut *tx, id, CONFIRMABLE, SessionStatus::Confirmed).await? {
        Some(session) => session,
        None => return Err(guard_failure(&mut tx, id, "confirm").await),
    };
    tx.commit().await?;

    tracing::info!(session_id = %id, by = %auth.user_id, "Session confirmed");

    Ok(Json(SessionResponse {
        message: "Session confirmed".to_string(),
        session,
    }))
}

/// Marks a session done, taking the credit if it wasn't taken at booking
pub async fn complete_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<CompletionResponse>> {
    require_staff(&auth)?;

    let mut tx = state.db.begin().await?;

    Session::find_for_update(&mut *tx, id).await?.ok_or_else(not_found)?;

    let mut session = match Session::transition(&mut *tx, id, COMPLETABLE, SessionStatus::Completed).await? {
        Some(session) => session,
        None => return Err(guard_failure(&mut tx, id, "complete").await),
    };

    let mut credit_deducted = false;
    if !session.session_deducted {
        if let Some(client_id) = session.client_id {
            if User::deduct_session_credit(&mut *tx, client_id).await? {
                if let Some(marked) = Session::mark_deducted(&mut *tx, id).await? {
                    session = marked;
                }
                credit_deducted = true;
            } else {
                tracing::warn!(session_id = %id, client_id = %client_id, "Completed session with no credits left");
            }
        }
    }

    tx.commit().await?;

    tracing::info!(session_id = %id, by = %auth.user_id, credit_deducted, "Session completed");

    Ok(Json(CompletionResponse {
        message: "Session completed".to_string(),
        session,
        credit_deducted,
    }))
}

pub async fn assign_trainer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AssignTrainerRequest>,
) -> ApiResult<Json<SessionResponse>> {
    require_admin(&auth)?;

    let mut tx = state.db.begin().await?;
    let trainer = require_trainer_account(&mut tx, req.trainer_id).await?;

    let session = match Session::assign_trainer(&mut *tx, id, trainer.id, ASSIGNABLE).await? {
        Some(session) => session,
        None => return Err(guard_failure(&mut tx, id, "assign a trainer to").await),
    };
    tx.commit().await?;

    tracing::info!(session_id = %id, trainer_id = %trainer.id, "Trainer assigned");

    Ok(Json(SessionResponse {
        message: format!("Assigned {} to session", trainer.full_name()),
        session,
    }))
}

/// Staff write the private notes, the booked client writes the shared notes
pub async fn update_notes(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<NotesRequest>,
) -> ApiResult<Json<SessionResponse>> {
    req.validate()?;

    let mut tx = state.db.begin().await?;

    let session = Session::find_for_update(&mut *tx, id).await?.ok_or_else(not_found)?;
    require_session_participant(&auth, session.client_id, session.trainer_id)?;

    let updated = if auth.is_staff() {
        Session::update_private_notes(&mut *tx, id, &req.notes).await?
    } else {
        Session::update_notes(&mut *tx, id, &req.notes).await?
    };
    let updated = updated.ok_or_else(not_found)?;

    tx.commit().await?;

    Ok(Json(SessionResponse {
        message: "Notes updated".to_string(),
        session: for_viewer(&auth, updated),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn slot(hours_from_now: i64, duration: Option<i32>) -> SlotInput {
        SlotInput {
            session_date: Utc::now() + Duration::hours(hours_from_now),
            duration,
            trainer_id: None,
            location: None,
            session_type: None,
            notes: None,
        }
    }

    #[test]
    fn test_validate_slots_rejects_empty_batch() {
        assert!(matches!(
            validate_slots(&[], Utc::now()),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_slots_reports_each_bad_slot() {
        let slots = vec![slot(24, None), slot(-1, None), slot(48, Some(5))];

        match validate_slots(&slots, Utc::now()) {
            Err(ApiError::ValidationError(details)) => {
                let fields: Vec<&str> = details.iter().map(|d| d.field.as_str()).collect();
                assert_eq!(fields, vec!["sessions[1].session_date", "sessions[2].duration"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_validate_slots_accepts_future_batch() {
        assert!(validate_slots(&[slot(1, Some(60)), slot(2, None)], Utc::now()).is_ok());
    }

    #[test]
    fn test_blank_to_default() {
        assert_eq!(blank_to_default(None, DEFAULT_LOCATION), "Main Studio");
        assert_eq!(blank_to_default(Some("  ".into()), DEFAULT_LOCATION), "Main Studio");
        assert_eq!(blank_to_default(Some(" Park ".into()), DEFAULT_LOCATION), "Park");
    }

    #[test]
    fn test_cancel_request_defaults() {
        let req: CancelRequest = serde_json::from_str("{}").unwrap();
        assert!(!req.early_cancel);
        assert!(req.reason.is_none());
    }
}
