/// Training session model and database operations
///
/// A session row is a calendar slot. It starts `available` (admin-created) or
/// `requested` (client-proposed) and moves through the states below. Every
/// transition is a single guarded `UPDATE ... WHERE status IN (...)`, so two
/// clients racing for the same slot cannot both win.
///
/// ```text
/// available ──book──▶ scheduled ──confirm──▶ confirmed ──complete──▶ completed
/// requested ──assign trainer──▶ scheduled
/// requested ──confirm──▶ confirmed
/// (any live state) ──cancel──▶ cancelled
/// ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgHasArrayType, PgTypeInfo};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Available,
    Requested,
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 6] = [
        SessionStatus::Available,
        SessionStatus::Requested,
        SessionStatus::Scheduled,
        SessionStatus::Confirmed,
        SessionStatus::Completed,
        SessionStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Available => "available",
            SessionStatus::Requested => "requested",
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Confirmed => "confirmed",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled sessions can't change any more
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }
}

// Needed to bind `session_status[]` in the guarded transitions
impl PgHasArrayType for SessionStatus {
    fn array_type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("_session_status")
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        SessionStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown session status: {}", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub session_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,

    /// Minutes
    pub duration: i32,

    pub status: SessionStatus,
    pub client_id: Option<Uuid>,
    pub trainer_id: Option<Uuid>,
    pub location: String,
    pub session_type: String,

    /// Client-visible notes
    pub notes: String,

    /// Staff-only notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_notes: Option<String>,

    pub booking_date: Option<DateTime<Utc>>,

    /// A credit has been taken from the client for this session
    pub session_deducted: bool,
    pub deduction_date: Option<DateTime<Utc>>,

    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub cancellation_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Strips staff-only fields before handing the row to a client
    pub fn redacted_for_client(mut self) -> Self {
        self.private_notes = None;
        self
    }

    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.session_date < now
    }
}

/// Admin-created open slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSlot {
    pub session_date: DateTime<Utc>,
    pub duration: i32,
    pub trainer_id: Option<Uuid>,
    pub location: String,
    pub session_type: String,
    pub notes: String,
}

/// Client-proposed time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRequest {
    pub client_id: Uuid,
    pub session_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub duration: i32,
    pub location: String,
    pub session_type: String,
    pub notes: String,
}

/// Which rows a caller may see on the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleScope {
    /// Everything
    All,

    /// Sessions the user is client or trainer on, plus open slots
    ParticipantOrAvailable(Uuid),
}

/// Schedule query
#[derive(Debug, Clone)]
pub struct ScheduleFilter {
    pub scope: ScheduleScope,

    /// Inclusive lower bound
    pub start: Option<DateTime<Utc>>,

    /// Exclusive upper bound
    pub end: Option<DateTime<Utc>>,

    pub statuses: Vec<SessionStatus>,
}

const SESSION_COLUMNS: &str = "id, session_date, end_date, duration, status, client_id, trainer_id, \
     location, session_type, notes, private_notes, booking_date, session_deducted, deduction_date, \
     cancelled_by, cancellation_reason, cancellation_date, created_at, updated_at, deleted_at";

impl Session {
    /// Inserts an `available` slot
    pub async fn create_slot<'e, E>(executor: E, slot: NewSlot) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            INSERT INTO sessions (session_date, end_date, duration, status, trainer_id, location, session_type, notes)
            VALUES ($1, $1 + make_interval(mins => $2), $2, 'available', $3, $4, $5, $6)
            RETURNING {SESSION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Session>(&query)
            .bind(slot.session_date)
            .bind(slot.duration)
            .bind(slot.trainer_id)
            .bind(slot.location)
            .bind(slot.session_type)
            .bind(slot.notes)
            .fetch_one(executor)
            .await
    }

    /// Inserts a `requested` session owned by the client
    pub async fn create_request<'e, E>(executor: E, req: NewRequest) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            INSERT INTO sessions (session_date, end_date, duration, status, client_id, location, session_type, notes, booking_date)
            VALUES ($1, COALESCE($2, $1 + make_interval(mins => $3)), $3, 'requested', $4, $5, $6, $7, NOW())
            RETURNING {SESSION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Session>(&query)
            .bind(req.session_date)
            .bind(req.end_date)
            .bind(req.duration)
            .bind(req.client_id)
            .bind(req.location)
            .bind(req.session_type)
            .bind(req.notes)
            .fetch_one(executor)
            .await
    }

    /// Finds a live session
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1 AND deleted_at IS NULL"
        );

        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Same as [`Session::find_by_id`] but locks the row for the transaction
    pub async fn find_for_update<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        );

        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Lists sessions for the schedule view, earliest first
    pub async fn list_schedule<'e, E>(
        executor: E,
        filter: &ScheduleFilter,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let viewer = match filter.scope {
            ScheduleScope::All => None,
            ScheduleScope::ParticipantOrAvailable(user_id) => Some(user_id),
        };

        let statuses: Option<Vec<SessionStatus>> = if filter.statuses.is_empty() {
            None
        } else {
            Some(filter.statuses.clone())
        };

        let query = format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM sessions
            WHERE deleted_at IS NULL
              AND ($1::uuid IS NULL OR client_id = $1 OR trainer_id = $1 OR status = 'available')
              AND ($2::timestamptz IS NULL OR session_date >= $2)
              AND ($3::timestamptz IS NULL OR session_date < $3)
              AND ($4::session_status[] IS NULL OR status = ANY($4))
            ORDER BY session_date ASC
            "#
        );

        sqlx::query_as::<_, Session>(&query)
            .bind(viewer)
            .bind(filter.start)
            .bind(filter.end)
            .bind(statuses)
            .fetch_all(executor)
            .await
    }

    /// Books an open future slot for a client
    ///
    /// Returns None if the slot is gone, not `available`, or already started.
    pub async fn book<'e, E>(
        executor: E,
        id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            UPDATE sessions
            SET status = 'scheduled', client_id = $2, booking_date = NOW(), updated_at = NOW()
            WHERE id = $1
              AND status = 'available'
              AND session_date > NOW()
              AND deleted_at IS NULL
            RETURNING {SESSION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .bind(client_id)
            .fetch_optional(executor)
            .await
    }

    /// Records that a credit was taken for this session
    pub async fn mark_deducted<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            UPDATE sessions
            SET session_deducted = TRUE, deduction_date = NOW(), updated_at = NOW()
            WHERE id = $1 AND session_deducted = FALSE
            RETURNING {SESSION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Moves a session to `to` if it is currently in one of `from`
    ///
    /// Returns None when the guard fails.
    pub async fn transition<'e, E>(
        executor: E,
        id: Uuid,
        from: &[SessionStatus],
        to: SessionStatus,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            UPDATE sessions
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = ANY($2) AND deleted_at IS NULL
            RETURNING {SESSION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .bind(from.to_vec())
            .bind(to)
            .fetch_optional(executor)
            .await
    }

    /// Assigns a trainer to a requested session, scheduling it
    pub async fn assign_trainer<'e, E>(
        executor: E,
        id: Uuid,
        trainer_id: Uuid,
        from: &[SessionStatus],
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            UPDATE sessions
            SET trainer_id = $2, status = 'scheduled', updated_at = NOW()
            WHERE id = $1 AND status = ANY($3) AND deleted_at IS NULL
            RETURNING {SESSION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .bind(trainer_id)
            .bind(from.to_vec())
            .fetch_optional(executor)
            .await
    }

    /// Cancels a live session
    ///
    /// When `refunded` is true the deduction flags are cleared as well.
    pub async fn cancel<'e, E>(
        executor: E,
        id: Uuid,
        cancelled_by: Uuid,
        reason: &str,
        refunded: bool,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            UPDATE sessions
            SET status = 'cancelled',
                cancelled_by = $2,
                cancellation_reason = $3,
                cancellation_date = NOW(),
                session_deducted = CASE WHEN $4 THEN FALSE ELSE session_deducted END,
                deduction_date = CASE WHEN $4 THEN NULL ELSE deduction_date END,
                updated_at = NOW()
            WHERE id = $1
              AND status NOT IN ('cancelled', 'completed')
              AND deleted_at IS NULL
            RETURNING {SESSION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .bind(cancelled_by)
            .bind(reason)
            .bind(refunded)
            .fetch_optional(executor)
            .await
    }

    /// Replaces the client-visible notes
    pub async fn update_notes<'e, E>(
        executor: E,
        id: Uuid,
        notes: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            UPDATE sessions SET notes = $2, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {SESSION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .bind(notes)
            .fetch_optional(executor)
            .await
    }

    /// Replaces the staff-only notes
    pub async fn update_private_notes<'e, E>(
        executor: E,
        id: Uuid,
        notes: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            UPDATE sessions SET private_notes = $2, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {SESSION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .bind(notes)
            .fetch_optional(executor)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_matches_db_labels() {
        for status in SessionStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_status_array_type_name() {
        use sqlx::TypeInfo;
        assert_eq!(SessionStatus::array_type_info().name(), "_session_status");
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("confirmed".parse::<SessionStatus>(), Ok(SessionStatus::Confirmed));
        assert_eq!(" Available ".parse::<SessionStatus>(), Ok(SessionStatus::Available));
        assert!("booked".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Cancelled.is_terminal());
        assert!(!SessionStatus::Scheduled.is_terminal());
    }

    #[test]
    fn test_redaction_hides_private_notes() {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            session_date: now,
            end_date: None,
            duration: 60,
            status: SessionStatus::Scheduled,
            client_id: None,
            trainer_id: None,
            location: "Main Studio".into(),
            session_type: "Standard Training".into(),
            notes: String::new(),
            private_notes: Some("knee injury".into()),
            booking_date: None,
            session_deducted: false,
            deduction_date: None,
            cancelled_by: None,
            cancellation_reason: None,
            cancellation_date: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let json = serde_json::to_value(session.redacted_for_client()).unwrap();
        assert!(json.get("private_notes").is_none());
        assert_eq!(json["status"], "scheduled");
    }
}
