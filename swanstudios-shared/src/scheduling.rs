//! Booking rules for training sessions
//!
//! Everything here is pure so the API handlers can decide what to write
//! before touching the database, and so the rules are unit-testable without
//! Postgres.
//!
//! - A booked session costs one credit once it is inside the 24-hour window.
//! - Cancelling refunds a deducted credit when an admin cancels, or when the
//!   client asks for an early cancel more than 24 hours ahead.
//! - Recurring slots expand weekday/time pairs over an inclusive date range.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::models::session::SessionStatus;

/// Hours before start at which a booking starts costing a credit
pub const DEDUCTION_WINDOW_HOURS: i64 = 24;

/// Default slot length in minutes
pub const DEFAULT_DURATION_MINUTES: i32 = 60;

pub const DEFAULT_LOCATION: &str = "Main Studio";

pub const DEFAULT_SESSION_TYPE: &str = "Standard Training";

pub const DEFAULT_CANCEL_REASON: &str = "Cancelled by user";

pub const EARLY_CANCEL_PREFIX: &str = "[Early Cancel - No Charge]";

/// True if the session starts within the deduction window from `now`
///
/// Sessions already in the past count as inside the window.
pub fn within_deduction_window(session_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    session_date - now <= Duration::hours(DEDUCTION_WINDOW_HOURS)
}

/// Who is cancelling, relative to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Canceller {
    Admin,
    Participant,
}

/// Outcome of a cancellation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationDecision {
    /// Refund the deducted credit
    pub refund: bool,

    /// The early-cancel request was honoured
    pub early_cancel: bool,

    /// Reason to store on the session
    pub reason: String,
}

/// Applies the cancellation rules
///
/// Early cancel only applies when requested and the session is more than
/// [`DEDUCTION_WINDOW_HOURS`] away. A refund happens only if a credit was
/// actually deducted.
pub fn decide_cancellation(
    canceller: Canceller,
    session_date: DateTime<Utc>,
    now: DateTime<Utc>,
    session_deducted: bool,
    early_cancel_requested: bool,
    reason: Option<&str>,
) -> CancellationDecision {
    let early_cancel = early_cancel_requested && !within_deduction_window(session_date, now);
    let refund = session_deducted && (canceller == Canceller::Admin || early_cancel);

    let base = reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_CANCEL_REASON);

    let reason = if early_cancel {
        format!("{} {}", EARLY_CANCEL_PREFIX, base)
    } else {
        base.to_string()
    };

    CancellationDecision {
        refund,
        early_cancel,
        reason,
    }
}

/// States a session can be confirmed from
pub const CONFIRMABLE: &[SessionStatus] = &[SessionStatus::Scheduled, SessionStatus::Requested];

/// States a session can be completed from
pub const COMPLETABLE: &[SessionStatus] = &[SessionStatus::Confirmed, SessionStatus::Scheduled];

/// States a trainer can be assigned from
pub const ASSIGNABLE: &[SessionStatus] = &[SessionStatus::Requested];

/// Parses an `HH:MM` wall-clock time
pub fn parse_slot_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| format!("Invalid time '{}', expected HH:MM", value))
}

/// Recurring slot request
#[derive(Debug, Clone)]
pub struct RecurrencePattern {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    /// 0 = Sunday .. 6 = Saturday
    pub days_of_week: Vec<u32>,

    /// `HH:MM` times, UTC
    pub times: Vec<String>,
}

/// Expands a recurrence pattern into future slot start times
///
/// Days are inclusive of both ends. Slots at or before `now` are skipped.
///
/// # Errors
///
/// - start date not before end date
/// - a weekday outside 0..=6 or an unparseable time
/// - nothing left after dropping past slots
pub fn expand_recurrence(
    pattern: &RecurrencePattern,
    now: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>, String> {
    if pattern.start_date >= pattern.end_date {
        return Err("End date must be after start date".to_string());
    }

    if let Some(day) = pattern.days_of_week.iter().find(|d| **d > 6) {
        return Err(format!("Invalid day of week {}, expected 0-6", day));
    }

    let times = pattern
        .times
        .iter()
        .map(|t| parse_slot_time(t))
        .collect::<Result<Vec<_>, _>>()?;

    let mut slots = Vec::new();
    let mut day = pattern.start_date;

    while day <= pattern.end_date {
        if pattern
            .days_of_week
            .contains(&day.weekday().num_days_from_sunday())
        {
            for time in &times {
                let start = Utc.from_utc_datetime(&day.and_time(*time));
                if start > now {
                    slots.push(start);
                }
            }
        }

        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    if slots.is_empty() {
        return Err("No valid future sessions could be generated".to_string());
    }

    slots.sort();
    Ok(slots)
}

/// End time for a slot of `duration_minutes`
pub fn slot_end(start: DateTime<Utc>, duration_minutes: i32) -> DateTime<Utc> {
    start + Duration::minutes(i64::from(duration_minutes))
}
