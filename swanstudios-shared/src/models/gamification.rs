/// Points ledger and achievements
///
/// Every award is an append-only row in `gamification_events`; totals,
/// levels and streaks are computed from the ledger on read. Awarding locks
/// the user's row first so concurrent awards can't both slip under a daily
/// limit.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use tracing::info;
use uuid::Uuid;

use crate::gamification::{
    self, Achievement, AchievementInputs, Action, GamificationError,
};

/// How far back streaks are computed from
const STREAK_LOOKBACK_DAYS: i32 = 400;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GamificationEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub points: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserAchievement {
    pub user_id: Uuid,
    pub achievement_key: String,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub total_points: i64,
}

/// Error type for awarding points
#[derive(Debug, thiserror::Error)]
pub enum AwardError {
    #[error(transparent)]
    Rules(#[from] GamificationError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of a successful award
#[derive(Debug, Clone, Serialize)]
pub struct AwardOutcome {
    pub action: Action,
    pub points_awarded: i64,
    pub multiplier: f64,
    pub total_points: i64,
    pub level: usize,
    pub level_up: bool,
    pub new_achievements: Vec<Achievement>,
}

/// Snapshot shown on the user's gamification page
#[derive(Debug, Clone, Serialize)]
pub struct GamificationStatus {
    pub total_points: i64,
    pub level: usize,
    pub level_progress: u8,
    pub next_level_points: Option<i64>,
    pub current_streak: i64,
    pub leaderboard_rank: Option<i64>,
    pub achievements: Vec<UserAchievement>,
    pub available_achievements: Vec<Achievement>,
}

/// Appends a ledger row
pub async fn record_event<'e, E>(
    executor: E,
    user_id: Uuid,
    action: &str,
    points: i64,
) -> Result<GamificationEvent, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, GamificationEvent>(
        r#"
        INSERT INTO gamification_events (user_id, action, points)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, action, points, created_at
        "#,
    )
    .bind(user_id)
    .bind(action)
    .bind(i32::try_from(points).unwrap_or(i32::MAX))
    .fetch_one(executor)
    .await
}

pub async fn total_points<'e, E>(executor: E, user_id: Uuid) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(points), 0)::BIGINT FROM gamification_events WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(executor)
    .await?;

    Ok(total)
}

/// Awards of `action` since UTC midnight
pub async fn count_today<'e, E>(executor: E, user_id: Uuid, action: &str) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM gamification_events
        WHERE user_id = $1
          AND action = $2
          AND created_at >= date_trunc('day', NOW() AT TIME ZONE 'UTC') AT TIME ZONE 'UTC'
        "#,
    )
    .bind(user_id)
    .bind(action)
    .fetch_one(executor)
    .await?;

    Ok(count)
}

pub async fn count_action<'e, E>(executor: E, user_id: Uuid, action: &str) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM gamification_events WHERE user_id = $1 AND action = $2",
    )
    .bind(user_id)
    .bind(action)
    .fetch_one(executor)
    .await?;

    Ok(count)
}

/// Distinct UTC days with a completed workout, newest first
pub async fn workout_days<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<NaiveDate>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let rows: Vec<(NaiveDate,)> = sqlx::query_as(
        r#"
        SELECT DISTINCT (created_at AT TIME ZONE 'UTC')::date AS day
        FROM gamification_events
        WHERE user_id = $1
          AND action = 'workout_completed'
          AND created_at >= NOW() - make_interval(days => $2)
        ORDER BY day DESC
        "#,
    )
    .bind(user_id)
    .bind(STREAK_LOOKBACK_DAYS)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(|(d,)| d).collect())
}

pub async fn achievements<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<UserAchievement>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, UserAchievement>(
        r#"
        SELECT user_id, achievement_key, awarded_at
        FROM user_achievements
        WHERE user_id = $1
        ORDER BY awarded_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Inserts an achievement; false if the user already had it
pub async fn grant_achievement<'e, E>(
    executor: E,
    user_id: Uuid,
    achievement: Achievement,
) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO user_achievements (user_id, achievement_key)
        VALUES ($1, $2)
        ON CONFLICT (user_id, achievement_key) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(achievement.key())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Top users by points among live accounts
pub async fn leaderboard<'e, E>(executor: E, limit: i64) -> Result<Vec<LeaderboardEntry>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, LeaderboardEntry>(
        r#"
        SELECT u.id AS user_id, u.first_name, u.last_name,
               COALESCE(SUM(g.points), 0)::BIGINT AS total_points
        FROM users u
        JOIN gamification_events g ON g.user_id = u.id
        WHERE u.deleted_at IS NULL
        GROUP BY u.id, u.first_name, u.last_name
        ORDER BY total_points DESC, u.id ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(executor)
    .await
}

/// 1-based leaderboard position; None if the user has no points
pub async fn leaderboard_rank<'e, E>(executor: E, user_id: Uuid) -> Result<Option<i64>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        WITH totals AS (
            SELECT g.user_id, SUM(g.points) AS total
            FROM gamification_events g
            JOIN users u ON u.id = g.user_id AND u.deleted_at IS NULL
            GROUP BY g.user_id
        )
        SELECT rank FROM (
            SELECT user_id, RANK() OVER (ORDER BY total DESC) AS rank FROM totals
        ) ranked
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|(rank,)| rank))
}

/// Awards points for an action and unlocks any achievements it completes
///
/// Must run inside the caller's transaction.
///
/// # Errors
///
/// `AwardError::Rules` when a daily limit is already used up.
pub async fn award_action(
    conn: &mut PgConnection,
    user_id: Uuid,
    action: Action,
    form_score: Option<f64>,
) -> Result<AwardOutcome, AwardError> {
    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let awarded_today = count_today(&mut *conn, user_id, action.as_str()).await?;
    gamification::check_daily_limit(action, awarded_today)?;

    let before = total_points(&mut *conn, user_id).await?;

    let today = Utc::now().date_naive();
    let mut days = workout_days(&mut *conn, user_id).await?;
    if action == Action::WorkoutCompleted {
        days.push(today);
    }
    let streak = gamification::current_streak(&days, today);

    let multiplier = gamification::multiplier(action, streak);
    let points = gamification::points_for(action, streak);
    record_event(&mut *conn, user_id, action.as_str(), points).await?;

    let earned: Vec<Achievement> = achievements(&mut *conn, user_id)
        .await?
        .iter()
        .filter_map(|a| Achievement::from_key(&a.achievement_key))
        .collect();

    let inputs = AchievementInputs {
        workout_count: count_action(&mut *conn, user_id, Action::WorkoutCompleted.as_str()).await?,
        streak,
        helped_count: count_action(&mut *conn, user_id, Action::HelpedCommunity.as_str()).await?,
        form_score,
    };

    let mut new_achievements = Vec::new();
    for achievement in gamification::newly_unlocked(action, &inputs, &earned) {
        if grant_achievement(&mut *conn, user_id, achievement).await? {
            let key = format!("achievement:{}", achievement.key());
            record_event(&mut *conn, user_id, &key, achievement.points()).await?;
            new_achievements.push(achievement);
        }
    }

    let after = total_points(&mut *conn, user_id).await?;
    let level = gamification::level_for_points(after);
    let level_up = level > gamification::level_for_points(before);

    info!(
        user_id = %user_id,
        action = %action,
        points,
        multiplier,
        level,
        level_up,
        new_achievements = new_achievements.len(),
        "Points awarded"
    );

    Ok(AwardOutcome {
        action,
        points_awarded: points,
        multiplier,
        total_points: after,
        level,
        level_up,
        new_achievements,
    })
}

/// Builds the status snapshot for a user
pub async fn status(conn: &mut PgConnection, user_id: Uuid) -> Result<GamificationStatus, sqlx::Error> {
    let total = total_points(&mut *conn, user_id).await?;
    let days = workout_days(&mut *conn, user_id).await?;
    let earned = achievements(&mut *conn, user_id).await?;
    let rank = leaderboard_rank(&mut *conn, user_id).await?;

    let level = gamification::level_for_points(total);
    let available = Achievement::ALL
        .iter()
        .copied()
        .filter(|a| !earned.iter().any(|e| e.achievement_key == a.key()))
        .collect();

    Ok(GamificationStatus {
        total_points: total,
        level,
        level_progress: gamification::level_progress(total),
        next_level_points: gamification::next_level_points(level),
        current_streak: gamification::current_streak(&days, Utc::now().date_naive()),
        leaderboard_rank: rank,
        achievements: earned,
        available_achievements: available,
    })
}
