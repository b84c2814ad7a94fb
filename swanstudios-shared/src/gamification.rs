//! Points, levels, streaks and achievements
//!
//! The rules are pure functions over numbers the caller reads from the
//! points ledger; persistence lives in [`crate::models::gamification`].
//!
//! # Example
//!
//! ```
//! use swanstudios_shared::gamification::{level_for_points, level_progress, Action};
//!
//! assert_eq!(Action::WorkoutCompleted.base_points(), 100);
//! assert_eq!(level_for_points(0), 1);
//! assert_eq!(level_for_points(750), 2);
//! assert_eq!(level_progress(750), 50);
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Cumulative points needed for each level; index 0 is level 1
pub const LEVEL_THRESHOLDS: [i64; 26] = [
    0, 500, 1000, 1750, 2750, 4000, 5500, 7250, 9250, 11500, 14000, 17000, 20500, 24500, 29000,
    34000, 40000, 47000, 55000, 64000, 74000, 85000, 97000, 110000, 124000, 139000,
];

/// Upper bound on the streak multiplier
pub const MAX_MULTIPLIER: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GamificationError {
    #[error("Unknown action for points: {0}")]
    UnknownAction(String),

    #[error("Daily limit of {limit} reached for {action}")]
    DailyLimitReached { action: Action, limit: i64 },
}

/// Point-earning action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    WorkoutCompleted,
    #[serde(rename = "workout_streak_3")]
    WorkoutStreak3,
    #[serde(rename = "workout_streak_7")]
    WorkoutStreak7,
    #[serde(rename = "workout_streak_14")]
    WorkoutStreak14,
    GoalAchieved,
    FormImprovement,
    HelpedCommunity,
    ProfileUpdated,
    CheckInLogged,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::WorkoutCompleted,
        Action::WorkoutStreak3,
        Action::WorkoutStreak7,
        Action::WorkoutStreak14,
        Action::GoalAchieved,
        Action::FormImprovement,
        Action::HelpedCommunity,
        Action::ProfileUpdated,
        Action::CheckInLogged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::WorkoutCompleted => "workout_completed",
            Action::WorkoutStreak3 => "workout_streak_3",
            Action::WorkoutStreak7 => "workout_streak_7",
            Action::WorkoutStreak14 => "workout_streak_14",
            Action::GoalAchieved => "goal_achieved",
            Action::FormImprovement => "form_improvement",
            Action::HelpedCommunity => "helped_community",
            Action::ProfileUpdated => "profile_updated",
            Action::CheckInLogged => "check_in_logged",
        }
    }

    /// Points before any multiplier
    pub fn base_points(&self) -> i64 {
        match self {
            Action::WorkoutCompleted => 100,
            Action::WorkoutStreak3 => 150,
            Action::WorkoutStreak7 => 300,
            Action::WorkoutStreak14 => 500,
            Action::GoalAchieved => 200,
            Action::FormImprovement => 75,
            Action::HelpedCommunity => 50,
            Action::ProfileUpdated => 25,
            Action::CheckInLogged => 15,
        }
    }

    /// Max awards per UTC day, if limited
    pub fn daily_limit(&self) -> Option<i64> {
        match self {
            Action::ProfileUpdated => Some(1),
            Action::CheckInLogged => Some(3),
            _ => None,
        }
    }

    /// Workout and streak actions earn the streak bonus
    pub fn is_streak_eligible(&self) -> bool {
        matches!(
            self,
            Action::WorkoutCompleted
                | Action::WorkoutStreak3
                | Action::WorkoutStreak7
                | Action::WorkoutStreak14
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = GamificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| GamificationError::UnknownAction(s.to_string()))
    }
}

/// Level (1-based) for a point total
pub fn level_for_points(points: i64) -> usize {
    LEVEL_THRESHOLDS
        .iter()
        .rposition(|threshold| points >= *threshold)
        .map_or(1, |idx| idx + 1)
}

/// Points needed to reach the level after `level`, None at max level
pub fn next_level_points(level: usize) -> Option<i64> {
    LEVEL_THRESHOLDS.get(level).copied()
}

/// Percent (0-100) of the way from the current level to the next
pub fn level_progress(points: i64) -> u8 {
    let level = level_for_points(points);
    let current = LEVEL_THRESHOLDS[level - 1];

    match next_level_points(level) {
        Some(next) => {
            let pct = ((points - current) as f64 / (next - current) as f64 * 100.0).round();
            pct.clamp(0.0, 100.0) as u8
        }
        None => 100,
    }
}

/// Consecutive active days ending today or yesterday
///
/// `active_days` may be unsorted and contain duplicates. A streak that
/// ended before yesterday is broken and counts as zero.
pub fn current_streak(active_days: &[NaiveDate], today: NaiveDate) -> i64 {
    let mut days: Vec<NaiveDate> = active_days.iter().copied().filter(|d| *d <= today).collect();
    days.sort_unstable_by(|a, b| b.cmp(a));
    days.dedup();

    let Some(&latest) = days.first() else {
        return 0;
    };

    if (today - latest).num_days() > 1 {
        return 0;
    }

    let mut streak = 1;
    for pair in days.windows(2) {
        if (pair[0] - pair[1]).num_days() == 1 {
            streak += 1;
        } else {
            break;
        }
    }

    streak
}

/// Streak bonus multiplier, capped at [`MAX_MULTIPLIER`]
pub fn multiplier(action: Action, streak: i64) -> f64 {
    let mut m: f64 = 1.0;

    if action.is_streak_eligible() {
        if streak >= 7 {
            m += 0.2;
        }
        if streak >= 14 {
            m += 0.3;
        }
        if streak >= 30 {
            m += 0.5;
        }
    }

    m.min(MAX_MULTIPLIER)
}

/// Final points for an award
pub fn points_for(action: Action, streak: i64) -> i64 {
    (action.base_points() as f64 * multiplier(action, streak)).round() as i64
}

/// Rejects an award once the action's daily limit is used up
pub fn check_daily_limit(action: Action, awarded_today: i64) -> Result<(), GamificationError> {
    match action.daily_limit() {
        Some(limit) if awarded_today >= limit => {
            Err(GamificationError::DailyLimitReached { action, limit })
        }
        _ => Ok(()),
    }
}

/// Unlockable badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    FirstWorkout,
    WeekWarrior,
    FormMaster,
    CommunityHelper,
    ConsistencyChampion,
}

impl Achievement {
    pub const ALL: [Achievement; 5] = [
        Achievement::FirstWorkout,
        Achievement::WeekWarrior,
        Achievement::FormMaster,
        Achievement::CommunityHelper,
        Achievement::ConsistencyChampion,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Achievement::FirstWorkout => "first_workout",
            Achievement::WeekWarrior => "week_warrior",
            Achievement::FormMaster => "form_master",
            Achievement::CommunityHelper => "community_helper",
            Achievement::ConsistencyChampion => "consistency_champion",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.key() == key)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Achievement::FirstWorkout => "First Steps",
            Achievement::WeekWarrior => "Week Warrior",
            Achievement::FormMaster => "Form Master",
            Achievement::CommunityHelper => "Community Helper",
            Achievement::ConsistencyChampion => "Consistency Champion",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Achievement::FirstWorkout => "Complete your first workout",
            Achievement::WeekWarrior => "Complete workouts for 7 consecutive days",
            Achievement::FormMaster => "Maintain perfect form for an entire workout",
            Achievement::CommunityHelper => "Help 10 other members with their fitness journey",
            Achievement::ConsistencyChampion => "Work out every day for a month",
        }
    }

    /// Bonus points granted on unlock
    pub fn points(&self) -> i64 {
        match self {
            Achievement::FirstWorkout => 50,
            Achievement::WeekWarrior => 300,
            Achievement::FormMaster => 200,
            Achievement::CommunityHelper => 150,
            Achievement::ConsistencyChampion => 1000,
        }
    }
}

/// Everything known about the user right after an award
#[derive(Debug, Clone, Default)]
pub struct AchievementInputs {
    pub workout_count: i64,
    pub streak: i64,
    pub helped_count: i64,
    pub form_score: Option<f64>,
}

/// Achievements newly unlocked by `action`, skipping ones already `earned`
pub fn newly_unlocked(
    action: Action,
    inputs: &AchievementInputs,
    earned: &[Achievement],
) -> Vec<Achievement> {
    let mut unlocked = Vec::new();

    if action == Action::WorkoutCompleted && inputs.workout_count >= 1 {
        unlocked.push(Achievement::FirstWorkout);
    }

    if action.is_streak_eligible() {
        if inputs.streak >= 7 {
            unlocked.push(Achievement::WeekWarrior);
        }
        if inputs.streak >= 30 {
            unlocked.push(Achievement::ConsistencyChampion);
        }
    }

    if action == Action::HelpedCommunity && inputs.helped_count >= 10 {
        unlocked.push(Achievement::CommunityHelper);
    }

    if inputs.form_score.is_some_and(|score| score >= 95.0) {
        unlocked.push(Achievement::FormMaster);
    }

    unlocked.retain(|a| !earned.contains(a));
    unlocked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_level_for_points() {
        assert_eq!(level_for_points(0), 1);
        assert_eq!(level_for_points(499), 1);
        assert_eq!(level_for_points(500), 2);
        assert_eq!(level_for_points(1749), 3);
        assert_eq!(level_for_points(139_000), 26);
        assert_eq!(level_for_points(1_000_000), 26);
        assert_eq!(level_for_points(-5), 1);
    }

    #[test]
    fn test_next_level_points() {
        assert_eq!(next_level_points(1), Some(500));
        assert_eq!(next_level_points(25), Some(139_000));
        assert_eq!(next_level_points(26), None);
    }

    #[test]
    fn test_level_progress() {
        assert_eq!(level_progress(0), 0);
        assert_eq!(level_progress(250), 50);
        assert_eq!(level_progress(1000), 0);
        assert_eq!(level_progress(1375), 50);
        assert_eq!(level_progress(200_000), 100);
    }

    #[test]
    fn test_current_streak() {
        let today = day(2025, 3, 10);
        assert_eq!(current_streak(&[], today), 0);
        assert_eq!(current_streak(&[today], today), 1);
        assert_eq!(
            current_streak(&[day(2025, 3, 9), day(2025, 3, 8), day(2025, 3, 8), day(2025, 3, 7)], today),
            3
        );
        assert_eq!(current_streak(&[day(2025, 3, 10), day(2025, 3, 8)], today), 1);
        assert_eq!(current_streak(&[day(2025, 3, 7), day(2025, 3, 6)], today), 0);
    }

    #[test]
    fn test_multiplier() {
        assert_eq!(multiplier(Action::WorkoutCompleted, 0), 1.0);
        assert!((multiplier(Action::WorkoutCompleted, 7) - 1.2).abs() < 1e-9);
        assert!((multiplier(Action::WorkoutCompleted, 14) - 1.5).abs() < 1e-9);
        assert!((multiplier(Action::WorkoutStreak14, 30) - 2.0).abs() < 1e-9);
        assert_eq!(multiplier(Action::ProfileUpdated, 100), 1.0);
        assert!(multiplier(Action::WorkoutCompleted, 1000) <= MAX_MULTIPLIER);
    }

    #[test]
    fn test_points_for() {
        assert_eq!(points_for(Action::WorkoutCompleted, 0), 100);
        assert_eq!(points_for(Action::WorkoutCompleted, 7), 120);
        assert_eq!(points_for(Action::CheckInLogged, 30), 15);
    }

    #[test]
    fn test_daily_limit() {
        assert!(check_daily_limit(Action::ProfileUpdated, 0).is_ok());
        assert_eq!(
            check_daily_limit(Action::ProfileUpdated, 1),
            Err(GamificationError::DailyLimitReached {
                action: Action::ProfileUpdated,
                limit: 1
            })
        );
        assert!(check_daily_limit(Action::CheckInLogged, 2).is_ok());
        assert!(check_daily_limit(Action::CheckInLogged, 3).is_err());
        assert!(check_daily_limit(Action::WorkoutCompleted, 50).is_ok());
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("goal_achieved".parse::<Action>().unwrap(), Action::GoalAchieved);
        assert_eq!(
            "lift_the_car".parse::<Action>().unwrap_err(),
            GamificationError::UnknownAction("lift_the_car".into())
        );
        for action in Action::ALL {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
            assert_eq!(serde_json::from_str::<Action>(&json).unwrap(), action);
        }
    }

    #[test]
    fn test_newly_unlocked() {
        let inputs = AchievementInputs {
            workout_count: 1,
            streak: 7,
            ..Default::default()
        };
        let unlocked = newly_unlocked(Action::WorkoutCompleted, &inputs, &[]);
        assert_eq!(unlocked, vec![Achievement::FirstWorkout, Achievement::WeekWarrior]);

        let unlocked =
            newly_unlocked(Action::WorkoutCompleted, &inputs, &[Achievement::FirstWorkout]);
        assert_eq!(unlocked, vec![Achievement::WeekWarrior]);

        let helper = AchievementInputs {
            helped_count: 10,
            ..Default::default()
        };
        assert_eq!(
            newly_unlocked(Action::HelpedCommunity, &helper, &[]),
            vec![Achievement::CommunityHelper]
        );

        let form = AchievementInputs {
            form_score: Some(96.0),
            ..Default::default()
        };
        assert_eq!(
            newly_unlocked(Action::FormImprovement, &form, &[]),
            vec![Achievement::FormMaster]
        );
    }

    #[test]
    fn test_achievement_keys_round_trip() {
        for a in Achievement::ALL {
            assert_eq!(Achievement::from_key(a.key()), Some(a));
        }
        assert_eq!(Achievement::from_key("nope"), None);
    }
}
