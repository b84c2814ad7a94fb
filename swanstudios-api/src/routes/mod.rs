/// API route handlers, one module per resource
///
/// - `health`: liveness and database connectivity
/// - `auth`: register, login, refresh, current user
/// - `users`: admin user management
/// - `schedule`: calendar view
/// - `sessions`: slot creation, booking, cancellation and the session lifecycle
/// - `exercises`: exercise library
/// - `videos`: instructional videos
/// - `contact`: contact form inbox
/// - `storefront`: session packages
/// - `gamification`: points, levels, leaderboard
/// - `workouts`: workout log

pub mod auth;
pub mod contact;
pub mod exercises;
pub mod gamification;
pub mod health;
pub mod schedule;
pub mod sessions;
pub mod storefront;
pub mod users;
pub mod videos;
pub mod workouts;

use serde::Deserialize;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

/// `?limit=&offset=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Clamped to 1..=MAX_PAGE_SIZE
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults_and_clamps() {
        let page = Pagination::default();
        assert_eq!(page.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(page.offset(), 0);

        let page = Pagination {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(page.limit(), MAX_PAGE_SIZE);
        assert_eq!(page.offset(), 0);

        let page = Pagination {
            limit: Some(0),
            offset: Some(20),
        };
        assert_eq!(page.limit(), 1);
        assert_eq!(page.offset(), 20);
    }
}
