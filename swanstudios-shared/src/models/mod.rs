/// Database models for the studio
///
/// Each model owns its SQL. Query functions take any `PgExecutor`, so the
/// same call works against the pool or inside a request transaction
/// (`&mut *tx`).
///
/// # Models
///
/// - `user`: accounts, roles and session credits
/// - `session`: bookable training sessions
/// - `exercise`: exercise library
/// - `video`: instructional videos
/// - `contact`: contact form inbox
/// - `storefront`: session packages
/// - `gamification`: points ledger and achievements
/// - `workout`: logged workouts
///
/// # Example
///
/// ```no_run
/// use swanstudios_shared::models::session::Session;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, session_id: Uuid, client_id: Uuid) -> Result<(), sqlx::Error> {
/// let mut tx = pool.begin().await?;
/// if let Some(booked) = Session::book(&mut *tx, session_id, client_id).await? {
///     println!("Booked {}", booked.id);
/// }
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

pub mod contact;
pub mod exercise;
pub mod gamification;
pub mod session;
pub mod storefront;
pub mod user;
pub mod video;
pub mod workout;
