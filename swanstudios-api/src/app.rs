/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use swanstudios_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer, routes};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use swanstudios_shared::auth::middleware::{jwt_auth_middleware, AuthError};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete router
///
/// ```text
/// /health, /api/health                      public
/// /api/auth/{register,login,refresh}        public
/// /api/auth/me                              JWT
/// /api/admin/users[/:id]                    JWT, admin
/// /api/schedule                             JWT
/// /api/sessions/...                         JWT, role per handler
/// /api/exercises                            public
/// /api/admin/exercise-library[/:id]         JWT, staff
/// /api/videos                               public
/// /api/admin/videos[/:id]                   JWT, admin
/// /api/contact                              POST public, GET JWT admin
/// /api/contact/:id/viewed                   JWT, admin
/// /api/storefront                           public
/// /api/admin/storefront[/:id[/grant]]       JWT, admin
/// /api/v1/gamification/{me,actions}         JWT
/// /api/v1/gamification/leaderboard          public
/// /api/workouts                             JWT
/// ```
///
/// Layers, outermost first: security headers, CORS, compression, tracing.
pub fn build_router(state: AppState) -> Router {
    let require_auth = from_fn_with_state(state.clone(), jwt_auth_layer);

    let public = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/health", get(routes::health::health_check))
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/refresh", post(routes::auth::refresh))
        .route("/api/exercises", get(routes::exercises::browse_exercises))
        .route("/api/videos", get(routes::videos::list_public_videos))
        .route("/api/storefront", get(routes::storefront::list_active))
        .route(
            "/api/v1/gamification/leaderboard",
            get(routes::gamification::leaderboard),
        )
        // Submitting is public, reading the inbox is not
        .route(
            "/api/contact",
            post(routes::contact::submit_contact)
                .merge(get(routes::contact::list_contacts).layer(require_auth.clone())),
        );

    let protected = Router::new()
        .route("/api/auth/me", get(routes::auth::me))
        .route("/api/admin/users", get(routes::users::list_users))
        .route(
            "/api/admin/users/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route("/api/schedule", get(routes::schedule::get_schedule))
        .route("/api/sessions", post(routes::sessions::create_slots))
        .route("/api/sessions/recurring", post(routes::sessions::create_recurring))
        .route("/api/sessions/book", post(routes::sessions::book_session))
        .route("/api/sessions/request", post(routes::sessions::request_session))
        .route("/api/sessions/:id", get(routes::sessions::get_session))
        .route("/api/sessions/:id/cancel", patch(routes::sessions::cancel_session))
        .route("/api/sessions/:id/confirm", patch(routes::sessions::confirm_session))
        .route("/api/sessions/:id/complete", patch(routes::sessions::complete_session))
        .route(
            "/api/sessions/:id/assign-trainer",
            patch(routes::sessions::assign_trainer),
        )
        .route("/api/sessions/:id/notes", patch(routes::sessions::update_notes))
        .route(
            "/api/admin/exercise-library",
            get(routes::exercises::list_exercises).post(routes::exercises::create_exercise),
        )
        .route(
            "/api/admin/exercise-library/:id",
            get(routes::exercises::get_exercise)
                .put(routes::exercises::update_exercise)
                .delete(routes::exercises::delete_exercise),
        )
        .route(
            "/api/admin/videos",
            get(routes::videos::list_videos).post(routes::videos::create_video),
        )
        .route(
            "/api/admin/videos/:id",
            get(routes::videos::get_video)
                .put(routes::videos::update_video)
                .delete(routes::videos::delete_video),
        )
        .route("/api/contact/:id/viewed", patch(routes::contact::mark_viewed))
        .route(
            "/api/admin/storefront",
            get(routes::storefront::list_all).post(routes::storefront::create_item),
        )
        .route(
            "/api/admin/storefront/:id",
            axum::routing::put(routes::storefront::update_item)
                .delete(routes::storefront::delete_item),
        )
        .route(
            "/api/admin/storefront/:id/grant",
            post(routes::storefront::grant_package),
        )
        .route("/api/v1/gamification/me", get(routes::gamification::my_status))
        .route("/api/v1/gamification/actions", post(routes::gamification::award))
        .route(
            "/api/workouts",
            get(routes::workouts::list_workouts).post(routes::workouts::log_workout),
        )
        .route_layer(require_auth);

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Permissive for `*`, otherwise the configured origin list
fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Validates the bearer token and injects `AuthContext`
async fn jwt_auth_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    jwt_auth_middleware(state.config.jwt.secret.clone(), req, next).await
}
