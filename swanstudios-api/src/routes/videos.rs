/// Instructional videos
///
/// `GET /api/videos` lists public videos for anyone. Admins manage the full
/// catalogue under `/api/admin/videos`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    routes::{users::double_option, Pagination},
};
use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use swanstudios_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    models::video::{CreateVideo, UpdateVideo, Video},
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct VideoFilter {
    pub exercise_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVideoRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(url(message = "URL must be valid"))]
    pub url: String,

    pub exercise_id: Option<Uuid>,

    #[validate(range(min = 1, message = "Duration must be positive"))]
    pub duration_seconds: Option<i32>,

    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateVideoRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[validate(url(message = "URL must be valid"))]
    pub url: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub exercise_id: Option<Option<Uuid>>,

    #[serde(default, deserialize_with = "double_option")]
    pub duration_seconds: Option<Option<i32>>,

    pub is_public: Option<bool>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Video not found".to_string())
}

pub async fn list_public_videos(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<VideoFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Json<Vec<Video>>> {
    let videos = Video::list(&state.db, true, filter.exercise_id, page.limit(), page.offset()).await?;
    Ok(Json(videos))
}

pub async fn list_videos(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(filter): ApiQuery<VideoFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Json<Vec<Video>>> {
    require_admin(&auth)?;

    let videos = Video::list(&state.db, false, filter.exercise_id, page.limit(), page.offset()).await?;
    Ok(Json(videos))
}

pub async fn get_video(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Video>> {
    require_admin(&auth)?;

    let video = Video::find_by_id(&state.db, id).await?.ok_or_else(not_found)?;
    Ok(Json(video))
}

pub async fn create_video(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateVideoRequest>,
) -> ApiResult<(StatusCode, Json<Video>)> {
    require_admin(&auth)?;
    req.validate()?;

    let mut tx = state.db.begin().await?;
    let video = Video::create(
        &mut *tx,
        CreateVideo {
            title: req.title.trim().to_string(),
            url: req.url,
            exercise_id: req.exercise_id,
            duration_seconds: req.duration_seconds,
            is_public: req.is_public,
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(video_id = %video.id, "Video created");
    Ok((StatusCode::CREATED, Json(video)))
}

pub async fn update_video(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateVideoRequest>,
) -> ApiResult<Json<Video>> {
    require_admin(&auth)?;
    req.validate()?;

    if let Some(Some(seconds)) = req.duration_seconds {
        if seconds < 1 {
            return Err(ApiError::invalid("duration_seconds", "Duration must be positive"));
        }
    }

    let mut tx = state.db.begin().await?;
    let video = Video::update(
        &mut *tx,
        id,
        UpdateVideo {
            title: req.title.map(|t| t.trim().to_string()),
            url: req.url,
            exercise_id: req.exercise_id,
            duration_seconds: req.duration_seconds,
            is_public: req.is_public,
        },
    )
    .await?
    .ok_or_else(not_found)?;
    tx.commit().await?;

    Ok(Json(video))
}

pub async fn delete_video(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Value>> {
    require_admin(&auth)?;

    let mut tx = state.db.begin().await?;
    if !Video::soft_delete(&mut *tx, id).await? {
        return Err(not_found());
    }
    tx.commit().await?;

    Ok(Json(json!({ "message": "Video deleted", "id": id })))
}
