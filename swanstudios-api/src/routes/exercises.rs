/// Exercise library
///
/// Staff manage the library under `/api/admin/exercise-library`; anyone can
/// browse it at `GET /api/exercises`.
///
/// ```text
/// GET    /api/exercises?search=squat&category=legs&difficulty=beginner&limit=20
/// GET    /api/admin/exercise-library
/// POST   /api/admin/exercise-library
/// GET    /api/admin/exercise-library/:id
/// PUT    /api/admin/exercise-library/:id
/// DELETE /api/admin/exercise-library/:id
/// ```

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
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use swanstudios_shared::{
    auth::{authorization::require_staff, middleware::AuthContext},
    models::exercise::{CreateExercise, Difficulty, Exercise, ExerciseQuery, UpdateExercise},
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ExerciseFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Serialize)]
pub struct ExerciseListResponse {
    pub exercises: Vec<Exercise>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExerciseRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: String,

    #[validate(length(min = 1, max = 100, message = "Category must be 1-100 characters"))]
    pub category: String,

    pub difficulty: Difficulty,

    #[serde(default)]
    pub primary_muscles: Vec<String>,

    #[serde(default)]
    pub equipment: Vec<String>,

    #[serde(default)]
    pub instructions: Vec<String>,

    #[validate(url(message = "Video URL must be a valid URL"))]
    pub video_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateExerciseRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Category must be 1-100 characters"))]
    pub category: Option<String>,

    pub difficulty: Option<Difficulty>,
    pub primary_muscles: Option<Vec<String>>,
    pub equipment: Option<Vec<String>>,
    pub instructions: Option<Vec<String>>,

    /// `null` removes the video
    #[serde(default, deserialize_with = "double_option")]
    pub video_url: Option<Option<String>>,
}

/// Trims entries and drops blanks
fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn not_found() -> ApiError {
    ApiError::NotFound("Exercise not found".to_string())
}

async fn search(
    state: &AppState,
    filter: ExerciseFilter,
    page: Pagination,
) -> ApiResult<ExerciseListResponse> {
    let query = ExerciseQuery {
        search: filter.search.filter(|s| !s.trim().is_empty()),
        category: filter.category.filter(|s| !s.trim().is_empty()),
        difficulty: filter.difficulty,
        limit: page.limit(),
        offset: page.offset(),
    };

    let exercises = Exercise::list(&state.db, &query).await?;
    let total = Exercise::count(&state.db, &query).await?;

    Ok(ExerciseListResponse {
        exercises,
        total,
        limit: query.limit,
        offset: query.offset,
    })
}

/// Public browse
pub async fn browse_exercises(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ExerciseFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Json<ExerciseListResponse>> {
    Ok(Json(search(&state, filter, page).await?))
}

pub async fn list_exercises(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(filter): ApiQuery<ExerciseFilter>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Json<ExerciseListResponse>> {
    require_staff(&auth)?;
    Ok(Json(search(&state, filter, page).await?))
}

pub async fn create_exercise(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateExerciseRequest>,
) -> ApiResult<(StatusCode, Json<Exercise>)> {
    require_staff(&auth)?;
    req.validate()?;

    let mut tx = state.db.begin().await?;
    let exercise = Exercise::create(
        &mut *tx,
        CreateExercise {
            name: req.name.trim().to_string(),
            description: req.description,
            category: req.category.trim().to_string(),
            difficulty: req.difficulty,
            primary_muscles: clean_list(req.primary_muscles),
            equipment: clean_list(req.equipment),
            instructions: clean_list(req.instructions),
            video_url: req.video_url,
            created_by: Some(auth.user_id),
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(exercise_id = %exercise.id, name = %exercise.name, "Exercise created");
    Ok((StatusCode::CREATED, Json(exercise)))
}

pub async fn get_exercise(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Exercise>> {
    require_staff(&auth)?;

    let exercise = Exercise::find_by_id(&state.db, id).await?.ok_or_else(not_found)?;
    Ok(Json(exercise))
}

pub async fn update_exercise(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateExerciseRequest>,
) -> ApiResult<Json<Exercise>> {
    require_staff(&auth)?;
    req.validate()?;

    if let Some(Some(url)) = &req.video_url {
        if !validator::ValidateUrl::validate_url(url) {
            return Err(ApiError::invalid("video_url", "Video URL must be a valid URL"));
        }
    }

    let mut tx = state.db.begin().await?;
    let exercise = Exercise::update(
        &mut *tx,
        id,
        UpdateExercise {
            name: req.name.map(|n| n.trim().to_string()),
            description: req.description,
            category: req.category.map(|c| c.trim().to_string()),
            difficulty: req.difficulty,
            primary_muscles: req.primary_muscles.map(clean_list),
            equipment: req.equipment.map(clean_list),
            instructions: req.instructions.map(clean_list),
            video_url: req.video_url,
        },
    )
    .await?
    .ok_or_else(not_found)?;
    tx.commit().await?;

    Ok(Json(exercise))
}

pub async fn delete_exercise(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Value>> {
    require_staff(&auth)?;

    let mut tx = state.db.begin().await?;
    if !Exercise::soft_delete(&mut *tx, id).await? {
        return Err(not_found());
    }
    tx.commit().await?;

    tracing::info!(exercise_id = %id, by = %auth.user_id, "Exercise deleted");
    Ok(Json(json!({ "message": "Exercise deleted", "id": id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_list() {
        assert_eq!(
            clean_list(vec![" quads ".into(), "".into(), "glutes".into()]),
            vec!["quads", "glutes"]
        );
    }

    #[test]
    fn test_create_request_defaults_and_validation() {
        let req: CreateExerciseRequest = serde_json::from_str(
            r#"{"name": "Goblet Squat", "category": "legs", "difficulty": "beginner"}"#,
        )
        .unwrap();
        assert!(req.primary_muscles.is_empty());
        assert!(req.validate().is_ok());

        let bad: CreateExerciseRequest = serde_json::from_str(
            r#"{"name": "", "category": "legs", "difficulty": "advanced", "video_url": "not a url"}"#,
        )
        .unwrap();
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("video_url"));
    }

    #[test]
    fn test_unknown_difficulty_is_rejected() {
        let parsed = serde_json::from_str::<CreateExerciseRequest>(
            r#"{"name": "Plank", "category": "core", "difficulty": "expert"}"#,
        );
        assert!(parsed.is_err());
    }
}
