use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::{CurrentUser, ValidJson, ValidQuery},
    error::AppError,
    state::AppState,
    water::{
        dto::{DeletedResponse, MonthQuery, PeriodQuery, PeriodResponse, WaterPayload},
        repo_types::WaterEntry,
        services,
    },
};

pub fn water_routes() -> Router<AppState> {
    Router::new()
        .route("/water", get(period).post(add))
        .route("/water/day", get(day))
        .route("/water/month", get(month))
        .route("/water/:id", put(update).delete(remove))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(payload): ValidJson<WaterPayload>,
) -> Result<(StatusCode, Json<WaterEntry>), AppError> {
    let entry = services::add_entry(&state, user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<WaterPayload>,
) -> Result<Json<WaterEntry>, AppError> {
    let entry = services::update_entry(&state, user.id, &id, payload).await?;
    Ok(Json(entry))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, AppError> {
    let deleted_data = services::delete_entry(&state, user.id, &id).await?;
    Ok(Json(DeletedResponse {
        deleted_data,
        message: "Water info was delete",
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn period(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidQuery(query): ValidQuery<PeriodQuery>,
) -> Result<Json<PeriodResponse>, AppError> {
    Ok(Json(services::query_by_period(&state, user.id, &query).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn day(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidQuery(query): ValidQuery<PeriodQuery>,
) -> Result<Json<Vec<WaterEntry>>, AppError> {
    Ok(Json(services::query_by_day(&state, user.id, &query).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn month(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidQuery(query): ValidQuery<MonthQuery>,
) -> Result<Json<Vec<i64>>, AppError> {
    Ok(Json(services::query_by_month(&state, user.id, &query).await?))
}
