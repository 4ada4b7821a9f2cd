use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::Value;
use tracing::{instrument, warn};

use super::dto::{CreatedDayResponse, DayResponse, HealthResponse, MealAtIndexResponse};
use super::services;
use crate::{error::AppError, state::AppState, store::StoreHealth};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/meals", get(list_days))
}

pub fn day_routes() -> Router<AppState> {
    Router::new()
        .route("/meals/:day", get(get_day).put(put_day).post(post_day))
        .route("/meals/:day/:index", put(put_meal_at_index))
}

/// Applies the configured request body limit to a router.
pub fn with_body_limit(router: Router<AppState>, limit: usize) -> Router<AppState> {
    router.layer(DefaultBodyLimit::max(limit))
}

#[instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.store.health().await;
    Json(HealthResponse {
        ok: store == StoreHealth::Ready,
        db: state.store.kind().to_string(),
        store,
    })
}

#[instrument(skip(state))]
pub async fn list_days(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Vec<Value>>>, AppError> {
    let all = services::all_days(state.store.as_ref()).await?;
    Ok(Json(all))
}

#[instrument(skip(state))]
pub async fn get_day(
    State(state): State<AppState>,
    Path(day): Path<String>,
) -> Result<Json<DayResponse>, AppError> {
    let data = services::day_or_empty(state.store.as_ref(), &day).await?;
    Ok(Json(DayResponse { day, data }))
}

#[instrument(skip(state, body))]
pub async fn put_day(
    State(state): State<AppState>,
    Path(day): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<DayResponse>, AppError> {
    let payload = json_body(body)?;
    let stored = services::replace_day(state.store.as_ref(), &day, payload).await?;
    Ok(Json(DayResponse {
        day: stored.day,
        data: stored.data,
    }))
}

#[instrument(skip(state, body))]
pub async fn post_day(
    State(state): State<AppState>,
    Path(day): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedDayResponse>), AppError> {
    let payload = json_body(body)?;
    let stored = services::replace_day(state.store.as_ref(), &day, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedDayResponse { day: stored.day }),
    ))
}

#[instrument(skip(state, body))]
pub async fn put_meal_at_index(
    State(state): State<AppState>,
    Path((day, index)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<MealAtIndexResponse>, AppError> {
    let meal = json_body(body)?;
    let (index, data) =
        services::replace_meal_at(state.store.as_ref(), &day, &index, meal).await?;
    Ok(Json(MealAtIndexResponse { day, index, data }))
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    match body {
        Ok(Json(v)) => Ok(v),
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "rejected request body");
            Err(AppError::InvalidPayload(rejection.body_text()))
        }
    }
}
