use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;

use crate::{
    dto::opening_dto::{AdminListQuery, AdminListResponse, ModerationPayload},
    error::Result,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/admin/opportunities",
    params(
        ("type" = Option<String>, Query, description = "Search column: name, email, status, category, service or title"),
        ("search" = Option<String>, Query, description = "Search term"),
        ("opportunity_category" = Option<String>, Query, description = "Opportunity family"),
        ("page" = Option<i64>, Query, description = "Page number"),
        ("per_page" = Option<i64>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "Moderation queue, any status", body = Json<AdminListResponse>)
    )
)]
#[axum::debug_handler]
pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<AdminListQuery>,
) -> Result<impl IntoResponse> {
    let listings = state.opening_service.admin_list(&params).await?;
    Ok(Json(listings))
}

#[axum::debug_handler]
pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let stats = state.opening_service.admin_stats().await?;
    Ok(Json(stats))
}

#[axum::debug_handler]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let opening = state.opening_service.admin_show(id).await?;
    Ok(Json(opening))
}

#[utoipa::path(
    patch,
    path = "/api/admin/opportunities/{id}",
    params(
        ("id" = Uuid, Path, description = "Listing id")
    ),
    request_body = ModerationPayload,
    responses(
        (status = 200, description = "Moderated listing"),
        (status = 400, description = "Unknown status or type"),
        (status = 404, description = "Listing not found")
    )
)]
#[axum::debug_handler]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ModerationPayload>,
) -> Result<impl IntoResponse> {
    let opening = state.opening_service.admin_update(id, &payload).await?;
    Ok(Json(opening))
}

#[axum::debug_handler]
pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.opening_service.admin_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
