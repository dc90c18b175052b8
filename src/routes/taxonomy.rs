use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;

use crate::{
    dto::taxonomy_dto::{CreateTaxonomyPayload, UpdateTaxonomyPayload},
    error::Result,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct KindQuery {
    pub kind: Option<String>,
}

/// Active services, categories and tags, one level of children nested.
#[axum::debug_handler]
pub async fn index(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let taxonomies = state.taxonomy_service.list_public().await?;
    Ok(Json(taxonomies))
}

#[axum::debug_handler]
pub async fn admin_index(
    State(state): State<AppState>,
    Query(query): Query<KindQuery>,
) -> Result<impl IntoResponse> {
    let entries = state
        .taxonomy_service
        .admin_index(query.kind.as_deref())
        .await?;
    Ok(Json(entries))
}

#[axum::debug_handler]
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateTaxonomyPayload>,
) -> Result<impl IntoResponse> {
    let entry = state.taxonomy_service.create(&payload).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[axum::debug_handler]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTaxonomyPayload>,
) -> Result<impl IntoResponse> {
    let entry = state.taxonomy_service.update(id, &payload).await?;
    Ok(Json(entry))
}

#[axum::debug_handler]
pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.taxonomy_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
