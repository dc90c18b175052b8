use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    dto::application_dto::RawAnswer,
    dto::opening_dto::{ListingQuery, ListingResponse, OpeningDetailResponse},
    error::{Error, Result},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    pub viewer_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/opportunities",
    params(
        ("keyword" = Option<String>, Query, description = "Title substring"),
        ("opportunity_type" = Option<String>, Query, description = "Exact opportunity type"),
        ("opportunity_category" = Option<String>, Query, description = "Opportunity family"),
        ("category" = Option<String>, Query, description = "Category slug fragment"),
        ("service" = Option<String>, Query, description = "Service slug fragment"),
        ("tags" = Option<String>, Query, description = "Comma-separated tag ids"),
        ("min_salary" = Option<String>, Query, description = "Lower salary bound"),
        ("max_salary" = Option<String>, Query, description = "Upper salary bound"),
        ("country" = Option<String>, Query, description = "Country id"),
        ("state" = Option<String>, Query, description = "State id"),
        ("sort" = Option<String>, Query, description = "asc or desc"),
        ("page" = Option<i64>, Query, description = "Page number"),
        ("per_page" = Option<i64>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "Active listings matching the filters", body = Json<ListingResponse>),
        (status = 400, description = "Non-numeric bound in a numeric filter")
    )
)]
#[axum::debug_handler]
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListingQuery>,
) -> Result<impl IntoResponse> {
    let listings = state.opening_service.list(&params, None).await?;
    Ok(Json(listings))
}

#[utoipa::path(
    get,
    path = "/api/opportunities/browse/{slug}",
    params(
        ("slug" = String, Path, description = "Category or service slug")
    ),
    responses(
        (status = 200, description = "Listings under the slug", body = Json<ListingResponse>)
    )
)]
#[axum::debug_handler]
pub async fn browse(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<ListingQuery>,
) -> Result<impl IntoResponse> {
    let listings = state.opening_service.list(&params, Some(&slug)).await?;
    Ok(Json(listings))
}

#[axum::debug_handler]
pub async fn filter_options(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let options = state.taxonomy_service.filter_options().await?;
    Ok(Json(options))
}

#[utoipa::path(
    get,
    path = "/api/opportunities/{slug}",
    params(
        ("slug" = String, Path, description = "Listing slug"),
        ("viewer_id" = Option<Uuid>, Query, description = "Visitor id, for the already-applied flag")
    ),
    responses(
        (status = 200, description = "Listing detail with related listings", body = Json<OpeningDetailResponse>),
        (status = 404, description = "Unknown, inactive or expired listing")
    )
)]
#[axum::debug_handler]
pub async fn detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<DetailQuery>,
) -> Result<impl IntoResponse> {
    let detail = state.opening_service.detail(&slug, query.viewer_id).await?;
    Ok(Json(detail))
}

/// Multipart application form. `applicant_id` is a text part; answers arrive
/// as `fields[<label>]` parts, files carrying a filename. Parts with any
/// other name are dropped before validation.
#[axum::debug_handler]
pub async fn apply(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut applicant_id: Option<Uuid> = None;
    let mut answers: HashMap<String, RawAnswer> = HashMap::new();

    while let Some(field) = multipart.next_field().await.map_err(Error::Multipart)? {
        let name = field.name().unwrap_or("").to_string();
        if name == "applicant_id" {
            let raw = field.text().await.map_err(Error::Multipart)?;
            let parsed = raw.trim().parse().map_err(|_| {
                Error::BadRequest("applicant_id must be a valid UUID".to_string())
            })?;
            applicant_id = Some(parsed);
        } else if let Some(label) = answer_label(&name) {
            match field.file_name().map(str::to_string) {
                Some(file_name) if !file_name.is_empty() => {
                    let bytes = field.bytes().await.map_err(Error::Multipart)?;
                    answers.insert(label, RawAnswer::File { file_name, bytes });
                }
                _ => {
                    let text = field.text().await.map_err(Error::Multipart)?;
                    answers.insert(label, RawAnswer::Text(text));
                }
            }
        }
    }

    let applicant_id = applicant_id
        .ok_or_else(|| Error::BadRequest("applicant_id is required".to_string()))?;

    let response = state
        .application_service
        .apply(&slug, applicant_id, answers)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

fn answer_label(name: &str) -> Option<String> {
    name.strip_prefix("fields[")
        .and_then(|rest| rest.strip_suffix(']'))
        .filter(|label| !label.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::answer_label;

    #[test]
    fn answer_labels_come_from_bracketed_names() {
        assert_eq!(answer_label("fields[Cover letter]").as_deref(), Some("Cover letter"));
        assert_eq!(answer_label("fields[]"), None);
        assert_eq!(answer_label("attachment"), None);
        assert_eq!(answer_label("fields[unclosed"), None);
    }
}
