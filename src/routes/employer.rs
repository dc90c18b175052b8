use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    dto::application_dto::ApplicantListQuery,
    dto::opening_dto::{EmployerListQuery, SaveOpeningPayload},
    error::{Error, Result},
    services::export_service::ExportService,
    services::storage_service::UploadedFile,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct HirePayload {
    pub hired: bool,
}

#[axum::debug_handler]
pub async fn index(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
    Query(params): Query<EmployerListQuery>,
) -> Result<impl IntoResponse> {
    let listings = state.opening_service.employer_index(owner_id, &params).await?;
    Ok(Json(listings))
}

#[axum::debug_handler]
pub async fn create(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let (payload, attachment) = read_opening_form(multipart).await?;
    let opening = state
        .opening_service
        .create(owner_id, &payload, attachment)
        .await?;
    Ok((StatusCode::CREATED, Json(opening)))
}

#[axum::debug_handler]
pub async fn show(
    State(state): State<AppState>,
    Path((owner_id, slug)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse> {
    let opening = state.opening_service.employer_show(owner_id, &slug).await?;
    Ok(Json(opening))
}

#[axum::debug_handler]
pub async fn update(
    State(state): State<AppState>,
    Path((owner_id, slug)): Path<(Uuid, String)>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let (payload, attachment) = read_opening_form(multipart).await?;
    let opening = state
        .opening_service
        .update(owner_id, &slug, &payload, attachment)
        .await?;
    Ok(Json(opening))
}

#[axum::debug_handler]
pub async fn destroy(
    State(state): State<AppState>,
    Path((owner_id, slug)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse> {
    state.opening_service.delete_owned(owner_id, &slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn applicants(
    State(state): State<AppState>,
    Path((owner_id, slug)): Path<(Uuid, String)>,
    Query(params): Query<ApplicantListQuery>,
) -> Result<impl IntoResponse> {
    let page = state
        .application_service
        .applicants_for_opening(owner_id, &slug, &params)
        .await?;
    Ok(Json(page))
}

#[axum::debug_handler]
pub async fn all_applicants(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
    Query(params): Query<ApplicantListQuery>,
) -> Result<impl IntoResponse> {
    let page = state
        .application_service
        .all_applicants(owner_id, &params)
        .await?;
    Ok(Json(page))
}

/// Streams the full applicant sheet for one listing as XLSX.
#[axum::debug_handler]
pub async fn export_applicants(
    State(state): State<AppState>,
    Path((owner_id, slug)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse> {
    let (opening, applicants) = state
        .application_service
        .applicants_for_export(owner_id, &slug)
        .await?;

    let buffer = ExportService::applicants_xlsx(
        &opening.title,
        &opening.field_descriptors(),
        &applicants,
    )?;
    let disposition = format!("attachment; filename=\"{}-applicants.xlsx\"", slug);

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        buffer,
    ))
}

#[axum::debug_handler]
pub async fn mark_seen(
    State(state): State<AppState>,
    Path((owner_id, application_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    state
        .application_service
        .mark_seen(owner_id, application_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn mark_hired(
    State(state): State<AppState>,
    Path((owner_id, application_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<HirePayload>,
) -> Result<impl IntoResponse> {
    state
        .application_service
        .mark_hired(owner_id, application_id, payload.hired)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Pulls the listing form out of a multipart body: a `payload` JSON part and
/// an optional `attachment` file part. Empty attachment parts, which browsers
/// send for an untouched file input, count as absent.
async fn read_opening_form(
    mut multipart: Multipart,
) -> Result<(SaveOpeningPayload, Option<UploadedFile>)> {
    let mut payload: Option<SaveOpeningPayload> = None;
    let mut attachment: Option<UploadedFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(Error::Multipart)? {
        let name = field.name().unwrap_or("").to_string();
        if name == "payload" {
            let raw = field.text().await.map_err(Error::Multipart)?;
            payload = Some(serde_json::from_str(&raw)?);
        } else if name == "attachment" {
            let file_name = field.file_name().unwrap_or("attachment").to_string();
            let bytes = field.bytes().await.map_err(Error::Multipart)?;
            if !bytes.is_empty() {
                attachment = Some(UploadedFile { file_name, bytes });
            }
        }
    }

    let payload = payload.ok_or_else(|| Error::BadRequest("payload is required".to_string()))?;
    Ok((payload, attachment))
}
