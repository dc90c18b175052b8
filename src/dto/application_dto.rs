use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::application::{Answer, Application};

/// One multipart answer captured off the wire before validation. File
/// answers carry the raw bytes plus the client file name; text answers just
/// the string.
#[derive(Debug, Clone)]
pub enum RawAnswer {
    Text(String),
    File { file_name: String, bytes: Bytes },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub opening_id: Uuid,
    pub message: String,
}

/// The applicant as the employer sees them. Unlike the public owner card
/// this includes the email; submitting an application shares it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicantRow {
    pub id: Uuid,
    pub opening_id: Uuid,
    pub opening_title: String,
    pub opening_slug: String,
    pub applicant: ApplicantProfile,
    pub answers: Vec<Answer>,
    pub is_hired: bool,
    pub seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApplicantRow {
    pub fn assemble(
        application: Application,
        applicant: ApplicantProfile,
        opening_title: String,
        opening_slug: String,
    ) -> Self {
        let answers = serde_json::from_value(application.data).unwrap_or_default();
        Self {
            id: application.id,
            opening_id: application.opening_id,
            opening_title,
            opening_slug,
            applicant,
            answers,
            is_hired: application.is_hired,
            seen_at: application.seen_at,
            created_at: application.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicantListResponse {
    pub items: Vec<ApplicantRow>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApplicantListQuery {
    pub order: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
