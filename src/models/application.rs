use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: Uuid,
    pub opening_id: Uuid,
    pub user_id: Uuid,
    pub data: serde_json::Value,
    pub is_hired: bool,
    pub seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One submitted answer, keyed by the form field it answers. File answers
/// store the blob-store path as the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub label: String,
    pub value: String,
    #[serde(rename = "type")]
    pub field_type: String,
}
