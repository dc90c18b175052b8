use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Listing lifecycle. New listings start as `Draft` and become publicly
/// visible only after an admin moves them to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpeningStatus {
    Inactive,
    Active,
    Draft,
}

impl OpeningStatus {
    pub fn from_i16(raw: i16) -> Option<Self> {
        match raw {
            0 => Some(Self::Inactive),
            1 => Some(Self::Active),
            2 => Some(Self::Draft),
            _ => None,
        }
    }

    pub fn as_i16(self) -> i16 {
        match self {
            Self::Inactive => 0,
            Self::Active => 1,
            Self::Draft => 2,
        }
    }
}

pub const STATUS_INACTIVE: i16 = 0;
pub const STATUS_ACTIVE: i16 = 1;
pub const STATUS_DRAFT: i16 = 2;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Opening {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub short_description: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub opportunity_type: String,
    pub category_id: Option<i64>,
    pub salary_type: Option<String>,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    pub currency: Option<String>,
    pub experience: Option<String>,
    pub expertise: Option<String>,
    pub attachment: Option<String>,
    pub address: Option<String>,
    pub status: i16,
    pub apply_type: i16,
    pub meta: Option<serde_json::Value>,
    pub fields: Option<serde_json::Value>,
    pub expired_at: Option<DateTime<Utc>>,
    pub live_expire_at: Option<DateTime<Utc>>,
    pub featured_expire_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Opening {
    /// A listing with no deadline counts as expired, matching how the
    /// storefront has always rendered the badge.
    pub fn is_expired(&self) -> bool {
        match self.expired_at {
            Some(at) => at < Utc::now(),
            None => true,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.meta
            .as_ref()
            .and_then(|m| m.get("is_remote"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Ordered application-form field descriptors, empty when the listing
    /// defines none.
    pub fn field_descriptors(&self) -> Vec<FieldDescriptor> {
        self.fields
            .as_ref()
            .and_then(|raw| serde_json::from_value(raw.clone()).ok())
            .unwrap_or_default()
    }
}

/// One employer-defined application form field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Field types an application form may declare.
pub const FIELD_TYPES: &[&str] = &["text", "textarea", "email", "number", "file"];
