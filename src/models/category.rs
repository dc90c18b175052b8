use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const KIND_SERVICE: &str = "opportunity_service";
pub const KIND_CATEGORY: &str = "opportunity_category";
pub const KIND_TAG: &str = "opportunity_tag";

/// Canonical kind plus the legacy alias rows written before the rename.
/// Queries that partition by kind must accept both spellings.
pub const SERVICE_KINDS: &[&str] = &[KIND_SERVICE, "service"];
pub const CATEGORY_KINDS: &[&str] = &[KIND_CATEGORY, "job_category"];
pub const TAG_KINDS: &[&str] = &[KIND_TAG, "job_tag"];

pub const CATEGORY_STATUS_ACTIVE: i16 = 1;

/// Maps a caller-supplied kind string, including the pre-rename aliases still
/// present in old client payloads and seed data, onto its canonical name.
/// Unknown kinds pass through untouched so they fail downstream lookups
/// instead of being silently re-labelled.
pub fn canonical_kind(kind: &str) -> &str {
    match kind {
        "service" | KIND_SERVICE => KIND_SERVICE,
        "job_category" | KIND_CATEGORY => KIND_CATEGORY,
        "job_tag" | KIND_TAG => KIND_TAG,
        other => other,
    }
}

pub fn is_known_kind(kind: &str) -> bool {
    matches!(canonical_kind(kind), KIND_SERVICE | KIND_CATEGORY | KIND_TAG)
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub kind: String,
    pub status: i16,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn is_active(&self) -> bool {
        self.status == CATEGORY_STATUS_ACTIVE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_kinds_normalize() {
        assert_eq!(canonical_kind("service"), KIND_SERVICE);
        assert_eq!(canonical_kind("job_category"), KIND_CATEGORY);
        assert_eq!(canonical_kind("job_tag"), KIND_TAG);
        assert_eq!(canonical_kind("opportunity_tag"), KIND_TAG);
    }

    #[test]
    fn unknown_kinds_pass_through() {
        assert_eq!(canonical_kind("blog_category"), "blog_category");
        assert!(!is_known_kind("blog_category"));
        assert!(is_known_kind("job_tag"));
    }
}
