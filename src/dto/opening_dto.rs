use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::family::FamilyTable;
use crate::models::opening::{FieldDescriptor, Opening};

/// Raw public listing parameters, straight off the query string. Everything
/// is optional; parsing and normalization happen in the filter compiler.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ListingQuery {
    pub keyword: Option<String>,
    pub experience: Option<String>,
    pub opportunity_type: Option<String>,
    pub opportunity_category: Option<String>,
    pub currency: Option<String>,
    pub min_salary: Option<String>,
    pub max_salary: Option<String>,
    pub salary_type: Option<String>,
    pub is_remote: Option<String>,
    pub category: Option<String>,
    pub service: Option<String>,
    pub tags: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyRef {
    pub id: i64,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerSummary {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpeningSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub short_description: String,
    #[serde(rename = "type")]
    pub opportunity_type: String,
    pub type_label: String,
    pub opportunity_category: String,
    pub salary_range: Option<SalaryRange>,
    pub salary_type: Option<String>,
    pub currency: Option<String>,
    pub experience: Option<String>,
    pub is_remote: bool,
    pub is_expired: bool,
    pub address: Option<String>,
    pub featured_expire_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_at_date: String,
    pub user: Option<OwnerSummary>,
    pub categories: Vec<TaxonomyRef>,
    pub tags: Vec<TaxonomyRef>,
    pub country: Option<GeoRef>,
    pub state: Option<GeoRef>,
}

impl OpeningSummary {
    pub fn assemble(
        opening: Opening,
        owner: Option<OwnerSummary>,
        categories: Vec<TaxonomyRef>,
        tags: Vec<TaxonomyRef>,
        country: Option<GeoRef>,
        state: Option<GeoRef>,
        table: &FamilyTable,
    ) -> Self {
        let salary_range = match (opening.salary_min, opening.salary_max) {
            (Some(min), Some(max)) => Some(SalaryRange { min, max }),
            _ => None,
        };
        let is_remote = opening.is_remote();
        let is_expired = opening.is_expired();

        Self {
            id: opening.id,
            title: opening.title,
            slug: opening.slug,
            short_description: opening.short_description,
            type_label: table.label_of(&opening.opportunity_type).to_string(),
            opportunity_category: table.family_of(&opening.opportunity_type).to_string(),
            opportunity_type: opening.opportunity_type,
            salary_range,
            salary_type: opening.salary_type,
            currency: opening.currency,
            experience: opening.experience,
            is_remote,
            is_expired,
            address: opening.address,
            featured_expire_at: opening.featured_expire_at,
            created_at: opening.created_at,
            created_at_date: opening.created_at.format("%d %B %Y").to_string(),
            user: owner,
            categories,
            tags,
            country,
            state,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpeningDetail {
    #[serde(flatten)]
    pub summary: OpeningSummary,
    pub description: String,
    pub expertise: Option<String>,
    pub attachment: Option<String>,
    pub apply_type: i16,
    pub meta: Option<serde_json::Value>,
    pub fields: Vec<FieldDescriptor>,
    pub expired_at: Option<DateTime<Utc>>,
    pub service: Option<TaxonomyRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpeningDetailResponse {
    pub opportunity: OpeningDetail,
    pub related_opportunities: Vec<OpeningSummary>,
    pub already_applied: bool,
}

/// Counts behind the listing sidebar, computed over the publicly visible set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingFacets {
    pub by_family: Vec<FacetCount>,
    pub by_type: Vec<TypeFacetCount>,
    pub by_experience: Vec<FacetCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeFacetCount {
    #[serde(rename = "type")]
    pub opportunity_type: String,
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingResponse {
    pub items: Vec<OpeningSummary>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
    pub facets: ListingFacets,
}

/// Everything the filter sidebar needs to render itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterOptionsResponse {
    pub services: Vec<TaxonomyRef>,
    pub categories: Vec<CategoryOption>,
    pub tags: Vec<TaxonomyRef>,
    pub currencies: Vec<crate::reference::Currency>,
    pub countries: Vec<CountryOption>,
    pub max_salary: i64,
    pub opportunity_categories: Vec<String>,
    pub opportunity_type_labels: Vec<TypeLabel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryOption {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub opportunities_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryOption {
    pub id: i64,
    pub name: String,
    pub states: Vec<GeoRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeLabel {
    #[serde(rename = "type")]
    pub opportunity_type: String,
    pub label: String,
}

/// Employer create/update payload. Family-dependent rules (salary, currency,
/// experience) are enforced in the service once the family is resolved; the
/// derive covers only the always-required scalars.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SaveOpeningPayload {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(length(min = 1, message = "Short description is required"))]
    pub short_description: String,
    pub service_id: i64,
    pub category_id: i64,
    #[serde(rename = "type")]
    pub opportunity_type: String,
    pub salary_type: Option<String>,
    pub currency: Option<String>,
    pub min_salary: Option<i64>,
    pub max_salary: Option<i64>,
    pub experience: Option<String>,
    pub expertise: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub apply_type: i16,
    pub expired_at: Option<DateTime<Utc>>,
    pub meta: Option<serde_json::Value>,
    pub fields: Option<Vec<FieldPayload>>,
    #[serde(default)]
    pub skills: Vec<i64>,
    pub country_id: Option<i64>,
    pub state_id: Option<i64>,
}

impl SaveOpeningPayload {
    pub fn is_remote(&self) -> bool {
        self.meta
            .as_ref()
            .and_then(|m| m.get("is_remote"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn apply_target(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .and_then(|m| m.get("apply_type"))
            .and_then(|v| v.get("value"))
            .and_then(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldPayload {
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EmployerListQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub order: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployerOpeningRow {
    #[serde(flatten)]
    pub summary: OpeningSummary,
    pub status: i16,
    pub live_expire_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub applications_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployerListResponse {
    pub items: Vec<EmployerOpeningRow>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AdminListQuery {
    /// Which column the `search` term applies to; unrecognized values search
    /// the title.
    #[serde(rename = "type")]
    pub search_by: Option<String>,
    pub search: Option<String>,
    pub opportunity_category: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminOpeningRow {
    #[serde(flatten)]
    pub summary: OpeningSummary,
    pub status: i16,
    pub live_expire_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminListResponse {
    pub items: Vec<AdminOpeningRow>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminStatsResponse {
    pub total: i64,
    pub active: i64,
    pub pending: i64,
    pub inactive: i64,
    pub by_family: Vec<FacetCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationPayload {
    pub status: i16,
    #[serde(rename = "type")]
    pub opportunity_type: Option<String>,
    pub featured_expire_at: Option<DateTime<Utc>>,
    pub live_expire_at: Option<DateTime<Utc>>,
}

/// Full opening as seen by its owner or an administrator, including fields the
/// public detail view withholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedOpeningResponse {
    #[serde(flatten)]
    pub detail: OpeningDetail,
    pub status: i16,
    pub live_expire_at: Option<DateTime<Utc>>,
    pub applications_count: i64,
}
