use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::category::Category;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyNode {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub kind: String,
    pub status: i16,
    pub parent_id: Option<i64>,
    pub children: Vec<TaxonomyNode>,
}

impl TaxonomyNode {
    pub fn leaf(category: Category) -> Self {
        Self {
            id: category.id,
            title: category.title,
            slug: category.slug,
            kind: category.kind,
            status: category.status,
            parent_id: category.parent_id,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyListResponse {
    pub services: Vec<TaxonomyNode>,
    pub categories: Vec<TaxonomyNode>,
    pub tags: Vec<TaxonomyNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTaxonomyPayload {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Kind is required"))]
    pub kind: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTaxonomyPayload {
    pub title: Option<String>,
    pub status: Option<i16>,
    pub parent_id: Option<i64>,
}
