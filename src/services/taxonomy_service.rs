use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sqlx::PgPool;

use crate::dto::opening_dto::{
    CategoryOption, CountryOption, FilterOptionsResponse, GeoRef, TaxonomyRef, TypeLabel,
};
use crate::dto::taxonomy_dto::{
    CreateTaxonomyPayload, TaxonomyListResponse, TaxonomyNode, UpdateTaxonomyPayload,
};
use crate::error::{Error, Result};
use crate::models::category::{
    canonical_kind, is_known_kind, Category, CATEGORY_KINDS, KIND_CATEGORY, KIND_SERVICE,
    SERVICE_KINDS, TAG_KINDS,
};
use crate::models::family::FamilyTable;
use crate::reference::ReferenceData;
use crate::utils::validation::{field_error, validate};
use crate::utils::{slug, time};

/// Reads and maintains the category taxonomy: services, categories and tags,
/// plus the static reference data the filter sidebar needs.
#[derive(Clone)]
pub struct TaxonomyService {
    pool: PgPool,
    families: Arc<FamilyTable>,
    reference: Arc<ReferenceData>,
}

impl TaxonomyService {
    pub fn new(pool: PgPool, families: Arc<FamilyTable>, reference: Arc<ReferenceData>) -> Self {
        Self {
            pool,
            families,
            reference,
        }
    }

    /// The active taxonomy grouped by kind. Categories nest one level deep;
    /// a child whose parent is inactive surfaces as a root rather than
    /// disappearing with it.
    pub async fn list_public(&self) -> Result<TaxonomyListResponse> {
        Ok(TaxonomyListResponse {
            services: build_tree(self.active_rows(SERVICE_KINDS).await?),
            categories: build_tree(self.active_rows(CATEGORY_KINDS).await?),
            tags: build_tree(self.active_rows(TAG_KINDS).await?),
        })
    }

    /// Everything the listing filter sidebar renders: taxonomy options with
    /// live counts, the currency and country reference lists, the salary
    /// slider ceiling and the type labels.
    pub async fn filter_options(&self) -> Result<FilterOptionsResponse> {
        let cutoff = time::today_start();

        let services = self
            .active_rows(SERVICE_KINDS)
            .await?
            .into_iter()
            .map(taxonomy_ref)
            .collect();

        let category_rows = sqlx::query_as::<_, (i64, String, String, i64)>(
            "SELECT c.id, c.title, c.slug,
                    (SELECT COUNT(*) FROM category_opening co
                       JOIN openings o ON o.id = co.opening_id
                      WHERE co.category_id = c.id
                        AND o.status = 1 AND o.live_expire_at > $2) AS opportunities_count
             FROM categories c
             WHERE c.kind = ANY($1) AND c.status = 1
             ORDER BY c.title",
        )
        .bind(CATEGORY_KINDS)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        let categories = category_rows
            .into_iter()
            .map(|(id, title, slug, opportunities_count)| CategoryOption {
                id,
                title,
                slug,
                opportunities_count,
            })
            .collect();

        let tags = self
            .active_rows(TAG_KINDS)
            .await?
            .into_iter()
            .map(taxonomy_ref)
            .collect();

        let max_salary = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(MAX(salary_max), 1000)::BIGINT FROM openings
             WHERE status = 1 AND live_expire_at > $1",
        )
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;

        let countries = self
            .reference
            .countries()
            .iter()
            .map(|country| CountryOption {
                id: country.id,
                name: country.name.clone(),
                states: country
                    .states
                    .iter()
                    .map(|state| GeoRef {
                        id: state.id,
                        name: state.name.clone(),
                    })
                    .collect(),
            })
            .collect();

        let opportunity_categories = self
            .families
            .families()
            .iter()
            .map(|family| family.name.to_string())
            .collect();
        let opportunity_type_labels = self
            .families
            .families()
            .iter()
            .flat_map(|family| family.types.iter())
            .map(|type_key| TypeLabel {
                opportunity_type: (*type_key).to_string(),
                label: self.families.label_of(type_key).to_string(),
            })
            .collect();

        Ok(FilterOptionsResponse {
            services,
            categories,
            tags,
            currencies: self.reference.currencies().to_vec(),
            countries,
            max_salary,
            opportunity_categories,
            opportunity_type_labels,
        })
    }

    /// Admin view: every row of a kind whatever its status, or the whole
    /// table when no kind is given.
    pub async fn admin_index(&self, kind: Option<&str>) -> Result<Vec<Category>> {
        match kind {
            Some(raw) => {
                let canonical = canonical_kind(raw);
                if !is_known_kind(canonical) {
                    return Err(Error::BadRequest("The selected kind is invalid".to_string()));
                }
                let rows = sqlx::query_as::<_, Category>(
                    "SELECT * FROM categories WHERE kind = ANY($1) ORDER BY title",
                )
                .bind(kind_group(canonical))
                .fetch_all(&self.pool)
                .await?;
                Ok(rows)
            }
            None => {
                let rows = sqlx::query_as::<_, Category>(
                    "SELECT * FROM categories ORDER BY kind, title",
                )
                .fetch_all(&self.pool)
                .await?;
                Ok(rows)
            }
        }
    }

    /// Creates a taxonomy row under the canonical kind. Slugs are deduped
    /// against rows of the same title and kind group, so legacy alias rows
    /// count too.
    pub async fn create(&self, payload: &CreateTaxonomyPayload) -> Result<Category> {
        validate(payload)?;

        let canonical = canonical_kind(&payload.kind);
        if !is_known_kind(canonical) {
            return Err(field_error(
                "kind",
                "invalid",
                "The selected kind is invalid".to_string(),
            )
            .into());
        }

        let base = slug::slugify(&payload.title);
        if base.is_empty() {
            return Err(field_error(
                "title",
                "slug",
                "Title must contain at least one letter or number".to_string(),
            )
            .into());
        }

        if let Some(parent_id) = payload.parent_id {
            let parent_ok = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1 AND kind = ANY($2))",
            )
            .bind(parent_id)
            .bind(kind_group(canonical))
            .fetch_one(&self.pool)
            .await?;
            if !parent_ok {
                return Err(field_error(
                    "parent_id",
                    "invalid",
                    "The selected parent is invalid".to_string(),
                )
                .into());
            }
        }

        let taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM categories WHERE title = $1 AND kind = ANY($2)",
        )
        .bind(&payload.title)
        .bind(kind_group(canonical))
        .fetch_one(&self.pool)
        .await?;
        let slug = slug::dedupe_slug(&base, taken);

        let created = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (title, slug, kind, status, parent_id)
             VALUES ($1, $2, $3, 1, $4)
             RETURNING *",
        )
        .bind(&payload.title)
        .bind(&slug)
        .bind(canonical)
        .bind(payload.parent_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Partial update: absent fields keep their stored values and the slug
    /// never changes once minted, so public browse links stay stable.
    pub async fn update(&self, id: i64, payload: &UpdateTaxonomyPayload) -> Result<Category> {
        if let Some(status) = payload.status {
            if !(0..=1).contains(&status) {
                return Err(field_error(
                    "status",
                    "invalid",
                    "The selected status is invalid".to_string(),
                )
                .into());
            }
        }
        if let Some(parent_id) = payload.parent_id {
            if parent_id == id {
                return Err(field_error(
                    "parent_id",
                    "invalid",
                    "The selected parent is invalid".to_string(),
                )
                .into());
            }
            let parent_ok = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1)",
            )
            .bind(parent_id)
            .fetch_one(&self.pool)
            .await?;
            if !parent_ok {
                return Err(field_error(
                    "parent_id",
                    "invalid",
                    "The selected parent is invalid".to_string(),
                )
                .into());
            }
        }

        let updated = sqlx::query_as::<_, Category>(
            "UPDATE categories SET
                title = COALESCE($1, title),
                status = COALESCE($2, status),
                parent_id = COALESCE($3, parent_id),
                updated_at = NOW()
             WHERE id = $4
             RETURNING *",
        )
        .bind(&payload.title)
        .bind(payload.status)
        .bind(payload.parent_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Category not found".to_string()))?;

        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Category not found".to_string()));
        }
        Ok(())
    }

    async fn active_rows(&self, kinds: &'static [&'static str]) -> Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE kind = ANY($1) AND status = 1 ORDER BY title",
        )
        .bind(kinds)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

fn taxonomy_ref(category: Category) -> TaxonomyRef {
    TaxonomyRef {
        id: category.id,
        title: category.title,
        slug: category.slug,
    }
}

fn kind_group(canonical: &str) -> &'static [&'static str] {
    match canonical {
        KIND_SERVICE => SERVICE_KINDS,
        KIND_CATEGORY => CATEGORY_KINDS,
        _ => TAG_KINDS,
    }
}

/// Arranges rows into a one-level tree. A row whose parent is absent from
/// the set becomes a root, keeping children reachable when their parent is
/// deactivated.
fn build_tree(rows: Vec<Category>) -> Vec<TaxonomyNode> {
    let ids: HashSet<i64> = rows.iter().map(|c| c.id).collect();
    let mut children_of: HashMap<i64, Vec<Category>> = HashMap::new();
    let mut roots: Vec<Category> = Vec::new();

    for row in rows {
        match row.parent_id {
            Some(parent) if ids.contains(&parent) => {
                children_of.entry(parent).or_default().push(row)
            }
            _ => roots.push(row),
        }
    }

    roots
        .into_iter()
        .map(|root| {
            let mut node = TaxonomyNode::leaf(root);
            if let Some(children) = children_of.remove(&node.id) {
                node.children = children.into_iter().map(TaxonomyNode::leaf).collect();
            }
            node
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn category(id: i64, title: &str, parent_id: Option<i64>) -> Category {
        Category {
            id,
            title: title.to_string(),
            slug: slug::slugify(title),
            kind: KIND_CATEGORY.to_string(),
            status: 1,
            parent_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn children_nest_under_their_parent() {
        let rows = vec![
            category(1, "Engineering", None),
            category(2, "Backend", Some(1)),
            category(3, "Frontend", Some(1)),
            category(4, "Design", None),
        ];

        let tree = build_tree(rows);
        assert_eq!(tree.len(), 2);

        let engineering = tree.iter().find(|n| n.id == 1).unwrap();
        assert_eq!(engineering.children.len(), 2);
        assert!(tree.iter().find(|n| n.id == 4).unwrap().children.is_empty());
    }

    #[test]
    fn orphans_surface_as_roots() {
        let rows = vec![category(2, "Backend", Some(99))];
        let tree = build_tree(rows);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, 2);
    }

    #[test]
    fn kind_groups_cover_the_aliases() {
        assert!(kind_group(KIND_SERVICE).contains(&"service"));
        assert!(kind_group(KIND_CATEGORY).contains(&"job_category"));
        assert!(kind_group("opportunity_tag").contains(&"job_tag"));
    }
}
