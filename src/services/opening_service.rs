use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::config::get_config;
use crate::dto::opening_dto::{
    AdminListQuery, AdminListResponse, AdminOpeningRow, AdminStatsResponse, EmployerListQuery,
    EmployerListResponse, EmployerOpeningRow, FacetCount, GeoRef, ListingFacets, ListingQuery,
    ListingResponse, ManagedOpeningResponse, ModerationPayload, OpeningDetail,
    OpeningDetailResponse, OpeningSummary, OwnerSummary, SaveOpeningPayload, TaxonomyRef,
    TypeFacetCount,
};
use crate::error::{Error, Result};
use crate::models::category::{Category, CATEGORY_KINDS, SERVICE_KINDS, TAG_KINDS};
use crate::models::family::{FamilyTable, FALLBACK_FAMILY};
use crate::models::opening::{
    Opening, OpeningStatus, FIELD_TYPES, STATUS_ACTIVE, STATUS_DRAFT, STATUS_INACTIVE,
};
use crate::models::user::User;
use crate::query::{self, SortOrder, SqlArg};
use crate::reference::ReferenceData;
use crate::services::notification_service::NotificationService;
use crate::services::storage_service::{BlobStore, UploadedFile};
use crate::utils::validation::{error_with_message, field_error, validate};
use crate::utils::{slug, time};
use validator::ValidationErrors;

const ATTACHMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];
const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const PUBLIC_PER_PAGE: i64 = 8;
const DASHBOARD_PER_PAGE: i64 = 10;

/// Everything that reads or writes listings: the public storefront queries,
/// the employer dashboard and the admin moderation surface.
#[derive(Clone)]
pub struct OpeningService {
    pool: PgPool,
    families: Arc<FamilyTable>,
    reference: Arc<ReferenceData>,
    store: Arc<dyn BlobStore>,
}

impl OpeningService {
    pub fn new(
        pool: PgPool,
        families: Arc<FamilyTable>,
        reference: Arc<ReferenceData>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            pool,
            families,
            reference,
            store,
        }
    }

    /// Public listing page. `browse_slug` comes from the taxonomy browse
    /// routes and matches either a linked category or the listing's service.
    pub async fn list(
        &self,
        params: &ListingQuery,
        browse_slug: Option<&str>,
    ) -> Result<ListingResponse> {
        let filters = query::parse_filters(params, browse_slug)?;
        let compiled = query::compile(&filters, &self.families);
        let order = SortOrder::from_param(params.sort.as_deref());

        let page = params.page.unwrap_or(1).max(1);
        let per_page = params.per_page.unwrap_or(PUBLIC_PER_PAGE).clamp(1, 100);
        let offset = (page - 1) * per_page;

        let where_sql = compiled.where_sql();
        let count_sql = format!("SELECT COUNT(*) FROM openings {}", where_sql);
        let page_sql = format!(
            "SELECT * FROM openings {} {} LIMIT ${} OFFSET ${}",
            where_sql,
            query::order_sql(order),
            compiled.next_placeholder(),
            compiled.next_placeholder() + 1,
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &compiled.args {
            count_query = match arg {
                SqlArg::Text(v) => count_query.bind(v),
                SqlArg::Int(v) => count_query.bind(v),
                SqlArg::Uuid(v) => count_query.bind(v),
                SqlArg::Timestamp(v) => count_query.bind(v),
            };
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let mut page_query = sqlx::query_as::<_, Opening>(&page_sql);
        for arg in &compiled.args {
            page_query = match arg {
                SqlArg::Text(v) => page_query.bind(v),
                SqlArg::Int(v) => page_query.bind(v),
                SqlArg::Uuid(v) => page_query.bind(v),
                SqlArg::Timestamp(v) => page_query.bind(v),
            };
        }
        let openings = page_query
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let items = self.assemble_summaries(openings).await?;
        let facets = self.facets().await?;
        let total_pages = (total as f64 / per_page as f64).ceil() as i64;

        Ok(ListingResponse {
            items,
            total,
            page,
            per_page,
            total_pages,
            facets,
        })
    }

    /// Sidebar counts, always computed over the full visible set rather than
    /// the filtered one so the sidebar stays stable while filters change.
    pub async fn facets(&self) -> Result<ListingFacets> {
        let cutoff = time::today_start();

        let type_rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT type, COUNT(*) FROM openings
             WHERE status = 1 AND live_expire_at > $1
             GROUP BY type ORDER BY type",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let experience_rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT experience, COUNT(*) FROM openings
             WHERE status = 1 AND live_expire_at > $1 AND experience IS NOT NULL
             GROUP BY experience ORDER BY experience",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let by_family = fold_families(&self.families, &type_rows);
        let by_type = type_rows
            .iter()
            .map(|(type_key, count)| TypeFacetCount {
                opportunity_type: type_key.clone(),
                label: self.families.label_of(type_key).to_string(),
                count: *count,
            })
            .collect();
        let by_experience = experience_rows
            .into_iter()
            .map(|(value, count)| FacetCount { value, count })
            .collect();

        Ok(ListingFacets {
            by_family,
            by_type,
            by_experience,
        })
    }

    /// Detail page for one visible listing, with up to six other live
    /// listings from the same poster and the viewer's applied flag.
    pub async fn detail(&self, slug: &str, viewer: Option<Uuid>) -> Result<OpeningDetailResponse> {
        let cutoff = time::today_start();
        let opening = sqlx::query_as::<_, Opening>(
            "SELECT * FROM openings WHERE slug = $1 AND status = 1 AND live_expire_at > $2",
        )
        .bind(slug)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Opportunity not found".to_string()))?;

        let related = sqlx::query_as::<_, Opening>(
            "SELECT * FROM openings
             WHERE user_id = $1 AND id <> $2 AND status = 1 AND live_expire_at > $3
             ORDER BY created_at DESC LIMIT 6",
        )
        .bind(opening.user_id)
        .bind(opening.id)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let already_applied = match viewer {
            Some(user_id) => {
                sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS (SELECT 1 FROM applications WHERE opening_id = $1 AND user_id = $2)",
                )
                .bind(opening.id)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?
            }
            None => false,
        };

        let opportunity = self.assemble_detail(opening).await?;
        let related_opportunities = self.assemble_summaries(related).await?;

        Ok(OpeningDetailResponse {
            opportunity,
            related_opportunities,
            already_applied,
        })
    }

    /// Posts a new listing for an employer. The listing lands as a draft;
    /// the admin team is notified and moves it live.
    pub async fn create(
        &self,
        owner_id: Uuid,
        payload: &SaveOpeningPayload,
        attachment: Option<UploadedFile>,
    ) -> Result<ManagedOpeningResponse> {
        let owner = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;

        let plan = owner
            .plan()
            .ok_or_else(|| Error::BadRequest("You have not purchased a plan.".to_string()))?;
        if plan.is_expired() {
            return Err(Error::BadRequest(
                "You have reached your opportunity post limit. Please upgrade your plan!"
                    .to_string(),
            ));
        }
        let posted = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM openings WHERE user_id = $1")
            .bind(owner.id)
            .fetch_one(&self.pool)
            .await?;
        if !plan.allows_another_listing(posted) {
            return Err(Error::BadRequest(
                "You have reached your opportunity post limit. Please upgrade your plan."
                    .to_string(),
            ));
        }

        validate(payload)?;
        self.validate_payload(payload).await?;
        if let Some(file) = &attachment {
            check_attachment(file)?;
        }

        let base = slug::slugify(&payload.title);
        let taken = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM openings WHERE title = $1")
            .bind(&payload.title)
            .fetch_one(&self.pool)
            .await?;
        let slug = slug::dedupe_slug(&base, taken);

        let attachment_path = match &attachment {
            Some(file) => Some(self.store.save("attachments", file).await?),
            None => None,
        };

        let fields_json = match &payload.fields {
            Some(fields) => Some(serde_json::to_value(fields)?),
            None => None,
        };
        let live_expire_at = time::days_from_now(plan.live_job_for_days);
        let featured_expire_at = time::days_from_now(30);

        let mut tx = self.pool.begin().await?;

        let opening = sqlx::query_as::<_, Opening>(
            "INSERT INTO openings (
                user_id, title, slug, description, short_description, type, category_id,
                salary_type, salary_min, salary_max, currency, experience, expertise,
                attachment, address, status, apply_type, meta, fields, expired_at,
                live_expire_at, featured_expire_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                       $15, $16, $17, $18, $19, $20, $21, $22)
             RETURNING *",
        )
        .bind(owner.id)
        .bind(&payload.title)
        .bind(&slug)
        .bind(&payload.description)
        .bind(&payload.short_description)
        .bind(&payload.opportunity_type)
        .bind(payload.service_id)
        .bind(&payload.salary_type)
        .bind(payload.min_salary.map(|v| v as i32))
        .bind(payload.max_salary.map(|v| v as i32))
        .bind(&payload.currency)
        .bind(&payload.experience)
        .bind(&payload.expertise)
        .bind(attachment_path.as_deref())
        .bind(&payload.address)
        .bind(STATUS_DRAFT)
        .bind(payload.apply_type)
        .bind(&payload.meta)
        .bind(&fields_json)
        .bind(payload.expired_at)
        .bind(live_expire_at)
        .bind(featured_expire_at)
        .fetch_one(&mut *tx)
        .await?;

        self.sync_links(&mut tx, opening.id, payload).await?;
        self.sync_geography(&mut tx, opening.id, payload).await?;

        NotificationService::notify_tx(
            &mut tx,
            get_config().admin_user_id,
            "New opportunity posted",
            &format!("A new opportunity has been posted by {}", owner.name),
            Some(&format!("/admin/opportunity/{}", opening.id)),
        )
        .await?;

        tx.commit().await?;

        self.managed_view(opening).await
    }

    /// Full replacement of an owned listing. Pricing, experience, form fields
    /// and the attachment keep their stored values when the request omits
    /// them; the expiry date is taken as sent, absent meaning none.
    pub async fn update(
        &self,
        owner_id: Uuid,
        slug: &str,
        payload: &SaveOpeningPayload,
        attachment: Option<UploadedFile>,
    ) -> Result<ManagedOpeningResponse> {
        let existing = sqlx::query_as::<_, Opening>(
            "SELECT * FROM openings WHERE slug = $1 AND user_id = $2",
        )
        .bind(slug)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Opportunity not found".to_string()))?;

        validate(payload)?;
        self.validate_payload(payload).await?;
        if let Some(file) = &attachment {
            check_attachment(file)?;
        }

        let new_attachment = match &attachment {
            Some(file) => Some(self.store.save("attachments", file).await?),
            None => None,
        };

        let salary_type = payload
            .salary_type
            .clone()
            .or_else(|| existing.salary_type.clone());
        let currency = payload.currency.clone().or_else(|| existing.currency.clone());
        let salary_min = payload.min_salary.map(|v| v as i32).or(existing.salary_min);
        let salary_max = payload.max_salary.map(|v| v as i32).or(existing.salary_max);
        let experience = payload
            .experience
            .clone()
            .or_else(|| existing.experience.clone());
        let expertise = payload
            .expertise
            .clone()
            .or_else(|| existing.expertise.clone());
        let attachment_path = new_attachment.clone().or_else(|| existing.attachment.clone());
        let fields_json = match &payload.fields {
            Some(fields) => Some(serde_json::to_value(fields)?),
            None => existing.fields.clone(),
        };
        let meta = payload.meta.clone().or_else(|| existing.meta.clone());

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Opening>(
            "UPDATE openings SET
                title = $1, description = $2, short_description = $3, type = $4,
                category_id = $5, salary_type = $6, salary_min = $7, salary_max = $8,
                currency = $9, experience = $10, expertise = $11, attachment = $12,
                address = $13, apply_type = $14, meta = $15, fields = $16,
                expired_at = $17, updated_at = NOW()
             WHERE id = $18
             RETURNING *",
        )
        .bind(&payload.title)
        .bind(&payload.description)
        .bind(&payload.short_description)
        .bind(&payload.opportunity_type)
        .bind(payload.service_id)
        .bind(&salary_type)
        .bind(salary_min)
        .bind(salary_max)
        .bind(&currency)
        .bind(&experience)
        .bind(&expertise)
        .bind(&attachment_path)
        .bind(&payload.address)
        .bind(payload.apply_type)
        .bind(&meta)
        .bind(&fields_json)
        .bind(payload.expired_at)
        .bind(existing.id)
        .fetch_one(&mut *tx)
        .await?;

        self.sync_links(&mut tx, existing.id, payload).await?;
        self.sync_geography(&mut tx, existing.id, payload).await?;

        tx.commit().await?;

        // The replaced attachment is gone from the row; the file itself can
        // go in the background.
        if new_attachment.is_some() {
            if let Some(old) = existing.attachment {
                if let Err(err) = self.store.remove(&old).await {
                    tracing::warn!(%err, path = %old, "failed to remove replaced attachment");
                }
            }
        }

        self.managed_view(updated).await
    }

    pub async fn delete_owned(&self, owner_id: Uuid, slug: &str) -> Result<()> {
        let attachment = sqlx::query_scalar::<_, Option<String>>(
            "DELETE FROM openings WHERE slug = $1 AND user_id = $2 RETURNING attachment",
        )
        .bind(slug)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Opportunity not found".to_string()))?;

        self.discard_attachment(attachment).await;
        Ok(())
    }

    pub async fn admin_delete(&self, id: Uuid) -> Result<()> {
        let attachment = sqlx::query_scalar::<_, Option<String>>(
            "DELETE FROM openings WHERE id = $1 RETURNING attachment",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Opportunity not found".to_string()))?;

        self.discard_attachment(attachment).await;
        Ok(())
    }

    /// Employer dashboard list: every listing the owner has, whatever its
    /// status, with per-listing application counts.
    pub async fn employer_index(
        &self,
        owner_id: Uuid,
        params: &EmployerListQuery,
    ) -> Result<EmployerListResponse> {
        let mut clauses = vec!["user_id = $1".to_string()];
        let mut args = vec![SqlArg::Uuid(owner_id)];

        if let Some(status) = filled(&params.status) {
            clauses.push(format!("status = ${}", args.len() + 1));
            args.push(SqlArg::Int(employer_status_code(status) as i64));
        }
        if let Some(category) = filled(&params.category) {
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM category_opening co \
                   JOIN categories c ON c.id = co.category_id \
                   WHERE co.opening_id = openings.id AND c.slug = ${})",
                args.len() + 1
            ));
            args.push(SqlArg::Text(category.to_string()));
        }

        let order_sql = match SortOrder::from_param(params.order.as_deref()) {
            SortOrder::Asc => "ORDER BY created_at ASC, id ASC",
            SortOrder::Desc => "ORDER BY created_at DESC, id DESC",
        };

        let page = params.page.unwrap_or(1).max(1);
        let per_page = params.per_page.unwrap_or(DASHBOARD_PER_PAGE).clamp(1, 100);
        let offset = (page - 1) * per_page;

        let where_sql = format!("WHERE {}", clauses.join(" AND "));
        let count_sql = format!("SELECT COUNT(*) FROM openings {}", where_sql);
        let rows_sql = format!(
            "SELECT openings.*, \
             (SELECT COUNT(*) FROM applications a WHERE a.opening_id = openings.id) \
               AS applications_count \
             FROM openings {} {} LIMIT ${} OFFSET ${}",
            where_sql,
            order_sql,
            args.len() + 1,
            args.len() + 2,
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &args {
            count_query = match arg {
                SqlArg::Text(v) => count_query.bind(v),
                SqlArg::Int(v) => count_query.bind(v),
                SqlArg::Uuid(v) => count_query.bind(v),
                SqlArg::Timestamp(v) => count_query.bind(v),
            };
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let mut rows_query = sqlx::query_as::<_, CountedOpeningRow>(&rows_sql);
        for arg in &args {
            rows_query = match arg {
                SqlArg::Text(v) => rows_query.bind(v),
                SqlArg::Int(v) => rows_query.bind(v),
                SqlArg::Uuid(v) => rows_query.bind(v),
                SqlArg::Timestamp(v) => rows_query.bind(v),
            };
        }
        let rows = rows_query
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let (openings, counts): (Vec<Opening>, Vec<i64>) = rows
            .into_iter()
            .map(|row| (row.opening, row.applications_count))
            .unzip();

        let mut ctx = self.summary_context(&openings).await?;
        let items: Vec<EmployerOpeningRow> = openings
            .into_iter()
            .zip(counts)
            .map(|(opening, applications_count)| {
                let status = opening.status;
                let live_expire_at = opening.live_expire_at;
                let expired_at = opening.expired_at;
                EmployerOpeningRow {
                    summary: self.summarize(opening, &mut ctx),
                    status,
                    live_expire_at,
                    expired_at,
                    applications_count,
                }
            })
            .collect();

        let total_pages = (total as f64 / per_page as f64).ceil() as i64;

        Ok(EmployerListResponse {
            items,
            total,
            page,
            per_page,
            total_pages,
        })
    }

    pub async fn employer_show(&self, owner_id: Uuid, slug: &str) -> Result<ManagedOpeningResponse> {
        let opening = sqlx::query_as::<_, Opening>(
            "SELECT * FROM openings WHERE slug = $1 AND user_id = $2",
        )
        .bind(slug)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Opportunity not found".to_string()))?;

        self.managed_view(opening).await
    }

    /// Moderation queue. The `type` parameter picks which column the search
    /// term applies to; unrecognized pickers search the title.
    pub async fn admin_list(&self, params: &AdminListQuery) -> Result<AdminListResponse> {
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<SqlArg> = Vec::new();

        if let Some(term) = filled(&params.search) {
            match params.search_by.as_deref().unwrap_or("title") {
                "name" => {
                    clauses.push(format!(
                        "EXISTS (SELECT 1 FROM users u \
                           WHERE u.id = openings.user_id AND u.name = ${})",
                        args.len() + 1
                    ));
                    args.push(SqlArg::Text(term.to_string()));
                }
                "email" => {
                    clauses.push(format!(
                        "EXISTS (SELECT 1 FROM users u \
                           WHERE u.id = openings.user_id AND u.email = ${})",
                        args.len() + 1
                    ));
                    args.push(SqlArg::Text(term.to_string()));
                }
                "status" => {
                    let code: i16 = term.parse().map_err(|_| {
                        Error::from(field_error(
                            "search",
                            "integer",
                            "search must be a status code".to_string(),
                        ))
                    })?;
                    clauses.push(format!("status = ${}", args.len() + 1));
                    args.push(SqlArg::Int(code as i64));
                }
                "category" => {
                    clauses.push(format!(
                        "EXISTS (SELECT 1 FROM category_opening co \
                           JOIN categories c ON c.id = co.category_id \
                           WHERE co.opening_id = openings.id AND c.title ILIKE ${})",
                        args.len() + 1
                    ));
                    args.push(SqlArg::Text(format!("%{}%", term)));
                }
                "service" => {
                    clauses.push(format!(
                        "EXISTS (SELECT 1 FROM categories s \
                           WHERE s.id = openings.category_id AND s.title ILIKE ${})",
                        args.len() + 1
                    ));
                    args.push(SqlArg::Text(format!("%{}%", term)));
                }
                _ => {
                    clauses.push(format!("title ILIKE ${}", args.len() + 1));
                    args.push(SqlArg::Text(format!("%{}%", term)));
                }
            }
        }

        if let Some(family) = filled(&params.opportunity_category) {
            match self.families.types_of(family) {
                Some(types) => {
                    let placeholders: Vec<String> = types
                        .iter()
                        .enumerate()
                        .map(|(i, _)| format!("${}", args.len() + 1 + i))
                        .collect();
                    clauses.push(format!("type IN ({})", placeholders.join(", ")));
                    for type_key in types {
                        args.push(SqlArg::Text((*type_key).to_string()));
                    }
                }
                None => clauses.push("FALSE".to_string()),
            }
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let page = params.page.unwrap_or(1).max(1);
        let per_page = params.per_page.unwrap_or(DASHBOARD_PER_PAGE).clamp(1, 100);
        let offset = (page - 1) * per_page;

        let count_sql = format!("SELECT COUNT(*) FROM openings {}", where_sql);
        let page_sql = format!(
            "SELECT * FROM openings {} ORDER BY created_at DESC, id DESC LIMIT ${} OFFSET ${}",
            where_sql,
            args.len() + 1,
            args.len() + 2,
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &args {
            count_query = match arg {
                SqlArg::Text(v) => count_query.bind(v),
                SqlArg::Int(v) => count_query.bind(v),
                SqlArg::Uuid(v) => count_query.bind(v),
                SqlArg::Timestamp(v) => count_query.bind(v),
            };
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let mut page_query = sqlx::query_as::<_, Opening>(&page_sql);
        for arg in &args {
            page_query = match arg {
                SqlArg::Text(v) => page_query.bind(v),
                SqlArg::Int(v) => page_query.bind(v),
                SqlArg::Uuid(v) => page_query.bind(v),
                SqlArg::Timestamp(v) => page_query.bind(v),
            };
        }
        let openings = page_query
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let mut ctx = self.summary_context(&openings).await?;
        let items: Vec<AdminOpeningRow> = openings
            .into_iter()
            .map(|opening| {
                let status = opening.status;
                let live_expire_at = opening.live_expire_at;
                let expired_at = opening.expired_at;
                AdminOpeningRow {
                    summary: self.summarize(opening, &mut ctx),
                    status,
                    live_expire_at,
                    expired_at,
                }
            })
            .collect();

        let total_pages = (total as f64 / per_page as f64).ceil() as i64;

        Ok(AdminListResponse {
            items,
            total,
            page,
            per_page,
            total_pages,
        })
    }

    pub async fn admin_stats(&self) -> Result<AdminStatsResponse> {
        let (total, active, pending, inactive) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE status = 1),
                    COUNT(*) FILTER (WHERE status = 2),
                    COUNT(*) FILTER (WHERE status = 0)
             FROM openings",
        )
        .fetch_one(&self.pool)
        .await?;

        let type_rows =
            sqlx::query_as::<_, (String, i64)>("SELECT type, COUNT(*) FROM openings GROUP BY type")
                .fetch_all(&self.pool)
                .await?;

        Ok(AdminStatsResponse {
            total,
            active,
            pending,
            inactive,
            by_family: fold_families(&self.families, &type_rows),
        })
    }

    pub async fn admin_show(&self, id: Uuid) -> Result<ManagedOpeningResponse> {
        let opening = sqlx::query_as::<_, Opening>("SELECT * FROM openings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Opportunity not found".to_string()))?;

        self.managed_view(opening).await
    }

    /// Moderation write. Moving a listing into the active status opens a
    /// fresh live window sized by the poster's plan; any other status change
    /// stores the live window exactly as sent.
    pub async fn admin_update(
        &self,
        id: Uuid,
        payload: &ModerationPayload,
    ) -> Result<ManagedOpeningResponse> {
        if OpeningStatus::from_i16(payload.status).is_none() {
            return Err(field_error(
                "status",
                "invalid",
                "The selected status is invalid".to_string(),
            )
            .into());
        }
        if let Some(type_key) = payload.opportunity_type.as_deref() {
            if !self.families.is_known_type(type_key) {
                return Err(field_error(
                    "type",
                    "invalid",
                    "The selected type is invalid".to_string(),
                )
                .into());
            }
        }

        let existing = sqlx::query_as::<_, Opening>("SELECT * FROM openings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Opportunity not found".to_string()))?;

        let approving = payload.status == STATUS_ACTIVE && existing.status != STATUS_ACTIVE;
        let live_expire_at = if approving {
            let owner = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
                .bind(existing.user_id)
                .fetch_optional(&self.pool)
                .await?;
            let days = owner
                .as_ref()
                .and_then(|u| u.plan())
                .map(|plan| plan.live_job_for_days)
                .unwrap_or(30);
            Some(time::days_from_now(days))
        } else {
            payload.live_expire_at
        };
        let opportunity_type = payload
            .opportunity_type
            .clone()
            .unwrap_or_else(|| existing.opportunity_type.clone());

        let updated = sqlx::query_as::<_, Opening>(
            "UPDATE openings SET
                status = $1, type = $2, live_expire_at = $3, featured_expire_at = $4,
                updated_at = NOW()
             WHERE id = $5
             RETURNING *",
        )
        .bind(payload.status)
        .bind(&opportunity_type)
        .bind(live_expire_at)
        .bind(payload.featured_expire_at)
        .bind(existing.id)
        .fetch_one(&self.pool)
        .await?;

        self.managed_view(updated).await
    }

    /// Cross-field rules the derive cannot express: taxonomy rows must exist
    /// under the right kind, the type key must be known, geography is
    /// required unless the listing is remote, and declared form fields must
    /// be complete. Failures accumulate so the caller sees them all at once.
    async fn validate_payload(&self, payload: &SaveOpeningPayload) -> Result<()> {
        let mut errors = ValidationErrors::new();

        if slug::slugify(&payload.title).is_empty() && !payload.title.is_empty() {
            errors.add(
                "title",
                error_with_message(
                    "slug",
                    "Title must contain at least one letter or number".to_string(),
                ),
            );
        }

        let service_ok = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1 AND kind = ANY($2))",
        )
        .bind(payload.service_id)
        .bind(SERVICE_KINDS)
        .fetch_one(&self.pool)
        .await?;
        if !service_ok {
            errors.add(
                "service_id",
                error_with_message("required", "Service is required".to_string()),
            );
        }

        let category_ok = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1 AND kind = ANY($2))",
        )
        .bind(payload.category_id)
        .bind(CATEGORY_KINDS)
        .fetch_one(&self.pool)
        .await?;
        if !category_ok {
            errors.add(
                "category_id",
                error_with_message("required", "Category is required".to_string()),
            );
        }

        if !self.families.is_known_type(&payload.opportunity_type) {
            errors.add(
                "type",
                error_with_message("invalid", "The selected type is invalid".to_string()),
            );
        }

        if !(0..=2).contains(&payload.apply_type) {
            errors.add(
                "apply_type",
                error_with_message("invalid", "The selected apply type is invalid".to_string()),
            );
        } else if payload.apply_type != 0 && payload.apply_target().is_none() {
            // External and email applications need a destination in meta.
            errors.add(
                "apply_type",
                error_with_message("required", "Apply type is required".to_string()),
            );
        }

        if let Some(currency) = &payload.currency {
            if !currency.is_empty() && !self.reference.has_currency(currency) {
                errors.add(
                    "currency",
                    error_with_message("invalid", "The selected currency is invalid".to_string()),
                );
            }
        }

        // The job family carries compensation fields the other families
        // do not; the rule set only widens once the type resolves there.
        if self.families.is_known_type(&payload.opportunity_type)
            && self.families.family_of(&payload.opportunity_type) == FALLBACK_FAMILY
        {
            if filled(&payload.salary_type).is_none() {
                errors.add(
                    "salary_type",
                    error_with_message(
                        "required",
                        "The salary type field is required.".to_string(),
                    ),
                );
            }
            if filled(&payload.currency).is_none() {
                errors.add(
                    "currency",
                    error_with_message("required", "The currency field is required.".to_string()),
                );
            }
            if filled(&payload.experience).is_none() {
                errors.add(
                    "experience",
                    error_with_message(
                        "required",
                        "The experience field is required.".to_string(),
                    ),
                );
            }
            if filled(&payload.expertise).is_none() {
                errors.add(
                    "expertise",
                    error_with_message(
                        "required",
                        "The expertise field is required.".to_string(),
                    ),
                );
            }
            if payload.min_salary.is_none() && payload.max_salary.is_some() {
                errors.add(
                    "min_salary",
                    error_with_message(
                        "required_with",
                        "The min salary field is required when max salary is present.".to_string(),
                    ),
                );
            }
            if payload.max_salary.is_none() && payload.min_salary.is_some() {
                errors.add(
                    "max_salary",
                    error_with_message(
                        "required_with",
                        "The max salary field is required when min salary is present.".to_string(),
                    ),
                );
            }
        }

        if let (Some(min), Some(max)) = (payload.min_salary, payload.max_salary) {
            if min > max {
                errors.add(
                    "min_salary",
                    error_with_message(
                        "range",
                        "The min salary must be less than or equal to max salary".to_string(),
                    ),
                );
            }
        }

        if !payload.is_remote() {
            match payload.country_id {
                None => errors.add(
                    "country_id",
                    error_with_message("required", "Country is required".to_string()),
                ),
                Some(country_id) if !self.reference.country_exists(country_id) => errors.add(
                    "country_id",
                    error_with_message("invalid", "The selected country is invalid".to_string()),
                ),
                Some(country_id) => match payload.state_id {
                    None => errors.add(
                        "state_id",
                        error_with_message("required", "State is required".to_string()),
                    ),
                    Some(state_id) if !self.reference.state_belongs_to(state_id, country_id) => {
                        errors.add(
                            "state_id",
                            error_with_message(
                                "invalid",
                                "The selected state is invalid".to_string(),
                            ),
                        )
                    }
                    Some(_) => {}
                },
            }
            if payload
                .address
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .is_none()
            {
                errors.add(
                    "address",
                    error_with_message("required", "Address is required".to_string()),
                );
            }
        }

        if let Some(at) = payload.expired_at {
            if at <= time::now() {
                errors.add(
                    "expired_at",
                    error_with_message(
                        "after",
                        "The expiry date must be a future date".to_string(),
                    ),
                );
            }
        }

        if let Some(fields) = &payload.fields {
            for field in fields {
                if field.label.trim().is_empty() {
                    errors.add(
                        "fields",
                        error_with_message("required", "Label is required".to_string()),
                    );
                }
                if field.field_type.trim().is_empty() {
                    errors.add(
                        "fields",
                        error_with_message("required", "Type is required".to_string()),
                    );
                } else if !FIELD_TYPES.contains(&field.field_type.as_str()) {
                    errors.add(
                        "fields",
                        error_with_message(
                            "invalid",
                            "The selected field type is invalid".to_string(),
                        ),
                    );
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }

    /// Replaces the category and tag links. The payload's category always
    /// joins the skill set; ids that match no taxonomy row are skipped.
    async fn sync_links(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        opening_id: Uuid,
        payload: &SaveOpeningPayload,
    ) -> Result<()> {
        sqlx::query("DELETE FROM category_opening WHERE opening_id = $1")
            .bind(opening_id)
            .execute(&mut **tx)
            .await?;

        let mut ids = payload.skills.clone();
        ids.push(payload.category_id);

        sqlx::query(
            "INSERT INTO category_opening (opening_id, category_id)
             SELECT $1, id FROM categories WHERE id = ANY($2)
             ON CONFLICT DO NOTHING",
        )
        .bind(opening_id)
        .bind(&ids)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Replaces the geography link. Remote listings carry none.
    async fn sync_geography(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        opening_id: Uuid,
        payload: &SaveOpeningPayload,
    ) -> Result<()> {
        sqlx::query("DELETE FROM location_opening WHERE opening_id = $1")
            .bind(opening_id)
            .execute(&mut **tx)
            .await?;

        if payload.is_remote() {
            return Ok(());
        }
        if let Some(country_id) = payload.country_id {
            sqlx::query(
                "INSERT INTO location_opening (opening_id, country_id, state_id)
                 VALUES ($1, $2, $3)",
            )
            .bind(opening_id)
            .bind(country_id)
            .bind(payload.state_id)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    async fn discard_attachment(&self, attachment: Option<String>) {
        if let Some(path) = attachment {
            if let Err(err) = self.store.remove(&path).await {
                tracing::warn!(%err, path = %path, "failed to remove attachment");
            }
        }
    }

    async fn managed_view(&self, opening: Opening) -> Result<ManagedOpeningResponse> {
        let applications_count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM applications WHERE opening_id = $1")
                .bind(opening.id)
                .fetch_one(&self.pool)
                .await?;

        let status = opening.status;
        let live_expire_at = opening.live_expire_at;
        let detail = self.assemble_detail(opening).await?;

        Ok(ManagedOpeningResponse {
            detail,
            status,
            live_expire_at,
            applications_count,
        })
    }

    async fn assemble_detail(&self, opening: Opening) -> Result<OpeningDetail> {
        let service = match opening.category_id {
            Some(id) => sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .map(|c| TaxonomyRef {
                    id: c.id,
                    title: c.title,
                    slug: c.slug,
                }),
            None => None,
        };

        let description = opening.description.clone();
        let expertise = opening.expertise.clone();
        let attachment = opening.attachment.clone();
        let apply_type = opening.apply_type;
        let meta = opening.meta.clone();
        let fields = opening.field_descriptors();
        let expired_at = opening.expired_at;

        let mut ctx = self.summary_context(std::slice::from_ref(&opening)).await?;
        let summary = self.summarize(opening, &mut ctx);

        Ok(OpeningDetail {
            summary,
            description,
            expertise,
            attachment,
            apply_type,
            meta,
            fields,
            expired_at,
            service,
        })
    }

    async fn assemble_summaries(&self, openings: Vec<Opening>) -> Result<Vec<OpeningSummary>> {
        let mut ctx = self.summary_context(&openings).await?;
        Ok(openings
            .into_iter()
            .map(|opening| self.summarize(opening, &mut ctx))
            .collect())
    }

    /// Loads owners, taxonomy links and geography for a page of listings in
    /// three batched queries instead of three per row.
    async fn summary_context(&self, openings: &[Opening]) -> Result<SummaryContext> {
        let ids: Vec<Uuid> = openings.iter().map(|o| o.id).collect();
        let owner_ids: Vec<Uuid> = openings.iter().map(|o| o.user_id).collect();

        let owners = self.owners_for(&owner_ids).await?;
        let (categories, tags) = self.links_for(&ids).await?;
        let geo = self.geo_for(&ids).await?;

        Ok(SummaryContext {
            owners,
            categories,
            tags,
            geo,
        })
    }

    fn summarize(&self, opening: Opening, ctx: &mut SummaryContext) -> OpeningSummary {
        let owner = ctx.owners.get(&opening.user_id).cloned();
        let categories = ctx.categories.remove(&opening.id).unwrap_or_default();
        let tags = ctx.tags.remove(&opening.id).unwrap_or_default();
        let (country, state) = ctx.geo.remove(&opening.id).unwrap_or((None, None));

        OpeningSummary::assemble(opening, owner, categories, tags, country, state, &self.families)
    }

    async fn owners_for(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, OwnerSummary>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(users
            .into_iter()
            .map(|user| {
                (
                    user.id,
                    OwnerSummary {
                        id: user.id,
                        name: user.name,
                        avatar: user.avatar,
                        created_at: user.created_at,
                    },
                )
            })
            .collect())
    }

    #[allow(clippy::type_complexity)]
    async fn links_for(
        &self,
        ids: &[Uuid],
    ) -> Result<(
        HashMap<Uuid, Vec<TaxonomyRef>>,
        HashMap<Uuid, Vec<TaxonomyRef>>,
    )> {
        let mut categories: HashMap<Uuid, Vec<TaxonomyRef>> = HashMap::new();
        let mut tags: HashMap<Uuid, Vec<TaxonomyRef>> = HashMap::new();
        if ids.is_empty() {
            return Ok((categories, tags));
        }

        let rows = sqlx::query_as::<_, LinkRow>(
            "SELECT co.opening_id, c.id, c.title, c.slug, c.kind
             FROM category_opening co
             JOIN categories c ON c.id = co.category_id
             WHERE co.opening_id = ANY($1)
             ORDER BY c.title",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            let bucket = if TAG_KINDS.contains(&row.kind.as_str()) {
                &mut tags
            } else {
                &mut categories
            };
            bucket.entry(row.opening_id).or_default().push(TaxonomyRef {
                id: row.id,
                title: row.title,
                slug: row.slug,
            });
        }

        Ok((categories, tags))
    }

    async fn geo_for(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, (Option<GeoRef>, Option<GeoRef>)>> {
        let mut geo = HashMap::new();
        if ids.is_empty() {
            return Ok(geo);
        }

        let rows = sqlx::query_as::<_, GeoRow>(
            "SELECT opening_id, country_id, state_id FROM location_opening
             WHERE opening_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            let country = self.reference.country_name(row.country_id).map(|name| GeoRef {
                id: row.country_id,
                name: name.to_string(),
            });
            let state = row.state_id.and_then(|state_id| {
                self.reference.state_name(state_id).map(|name| GeoRef {
                    id: state_id,
                    name: name.to_string(),
                })
            });
            geo.insert(row.opening_id, (country, state));
        }

        Ok(geo)
    }
}

struct SummaryContext {
    owners: HashMap<Uuid, OwnerSummary>,
    categories: HashMap<Uuid, Vec<TaxonomyRef>>,
    tags: HashMap<Uuid, Vec<TaxonomyRef>>,
    geo: HashMap<Uuid, (Option<GeoRef>, Option<GeoRef>)>,
}

#[derive(FromRow)]
struct LinkRow {
    opening_id: Uuid,
    id: i64,
    title: String,
    slug: String,
    kind: String,
}

#[derive(FromRow)]
struct GeoRow {
    opening_id: Uuid,
    country_id: i64,
    state_id: Option<i64>,
}

#[derive(FromRow)]
struct CountedOpeningRow {
    #[sqlx(flatten)]
    opening: Opening,
    applications_count: i64,
}

/// Dashboard status words map onto stored codes; anything unrecognized lands
/// in the inactive bucket.
fn employer_status_code(raw: &str) -> i16 {
    match raw {
        "active" => STATUS_ACTIVE,
        "pending" => STATUS_DRAFT,
        _ => STATUS_INACTIVE,
    }
}

/// Collapses per-type counts into per-family counts. Every family appears,
/// zero counts included, in taxonomy order.
fn fold_families(table: &FamilyTable, type_rows: &[(String, i64)]) -> Vec<FacetCount> {
    table
        .families()
        .iter()
        .map(|family| {
            let count: i64 = type_rows
                .iter()
                .filter(|(type_key, _)| table.family_of(type_key) == family.name)
                .map(|(_, count)| *count)
                .sum();
            FacetCount {
                value: family.name.to_string(),
                count,
            }
        })
        .collect()
}

fn check_attachment(file: &UploadedFile) -> Result<()> {
    let ext = file.extension();
    if !ATTACHMENT_EXTENSIONS.contains(&ext.as_str()) {
        return Err(field_error(
            "attachment",
            "mimes",
            "The attachment must be a file of type: pdf, doc, docx.".to_string(),
        )
        .into());
    }
    if file.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(field_error(
            "attachment",
            "max",
            "The attachment may not be greater than 5 megabytes.".to_string(),
        )
        .into());
    }
    Ok(())
}

fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_words_map_to_stored_codes() {
        assert_eq!(employer_status_code("active"), STATUS_ACTIVE);
        assert_eq!(employer_status_code("pending"), STATUS_DRAFT);
        assert_eq!(employer_status_code("archived"), STATUS_INACTIVE);
    }

    #[test]
    fn family_counts_cover_every_family() {
        let table = FamilyTable::standard();
        let rows = vec![
            ("job_full_time".to_string(), 3_i64),
            ("job_part_time".to_string(), 1),
            ("scholarship_full".to_string(), 2),
            ("grant_project".to_string(), 1),
        ];

        let folded = fold_families(&table, &rows);
        assert_eq!(folded.len(), 5);
        assert_eq!(folded[0].value, "job");
        assert_eq!(folded[0].count, 4);

        let training = folded.iter().find(|f| f.value == "training").unwrap();
        assert_eq!(training.count, 0);
    }

    #[test]
    fn attachments_are_limited_to_documents() {
        let pdf = UploadedFile {
            file_name: "cv.PDF".to_string(),
            bytes: bytes::Bytes::from(vec![0; 16]),
        };
        assert!(check_attachment(&pdf).is_ok());

        let exe = UploadedFile {
            file_name: "cv.exe".to_string(),
            bytes: bytes::Bytes::from(vec![0; 16]),
        };
        let err = check_attachment(&exe).unwrap_err();
        assert!(err.to_string().contains("attachment"));

        let huge = UploadedFile {
            file_name: "cv.pdf".to_string(),
            bytes: bytes::Bytes::from(vec![0; MAX_UPLOAD_BYTES + 1]),
        };
        assert!(check_attachment(&huge).is_err());
    }
}
