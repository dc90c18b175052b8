use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::{ValidateEmail, ValidationErrors};

use crate::dto::application_dto::{
    ApplicantListQuery, ApplicantListResponse, ApplicantProfile, ApplicantRow,
    ApplicationResponse, RawAnswer,
};
use crate::error::{Error, Result};
use crate::models::application::{Answer, Application};
use crate::models::opening::{FieldDescriptor, Opening};
use crate::models::user::User;
use crate::query::SortOrder;
use crate::services::notification_service::NotificationService;
use crate::services::storage_service::{extension_of, BlobStore, UploadedFile};
use crate::utils::time;
use crate::utils::validation::error_with_message;

const ANSWER_FILE_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];
const MAX_ANSWER_FILE_BYTES: usize = 5 * 1024 * 1024;
const APPLICANTS_PER_PAGE: i64 = 10;

const ALREADY_APPLIED: &str = "You have already applied for this opportunity.";

/// The application flow: candidates answer a listing's form, employers read
/// and triage what came in.
#[derive(Clone)]
pub struct ApplicationService {
    pool: PgPool,
    store: Arc<dyn BlobStore>,
    notifier: NotificationService,
}

impl ApplicationService {
    pub fn new(pool: PgPool, store: Arc<dyn BlobStore>, notifier: NotificationService) -> Self {
        Self {
            pool,
            store,
            notifier,
        }
    }

    /// Submits an application to a visible listing. Answers are validated
    /// against the listing's own form definition; one application per
    /// candidate per listing.
    pub async fn apply(
        &self,
        slug: &str,
        applicant_id: Uuid,
        mut answers: HashMap<String, RawAnswer>,
    ) -> Result<ApplicationResponse> {
        let opening = sqlx::query_as::<_, Opening>(
            "SELECT * FROM openings WHERE slug = $1 AND status = 1 AND live_expire_at > $2",
        )
        .bind(slug)
        .bind(time::today_start())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Opportunity not found".to_string()))?;

        if opening.apply_type != 0 {
            return Err(Error::BadRequest(
                "Applications are handled externally for this opportunity.".to_string(),
            ));
        }

        let applicant = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(applicant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;

        let duplicate = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM applications WHERE opening_id = $1 AND user_id = $2)",
        )
        .bind(opening.id)
        .bind(applicant.id)
        .fetch_one(&self.pool)
        .await?;
        if duplicate {
            return Err(Error::Conflict(ALREADY_APPLIED.to_string()));
        }

        let descriptors = opening.field_descriptors();
        check_answers(&descriptors, &answers)?;

        let mut stored = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let value = match answers.remove(&descriptor.label) {
                Some(RawAnswer::Text(text)) => text.trim().to_string(),
                Some(RawAnswer::File { file_name, bytes }) => {
                    let file = UploadedFile { file_name, bytes };
                    self.store.save("applications", &file).await?
                }
                None => continue,
            };
            stored.push(Answer {
                label: descriptor.label.clone(),
                value,
                field_type: descriptor.field_type.clone(),
            });
        }
        let data = serde_json::to_value(&stored)?;

        let owner = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(opening.user_id)
            .fetch_optional(&self.pool)
            .await?;

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Application>(
            "INSERT INTO applications (opening_id, user_id, data) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(opening.id)
        .bind(applicant.id)
        .bind(&data)
        .fetch_one(&mut *tx)
        .await;
        let application = match inserted {
            Ok(application) => application,
            // Two submissions racing past the pre-check land here; the
            // unique key keeps exactly one.
            Err(err) if is_unique_violation(&err) => {
                return Err(Error::Conflict(ALREADY_APPLIED.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        NotificationService::notify_tx(
            &mut tx,
            opening.user_id,
            "New application",
            &format!(
                "{} has applied for your opportunity: {}",
                applicant.name, opening.title
            ),
            Some(&format!("/employer/opportunity/{}", opening.slug)),
        )
        .await?;

        tx.commit().await?;

        if let Some(owner) = owner {
            self.notifier
                .send_email_alert(
                    &owner.email,
                    "New application",
                    json!({
                        "opportunity": opening.title,
                        "applicant": applicant.name,
                        "message": format!(
                            "{} has applied for your opportunity: {}",
                            applicant.name, opening.title
                        ),
                    }),
                )
                .await;
        }

        Ok(ApplicationResponse {
            id: application.id,
            opening_id: application.opening_id,
            message: "Application submitted successfully.".to_string(),
        })
    }

    /// Applications for one listing the owner holds.
    pub async fn applicants_for_opening(
        &self,
        owner_id: Uuid,
        slug: &str,
        params: &ApplicantListQuery,
    ) -> Result<ApplicantListResponse> {
        let opening_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM openings WHERE slug = $1 AND user_id = $2",
        )
        .bind(slug)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Opportunity not found".to_string()))?;

        self.applicant_page("a.opening_id = $1", opening_id, params)
            .await
    }

    /// Applications across every listing the owner holds.
    pub async fn all_applicants(
        &self,
        owner_id: Uuid,
        params: &ApplicantListQuery,
    ) -> Result<ApplicantListResponse> {
        self.applicant_page("o.user_id = $1", owner_id, params).await
    }

    /// Stamps the first-seen time; later calls leave the stamp alone. The
    /// ownership join keeps employers out of each other's inboxes.
    pub async fn mark_seen(&self, owner_id: Uuid, application_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE applications SET seen_at = COALESCE(applications.seen_at, NOW())
             FROM openings o
             WHERE applications.id = $1
               AND o.id = applications.opening_id AND o.user_id = $2",
        )
        .bind(application_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Application not found".to_string()));
        }
        Ok(())
    }

    pub async fn mark_hired(
        &self,
        owner_id: Uuid,
        application_id: Uuid,
        hired: bool,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE applications SET is_hired = $3
             FROM openings o
             WHERE applications.id = $1
               AND o.id = applications.opening_id AND o.user_id = $2",
        )
        .bind(application_id)
        .bind(owner_id)
        .bind(hired)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Application not found".to_string()));
        }
        Ok(())
    }

    /// Every row for one listing, unpaged and oldest first, for the
    /// spreadsheet export. Returns the listing too so the caller can name
    /// the sheet and lay out the answer columns.
    pub async fn applicants_for_export(
        &self,
        owner_id: Uuid,
        slug: &str,
    ) -> Result<(Opening, Vec<ApplicantRow>)> {
        let opening = sqlx::query_as::<_, Opening>(
            "SELECT * FROM openings WHERE slug = $1 AND user_id = $2",
        )
        .bind(slug)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Opportunity not found".to_string()))?;

        let rows = sqlx::query_as::<_, ApplicantJoinRow>(&format!(
            "{} WHERE a.opening_id = $1 ORDER BY a.created_at ASC, a.id ASC",
            APPLICANT_SELECT
        ))
        .bind(opening.id)
        .fetch_all(&self.pool)
        .await?;

        Ok((opening, rows.into_iter().map(ApplicantJoinRow::into_row).collect()))
    }

    async fn applicant_page(
        &self,
        scope: &str,
        scope_id: Uuid,
        params: &ApplicantListQuery,
    ) -> Result<ApplicantListResponse> {
        let page = params.page.unwrap_or(1).max(1);
        let per_page = params.per_page.unwrap_or(APPLICANTS_PER_PAGE).clamp(1, 100);
        let offset = (page - 1) * per_page;
        let order_sql = match SortOrder::from_param(params.order.as_deref()) {
            SortOrder::Asc => "ORDER BY a.created_at ASC, a.id ASC",
            SortOrder::Desc => "ORDER BY a.created_at DESC, a.id DESC",
        };

        let count_sql = format!(
            "SELECT COUNT(*) FROM applications a
             JOIN openings o ON o.id = a.opening_id
             WHERE {}",
            scope
        );
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(scope_id)
            .fetch_one(&self.pool)
            .await?;

        let rows_sql = format!(
            "{} WHERE {} {} LIMIT $2 OFFSET $3",
            APPLICANT_SELECT, scope, order_sql
        );
        let rows = sqlx::query_as::<_, ApplicantJoinRow>(&rows_sql)
            .bind(scope_id)
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let total_pages = (total as f64 / per_page as f64).ceil() as i64;

        Ok(ApplicantListResponse {
            items: rows.into_iter().map(ApplicantJoinRow::into_row).collect(),
            total,
            page,
            per_page,
            total_pages,
        })
    }
}

const APPLICANT_SELECT: &str = "SELECT a.*,
        u.name AS applicant_name, u.email AS applicant_email,
        u.avatar AS applicant_avatar, u.created_at AS applicant_created_at,
        o.title AS opening_title, o.slug AS opening_slug
     FROM applications a
     JOIN users u ON u.id = a.user_id
     JOIN openings o ON o.id = a.opening_id";

#[derive(FromRow)]
struct ApplicantJoinRow {
    #[sqlx(flatten)]
    application: Application,
    applicant_name: String,
    applicant_email: String,
    applicant_avatar: Option<String>,
    applicant_created_at: DateTime<Utc>,
    opening_title: String,
    opening_slug: String,
}

impl ApplicantJoinRow {
    fn into_row(self) -> ApplicantRow {
        let applicant = ApplicantProfile {
            id: self.application.user_id,
            name: self.applicant_name,
            email: self.applicant_email,
            avatar: self.applicant_avatar,
            created_at: self.applicant_created_at,
        };
        ApplicantRow::assemble(
            self.application,
            applicant,
            self.opening_title,
            self.opening_slug,
        )
    }
}

/// Validates submitted answers against the listing's form definition.
/// Failures accumulate so the candidate sees every problem at once, each
/// message carrying the field's own label.
fn check_answers(
    descriptors: &[FieldDescriptor],
    answers: &HashMap<String, RawAnswer>,
) -> Result<()> {
    let mut errors = ValidationErrors::new();

    for descriptor in descriptors {
        match answers.get(&descriptor.label) {
            None => errors.add(
                "fields",
                error_with_message("required", format!("{} is required.", descriptor.label)),
            ),
            Some(RawAnswer::Text(raw)) => {
                let value = raw.trim();
                if value.is_empty() {
                    errors.add(
                        "fields",
                        error_with_message(
                            "required",
                            format!("{} is required.", descriptor.label),
                        ),
                    );
                    continue;
                }
                match descriptor.field_type.as_str() {
                    "email" if !value.validate_email() => errors.add(
                        "fields",
                        error_with_message(
                            "email",
                            format!("{} must be a valid email.", descriptor.label),
                        ),
                    ),
                    "number" if value.parse::<f64>().is_err() => errors.add(
                        "fields",
                        error_with_message(
                            "number",
                            format!("{} must be a number.", descriptor.label),
                        ),
                    ),
                    "file" => errors.add(
                        "fields",
                        error_with_message(
                            "mimes",
                            format!(
                                "{} must be a file of type: pdf, doc, docx.",
                                descriptor.label
                            ),
                        ),
                    ),
                    _ => {}
                }
            }
            Some(RawAnswer::File { file_name, bytes }) => {
                if descriptor.field_type != "file" {
                    errors.add(
                        "fields",
                        error_with_message(
                            "invalid",
                            format!("{} is invalid.", descriptor.label),
                        ),
                    );
                    continue;
                }
                let ext = extension_of(file_name);
                if !ANSWER_FILE_EXTENSIONS.contains(&ext.as_str()) {
                    errors.add(
                        "fields",
                        error_with_message(
                            "mimes",
                            format!(
                                "{} must be a file of type: pdf, doc, docx.",
                                descriptor.label
                            ),
                        ),
                    );
                }
                if bytes.len() > MAX_ANSWER_FILE_BYTES {
                    errors.add(
                        "fields",
                        error_with_message(
                            "max",
                            format!(
                                "{} may not be greater than 5 megabytes.",
                                descriptor.label
                            ),
                        ),
                    );
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(label: &str, field_type: &str) -> FieldDescriptor {
        FieldDescriptor {
            label: label.to_string(),
            field_type: field_type.to_string(),
        }
    }

    #[test]
    fn missing_answers_fail_with_the_field_label() {
        let descriptors = vec![descriptor("Cover Letter", "textarea")];
        let err = check_answers(&descriptors, &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("Cover Letter is required."));
    }

    #[test]
    fn email_answers_must_parse() {
        let descriptors = vec![descriptor("Contact Email", "email")];

        let mut answers = HashMap::new();
        answers.insert(
            "Contact Email".to_string(),
            RawAnswer::Text("not-an-email".to_string()),
        );
        let err = check_answers(&descriptors, &answers).unwrap_err();
        assert!(err.to_string().contains("must be a valid email"));

        answers.insert(
            "Contact Email".to_string(),
            RawAnswer::Text("person@example.com".to_string()),
        );
        assert!(check_answers(&descriptors, &answers).is_ok());
    }

    #[test]
    fn number_answers_must_parse() {
        let descriptors = vec![descriptor("Expected Salary", "number")];

        let mut answers = HashMap::new();
        answers.insert(
            "Expected Salary".to_string(),
            RawAnswer::Text("a lot".to_string()),
        );
        assert!(check_answers(&descriptors, &answers).is_err());

        answers.insert(
            "Expected Salary".to_string(),
            RawAnswer::Text("85000".to_string()),
        );
        assert!(check_answers(&descriptors, &answers).is_ok());
    }

    #[test]
    fn file_answers_check_extension_and_size() {
        let descriptors = vec![descriptor("Resume", "file")];

        let mut answers = HashMap::new();
        answers.insert(
            "Resume".to_string(),
            RawAnswer::File {
                file_name: "resume.exe".to_string(),
                bytes: bytes::Bytes::from(vec![0; 8]),
            },
        );
        let err = check_answers(&descriptors, &answers).unwrap_err();
        assert!(err.to_string().contains("pdf, doc, docx"));

        answers.insert(
            "Resume".to_string(),
            RawAnswer::File {
                file_name: "resume.pdf".to_string(),
                bytes: bytes::Bytes::from(vec![0; MAX_ANSWER_FILE_BYTES + 1]),
            },
        );
        let err = check_answers(&descriptors, &answers).unwrap_err();
        assert!(err.to_string().contains("5 megabytes"));

        answers.insert(
            "Resume".to_string(),
            RawAnswer::File {
                file_name: "resume.pdf".to_string(),
                bytes: bytes::Bytes::from(vec![0; 8]),
            },
        );
        assert!(check_answers(&descriptors, &answers).is_ok());

        // A plain string where a file belongs is rejected too.
        answers.insert(
            "Resume".to_string(),
            RawAnswer::Text("see attached".to_string()),
        );
        assert!(check_answers(&descriptors, &answers).is_err());
    }

    #[test]
    fn extra_answers_are_ignored() {
        let descriptors = vec![descriptor("Name", "text")];
        let mut answers = HashMap::new();
        answers.insert("Name".to_string(), RawAnswer::Text("Ada".to_string()));
        answers.insert(
            "Unsolicited".to_string(),
            RawAnswer::Text("noise".to_string()),
        );
        assert!(check_answers(&descriptors, &answers).is_ok());
    }
}
