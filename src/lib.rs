pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod query;
pub mod reference;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::family::FamilyTable;
use crate::reference::ReferenceData;
use crate::services::application_service::ApplicationService;
use crate::services::notification_service::NotificationService;
use crate::services::opening_service::OpeningService;
use crate::services::storage_service::{BlobStore, DiskStore};
use crate::services::taxonomy_service::TaxonomyService;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub families: Arc<FamilyTable>,
    pub reference: Arc<ReferenceData>,
    pub opening_service: OpeningService,
    pub taxonomy_service: TaxonomyService,
    pub application_service: ApplicationService,
    pub notification_service: NotificationService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Result<Self> {
        let config = crate::config::get_config();
        let store: Arc<dyn BlobStore> = Arc::new(DiskStore::new(config.uploads_dir.clone()));
        Self::with_store(pool, store)
    }

    /// Same wiring with a caller-chosen blob store, for callers that keep
    /// files somewhere other than the configured uploads directory.
    pub fn with_store(pool: PgPool, store: Arc<dyn BlobStore>) -> Result<Self> {
        let config = crate::config::get_config();
        let families = Arc::new(FamilyTable::standard());
        let reference = Arc::new(ReferenceData::load()?);

        let notification_service =
            NotificationService::new(pool.clone(), config.mail_webhook_url.clone());
        let opening_service = OpeningService::new(
            pool.clone(),
            families.clone(),
            reference.clone(),
            store.clone(),
        );
        let taxonomy_service =
            TaxonomyService::new(pool.clone(), families.clone(), reference.clone());
        let application_service =
            ApplicationService::new(pool.clone(), store, notification_service.clone());

        Ok(Self {
            pool,
            families,
            reference,
            opening_service,
            taxonomy_service,
            application_service,
            notification_service,
        })
    }
}

/// The full route table. Binaries and tests share this so they cannot drift
/// apart; deployment-only layers (CORS, tracing, static uploads) stay in main.
pub fn app(state: AppState) -> Router {
    let config = crate::config::get_config();

    let public_api = Router::new()
        .route("/api/opportunities", get(routes::opportunity::list))
        .route(
            "/api/opportunities/filters",
            get(routes::opportunity::filter_options),
        )
        .route(
            "/api/opportunities/browse/:slug",
            get(routes::opportunity::browse),
        )
        .route("/api/opportunities/:slug", get(routes::opportunity::detail))
        .route(
            "/api/opportunities/:slug/apply",
            post(routes::opportunity::apply),
        )
        .route("/api/taxonomies", get(routes::taxonomy::index))
        .layer(axum::middleware::from_fn_with_state(
            middleware::rate_limit::RateGuard::new(config.public_rps),
            middleware::rate_limit::throttle,
        ));

    let employer_api = Router::new()
        .route(
            "/api/employer/:owner_id/opportunities",
            get(routes::employer::index).post(routes::employer::create),
        )
        .route(
            "/api/employer/:owner_id/opportunities/:slug",
            get(routes::employer::show)
                .patch(routes::employer::update)
                .delete(routes::employer::destroy),
        )
        .route(
            "/api/employer/:owner_id/opportunities/:slug/applicants",
            get(routes::employer::applicants),
        )
        .route(
            "/api/employer/:owner_id/opportunities/:slug/applicants/export",
            get(routes::employer::export_applicants),
        )
        .route(
            "/api/employer/:owner_id/applicants",
            get(routes::employer::all_applicants),
        )
        .route(
            "/api/employer/:owner_id/applications/:id/seen",
            patch(routes::employer::mark_seen),
        )
        .route(
            "/api/employer/:owner_id/applications/:id/hired",
            patch(routes::employer::mark_hired),
        );

    let admin_api = Router::new()
        .route("/api/admin/opportunities", get(routes::admin::index))
        .route("/api/admin/opportunities/stats", get(routes::admin::stats))
        .route(
            "/api/admin/opportunities/:id",
            get(routes::admin::show)
                .patch(routes::admin::update)
                .delete(routes::admin::destroy),
        )
        .route(
            "/api/admin/taxonomies",
            get(routes::taxonomy::admin_index).post(routes::taxonomy::create),
        )
        .route(
            "/api/admin/taxonomies/:id",
            patch(routes::taxonomy::update).delete(routes::taxonomy::destroy),
        );

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(public_api)
        .merge(employer_api)
        .merge(admin_api)
        .with_state(state)
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
}
