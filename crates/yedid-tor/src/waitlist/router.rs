use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::backend::{BackendError, WaitlistBackend};
use super::domain::{PersonRecord, RecordPatch};
use super::service::{WaitlistError, WaitlistService};
use super::taxonomy::{TaxonomyError, SEE_ALL_LABEL};

/// Optional `?branch=` modifier; absent means every branch.
#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    #[serde(default)]
    pub branch: Option<String>,
}

impl ScopeQuery {
    fn label(&self) -> &str {
        self.branch.as_deref().unwrap_or(SEE_ALL_LABEL)
    }
}

#[derive(Debug, Deserialize)]
pub struct AddRequest {
    pub branch: String,
    pub record: PersonRecord,
}

#[derive(Debug, Deserialize)]
pub struct PromoteRequest {
    pub name: String,
    #[serde(default)]
    pub source_branch: Option<String>,
    pub target_branch: String,
}

#[derive(Debug, Deserialize)]
pub struct DemoteRequest {
    pub name: String,
    pub target_branch: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileQuery {
    #[serde(default)]
    pub repair: bool,
}

#[derive(Debug, Serialize)]
struct FacilityView {
    name: String,
    branches: Vec<String>,
}

/// Router exposing the waitlist operations as JSON endpoints.
pub fn waitlist_router<B>(service: Arc<WaitlistService<B>>) -> Router
where
    B: WaitlistBackend + ?Sized + 'static,
{
    Router::new()
        .route("/api/v1/facilities", get(facilities_handler::<B>))
        .route(
            "/api/v1/facilities/:facility/waiting",
            get(list_handler::<B>).post(add_handler::<B>),
        )
        .route(
            "/api/v1/facilities/:facility/waiting/:name",
            patch(edit_handler::<B>).delete(remove_handler::<B>),
        )
        .route(
            "/api/v1/facilities/:facility/accepted",
            get(list_accepted_handler::<B>),
        )
        .route(
            "/api/v1/facilities/:facility/accepted/:name",
            patch(edit_accepted_handler::<B>),
        )
        .route(
            "/api/v1/facilities/:facility/promote",
            post(promote_handler::<B>),
        )
        .route(
            "/api/v1/facilities/:facility/demote",
            post(demote_handler::<B>),
        )
        .route(
            "/api/v1/facilities/:facility/statistics",
            get(statistics_handler::<B>),
        )
        .route(
            "/api/v1/facilities/:facility/refresh",
            post(refresh_handler::<B>),
        )
        .route(
            "/api/v1/facilities/:facility/reconcile",
            post(reconcile_handler::<B>),
        )
        .with_state(service)
}

/// HTTP status for a service error.
pub fn error_status(error: &WaitlistError) -> StatusCode {
    match error {
        WaitlistError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WaitlistError::Taxonomy(TaxonomyError::UnknownFacility(_)) => StatusCode::NOT_FOUND,
        WaitlistError::Taxonomy(
            TaxonomyError::UnknownBranch { .. } | TaxonomyError::PseudoBranchTarget { .. },
        ) => StatusCode::UNPROCESSABLE_ENTITY,
        WaitlistError::Taxonomy(_) => StatusCode::INTERNAL_SERVER_ERROR,
        WaitlistError::NotFound { .. } => StatusCode::NOT_FOUND,
        WaitlistError::Backend(BackendError::NotFound { .. }) => StatusCode::NOT_FOUND,
        WaitlistError::Backend(BackendError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        WaitlistError::Backend(BackendError::ReadOnly(_)) => StatusCode::METHOD_NOT_ALLOWED,
        WaitlistError::Backend(_) => StatusCode::BAD_GATEWAY,
        WaitlistError::PartialMove(_) => StatusCode::CONFLICT,
    }
}

fn error_response(error: WaitlistError) -> Response {
    let status = error_status(&error);
    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

/// Runs a service call on the blocking pool; backends do file and network I/O.
async fn run_blocking<B, T, F>(
    service: Arc<WaitlistService<B>>,
    success: StatusCode,
    operation: F,
) -> Response
where
    B: WaitlistBackend + ?Sized + 'static,
    T: Serialize + Send + 'static,
    F: FnOnce(&WaitlistService<B>) -> Result<T, WaitlistError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || operation(service.as_ref())).await {
        Ok(Ok(value)) => (success, Json(value)).into_response(),
        Ok(Err(error)) => error_response(error),
        Err(join_error) => {
            error!(error = %join_error, "waitlist operation panicked");
            let payload = json!({
                "error": "internal error",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn facilities_handler<B>(
    State(service): State<Arc<WaitlistService<B>>>,
) -> Response
where
    B: WaitlistBackend + ?Sized + 'static,
{
    let facilities: Vec<FacilityView> = service
        .taxonomy()
        .facilities()
        .iter()
        .map(|facility| FacilityView {
            name: facility.name.clone(),
            branches: facility.branch_options(),
        })
        .collect();
    (StatusCode::OK, Json(facilities)).into_response()
}

pub(crate) async fn list_handler<B>(
    State(service): State<Arc<WaitlistService<B>>>,
    Path(facility): Path<String>,
    Query(scope): Query<ScopeQuery>,
) -> Response
where
    B: WaitlistBackend + ?Sized + 'static,
{
    run_blocking(service, StatusCode::OK, move |service| {
        service.list(&facility, scope.label())
    })
    .await
}

pub(crate) async fn list_accepted_handler<B>(
    State(service): State<Arc<WaitlistService<B>>>,
    Path(facility): Path<String>,
    Query(scope): Query<ScopeQuery>,
) -> Response
where
    B: WaitlistBackend + ?Sized + 'static,
{
    run_blocking(service, StatusCode::OK, move |service| {
        service.list_accepted(&facility, scope.label())
    })
    .await
}

pub(crate) async fn add_handler<B>(
    State(service): State<Arc<WaitlistService<B>>>,
    Path(facility): Path<String>,
    Json(request): Json<AddRequest>,
) -> Response
where
    B: WaitlistBackend + ?Sized + 'static,
{
    run_blocking(service, StatusCode::CREATED, move |service| {
        service.add(&facility, &request.branch, request.record)
    })
    .await
}

pub(crate) async fn remove_handler<B>(
    State(service): State<Arc<WaitlistService<B>>>,
    Path((facility, name)): Path<(String, String)>,
    Query(scope): Query<ScopeQuery>,
) -> Response
where
    B: WaitlistBackend + ?Sized + 'static,
{
    run_blocking(service, StatusCode::OK, move |service| {
        service.remove(&facility, scope.label(), &name)
    })
    .await
}

pub(crate) async fn edit_handler<B>(
    State(service): State<Arc<WaitlistService<B>>>,
    Path((facility, name)): Path<(String, String)>,
    Query(scope): Query<ScopeQuery>,
    Json(patch): Json<RecordPatch>,
) -> Response
where
    B: WaitlistBackend + ?Sized + 'static,
{
    run_blocking(service, StatusCode::OK, move |service| {
        service.edit(&facility, scope.label(), &name, &patch)
    })
    .await
}

pub(crate) async fn edit_accepted_handler<B>(
    State(service): State<Arc<WaitlistService<B>>>,
    Path((facility, name)): Path<(String, String)>,
    Query(scope): Query<ScopeQuery>,
    Json(patch): Json<RecordPatch>,
) -> Response
where
    B: WaitlistBackend + ?Sized + 'static,
{
    run_blocking(service, StatusCode::OK, move |service| {
        service.edit_accepted(&facility, scope.label(), &name, &patch)
    })
    .await
}

pub(crate) async fn promote_handler<B>(
    State(service): State<Arc<WaitlistService<B>>>,
    Path(facility): Path<String>,
    Json(request): Json<PromoteRequest>,
) -> Response
where
    B: WaitlistBackend + ?Sized + 'static,
{
    run_blocking(service, StatusCode::OK, move |service| {
        let source = request.source_branch.as_deref().unwrap_or(SEE_ALL_LABEL);
        service.promote_to_accepted(&facility, source, &request.target_branch, &request.name)
    })
    .await
}

pub(crate) async fn demote_handler<B>(
    State(service): State<Arc<WaitlistService<B>>>,
    Path(facility): Path<String>,
    Json(request): Json<DemoteRequest>,
) -> Response
where
    B: WaitlistBackend + ?Sized + 'static,
{
    run_blocking(service, StatusCode::OK, move |service| {
        service.demote_to_waiting(&facility, &request.target_branch, &request.name)
    })
    .await
}

pub(crate) async fn statistics_handler<B>(
    State(service): State<Arc<WaitlistService<B>>>,
    Path(facility): Path<String>,
    Query(scope): Query<ScopeQuery>,
) -> Response
where
    B: WaitlistBackend + ?Sized + 'static,
{
    run_blocking(service, StatusCode::OK, move |service| {
        service.statistics(&facility, scope.label())
    })
    .await
}

pub(crate) async fn refresh_handler<B>(
    State(service): State<Arc<WaitlistService<B>>>,
    Path(facility): Path<String>,
) -> Response
where
    B: WaitlistBackend + ?Sized + 'static,
{
    run_blocking(service, StatusCode::OK, move |service| {
        service.refresh(&facility)
    })
    .await
}

pub(crate) async fn reconcile_handler<B>(
    State(service): State<Arc<WaitlistService<B>>>,
    Path(facility): Path<String>,
    Query(query): Query<ReconcileQuery>,
) -> Response
where
    B: WaitlistBackend + ?Sized + 'static,
{
    run_blocking(service, StatusCode::OK, move |service| {
        service.reconcile(&facility, query.repair)
    })
    .await
}
