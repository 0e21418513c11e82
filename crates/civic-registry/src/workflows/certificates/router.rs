use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::documents::{DocumentField, DocumentUpload};
use super::domain::{Draft, RecordId};
use super::identity::OfficerIdentity;
use super::lifecycle::QueueFilter;
use super::notification::Notifier;
use super::repository::{ApplicationRepository, ListFilter, StatusFlags};
use super::service::{CertificatePortal, PortalError};
use super::sessions::{DraftPatch, SessionId};
use crate::error::AppError;

type Portal<R, N> = Arc<CertificatePortal<R, N>>;

/// Router exposing the applicant wizard, status lookups and the officer review surface.
pub fn application_router<R, N>(portal: Portal<R, N>) -> Router
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/api/v1/wizard/sessions", post(open_session_handler::<R, N>))
        .route(
            "/api/v1/wizard/sessions/:session_id",
            get(session_handler::<R, N>).delete(close_session_handler::<R, N>),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/draft",
            put(patch_draft_handler::<R, N>),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/advance",
            post(advance_handler::<R, N>),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/retreat",
            post(retreat_handler::<R, N>),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/cancel",
            post(cancel_handler::<R, N>),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/documents/:field",
            post(upload_handler::<R, N>),
        )
        .route("/api/v1/applications", post(submit_handler::<R, N>))
        .route(
            "/api/v1/applications/:tracking_id",
            get(status_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:tracking_id/export",
            get(export_handler::<R, N>),
        )
        .route(
            "/api/v1/verification/codes",
            post(issue_code_handler::<R, N>),
        )
        .route(
            "/api/v1/verification/codes/verify",
            post(verify_code_handler::<R, N>),
        )
        .route("/api/v1/officer/queue", get(queue_handler::<R, N>))
        .route(
            "/api/v1/officer/applications",
            get(list_handler::<R, N>),
        )
        .route("/api/v1/officer/stats", get(stats_handler::<R, N>))
        .route(
            "/api/v1/officer/applications/:record_id/decision",
            post(decision_handler::<R, N>),
        )
        .with_state(portal)
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, PortalError>) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}

fn officer<R, N>(
    portal: &CertificatePortal<R, N>,
    headers: &HeaderMap,
) -> Result<OfficerIdentity, PortalError>
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    portal.authenticate(authorization)
}

pub(crate) async fn open_session_handler<R, N>(State(portal): State<Portal<R, N>>) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    (StatusCode::CREATED, axum::Json(portal.open_session())).into_response()
}

pub(crate) async fn session_handler<R, N>(
    State(portal): State<Portal<R, N>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, portal.session(&SessionId(session_id)))
}

pub(crate) async fn close_session_handler<R, N>(
    State(portal): State<Portal<R, N>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, portal.close_session(&SessionId(session_id)))
}

pub(crate) async fn patch_draft_handler<R, N>(
    State(portal): State<Portal<R, N>>,
    Path(session_id): Path<String>,
    axum::Json(patch): axum::Json<DraftPatch>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        portal.patch_draft(&SessionId(session_id), &patch),
    )
}

pub(crate) async fn advance_handler<R, N>(
    State(portal): State<Portal<R, N>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, portal.advance(&SessionId(session_id)))
}

pub(crate) async fn retreat_handler<R, N>(
    State(portal): State<Portal<R, N>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, portal.retreat(&SessionId(session_id)))
}

pub(crate) async fn cancel_handler<R, N>(
    State(portal): State<Portal<R, N>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, portal.cancel(&SessionId(session_id)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadQuery {
    file_name: Option<String>,
}

pub(crate) async fn upload_handler<R, N>(
    State(portal): State<Portal<R, N>>,
    Path((session_id, field)): Path<(String, String)>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    let field = match field.parse::<DocumentField>() {
        Ok(field) => field,
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            return (StatusCode::NOT_FOUND, axum::Json(payload)).into_response();
        }
    };

    let upload = DocumentUpload {
        field,
        file_name: query
            .file_name
            .unwrap_or_else(|| field.wire_name().to_string()),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        bytes: body.to_vec(),
    };

    respond(
        StatusCode::OK,
        portal.attach_document(&SessionId(session_id), upload),
    )
}

pub(crate) async fn submit_handler<R, N>(
    State(portal): State<Portal<R, N>>,
    axum::Json(draft): axum::Json<Draft>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::CREATED, portal.submit_draft(draft))
}

pub(crate) async fn status_handler<R, N>(
    State(portal): State<Portal<R, N>>,
    Path(tracking_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, portal.status(&tracking_id))
}

pub(crate) async fn export_handler<R, N>(
    State(portal): State<Portal<R, N>>,
    Path(tracking_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    match portal.export(&tracking_id) {
        Ok(artifact) => {
            let disposition = format!("attachment; filename=\"{}\"", artifact.file_name);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, artifact.content_type),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                artifact.bytes,
            )
                .into_response()
        }
        Err(error) => AppError::from(error).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CodeRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyRequest {
    email: String,
    code: String,
}

pub(crate) async fn issue_code_handler<R, N>(
    State(portal): State<Portal<R, N>>,
    axum::Json(request): axum::Json<CodeRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::ACCEPTED, portal.issue_code(&request.email))
}

pub(crate) async fn verify_code_handler<R, N>(
    State(portal): State<Portal<R, N>>,
    axum::Json(request): axum::Json<VerifyRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    let result = portal
        .verify_code(&request.email, &request.code)
        .map(|()| json!({ "verified": true }));
    respond(StatusCode::OK, result)
}

pub(crate) async fn queue_handler<R, N>(
    State(portal): State<Portal<R, N>>,
    headers: HeaderMap,
    Query(filter): Query<QueueFilter>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    let result = officer(&portal, &headers).and_then(|_| portal.queue(&filter));
    respond(StatusCode::OK, result)
}

pub(crate) async fn list_handler<R, N>(
    State(portal): State<Portal<R, N>>,
    headers: HeaderMap,
    Query(filter): Query<ListFilter>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    let result = officer(&portal, &headers).and_then(|_| portal.list(&filter));
    respond(StatusCode::OK, result)
}

pub(crate) async fn stats_handler<R, N>(
    State(portal): State<Portal<R, N>>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    let result = officer(&portal, &headers).and_then(|_| portal.stats());
    respond(StatusCode::OK, result)
}

/// Officer decision in the persisted flag shape.
#[derive(Debug, Deserialize)]
pub(crate) struct DecisionRequest {
    #[serde(flatten)]
    flags: StatusFlags,
    #[serde(default)]
    reason: Option<String>,
}

pub(crate) async fn decision_handler<R, N>(
    State(portal): State<Portal<R, N>>,
    Path(record_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<DecisionRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    let result = officer(&portal, &headers).and_then(|identity| {
        portal.decide(
            &RecordId(record_id),
            request.flags,
            request.reason,
            &identity,
        )
    });
    respond(StatusCode::OK, result)
}
