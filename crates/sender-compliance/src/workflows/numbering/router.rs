use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{NumberingKind, RecordId, RecordPatch, SenderId, StatusId, TemplateId};
use super::lifecycle::{LifecycleError, NumberingLifecycle};
use super::store::{BlobStore, ComplianceStore};
use crate::workflows::briefs::{brief_file_name, DOCX_MIME};
use crate::workflows::generation::TextGenerator;
use crate::workflows::samples::SampleCopyPatch;

pub const ACTOR_HEADER: &str = "x-actor";
const DEFAULT_ACTOR: &str = "system";

type Lifecycle<S, B, G> = Arc<NumberingLifecycle<S, B, G>>;

/// HTTP endpoints for the numbering lifecycle, one route per exposed operation.
pub fn numbering_router<S, B, G>(lifecycle: Lifecycle<S, B, G>) -> Router
where
    S: ComplianceStore + 'static,
    B: BlobStore + 'static,
    G: TextGenerator + 'static,
{
    Router::new()
        .route(
            "/api/v1/:kind/records",
            post(create_handler::<S, B, G>).get(list_handler::<S, B, G>),
        )
        .route(
            "/api/v1/:kind/records/:record_id",
            get(get_handler::<S, B, G>).patch(update_handler::<S, B, G>),
        )
        .route(
            "/api/v1/:kind/records/:record_id/use-case",
            post(generate_use_case_handler::<S, B, G>).put(commit_use_case_handler::<S, B, G>),
        )
        .route(
            "/api/v1/:kind/records/:record_id/samples",
            post(generate_samples_handler::<S, B, G>).patch(edit_samples_handler::<S, B, G>),
        )
        .route(
            "/api/v1/:kind/records/:record_id/brief",
            get(brief_handler::<S, B, G>).put(publish_brief_handler::<S, B, G>),
        )
        .route(
            "/api/v1/brief-templates/:template_id",
            delete(retire_template_handler::<S, B, G>),
        )
        .with_state(lifecycle)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateRecordRequest {
    pub sender_id: SenderId,
    #[serde(default)]
    pub did: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusQuery {
    pub status: u16,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UseCaseRequest {
    pub text: String,
}

pub(crate) async fn create_handler<S, B, G>(
    State(lifecycle): State<Lifecycle<S, B, G>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    Json(request): Json<CreateRecordRequest>,
) -> Response
where
    S: ComplianceStore + 'static,
    B: BlobStore + 'static,
    G: TextGenerator + 'static,
{
    let Some(kind) = NumberingKind::from_segment(&kind) else {
        return unknown_kind(&kind);
    };
    let actor = actor(&headers);
    let outcome = run_blocking(lifecycle, move |lifecycle| {
        lifecycle.create(kind, request.sender_id, request.did.as_deref(), &actor)
    })
    .await;
    match outcome {
        Ok(id) => (StatusCode::CREATED, Json(json!({ "id": id }))).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn list_handler<S, B, G>(
    State(lifecycle): State<Lifecycle<S, B, G>>,
    Path(kind): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Response
where
    S: ComplianceStore + 'static,
    B: BlobStore + 'static,
    G: TextGenerator + 'static,
{
    let Some(kind) = NumberingKind::from_segment(&kind) else {
        return unknown_kind(&kind);
    };
    let status_id = StatusId(query.status);
    match run_blocking(lifecycle, move |lifecycle| lifecycle.list_by_status(kind, status_id)).await
    {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn get_handler<S, B, G>(
    State(lifecycle): State<Lifecycle<S, B, G>>,
    Path((kind, record_id)): Path<(String, u64)>,
) -> Response
where
    S: ComplianceStore + 'static,
    B: BlobStore + 'static,
    G: TextGenerator + 'static,
{
    let Some(kind) = NumberingKind::from_segment(&kind) else {
        return unknown_kind(&kind);
    };
    match run_blocking(lifecycle, move |lifecycle| lifecycle.get(kind, RecordId(record_id))).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn update_handler<S, B, G>(
    State(lifecycle): State<Lifecycle<S, B, G>>,
    Path((kind, record_id)): Path<(String, u64)>,
    headers: HeaderMap,
    Json(patch): Json<RecordPatch>,
) -> Response
where
    S: ComplianceStore + 'static,
    B: BlobStore + 'static,
    G: TextGenerator + 'static,
{
    let Some(kind) = NumberingKind::from_segment(&kind) else {
        return unknown_kind(&kind);
    };
    let actor = actor(&headers);
    let outcome = run_blocking(lifecycle, move |lifecycle| {
        lifecycle.update(kind, RecordId(record_id), patch, &actor)
    })
    .await;
    match outcome {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn generate_use_case_handler<S, B, G>(
    State(lifecycle): State<Lifecycle<S, B, G>>,
    Path((kind, record_id)): Path<(String, u64)>,
) -> Response
where
    S: ComplianceStore + 'static,
    B: BlobStore + 'static,
    G: TextGenerator + 'static,
{
    let Some(kind) = NumberingKind::from_segment(&kind) else {
        return unknown_kind(&kind);
    };
    let outcome = run_blocking(lifecycle, move |lifecycle| {
        lifecycle.generate_use_case(kind, RecordId(record_id))
    })
    .await;
    match outcome {
        Ok(text) => (StatusCode::OK, Json(json!({ "use_case": text }))).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn commit_use_case_handler<S, B, G>(
    State(lifecycle): State<Lifecycle<S, B, G>>,
    Path((kind, record_id)): Path<(String, u64)>,
    headers: HeaderMap,
    Json(request): Json<UseCaseRequest>,
) -> Response
where
    S: ComplianceStore + 'static,
    B: BlobStore + 'static,
    G: TextGenerator + 'static,
{
    let Some(kind) = NumberingKind::from_segment(&kind) else {
        return unknown_kind(&kind);
    };
    let actor = actor(&headers);
    let outcome = run_blocking(lifecycle, move |lifecycle| {
        lifecycle.commit_use_case(kind, RecordId(record_id), &request.text, &actor)
    })
    .await;
    match outcome {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn generate_samples_handler<S, B, G>(
    State(lifecycle): State<Lifecycle<S, B, G>>,
    Path((kind, record_id)): Path<(String, u64)>,
    headers: HeaderMap,
) -> Response
where
    S: ComplianceStore + 'static,
    B: BlobStore + 'static,
    G: TextGenerator + 'static,
{
    let Some(kind) = NumberingKind::from_segment(&kind) else {
        return unknown_kind(&kind);
    };
    let actor = actor(&headers);
    let outcome = run_blocking(lifecycle, move |lifecycle| {
        lifecycle.generate_sample_copies(kind, RecordId(record_id), &actor)
    })
    .await;
    match outcome {
        Ok(copies) => (StatusCode::OK, Json(copies)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn edit_samples_handler<S, B, G>(
    State(lifecycle): State<Lifecycle<S, B, G>>,
    Path((kind, record_id)): Path<(String, u64)>,
    headers: HeaderMap,
    Json(patch): Json<SampleCopyPatch>,
) -> Response
where
    S: ComplianceStore + 'static,
    B: BlobStore + 'static,
    G: TextGenerator + 'static,
{
    let Some(kind) = NumberingKind::from_segment(&kind) else {
        return unknown_kind(&kind);
    };
    let actor = actor(&headers);
    let outcome = run_blocking(lifecycle, move |lifecycle| {
        lifecycle.edit_sample_copies(kind, RecordId(record_id), patch, &actor)
    })
    .await;
    match outcome {
        Ok(copies) => (StatusCode::OK, Json(copies)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn brief_handler<S, B, G>(
    State(lifecycle): State<Lifecycle<S, B, G>>,
    Path((kind, record_id)): Path<(String, u64)>,
) -> Response
where
    S: ComplianceStore + 'static,
    B: BlobStore + 'static,
    G: TextGenerator + 'static,
{
    let Some(kind) = NumberingKind::from_segment(&kind) else {
        return unknown_kind(&kind);
    };
    let outcome = run_blocking(lifecycle, move |lifecycle| {
        lifecycle.generate_brief(kind, RecordId(record_id))
    })
    .await;
    match outcome {
        Ok(document) => {
            let disposition = format!(
                "attachment; filename=\"{}\"",
                brief_file_name(record_id, Utc::now())
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, DOCX_MIME.to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                document,
            )
                .into_response()
        }
        Err(response) => response,
    }
}

pub(crate) async fn publish_brief_handler<S, B, G>(
    State(lifecycle): State<Lifecycle<S, B, G>>,
    Path((kind, record_id)): Path<(String, u64)>,
    headers: HeaderMap,
) -> Response
where
    S: ComplianceStore + 'static,
    B: BlobStore + 'static,
    G: TextGenerator + 'static,
{
    let Some(kind) = NumberingKind::from_segment(&kind) else {
        return unknown_kind(&kind);
    };
    let actor = actor(&headers);
    let outcome = run_blocking(lifecycle, move |lifecycle| {
        lifecycle.publish_brief(kind, RecordId(record_id), &actor)
    })
    .await;
    match outcome {
        Ok(artifact) => (StatusCode::CREATED, Json(artifact)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn retire_template_handler<S, B, G>(
    State(lifecycle): State<Lifecycle<S, B, G>>,
    Path(template_id): Path<u64>,
) -> Response
where
    S: ComplianceStore + 'static,
    B: BlobStore + 'static,
    G: TextGenerator + 'static,
{
    let outcome = run_blocking(lifecycle, move |lifecycle| {
        lifecycle.retire_template(TemplateId(template_id))
    })
    .await;
    match outcome {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(response) => response,
    }
}

/// Lifecycle operations block on their collaborators, so they run on the blocking pool.
async fn run_blocking<S, B, G, T, F>(
    lifecycle: Lifecycle<S, B, G>,
    operation: F,
) -> Result<T, Response>
where
    S: ComplianceStore + 'static,
    B: BlobStore + 'static,
    G: TextGenerator + 'static,
    T: Send + 'static,
    F: FnOnce(&NumberingLifecycle<S, B, G>) -> Result<T, LifecycleError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || operation(&lifecycle)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(error_response(error)),
        Err(join_error) => {
            error!(%join_error, "lifecycle task did not complete");
            let payload = json!({
                "error": "lifecycle task did not complete",
                "kind": "internal",
            });
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response())
        }
    }
}

fn actor(headers: &HeaderMap) -> String {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_ACTOR)
        .to_string()
}

fn unknown_kind(segment: &str) -> Response {
    let payload = json!({
        "error": format!("unknown numbering kind `{segment}`"),
        "kind": "not_found",
    });
    (StatusCode::NOT_FOUND, Json(payload)).into_response()
}

pub(crate) fn http_status(error: &LifecycleError) -> StatusCode {
    match error {
        LifecycleError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LifecycleError::Conflict(_) => StatusCode::CONFLICT,
        LifecycleError::NotFound { .. } => StatusCode::NOT_FOUND,
        LifecycleError::Generation(_) => StatusCode::BAD_GATEWAY,
        LifecycleError::Template(_) | LifecycleError::Render(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        LifecycleError::Store(_) | LifecycleError::Blob(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub(crate) fn error_response(error: LifecycleError) -> Response {
    let status = http_status(&error);
    let mut payload = json!({
        "error": error.to_string(),
        "kind": error.kind(),
    });
    if let LifecycleError::Validation(violation) = &error {
        payload["field"] = json!(violation.field());
    }
    (status, Json(payload)).into_response()
}
