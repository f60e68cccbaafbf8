//! REST routes and their handlers.
//!
//! Identifiers in the path are parsed before any lookup, so a malformed id
//! is always a `SyntaxError` no matter whether the vault or document exists.
//! The caller must then be authorized for the vault before its documents are
//! touched.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, FromRequest, Path, Query as UrlQuery, Request, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::auth::Caller;
use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use edvault_common::{
    Chunk, Document, DocumentId, EdvId, Error, NewDocument, Query, QueryResponse,
};
use edvault_vault::{VaultConfig, VaultConfigRequest};

/// JSON body whose parse failures are reported as `ValidationError`.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Create the API router.
pub fn router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/edvs", post(create_vault).get(find_vaults))
        .route("/edvs/{edv_id}", get(get_vault).post(update_vault))
        .route("/edvs/{edv_id}/indexes", post(ensure_index))
        .route("/edvs/{edv_id}/query", post(query_documents))
        .route("/edvs/{edv_id}/documents", post(insert_document))
        .route(
            "/edvs/{edv_id}/documents/{doc_id}",
            get(get_document)
                .post(update_document)
                .delete(delete_document),
        )
        .route(
            "/edvs/{edv_id}/documents/{doc_id}/chunks/{chunk_index}",
            get(get_chunk).post(store_chunk),
        )
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn authorize(
    state: &AppState,
    vault: &EdvId,
    caller: &Caller,
) -> Result<VaultConfig, ApiError> {
    Ok(state.manager.authorize_invoker(vault, caller.as_str()).await?)
}

fn document_url(state: &AppState, vault: &EdvId, id: &DocumentId) -> String {
    format!("{}/documents/{}", state.manager.vault_url(vault), id)
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /edvs
async fn create_vault(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    JsonBody(request): JsonBody<VaultConfigRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let config = state.manager.create_vault(request, caller.as_str()).await?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, config.id.clone())],
        Json(config),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindVaultsParams {
    controller: Option<String>,
    reference_id: Option<String>,
}

/// GET /edvs?controller=..&referenceId=..
async fn find_vaults(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    UrlQuery(params): UrlQuery<FindVaultsParams>,
) -> ApiResult<Vec<VaultConfig>> {
    let controller = params
        .controller
        .ok_or_else(|| ApiError::validation("controller query parameter is required"))?;
    let found = state
        .manager
        .find_vaults(&controller, params.reference_id.as_deref(), caller.as_str())
        .await?;
    Ok(Json(found))
}

/// GET /edvs/{edv_id}
async fn get_vault(
    State(state): State<Arc<AppState>>,
    Path(edv_id): Path<String>,
    caller: Caller,
) -> ApiResult<VaultConfig> {
    let vault = EdvId::parse(edv_id)?;
    Ok(Json(authorize(&state, &vault, &caller).await?))
}

/// POST /edvs/{edv_id}
async fn update_vault(
    State(state): State<Arc<AppState>>,
    Path(edv_id): Path<String>,
    caller: Caller,
    JsonBody(request): JsonBody<VaultConfigRequest>,
) -> ApiResult<VaultConfig> {
    let vault = EdvId::parse(edv_id)?;
    let config = state
        .manager
        .update_vault(&vault, request, caller.as_str())
        .await?;
    Ok(Json(config))
}

#[derive(Debug, Deserialize)]
struct IndexRequest {
    attribute: String,
    #[serde(default)]
    unique: bool,
}

/// POST /edvs/{edv_id}/indexes
async fn ensure_index(
    State(state): State<Arc<AppState>>,
    Path(edv_id): Path<String>,
    caller: Caller,
    JsonBody(request): JsonBody<IndexRequest>,
) -> Result<StatusCode, ApiError> {
    let vault = EdvId::parse(edv_id)?;
    let config = authorize(&state, &vault, &caller).await?;
    if config.controller != caller.as_str() {
        return Err(Error::PermissionDenied(
            "Only the controller may declare indexes".to_string(),
        )
        .into());
    }

    state
        .storage
        .ensure_index(&vault, &request.attribute, request.unique)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /edvs/{edv_id}/query
async fn query_documents(
    State(state): State<Arc<AppState>>,
    Path(edv_id): Path<String>,
    caller: Caller,
    JsonBody(query): JsonBody<Query>,
) -> ApiResult<QueryResponse> {
    let vault = EdvId::parse(edv_id)?;
    authorize(&state, &vault, &caller).await?;

    let response = if query.count {
        QueryResponse::Count {
            count: state.storage.count(&vault, &query).await?,
        }
    } else {
        QueryResponse::Documents(state.storage.find(&vault, &query).await?)
    };
    Ok(Json(response))
}

/// POST /edvs/{edv_id}/documents
async fn insert_document(
    State(state): State<Arc<AppState>>,
    Path(edv_id): Path<String>,
    caller: Caller,
    JsonBody(body): JsonBody<NewDocument>,
) -> Result<impl IntoResponse, ApiError> {
    let vault = EdvId::parse(edv_id)?;
    let doc = body.into_document()?;
    authorize(&state, &vault, &caller).await?;

    let stored = state.storage.insert(&vault, doc).await?;
    let location = document_url(&state, &vault, &stored.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(stored),
    ))
}

/// GET /edvs/{edv_id}/documents/{doc_id}
async fn get_document(
    State(state): State<Arc<AppState>>,
    Path((edv_id, doc_id)): Path<(String, String)>,
    caller: Caller,
) -> ApiResult<Document> {
    let vault = EdvId::parse(edv_id)?;
    let id = DocumentId::parse(doc_id)?;
    authorize(&state, &vault, &caller).await?;

    Ok(Json(state.storage.get(&vault, &id).await?))
}

/// POST /edvs/{edv_id}/documents/{doc_id}
///
/// Updates the document, or creates it when absent.
async fn update_document(
    State(state): State<Arc<AppState>>,
    Path((edv_id, doc_id)): Path<(String, String)>,
    caller: Caller,
    JsonBody(mut body): JsonBody<NewDocument>,
) -> ApiResult<Document> {
    let vault = EdvId::parse(edv_id)?;
    let id = DocumentId::parse(doc_id)?;
    if let Some(body_id) = &body.id {
        if body_id != id.as_str() {
            return Err(ApiError::validation(format!(
                "Document id '{body_id}' does not match path id '{id}'"
            )));
        }
    }
    body.id = Some(id.to_string());
    let doc = body.into_document()?;
    authorize(&state, &vault, &caller).await?;

    Ok(Json(state.storage.update(&vault, doc).await?))
}

/// DELETE /edvs/{edv_id}/documents/{doc_id}
async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path((edv_id, doc_id)): Path<(String, String)>,
    caller: Caller,
) -> ApiResult<bool> {
    let vault = EdvId::parse(edv_id)?;
    let id = DocumentId::parse(doc_id)?;
    authorize(&state, &vault, &caller).await?;

    let deleted = state.storage.delete(&vault, &id).await?;
    debug!(vault = %vault, doc = %id, deleted, "Delete handled");
    Ok(Json(deleted))
}

fn parse_chunk_index(raw: &str) -> Result<u64, ApiError> {
    raw.parse()
        .map_err(|_| Error::Syntax(format!("Invalid chunk index '{raw}'")).into())
}

/// POST /edvs/{edv_id}/documents/{doc_id}/chunks/{chunk_index}
async fn store_chunk(
    State(state): State<Arc<AppState>>,
    Path((edv_id, doc_id, chunk_index)): Path<(String, String, String)>,
    caller: Caller,
    JsonBody(chunk): JsonBody<Chunk>,
) -> Result<StatusCode, ApiError> {
    let vault = EdvId::parse(edv_id)?;
    let id = DocumentId::parse(doc_id)?;
    let index = parse_chunk_index(&chunk_index)?;
    if chunk.index != index {
        return Err(ApiError::validation(format!(
            "Chunk index {} does not match path index {index}",
            chunk.index
        )));
    }
    authorize(&state, &vault, &caller).await?;

    state.storage.store_chunk(&vault, &id, chunk).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /edvs/{edv_id}/documents/{doc_id}/chunks/{chunk_index}
async fn get_chunk(
    State(state): State<Arc<AppState>>,
    Path((edv_id, doc_id, chunk_index)): Path<(String, String, String)>,
    caller: Caller,
) -> ApiResult<Chunk> {
    let vault = EdvId::parse(edv_id)?;
    let id = DocumentId::parse(doc_id)?;
    let index = parse_chunk_index(&chunk_index)?;
    authorize(&state, &vault, &caller).await?;

    Ok(Json(state.storage.get_chunk(&vault, &id, index).await?))
}
