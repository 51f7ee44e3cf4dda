//! Request handlers for the retrieval service.
//!
//! Every handler follows the same sequence: take the serialization guard
//! (Simple variant only), decode the body, consult the authorization
//! callback with `(token, caller address, resource, id)`, and only then
//! perform the store read against the bound manager.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, OriginalUri, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::LockboxError;
use crate::service::access::AccessCallback;
use crate::store::manager::Manager;
use crate::store::normalize_id;

/// Shared state for one running service.
#[derive(Clone)]
pub(crate) struct ServiceState {
    /// The manager this service was bound to at start time.
    pub manager: Arc<Manager>,

    /// Per-request authorization decision.
    pub callback: AccessCallback,

    /// Present on the Simple variant: held across each request so only
    /// one request is in flight at a time.
    pub serialize: Option<Arc<tokio::sync::Mutex<()>>>,
}

/// Build the router for one service under its normalized path prefix.
pub(crate) fn router(prefix: &str, state: ServiceState) -> Router {
    let routes = Router::new()
        .route("/get", get(get_entry))
        .route("/check", get(check_entry))
        .route("/exists", get(exists_entry))
        .route("/list", get(list_entries))
        .with_state(state);

    if prefix.is_empty() {
        routes
    } else {
        Router::new().nest(&format!("/{prefix}"), routes)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetRequest {
    access_token: String,
    id: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckRequest {
    access_token: String,
    id: String,
    password: String,
    value: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExistsRequest {
    access_token: String,
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRequest {
    access_token: String,
}

#[derive(Serialize)]
struct GetResponse {
    value: String,
}

#[derive(Serialize)]
struct FlagResponse {
    result: bool,
}

#[derive(Serialize)]
struct ListResponse {
    ids: Vec<String>,
}

/// Store failures mapped onto HTTP statuses.  Everything that is not a
/// plain missing id is a 500, so the wire does not reveal whether a
/// password was wrong or data was corrupt.
struct ApiError(LockboxError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            LockboxError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({}))).into_response()
    }
}

fn denied() -> Response {
    (StatusCode::FORBIDDEN, Json(serde_json::json!({}))).into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_entry(
    State(state): State<ServiceState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<GetRequest>,
) -> Response {
    let _serial = acquire(&state).await;

    let id = normalize_id(&body.id);
    if !authorize(&state, &body.access_token, peer, uri.path(), &id) {
        return denied();
    }

    match state.manager.get(&id, &body.password) {
        Ok(value) => Json(GetResponse { value }).into_response(),
        Err(e) => {
            warn!(%id, error = %e, "get failed");
            ApiError(e).into_response()
        }
    }
}

async fn check_entry(
    State(state): State<ServiceState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<CheckRequest>,
) -> Response {
    let _serial = acquire(&state).await;

    let id = normalize_id(&body.id);
    if !authorize(&state, &body.access_token, peer, uri.path(), &id) {
        return denied();
    }

    match state.manager.check(&id, &body.password, &body.value) {
        Ok(result) => Json(FlagResponse { result }).into_response(),
        Err(e) => {
            warn!(%id, error = %e, "check failed");
            ApiError(e).into_response()
        }
    }
}

async fn exists_entry(
    State(state): State<ServiceState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<ExistsRequest>,
) -> Response {
    let _serial = acquire(&state).await;

    let id = normalize_id(&body.id);
    if !authorize(&state, &body.access_token, peer, uri.path(), &id) {
        return denied();
    }

    Json(FlagResponse {
        result: state.manager.exists(&id),
    })
    .into_response()
}

async fn list_entries(
    State(state): State<ServiceState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<ListRequest>,
) -> Response {
    let _serial = acquire(&state).await;

    // Whole-store operations authorize with an empty id.
    if !authorize(&state, &body.access_token, peer, uri.path(), "") {
        return denied();
    }

    Json(ListResponse {
        ids: state.manager.list(),
    })
    .into_response()
}

// ---------------------------------------------------------------------------
// Shared handler plumbing
// ---------------------------------------------------------------------------

async fn acquire(state: &ServiceState) -> Option<tokio::sync::OwnedMutexGuard<()>> {
    match &state.serialize {
        Some(gate) => Some(Arc::clone(gate).lock_owned().await),
        None => None,
    }
}

fn authorize(
    state: &ServiceState,
    token: &str,
    peer: SocketAddr,
    resource: &str,
    id: &str,
) -> bool {
    let caller = peer.ip().to_string();
    debug!(%caller, %resource, "request");

    let allowed = (state.callback)(token, &caller, resource, id);
    if !allowed {
        warn!(%caller, %resource, %id, "access denied");
    }
    allowed
}
