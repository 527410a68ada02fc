//! HTTP control surface: thin JSON adapters over the registry and dispatcher.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use switchyard_core::errors::RelayError;
use switchyard_core::ids::ClientId;
use switchyard_core::wire::{Command, Fields};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::client::{ClientSnapshot, CommandOutcome};
use crate::server::AppState;

/// Error returned by control-surface handlers.
#[derive(Debug)]
pub struct ApiError(RelayError);

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayError::Encode(_)
            | RelayError::Io { .. }
            | RelayError::WriteTimeout { .. }
            | RelayError::Closed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({ "error": self.0.to_string(), "kind": self.0.error_kind() });
        (status, Json(body)).into_response()
    }
}

/// Build the control-surface router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/clients", get(list_clients))
        .route("/api/client/{id}", get(get_client))
        .route("/api/client/{id}/results", get(client_results))
        .route("/api/command", post(send_command))
        .route(
            "/api/stream",
            post(start_stream).get(live_stream).delete(stop_stream),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "status": "healthy", "clients": state.registry.count() }))
}

async fn list_clients(State(state): State<AppState>) -> Json<Vec<ClientSnapshot>> {
    Json(state.registry.snapshot())
}

async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<ClientId>,
) -> Result<Json<ClientSnapshot>, ApiError> {
    Ok(Json(state.registry.snapshot_of(&id)?))
}

async fn client_results(
    State(state): State<AppState>,
    Path(id): Path<ClientId>,
) -> Result<Json<Vec<CommandOutcome>>, ApiError> {
    let conn = state.registry.lookup(&id)?;
    Ok(Json(conn.recent_results()))
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    client_id: ClientId,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Fields,
}

async fn send_command(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let command = Command::new(request.kind, request.payload);
    state.dispatcher.dispatch(&request.client_id, &command).await?;
    Ok(Json(json!({ "status": "success" })))
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    client_id: ClientId,
    #[serde(rename = "type", default)]
    kind: String,
}

async fn start_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .dispatcher
        .toggle_stream(&query.client_id, true, &query.kind)
        .await?;
    Ok(Json(json!({ "status": "stream_started" })))
}

async fn stop_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .dispatcher
        .toggle_stream(&query.client_id, false, &query.kind)
        .await?;
    Ok(Json(json!({ "status": "stream_stopped" })))
}

/// Live frame retrieval has no media path yet.
async fn live_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, ApiError> {
    state.registry.lookup(&query.client_id)?;
    Ok((StatusCode::NOT_IMPLEMENTED, "not implemented").into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let resp = ApiError(RelayError::NotFound(ClientId::from_raw("x"))).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn write_failures_map_to_500() {
        let id = ClientId::from_raw("x");
        for err in [
            RelayError::Closed(id.clone()),
            RelayError::WriteTimeout {
                client_id: id.clone(),
                timeout: std::time::Duration::from_secs(1),
            },
            RelayError::Io {
                client_id: id,
                message: "broken pipe".into(),
            },
        ] {
            let resp = ApiError(err).into_response();
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn command_request_payload_is_optional() {
        let req: CommandRequest =
            serde_json::from_str(r#"{"client_id":"client_1","type":"ping"}"#).unwrap();
        assert_eq!(req.client_id, ClientId::from_raw("client_1"));
        assert_eq!(req.kind, "ping");
        assert!(req.payload.is_empty());
    }
}
