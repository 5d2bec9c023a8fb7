//! HTTP transport.
//!
//! Exposes the relationship engine and entity services under `/v1/`, plus a
//! `/health` endpoint. Errors cross this boundary as JSON: client faults keep
//! their message, everything else is logged here and replaced with a generic
//! message so backend detail never leaks to callers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::entities::{EntityService, ENTITY_COLLECTIONS};
use crate::error::{EntigraphError, Result};
use crate::relationships::{Relationship, RelationshipEngine};
use crate::store::{JsonObject, SqliteStore};

impl IntoResponse for EntigraphError {
    fn into_response(self) -> Response {
        if !self.is_client_error() {
            log::error!("request failed: {}", self);
        }
        let (status, message) = match self {
            EntigraphError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg),
            EntigraphError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal service error. Please try again later.".to_string(),
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Deserialize)]
struct CreateRelationshipRequest {
    relationship: Option<Relationship>,
}

#[derive(Deserialize)]
struct UpdateRelationshipRequest {
    #[serde(default)]
    relationship: JsonObject,
}

#[derive(Serialize)]
struct RelationshipResponse {
    relationship: Relationship,
}

/// HTTP API server wrapper
pub struct ApiServer {
    state: AppState,
    allowed_origins: Vec<String>,
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    engine: Arc<RelationshipEngine<SqliteStore>>,
    entities: Arc<HashMap<String, EntityService<SqliteStore>>>,
}

impl AppState {
    fn entity(&self, collection: &str) -> Result<&EntityService<SqliteStore>> {
        self.entities
            .get(collection)
            .ok_or_else(|| EntigraphError::NotFound(format!("Unknown collection: {}", collection)))
    }
}

impl ApiServer {
    /// Create the API server, initializing one entity service per kind.
    pub async fn new(store: Arc<SqliteStore>, config: &Config) -> Result<Self> {
        let engine = Arc::new(RelationshipEngine::new(Arc::clone(&store)));

        let mut entities = HashMap::new();
        for collection in ENTITY_COLLECTIONS {
            let service = EntityService::new(Arc::clone(&store), collection).await?;
            entities.insert(collection.to_string(), service);
        }

        Ok(Self {
            state: AppState {
                engine,
                entities: Arc::new(entities),
            },
            allowed_origins: config.http_server.allowed_origins.clone(),
        })
    }

    /// Run the HTTP server
    pub async fn run(&self, port: u16) -> Result<()> {
        let app = self.create_router();

        let addr = format!("127.0.0.1:{}", port);
        log::info!("Starting HTTP server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            EntigraphError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind to {}: {}", addr, e),
            ))
        })?;

        axum::serve(listener, app).await.map_err(|e| {
            EntigraphError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e),
            ))
        })?;

        Ok(())
    }

    /// Create the axum router
    pub fn create_router(&self) -> Router {
        // Restrict CORS to configured origins; allow Any when none are set
        // (local dev) so preflight stays consistent with enforcement.
        let cors = if self.allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/v1/relationships", post(create_relationship))
            .route(
                "/v1/relationships/*id",
                axum::routing::patch(update_relationship).delete(delete_relationship),
            )
            .route("/v1/:collection", post(create_entity))
            .route(
                "/v1/:collection/:key",
                get(get_entity).patch(update_entity).delete(delete_entity),
            )
            .route("/health", get(handle_health))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
            .with_state(self.state.clone())
    }
}

async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn create_relationship(
    State(state): State<AppState>,
    Json(req): Json<CreateRelationshipRequest>,
) -> Result<Json<RelationshipResponse>> {
    let relationship = req.relationship.ok_or_else(|| {
        log::error!("relationship is missing from create request");
        EntigraphError::InvalidArgument("Bad parameter".to_string())
    })?;
    let relationship = state.engine.create(relationship).await?;
    Ok(Json(RelationshipResponse { relationship }))
}

async fn update_relationship(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRelationshipRequest>,
) -> Result<Json<RelationshipResponse>> {
    let relationship = state.engine.update(&id, req.relationship).await?;
    Ok(Json(RelationshipResponse { relationship }))
}

async fn delete_relationship(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.engine.delete(&id).await?;
    Ok(Json(json!({})))
}

async fn create_entity(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<JsonObject>,
) -> Result<Json<JsonObject>> {
    let doc = state.entity(&collection)?.create(body).await?;
    Ok(Json(doc.into_json()))
}

async fn get_entity(
    State(state): State<AppState>,
    Path((collection, key)): Path<(String, String)>,
) -> Result<Json<JsonObject>> {
    let doc = state.entity(&collection)?.get(&key).await?;
    Ok(Json(doc.into_json()))
}

async fn update_entity(
    State(state): State<AppState>,
    Path((collection, key)): Path<(String, String)>,
    Json(patch): Json<JsonObject>,
) -> Result<Json<JsonObject>> {
    let doc = state.entity(&collection)?.update(&key, patch).await?;
    Ok(Json(doc.into_json()))
}

async fn delete_entity(
    State(state): State<AppState>,
    Path((collection, key)): Path<(String, String)>,
) -> Result<Json<Value>> {
    state.entity(&collection)?.delete(&key).await?;
    Ok(Json(json!({})))
}
