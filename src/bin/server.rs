//! Closet Entity Server
//!
//! A small in-memory REST server for wardrobe items and outfits. It speaks
//! the JSON protocol the `closet` CLI syncs against and is meant for local
//! development and testing; everything is lost on restart.
//!
//! # Configuration
//!
//! Environment variables:
//! - `CLOSET_PORT`: Port to listen on (default: 8080)
//! - `CLOSET_SERVER_CONFIG`: Path to config file (default: ~/.config/closet-server/config.yaml)
//!
//! # Config File Format
//!
//! ```yaml
//! api_keys:
//!   - key: "your-secret-key-here"
//!     owner_id: "user1"
//! ```
//!
//! With no keys configured, every route is open.
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `POST /{collection}`: Create an entity, returns it with a server id
//! - `PATCH /{collection}/{id}`: Merge the given fields into an entity
//! - `DELETE /{collection}/{id}`: Delete an entity
//! - `GET /{collection}?owner_id=`: List entities, optionally by owner
//!
//! `collection` is `items` or `outfits`.

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const COLLECTIONS: [&str; 2] = ["items", "outfits"];

// ============================================================================
// Configuration
// ============================================================================

/// API key entry in config
#[derive(Debug, Clone, Deserialize)]
struct ApiKeyEntry {
    key: String,
    owner_id: String,
}

/// Config file structure
#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    api_keys: Vec<ApiKeyEntry>,
}

/// Server configuration
#[derive(Debug, Clone)]
struct Config {
    /// Port to listen on
    port: u16,
    /// Path to config file
    config_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let port = std::env::var("CLOSET_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let config_path = std::env::var("CLOSET_SERVER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("closet-server")
                    .join("config.yaml")
            });

        Self { port, config_path }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// API key store - maps key -> owner id
#[derive(Debug, Clone, Default)]
struct ApiKeyStore {
    keys: HashMap<String, String>,
}

impl ApiKeyStore {
    /// Load API keys from config file
    fn load(config_path: &PathBuf) -> Self {
        let keys = match std::fs::read_to_string(config_path) {
            Ok(contents) => match serde_yaml::from_str::<ConfigFile>(&contents) {
                Ok(config) => {
                    let map: HashMap<_, _> = config
                        .api_keys
                        .into_iter()
                        .map(|entry| (entry.key, entry.owner_id))
                        .collect();
                    tracing::info!("Loaded {} API key(s)", map.len());
                    map
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config file: {}", e);
                    HashMap::new()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file {}: {}",
                    config_path.display(),
                    e
                );
                HashMap::new()
            }
        };

        if keys.is_empty() {
            tracing::warn!("No API keys loaded - entity routes are open");
        }
        Self { keys }
    }

    fn is_open(&self) -> bool {
        self.keys.is_empty()
    }

    fn validate(&self, key: &str) -> Option<&str> {
        self.keys.get(key).map(String::as_str)
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn error_response(status: StatusCode, error: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error,
            message: message.into(),
        }),
    )
        .into_response()
}

/// Authentication middleware
async fn auth_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.api_keys.is_open() {
        return next.run(request).await;
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let api_key = match auth_header {
        Some(h) => match h.strip_prefix("Bearer ") {
            Some(key) => key,
            None => {
                return error_response(
                    StatusCode::UNAUTHORIZED,
                    "invalid_auth",
                    "Authorization header must use Bearer scheme",
                )
            }
        },
        None => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                "missing_auth",
                "Authorization header required",
            )
        }
    };

    match state.api_keys.validate(api_key) {
        Some(owner_id) => {
            tracing::debug!("Request authorized for {}", owner_id);
            next.run(request).await
        }
        None => error_response(StatusCode::UNAUTHORIZED, "invalid_key", "Invalid API key"),
    }
}

// ============================================================================
// Entity store
// ============================================================================

#[derive(Debug, PartialEq)]
enum StoreError {
    UnknownCollection(String),
    NotFound(String),
    Invalid(String),
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        match self {
            StoreError::UnknownCollection(name) => error_response(
                StatusCode::NOT_FOUND,
                "unknown_collection",
                format!("Unknown collection: {}", name),
            ),
            StoreError::NotFound(id) => error_response(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Entity not found: {}", id),
            ),
            StoreError::Invalid(message) => {
                error_response(StatusCode::UNPROCESSABLE_ENTITY, "invalid_entity", message)
            }
        }
    }
}

/// Entities are stored as raw JSON objects keyed by collection. Ids use the
/// client's tagged form, `{"persisted": "<uuid>"}`.
#[derive(Default)]
struct EntityStore {
    collections: RwLock<HashMap<&'static str, Vec<Value>>>,
}

fn collection_name(name: &str) -> Result<&'static str, StoreError> {
    COLLECTIONS
        .iter()
        .find(|c| **c == name)
        .copied()
        .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
}

fn id_of(entity: &Value) -> Option<&str> {
    entity.get("id")?.get("persisted")?.as_str()
}

fn now() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

fn require_text(fields: &Map<String, Value>, key: &str) -> Result<(), StoreError> {
    match fields.get(key).and_then(Value::as_str) {
        Some(value) if !value.trim().is_empty() => Ok(()),
        _ => Err(StoreError::Invalid(format!("{} is required", key))),
    }
}

impl EntityStore {
    async fn create(&self, collection: &str, input: Value) -> Result<Value, StoreError> {
        let collection = collection_name(collection)?;
        let Value::Object(mut fields) = input else {
            return Err(StoreError::Invalid("expected a JSON object".into()));
        };
        require_text(&fields, "name")?;
        require_text(&fields, "owner_id")?;

        let id = uuid::Uuid::new_v4().to_string();
        fields.insert("id".into(), serde_json::json!({ "persisted": id }));
        let at = now();
        fields.insert("created_at".into(), at.clone());
        fields.insert("updated_at".into(), at);

        let entity = Value::Object(fields);
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .push(entity.clone());
        tracing::info!("Created {} {}", collection, id);
        Ok(entity)
    }

    async fn update(&self, collection: &str, id: &str, changes: Value) -> Result<Value, StoreError> {
        let collection = collection_name(collection)?;
        let Value::Object(changes) = changes else {
            return Err(StoreError::Invalid("expected a JSON object".into()));
        };
        if changes.get("name").is_some_and(|name| !name.is_null()) {
            require_text(&changes, "name")?;
        }

        let mut collections = self.collections.write().await;
        let entity = collections
            .get_mut(collection)
            .and_then(|entities| entities.iter_mut().find(|e| id_of(e) == Some(id)))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Value::Object(fields) = entity {
            for (key, value) in changes {
                if value.is_null() || matches!(key.as_str(), "id" | "owner_id" | "created_at") {
                    continue;
                }
                fields.insert(key, value);
            }
            fields.insert("updated_at".into(), now());
        }
        tracing::info!("Updated {} {}", collection, id);
        Ok(entity.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let collection = collection_name(collection)?;
        let mut collections = self.collections.write().await;
        let entities = collections.entry(collection).or_default();
        let before = entities.len();
        entities.retain(|e| id_of(e) != Some(id));
        if entities.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        tracing::info!("Deleted {} {}", collection, id);
        Ok(())
    }

    async fn list(&self, collection: &str, owner_id: Option<&str>) -> Result<Vec<Value>, StoreError> {
        let collection = collection_name(collection)?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|entities| {
                entities
                    .iter()
                    .filter(|e| match owner_id {
                        Some(owner) => e.get("owner_id").and_then(Value::as_str) == Some(owner),
                        None => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    api_keys: Arc<ApiKeyStore>,
    store: Arc<EntityStore>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint (no auth required)
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
struct ListParams {
    owner_id: Option<String>,
}

async fn list_entities(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Value>>, StoreError> {
    state
        .store
        .list(&collection, params.owner_id.as_deref())
        .await
        .map(Json)
}

async fn create_entity(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(input): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StoreError> {
    let entity = state.store.create(&collection, input).await?;
    Ok((StatusCode::CREATED, Json(entity)))
}

async fn update_entity(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(changes): Json<Value>,
) -> Result<Json<Value>, StoreError> {
    state.store.update(&collection, &id, changes).await.map(Json)
}

async fn delete_entity(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<StatusCode, StoreError> {
    state.store.delete(&collection, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn app(state: AppState) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new().route("/health", get(health));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/{collection}", get(list_entities).post(create_entity))
        .route("/{collection}/{id}", patch(update_entity).delete(delete_entity))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "closet_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!("Config file: {}", config.config_path.display());

    let state = AppState {
        api_keys: Arc::new(ApiKeyStore::load(&config.config_path)),
        store: Arc::new(EntityStore::default()),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app(state)).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use closet_core::{Item, ItemChanges, ItemInput};
    use serde_json::json;
    use tower::ServiceExt;

    fn state(keys: &[(&str, &str)]) -> AppState {
        AppState {
            api_keys: Arc::new(ApiKeyStore {
                keys: keys
                    .iter()
                    .map(|(k, o)| (k.to_string(), o.to_string()))
                    .collect(),
            }),
            store: Arc::new(EntityStore::default()),
        }
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_server_id_and_timestamps() {
        let store = EntityStore::default();
        let created = store
            .create("items", json!({ "owner_id": "me", "name": "Scarf" }))
            .await
            .unwrap();

        assert!(id_of(&created).is_some());
        assert!(created.get("created_at").is_some());
        assert_eq!(store.list("items", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_requires_name_and_owner() {
        let store = EntityStore::default();
        let err = store
            .create("items", json!({ "owner_id": "me", "name": "  " }))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Invalid("name is required".into()));

        let err = store
            .create("outfits", json!({ "name": "Friday" }))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Invalid("owner_id is required".into()));
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let store = EntityStore::default();
        let err = store.list("shoes", None).await.unwrap_err();
        assert_eq!(err, StoreError::UnknownCollection("shoes".into()));
    }

    #[tokio::test]
    async fn test_update_merges_fields_and_protects_identity() {
        let store = EntityStore::default();
        let created = store
            .create("items", json!({ "owner_id": "me", "name": "Shirt", "color": "white" }))
            .await
            .unwrap();
        let id = id_of(&created).unwrap().to_string();

        let updated = store
            .update(
                "items",
                &id,
                json!({ "name": "Oxford shirt", "owner_id": "someone-else", "color": null }),
            )
            .await
            .unwrap();

        assert_eq!(updated["name"], "Oxford shirt");
        assert_eq!(updated["owner_id"], "me");
        assert_eq!(updated["color"], "white");
        assert_eq!(id_of(&updated), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_entity_untouched() {
        let store = EntityStore::default();
        let created = store
            .create("items", json!({ "owner_id": "me", "name": "Shirt" }))
            .await
            .unwrap();
        let id = id_of(&created).unwrap().to_string();

        let err = store
            .update("items", &id, json!({ "name": "", "color": "red" }))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Invalid("name is required".into()));
        assert_eq!(store.list("items", None).await.unwrap(), vec![created]);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_entity() {
        let store = EntityStore::default();
        assert_eq!(
            store.update("items", "nope", json!({ "name": "x" })).await.unwrap_err(),
            StoreError::NotFound("nope".into())
        );
        assert_eq!(
            store.delete("items", "nope").await.unwrap_err(),
            StoreError::NotFound("nope".into())
        );
    }

    #[tokio::test]
    async fn test_list_filters_by_owner() {
        let store = EntityStore::default();
        store
            .create("outfits", json!({ "owner_id": "a", "name": "One" }))
            .await
            .unwrap();
        store
            .create("outfits", json!({ "owner_id": "b", "name": "Two" }))
            .await
            .unwrap();

        let listed = store.list("outfits", Some("b")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["name"], "Two");
        assert_eq!(store.list("outfits", None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = app(state(&[("secret", "me")]));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_entity_routes_require_bearer_key() {
        let app = app(state(&[("secret", "me")]));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/items").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "missing_auth");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/items")
                    .header(header::AUTHORIZATION, "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/items")
                    .header(header::AUTHORIZATION, "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_item_lifecycle_speaks_client_format() {
        let app = app(state(&[]));

        let input = serde_json::to_value(ItemInput::new("me", "Rain jacket")).unwrap();
        let response = app
            .clone()
            .oneshot(json_request("POST", "/items", input))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: Item = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(created.name, "Rain jacket");
        let id = created.id.remote().unwrap().to_string();

        let changes = serde_json::to_value(ItemChanges::name("Shell jacket")).unwrap();
        let response = app
            .clone()
            .oneshot(json_request("PATCH", &format!("/items/{}", id), changes))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated: Item = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(updated.name, "Shell jacket");
        assert_eq!(updated.id, created.id);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/items?owner_id=me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let listed: Vec<Item> = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(listed, vec![updated]);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/items/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/items/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_entity_is_unprocessable() {
        let app = app(state(&[]));
        let response = app
            .oneshot(json_request("POST", "/outfits", json!({ "owner_id": "me" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"], "invalid_entity");
    }
}
