use actix_cors::Cors;
use actix_web::{http::StatusCode, web, App, HttpResponse, HttpServer, ResponseError, Result as ActixResult};
use dishx_index::{SearchEngine, SearchHit};
use dishx_storage::EntityStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared handles for every worker.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EntityStore>,
    pub engine: Arc<SearchEngine>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("entity not found: {0}")]
    NotFound(String),

    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Core(#[from] dishx_core::Error),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) | ApiError::SnapshotNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(dishx_core::Error::Embedding { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    k: Option<usize>,
    #[serde(default)]
    location_aware: bool,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    widened_to: Vec<String>,
    results: Vec<SearchResult>,
}

/// A hit without the embedding vector.
#[derive(Debug, Serialize)]
struct SearchResult {
    id: String,
    name: String,
    neighborhood: Option<String>,
    address: Option<String>,
    price_range: Option<String>,
    score: f32,
}

impl From<SearchHit> for SearchResult {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.entity.id,
            name: hit.entity.name,
            neighborhood: hit.entity.neighborhood,
            address: hit.entity.address,
            price_range: hit.entity.price_range,
            score: hit.score,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    offset: Option<usize>,
    limit: Option<usize>,
}

const DEFAULT_PAGE_SIZE: usize = 100;

pub struct RestApi;

impl RestApi {
    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.route("/health", web::get().to(health))
            .route("/search", web::post().to(search))
            .route("/entities", web::get().to(list_entities))
            .route("/entities/{id}", web::get().to(get_entity))
            .route("/snapshots", web::get().to(list_snapshots))
            .route("/snapshots", web::post().to(create_snapshot))
            .route("/snapshots/{name}", web::delete().to(delete_snapshot));
    }

    pub async fn start(state: AppState, port: u16) -> std::io::Result<()> {
        info!(port, entities = state.store.len(), indexed = state.engine.index().len(), "starting HTTP server");
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .app_data(web::Data::new(state.clone()))
                .configure(RestApi::configure)
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    }
}

async fn health(state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "entities": state.store.len(),
        "indexed": state.engine.index().len(),
    })))
}

async fn search(state: web::Data<AppState>, req: web::Json<SearchRequest>) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    if req.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".into()));
    }

    let response = if req.location_aware {
        let located = state.engine.search_with_location(&req.query, req.k).await?;
        SearchResponse {
            query: located.query,
            location: located.location,
            widened_to: located.widened_to,
            results: located.hits.into_iter().map(SearchResult::from).collect(),
        }
    } else {
        let hits = state.engine.search(&req.query, req.k).await.map_err(|e| {
            warn!(error = %e, "search failed");
            e
        })?;
        SearchResponse {
            query: req.query,
            location: None,
            widened_to: Vec::new(),
            results: hits.into_iter().map(SearchResult::from).collect(),
        }
    };

    Ok(HttpResponse::Ok().json(response))
}

async fn list_entities(state: web::Data<AppState>, query: web::Query<ListQuery>) -> ActixResult<HttpResponse> {
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let entities: Vec<_> = state.store.list().into_iter().skip(offset).take(limit).collect();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "total": state.store.len(),
        "entities": entities,
    })))
}

async fn get_entity(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    match state.store.get(&id) {
        Some(entity) => Ok(HttpResponse::Ok().json(entity)),
        None => Err(ApiError::NotFound(id)),
    }
}

async fn list_snapshots(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let snapshots = state.store.list_snapshots()?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "snapshots": snapshots })))
}

async fn create_snapshot(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let snapshot = state.store.create_snapshot()?;
    info!(snapshot = %snapshot.name, entities = ?snapshot.entities, "snapshot created");
    Ok(HttpResponse::Ok().json(snapshot))
}

async fn delete_snapshot(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    if state.store.delete_snapshot(&name)? {
        Ok(HttpResponse::Ok().json(serde_json::json!({ "result": true })))
    } else {
        Err(ApiError::SnapshotNotFound(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use chrono::Utc;
    use dishx_core::{CanonicalEntity, SourceId, Vector};
    use dishx_index::{HashEmbedder, IndexSnapshot, SearchConfig, VectorIndex};

    fn state(dir: &std::path::Path) -> AppState {
        let embedder = HashEmbedder::new(64);
        let mut pizza = CanonicalEntity::new("rst_pizza", "Joe's Pizza", SourceId::Google, Utc::now());
        pizza.neighborhood = Some("Greenwich Village".into());
        pizza.embedding = Some(Vector::new(embedder.hash_text("Joe's Pizza")));
        let mut sushi = CanonicalEntity::new("rst_sushi", "Sushi Nakazawa", SourceId::Resy, Utc::now());
        sushi.neighborhood = Some("West Village".into());
        sushi.embedding = Some(Vector::new(embedder.hash_text("Sushi Nakazawa")));

        let store = Arc::new(EntityStore::open(dir).unwrap());
        store.upsert_all(vec![pizza.clone(), sushi.clone()]);

        let index = Arc::new(VectorIndex::new());
        index.swap(IndexSnapshot::build(&[pizza, sushi], 64));
        let engine = SearchEngine::new(Arc::new(embedder), index, SearchConfig::default()).unwrap();
        AppState {
            store,
            engine: Arc::new(engine),
        }
    }

    #[actix_web::test]
    async fn test_search_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(dir.path())))
                .configure(RestApi::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/search")
            .set_json(serde_json::json!({"query": "pizza", "k": 1}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["results"].as_array().unwrap().len(), 1);
        assert_eq!(body["results"][0]["id"], "rst_pizza");

        let req = test::TestRequest::post()
            .uri("/search")
            .set_json(serde_json::json!({"query": "sushi in the west village", "location_aware": true}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["query"], "sushi");
        assert_eq!(body["location"], "West Village");
        assert_eq!(body["results"][0]["id"], "rst_sushi");
        assert_eq!(body["results"][1]["id"], "rst_pizza");
        assert_eq!(body["widened_to"][0], "Greenwich Village");
    }

    #[actix_web::test]
    async fn test_entity_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(dir.path())))
                .configure(RestApi::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/entities/rst_sushi").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["name"], "Sushi Nakazawa");

        let req = test::TestRequest::get().uri("/entities/rst_missing").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/entities?limit=1").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["entities"][0]["id"], "rst_pizza");

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["indexed"], 2);
    }

    #[actix_web::test]
    async fn test_empty_query_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(dir.path())))
                .configure(RestApi::configure),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/search")
            .set_json(serde_json::json!({"query": "  "}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_snapshot_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(dir.path())))
                .configure(RestApi::configure),
        )
        .await;

        let req = test::TestRequest::post().uri("/snapshots").to_request();
        let created: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(created["entities"], 2);
        let name = created["name"].as_str().unwrap().to_string();

        let req = test::TestRequest::get().uri("/snapshots").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["snapshots"].as_array().unwrap().len(), 1);
        assert_eq!(body["snapshots"][0]["name"], name.as_str());

        let req = test::TestRequest::delete().uri(&format!("/snapshots/{name}")).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::delete().uri(&format!("/snapshots/{name}")).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
