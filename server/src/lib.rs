use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use linkidx::document::{CONTENT, TITLE, WIKI_ID};
use linkidx::{Engine, EngineConfig, EntityMatch, ExternalId, FieldValue, Spot, StoredDocument};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

fn default_field() -> String { CONTENT.to_string() }
fn default_k() -> usize { 10 }

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_field")]
    pub field: String,
    #[serde(default = "default_k")]
    pub k: usize,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: u32,
    pub wiki_id: Option<i64>,
    pub title: Option<String>,
    pub score: f32,
}

#[derive(Deserialize)]
pub struct FreqParams {
    pub q: String,
    #[serde(default = "default_field")]
    pub field: String,
}

#[derive(Deserialize)]
pub struct SimilarityParams {
    pub x: ExternalId,
    pub y: ExternalId,
    #[serde(default = "default_field")]
    pub field: String,
}

#[derive(Deserialize)]
pub struct Candidate {
    pub id: ExternalId,
    #[serde(default)]
    pub score: f64,
}

#[derive(Deserialize)]
pub struct RerankRequest {
    pub spot: Spot,
    pub context: String,
    pub candidates: Vec<Candidate>,
    #[serde(default = "default_field")]
    pub field: String,
}

#[derive(Serialize)]
pub struct RerankResponse {
    pub spot: Spot,
    pub candidates: Vec<EntityMatch>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub admin_token: Option<String>,
}

/// Engine config from an optional JSON file; `index`, when given, replaces
/// its `index_dir`.
pub fn resolve_config(config: Option<&std::path::Path>, index: Option<std::path::PathBuf>) -> Result<EngineConfig> {
    let mut resolved = match config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(index) = index {
        resolved.index_dir = index;
    }
    Ok(resolved)
}

pub fn build_app(config: EngineConfig) -> Result<Router> {
    let engine = Engine::open(config)?;
    // reranking and external-id lookups need the map; build it once if absent
    engine.ensure_id_map()?;
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app_state = AppState { engine: Arc::new(engine), admin_token };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/freq", get(freq_handler))
        .route("/doc/:wiki_id", get(doc_handler))
        .route("/similarity", get(similarity_handler))
        .route("/rerank", post(rerank_handler))
        .route("/admin/refresh", post(refresh_handler))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);
    Ok(app)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let searcher = state.engine.searcher();
    let k = params.k.clamp(1, 100);
    // hits and stored fields must come from the same snapshot
    let view = searcher.view();
    let hits = match view.parse_query(&params.q, &params.field, searcher.max_clauses()) {
        Ok(query) => view.search(&query, k),
        Err(e) => {
            tracing::warn!(error = %e, q = %params.q, "unparsable search query");
            Vec::new()
        }
    };
    let results = hits
        .into_iter()
        .map(|h| {
            let stored = view.fetch_document(h.doc);
            SearchHit {
                doc_id: h.doc,
                wiki_id: stored.and_then(|d| d.get(WIKI_ID)).and_then(FieldValue::as_int),
                title: stored.and_then(|d| d.get_text(TITLE)).map(str::to_string),
                score: h.score,
            }
        })
        .collect();
    Json(SearchResponse { query: params.q, took_s: start.elapsed().as_secs_f64(), results })
}

pub async fn freq_handler(State(state): State<AppState>, Query(params): Query<FreqParams>) -> Json<serde_json::Value> {
    let terms: Vec<&str> = params.q.split_whitespace().collect();
    let freq = state.engine.searcher().phrase_frequency(&terms, &params.field);
    Json(serde_json::json!({ "query": params.q, "field": params.field, "freq": freq }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(wiki_id): Path<ExternalId>) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    match state.engine.document(wiki_id) {
        Some(doc) => Ok(Json(stored_to_json(&doc))),
        None => Err((StatusCode::NOT_FOUND, format!("no document with wiki id {wiki_id}"))),
    }
}

pub async fn similarity_handler(State(state): State<AppState>, Query(params): Query<SimilarityParams>) -> Json<serde_json::Value> {
    let cosine = state.engine.cosine_similarity(params.x, params.y, &params.field);
    Json(serde_json::json!({ "x": params.x, "y": params.y, "field": params.field, "cosine": cosine }))
}

pub async fn rerank_handler(State(state): State<AppState>, Json(req): Json<RerankRequest>) -> Result<Json<RerankResponse>, (StatusCode, String)> {
    let reranker = state.engine.reranker().map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    let mut candidates: Vec<EntityMatch> = req
        .candidates
        .iter()
        .map(|c| EntityMatch::new(c.id, c.score, req.spot.clone()))
        .collect();
    reranker.rerank(&req.spot, &mut candidates, &req.context, &req.field);
    Ok(Json(RerankResponse { spot: req.spot, candidates }))
}

async fn refresh_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    // reopening segments and rebuilding the identifier map is blocking disk work
    let engine = Arc::clone(&state.engine);
    let refreshed = tokio::task::spawn_blocking(move || {
        let generation = engine.refresh()?;
        let map = engine.ensure_id_map()?;
        Ok::<_, linkidx::Error>((generation, map.len(), engine.searcher().num_documents()))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let (generation, entries, documents) = refreshed.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    tracing::info!(generation, entries, "refreshed index view");
    Ok(Json(serde_json::json!({ "generation": generation, "documents": documents, "id_map_entries": entries })))
}

/// Multi-valued fields become arrays.
fn stored_to_json(doc: &StoredDocument) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    for f in &doc.fields {
        let value = match &f.value {
            FieldValue::Int(v) => serde_json::Value::from(*v),
            FieldValue::Text(s) => serde_json::Value::from(s.as_str()),
        };
        match obj.get_mut(&f.name) {
            None => {
                obj.insert(f.name.clone(), value);
            }
            Some(serde_json::Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = serde_json::Value::Array(vec![first, value]);
            }
        }
    }
    serde_json::Value::Object(obj)
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
