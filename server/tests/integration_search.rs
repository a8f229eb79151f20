use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use linkidx::{Article, Engine, EngineConfig};
use serde_json::{json, Value};
use tempfile::tempdir;
use tower::ServiceExt;

fn build_tiny_index(dir: &std::path::Path) -> EngineConfig {
    let config = EngineConfig::new(dir);
    let engine = Engine::open(config.clone()).unwrap();
    let mut writer = engine.writer().unwrap();
    let articles = [
        Article { title: "The Beatles".into(), ..Article::with_content(100, "The Beatles were an English rock band formed in Liverpool.") },
        Article { title: "Beetle".into(), ..Article::with_content(200, "The beetle is an insect of the order Coleoptera.") },
        Article { title: "Rock music".into(), ..Article::with_content(300, "Rock music is a genre of popular music. A rock band plays it.") },
        Article { title: "Football".into(), ..Article::with_content(400, "Liverpool Football Club plays in the Premier League.") },
    ];
    for a in &articles {
        engine.add_article(&mut writer, a).unwrap();
    }
    writer.commit().unwrap();
    drop(writer);
    engine.close();
    config
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    let app = server::build_app(build_tiny_index(dir.path())).unwrap();

    let (status, json) = get(app, "/search?q=rock%20band&k=5").await;
    assert_eq!(status, StatusCode::OK);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    let wiki_ids: Vec<i64> = arr.iter().map(|h| h["wiki_id"].as_i64().unwrap()).collect();
    assert!(wiki_ids.contains(&100) && wiki_ids.contains(&300));
    assert!(arr[0]["score"].as_f64().unwrap() >= arr[1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn health_and_phrase_frequency() {
    let dir = tempdir().unwrap();
    let app = server::build_app(build_tiny_index(dir.path())).unwrap();

    let (status, body) = send(app.clone(), Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");

    let (status, json) = get(app.clone(), "/freq?q=rock%20band").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["freq"], 2);

    let (_, json) = get(app, "/freq?q=band%20rock").await;
    assert_eq!(json["freq"], 0);
}

#[tokio::test]
async fn documents_are_addressed_by_wiki_id() {
    let dir = tempdir().unwrap();
    let app = server::build_app(build_tiny_index(dir.path())).unwrap();

    let (status, json) = get(app.clone(), "/doc/200").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "Beetle");
    assert_eq!(json["wiki-id"], 200);

    let (status, _) = get(app, "/doc/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn similarity_between_articles() {
    let dir = tempdir().unwrap();
    let app = server::build_app(build_tiny_index(dir.path())).unwrap();

    let (status, json) = get(app.clone(), "/similarity?x=100&y=300").await;
    assert_eq!(status, StatusCode::OK);
    let c = json["cosine"].as_f64().unwrap();
    assert!(c > 0.0 && c < 1.0, "cosine was {c}");

    let (_, json) = get(app, "/similarity?x=100&y=12345").await;
    assert!(json["cosine"].is_null());
}

#[tokio::test]
async fn rerank_boosts_candidates_matching_the_context() {
    let dir = tempdir().unwrap();
    let app = server::build_app(build_tiny_index(dir.path())).unwrap();

    let payload = json!({
        "spot": { "text": "beetle", "start": 4, "end": 10 },
        "context": "an insect of the order Coleoptera",
        "candidates": [ { "id": 200, "score": 0.0 }, { "id": 100, "score": 0.0 }, { "id": 777, "score": 1.0 } ]
    });
    let req = Request::post("/rerank")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    let c = json["candidates"].as_array().unwrap();
    assert_eq!(c.len(), 3);
    assert_eq!(c[0]["id"], 200);
    assert!(c[0]["score"].as_f64().unwrap() > 0.5);
    assert!(c[0]["explanation"].is_object());
    assert_eq!(c[1]["score"].as_f64().unwrap(), 0.5);
    assert_eq!(c[2]["score"].as_f64().unwrap(), 1.0);
}

#[tokio::test]
async fn refresh_requires_the_admin_token() {
    std::env::set_var("ADMIN_TOKEN", "secret");
    let dir = tempdir().unwrap();
    let app = server::build_app(build_tiny_index(dir.path())).unwrap();

    let req = Request::post("/admin/refresh").body(Body::empty()).unwrap();
    let (status, _) = send(app.clone(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::post("/admin/refresh").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["documents"], 4);
}

#[tokio::test]
async fn refresh_picks_up_commits_from_another_process() {
    std::env::set_var("ADMIN_TOKEN", "secret");
    let dir = tempdir().unwrap();
    let config = build_tiny_index(dir.path());
    let app = server::build_app(config.clone()).unwrap();

    let (status, _) = get(app.clone(), "/doc/500").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let other = Engine::open(config).unwrap();
    let mut writer = other.writer().unwrap();
    other.add_article(&mut writer, &Article { title: "Abbey Road".into(), ..Article::with_content(500, "Abbey Road is an album.") }).unwrap();
    writer.commit().unwrap();
    drop(writer);
    other.close();

    let req = Request::post("/admin/refresh").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, body) = send(app.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["documents"], 5);
    assert_eq!(json["id_map_entries"], 5);

    let (status, json) = get(app, "/doc/500").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "Abbey Road");
}

#[test]
fn index_flag_overrides_the_config_file_only_when_given() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("engine.json");
    std::fs::write(&path, r#"{"index_dir": "/srv/entities", "max_results": 25}"#).unwrap();

    let from_file = server::resolve_config(Some(&path), None).unwrap();
    assert_eq!(from_file.index_dir, std::path::PathBuf::from("/srv/entities"));
    assert_eq!(from_file.max_results, 25);

    let overridden = server::resolve_config(Some(&path), Some("/tmp/other".into())).unwrap();
    assert_eq!(overridden.index_dir, std::path::PathBuf::from("/tmp/other"));
    assert_eq!(overridden.max_results, 25);

    let defaults = server::resolve_config(None, None).unwrap();
    assert_eq!(defaults.index_dir, std::path::PathBuf::from("./index"));
}
