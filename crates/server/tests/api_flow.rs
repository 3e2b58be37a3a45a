use axum::body::{to_bytes, Body};
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tacmap_engine::Engine;
use tacmap_server::map::MapConfig;
use tacmap_server::{build_router, AppState};
use tower::ServiceExt;

static DB_COUNTER: AtomicU64 = AtomicU64::new(1);

fn temp_engine() -> Engine {
    let p = std::env::temp_dir().join(format!(
        "tacmap-api-test-{}-{}.db",
        time::OffsetDateTime::now_utc().unix_timestamp_nanos(),
        DB_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    Engine::new(p)
}

fn app_for(peer: &str) -> Router {
    let peer: SocketAddr = peer.parse().expect("peer addr");
    build_router(AppState::new(temp_engine(), MapConfig::default())).layer(MockConnectInfo(peer))
}

fn local_app() -> Router {
    app_for("127.0.0.1:50000")
}

fn json_request(method: Method, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

fn patch_html<'a>(update: &'a Value, target: &str) -> &'a str {
    update["patches"]
        .as_array()
        .expect("patches")
        .iter()
        .find(|p| p["target"] == target)
        .and_then(|p| p["html"].as_str())
        .unwrap_or_default()
}

#[tokio::test]
async fn place_soldier_through_the_dashboard_api() {
    let app = local_app();

    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/placement/toggle", "{}"))
        .await
        .expect("toggle response");
    assert_eq!(response.status(), StatusCode::OK);
    let update = response_json(response).await;
    assert!(patch_html(&update, "panel.add").contains("data-type=\"soldier\""));

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/placement/select",
            r#"{"objectType":"soldier"}"#,
        ))
        .await
        .expect("select response");
    let update = response_json(response).await;
    assert_eq!(update["payload"]["placement"]["pending"], "soldier");

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/map/click",
            r#"{"latitude":52.2297,"longitude":21.0122}"#,
        ))
        .await
        .expect("click response");
    let update = response_json(response).await;
    assert_eq!(update["payload"]["menu"]["objectType"], "soldier");
    assert_eq!(
        update["payload"]["menu"]["coordinateLabel"],
        "52.2297°, 21.0122°"
    );

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/menu/submit",
            r#"{"values":{"firstName":"John","lastName":"Doe","rank":"Sergeant"}}"#,
        ))
        .await
        .expect("submit response");
    assert_eq!(response.status(), StatusCode::OK);
    let update = response_json(response).await;
    assert_eq!(
        update["payload"]["menu"]["status"]["message"],
        "Soldier created successfully."
    );
    assert_eq!(update["payload"]["menu"]["mode"], "empty");

    let response = app
        .clone()
        .oneshot(get("/api/objects"))
        .await
        .expect("objects response");
    let objects = response_json(response).await;
    assert_eq!(objects[0]["objectType"], "soldier");
    assert_eq!(objects[0]["object"]["firstName"], "John");
    assert_eq!(objects[0]["object"]["latitude"], 52.2297);

    let response = app
        .clone()
        .oneshot(get("/api/map"))
        .await
        .expect("map response");
    let map = response_json(response).await;
    assert_eq!(map["markers"][0]["title"], "John Doe — Sergeant");
    assert_eq!(map["status"]["state"], "ready");

    let response = app
        .clone()
        .oneshot(get("/api/store/soldiers"))
        .await
        .expect("list response");
    let soldiers = response_json(response).await;
    assert_eq!(soldiers.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn submit_with_missing_commander_reports_in_status() {
    let app = local_app();
    for (uri, body) in [
        ("/api/placement/select", r#"{"objectType":"unit"}"#),
        ("/api/map/click", r#"{"latitude":50.0,"longitude":20.0}"#),
    ] {
        let response = app
            .clone()
            .oneshot(json_request(Method::POST, uri, body))
            .await
            .expect("setup response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/menu/submit",
            r#"{"values":{"name":"Alpha","status":"active","commanderId":"sol-missing"}}"#,
        ))
        .await
        .expect("submit response");
    assert_eq!(response.status(), StatusCode::OK);
    let update = response_json(response).await;
    assert_eq!(update["payload"]["menu"]["status"]["kind"], "error");
    assert_eq!(
        update["payload"]["menu"]["status"]["message"],
        "Commander not found"
    );

    let response = app
        .clone()
        .oneshot(get("/api/store/units"))
        .await
        .expect("list response");
    assert_eq!(response_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn store_rest_round_trip_and_errors() {
    let app = local_app();

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/store/missions",
            r#"{"name":"Night Watch","status":"planned","start":"2024-05-01"}"#,
        ))
        .await
        .expect("create response");
    assert_eq!(response.status(), StatusCode::OK);
    let created = response_json(response).await;
    let id = created["id"].as_str().expect("id").to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/api/store/missions/{id}"),
            r#"{"status":"active"}"#,
        ))
        .await
        .expect("update response");
    assert_eq!(response.status(), StatusCode::OK);
    let updated = response_json(response).await;
    assert_eq!(updated["status"], "active");
    assert_eq!(updated["name"], "Night Watch");

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/store/missions",
            r#"{"name":"Bad","status":"planned","start":"yesterday"}"#,
        ))
        .await
        .expect("invalid response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response_json(response).await["error"]
        .as_str()
        .expect("error")
        .contains("ISO 8601"));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/api/store/missions/{id}"))
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("delete response");
    assert_eq!(response.status(), StatusCode::OK);
    let removed = response_json(response).await;
    assert_eq!(removed["success"], true);
    assert_eq!(removed["id"], id.as_str());

    let response = app
        .clone()
        .oneshot(get(&format!("/api/store/missions/{id}")))
        .await
        .expect("get response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response_json(response).await["error"].is_string());

    let response = app
        .clone()
        .oneshot(get("/api/store/dragons"))
        .await
        .expect("unknown collection response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn revision_advances_on_writes() {
    let app = local_app();
    let rev = |v: Value| v["rev"].as_i64().expect("rev");

    let before = rev(response_json(app.clone().oneshot(get("/api/rev")).await.expect("rev")).await);
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/store/armaments",
            r#"{"type":"Rifle","quantity":20,"status":"issued"}"#,
        ))
        .await
        .expect("create response");
    assert_eq!(response.status(), StatusCode::OK);
    let after = rev(response_json(app.clone().oneshot(get("/api/rev")).await.expect("rev")).await);
    assert!(after > before);
}

#[tokio::test]
async fn non_local_peer_is_forbidden() {
    let app = app_for("203.0.113.7:40000");
    let response = app.oneshot(get("/health")).await.expect("health response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let app = app_for("100.101.102.103:40000");
    let response = app.oneshot(get("/health")).await.expect("health response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn cors_only_echoes_local_origins() {
    let app = local_app();
    let preflight = |origin: &'static str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/store/soldiers")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
            .body(Body::empty())
            .expect("request should build")
    };

    let response = app
        .clone()
        .oneshot(preflight("http://localhost:5173"))
        .await
        .expect("preflight response");
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:5173")
    );

    let response = app
        .clone()
        .oneshot(preflight("https://evil.example"))
        .await
        .expect("preflight response");
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
