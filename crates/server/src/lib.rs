use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::sync::Arc;
use tacmap_engine::{Engine, StoreError};
use tacmap_protocol::{
    targets, Collection, Coordinate, MapObject, MapObjectType, Patch, Removed, UiUpdate,
};
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub mod config;
mod dashboard;
pub mod forms;
pub mod map;
pub mod menu;
pub mod placement;
pub mod render;
pub mod session;

use config::ServerConfig;
use forms::FormValues;
use map::{MapConfig, MapStatus, MapView};
use menu::{LiveFetch, LiveList, MenuView, PendingWrite};
use render::{render_add_control, render_banner, render_entries, render_hint, render_menu};
use session::{ObjectList, Session};

pub struct AppState {
    pub engine: Engine,
    pub map: MapConfig,
    pub session: Mutex<Session>,
}

impl AppState {
    /// Loads the map objects once; a failed load leaves an empty map with a
    /// banner instead of refusing to start.
    pub fn new(engine: Engine, map: MapConfig) -> Self {
        let session = Session::load(&engine);
        Self {
            engine,
            map,
            session: Mutex::new(session),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/health", get(health))
        .route("/api/rev", get(api_rev))
        .route("/api/map", get(api_map))
        .route("/api/objects", get(api_objects))
        .route("/api/session", get(api_session))
        .route("/api/placement/toggle", post(placement_toggle))
        .route("/api/placement/select", post(placement_select))
        .route("/api/placement/cancel", post(placement_cancel))
        .route("/api/map/click", post(map_click))
        .route("/api/menu", get(menu_refresh))
        .route("/api/menu/submit", post(menu_submit))
        .route("/api/menu/edit", post(menu_edit))
        .route("/api/menu/delete", post(menu_delete))
        .route("/api/menu/cancel", post(menu_cancel))
        .route("/api/store/{collection}", get(store_list).post(store_create))
        .route(
            "/api/store/{collection}/{id}",
            get(store_get).patch(store_update).delete(store_remove),
        )
        .with_state(Arc::new(state))
        // Local security: allow only loopback + Tailscale by default.
        .layer(middleware::from_fn(ip_allowlist))
        // Never use `Access-Control-Allow-Origin: *` here; the store is writable.
        .layer(local_only_cors())
}

async fn health() -> &'static str {
    "ok"
}

async fn dashboard() -> Html<&'static str> {
    Html(dashboard::DASHBOARD_HTML)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(message) => Self::new(StatusCode::BAD_REQUEST, message),
            StoreError::NotFound(message) => Self::new(StatusCode::NOT_FOUND, message),
            err @ StoreError::Unavailable(_) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Runs a store call on the blocking pool.
async fn blocking<T, F>(engine: &Engine, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&Engine) -> Result<T, StoreError> + Send + 'static,
{
    let engine = engine.clone();
    tokio::task::spawn_blocking(move || f(&engine))
        .await
        .unwrap_or_else(|e| Err(StoreError::Unavailable(format!("store task failed: {e}"))))
}

async fn api_rev(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let rev = blocking(&state.engine, |e| e.get_rev()).await?;
    Ok(Json(serde_json::json!({ "rev": rev })))
}

async fn api_map(State(state): State<Arc<AppState>>) -> Json<MapView> {
    let session = state.session.lock().await;
    Json(MapView::build(&state.map, session.objects.as_slice()))
}

async fn api_objects(State(state): State<Arc<AppState>>) -> Json<Vec<MapObject>> {
    let session = state.session.lock().await;
    Json(session.objects.as_slice().to_vec())
}

fn banner_text(session: &Session, map: &MapConfig) -> Option<String> {
    if let Some(banner) = &session.banner {
        return Some(banner.clone());
    }
    match map.status() {
        MapStatus::Ready => None,
        MapStatus::Degraded { reason } => Some(reason),
    }
}

fn payload(session: &Session, view: &MenuView) -> Value {
    serde_json::json!({
        "placement": session.placement,
        "menu": view,
        "objectCount": session.objects.len(),
    })
}

/// Re-renders every panel from the session. `markers_changed` asks the
/// dashboard to refetch the map markers.
fn session_update(
    event: &str,
    session: &Session,
    state: &AppState,
    markers_changed: bool,
) -> UiUpdate {
    let view = session.menu.view();
    let banner = banner_text(session, &state.map);

    let mut menu = Patch::replace(targets::PANEL_MENU, render_menu(&view));
    if markers_changed {
        menu = menu.with_trigger(targets::TRIGGER_MARKERS);
    }
    let patches = vec![
        Patch::replace(targets::PANEL_ADD, render_add_control(&session.placement)),
        Patch::replace(targets::MAP_HINT, render_hint(&session.placement)),
        Patch::replace(targets::MAP_BANNER, render_banner(banner.as_deref())),
        menu,
        Patch::replace(targets::PANEL_LIST, render_entries(&view)),
    ];
    UiUpdate::new(event, patches).with_payload(payload(session, &view))
}

/// Brings the live list up to date. The store is read without holding the
/// session.
async fn refresh_live(state: &AppState) -> bool {
    let (object_type, seen) = {
        let session = state.session.lock().await;
        (session.menu.object_type(), session.menu.live().seen())
    };
    let fetched = match object_type {
        None => LiveFetch::Cleared,
        Some(object_type) => blocking(&state.engine, move |e| {
            Ok(LiveList::fetch(e, Some(object_type), seen))
        })
        .await
        .unwrap_or_else(|err| LiveFetch::Failed {
            object_type,
            error: err.to_string(),
        }),
    };
    state.session.lock().await.menu.apply_live(fetched)
}

async fn render_session(state: &AppState, event: &str, markers_changed: bool) -> Json<UiUpdate> {
    refresh_live(state).await;
    let session = state.session.lock().await;
    Json(session_update(event, &session, state, markers_changed))
}

async fn api_session(State(state): State<Arc<AppState>>) -> Json<UiUpdate> {
    render_session(&state, "session", false).await
}

async fn placement_toggle(State(state): State<Arc<AppState>>) -> Json<UiUpdate> {
    state.session.lock().await.placement.toggle_selector();
    render_session(&state, "placement.toggle", false).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectInput {
    object_type: MapObjectType,
}

async fn placement_select(
    State(state): State<Arc<AppState>>,
    Json(input): Json<SelectInput>,
) -> Json<UiUpdate> {
    state.session.lock().await.select_type(input.object_type);
    render_session(&state, "placement.select", false).await
}

async fn placement_cancel(State(state): State<Arc<AppState>>) -> Json<UiUpdate> {
    state.session.lock().await.placement.cancel();
    render_session(&state, "placement.cancel", false).await
}

#[derive(Debug, Default, Deserialize)]
struct ClickInput {
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

async fn map_click(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ClickInput>,
) -> Json<UiUpdate> {
    let at = match (input.latitude, input.longitude) {
        (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)),
        _ => None,
    };
    if state.session.lock().await.map_click(at) {
        tracing::debug!(?at, "map click opened form");
    }
    render_session(&state, "map.click", false).await
}

/// Live list refresh; leaves the form untouched so typed values survive.
async fn menu_refresh(State(state): State<Arc<AppState>>) -> Json<UiUpdate> {
    refresh_live(&state).await;
    let session = state.session.lock().await;
    let view = session.menu.view();
    let patches = vec![Patch::replace(targets::PANEL_LIST, render_entries(&view))];
    Json(UiUpdate::new("menu.refresh", patches).with_payload(payload(&session, &view)))
}

#[derive(Debug, Deserialize)]
struct SubmitInput {
    #[serde(default)]
    values: FormValues,
}

async fn menu_submit(
    State(state): State<Arc<AppState>>,
    Json(input): Json<SubmitInput>,
) -> Json<UiUpdate> {
    let prepared = state.session.lock().await.menu.prepare_submit(input.values);
    match prepared {
        Ok(pending) => run_write(state, "menu.submit", pending).await,
        Err(err) => {
            tracing::debug!(%err, "submit refused");
            render_session(&state, "menu.submit", false).await
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdInput {
    id: String,
}

async fn menu_edit(
    State(state): State<Arc<AppState>>,
    Json(input): Json<IdInput>,
) -> Json<UiUpdate> {
    let object_type = state.session.lock().await.menu.object_type();
    let result = match object_type {
        Some(object_type) => {
            let id = input.id.clone();
            let loaded = blocking(&state.engine, move |e| {
                forms::handler_for(object_type).load(e, &id)
            })
            .await;
            state
                .session
                .lock()
                .await
                .menu
                .apply_edit(object_type, &input.id, loaded)
        }
        // No form open: refused without touching the store.
        None => state.session.lock().await.menu.edit(&state.engine, &input.id),
    };
    if let Err(err) = result {
        tracing::debug!(%err, id = %input.id, "edit refused");
    }
    render_session(&state, "menu.edit", false).await
}

async fn menu_delete(
    State(state): State<Arc<AppState>>,
    Json(input): Json<IdInput>,
) -> Json<UiUpdate> {
    let prepared = state.session.lock().await.menu.prepare_delete(&input.id);
    match prepared {
        Ok(pending) => run_write(state, "menu.delete", pending).await,
        Err(err) => {
            tracing::debug!(%err, "delete refused");
            render_session(&state, "menu.delete", false).await
        }
    }
}

async fn menu_cancel(State(state): State<Arc<AppState>>) -> Json<UiUpdate> {
    state.session.lock().await.menu.cancel();
    render_session(&state, "menu.cancel", false).await
}

/// Executes a prepared write on its own task so the outcome is applied even
/// if this request is dropped. The menu stays busy until then.
async fn run_write(state: Arc<AppState>, event: &str, pending: PendingWrite) -> Json<UiUpdate> {
    let task = tokio::spawn(complete_write(state.clone(), pending));
    let saved = match task.await {
        Ok(saved) => saved,
        Err(err) => {
            tracing::error!(%err, "menu write task failed");
            state
                .session
                .lock()
                .await
                .menu
                .abandon(StoreError::Unavailable(format!("write task failed: {err}")));
            false
        }
    };
    render_session(&state, event, saved).await
}

/// Returns whether the write succeeded.
async fn complete_write(state: Arc<AppState>, pending: PendingWrite) -> bool {
    let job = pending.clone();
    let outcome = blocking(&state.engine, move |engine| job.execute(engine)).await;
    let saved = outcome.is_ok();
    state.session.lock().await.finish(pending, outcome);
    saved
}

fn parse_collection(raw: &str) -> Result<Collection, ApiError> {
    raw.parse::<Collection>()
        .map_err(|e| ApiError::new(StatusCode::NOT_FOUND, e.to_string()))
}

/// Store writes that bypass the menu still have to show up on the map.
async fn resync_objects(state: &AppState, collection: Collection) {
    if collection.object_type().is_none() {
        return;
    }
    match blocking(&state.engine, |e| e.map_objects()).await {
        Ok(objects) => {
            let mut session = state.session.lock().await;
            session.objects = ObjectList::new(objects);
        }
        Err(err) => tracing::warn!(%err, "map object resync failed"),
    }
}

async fn store_list(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let collection = parse_collection(&collection)?;
    let items = blocking(&state.engine, move |e| e.collection(collection).list()).await?;
    Ok(Json(items))
}

async fn store_create(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let collection = parse_collection(&collection)?;
    let created = blocking(&state.engine, move |e| e.collection(collection).create(body)).await?;
    resync_objects(&state, collection).await;
    Ok(Json(created))
}

async fn store_get(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let collection = parse_collection(&collection)?;
    let item = blocking(&state.engine, move |e| e.collection(collection).get(&id)).await?;
    Ok(Json(item))
}

async fn store_update(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let collection = parse_collection(&collection)?;
    let updated =
        blocking(&state.engine, move |e| e.collection(collection).update(&id, body)).await?;
    resync_objects(&state, collection).await;
    Ok(Json(updated))
}

async fn store_remove(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Removed>, ApiError> {
    let collection = parse_collection(&collection)?;
    let removed = blocking(&state.engine, move |e| e.collection(collection).remove(&id)).await?;
    resync_objects(&state, collection).await;
    Ok(Json(removed))
}

pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("bind {}", config.addr))?;
    serve_listener(listener, config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;
    Ok(())
}

pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    config: ServerConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<SocketAddr> {
    let engine = Engine::new(config.db_path);
    engine
        .open()
        .with_context(|| format!("open store at {}", engine.db_path().display()))?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, db = %engine.db_path().display(), "tacmap server listening");
    let app = build_router(AppState::new(engine, config.map));
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(addr)
}

async fn ip_allowlist(
    axum::extract::ConnectInfo(peer): axum::extract::ConnectInfo<SocketAddr>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let ip = peer.ip();
    if is_allowed_peer_ip(ip) {
        return next.run(req).await;
    }
    tracing::warn!(%ip, "rejected non-local peer");
    (StatusCode::FORBIDDEN, "forbidden").into_response()
}

fn is_allowed_peer_ip(ip: IpAddr) -> bool {
    if ip.is_loopback() {
        return true;
    }

    // Tailscale CGNAT range (100.64.0.0/10).
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            o[0] == 100 && (64..=127).contains(&o[1])
        }
        IpAddr::V6(_v6) => false,
    }
}

fn local_only_cors() -> CorsLayer {
    use axum::http::header;
    use axum::http::HeaderValue;
    use axum::http::Method;

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _req| {
            is_allowed_local_origin(origin)
        }))
}

fn is_allowed_local_origin(origin: &axum::http::HeaderValue) -> bool {
    let Ok(s) = origin.to_str() else {
        return false;
    };
    is_http_origin_for_host(s, "localhost") || is_http_origin_for_host(s, "127.0.0.1")
}

fn is_http_origin_for_host(origin: &str, host: &str) -> bool {
    for scheme in ["http://", "https://"] {
        if let Some(rest) = origin.strip_prefix(scheme) {
            if let Some(after) = rest.strip_prefix(host) {
                // Origin is just scheme://host[:port]
                return after.is_empty() || after.starts_with(':');
            }
        }
    }
    false
}
