use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use reqwest::redirect::Policy;
use serde::Serialize;
use std::{
    cmp::Ordering,
    path::PathBuf,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering as AtomicOrdering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::time::Instant;
use tower_http::services::{ServeDir, ServeFile};
use url::Url;

use crate::api::{ADD_TO_CART_PATH, CHAT_PATH, GAMES_PATH};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_PROXY_TIMEOUT_MS: u64 = 6_000;
const DEFAULT_PROXY_CONNECT_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_PROXY_RESPONSE_MAX_BYTES: usize = 2 * 1024 * 1024;
const DEFAULT_STATIC_DIR: &str = "dist";
const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Info;

const PROXY_TIMEOUT_MS_BOUNDS: (u64, u64) = (100, 120_000);
const PROXY_CONNECT_TIMEOUT_MS_BOUNDS: (u64, u64) = (100, 30_000);
const PROXY_RESPONSE_MAX_BYTES_BOUNDS: (usize, usize) = (1_024, 16 * 1024 * 1024);
const USER_AGENT: &str = "storefront-preview-host/1.0";
const REQUEST_ID_HEADER: &str = "x-request-id";

const FORWARDED_REQUEST_HEADERS: [HeaderName; 3] = [header::ACCEPT, header::CONTENT_TYPE, header::COOKIE];
const FORWARDED_RESPONSE_HEADERS: [HeaderName; 4] = [
    header::CACHE_CONTROL,
    header::CONTENT_TYPE,
    header::LOCATION,
    header::SET_COOKIE,
];

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum LogLevel {
    Debug,
    Info,
}

impl PartialOrd for LogLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LogLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        fn rank(level: LogLevel) -> u8 {
            match level {
                LogLevel::Debug => 0,
                LogLevel::Info => 1,
            }
        }

        rank(*self).cmp(&rank(*other))
    }
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
        }
    }
}

/// Runtime settings for the development host, read from the environment.
#[derive(Clone)]
struct HostConfig {
    port: u16,
    backend_url: Url,
    proxy_timeout: Duration,
    connect_timeout: Duration,
    response_max_bytes: usize,
    static_dir: PathBuf,
    log_level: LogLevel,
}

impl HostConfig {
    fn from_env() -> Self {
        let port = parse_bounded(env_value("PORT"), DEFAULT_PORT, (1, u16::MAX));
        let backend_url = parse_http_url(env_value("BACKEND_URL")).unwrap_or_else(|| {
            Url::parse(DEFAULT_BACKEND_URL).unwrap_or_else(|_| unreachable!("default backend URL is valid"))
        });
        let proxy_timeout_ms = parse_bounded(
            env_value("PROXY_TIMEOUT_MS"),
            DEFAULT_PROXY_TIMEOUT_MS,
            PROXY_TIMEOUT_MS_BOUNDS,
        );
        let connect_timeout_ms = parse_bounded(
            env_value("PROXY_CONNECT_TIMEOUT_MS"),
            DEFAULT_PROXY_CONNECT_TIMEOUT_MS,
            PROXY_CONNECT_TIMEOUT_MS_BOUNDS,
        );
        let response_max_bytes = parse_bounded(
            env_value("PROXY_RESPONSE_MAX_BYTES"),
            DEFAULT_PROXY_RESPONSE_MAX_BYTES,
            PROXY_RESPONSE_MAX_BYTES_BOUNDS,
        );
        let static_dir = env_value("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR));
        let log_level = parse_log_level(env_value("LOG_LEVEL"), DEFAULT_LOG_LEVEL);

        Self {
            port,
            backend_url,
            proxy_timeout: Duration::from_millis(proxy_timeout_ms),
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            response_max_bytes,
            static_dir,
            log_level,
        }
    }
}

#[derive(Clone)]
struct AppState {
    client: reqwest::Client,
    config: HostConfig,
}

#[derive(Serialize)]
struct ProxyFailure {
    ok: bool,
    error: &'static str,
}

/// Serves the built frontend from `STATIC_DIR` and forwards the storefront
/// endpoints to `BACKEND_URL`.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = HostConfig::from_env();
    let client = build_backend_client(&config)?;
    let bind_address = format!("0.0.0.0:{}", config.port);

    log_event(
        &config,
        LogLevel::Info,
        "host_config",
        serde_json::json!({
            "backend": config.backend_url.as_str(),
            "static_dir": config.static_dir.display().to_string(),
            "response_max_bytes": config.response_max_bytes,
        }),
    );

    let app = router(AppState {
        client,
        config: config.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    println!("storefront host listening on http://127.0.0.1:{}", config.port);
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    let static_service = ServeDir::new(&state.config.static_dir)
        .not_found_service(ServeFile::new(state.config.static_dir.join("index.html")));

    Router::new()
        .route(GAMES_PATH, get(forward_to_backend))
        .route("/api/game/{id}/screenshots", get(forward_to_backend))
        .route(ADD_TO_CART_PATH, post(forward_to_backend))
        .route(CHAT_PATH, post(forward_to_backend))
        .route("/remove_from_cart/{id}", get(forward_to_backend))
        .fallback_service(static_service)
        .with_state(state)
}

async fn forward_to_backend(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let request_started_at = Instant::now();
    let request_id = resolve_request_id(&headers);
    let path_and_query = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");

    log_event(
        &state.config,
        LogLevel::Info,
        "proxy_request_start",
        serde_json::json!({
            "request_id": request_id.as_str(),
            "method": method.as_str(),
            "path": uri.path(),
        }),
    );

    let target = match upstream_url(&state.config.backend_url, path_and_query) {
        Ok(target) => target,
        Err(message) => {
            return proxy_failure(
                &state.config,
                &request_id,
                StatusCode::BAD_REQUEST,
                "invalid_path",
                message,
                request_started_at,
            )
        }
    };

    let mut request = state
        .client
        .request(method.clone(), target)
        .header(REQUEST_ID_HEADER, request_id.as_str());

    for name in &FORWARDED_REQUEST_HEADERS {
        for value in headers.get_all(name) {
            request = request.header(name.clone(), value.clone());
        }
    }

    if !body.is_empty() {
        request = request.body(body);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(error) => {
            let message = if error.is_timeout() {
                "backend timed out"
            } else {
                "backend request failed"
            };
            return proxy_failure(
                &state.config,
                &request_id,
                StatusCode::BAD_GATEWAY,
                "backend_unreachable",
                message,
                request_started_at,
            );
        }
    };

    let status = response.status();
    let mut response_headers = HeaderMap::new();
    for name in &FORWARDED_RESPONSE_HEADERS {
        for value in response.headers().get_all(name) {
            response_headers.append(name.clone(), value.clone());
        }
    }

    let payload = match read_limited_body(response, state.config.response_max_bytes).await {
        Ok(payload) => payload,
        Err(message) => {
            return proxy_failure(
                &state.config,
                &request_id,
                StatusCode::BAD_GATEWAY,
                "backend_body",
                message,
                request_started_at,
            )
        }
    };

    log_event(
        &state.config,
        LogLevel::Info,
        "proxy_request_complete",
        serde_json::json!({
            "request_id": request_id.as_str(),
            "status": status.as_u16(),
            "status_class": http_status_class(status),
            "bytes": payload.len(),
            "duration_ms": request_started_at.elapsed().as_millis(),
        }),
    );

    response_with_request_id(status, response_headers, payload, &request_id)
}

fn proxy_failure(
    config: &HostConfig,
    request_id: &str,
    status: StatusCode,
    error_class: &'static str,
    message: &'static str,
    request_started_at: Instant,
) -> axum::response::Response {
    log_event(
        config,
        LogLevel::Info,
        "proxy_request_failed",
        serde_json::json!({
            "request_id": request_id,
            "status": status.as_u16(),
            "error_class": error_class,
            "message": message,
            "duration_ms": request_started_at.elapsed().as_millis(),
        }),
    );

    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response_with_request_id(
        status,
        headers,
        Json(ProxyFailure {
            ok: false,
            error: message,
        }),
        request_id,
    )
}

/// Resolves an origin-relative request path against the backend origin.
fn upstream_url(backend_url: &Url, path_and_query: &str) -> Result<Url, &'static str> {
    if !path_and_query.starts_with('/') || path_and_query.starts_with("//") {
        return Err("request path must be origin-relative");
    }

    let target = backend_url
        .join(path_and_query)
        .map_err(|_| "request path is not a valid URL")?;

    if target.origin() != backend_url.origin() {
        return Err("request path escapes the backend origin");
    }

    Ok(target)
}

fn build_backend_client(config: &HostConfig) -> Result<reqwest::Client, &'static str> {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .timeout(config.proxy_timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|_| "failed to prepare backend client")
}

async fn read_limited_body(
    response: reqwest::Response,
    max_response_bytes: usize,
) -> Result<Vec<u8>, &'static str> {
    let mut stream = response.bytes_stream();
    let mut body: Vec<u8> = Vec::with_capacity(8192);

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|_| "failed reading backend body")?;

        if body.len() + chunk.len() > max_response_bytes {
            return Err("backend body too large");
        }

        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

fn http_status_class(status: StatusCode) -> &'static str {
    if status.is_informational() {
        return "1xx";
    }

    if status.is_success() {
        return "2xx";
    }

    if status.is_redirection() {
        return "3xx";
    }

    if status.is_client_error() {
        return "4xx";
    }

    if status.is_server_error() {
        return "5xx";
    }

    "unknown"
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bounded<T>(raw: Option<String>, default: T, bounds: (T, T)) -> T
where
    T: FromStr + PartialOrd + Copy,
{
    raw.and_then(|value| value.trim().parse::<T>().ok())
        .filter(|value| (bounds.0..=bounds.1).contains(value))
        .unwrap_or(default)
}

fn parse_http_url(raw: Option<String>) -> Option<Url> {
    let parsed = Url::parse(&raw?).ok()?;

    if parsed.scheme() == "http" || parsed.scheme() == "https" {
        Some(parsed)
    } else {
        None
    }
}

fn parse_log_level(raw: Option<String>, default: LogLevel) -> LogLevel {
    match raw
        .unwrap_or_else(|| default.as_str().to_string())
        .to_ascii_lowercase()
        .as_str()
    {
        "debug" => LogLevel::Debug,
        "info" => LogLevel::Info,
        _ => default,
    }
}

fn now_unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_millis())
        .unwrap_or(0)
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_secs())
        .unwrap_or(0)
}

fn generate_request_id() -> String {
    let counter = REQUEST_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    format!("req-{}-{counter}", now_unix_millis())
}

fn resolve_request_id(headers: &HeaderMap) -> String {
    let value = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|raw| raw.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string);

    value.unwrap_or_else(generate_request_id)
}

fn response_with_request_id(
    status: StatusCode,
    mut headers: HeaderMap,
    payload: impl IntoResponse,
    request_id: &str,
) -> axum::response::Response {
    if let Ok(request_id_header) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, request_id_header);
    }
    (status, headers, payload).into_response()
}

fn log_event(config: &HostConfig, level: LogLevel, event: &str, fields: serde_json::Value) {
    if level < config.log_level {
        return;
    }

    let mut payload = serde_json::Map::new();
    payload.insert(
        "ts".to_string(),
        serde_json::Value::Number(serde_json::Number::from(now_unix_seconds())),
    );
    payload.insert("level".to_string(), serde_json::Value::String(level.as_str().to_string()));
    payload.insert("event".to_string(), serde_json::Value::String(event.to_string()));

    if let serde_json::Value::Object(extra) = fields {
        for (key, value) in extra {
            payload.insert(key, value);
        }
    }

    println!("{}", serde_json::Value::Object(payload));
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;

    fn test_config(backend_url: Url) -> HostConfig {
        HostConfig {
            port: DEFAULT_PORT,
            backend_url,
            proxy_timeout: Duration::from_millis(DEFAULT_PROXY_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_PROXY_CONNECT_TIMEOUT_MS),
            response_max_bytes: DEFAULT_PROXY_RESPONSE_MAX_BYTES,
            static_dir: PathBuf::from("dist"),
            log_level: DEFAULT_LOG_LEVEL,
        }
    }

    fn test_state(config: HostConfig) -> AppState {
        AppState {
            client: build_backend_client(&config).expect("client builds"),
            config,
        }
    }

    async fn spawn_backend(app: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let address = listener.local_addr().expect("mock backend address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Url::parse(&format!("http://{address}")).expect("valid mock URL")
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body")
            .to_vec()
    }

    fn mock_backend() -> Router {
        Router::new()
            .route(
                "/api/game/{id}/screenshots",
                get(|Path(id): Path<String>| async move {
                    Json(vec![format!("/shots/{id}-1.jpg"), format!("/shots/{id}-2.jpg")])
                }),
            )
            .route(
                "/api/games",
                get(|| async { "x".repeat(4_096) }),
            )
            .route(
                "/add_to_cart",
                post(|body: String| async move {
                    ([(header::SET_COOKIE, "session=abc; Path=/")], body)
                }),
            )
    }

    #[test]
    fn upstream_url_keeps_path_and_query() {
        let backend = Url::parse("http://127.0.0.1:5000").expect("valid URL");

        let target = upstream_url(&backend, "/api/games?q=hollow").expect("relative path joins");
        assert_eq!(target.as_str(), "http://127.0.0.1:5000/api/games?q=hollow");
    }

    #[test]
    fn upstream_url_rejects_other_origins() {
        let backend = Url::parse("http://127.0.0.1:5000").expect("valid URL");

        assert!(upstream_url(&backend, "//evil.example/api/games").is_err());
        assert!(upstream_url(&backend, "http://evil.example/").is_err());
    }

    #[test]
    fn bounded_values_fall_back_to_default() {
        assert_eq!(parse_bounded(Some("250".to_string()), 6_000u64, PROXY_TIMEOUT_MS_BOUNDS), 250);
        assert_eq!(parse_bounded(Some("5".to_string()), 6_000u64, PROXY_TIMEOUT_MS_BOUNDS), 6_000);
        assert_eq!(parse_bounded(Some("soon".to_string()), 6_000u64, PROXY_TIMEOUT_MS_BOUNDS), 6_000);
        assert_eq!(parse_bounded(None, DEFAULT_PORT, (1, u16::MAX)), 8080);
    }

    #[test]
    fn backend_url_must_be_http() {
        assert!(parse_http_url(Some("ftp://files.example".to_string())).is_none());
        assert!(parse_http_url(Some("https://shop.example".to_string())).is_some());
        assert!(parse_http_url(None).is_none());
    }

    #[test]
    fn log_level_parsing_and_order() {
        assert_eq!(parse_log_level(Some("DEBUG".to_string()), LogLevel::Info), LogLevel::Debug);
        assert_eq!(parse_log_level(Some("verbose".to_string()), LogLevel::Info), LogLevel::Info);
        assert!(LogLevel::Debug < LogLevel::Info);
    }

    #[test]
    fn request_id_is_reused_from_client() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static(" abc-123 "));
        assert_eq!(resolve_request_id(&headers), "abc-123");

        let generated = resolve_request_id(&HeaderMap::new());
        assert!(generated.starts_with("req-"));
    }

    #[test]
    fn status_classes() {
        assert_eq!(http_status_class(StatusCode::OK), "2xx");
        assert_eq!(http_status_class(StatusCode::FOUND), "3xx");
        assert_eq!(http_status_class(StatusCode::BAD_GATEWAY), "5xx");
    }

    #[tokio::test]
    async fn screenshots_are_forwarded_verbatim() {
        let backend = spawn_backend(mock_backend()).await;
        let state = test_state(test_config(backend));

        let response = forward_to_backend(
            State(state),
            Method::GET,
            Uri::from_static("/api/game/7/screenshots"),
            HeaderMap::new(),
            Bytes::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let shots: Vec<String> =
            serde_json::from_slice(&body_bytes(response).await).expect("JSON array");
        assert_eq!(shots, vec!["/shots/7-1.jpg", "/shots/7-2.jpg"]);
    }

    #[tokio::test]
    async fn cart_post_forwards_body_and_cookies() {
        let backend = spawn_backend(mock_backend()).await;
        let state = test_state(test_config(backend));
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let response = forward_to_backend(
            State(state),
            Method::POST,
            Uri::from_static("/add_to_cart"),
            headers,
            Bytes::from_static(br#"{"game_id":7}"#),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::SET_COOKIE)
                .and_then(|value| value.to_str().ok()),
            Some("session=abc; Path=/")
        );
        assert_eq!(body_bytes(response).await, br#"{"game_id":7}"#.to_vec());
    }

    #[tokio::test]
    async fn oversized_backend_body_is_rejected() {
        let backend = spawn_backend(mock_backend()).await;
        let mut config = test_config(backend);
        config.response_max_bytes = 1_024;
        let state = test_state(config);

        let response = forward_to_backend(
            State(state),
            Method::GET,
            Uri::from_static("/api/games"),
            HeaderMap::new(),
            Bytes::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            response
                .headers()
                .get(header::CACHE_CONTROL)
                .and_then(|value| value.to_str().ok()),
            Some("no-store")
        );
    }

    #[tokio::test]
    async fn unreachable_backend_maps_to_bad_gateway() {
        let backend = Url::parse("http://127.0.0.1:1").expect("valid URL");
        let state = test_state(test_config(backend));

        let response = forward_to_backend(
            State(state),
            Method::GET,
            Uri::from_static("/api/games"),
            HeaderMap::new(),
            Bytes::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let failure: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).expect("JSON failure body");
        assert_eq!(failure["ok"], serde_json::Value::Bool(false));
    }
}
