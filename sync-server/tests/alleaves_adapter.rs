//! Alleaves adapter integration tests against an in-process HTTP stub.
//!
//! The stub speaks just enough of the upstream API to exercise the session
//! cache, the 401 re-auth path, the partner header rule, the two-tier
//! inventory lookup and find-or-create customer sync.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Json;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};

use shared::models::PosProvider;
use sync_server::pos::AlleavesAdapter;
use sync_server::{AppError, PosAdapter, PosEnvironment, PosLocationConfig};

// ========== Stub upstream ==========

#[derive(Default)]
struct StubState {
    login_calls: AtomicUsize,
    menu_calls: AtomicUsize,
    create_customer_calls: AtomicUsize,
    /// Tokens numbered <= this are rejected with 401
    revoked_through: AtomicUsize,
    /// Non-200 forces this status (with a fixed error body) on /inventory/search
    menu_status: AtomicUsize,
    /// Non-200 forces this status on the bulk inventory endpoint
    bulk_status: AtomicUsize,
    /// Partner header value seen on each authenticated request (None = absent)
    partner_headers: Mutex<Vec<Option<String>>>,
    customers: Mutex<Vec<Value>>,
}

impl StubState {
    fn new() -> Arc<Self> {
        let state = Self::default();
        state.menu_status.store(200, Ordering::SeqCst);
        state.bulk_status.store(200, Ordering::SeqCst);
        Arc::new(state)
    }
}

/// Unsigned JWT carrying a login sequence number and a far-out expiry
fn make_jwt(n: usize) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    let claims = json!({"sub": "stub", "n": n, "exp": exp});
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{header}.{payload}.sig")
}

fn token_number(headers: &HeaderMap) -> Option<usize> {
    let bearer = headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?;
    let payload = URL_SAFE_NO_PAD.decode(bearer.split('.').nth(1)?).ok()?;
    let claims: Value = serde_json::from_slice(&payload).ok()?;
    claims.get("n")?.as_u64().map(|n| n as usize)
}

/// Record the partner header and enforce token revocation
fn check_request(state: &StubState, headers: &HeaderMap) -> Result<(), Response> {
    state.partner_headers.lock().unwrap().push(
        headers
            .get("x-alleaves-partner-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );
    match token_number(headers) {
        Some(n) if n > state.revoked_through.load(Ordering::SeqCst) => Ok(()),
        _ => Err((StatusCode::UNAUTHORIZED, "token rejected").into_response()),
    }
}

async fn login(State(state): State<Arc<StubState>>) -> Json<Value> {
    // Slow enough that concurrent callers would overlap without single-flight
    tokio::time::sleep(Duration::from_millis(50)).await;
    let n = state.login_calls.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({"token": make_jwt(n)}))
}

async fn inventory_search(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    if let Err(rejection) = check_request(&state, &headers) {
        return rejection;
    }
    state.menu_calls.fetch_add(1, Ordering::SeqCst);
    let status = state.menu_status.load(Ordering::SeqCst);
    if status != 200 {
        return (
            StatusCode::from_u16(status as u16).unwrap(),
            r#"{"error":"maintenance window"}"#,
        )
            .into_response();
    }
    Json(json!({"items": [
        {"id_item": 7, "product_name": "OG Kush 3.5g", "category": "Flower", "price_retail": 25.0, "quantity_available": 4},
        {"id_item": 8, "product_name": "Gummies", "category": "Edibles", "price_retail": 15.0, "quantity_available": 0},
        {"id_item": 9, "product_name": "Vape Pen", "category": "Vapes", "price_retail": 40.0, "quantity_available": 12},
    ]}))
    .into_response()
}

async fn inventory_items(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    if let Err(rejection) = check_request(&state, &headers) {
        return rejection;
    }
    let status = state.bulk_status.load(Ordering::SeqCst);
    if status != 200 {
        return (
            StatusCode::from_u16(status as u16).unwrap(),
            r#"{"error":"bulk endpoint down"}"#,
        )
            .into_response();
    }
    Json(json!({"items": [
        {"id_item": 7, "quantity_available": 4},
        {"id_item": 8, "quantity_available": 0},
    ]}))
    .into_response()
}

async fn customer_search(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = check_request(&state, &headers) {
        return rejection;
    }
    let email = body.get("email").and_then(Value::as_str).unwrap_or("");
    let matches: Vec<Value> = state
        .customers
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.get("email").and_then(Value::as_str) == Some(email))
        .cloned()
        .collect();
    Json(json!({"customers": matches})).into_response()
}

async fn customer_create(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = check_request(&state, &headers) {
        return rejection;
    }
    let n = state.create_customer_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let customer = json!({
        "id_customer": n,
        "email": body.get("email").cloned().unwrap_or(Value::Null),
        "name_first": body.get("name_first").cloned().unwrap_or(Value::Null),
        "name_last": body.get("name_last").cloned().unwrap_or(Value::Null),
    });
    state.customers.lock().unwrap().push(customer.clone());
    Json(customer).into_response()
}

async fn spawn_stub(state: Arc<StubState>) -> String {
    let app = Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/inventory/search", post(inventory_search))
        .route("/api/v1/location/{loc}/inventory/items", post(inventory_items))
        .route("/api/v1/customer/search", post(customer_search))
        .route("/api/v1/customer", post(customer_create))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn make_adapter(base_url: &str, partner_id: Option<&str>) -> AlleavesAdapter {
    AlleavesAdapter::new(&PosLocationConfig {
        provider: PosProvider::Alleaves,
        environment: PosEnvironment::Sandbox,
        username: "api@test.example".into(),
        password: "secret".into(),
        pin: Some("1234".into()),
        store_id: "17".into(),
        location_id: None,
        partner_id: partner_id.map(str::to_string),
        base_url: Some(base_url.to_string()),
    })
    .unwrap()
}

// ========== Tests ==========

#[tokio::test]
async fn test_token_cached_across_sequential_requests() {
    let state = StubState::new();
    let base = spawn_stub(state.clone()).await;
    let adapter = make_adapter(&base, None);

    adapter.fetch_menu().await.unwrap();
    adapter.fetch_menu().await.unwrap();

    assert_eq!(state.login_calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.menu_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_token_exchange() {
    let state = StubState::new();
    let base = spawn_stub(state.clone()).await;
    let adapter = Arc::new(make_adapter(&base, None));

    let (a, b) = tokio::join!(adapter.fetch_menu(), adapter.fetch_menu());
    a.unwrap();
    b.unwrap();

    // Both callers hit the empty cache at the same time; only one exchange
    assert_eq!(state.login_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rejected_token_triggers_exactly_one_reauth_and_retry() {
    let state = StubState::new();
    let base = spawn_stub(state.clone()).await;
    let adapter = make_adapter(&base, None);

    // The first issued token is revoked; the second is accepted
    state.revoked_through.store(1, Ordering::SeqCst);

    let menu = adapter.fetch_menu().await.unwrap();
    assert_eq!(menu.len(), 3);
    assert_eq!(state.login_calls.load(Ordering::SeqCst), 2);
    // Only the retried request got past the auth check
    assert_eq!(state.menu_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_second_rejection_surfaces_instead_of_looping() {
    let state = StubState::new();
    let base = spawn_stub(state.clone()).await;
    let adapter = make_adapter(&base, None);

    // Every token the stub ever issues is revoked
    state.revoked_through.store(usize::MAX, Ordering::SeqCst);

    let err = adapter.fetch_menu().await.unwrap_err();
    assert!(matches!(err, AppError::Upstream { status: 401, .. }));
    // One initial exchange plus exactly one re-auth, then give up
    assert_eq!(state.login_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_partner_header_only_sent_when_configured() {
    let with_partner = StubState::new();
    let base = spawn_stub(with_partner.clone()).await;
    make_adapter(&base, Some("partner-99"))
        .fetch_menu()
        .await
        .unwrap();
    let seen = with_partner.partner_headers.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|h| h.as_deref() == Some("partner-99")));
    drop(seen);

    let without_partner = StubState::new();
    let base = spawn_stub(without_partner.clone()).await;
    make_adapter(&base, None).fetch_menu().await.unwrap();
    let seen = without_partner.partner_headers.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(Option::is_none));
}

#[tokio::test]
async fn test_upstream_failure_captures_status_and_body_verbatim() {
    let state = StubState::new();
    let base = spawn_stub(state.clone()).await;
    let adapter = make_adapter(&base, None);

    state.menu_status.store(503, Ordering::SeqCst);

    let err = adapter.fetch_menu().await.unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("fetch_menu failed: HTTP 503"), "{message}");
    assert!(message.contains(r#"{"error":"maintenance window"}"#), "{message}");
}

#[tokio::test]
async fn test_inventory_bulk_failure_falls_back_to_full_menu() {
    let state = StubState::new();
    let base = spawn_stub(state.clone()).await;
    let adapter = make_adapter(&base, None);

    state.bulk_status.store(500, Ordering::SeqCst);

    let ids = vec!["7".to_string(), "8".to_string()];
    let quantities = adapter.get_inventory(&ids).await.unwrap();

    // Fallback succeeded, so the bulk failure never surfaces
    assert_eq!(quantities.len(), 2);
    assert_eq!(quantities["7"], 4);
    assert_eq!(quantities["8"], 0);
    assert_eq!(state.menu_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_inventory_bulk_tier_skips_menu_fetch() {
    let state = StubState::new();
    let base = spawn_stub(state.clone()).await;
    let adapter = make_adapter(&base, None);

    let ids = vec!["7".to_string(), "8".to_string()];
    let quantities = adapter.get_inventory(&ids).await.unwrap();

    assert_eq!(quantities["7"], 4);
    assert_eq!(quantities["8"], 0);
    assert_eq!(state.menu_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sync_customer_is_idempotent() {
    let state = StubState::new();
    let base = spawn_stub(state.clone()).await;
    let adapter = make_adapter(&base, None);

    let input = sync_server::CustomerInput {
        email: "jane@example.com".into(),
        first_name: "Jane".into(),
        last_name: "Doe".into(),
        phone: None,
    };

    let first = adapter.sync_customer(&input).await.unwrap();
    let second = adapter.sync_customer(&input).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.external_id, second.external_id);
    assert_eq!(state.create_customer_calls.load(Ordering::SeqCst), 1);
}
