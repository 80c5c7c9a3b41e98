//! Client tests against a fake Cloud Controller served by axum on a local port.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use permload_cf::CloudController;
use permload_core::{ApiError, CloudControllerConfig};
use permload_engine::{Provisioner, RemoteApi, RetryPolicy};
use serde_json::{json, Value};

const TOKEN: &str = "token-1";

#[derive(Default)]
struct Fake {
    base: String,
    orgs: Mutex<Vec<(String, String)>>,
    token_requests: AtomicUsize,
    app_posts: AtomicUsize,
}

type Shared = Arc<Fake>;
type Reply = (StatusCode, Json<Value>);

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn unauthorized() -> Reply {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"code": 1000, "description": "Invalid Auth Token", "error_code": "CF-InvalidAuthToken"})),
    )
}

async fn info(State(fake): State<Shared>) -> Json<Value> {
    Json(json!({ "token_endpoint": fake.base }))
}

async fn token(State(fake): State<Shared>, headers: HeaderMap) -> Reply {
    fake.token_requests.fetch_add(1, Ordering::SeqCst);
    let basic = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    if !basic {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({ "access_token": TOKEN, "token_type": "bearer", "expires_in": 600 })),
    )
}

async fn create_org(State(fake): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    let name = body["name"].as_str().unwrap_or_default().to_string();
    let mut orgs = fake.orgs.lock().unwrap();
    if orgs.iter().any(|(_, n)| *n == name) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "code": 30002,
                "description": format!("The organization name is taken: {name}"),
                "error_code": "CF-OrganizationNameTaken"
            })),
        );
    }
    let guid = format!("org-guid-{}", orgs.len());
    orgs.push((guid.clone(), name.clone()));
    (
        StatusCode::CREATED,
        Json(json!({ "metadata": { "guid": guid }, "entity": { "name": name } })),
    )
}

/// Lists one org per page so the client has to follow `next`.
async fn list_orgs(
    State(fake): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    let orgs = fake.orgs.lock().unwrap().clone();
    let to_json = |(guid, name): &(String, String)| json!({ "guid": guid, "name": name });

    if let Some(name) = query.get("names") {
        let found: Vec<Value> = orgs.iter().filter(|(_, n)| n == name).map(to_json).collect();
        return (
            StatusCode::OK,
            Json(json!({ "pagination": { "total_results": found.len(), "next": null }, "resources": found })),
        );
    }

    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let resources: Vec<Value> = orgs.iter().skip(page - 1).take(1).map(to_json).collect();
    let next = if page < orgs.len() {
        json!({ "href": format!("{}/v3/organizations?page={}", fake.base, page + 1) })
    } else {
        Value::Null
    };
    (
        StatusCode::OK,
        Json(json!({
            "pagination": { "total_results": orgs.len(), "next": next },
            "resources": resources
        })),
    )
}

/// Every create reports the name as taken, as after a lost response.
async fn create_app(State(fake): State<Shared>, headers: HeaderMap) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    fake.app_posts.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "errors": [{
            "code": 10008,
            "title": "CF-UnprocessableEntity",
            "detail": "name must be unique in space"
        }] })),
    )
}

async fn find_apps(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    let name = query.get("names").cloned().unwrap_or_default();
    let space = query.get("space_guids").cloned().unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!({
            "pagination": { "total_results": 1, "next": null },
            "resources": [{
                "guid": "app-guid-0",
                "name": name,
                "relationships": { "space": { "data": { "guid": space } } }
            }]
        })),
    )
}

async fn count_users(headers: HeaderMap) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    (StatusCode::OK, Json(json!({ "total_results": 7, "resources": [] })))
}

async fn space_developer(headers: HeaderMap, Path((_space, _user)): Path<(String, String)>) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    (StatusCode::CREATED, Json(json!({})))
}

async fn broken_spaces() -> (StatusCode, String) {
    (StatusCode::OK, "not json".to_string())
}

async fn start() -> (Shared, CloudController) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let fake = Arc::new(Fake {
        base: base.clone(),
        ..Fake::default()
    });

    let app = Router::new()
        .route("/v2/info", get(info))
        .route("/oauth/token", post(token))
        .route("/v2/organizations", post(create_org))
        .route("/v3/organizations", get(list_orgs))
        .route("/v3/apps", post(create_app).get(find_apps))
        .route("/v3/spaces", get(broken_spaces))
        .route("/v2/users", get(count_users))
        .route("/v2/spaces/{space}/developers/{user}", put(space_developer))
        .with_state(fake.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = CloudControllerConfig {
        url: base,
        client_id: "loader".into(),
        client_secret: "secret".into(),
        skip_ssl_validation: false,
        timeout_secs: 3,
    };
    let client = CloudController::connect(&config).await.unwrap();
    (fake, client)
}

#[tokio::test]
async fn test_org_conflict_resolves_existing() {
    let (fake, client) = start().await;
    let provisioner = Provisioner::new(
        Arc::new(client),
        RetryPolicy::fixed(Duration::from_millis(1), Some(2)),
    );

    let first = provisioner.create_org_if_absent("perm-test-org-0").await.unwrap();
    let second = provisioner.create_org_if_absent("perm-test-org-0").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.id, "org-guid-0");
    assert_eq!(provisioner.retry_events(), 0);
    // The token is cached across calls.
    assert_eq!(fake.token_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_raw_conflict_is_status_error() {
    let (_fake, client) = start().await;
    client.create_org("o").await.unwrap();
    let err = client.create_org("o").await.unwrap_err();
    assert!(err.has_code("CF-OrganizationNameTaken"));
    assert!(matches!(err, ApiError::Status { status: 400, .. }));
}

#[tokio::test]
async fn test_list_follows_pagination() {
    let (_fake, client) = start().await;
    for i in 0..3 {
        client.create_org(&format!("perm-external-org-{i}")).await.unwrap();
    }
    let orgs = client.list_orgs().await.unwrap();
    let names: Vec<&str> = orgs.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(
        names,
        ["perm-external-org-0", "perm-external-org-1", "perm-external-org-2"]
    );
    assert_eq!(client.count_orgs().await.unwrap(), 3);
}

#[tokio::test]
async fn test_app_conflict_resolves_existing() {
    let (fake, client) = start().await;
    let provisioner = Provisioner::new(
        Arc::new(client),
        RetryPolicy::fixed(Duration::from_millis(1), Some(3)),
    );
    let app = provisioner.create_app_if_absent("a", "space-guid-9").await.unwrap();
    assert_eq!(app.id, "app-guid-0");
    assert_eq!(app.space_id, "space-guid-9");
    assert_eq!(fake.app_posts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_v2_user_count_and_role_put() {
    let (_fake, client) = start().await;
    assert_eq!(client.count_users().await.unwrap(), 7);
    client
        .assign_space_developer_role("user-1", "space-1")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_undecodable_body_is_decode_error() {
    let (_fake, client) = start().await;
    let err = client.count_spaces().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn test_unreachable_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let config = CloudControllerConfig {
        url,
        client_id: "loader".into(),
        client_secret: "secret".into(),
        skip_ssl_validation: true,
        timeout_secs: 1,
    };
    let err = CloudController::connect(&config).await.err().unwrap();
    assert!(matches!(err, ApiError::Transport(_)));
}
