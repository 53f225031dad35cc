use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use talentdesk::application::commands::Writers;
use talentdesk::application::queries::{DashboardMetrics, GetEmployeesQuery, GetPositionsQuery};
use talentdesk::application::repos::{
    AggregateWriter, DashboardRepo, EmployeesRepo, PositionsRepo, RepoError, RowPage,
};
use talentdesk::application::results::RecordsCount;
use talentdesk::application::{Repositories, build_commands, build_mediator};
use talentdesk::cache::{CacheConfig, CacheKeyHasher, CacheServices, KeyDisplayMode};
use talentdesk::config::{AdminToken, AppEnvironment};
use talentdesk::infra::http::{AdminAuth, AppState, BYPASS_HEADER, build_router};

const ADMIN_TOKEN: &str = "local-admin-token";

#[derive(Default)]
struct InMemoryRepo {
    employee_calls: AtomicUsize,
    stored: Mutex<HashSet<Uuid>>,
}

impl InMemoryRepo {
    fn employee_calls(&self) -> usize {
        self.employee_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmployeesRepo for InMemoryRepo {
    async fn list_employees(&self, query: &GetEmployeesQuery) -> Result<RowPage, RepoError> {
        self.employee_calls.fetch_add(1, Ordering::SeqCst);
        let row = [
            ("Id", json!("6f0c1c1e-0000-4000-8000-000000000001")),
            ("FirstName", json!(query.first_name.as_deref().unwrap_or("Grace"))),
            ("LastName", json!("Hopper")),
        ]
        .into_iter()
        .collect();
        Ok(RowPage {
            rows: vec![row],
            counts: RecordsCount {
                records_filtered: 1,
                records_total: 5,
            },
        })
    }
}

#[async_trait]
impl PositionsRepo for InMemoryRepo {
    async fn list_positions(&self, _query: &GetPositionsQuery) -> Result<RowPage, RepoError> {
        Ok(RowPage::default())
    }
}

#[async_trait]
impl DashboardRepo for InMemoryRepo {
    async fn dashboard_metrics(&self) -> Result<DashboardMetrics, RepoError> {
        Err(RepoError::Timeout)
    }
}

#[async_trait]
impl<I> AggregateWriter<I> for InMemoryRepo
where
    I: Send + Sync + 'static,
{
    async fn create(&self, _input: &I) -> Result<Uuid, RepoError> {
        let id = Uuid::new_v4();
        self.stored.lock().expect("stored ids").insert(id);
        Ok(id)
    }

    async fn update(&self, id: Uuid, _input: &I) -> Result<Uuid, RepoError> {
        if self.stored.lock().expect("stored ids").contains(&id) {
            Ok(id)
        } else {
            Err(RepoError::NotFound)
        }
    }

    async fn delete(&self, id: Uuid) -> Result<Uuid, RepoError> {
        if self.stored.lock().expect("stored ids").remove(&id) {
            Ok(id)
        } else {
            Err(RepoError::NotFound)
        }
    }
}

struct TestApp {
    router: Router,
    repo: Arc<InMemoryRepo>,
}

fn app(edit: impl FnOnce(&mut CacheConfig)) -> TestApp {
    let mut config = CacheConfig::default();
    config.diagnostics.emit_headers = true;
    edit(&mut config);

    let repo = Arc::new(InMemoryRepo::default());
    let cache = CacheServices::in_memory(config);
    let repos = Repositories {
        employees: repo.clone(),
        positions: repo.clone(),
        dashboard: repo.clone(),
    };
    let writers = Writers {
        employees: repo.clone(),
        positions: repo.clone(),
        departments: repo.clone(),
        salary_ranges: repo.clone(),
    };
    let state = AppState {
        mediator: Arc::new(build_mediator(repos, &cache)),
        commands: Arc::new(build_commands(writers, &cache)),
        cache,
        auth: Arc::new(AdminAuth::new(&[AdminToken {
            name: "ops".to_string(),
            token: ADMIN_TOKEN.to_string(),
        }])),
        db: None,
    };
    TestApp {
        router: build_router(state),
        repo,
    }
}

async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.expect("router")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn admin(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder.header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
}

fn invalidate(body: Value) -> Request<Body> {
    admin(Request::builder())
        .method(Method::POST)
        .uri("/api/v1/cache/invalidate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn write(method: Method, uri: &str, body: Value) -> Request<Body> {
    admin(Request::builder())
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn new_employee() -> Value {
    json!({
        "employeeNumber": "E-1001",
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "ada@example.com",
        "gender": "female",
        "salary": 120000.0,
        "positionId": Uuid::new_v4(),
        "departmentId": Uuid::new_v4(),
    })
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

fn header_str<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}

const EMPLOYEES_URI: &str = "/api/v1/employees?firstName=Ada&pageNumber=1&pageSize=10";
const EMPLOYEES_KEY: &str = "Employees:GetAll:page=1:size=10:first=ada";

#[tokio::test]
async fn employees_endpoint_reports_miss_then_hit() {
    let app = app(|_| {});

    let first = send(&app.router, get(EMPLOYEES_URI)).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(header_str(&first, "X-Cache-Status"), Some("MISS"));
    assert_eq!(
        header_str(&first, "X-Cache-Key"),
        Some(CacheKeyHasher.hash(EMPLOYEES_KEY).as_str())
    );
    let body = json_body(first).await;
    assert_eq!(body["isSuccess"], json!(true));
    assert_eq!(body["data"][0]["FirstName"], json!("Ada"));
    assert_eq!(body["recordsTotal"], json!(5));

    let second = send(&app.router, get(EMPLOYEES_URI)).await;
    assert_eq!(header_str(&second, "X-Cache-Status"), Some("HIT"));
    assert!(header_str(&second, "X-Cache-Duration-Ms").is_some());
    assert_eq!(app.repo.employee_calls(), 1);
}

#[tokio::test]
async fn raw_keys_are_shown_only_in_development() {
    let dev = app(|config| {
        config.environment = AppEnvironment::Development;
        config.diagnostics.key_display_mode = KeyDisplayMode::Raw;
    });
    let response = send(&dev.router, get(EMPLOYEES_URI)).await;
    assert_eq!(header_str(&response, "X-Cache-Key"), Some(EMPLOYEES_KEY));

    let prod = app(|config| {
        config.environment = AppEnvironment::Production;
        config.diagnostics.key_display_mode = KeyDisplayMode::Raw;
    });
    let response = send(&prod.router, get(EMPLOYEES_URI)).await;
    assert_eq!(
        header_str(&response, "X-Cache-Key"),
        Some(CacheKeyHasher.hash(EMPLOYEES_KEY).as_str())
    );
}

#[tokio::test]
async fn diagnostics_headers_can_be_turned_off() {
    let app = app(|config| config.diagnostics.emit_headers = false);
    let response = send(&app.router, get(EMPLOYEES_URI)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(header_str(&response, "X-Cache-Status").is_none());
    assert!(header_str(&response, "X-Cache-Key").is_none());
}

#[tokio::test]
async fn invalid_paging_is_rejected() {
    let app = app(|_| {});
    for uri in [
        "/api/v1/employees?pageSize=0",
        "/api/v1/employees?pageSize=201",
        "/api/v1/positions?pageNumber=0",
    ] {
        let response = send(&app.router, get(uri)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], json!("bad_request"));
    }
    assert_eq!(app.repo.employee_calls(), 0);
}

#[tokio::test]
async fn failed_query_is_not_cached_and_reports_failure() {
    let app = app(|_| {});
    let response = send(&app.router, get("/api/v1/dashboard/metrics")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(header_str(&response, "X-Cache-Status").is_none());
    let body = json_body(response).await;
    assert_eq!(body["isSuccess"], json!(false));
}

#[tokio::test]
async fn bypass_header_requires_an_admin() {
    let app = app(|_| {});
    send(&app.router, get(EMPLOYEES_URI)).await;

    let anonymous = Request::builder()
        .uri(EMPLOYEES_URI)
        .header(BYPASS_HEADER, "true")
        .body(Body::empty())
        .expect("request");
    let response = send(&app.router, anonymous).await;
    assert_eq!(header_str(&response, "X-Cache-Status"), Some("HIT"));
    assert_eq!(app.repo.employee_calls(), 1);

    let privileged = admin(Request::builder())
        .uri(EMPLOYEES_URI)
        .header(BYPASS_HEADER, "yes")
        .body(Body::empty())
        .expect("request");
    let response = send(&app.router, privileged).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "X-Cache-Status"), Some("MISS"));
    assert_eq!(app.repo.employee_calls(), 2);
}

#[tokio::test]
async fn cache_admin_routes_require_a_valid_token() {
    let app = app(|_| {});

    let missing = Request::builder()
        .uri("/api/v1/cache/stats")
        .body(Body::empty())
        .expect("request");
    assert_eq!(
        send(&app.router, missing).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let wrong = Request::builder()
        .uri("/api/v1/cache/stats")
        .header(header::AUTHORIZATION, "Bearer not-the-token")
        .body(Body::empty())
        .expect("request");
    let response = send(&app.router, wrong).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"]["code"], json!("forbidden"));
}

#[tokio::test]
async fn invalidate_requires_a_target() {
    let app = app(|_| {});
    let response = send(&app.router, invalidate(json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(
        body["error"]["message"],
        json!("Specify a key, prefix, or set invalidateAll=true.")
    );
}

#[tokio::test]
async fn invalidate_by_key_forces_a_miss() {
    let app = app(|_| {});
    send(&app.router, get(EMPLOYEES_URI)).await;

    let response = send(&app.router, invalidate(json!({ "key": EMPLOYEES_KEY }))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app.router, get(EMPLOYEES_URI)).await;
    assert_eq!(header_str(&response, "X-Cache-Status"), Some("MISS"));
    assert_eq!(app.repo.employee_calls(), 2);
}

#[tokio::test]
async fn invalidate_by_displayed_hash_forces_a_miss() {
    let app = app(|_| {});
    let first = send(&app.router, get(EMPLOYEES_URI)).await;
    let hashed = header_str(&first, "X-Cache-Key")
        .expect("key header")
        .to_string();

    let response = send(&app.router, invalidate(json!({ "key": hashed }))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    send(&app.router, get(EMPLOYEES_URI)).await;
    assert_eq!(app.repo.employee_calls(), 2);
}

#[tokio::test]
async fn invalidate_all_via_query_string() {
    let app = app(|_| {});
    send(&app.router, get(EMPLOYEES_URI)).await;

    let request = admin(Request::builder())
        .method(Method::POST)
        .uri("/api/v1/cache/invalidate?invalidateAll=true")
        .body(Body::empty())
        .expect("request");
    assert_eq!(
        send(&app.router, request).await.status(),
        StatusCode::NO_CONTENT
    );

    send(&app.router, get(EMPLOYEES_URI)).await;
    assert_eq!(app.repo.employee_calls(), 2);
}

#[tokio::test]
async fn stats_report_hits_and_misses() {
    let app = app(|_| {});
    let request = || {
        admin(Request::builder())
            .uri("/api/v1/cache/stats")
            .body(Body::empty())
            .expect("request")
    };

    let empty = json_body(send(&app.router, request()).await).await;
    assert_eq!(empty["hits"], json!(0));
    assert_eq!(empty["hitRate"], json!(0.0));
    assert!(empty["startedAtUtc"].is_string());

    send(&app.router, get(EMPLOYEES_URI)).await;
    send(&app.router, get(EMPLOYEES_URI)).await;

    let stats = json_body(send(&app.router, request()).await).await;
    assert_eq!(stats["hits"], json!(1));
    assert_eq!(stats["misses"], json!(1));
    assert_eq!(stats["hitRate"], json!(0.5));
}

#[tokio::test]
async fn health_without_database_is_ok() {
    let app = app(|_| {});
    let response = send(&app.router, get("/health")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn creating_an_employee_drops_cached_employee_pages() {
    let app = app(|_| {});
    send(&app.router, get(EMPLOYEES_URI)).await;
    let cached = send(&app.router, get(EMPLOYEES_URI)).await;
    assert_eq!(header_str(&cached, "X-Cache-Status"), Some("HIT"));

    let response = send(
        &app.router,
        write(Method::POST, "/api/v1/employees", new_employee()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert!(created["id"].as_str().is_some_and(|id| id.parse::<Uuid>().is_ok()));

    let after = send(&app.router, get(EMPLOYEES_URI)).await;
    assert_eq!(header_str(&after, "X-Cache-Status"), Some("MISS"));
    assert_eq!(app.repo.employee_calls(), 2);
}

#[tokio::test]
async fn update_and_delete_round_through_the_same_id() {
    let app = app(|_| {});
    let response = send(
        &app.router,
        write(
            Method::POST,
            "/api/v1/departments",
            json!({ "name": "Research" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = json_body(response).await["id"]
        .as_str()
        .expect("id")
        .to_string();

    let uri = format!("/api/v1/departments/{id}");
    let response = send(
        &app.router,
        write(Method::PUT, &uri, json!({ "name": "R&D" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["id"], json!(id));

    let response = send(&app.router, write(Method::DELETE, &uri, json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app.router, write(Method::DELETE, &uri, json!({}))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["code"], json!("not_found"));
}

#[tokio::test]
async fn mutations_require_an_admin_and_a_valid_body() {
    let app = app(|_| {});

    let anonymous = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/employees")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(new_employee().to_string()))
        .expect("request");
    assert_eq!(
        send(&app.router, anonymous).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let malformed = send(
        &app.router,
        write(Method::POST, "/api/v1/employees", json!({ "firstName": "Ada" })),
    )
    .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    let inverted = send(
        &app.router,
        write(
            Method::POST,
            "/api/v1/salary-ranges",
            json!({ "name": "Band A", "minSalary": 5000, "maxSalary": 1000 }),
        ),
    )
    .await;
    assert_eq!(inverted.status(), StatusCode::BAD_REQUEST);
    let body = json_body(inverted).await;
    assert!(
        body["error"]["hint"]
            .as_str()
            .is_some_and(|hint| hint.contains("minSalary"))
    );

    let missing = send(
        &app.router,
        write(
            Method::PUT,
            &format!("/api/v1/positions/{}", Uuid::new_v4()),
            json!({
                "positionNumber": "P-7",
                "positionTitle": "Analyst",
                "departmentId": Uuid::new_v4(),
                "salaryRangeId": Uuid::new_v4(),
            }),
        ),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
