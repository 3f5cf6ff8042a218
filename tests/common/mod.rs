#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use dockyard::auth::TokenGenerator;
use dockyard::project::{AuditLogger, ProjectController, ProjectPolicy};
use dockyard::server::{AppState, create_router};
use dockyard::store::{SqliteStore, Store};
use dockyard::types::{AccessLogQuery, User};

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// An in-process server over a temporary database.
pub struct TestApp {
    _temp_dir: TempDir,
    pub store: Arc<dyn Store>,
    router: Router,
    pub admin: User,
    pub admin_token: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_policy(ProjectPolicy::default())
    }

    /// Must be called from inside a tokio runtime; the audit worker is spawned on it.
    pub fn with_policy(policy: ProjectPolicy) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let sqlite = SqliteStore::new(temp_dir.path().join("dockyard.db")).expect("open store");
        sqlite.initialize().expect("initialize store");
        let store: Arc<dyn Store> = Arc::new(sqlite);

        let (audit, _worker) = AuditLogger::spawn(store.clone(), 64);
        let controller = ProjectController::new(store.clone(), audit, policy);
        let router = create_router(Arc::new(AppState::new(store.clone(), controller)));

        let admin = store.create_user("admin", true).expect("create admin");
        let admin_token = issue_token(store.as_ref(), admin.id);

        Self {
            _temp_dir: temp_dir,
            store,
            router,
            admin,
            admin_token,
        }
    }

    pub fn create_user(&self, username: &str) -> (User, String) {
        let user = self
            .store
            .create_user(username, false)
            .expect("create user");
        let token = issue_token(self.store.as_ref(), user.id);
        (user, token)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("route request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    pub async fn head(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::HEAD, uri, token, None).await
    }

    /// Creates a project through the API and returns its id.
    pub async fn create_project(&self, token: &str, name: &str, public: bool) -> i64 {
        let resp = self
            .post(
                "/api/v1/projects",
                Some(token),
                serde_json::json!({ "project_name": name, "public": i32::from(public) }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "{:?}", resp.body);
        resp.body["data"]["id"].as_i64().expect("project id")
    }

    /// Waits for the background worker to persist `expected` access log entries.
    pub async fn wait_for_access_logs(&self, project_id: i64, expected: i64) -> i64 {
        let query = AccessLogQuery {
            project_id,
            ..AccessLogQuery::default()
        };
        let mut count = 0;
        for _ in 0..100 {
            count = self.store.count_access_logs(&query).expect("count logs");
            if count >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        count
    }
}

fn issue_token(store: &dyn Store, user_id: i64) -> String {
    let issued = TokenGenerator::new()
        .issue(user_id, None)
        .expect("issue token");
    store.create_token(&issued.token).expect("store token");
    issued.raw
}
