//! In-process test server: the full router over a temp data directory.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, Response, StatusCode, header};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use stashbox::auth::{TokenGenerator, issue_token, register_user};
use stashbox::blob::FsBlobStore;
use stashbox::config::{Limits, ServerConfig};
use stashbox::server::{AppState, create_router};
use stashbox::store::{SqliteStore, Store};

pub const BOUNDARY: &str = "stashbox-test-boundary";

pub struct TestServer {
    pub temp_dir: TempDir,
    pub router: Router,
    pub store: Arc<SqliteStore>,
    pub admin_token: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }

    pub fn data(&self) -> Value {
        let json = self.json();
        assert_eq!(json["success"], true, "unexpected error envelope: {json}");
        json["data"].clone()
    }

    pub fn error_kind(&self) -> String {
        let json = self.json();
        assert_eq!(json["success"], false, "expected error envelope: {json}");
        json["error"].as_str().expect("error kind").to_string()
    }

    pub fn header(&self, name: header::HeaderName) -> &str {
        self.headers
            .get(name)
            .expect("header present")
            .to_str()
            .expect("header is ASCII")
    }
}

impl TestServer {
    pub fn start() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = ServerConfig {
            data_dir: temp_dir.path().to_path_buf(),
            limits,
            ..ServerConfig::default()
        };

        let store = Arc::new(SqliteStore::new(config.db_path()).expect("open store"));
        store.initialize().expect("initialize store");
        let (_, admin_token) = issue_token(store.as_ref(), &TokenGenerator::new(), None, true, None)
            .expect("issue admin token");

        let blobs = Arc::new(FsBlobStore::new(&config.data_dir));
        let state = Arc::new(AppState::new(store.clone(), blobs, config));

        Self {
            temp_dir,
            router: create_router(state),
            store,
            admin_token,
        }
    }

    /// Registers a user directly in the store and returns their token.
    pub fn user(&self, email: &str) -> String {
        let (_, token) =
            register_user(self.store.as_ref(), &TokenGenerator::new(), email).expect("register user");
        token
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response: Response<Body> = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body")
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
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

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Uploads `data` as `file_name`. `bucket` is sent as `bucket_id` or
    /// `bucket_name` depending on `by_name`.
    pub async fn upload(
        &self,
        token: &str,
        bucket: &str,
        by_name: bool,
        file_name: &str,
        data: &[u8],
    ) -> TestResponse {
        let field = if by_name { "bucket_name" } else { "bucket_id" };
        let body = multipart_body(&[(field, bucket)], Some((file_name, data)));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/upload")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("build upload request");

        self.send(request).await
    }

    pub async fn create_bucket(&self, token: &str, name: &str) -> String {
        let resp = self
            .post("/api/v1/buckets", token, serde_json::json!({ "name": name }))
            .await;
        assert_eq!(resp.status, StatusCode::CREATED);
        resp.data()["id"].as_str().expect("bucket id").to_string()
    }
}

pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
