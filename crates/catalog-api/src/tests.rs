use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use catalog_core::db::ModelDraft;
use catalog_core::CatalogService;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::routes::{app_router, AppState};

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "correct horse battery staple";
const BOUNDARY: &str = "catalog-test-boundary";
const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

fn peer(last_octet: u8) -> SocketAddr {
    SocketAddr::from(([198, 51, 100, last_octet], 40_000))
}

struct TestApp {
    state: AppState,
    catalog: CatalogService,
    config: Arc<AppConfig>,
    _dir: TempDir,
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

async fn spawn_app() -> TestApp {
    spawn_app_with(&[]).await
}

async fn spawn_app_with(overrides: &[(&str, &str)]) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(test_config(dir.path(), overrides));
    let catalog = CatalogService::open_path(&config.db_path).await.unwrap();
    let state = AppState::new(config.clone(), catalog.clone());

    TestApp {
        state,
        catalog,
        config,
        _dir: dir,
    }
}

fn test_config(dir: &Path, overrides: &[(&str, &str)]) -> AppConfig {
    let mut values: HashMap<String, String> = HashMap::new();
    values.insert(
        "CATALOG_DB_PATH".to_string(),
        dir.join("catalog.db").display().to_string(),
    );
    values.insert(
        "CATALOG_MEDIA_DIR".to_string(),
        dir.join("uploads").display().to_string(),
    );
    values.insert("ADMIN_EMAIL".to_string(), ADMIN_EMAIL.to_string());
    values.insert("ADMIN_PASSWORD".to_string(), ADMIN_PASSWORD.to_string());
    values.insert(
        "ADMIN_SESSION_SECRET".to_string(),
        "router-test-secret-0123456789abcdefghij".to_string(),
    );
    values.insert("MAX_UPLOAD_BYTES".to_string(), "4096".to_string());
    for (key, value) in overrides {
        values.insert((*key).to_string(), (*value).to_string());
    }

    AppConfig::from_lookup(|key| values.get(key).cloned()).unwrap()
}

impl TestApp {
    /// A router that sees every request as coming from `peer`.
    fn router_from(&self, peer: SocketAddr) -> Router {
        app_router(self.state.clone()).layer(MockConnectInfo(peer))
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        self.send_from(peer(4), request).await
    }

    async fn send_from(&self, peer: SocketAddr, request: Request<Body>) -> TestResponse {
        let response = self.router_from(peer).oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }

    async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn login_with(&self, email: &str, password: &str) -> TestResponse {
        self.login_via(peer(4), None, email, password).await
    }

    async fn login_via(
        &self,
        peer: SocketAddr,
        forwarded_for: Option<&str>,
        email: &str,
        password: &str,
    ) -> TestResponse {
        let body = json!({ "email": email, "password": password }).to_string();
        let mut builder =
            Request::post("/api/admin/login").header(header::CONTENT_TYPE, "application/json");
        if let Some(forwarded_for) = forwarded_for {
            builder = builder.header("x-forwarded-for", forwarded_for);
        }
        self.send_from(peer, builder.body(Body::from(body)).unwrap())
            .await
    }

    /// Sign in and return the `name=value` cookie pair.
    async fn login(&self) -> String {
        let response = self.login_with(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert_eq!(response.status, StatusCode::OK);
        session_pair(&response.headers)
    }

    async fn admin_json(
        &self,
        cookie: &str,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> TestResponse {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        };
        self.send(request.unwrap()).await
    }

    async fn admin_multipart(
        &self,
        cookie: &str,
        method: Method,
        uri: &str,
        form: Vec<Part<'_>>,
    ) -> TestResponse {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::COOKIE, cookie)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(&form)))
                .unwrap(),
        )
        .await
    }

    fn media_path(&self, url: &str) -> std::path::PathBuf {
        self.config
            .media_dir
            .join(url.trim_start_matches("/uploads/"))
    }
}

fn session_pair(headers: &HeaderMap) -> String {
    headers[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        field: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

fn png_part<'a>(field: &'a str, file_name: &'a str) -> Part<'a> {
    Part::File {
        field,
        file_name,
        content_type: "image/png",
        bytes: PNG_BYTES,
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File {
                field,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn seed_catalog(catalog: &CatalogService) {
    let honda = catalog.create_brand("Honda", None).await.unwrap();
    let civic_line = catalog
        .create_sub_brand("Civic Line", &honda.id)
        .await
        .unwrap();
    catalog
        .create_model(ModelDraft {
            name: "Civic".to_string(),
            description: Some("A reliable sedan".to_string()),
            sub_brand_id: civic_line.id,
            images: Vec::new(),
        })
        .await
        .unwrap();
    catalog.create_brand("Toyota", None).await.unwrap();
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = spawn_app().await;
    let response = app.get("/healthz").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["rateLimit"]["loginLimited"], 0);
}

#[tokio::test]
async fn search_short_or_missing_query_returns_empty_results() {
    let app = spawn_app().await;
    seed_catalog(&app.catalog).await;

    let response = app.get("/api/search?q=%20t%20").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({ "results": [], "query": "t" }));

    let response = app.get("/api/search").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({ "results": [], "query": "" }));
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let app = spawn_app().await;
    seed_catalog(&app.catalog).await;

    let response = app.get("/api/search?q=toyota").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["query"], "toyota");
    assert_eq!(
        response.body["results"],
        json!([{
            "id": response.body["results"][0]["id"],
            "type": "brand",
            "name": "Toyota",
            "slug": "toyota",
            "description": "Car brand - Toyota"
        }])
    );

    let response = app.get("/api/search?q=Reliable").await;
    let hit = &response.body["results"][0];
    assert_eq!(hit["type"], "model");
    assert_eq!(hit["name"], "Civic");
    assert_eq!(hit["brandSlug"], "honda");
    assert_eq!(hit["subBrandSlug"], "civic-line");
}

#[tokio::test]
async fn search_storage_failure_returns_empty_500() {
    let app = spawn_app().await;
    seed_catalog(&app.catalog).await;

    let conn = rusqlite::Connection::open(&app.config.db_path).unwrap();
    conn.execute_batch("DROP TABLE models").unwrap();
    drop(conn);

    let response = app.get("/api/search?q=civic").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.body,
        json!({ "error": "Search failed", "results": [] })
    );
}

#[tokio::test]
async fn public_reads_serve_brand_pages_and_models() {
    let app = spawn_app().await;
    seed_catalog(&app.catalog).await;

    let response = app.get("/api/brands").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body[0]["name"], "Honda");
    assert_eq!(response.body[1]["name"], "Toyota");

    let response = app.get("/api/brands/honda").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["brand"]["slug"], "honda");
    assert_eq!(response.body["subBrands"][0]["name"], "Civic Line");
    assert_eq!(response.body["subBrands"][0]["models"][0]["slug"], "civic");

    let response = app.get("/api/models/civic").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["subBrandName"], "Civic Line");

    let response = app.get("/api/brands/lada").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body["error"].is_string());
}

#[tokio::test]
async fn admin_routes_require_a_session() {
    let app = spawn_app().await;

    let response = app.get("/api/admin/stats").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("session"));

    let response = app
        .admin_json(
            "admin_session=not-a-jwt",
            Method::GET,
            "/api/admin/stats",
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_sets_cookie_that_unlocks_admin_routes() {
    let app = spawn_app().await;
    seed_catalog(&app.catalog).await;

    let response = app.login_with(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({ "ok": true }));
    let set_cookie = response.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("admin_session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Max-Age=86400"));
    assert!(!set_cookie.contains("Secure"));

    let cookie = session_pair(&response.headers);
    let response = app
        .admin_json(&cookie, Method::GET, "/api/admin/stats", None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body,
        json!({ "brands": 2, "subBrands": 1, "models": 1 })
    );
}

#[tokio::test]
async fn login_rejects_bad_or_missing_credentials() {
    let app = spawn_app().await;

    let response = app.login_with(ADMIN_EMAIL, "wrong").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(response.headers.get(header::SET_COOKIE).is_none());

    let response = app.login_with("", "").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_attempts_are_rate_limited() {
    let app = spawn_app_with(&[("LOGIN_RATE_LIMIT_PER_WINDOW", "2")]).await;

    assert_eq!(
        app.login_with(ADMIN_EMAIL, "nope").await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.login_with(ADMIN_EMAIL, "nope").await.status,
        StatusCode::UNAUTHORIZED
    );

    let response = app.login_with(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers.contains_key(header::RETRY_AFTER));
}

#[tokio::test]
async fn rotating_forwarded_for_does_not_reset_the_login_limit() {
    let app = spawn_app_with(&[("LOGIN_RATE_LIMIT_PER_WINDOW", "2")]).await;

    let mut statuses = Vec::new();
    for octet in 0..6u8 {
        let forwarded = format!("10.9.0.{octet}");
        let response = app
            .login_via(peer(7), Some(&forwarded), ADMIN_EMAIL, "guess")
            .await;
        statuses.push(response.status);
    }

    assert_eq!(&statuses[..2], &[StatusCode::UNAUTHORIZED; 2]);
    assert!(statuses[2..]
        .iter()
        .all(|status| *status == StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn login_limit_is_per_peer_address() {
    let app = spawn_app_with(&[("LOGIN_RATE_LIMIT_PER_WINDOW", "1")]).await;

    assert_eq!(
        app.login_via(peer(8), None, ADMIN_EMAIL, "guess").await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.login_via(peer(8), None, ADMIN_EMAIL, "guess").await.status,
        StatusCode::TOO_MANY_REQUESTS
    );

    // Someone else is not locked out by the first client's guesses.
    let response = app
        .login_via(peer(9), None, ADMIN_EMAIL, ADMIN_PASSWORD)
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn trusted_proxy_headers_key_the_login_limit() {
    let app = spawn_app_with(&[
        ("LOGIN_RATE_LIMIT_PER_WINDOW", "1"),
        ("TRUST_PROXY_HEADERS", "true"),
    ])
    .await;
    let proxy = peer(10);

    assert_eq!(
        app.login_via(proxy, Some("203.0.113.1"), ADMIN_EMAIL, "guess")
            .await
            .status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.login_via(proxy, Some("203.0.113.1"), ADMIN_EMAIL, "guess")
            .await
            .status,
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
        app.login_via(proxy, Some("203.0.113.2"), ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn oversized_multipart_body_is_rejected_with_413() {
    let app = spawn_app().await;
    let cookie = app.login().await;

    // Larger than ten uploads plus form overhead at the 4 KiB test limit.
    let oversized = vec![0u8; 256 * 1024];
    let response = app
        .admin_multipart(
            &cookie,
            Method::POST,
            "/api/admin/brands",
            vec![
                Part::Text("name", "Mazda"),
                Part::File {
                    field: "logo",
                    file_name: "huge.png",
                    content_type: "image/png",
                    bytes: &oversized,
                },
            ],
        )
        .await;

    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(response.body["error"].is_string());
    assert_eq!(app.catalog.stats().await.unwrap().brands, 0);
}

#[tokio::test]
async fn logout_clears_the_cookie() {
    let app = spawn_app().await;
    let response = app
        .send(
            Request::post("/api/admin/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let set_cookie = response.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("admin_session=;"));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn sub_brand_crud_round_trip() {
    let app = spawn_app().await;
    let cookie = app.login().await;
    let toyota = app.catalog.create_brand("Toyota", None).await.unwrap();

    let response = app
        .admin_json(
            &cookie,
            Method::POST,
            "/api/admin/sub-brands",
            Some(json!({ "name": "Lexus", "brandId": toyota.id.to_string() })),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["slug"], "lexus");
    assert_eq!(response.body["brandName"], "Toyota");
    let id = response.body["id"].as_str().unwrap().to_string();

    let response = app
        .admin_json(
            &cookie,
            Method::POST,
            "/api/admin/sub-brands",
            Some(json!({ "name": "Ghost", "brandId": catalog_core::BrandId::new().to_string() })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .admin_json(
            &cookie,
            Method::PUT,
            &format!("/api/admin/sub-brands/{id}"),
            Some(json!({ "name": "Lexus F", "brandId": toyota.id.to_string() })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["slug"], "lexus-f");

    let response = app
        .admin_json(&cookie, Method::GET, "/api/admin/sub-brands", None)
        .await;
    assert_eq!(response.body.as_array().unwrap().len(), 1);

    let response = app
        .admin_json(
            &cookie,
            Method::DELETE,
            &format!("/api/admin/brands/{}", toyota.id),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = app
        .admin_json(
            &cookie,
            Method::DELETE,
            &format!("/api/admin/sub-brands/{id}"),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({ "ok": true, "id": id }));

    let response = app
        .admin_json(
            &cookie,
            Method::DELETE,
            &format!("/api/admin/sub-brands/{id}"),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app
        .admin_json(&cookie, Method::DELETE, "/api/admin/sub-brands/oops", None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn brand_create_stores_and_serves_logo() {
    let app = spawn_app().await;
    let cookie = app.login().await;

    let response = app
        .admin_multipart(
            &cookie,
            Method::POST,
            "/api/admin/brands",
            vec![Part::Text("name", "Mazda"), png_part("logo", "mazda.png")],
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["slug"], "mazda");
    let logo = response.body["logo"].as_str().unwrap().to_string();
    assert!(logo.starts_with("/uploads/brands/"));
    assert!(app.media_path(&logo).exists());

    let served = app
        .router_from(peer(4))
        .oneshot(Request::get(logo.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(served.status(), StatusCode::OK);
    let bytes = to_bytes(served.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], PNG_BYTES);

    // Dropping the logo removes the stored file.
    let id = response.body["id"].as_str().unwrap().to_string();
    let response = app
        .admin_multipart(
            &cookie,
            Method::PUT,
            &format!("/api/admin/brands/{id}"),
            vec![Part::Text("name", "Mazda"), Part::Text("removeLogo", "true")],
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.get("logo").is_none());
    assert!(!app.media_path(&logo).exists());
}

#[tokio::test]
async fn brand_upload_rejects_non_images_and_missing_name() {
    let app = spawn_app().await;
    let cookie = app.login().await;

    let response = app
        .admin_multipart(
            &cookie,
            Method::POST,
            "/api/admin/brands",
            vec![
                Part::Text("name", "Mazda"),
                Part::File {
                    field: "logo",
                    file_name: "notes.txt",
                    content_type: "text/plain",
                    bytes: b"hello",
                },
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .admin_multipart(
            &cookie,
            Method::POST,
            "/api/admin/brands",
            vec![Part::Text("name", "  ")],
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.catalog.stats().await.unwrap().brands, 0);
}

#[tokio::test]
async fn model_images_are_added_removed_and_cleaned_up() {
    let app = spawn_app().await;
    let cookie = app.login().await;
    let honda = app.catalog.create_brand("Honda", None).await.unwrap();
    let line = app
        .catalog
        .create_sub_brand("Civic Line", &honda.id)
        .await
        .unwrap();
    let sub_brand_id = line.id.to_string();

    let response = app
        .admin_multipart(
            &cookie,
            Method::POST,
            "/api/admin/models",
            vec![
                Part::Text("name", "Civic"),
                Part::Text("description", "A reliable sedan"),
                Part::Text("subBrandId", &sub_brand_id),
                png_part("images", "front.png"),
                png_part("images", "rear.png"),
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["brandName"], "Honda");
    let id = response.body["id"].as_str().unwrap().to_string();
    let images: Vec<String> = serde_json::from_value(response.body["images"].clone()).unwrap();
    assert_eq!(images.len(), 2);

    let remove = json!([images[0]]).to_string();
    let response = app
        .admin_multipart(
            &cookie,
            Method::PUT,
            &format!("/api/admin/models/{id}"),
            vec![
                Part::Text("name", "Civic Type R"),
                Part::Text("description", ""),
                Part::Text("subBrandId", &sub_brand_id),
                Part::Text("imagesToRemove", &remove),
                png_part("images", "side.png"),
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["slug"], "civic-type-r");
    assert!(response.body.get("description").is_none());
    let updated: Vec<String> = serde_json::from_value(response.body["images"].clone()).unwrap();
    assert_eq!(updated.len(), 2);
    assert_eq!(updated[0], images[1]);
    assert!(!app.media_path(&images[0]).exists());

    let response = app
        .admin_multipart(
            &cookie,
            Method::POST,
            "/api/admin/models",
            vec![
                Part::Text("name", "Orphan"),
                Part::Text("subBrandId", &catalog_core::SubBrandId::new().to_string()),
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .admin_json(
            &cookie,
            Method::DELETE,
            &format!("/api/admin/models/{id}"),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    for url in &updated {
        assert!(!app.media_path(url).exists());
    }
}
