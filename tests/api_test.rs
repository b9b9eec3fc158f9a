//! HTTP-level tests against the full router

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};
use std::collections::HashSet;
use tempfile::TempDir;

use atrium::api::{build_router, AppState};
use atrium::config::Config;
use atrium::db::{create_test_pool, migrations};
use atrium::models::{CreateUserInput, UserRole};

struct Harness {
    server: TestServer,
    admin: String,
    alice: String,
    bob: String,
    _uploads: TempDir,
}

async fn harness() -> Harness {
    let uploads = TempDir::new().unwrap();
    let pool = create_test_pool().await.unwrap();
    migrations::run_migrations(&pool).await.unwrap();

    let mut config = Config::default();
    config.upload.path = uploads.path().to_path_buf();
    config.upload.public_base_url = "https://www.example.edu".to_string();
    let state = AppState::new(pool, config).unwrap();

    for (username, role) in [
        ("admin", UserRole::Admin),
        ("alice", UserRole::Author),
        ("bob", UserRole::Author),
    ] {
        state
            .user_service
            .create_user(CreateUserInput {
                username: username.to_string(),
                email: format!("{}@example.edu", username),
                password: "correct horse battery".to_string(),
                role,
            })
            .await
            .unwrap();
    }

    let server = TestServer::new(build_router(state).unwrap()).unwrap();
    let admin = login(&server, "admin").await;
    let alice = login(&server, "alice").await;
    let bob = login(&server, "bob").await;
    Harness {
        server,
        admin,
        alice,
        bob,
        _uploads: uploads,
    }
}

async fn login(server: &TestServer, username: &str) -> String {
    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({"username": username, "password": "correct horse battery"}))
        .await;
    response.assert_status_ok();
    response.json::<Value>()["data"]["token"]
        .as_str()
        .unwrap()
        .to_string()
}

fn image(title: &str, is_public: bool) -> MultipartForm {
    MultipartForm::new()
        .add_text("title", title)
        .add_text("is_public", if is_public { "true" } else { "false" })
        .add_part(
            "file",
            Part::bytes(vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a])
                .file_name("photo.png")
                .mime_type("image/png"),
        )
}

async fn upload(h: &Harness, token: &str, title: &str, is_public: bool) -> String {
    let response = h
        .server
        .post("/api/v1/media")
        .authorization_bearer(token)
        .multipart(image(title, is_public))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["data"]["id"].as_str().unwrap().to_string()
}

async fn submit_contact(h: &Harness, n: usize) {
    h.server
        .post("/api/v1/contacts")
        .json(&json!({
            "name": format!("Visitor {}", n),
            "email": format!("visitor{}@example.org", n),
            "subject": "Open day",
            "message": "When is the next open day?"
        }))
        .await
        .assert_status(StatusCode::CREATED);
}

fn ids(body: &Value) -> HashSet<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health() {
    let h = harness().await;
    let response = h.server.get("/api/v1/health").await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_pagination_past_and_at_the_end() {
    let h = harness().await;
    for n in 0..25 {
        submit_contact(&h, n).await;
    }

    let response = h
        .server
        .get("/api/v1/contacts?limit=10&page=3")
        .authorization_bearer(&h.admin)
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
    assert_eq!(body["meta"]["total"], 25);
    assert_eq!(body["meta"]["totalPages"], 3);
    assert_eq!(body["meta"]["page"], 3);

    let beyond = h
        .server
        .get("/api/v1/contacts?limit=10&page=7")
        .authorization_bearer(&h.admin)
        .await
        .json::<Value>();
    assert!(beyond["data"].as_array().unwrap().is_empty());
    assert_eq!(beyond["meta"]["total"], 25);
    assert_eq!(beyond["meta"]["totalPages"], 3);
}

#[tokio::test]
async fn test_zero_match_search_is_empty_success() {
    let h = harness().await;
    submit_contact(&h, 1).await;

    let response = h
        .server
        .get("/api/v1/contacts/search?query=no-such-words")
        .authorization_bearer(&h.admin)
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["success"], true);
    assert!(body["data"].as_array().unwrap().is_empty());
    assert_eq!(body["meta"]["total"], 0);
    assert_eq!(body["meta"]["totalPages"], 0);
}

#[tokio::test]
async fn test_undecodable_ids_are_not_found() {
    let h = harness().await;
    submit_contact(&h, 1).await;

    let response = h
        .server
        .get("/api/v1/contacts/1")
        .authorization_bearer(&h.admin)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["message"], "Resource not found");

    h.server
        .get("/api/v1/media?uploaded_by=not-a-token")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    h.server
        .delete("/api/v1/media/AAAAAAAAAAAAAAAA")
        .authorization_bearer(&h.admin)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_query_validation_errors() {
    let h = harness().await;
    h.server
        .get("/api/v1/media?sortBy=password")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    h.server
        .get("/api/v1/media?is_public=yes")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    h.server
        .get("/api/v1/partners?sortOrder=sideways")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_anonymous_results_are_subset_of_authenticated() {
    let h = harness().await;
    let public = upload(&h, &h.alice, "Quad at dawn", true).await;
    let hidden = upload(&h, &h.alice, "Quad draft", false).await;
    upload(&h, &h.bob, "Library", true).await;

    for filter in ["", "?query=quad", "?media_type=image", "?is_public=false"] {
        let anonymous = ids(&h.server.get(&format!("/api/v1/media{}", filter)).await.json::<Value>());
        let signed_in = ids(
            &h.server
                .get(&format!("/api/v1/media{}", filter))
                .authorization_bearer(&h.admin)
                .await
                .json::<Value>(),
        );
        assert!(anonymous.is_subset(&signed_in), "filter {:?}", filter);
        assert!(!anonymous.contains(&hidden));
    }

    h.server
        .get(&format!("/api/v1/media/{}", hidden))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let found = h.server.get(&format!("/api/v1/media/{}", public)).await;
    found.assert_status_ok();
    let url = found.json::<Value>()["data"]["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("https://www.example.edu/uploads/media/"));
}

#[tokio::test]
async fn test_bulk_delete_reports_ownership_failures() {
    let h = harness().await;
    let mut tokens = Vec::new();
    for i in 0..2 {
        tokens.push(upload(&h, &h.alice, &format!("mine {}", i), true).await);
    }
    for i in 0..3 {
        tokens.push(upload(&h, &h.bob, &format!("theirs {}", i), true).await);
    }

    let response = h
        .server
        .post("/api/v1/media/bulk-delete")
        .authorization_bearer(&h.alice)
        .json(&json!({ "ids": tokens }))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["data"]["deleted_count"], 2);
    let errors = body["data"]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 3);
    for error in errors {
        assert!(tokens[2..].contains(&error["id"].as_str().unwrap().to_string()));
    }
}

#[tokio::test]
async fn test_capabilities() {
    let h = harness().await;
    h.server.get("/api/v1/contacts").await.assert_status(StatusCode::UNAUTHORIZED);
    h.server
        .get("/api/v1/contacts")
        .authorization_bearer(&h.alice)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    h.server
        .get("/api/v1/contacts")
        .authorization_bearer("expired-or-made-up")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let partner = MultipartForm::new().add_text("name", "Acme Labs");
    h.server
        .post("/api/v1/partners")
        .authorization_bearer(&h.alice)
        .multipart(partner)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_partner_lookup_by_slug_and_conflict() {
    let h = harness().await;
    let created = h
        .server
        .post("/api/v1/partners")
        .authorization_bearer(&h.admin)
        .multipart(MultipartForm::new().add_text("name", "Lyon Institute").add_text("category", "academic"))
        .await;
    created.assert_status(StatusCode::CREATED);
    let id = created.json::<Value>()["data"]["id"].as_str().unwrap().to_string();

    let by_slug = h.server.get("/api/v1/partners/lyon-institute").await.json::<Value>();
    assert_eq!(by_slug["data"]["id"], id.as_str());
    let by_id = h.server.get(&format!("/api/v1/partners/{}", id)).await.json::<Value>();
    assert_eq!(by_id["data"]["slug"], "lyon-institute");

    h.server
        .post("/api/v1/partners")
        .authorization_bearer(&h.admin)
        .multipart(MultipartForm::new().add_text("name", "Lyon Institute"))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_bulk_settings_are_all_or_nothing() {
    let h = harness().await;
    for (key, value, value_type) in [("site.title", "Atrium", "string"), ("home.items", "6", "number")] {
        h.server
            .post("/api/v1/settings")
            .authorization_bearer(&h.admin)
            .multipart(
                MultipartForm::new()
                    .add_text("key", key)
                    .add_text("value", value)
                    .add_text("value_type", value_type)
                    .add_text("is_public", "true"),
            )
            .await
            .assert_status(StatusCode::CREATED);
    }

    h.server
        .put("/api/v1/settings/bulk")
        .authorization_bearer(&h.admin)
        .json(&json!({"items": [
            {"key": "site.title", "value": "Renamed"},
            {"key": "site.missing", "value": "x"}
        ]}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let title = h.server.get("/api/v1/settings/site.title").await.json::<Value>();
    assert_eq!(title["data"]["value"], "Atrium");

    h.server
        .put("/api/v1/settings/bulk")
        .authorization_bearer(&h.admin)
        .json(&json!({"items": [
            {"key": "site.title", "value": "Renamed"},
            {"key": "home.items", "value": "8"}
        ]}))
        .await
        .assert_status_ok();
    let title = h.server.get("/api/v1/settings/site.title").await.json::<Value>();
    assert_eq!(title["data"]["value"], "Renamed");
}

#[tokio::test]
async fn test_author_testimonials_need_moderation() {
    let h = harness().await;
    let created = h
        .server
        .post("/api/v1/testimonials")
        .authorization_bearer(&h.alice)
        .multipart(
            MultipartForm::new()
                .add_text("author_name", "Alice")
                .add_text("content", "A wonderful place to study.")
                .add_text("is_published", "true"),
        )
        .await;
    created.assert_status(StatusCode::CREATED);
    let body = created.json::<Value>();
    assert_eq!(body["data"]["is_published"], false);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    h.server
        .get(&format!("/api/v1/testimonials/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let published = h
        .server
        .post("/api/v1/testimonials/bulk-publish")
        .authorization_bearer(&h.admin)
        .json(&json!({"ids": [id], "is_published": true}))
        .await;
    published.assert_status_ok();
    assert_eq!(published.json::<Value>()["data"]["updated_count"], 1);

    h.server
        .get(&format!("/api/v1/testimonials/{}", id))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_logout_ends_session() {
    let h = harness().await;
    let me = h
        .server
        .get("/api/v1/auth/me")
        .authorization_bearer(&h.bob)
        .await;
    me.assert_status_ok();
    assert_eq!(me.json::<Value>()["data"]["username"], "bob");

    h.server
        .post("/api/v1/auth/logout")
        .authorization_bearer(&h.bob)
        .await
        .assert_status_ok();
    h.server
        .get("/api/v1/auth/me")
        .authorization_bearer(&h.bob)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let h = harness().await;
    h.server
        .post("/api/v1/auth/login")
        .json(&json!({"username": "admin", "password": "wrong"}))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
