//! API integration tests
//!
//! Drive the full router in-process over the in-memory store.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use bookshelf_server::{
    api::create_router,
    config::AppConfig,
    models::{Role, User, UserClaims},
    repository::{LibraryStore, MemoryStore},
    AppState,
};

struct TestApp {
    router: Router,
    store: Arc<dyn LibraryStore>,
    secret: String,
}

impl TestApp {
    fn new() -> Self {
        let config = AppConfig::default();
        let secret = config.auth.jwt_secret.clone();
        let store: Arc<dyn LibraryStore> = Arc::new(MemoryStore::new());
        let router = create_router(AppState::new(config, store.clone()));
        Self {
            router,
            store,
            secret,
        }
    }

    /// Provision a user and return a bearer token for them
    async fn user(&self, name: &str, role: Role) -> (String, String) {
        let user = User::new(name, format!("{}@example.org", name.to_lowercase()), role);
        self.store.insert_user(&user).await.unwrap();
        let token = UserClaims::new(user.id, role, 1)
            .create_token(&self.secret)
            .unwrap();
        (user.id.to_string(), token)
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    /// Post a body as-is, without serializing it
    async fn post_raw(&self, uri: &str, token: &str, body: &'static str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    async fn post(&self, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), body).await
    }

    async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, Some(token), None).await
    }

    async fn create_book(&self, token: &str, title: &str, is_public: bool) -> String {
        let (status, book) = self
            .post(
                "/api/v1/books",
                token,
                Some(json!({
                    "title": title,
                    "author": "Octavia E. Butler",
                    "totalPages": 320,
                    "pagesRead": 12,
                    "price": "9.99",
                    "isPublic": is_public,
                    "readingStatus": "reading"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", book);
        book["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.call(Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_missing_or_invalid_token_is_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/api/v1/books", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = app.get("/api/v1/borrows/pending", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = UserClaims::new(uuid::Uuid::new_v4(), Role::Admin, 1)
        .create_token("some-other-secret")
        .unwrap();
    let (status, _) = app.get("/api/v1/admin/users", &forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_borrow_lifecycle() {
    let app = TestApp::new();
    let (lender_id, lender) = app.user("Lena", Role::User).await;
    let (borrower_id, borrower) = app.user("Bo", Role::User).await;
    let book_id = app.create_book(&lender, "Parable of the Sower", true).await;

    let (status, listed) = app.get("/api/v1/books/public", &borrower).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["id"], book_id.as_str());
    assert_eq!(listed[0]["ownerInfo"]["name"], "Lena");

    // Borrower asks
    let (status, request) = app
        .post(
            &format!("/api/v1/borrows/books/{}", book_id),
            &borrower,
            Some(json!({ "message": "  Could I read it next week?  " })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "pending");
    assert_eq!(request["message"], "Could I read it next week?");
    assert_eq!(request["fromUser"]["id"], borrower_id.as_str());
    assert_eq!(request["toUser"]["id"], lender_id.as_str());
    let request_id = request["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(&format!("/api/v1/borrows/books/{}", book_id), &borrower, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidOperation");

    let (_, pending) = app.get("/api/v1/borrows/pending", &lender).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    // Only the owner may answer
    let (status, body) = app
        .post(&format!("/api/v1/borrows/{}/accept", request_id), &borrower, None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");

    let (status, approved) = app
        .post(&format!("/api/v1/borrows/{}/accept", request_id), &lender, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");
    assert!(approved["dueDate"].is_string());
    assert_eq!(approved["isOverdue"], false);

    let (status, body) = app
        .post(&format!("/api/v1/borrows/{}/accept", request_id), &lender, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict");

    let (_, book) = app.get(&format!("/api/v1/books/{}", book_id), &borrower).await;
    assert_eq!(book["isAvailable"], false);

    let (_, stats) = app.get("/api/v1/users/me/stats", &borrower).await;
    assert_eq!(stats["borrowedBooks"], 1);
    let (_, ledger) = app.get("/api/v1/users/me/ledger", &lender).await;
    assert_eq!(ledger["booksLent"], json!([book_id]));
    assert_eq!(ledger["lentCount"], 1);

    let (_, mine) = app.get("/api/v1/books", &borrower).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (status, _) = app
        .post(&format!("/api/v1/borrows/{}/remind", request_id), &lender, None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Deleting an open request is refused
    let (status, _) = app
        .delete(&format!("/api/v1/borrows/{}", request_id), &borrower)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, completed) = app
        .post(&format!("/api/v1/borrows/{}/confirm-return", request_id), &lender, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");
    assert_eq!(completed["returnConfirmed"], true);

    let (_, book) = app.get(&format!("/api/v1/books/{}", book_id), &lender).await;
    assert_eq!(book["isAvailable"], true);
    assert_eq!(book["readingStatus"], "to-read");

    let (_, stats) = app.get("/api/v1/users/me/stats", &borrower).await;
    assert_eq!(stats["borrowedBooks"], 0);
    assert_eq!(stats["booksRead"], 1);
    let (_, stats) = app.get("/api/v1/users/me/stats", &lender).await;
    assert_eq!(stats["booksLent"], 0);

    let (status, _) = app
        .delete(&format!("/api/v1/borrows/{}", request_id), &lender)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .delete(&format!("/api/v1/borrows/{}", request_id), &borrower)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, mine) = app.get("/api/v1/borrows/mine", &borrower).await;
    assert!(mine.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_sibling_requests_first_accept_wins() {
    let app = TestApp::new();
    let (_, lender) = app.user("Lena", Role::User).await;
    let (_, first) = app.user("Bo", Role::User).await;
    let (_, second) = app.user("Cy", Role::User).await;
    let book_id = app.create_book(&lender, "Wild Seed", true).await;

    let uri = format!("/api/v1/borrows/books/{}", book_id);
    let (_, a) = app.post(&uri, &first, None).await;
    let (_, b) = app.post(&uri, &second, None).await;

    let (status, _) = app
        .post(&format!("/api/v1/borrows/{}/accept", a["id"].as_str().unwrap()), &lender, None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(&format!("/api/v1/borrows/{}/accept", b["id"].as_str().unwrap()), &lender, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict");

    // The losing request is still pending and can be rejected
    let (status, rejected) = app
        .post(&format!("/api/v1/borrows/{}/reject", b["id"].as_str().unwrap()), &lender, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "rejected");

    let (_, approved) = app.get("/api/v1/borrows/approved", &lender).await;
    assert_eq!(approved.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_book_access_rules() {
    let app = TestApp::new();
    let (_, owner) = app.user("Olga", Role::User).await;
    let (_, other) = app.user("Remy", Role::User).await;
    let book_id = app.create_book(&owner, "Private diary", false).await;
    let book_uri = format!("/api/v1/books/{}", book_id);

    let (status, _) = app.get(&book_uri, &other).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(
            Method::PUT,
            &book_uri,
            Some(&other),
            Some(json!({ "title": "Mine now" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            Method::PUT,
            &book_uri,
            Some(&owner),
            Some(json!({ "pagesRead": 400 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation");

    let (status, book) = app
        .post(&format!("{}/visibility", book_uri), &owner, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["isPublic"], true);
    let (status, _) = app.get(&book_uri, &other).await;
    assert_eq!(status, StatusCode::OK);

    let (_, reading) = app.get("/api/v1/books/reading", &owner).await;
    assert_eq!(reading.as_array().unwrap().len(), 1);

    let (status, _) = app.delete(&book_uri, &other).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&book_uri, &owner).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = app.get(&book_uri, &owner).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn test_lent_book_cannot_be_deleted() {
    let app = TestApp::new();
    let (_, owner) = app.user("Olga", Role::User).await;
    let (_, borrower) = app.user("Bo", Role::User).await;
    let (_, admin) = app.user("Ada", Role::Admin).await;
    let book_id = app.create_book(&owner, "Kindred", true).await;

    let (_, request) = app
        .post(&format!("/api/v1/borrows/books/{}", book_id), &borrower, None)
        .await;
    app.post(
        &format!("/api/v1/borrows/{}/accept", request["id"].as_str().unwrap()),
        &owner,
        None,
    )
    .await;

    let (status, _) = app.delete(&format!("/api/v1/books/{}", book_id), &owner).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app
        .delete(&format!("/api/v1/admin/books/{}", book_id), &admin)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_malformed_borrow_body_is_rejected() {
    let app = TestApp::new();
    let (_, owner) = app.user("Olga", Role::User).await;
    let (_, borrower) = app.user("Bo", Role::User).await;
    let book_id = app.create_book(&owner, "Dawn", true).await;
    let uri = format!("/api/v1/borrows/books/{}", book_id);

    let (status, body) = app.post_raw(&uri, &borrower, "{\"message\": ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation");

    let (status, body) = app.post_raw(&uri, &borrower, "{\"message\": 42}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation");

    // Nothing was created by the rejected attempts
    let (_, mine) = app.get("/api/v1/borrows/mine", &borrower).await;
    assert!(mine.as_array().unwrap().is_empty());

    let (status, request) = app.post_raw(&uri, &borrower, "{}").await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(request["message"].is_null());
}

#[tokio::test]
async fn test_admin_user_management() {
    let app = TestApp::new();
    let (_, admin) = app.user("Ada", Role::Admin).await;
    let (_, owner) = app.user("Olga", Role::User).await;

    let new_user = json!({ "name": "Nia", "email": "nia@example.org", "location": "Accra" });
    let (status, _) = app.post("/api/v1/admin/users", &owner, Some(new_user.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app.post("/api/v1/admin/users", &admin, Some(new_user.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["role"], "user");
    assert_eq!(created["booksOwned"], json!([]));

    let (status, body) = app.post("/api/v1/admin/users", &admin, Some(new_user)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict");

    let (status, body) = app
        .post(
            "/api/v1/admin/users",
            &admin,
            Some(json!({ "name": "Bad", "email": "nope" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation");

    // The provisioned account is usable right away
    let nia_id: uuid::Uuid = created["id"].as_str().unwrap().parse().unwrap();
    let nia = UserClaims::new(nia_id, Role::User, 1)
        .create_token(&app.secret)
        .unwrap();
    let (status, me) = app.get("/api/v1/users/me", &nia).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["location"], "Accra");

    let book_id = app.create_book(&owner, "Lilith's Brood", true).await;
    let (_, request) = app
        .post(&format!("/api/v1/borrows/books/{}", book_id), &nia, None)
        .await;
    let request_id = request["id"].as_str().unwrap().to_string();
    app.post(&format!("/api/v1/borrows/{}/accept", request_id), &owner, None)
        .await;

    let user_uri = format!("/api/v1/admin/users/{}", nia_id);
    let (status, _) = app.delete(&user_uri, &owner).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app.delete(&user_uri, &admin).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict");

    app.post(&format!("/api/v1/borrows/{}/confirm-return", request_id), &owner, None)
        .await;
    let (status, _) = app.delete(&user_uri, &admin).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get("/api/v1/users/me", &nia).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&user_uri, &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, ledger) = app.get("/api/v1/users/me/ledger", &owner).await;
    assert_eq!(ledger["booksOwned"], json!([book_id]));
    assert_eq!(ledger["booksLent"], json!([]));
}

#[tokio::test]
async fn test_admin_endpoints() {
    let app = TestApp::new();
    let (_, user) = app.user("Bea", Role::User).await;
    let (_, admin) = app.user("Ada", Role::Admin).await;
    let book_id = app.create_book(&user, "Fledgling", false).await;

    for uri in ["/api/v1/admin/users", "/api/v1/admin/books", "/api/v1/admin/borrows"] {
        let (status, body) = app.get(uri, &user).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body["error"], "Forbidden");

        let (status, _) = app.get(uri, &admin).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
    }

    let (_, users) = app.get("/api/v1/admin/users", &admin).await;
    assert_eq!(users.as_array().unwrap().len(), 2);
    let (_, books) = app.get("/api/v1/admin/books", &admin).await;
    assert_eq!(books[0]["ownerInfo"]["name"], "Bea");

    let uri = format!("/api/v1/admin/books/{}", book_id);
    let (status, _) = app.delete(&uri, &user).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&uri, &admin).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, ledger) = app.get("/api/v1/users/me/ledger", &user).await;
    assert_eq!(ledger["booksOwned"], json!([]));
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = TestApp::new();
    let (status, doc) = app
        .call(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/borrows/{id}/accept"].is_object());
}
