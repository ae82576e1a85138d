use serde_json::{json, Value};
use simple_pos::auth::hash_password;
use simple_pos::configuration::{AuthSettings, HttpSettings};
use simple_pos::models::NewUser;
use simple_pos::startup::{run, AppState};
use simple_pos::store::{InMemoryTokenStore, InMemoryUserStore, UserStore};
use std::net::TcpListener;
use std::sync::Arc;

const PASSWORD: &str = "password123";

pub struct TestApp {
    pub address: String,
    pub user_ids: Vec<i64>,
    pub token: String,
}

/// Spawn the app with `user_count` seeded users and log in as the first one
async fn spawn_app(user_count: usize) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let users = Arc::new(InMemoryUserStore::new());
    let password_hash = hash_password(PASSWORD, 4).expect("Failed to hash password");
    let mut user_ids = Vec::with_capacity(user_count);
    for n in 1..=user_count {
        let user = users
            .create(NewUser {
                code: Some(format!("EMP{:03}", n)),
                name: format!("Employee {}", n),
                email: format!("employee{}@example.com", n),
                password_hash: password_hash.clone(),
            })
            .await
            .expect("Failed to seed user");
        user_ids.push(user.id);
    }

    let settings = AuthSettings {
        password_hash_cost: 4,
        ..AuthSettings::default()
    };
    let state = AppState::new(users, Arc::new(InMemoryTokenStore::new()), settings)
        .expect("Failed to build application state");
    let server = run(
        listener,
        state,
        HttpSettings {
            requests_per_minute: 10_000,
            auth_requests_per_minute: 10_000,
            ..HttpSettings::default()
        },
    )
    .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    let response = reqwest::Client::new()
        .post(&format!("{}/api/auth/login", &address))
        .json(&json!({ "email": "employee1@example.com", "password": PASSWORD }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    let token = body["data"]["token"].as_str().expect("token").to_string();

    TestApp {
        address,
        user_ids,
        token,
    }
}

impl TestApp {
    async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(&format!("{}{}", &self.address, path))
            .bearer_auth(&self.token)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

#[tokio::test]
async fn users_routes_require_authentication() {
    let app = spawn_app(1).await;

    for path in ["/api/users", "/api/users/", "/api/users/me", "/api/users/1"] {
        let response = reqwest::Client::new()
            .get(&format!("{}{}", &app.address, path))
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(401, response.status().as_u16(), "path: {}", path);
    }
}

#[tokio::test]
async fn list_users_is_paginated() {
    let app = spawn_app(5).await;

    let response = app.get("/api/users?page=2&per_page=2").await;
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    let data = body["data"].as_array().expect("data array");
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["id"], app.user_ids[2]);
    assert_eq!(
        body["meta"],
        json!({
            "total_records": 5,
            "items_on_page": 2,
            "per_page": 2,
            "current_page": 2,
            "total_pages": 3,
            "has_more_pages": true,
        })
    );
}

#[tokio::test]
async fn list_users_falls_back_to_defaults() {
    let app = spawn_app(3).await;

    let response = app.get("/api/users?page=0&per_page=abc").await;
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["meta"]["current_page"], 1);
    assert_eq!(body["meta"]["per_page"], 15);
    assert_eq!(body["meta"]["items_on_page"], 3);
    assert_eq!(body["meta"]["has_more_pages"], false);
}

#[tokio::test]
async fn list_users_accepts_trailing_slash() {
    let app = spawn_app(2).await;

    let response = app.get("/api/users/?per_page=1").await;
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["meta"]["total_records"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn user_payloads_never_include_password() {
    let app = spawn_app(2).await;

    let response = app.get("/api/users").await;
    let body: Value = response.json().await.unwrap();
    for user in body["data"].as_array().unwrap() {
        assert!(user.get("password").is_none());
        assert!(user.get("password_hash").is_none());
    }
}

#[tokio::test]
async fn me_returns_the_authenticated_user() {
    let app = spawn_app(2).await;

    let response = app.get("/api/users/me").await;
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["id"], app.user_ids[0]);
    assert_eq!(body["data"]["email"], "employee1@example.com");
    assert_eq!(body["data"]["code"], "EMP001");
}

#[tokio::test]
async fn show_user_by_id() {
    let app = spawn_app(2).await;

    let response = app.get(&format!("/api/users/{}", app.user_ids[1])).await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["name"], "Employee 2");

    let response = app.get("/api/users/9999").await;
    assert_eq!(404, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "User not found");

    let response = app.get("/api/users/abc").await;
    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid user ID");
}
