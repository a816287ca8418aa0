// Login, registration, identity-provider callback and logout against the session store

mod common;

use aqi_dashboard::api::ApiClient;
use aqi_dashboard::fetch_error::FetchError;
use aqi_dashboard::models::UserId;
use aqi_dashboard::services::{AuthService, FavoritesService};
use aqi_dashboard::store::SessionStore;
use mockito::{Matcher, Server};
use serde_json::json;

fn auth_service(base_url: &str) -> (tempfile::TempDir, AuthService, SessionStore) {
    let (dir, client, sessions) = common::client_with_session(base_url);
    (dir, AuthService::new(client, sessions.clone()), sessions)
}

#[tokio::test]
async fn test_login_persists_session_and_notifies() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("POST", "/api/auth/login")
        .match_body(Matcher::Json(json!({
            "email": "asha@example.in",
            "password": "monsoon-2026"
        })))
        .with_status(200)
        .with_body(
            r#"{"access_token":"jwt-abc","token_type":"bearer",
                "user":{"id":7,"name":"Asha Rao","email":"asha@example.in"}}"#,
        )
        .create_async()
        .await;

    let (dir, auth, sessions) = auth_service(&server.url());
    let mut observer = sessions.subscribe();

    let session = auth
        .login(" asha@example.in ", "monsoon-2026")
        .await
        .unwrap();

    assert_eq!(session.token.as_deref(), Some("jwt-abc"));
    assert_eq!(session.user.as_ref().unwrap().id, Some(UserId::Number(7)));
    assert!(observer.has_changed().unwrap());
    assert!(observer.borrow_and_update().is_authenticated());

    // A second store on the same file sees the login
    let reopened = SessionStore::new(aqi_dashboard::store::LocalStore::open(
        dir.path().join("state.json"),
    ));
    assert_eq!(reopened.token().as_deref(), Some("jwt-abc"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_login_failure_surfaces_detail_and_keeps_logged_out() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("POST", "/api/auth/login")
        .with_status(401)
        .with_body(r#"{"detail":"Incorrect email or password"}"#)
        .expect(1)
        .create_async()
        .await;

    let (_dir, auth, sessions) = auth_service(&server.url());
    let err = auth.login("asha@example.in", "wrong").await.unwrap_err();

    assert_eq!(err.user_message(), "Incorrect email or password");
    assert!(!sessions.is_authenticated());

    mock.assert_async().await;
}

#[tokio::test]
async fn test_register_requires_name() {
    let (_dir, auth, _sessions) = auth_service("http://127.0.0.1:9");
    let result = auth.register("  ", "asha@example.in", "secret").await;
    assert!(matches!(result, Err(FetchError::InvalidInput(_))));
}

#[tokio::test]
async fn test_oauth_falls_back_to_provider_token() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("POST", "/api/auth/supabase-callback")
        .with_status(200)
        .with_body(r#"{}"#)
        .create_async()
        .await;

    let (_dir, auth, _sessions) = auth_service(&server.url());
    let provider_user = json!({
        "id": "8d2e-uuid",
        "email": "ravi@example.in",
        "user_metadata": {"full_name": "Ravi Kumar"}
    });
    let session = auth
        .complete_oauth("provider-token", &provider_user)
        .await
        .unwrap();

    assert_eq!(session.token.as_deref(), Some("provider-token"));
    let user = session.user.unwrap();
    assert_eq!(user.id, Some(UserId::Text("8d2e-uuid".to_string())));
    assert_eq!(user.name.as_deref(), Some("Ravi Kumar"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_logout_is_local_and_blocks_favorites() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/api/favorites")
        .expect(0)
        .create_async()
        .await;

    let (_dir, client, sessions) = common::logged_in_client(&server.url(), "tok");
    let auth = AuthService::new(client.clone(), sessions.clone());
    let favorites = FavoritesService::new(client, sessions.clone());

    auth.logout().unwrap();

    assert!(!auth.current().is_authenticated());
    assert!(matches!(favorites.list().await, Err(FetchError::LoginRequired)));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_profile_uses_bearer_token() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/api/auth/me")
        .match_header("authorization", "Bearer tok")
        .with_status(200)
        .with_body(
            r#"{"id":7,"email":"asha@example.in","name":"Asha Rao",
                "created_at":"2026-01-12T10:00:00","favorite_cities":["Pune","Shimla"]}"#,
        )
        .create_async()
        .await;

    let (_dir, client, sessions) = common::logged_in_client(&server.url(), "tok");
    let profile = AuthService::new(client, sessions).profile().await.unwrap();

    assert_eq!(profile.name.as_deref(), Some("Asha Rao"));
    assert_eq!(profile.favorite_cities, vec!["Pune", "Shimla"]);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_without_session_store_needs_login_for_profile() {
    let client = ApiClient::with_base_url("http://127.0.0.1:9");
    assert!(matches!(client.profile().await, Err(FetchError::LoginRequired)));
}
