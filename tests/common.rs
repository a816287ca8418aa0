#![allow(dead_code)]

use aqi_dashboard::api::ApiClient;
use aqi_dashboard::models::User;
use aqi_dashboard::store::{LocalStore, SessionStore};
use tempfile::TempDir;

/// State file inside a fresh temporary directory.
///
/// The directory is removed when the returned guard is dropped, so keep it
/// alive for the duration of the test.
pub fn temp_store() -> (TempDir, LocalStore) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = LocalStore::open(dir.path().join("state.json"));
    (dir, store)
}

/// Client for `base_url` wired to a session store in a temp state file.
pub fn client_with_session(base_url: &str) -> (TempDir, ApiClient, SessionStore) {
    let (dir, store) = temp_store();
    let sessions = SessionStore::new(store);
    let client = ApiClient::with_base_url(base_url).with_session(sessions.clone());
    (dir, client, sessions)
}

/// Same as [`client_with_session`] with a stored `token`.
pub fn logged_in_client(base_url: &str, token: &str) -> (TempDir, ApiClient, SessionStore) {
    let (dir, client, sessions) = client_with_session(base_url);
    let user = User {
        id: None,
        name: Some("Asha Rao".to_string()),
        email: Some("asha@example.in".to_string()),
    };
    sessions
        .save(token, Some(&user))
        .expect("Failed to store session");
    (dir, client, sessions)
}
