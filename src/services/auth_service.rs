use serde_json::Value;
use tracing::{info, instrument};

use crate::api::ApiClient;
use crate::fetch_error::FetchError;
use crate::models::{AuthResponse, Profile, Session, User, UserId};
use crate::store::SessionStore;

#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
    sessions: SessionStore,
}

impl AuthService {
    pub fn new(api: ApiClient, sessions: SessionStore) -> Self {
        Self { api, sessions }
    }

    pub fn current(&self) -> Session {
        self.sessions.current()
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, FetchError> {
        let response = self.api.login(email, password).await?;
        self.persist(response, None)
    }

    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, FetchError> {
        let response = self.api.register(name, email, password).await?;
        self.persist(response, None)
    }

    /// Finishes an identity-provider sign-in. The backend token is kept when
    /// the backend issues one, otherwise the provider token is used as is.
    #[instrument(skip(self, access_token, provider_user))]
    pub async fn complete_oauth(
        &self,
        access_token: &str,
        provider_user: &Value,
    ) -> Result<Session, FetchError> {
        let response = self
            .api
            .supabase_callback(access_token, provider_user)
            .await?;
        let fallback = Some((access_token.to_string(), user_from_provider(provider_user)));
        self.persist(response, fallback)
    }

    /// Local only; observers of the session see the change immediately.
    pub fn logout(&self) -> Result<(), FetchError> {
        self.sessions.clear()?;
        Ok(())
    }

    pub async fn profile(&self) -> Result<Profile, FetchError> {
        self.api.profile().await
    }

    fn persist(
        &self,
        response: AuthResponse,
        fallback: Option<(String, Option<User>)>,
    ) -> Result<Session, FetchError> {
        let (fallback_token, fallback_user) = fallback.unzip();
        let token = response
            .access_token
            .filter(|t| !t.is_empty())
            .or(fallback_token)
            .ok_or_else(|| FetchError::Status {
                status: 200,
                detail: "Login response did not include a token".to_string(),
            })?;
        let user = response.user.or(fallback_user.flatten());

        self.sessions.save(&token, user.as_ref())?;
        info!(
            "Signed in as {}",
            user.as_ref()
                .and_then(|u| u.email.as_deref())
                .unwrap_or("unknown user")
        );
        Ok(Session {
            token: Some(token),
            user,
        })
    }
}

/// Maps the identity provider's user object onto the stored profile shape.
fn user_from_provider(value: &Value) -> Option<User> {
    let id = match value.get("id")? {
        Value::String(s) => Some(UserId::Text(s.clone())),
        Value::Number(n) => n.as_i64().map(UserId::Number),
        _ => None,
    };
    let email = value.get("email").and_then(Value::as_str).map(str::to_string);
    let name = value
        .pointer("/user_metadata/full_name")
        .or_else(|| value.pointer("/user_metadata/name"))
        .or_else(|| value.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(User { id, name, email })
}
