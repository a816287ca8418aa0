use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::models::{Session, User};
use crate::store::local_store::{AUTH_TOKEN_KEY, USER_DATA_KEY};
use crate::store::{LocalStore, StoreError};

/// Persisted `{token, user}` pair with change notification.
///
/// Observers hold a [`watch::Receiver`] and see login and logout as soon as
/// they happen in this process. Changes made by another process sharing the
/// state file are picked up by [`SessionStore::refresh`].
#[derive(Debug, Clone)]
pub struct SessionStore {
    store: LocalStore,
    tx: Arc<watch::Sender<Session>>,
}

impl SessionStore {
    pub fn new(store: LocalStore) -> Self {
        let initial = read_session(&store);
        let (tx, _rx) = watch::channel(initial);
        Self {
            store,
            tx: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Current session as persisted on disk.
    pub fn current(&self) -> Session {
        read_session(&self.store)
    }

    pub fn token(&self) -> Option<String> {
        self.current().token.filter(|t| !t.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Re-reads the state file and notifies observers if it changed.
    pub fn refresh(&self) -> Session {
        let session = self.current();
        self.tx.send_if_modified(|current| {
            if *current == session {
                false
            } else {
                *current = session.clone();
                true
            }
        });
        session
    }

    pub fn save(&self, token: &str, user: Option<&User>) -> Result<(), StoreError> {
        self.store.set(AUTH_TOKEN_KEY, token)?;
        match user {
            Some(user) => self.store.set_json(USER_DATA_KEY, user)?,
            None => self.store.remove(USER_DATA_KEY)?,
        }
        info!("Session stored");
        self.tx.send_replace(Session {
            token: Some(token.to_string()),
            user: user.cloned(),
        });
        Ok(())
    }

    /// Local logout; no backend call is involved.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove_many(&[AUTH_TOKEN_KEY, USER_DATA_KEY])?;
        info!("Session cleared");
        self.tx.send_replace(Session::default());
        Ok(())
    }
}

fn read_session(store: &LocalStore) -> Session {
    let token = match store.get(AUTH_TOKEN_KEY) {
        Ok(token) => token.filter(|t| !t.is_empty()),
        Err(e) => {
            warn!("Could not read session token: {}", e);
            None
        }
    };
    let user = match store.get_json::<User>(USER_DATA_KEY) {
        Ok(user) => user,
        Err(e) => {
            warn!("Ignoring unreadable user profile: {}", e);
            None
        }
    };
    Session { token, user }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;
    use tempfile::tempdir;

    fn user() -> User {
        User {
            id: Some(UserId::Number(7)),
            name: Some("Asha".to_string()),
            email: Some("asha@example.in".to_string()),
        }
    }

    #[tokio::test]
    async fn test_save_and_clear_notify_observers() {
        let dir = tempdir().unwrap();
        let sessions = SessionStore::new(LocalStore::open(dir.path().join("state.json")));
        let mut rx = sessions.subscribe();
        assert!(!rx.borrow().is_authenticated());

        sessions.save("token-1", Some(&user())).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().token.as_deref(), Some("token-1"));
        assert_eq!(sessions.current().user, Some(user()));

        sessions.clear().unwrap();
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().is_authenticated());
        assert_eq!(sessions.current(), Session::default());
    }

    #[tokio::test]
    async fn test_refresh_picks_up_other_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let first = SessionStore::new(LocalStore::open(&path));
        let second = SessionStore::new(LocalStore::open(&path));
        let mut rx = first.subscribe();

        second.save("from-other-tab", None).unwrap();
        let refreshed = first.refresh();
        assert_eq!(refreshed.token.as_deref(), Some("from-other-tab"));
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_authenticated());
    }

    #[test]
    fn test_corrupt_user_data_is_ignored() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("state.json"));
        store.set(AUTH_TOKEN_KEY, "t").unwrap();
        store.set(USER_DATA_KEY, "{broken").unwrap();
        let session = SessionStore::new(store).current();
        assert_eq!(session.token.as_deref(), Some("t"));
        assert_eq!(session.user, None);
    }
}
