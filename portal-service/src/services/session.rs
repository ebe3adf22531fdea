use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::RngCore;
use std::sync::Arc;

use super::error::ServiceError;
use super::redis::SessionStore;
use crate::models::SessionData;

pub const SESSION_COOKIE: &str = "portal_session";

/// Server-side sessions keyed by a random id carried in an HttpOnly cookie.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    ttl_seconds: u64,
    secure_cookie: bool,
}

/// Session loaded for the current request.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub data: SessionData,
    /// False when no cookie was presented or the stored session was gone.
    pub existing: bool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, ttl_seconds: u64, secure_cookie: bool) -> Self {
        Self {
            store,
            ttl_seconds,
            secure_cookie,
        }
    }

    fn key(id: &str) -> String {
        format!("session:{}", id)
    }

    fn new_id() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Load the session named by the cookie, or start a fresh one.
    pub async fn load(&self, jar: &CookieJar) -> Result<Session, ServiceError> {
        let Some(id) = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| v.len() == 64 && v.bytes().all(|b| b.is_ascii_hexdigit()))
        else {
            return Ok(self.fresh());
        };

        match self.store.get(&Self::key(&id)).await? {
            Some(raw) => match serde_json::from_str::<SessionData>(&raw) {
                Ok(data) => Ok(Session {
                    id,
                    data,
                    existing: true,
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable session payload");
                    Ok(self.fresh())
                }
            },
            None => Ok(self.fresh()),
        }
    }

    fn fresh(&self) -> Session {
        Session {
            id: Self::new_id(),
            data: SessionData::default(),
            existing: false,
        }
    }

    /// Persist the session and attach its cookie to the jar.
    pub async fn save(&self, jar: CookieJar, session: &Session) -> Result<CookieJar, ServiceError> {
        let payload = serde_json::to_string(&session.data)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode session: {}", e)))?;
        self.store
            .put(&Self::key(&session.id), &payload, self.ttl_seconds)
            .await?;
        Ok(jar.add(self.cookie(session.id.clone())))
    }

    /// Replace the session id while keeping its data. Used on login so a
    /// pre-authentication id can never be reused.
    pub async fn rotate(&self, session: &mut Session) -> Result<(), ServiceError> {
        if session.existing {
            self.store.delete(&Self::key(&session.id)).await?;
        }
        session.id = Self::new_id();
        session.existing = false;
        Ok(())
    }

    pub async fn destroy(&self, jar: CookieJar, session: &Session) -> Result<CookieJar, ServiceError> {
        self.store.delete(&Self::key(&session.id)).await?;
        Ok(jar.remove(Cookie::build(SESSION_COOKIE).path("/")))
    }

    fn cookie(&self, id: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(SESSION_COOKIE, id);
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.secure_cookie);
        cookie.set_path("/");
        cookie
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        self.store.health_check().await.map_err(ServiceError::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::redis::MockSessionStore;

    fn manager() -> (SessionManager, Arc<MockSessionStore>) {
        let store = Arc::new(MockSessionStore::new());
        (SessionManager::new(store.clone(), 3600, false), store)
    }

    #[tokio::test]
    async fn missing_cookie_starts_a_fresh_session() {
        let (sessions, _) = manager();
        let session = sessions.load(&CookieJar::new()).await.unwrap();
        assert!(!session.existing);
        assert_eq!(session.data, SessionData::default());
        assert_eq!(session.id.len(), 64);
    }

    #[tokio::test]
    async fn saved_session_is_loaded_from_cookie() {
        let (sessions, _) = manager();
        let mut session = sessions.load(&CookieJar::new()).await.unwrap();
        session.data.user_id = Some("u1".to_string());
        let jar = sessions.save(CookieJar::new(), &session).await.unwrap();

        let cookie = jar.get(SESSION_COOKIE).unwrap();
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));

        let loaded = sessions.load(&jar).await.unwrap();
        assert!(loaded.existing);
        assert_eq!(loaded.data.user_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn rotate_drops_the_old_id() {
        let (sessions, store) = manager();
        let mut session = sessions.load(&CookieJar::new()).await.unwrap();
        let jar = sessions.save(CookieJar::new(), &session).await.unwrap();
        session.existing = true;
        let old_id = session.id.clone();

        sessions.rotate(&mut session).await.unwrap();
        assert_ne!(session.id, old_id);
        assert!(store.is_empty());

        let reloaded = sessions.load(&jar).await.unwrap();
        assert!(!reloaded.existing);
    }
}
