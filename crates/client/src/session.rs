//! Authenticated session.
//!
//! The session token is persisted under [`keys::TOKEN`]. Its claims are
//! decoded locally, without verifying the signature, to read the role and
//! the expiry; the server remains the only verifier.
//!
//! While a session is active a background task sleeps until the token
//! expires and then ends the session. The task is aborted on logout, on a
//! new login and when the [`Session`] is dropped, so no timer outlives the
//! session it belongs to.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use desh_perfume_core::TokenClaims;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::storage::{SharedStore, StorageError, keys};

/// Errors raised by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("session token has expired")]
    Expired,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Decode token claims without checking the signature or the expiry.
///
/// # Errors
///
/// Returns [`SessionError::InvalidToken`] if the token is malformed.
pub fn decode_claims(token: &str) -> Result<TokenClaims, SessionError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    let data = jsonwebtoken::decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

#[derive(Clone)]
struct ActiveSession {
    token: String,
    claims: TokenClaims,
}

type SharedState = Arc<Mutex<Option<ActiveSession>>>;

/// The signed-in user's session, if any.
pub struct Session {
    state: SharedState,
    storage: SharedStore,
    expiry_task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("claims", &self.claims())
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Restore the session persisted in `storage`.
    ///
    /// A missing, malformed or expired token yields a signed-out session
    /// and is removed from storage.
    #[must_use]
    pub fn hydrate(storage: SharedStore) -> Self {
        let mut session = Self {
            state: Arc::new(Mutex::new(None)),
            storage,
            expiry_task: None,
        };

        let token = match session.storage.get(keys::TOKEN) {
            Ok(Some(token)) => token,
            Ok(None) => return session,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored session token");
                return session;
            }
        };

        if let Err(e) = session.activate(token) {
            tracing::info!(error = %e, "Discarding stored session token");
            if let Err(e) = session.storage.remove(keys::TOKEN) {
                tracing::warn!(error = %e, "Failed to remove stored session token");
            }
        }
        session
    }

    /// Start a session from a freshly issued token.
    ///
    /// Any previous session is replaced and its expiry task cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidToken`] or [`SessionError::Expired`]
    /// if the token is unusable, or [`SessionError::Storage`] if it cannot
    /// be persisted. The previous session is kept on error.
    pub fn login(&mut self, token: String) -> Result<TokenClaims, SessionError> {
        let claims = decode_claims(&token)?;
        if claims.is_expired_at(Utc::now()) {
            return Err(SessionError::Expired);
        }
        self.storage.set(keys::TOKEN, &token)?;
        self.activate(token)?;
        tracing::info!(user_id = %claims.id, role = %claims.role, "Session started");
        Ok(claims)
    }

    /// End the session: cancel the expiry task, forget the token and remove
    /// it from storage.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the stored token cannot be
    /// removed; in-memory state is cleared regardless.
    pub fn logout(&mut self) -> Result<(), SessionError> {
        if let Some(task) = self.expiry_task.take() {
            task.abort();
        }
        *lock(&self.state) = None;
        self.storage.remove(keys::TOKEN)?;
        Ok(())
    }

    /// The raw bearer token.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        lock(&self.state).as_ref().map(|s| s.token.clone())
    }

    #[must_use]
    pub fn claims(&self) -> Option<TokenClaims> {
        lock(&self.state).as_ref().map(|s| s.claims.clone())
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        lock(&self.state).is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        lock(&self.state)
            .as_ref()
            .is_some_and(|s| s.claims.role.is_admin())
    }

    fn activate(&mut self, token: String) -> Result<(), SessionError> {
        let claims = decode_claims(&token)?;
        let remaining = claims.exp - Utc::now().timestamp();
        if remaining <= 0 {
            return Err(SessionError::Expired);
        }

        if let Some(task) = self.expiry_task.take() {
            task.abort();
        }
        *lock(&self.state) = Some(ActiveSession {
            token: token.clone(),
            claims,
        });

        let delay = Duration::from_secs(remaining.unsigned_abs());
        self.expiry_task = schedule_expiry(
            Arc::clone(&self.state),
            Arc::clone(&self.storage),
            token,
            delay,
        );
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(task) = self.expiry_task.take() {
            task.abort();
        }
    }
}

fn lock(state: &SharedState) -> std::sync::MutexGuard<'_, Option<ActiveSession>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Spawn the task that ends the session holding `token` after `delay`.
///
/// Without a Tokio runtime nothing is scheduled; the expiry is still
/// enforced on the next [`Session::hydrate`].
fn schedule_expiry(
    state: SharedState,
    storage: SharedStore,
    token: String,
    delay: Duration,
) -> Option<JoinHandle<()>> {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        tracing::warn!("No async runtime, session expiry will not be scheduled");
        return None;
    };

    Some(handle.spawn(async move {
        tokio::time::sleep(delay).await;

        let mut current = lock(&state);
        if current.as_ref().is_some_and(|s| s.token == token) {
            *current = None;
            drop(current);
            tracing::info!("Session expired");
            if let Err(e) = storage.remove(keys::TOKEN) {
                tracing::warn!(error = %e, "Failed to remove expired session token");
            }
        }
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use desh_perfume_core::{Email, Role, UserId};
    use jsonwebtoken::{EncodingKey, Header};

    use super::*;
    use crate::storage::MemoryStore;

    pub(crate) fn token_expiring_in(secs: i64, role: Role) -> String {
        let claims = TokenClaims {
            id: UserId::new(1),
            email: Email::parse("shopper@example.com").unwrap(),
            role,
            exp: Utc::now().timestamp() + secs,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"server-side-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_decode_ignores_signature() {
        let token = token_expiring_in(60, Role::Admin);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.role, Role::Admin);
        assert!(decode_claims("not.a.token").is_err());
    }

    #[tokio::test]
    async fn test_login_persists_token() {
        let storage = MemoryStore::shared();
        let mut session = Session::hydrate(Arc::clone(&storage));
        assert!(!session.is_authenticated());

        let token = token_expiring_in(3600, Role::User);
        session.login(token.clone()).unwrap();
        assert!(session.is_authenticated());
        assert!(!session.is_admin());
        assert_eq!(storage.get(keys::TOKEN).unwrap(), Some(token));
    }

    #[tokio::test]
    async fn test_hydrate_restores_valid_token() {
        let storage = MemoryStore::shared();
        storage
            .set(keys::TOKEN, &token_expiring_in(3600, Role::Admin))
            .unwrap();
        let session = Session::hydrate(storage);
        assert!(session.is_admin());
    }

    #[tokio::test]
    async fn test_hydrate_discards_expired_token() {
        let storage = MemoryStore::shared();
        storage
            .set(keys::TOKEN, &token_expiring_in(-10, Role::User))
            .unwrap();
        let session = Session::hydrate(Arc::clone(&storage));
        assert!(!session.is_authenticated());
        assert_eq!(storage.get(keys::TOKEN).unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_rejects_expired_token() {
        let mut session = Session::hydrate(MemoryStore::shared());
        assert!(matches!(
            session.login(token_expiring_in(-10, Role::User)),
            Err(SessionError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_logout_clears_storage() {
        let storage = MemoryStore::shared();
        let mut session = Session::hydrate(Arc::clone(&storage));
        session.login(token_expiring_in(3600, Role::User)).unwrap();

        session.logout().unwrap();
        assert!(!session.is_authenticated());
        assert_eq!(storage.get(keys::TOKEN).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_ends_at_expiry() {
        let storage = MemoryStore::shared();
        let mut session = Session::hydrate(Arc::clone(&storage));
        session.login(token_expiring_in(60, Role::User)).unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(session.is_authenticated());

        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;
        assert!(!session.is_authenticated());
        assert_eq!(storage.get(keys::TOKEN).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_cancels_expiry_task() {
        let storage = MemoryStore::shared();
        let mut session = Session::hydrate(Arc::clone(&storage));
        session.login(token_expiring_in(60, Role::User)).unwrap();
        session.logout().unwrap();

        // A new session must not be ended by the old timer
        let fresh = token_expiring_in(3600, Role::User);
        session.login(fresh.clone()).unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;
        assert_eq!(session.token(), Some(fresh));
    }
}
