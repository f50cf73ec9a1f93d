//! The session and anti-forgery gate.
//!
//! Every request starts out unauthenticated. A matching session cookie turns
//! it into an [`Authenticated`] request, which may read messages or, on the
//! vulnerable path, store one straight away. A matching CSRF token further
//! turns it into an [`Authorized`] request, the only way to store a message on
//! the protected path. Any mismatch ends the request with a [`GateError`].

use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::GateConfig;
use crate::extractor::GateRequest;
use crate::store::{Message, MessageStore, StoreError};
use crate::token_rng::{Secrets, TokenRng};

/// Reasons a request is turned away.
#[derive(Debug, Error)]
pub enum GateError {
    /// The session cookie is missing or does not match.
    #[error("The session cookie is missing or invalid")]
    Unauthorized,
    /// The session is valid, but the CSRF token is missing or does not match.
    #[error("The CSRF token is missing or invalid")]
    Forbidden,
    /// The message store failed.
    #[error("The message store failed: {0}")]
    Persistence(#[from] StoreError),
}

impl ResponseError for GateError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::Unauthorized => warn!("Rejected request: {}", self),
            Self::Forbidden => warn!("Potential CSRF attack: {}", self),
            Self::Persistence(e) => error!("Failed to access message store: {}", e),
        }
        HttpResponse::build(self.status_code()).finish()
    }
}

/// What login hands back: the CSRF token for the body and the session cookie.
#[derive(Clone, Debug)]
pub struct Login {
    /// The CSRF token.
    pub token: String,
    /// The session cookie to set.
    pub cookie: Cookie<'static>,
}

/// Holds the process secrets and the message store. Cheap to clone; clones
/// share the same secrets.
#[derive(Clone)]
pub struct Gate {
    inner: Arc<Inner>,
}

struct Inner {
    secrets: Secrets,
    config: GateConfig,
    store: Box<dyn MessageStore>,
}

impl Gate {
    /// Creates a gate with already generated secrets.
    pub fn new<S>(config: GateConfig, secrets: Secrets, store: S) -> Self
    where
        S: MessageStore + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                secrets,
                config,
                store: Box::new(store),
            }),
        }
    }

    /// Creates a gate whose secrets are drawn from `rng`.
    ///
    /// # Errors
    ///
    /// Returns an error if the RNG fails.
    pub fn with_rng<S, Rng>(config: GateConfig, rng: &mut Rng, store: S) -> Result<Self, rand::Error>
    where
        S: MessageStore + 'static,
        Rng: TokenRng,
    {
        Ok(Self::new(config, Secrets::generate(rng)?, store))
    }

    /// Creates a gate whose secrets are drawn from an entropy-seeded RNG.
    ///
    /// # Errors
    ///
    /// Returns an error if the RNG fails.
    pub fn from_entropy<S>(config: GateConfig, store: S) -> Result<Self, rand::Error>
    where
        S: MessageStore + 'static,
    {
        Self::with_rng(config, &mut StdRng::from_entropy(), store)
    }

    /// The cookie and parameter settings.
    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.inner.config
    }

    /// Reveals the CSRF token and the session cookie. Always the same pair for
    /// the lifetime of the gate.
    #[must_use]
    pub fn login(&self) -> Login {
        let secrets = &self.inner.secrets;
        info!("Issued session cookie and CSRF token");
        Login {
            token: secrets.csrf_token().to_owned(),
            cookie: self.inner.config.session_cookie(secrets.session_id()),
        }
    }

    /// Checks the session cookie.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Unauthorized`] if `session` isn't the session id.
    pub fn authenticate(&self, session: Option<&str>) -> Result<Authenticated<'_>, GateError> {
        if self.inner.secrets.session_matches(session) {
            Ok(Authenticated { gate: self })
        } else {
            Err(GateError::Unauthorized)
        }
    }

    /// Lists every stored message for an authenticated request.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Unauthorized`] for a bad session, or
    /// [`GateError::Persistence`] if the store fails.
    pub async fn read(&self, req: &GateRequest) -> Result<Vec<Message>, GateError> {
        self.authenticate(req.session())?.messages().await
    }

    /// Stores the request's message on a valid session alone. This is the
    /// forgeable path: a browser attaches the cookie to cross-site requests by
    /// itself.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Unauthorized`] for a bad session, or
    /// [`GateError::Persistence`] if the store fails.
    pub async fn write_unprotected(&self, req: &GateRequest) -> Result<Message, GateError> {
        self.authenticate(req.session())?
            .post_unchecked(req.message())
            .await
    }

    /// Stores the request's message only if both the session cookie and the
    /// CSRF token match, checked in that order.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Unauthorized`] for a bad session regardless of the
    /// token, [`GateError::Forbidden`] for a bad token, or
    /// [`GateError::Persistence`] if the store fails.
    pub async fn write_protected(&self, req: &GateRequest) -> Result<Message, GateError> {
        self.authenticate(req.session())?
            .authorize(req.token())?
            .post(req.message())
            .await
    }

    async fn store(&self, text: &str) -> Result<Message, GateError> {
        let message = self.inner.store.insert(text).await?;
        debug!(id = message.id, "Stored message");
        Ok(message)
    }
}

/// A request that presented the session cookie.
#[derive(Clone, Copy)]
pub struct Authenticated<'g> {
    gate: &'g Gate,
}

impl<'g> Authenticated<'g> {
    /// Checks the CSRF token.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Forbidden`] if `token` isn't the CSRF token.
    pub fn authorize(self, token: Option<&str>) -> Result<Authorized<'g>, GateError> {
        if self.gate.inner.secrets.token_matches(token) {
            Ok(Authorized { gate: self.gate })
        } else {
            Err(GateError::Forbidden)
        }
    }

    /// Every stored message, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Persistence`] if the store fails.
    pub async fn messages(&self) -> Result<Vec<Message>, GateError> {
        Ok(self.gate.inner.store.list().await?)
    }

    /// Stores `text` without looking at any CSRF token.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Persistence`] if the store fails.
    pub async fn post_unchecked(self, text: &str) -> Result<Message, GateError> {
        self.gate.store(text).await
    }
}

/// A request that presented both the session cookie and the CSRF token.
#[derive(Clone, Copy)]
pub struct Authorized<'g> {
    gate: &'g Gate,
}

impl Authorized<'_> {
    /// Stores `text`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Persistence`] if the store fails.
    pub async fn post(self, text: &str) -> Result<Message, GateError> {
        self.gate.store(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::store::SqliteStore;

    async fn gate() -> (Gate, SqliteStore) {
        let store = SqliteStore::connect("sqlite::memory:", 1)
            .await
            .expect("in-memory database to open");
        store.migrate().await.expect("migrations to apply");
        let gate = Gate::with_rng(GateConfig::default(), &mut StdRng::seed_from_u64(42), store.clone())
            .expect("rng to work");
        (gate, store)
    }

    fn request(session: Option<&str>, token: Option<&str>, message: &str) -> GateRequest {
        GateRequest::new(
            session.map(str::to_owned),
            token.map(str::to_owned),
            Some(message.to_owned()),
        )
    }

    #[actix_web::test]
    async fn login_is_idempotent() {
        let (gate, _) = gate().await;
        let first = gate.login();
        let second = gate.clone().login();
        assert_eq!(first.token, second.token);
        assert_eq!(first.cookie.value(), second.cookie.value());
        assert_ne!(first.token, first.cookie.value());
    }

    #[actix_web::test]
    async fn bad_session_is_unauthorized_regardless_of_token() {
        let (gate, _) = gate().await;
        let token = gate.login().token;

        for session in [None, Some("wrong"), Some(token.as_str())] {
            assert!(matches!(
                gate.write_protected(&request(session, Some(&token), "m")).await,
                Err(GateError::Unauthorized)
            ));
            assert!(matches!(
                gate.write_unprotected(&request(session, None, "m")).await,
                Err(GateError::Unauthorized)
            ));
            assert!(matches!(
                gate.read(&request(session, None, "")).await,
                Err(GateError::Unauthorized)
            ));
        }
    }

    #[actix_web::test]
    async fn bad_token_is_forbidden() {
        let (gate, store) = gate().await;
        let login = gate.login();
        let session = login.cookie.value();

        for token in [None, Some("wrong"), Some(session)] {
            assert!(matches!(
                gate.write_protected(&request(Some(session), token, "m")).await,
                Err(GateError::Forbidden)
            ));
        }
        assert!(store.list().await.expect("list to work").is_empty());
    }

    #[actix_web::test]
    async fn authorized_writes_are_listed() {
        let (gate, _) = gate().await;
        let login = gate.login();
        let session = login.cookie.value();

        let unprotected = gate
            .write_unprotected(&request(Some(session), None, "x"))
            .await
            .expect("cookie alone to be enough");
        let protected = gate
            .write_protected(&request(Some(session), Some(&login.token), "hello"))
            .await
            .expect("cookie and token to be enough");
        assert!(protected.id > unprotected.id);

        let messages = gate
            .read(&request(Some(session), None, ""))
            .await
            .expect("read to work");
        assert_eq!(messages, vec![unprotected, protected]);
    }

    #[actix_web::test]
    async fn store_faults_surface_as_persistence_errors() {
        let (gate, store) = gate().await;
        let login = gate.login();
        store.close().await;

        let err = gate
            .write_protected(&request(Some(login.cookie.value()), Some(&login.token), "m"))
            .await
            .expect_err("closed store to fail");
        assert!(matches!(err, GateError::Persistence(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn status_codes() {
        assert_eq!(GateError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(GateError::Forbidden.status_code(), StatusCode::FORBIDDEN);
    }
}
