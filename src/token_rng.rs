//! Secret generation for the session id and the CSRF token.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::{CryptoRng, Error, Fill, RngCore};
use subtle::ConstantTimeEq;

/// Used to generate the process secrets.
///
/// This trait is implemented for all CSRNG (Cryptographically Secure RNG)
/// types. This should not be implemented directly; instead, implement
/// [`CryptoRng`] and [`RngCore`] instead.
///
/// A generated value is 32 bytes of random data, encoded as base64 without
/// padding, which makes it safe to store as a cookie or pass as a query
/// parameter.
pub trait TokenRng: CryptoRng {
    /// Generates a secret value.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying RNG fails to generate a token.
    fn generate_token(&mut self) -> Result<String, Error>;
}

impl<Rng: CryptoRng + RngCore> TokenRng for Rng {
    fn generate_token(&mut self) -> Result<String, Error> {
        let mut buf = [0; 32];
        buf.try_fill(self)?;
        Ok(URL_SAFE_NO_PAD.encode(buf))
    }
}

/// The two process-wide secrets: the session id handed out as a cookie and
/// the CSRF token handed out in the login body.
///
/// Both are drawn once and never rotated. Every client that logs in learns
/// the same pair.
#[derive(Clone, Eq, PartialEq)]
pub struct Secrets {
    session_id: String,
    csrf_token: String,
}

impl Secrets {
    /// Draws the session id, then the CSRF token, from `rng`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying RNG fails to generate either value.
    pub fn generate<Rng: TokenRng>(rng: &mut Rng) -> Result<Self, Error> {
        let session_id = rng.generate_token()?;
        let csrf_token = rng.generate_token()?;
        Ok(Self {
            session_id,
            csrf_token,
        })
    }

    /// The session id carried by the session cookie.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The CSRF token returned by login.
    #[must_use]
    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    pub(crate) fn session_matches(&self, presented: Option<&str>) -> bool {
        matches_secret(&self.session_id, presented)
    }

    pub(crate) fn token_matches(&self, presented: Option<&str>) -> bool {
        matches_secret(&self.csrf_token, presented)
    }
}

// Never print the values themselves.
impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("session_id", &"<redacted>")
            .field("csrf_token", &"<redacted>")
            .finish()
    }
}

fn matches_secret(secret: &str, presented: Option<&str>) -> bool {
    presented.is_some_and(|value| secret.as_bytes().ct_eq(value.as_bytes()).into())
}
