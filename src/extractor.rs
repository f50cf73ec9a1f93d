//! Extracts what the gate looks at from an incoming request.
//!
//! [`GateRequest`] gathers all three inputs at once:
//! - the session id, from the session cookie
//! - the CSRF token, from the query string
//! - the message, from the `{message}` path segment
//!
//! None of them are required to be present. Missing values are decided on by
//! the [`Gate`](crate::Gate), never by the extractor.

use std::collections::HashMap;
use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::web::Query;
use actix_web::{FromRequest, HttpRequest};
use serde::Deserialize;

use crate::config::{GateConfig, DEFAULT_SESSION_COOKIE_NAME, DEFAULT_TOKEN_PARAM_NAME};

/// The inputs of a single request, as seen by the gate.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct GateRequest {
    session: Option<String>,
    token: Option<String>,
    message: Option<String>,
}

impl GateRequest {
    /// Creates a request from its parts.
    #[must_use]
    pub const fn new(
        session: Option<String>,
        token: Option<String>,
        message: Option<String>,
    ) -> Self {
        Self {
            session,
            token,
            message,
        }
    }

    /// The presented session id, if any.
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// The presented CSRF token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The message from the path. Empty on routes without one.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }

    /// A token repeated in the query string keeps its last value.
    fn from_http_request(req: &HttpRequest) -> Self {
        let (cookie_name, token_param) = req.app_data::<GateConfig>().map_or(
            (DEFAULT_SESSION_COOKIE_NAME, DEFAULT_TOKEN_PARAM_NAME),
            |config| (config.session_cookie_name(), config.token_param_name()),
        );

        let session = req.cookie(cookie_name).map(|c| c.value().to_owned());

        let token = Query::<HashMap<String, String>>::from_query(req.query_string())
            .ok()
            .and_then(|query| query.into_inner().remove(token_param));

        let message = req
            .match_info()
            .load::<MessagePath>()
            .ok()
            .map(|path| path.message);

        Self {
            session,
            token,
            message,
        }
    }
}

#[derive(Deserialize)]
struct MessagePath {
    message: String,
}

impl FromRequest for GateRequest {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(Self::from_http_request(req)))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    use actix_web::http::header;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn extract_everything() -> Result<(), Box<dyn Error>> {
        let req = TestRequest::post()
            .uri("/example/secure/hello?token=sometoken")
            .insert_header((header::COOKIE, "SESSION_ID=somesession"))
            .param("message", "hello")
            .to_http_request();
        let extracted = GateRequest::extract(&req).await?;

        assert_eq!(extracted.session(), Some("somesession"));
        assert_eq!(extracted.token(), Some("sometoken"));
        assert_eq!(extracted.message(), "hello");
        Ok(())
    }

    #[actix_web::test]
    async fn missing_parts_are_none() -> Result<(), Box<dyn Error>> {
        let req = TestRequest::get()
            .uri("/example")
            .insert_header(("fake", "sometoken"))
            .to_http_request();
        let extracted = GateRequest::extract(&req).await?;

        assert_eq!(extracted, GateRequest::default());
        assert_eq!(extracted.message(), "");
        Ok(())
    }

    #[actix_web::test]
    async fn token_in_cookie_is_not_a_token() -> Result<(), Box<dyn Error>> {
        let req = TestRequest::post()
            .uri("/example/secure/hello")
            .insert_header((header::COOKIE, "SESSION_ID=s; token=t"))
            .to_http_request();
        let extracted = GateRequest::extract(&req).await?;

        assert_eq!(extracted.session(), Some("s"));
        assert_eq!(extracted.token(), None);
        Ok(())
    }

    #[actix_web::test]
    async fn custom_names_come_from_config() -> Result<(), Box<dyn Error>> {
        let req = TestRequest::post()
            .uri("/example/secure/hello?csrf=abc&token=ignored")
            .insert_header((header::COOKIE, "SID=xyz; SESSION_ID=ignored"))
            .app_data(GateConfig::new().cookie_name("SID").token_param("csrf"))
            .to_http_request();
        let extracted = GateRequest::extract(&req).await?;

        assert_eq!(extracted.session(), Some("xyz"));
        assert_eq!(extracted.token(), Some("abc"));
        Ok(())
    }
}
