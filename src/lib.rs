#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery, clippy::cargo, missing_docs)]

//! This crate serves a small message board that demonstrates Cross-Site
//! Request Forgery, with a vulnerable and a protected write path side by
//! side.
//!
//! The primary entry point is the [`Gate`], which holds a session id and a
//! CSRF token generated once at startup, and [`routes::configure`], which
//! mounts the HTTP surface under `/example`.
//!
//! ## The Flow
//!
//! - The client calls `GET /example/login`. The response body is the CSRF
//! token, and a `Set-Cookie` header carries the session id.
//! - The client writes a message. On `/example/{message}` the session cookie
//! is all that is checked. On `/example/secure/{message}` the CSRF token must
//! also be passed as the `token` query parameter.
//!
//! The browser attaches the session cookie to any request for this origin,
//! including ones triggered by another site. A page on another origin can
//! therefore write through `/example/{message}`, but it cannot learn the token
//! and so cannot write through `/example/secure/{message}`. The demo pages
//! under `/example/frontend-*` show both cases.
//!
//! ## Not a Real Defense
//!
//! Both secrets are shared by every client and are never rotated or expired.
//! A real deployment would bind the token to the session and rotate it; see
//! the [Owasp Cheat Sheet] for proper mitigations.
//!
//! ## Usage
//!
//! ```
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use actix_web::App;
//! use csrf_demo::{routes, Gate, GateConfig, SqliteStore};
//!
//! let store = SqliteStore::connect("sqlite::memory:", 1).await?;
//! store.migrate().await?;
//! let gate = Gate::from_entropy(GateConfig::default(), store)?;
//! let app = App::new().configure(routes::configure(gate));
//! # Ok(())
//! # }
//! ```
//!
//! [Owasp Cheat sheet]: https://cheatsheetseries.owasp.org/cheatsheets/Cross-Site_Request_Forgery_Prevention_Cheat_Sheet.html

pub mod config;
pub mod extractor;
pub mod gate;
pub mod routes;
pub mod store;
mod token_rng;

pub use crate::config::{ConfigError, GateConfig, ServerConfig};
pub use crate::extractor::GateRequest;
pub use crate::gate::{Authenticated, Authorized, Gate, GateError, Login};
pub use crate::store::{Message, MessageStore, SqliteStore, StoreError};
pub use crate::token_rng::{Secrets, TokenRng};
