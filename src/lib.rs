//! Request-scoped sessions for `tower`.
//!
//! [`SessionManagerLayer`] attaches a [`Session`] to every request, hands it to the inner service
//! through the request extensions (or the axum extractor), and persists it after the inner service
//! has responded. Nothing is written unless the session contents actually changed.
//!
//! Two storage modes are available, fixed per layer:
//!
//! - **Cookie-backed** (default, [`Store::Cookie`]): the cookie holds the whole session as a JSON
//!   object with the session id under `_sid`.
//! - **Store-backed** ([`Store::External`]): the cookie holds only `{"_sid": ...}` and the data lives
//!   in a [`SessionStore`].
//!
//! Assigning a falsy value with [`Session::replace`] (or calling [`Session::destroy`]) ends the
//! session: the cookie is expired and a store entry is removed.
//!
//! # Security
//! Cookies are signed by default and a signed layer without keys refuses to serve requests. Turning
//! signing off with [`CookieOptions::with_signed`] in cookie-backed mode lets clients edit their own
//! session; only do that for debugging.

mod backend;
mod config;
mod error;
pub mod format;
mod id;
mod jar;
pub mod layer;
mod session;
mod store;

pub use tower_cookies::Key;
pub use tower_cookies::cookie::SameSite;

pub use crate::config::{
    CookieOptions, DEFAULT_COOKIE_NAME, DEFAULT_MAX_COOKIE_BYTES, RawCookieOptions,
    RawSessionConfig, SameSitePolicy, SessionConfig,
};
pub use crate::error::{Error, Result};
pub use crate::id::{ID_LENGTH, Id};
pub use crate::jar::{CookieJar, PlaintextJar, SignedJar};
pub use crate::layer::{SessionManager, SessionManagerLayer};
pub use crate::session::Session;
pub use crate::store::{MemoryStore, SessionStore, Store};

#[cfg(feature = "private")]
pub use crate::jar::PrivateJar;
