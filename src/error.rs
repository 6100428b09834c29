use std::error::Error as StdError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that abort session handling for a request.
///
/// The middleware never hands these to the client; it logs them and answers with an empty
/// `500 Internal Server Error` instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Signed or private cookies were requested but no keys were configured.
    #[error("cookie signing is enabled but no keys are configured")]
    MissingSigningKeys,

    /// The session store failed to load, save or remove a session.
    #[error("session store error: {0}")]
    Store(#[source] Box<dyn StdError + Send + Sync>),

    /// Session data could not be converted to or from JSON.
    #[error("session data is not representable as JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The encoded session does not fit into a cookie.
    #[error("session cookie value exceeds max_cookie_bytes ({size} > {max})")]
    CookieTooLarge { size: usize, max: usize },

    /// A handler replaced the session with something that is neither an object nor falsy.
    #[error("session must be an object or a falsy value, got {kind}")]
    InvalidSession { kind: &'static str },
}

impl Error {
    /// Wrap a backend error raised by a [`SessionStore`](crate::SessionStore) implementation.
    pub fn store<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self::Store(err.into())
    }
}
