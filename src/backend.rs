//! Per-request load and finalization for both storage modes.

use std::sync::Arc;

use serde_json::Map;
use tower_cookies::Cookies;

use crate::{
    Id, Session,
    config::SessionConfig,
    error::{Error, Result},
    format,
    jar::CookieJar,
    session::Contents,
    store::{SessionStore, Store},
};

/// A session loaded at the start of a request, together with what is needed to finalize it.
#[derive(Debug)]
pub(crate) struct Loaded {
    session: Session,
    mode: Mode,
}

#[derive(Debug)]
enum Mode {
    CookieBacked(CookieBacked),
    StoreBacked(StoreBacked),
}

/// The cookie is the store.
#[derive(Debug)]
struct CookieBacked {
    /// The cookie value exactly as received.
    previous: Option<String>,
}

/// The cookie only carries the id.
#[derive(Debug)]
struct StoreBacked {
    store: Arc<dyn SessionStore>,
    /// The payload exactly as loaded, `{}` when the store had no entry.
    previous: String,
}

const EMPTY_PAYLOAD: &str = "{}";

impl Loaded {
    /// Read the session cookie and, for store-backed sessions, the stored payload.
    pub(crate) async fn load(
        config: &SessionConfig,
        jar: &dyn CookieJar,
        cookies: &Cookies,
    ) -> Result<Self> {
        let raw = jar
            .get(cookies, &config.cookie_name, &config.cookie)?
            .map(|cookie| cookie.value().to_owned());
        let decoded = raw
            .as_deref()
            .map(format::decode_cookie)
            .unwrap_or_default();

        let (id, is_new) = match decoded.id {
            Some(id) => (id, false),
            None => (Id::generate(), true),
        };

        match &config.store {
            Store::Cookie => {
                tracing::debug!(is_new, "loaded cookie-backed session");
                Ok(Self {
                    session: Session::new(id, is_new, decoded.data),
                    mode: Mode::CookieBacked(CookieBacked { previous: raw }),
                })
            }
            Store::External(store) => {
                let previous = store
                    .load(&id)
                    .await?
                    .unwrap_or_else(|| EMPTY_PAYLOAD.to_owned());
                let data = format::decode_payload(&previous);
                tracing::debug!(is_new, "loaded store-backed session");

                Ok(Self {
                    session: Session::new(id, is_new, data),
                    mode: Mode::StoreBacked(StoreBacked {
                        store: store.clone(),
                        previous,
                    }),
                })
            }
        }
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    /// Persist or remove the session, whichever the handler asked for.
    pub(crate) async fn finalize(
        self,
        config: &SessionConfig,
        jar: &dyn CookieJar,
        cookies: &Cookies,
    ) -> Result<()> {
        match self.session.snapshot() {
            Contents::Rejected(kind) => Err(Error::InvalidSession { kind }),
            Contents::Destroyed => self.remove(config, jar, cookies).await,
            Contents::Present(data) => self.save(data, config, jar, cookies).await,
        }
    }

    async fn save(
        self,
        data: Map<String, serde_json::Value>,
        config: &SessionConfig,
        jar: &dyn CookieJar,
        cookies: &Cookies,
    ) -> Result<()> {
        let id = self.session.id();
        let is_new = self.session.is_new();

        if is_new && data.is_empty() {
            tracing::debug!("new session left empty, nothing to save");
            return Ok(());
        }

        match self.mode {
            Mode::CookieBacked(CookieBacked { previous }) => {
                let value = format::encode_cookie(id, &data)?;
                if previous.as_deref() == Some(value.as_str()) {
                    return Ok(());
                }
                check_size(config, &value)?;
                tracing::debug!(is_new, "writing session cookie");
                jar.set(cookies, config.build_cookie(value), &config.cookie)
            }
            Mode::StoreBacked(StoreBacked { store, previous }) => {
                let payload = format::encode_payload(&data)?;
                let cookie_value = if is_new {
                    let value = format::encode_id_cookie(id)?;
                    check_size(config, &value)?;
                    Some(value)
                } else {
                    None
                };

                if payload != previous {
                    tracing::debug!(is_new, "saving session to store");
                    store.save(id, &payload).await?;
                }
                match cookie_value {
                    Some(value) => {
                        jar.set(cookies, config.build_cookie(value), &config.cookie)
                    }
                    None => Ok(()),
                }
            }
        }
    }

    async fn remove(
        self,
        config: &SessionConfig,
        jar: &dyn CookieJar,
        cookies: &Cookies,
    ) -> Result<()> {
        if let Mode::StoreBacked(StoreBacked { store, .. }) = &self.mode {
            store.remove(self.session.id()).await?;
        }
        tracing::debug!("expiring session cookie");
        jar.remove(cookies, config.removal_cookie(), &config.cookie)
    }
}

fn check_size(config: &SessionConfig, value: &str) -> Result<()> {
    if value.len() > config.max_cookie_bytes {
        return Err(Error::CookieTooLarge {
            size: value.len(),
            max: config.max_cookie_bytes,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tower_cookies::Cookie;

    use super::*;
    use crate::{CookieOptions, MemoryStore, jar::PlaintextJar};

    fn plaintext_config() -> SessionConfig {
        SessionConfig::default()
            .with_cookie_options(CookieOptions::default().with_signed(false))
    }

    fn incoming(value: &str) -> Cookies {
        let cookies = Cookies::default();
        cookies.add(Cookie::new(crate::DEFAULT_COOKIE_NAME, value.to_owned()));
        cookies
    }

    fn written(cookies: &Cookies) -> Option<String> {
        cookies
            .get(crate::DEFAULT_COOKIE_NAME)
            .map(|cookie| cookie.value().to_owned())
    }

    #[tokio::test]
    async fn unchanged_cookie_is_not_rewritten() {
        let config = plaintext_config();
        let raw = r#"{"_sid":"abc","message":"hello"}"#;
        let cookies = incoming(raw);

        let loaded = Loaded::load(&config, &PlaintextJar, &cookies)
            .await
            .expect("load succeeds");
        assert!(!loaded.session().is_new());
        assert_eq!(loaded.session().id().as_str(), "abc");

        // Replace the incoming cookie with a marker so a write would be visible.
        cookies.add(Cookie::new(crate::DEFAULT_COOKIE_NAME, "marker"));
        loaded
            .finalize(&config, &PlaintextJar, &cookies)
            .await
            .expect("finalize succeeds");

        assert_eq!(written(&cookies).as_deref(), Some("marker"));
    }

    #[tokio::test]
    async fn handler_cannot_forge_the_id() {
        let config = plaintext_config();
        let cookies = incoming(r#"{"_sid":"abc","a":1}"#);

        let loaded = Loaded::load(&config, &PlaintextJar, &cookies)
            .await
            .expect("load succeeds");
        loaded.session().insert_value("_sid", json!("forged"));
        loaded.session().remove_value("a");
        loaded
            .finalize(&config, &PlaintextJar, &cookies)
            .await
            .expect("finalize succeeds");

        assert_eq!(written(&cookies).as_deref(), Some(r#"{"_sid":"abc"}"#));
    }

    #[tokio::test]
    async fn oversized_cookie_is_rejected_before_writing() {
        let config = plaintext_config().with_max_cookie_bytes(16);
        let cookies = Cookies::default();

        let loaded = Loaded::load(&config, &PlaintextJar, &cookies)
            .await
            .expect("load succeeds");
        loaded
            .session()
            .insert_value("message", json!("far too long for sixteen bytes"));
        let err = loaded
            .finalize(&config, &PlaintextJar, &cookies)
            .await
            .expect_err("finalize fails");

        assert!(matches!(err, Error::CookieTooLarge { max: 16, .. }));
        assert!(written(&cookies).is_none());
    }

    #[tokio::test]
    async fn store_backed_session_ignores_cookie_payload() {
        let store = MemoryStore::new();
        let id = Id::parse("abc").expect("id is valid");
        store
            .save(&id, r#"{"message":"from store"}"#)
            .await
            .expect("save succeeds");
        let config = plaintext_config().with_store(Store::external(store));
        let cookies = incoming(r#"{"_sid":"abc","message":"from cookie"}"#);

        let loaded = Loaded::load(&config, &PlaintextJar, &cookies)
            .await
            .expect("load succeeds");

        assert_eq!(
            loaded.session().get_value("message"),
            Some(json!("from store"))
        );
    }

    #[tokio::test]
    async fn rejected_session_fails_without_writes() {
        let config = plaintext_config();
        let cookies = Cookies::default();

        let loaded = Loaded::load(&config, &PlaintextJar, &cookies)
            .await
            .expect("load succeeds");
        loaded.session().replace(json!("asdf"));
        let err = loaded
            .finalize(&config, &PlaintextJar, &cookies)
            .await
            .expect_err("finalize fails");

        assert!(matches!(err, Error::InvalidSession { kind: "string" }));
        assert!(written(&cookies).is_none());
    }
}
