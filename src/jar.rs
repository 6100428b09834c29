use std::fmt::Debug;

use tower_cookies::{Cookie, Cookies};

use crate::{config::CookieOptions, error::Result};

/// Reads and writes the session cookie on behalf of the middleware.
///
/// Implementations decide how the value is protected on the wire. A value that fails verification
/// must be reported as absent, not as an error. Every call receives the configured
/// [`CookieOptions`], including the [`extra`](CookieOptions::extra) keys the middleware itself
/// does not interpret.
pub trait CookieJar: Debug + Send + Sync + 'static {
    fn get(
        &self,
        cookies: &Cookies,
        name: &str,
        options: &CookieOptions,
    ) -> Result<Option<Cookie<'static>>>;

    fn set(
        &self,
        cookies: &Cookies,
        cookie: Cookie<'static>,
        options: &CookieOptions,
    ) -> Result<()>;

    /// Send the removal cookie built by the middleware.
    ///
    /// The removal cookie has an empty value and is sent as-is: signing or encrypting it would
    /// put a non-empty value on the wire.
    fn remove(
        &self,
        cookies: &Cookies,
        cookie: Cookie<'static>,
        _options: &CookieOptions,
    ) -> Result<()> {
        cookies.add(cookie);
        Ok(())
    }
}

/// Stores the session cookie as-is.
///
/// This offers **no tamper resistance**: a client can edit the cookie freely. Only use it with
/// store-backed sessions or for debugging.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextJar;

impl CookieJar for PlaintextJar {
    fn get(
        &self,
        cookies: &Cookies,
        name: &str,
        _options: &CookieOptions,
    ) -> Result<Option<Cookie<'static>>> {
        Ok(cookies.get(name).map(Cookie::into_owned))
    }

    fn set(
        &self,
        cookies: &Cookies,
        cookie: Cookie<'static>,
        _options: &CookieOptions,
    ) -> Result<()> {
        cookies.add(cookie);
        Ok(())
    }
}

/// Signs the session cookie.
///
/// The first key signs; every key is tried when verifying, so keys can be rotated by pushing a new
/// key to the front.
#[derive(Debug, Clone)]
pub struct SignedJar {
    keys: Vec<crate::Key>,
}

impl SignedJar {
    pub fn new<I: IntoIterator<Item = crate::Key>>(keys: I) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }
}

impl CookieJar for SignedJar {
    fn get(
        &self,
        cookies: &Cookies,
        name: &str,
        _options: &CookieOptions,
    ) -> Result<Option<Cookie<'static>>> {
        if self.keys.is_empty() {
            return Err(crate::Error::MissingSigningKeys);
        }
        Ok(self
            .keys
            .iter()
            .find_map(|key| cookies.signed(key).get(name))
            .map(Cookie::into_owned))
    }

    fn set(
        &self,
        cookies: &Cookies,
        cookie: Cookie<'static>,
        _options: &CookieOptions,
    ) -> Result<()> {
        let key = self.keys.first().ok_or(crate::Error::MissingSigningKeys)?;
        cookies.signed(key).add(cookie);
        Ok(())
    }
}

/// Encrypts the session cookie, hiding its contents from the client.
#[cfg(feature = "private")]
#[derive(Debug, Clone)]
pub struct PrivateJar {
    keys: Vec<crate::Key>,
}

#[cfg(feature = "private")]
impl PrivateJar {
    pub fn new<I: IntoIterator<Item = crate::Key>>(keys: I) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }
}

#[cfg(feature = "private")]
impl CookieJar for PrivateJar {
    fn get(
        &self,
        cookies: &Cookies,
        name: &str,
        _options: &CookieOptions,
    ) -> Result<Option<Cookie<'static>>> {
        if self.keys.is_empty() {
            return Err(crate::Error::MissingSigningKeys);
        }
        Ok(self
            .keys
            .iter()
            .find_map(|key| cookies.private(key).get(name))
            .map(Cookie::into_owned))
    }

    fn set(
        &self,
        cookies: &Cookies,
        cookie: Cookie<'static>,
        _options: &CookieOptions,
    ) -> Result<()> {
        let key = self.keys.first().ok_or(crate::Error::MissingSigningKeys)?;
        cookies.private(key).add(cookie);
        Ok(())
    }
}
