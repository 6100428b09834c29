use std::{borrow::Cow, collections::BTreeMap};

use serde::Deserialize;
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use tower_cookies::Cookie;

use crate::{SameSite, store::Store};

/// Default name of the session cookie.
pub const DEFAULT_COOKIE_NAME: &str = "sess";

/// Default upper bound for an encoded session cookie value.
pub const DEFAULT_MAX_COOKIE_BYTES: usize = 4096;

/// Attributes applied to every session cookie the middleware writes, including the removal cookie.
#[derive(Debug, Clone, PartialEq)]
pub struct CookieOptions {
    pub(crate) http_only: bool,
    pub(crate) signed: bool,
    pub(crate) overwrite: bool,
    pub(crate) secure: bool,
    pub(crate) same_site: Option<SameSite>,
    pub(crate) path: Cow<'static, str>,
    pub(crate) domain: Option<Cow<'static, str>>,
    pub(crate) max_age: Option<Duration>,
    pub(crate) expires: Option<OffsetDateTime>,
    pub(crate) extra: BTreeMap<String, Value>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            signed: true,
            overwrite: true,
            secure: false,
            same_site: None,
            path: "/".into(),
            domain: None,
            max_age: None,
            expires: None,
            extra: BTreeMap::new(),
        }
    }
}

impl CookieOptions {
    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Whether cookies are signed. Signing needs at least one key on the layer.
    #[must_use]
    pub fn with_signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    #[must_use]
    pub fn with_path<P: Into<Cow<'static, str>>>(mut self, path: P) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain<D: Into<Cow<'static, str>>>(mut self, domain: D) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    #[must_use]
    pub fn with_expires(mut self, expires: OffsetDateTime) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Attach an option the middleware does not interpret. Custom [`CookieJar`](crate::CookieJar)
    /// implementations can read it through [`CookieOptions::extra`].
    #[must_use]
    pub fn with_extra<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn http_only(&self) -> bool {
        self.http_only
    }

    pub fn signed(&self) -> bool {
        self.signed
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }
}

/// Process-wide session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub(crate) cookie_name: Cow<'static, str>,
    pub(crate) cookie: CookieOptions,
    pub(crate) store: Store,
    pub(crate) max_cookie_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.into(),
            cookie: CookieOptions::default(),
            store: Store::Cookie,
            max_cookie_bytes: DEFAULT_MAX_COOKIE_BYTES,
        }
    }
}

impl SessionConfig {
    /// Fill every field the raw configuration leaves out with its default.
    ///
    /// The store always starts out as [`Store::Cookie`]; attach an external store with
    /// [`SessionConfig::with_store`].
    pub fn normalize(raw: &RawSessionConfig) -> Self {
        let defaults = Self::default();
        let cookie = raw
            .cookie
            .as_ref()
            .map(RawCookieOptions::normalize)
            .unwrap_or_default();

        Self {
            cookie_name: raw
                .cookie_name
                .clone()
                .map(Cow::Owned)
                .unwrap_or(defaults.cookie_name),
            cookie,
            store: defaults.store,
            max_cookie_bytes: raw.max_cookie_bytes.unwrap_or(defaults.max_cookie_bytes),
        }
    }

    #[must_use]
    pub fn with_cookie_name<N: Into<Cow<'static, str>>>(mut self, name: N) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_cookie_options(mut self, cookie: CookieOptions) -> Self {
        self.cookie = cookie;
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: Store) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub fn with_max_cookie_bytes(mut self, max_cookie_bytes: usize) -> Self {
        self.max_cookie_bytes = max_cookie_bytes;
        self
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn cookie_options(&self) -> &CookieOptions {
        &self.cookie
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn build_cookie(&self, value: String) -> Cookie<'static> {
        let options = &self.cookie;
        let mut cookie_builder = Cookie::build((self.cookie_name.clone(), value))
            .http_only(options.http_only)
            .secure(options.secure)
            .path(options.path.clone());

        if let Some(same_site) = options.same_site {
            cookie_builder = cookie_builder.same_site(same_site);
        }
        if let Some(max_age) = options.max_age {
            cookie_builder = cookie_builder.max_age(max_age);
        }
        if let Some(expires) = options.expires {
            cookie_builder = cookie_builder.expires(expires);
        }
        if let Some(domain) = options.domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        cookie_builder.build()
    }

    /// The cookie that tells the client to drop its session: empty value, expired in the past.
    pub(crate) fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = self.build_cookie(String::new());
        cookie.set_max_age(None::<Duration>);
        cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
        cookie
    }
}

/// `SameSite` policy as it appears in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

impl From<SameSitePolicy> for SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Strict => SameSite::Strict,
            SameSitePolicy::Lax => SameSite::Lax,
            SameSitePolicy::None => SameSite::None,
        }
    }
}

/// A partially specified configuration, e.g. read from a file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawSessionConfig {
    #[serde(alias = "key")]
    pub cookie_name: Option<String>,
    #[serde(alias = "cookieOptions")]
    pub cookie: Option<RawCookieOptions>,
    pub max_cookie_bytes: Option<usize>,
}

/// Partially specified cookie options. Keys the middleware does not know end up in `extra`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawCookieOptions {
    pub http_only: Option<bool>,
    pub signed: Option<bool>,
    pub overwrite: Option<bool>,
    pub secure: Option<bool>,
    pub same_site: Option<SameSitePolicy>,
    pub path: Option<String>,
    pub domain: Option<String>,
    /// Max-Age in seconds.
    pub max_age: Option<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RawCookieOptions {
    fn normalize(&self) -> CookieOptions {
        let defaults = CookieOptions::default();
        CookieOptions {
            http_only: self.http_only.unwrap_or(defaults.http_only),
            signed: self.signed.unwrap_or(defaults.signed),
            overwrite: self.overwrite.unwrap_or(defaults.overwrite),
            secure: self.secure.unwrap_or(defaults.secure),
            same_site: self.same_site.map(SameSite::from),
            path: self.path.clone().map(Cow::Owned).unwrap_or(defaults.path),
            domain: self.domain.clone().map(Cow::Owned),
            max_age: self.max_age.map(Duration::seconds),
            expires: None,
            extra: self.extra.clone(),
        }
    }
}
