use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use http::{Request, Response, StatusCode};
use tower_cookies::{CookieManager, Cookies};
use tower_layer::Layer;
use tower_service::Service;

use crate::{
    backend::Loaded,
    config::SessionConfig,
    jar::{CookieJar, PlaintextJar, SignedJar},
    store::{SessionStore, Store},
};

/// Attaches a [`Session`](crate::Session) to every request and persists it once the inner service
/// has responded.
#[derive(Debug, Clone)]
pub struct SessionManagerLayer {
    config: SessionConfig,
    keys: Vec<crate::Key>,
    jar: Option<Arc<dyn CookieJar>>,
    store: Option<Store>,
}

impl SessionManagerLayer {
    /// A layer with the default configuration and no signing keys.
    ///
    /// Cookies are signed by default, so requests fail until keys are added with
    /// [`with_keys`](Self::with_keys) or signing is turned off in the cookie options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            keys: Vec::new(),
            jar: None,
            store: None,
        }
    }

    /// A layer signing its cookies with `keys`. The first key signs, all keys verify.
    #[must_use]
    pub fn signed<I: IntoIterator<Item = crate::Key>>(keys: I) -> Self {
        Self::new().with_keys(keys)
    }

    /// A layer encrypting its cookies with `keys`.
    #[cfg(feature = "private")]
    #[must_use]
    pub fn private<I: IntoIterator<Item = crate::Key>>(keys: I) -> Self {
        Self::new().with_jar(crate::jar::PrivateJar::new(keys))
    }

    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_keys<I: IntoIterator<Item = crate::Key>>(mut self, keys: I) -> Self {
        self.keys = keys.into_iter().collect();
        self
    }

    /// Keep session data in `store`; the cookie then only carries the session id.
    ///
    /// This takes precedence over the store named by the configuration, whether
    /// [`with_config`](Self::with_config) is called before or after.
    #[must_use]
    pub fn with_store<S: SessionStore>(mut self, store: S) -> Self {
        self.store = Some(Store::external(store));
        self
    }

    /// Use a custom cookie jar instead of the one selected by the `signed` cookie option.
    #[must_use]
    pub fn with_jar<J: CookieJar>(mut self, jar: J) -> Self {
        self.jar = Some(Arc::new(jar));
        self
    }

    fn resolve_config(&self) -> SessionConfig {
        match &self.store {
            Some(store) => self.config.clone().with_store(store.clone()),
            None => self.config.clone(),
        }
    }

    fn resolve_jar(&self) -> Arc<dyn CookieJar> {
        if let Some(jar) = &self.jar {
            return jar.clone();
        }
        if !self.config.cookie.signed {
            return Arc::new(PlaintextJar);
        }
        Arc::new(SignedJar::new(self.keys.iter().cloned()))
    }
}

impl Default for SessionManagerLayer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct SessionManager<S> {
    inner: S,
    config: Arc<SessionConfig>,
    jar: Arc<dyn CookieJar>,
}

impl<S> Layer<S> for SessionManagerLayer {
    type Service = CookieManager<SessionManager<S>>;

    fn layer(&self, inner: S) -> Self::Service {
        CookieManager::new(SessionManager {
            inner,
            config: Arc::new(self.resolve_config()),
            jar: self.resolve_jar(),
        })
    }
}

fn internal_server_error<ResBody: Default>() -> Response<ResBody> {
    let mut res = Response::default();
    *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    res
}

impl<ReqBody, ResBody, S> Service<Request<ReqBody>> for SessionManager<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let config = self.config.clone();
        let jar = self.jar.clone();

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let Some(cookies) = req.extensions().get::<Cookies>().cloned() else {
                tracing::error!("missing cookies request extension");
                return Ok(internal_server_error());
            };

            let loaded = match Loaded::load(&config, jar.as_ref(), &cookies).await {
                Ok(loaded) => loaded,
                Err(err) => {
                    tracing::error!(err = %err, "session load failed");
                    return Ok(internal_server_error());
                }
            };
            req.extensions_mut().insert(loaded.session().clone());

            let res = inner.call(req).await?;

            if res.status().is_server_error() {
                tracing::debug!(status = %res.status(), "handler failed, session left untouched");
                return Ok(res);
            }

            if let Err(err) = loaded.finalize(&config, jar.as_ref(), &cookies).await {
                tracing::error!(err = %err, "session finalization failed");
                return Ok(internal_server_error());
            }

            Ok(res)
        })
    }
}
