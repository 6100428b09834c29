#![allow(dead_code)]

// Shared helpers for integration tests.
//
// These helpers use `tower_cookies::Cookie` parsing/encoding to match what the middleware emits
// in `Set-Cookie` and what browsers send back in `Cookie`.
use std::{
    convert::Infallible,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use axum::body::Body;
use http::{HeaderMap, Request, Response, header};
use http_body_util::BodyExt as _;
use serde_json::json;
use tower_cookies::{Cookie, Key, cookie::CookieJar};
use tower_session_manager::{
    CookieOptions, Error, Id, MemoryStore, SessionConfig, SessionManagerLayer, Session,
    SessionStore,
};

pub async fn body_string(body: Body) -> String {
    // Collect an Axum body into a UTF-8 string for assertions.
    let bytes = body
        .collect()
        .await
        .expect("body collects successfully")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn session(req: &Request<Body>) -> Session {
    req.extensions()
        .get::<Session>()
        .cloned()
        .expect("request includes Session extension")
}

pub async fn handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Basic handler used by many tests: write a single key into the session.
    session(&req)
        .insert("message", "hello")
        .expect("session insert succeeds");

    Ok(Response::new(Body::empty()))
}

pub async fn hello2_handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    session(&req)
        .insert("message", "hello2")
        .expect("session insert succeeds");

    Ok(Response::new(Body::empty()))
}

pub async fn noop_handler(_: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Handler that does not access the session at all.
    Ok(Response::new(Body::empty()))
}

pub async fn read_handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Handler that reads the session without changing it and echoes it back.
    let data = session(&req).data();
    Ok(Response::new(Body::from(
        serde_json::to_string(&data).expect("session data serializes"),
    )))
}

pub async fn set_same_value_handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Writes a value that is already there.
    session(&req)
        .insert("message", "hello")
        .expect("session insert succeeds");

    Ok(Response::new(Body::empty()))
}

pub async fn null_handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    session(&req).replace(serde_json::Value::Null);
    Ok(Response::new(Body::from("asdf")))
}

pub async fn empty_object_handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    session(&req).replace(json!({}));
    Ok(Response::new(Body::from("asdf")))
}

pub async fn object_handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    session(&req).replace(json!({ "message": "hello" }));
    Ok(Response::new(Body::from("asdf")))
}

pub async fn string_handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    session(&req).replace(json!("asdf"));
    Ok(Response::new(Body::empty()))
}

pub async fn failing_handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Mutates the session, then fails.
    session(&req)
        .insert("message", "lost")
        .expect("session insert succeeds");

    let mut res = Response::new(Body::empty());
    *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
    Ok(res)
}

pub fn make_signed_layer(config: SessionConfig) -> (Key, SessionManagerLayer) {
    // Create a signed-cookie session layer and return both the key and the layer for tests that
    // need to inspect/unsign cookie values.
    let key = Key::generate();
    let layer = SessionManagerLayer::signed([key.clone()]).with_config(config);
    (key, layer)
}

pub fn plaintext_config() -> SessionConfig {
    SessionConfig::default().with_cookie_options(CookieOptions::default().with_signed(false))
}

pub fn get_session_cookie(res: &Response<Body>) -> Cookie<'static> {
    // Convenience: parse the session cookie from a response.
    get_session_cookie_from_headers(res.headers())
}

pub fn get_session_cookie_from_headers(headers: &HeaderMap) -> Cookie<'static> {
    // Parse the `Set-Cookie` header into a `Cookie` structure.
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .expect("response includes set-cookie header");
    let set_cookie = set_cookie
        .to_str()
        .expect("set-cookie header is valid utf-8");
    Cookie::parse_encoded(set_cookie)
        .expect("set-cookie parses successfully")
        .into_owned()
}

pub fn has_set_cookie(res: &Response<Body>) -> bool {
    res.headers().get(header::SET_COOKIE).is_some()
}

pub fn cookie_header_value(cookie: &Cookie<'_>) -> String {
    // Encode a cookie for use in a `Cookie` request header.
    cookie.encoded().to_string()
}

pub fn unsigned_cookie_value(cookie: Cookie<'static>, key: &Key, name: &str) -> String {
    // Given a signed `Set-Cookie` cookie, return the unsigned inner value.
    let mut jar = CookieJar::new();
    jar.add_original(cookie);
    jar.signed(key)
        .get(name)
        .expect("signed jar returns session cookie")
        .value()
        .to_string()
}

pub fn request() -> Request<Body> {
    Request::builder()
        .body(Body::empty())
        .expect("request builds successfully")
}

pub fn request_with_cookie(cookie: &Cookie<'_>) -> Request<Body> {
    Request::builder()
        .header(header::COOKIE, cookie_header_value(cookie))
        .body(Body::empty())
        .expect("request builds successfully")
}

/// A [`SessionStore`] that counts calls and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    pub loads: Arc<AtomicUsize>,
    pub saves: Arc<AtomicUsize>,
    pub removes: Arc<AtomicUsize>,
    pub fail_load: Arc<AtomicBool>,
    pub fail_save: Arc<AtomicBool>,
    pub fail_remove: Arc<AtomicBool>,
}

impl RecordingStore {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.loads.store(0, Ordering::SeqCst);
        self.saves.store(0, Ordering::SeqCst);
        self.removes.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn load(&self, id: &Id) -> Result<Option<String>, Error> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(Error::store("load failed"));
        }
        self.inner.load(id).await
    }

    async fn save(&self, id: &Id, payload: &str) -> Result<(), Error> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(Error::store("save failed"));
        }
        self.inner.save(id, payload).await
    }

    async fn remove(&self, id: &Id) -> Result<(), Error> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(Error::store("remove failed"));
        }
        self.inner.remove(id).await
    }
}
