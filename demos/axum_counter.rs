use std::net::SocketAddr;

use axum::{Router, routing::get};
use time::Duration;
use tower_session_manager::{
    CookieOptions, Key, MemoryStore, SameSite, Session, SessionConfig, SessionManagerLayer,
};

async fn index(session: Session) -> String {
    let n: usize = session
        .get("n")
        .expect("session get succeeds")
        .unwrap_or(0);
    session.insert("n", n + 1).expect("session insert succeeds");
    format!("n={n}")
}

async fn logout(session: Session) -> &'static str {
    session.destroy();
    "bye"
}

#[tokio::main]
async fn main() {
    let key = Key::generate();
    let cookie_options = CookieOptions::default()
        // Default: true
        .with_http_only(true)
        // Default: true
        .with_signed(true)
        // Default: unset
        .with_same_site(SameSite::Lax)
        // Default: unset, a browser-session cookie
        .with_max_age(Duration::hours(1))
        // Default: false
        .with_secure(false)
        // Default: "/"
        .with_path("/");
    let session_config = SessionConfig::default()
        // Default: "sess"
        .with_cookie_name("sess")
        .with_cookie_options(cookie_options)
        // Default: 4096
        .with_max_cookie_bytes(4096);

    // Drop `with_store` to keep the whole session in the cookie.
    let session_layer = SessionManagerLayer::signed([key])
        .with_config(session_config)
        .with_store(MemoryStore::new());

    let app = Router::new()
        .route("/", get(index))
        .route("/logout", get(logout))
        .layer(session_layer);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("tcp listener binds successfully");
    let local_addr = listener.local_addr().expect("local address is available");
    println!("listening at http://{local_addr}");

    axum::serve(listener, app)
        .await
        .expect("server runs successfully");
}
