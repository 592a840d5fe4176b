use std::{net::SocketAddr, sync::Arc};

use realworld_auth::{
    build_api_route_filter, handle_auth_errors, with_auth, Argon2Passwords, Auth, AuthConfig,
    AuthorizedUser, InMemoryUserRepository,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use warp::{path, Filter};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let secret = std::env::var("AUTH_TOKEN_SECRET")
        .unwrap_or_else(|_| "this is a really bad secret".into());
    let port = std::env::var("PORT")
        .ok()
        .and_then(|port| port.parse::<u16>().ok())
        .unwrap_or(8080);

    let config = AuthConfig {
        auth_token_secret: secret.into(),
        user_repository: Arc::new(InMemoryUserRepository::new()),
        password_verifier: Arc::new(Argon2Passwords::new("this is a terrible salt")),
    };

    let auth = Auth::new(config);

    let auth_routes = build_api_route_filter(&auth);

    let unsecured_homepage =
        warp::path::end().then(|| async move { warp::reply::html("hello, world!") });

    let secure_page = path!("whoami")
        .and(with_auth(&auth))
        .map(|authorized: AuthorizedUser| {
            warp::reply::json(&json!({ "email": authorized.user.email }))
        });

    let all_routes = unsecured_homepage
        .or(secure_page)
        .or(auth_routes)
        .recover(handle_auth_errors);

    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    tracing::info!(%addr, "listening");
    warp::serve(all_routes).run(addr).await;
}
