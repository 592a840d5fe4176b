use std::sync::Arc;

use realworld_auth::{
    classify, AuthService, ErrorKind, InMemoryUserRepository, PlaintextPasswords, SigningKey,
    TokenCodec, User, UserRepository,
};
use warp::http::StatusCode;

async fn service_with_alice() -> AuthService {
    let users = Arc::new(InMemoryUserRepository::new());
    users
        .create_user(User {
            name: "alice".into(),
            email: "alice@x.com".into(),
            password: "p".into(),
        })
        .await
        .unwrap();

    AuthService::new(
        users,
        Arc::new(PlaintextPasswords),
        TokenCodec::new(&SigningKey::from("secret")),
    )
}

#[tokio::test]
async fn login_then_authenticate() {
    let service = service_with_alice().await;

    let logged_in = service.login("alice@x.com", "p").await.unwrap();
    assert_eq!(logged_in.user.email, "alice@x.com");
    assert!(logged_in.token.starts_with(service.codec().header()));

    let authenticated = service.authenticate(&logged_in.token).await.unwrap();
    assert_eq!(authenticated.token, logged_in.token);
    assert_eq!(authenticated.user, logged_in.user);
}

#[tokio::test]
async fn failures_classify_for_the_client() {
    let service = service_with_alice().await;

    let err = service.login("alice@x.com", "wrong").await.unwrap_err();
    assert!(err.is(ErrorKind::PasswordNotMatched));
    assert_eq!(classify(Some(&err)), StatusCode::UNPROCESSABLE_ENTITY);

    let err = service.authenticate("garbage").await.unwrap_err();
    assert!(err.is(ErrorKind::InvalidToken));
    assert_eq!(classify(Some(&err)), StatusCode::UNPROCESSABLE_ENTITY);

    let err = service.authenticate("").await.unwrap_err();
    assert!(err.is(ErrorKind::TokenNotFound));
    assert_eq!(classify(Some(&err)), StatusCode::UNAUTHORIZED);

    let err = service.login("bob@x.com", "p").await.unwrap_err();
    assert_eq!(classify(Some(&err)), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tokens_from_another_key_are_rejected() {
    let service = service_with_alice().await;
    let token = service.login("alice@x.com", "p").await.unwrap().token;

    let other = AuthService::new(
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(PlaintextPasswords),
        TokenCodec::new(&SigningKey::from("another secret")),
    );
    let err = other.authenticate(&token).await.unwrap_err();
    assert!(err.is(ErrorKind::InvalidToken));
}

#[tokio::test]
async fn concurrent_logins_share_one_service() {
    let service = Arc::new(service_with_alice().await);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move {
                let token = service.login("alice@x.com", "p").await?.token;
                service.authenticate(&token).await
            })
        })
        .collect();

    for handle in handles {
        let authorized = handle.await.unwrap().unwrap();
        assert_eq!(authorized.user.name, "alice");
    }
}
