use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;

use crate::{
    error::AuthError,
    password::PasswordVerifier,
    token::{Claims, SigningKey, TokenCodec},
    types::{AuthorizedUser, NewUser, User},
};

/// How long an issued token stays valid.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);

#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Store the user, keyed by email. An existing user with the same email is replaced.
    async fn create_user(&self, user: User) -> Result<User, AuthError>;

    /// Retrieve the user with the given email. A missing user must be reported
    /// as an [`ErrorKind::UserNotFound`](crate::ErrorKind::UserNotFound) error.
    async fn find_user_by_email(&self, email: &str) -> Result<User, AuthError>;
}

#[derive(Clone)]
pub struct AuthConfig {
    /// The secret used to sign auth tokens.
    /// If the secret changes, all currently authenticated sessions will be terminated.
    pub auth_token_secret: SigningKey,
    pub user_repository: Arc<dyn UserRepository>,
    pub password_verifier: Arc<dyn PasswordVerifier>,
}

/// Login and token verification on top of a [`UserRepository`].
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    passwords: Arc<dyn PasswordVerifier>,
    codec: TokenCodec,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        passwords: Arc<dyn PasswordVerifier>,
        codec: TokenCodec,
    ) -> Self {
        Self {
            users,
            passwords,
            codec,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthorizedUser, AuthError> {
        let user = self.users.find_user_by_email(email).await?;

        if !self.passwords.verify(password, &user.password)? {
            tracing::debug!(email, "login rejected");
            return Err(AuthError::password_not_matched(format!("for email {email}")));
        }

        let claims = Claims::new(email, unix_now() + TOKEN_LIFETIME.as_secs() as i64);
        let token = self.codec.serialize(&claims)?;

        tracing::info!(email, "user logged in");
        Ok(AuthorizedUser { user, token })
    }

    /// Verify `token` and resolve its user. The token is returned as given.
    pub async fn authenticate(&self, token: &str) -> Result<AuthorizedUser, AuthError> {
        let claims = self.codec.deserialize(token)?;

        if claims.is_expired_at(unix_now()) {
            tracing::debug!(email = %claims.subject, "rejecting expired token");
            return Err(AuthError::invalid_token("token expired"));
        }

        let user = self.users.find_user_by_email(&claims.subject).await?;

        Ok(AuthorizedUser {
            user,
            token: token.to_owned(),
        })
    }

    /// Create the user and log them in with the password they signed up with.
    pub async fn signup(&self, new_user: NewUser) -> Result<AuthorizedUser, AuthError> {
        let user = User {
            name: new_user.name,
            email: new_user.email,
            password: self.passwords.hash(&new_user.password)?,
        };
        let user = self.users.create_user(user).await?;
        tracing::info!(email = %user.email, "user created");

        self.login(&user.email, &new_user.password).await
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[derive(Clone)]
pub struct Auth {
    pub(crate) internal: Arc<AuthService>,
}

impl Auth {
    pub fn new(config: AuthConfig) -> Self {
        let codec = TokenCodec::new(&config.auth_token_secret);
        Self {
            internal: Arc::new(AuthService::new(
                config.user_repository,
                config.password_verifier,
                codec,
            )),
        }
    }

    pub fn service(&self) -> &AuthService {
        &self.internal
    }
}
