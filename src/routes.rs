use std::convert::Infallible;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use warp::{hyper::body::Bytes, path, Filter, Rejection, Reply};

use crate::{
    auth::Auth,
    case_insensitive_string_ext::CaseInsensitiveStringExt,
    error::{classify, ensure_present, AuthError},
    types::{AuthorizedUser, NewUser},
};

pub fn build_api_route_filter(
    auth: &Auth,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let register = path!("api" / "users")
        .and(warp::post())
        .and(json_body::<UserEnvelope<RegisterRequest>>())
        .and(with_auth_state(auth.clone()))
        .and_then(user_register);

    let login = path!("api" / "users" / "login")
        .and(warp::post())
        .and(json_body::<UserEnvelope<LoginRequest>>())
        .and(with_auth_state(auth.clone()))
        .and_then(user_login);

    let current_user = path!("api" / "user")
        .and(warp::get())
        .and(with_auth(auth))
        .map(|user: AuthorizedUser| warp::reply::json(&UserEnvelope::from(user)));

    register
        .or(login)
        .or(current_user)
        .with(warp::trace::request())
}

/// Resolves the caller from an `Authorization: Token <token>` header.
/// A missing header is treated as an empty token.
pub fn with_auth(
    auth: &Auth,
) -> impl Filter<Extract = (AuthorizedUser,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_auth_state(auth.clone()))
        .and_then(user_auth_check)
}

pub async fn handle_auth_errors(err: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(auth_error) = err.find::<AuthError>() {
        let status = classify(Some(auth_error));
        if status.is_server_error() {
            tracing::error!(error = %auth_error, "request failed");
        }
        let body = ErrorResponse {
            errors: ErrorBody {
                body: auth_error.leaf_messages(),
            },
        };
        return Ok(warp::reply::with_status(warp::reply::json(&body), status));
    }

    Err(err)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub errors: ErrorBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub body: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserEnvelope<T> {
    pub user: T,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        AuthError::join([
            ensure_present("username", &self.username),
            ensure_present("email", &self.email),
            ensure_present("password", &self.password),
        ])
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        AuthError::join([
            ensure_present("email", &self.email),
            ensure_present("password", &self.password),
        ])
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub username: String,
    pub email: String,
    pub token: String,
    pub bio: String,
    pub image: String,
}

impl From<AuthorizedUser> for UserEnvelope<UserResponse> {
    fn from(authorized: AuthorizedUser) -> Self {
        UserEnvelope {
            user: UserResponse {
                username: authorized.user.name,
                email: authorized.user.email,
                token: authorized.token,
                bio: String::new(),
                image: String::new(),
            },
        }
    }
}

async fn user_register(
    input: UserEnvelope<RegisterRequest>,
    auth: Auth,
) -> Result<impl Reply, Rejection> {
    let input = input.user;
    input.validate()?;

    let authorized = auth
        .service()
        .signup(NewUser {
            name: input.username,
            email: input.email,
            password: input.password,
        })
        .await?;

    Ok(warp::reply::with_status(
        warp::reply::json(&UserEnvelope::from(authorized)),
        warp::http::StatusCode::CREATED,
    ))
}

async fn user_login(input: UserEnvelope<LoginRequest>, auth: Auth) -> Result<impl Reply, Rejection> {
    let input = input.user;
    input.validate()?;

    let authorized = auth.service().login(&input.email, &input.password).await?;

    Ok(warp::reply::json(&UserEnvelope::from(authorized)))
}

async fn user_auth_check(header: Option<String>, auth: Auth) -> Result<AuthorizedUser, Rejection> {
    let header = header.unwrap_or_default();
    let token = header
        .strip_prefix_ignore_ascii_case("token ")
        .unwrap_or(&header);

    Ok(auth.service().authenticate(token).await?)
}

// Body decoding failures are reported as bad requests instead of warp's own rejection
fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send + 'static,
{
    warp::body::bytes().and_then(|bytes: Bytes| async move {
        serde_json::from_slice::<T>(&bytes).map_err(|err| {
            warp::reject::custom(AuthError::bad_request(format!(
                "failed to decode json: {err}"
            )))
        })
    })
}

// functor that adds a handle to the auth service into the filter chain
fn with_auth_state(auth: Auth) -> impl Filter<Extract = (Auth,), Error = Infallible> + Clone {
    warp::any().map(move || auth.clone())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use warp::http::StatusCode;

    use super::*;
    use crate::{
        auth::AuthConfig, memory::InMemoryUserRepository, password::PlaintextPasswords,
    };

    fn auth() -> Auth {
        Auth::new(AuthConfig {
            auth_token_secret: "secret".into(),
            user_repository: Arc::new(InMemoryUserRepository::new()),
            password_verifier: Arc::new(PlaintextPasswords),
        })
    }

    fn errors(body: &[u8]) -> Vec<String> {
        serde_json::from_slice::<ErrorResponse>(body).unwrap().errors.body
    }

    #[tokio::test]
    async fn register_reports_every_missing_field() {
        let routes = build_api_route_filter(&auth()).recover(handle_auth_errors);

        let response = warp::test::request()
            .method("POST")
            .path("/api/users")
            .body(json!({"user": {"username": "", "email": "a@b.c", "password": ""}}).to_string())
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            errors(response.body()),
            vec![
                "bad request: username is required but empty",
                "bad request: password is required but empty",
            ]
        );
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let routes = build_api_route_filter(&auth()).recover(handle_auth_errors);

        let response = warp::test::request()
            .method("POST")
            .path("/api/users/login")
            .body("{not json")
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let errors = errors(response.body());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("bad request: failed to decode json"));
    }

    #[tokio::test]
    async fn current_user_without_header_is_unauthorized() {
        let routes = build_api_route_filter(&auth()).recover(handle_auth_errors);

        let response = warp::test::request()
            .path("/api/user")
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_then_fetch_current_user() {
        let routes = build_api_route_filter(&auth()).recover(handle_auth_errors);

        let response = warp::test::request()
            .method("POST")
            .path("/api/users")
            .body(
                json!({"user": {"username": "alice", "email": "alice@x.com", "password": "p"}})
                    .to_string(),
            )
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let registered: UserEnvelope<UserResponse> =
            serde_json::from_slice(response.body()).unwrap();

        let response = warp::test::request()
            .path("/api/user")
            .header("authorization", format!("token {}", registered.user.token))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let current: UserEnvelope<UserResponse> = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(current.user.username, "alice");
        assert_eq!(current.user.token, registered.user.token);
    }
}
