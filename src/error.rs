use std::fmt;

use warp::{http::StatusCode, reject::Reject};

/// The closed set of domain failures a client can be told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    UserNotFound,
    PasswordNotMatched,
    TokenNotFound,
    InvalidToken,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::BadRequest => "bad request",
            ErrorKind::UserNotFound => "user not found",
            ErrorKind::PasswordNotMatched => "password not matched",
            ErrorKind::TokenNotFound => "token not found",
            ErrorKind::InvalidToken => "invalid token",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("{kind}: {detail}")]
    Domain { kind: ErrorKind, detail: String },
    /// Several failures reported together, in the order they were found.
    #[error("{}", render_leaves(.0))]
    Aggregate(Vec<AuthError>),
    #[error("failed to encode claim")]
    ClaimEncoding {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode claim")]
    ClaimDecoding {
        #[source]
        source: serde_json::Error,
    },
    #[error("error while hashing password")]
    PasswordHash {
        #[from]
        source: argon2::Error,
    },
    #[error("error during database operation")]
    Storage {
        #[from]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Reject for AuthError {}

impl AuthError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        AuthError::Domain {
            kind,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, detail)
    }

    pub fn user_not_found(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::UserNotFound, detail)
    }

    pub fn password_not_matched(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::PasswordNotMatched, detail)
    }

    pub fn token_not_found(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::TokenNotFound, detail)
    }

    pub fn invalid_token(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidToken, detail)
    }

    /// Collapse a batch of checks into one error. Successful checks are dropped;
    /// the remaining failures keep their order.
    pub fn join<I>(results: I) -> Result<(), AuthError>
    where
        I: IntoIterator<Item = Result<(), AuthError>>,
    {
        let leaves: Vec<AuthError> = results.into_iter().filter_map(Result::err).collect();
        if leaves.is_empty() {
            Ok(())
        } else {
            Err(AuthError::Aggregate(leaves))
        }
    }

    /// Whether this error, or any error it aggregates, carries `kind`.
    pub fn is(&self, kind: ErrorKind) -> bool {
        match self {
            AuthError::Domain { kind: own, .. } => *own == kind,
            AuthError::Aggregate(leaves) => leaves.iter().any(|leaf| leaf.is(kind)),
            _ => false,
        }
    }

    /// The domain kind of a single error. Aggregates and infrastructure errors have none.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AuthError::Domain { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Messages of every leaf error, in construction order. Duplicates are kept.
    pub fn leaf_messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        self.collect_leaf_messages(&mut messages);
        messages
    }

    fn collect_leaf_messages(&self, out: &mut Vec<String>) {
        match self {
            AuthError::Aggregate(leaves) => {
                for leaf in leaves {
                    leaf.collect_leaf_messages(out);
                }
            }
            other => out.push(other.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        classify(Some(self))
    }
}

fn render_leaves(leaves: &[AuthError]) -> String {
    leaves
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fails with `BadRequest` when a required field is empty.
pub fn ensure_present(field: &str, value: &str) -> Result<(), AuthError> {
    if value.is_empty() {
        return Err(AuthError::bad_request(format!(
            "{field} is required but empty"
        )));
    }
    Ok(())
}

/// Map an outcome onto the status code reported to API clients.
///
/// The first matching rule wins: no error is 200, `TokenNotFound` is 401,
/// `UserNotFound` is 404, the remaining domain kinds are 422 and anything else is 500.
pub fn classify(err: Option<&AuthError>) -> StatusCode {
    let err = match err {
        None => return StatusCode::OK,
        Some(err) => err,
    };

    if err.is(ErrorKind::TokenNotFound) {
        StatusCode::UNAUTHORIZED
    } else if err.is(ErrorKind::UserNotFound) {
        StatusCode::NOT_FOUND
    } else if [
        ErrorKind::BadRequest,
        ErrorKind::PasswordNotMatched,
        ErrorKind::InvalidToken,
    ]
    .into_iter()
    .any(|kind| err.is(kind))
    {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
