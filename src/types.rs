use std::fmt;

/// A stored account. `password` holds whatever the configured
/// [`PasswordVerifier`](crate::PasswordVerifier) produced when the user signed up.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Signup input, with the password still in plaintext.
#[derive(Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// A resolved user together with the bearer token that proved who they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedUser {
    pub user: User,
    pub token: String,
}
