use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{auth::UserRepository, error::AuthError, types::User};

/// Keeps users in a map keyed by email. Lookups share a read lock.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create_user(&self, user: User) -> Result<User, AuthError> {
        self.users
            .write()
            .await
            .insert(user.email.clone(), user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<User, AuthError> {
        self.users
            .read()
            .await
            .get(email)
            .cloned()
            .ok_or_else(|| AuthError::user_not_found(format!("no user with email {email}")))
    }
}
