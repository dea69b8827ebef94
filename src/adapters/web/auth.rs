//! Authentication backend for axum-login.
//!
//! Accounts live in the profile store; the session only carries the user id
//! and password hash, so a password change invalidates other sessions.

use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use axum_login::{AuthUser, AuthnBackend, UserId};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::domain::error::CoinfolioError;
use crate::ports::store_port::{self, ProfileStore};

/// Authenticated session principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pw_hash: Vec<u8>,
}

impl From<store_port::Credentials> for SessionUser {
    fn from(creds: store_port::Credentials) -> Self {
        SessionUser {
            id: creds.user_id,
            pw_hash: creds.password_hash.into_bytes(),
        }
    }
}

impl AuthUser for SessionUser {
    type Id = String;

    fn id(&self) -> String {
        self.id.clone()
    }

    fn session_auth_hash(&self) -> &[u8] {
        &self.pw_hash
    }
}

/// Email/password pair submitted to `/login`.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

pub fn hash_password(password: &str) -> Result<String, CoinfolioError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default());
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CoinfolioError::InvalidInput {
            reason: format!("failed to hash password: {e}"),
        })
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[derive(Clone)]
pub struct Backend {
    store: Arc<dyn ProfileStore>,
}

impl Backend {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }
}

impl AuthnBackend for Backend {
    type User = SessionUser;
    type Credentials = Credentials;
    type Error = CoinfolioError;

    async fn authenticate(
        &self,
        creds: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        let email = creds.email.trim().to_lowercase();
        let Some(stored) = self.store.credentials_by_email(&email)? else {
            return Ok(None);
        };
        if verify_password(&creds.password, &stored.password_hash) {
            Ok(Some(stored.into()))
        } else {
            Ok(None)
        }
    }

    async fn get_user(&self, user_id: &UserId<Self>) -> Result<Option<Self::User>, Self::Error> {
        Ok(self.store.credentials_by_id(user_id)?.map(SessionUser::from))
    }
}
