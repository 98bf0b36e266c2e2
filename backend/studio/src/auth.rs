//! Email/password sign-in.
//!
//! Signing in with an unknown email creates the account. This is kept as
//! an explicit three-step protocol:
//!
//! 1. probe the stored credentials for the email;
//! 2. if none exist, attempt sign-up (credentials, profile row and the two
//!    seed projects in one transaction);
//! 3. if sign-up loses a uniqueness race to a concurrent sign-up, reconcile
//!    by probing again and verifying against the winner's credentials.
//!
//! Every credential failure surfaces as [`StudioError::InvalidCredentials`].

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::Backend;
use crate::db::{self, CredentialRow};
use crate::errors::{Result, StudioError};
use crate::templates;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInStatus {
    /// Signed in to an existing account.
    Existing,
    /// The account was created by this call.
    NewUser,
}

/// Authenticated identity, passed explicitly to the workflows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
}

pub async fn sign_in(
    backend: &Backend,
    email: &str,
    password: &str,
) -> Result<(Session, SignInStatus)> {
    let email = email.trim().to_ascii_lowercase();
    if email.is_empty() || password.is_empty() {
        return Err(StudioError::InvalidCredentials);
    }

    // Step 1: probe.
    if let Some(creds) = db::find_credentials(backend.pool(), &email).await? {
        return sign_in_existing(backend, &creds, password).await;
    }

    // Step 2: attempt sign-up.
    match sign_up(backend, &email, password).await {
        Ok(session) => {
            info!("Created account {}", session.user_id);
            Ok((session, SignInStatus::NewUser))
        }
        Err(StudioError::Database(e)) if is_unique_violation(&e) => {
            // Step 3: reconcile with whoever registered first.
            warn!("Concurrent sign-up detected, reconciling");
            match db::find_credentials(backend.pool(), &email).await? {
                Some(creds) => sign_in_existing(backend, &creds, password).await,
                None => Err(StudioError::InvalidCredentials),
            }
        }
        Err(e) => Err(e),
    }
}

async fn sign_in_existing(
    backend: &Backend,
    creds: &CredentialRow,
    password: &str,
) -> Result<(Session, SignInStatus)> {
    if !verify_password(password, &creds.password_hash) {
        return Err(StudioError::InvalidCredentials);
    }
    ensure_account(backend, &creds.user_id, &creds.email).await?;
    Ok((
        Session {
            user_id: creds.user_id.clone(),
            email: creds.email.clone(),
        },
        SignInStatus::Existing,
    ))
}

async fn sign_up(backend: &Backend, email: &str, password: &str) -> Result<Session> {
    let user_id = Uuid::new_v4().to_string();
    let hash = hash_new_password(password)?;

    let mut tx = backend.pool().begin().await?;
    db::insert_credentials(&mut *tx, &user_id, email, &hash).await?;
    if db::insert_user(&mut *tx, &user_id, email).await? {
        for seed in templates::seed_projects() {
            db::insert_project(&mut *tx, &user_id, &seed).await?;
        }
    }
    tx.commit().await?;

    Ok(Session {
        user_id,
        email: email.to_string(),
    })
}

/// Make sure the profile row exists; seed projects are created only when
/// this call is the one that inserted it.
async fn ensure_account(backend: &Backend, user_id: &str, email: &str) -> Result<()> {
    let mut tx = backend.pool().begin().await?;
    if db::insert_user(&mut *tx, user_id, email).await? {
        info!("Bootstrapping profile for {user_id}");
        for seed in templates::seed_projects() {
            db::insert_project(&mut *tx, user_id, &seed).await?;
        }
    }
    tx.commit().await?;
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Argon2id with the crate defaults, encoded as a PHC string.
fn hash_new_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StudioError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is malformed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> Backend {
        Backend::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn first_sign_in_creates_account_with_seeds() {
        let backend = backend().await;
        let (session, status) = sign_in(&backend, "Dev@Example.com", "hunter2").await.unwrap();

        assert_eq!(status, SignInStatus::NewUser);
        assert_eq!(session.email, "dev@example.com");
        let projects = backend.list_projects(&session.user_id).await.unwrap();
        let mut names: Vec<_> = projects.iter().map(|p| p.name.as_str()).collect();
        names.sort();
        assert_eq!(names, ["Counter", "Hello World"]);
    }

    #[tokio::test]
    async fn second_sign_in_is_existing_and_does_not_reseed() {
        let backend = backend().await;
        let (first, _) = sign_in(&backend, "dev@example.com", "hunter2").await.unwrap();
        let (again, status) = sign_in(&backend, "dev@example.com", "hunter2").await.unwrap();

        assert_eq!(status, SignInStatus::Existing);
        assert_eq!(first, again);
        assert_eq!(backend.list_projects(&again.user_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn wrong_password_gets_generic_message() {
        let backend = backend().await;
        sign_in(&backend, "dev@example.com", "hunter2").await.unwrap();

        let err = sign_in(&backend, "dev@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, StudioError::InvalidCredentials));
        assert_eq!(err.to_string(), "Email or password is incorrect");

        let err = sign_in(&backend, "", "").await.unwrap_err();
        assert_eq!(err.to_string(), "Email or password is incorrect");
    }

    #[tokio::test]
    async fn missing_profile_row_is_restored_on_sign_in() {
        let backend = backend().await;
        let hash = hash_new_password("pw").unwrap();
        db::insert_credentials(backend.pool(), "u-orphan", "orphan@example.com", &hash)
            .await
            .unwrap();

        let (session, status) = sign_in(&backend, "orphan@example.com", "pw").await.unwrap();
        assert_eq!(status, SignInStatus::Existing);
        assert!(backend.get_user(&session.user_id).await.unwrap().is_some());
        assert_eq!(backend.list_projects("u-orphan").await.unwrap().len(), 2);
    }

    #[test]
    fn password_hash_is_salted_argon2id() {
        let hash = hash_new_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("correct horse", "not a phc string"));

        // Same password, fresh salt.
        assert_ne!(hash, hash_new_password("correct horse").unwrap());
    }

    #[tokio::test]
    async fn stored_credential_is_not_a_fast_digest() {
        let backend = backend().await;
        sign_in(&backend, "dev@example.com", "hunter2").await.unwrap();

        let creds = db::find_credentials(backend.pool(), "dev@example.com")
            .await
            .unwrap()
            .unwrap();
        let parsed = PasswordHash::new(&creds.password_hash).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
        assert!(parsed.salt.is_some());
    }
}
