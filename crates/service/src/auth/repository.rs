use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use models::user::Role;

use super::domain::{AuthUser, Credentials, ResetRequest};
use super::errors::AuthError;

/// Input for creating a user through the auth repository.
#[derive(Debug, Clone)]
pub struct NewAuthUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub school_id: Option<Uuid>,
}

/// Repository abstraction for auth-related persistence.
#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<AuthUser>, AuthError>;
    async fn create_user(&self, new: &NewAuthUser) -> Result<AuthUser, AuthError>;
    async fn update_details(
        &self,
        id: Uuid,
        first_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<AuthUser, AuthError>;

    async fn get_credentials(&self, user_id: Uuid) -> Result<Option<Credentials>, AuthError>;
    async fn upsert_password(
        &self,
        user_id: Uuid,
        password_hash: String,
        password_algorithm: String,
    ) -> Result<Credentials, AuthError>;

    async fn set_reset_request(&self, user_id: Uuid, reset: &ResetRequest) -> Result<(), AuthError>;
    /// Resolve an unexpired reset-token hash to its user and clear the
    /// request so the token is single-use.
    async fn take_user_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthUser>, AuthError>;
}

/// Simple in-memory mock repository for tests and doc examples
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockAuthRepository {
        users: Mutex<HashMap<Uuid, AuthUser>>,
        creds: Mutex<HashMap<Uuid, Credentials>>,
        resets: Mutex<HashMap<Uuid, ResetRequest>>,
    }

    #[async_trait]
    impl AuthRepository for MockAuthRepository {
        async fn find_user_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError> {
            let email = models::user::normalize_email(email);
            let users = self.users.lock().unwrap();
            Ok(users.values().find(|u| u.email == email).cloned())
        }

        async fn find_user_by_id(&self, id: Uuid) -> Result<Option<AuthUser>, AuthError> {
            let users = self.users.lock().unwrap();
            Ok(users.get(&id).cloned())
        }

        async fn create_user(&self, new: &NewAuthUser) -> Result<AuthUser, AuthError> {
            let email = models::user::normalize_email(&new.email);
            let mut users = self.users.lock().unwrap();
            if users.values().any(|u| u.email == email) {
                return Err(AuthError::Conflict);
            }
            let user = AuthUser {
                id: Uuid::new_v4(),
                email,
                first_name: new.first_name.clone(),
                last_name: new.last_name.clone(),
                role: new.role,
                school_id: new.school_id,
                picture: "no-user.jpg".into(),
            };
            users.insert(user.id, user.clone());
            Ok(user)
        }

        async fn update_details(
            &self,
            id: Uuid,
            first_name: Option<&str>,
            email: Option<&str>,
        ) -> Result<AuthUser, AuthError> {
            let mut users = self.users.lock().unwrap();
            let user = users.get_mut(&id).ok_or(AuthError::NotFound)?;
            if let Some(f) = first_name {
                user.first_name = f.to_string();
            }
            if let Some(e) = email {
                user.email = models::user::normalize_email(e);
            }
            Ok(user.clone())
        }

        async fn get_credentials(&self, user_id: Uuid) -> Result<Option<Credentials>, AuthError> {
            let creds = self.creds.lock().unwrap();
            Ok(creds.get(&user_id).cloned())
        }

        async fn upsert_password(
            &self,
            user_id: Uuid,
            password_hash: String,
            password_algorithm: String,
        ) -> Result<Credentials, AuthError> {
            let mut creds = self.creds.lock().unwrap();
            let c = Credentials { user_id, password_hash, password_algorithm };
            creds.insert(user_id, c.clone());
            Ok(c)
        }

        async fn set_reset_request(
            &self,
            user_id: Uuid,
            reset: &ResetRequest,
        ) -> Result<(), AuthError> {
            let mut resets = self.resets.lock().unwrap();
            resets.insert(user_id, reset.clone());
            Ok(())
        }

        async fn take_user_by_reset_token(
            &self,
            token_hash: &str,
            now: DateTime<Utc>,
        ) -> Result<Option<AuthUser>, AuthError> {
            let mut resets = self.resets.lock().unwrap();
            let hit = resets
                .iter()
                .find(|(_, r)| r.token_hash == token_hash && r.expires_at > now)
                .map(|(id, _)| *id);
            let Some(user_id) = hit else { return Ok(None) };
            resets.remove(&user_id);
            let users = self.users.lock().unwrap();
            Ok(users.get(&user_id).cloned())
        }
    }
}
