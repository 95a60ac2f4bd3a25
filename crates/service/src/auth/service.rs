use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHasher, PasswordVerifier, SaltString},
    Argon2, PasswordHash,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header as JwtHeader};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use models::user::Role;

use super::domain::{
    AuthSession, AuthUser, LoginInput, RegisterInput, ResetRequest, UpdateDetailsInput,
};
use super::errors::AuthError;
use super::repository::{AuthRepository, NewAuthUser};

const MIN_PASSWORD_LEN: usize = 8;
const RESET_TOKEN_TTL_MINUTES: i64 = 10;

/// Auth service configuration
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub password_algorithm: String,
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { jwt_secret: None, password_algorithm: "argon2".into(), token_ttl_hours: 12 }
    }
}

/// Claims carried in issued bearer tokens.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub uid: String,
    pub role: String,
    pub exp: usize,
}

/// Auth business service independent of web framework
pub struct AuthService<R: AuthRepository> {
    repo: Arc<R>,
    cfg: AuthConfig,
}

impl<R: AuthRepository> AuthService<R> {
    pub fn new(repo: Arc<R>, cfg: AuthConfig) -> Self { Self { repo, cfg } }

    /// Register a new user with a hashed password and issue a session.
    ///
    /// # Examples
    /// ```
    /// use service::auth::{service::{AuthService, AuthConfig}, repository::mock::MockAuthRepository};
    /// use service::auth::domain::RegisterInput;
    /// use std::sync::Arc;
    /// let repo = Arc::new(MockAuthRepository::default());
    /// let svc = AuthService::new(repo, AuthConfig { jwt_secret: Some("secret".into()), ..AuthConfig::default() });
    /// let input = RegisterInput { first_name: "Ada".into(), last_name: "Lovelace".into(), email: " Ada@Example.com ".into(), password: "Secret123".into(), role: None };
    /// let session = tokio_test::block_on(svc.register(input)).unwrap();
    /// assert_eq!(session.user.email, "ada@example.com");
    /// assert!(session.token.is_some());
    /// ```
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<AuthSession, AuthError> {
        if input.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation("password too short (>=8)".into()));
        }
        let email = models::user::normalize_email(&input.email);
        if let Some(existing) = self.repo.find_user_by_email(&email).await? {
            debug!("user exists: {}", existing.email);
            return Err(AuthError::Conflict);
        }

        let user = self
            .repo
            .create_user(&NewAuthUser {
                first_name: input.first_name,
                last_name: input.last_name,
                email,
                role: input.role.unwrap_or(Role::School),
                school_id: None,
            })
            .await?;
        let hash = self.hash_password(&input.password)?;
        let _cred = self
            .repo
            .upsert_password(user.id, hash, self.cfg.password_algorithm.clone())
            .await?;
        info!(user_id = %user.id, email = %user.email, "user_registered");

        let token = self.issue_token(&user)?;
        Ok(AuthSession { user, token })
    }

    /// Authenticate a user and optionally issue a token.
    ///
    /// # Examples
    /// ```
    /// use service::auth::{service::{AuthService, AuthConfig}, repository::mock::MockAuthRepository};
    /// use service::auth::domain::{RegisterInput, LoginInput};
    /// use std::sync::Arc;
    /// let repo = Arc::new(MockAuthRepository::default());
    /// let svc = AuthService::new(repo.clone(), AuthConfig { jwt_secret: Some("secret".into()), ..AuthConfig::default() });
    /// let _ = tokio_test::block_on(svc.register(RegisterInput { first_name: "N".into(), last_name: "O".into(), email: "u@e.com".into(), password: "Passw0rd".into(), role: None }));
    /// let session = tokio_test::block_on(svc.login(LoginInput { email: "u@e.com".into(), password: "Passw0rd".into() })).unwrap();
    /// assert_eq!(session.user.email, "u@e.com");
    /// assert!(session.token.is_some());
    /// ```
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, AuthError> {
        let email = models::user::normalize_email(&input.email);
        let user = self
            .repo
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        self.verify_password(user.id, &input.password).await?;

        let token = self.issue_token(&user)?;
        Ok(AuthSession { user, token })
    }

    /// Current-user lookup for `me` style endpoints.
    pub async fn me(&self, user_id: uuid::Uuid) -> Result<AuthUser, AuthError> {
        self.repo.find_user_by_id(user_id).await?.ok_or(AuthError::NotFound)
    }

    #[instrument(skip(self, input))]
    pub async fn update_details(
        &self,
        user_id: uuid::Uuid,
        input: UpdateDetailsInput,
    ) -> Result<AuthUser, AuthError> {
        if let Some(email) = &input.email {
            let normalized = models::user::normalize_email(email);
            models::user::validate_email(&normalized)
                .map_err(|e| AuthError::Validation(e.to_string()))?;
            if let Some(other) = self.repo.find_user_by_email(&normalized).await? {
                if other.id != user_id {
                    return Err(AuthError::Conflict);
                }
            }
        }
        self.repo
            .update_details(user_id, input.first_name.as_deref(), input.email.as_deref())
            .await
    }

    /// Change password after verifying the current one.
    #[instrument(skip(self, current_password, new_password))]
    pub async fn update_password(
        &self,
        user_id: uuid::Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<AuthSession, AuthError> {
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation("password too short (>=8)".into()));
        }
        let user = self.repo.find_user_by_id(user_id).await?.ok_or(AuthError::NotFound)?;
        self.verify_password(user_id, current_password).await?;

        let hash = self.hash_password(new_password)?;
        self.repo
            .upsert_password(user_id, hash, self.cfg.password_algorithm.clone())
            .await?;
        info!(user_id = %user_id, "password_updated");

        let token = self.issue_token(&user)?;
        Ok(AuthSession { user, token })
    }

    /// Start password recovery: store a hashed single-use token with a short
    /// expiry and return the plain token for out-of-band delivery.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<String, AuthError> {
        let email = models::user::normalize_email(email);
        let user = self.repo.find_user_by_email(&email).await?.ok_or(AuthError::NotFound)?;

        let token: String =
            OsRng.sample_iter(&Alphanumeric).take(40).map(char::from).collect();
        let reset = ResetRequest {
            token_hash: hash_reset_token(&token),
            expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        };
        self.repo.set_reset_request(user.id, &reset).await?;
        info!(user_id = %user.id, "password_reset_requested");
        Ok(token)
    }

    /// Complete password recovery with the token from `forgot_password`.
    #[instrument(skip(self, token, new_password))]
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<AuthSession, AuthError> {
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation("password too short (>=8)".into()));
        }
        let user = self
            .repo
            .take_user_by_reset_token(&hash_reset_token(token), Utc::now())
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let hash = self.hash_password(new_password)?;
        self.repo
            .upsert_password(user.id, hash, self.cfg.password_algorithm.clone())
            .await?;
        info!(user_id = %user.id, "password_reset_completed");

        let token = self.issue_token(&user)?;
        Ok(AuthSession { user, token })
    }

    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string())
    }

    async fn verify_password(&self, user_id: uuid::Uuid, password: &str) -> Result<(), AuthError> {
        let cred = self
            .repo
            .get_credentials(user_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        let parsed = PasswordHash::new(&cred.password_hash)
            .map_err(|e| AuthError::HashError(e.to_string()))?;
        if Argon2::default().verify_password(password.as_bytes(), &parsed).is_err() {
            return Err(AuthError::Unauthorized);
        }
        Ok(())
    }

    fn issue_token(&self, user: &AuthUser) -> Result<Option<String>, AuthError> {
        let Some(secret) = &self.cfg.jwt_secret else { return Ok(None) };
        let exp = (Utc::now() + Duration::hours(self.cfg.token_ttl_hours)).timestamp() as usize;
        let claims = Claims {
            sub: user.email.clone(),
            uid: user.id.to_string(),
            role: user.role.as_str().to_string(),
            exp,
        };
        let token = encode(
            &JwtHeader::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenError(e.to_string()))?;
        Ok(Some(token))
    }
}

/// SHA-256 hex digest of a reset token; only the digest is persisted.
pub fn hash_reset_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repository::mock::MockAuthRepository;

    fn svc() -> AuthService<MockAuthRepository> {
        AuthService::new(
            Arc::new(MockAuthRepository::default()),
            AuthConfig { jwt_secret: Some("test-secret".into()), ..AuthConfig::default() },
        )
    }

    fn register_input(email: &str) -> RegisterInput {
        RegisterInput {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: email.into(),
            password: "Passw0rd!".into(),
            role: None,
        }
    }

    #[tokio::test]
    async fn register_then_login_round_trip() {
        let svc = svc();
        let session = svc.register(register_input("u@example.com")).await.unwrap();
        assert_eq!(session.user.role, Role::School);
        assert!(session.token.is_some());

        let login = svc
            .login(LoginInput { email: "U@Example.com".into(), password: "Passw0rd!".into() })
            .await
            .unwrap();
        assert_eq!(login.user.id, session.user.id);
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_unauthorized() {
        let svc = svc();
        svc.register(register_input("u@example.com")).await.unwrap();
        let err = svc
            .login(LoginInput { email: "u@example.com".into(), password: "wrong-pass".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let svc = svc();
        svc.register(register_input("u@example.com")).await.unwrap();
        let err = svc.register(register_input("u@example.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict));
    }

    #[tokio::test]
    async fn update_password_requires_current() {
        let svc = svc();
        let session = svc.register(register_input("u@example.com")).await.unwrap();
        let err = svc
            .update_password(session.user.id, "not-the-password", "NewPassw0rd")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));

        svc.update_password(session.user.id, "Passw0rd!", "NewPassw0rd").await.unwrap();
        svc.login(LoginInput { email: "u@example.com".into(), password: "NewPassw0rd".into() })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reset_token_is_single_use() {
        let svc = svc();
        svc.register(register_input("u@example.com")).await.unwrap();

        let token = svc.forgot_password("u@example.com").await.unwrap();
        svc.reset_password(&token, "FreshPassw0rd").await.unwrap();
        // the same token cannot be replayed
        let err = svc.reset_password(&token, "OtherPassw0rd").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        svc.login(LoginInput { email: "u@example.com".into(), password: "FreshPassw0rd".into() })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn forgot_password_for_unknown_email_not_found() {
        let svc = svc();
        let err = svc.forgot_password("missing@example.com").await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }
}
