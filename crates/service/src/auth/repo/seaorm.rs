use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::auth::domain::{AuthUser, Credentials, ResetRequest};
use crate::auth::errors::AuthError;
use crate::auth::repository::{AuthRepository, NewAuthUser};

pub struct SeaOrmAuthRepository {
    pub db: DatabaseConnection,
}

fn to_auth_user(u: models::user::Model) -> AuthUser {
    AuthUser {
        id: u.id,
        email: u.email,
        first_name: u.first_name,
        last_name: u.last_name,
        role: u.role,
        school_id: u.school_id,
        picture: u.picture,
    }
}

#[async_trait::async_trait]
impl AuthRepository for SeaOrmAuthRepository {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError> {
        let res = models::user::find_by_email(&self.db, email)
            .await
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        Ok(res.map(to_auth_user))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<AuthUser>, AuthError> {
        let res = models::user::Entity::find_by_id(id)
            .filter(models::user::Column::DeletedAt.is_null())
            .one(&self.db)
            .await
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        Ok(res.map(to_auth_user))
    }

    async fn create_user(&self, new: &NewAuthUser) -> Result<AuthUser, AuthError> {
        let created = models::user::create(
            &self.db,
            models::user::NewUser {
                first_name: &new.first_name,
                last_name: &new.last_name,
                email: &new.email,
                role: new.role,
                school_id: new.school_id,
            },
        )
        .await
        .map_err(|e| AuthError::Validation(e.to_string()))?;
        Ok(to_auth_user(created))
    }

    async fn update_details(
        &self,
        id: Uuid,
        first_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<AuthUser, AuthError> {
        let mut am: models::user::ActiveModel = models::user::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| AuthError::Repository(e.to_string()))?
            .ok_or(AuthError::NotFound)?
            .into();
        if let Some(f) = first_name {
            am.first_name = Set(f.to_string());
        }
        if let Some(e) = email {
            am.email = Set(models::user::normalize_email(e));
        }
        am.updated_at = Set(Utc::now().into());
        let updated = am
            .update(&self.db)
            .await
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        Ok(to_auth_user(updated))
    }

    async fn get_credentials(&self, user_id: Uuid) -> Result<Option<Credentials>, AuthError> {
        let res = models::user_credentials::Entity::find()
            .filter(models::user_credentials::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        Ok(res.map(|c| Credentials {
            user_id: c.user_id,
            password_hash: c.password_hash,
            password_algorithm: c.password_algorithm,
        }))
    }

    async fn upsert_password(
        &self,
        user_id: Uuid,
        password_hash: String,
        password_algorithm: String,
    ) -> Result<Credentials, AuthError> {
        let c = models::user_credentials::upsert_password(
            &self.db,
            user_id,
            password_hash,
            &password_algorithm,
        )
        .await
        .map_err(|e| AuthError::Repository(e.to_string()))?;
        Ok(Credentials {
            user_id: c.user_id,
            password_hash: c.password_hash,
            password_algorithm: c.password_algorithm,
        })
    }

    async fn set_reset_request(&self, user_id: Uuid, reset: &ResetRequest) -> Result<(), AuthError> {
        let mut am: models::user::ActiveModel = models::user::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .map_err(|e| AuthError::Repository(e.to_string()))?
            .ok_or(AuthError::NotFound)?
            .into();
        am.reset_password_token = Set(Some(reset.token_hash.clone()));
        am.reset_password_expire = Set(Some(reset.expires_at.into()));
        am.updated_at = Set(Utc::now().into());
        am.update(&self.db)
            .await
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        Ok(())
    }

    async fn take_user_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthUser>, AuthError> {
        let found = models::user::Entity::find()
            .filter(models::user::Column::ResetPasswordToken.eq(token_hash))
            .filter(models::user::Column::ResetPasswordExpire.gt(now))
            .filter(models::user::Column::DeletedAt.is_null())
            .one(&self.db)
            .await
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        let Some(found) = found else { return Ok(None) };

        let mut am: models::user::ActiveModel = found.clone().into();
        am.reset_password_token = Set(None);
        am.reset_password_expire = Set(None);
        am.updated_at = Set(Utc::now().into());
        am.update(&self.db)
            .await
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        Ok(Some(to_auth_user(found)))
    }
}
