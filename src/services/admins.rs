use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{
        password::{hash_password, verify_password, MIN_PASSWORD_LEN},
        AuthError, AuthService, AuthUser, IssuedToken,
    },
    db::is_unique_violation,
    entities::admin::{self, AdminRole},
    errors::ServiceError,
    services::normalize_string,
};

static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_.\-]{3,32}$").expect("valid username regex"));

/// Usernames are case-insensitive and stored lowercase
pub fn normalize_username(raw: &str) -> Result<String, ServiceError> {
    let username = raw.trim().to_lowercase();
    if !USERNAME_PATTERN.is_match(&username) {
        return Err(ServiceError::ValidationError(
            "username must be 3-32 characters of letters, digits, '.', '_' or '-'".to_string(),
        ));
    }
    Ok(username)
}

fn ensure_password_strength(password: &str) -> Result<(), ServiceError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::ValidationError(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateAdminInput {
    #[validate(length(min = 3, max = 32))]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(max = 120))]
    pub display_name: Option<String>,
    /// Defaults to `staff`; the first account created through setup is always `owner`
    pub role: Option<AdminRole>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginInput {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateAdminInput {
    #[validate(length(max = 120))]
    pub display_name: Option<String>,
    pub role: Option<AdminRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordInput {
    #[validate(length(min = 1, max = 128))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub role: AdminRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<admin::Model> for AdminResponse {
    fn from(model: admin::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            display_name: model.display_name,
            role: model.role,
            is_active: model.is_active,
            last_login_at: model.last_login_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Signed-in admin with a fresh session token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSession {
    pub admin: AdminResponse,
    pub token: IssuedToken,
}

/// Back-office accounts and sign-in
#[derive(Debug, Clone)]
pub struct AdminService {
    db: Arc<DatabaseConnection>,
    auth: Arc<AuthService>,
}

impl AdminService {
    pub fn new(db: Arc<DatabaseConnection>, auth: Arc<AuthService>) -> Self {
        Self { db, auth }
    }

    fn duplicate_username(username: &str) -> ServiceError {
        ServiceError::DuplicateUsername(format!("Username {} is already taken", username))
    }

    async fn find(&self, id: Uuid) -> Result<admin::Model, ServiceError> {
        admin::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Admin {} not found", id)))
    }

    /// Creates the first owner account. Only allowed while no admin exists.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn setup(&self, input: CreateAdminInput) -> Result<AuthSession, ServiceError> {
        input.validate()?;
        let username = normalize_username(&input.username)?;
        ensure_password_strength(&input.password)?;
        let password_hash = hash_password(&input.password)?;

        let txn = self.db.begin().await?;
        if admin::Entity::find().count(&txn).await? > 0 {
            return Err(ServiceError::Conflict(
                "Setup has already been completed".to_string(),
            ));
        }

        let now = Utc::now();
        let model = admin::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.clone()),
            password_hash: Set(password_hash),
            display_name: Set(normalize_string(input.display_name)),
            role: Set(AdminRole::Owner),
            is_active: Set(true),
            last_login_at: Set(Some(now)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Self::duplicate_username(&username)
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;
        txn.commit().await?;

        info!(admin_id = %model.id, "Shop owner account created");
        let token = self.auth.generate_token(&model)?;
        Ok(AuthSession {
            admin: model.into(),
            token,
        })
    }

    /// Adds another admin account
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn create_admin(&self, input: CreateAdminInput) -> Result<AdminResponse, ServiceError> {
        input.validate()?;
        let username = normalize_username(&input.username)?;
        ensure_password_strength(&input.password)?;

        if admin::Entity::find()
            .filter(admin::Column::Username.eq(username.as_str()))
            .one(&*self.db)
            .await?
            .is_some()
        {
            return Err(Self::duplicate_username(&username));
        }

        let now = Utc::now();
        let model = admin::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.clone()),
            password_hash: Set(hash_password(&input.password)?),
            display_name: Set(normalize_string(input.display_name)),
            role: Set(input.role.unwrap_or(AdminRole::Staff)),
            is_active: Set(true),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Self::duplicate_username(&username)
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;

        info!(admin_id = %model.id, role = model.role.as_str(), "Admin created");
        metrics::counter!("shopdesk.admins.created", 1);
        Ok(model.into())
    }

    /// Checks credentials and issues a session token
    #[instrument(skip(self, input))]
    pub async fn authenticate(&self, input: LoginInput) -> Result<AuthSession, ServiceError> {
        input.validate()?;
        let username = input.username.trim().to_lowercase();

        let Some(account) = admin::Entity::find()
            .filter(admin::Column::Username.eq(username.as_str()))
            .one(&*self.db)
            .await?
        else {
            warn!(%username, "Login for unknown username");
            metrics::counter!("shopdesk.auth.login_failures", 1);
            return Err(AuthError::InvalidCredentials.into());
        };

        if !verify_password(&input.password, &account.password_hash)? {
            warn!(admin_id = %account.id, "Login with wrong password");
            metrics::counter!("shopdesk.auth.login_failures", 1);
            return Err(AuthError::InvalidCredentials.into());
        }
        if !account.is_active {
            return Err(AuthError::AccountDisabled.into());
        }

        let mut active: admin::ActiveModel = account.into();
        active.last_login_at = Set(Some(Utc::now()));
        let model = active.update(&*self.db).await?;

        let token = self.auth.generate_token(&model)?;
        info!(admin_id = %model.id, "Admin signed in");
        metrics::counter!("shopdesk.auth.logins", 1);
        Ok(AuthSession {
            admin: model.into(),
            token,
        })
    }

    /// Revokes the caller's current token
    pub fn logout(&self, user: &AuthUser) {
        self.auth.revoke(&user.token_id, user.expires_at);
        info!(admin_id = %user.admin_id, "Admin signed out");
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<AdminResponse, ServiceError> {
        self.find(id).await.map(Into::into)
    }

    pub async fn list(&self) -> Result<Vec<AdminResponse>, ServiceError> {
        let admins = admin::Entity::find()
            .order_by_asc(admin::Column::Username)
            .all(&*self.db)
            .await?;
        Ok(admins.into_iter().map(Into::into).collect())
    }

    /// Owner-side account changes; owners cannot lock themselves out
    #[instrument(skip(self, actor, input), fields(actor = %actor.admin_id))]
    pub async fn update(
        &self,
        actor: &AuthUser,
        id: Uuid,
        input: UpdateAdminInput,
    ) -> Result<AdminResponse, ServiceError> {
        input.validate()?;
        if actor.admin_id == id {
            if input.is_active == Some(false) {
                return Err(ServiceError::InvalidOperation(
                    "You cannot deactivate your own account".to_string(),
                ));
            }
            if input.role.is_some_and(|role| role != AdminRole::Owner) {
                return Err(ServiceError::InvalidOperation(
                    "You cannot remove your own owner role".to_string(),
                ));
            }
        }

        let existing = self.find(id).await?;
        let mut active: admin::ActiveModel = existing.into();
        if input.display_name.is_some() {
            active.display_name = Set(normalize_string(input.display_name));
        }
        if let Some(role) = input.role {
            active.role = Set(role);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());
        let model = active.update(&*self.db).await?;

        info!(admin_id = %id, "Admin updated");
        Ok(model.into())
    }

    #[instrument(skip(self, input))]
    pub async fn change_password(
        &self,
        admin_id: Uuid,
        input: ChangePasswordInput,
    ) -> Result<(), ServiceError> {
        input.validate()?;
        ensure_password_strength(&input.new_password)?;

        let existing = self.find(admin_id).await?;
        if !verify_password(&input.current_password, &existing.password_hash)? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let mut active: admin::ActiveModel = existing.into();
        active.password_hash = Set(hash_password(&input.new_password)?);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        info!(%admin_id, "Admin password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Priya", "priya")]
    #[case("  front.desk_2 ", "front.desk_2")]
    #[case("ab-c", "ab-c")]
    fn usernames_are_lowercased(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_username(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("ab")]
    #[case("has space")]
    #[case("semi;colon")]
    #[case("a_name_that_is_far_too_long_to_accept")]
    fn bad_usernames_rejected(#[case] raw: &str) {
        assert!(normalize_username(raw).is_err());
    }

    #[test]
    fn short_passwords_rejected() {
        assert!(ensure_password_strength("short").is_err());
        assert!(ensure_password_strength("long-enough").is_ok());
    }
}
