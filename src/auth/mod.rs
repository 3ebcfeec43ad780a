//! Admin session tokens.
//!
//! Admins sign in with username and password and receive an HS256 JWT. Every
//! protected route runs [`auth_middleware`], which validates the bearer token, reloads
//! the admin's current role and active flag, and stores the resulting [`AuthUser`] in
//! the request extensions. Logging out puts the token id on an in-memory denylist
//! until the token would have expired anyway.

pub mod password;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::admin::{self, AdminRole};
use crate::errors::ErrorResponse;

/// JWT claims carried by an admin session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Admin ID
    pub username: String,
    pub role: AdminRole,
    pub jti: String, // Token ID, used for revocation
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated admin extracted from the session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub admin_id: Uuid,
    pub username: String,
    pub role: AdminRole,
    pub token_id: String,
    pub expires_at: i64,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_str() == role
    }

    pub fn is_owner(&self) -> bool {
        self.role == AdminRole::Owner
    }

    /// Fails with `Forbidden` unless the caller is an owner
    pub fn require_owner(&self) -> Result<(), crate::errors::ServiceError> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(crate::errors::ServiceError::Forbidden(
                "Only the shop owner can perform this action".to_string(),
            ))
        }
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let admin_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(Self {
            admin_id,
            username: claims.username,
            role: claims.role,
            token_id: claims.jti,
            expires_at: claims.exp,
        })
    }
}

impl AuthUser {
    /// Applies the stored account over the token claims.
    ///
    /// Role changes and deactivation take effect on the next request, not at token expiry.
    pub fn with_account(mut self, account: Option<&admin::Model>) -> Result<Self, AuthError> {
        let account = account.ok_or(AuthError::InvalidToken)?;
        if !account.is_active {
            return Err(AuthError::AccountDisabled);
        }
        self.username = account.username.clone();
        self.role = account.role;
        Ok(self)
    }
}

/// Used by handlers that need the caller's identity
pub type AuthenticatedUser = AuthUser;

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            token_expiration,
        }
    }
}

/// Token returned by a successful login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: i64,
    pub expires_at: chrono::DateTime<Utc>,
}

/// Issues and validates session tokens
#[derive(Debug, Clone)]
pub struct AuthService {
    config: AuthConfig,
    /// Revoked token ids mapped to the token's expiry (unix seconds)
    denylist: Arc<DashMap<String, i64>>,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            denylist: Arc::new(DashMap::new()),
        }
    }

    /// Generate a session token for an admin
    pub fn generate_token(&self, admin: &admin::Model) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let expires_at = now
            + ChronoDuration::from_std(self.config.token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: admin.id.to_string(),
            username: admin.username.clone(),
            role: admin.role,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(IssuedToken {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.token_expiration.as_secs() as i64,
            expires_at,
        })
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        if self.is_token_revoked(&claims.jti) {
            return Err(AuthError::RevokedToken);
        }

        Ok(claims)
    }

    /// Revokes a token until its natural expiry
    pub fn revoke(&self, token_id: &str, expires_at: i64) {
        self.prune_denylist();
        self.denylist.insert(token_id.to_string(), expires_at);
        debug!(token_id, "session token revoked");
    }

    pub fn is_token_revoked(&self, token_id: &str) -> bool {
        self.denylist.contains_key(token_id)
    }

    /// Drops denylist entries whose tokens have expired
    fn prune_denylist(&self) {
        let now = Utc::now().timestamp();
        self.denylist.retain(|_, exp| *exp > now);
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    RevokedToken,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::TokenCreation(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingAuth => "AUTH_MISSING",
            Self::InvalidCredentials => "AUTH_INVALID_CREDENTIALS",
            Self::AccountDisabled => "AUTH_ACCOUNT_DISABLED",
            Self::InvalidToken => "AUTH_INVALID_TOKEN",
            Self::TokenExpired => "AUTH_TOKEN_EXPIRED",
            Self::RevokedToken => "AUTH_REVOKED_TOKEN",
            Self::TokenCreation(_) => "AUTH_TOKEN_CREATION_FAILED",
            Self::InsufficientPermissions => "AUTH_INSUFFICIENT_PERMISSIONS",
            Self::InternalError(_) => "AUTH_INTERNAL_ERROR",
        }
    }

    pub fn response_message(&self) -> String {
        match self {
            Self::MissingAuth => "Authentication required".to_string(),
            Self::InvalidCredentials => "Invalid username or password".to_string(),
            Self::AccountDisabled => "This account has been disabled".to_string(),
            Self::InvalidToken => "Invalid authentication token".to_string(),
            Self::TokenExpired => "Token has expired".to_string(),
            Self::RevokedToken => "Authentication token has been revoked".to_string(),
            Self::InsufficientPermissions => {
                "You do not have permission to access this resource".to_string()
            }
            Self::TokenCreation(_) | Self::InternalError(_) => {
                "Internal authentication error".to_string()
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(error = %self, "authentication failure");
        }
        let body = ErrorResponse::new(status, self.error_code(), self.response_message());
        (status, Json(body)).into_response()
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authentication middleware that validates the bearer token
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return AuthError::InternalError("Authentication service not available".to_string())
                .into_response();
        }
    };

    let token = match bearer_token(&request) {
        Some(token) => token.to_string(),
        None => return AuthError::MissingAuth.into_response(),
    };

    let user = match auth_service
        .validate_token(&token)
        .and_then(AuthUser::try_from)
    {
        Ok(user) => user,
        Err(e) => {
            debug!(error = %e, "rejected bearer token");
            return e.into_response();
        }
    };

    let Some(db) = request.extensions().get::<Arc<DatabaseConnection>>().cloned() else {
        return AuthError::InternalError("Database not available".to_string()).into_response();
    };
    let account = match admin::Entity::find_by_id(user.admin_id).one(&*db).await {
        Ok(account) => account,
        Err(e) => {
            warn!(error = %e, "failed to load admin for session");
            return AuthError::InternalError("Failed to load account".to_string())
                .into_response();
        }
    };
    let admin_id = user.admin_id;
    let user = match user.with_account(account.as_ref()) {
        Ok(user) => user,
        Err(e) => {
            debug!(error = %e, %admin_id, "session no longer valid");
            return e.into_response();
        }
    };

    request.extensions_mut().insert(user);
    next.run(request).await
}

/// Rejects authenticated callers that lack the required role
pub async fn role_middleware(
    State(required_role): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.has_role(&required_role) {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_role(self, role: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_role(self, role: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            role.to_string(),
            role_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service(ttl: Duration) -> AuthService {
        AuthService::new(AuthConfig::new(
            "k3Vq9ZpL2xR7mW4tY8uN1bH6cJ0fD5gS_Qe-Ta.Wo+Xi/Ur=Ey!Ip?As@Dk#Lz$Mc%Nv^Bx&".into(),
            "shopdesk-api".into(),
            "shopdesk-auth".into(),
            ttl,
        ))
    }

    fn admin(role: AdminRole) -> admin::Model {
        let now = Utc::now();
        admin::Model {
            id: Uuid::new_v4(),
            username: "meera".into(),
            password_hash: String::new(),
            display_name: None,
            role,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn issued_token_validates_into_user() {
        let svc = service(Duration::from_secs(3600));
        let owner = admin(AdminRole::Owner);
        let token = svc.generate_token(&owner).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, 3600);

        let claims = svc.validate_token(&token.access_token).unwrap();
        let user = AuthUser::try_from(claims).unwrap();
        assert_eq!(user.admin_id, owner.id);
        assert_eq!(user.username, "meera");
        assert!(user.is_owner());
        assert!(user.require_owner().is_ok());
    }

    #[test]
    fn revoked_token_is_rejected() {
        let svc = service(Duration::from_secs(3600));
        let token = svc.generate_token(&admin(AdminRole::Staff)).unwrap();
        let claims = svc.validate_token(&token.access_token).unwrap();

        svc.revoke(&claims.jti, claims.exp);
        assert_matches!(
            svc.validate_token(&token.access_token),
            Err(AuthError::RevokedToken)
        );
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let svc = service(Duration::from_secs(3600));
        let other = AuthService::new(AuthConfig::new(
            "Zz9Yy8Xx7Ww6Vv5Uu4Tt3Ss2Rr1Qq0Pp_Oo-Nn.Mm+Ll/Kk=Jj!Ii?Hh@Gg#Ff$Ee%Dd^Cc&".into(),
            "shopdesk-api".into(),
            "shopdesk-auth".into(),
            Duration::from_secs(3600),
        ));
        let token = other.generate_token(&admin(AdminRole::Owner)).unwrap();
        assert_matches!(
            svc.validate_token(&token.access_token),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn staff_is_not_owner() {
        let svc = service(Duration::from_secs(60));
        let token = svc.generate_token(&admin(AdminRole::Staff)).unwrap();
        let user = AuthUser::try_from(svc.validate_token(&token.access_token).unwrap()).unwrap();
        assert!(!user.is_owner());
        assert!(user.has_role("staff"));
        assert!(user.require_owner().is_err());
    }

    #[test]
    fn stored_account_overrides_token_claims() {
        let svc = service(Duration::from_secs(60));
        let mut account = admin(AdminRole::Owner);
        let token = svc.generate_token(&account).unwrap();
        let user = AuthUser::try_from(svc.validate_token(&token.access_token).unwrap()).unwrap();

        account.role = AdminRole::Staff;
        let demoted = user.clone().with_account(Some(&account)).unwrap();
        assert!(!demoted.is_owner());

        account.is_active = false;
        assert_matches!(
            user.clone().with_account(Some(&account)),
            Err(AuthError::AccountDisabled)
        );
        assert_matches!(user.with_account(None), Err(AuthError::InvalidToken));
    }

    #[test]
    fn prune_keeps_only_live_entries() {
        let svc = service(Duration::from_secs(60));
        svc.denylist.insert("old".into(), Utc::now().timestamp() - 10);
        svc.revoke("new", Utc::now().timestamp() + 600);
        assert!(!svc.is_token_revoked("old"));
        assert!(svc.is_token_revoked("new"));
    }
}
