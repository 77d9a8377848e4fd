//! User model - directory entries with soft-delete semantics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

/// Fields that list requests may filter or search on.
pub const FILTER_FIELDS: &[&str] = &["name", "email"];

/// Fields that list requests may sort on.
pub const SORT_FIELDS: &[&str] = &["name", "email"];

/// Permission codes assignable to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    User,
    Admin,
}

impl Permission {
    pub const ALL: [Permission; 2] = [Permission::User, Permission::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::User => "USER",
            Permission::Admin => "ADMIN",
        }
    }
}

/// Reject permission values outside the closed set.
pub fn validate_permissions(permissions: &[String]) -> Result<(), AppError> {
    let valid: Vec<&str> = Permission::ALL.iter().map(|p| p.as_str()).collect();
    for permission in permissions {
        if !valid.contains(&permission.as_str()) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Permission '{}' is not valid. Valid permissions: {}",
                permission,
                valid.join(", ")
            )));
        }
    }
    Ok(())
}

/// User entity as stored. The hash never leaves the service layer.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted: bool,
}

impl User {
    /// Create a new, live user.
    pub fn new(name: String, email: String, password_hash: String, permissions: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            permissions,
            created_at: now,
            updated_at: now,
            deleted: false,
        }
    }

    /// Convert to sanitized response (no sensitive fields).
    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// User response for API (without sensitive fields).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            permissions: u.permissions,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_live() {
        let user = User::new(
            "Ana".to_string(),
            "ana@example.com".to_string(),
            "$argon2id$...".to_string(),
            vec![Permission::User.as_str().to_string()],
        );
        assert!(!user.deleted);
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn test_sanitized_drops_hash() {
        let user = User::new(
            "Ana".to_string(),
            "ana@example.com".to_string(),
            "$argon2id$...".to_string(),
            vec![],
        );
        let response = user.sanitized();
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "ana@example.com");
    }

    #[test]
    fn test_validate_permissions_accepts_known_values() {
        let permissions = vec!["USER".to_string(), "ADMIN".to_string()];
        assert!(validate_permissions(&permissions).is_ok());
        assert!(validate_permissions(&[]).is_ok());
    }

    #[test]
    fn test_validate_permissions_rejects_unknown_values() {
        let permissions = vec!["USER".to_string(), "ROOT".to_string()];
        let err = validate_permissions(&permissions).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("ROOT"));
        assert!(message.contains("USER, ADMIN"));
    }
}
