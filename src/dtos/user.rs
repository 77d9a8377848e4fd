use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Recognized list parameters. Anything else in the query string is
/// treated as a filter expression and parsed separately.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListUsersParams {
    /// Rows to skip before the first result.
    #[serde(default)]
    #[param(example = 0)]
    pub skip: i64,

    /// Page size, clamped to 1..=100.
    #[serde(default = "default_limit")]
    #[param(example = 10)]
    pub limit: i64,

    /// Column to sort by. Must be one of the allow-listed fields.
    #[param(example = "name")]
    pub sort_by: Option<String>,

    #[serde(default)]
    pub sort_dir: SortDir,

    /// Case-insensitive match across all filterable fields. Takes
    /// precedence over field filters.
    #[param(example = "jane")]
    pub search: Option<String>,
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    #[schema(example = "John Doe")]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "password123", min_length = 8)]
    pub password: String,

    #[schema(example = json!(["USER"]))]
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,

    #[validate(length(min = 1, message = "Name cannot be empty"))]
    #[schema(example = "John Doe")]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: Option<String>,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "newpassword123", min_length = 8)]
    pub password: Option<String>,

    #[schema(example = json!(["USER", "ADMIN"]))]
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DeleteUserRequest {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "password123")]
    pub password: String,
}
