//! Directory operations: list/search, lookup, create, update, soft delete.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::db::filter::{self, FilterCondition};
use crate::dtos::user::{CreateUserRequest, DeleteUserRequest, ListUsersParams, UpdateUserRequest};
use crate::error::AppError;
use crate::models::{validate_permissions, User, UserResponse, SORT_FIELDS};
use crate::services::{UserListQuery, UserStore};
use crate::utils::{hash_password, verify_password, Password};

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// List users. Free-text search takes precedence over structured
    /// filter conditions when both are supplied.
    pub async fn list(
        &self,
        params: ListUsersParams,
        conditions: Option<Vec<FilterCondition>>,
    ) -> Result<Vec<UserResponse>, AppError> {
        filter::validate_sort_field(params.sort_by.as_deref(), SORT_FIELDS, "user")?;

        let search = params.search.filter(|s| !s.is_empty());
        let conditions = if search.is_some() { None } else { conditions };

        let query = UserListQuery {
            skip: params.skip.max(0),
            limit: params.limit.clamp(1, 100),
            sort_by: params.sort_by,
            sort_dir: params.sort_dir,
            search,
            conditions,
        };

        let users = self.store.list_users(&query).await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<UserResponse, AppError> {
        let user = self
            .store
            .find_user_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User with ID {} not found", id)))?;
        Ok(user.into())
    }

    pub async fn create(&self, request: CreateUserRequest) -> Result<UserResponse, AppError> {
        let permissions = request.permissions.unwrap_or_default();
        validate_permissions(&permissions)?;

        if self.store.email_in_use(&request.email, None).await? {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Email '{}' is already in use",
                request.email
            )));
        }

        let password_hash = hash_password(&Password::new(request.password))?;
        let user = User::new(request.name, request.email, password_hash, permissions);
        self.store.insert_user(&user).await?;

        tracing::info!(user_id = %user.id, "User created");
        Ok(user.into())
    }

    /// Partial update. Absent fields keep their stored values.
    pub async fn update(&self, request: UpdateUserRequest) -> Result<UserResponse, AppError> {
        let mut user = self
            .store
            .find_user_by_id(request.id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("User with ID {} not found", request.id))
            })?;

        if let Some(permissions) = request.permissions {
            validate_permissions(&permissions)?;
            user.permissions = permissions;
        }

        if let Some(email) = request.email {
            if email != user.email && self.store.email_in_use(&email, Some(user.id)).await? {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Email '{}' is already in use",
                    email
                )));
            }
            user.email = email;
        }

        if let Some(name) = request.name {
            user.name = name;
        }

        if let Some(password) = request.password {
            user.password_hash = hash_password(&Password::new(password))?;
        }

        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;

        tracing::info!(user_id = %user.id, "User updated");
        Ok(user.into())
    }

    /// Soft delete, gated on the account password. The row survives with
    /// `deleted = TRUE` and its email becomes reusable.
    pub async fn delete(&self, request: DeleteUserRequest) -> Result<UserResponse, AppError> {
        let user = self
            .store
            .find_user_by_id(request.id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("User with ID {} not found", request.id))
            })?;

        if !verify_password(&Password::new(request.password), &user.password_hash) {
            return Err(AppError::Unauthorized(anyhow::anyhow!("Incorrect password")));
        }

        let deleted = self
            .store
            .soft_delete_user(user.id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("User with ID {} not found", request.id))
            })?;

        tracing::info!(user_id = %deleted.id, "User deleted");
        Ok(deleted.into())
    }

    /// Credential check for login. Both failure modes return the same
    /// message so the response does not reveal which accounts exist;
    /// the distinction is kept in the logs.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        match self.store.find_user_by_email(email).await? {
            None => {
                tracing::warn!(email = %email, "Login attempt for unknown email");
                Err(AppError::Unauthorized(anyhow::anyhow!(
                    "Invalid email or password"
                )))
            }
            Some(user) => {
                if verify_password(&Password::new(password.to_string()), &user.password_hash) {
                    Ok(user)
                } else {
                    tracing::warn!(user_id = %user.id, "Login attempt with wrong password");
                    Err(AppError::Unauthorized(anyhow::anyhow!(
                        "Invalid email or password"
                    )))
                }
            }
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        self.store.find_user_by_id(id).await
    }
}
