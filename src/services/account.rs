//! Account lifecycle: self-registration, login, token refresh.

use uuid::Uuid;

use crate::dtos::account::{LoginRequest, RefreshRequest, RegisterRequest, TokenResponse};
use crate::dtos::user::CreateUserRequest;
use crate::error::AppError;
use crate::models::{Permission, UserResponse};
use crate::services::{JwtService, UserService};

#[derive(Clone)]
pub struct AccountService {
    users: UserService,
    jwt: JwtService,
}

impl AccountService {
    pub fn new(users: UserService, jwt: JwtService) -> Self {
        Self { users, jwt }
    }

    /// Self-registration always lands in the base permission set; callers
    /// cannot grant themselves anything through this path.
    pub async fn register(&self, request: RegisterRequest) -> Result<UserResponse, AppError> {
        self.users
            .create(CreateUserRequest {
                name: request.name,
                email: request.email,
                password: request.password,
                permissions: Some(vec![Permission::User.as_str().to_string()]),
            })
            .await
    }

    pub async fn login(&self, request: LoginRequest) -> Result<TokenResponse, AppError> {
        let user = self
            .users
            .authenticate(&request.email, &request.password)
            .await?;

        let (access_token, refresh_token) =
            self.jwt
                .issue_token_pair(&user.id.to_string(), &user.email, &user.name)?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(TokenResponse::new(
            access_token,
            refresh_token,
            self.jwt.access_token_expiry_seconds(),
        ))
    }

    /// Exchange a refresh token for a fresh pair. The subject must still
    /// resolve to a live user; tokens for deleted accounts are rejected.
    pub async fn refresh(&self, request: RefreshRequest) -> Result<TokenResponse, AppError> {
        let claims = self.jwt.verify_refresh_token(&request.refresh_token)?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| {
            AppError::Unauthorized(anyhow::anyhow!("Invalid token: malformed subject"))
        })?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("User no longer exists")))?;

        let (access_token, refresh_token) =
            self.jwt
                .issue_token_pair(&user.id.to_string(), &user.email, &user.name)?;

        Ok(TokenResponse::new(
            access_token,
            refresh_token,
            self.jwt.access_token_expiry_seconds(),
        ))
    }
}
