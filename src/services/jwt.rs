use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::error::AppError;

/// Discriminates what a token may be used for; checked on every verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    #[serde(default)]
    pub sub: String,
    /// Email
    pub email: String,
    /// Display name
    pub name: String,
    /// Token kind, fixed at issuance
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// JWT service for token generation and validation.
///
/// Signs with a shared HMAC secret; the algorithm and both expiry windows
/// come from configuration and never change after construction.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Result<Self, AppError> {
        if !matches!(
            config.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Token signing requires an HMAC algorithm, got {:?}",
                config.algorithm
            )));
        }

        let secret = config.secret.expose_secret().as_bytes();

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: config.algorithm,
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        })
    }

    /// Issue a short-lived access token.
    pub fn issue_access_token(
        &self,
        user_id: &str,
        email: &str,
        name: &str,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        self.encode_claims(TokenClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            token_type: TokenType::Access,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        })
    }

    /// Issue a long-lived refresh token.
    pub fn issue_refresh_token(
        &self,
        user_id: &str,
        email: &str,
        name: &str,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = now + Duration::days(self.refresh_token_expiry_days);

        self.encode_claims(TokenClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            token_type: TokenType::Refresh,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        })
    }

    /// Issue an access/refresh pair for one user.
    pub fn issue_token_pair(
        &self,
        user_id: &str,
        email: &str,
        name: &str,
    ) -> Result<(String, String), AppError> {
        let access_token = self.issue_access_token(user_id, email, name)?;
        let refresh_token = self.issue_refresh_token(user_id, email, name)?;
        Ok((access_token, refresh_token))
    }

    fn encode_claims(&self, claims: TokenClaims) -> Result<String, AppError> {
        let header = Header::new(self.algorithm);
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode token: {}", e)))
    }

    /// Validate and decode an access token.
    ///
    /// The caller is responsible for resolving the subject to a live user;
    /// this only proves the token itself is genuine, unexpired and of the
    /// right kind.
    pub fn decode_access_token(&self, token: &str) -> Result<TokenClaims, AppError> {
        let claims = self.decode(token, |kind| match kind {
            ErrorKind::ExpiredSignature => "Access token expired. Please log in again.",
            _ => "Could not validate credentials",
        })?;

        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Could not validate credentials"
            )));
        }
        if claims.sub.is_empty() {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Could not validate credentials"
            )));
        }

        Ok(claims)
    }

    /// Validate and decode a refresh token.
    pub fn verify_refresh_token(&self, token: &str) -> Result<TokenClaims, AppError> {
        let claims = self.decode(token, |kind| match kind {
            ErrorKind::ExpiredSignature => "Refresh token expired. Please log in again.",
            _ => "Invalid refresh token",
        })?;

        if claims.token_type != TokenType::Refresh {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Invalid token: not a refresh token"
            )));
        }
        if claims.sub.is_empty() {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Invalid token: missing subject"
            )));
        }

        Ok(claims)
    }

    fn decode(
        &self,
        token: &str,
        message_for: fn(&ErrorKind) -> &'static str,
    ) -> Result<TokenClaims, AppError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;

        let token_data = decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| AppError::Unauthorized(anyhow::anyhow!("{}", message_for(e.kind()))))?;

        Ok(token_data.claims)
    }

    /// Get access token expiry in seconds (for client info).
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}
