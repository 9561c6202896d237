// JWT token service for authentication
// Decision: Use HS256 algorithm for simplicity (symmetric key)
// Decision: Claims carry only the user id; identity is re-read from the
// database on every request so revocation takes effect immediately

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::JwtConfig;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// JWT service for token generation and validation
#[derive(Clone)]
pub struct TokenService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Sign a token for a user
    pub fn sign(&self, user_id: Uuid) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::from_std(self.config.token_lifetime)?;

        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).context("Failed to encode token")
    }

    /// Validate and decode a token
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).context("Invalid token")?;

        Ok(token_data.claims)
    }

    /// Token lifetime in seconds
    pub fn token_lifetime_secs(&self) -> i64 {
        self.config.token_lifetime.as_secs() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key-for-testing".to_string(),
            token_lifetime: StdDuration::from_secs(900),
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let service = TokenService::new(test_config());
        let user_id = Uuid::nil();
        let token = service.sign(user_id).unwrap();

        assert!(!token.is_empty());

        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert!(claims.exp > claims.iat);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_invalid_token() {
        let service = TokenService::new(test_config());
        assert!(service.verify("not-a-token").is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let service = TokenService::new(test_config());
        let token = service.sign(Uuid::nil()).unwrap();

        let other = TokenService::new(JwtConfig {
            secret: "a-different-secret".to_string(),
            token_lifetime: StdDuration::from_secs(900),
        });
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // jsonwebtoken applies default leeway, so back-date past it
        let config = test_config();
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::nil().to_string(),
            iat: now - 600,
            exp: now - 120,
        };
        let token = encode(&Header::default(), &claims, &encoding_key).unwrap();

        let service = TokenService::new(config);
        assert!(service.verify(&token).is_err());
    }
}
