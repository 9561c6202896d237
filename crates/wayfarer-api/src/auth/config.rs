// Authentication configuration loaded from environment variables.
// Decision: JWT_ prefix for token settings, random dev secret when unset

use std::time::Duration;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWTs
    pub secret: String,
    /// Token lifetime
    pub token_lifetime: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            token_lifetime: Duration::from_secs(90 * 24 * 60 * 60), // 90 days
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt: JwtConfig,
    /// Send the jwt cookie with the Secure attribute
    pub cookie_secure: bool,
    /// How long a password-reset token stays valid
    pub reset_token_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt: JwtConfig::default(),
            cookie_secure: false,
            reset_token_ttl: Duration::from_secs(10 * 60), // 10 minutes
        }
    }
}

impl AuthConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, generating a random secret for this run");
            use rand::Rng;
            let bytes: [u8; 32] = rand::thread_rng().gen();
            hex::encode(bytes)
        });

        let token_lifetime = std::env::var("JWT_EXPIRES_IN_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(90 * 24 * 60 * 60));

        let cookie_secure = std::env::var("COOKIE_SECURE")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(false);

        let reset_token_ttl = std::env::var("RESET_TOKEN_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(10 * 60));

        Self {
            jwt: JwtConfig {
                secret,
                token_lifetime,
            },
            cookie_secure,
            reset_token_ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(
            config.jwt.token_lifetime,
            Duration::from_secs(90 * 24 * 60 * 60)
        );
        assert_eq!(config.reset_token_ttl, Duration::from_secs(10 * 60));
        assert!(!config.cookie_secure);
    }
}
