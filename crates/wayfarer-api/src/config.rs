// Application configuration loaded from environment variables.
// Decision: Default to development settings for local runs

/// Runtime environment, controls error detail in responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Development,
    Production,
}

impl AppEnv {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => AppEnv::Production,
            _ => AppEnv::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        *self == AppEnv::Production
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: AppEnv,
    pub bind_addr: String,
    pub database_url: String,
    /// CORS origins; empty means same-origin only
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let env = std::env::var("APP_ENV")
            .map(|s| AppEnv::from_str(&s))
            .unwrap_or_default();

        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:9000".to_string());

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable required"))?;

        let cors_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        Ok(Self {
            env,
            bind_addr,
            database_url,
            cors_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_env_parsing() {
        assert_eq!(AppEnv::from_str("production"), AppEnv::Production);
        assert_eq!(AppEnv::from_str("PROD"), AppEnv::Production);
        assert_eq!(AppEnv::from_str("development"), AppEnv::Development);
        assert_eq!(AppEnv::from_str("anything"), AppEnv::Development);
        assert!(AppEnv::Production.is_production());
        assert!(!AppEnv::Development.is_production());
    }
}
