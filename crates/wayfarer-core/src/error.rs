// Error taxonomy for request handling
// Decision: one closed set of operational errors; anything else is Internal
// and its details never reach the caller in production mode.

use thiserror::Error;

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-constraint input
    #[error("{0}")]
    Validation(String),

    /// No credential presented
    #[error("You are not logged in. Please log in to get access.")]
    Unauthenticated,

    /// Credential failed signature or expiry checks
    #[error("Invalid or expired token. Please log in again.")]
    InvalidToken,

    /// Login attempt with a wrong email or password
    #[error("Incorrect email or password")]
    BadCredentials,

    /// Credential references an identity that no longer exists
    #[error("The user belonging to this token no longer exists.")]
    IdentityGone,

    /// Credential was issued before the identity's last password change
    #[error("Password was changed after this token was issued. Please log in again.")]
    StaleCredential,

    /// Identity present but role not permitted
    #[error("You do not have permission to perform this action.")]
    Forbidden,

    /// Record not found
    #[error("No {0} found with that identifier")]
    NotFound(&'static str),

    /// Duplicate value for a unique field
    #[error("{0}")]
    Conflict(String),

    /// Anything unexpected. Never described to the caller in production.
    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// HTTP status code this error maps to
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Unauthenticated
            | Error::InvalidToken
            | Error::BadCredentials
            | Error::IdentityGone
            | Error::StaleCredential => 401,
            Error::Forbidden => 403,
            Error::NotFound(_) => 404,
            Error::Conflict(_) => 409,
            Error::Internal(_) => 500,
        }
    }

    /// Operational errors are expected and safe to describe to the caller.
    pub fn is_operational(&self) -> bool {
        !matches!(self, Error::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::validation("bad").status_code(), 400);
        assert_eq!(Error::Unauthenticated.status_code(), 401);
        assert_eq!(Error::InvalidToken.status_code(), 401);
        assert_eq!(Error::BadCredentials.status_code(), 401);
        assert_eq!(Error::IdentityGone.status_code(), 401);
        assert_eq!(Error::StaleCredential.status_code(), 401);
        assert_eq!(Error::Forbidden.status_code(), 403);
        assert_eq!(Error::NotFound("tour").status_code(), 404);
        assert_eq!(Error::Conflict("email".into()).status_code(), 409);
        assert_eq!(
            Error::Internal(anyhow::anyhow!("driver exploded")).status_code(),
            500
        );
    }

    #[test]
    fn test_operational_split() {
        assert!(Error::NotFound("tour").is_operational());
        assert!(Error::Forbidden.is_operational());
        assert!(!Error::Internal(anyhow::anyhow!("bug")).is_operational());
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = Error::Internal(anyhow::anyhow!("connection pool exhausted at 10.0.0.3"));
        assert_eq!(err.to_string(), "Internal error");
    }
}
