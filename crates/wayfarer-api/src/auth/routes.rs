// Authentication and account HTTP routes.
// Decision: Tokens go out both in the JSON body and as an HttpOnly cookie
// Decision: Signup always creates a regular account; roles are assigned
// through the admin user routes only

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use wayfarer_core::{Error, Role, User};
use wayfarer_storage::{
    password::{generate_reset_token, hash_password, hash_reset_token, verify_password},
    CreateUser, UpdateUserProfile, UserRow,
};

use super::middleware::{protect, CurrentUser};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password_current: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    /// Present only when the caller tries to sneak a password change through
    /// the profile route; always rejected.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_confirm: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub status: &'static str,
    pub token: String,
    pub data: UserEnvelope,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub status: &'static str,
    pub message: String,
}

pub fn routes(state: AppState) -> Router {
    let public = Router::new()
        .route("/v1/auth/signup", post(signup))
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/logout", get(logout))
        .route("/v1/auth/forgot-password", post(forgot_password))
        .route("/v1/auth/reset-password/:token", patch(reset_password))
        .with_state(state.clone());

    let protected = protect(
        Router::new()
            .route("/v1/auth/update-password", patch(update_password))
            .route(
                "/v1/users/me",
                get(get_me).patch(update_me).delete(delete_me),
            )
            .with_state(state.clone()),
        state,
    );

    public.merge(protected)
}

pub fn public_user(row: &UserRow) -> User {
    User {
        id: row.id,
        name: row.name.clone(),
        email: row.email.clone(),
        role: Role::parse(&row.role).unwrap_or_default(),
        photo: row.photo.clone(),
        created_at: row.created_at,
    }
}

fn check_no_credential_fields(req: &UpdateMeRequest) -> Result<(), ApiError> {
    if req.password.is_some() || req.password_confirm.is_some() {
        return Err(Error::validation(
            "This route is not for password updates. Please use /v1/auth/update-password",
        )
        .into());
    }
    Ok(())
}

fn check_password_pair(password: &str, confirm: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(Error::validation("Password must be at least 8 characters").into());
    }
    if password != confirm {
        return Err(Error::validation("Passwords do not match").into());
    }
    Ok(())
}

/// Issue a token for the user and mirror it into the jwt cookie.
fn token_response(
    state: &AppState,
    jar: CookieJar,
    user: &UserRow,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    let token = state
        .tokens
        .sign(user.id)
        .map_err(|e| ApiError(Error::Internal(e)))?;

    let cookie = Cookie::build(("jwt", token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.auth_config.cookie_secure)
        .max_age(time::Duration::seconds(state.tokens.token_lifetime_secs()))
        .build();

    Ok((
        jar.add(cookie),
        Json(TokenResponse {
            status: "success",
            token,
            data: UserEnvelope {
                user: public_user(user),
            },
        }),
    ))
}

/// POST /v1/auth/signup - Create an account and log it in
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, CookieJar, Json<TokenResponse>), ApiError> {
    check_password_pair(&req.password, &req.password_confirm)?;

    let password_hash =
        hash_password(&req.password).map_err(|e| ApiError(Error::Internal(e)))?;

    let user = state
        .db
        .create_user(CreateUser {
            name: req.name,
            email: req.email.to_lowercase(),
            role: Role::Regular.as_str().to_string(),
            password_hash,
        })
        .await?;

    // Best effort; a failed welcome email must not fail the signup
    if let Err(e) = state
        .mailer
        .send(
            &user.email,
            "Welcome to Wayfarer",
            &format!("Hi {}, welcome to Wayfarer! Happy travels.", user.name),
        )
        .await
    {
        tracing::warn!("Failed to send welcome email: {}", e);
    }

    let (jar, json) = token_response(&state, jar, &user)?;
    Ok((StatusCode::CREATED, jar, json))
}

/// POST /v1/auth/login - Login with email and password
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(Error::validation("Please provide email and password").into());
    }

    let user = state
        .db
        .get_user_by_email(&req.email.to_lowercase())
        .await?
        .ok_or(Error::BadCredentials)?;

    let valid = verify_password(&req.password, &user.password_hash)
        .map_err(|e| ApiError(Error::Internal(e)))?;
    if !valid {
        return Err(Error::BadCredentials.into());
    }

    token_response(&state, jar, &user)
}

/// GET /v1/auth/logout - Clear the jwt cookie
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        jar.remove(Cookie::build("jwt").path("/")),
        Json(MessageResponse {
            status: "success",
            message: "Logged out".to_string(),
        }),
    )
}

/// POST /v1/auth/forgot-password - Email a reset token
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = state
        .db
        .get_user_by_email(&req.email.to_lowercase())
        .await?
        .ok_or(Error::NotFound("user"))?;

    let token = generate_reset_token();
    let expires_at = Utc::now()
        + Duration::from_std(state.auth_config.reset_token_ttl)
            .map_err(|e| ApiError(Error::Internal(e.into())))?;

    state
        .db
        .set_reset_token(user.id, &token.hash, expires_at)
        .await?;

    let body = format!(
        "Forgot your password? Submit a PATCH request with your new password to \
         /v1/auth/reset-password/{}. The link is valid for {} minutes. \
         If you didn't forget your password, please ignore this email.",
        token.plain,
        state.auth_config.reset_token_ttl.as_secs() / 60
    );

    // A token that was never delivered must not stay usable
    if let Err(e) = state
        .mailer
        .send(&user.email, "Your password reset token", &body)
        .await
    {
        state.db.clear_reset_token(user.id).await?;
        tracing::error!("Failed to send reset email: {}", e);
        return Err(ApiError(Error::Internal(e)));
    }

    Ok(Json(MessageResponse {
        status: "success",
        message: "Token sent to email".to_string(),
    }))
}

/// PATCH /v1/auth/reset-password/{token} - Set a new password via token
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    jar: CookieJar,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    check_password_pair(&req.password, &req.password_confirm)?;

    let token_hash = hash_reset_token(&token);
    let user = state
        .db
        .get_user_by_reset_token(&token_hash)
        .await?
        .ok_or_else(|| Error::validation("Token is invalid or has expired"))?;

    let password_hash =
        hash_password(&req.password).map_err(|e| ApiError(Error::Internal(e)))?;

    let user = state
        .db
        .update_password(user.id, &password_hash)
        .await?
        .ok_or(Error::IdentityGone)?;

    token_response(&state, jar, &user)
}

/// PATCH /v1/auth/update-password - Rotate the password while logged in
pub async fn update_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    check_password_pair(&req.password, &req.password_confirm)?;

    let user = state
        .db
        .get_active_user(current.id)
        .await?
        .ok_or(Error::IdentityGone)?;

    let valid = verify_password(&req.password_current, &user.password_hash)
        .map_err(|e| ApiError(Error::Internal(e)))?;
    if !valid {
        return Err(Error::validation("Your current password is wrong").into());
    }

    let password_hash =
        hash_password(&req.password).map_err(|e| ApiError(Error::Internal(e)))?;

    let user = state
        .db
        .update_password(user.id, &password_hash)
        .await?
        .ok_or(Error::IdentityGone)?;

    token_response(&state, jar, &user)
}

/// GET /v1/users/me - Current user's profile
pub async fn get_me(
    Extension(current): Extension<CurrentUser>,
) -> Json<UserEnvelope> {
    Json(UserEnvelope {
        user: User {
            id: current.id,
            name: current.name,
            email: current.email,
            role: current.role,
            photo: current.photo,
            created_at: current.created_at,
        },
    })
}

/// PATCH /v1/users/me - Update own profile (never credentials)
pub async fn update_me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<UpdateMeRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    check_no_credential_fields(&req)?;

    let user = state
        .db
        .update_user_profile(
            current.id,
            UpdateUserProfile {
                name: req.name,
                email: req.email.map(|e| e.to_lowercase()),
                photo: req.photo,
            },
        )
        .await?
        .ok_or(Error::IdentityGone)?;

    Ok(Json(UserEnvelope {
        user: public_user(&user),
    }))
}

/// DELETE /v1/users/me - Deactivate own account
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<StatusCode, ApiError> {
    state.db.deactivate_user(current.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_rejects_credential_fields() {
        let ok: UpdateMeRequest =
            serde_json::from_value(serde_json::json!({ "name": "New Name" })).unwrap();
        assert!(check_no_credential_fields(&ok).is_ok());

        let with_password: UpdateMeRequest =
            serde_json::from_value(serde_json::json!({ "password": "sneaky123" })).unwrap();
        assert!(check_no_credential_fields(&with_password).is_err());

        // A lone confirmation field is just as much a password change attempt
        let with_confirm: UpdateMeRequest =
            serde_json::from_value(serde_json::json!({ "password_confirm": "sneaky123" }))
                .unwrap();
        assert!(check_no_credential_fields(&with_confirm).is_err());
    }

    #[test]
    fn test_password_pair_validation() {
        assert!(check_password_pair("longenough", "longenough").is_ok());
        assert!(check_password_pair("short", "short").is_err());
        assert!(check_password_pair("longenough", "different1").is_err());
    }

    #[test]
    fn test_public_user_hides_credentials() {
        let row = UserRow {
            id: uuid::Uuid::nil(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            role: "lead-guide".to_string(),
            photo: None,
            password_hash: "$argon2id$secret".to_string(),
            password_changed_at: None,
            password_reset_token: Some("hash".to_string()),
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
        };

        let user = public_user(&row);
        assert_eq!(user.role, Role::LeadGuide);

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password_reset_token").is_none());
    }

    #[test]
    fn test_unknown_role_string_defaults_to_regular() {
        let row = UserRow {
            id: uuid::Uuid::nil(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            role: "superuser".to_string(),
            photo: None,
            password_hash: String::new(),
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
        };
        assert_eq!(public_user(&row).role, Role::Regular);
    }
}
