// Administrative user routes. Self-service lives under /v1/users/me in the
// auth module; everything here requires the admin role.

use async_trait::async_trait;
use axum::{
    routing::{get, post},
    Router,
};
use uuid::Uuid;
use wayfarer_core::{Error, Role, User};
use wayfarer_storage::{
    BindValue, CmpOp, CreateUser, QueryParams, QueryPipeline, ResourceTable, UpdateUserAdmin,
    USERS_TABLE,
};

use super::{create_one, delete_one, get_one, list_all, update_one, CrudResource};
use crate::auth::{protect_roles, routes::public_user, CurrentUser};
use crate::error::ApiError;
use crate::AppState;
use serde::Deserialize;
use wayfarer_storage::password::hash_password;

const ADMIN_ONLY: &[Role] = &[Role::Admin];

pub fn routes(state: AppState) -> Router {
    protect_roles(
        Router::new()
            .route(
                "/v1/users",
                post(create_one::<UserResource>).get(list_all::<UserResource>),
            )
            .route(
                "/v1/users/:id",
                get(get_one::<UserResource>)
                    .patch(update_one::<UserResource>)
                    .delete(delete_one::<UserResource>),
            )
            .with_state(state.clone()),
        state,
        ADMIN_ONLY,
    )
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
}

pub struct UserResource;

#[async_trait]
impl CrudResource for UserResource {
    const NAME: &'static str = "user";

    type Create = CreateUserRequest;
    type Update = UpdateUserRequest;
    type Output = User;

    fn table() -> &'static ResourceTable {
        &USERS_TABLE
    }

    // Deactivated accounts are gone from every lookup, admin ones included
    fn base_pipeline(params: QueryParams) -> QueryPipeline {
        QueryPipeline::new(Self::table(), params).with_filter(
            "active",
            CmpOp::Eq,
            BindValue::Bool(true),
        )
    }

    async fn create(
        state: &AppState,
        _actor: &CurrentUser,
        input: Self::Create,
    ) -> Result<Self::Output, ApiError> {
        if input.password.len() < 8 {
            return Err(Error::validation("Password must be at least 8 characters").into());
        }

        let password_hash =
            hash_password(&input.password).map_err(|e| ApiError(Error::Internal(e)))?;

        let row = state
            .db
            .create_user(CreateUser {
                name: input.name,
                email: input.email.to_lowercase(),
                role: input.role.as_str().to_string(),
                password_hash,
            })
            .await?;

        Ok(public_user(&row))
    }

    async fn fetch(state: &AppState, id: Uuid) -> Result<Option<Self::Output>, ApiError> {
        Ok(state
            .db
            .get_active_user(id)
            .await?
            .map(|row| public_user(&row)))
    }

    async fn update(
        state: &AppState,
        id: Uuid,
        input: Self::Update,
    ) -> Result<Option<Self::Output>, ApiError> {
        let row = state
            .db
            .update_user_admin(
                id,
                UpdateUserAdmin {
                    name: input.name,
                    email: input.email.map(|e| e.to_lowercase()),
                    photo: input.photo,
                    role: input.role.map(|r| r.as_str().to_string()),
                    active: input.active,
                },
            )
            .await?;

        Ok(row.map(|row| public_user(&row)))
    }

    async fn remove(state: &AppState, id: Uuid) -> Result<bool, ApiError> {
        Ok(state.db.delete_user(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_excludes_inactive_accounts() {
        let built = UserResource::base_pipeline(QueryParams::new())
            .apply()
            .unwrap()
            .build();
        assert!(built.sql.contains("WHERE active = $1"));
        assert_eq!(built.binds, vec![BindValue::Bool(true)]);
    }

    #[test]
    fn test_listing_filters_combine_with_active_constraint() {
        let mut params = QueryParams::new();
        params.set("role", "guide");

        let built = UserResource::base_pipeline(params).apply().unwrap().build();
        assert!(built.sql.contains("WHERE active = $1 AND role = $2"));
    }
}
