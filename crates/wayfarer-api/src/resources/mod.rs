// Generic CRUD plumbing shared by every resource collection.
// Decision: one set of handlers, parameterized by a resource trait; each
// resource module wires them into its own router with its own role gates.

pub mod bookings;
pub mod reviews;
pub mod tours;
pub mod users;

use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use uuid::Uuid;
use wayfarer_core::Error;
use wayfarer_storage::{QueryParams, QueryPipeline, ResourceTable};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::AppState;

/// Standard single-record envelope
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}

/// Standard list envelope
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub status: &'static str,
    pub results: usize,
    pub data: Vec<JsonValue>,
}

impl ListResponse {
    pub fn new(data: Vec<JsonValue>) -> Self {
        Self {
            status: "success",
            results: data.len(),
            data,
        }
    }
}

/// A resource collection the generic handlers can serve.
#[async_trait]
pub trait CrudResource: Send + Sync + 'static {
    /// Singular noun for not-found messages
    const NAME: &'static str;

    type Create: DeserializeOwned + Send + 'static;
    type Update: DeserializeOwned + Send + 'static;
    type Output: Serialize + Send + 'static;

    fn table() -> &'static ResourceTable;

    /// Fixed constraints applied to every list query, before any
    /// caller-supplied filter.
    fn base_pipeline(params: QueryParams) -> QueryPipeline {
        QueryPipeline::new(Self::table(), params)
    }

    async fn create(
        state: &AppState,
        actor: &CurrentUser,
        input: Self::Create,
    ) -> Result<Self::Output, ApiError>;

    async fn fetch(state: &AppState, id: Uuid) -> Result<Option<Self::Output>, ApiError>;

    async fn update(
        state: &AppState,
        id: Uuid,
        input: Self::Update,
    ) -> Result<Option<Self::Output>, ApiError>;

    async fn remove(state: &AppState, id: Uuid) -> Result<bool, ApiError>;
}

/// POST - create a record
pub async fn create_one<R: CrudResource>(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Json(input): Json<R::Create>,
) -> Result<(StatusCode, Json<DataResponse<R::Output>>), ApiError> {
    let record = R::create(&state, &actor, input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(record))))
}

/// GET - fetch one record by id
pub async fn get_one<R: CrudResource>(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DataResponse<R::Output>>, ApiError> {
    let record = R::fetch(&state, id)
        .await?
        .ok_or(Error::NotFound(R::NAME))?;
    Ok(Json(DataResponse::new(record)))
}

/// PATCH - partial update
pub async fn update_one<R: CrudResource>(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<R::Update>,
) -> Result<Json<DataResponse<R::Output>>, ApiError> {
    let record = R::update(&state, id, input)
        .await?
        .ok_or(Error::NotFound(R::NAME))?;
    Ok(Json(DataResponse::new(record)))
}

/// DELETE - remove a record
pub async fn delete_one<R: CrudResource>(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = R::remove(&state, id).await?;
    if !deleted {
        return Err(Error::NotFound(R::NAME).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET - staged list query over the collection
pub async fn list_all<R: CrudResource>(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse>, ApiError> {
    let pipeline = R::base_pipeline(QueryParams::from_pairs(params))
        .apply()
        .map_err(ApiError::from)?;
    let records = state.db.list_records(&pipeline).await?;
    Ok(Json(ListResponse::new(records)))
}
