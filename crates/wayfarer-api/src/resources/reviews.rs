// Review routes, flat and nested under tours.
// Decision: Writing a review is for regular accounts only; staff moderate
// through update/delete, never author.

use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;
use wayfarer_core::{Error, Review, Role};
use wayfarer_storage::{
    BindValue, CreateReview, QueryParams, QueryPipeline, ResourceTable, ReviewRow,
    ReviewWithAuthorRow, UpdateReview, REVIEWS_TABLE,
};

use super::{
    create_one, delete_one, get_one, list_all, update_one, CrudResource, DataResponse,
    ListResponse,
};
use crate::auth::{protect, protect_roles, CurrentUser};
use crate::error::ApiError;
use crate::AppState;

const AUTHOR_ROLES: &[Role] = &[Role::Regular];
const MODERATE_ROLES: &[Role] = &[Role::Regular, Role::Admin];

pub fn routes(state: AppState) -> Router {
    let read = protect(
        Router::new()
            .route("/v1/reviews", get(list_all::<ReviewResource>))
            .route("/v1/reviews/:id", get(get_one::<ReviewResource>))
            .route("/v1/tours/:id/reviews", get(list_tour_reviews))
            .with_state(state.clone()),
        state.clone(),
    );

    let write = protect_roles(
        Router::new()
            .route("/v1/reviews", post(create_one::<ReviewResource>))
            .route("/v1/tours/:id/reviews", post(create_tour_review))
            .with_state(state.clone()),
        state.clone(),
        AUTHOR_ROLES,
    );

    let moderate = protect_roles(
        Router::new()
            .route(
                "/v1/reviews/:id",
                patch(update_one::<ReviewResource>).delete(delete_one::<ReviewResource>),
            )
            .with_state(state.clone()),
        state,
        MODERATE_ROLES,
    );

    read.merge(write).merge(moderate)
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub tour_id: Uuid,
    pub review: String,
    pub rating: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateNestedReviewRequest {
    pub review: String,
    pub rating: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewRequest {
    pub review: Option<String>,
    pub rating: Option<i32>,
}

pub struct ReviewResource;

#[async_trait]
impl CrudResource for ReviewResource {
    const NAME: &'static str = "review";

    type Create = CreateReviewRequest;
    type Update = UpdateReviewRequest;
    type Output = Review;

    fn table() -> &'static ResourceTable {
        &REVIEWS_TABLE
    }

    async fn create(
        state: &AppState,
        actor: &CurrentUser,
        input: Self::Create,
    ) -> Result<Self::Output, ApiError> {
        submit_review(state, actor, input.tour_id, input.review, input.rating).await
    }

    async fn fetch(state: &AppState, id: Uuid) -> Result<Option<Self::Output>, ApiError> {
        Ok(state.db.get_review(id).await?.map(|row| to_review(&row)))
    }

    async fn update(
        state: &AppState,
        id: Uuid,
        input: Self::Update,
    ) -> Result<Option<Self::Output>, ApiError> {
        if let Some(rating) = input.rating {
            validate_rating(rating)?;
        }

        let row = state
            .db
            .update_review(
                id,
                UpdateReview {
                    review: input.review,
                    rating: input.rating,
                },
            )
            .await?;

        Ok(row.map(|row| to_review_bare(&row)))
    }

    async fn remove(state: &AppState, id: Uuid) -> Result<bool, ApiError> {
        Ok(state.db.delete_review(id).await?)
    }
}

async fn submit_review(
    state: &AppState,
    actor: &CurrentUser,
    tour_id: Uuid,
    review: String,
    rating: i32,
) -> Result<Review, ApiError> {
    validate_rating(rating)?;
    if review.trim().is_empty() {
        return Err(Error::validation("Review text cannot be empty").into());
    }

    state
        .db
        .get_tour(tour_id)
        .await?
        .ok_or(Error::NotFound("tour"))?;

    let row = state
        .db
        .create_review(CreateReview {
            tour_id,
            author_id: actor.id,
            review,
            rating,
        })
        .await?;

    let mut review = to_review_bare(&row);
    review.author_name = Some(actor.name.clone());
    review.author_photo = actor.photo.clone();
    Ok(review)
}

fn validate_rating(rating: i32) -> Result<(), ApiError> {
    if !(1..=5).contains(&rating) {
        return Err(Error::validation("Rating must be between 1 and 5").into());
    }
    Ok(())
}

fn to_review(row: &ReviewWithAuthorRow) -> Review {
    Review {
        id: row.id,
        tour_id: row.tour_id,
        author_id: row.author_id,
        review: row.review.clone(),
        rating: row.rating,
        author_name: Some(row.author_name.clone()),
        author_photo: row.author_photo.clone(),
        created_at: row.created_at,
    }
}

fn to_review_bare(row: &ReviewRow) -> Review {
    Review {
        id: row.id,
        tour_id: row.tour_id,
        author_id: row.author_id,
        review: row.review.clone(),
        rating: row.rating,
        author_name: None,
        author_photo: None,
        created_at: row.created_at,
    }
}

/// GET /v1/tours/{tour_id}/reviews - Reviews of one tour
pub async fn list_tour_reviews(
    State(state): State<AppState>,
    Path(tour_id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse>, ApiError> {
    let pipeline = QueryPipeline::scoped(
        &REVIEWS_TABLE,
        QueryParams::from_pairs(params),
        "tour_id",
        BindValue::Uuid(tour_id),
    )
    .apply()
    .map_err(ApiError::from)?;

    let records = state.db.list_records(&pipeline).await?;
    Ok(Json(ListResponse::new(records)))
}

/// POST /v1/tours/{tour_id}/reviews - Review the tour in the path
pub async fn create_tour_review(
    State(state): State<AppState>,
    Path(tour_id): Path<Uuid>,
    Extension(actor): Extension<CurrentUser>,
    Json(input): Json<CreateNestedReviewRequest>,
) -> Result<(StatusCode, Json<DataResponse<Review>>), ApiError> {
    let review = submit_review(&state, &actor, tour_id, input.review, input.rating).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(review))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rating() {
        for rating in 1..=5 {
            assert!(validate_rating(rating).is_ok());
        }
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
        assert!(validate_rating(-3).is_err());
    }

    #[test]
    fn test_nested_list_is_scoped_to_tour() {
        let tour_id = Uuid::nil();
        let built = QueryPipeline::scoped(
            &REVIEWS_TABLE,
            QueryParams::new(),
            "tour_id",
            BindValue::Uuid(tour_id),
        )
        .apply()
        .unwrap()
        .build();

        assert!(built.sql.contains("WHERE tour_id = $1"));
        assert_eq!(built.binds, vec![BindValue::Uuid(tour_id)]);
    }
}
