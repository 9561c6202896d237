// Booking routes and the checkout-session endpoint.
// Decision: Bookings are written by staff or by the payment webhook; the
// checkout session is the only booking surface a customer touches.

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use wayfarer_core::{Booking, Error, Role};
use wayfarer_storage::{
    BookingRow, BookingWithTourRow, CreateBooking, ResourceTable, UpdateBooking, BOOKINGS_TABLE,
};

use super::{
    create_one, delete_one, get_one, list_all, update_one, CrudResource, DataResponse,
};
use crate::auth::{protect, protect_roles, CurrentUser};
use crate::error::ApiError;
use crate::payments::CheckoutSession;
use crate::AppState;

const STAFF_ROLES: &[Role] = &[Role::Admin, Role::LeadGuide];

pub fn routes(state: AppState) -> Router {
    let checkout = protect(
        Router::new()
            .route(
                "/v1/bookings/checkout-session/:tour_id",
                get(checkout_session),
            )
            .with_state(state.clone()),
        state.clone(),
    );

    let staff = protect_roles(
        Router::new()
            .route(
                "/v1/bookings",
                post(create_one::<BookingResource>).get(list_all::<BookingResource>),
            )
            .route(
                "/v1/bookings/:id",
                get(get_one::<BookingResource>)
                    .patch(update_one::<BookingResource>)
                    .delete(delete_one::<BookingResource>),
            )
            .with_state(state.clone()),
        state,
        STAFF_ROLES,
    );

    checkout.merge(staff)
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub tour_id: Uuid,
    pub user_id: Uuid,
    /// Defaults to the tour's current price
    pub price: Option<f64>,
    #[serde(default = "default_paid")]
    pub paid: bool,
}

fn default_paid() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingRequest {
    pub price: Option<f64>,
    pub paid: Option<bool>,
}

pub struct BookingResource;

#[async_trait]
impl CrudResource for BookingResource {
    const NAME: &'static str = "booking";

    type Create = CreateBookingRequest;
    type Update = UpdateBookingRequest;
    type Output = Booking;

    fn table() -> &'static ResourceTable {
        &BOOKINGS_TABLE
    }

    async fn create(
        state: &AppState,
        _actor: &CurrentUser,
        input: Self::Create,
    ) -> Result<Self::Output, ApiError> {
        let tour = state
            .db
            .get_tour(input.tour_id)
            .await?
            .ok_or(Error::NotFound("tour"))?;

        state
            .db
            .get_user(input.user_id)
            .await?
            .ok_or(Error::NotFound("user"))?;

        let price = input.price.unwrap_or(tour.price);
        if price <= 0.0 {
            return Err(Error::validation("Price must be positive").into());
        }

        let row = state
            .db
            .create_booking(CreateBooking {
                tour_id: input.tour_id,
                user_id: input.user_id,
                price,
                paid: input.paid,
            })
            .await?;

        let mut booking = to_booking_bare(&row);
        booking.tour_name = Some(tour.name);
        Ok(booking)
    }

    async fn fetch(state: &AppState, id: Uuid) -> Result<Option<Self::Output>, ApiError> {
        Ok(state.db.get_booking(id).await?.map(|row| to_booking(&row)))
    }

    async fn update(
        state: &AppState,
        id: Uuid,
        input: Self::Update,
    ) -> Result<Option<Self::Output>, ApiError> {
        if let Some(price) = input.price {
            if price <= 0.0 {
                return Err(Error::validation("Price must be positive").into());
            }
        }

        let row = state
            .db
            .update_booking(
                id,
                UpdateBooking {
                    price: input.price,
                    paid: input.paid,
                },
            )
            .await?;

        Ok(row.map(|row| to_booking_bare(&row)))
    }

    async fn remove(state: &AppState, id: Uuid) -> Result<bool, ApiError> {
        Ok(state.db.delete_booking(id).await?)
    }
}

fn to_booking(row: &BookingWithTourRow) -> Booking {
    Booking {
        id: row.id,
        tour_id: row.tour_id,
        user_id: row.user_id,
        price: row.price,
        paid: row.paid,
        tour_name: Some(row.tour_name.clone()),
        created_at: row.created_at,
    }
}

fn to_booking_bare(row: &BookingRow) -> Booking {
    Booking {
        id: row.id,
        tour_id: row.tour_id,
        user_id: row.user_id,
        price: row.price,
        paid: row.paid,
        tour_name: None,
        created_at: row.created_at,
    }
}

/// GET /v1/bookings/checkout-session/{tour_id} - Start payment for a tour
pub async fn checkout_session(
    State(state): State<AppState>,
    Path(tour_id): Path<Uuid>,
    Extension(actor): Extension<CurrentUser>,
) -> Result<Json<DataResponse<CheckoutSession>>, ApiError> {
    let tour = state
        .db
        .get_tour(tour_id)
        .await?
        .ok_or(Error::NotFound("tour"))?;

    let session = state
        .payments
        .create_checkout_session(&tour, actor.id, &actor.email)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(DataResponse::new(session)))
}
