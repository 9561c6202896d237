// Database models (internal, may differ from public DTOs)

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================
// User models
// ============================================

/// Full user record, including credential columns that never leave this
/// crate's callers unfiltered.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub photo: Option<String>,
    pub password_hash: String,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub role: String,
    pub password_hash: String,
}

/// Self-service profile update. Role and credentials go through dedicated
/// operations, never through here.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
}

/// Administrative update, may also change role and active flag.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserAdmin {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Option<String>,
    pub active: Option<bool>,
}

// ============================================
// Tour models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct TourRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: String,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub start_location_address: Option<String>,
    pub start_location_lat: Option<f64>,
    pub start_location_lng: Option<f64>,
    pub secret: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTour {
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: String,
    pub price: f64,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub start_location_address: Option<String>,
    pub start_location_lat: Option<f64>,
    pub start_location_lng: Option<f64>,
    pub secret: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTour {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub duration: Option<i32>,
    pub max_group_size: Option<i32>,
    pub difficulty: Option<String>,
    pub price: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub start_location_address: Option<String>,
    pub start_location_lat: Option<f64>,
    pub start_location_lng: Option<f64>,
    pub secret: Option<bool>,
}

/// One bucket of the aggregated tour statistics, grouped by difficulty.
#[derive(Debug, Clone, FromRow)]
pub struct TourStatsRow {
    pub difficulty: String,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: Option<f64>,
    pub avg_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

/// One month of the yearly departure plan.
#[derive(Debug, Clone, FromRow)]
pub struct MonthlyPlanRow {
    pub month: i32,
    pub num_tour_starts: i64,
    pub tours: Vec<String>,
}

/// Tour plus its distance from a reference point, in the requested unit.
#[derive(Debug, Clone, FromRow)]
pub struct TourDistanceRow {
    pub id: Uuid,
    pub name: String,
    pub distance: f64,
}

// ============================================
// Review models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct ReviewRow {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub author_id: Uuid,
    pub review: String,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
}

/// Review with author info joined
#[derive(Debug, Clone, FromRow)]
pub struct ReviewWithAuthorRow {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub author_id: Uuid,
    pub review: String,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
    pub author_name: String,
    pub author_photo: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateReview {
    pub tour_id: Uuid,
    pub author_id: Uuid,
    pub review: String,
    pub rating: i32,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateReview {
    pub review: Option<String>,
    pub rating: Option<i32>,
}

// ============================================
// Booking models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct BookingRow {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub price: f64,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

/// Booking with tour name joined
#[derive(Debug, Clone, FromRow)]
pub struct BookingWithTourRow {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub price: f64,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
    pub tour_name: String,
}

#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub price: f64,
    pub paid: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateBooking {
    pub price: Option<f64>,
    pub paid: Option<bool>,
}
