// Tour routes: CRUD plus the aggregation and geo endpoints.
// Decision: Secret tours never appear in list queries; they stay reachable
// by id for the staff that created them.

use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use wayfarer_core::{Difficulty, Error, Role, Tour};
use wayfarer_storage::{
    CmpOp, BindValue, CreateTour, QueryParams, QueryPipeline, ResourceTable, TourRow, UpdateTour,
    TOURS_TABLE,
};

use super::{
    create_one, delete_one, get_one, update_one, CrudResource, DataResponse, ListResponse,
};
use crate::auth::{protect_roles, CurrentUser, OptionalUser};
use crate::error::ApiError;
use crate::AppState;

const WRITE_ROLES: &[Role] = &[Role::Admin, Role::LeadGuide];
const PLAN_ROLES: &[Role] = &[Role::Admin, Role::LeadGuide, Role::Guide];

const KM_PER_MILE: f64 = 1.60934;
const MILES_PER_KM: f64 = 0.621371;

pub fn routes(state: AppState) -> Router {
    let public = Router::new()
        .route("/v1/tours", get(list_tours))
        .route("/v1/tours/top-5-cheap", get(top_five_cheap))
        .route("/v1/tours/stats", get(tour_stats))
        .route(
            "/v1/tours/within/:distance/center/:latlng/unit/:unit",
            get(tours_within),
        )
        .route("/v1/tours/distances/:latlng/unit/:unit", get(tour_distances))
        .route("/v1/tours/:id", get(get_one::<TourResource>))
        .with_state(state.clone());

    let staff = protect_roles(
        Router::new()
            .route("/v1/tours", axum::routing::post(create_one::<TourResource>))
            .route(
                "/v1/tours/:id",
                axum::routing::patch(update_one::<TourResource>)
                    .delete(delete_one::<TourResource>),
            )
            .with_state(state.clone()),
        state.clone(),
        WRITE_ROLES,
    );

    let plan = protect_roles(
        Router::new()
            .route("/v1/tours/monthly-plan/:year", get(monthly_plan))
            .with_state(state.clone()),
        state,
        PLAN_ROLES,
    );

    public.merge(staff).merge(plan)
}

#[derive(Debug, Deserialize)]
pub struct CreateTourRequest {
    pub name: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub price: f64,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    pub start_location_address: Option<String>,
    pub start_location_lat: Option<f64>,
    pub start_location_lng: Option<f64>,
    #[serde(default)]
    pub secret: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTourRequest {
    pub name: Option<String>,
    pub duration: Option<i32>,
    pub max_group_size: Option<i32>,
    pub difficulty: Option<Difficulty>,
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

pub struct TourResource;

#[async_trait]
impl CrudResource for TourResource {
    const NAME: &'static str = "tour";

    type Create = CreateTourRequest;
    type Update = UpdateTourRequest;
    type Output = Tour;

    fn table() -> &'static ResourceTable {
        &TOURS_TABLE
    }

    fn base_pipeline(params: QueryParams) -> QueryPipeline {
        QueryPipeline::new(Self::table(), params).with_filter(
            "secret",
            CmpOp::Eq,
            BindValue::Bool(false),
        )
    }

    async fn create(
        state: &AppState,
        _actor: &CurrentUser,
        input: Self::Create,
    ) -> Result<Self::Output, ApiError> {
        validate_tour_numbers(input.price, input.duration, input.max_group_size)?;

        let slug = slugify(&input.name);
        let row = state
            .db
            .create_tour(CreateTour {
                name: input.name,
                slug,
                duration: input.duration,
                max_group_size: input.max_group_size,
                difficulty: input.difficulty.as_str().to_string(),
                price: input.price,
                summary: input.summary,
                description: input.description,
                image_cover: input.image_cover,
                images: input.images,
                start_dates: input.start_dates,
                start_location_address: input.start_location_address,
                start_location_lat: input.start_location_lat,
                start_location_lng: input.start_location_lng,
                secret: input.secret,
            })
            .await?;

        Ok(to_tour(&row))
    }

    async fn fetch(state: &AppState, id: Uuid) -> Result<Option<Self::Output>, ApiError> {
        Ok(state.db.get_tour(id).await?.map(|row| to_tour(&row)))
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

        // Renaming regenerates the slug
        let slug = input.name.as_deref().map(slugify);
        let row = state
            .db
            .update_tour(
                id,
                UpdateTour {
                    name: input.name,
                    slug,
                    duration: input.duration,
                    max_group_size: input.max_group_size,
                    difficulty: input.difficulty.map(|d| d.as_str().to_string()),
                    price: input.price,
                    summary: input.summary,
                    description: input.description,
                    image_cover: input.image_cover,
                    images: input.images,
                    start_dates: input.start_dates,
                    start_location_address: input.start_location_address,
                    start_location_lat: input.start_location_lat,
                    start_location_lng: input.start_location_lng,
                    secret: input.secret,
                },
            )
            .await?;

        Ok(row.map(|row| to_tour(&row)))
    }

    async fn remove(state: &AppState, id: Uuid) -> Result<bool, ApiError> {
        Ok(state.db.delete_tour(id).await?)
    }
}

pub fn to_tour(row: &TourRow) -> Tour {
    Tour {
        id: row.id,
        name: row.name.clone(),
        slug: row.slug.clone(),
        duration: row.duration,
        max_group_size: row.max_group_size,
        difficulty: Difficulty::parse(&row.difficulty).unwrap_or(Difficulty::Medium),
        ratings_average: row.ratings_average,
        ratings_quantity: row.ratings_quantity,
        price: row.price,
        summary: row.summary.clone(),
        description: row.description.clone(),
        image_cover: row.image_cover.clone(),
        images: row.images.clone(),
        start_dates: row.start_dates.clone(),
        start_location_address: row.start_location_address.clone(),
        start_location_lat: row.start_location_lat,
        start_location_lng: row.start_location_lng,
        created_at: row.created_at,
    }
}

fn validate_tour_numbers(price: f64, duration: i32, max_group_size: i32) -> Result<(), ApiError> {
    if price <= 0.0 {
        return Err(Error::validation("Price must be positive").into());
    }
    if duration <= 0 {
        return Err(Error::validation("Duration must be positive").into());
    }
    if max_group_size <= 0 {
        return Err(Error::validation("Group size must be positive").into());
    }
    Ok(())
}

pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// GET /v1/tours - List tours. Secret tours only show up for admins.
pub async fn list_tours(
    State(state): State<AppState>,
    user: OptionalUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse>, ApiError> {
    let params = QueryParams::from_pairs(params);
    let pipeline = match user.0 {
        Some(u) if u.role == Role::Admin => QueryPipeline::new(TourResource::table(), params),
        _ => TourResource::base_pipeline(params),
    };

    let pipeline = pipeline.apply().map_err(ApiError::from)?;
    let records = state.db.list_records(&pipeline).await?;
    Ok(Json(ListResponse::new(records)))
}

/// GET /v1/tours/top-5-cheap - Preset list: best rated, then cheapest
pub async fn top_five_cheap(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse>, ApiError> {
    let mut params = QueryParams::from_pairs(params);
    params.set("limit", "5");
    params.set("sort", "-ratings_average,price");
    params.set("fields", "name,price,ratings_average,summary,difficulty");

    let pipeline = TourResource::base_pipeline(params)
        .apply()
        .map_err(ApiError::from)?;
    let records = state.db.list_records(&pipeline).await?;
    Ok(Json(ListResponse::new(records)))
}

#[derive(Debug, Serialize)]
pub struct TourStats {
    pub difficulty: String,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: Option<f64>,
    pub avg_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

/// GET /v1/tours/stats - Aggregate statistics per difficulty
pub async fn tour_stats(
    State(state): State<AppState>,
) -> Result<Json<DataResponse<Vec<TourStats>>>, ApiError> {
    let stats = state
        .db
        .tour_stats()
        .await?
        .into_iter()
        .map(|row| TourStats {
            difficulty: row.difficulty,
            num_tours: row.num_tours,
            num_ratings: row.num_ratings,
            avg_rating: row.avg_rating,
            avg_price: row.avg_price,
            min_price: row.min_price,
            max_price: row.max_price,
        })
        .collect();

    Ok(Json(DataResponse::new(stats)))
}

#[derive(Debug, Serialize)]
pub struct MonthlyPlanEntry {
    pub month: i32,
    pub num_tour_starts: i64,
    pub tours: Vec<String>,
}

/// GET /v1/tours/monthly-plan/{year} - Departures per month of a year
pub async fn monthly_plan(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> Result<Json<DataResponse<Vec<MonthlyPlanEntry>>>, ApiError> {
    if !(1900..=3000).contains(&year) {
        return Err(Error::validation("Year out of range").into());
    }

    let plan = state
        .db
        .monthly_plan(year)
        .await?
        .into_iter()
        .map(|row| MonthlyPlanEntry {
            month: row.month,
            num_tour_starts: row.num_tour_starts,
            tours: row.tours,
        })
        .collect();

    Ok(Json(DataResponse::new(plan)))
}

fn parse_latlng(latlng: &str) -> Result<(f64, f64), ApiError> {
    let mut parts = latlng.splitn(2, ',');
    let lat = parts.next().and_then(|s| s.trim().parse::<f64>().ok());
    let lng = parts.next().and_then(|s| s.trim().parse::<f64>().ok());
    match (lat, lng) {
        (Some(lat), Some(lng)) if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) => {
            Ok((lat, lng))
        }
        _ => Err(Error::validation("Please provide latitude and longitude as lat,lng").into()),
    }
}

fn parse_unit(unit: &str) -> Result<bool, ApiError> {
    match unit {
        "mi" => Ok(true),
        "km" => Ok(false),
        _ => Err(Error::validation("Unit must be 'mi' or 'km'").into()),
    }
}

/// GET /v1/tours/within/{distance}/center/{latlng}/unit/{unit}
pub async fn tours_within(
    State(state): State<AppState>,
    Path((distance, latlng, unit)): Path<(f64, String, String)>,
) -> Result<Json<ListResponse>, ApiError> {
    let (lat, lng) = parse_latlng(&latlng)?;
    let miles = parse_unit(&unit)?;
    if distance <= 0.0 {
        return Err(Error::validation("Distance must be positive").into());
    }

    let radius_km = if miles { distance * KM_PER_MILE } else { distance };

    let tours: Vec<serde_json::Value> = state
        .db
        .tours_within(lat, lng, radius_km)
        .await?
        .iter()
        .map(|row| serde_json::to_value(to_tour(row)))
        .collect::<Result<_, _>>()
        .map_err(|e| ApiError(Error::Internal(e.into())))?;

    Ok(Json(ListResponse::new(tours)))
}

#[derive(Debug, Serialize)]
pub struct TourDistance {
    pub id: Uuid,
    pub name: String,
    pub distance: f64,
}

/// GET /v1/tours/distances/{latlng}/unit/{unit}
pub async fn tour_distances(
    State(state): State<AppState>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Result<Json<DataResponse<Vec<TourDistance>>>, ApiError> {
    let (lat, lng) = parse_latlng(&latlng)?;
    let miles = parse_unit(&unit)?;
    let unit_per_km = if miles { MILES_PER_KM } else { 1.0 };

    let distances = state
        .db
        .tour_distances(lat, lng, unit_per_km)
        .await?
        .into_iter()
        .map(|row| TourDistance {
            id: row.id,
            name: row.name,
            distance: row.distance,
        })
        .collect();

    Ok(Json(DataResponse::new(distances)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Forest Hiker"), "the-forest-hiker");
        assert_eq!(slugify("  Sea -- Explorer!  "), "sea-explorer");
        assert_eq!(slugify("UPPER"), "upper");
    }

    #[test]
    fn test_parse_latlng() {
        assert_eq!(parse_latlng("34.1,-118.1").unwrap(), (34.1, -118.1));
        assert!(parse_latlng("34.1").is_err());
        assert!(parse_latlng("not,numbers").is_err());
        assert!(parse_latlng("95.0,10.0").is_err());
    }

    #[test]
    fn test_parse_unit() {
        assert!(parse_unit("mi").unwrap());
        assert!(!parse_unit("km").unwrap());
        assert!(parse_unit("furlong").is_err());
    }

    #[test]
    fn test_validate_tour_numbers() {
        assert!(validate_tour_numbers(100.0, 5, 10).is_ok());
        assert!(validate_tour_numbers(0.0, 5, 10).is_err());
        assert!(validate_tour_numbers(100.0, 0, 10).is_err());
        assert!(validate_tour_numbers(100.0, 5, -1).is_err());
    }

    #[test]
    fn test_list_excludes_secret_tours() {
        let built = TourResource::base_pipeline(QueryParams::new())
            .apply()
            .unwrap()
            .build();
        assert!(built.sql.contains("secret = $1"));
        assert_eq!(built.binds[0], BindValue::Bool(false));
    }
}
