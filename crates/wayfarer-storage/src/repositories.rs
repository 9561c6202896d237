// Repository layer for database operations

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::*;
use crate::query::{row_to_json, BindValue, QueryPipeline};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // ============================================
    // Generic list queries
    // ============================================

    /// Execute a fully staged pipeline and decode each row using its
    /// projected column set.
    pub async fn list_records(&self, pipeline: &QueryPipeline) -> Result<Vec<JsonValue>> {
        let built = pipeline.build();
        let mut query = sqlx::query(&built.sql);
        for bind in &built.binds {
            query = match bind {
                BindValue::Uuid(v) => query.bind(*v),
                BindValue::Text(v) => query.bind(v.clone()),
                BindValue::Int(v) => query.bind(*v),
                BindValue::Float(v) => query.bind(*v),
                BindValue::Bool(v) => query.bind(*v),
                BindValue::Timestamp(v) => query.bind(*v),
            };
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row_to_json(row, &built.columns))
            .collect()
    }

    // ============================================
    // Users
    // ============================================

    pub async fn create_user(&self, input: CreateUser) -> Result<UserRow> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (name, email, role, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, role, photo, password_hash, password_changed_at,
                      password_reset_token, password_reset_expires, active, created_at
            "#,
        )
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.role)
        .bind(&input.password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, role, photo, password_hash, password_changed_at,
                   password_reset_token, password_reset_expires, active, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Fetch only when the account has not been deactivated. Used by the
    /// auth gate; a deactivated account must look like it no longer exists.
    pub async fn get_active_user(&self, id: Uuid) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, role, photo, password_hash, password_changed_at,
                   password_reset_token, password_reset_expires, active, created_at
            FROM users
            WHERE id = $1 AND active = TRUE
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, role, photo, password_hash, password_changed_at,
                   password_reset_token, password_reset_expires, active, created_at
            FROM users
            WHERE email = $1 AND active = TRUE
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Lookup by hashed reset token; expired tokens do not match.
    pub async fn get_user_by_reset_token(&self, token_hash: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, role, photo, password_hash, password_changed_at,
                   password_reset_token, password_reset_expires, active, created_at
            FROM users
            WHERE password_reset_token = $1
              AND password_reset_expires > NOW()
              AND active = TRUE
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn update_user_profile(
        &self,
        id: Uuid,
        input: UpdateUserProfile,
    ) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                photo = COALESCE($4, photo)
            WHERE id = $1 AND active = TRUE
            RETURNING id, name, email, role, photo, password_hash, password_changed_at,
                      password_reset_token, password_reset_expires, active, created_at
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.photo)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn update_user_admin(
        &self,
        id: Uuid,
        input: UpdateUserAdmin,
    ) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                photo = COALESCE($4, photo),
                role = COALESCE($5, role),
                active = COALESCE($6, active)
            WHERE id = $1
            RETURNING id, name, email, role, photo, password_hash, password_changed_at,
                      password_reset_token, password_reset_expires, active, created_at
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.photo)
        .bind(&input.role)
        .bind(input.active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Soft delete: the record stays for referential integrity but stops
    /// matching any active-only lookup.
    pub async fn deactivate_user(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Rotate the password. Also stamps password_changed_at, which invalidates
    /// every token issued before this moment, and clears any reset token.
    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET
                password_hash = $2,
                password_changed_at = NOW(),
                password_reset_token = NULL,
                password_reset_expires = NULL
            WHERE id = $1 AND active = TRUE
            RETURNING id, name, email, role, photo, password_hash, password_changed_at,
                      password_reset_token, password_reset_expires, active, created_at
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_reset_token = $2, password_reset_expires = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear_reset_token(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_reset_token = NULL, password_reset_expires = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ============================================
    // Tours
    // ============================================

    pub async fn create_tour(&self, input: CreateTour) -> Result<TourRow> {
        let row = sqlx::query_as::<_, TourRow>(
            r#"
            INSERT INTO tours (name, slug, duration, max_group_size, difficulty, price,
                               summary, description, image_cover, images, start_dates,
                               start_location_address, start_location_lat, start_location_lng,
                               secret)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING id, name, slug, duration, max_group_size, difficulty, ratings_average,
                      ratings_quantity, price, summary, description, image_cover, images,
                      start_dates, start_location_address, start_location_lat,
                      start_location_lng, secret, created_at
            "#,
        )
        .bind(&input.name)
        .bind(&input.slug)
        .bind(input.duration)
        .bind(input.max_group_size)
        .bind(&input.difficulty)
        .bind(input.price)
        .bind(&input.summary)
        .bind(&input.description)
        .bind(&input.image_cover)
        .bind(&input.images)
        .bind(&input.start_dates)
        .bind(&input.start_location_address)
        .bind(input.start_location_lat)
        .bind(input.start_location_lng)
        .bind(input.secret)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_tour(&self, id: Uuid) -> Result<Option<TourRow>> {
        let row = sqlx::query_as::<_, TourRow>(
            r#"
            SELECT id, name, slug, duration, max_group_size, difficulty, ratings_average,
                   ratings_quantity, price, summary, description, image_cover, images,
                   start_dates, start_location_address, start_location_lat,
                   start_location_lng, secret, created_at
            FROM tours
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn update_tour(&self, id: Uuid, input: UpdateTour) -> Result<Option<TourRow>> {
        let row = sqlx::query_as::<_, TourRow>(
            r#"
            UPDATE tours
            SET
                name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                duration = COALESCE($4, duration),
                max_group_size = COALESCE($5, max_group_size),
                difficulty = COALESCE($6, difficulty),
                price = COALESCE($7, price),
                summary = COALESCE($8, summary),
                description = COALESCE($9, description),
                image_cover = COALESCE($10, image_cover),
                images = COALESCE($11, images),
                start_dates = COALESCE($12, start_dates),
                start_location_address = COALESCE($13, start_location_address),
                start_location_lat = COALESCE($14, start_location_lat),
                start_location_lng = COALESCE($15, start_location_lng),
                secret = COALESCE($16, secret)
            WHERE id = $1
            RETURNING id, name, slug, duration, max_group_size, difficulty, ratings_average,
                      ratings_quantity, price, summary, description, image_cover, images,
                      start_dates, start_location_address, start_location_lat,
                      start_location_lng, secret, created_at
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(input.duration)
        .bind(input.max_group_size)
        .bind(&input.difficulty)
        .bind(input.price)
        .bind(&input.summary)
        .bind(&input.description)
        .bind(&input.image_cover)
        .bind(&input.images)
        .bind(&input.start_dates)
        .bind(&input.start_location_address)
        .bind(input.start_location_lat)
        .bind(input.start_location_lng)
        .bind(input.secret)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn delete_tour(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tours WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Aggregate statistics per difficulty for well-rated, non-secret tours.
    pub async fn tour_stats(&self) -> Result<Vec<TourStatsRow>> {
        let rows = sqlx::query_as::<_, TourStatsRow>(
            r#"
            SELECT difficulty,
                   COUNT(*) AS num_tours,
                   COALESCE(SUM(ratings_quantity), 0)::bigint AS num_ratings,
                   AVG(ratings_average)::float8 AS avg_rating,
                   AVG(price)::float8 AS avg_price,
                   MIN(price)::float8 AS min_price,
                   MAX(price)::float8 AS max_price
            FROM tours
            WHERE ratings_average >= 4.5 AND secret = FALSE
            GROUP BY difficulty
            ORDER BY avg_price ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Departure counts per month for one calendar year, busiest month
    /// first. Each tour contributes one entry per start date.
    pub async fn monthly_plan(&self, year: i32) -> Result<Vec<MonthlyPlanRow>> {
        let from = Utc
            .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("invalid year: {}", year))?;
        let to = Utc
            .with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("invalid year: {}", year))?;

        let rows = sqlx::query_as::<_, MonthlyPlanRow>(
            r#"
            SELECT EXTRACT(MONTH FROM d)::int AS month,
                   COUNT(*) AS num_tour_starts,
                   ARRAY_AGG(name) AS tours
            FROM tours, UNNEST(start_dates) AS d
            WHERE d >= $1 AND d < $2 AND secret = FALSE
            GROUP BY month
            ORDER BY num_tour_starts DESC, month ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Tours whose start location lies within `radius_km` of the given point.
    /// Great-circle distance via the haversine formula; no geo extension
    /// required.
    pub async fn tours_within(&self, lat: f64, lng: f64, radius_km: f64) -> Result<Vec<TourRow>> {
        let rows = sqlx::query_as::<_, TourRow>(
            r#"
            SELECT id, name, slug, duration, max_group_size, difficulty, ratings_average,
                   ratings_quantity, price, summary, description, image_cover, images,
                   start_dates, start_location_address, start_location_lat,
                   start_location_lng, secret, created_at
            FROM tours
            WHERE start_location_lat IS NOT NULL
              AND start_location_lng IS NOT NULL
              AND secret = FALSE
              AND $4 * acos(LEAST(1.0,
                    cos(radians($1)) * cos(radians(start_location_lat))
                  * cos(radians(start_location_lng) - radians($2))
                  + sin(radians($1)) * sin(radians(start_location_lat)))) <= $3
            "#,
        )
        .bind(lat)
        .bind(lng)
        .bind(radius_km)
        .bind(EARTH_RADIUS_KM)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Distance from the given point to every located tour, nearest first.
    /// `unit_per_km` converts the haversine result (1.0 for km).
    pub async fn tour_distances(
        &self,
        lat: f64,
        lng: f64,
        unit_per_km: f64,
    ) -> Result<Vec<TourDistanceRow>> {
        let rows = sqlx::query_as::<_, TourDistanceRow>(
            r#"
            SELECT id, name,
                   $3 * $4 * acos(LEAST(1.0,
                       cos(radians($1)) * cos(radians(start_location_lat))
                     * cos(radians(start_location_lng) - radians($2))
                     + sin(radians($1)) * sin(radians(start_location_lat)))) AS distance
            FROM tours
            WHERE start_location_lat IS NOT NULL
              AND start_location_lng IS NOT NULL
              AND secret = FALSE
            ORDER BY distance ASC
            "#,
        )
        .bind(lat)
        .bind(lng)
        .bind(unit_per_km)
        .bind(EARTH_RADIUS_KM)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ============================================
    // Reviews
    // ============================================

    pub async fn create_review(&self, input: CreateReview) -> Result<ReviewRow> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r#"
            INSERT INTO reviews (tour_id, author_id, review, rating)
            VALUES ($1, $2, $3, $4)
            RETURNING id, tour_id, author_id, review, rating, created_at
            "#,
        )
        .bind(input.tour_id)
        .bind(input.author_id)
        .bind(&input.review)
        .bind(input.rating)
        .fetch_one(&self.pool)
        .await?;

        self.recompute_tour_ratings(input.tour_id).await?;
        Ok(row)
    }

    pub async fn get_review(&self, id: Uuid) -> Result<Option<ReviewWithAuthorRow>> {
        let row = sqlx::query_as::<_, ReviewWithAuthorRow>(
            r#"
            SELECT r.id, r.tour_id, r.author_id, r.review, r.rating, r.created_at,
                   u.name AS author_name, u.photo AS author_photo
            FROM reviews r
            JOIN users u ON u.id = r.author_id
            WHERE r.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn update_review(&self, id: Uuid, input: UpdateReview) -> Result<Option<ReviewRow>> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r#"
            UPDATE reviews
            SET
                review = COALESCE($2, review),
                rating = COALESCE($3, rating)
            WHERE id = $1
            RETURNING id, tour_id, author_id, review, rating, created_at
            "#,
        )
        .bind(id)
        .bind(&input.review)
        .bind(input.rating)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(review) = &row {
            self.recompute_tour_ratings(review.tour_id).await?;
        }
        Ok(row)
    }

    pub async fn delete_review(&self, id: Uuid) -> Result<bool> {
        let tour_id = sqlx::query_scalar::<_, Uuid>(
            "DELETE FROM reviews WHERE id = $1 RETURNING tour_id",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match tour_id {
            Some(tour_id) => {
                self.recompute_tour_ratings(tour_id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Refresh the denormalized rating columns on the tour. The average is
    /// rounded to one decimal; with no reviews left it falls back to 4.5,
    /// matching the column default.
    pub async fn recompute_tour_ratings(&self, tour_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE tours
            SET ratings_quantity = s.cnt,
                ratings_average = COALESCE(ROUND(s.avg::numeric, 1)::float8, 4.5)
            FROM (
                SELECT COUNT(*)::int AS cnt, AVG(rating)::float8 AS avg
                FROM reviews
                WHERE tour_id = $1
            ) s
            WHERE id = $1
            "#,
        )
        .bind(tour_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ============================================
    // Bookings
    // ============================================

    pub async fn create_booking(&self, input: CreateBooking) -> Result<BookingRow> {
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            INSERT INTO bookings (tour_id, user_id, price, paid)
            VALUES ($1, $2, $3, $4)
            RETURNING id, tour_id, user_id, price, paid, created_at
            "#,
        )
        .bind(input.tour_id)
        .bind(input.user_id)
        .bind(input.price)
        .bind(input.paid)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_booking(&self, id: Uuid) -> Result<Option<BookingWithTourRow>> {
        let row = sqlx::query_as::<_, BookingWithTourRow>(
            r#"
            SELECT b.id, b.tour_id, b.user_id, b.price, b.paid, b.created_at,
                   t.name AS tour_name
            FROM bookings b
            JOIN tours t ON t.id = b.tour_id
            WHERE b.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn update_booking(
        &self,
        id: Uuid,
        input: UpdateBooking,
    ) -> Result<Option<BookingRow>> {
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            UPDATE bookings
            SET
                price = COALESCE($2, price),
                paid = COALESCE($3, paid)
            WHERE id = $1
            RETURNING id, tour_id, user_id, price, paid, created_at
            "#,
        )
        .bind(id)
        .bind(input.price)
        .bind(input.paid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn delete_booking(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
