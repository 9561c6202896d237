// Booking domain type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub price: f64,
    pub paid: bool,
    /// Tour name expanded from the tour record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tour_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
