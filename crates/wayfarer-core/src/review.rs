// Review domain type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub author_id: Uuid,
    pub review: String,
    /// 1 to 5
    pub rating: i32,
    /// Author name and photo expanded from the user record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_photo: Option<String>,
    pub created_at: DateTime<Utc>,
}
