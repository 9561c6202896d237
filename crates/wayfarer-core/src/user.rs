// User domain type
// The password hash and reset-token fields never leave the storage layer;
// this public shape is what API responses carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub photo: Option<String>,
    pub created_at: DateTime<Utc>,
}
