// Postgres storage layer with sqlx
//
// This crate provides:
// - Database: repository over a PgPool for all resource collections
// - QueryPipeline: request parameters -> staged list query (filter, sort,
//   field projection, pagination)
// - password: Argon2id hashing and reset-token generation

pub mod models;
pub mod password;
pub mod query;
pub mod repositories;

pub use models::*;
pub use query::{
    BindValue, CmpOp, Column, ColumnType, QueryParams, QueryPipeline, ResourceTable,
    BOOKINGS_TABLE, REVIEWS_TABLE, TOURS_TABLE, USERS_TABLE,
};
pub use repositories::Database;
