// Domain types shared by the storage and API layers.

pub mod booking;
pub mod error;
pub mod review;
pub mod role;
pub mod tour;
pub mod user;

pub use booking::Booking;
pub use error::{Error, Result};
pub use review::Review;
pub use role::Role;
pub use tour::{Difficulty, Tour};
pub use user::User;
