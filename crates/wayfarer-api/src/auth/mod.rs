// Authentication: JWT issuing, the request gate, and account routes

pub mod config;
pub mod middleware;
pub mod routes;
pub mod token;

pub use config::AuthConfig;
pub use middleware::{protect, protect_roles, CurrentUser, OptionalUser};
pub use routes::routes;
pub use token::TokenService;
