//! API Module
//!
//! HTTP handlers, routing and caching policy for the directory service.
//!
//! # Endpoints
//! - `/users`, `/users/:id` - Users, cached per id and per page
//! - `/groups`, `/groups/:id` - Groups, cached per id and per page
//! - `/groups/:group_id/users/:user_id` - Group membership
//! - `/countries`, `/countries/:id` - Static data, long TTL
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod policy;
pub mod routes;

pub use handlers::*;
pub use policy::{directory_policy, STATIC_NAMESPACE, STATIC_TTL};
pub use routes::create_router;
