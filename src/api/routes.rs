//! API Routes
//!
//! Configures the Axum router with all directory endpoints.

use axum::{
    routing::{get, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    add_group, add_user, add_user_to_group, get_country, get_group, get_user, health_handler,
    list_countries, list_groups, list_users, remove_group, remove_user, remove_user_from_group,
    stats_handler, update_group, update_user, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /users`, `POST /users` - List (paged) or add users
/// - `GET /users/:id`, `PUT /users/:id`, `DELETE /users/:id`
/// - `GET /groups`, `POST /groups` - List (paged) or add groups
/// - `GET /groups/:id`, `PUT /groups/:id`, `DELETE /groups/:id`
/// - `PUT /groups/:group_id/users/:user_id` - Add a member
/// - `DELETE /groups/:group_id/users/:user_id` - Remove a member
/// - `GET /countries`, `GET /countries/:id`
/// - `GET /stats` - Get cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/users", get(list_users).post(add_user))
        .route("/users/:id", get(get_user).put(update_user).delete(remove_user))
        .route("/groups", get(list_groups).post(add_group))
        .route("/groups/:id", get(get_group).put(update_group).delete(remove_group))
        .route(
            "/groups/:group_id/users/:user_id",
            put(add_user_to_group).delete(remove_user_from_group),
        )
        .route("/countries", get(list_countries))
        .route("/countries/:id", get(get_country))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::policy::{directory_policy, STATIC_NAMESPACE};
    use crate::cache::{Cache, Hooks, MemoryStorage};
    use crate::directory::Directory;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let cache = Cache::builder()
            .namespace(STATIC_NAMESPACE, Arc::new(MemoryStorage::new(4)))
            .policy(directory_policy())
            .hooks(Hooks::silent())
            .build();
        let directory = Directory::seeded().with_user_latency(Duration::ZERO);
        create_router(AppState::new(cache, directory))
    }

    async fn status_of(app: Router, method: &str, uri: &str) -> StatusCode {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        assert_eq!(status_of(create_test_app(), "GET", "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        assert_eq!(status_of(create_test_app(), "GET", "/stats").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_user_endpoints() {
        assert_eq!(status_of(create_test_app(), "GET", "/users/1").await, StatusCode::OK);
        assert_eq!(status_of(create_test_app(), "GET", "/users/99").await, StatusCode::NOT_FOUND);
        assert_eq!(status_of(create_test_app(), "GET", "/users?page=2&size=2").await, StatusCode::OK);
        assert_eq!(status_of(create_test_app(), "DELETE", "/users/2").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bad_path_parameter() {
        assert_eq!(status_of(create_test_app(), "GET", "/users/abc").await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_membership_endpoint() {
        let status = status_of(create_test_app(), "PUT", "/groups/10/users/9").await;
        assert_eq!(status, StatusCode::OK);

        let status = status_of(create_test_app(), "PUT", "/groups/99/users/9").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_add_user_created() {
        let response = create_test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/users")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"name":"Judy","country":"nz"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
