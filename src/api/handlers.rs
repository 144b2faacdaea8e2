//! API Handlers
//!
//! HTTP request handlers for the directory endpoints. Reads go through the
//! cache; mutations write the directory, then invalidate by tag.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::api::policy::{directory_policy, STATIC_NAMESPACE};
use crate::cache::{Cache, Hooks, MemoryStorage, RedisStorage, SharedStorage, Storage};
use crate::config::{Config, StorageType};
use crate::directory::{Directory, Group, RemovedUser, User};
use crate::error::ApiError;
use crate::models::{
    GroupRequest, HealthResponse, MutationResponse, NamespaceResponse, PageArgs, PageQuery,
    StatsResponse, UserRequest,
};

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Result cache
    pub cache: Arc<Cache>,
    /// Backing data
    pub directory: Arc<Directory>,
}

impl AppState {
    /// Creates a new AppState with the given cache and directory.
    pub fn new(cache: Cache, directory: Directory) -> Self {
        Self {
            cache: Arc::new(cache),
            directory: Arc::new(directory),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds the default namespace on the configured backend, keeps the
    /// static namespace in memory, and seeds the directory.
    pub async fn from_config(config: &Config) -> crate::error::Result<Self> {
        let storage: SharedStorage = match config.storage_type {
            StorageType::Memory => Arc::new(MemoryStorage::new(config.storage_shards)),
            StorageType::Redis => Arc::new(RedisStorage::connect(&config.redis()).await?),
        };
        let cache = Cache::builder()
            .storage(storage)
            .namespace(STATIC_NAMESPACE, Arc::new(MemoryStorage::new(config.storage_shards)))
            .policy(directory_policy())
            .hooks(Hooks::default())
            .default_ttl(config.default_ttl())
            .build();
        Ok(Self::new(cache, Directory::seeded()))
    }

    /// Resolves `operation(args)` through the cache, 404 when the result is null.
    async fn read<A, F, Fut>(&self, operation: &str, args: &A, what: String, compute: F) -> ApiResult<Json<Value>>
    where
        A: Serialize + ?Sized,
        F: FnOnce(Arc<Directory>) -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let directory = Arc::clone(&self.directory);
        let value = self.cache.resolve(operation, args, move || compute(directory)).await?;
        if value.is_null() {
            return Err(ApiError::NotFound(what));
        }
        Ok(Json(value))
    }

    /// Invalidates after a mutation. Invalidation failures are reported in the
    /// body, not as an error status: the mutation has already happened.
    async fn mutated<A, T>(&self, operation: &str, args: &A, result: T) -> Json<MutationResponse<T>>
    where
        A: Serialize + ?Sized,
        T: Serialize,
    {
        let invalidation = self.cache.invalidate_mutation(operation, args, &result).await;
        if let Err(err) = &invalidation {
            warn!(operation, error = %err, "invalidation after mutation failed");
        }
        Json(MutationResponse::new(result, invalidation))
    }
}

fn validated(error: Option<String>) -> ApiResult<()> {
    match error {
        Some(msg) => Err(ApiError::BadRequest(msg)),
        None => Ok(()),
    }
}

// == Queries ==
/// Handler for GET /users/:id
pub async fn get_user(State(state): State<AppState>, Path(id): Path<u32>) -> ApiResult<Json<Value>> {
    state
        .read("user", &json!({ "id": id }), format!("user {id}"), move |directory| async move {
            Ok(serde_json::to_value(directory.user(id).await)?)
        })
        .await
}

/// Handler for GET /users?page&size
pub async fn list_users(State(state): State<AppState>, Query(query): Query<PageQuery>) -> ApiResult<Json<Value>> {
    let args = PageArgs::from(query);
    state
        .read("users", &args, "users".to_string(), move |directory| async move {
            Ok(serde_json::to_value(directory.users(args.page, args.size).await)?)
        })
        .await
}

/// Handler for GET /groups/:id
pub async fn get_group(State(state): State<AppState>, Path(id): Path<u32>) -> ApiResult<Json<Value>> {
    state
        .read("group", &json!({ "id": id }), format!("group {id}"), move |directory| async move {
            Ok(serde_json::to_value(directory.group(id).await)?)
        })
        .await
}

/// Handler for GET /groups?page&size
pub async fn list_groups(State(state): State<AppState>, Query(query): Query<PageQuery>) -> ApiResult<Json<Value>> {
    let args = PageArgs::from(query);
    state
        .read("groups", &args, "groups".to_string(), move |directory| async move {
            Ok(serde_json::to_value(directory.groups(args.page, args.size).await)?)
        })
        .await
}

/// Handler for GET /countries/:id
pub async fn get_country(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let what = format!("country {id}");
    let args = json!({ "id": id });
    state
        .read("country", &args, what, move |directory| async move {
            Ok(serde_json::to_value(directory.country(&id).await)?)
        })
        .await
}

/// Handler for GET /countries
pub async fn list_countries(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state
        .read("countries", &json!({}), "countries".to_string(), |directory| async move {
            Ok(serde_json::to_value(directory.countries().await)?)
        })
        .await
}

// == Mutations ==
/// Handler for POST /users
pub async fn add_user(
    State(state): State<AppState>,
    Json(req): Json<UserRequest>,
) -> ApiResult<(StatusCode, Json<MutationResponse<User>>)> {
    validated(req.validate())?;
    let user = state.directory.add_user(req.name.clone(), req.country.clone()).await;
    let body = state.mutated("addUser", &json!({ "user": req }), user).await;
    Ok((StatusCode::CREATED, body))
}

/// Handler for PUT /users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(req): Json<UserRequest>,
) -> ApiResult<Json<MutationResponse<User>>> {
    validated(req.validate())?;
    let user = state
        .directory
        .update_user(id, req.name.clone(), req.country.clone())
        .await
        .ok_or_else(|| ApiError::NotFound(format!("user {id}")))?;
    Ok(state.mutated("updateUser", &json!({ "id": id, "user": req }), user).await)
}

/// Handler for DELETE /users/:id
pub async fn remove_user(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> ApiResult<Json<MutationResponse<RemovedUser>>> {
    let removed = state
        .directory
        .remove_user(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("user {id}")))?;
    Ok(state.mutated("removeUser", &json!({ "id": id }), removed).await)
}

/// Handler for POST /groups
pub async fn add_group(
    State(state): State<AppState>,
    Json(req): Json<GroupRequest>,
) -> ApiResult<(StatusCode, Json<MutationResponse<Group>>)> {
    validated(req.validate())?;
    let group = state.directory.add_group(req.name.clone()).await;
    let body = state.mutated("addGroup", &json!({ "group": req }), group).await;
    Ok((StatusCode::CREATED, body))
}

/// Handler for PUT /groups/:id
pub async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(req): Json<GroupRequest>,
) -> ApiResult<Json<MutationResponse<Group>>> {
    validated(req.validate())?;
    let group = state
        .directory
        .update_group(id, req.name.clone())
        .await
        .ok_or_else(|| ApiError::NotFound(format!("group {id}")))?;
    Ok(state.mutated("updateGroup", &json!({ "id": id, "group": req }), group).await)
}

/// Handler for DELETE /groups/:id
pub async fn remove_group(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> ApiResult<Json<MutationResponse<u32>>> {
    let removed = state
        .directory
        .remove_group(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("group {id}")))?;
    Ok(state.mutated("removeGroup", &json!({ "id": id }), removed).await)
}

/// Handler for PUT /groups/:group_id/users/:user_id
pub async fn add_user_to_group(
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(u32, u32)>,
) -> ApiResult<Json<MutationResponse<Group>>> {
    let group = state
        .directory
        .add_user_to_group(group_id, user_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("group {group_id} or user {user_id}")))?;
    let args = json!({ "groupId": group_id, "userId": user_id });
    Ok(state.mutated("addUserToGroup", &args, group).await)
}

/// Handler for DELETE /groups/:group_id/users/:user_id
pub async fn remove_user_from_group(
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(u32, u32)>,
) -> ApiResult<Json<MutationResponse<Group>>> {
    let group = state
        .directory
        .remove_user_from_group(group_id, user_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("group {group_id}")))?;
    let args = json!({ "groupId": group_id, "userId": user_id });
    Ok(state.mutated("removeUserFromGroup", &args, group).await)
}

// == Service ==
/// Handler for GET /stats
///
/// Returns the counters accumulated since the last periodic report and the
/// size of every namespace.
pub async fn stats_handler(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let mut namespaces = Vec::new();
    for namespace in state.cache.namespaces() {
        namespaces.push(NamespaceResponse {
            name: namespace.name().to_string(),
            entries: namespace.storage().len().await?,
            indexed_keys: namespace.index().len(),
            tags: namespace.index().tag_count(),
        });
    }

    Ok(Json(StatsResponse::new(
        state.cache.stats(),
        state.cache.in_flight(),
        namespaces,
    )))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
