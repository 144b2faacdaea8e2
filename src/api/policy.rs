//! Demo Caching Policy
//!
//! Tag rules for the directory operations. Single records are tagged
//! `user:<id>`, `group:<id>` and `country:<id>`; listings carry a tag per row
//! plus a collection tag so additions and removals reach them.

use std::time::Duration;

use serde_json::Value;

use crate::cache::{MutationPolicy, OperationPolicy, Policy};

/// Namespace holding data that practically never changes.
pub const STATIC_NAMESPACE: &str = "static";

/// TTL of the static data set.
pub const STATIC_TTL: Duration = Duration::from_secs(86_400);

/// Renders an id field as it appears in a tag.
fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn tag(kind: &str, id: &Value) -> Option<String> {
    id_of(id).map(|id| format!("{kind}:{id}"))
}

/// Tags a single record by the requested id. Missing records are not cached.
fn record(kind: &'static str) -> OperationPolicy {
    OperationPolicy::new(move |args, result| {
        if result.is_null() {
            return None;
        }
        tag(kind, &args["id"]).map(|t| vec![t])
    })
}

/// Tags each row of a listing plus the collection tag.
fn listing(kind: &'static str, collection: impl Fn(&Value) -> String + Send + Sync + 'static) -> OperationPolicy {
    OperationPolicy::new(move |args, result| {
        let rows = result.as_array()?;
        let mut tags: Vec<String> = rows.iter().filter_map(|row| tag(kind, &row["id"])).collect();
        tags.push(collection(args));
        Some(tags)
    })
}

/// The caching policy of the directory service.
pub fn directory_policy() -> Policy {
    Policy::new()
        .query("user", record("user"))
        .query(
            "users",
            listing("user", |args| {
                // The first page also changes when a user is added
                if args["page"].as_u64() == Some(1) {
                    "users:1".to_string()
                } else {
                    "users".to_string()
                }
            }),
        )
        .query("group", record("group"))
        .query("groups", listing("group", |_| "groups".to_string()))
        .query(
            "country",
            record("country")
                .with_ttl(STATIC_TTL)
                .with_storage(STATIC_NAMESPACE),
        )
        .query(
            "countries",
            OperationPolicy::new(|_, _| Some(vec!["countries".to_string()]))
                .with_ttl(STATIC_TTL)
                .with_storage(STATIC_NAMESPACE),
        )
        .mutation(
            "addUser",
            MutationPolicy::new(|_, _| vec!["users".to_string(), "users:1".to_string()]),
        )
        .mutation(
            "updateUser",
            MutationPolicy::new(|args, _| tag("user", &args["id"]).into_iter().collect()),
        )
        .mutation(
            "removeUser",
            MutationPolicy::new(|args, result| {
                let mut tags: Vec<String> = tag("user", &args["id"]).into_iter().collect();
                tags.push("users".to_string());
                tags.push("users:1".to_string());
                if let Some(groups) = result["groups"].as_array() {
                    tags.extend(groups.iter().filter_map(|g| tag("group", g)));
                }
                tags
            }),
        )
        .mutation(
            "addGroup",
            MutationPolicy::new(|_, _| vec!["groups".to_string()]),
        )
        .mutation(
            "updateGroup",
            MutationPolicy::new(|args, _| tag("group", &args["id"]).into_iter().collect()),
        )
        .mutation(
            "removeGroup",
            MutationPolicy::new(|args, _| {
                let mut tags: Vec<String> = tag("group", &args["id"]).into_iter().collect();
                tags.push("groups".to_string());
                tags
            }),
        )
        .mutation("addUserToGroup", MutationPolicy::new(membership_tags))
        .mutation("removeUserFromGroup", MutationPolicy::new(membership_tags))
}

fn membership_tags(args: &Value, _result: &Value) -> Vec<String> {
    [tag("group", &args["groupId"]), tag("user", &args["userId"])]
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_tags() {
        let policy = directory_policy();
        let user = policy.for_query("user").unwrap();

        let tags = user.tags(&json!({"id": 2}), &json!({"id": 2, "name": "Bob"})).unwrap();
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["user:2"]);
        assert!(user.tags(&json!({"id": 42}), &Value::Null).is_none());
    }

    #[test]
    fn test_users_page_tags() {
        let policy = directory_policy();
        let users = policy.for_query("users").unwrap();
        let rows = json!([{"id": 1}, {"id": 2}]);

        let first = users.tags(&json!({"page": 1, "size": 2}), &rows).unwrap();
        assert!(first.contains("users:1"));
        assert!(first.contains("user:1"));
        assert!(!first.contains("users"));

        let second = users.tags(&json!({"page": 2, "size": 2}), &rows).unwrap();
        assert!(second.contains("users"));
        assert!(!second.contains("users:1"));
    }

    #[test]
    fn test_countries_are_static() {
        let policy = directory_policy();
        let country = policy.for_query("country").unwrap();

        assert_eq!(country.storage.as_deref(), Some(STATIC_NAMESPACE));
        assert_eq!(country.ttl, Some(STATIC_TTL));
        let tags = country.tags(&json!({"id": "it"}), &json!({"id": "it"})).unwrap();
        assert!(tags.contains("country:it"));
    }

    #[test]
    fn test_remove_user_reaches_groups() {
        let policy = directory_policy();
        let tags = policy
            .for_mutation("removeUser")
            .unwrap()
            .tags(&json!({"id": 3}), &json!({"id": 3, "groups": [10, 13]}));

        for expected in ["user:3", "users", "users:1", "group:10", "group:13"] {
            assert!(tags.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn test_membership_tags() {
        let policy = directory_policy();
        let tags = policy
            .for_mutation("addUserToGroup")
            .unwrap()
            .tags(&json!({"groupId": 10, "userId": 9}), &Value::Null);
        assert_eq!(tags, vec!["group:10", "user:9"]);
    }
}
