//! Directory Module
//!
//! The demo data domain the cached operations resolve against: users,
//! groups and countries in a volatile in-memory database.

mod seed;

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: usize = 3;

/// Largest page size a listing returns.
pub const MAX_PAGE_SIZE: usize = 100;

/// Latency of the single-user lookup.
pub const SLOW_QUERY_LATENCY: Duration = Duration::from_millis(500);

// == Records ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub name: String,
    /// Country code
    pub country: String,
    /// Ids of the groups the user belongs to
    pub groups: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: u32,
    pub name: String,
    /// Member user ids
    pub users: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: String,
    pub name: String,
}

/// A deleted user and the groups it was removed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedUser {
    pub id: u32,
    pub groups: Vec<u32>,
}

#[derive(Debug, Clone)]
struct UserRow {
    name: String,
    country: String,
}

#[derive(Debug, Clone)]
struct GroupRow {
    name: String,
    users: Vec<u32>,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<u32, UserRow>,
    groups: BTreeMap<u32, GroupRow>,
    countries: BTreeMap<String, String>,
}

impl Tables {
    fn groups_of(&self, user: u32) -> Vec<u32> {
        self.groups
            .iter()
            .filter(|(_, group)| group.users.contains(&user))
            .map(|(id, _)| *id)
            .collect()
    }

    fn user(&self, id: u32) -> Option<User> {
        self.users.get(&id).map(|row| User {
            id,
            name: row.name.clone(),
            country: row.country.clone(),
            groups: self.groups_of(id),
        })
    }

    fn group(&self, id: u32) -> Option<Group> {
        self.groups.get(&id).map(|row| Group {
            id,
            name: row.name.clone(),
            users: row.users.clone(),
        })
    }
}

/// Clamps `page` to `[1, max(1, len)]` and `size` to `[1, MAX_PAGE_SIZE]`,
/// returning the slice bounds.
fn page_bounds(len: usize, page: usize, size: usize) -> (usize, usize) {
    let page = page.min(len).max(1);
    let size = size.clamp(1, MAX_PAGE_SIZE);
    let start = ((page - 1) * size).min(len);
    (start, (page * size).min(len))
}

// == Directory ==
/// Thread-safe directory of users, groups and countries.
#[derive(Debug)]
pub struct Directory {
    tables: RwLock<Tables>,
    user_latency: Duration,
}

impl Directory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            user_latency: Duration::ZERO,
        }
    }

    /// Creates a directory holding the demo data set, with the slow user lookup.
    pub fn seeded() -> Self {
        Self {
            tables: RwLock::new(seed::tables()),
            user_latency: SLOW_QUERY_LATENCY,
        }
    }

    /// Overrides the single-user lookup latency.
    pub fn with_user_latency(mut self, latency: Duration) -> Self {
        self.user_latency = latency;
        self
    }

    // == Queries ==
    /// Looks up one user. Deliberately slow.
    pub async fn user(&self, id: u32) -> Option<User> {
        if !self.user_latency.is_zero() {
            tokio::time::sleep(self.user_latency).await;
        }
        self.tables.read().await.user(id)
    }

    pub async fn users(&self, page: usize, size: usize) -> Vec<User> {
        let tables = self.tables.read().await;
        let (start, end) = page_bounds(tables.users.len(), page, size);
        tables
            .users
            .keys()
            .skip(start)
            .take(end - start)
            .filter_map(|id| tables.user(*id))
            .collect()
    }

    pub async fn group(&self, id: u32) -> Option<Group> {
        self.tables.read().await.group(id)
    }

    pub async fn groups(&self, page: usize, size: usize) -> Vec<Group> {
        let tables = self.tables.read().await;
        let (start, end) = page_bounds(tables.groups.len(), page, size);
        tables
            .groups
            .keys()
            .skip(start)
            .take(end - start)
            .filter_map(|id| tables.group(*id))
            .collect()
    }

    pub async fn country(&self, id: &str) -> Option<Country> {
        let tables = self.tables.read().await;
        tables.countries.get(id).map(|name| Country {
            id: id.to_string(),
            name: name.clone(),
        })
    }

    pub async fn countries(&self) -> Vec<Country> {
        let tables = self.tables.read().await;
        tables
            .countries
            .iter()
            .map(|(id, name)| Country {
                id: id.clone(),
                name: name.clone(),
            })
            .collect()
    }

    // == Mutations ==
    /// Adds a user under the next free id.
    pub async fn add_user(&self, name: String, country: String) -> User {
        let mut tables = self.tables.write().await;
        let id = tables.users.keys().next_back().map_or(1, |max| max + 1);
        tables.users.insert(id, UserRow { name: name.clone(), country: country.clone() });
        User {
            id,
            name,
            country,
            groups: Vec::new(),
        }
    }

    /// Replaces a user's name and country. `None` if the user does not exist.
    pub async fn update_user(&self, id: u32, name: String, country: String) -> Option<User> {
        let mut tables = self.tables.write().await;
        let row = tables.users.get_mut(&id)?;
        row.name = name;
        row.country = country;
        tables.user(id)
    }

    /// Deletes a user and drops it from every group.
    pub async fn remove_user(&self, id: u32) -> Option<RemovedUser> {
        let mut tables = self.tables.write().await;
        tables.users.remove(&id)?;
        let groups = tables.groups_of(id);
        for group in tables.groups.values_mut() {
            group.users.retain(|member| *member != id);
        }
        Some(RemovedUser { id, groups })
    }

    /// Adds an empty group under the next free id.
    pub async fn add_group(&self, name: String) -> Group {
        let mut tables = self.tables.write().await;
        let id = tables.groups.keys().next_back().map_or(1, |max| max + 1);
        tables.groups.insert(id, GroupRow { name: name.clone(), users: Vec::new() });
        Group {
            id,
            name,
            users: Vec::new(),
        }
    }

    /// Renames a group, keeping its members.
    pub async fn update_group(&self, id: u32, name: String) -> Option<Group> {
        let mut tables = self.tables.write().await;
        tables.groups.get_mut(&id)?.name = name;
        tables.group(id)
    }

    pub async fn remove_group(&self, id: u32) -> Option<u32> {
        self.tables.write().await.groups.remove(&id).map(|_| id)
    }

    /// Adds a member to a group. `None` if either record does not exist.
    pub async fn add_user_to_group(&self, group_id: u32, user_id: u32) -> Option<Group> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return None;
        }
        let group = tables.groups.get_mut(&group_id)?;
        if !group.users.contains(&user_id) {
            group.users.push(user_id);
        }
        tables.group(group_id)
    }

    /// Removes a member from a group. `None` if the group does not exist.
    pub async fn remove_user_from_group(&self, group_id: u32, user_id: u32) -> Option<Group> {
        let mut tables = self.tables.write().await;
        tables
            .groups
            .get_mut(&group_id)?
            .users
            .retain(|member| *member != user_id);
        tables.group(group_id)
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Directory {
        Directory::seeded().with_user_latency(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_seed_sizes() {
        let directory = directory();
        assert_eq!(directory.users(1, 100).await.len(), 9);
        assert_eq!(directory.groups(1, 100).await.len(), 7);
        assert_eq!(directory.countries().await.len(), 38);
    }

    #[tokio::test]
    async fn test_user_with_groups() {
        let directory = directory();
        let alice = directory.user(1).await.unwrap();
        assert_eq!(alice.name, "Alice");
        assert_eq!(alice.country, "it");
        assert_eq!(alice.groups, vec![10, 15]);
        assert!(directory.user(99).await.is_none());
    }

    #[tokio::test]
    async fn test_paging_clamps() {
        let directory = directory();

        let first = directory.users(1, 3).await;
        assert_eq!(first.iter().map(|u| u.id).collect::<Vec<_>>(), vec![1, 2, 3]);

        let second = directory.users(2, 3).await;
        assert_eq!(second[0].id, 4);

        // Page 0 reads as page 1, size 0 as size 1
        assert_eq!(directory.users(0, 0).await.len(), 1);
        // Past the end yields an empty page
        assert!(directory.users(9, 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_add_and_update_user() {
        let directory = directory();
        let user = directory.add_user("Judy".into(), "nz".into()).await;
        assert_eq!(user.id, 10);

        let updated = directory.update_user(10, "Judith".into(), "nz".into()).await.unwrap();
        assert_eq!(updated.name, "Judith");
        assert!(directory.update_user(42, "x".into(), "y".into()).await.is_none());
    }

    #[tokio::test]
    async fn test_remove_user_leaves_groups() {
        let directory = directory();
        let removed = directory.remove_user(3).await.unwrap();
        assert_eq!(removed.groups, vec![10, 13, 15]);

        let gamers = directory.group(10).await.unwrap();
        assert_eq!(gamers.users, vec![1, 2]);
        assert!(directory.remove_user(3).await.is_none());
    }

    #[tokio::test]
    async fn test_group_membership() {
        let directory = directory();

        let group = directory.add_user_to_group(10, 9).await.unwrap();
        assert_eq!(group.users, vec![1, 2, 3, 9]);
        // Adding twice keeps one membership
        let group = directory.add_user_to_group(10, 9).await.unwrap();
        assert_eq!(group.users.len(), 4);

        let group = directory.remove_user_from_group(10, 1).await.unwrap();
        assert_eq!(group.users, vec![2, 3, 9]);
        assert!(directory.add_user_to_group(10, 99).await.is_none());
        assert!(directory.remove_user_from_group(99, 1).await.is_none());
    }

    #[tokio::test]
    async fn test_groups_lifecycle() {
        let directory = directory();
        let group = directory.add_group("Climbers".into()).await;
        assert_eq!(group.id, 17);

        let renamed = directory.update_group(17, "Boulderers".into()).await.unwrap();
        assert_eq!(renamed.name, "Boulderers");

        assert_eq!(directory.remove_group(17).await, Some(17));
        assert!(directory.group(17).await.is_none());
    }
}
