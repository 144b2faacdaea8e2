//! Request DTOs for the directory API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::{Deserialize, Serialize};

use crate::directory::DEFAULT_PAGE_SIZE;

/// Maximum allowed name length in characters
pub const MAX_NAME_LENGTH: usize = 128;

/// Query string for listings (`?page=&size=`)
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub size: Option<usize>,
}

/// Paging arguments with defaults applied; these are what listings are keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageArgs {
    pub page: usize,
    pub size: usize,
}

impl From<PageQuery> for PageArgs {
    fn from(query: PageQuery) -> Self {
        Self {
            page: query.page.unwrap_or(1),
            size: query.size.unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }
}

/// Request body for adding or updating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRequest {
    pub name: String,
    /// Country code, e.g. "it"
    pub country: String,
}

impl UserRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_name(&self.name).or_else(|| {
            if self.country.trim().is_empty() {
                Some("Country cannot be empty".to_string())
            } else {
                None
            }
        })
    }
}

/// Request body for adding or renaming a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRequest {
    pub name: String,
}

impl GroupRequest {
    pub fn validate(&self) -> Option<String> {
        validate_name(&self.name)
    }
}

fn validate_name(name: &str) -> Option<String> {
    if name.trim().is_empty() {
        return Some("Name cannot be empty".to_string());
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Some(format!(
            "Name exceeds maximum length of {MAX_NAME_LENGTH} characters"
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults() {
        let query: PageQuery = serde_json::from_str("{}").unwrap();
        let args = PageArgs::from(query);
        assert_eq!(args, PageArgs { page: 1, size: 3 });
    }

    #[test]
    fn test_user_request_deserialize() {
        let json = r#"{"name": "Judy", "country": "nz"}"#;
        let req: UserRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.name, "Judy");
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_validate_empty_fields() {
        let req = UserRequest {
            name: " ".to_string(),
            country: "it".to_string(),
        };
        assert!(req.validate().is_some());

        let req = UserRequest {
            name: "Judy".to_string(),
            country: "".to_string(),
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_long_group_name() {
        let req = GroupRequest {
            name: "x".repeat(MAX_NAME_LENGTH + 1),
        };
        assert!(req.validate().is_some());
    }
}
