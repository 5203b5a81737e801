//! Query DTOs - Data Transfer Objects per query di ricerca e paginazione

use serde::{Deserialize, Serialize};

/// GET /users
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct UserListQuery {
    pub search: Option<String>,
    #[serde(rename = "followers-of")]
    pub followers_of: Option<i32>,
    #[serde(rename = "following-of")]
    pub following_of: Option<i32>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Paginazione generica limit/offset
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    /// Applica default e tetto massimo, scartando valori negativi
    pub fn resolve(&self, default_limit: i64, max_limit: i64) -> (i64, i64) {
        let limit = self.limit.unwrap_or(default_limit).clamp(1, max_limit);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults_and_clamp() {
        assert_eq!(PageQuery::default().resolve(20, 100), (20, 0));
        let q = PageQuery {
            limit: Some(1000),
            offset: Some(-5),
        };
        assert_eq!(q.resolve(20, 100), (100, 0));
    }
}
