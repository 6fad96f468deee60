//! Pagination for list endpoints.
//!
//! List endpoints accept `limit` together with either `offset` or `page`
//! (1-indexed). `limit` is clamped to `[1, 100]` and defaults to 10; when
//! `page` is present it wins over `offset`.
//!
//! ```ignore
//! async fn list_students(
//!     Query(params): Query<PaginationParams>,
//! ) -> Result<Json<Paginated<Student>>, AppError> {
//!     let students = fetch_students(params.limit(), params.offset()).await?;
//!     let total = count_students().await?;
//!     Ok(Json(Paginated::new(students, &params, total)))
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize};

/// Empty query values (`?limit=`) count as absent.
fn deserialize_optional_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => s.parse::<i64>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Position of a page within the full result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub limit: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    pub has_more: bool,
}

impl PaginationMeta {
    /// Builds the metadata for a page fetched with `params` out of `total` rows.
    pub fn new(params: &PaginationParams, total: i64) -> Self {
        let limit = params.limit();
        let offset = params.offset();
        Self {
            total,
            limit,
            offset: Some(offset),
            page: params.page(),
            has_more: offset + limit < total,
        }
    }
}

/// A page of items together with its pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, params: &PaginationParams, total: i64) -> Self {
        Self {
            data,
            meta: PaginationMeta::new(params, total),
        }
    }
}

/// `?limit=&offset=` or `?limit=&page=` query parameters.
#[derive(Debug, Clone, Hash, Deserialize)]
pub struct PaginationParams {
    /// Maximum number of items to return (1-100, default: 10)
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub limit: Option<i64>,
    /// Number of items to skip (default: 0, ignored if `page` is set)
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub offset: Option<i64>,
    /// Page number (1-indexed, default: 1)
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub page: Option<i64>,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            limit: Some(10),
            offset: Some(0),
            page: Some(1),
        }
    }
}

impl PaginationParams {
    /// Returns the effective limit, clamped to [1, 100].
    ///
    /// Defaults to 10 if not specified.
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }

    /// Returns the effective offset.
    ///
    /// If `page` is set, calculates the offset from the page number.
    /// Otherwise, returns the explicit offset or 0.
    ///
    /// The offset is always clamped to a minimum of 0.
    #[must_use]
    pub fn offset(&self) -> i64 {
        // If page is provided, calculate offset from page
        if let Some(page) = self.page {
            let page = page.max(1);
            let limit = self.limit();
            (page - 1) * limit
        } else {
            self.offset.unwrap_or(0).max(0)
        }
    }

    /// Returns the page number if provided, clamped to a minimum of 1.
    #[must_use]
    pub fn page(&self) -> Option<i64> {
        self.page.map(|p| p.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(limit: Option<i64>, offset: Option<i64>, page: Option<i64>) -> PaginationParams {
        PaginationParams {
            limit,
            offset,
            page,
        }
    }

    #[test]
    fn test_limit_is_clamped() {
        for (input, expected) in [(None, 10), (Some(0), 1), (Some(-3), 1), (Some(40), 40), (Some(500), 100)] {
            assert_eq!(params(input, None, None).limit(), expected);
        }
    }

    #[test]
    fn test_page_takes_precedence_over_offset() {
        let p = params(Some(20), Some(7), Some(3));
        assert_eq!(p.offset(), 40);
        assert_eq!(p.page(), Some(3));
    }

    #[test]
    fn test_negative_offset_and_page_are_clamped() {
        assert_eq!(params(Some(10), Some(-5), None).offset(), 0);
        assert_eq!(params(Some(10), None, Some(-2)).offset(), 0);
    }

    #[test]
    fn test_deserialize_treats_empty_strings_as_missing() {
        let p: PaginationParams = serde_json::from_str(r#"{"limit":"","offset":"15"}"#).unwrap();
        assert_eq!(p.limit(), 10);
        assert_eq!(p.offset(), 15);
    }

    #[test]
    fn test_meta_has_more() {
        let p = params(Some(10), Some(0), None);
        assert!(PaginationMeta::new(&p, 11).has_more);
        assert!(!PaginationMeta::new(&p, 10).has_more);

        let last = params(Some(10), None, Some(2));
        let meta = PaginationMeta::new(&last, 20);
        assert_eq!(meta.offset, Some(10));
        assert!(!meta.has_more);
    }

    #[test]
    fn test_paginated_serializes_data_and_meta() {
        let page = Paginated::new(vec!["a", "b"], &PaginationParams::default(), 2);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["data"].as_array().unwrap().len(), 2);
        assert_eq!(json["meta"]["total"], 2);
        assert_eq!(json["meta"]["has_more"], false);
    }
}
