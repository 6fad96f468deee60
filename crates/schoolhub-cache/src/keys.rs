//! Cache key builders and invalidation helpers.
//!
//! Keys are relative; [`RedisCache`] adds the configured namespace. Keys for
//! one entity share a prefix so a single prefix scan clears them.

use tracing::warn;
use uuid::Uuid;

use crate::RedisCache;

pub mod students {
    use super::*;

    pub fn by_id(student_id: Uuid) -> String {
        format!("student:{student_id}")
    }

    pub fn list(school_id: Uuid, filters_hash: &str) -> String {
        format!("students:{school_id}:{filters_hash}")
    }

    pub fn list_prefix(school_id: Uuid) -> String {
        format!("students:{school_id}:")
    }
}

pub mod courses {
    use super::*;

    pub fn by_id(course_id: Uuid) -> String {
        format!("course:{course_id}")
    }

    pub fn roster(course_id: Uuid) -> String {
        format!("course:{course_id}:roster")
    }

    pub fn list(school_id: Uuid, filters_hash: &str) -> String {
        format!("courses:{school_id}:{filters_hash}")
    }

    pub fn list_prefix(school_id: Uuid) -> String {
        format!("courses:{school_id}:")
    }
}

pub mod gpa {
    use super::*;

    pub fn student(student_id: Uuid) -> String {
        format!("gpa:{student_id}")
    }
}

pub mod settings {
    use super::*;

    /// `school_id = None` addresses the global scope.
    pub fn scope(school_id: Option<Uuid>) -> String {
        match school_id {
            Some(id) => format!("settings:{id}"),
            None => "settings:global".to_string(),
        }
    }
}

/// Short stable digest of filter parameters, for list keys.
pub fn hash_filters<T: std::hash::Hash>(filters: &T) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::Hasher;

    let mut hasher = DefaultHasher::new();
    filters.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

/// Invalidation after writes. Failures are logged and swallowed; a stale
/// entry expires with its TTL.
pub mod invalidate {
    use super::*;

    async fn key(cache: &RedisCache, key: &str) {
        if let Err(e) = cache.invalidate(key).await {
            warn!(error = %e, cache.key = %key, "Failed to invalidate cache key");
        }
    }

    async fn prefix(cache: &RedisCache, prefix: &str) {
        if let Err(e) = cache.invalidate_pattern(prefix).await {
            warn!(error = %e, cache.prefix = %prefix, "Failed to invalidate cache prefix");
        }
    }

    pub async fn student(cache: Option<&RedisCache>, student_id: Uuid, school_id: Uuid) {
        let Some(cache) = cache else { return };
        key(cache, &students::by_id(student_id)).await;
        key(cache, &gpa::student(student_id)).await;
        prefix(cache, &students::list_prefix(school_id)).await;
    }

    /// Drops the course entry, its roster, and list pages. Rosters change on
    /// every enrollment, so enrollment writes call this too.
    pub async fn course(cache: Option<&RedisCache>, course_id: Uuid, school_id: Uuid) {
        let Some(cache) = cache else { return };
        prefix(cache, &courses::by_id(course_id)).await;
        prefix(cache, &courses::list_prefix(school_id)).await;
    }

    pub async fn gpa(cache: Option<&RedisCache>, student_id: Uuid) {
        let Some(cache) = cache else { return };
        key(cache, &gpa::student(student_id)).await;
    }

    pub async fn gpas(cache: Option<&RedisCache>, student_ids: &[Uuid]) {
        let Some(cache) = cache else { return };
        for student_id in student_ids {
            key(cache, &gpa::student(*student_id)).await;
        }
    }

    pub async fn settings(cache: Option<&RedisCache>, school_id: Option<Uuid>) {
        let Some(cache) = cache else { return };
        match school_id {
            Some(_) => key(cache, &settings::scope(school_id)).await,
            // global rows feed every school's merged view
            None => prefix(cache, "settings:").await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_keys_share_prefixes() {
        let course = Uuid::nil();
        let school = Uuid::from_u128(1);
        assert!(courses::roster(course).starts_with(&courses::by_id(course)));
        assert!(courses::list(school, "abc").starts_with(&courses::list_prefix(school)));
        assert!(students::list(school, "abc").starts_with(&students::list_prefix(school)));
    }

    #[test]
    fn test_settings_scope_keys() {
        assert_eq!(settings::scope(None), "settings:global");
        let id = Uuid::from_u128(5);
        assert_eq!(settings::scope(Some(id)), format!("settings:{id}"));
    }

    #[test]
    fn test_hash_filters_is_stable() {
        let filters = ("math", Some(3), 10_i64);
        assert_eq!(hash_filters(&filters), hash_filters(&filters));
        assert_ne!(hash_filters(&filters), hash_filters(&("math", Some(4), 10_i64)));
    }

    #[tokio::test]
    async fn test_invalidation_without_cache_is_noop() {
        invalidate::student(None, Uuid::nil(), Uuid::nil()).await;
        invalidate::course(None, Uuid::nil(), Uuid::nil()).await;
        invalidate::settings(None, None).await;
        invalidate::gpas(None, &[Uuid::nil()]).await;
    }
}
