use crate::table::Table;
use moka::sync::Cache;
use std::time::Duration;

/// Time-boxed memo of table reads keyed by `"{sheet_id}/{range}"`.
///
/// Entries may be stale for up to `ttl`; the cache only saves remote calls.
#[derive(Clone)]
pub struct TableCache {
    inner: Option<Cache<String, Table>>,
}

impl TableCache {
    /// A zero `ttl` or capacity disables caching.
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        if ttl.is_zero() || max_entries == 0 {
            return Self::disabled();
        }
        let inner = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { inner: Some(inner) }
    }

    /// A cache that never holds anything.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn key(sheet_id: &str, range: &str) -> String {
        format!("{sheet_id}/{range}")
    }

    pub fn get(&self, key: &str) -> Option<Table> {
        self.inner.as_ref()?.get(key)
    }

    pub fn insert(&self, key: String, table: Table) {
        if let Some(cache) = &self.inner {
            cache.insert(key, table);
        }
    }

    pub fn invalidate(&self, key: &str) {
        if let Some(cache) = &self.inner {
            cache.invalidate(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::from_values(vec![vec!["Name".to_string()], vec!["Sam".to_string()]])
    }

    #[test]
    fn serves_inserted_tables_until_invalidated() {
        let cache = TableCache::new(Duration::from_secs(60), 8);
        let key = TableCache::key("abc", "A:O");
        assert_eq!(key, "abc/A:O");

        cache.insert(key.clone(), table());
        assert_eq!(cache.get(&key), Some(table()));

        cache.invalidate(&key);
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn disabled_cache_never_serves() {
        let cache = TableCache::new(Duration::ZERO, 8);
        cache.insert("k".to_string(), table());
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn expired_entries_are_not_served() {
        let cache = TableCache::new(Duration::from_millis(20), 8);
        cache.insert("k".to_string(), table());
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(cache.get("k"), None);
    }
}
