//! services/portal/src/persistence.rs
//!
//! Helpers over the `LocalCache` port: the reserved keys, JSON reads and writes
//! that never fail the caller, the logout purge, and per-section form envelopes.
//!
//! Every failure here is logged and swallowed. The local cache is a fallback; it
//! must never block the in-memory flow.

use chrono::{DateTime, Utc};
use pcas_core::domain::CacheEnvelope;
use pcas_core::ports::LocalCache;
use pcas_core::sections::Section;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key holding the bearer credential.
pub const TOKEN_KEY: &str = "token";
/// Prefix of every form envelope; purged on logout.
pub const APPLICATION_PREFIX: &str = "pcas:application:";
/// Key holding the serialized university picks.
pub const PICKS_KEY: &str = "pcas:universities:picks";

//=========================================================================================
// Raw helpers
//=========================================================================================

/// Reads and decodes `key`. Missing, unreadable or malformed entries yield `None`.
pub fn read_json<T: DeserializeOwned>(cache: &dyn LocalCache, key: &str) -> Option<T> {
    let raw = match cache.get(key) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(key, "Failed to read local cache entry: {}", e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, "Ignoring malformed local cache entry: {}", e);
            None
        }
    }
}

/// Encodes and stores `value`. Returns whether the write happened.
pub fn write_json<T: Serialize>(cache: &dyn LocalCache, key: &str, value: &T) -> bool {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(key, "Failed to encode local cache entry: {}", e);
            return false;
        }
    };
    match cache.set(key, &raw) {
        Ok(()) => true,
        Err(e) => {
            warn!(key, "Failed to write local cache entry: {}", e);
            false
        }
    }
}

pub fn remove_key(cache: &dyn LocalCache, key: &str) -> bool {
    match cache.remove(key) {
        Ok(()) => true,
        Err(e) => {
            warn!(key, "Failed to remove local cache entry: {}", e);
            false
        }
    }
}

/// Removes every key starting with `prefix` and returns how many went.
///
/// Scan then delete; not atomic against a concurrent writer.
pub fn purge_prefix(cache: &dyn LocalCache, prefix: &str) -> usize {
    let keys = match cache.keys() {
        Ok(keys) => keys,
        Err(e) => {
            warn!(prefix, "Failed to list local cache keys: {}", e);
            return 0;
        }
    };
    let removed = keys
        .iter()
        .filter(|key| key.starts_with(prefix))
        .filter(|key| remove_key(cache, key))
        .count();
    debug!(prefix, removed, "Purged local cache entries");
    removed
}

//=========================================================================================
// Credential
//=========================================================================================

/// The stored credential, stored as a plain string.
pub fn load_token(cache: &dyn LocalCache) -> Option<String> {
    match cache.get(TOKEN_KEY) {
        Ok(token) => token.filter(|t| !t.is_empty()),
        Err(e) => {
            warn!("Failed to read stored credential: {}", e);
            None
        }
    }
}

pub fn store_token(cache: &dyn LocalCache, token: &str) -> bool {
    match cache.set(TOKEN_KEY, token) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to store credential: {}", e);
            false
        }
    }
}

/// Removes the credential; returns whether one was present.
pub fn clear_token(cache: &dyn LocalCache) -> bool {
    let present = load_token(cache).is_some();
    remove_key(cache, TOKEN_KEY) && present
}

//=========================================================================================
// Form envelopes
//=========================================================================================

/// Per-user key of a section's envelope.
pub fn section_key(section: Section, user_id: &str) -> String {
    format!("{}{}:{}", APPLICATION_PREFIX, section.as_str(), user_id)
}

/// The flat key older releases wrote, shared by every user of the device.
pub fn legacy_section_key(section: Section) -> String {
    format!("{}{}", APPLICATION_PREFIX, section.as_str())
}

/// Reads and writes section envelopes under per-user keys.
#[derive(Clone)]
pub struct FormCache {
    cache: Arc<dyn LocalCache>,
    max_age: Option<chrono::Duration>,
}

impl FormCache {
    pub fn new(cache: Arc<dyn LocalCache>, max_age: Option<chrono::Duration>) -> Self {
        Self { cache, max_age }
    }

    /// Loads the envelope for `section`, as of `now`.
    ///
    /// Migrates a legacy flat entry to the per-user key the first time it is seen,
    /// and drops entries older than the configured max age.
    pub fn load(&self, section: Section, user_id: &str, now: DateTime<Utc>) -> Option<CacheEnvelope> {
        let key = section_key(section, user_id);
        let envelope = match read_json::<CacheEnvelope>(self.cache.as_ref(), &key) {
            Some(envelope) => envelope,
            None => self.migrate_legacy(section, &key)?,
        };

        if self.is_stale(&envelope, now) {
            info!(%section, "Discarding stale cached form data");
            remove_key(self.cache.as_ref(), &key);
            return None;
        }
        Some(envelope)
    }

    pub fn save(&self, section: Section, user_id: &str, envelope: &CacheEnvelope) -> bool {
        write_json(self.cache.as_ref(), &section_key(section, user_id), envelope)
    }

    fn migrate_legacy(&self, section: Section, key: &str) -> Option<CacheEnvelope> {
        let legacy_key = legacy_section_key(section);
        let envelope = read_json::<CacheEnvelope>(self.cache.as_ref(), &legacy_key)?;
        if write_json(self.cache.as_ref(), key, &envelope) {
            remove_key(self.cache.as_ref(), &legacy_key);
            info!(%section, "Migrated legacy cached form data to a per-user key");
        }
        Some(envelope)
    }

    fn is_stale(&self, envelope: &CacheEnvelope, now: DateTime<Utc>) -> bool {
        match (self.max_age, envelope.saved_at) {
            (Some(max_age), Some(saved_at)) => now - saved_at > max_age,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryCache;
    use chrono::Duration;
    use pcas_core::domain::FormValues;
    use pcas_core::sections::FormStatus;

    fn envelope(saved_at: DateTime<Utc>) -> CacheEnvelope {
        let mut values = FormValues::new();
        values.insert("clubs".to_string(), "Debating".to_string());
        values.insert("certDocName".to_string(), String::new());
        CacheEnvelope::new(values, FormStatus::Complete, saved_at)
    }

    #[test]
    fn envelope_round_trip_is_lossless() {
        let cache: Arc<dyn LocalCache> = Arc::new(MemoryCache::new());
        let forms = FormCache::new(cache, None);
        let now = Utc::now();
        let saved = envelope(now);

        assert!(forms.save(Section::Extracurricular, "u1", &saved));
        assert_eq!(forms.load(Section::Extracurricular, "u1", now), Some(saved));
    }

    #[test]
    fn envelopes_are_scoped_per_user() {
        let cache: Arc<dyn LocalCache> = Arc::new(MemoryCache::new());
        let forms = FormCache::new(cache, None);
        let now = Utc::now();
        forms.save(Section::Family, "u1", &envelope(now));

        assert!(forms.load(Section::Family, "u2", now).is_none());
    }

    #[test]
    fn legacy_entry_is_migrated_once() {
        let cache: Arc<dyn LocalCache> = Arc::new(MemoryCache::new());
        let now = Utc::now();
        write_json(cache.as_ref(), "pcas:application:profile", &envelope(now));
        let forms = FormCache::new(cache.clone(), None);

        let loaded = forms.load(Section::Profile, "u1", now);
        assert!(loaded.is_some(), "legacy entry should be read");
        assert_eq!(
            cache.get("pcas:application:profile").expect("get"),
            None,
            "legacy key should be removed after migration"
        );
        assert!(cache.get("pcas:application:profile:u1").expect("get").is_some());
    }

    #[test]
    fn stale_entries_are_dropped() {
        let cache: Arc<dyn LocalCache> = Arc::new(MemoryCache::new());
        let forms = FormCache::new(cache.clone(), Some(Duration::days(30)));
        let now = Utc::now();
        forms.save(Section::Education, "u1", &envelope(now - Duration::days(31)));

        assert!(forms.load(Section::Education, "u1", now).is_none());
        assert!(cache.get(&section_key(Section::Education, "u1")).expect("get").is_none());
    }

    #[test]
    fn malformed_entries_read_as_absent() {
        let cache = MemoryCache::new();
        cache.set("pcas:universities:picks", "{not json").expect("set");
        let picks: Option<Vec<String>> = read_json(&cache, PICKS_KEY);
        assert!(picks.is_none());
    }

    #[test]
    fn purge_only_touches_the_prefix() {
        let cache = MemoryCache::new();
        for key in [
            "pcas:application:profile",
            "pcas:application:family:u1",
            "pcas:universities:picks",
            "token",
        ] {
            cache.set(key, "x").expect("set");
        }

        assert_eq!(purge_prefix(&cache, APPLICATION_PREFIX), 2);
        let mut left = cache.keys().expect("keys");
        left.sort();
        assert_eq!(left, vec!["pcas:universities:picks", "token"]);
    }
}
