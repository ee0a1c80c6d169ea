//! Per-file cache of structural analyses.
//!
//! An entry is served only while it is fresh: it is dropped by
//! [`invalidate`](AnalysisCache::invalidate) on every edit and file close,
//! and treated as missing once its TTL has elapsed. Either way the next
//! [`get`](AnalysisCache::get) recomputes lazily. Expiry and invalidation
//! both converge on "no entry", so running them in any order is harmless.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use super::analysis::{AnalyzerRegistry, FileAnalysis};

#[derive(Debug, Clone)]
struct CacheEntry {
    analysis: Arc<FileAnalysis>,
    computed_at: DateTime<Utc>,
}

/// Analyses keyed by file id, with a fixed time-to-live.
#[derive(Debug)]
pub struct AnalysisCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    registry: AnalyzerRegistry,
    hits: u64,
    misses: u64,
}

impl AnalysisCache {
    pub fn new(ttl: Duration, registry: AnalyzerRegistry) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            registry,
            hits: 0,
            misses: 0,
        }
    }

    /// The cached analysis for `file_id`, or a fresh one.
    ///
    /// Recomputes when there is no entry, the entry has outlived the TTL, or
    /// it was computed from different content (an edit whose notification
    /// never arrived).
    pub fn get(
        &mut self,
        file_id: &str,
        content: &str,
        language: &str,
        now: DateTime<Utc>,
    ) -> Arc<FileAnalysis> {
        if let Some(entry) = self.entries.get(file_id) {
            if !self.is_expired(entry, now)
                && entry.analysis.snapshot_content == content
                && entry.analysis.language == language
            {
                self.hits += 1;
                trace!("Analysis cache hit: {file_id}");
                return Arc::clone(&entry.analysis);
            }
        }

        self.misses += 1;
        let analysis = Arc::new(self.registry.analyze(content, language));
        debug!(
            "Analyzed {file_id} ({language}): {} imports, {} functions, {} classes, {} variables",
            analysis.imports.len(),
            analysis.functions.len(),
            analysis.classes.len(),
            analysis.variables.len()
        );
        self.entries.insert(
            file_id.to_string(),
            CacheEntry {
                analysis: Arc::clone(&analysis),
                computed_at: now,
            },
        );
        analysis
    }

    /// Drop the entry for `file_id`. No-op when absent.
    pub fn invalidate(&mut self, file_id: &str) {
        if self.entries.remove(file_id).is_some() {
            trace!("Invalidated analysis for {file_id}");
        }
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    /// Remove every entry whose TTL has elapsed. Returns how many were removed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| !expired(entry.computed_at, ttl, now));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("Purged {removed} expired analyses");
        }
        removed
    }

    /// Whether a live (non-expired) entry exists for `file_id`.
    pub fn contains(&self, file_id: &str, now: DateTime<Utc>) -> bool {
        self.entries
            .get(file_id)
            .is_some_and(|e| !self.is_expired(e, now))
    }

    pub fn registry_mut(&mut self) -> &mut AnalyzerRegistry {
        &mut self.registry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Hit rate as a fraction (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        expired(entry.computed_at, self.ttl, now)
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(300),
            AnalyzerRegistry::with_builtin_analyzers(),
        )
    }
}

fn expired(computed_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    match now.signed_duration_since(computed_at).to_std() {
        Ok(age) => age >= ttl,
        // Clock went backwards; keep the entry.
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    const SRC: &str = "use std::fmt;\nfn main() {}\n";

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn cache() -> AnalysisCache {
        AnalysisCache::new(
            Duration::from_secs(300),
            AnalyzerRegistry::with_builtin_analyzers(),
        )
    }

    #[test]
    fn second_get_is_a_hit() {
        let mut cache = cache();
        let a = cache.get("main.rs", SRC, "rust", t0());
        let b = cache.get("main.rs", SRC, "rust", t0() + TimeDelta::seconds(10));
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert!((cache.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn invalidate_forces_recompute() {
        let mut cache = cache();
        let a = cache.get("main.rs", SRC, "rust", t0());
        cache.invalidate("main.rs");
        assert!(cache.is_empty());
        let b = cache.get("main.rs", SRC, "rust", t0());
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn invalidate_twice_is_idempotent() {
        let mut cache = cache();
        cache.get("main.rs", SRC, "rust", t0());
        cache.invalidate("main.rs");
        cache.invalidate("main.rs");
        assert_eq!(cache.purge_expired(t0() + TimeDelta::hours(1)), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn ttl_expiry_forces_recompute() {
        let mut cache = cache();
        let a = cache.get("main.rs", SRC, "rust", t0());
        assert!(cache.contains("main.rs", t0() + TimeDelta::seconds(299)));
        assert!(!cache.contains("main.rs", t0() + TimeDelta::seconds(300)));
        let b = cache.get("main.rs", SRC, "rust", t0() + TimeDelta::seconds(301));
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn changed_content_is_never_served_stale() {
        let mut cache = cache();
        cache.get("main.rs", SRC, "rust", t0());
        let edited = format!("{SRC}fn extra() {{}}\n");
        let b = cache.get("main.rs", &edited, "rust", t0());
        assert_eq!(b.functions, ["main", "extra"]);
        assert_eq!(b.snapshot_content, edited);
    }

    #[test]
    fn purge_removes_only_expired() {
        let mut cache = cache();
        cache.get("old.rs", SRC, "rust", t0());
        cache.get("new.rs", SRC, "rust", t0() + TimeDelta::seconds(200));
        let removed = cache.purge_expired(t0() + TimeDelta::seconds(350));
        assert_eq!(removed, 1);
        assert!(cache.contains("new.rs", t0() + TimeDelta::seconds(350)));
    }
}
