//! crates/portfolio_core/src/preview.rs
//!
//! HTML previews of Drive files, rendered by the backend's `serveHtml` action.
//! Successful renders are memoized per file id. The memo holds at most
//! `MAX_PREVIEWS` renders; storing a new file past that drops the oldest one.

use std::collections::{HashMap, VecDeque};
use std::sync::LazyLock;

use regex::Regex;
use tokio::sync::RwLock;
use tracing::debug;

use crate::action::MutationResult;

static DRIVE_FILE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"drive\.google\.com/file/d/([^/?]+)").expect("drive file pattern is valid")
});
static DRIVE_OPEN_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"drive\.google\.com/open\?id=([^&]+)").expect("drive open pattern is valid")
});

/// Extracts the file id from a `/file/d/<id>` or `/open?id=<id>` Drive link.
pub fn drive_file_id(url: &str) -> Option<String> {
    DRIVE_FILE_PATH
        .captures(url)
        .or_else(|| DRIVE_OPEN_QUERY.captures(url))
        .map(|c| c[1].to_string())
}

/// How many rendered previews are kept.
pub const MAX_PREVIEWS: usize = 128;

#[derive(Default)]
struct Entries {
    results: HashMap<String, MutationResult>,
    order: VecDeque<String>,
}

/// Per-file cache of successful `serveHtml` results. Failures are never stored.
pub struct PreviewCache {
    entries: RwLock<Entries>,
    capacity: usize,
}

impl Default for PreviewCache {
    fn default() -> Self {
        Self::with_capacity(MAX_PREVIEWS)
    }
}

impl PreviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            capacity: capacity.max(1),
        }
    }

    pub async fn get(&self, file_id: &str) -> Option<MutationResult> {
        let hit = self.entries.read().await.results.get(file_id).cloned();
        if hit.is_some() {
            debug!(file_id, "Preview cache hit");
        }
        hit
    }

    pub async fn store(&self, file_id: &str, result: &MutationResult) {
        if !result.success {
            return;
        }
        let mut entries = self.entries.write().await;
        if entries
            .results
            .insert(file_id.to_string(), result.clone())
            .is_some()
        {
            return;
        }
        entries.order.push_back(file_id.to_string());
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.results.remove(&oldest);
                debug!(file_id = %oldest, "Preview evicted");
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.results.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_ids_from_both_link_shapes() {
        assert_eq!(
            drive_file_id("https://drive.google.com/file/d/1AbC_d-9/view?usp=sharing").as_deref(),
            Some("1AbC_d-9")
        );
        assert_eq!(
            drive_file_id("https://drive.google.com/open?id=1NbE--Vl6Mk&usp=drive_fs").as_deref(),
            Some("1NbE--Vl6Mk")
        );
        assert_eq!(drive_file_id("https://example.com/file/d/xyz"), None);
        assert_eq!(drive_file_id("#"), None);
    }

    #[tokio::test]
    async fn only_successes_are_kept() {
        let cache = PreviewCache::new();
        cache.store("bad", &MutationResult::failed("not found")).await;
        assert!(cache.get("bad").await.is_none());

        let ok = MutationResult {
            success: true,
            ..Default::default()
        };
        cache.store("good", &ok).await;
        assert_eq!(cache.get("good").await, Some(ok));
    }

    #[tokio::test]
    async fn the_oldest_preview_is_dropped_once_full() {
        let cache = PreviewCache::with_capacity(2);
        let ok = MutationResult {
            success: true,
            ..Default::default()
        };
        cache.store("a", &ok).await;
        cache.store("b", &ok).await;
        cache.store("a", &ok).await;
        assert_eq!(cache.len().await, 2);

        cache.store("c", &ok).await;
        assert_eq!(cache.len().await, 2);
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn the_default_cache_is_bounded() {
        let cache = PreviewCache::new();
        let ok = MutationResult {
            success: true,
            ..Default::default()
        };
        for i in 0..MAX_PREVIEWS + 10 {
            cache.store(&format!("file-{}", i), &ok).await;
        }
        assert_eq!(cache.len().await, MAX_PREVIEWS);
        assert!(cache.get("file-0").await.is_none());
    }
}
