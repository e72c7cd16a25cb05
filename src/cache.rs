//! Durable set of processed label-event fingerprints.
//!
//! The cache is a single pretty-printed JSON document rewritten in full on
//! every insert. There is no locking: the tool runs as one foreground
//! process per cache directory, so the last writer wins. The set grows
//! unboundedly for the lifetime of the cache directory.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Filename of the cache document inside the cache directory.
const CACHE_FILE: &str = "processed-events.json";

/// On-disk shape of the cache document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDocument {
    /// Fingerprints of label events already acted upon
    #[serde(default)]
    events: Vec<String>,
    /// When the document was last rewritten
    #[serde(rename = "lastUpdated", skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,
}

/// Persisted set of previously-seen event fingerprints.
#[derive(Debug, Clone)]
pub struct EventCache {
    cache_file: PathBuf,
}

impl EventCache {
    /// Create a cache handle rooted at `cache_dir`. No I/O happens here;
    /// the file is created lazily on first write.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            cache_file: cache_dir.join(CACHE_FILE),
        }
    }

    /// Load the full fingerprint set from disk.
    ///
    /// A missing, unreadable, or unparseable file degrades to an empty
    /// set: a broken cache must never block the scan, it only risks
    /// re-processing events that were already handled.
    pub fn processed_events(&self) -> HashSet<String> {
        let content = match fs::read_to_string(&self.cache_file) {
            Ok(content) => content,
            Err(_) => return HashSet::new(),
        };
        match serde_json::from_str::<CacheDocument>(&content) {
            Ok(doc) => doc.events.into_iter().collect(),
            Err(_) => HashSet::new(),
        }
    }

    /// Whether this fingerprint has already been acted upon.
    pub fn is_processed(&self, fingerprint: &str) -> bool {
        self.processed_events().contains(fingerprint)
    }

    /// Record a fingerprint as processed, rewriting the whole document.
    ///
    /// Creates the cache directory if missing. Write errors propagate to
    /// the caller: a failed write means the trigger may be re-processed on
    /// the next poll, which is acceptable at-least-once behavior.
    pub fn add_processed(&self, fingerprint: &str) -> Result<()> {
        let mut events = self.processed_events();
        events.insert(fingerprint.to_string());
        self.save(events)
    }

    fn save(&self, events: HashSet<String>) -> Result<()> {
        if let Some(parent) = self.cache_file.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut events: Vec<String> = events.into_iter().collect();
        events.sort();

        let doc = CacheDocument {
            events,
            last_updated: Some(Utc::now().to_rfc3339()),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        fs::write(&self.cache_file, json)?;
        Ok(())
    }

    /// Path to the underlying cache file.
    pub fn path(&self) -> &Path {
        &self.cache_file
    }
}
