//! Multi-tier image deduplication
//!
//! Duplicates are caught at three tiers, cheapest first:
//!
//! 1. URL tier: an MD5 of the normalized image URL, checked before any
//!    download happens
//! 2. Content tier: an MD5 of the downloaded bytes, catching the same file
//!    served from different URLs
//! 3. Perceptual tier: a 64-bit difference hash of the decoded image,
//!    catching resized or recompressed copies
//!
//! Bytes that fail to decode as an image skip the perceptual tier and are
//! treated as unique; a corrupt file should be kept rather than silently
//! dropped as a false duplicate.

mod phash;

pub use phash::{difference_hash, hamming_distance};

use md5::{Digest, Md5};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::DedupConfig;
use crate::Result;

/// Hamming distance at or under which two difference hashes count as the
/// same image
const SIMILARITY_THRESHOLD: u32 = 5;

/// Counters describing deduplication activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupStats {
    /// Images run through the content/perceptual tiers
    pub total_checked: u64,
    /// Images rejected as duplicates (any tier)
    pub duplicates_found: u64,
    /// Images accepted as unique
    pub unique_images: u64,
}

impl DedupStats {
    /// Fraction of checked images that were duplicates
    pub fn duplicate_rate(&self) -> f64 {
        if self.total_checked == 0 {
            return 0.0;
        }
        self.duplicates_found as f64 / self.total_checked as f64
    }
}

/// Three-tier image deduplicator
///
/// All state is in memory; [`Deduplicator::load_existing_hashes`] rehydrates
/// the content and perceptual tiers from a directory of previously downloaded
/// images so restarts do not re-save what is already on disk.
pub struct Deduplicator {
    enabled: bool,
    perceptual: bool,
    url_hashes: HashSet<String>,
    content_hashes: HashSet<String>,
    perceptual_hashes: Vec<u64>,
    stats: DedupStats,
}

impl Deduplicator {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            enabled: config.enabled,
            perceptual: config.perceptual,
            url_hashes: HashSet::new(),
            content_hashes: HashSet::new(),
            perceptual_hashes: Vec::new(),
            stats: DedupStats::default(),
        }
    }

    /// Snapshot of the dedup counters
    pub fn stats(&self) -> DedupStats {
        self.stats.clone()
    }

    /// Checks the URL tier, recording the URL as seen
    ///
    /// The first call for a given normalized URL returns `false`; subsequent
    /// calls return `true`. Disabled dedup always answers `false`.
    pub fn is_duplicate_url(&mut self, url: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let digest = md5_hex(normalize_url(url).as_bytes());
        let duplicate = !self.url_hashes.insert(digest);
        if duplicate {
            self.stats.duplicates_found += 1;
            debug!(url, "duplicate image URL");
        }
        duplicate
    }

    /// Checks the content and perceptual tiers against downloaded bytes
    ///
    /// Records the bytes' fingerprints as seen when they are unique.
    pub fn is_duplicate_image(&mut self, bytes: &[u8]) -> bool {
        if !self.enabled {
            return false;
        }
        self.stats.total_checked += 1;

        let digest = md5_hex(bytes);
        if !self.content_hashes.insert(digest) {
            self.stats.duplicates_found += 1;
            debug!("duplicate image content");
            return true;
        }

        if self.perceptual {
            match image::load_from_memory(bytes) {
                Ok(img) => {
                    let hash = difference_hash(&img);
                    let near = self
                        .perceptual_hashes
                        .iter()
                        .any(|&h| hamming_distance(h, hash) <= SIMILARITY_THRESHOLD);
                    if near {
                        self.stats.duplicates_found += 1;
                        debug!("perceptually duplicate image");
                        return true;
                    }
                    self.perceptual_hashes.push(hash);
                }
                Err(e) => {
                    // Undecodable bytes are kept rather than risk a false drop
                    debug!(error = %e, "image decode failed, skipping perceptual tier");
                }
            }
        }

        self.stats.unique_images += 1;
        false
    }

    /// Forgets all recorded fingerprints and resets the counters
    pub fn clear(&mut self) {
        self.url_hashes.clear();
        self.content_hashes.clear();
        self.perceptual_hashes.clear();
        self.stats = DedupStats::default();
        info!("dedup state cleared");
    }

    /// Deletes a file that turned out to be a duplicate
    ///
    /// # Returns
    ///
    /// `Ok(true)` when the file was removed, `Ok(false)` when it did not
    /// exist
    pub fn remove_duplicate_file(&self, path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        info!(path = %path.display(), "removed duplicate file");
        Ok(true)
    }

    /// Rehydrates the content and perceptual tiers from images already on disk
    ///
    /// Walks `dir` recursively; unreadable entries are logged and skipped.
    ///
    /// # Returns
    ///
    /// Number of files whose hashes were loaded
    pub fn load_existing_hashes(&mut self, dir: &Path) -> Result<usize> {
        if !self.enabled || !dir.exists() {
            return Ok(0);
        }
        let mut loaded = 0;
        self.load_dir(dir, &mut loaded)?;
        info!(dir = %dir.display(), loaded, "rehydrated dedup hashes");
        Ok(loaded)
    }

    fn load_dir(&mut self, dir: &Path, loaded: &mut usize) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() {
                self.load_dir(&path, loaded)?;
                continue;
            }
            let bytes = match std::fs::read(&path) {
                Ok(b) => b,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            self.content_hashes.insert(md5_hex(&bytes));
            if self.perceptual {
                if let Ok(img) = image::load_from_memory(&bytes) {
                    self.perceptual_hashes.push(difference_hash(&img));
                }
            }
            *loaded += 1;
        }
        Ok(())
    }
}

fn md5_hex(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Normalizes a URL for the URL tier: fragments are dropped and the host is
/// lowercased. Unparseable strings are hashed as-is.
fn normalize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}
