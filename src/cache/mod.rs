//! Offline asset cache.
//!
//! A versioned, cache-first store for the tool's static assets, driven by a
//! single worker task. Buckets live on disk under the cache root, one
//! directory per cache name.

pub mod network;
pub mod storage;
pub mod worker;

pub use network::{CacheRequest, HttpNetwork};
pub use storage::CacheStorage;
pub use worker::{CacheWorker, WorkerHandle, WorkerMessage, WorkerReply, WorkerSettings};

use std::path::PathBuf;
use worker::WorkerState;
use thiserror::Error;

/// Prefix of every bucket name.
pub const CACHE_PREFIX: &str = "webmaster-pro-";

/// Bucket name for a cache version.
pub fn cache_name(version: &str) -> String {
    format!("{}{}", CACHE_PREFIX, version)
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed cache data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Failed to cache {url}: {reason}")]
    AddAll { url: String, reason: String },

    #[error("Invalid asset URL '{input}': {source}")]
    InvalidUrl {
        input: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Cannot {action} while the worker is {state}")]
    InvalidState {
        state: WorkerState,
        action: &'static str,
    },

    #[error("Cache worker has stopped")]
    WorkerGone,
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_name_uses_prefix() {
        assert_eq!(cache_name("webmaster-pro-v1.0"), "webmaster-pro-webmaster-pro-v1.0");
        assert_eq!(cache_name("v2"), "webmaster-pro-v2");
    }
}
