//! On-disk cache buckets.
//!
//! Layout under the cache root:
//!
//! ```text
//! <root>/registration.json
//! <root>/<bucket>/<sha256 of url>.meta.json
//! <root>/<bucket>/<sha256 of url>.body
//! ```
//!
//! Only directories named with [`CACHE_PREFIX`] are buckets; anything else
//! under the root is left alone. Files are written to a `.tmp` sibling and
//! renamed into place.

use super::network::{CachedResponse, ResponseType};
use super::worker::Registration;
use super::{CacheError, CACHE_PREFIX};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const META_SUFFIX: &str = ".meta.json";
const BODY_SUFFIX: &str = ".body";
const TMP_SUFFIX: &str = ".tmp";
const REGISTRATION_FILE: &str = "registration.json";

/// Write through a `.tmp` sibling so readers never see a torn file.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TMP_SUFFIX);
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| CacheError::io(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(CacheError::io(path, e));
    }
    Ok(())
}

async fn remove_if_present(path: &Path) -> Result<bool, CacheError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    request_url: String,
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
    response_type: ResponseType,
    stored_at: DateTime<Utc>,
}

/// Entry count and size of one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketStats {
    pub entries: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Hex SHA-256 of the request URL; the URL itself lives in the meta file.
    pub(crate) fn entry_stem(request_url: &str) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let digest = Sha256::digest(request_url.as_bytes());
        let mut out = String::with_capacity(64);
        for &b in digest.iter() {
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0f) as usize] as char);
        }
        out
    }

    fn entry_paths(&self, name: &str, request_url: &str) -> (PathBuf, PathBuf) {
        let dir = self.bucket_dir(name);
        let stem = Self::entry_stem(request_url);
        (
            dir.join(format!("{}{}", stem, META_SUFFIX)),
            dir.join(format!("{}{}", stem, BODY_SUFFIX)),
        )
    }

    /// Names of all buckets, sorted. Directories without the cache prefix
    /// are not buckets.
    pub async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.root, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&self.root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| CacheError::io(entry.path(), e))?
                .is_dir();
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_dir && name.starts_with(CACHE_PREFIX) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn has(&self, name: &str) -> bool {
        tokio::fs::metadata(self.bucket_dir(name))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the bucket if it does not exist yet.
    pub async fn open(&self, name: &str) -> Result<(), CacheError> {
        let dir = self.bucket_dir(name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::io(dir, e))
    }

    /// Delete a bucket. Returns whether it existed.
    pub async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let dir = self.bucket_dir(name);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(dir, e)),
        }
    }

    /// Store a response under a request URL, replacing any previous entry.
    pub async fn put(
        &self,
        name: &str,
        request_url: &str,
        response: &CachedResponse,
    ) -> Result<(), CacheError> {
        self.open(name).await?;
        let (meta_path, body_path) = self.entry_paths(name, request_url);

        write_atomic(&body_path, &response.body).await?;

        let meta = EntryMeta {
            request_url: request_url.to_string(),
            url: response.url.clone(),
            status: response.status,
            headers: response.headers.clone(),
            response_type: response.response_type,
            stored_at: Utc::now(),
        };
        write_atomic(&meta_path, &serde_json::to_vec_pretty(&meta)?).await?;

        debug!("Stored {} in {}", request_url, name);
        Ok(())
    }

    /// Look a request URL up in one bucket.
    pub async fn match_in(
        &self,
        name: &str,
        request_url: &str,
    ) -> Result<Option<CachedResponse>, CacheError> {
        let (meta_path, body_path) = self.entry_paths(name, request_url);
        let meta = match tokio::fs::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(meta_path, e)),
        };
        let meta: EntryMeta = serde_json::from_slice(&meta)?;
        if meta.request_url != request_url {
            return Ok(None);
        }

        let body = tokio::fs::read(&body_path)
            .await
            .map_err(|e| CacheError::io(body_path, e))?;

        Ok(Some(CachedResponse {
            url: meta.url,
            status: meta.status,
            headers: meta.headers,
            response_type: meta.response_type,
            body,
        }))
    }

    /// Remove one entry. Returns whether it existed.
    pub async fn remove(&self, name: &str, request_url: &str) -> Result<bool, CacheError> {
        let (meta_path, body_path) = self.entry_paths(name, request_url);
        let had_meta = remove_if_present(&meta_path).await?;
        let had_body = remove_if_present(&body_path).await?;
        Ok(had_meta || had_body)
    }

    /// Look a request URL up across every bucket.
    pub async fn match_any(&self, request_url: &str) -> Result<Option<CachedResponse>, CacheError> {
        for name in self.keys().await? {
            if let Some(hit) = self.match_in(&name, request_url).await? {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }

    /// Count entries and body bytes of a bucket.
    pub fn stats(&self, name: &str) -> Result<BucketStats, CacheError> {
        let dir = self.bucket_dir(name);
        let mut stats = BucketStats::default();

        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
                CacheError::io(path, e.into())
            })?;
            let file_name = entry.file_name().to_string_lossy();
            if file_name.ends_with(META_SUFFIX) {
                stats.entries += 1;
            } else if file_name.ends_with(BODY_SUFFIX) {
                let len = entry
                    .metadata()
                    .map_err(|e| CacheError::io(entry.path(), e.into()))?
                    .len();
                stats.bytes += len;
            }
        }

        Ok(stats)
    }

    pub async fn load_registration(&self) -> Result<Option<Registration>, CacheError> {
        let path = self.root.join(REGISTRATION_FILE);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    pub async fn save_registration(&self, registration: &Registration) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CacheError::io(&self.root, e))?;
        let path = self.root.join(REGISTRATION_FILE);
        write_atomic(&path, &serde_json::to_vec_pretty(registration)?).await
    }
}
