//! Local cache of result files, populated from the remote store on first use.
//!
//! Each structure code gets its own directory under the cache root. A missing
//! directory is filled by downloading into a hidden staging directory next to
//! it and renaming that into place, so readers never observe a half-written
//! code directory. Fetches for the same code are serialised through
//! [`KeyedLocks`], which is shared between all server workers.

use std::{
    collections::HashMap,
    fs,
    io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use actix_web::{http::StatusCode, web::{self, Bytes}};
use futures::lock::Mutex as AsyncMutex;

use crate::{code::StructureCode, result_files::ResultFile, warnings};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no results available for structure `{0}`")]
    NotFound(StructureCode),
    #[error("result cache I/O error: {0}")]
    Io(#[from] io::Error),
}

/// One async mutex per key, created on demand and dropped once nobody holds it.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key.to_owned()).or_default().clone()
    }

    fn release(&self, key: &str, slot: Arc<AsyncMutex<()>>) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map plus ours means no other caller is waiting
        if Arc::strong_count(&slot) == 2 {
            slots.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where result files come from.
pub enum RemoteSource {
    /// HTTP object store, objects at `{base_url}/{code}/{file}`
    Http {
        client: awc::Client,
        base_url: String,
        max_object_size: usize,
    },
    /// Local mirror laid out like the object store
    Directory(PathBuf),
}

impl RemoteSource {
    /// `file://` URLs select a local mirror, anything else is fetched over HTTP.
    pub fn from_url(url: &str, timeout: Duration, max_object_size: usize) -> Self {
        if let Some(path) = url.strip_prefix("file://") {
            return Self::Directory(PathBuf::from(path));
        }
        Self::Http {
            client: awc::Client::builder().timeout(timeout).finish(),
            base_url: url.trim_end_matches('/').to_owned(),
            max_object_size,
        }
    }

    /// Fetch one object. Any failure is logged and reported as `None`: an
    /// unreachable store looks the same as a structure without results.
    pub async fn get(&self, code: &StructureCode, file_name: &str) -> Option<Bytes> {
        match self {
            Self::Http { client, base_url, max_object_size } => {
                let url = format!("{base_url}/{code}/{file_name}");
                log::debug!("GET {url}");
                let mut response = match client.get(&url).send().await {
                    Ok(response) => response,
                    Err(e) => {
                        log::warn!("Request for {url} failed: {e}");
                        return None;
                    }
                };
                if response.status() != StatusCode::OK {
                    log::debug!("{url} returned {}", response.status());
                    return None;
                }
                match response.body().limit(*max_object_size).await {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        log::warn!("Failed to read body of {url}: {e}");
                        None
                    }
                }
            }
            Self::Directory(root) => {
                let path = root.join(code.as_str()).join(file_name);
                match fs::read(&path) {
                    Ok(data) => Some(data.into()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                    Err(e) => {
                        log::warn!("Failed to read {}: {e}", path.display());
                        None
                    }
                }
            }
        }
    }
}

pub struct ResultCache {
    cache_dir: PathBuf,
    source: RemoteSource,
    locks: Arc<KeyedLocks>,
    requests: AtomicUsize,
}

impl ResultCache {
    pub fn new(cache_dir: impl Into<PathBuf>, source: RemoteSource, locks: Arc<KeyedLocks>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            source,
            locks,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn code_dir(&self, code: &StructureCode) -> PathBuf {
        self.cache_dir.join(code.as_str())
    }

    /// Number of remote objects requested by this cache so far.
    pub fn remote_requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    /// Make sure results for `code` are on disk and return the path of its
    /// structure file.
    pub async fn ensure_local(&self, code: &StructureCode) -> Result<PathBuf, CacheError> {
        let dir = self.code_dir(code);
        if !dir.is_dir() {
            let slot = self.locks.slot(code.as_str());
            let result = {
                let _guard = slot.lock().await;
                // Someone else may have finished while we waited
                if dir.is_dir() {
                    Ok(())
                } else {
                    self.populate(code, &dir).await
                }
            };
            self.locks.release(code.as_str(), slot);
            result?;
        }

        let structure = ResultFile::Structure.path(&dir, code);
        if structure.is_file() {
            Ok(structure)
        } else {
            Err(CacheError::NotFound(code.clone()))
        }
    }

    async fn populate(&self, code: &StructureCode, dest: &Path) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_dir)?;
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{code}-"))
            .tempdir_in(&self.cache_dir)?;

        let mut fetched = 0;
        for file in ResultFile::REMOTE {
            let name = file.file_name(code);
            self.requests.fetch_add(1, Ordering::Relaxed);
            if let Some(data) = self.source.get(code, &name).await {
                fs::write(staging.path().join(&name), &data)?;
                fetched += 1;
            }
        }

        let structure = ResultFile::Structure.path(staging.path(), code);
        if !structure.is_file() {
            log::info!("No results found for {code}");
            return Ok(());
        }

        let warnings_file = ResultFile::Warnings.path(staging.path(), code);
        if warnings_file.is_file() {
            let remapped = ResultFile::RemappedWarnings.path(staging.path(), code);
            match web::block(move || warnings::remap_files(structure, warnings_file, remapped)).await {
                Ok(Ok(n)) => log::debug!("Remapped {n} residual warnings for {code}"),
                Ok(Err(e)) => log::warn!("Failed to remap residual warnings for {code}: {e}"),
                Err(e) => log::error!("Residual warning task for {code} failed: {e}"),
            }
        }

        // The staging directory is gone after a successful rename, so dropping it is a no-op
        match fs::rename(staging.path(), dest) {
            Ok(()) => {
                log::info!("Cached {fetched} result files for {code}");
                Ok(())
            }
            Err(_) if dest.is_dir() => {
                log::debug!("Results for {code} were published by another process");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
