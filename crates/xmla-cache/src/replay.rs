//! Directory-backed store that records responses and replays them later.
//!
//! Each entry is one file under `<root>/<partition>/`, named by the SHA-256
//! of the endpoint and request bytes. The file repeats the full key ahead of
//! the response, so a hash collision reads as a miss rather than a wrong
//! answer. Recorded files survive restarts: a new store over the same
//! directory replays what an earlier one recorded.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::{debug, trace, warn};
use url::Url;

use crate::config::props;
use crate::error::{CacheError, Result};
use crate::key::{SessionId, validate_request};
use crate::registry::{CacheSession, PartitionPolicy, SessionRegistry};
use crate::store::{CacheStore, REPLAY_STORE};
use crate::PropertyMap;

/// Partition used by sessions that do not set `Name`.
pub const DEFAULT_PARTITION: &str = "default";

const ENTRY_EXTENSION: &str = "xmla";

/// Replay [`CacheStore`] rooted at a directory.
#[derive(Debug)]
pub struct ReplayCache {
    root: PathBuf,
    registry: SessionRegistry,
}

impl ReplayCache {
    /// Open (and create if needed) a replay directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "Opened replay cache");
        Ok(Self {
            root,
            registry: SessionRegistry::new(PartitionPolicy::Shared(DEFAULT_PARTITION.to_string())),
        })
    }

    /// Open the directory named by the `Directory` cache property.
    pub fn from_properties(properties: &PropertyMap) -> Result<Self> {
        let dir = properties
            .get(props::DIRECTORY)
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| CacheError::MissingProperty(props::DIRECTORY.to_string()))?;
        Self::new(dir)
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registered state of a session.
    pub fn session(&self, session: &SessionId) -> Result<CacheSession> {
        self.registry.lookup(session)
    }

    /// Number of recorded responses on disk.
    pub fn recorded(&self) -> Result<usize> {
        Ok(self.entry_files()?.len())
    }

    fn entry_path(&self, partition: &str, url: &Url, request: &[u8]) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(url.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(request);
        let name = hex::encode(hasher.finalize());

        self.root
            .join(partition_dir(partition))
            .join(format!("{}.{}", name, ENTRY_EXTENSION))
    }

    fn entry_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for dir in fs::read_dir(&self.root)? {
            let dir = dir?.path();
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                    files.push(path);
                }
            }
        }
        Ok(files)
    }
}

impl CacheStore for ReplayCache {
    fn get(&self, session: &SessionId, url: &Url, request: &[u8]) -> Result<Option<Bytes>> {
        validate_request(request)?;
        let partition = self.registry.partition_of(session)?;
        let path = self.entry_path(&partition, url, request);

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!(session = %session, url = %url, "Replay miss");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match Record::decode(&data) {
            Some(record) if record.url == url.as_str().as_bytes() && record.request == request => {
                trace!(session = %session, url = %url, bytes = record.response.len(), "Replay hit");
                Ok(Some(Bytes::copy_from_slice(record.response)))
            }
            Some(_) => {
                debug!(path = %path.display(), "Recorded entry belongs to another key");
                Ok(None)
            }
            None => {
                warn!(path = %path.display(), "Ignoring unreadable replay entry");
                Ok(None)
            }
        }
    }

    fn put(&self, session: &SessionId, url: &Url, request: &[u8], response: Bytes) -> Result<()> {
        validate_request(request)?;
        let partition = self.registry.partition_of(session)?;
        let path = self.entry_path(&partition, url, request);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = Record {
            url: url.as_str().as_bytes(),
            request,
            response: &response,
        }
        .encode();

        // Readers never see a partial file.
        let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, &data)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        trace!(session = %session, path = %path.display(), "Recorded response");
        Ok(())
    }

    fn flush_all(&self) {
        let files = match self.entry_files() {
            Ok(files) => files,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "Failed to list replay entries");
                return;
            }
        };

        let mut removed = 0;
        for path in files {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove replay entry"),
            }
        }
        debug!(count = removed, "Flushed replay cache");
    }

    fn configure(&self, connection_config: &PropertyMap, cache_props: &PropertyMap) -> SessionId {
        self.registry.register(connection_config, cache_props).id
    }

    fn name(&self) -> &str {
        REPLAY_STORE
    }
}

/// Directory name for a partition: readable prefix plus a digest of the
/// exact name, so distinct partitions never share a directory.
fn partition_dir(partition: &str) -> String {
    let readable: String = partition
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let digest = Sha256::digest(partition.as_bytes());
    format!("{}-{}", readable, hex::encode(&digest[..8]))
}

/// On-disk entry: `len(url) | url | len(request) | request | response`,
/// lengths as big-endian u64.
struct Record<'a> {
    url: &'a [u8],
    request: &'a [u8],
    response: &'a [u8],
}

impl<'a> Record<'a> {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.url.len() + self.request.len() + self.response.len());
        out.extend_from_slice(&(self.url.len() as u64).to_be_bytes());
        out.extend_from_slice(self.url);
        out.extend_from_slice(&(self.request.len() as u64).to_be_bytes());
        out.extend_from_slice(self.request);
        out.extend_from_slice(self.response);
        out
    }

    fn decode(data: &'a [u8]) -> Option<Self> {
        let (url, rest) = take_prefixed(data)?;
        let (request, response) = take_prefixed(rest)?;
        Some(Self { url, request, response })
    }
}

fn take_prefixed(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let (len, rest) = data.split_first_chunk::<8>()?;
    let len = usize::try_from(u64::from_be_bytes(*len)).ok()?;
    if rest.len() < len {
        return None;
    }
    Some(rest.split_at(len))
}
