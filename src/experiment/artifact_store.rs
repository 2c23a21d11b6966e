//! Model artifact storage
//!
//! Blobs are addressed by key. [`MemoryArtifactStore`] keeps them in a
//! `DashMap`; [`FileArtifactStore`] writes one file per key, via a temporary
//! file and rename so a reader never sees a half-written artifact.
//! With the `compression` feature, [`CompressedArtifactStore`] wraps either.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use tracing::debug;

use crate::{Error, Result};

/// Key-addressed blob store for serialized models.
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns error if the backend cannot write.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Fetch the bytes under `key`.
    ///
    /// # Errors
    /// Returns error if the backend cannot read.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove `key`. Missing keys are not an error.
    ///
    /// # Errors
    /// Returns error if the backend cannot delete.
    fn delete(&self, key: &str) -> Result<()>;

    /// Whether `key` is present.
    ///
    /// # Errors
    /// Returns error if the backend cannot be queried.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// In-memory artifact store. Contents are lost with the process.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryArtifactStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// True if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(key).map(|v| v.value().clone()))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.blobs.remove(key);
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.blobs.contains_key(key))
    }
}

/// One file per artifact under a root directory.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    /// Open (creating if needed) the store rooted at `root`.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(Error::StorageError(format!(
                "invalid artifact key '{key}': use [A-Za-z0-9._-] and no leading dot"
            )));
        }
        Ok(self.root.join(key))
    }
}

impl ArtifactStore for FileArtifactStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        write_atomic(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.path_for(key)?.is_file())
    }
}

/// Write `bytes` to `path` through a sibling temporary file and a rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::StorageError(format!("invalid path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Zstd level used for model artifacts.
#[cfg(feature = "compression")]
const ZSTD_LEVEL: i32 = 3;

/// Codec of a compressed artifact blob.
///
/// Every blob starts with a one-byte codec tag, so a store reads blobs
/// written under any codec regardless of the one it writes with.
#[cfg(feature = "compression")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactCodec {
    /// LZ4 block format with a size prefix
    #[default]
    Lz4,
    /// Zstandard frame
    Zstd,
}

#[cfg(feature = "compression")]
impl ArtifactCodec {
    const fn tag(self) -> u8 {
        match self {
            Self::Lz4 => b'4',
            Self::Zstd => b'z',
        }
    }

    const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'4' => Some(Self::Lz4),
            b'z' => Some(Self::Zstd),
            _ => None,
        }
    }

    /// Codec name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
        }
    }

    /// Encode `model` as a tagged blob.
    ///
    /// # Errors
    /// Returns [`Error::StorageError`] if the encoder fails.
    pub fn encode(self, model: &[u8]) -> Result<Vec<u8>> {
        let mut blob = vec![self.tag()];
        match self {
            Self::Lz4 => blob.extend(lz4_flex::compress_prepend_size(model)),
            Self::Zstd => {
                let frame = zstd::encode_all(model, ZSTD_LEVEL).map_err(|e| {
                    Error::StorageError(format!("zstd could not encode artifact: {e}"))
                })?;
                blob.extend(frame);
            }
        }
        Ok(blob)
    }

    /// Decode a tagged blob written by [`ArtifactCodec::encode`].
    ///
    /// # Errors
    /// Returns [`Error::StorageError`] for an unknown tag or a corrupted payload.
    pub fn decode(blob: &[u8]) -> Result<Vec<u8>> {
        let (&tag, payload) = blob
            .split_first()
            .ok_or_else(|| Error::StorageError("empty artifact blob".to_string()))?;
        let codec = Self::from_tag(tag).ok_or_else(|| {
            Error::StorageError(format!("artifact blob has unknown codec tag 0x{tag:02x}"))
        })?;
        let decoded = match codec {
            Self::Lz4 => lz4_flex::decompress_size_prepended(payload).map_err(|e| e.to_string()),
            Self::Zstd => zstd::decode_all(payload).map_err(|e| e.to_string()),
        };
        decoded.map_err(|e| {
            Error::StorageError(format!("{} artifact payload is corrupted: {e}", codec.name()))
        })
    }
}

/// Compresses artifacts before handing them to an inner store.
#[cfg(feature = "compression")]
#[derive(Debug)]
pub struct CompressedArtifactStore<S: ArtifactStore> {
    inner: S,
    codec: ArtifactCodec,
}

#[cfg(feature = "compression")]
impl<S: ArtifactStore> CompressedArtifactStore<S> {
    /// Wrap `inner`, writing new artifacts with `codec`.
    #[must_use]
    pub const fn new(inner: S, codec: ArtifactCodec) -> Self {
        Self { inner, codec }
    }

    /// Wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Codec used for writes.
    #[must_use]
    pub const fn codec(&self) -> ArtifactCodec {
        self.codec
    }
}

#[cfg(feature = "compression")]
impl<S: ArtifactStore> ArtifactStore for CompressedArtifactStore<S> {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let blob = self.codec.encode(bytes)?;
        debug!(
            key,
            raw = bytes.len(),
            stored = blob.len(),
            codec = self.codec.name(),
            "artifact compressed"
        );
        self.inner.put(key, &blob)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner
            .get(key)?
            .map(|blob| ArtifactCodec::decode(&blob))
            .transpose()
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        self.inner.contains(key)
    }
}
