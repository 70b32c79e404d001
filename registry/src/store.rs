//! Endpoint stores persist the endpoint list between process restarts. The
//! filesystem store keeps it sealed with an authenticated cipher so the list
//! can neither be read nor silently altered on disk.
use crate::key::KeyFile;
use crate::types::Endpoint;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use parking_lot::Mutex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const BLOB_VERSION: u8 = 1;
const NONCE_LEN: usize = 24;
const HEADER_LEN: usize = 1 + NONCE_LEN;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("encryption failed")]
    Encrypt,

    #[error("ciphertext failed authentication")]
    Decrypt,

    #[error("unsupported blob version: {0}")]
    UnsupportedVersion(u8),

    #[error("blob is truncated ({0} bytes)")]
    Truncated(usize),
}

pub trait EndpointStore: Send + Sync {
    /// Returns `Ok(None)` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<Vec<Endpoint>>, StoreError>;
    fn store(&self, endpoints: &[Endpoint]) -> Result<(), StoreError>;
}

/// Seals and opens the persisted blob.
///
/// Layout: `version (1) || nonce (24) || ciphertext + tag`, where the plaintext
/// is the JSON array of endpoints.
struct Codec {
    cipher: XChaCha20Poly1305,
}

impl Codec {
    fn new(key: &Key) -> Self {
        Codec {
            cipher: XChaCha20Poly1305::new(key),
        }
    }

    fn seal(&self, endpoints: &[Endpoint]) -> Result<Vec<u8>, StoreError> {
        let plaintext = serde_json::to_vec(endpoints)?;
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|_| StoreError::Encrypt)?;

        let mut blob = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        blob.push(BLOB_VERSION);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    fn open(&self, blob: &[u8]) -> Result<Vec<Endpoint>, StoreError> {
        if blob.len() < HEADER_LEN {
            return Err(StoreError::Truncated(blob.len()));
        }

        let (version, rest) = (blob[0], &blob[1..]);
        if version != BLOB_VERSION {
            return Err(StoreError::UnsupportedVersion(version));
        }

        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| StoreError::Decrypt)?;

        Ok(serde_json::from_slice(&plaintext)?)
    }
}

/// Writes `contents` to a temporary file next to `path` and renames it over
/// `path`, so readers see either the old file or the new one.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub struct FilesystemEndpointStore {
    path: PathBuf,
    codec: Codec,
}

impl FilesystemEndpointStore {
    /// Loads the key once, generating it if needed. The key file and the blob
    /// must stay paired: a blob sealed under another key will not open.
    pub fn new(base_dir: &str, blob_filename: &str, key_filename: &str) -> Self {
        let base = Path::new(base_dir);
        let key = KeyFile::new(base.join(key_filename)).load_or_generate();

        FilesystemEndpointStore {
            path: base.join(blob_filename),
            codec: Codec::new(&key),
        }
    }

    /// Uses an explicit key instead of the key file.
    pub fn with_key(path: PathBuf, key: &Key) -> Self {
        FilesystemEndpointStore {
            path,
            codec: Codec::new(key),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EndpointStore for FilesystemEndpointStore {
    fn load(&self) -> Result<Option<Vec<Endpoint>>, StoreError> {
        let blob = match fs::read(&self.path) {
            Ok(blob) => blob,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        self.codec.open(&blob).map(Some)
    }

    fn store(&self, endpoints: &[Endpoint]) -> Result<(), StoreError> {
        let blob = self.codec.seal(endpoints)?;
        write_atomic(&self.path, &blob)?;

        tracing::info!(
            path = ?self.path,
            endpoints = endpoints.len(),
            bytes = blob.len(),
            "Stored endpoint list"
        );

        Ok(())
    }
}

/// Keeps the list in memory only. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryEndpointStore {
    endpoints: Mutex<Option<Vec<Endpoint>>>,
}

impl MemoryEndpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoints(endpoints: Vec<Endpoint>) -> Self {
        MemoryEndpointStore {
            endpoints: Mutex::new(Some(endpoints)),
        }
    }
}

impl EndpointStore for MemoryEndpointStore {
    fn load(&self) -> Result<Option<Vec<Endpoint>>, StoreError> {
        Ok(self.endpoints.lock().clone())
    }

    fn store(&self, endpoints: &[Endpoint]) -> Result<(), StoreError> {
        *self.endpoints.lock() = Some(endpoints.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::generate_key;

    fn get_endpoints() -> Vec<Endpoint> {
        vec![
            Endpoint::new("http://10.0.0.2:8080", 2, "second", "backup"),
            Endpoint::new("http://10.0.0.1:8080", 1, "first", "primary"),
            Endpoint::new("http://10.0.0.3:8080", 2, "", ""),
        ]
    }

    #[test]
    fn test_codec() {
        let codec = Codec::new(&generate_key());
        let data = get_endpoints();

        let blob = codec.seal(&data).unwrap();
        assert_eq!(blob[0], BLOB_VERSION);

        // Fresh nonce per seal
        assert_ne!(blob, codec.seal(&data).unwrap());

        assert_eq!(codec.open(&blob).unwrap(), data);
    }

    #[test]
    fn test_codec_rejects_tampering() {
        let codec = Codec::new(&generate_key());
        let blob = codec.seal(&get_endpoints()).unwrap();

        let mut flipped = blob.clone();
        let last = flipped.len() - 1;
        flipped[last] ^= 0x01;
        assert!(matches!(codec.open(&flipped), Err(StoreError::Decrypt)));

        let other = Codec::new(&generate_key());
        assert!(matches!(other.open(&blob), Err(StoreError::Decrypt)));

        let mut versioned = blob.clone();
        versioned[0] = 9;
        assert!(matches!(
            codec.open(&versioned),
            Err(StoreError::UnsupportedVersion(9))
        ));

        assert!(matches!(
            codec.open(&blob[..10]),
            Err(StoreError::Truncated(10))
        ));
    }

    #[test]
    fn test_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let base_dir = dir.path().to_str().unwrap();

        let store = FilesystemEndpointStore::new(base_dir, "servers.encrypted", "servers.key");
        assert!(store.load().unwrap().is_none());

        let data = get_endpoints();
        store.store(&data).unwrap();
        assert_eq!(store.load().unwrap(), Some(data.clone()));

        // The blob does not contain the plaintext
        let raw = fs::read(store.path()).unwrap();
        assert!(!raw.windows(9).any(|w| w == b"10.0.0.1:"));

        // A second store over the same files reuses the persisted key
        let reopened = FilesystemEndpointStore::new(base_dir, "servers.encrypted", "servers.key");
        assert_eq!(reopened.load().unwrap(), Some(data));
    }

    #[test]
    fn test_filesystem_wrong_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.encrypted");

        FilesystemEndpointStore::with_key(path.clone(), &generate_key())
            .store(&get_endpoints())
            .unwrap();

        let store = FilesystemEndpointStore::with_key(path, &generate_key());
        assert!(matches!(store.load(), Err(StoreError::Decrypt)));
    }

    #[test]
    fn test_failed_write_keeps_previous_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.encrypted");
        let key = generate_key();
        let store = FilesystemEndpointStore::with_key(path.clone(), &key);

        let data = get_endpoints();
        store.store(&data).unwrap();
        let before = fs::read(&path).unwrap();

        // Blob path replaced by a directory: the rename cannot succeed
        let blocked = FilesystemEndpointStore::with_key(dir.path().to_path_buf(), &key);
        assert!(blocked.store(&data[..1]).is_err());

        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(store.load().unwrap(), Some(data));
    }

    #[test]
    fn test_memory() {
        let store = MemoryEndpointStore::new();
        assert!(store.load().unwrap().is_none());

        let data = get_endpoints();
        store.store(&data).unwrap();
        assert_eq!(store.load().unwrap(), Some(data));
    }
}
