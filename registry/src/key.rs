// The key artifact holds the raw bytes of the symmetric key that seals the
// endpoint blob. It is created on first use and must stay paired with the blob.
use crate::store::write_atomic;
use chacha20poly1305::aead::{KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const KEY_LEN: usize = 32;

#[derive(thiserror::Error, Debug)]
pub enum KeyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("key file holds {0} bytes, expected {KEY_LEN}")]
    InvalidLength(usize),
}

pub fn generate_key() -> Key {
    XChaCha20Poly1305::generate_key(&mut OsRng)
}

pub struct KeyFile {
    path: PathBuf,
}

impl KeyFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        KeyFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `Ok(None)` if the key file does not exist.
    pub fn read(&self) -> Result<Option<Key>, KeyError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if bytes.len() != KEY_LEN {
            return Err(KeyError::InvalidLength(bytes.len()));
        }

        Ok(Some(Key::clone_from_slice(&bytes)))
    }

    pub fn write(&self, key: &Key) -> Result<(), KeyError> {
        write_atomic(&self.path, key.as_slice())?;
        Ok(())
    }

    /// Reads the key, generating and persisting a new one when the file is
    /// missing or has the wrong length. Never fails: if the key cannot be read
    /// or written, an in-memory key is used for the lifetime of the process.
    pub fn load_or_generate(&self) -> Key {
        match self.read() {
            Ok(Some(key)) => return key,
            Ok(None) => {
                tracing::warn!(path = ?self.path, "Key file not found, generating a new key");
            }
            Err(KeyError::InvalidLength(len)) => {
                tracing::error!(
                    path = ?self.path,
                    len,
                    "Key file is corrupt, replacing it with a new key"
                );
            }
            Err(err) => {
                tracing::error!(
                    path = ?self.path,
                    error = %err,
                    "Could not read key file, using an ephemeral key"
                );
                return generate_key();
            }
        }

        let key = generate_key();
        if let Err(err) = self.write(&key) {
            tracing::error!(
                path = ?self.path,
                error = %err,
                "Could not persist key file, the key will not survive a restart"
            );
        }
        key
    }
}
