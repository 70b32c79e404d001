use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_BLOB_FILENAME: &str = "server_config.encrypted";
pub const DEFAULT_KEY_FILENAME: &str = "server_key.key";

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Empty base directory")]
    EmptyBaseDir,

    #[error("Empty filename")]
    EmptyFilename,

    #[error("Blob and key share the filename {0}")]
    SharedFilename(String),
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum EndpointStoreType {
    Filesystem {
        base_dir: String,
        #[serde(default = "default_blob_filename")]
        blob_filename: String,
        #[serde(default = "default_key_filename")]
        key_filename: String,
    },
    Memory,
}

fn default_blob_filename() -> String {
    DEFAULT_BLOB_FILENAME.into()
}

fn default_key_filename() -> String {
    DEFAULT_KEY_FILENAME.into()
}

impl Default for EndpointStoreType {
    fn default() -> Self {
        EndpointStoreType::Filesystem {
            base_dir: ".".into(),
            blob_filename: default_blob_filename(),
            key_filename: default_key_filename(),
        }
    }
}

#[derive(Clone, Deserialize, Debug, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub store: EndpointStoreType,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.store {
            EndpointStoreType::Filesystem {
                base_dir,
                blob_filename,
                key_filename,
            } => {
                if base_dir.is_empty() {
                    return Err(ValidationError::EmptyBaseDir);
                }
                if blob_filename.is_empty() || key_filename.is_empty() {
                    return Err(ValidationError::EmptyFilename);
                }
                if blob_filename == key_filename {
                    return Err(ValidationError::SharedFilename(blob_filename.clone()));
                }
                Ok(())
            }
            EndpointStoreType::Memory => Ok(()),
        }
    }
}
