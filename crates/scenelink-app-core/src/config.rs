// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config service and storage port.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Where serialized settings live. Keys are flat names such as `client`.
pub trait ConfigStore {
    /// Bytes stored under `key`, or [`ConfigError::NotFound`].
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Replace whatever is stored under `key`.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Failure loading or saving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Nothing stored under the key.
    #[error("config entry not found")]
    NotFound,
    /// Key cannot name a stored blob (empty, or contains a path separator).
    #[error("invalid config key `{0}`")]
    InvalidKey(String),
    /// Backing store IO.
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    /// The platform has no per-user config directory.
    #[error("no config directory for this user")]
    NoConfigDir,
    /// Stored bytes are not valid JSON for the requested type.
    #[error("config json: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Reject keys that could escape a flat namespace.
pub fn validate_key(key: &str) -> Result<(), ConfigError> {
    let bad = key.is_empty()
        || key.starts_with('.')
        || key.contains(['/', '\\'])
        || key.chars().any(char::is_control);
    if bad {
        return Err(ConfigError::InvalidKey(key.to_owned()));
    }
    Ok(())
}

/// Serializes config values as JSON and delegates storage to a `ConfigStore`.
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Wrap `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Unwrap the backing store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: ConfigStore> ConfigService<S> {
    /// Load and deserialize the value stored under `key`; `Ok(None)` if missing.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        validate_key(key)?;
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist `value` under `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        validate_key(key)?;
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }

    /// Load `key`, writing `T::default()` first when nothing is stored yet.
    pub fn load_or_init<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        if let Some(value) = self.load(key)? {
            return Ok(value);
        }
        let value = T::default();
        self.save(key, &value)?;
        Ok(value)
    }
}

/// Process-local store, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryConfigStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        n: u32,
    }

    #[test]
    fn load_or_init_writes_defaults_once() {
        let svc = ConfigService::new(MemoryConfigStore::new());
        assert_eq!(svc.load::<Sample>("sample").unwrap(), None);
        assert_eq!(svc.load_or_init::<Sample>("sample").unwrap(), Sample::default());
        svc.save("sample", &Sample { n: 7 }).unwrap();
        assert_eq!(svc.load_or_init::<Sample>("sample").unwrap(), Sample { n: 7 });
    }

    #[test]
    fn path_like_keys_are_rejected() {
        let svc = ConfigService::new(MemoryConfigStore::new());
        for key in ["", "../x", "a/b", ".hidden"] {
            assert!(matches!(
                svc.save(key, &Sample::default()),
                Err(ConfigError::InvalidKey(_))
            ));
        }
    }

    #[test]
    fn corrupt_blob_is_a_serde_error() {
        let store = MemoryConfigStore::new();
        store.save_raw("sample", b"{not json").unwrap();
        let svc = ConfigService::new(store);
        assert!(matches!(
            svc.load::<Sample>("sample"),
            Err(ConfigError::Serde(_))
        ));
    }
}
