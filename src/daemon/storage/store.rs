use std::{
    future::Future,
    ops::Deref,
    path::PathBuf,
};

use anyhow::Result;

use crate::fs::operations::{read_locked, write_atomically};

/// Interface for abstracting persisted state. Values are opaque bytes addressed by a key; encoding
/// is the caller's business.
pub trait KeyValueStore {
    /// Returns `None` when nothing was ever stored under `key`.
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    fn write(&self, key: &str, value: &[u8]) -> impl Future<Output = Result<()>> + Send;
}

impl<T: Deref + Sync> KeyValueStore for T
where
    T::Target: KeyValueStore,
{
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send {
        self.deref().read(key)
    }

    fn write(&self, key: &str, value: &[u8]) -> impl Future<Output = Result<()>> + Send {
        self.deref().write(key, value)
    }
}

/// The main realization of [KeyValueStore]. Every key is a `<key>.json` file in one directory.
pub struct FileStore {
    state_dir: PathBuf,
}

impl FileStore {
    pub fn new(state_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&state_dir)?;

        Ok(Self { state_dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.state_dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        read_locked(&self.path_for(key)).await
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        write_atomically(&self.path_for(key), value).await
    }
}
