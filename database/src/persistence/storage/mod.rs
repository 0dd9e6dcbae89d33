use std::{
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use thiserror::Error;

use self::{file::FileStorage, memory::MemoryStorage};

pub mod file;
pub mod memory;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Unable to initialize persistence: {0}")]
    UnableToInitializePersistence(io::Error),

    #[error("Unable to write blob: {0}")]
    UnableToWriteBlob(io::Error),

    #[error("Unable to read blob: {0}")]
    UnableToReadBlob(io::Error),

    #[error("Unable to write transaction: {0}")]
    UnableToWriteTransaction(io::Error),

    #[error("Unable to sync transaction buffer to persistent storage: {0}")]
    UnableToSyncTransactionBufferToPersistentStorage(io::Error),

    #[error("Unable to create new transaction log: {0}")]
    UnableToCreateNewTransactionLog(io::Error),

    #[error("Unable to load previous transactions: {0}")]
    UnableToLoadPreviousTransactions(io::Error),

    #[error("Unable to serialize {0}: {1}")]
    UnableToSerialize(&'static str, serde_json::Error),

    #[error("Unable to deserialize {0}: {1}")]
    UnableToDeserialize(&'static str, serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

pub enum ReadBlobState {
    Found(Vec<u8>),
    NotFound,
}

/// Where the snapshot blobs and the transaction log live
pub trait Storage {
    /// Called on database start-up, should be idempotent
    fn init(&mut self) -> StorageResult<()>;

    // Snapshot
    fn write_blob(&mut self, path: &str, bytes: &[u8]) -> StorageResult<()>;
    fn read_blob(&self, path: &str) -> StorageResult<ReadBlobState>;

    // Transactions
    fn transaction_write(&mut self, transaction: &[u8]) -> StorageResult<()>;
    fn transaction_sync(&self) -> StorageResult<()>;
    fn transaction_flush(&mut self) -> StorageResult<()>;
    fn transaction_load(&mut self) -> StorageResult<String>;
}

pub type SharedStorage = Arc<Mutex<dyn Storage + Sync + Send>>;

#[derive(Debug, Clone, PartialEq)]
pub enum StorageEngine {
    /// Persists to a directory on the local file system
    File(PathBuf),
    /// Nothing survives a restart, used for testing and throwaway instances
    Memory,
}

impl StorageEngine {
    pub fn get_engine(&self) -> StorageResult<SharedStorage> {
        let storage: SharedStorage = match self {
            StorageEngine::File(path) => Arc::new(Mutex::new(FileStorage::new(path.clone())?)),
            StorageEngine::Memory => Arc::new(Mutex::new(MemoryStorage::default())),
        };

        Ok(storage)
    }

    pub fn describe(&self) -> String {
        match self {
            StorageEngine::File(path) => format!("File [{}]", path.display()),
            StorageEngine::Memory => "Memory".to_string(),
        }
    }
}
