use std::{path::PathBuf, time::Duration};

use crate::persistence::{
    storage::StorageEngine,
    transaction::{TransactionFileWriteMode, TransactionWriteMode},
};

#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub restore: bool,
    pub write_mode: TransactionWriteMode,
    pub storage_engine: StorageEngine,
    pub threads: usize,
    pub request_timeout: Duration,
}

// Implements: https://rust-unofficial.github.io/patterns/patterns/creational/builder.html
impl DatabaseOptions {
    /// Defines whether we should attempt to restore the database from a snapshot and transaction log
    /// on startup
    pub fn set_restore(mut self, restore: bool) -> Self {
        self.restore = restore;
        self
    }

    /// Defines whether we should sync the file write to disk before marking the
    /// transaction as committed. This is useful for durability but costs an fsync per write
    pub fn set_sync_file_write(mut self, write_mode: TransactionWriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    pub fn set_storage_engine(mut self, storage_engine: StorageEngine) -> Self {
        self.storage_engine = storage_engine;
        self
    }

    pub fn set_data_directory(self, data_directory: PathBuf) -> Self {
        self.set_storage_engine(StorageEngine::File(data_directory))
    }

    /// Number of database worker threads, at least one is always started
    pub fn set_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// How long a caller waits for the database before giving up on a request
    pub fn set_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        // Defaults to $CWD/data
        Self {
            write_mode: TransactionWriteMode::File(TransactionFileWriteMode::Sync),
            storage_engine: StorageEngine::File(PathBuf::from("data")),
            restore: true,
            threads: 2,
            request_timeout: Duration::from_secs(2),
        }
    }
}

impl DatabaseOptions {
    /// Volatile in-memory database, nothing is restored or written to disk
    pub fn new_test() -> Self {
        DatabaseOptions::default()
            .set_storage_engine(StorageEngine::Memory)
            .set_restore(false)
            .set_threads(2)
            .set_sync_file_write(TransactionWriteMode::Off)
    }
}
