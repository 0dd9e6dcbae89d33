use std::sync::PoisonError;

use crate::database::options::DatabaseOptions;

use super::{
    snapshot::SnapshotManager,
    storage::{SharedStorage, StorageResult},
    transaction::TransactionWAL,
};

pub struct Persistence {
    pub transaction_wal: TransactionWAL,
    pub snapshot_manager: SnapshotManager,
}

impl Persistence {
    pub fn new(options: &DatabaseOptions) -> StorageResult<Self> {
        let storage = options.storage_engine.get_engine()?;

        Self::from_storage(options, storage)
    }

    /// Builds persistence on top of an existing storage, e.g. one shared with a previous instance
    pub fn from_storage(options: &DatabaseOptions, storage: SharedStorage) -> StorageResult<Self> {
        storage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .init()?;

        Ok(Self {
            transaction_wal: TransactionWAL::new(options.write_mode.clone(), storage.clone()),
            snapshot_manager: SnapshotManager::new(storage),
        })
    }
}
