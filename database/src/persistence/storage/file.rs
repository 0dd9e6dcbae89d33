use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use super::{ReadBlobState, Storage, StorageError, StorageResult};

const TRANSACTION_LOG_PATH: &str = "transaction_log.json";
const TEMPORARY_BLOB_SUFFIX: &str = ".tmp";

pub struct FileStorage {
    base_path: PathBuf,
    log_file: File,
    transaction_file_path: PathBuf,
}

impl FileStorage {
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        let transaction_file_path = base_path.join(TRANSACTION_LOG_PATH);

        fs::create_dir_all(&base_path).map_err(StorageError::UnableToInitializePersistence)?;

        let log_file = open_log(&transaction_file_path)
            .map_err(StorageError::UnableToInitializePersistence)?;

        Ok(Self {
            base_path,
            log_file,
            transaction_file_path,
        })
    }

    fn get_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }
}

fn open_log(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().append(true).create(true).open(path)
}

impl Storage for FileStorage {
    fn init(&mut self) -> StorageResult<()> {
        fs::create_dir_all(&self.base_path).map_err(StorageError::UnableToInitializePersistence)
    }

    /// Writes a sibling temporary file and renames it over the blob, so the previous blob
    /// stays intact until the new one is complete
    fn write_blob(&mut self, path: &str, bytes: &[u8]) -> StorageResult<()> {
        let blob_path = self.get_path(path);
        let temporary_path = self.get_path(&format!("{}{}", path, TEMPORARY_BLOB_SUFFIX));

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temporary_path)
            .map_err(StorageError::UnableToWriteBlob)?;

        file.write_all(bytes).map_err(StorageError::UnableToWriteBlob)?;

        file.sync_all().map_err(StorageError::UnableToWriteBlob)?;

        fs::rename(&temporary_path, &blob_path).map_err(StorageError::UnableToWriteBlob)?;

        // Persists the rename itself
        #[cfg(unix)]
        File::open(&self.base_path)
            .and_then(|directory| directory.sync_all())
            .map_err(StorageError::UnableToWriteBlob)?;

        Ok(())
    }

    fn read_blob(&self, path: &str) -> StorageResult<ReadBlobState> {
        let mut file = match File::open(self.get_path(path)) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ReadBlobState::NotFound),
            Err(err) => return Err(StorageError::UnableToReadBlob(err)),
        };

        let mut buf = Vec::new();

        file.read_to_end(&mut buf)
            .map_err(StorageError::UnableToReadBlob)?;

        Ok(ReadBlobState::Found(buf))
    }

    fn transaction_write(&mut self, transaction: &[u8]) -> StorageResult<()> {
        // Buffered OS write, is not 'durable' without the fsync
        self.log_file
            .write_all(transaction)
            .map_err(StorageError::UnableToWriteTransaction)
    }

    fn transaction_sync(&self) -> StorageResult<()> {
        self.log_file
            .sync_all()
            .map_err(StorageError::UnableToSyncTransactionBufferToPersistentStorage)
    }

    fn transaction_flush(&mut self) -> StorageResult<()> {
        // Truncates the existing log, then re-opens it in append mode
        File::create(&self.transaction_file_path)
            .map_err(StorageError::UnableToCreateNewTransactionLog)?;

        self.log_file = open_log(&self.transaction_file_path)
            .map_err(StorageError::UnableToCreateNewTransactionLog)?;

        Ok(())
    }

    fn transaction_load(&mut self) -> StorageResult<String> {
        let mut contents = String::new();

        let mut file = match File::open(&self.transaction_file_path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(contents),
            Err(err) => return Err(StorageError::UnableToLoadPreviousTransactions(err)),
        };

        file.read_to_string(&mut contents)
            .map_err(StorageError::UnableToLoadPreviousTransactions)?;

        Ok(contents)
    }
}
