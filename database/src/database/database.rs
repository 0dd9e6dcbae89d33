use std::{
    sync::{Arc, Mutex, PoisonError},
    thread,
    time::Instant,
};

use flume::Receiver;
use num_format::{Locale, ToFormattedString};
use thiserror::Error;

use crate::{
    consts::consts::TransactionId,
    model::statement::{Statement, StatementResult},
    persistence::{persistence::Persistence, storage::StorageError},
};

use super::{
    commands::{DatabaseCommand, DatabaseCommandRequest, DatabaseCommandResponse},
    control::ControlContext,
    options::DatabaseOptions,
    request_manager::RequestManager,
    table::table::{ApplyErrors, Applied, PersonTable, Rollback},
};

#[derive(Error, Debug)]
pub enum DatabaseStatementError {
    #[error(transparent)]
    Apply(#[from] ApplyErrors),

    #[error("Statement was not persisted: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum DatabaseStartError {
    #[error("Unable to restore database: {0}")]
    Storage(#[from] StorageError),

    #[error("Unable to replay transaction {0}: {1}")]
    Replay(TransactionId, ApplyErrors),

    #[error("Unable to spawn database thread: {0}")]
    UnableToSpawnThread(std::io::Error),
}

pub enum ApplyMode {
    /// Statement comes from a caller, mutations are written to the transaction log
    Request,
    /// Statement is being replayed from the transaction log at its original transaction id
    Restore(TransactionId),
}

pub struct Database {
    pub(crate) person_table: PersonTable,
    pub(crate) persistence: Persistence,
    pub(crate) database_options: DatabaseOptions,
    /// Held while a mutation is applied and logged, keeps the log in transaction id order
    commit_lock: Mutex<()>,
}

impl Database {
    pub fn new(database_options: DatabaseOptions) -> Result<Self, StorageError> {
        let persistence = Persistence::new(&database_options)?;

        Ok(Self::with_persistence(database_options, persistence))
    }

    pub fn with_persistence(database_options: DatabaseOptions, persistence: Persistence) -> Self {
        Self {
            person_table: PersonTable::new(),
            persistence,
            database_options,
            commit_lock: Mutex::new(()),
        }
    }

    /// Restores (when enabled) and starts the database threads. The returned handle is how
    /// callers talk to the database.
    pub fn run(self) -> Result<RequestManager, DatabaseStartError> {
        log::info!(
            "Storage engine: [{}]",
            self.database_options.storage_engine.describe()
        );

        if self.database_options.restore {
            self.restore()?;
        }

        let (database_sender, database_receiver) = flume::unbounded::<DatabaseCommandRequest>();

        let request_manager =
            RequestManager::new(database_sender, self.database_options.request_timeout);

        let threads = self.database_options.threads.max(1);

        let database = Arc::new(self);

        for thread_id in 0..threads {
            let database = database.clone();
            let database_receiver = database_receiver.clone();
            let request_manager = request_manager.clone();

            thread::Builder::new()
                .name(format!("Database {}", thread_id))
                .spawn(move || database.run_worker(thread_id, database_receiver, request_manager))
                .map_err(DatabaseStartError::UnableToSpawnThread)?;
        }

        Ok(request_manager)
    }

    fn run_worker(
        &self,
        thread_id: usize,
        database_receiver: Receiver<DatabaseCommandRequest>,
        request_manager: RequestManager,
    ) {
        // Process incoming requests from the channel
        while let Ok(DatabaseCommandRequest { resolver, command }) = database_receiver.recv() {
            log::debug!(
                "[Thread - {}] Received request: {}",
                thread_id,
                command.log_format()
            );

            match command {
                DatabaseCommand::Statement(statement) => {
                    let response = self.process_statement(statement);

                    // Sends the response data back to the caller of the request, if they are still waiting
                    let _ = resolver.send(response);
                }
                DatabaseCommand::Control(control) => {
                    let control_context = ControlContext {
                        resolver,
                        thread_id,
                        database: self,
                        request_manager: &request_manager,
                    };

                    control_context.run(control);

                    // The only control is shutdown, this thread is done
                    break;
                }
            }
        }

        log::info!("[Thread - {}] Database thread stopped", thread_id);
    }

    fn process_statement(&self, statement: Statement) -> DatabaseCommandResponse {
        match self.apply_statement(statement, ApplyMode::Request) {
            Ok(result) => DatabaseCommandResponse::statement_success(result),
            Err(err) => {
                log::warn!("⚠️  Statement failed: {}", err);
                DatabaseCommandResponse::statement_failure(&err.to_string())
            }
        }
    }

    pub fn apply_statement(
        &self,
        statement: Statement,
        mode: ApplyMode,
    ) -> Result<StatementResult, DatabaseStatementError> {
        let transaction_wal = &self.persistence.transaction_wal;

        if statement.is_query() {
            let Applied { result, .. } = self
                .person_table
                .apply(statement, &transaction_wal.get_current_transaction_id())?;

            return Ok(result);
        }

        let _commit_guard = self
            .commit_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let transaction_id = match &mode {
            ApplyMode::Request => transaction_wal.get_increment_current_transaction_id(),
            ApplyMode::Restore(transaction_id) => {
                transaction_wal.observe_transaction_id(transaction_id);
                transaction_id.clone()
            }
        };

        let Applied { result, rollback } = self
            .person_table
            .apply(statement.clone(), &transaction_id)?;

        let is_replay = matches!(mode, ApplyMode::Restore(_));

        // Nothing changed (e.g. removing a missing id), nothing to persist
        if !is_replay && rollback != Rollback::Nothing {
            if let Err(err) = transaction_wal.commit(&transaction_id, &statement) {
                log::error!(
                    "⚠️  Rolled back: [TX: {}] unable to write transaction log",
                    transaction_id
                );

                self.person_table.apply_rollback(rollback);

                return Err(err.into());
            }

            log::info!("✅ Committed: [TX: {}]", transaction_id);
        }

        Ok(result)
    }

    /// Loads the snapshot, then replays the transactions logged after it
    #[tracing::instrument(skip(self))]
    fn restore(&self) -> Result<(), DatabaseStartError> {
        let now = Instant::now();

        let transaction_wal = &self.persistence.transaction_wal;

        let (snapshot_count, metadata) = self
            .persistence
            .snapshot_manager
            .restore_snapshot(&self.person_table)?;

        transaction_wal.observe_transaction_id(&metadata.current_transaction_id);

        let restored_transactions = transaction_wal.restore()?;
        let restored_transaction_count = restored_transactions.len();

        for transaction in restored_transactions {
            // Already part of the snapshot, the log was not emptied after it was taken
            if transaction.id <= metadata.current_transaction_id {
                continue;
            }

            let transaction_id = transaction.id.clone();

            self.apply_statement(transaction.statement, ApplyMode::Restore(transaction.id))
                .map_err(|err| match err {
                    DatabaseStatementError::Apply(e) => DatabaseStartError::Replay(transaction_id, e),
                    DatabaseStatementError::Storage(e) => DatabaseStartError::Storage(e),
                })?;
        }

        log::info!(
            "✅ Successful Restore [Duration: {}ms]",
            now.elapsed().as_millis(),
        );

        log::info!(
            "📀 Data               [RowsFromSnapshot: {}, TransactionsAppliedToSnapshot: {}, CurrentTxId: {}]",
            snapshot_count.to_formatted_string(&Locale::en),
            restored_transaction_count.to_formatted_string(&Locale::en),
            transaction_wal
                .get_current_transaction_id()
                .to_number()
                .to_formatted_string(&Locale::en)
        );

        Ok(())
    }

    /// Persists the table and empties the transaction log. Callers must make sure no other
    /// thread is applying statements. Returns the row count and the number of flushed transactions.
    pub(crate) fn snapshot(&self) -> Result<(usize, usize), StorageError> {
        let transaction_wal = &self.persistence.transaction_wal;

        let row_count = self.persistence.snapshot_manager.create_snapshot(
            &self.person_table,
            transaction_wal.get_current_transaction_id(),
        )?;

        let flushed_transactions = transaction_wal.flush_transactions()?;

        Ok((row_count, flushed_transactions))
    }
}

#[cfg(test)]
impl Database {
    pub fn new_test() -> Self {
        Database::new(DatabaseOptions::new_test()).expect("memory storage should always start")
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        path::PathBuf,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use uuid::Uuid;

    use crate::{
        consts::consts::EntityId,
        database::request_manager::RequestManagerError,
        model::person::{NewPerson, Person},
        persistence::{
            storage::{
                memory::MemoryStorage, ReadBlobState, SharedStorage, Storage, StorageEngine,
                StorageResult,
            },
            transaction::{TransactionFileWriteMode, TransactionWriteMode},
        },
    };

    use super::*;

    fn new_person(name: &str, age: &str) -> NewPerson {
        NewPerson::parse(Some(name), Some(age)).expect("test input should be valid")
    }

    mod statements {
        use test_log::test;

        use super::*;

        #[test]
        fn add_happy_path() {
            let database = Database::new_test();

            let person = Person::new_test();

            let result = database
                .apply_statement(Statement::Add(person.clone()), ApplyMode::Request)
                .unwrap();

            assert_eq!(result, StatementResult::Single(person));
        }

        #[test]
        fn add_duplicate_id_fails() {
            let database = Database::new_test();

            let person = Person::new_test();

            database
                .apply_statement(Statement::Add(person.clone()), ApplyMode::Request)
                .unwrap();

            let err = database
                .apply_statement(Statement::Add(person.clone()), ApplyMode::Request)
                .err()
                .expect("should reject the duplicate");

            assert_eq!(
                err.to_string(),
                format!("Cannot create, record already exists: {}", person.id)
            );
        }

        #[test]
        fn remove_is_idempotent() {
            let database = Database::new_test();

            let person = Person::new_test();

            database
                .apply_statement(Statement::Add(person.clone()), ApplyMode::Request)
                .unwrap();

            let first = database
                .apply_statement(Statement::Remove(person.id.clone()), ApplyMode::Request)
                .unwrap();

            let second = database
                .apply_statement(Statement::Remove(person.id.clone()), ApplyMode::Request)
                .unwrap();

            assert_eq!(first, StatementResult::Removed(1));
            assert_eq!(second, StatementResult::Removed(0));
        }

        #[test]
        fn list_empty_database() {
            let database = Database::new_test();

            let result = database
                .apply_statement(Statement::List, ApplyMode::Request)
                .unwrap();

            assert_eq!(result, StatementResult::List(vec![]));
        }
    }

    mod transaction_rollback {
        use test_log::test;

        use super::*;

        /// Accepts blobs but fails every transaction write
        struct FailingTransactionStorage;

        impl Storage for FailingTransactionStorage {
            fn init(&mut self) -> StorageResult<()> {
                Ok(())
            }

            fn write_blob(&mut self, _: &str, _: &[u8]) -> StorageResult<()> {
                Ok(())
            }

            fn read_blob(&self, _: &str) -> StorageResult<ReadBlobState> {
                Ok(ReadBlobState::NotFound)
            }

            fn transaction_write(&mut self, _: &[u8]) -> StorageResult<()> {
                Err(StorageError::UnableToWriteTransaction(std::io::Error::other(
                    "disk full",
                )))
            }

            fn transaction_sync(&self) -> StorageResult<()> {
                Ok(())
            }

            fn transaction_flush(&mut self) -> StorageResult<()> {
                Ok(())
            }

            fn transaction_load(&mut self) -> StorageResult<String> {
                Ok(String::new())
            }
        }

        fn failing_database() -> Database {
            let options = DatabaseOptions::new_test()
                .set_sync_file_write(TransactionWriteMode::File(TransactionFileWriteMode::Sync));

            let storage: SharedStorage = Arc::new(Mutex::new(FailingTransactionStorage));

            Database::with_persistence(
                options.clone(),
                Persistence::from_storage(&options, storage).unwrap(),
            )
        }

        #[test]
        fn failed_log_write_rolls_back_add() {
            let database = failing_database();

            let result =
                database.apply_statement(Statement::Add(Person::new_test()), ApplyMode::Request);

            assert!(matches!(result, Err(DatabaseStatementError::Storage(_))));
            assert!(database.person_table.is_empty(), "Add should be rolled back");
        }

        #[test]
        fn failed_log_write_rolls_back_remove() {
            let database = failing_database();

            let person = Person::new_test();

            // Restore mode skips the log, so the row exists without a log write
            database
                .apply_statement(
                    Statement::Add(person.clone()),
                    ApplyMode::Restore(TransactionId(1)),
                )
                .unwrap();

            let result = database
                .apply_statement(Statement::Remove(person.id.clone()), ApplyMode::Request);

            assert!(matches!(result, Err(DatabaseStatementError::Storage(_))));
            assert_eq!(database.person_table.list(), vec![person]);
        }

        #[test]
        fn removing_missing_id_does_not_touch_the_log() {
            let database = failing_database();

            let result = database.apply_statement(
                Statement::Remove(EntityId("missing".to_string())),
                ApplyMode::Request,
            );

            assert_eq!(result.unwrap(), StatementResult::Removed(0));
        }
    }

    mod restore {
        use test_log::test;

        use super::*;

        fn file_options(directory: PathBuf) -> DatabaseOptions {
            DatabaseOptions::new_test()
                .set_storage_engine(StorageEngine::File(directory))
                .set_restore(true)
                .set_sync_file_write(TransactionWriteMode::File(TransactionFileWriteMode::Sync))
        }

        fn test_directory() -> PathBuf {
            std::env::temp_dir()
                .join("persons")
                .join(Uuid::new_v4().to_string())
        }

        #[test]
        fn replays_transaction_log() {
            let directory = test_directory();

            let kept = Person::new("Kept".to_string(), 30);
            let removed = Person::new("Removed".to_string(), 40);

            {
                let database = Database::new(file_options(directory.clone())).unwrap();

                for statement in [
                    Statement::Add(kept.clone()),
                    Statement::Add(removed.clone()),
                    Statement::Remove(removed.id.clone()),
                ] {
                    database
                        .apply_statement(statement, ApplyMode::Request)
                        .unwrap();
                }
            }

            let database = Database::new(file_options(directory)).unwrap();
            database.restore().unwrap();

            assert_eq!(database.person_table.list(), vec![kept]);
            assert_eq!(
                database.persistence.transaction_wal.get_current_transaction_id(),
                TransactionId(3)
            );
        }

        #[test]
        fn restores_snapshot_then_later_transactions() {
            let directory = test_directory();

            let before_snapshot = Person::new("Before".to_string(), 1);
            let after_snapshot = Person::new("After".to_string(), 2);

            {
                let database = Database::new(file_options(directory.clone())).unwrap();

                database
                    .apply_statement(Statement::Add(before_snapshot.clone()), ApplyMode::Request)
                    .unwrap();

                assert_eq!(database.snapshot().unwrap(), (1, 1));

                database
                    .apply_statement(Statement::Add(after_snapshot.clone()), ApplyMode::Request)
                    .unwrap();
            }

            let database = Database::new(file_options(directory)).unwrap();
            database.restore().unwrap();

            assert_eq!(
                database.person_table.list(),
                vec![before_snapshot, after_snapshot]
            );
        }

        #[test]
        fn skips_logged_transactions_already_in_snapshot() {
            let storage: SharedStorage = Arc::new(Mutex::new(MemoryStorage::default()));
            let options = DatabaseOptions::new_test()
                .set_sync_file_write(TransactionWriteMode::File(TransactionFileWriteMode::Sync));

            let person = Person::new_test();

            {
                let persistence = Persistence::from_storage(&options, storage.clone()).unwrap();
                let database = Database::with_persistence(options.clone(), persistence);

                database
                    .apply_statement(Statement::Add(person.clone()), ApplyMode::Request)
                    .unwrap();

                // Snapshot without emptying the log, as if the flush failed
                database
                    .persistence
                    .snapshot_manager
                    .create_snapshot(&database.person_table, TransactionId(1))
                    .unwrap();
            }

            let persistence = Persistence::from_storage(&options, storage).unwrap();
            let database = Database::with_persistence(options, persistence);

            database
                .restore()
                .expect("replaying the logged add should be skipped");

            assert_eq!(database.person_table.list(), vec![person]);
        }

        #[test]
        fn torn_last_log_line_does_not_block_restart() {
            let storage: SharedStorage = Arc::new(Mutex::new(MemoryStorage::default()));
            let options = DatabaseOptions::new_test()
                .set_sync_file_write(TransactionWriteMode::File(TransactionFileWriteMode::Sync));

            let person = Person::new_test();

            {
                let persistence = Persistence::from_storage(&options, storage.clone()).unwrap();
                let database = Database::with_persistence(options.clone(), persistence);

                database
                    .apply_statement(Statement::Add(person.clone()), ApplyMode::Request)
                    .unwrap();
            }

            // Process died while appending the next transaction
            storage
                .lock()
                .unwrap()
                .transaction_write(br#"{"id":2,"statem"#)
                .unwrap();

            let persistence = Persistence::from_storage(&options, storage).unwrap();
            let database = Database::with_persistence(options, persistence);

            database
                .restore()
                .expect("the incomplete line should be dropped");

            assert_eq!(database.person_table.list(), vec![person]);
            assert_eq!(
                database.persistence.transaction_wal.get_current_transaction_id(),
                TransactionId(1)
            );
        }
    }

    mod request_manager {
        use test_log::test;

        use super::*;

        #[test(tokio::test)]
        async fn create_list_delete_scenario() {
            let request_manager = Database::new_test().run().unwrap();

            // Create
            let created = request_manager
                .send_create(new_person("Cristian", "27"))
                .await
                .unwrap();

            assert!(!created.id.as_str().is_empty());

            // List contains exactly that record
            let people = request_manager.send_list().await.unwrap();

            assert_eq!(people.len(), 1);
            assert_eq!(people[0].id, created.id);
            assert_eq!(people[0].name, "Cristian");
            assert_eq!(people[0].age, 27);

            // Delete, twice
            assert_eq!(request_manager.send_remove(created.id.clone()).await, Ok(1));
            assert_eq!(request_manager.send_remove(created.id.clone()).await, Ok(0));

            assert_eq!(request_manager.send_list().await.unwrap(), vec![]);

            request_manager.send_shutdown_request().await.unwrap();
        }

        #[test(tokio::test)]
        async fn deleting_unknown_id_keeps_existing_records() {
            let request_manager = Database::new_test().run().unwrap();

            let created = request_manager
                .send_create(new_person("Cristian", "27"))
                .await
                .unwrap();

            assert_eq!(
                request_manager
                    .send_remove(EntityId("never-created".to_string()))
                    .await,
                Ok(0)
            );

            assert_eq!(request_manager.send_list().await.unwrap(), vec![created]);

            request_manager.send_shutdown_request().await.unwrap();
        }

        #[test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
        async fn concurrent_creates_get_distinct_ids() {
            let request_manager = Database::new(DatabaseOptions::new_test().set_threads(4))
                .unwrap()
                .run()
                .unwrap();

            let handles: Vec<_> = (0..20)
                .map(|i| {
                    let request_manager = request_manager.clone();

                    tokio::spawn(async move {
                        request_manager
                            .send_create(new_person(&format!("Person {}", i), "30"))
                            .await
                    })
                })
                .collect();

            let mut created = vec![];

            for handle in handles {
                created.push(handle.await.unwrap().unwrap());
            }

            let people = request_manager.send_list().await.unwrap();

            let ids: HashSet<EntityId> = people.iter().map(|p| p.id.clone()).collect();

            assert_eq!(people.len(), 20);
            assert_eq!(ids.len(), 20, "every record should have its own id");

            for person in created {
                assert!(people.contains(&person));
            }

            request_manager.send_shutdown_request().await.unwrap();
        }

        #[test(tokio::test)]
        async fn requests_after_shutdown_fail() {
            let options = DatabaseOptions::new_test().set_request_timeout(Duration::from_millis(200));

            let request_manager = Database::new(options).unwrap().run().unwrap();

            let response = request_manager.send_shutdown_request().await.unwrap();

            assert!(response.contains("Successfully shutdown database"));

            // Either the channel is already disconnected or nobody is left to answer
            let result = request_manager.send_list().await;

            assert!(matches!(
                result,
                Err(RequestManagerError::DatabaseUnavailable)
                    | Err(RequestManagerError::DatabaseTimeout)
            ));
        }

        #[test(tokio::test)]
        async fn shutdown_snapshots_file_database() {
            let directory = std::env::temp_dir()
                .join("persons")
                .join(Uuid::new_v4().to_string());

            let options = DatabaseOptions::new_test()
                .set_data_directory(directory.clone())
                .set_restore(true)
                .set_sync_file_write(TransactionWriteMode::File(TransactionFileWriteMode::Sync));

            let request_manager = Database::new(options.clone()).unwrap().run().unwrap();

            let created = request_manager
                .send_create(new_person("Cristian", "27"))
                .await
                .unwrap();

            request_manager.send_shutdown_request().await.unwrap();

            // The log was compacted into the snapshot
            let restarted = Database::new(options).unwrap();

            assert!(restarted
                .persistence
                .transaction_wal
                .restore()
                .unwrap()
                .is_empty());

            let request_manager = restarted.run().unwrap();

            assert_eq!(request_manager.send_list().await.unwrap(), vec![created]);

            request_manager.send_shutdown_request().await.unwrap();
        }
    }
}
