use std::time::Duration;

use flume::Sender;
use thiserror::Error;

use crate::{
    consts::consts::EntityId,
    model::{
        person::{NewPerson, Person},
        statement::{Statement, StatementResult},
    },
};

use super::commands::{
    Control, DatabaseCommand, DatabaseCommandControlResponse, DatabaseCommandRequest,
    DatabaseCommandResponse, DatabaseCommandStatementResponse, ShutdownRequest,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestManagerError {
    #[error("Database took too long to respond to the request")]
    DatabaseTimeout,
    #[error("Database is not running")]
    DatabaseUnavailable,
    #[error("Statement failed: {0}")]
    StatementFailed(String),
    #[error("Control failed: {0}")]
    ControlFailed(String),
    #[error("Database responded with an unexpected response type")]
    UnexpectedResponse,
}

/// Goal of the request manager is to provide a simple interface for interacting with the database
///
/// The request manager provides the following APIs, sorted by the easiest to use to the most complex
/// 1. CRUD operations on a single person -- these are completely type safe
/// 2. Generic statement based API -- not type safe because you need to know what Statement maps to which
///    StatementResult (e.g. Statement::Add maps -> StatementResult::Single)
/// 3. Raw command API -- used by the database threads to coordinate with each other
///
/// Handles are cheap to clone, every clone talks to the same database.
#[derive(Clone, Debug)]
pub struct RequestManager {
    database_sender: Sender<DatabaseCommandRequest>,
    timeout: Duration,
}

impl RequestManager {
    pub fn new(database_sender: Sender<DatabaseCommandRequest>, timeout: Duration) -> Self {
        Self {
            database_sender,
            timeout,
        }
    }

    /// Stores a new person under a freshly assigned id
    pub async fn send_create(&self, new_person: NewPerson) -> Result<Person, RequestManagerError> {
        self.send_add(new_person.into_person()).await
    }

    pub async fn send_add(&self, person: Person) -> Result<Person, RequestManagerError> {
        self.send_statement(Statement::Add(person))
            .await?
            .single()
            .ok_or(RequestManagerError::UnexpectedResponse)
    }

    /// Returns how many documents were removed, removing an unknown id is not an error
    pub async fn send_remove(&self, id: EntityId) -> Result<usize, RequestManagerError> {
        self.send_statement(Statement::Remove(id))
            .await?
            .removed()
            .ok_or(RequestManagerError::UnexpectedResponse)
    }

    pub async fn send_list(&self) -> Result<Vec<Person>, RequestManagerError> {
        self.send_statement(Statement::List)
            .await?
            .list()
            .ok_or(RequestManagerError::UnexpectedResponse)
    }

    /// Sends a shutdown request to the database and returns the database's response
    pub async fn send_shutdown_request(&self) -> Result<String, RequestManagerError> {
        let response = self
            .send_command(DatabaseCommand::Control(Control::Shutdown(
                ShutdownRequest::Coordinator,
            )))
            .await?;

        control_result(response)
    }

    /// Sends a single statement to the database and returns a single statement result
    pub async fn send_statement(
        &self,
        statement: Statement,
    ) -> Result<StatementResult, RequestManagerError> {
        match self.send_command(DatabaseCommand::Statement(statement)).await? {
            DatabaseCommandResponse::Statement(DatabaseCommandStatementResponse::Success(r)) => {
                Ok(r)
            }
            DatabaseCommandResponse::Statement(DatabaseCommandStatementResponse::Failure(e)) => {
                Err(RequestManagerError::StatementFailed(e))
            }
            DatabaseCommandResponse::Control(_) => Err(RequestManagerError::UnexpectedResponse),
        }
    }

    pub async fn send_command(
        &self,
        command: DatabaseCommand,
    ) -> Result<DatabaseCommandResponse, RequestManagerError> {
        let response_receiver = self.enqueue(command)?;

        // oneshot receivers are futures, the database resolves them once it has processed the request
        match tokio::time::timeout(self.timeout, response_receiver).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(oneshot::RecvError)) => Err(RequestManagerError::DatabaseUnavailable),
            Err(_) => Err(RequestManagerError::DatabaseTimeout),
        }
    }

    /// Blocking version of [`RequestManager::send_command`], for use outside of an async runtime
    pub fn send_command_blocking(
        &self,
        command: DatabaseCommand,
    ) -> Result<DatabaseCommandResponse, RequestManagerError> {
        let response_receiver = self.enqueue(command)?;

        match response_receiver.recv_timeout(self.timeout) {
            Ok(response) => Ok(response),
            Err(oneshot::RecvTimeoutError::Timeout) => Err(RequestManagerError::DatabaseTimeout),
            Err(oneshot::RecvTimeoutError::Disconnected) => {
                Err(RequestManagerError::DatabaseUnavailable)
            }
        }
    }

    pub(crate) fn send_worker_shutdown_request(&self) -> Result<String, RequestManagerError> {
        let response = self.send_command_blocking(DatabaseCommand::Control(Control::Shutdown(
            ShutdownRequest::Worker,
        )))?;

        control_result(response)
    }

    fn enqueue(
        &self,
        command: DatabaseCommand,
    ) -> Result<oneshot::Receiver<DatabaseCommandResponse>, RequestManagerError> {
        let (resolver, response_receiver) = oneshot::channel::<DatabaseCommandResponse>();

        // Sends the request to the database worker, database will respond
        //  on the response_receiver once it's finished processing the request
        self.database_sender
            .send(DatabaseCommandRequest { resolver, command })
            .map_err(|_| RequestManagerError::DatabaseUnavailable)?;

        Ok(response_receiver)
    }
}

fn control_result(response: DatabaseCommandResponse) -> Result<String, RequestManagerError> {
    match response {
        DatabaseCommandResponse::Control(DatabaseCommandControlResponse::Success(s)) => Ok(s),
        DatabaseCommandResponse::Control(DatabaseCommandControlResponse::Error(e)) => {
            Err(RequestManagerError::ControlFailed(e))
        }
        DatabaseCommandResponse::Statement(_) => Err(RequestManagerError::UnexpectedResponse),
    }
}
