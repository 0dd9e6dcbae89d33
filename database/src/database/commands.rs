use crate::model::statement::{Statement, StatementResult};

/// Database commands are how we interact with the database, they are how we ask the database to run a statement, shutdown, etc
///
/// The majority of interactions happen via statements (add, remove, list), but there are also commands that are used
/// to control the database (e.g. shutdown).
#[derive(Debug)]
pub enum DatabaseCommand {
    /// Runs a single statement against the database and returns its result
    Statement(Statement),

    /// Commands that control the database
    Control(Control),
}

impl DatabaseCommand {
    /// Prints complex logs in a more readable format
    pub fn log_format(&self) -> String {
        match self {
            DatabaseCommand::Statement(Statement::List) => "List".to_string(),
            DatabaseCommand::Statement(statement) => format!("{:?}", statement),
            DatabaseCommand::Control(control) => format!("Control({:?})", control),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DatabaseCommandStatementResponse {
    /// Statement was applied (and committed if it was a mutation)
    Success(StatementResult),
    /// Statement was not applied, returns a message for why
    Failure(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum DatabaseCommandControlResponse {
    /// Successfully performed the control
    Success(String),
    /// Command has failed, returns a message for why it failed
    Error(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum DatabaseCommandResponse {
    Statement(DatabaseCommandStatementResponse),
    Control(DatabaseCommandControlResponse),
}

impl DatabaseCommandResponse {
    pub fn statement_success(result: StatementResult) -> Self {
        DatabaseCommandResponse::Statement(DatabaseCommandStatementResponse::Success(result))
    }

    pub fn statement_failure(message: &str) -> Self {
        DatabaseCommandResponse::Statement(DatabaseCommandStatementResponse::Failure(
            message.to_string(),
        ))
    }

    pub fn control_success(message: &str) -> Self {
        DatabaseCommandResponse::Control(DatabaseCommandControlResponse::Success(
            message.to_string(),
        ))
    }

    pub fn control_error(message: &str) -> Self {
        DatabaseCommandResponse::Control(DatabaseCommandControlResponse::Error(message.to_string()))
    }
}

#[derive(Debug, PartialEq)]
pub enum ShutdownRequest {
    // Single thread that is responsible for checking that other threads shut down
    Coordinator,
    // Thread that shuts down
    Worker,
}

#[derive(Debug)]
pub enum Control {
    /// Performs a safe shutdown of the database, requests before the shutdown will be run / committed, requests
    /// after the shutdown will fail. The coordinator snapshots the table and empties the transaction log.
    Shutdown(ShutdownRequest),
}

pub struct DatabaseCommandRequest {
    pub resolver: oneshot::Sender<DatabaseCommandResponse>,
    pub command: DatabaseCommand,
}
