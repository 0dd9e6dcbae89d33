use oneshot::Sender;

use super::{
    commands::{Control, DatabaseCommandResponse, ShutdownRequest},
    database::Database,
    request_manager::RequestManager,
};

pub struct ControlContext<'a> {
    pub resolver: Sender<DatabaseCommandResponse>,
    pub thread_id: usize,
    pub database: &'a Database,
    pub request_manager: &'a RequestManager,
}

impl<'a> ControlContext<'a> {
    /// Every control ends the receiving thread
    pub fn run(self, control: Control) {
        match control {
            Control::Shutdown(r) => self.shutdown(r),
        }
    }

    fn send_response(self, response: DatabaseCommandResponse) {
        // Requester may have timed out and dropped the receiver, nothing left to tell them
        let _ = self.resolver.send(response);
    }

    pub fn shutdown(self, request: ShutdownRequest) {
        // The DB thread that received the shutdown request is responsible for ensuring all the other threads shutdown.
        let response = match request {
            ShutdownRequest::Coordinator => self.coordinate_shutdown(),
            ShutdownRequest::Worker => DatabaseCommandResponse::control_success(&format!(
                "[Thread: {}] Successfully shut down worker thread",
                self.thread_id
            )),
        };

        self.send_response(response);
    }

    fn coordinate_shutdown(&self) -> DatabaseCommandResponse {
        // Every other thread takes exactly one worker shutdown off the shared queue, once it has
        //  taken it, it exits and cannot take another. This thread is blocked here so it never takes one.
        let other_threads = self.database.database_options.threads.max(1) - 1;

        for _ in 0..other_threads {
            if let Err(e) = self.request_manager.send_worker_shutdown_request() {
                log::error!(
                    "[Thread: {}] Worker did not acknowledge shutdown: {}",
                    self.thread_id,
                    e
                );
            }
        }

        // No other thread is applying statements, the table is stable
        match self.database.snapshot() {
            Ok((row_count, flushed_transactions)) => {
                DatabaseCommandResponse::control_success(&format!(
                    "[Thread: {}] Successfully shutdown database, snapshotted {} rows, compressed {} txs",
                    self.thread_id, row_count, flushed_transactions
                ))
            }
            Err(e) => {
                // The transaction log is still intact, the next start-up replays it
                log::error!("Failed to snapshot database on shutdown: {}", e);

                DatabaseCommandResponse::control_error(&format!(
                    "[Thread: {}] Shutdown database without a snapshot: {}",
                    self.thread_id, e
                ))
            }
        }
    }
}
