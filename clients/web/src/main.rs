use std::{io, path::PathBuf, time::Duration};

use actix_web::{
    middleware::{self, Condition},
    web::Data,
    App, HttpServer,
};
use clap::{ArgAction, Parser};
use database::{
    database::{database::Database, options::DatabaseOptions},
    persistence::{
        storage::StorageEngine,
        transaction::{TransactionFileWriteMode, TransactionWriteMode},
    },
};
use persons_web::{configure, models::persons::Persons, views::Views};

/// 📇 Persons, a small web app for listing, creating and deleting person records
#[derive(Parser, Debug)]
struct Cli {
    /// Location of the database. Reads / writes to this directory. Note: Does not support shell paths, e.g. ~
    #[clap(short, long, default_value = "data")]
    data: PathBuf,

    /// Keeps the database in memory only, nothing is restored or persisted
    #[clap(long)]
    in_memory: bool,

    /// Port the web server will run on
    #[clap(short, long, default_value = "3000")]
    port: u16,

    /// Address the web server will run on
    #[clap(short, long, default_value = "0.0.0.0")]
    address: String,

    /// Logs every HTTP request
    #[clap(long)]
    log_http: bool,

    #[clap(long, default_value_t = 2)]
    http_workers: usize,

    #[clap(long, default_value_t = 2)]
    database_threads: usize,

    /// Fsync the transaction log on every commit
    #[clap(long, default_value_t = true, action = ArgAction::Set)]
    sync_writes: bool,

    /// How long a request waits on the database before failing
    #[clap(long, default_value_t = 2000)]
    request_timeout_ms: u64,
}

impl Cli {
    fn database_options(&self) -> DatabaseOptions {
        let storage_engine = match self.in_memory {
            true => StorageEngine::Memory,
            false => StorageEngine::File(self.data.clone()),
        };

        let file_write_mode = match self.sync_writes {
            true => TransactionFileWriteMode::Sync,
            false => TransactionFileWriteMode::OSBuffered,
        };

        DatabaseOptions::default()
            .set_storage_engine(storage_engine)
            .set_sync_file_write(TransactionWriteMode::File(file_write_mode))
            .set_threads(self.database_threads)
            .set_request_timeout(Duration::from_millis(self.request_timeout_ms))
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let args = Cli::parse();

    let request_manager = Database::new(args.database_options())
        .map_err(io::Error::other)?
        .run()
        .map_err(io::Error::other)?;

    let views = Data::new(Views::new().map_err(io::Error::other)?);
    let persons = Data::new(Persons::new(request_manager.clone()));

    log::info!("starting HTTP server on port {}.", args.port);

    log::info!("Persons: http://{}:{}/list", args.address, args.port);

    let log_http = args.log_http;

    // Runs until the server receives a stop signal (e.g. Ctrl-C)
    HttpServer::new(move || {
        App::new()
            .app_data(persons.clone())
            .app_data(views.clone())
            .configure(configure)
            .wrap(Condition::new(log_http, middleware::Logger::default()))
    })
    .workers(args.http_workers)
    .bind((args.address, args.port))?
    .run()
    .await?;

    match request_manager.send_shutdown_request().await {
        Ok(response) => log::info!("Shutting down server: {}", response),
        Err(e) => log::error!("Database did not shut down cleanly: {}", e),
    }

    Ok(())
}
