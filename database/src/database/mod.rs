pub mod commands;
pub mod control;
#[allow(clippy::module_inception)]
pub mod database;
pub mod options;
pub mod request_manager;
pub mod table;
