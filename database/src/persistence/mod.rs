#[allow(clippy::module_inception)]
pub mod persistence;
pub mod snapshot;
pub mod storage;
pub mod transaction;
