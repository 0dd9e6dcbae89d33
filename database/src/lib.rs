//! Embedded document store for person records.
//!
//! The store keeps its documents in memory, appends every committed mutation to a
//! write-ahead log and snapshots the collection on shutdown. Callers interact with it
//! through a [`database::request_manager::RequestManager`] handle.

pub mod consts;
pub mod database;
pub mod model;
pub mod persistence;
