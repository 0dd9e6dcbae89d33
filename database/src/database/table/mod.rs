pub mod row;
#[allow(clippy::module_inception)]
pub mod table;
