pub mod db;
pub mod query;
pub mod schema;
#[cfg(any(test, feature = "testing"))]
pub mod seed;
pub mod sql;

pub use db::Store;
