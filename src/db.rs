pub use self::broker::Broker;
pub use self::error::DatabaseError;
pub use self::manager::DatabaseManager;
pub use self::query::Query;
pub use self::topology::{Backend, Topology};
pub use self::value::{ExecResult, Row, Value};

pub mod broker;
pub mod catalog;
pub mod credential;
pub mod dialect;
pub mod error;
pub mod manager;
pub mod postgres;
pub mod query;
pub mod schema;
pub mod seed;
pub mod sqlite;
pub mod store;
pub mod topology;
pub mod value;
