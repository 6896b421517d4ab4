use std::time::Duration;

use async_trait::async_trait;

use super::DatabaseError;
use super::topology::Backend;
use super::value::{ExecResult, Row, Value};

/// How long a call waits for a pooled connection. Callers on a saturated
/// pool wait for a release; only startup dialing has a short deadline.
pub(crate) const POOL_WAIT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// The three broker primitives over one physical store, plus the batch and
/// shutdown hooks the provisioner and fallback controller need.
///
/// Statements arrive already translated into the store's dialect. Every call
/// holds exactly one pooled connection for its duration.
#[async_trait]
pub trait Store: Send + Sync {
    fn backend(&self) -> Backend;

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, DatabaseError>;

    async fn fetch_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>, DatabaseError>;

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DatabaseError>;

    /// Runs parameterless statements in one transaction. Any failure rolls
    /// the whole batch back.
    async fn execute_batch_atomic(&self, statements: &[&str]) -> Result<(), DatabaseError>;

    async fn close(&self);
}
