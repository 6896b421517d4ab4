use std::sync::Arc;

use tracing::debug;

use super::dialect;
use super::query::Query;
use super::store::Store;
use super::topology::{Backend, Topology};
use super::value::{ExecResult, Row};
use super::DatabaseError;

/// Single entry point for every query in the process.
///
/// Each call resolves its table against the current [`Topology`], rewrites
/// the statement for the chosen backend and runs it on that backend's pool.
/// Cloning is cheap and the clones share both pools.
#[derive(Clone)]
pub struct Broker {
    embedded: Arc<dyn Store>,
    network: Option<Arc<dyn Store>>,
    topology: Topology,
}

impl Broker {
    pub fn new(
        embedded: Arc<dyn Store>,
        network: Option<Arc<dyn Store>>,
        topology: Topology,
    ) -> Self {
        Self {
            embedded,
            network,
            topology,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Returns the generated id of an insert, or the affected row count.
    pub async fn execute(&self, query: impl Into<Query>) -> Result<ExecResult, DatabaseError> {
        let query = query.into();
        let (store, table) = self.route(&query)?;
        let sql = dialect::translate(&query, store.backend());
        debug!("execute backend={} table={}", store.backend(), table.as_deref().unwrap_or("-"));

        store
            .execute(&sql, query.params())
            .await
            .map_err(|e| e.classify(store.backend(), table.as_deref()))
    }

    pub async fn fetch_one(&self, query: impl Into<Query>) -> Result<Option<Row>, DatabaseError> {
        let query = query.into();
        let (store, table) = self.route(&query)?;
        let sql = dialect::translate(&query, store.backend());
        debug!("fetch_one backend={} table={}", store.backend(), table.as_deref().unwrap_or("-"));

        store
            .fetch_one(&sql, query.params())
            .await
            .map_err(|e| e.classify(store.backend(), table.as_deref()))
    }

    pub async fn fetch_all(&self, query: impl Into<Query>) -> Result<Vec<Row>, DatabaseError> {
        let query = query.into();
        let (store, table) = self.route(&query)?;
        let sql = dialect::translate(&query, store.backend());
        debug!("fetch_all backend={} table={}", store.backend(), table.as_deref().unwrap_or("-"));

        store
            .fetch_all(&sql, query.params())
            .await
            .map_err(|e| e.classify(store.backend(), table.as_deref()))
    }

    pub async fn close(&self) {
        if let Some(network) = &self.network {
            network.close().await;
        }
        self.embedded.close().await;
    }

    fn route(&self, query: &Query) -> Result<(&dyn Store, Option<String>), DatabaseError> {
        let table = query.table();
        let store = match self.topology.resolve(table.as_deref()) {
            Backend::Embedded => self.embedded.as_ref(),
            Backend::Network => self.network.as_deref().ok_or_else(|| {
                DatabaseError::Connection("network store is not initialized".to_string())
            })?,
        };
        Ok((store, table))
    }
}
