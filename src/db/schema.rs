use serde::Serialize;
use tracing::{debug, info, warn};

use super::catalog::{self, LogicalTable};
use super::store::Store;
use super::topology::Backend;
use super::DatabaseError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionState {
    Uninitialized,
    EmbeddedReady,
    NetworkReady,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedStatement {
    pub table: &'static str,
    pub error: String,
}

/// What a provisioning run did. Embedded failures are collected here rather
/// than aborting the run.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub state: ProvisionState,
    pub embedded_tables: Vec<&'static str>,
    pub network_tables: Vec<&'static str>,
    pub skipped: Vec<SkippedStatement>,
}

pub struct SchemaProvisioner {
    tables: &'static [LogicalTable],
    report: ProvisionReport,
}

impl Default for SchemaProvisioner {
    fn default() -> Self {
        Self::new(catalog::TABLES)
    }
}

impl SchemaProvisioner {
    pub fn new(tables: &'static [LogicalTable]) -> Self {
        Self {
            tables,
            report: ProvisionReport {
                state: ProvisionState::Uninitialized,
                embedded_tables: Vec::new(),
                network_tables: Vec::new(),
                skipped: Vec::new(),
            },
        }
    }

    pub fn state(&self) -> ProvisionState {
        self.report.state
    }

    /// Creates the embedded tables one statement at a time. A failing
    /// statement is logged and skipped so the remaining sensor tables still
    /// get created.
    pub async fn provision_embedded(&mut self, store: &dyn Store) {
        for table in self.tables.iter().filter(|t| t.owner == Backend::Embedded) {
            let mut created = true;
            for statement in table.ddl {
                if let Err(err) = store.execute(statement, &[]).await {
                    warn!(
                        "embedded schema statement failed, skipping table={} error={}",
                        table.name, err
                    );
                    self.report.skipped.push(SkippedStatement {
                        table: table.name,
                        error: err.to_string(),
                    });
                    created = false;
                }
            }
            if created {
                self.report.embedded_tables.push(table.name);
            }
        }

        self.report.state = ProvisionState::EmbeddedReady;
        info!(
            "embedded schema ready tables={} skipped={}",
            self.report.embedded_tables.len(),
            self.report.skipped.len()
        );
    }

    /// Creates every network table in one transaction. On error nothing is
    /// kept and the caller is expected to fall back to embedded-only routing.
    pub async fn provision_network(&mut self, store: &dyn Store) -> Result<(), DatabaseError> {
        if self.report.state != ProvisionState::EmbeddedReady {
            return Err(DatabaseError::Schema(format!(
                "network schema requested in state {:?}",
                self.report.state
            )));
        }

        let tables: Vec<&LogicalTable> = self
            .tables
            .iter()
            .filter(|t| t.owner == Backend::Network)
            .collect();
        let statements: Vec<&str> = tables.iter().flat_map(|t| t.ddl.iter().copied()).collect();

        debug!("network schema batch statements={}", statements.len());
        store
            .execute_batch_atomic(&statements)
            .await
            .map_err(|err| match err {
                DatabaseError::Schema(_) => err,
                other => DatabaseError::Schema(other.to_string()),
            })?;

        self.report.network_tables = tables.iter().map(|t| t.name).collect();
        self.report.state = ProvisionState::NetworkReady;
        info!(
            "network schema ready tables={}",
            self.report.network_tables.len()
        );
        Ok(())
    }

    pub fn finish(mut self) -> ProvisionReport {
        self.report.state = ProvisionState::Ready;
        self.report
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::config::EmbeddedStoreConfig;
    use crate::db::sqlite::SqliteStore;
    use crate::db::value::Row;

    async fn open_store(dir: &TempDir) -> SqliteStore {
        let config = EmbeddedStoreConfig {
            path: dir.path().join("sensors.db").to_string_lossy().to_string(),
            max_connections: 2,
        };
        SqliteStore::open(&config).await.expect("open sqlite store")
    }

    async fn schema_snapshot(store: &SqliteStore) -> Vec<Row> {
        store
            .fetch_all(
                "SELECT type, name, sql FROM sqlite_master WHERE name NOT LIKE 'sqlite_%' ORDER BY type, name",
                &[],
            )
            .await
            .expect("read sqlite_master")
    }

    #[tokio::test]
    async fn embedded_provisioning_is_idempotent() {
        let dir = TempDir::new().expect("temp dir");
        let store = open_store(&dir).await;

        let mut first = SchemaProvisioner::default();
        first.provision_embedded(&store).await;
        let first = first.finish();
        let after_one = schema_snapshot(&store).await;

        for _ in 0..3 {
            let mut again = SchemaProvisioner::default();
            again.provision_embedded(&store).await;
            assert!(again.finish().skipped.is_empty());
        }
        let after_many = schema_snapshot(&store).await;

        assert_eq!(first.state, ProvisionState::Ready);
        assert!(first.skipped.is_empty());
        assert_eq!(first.embedded_tables, vec!["devices", "sensor_readings", "sensor_events"]);
        assert_eq!(after_one, after_many);
    }

    #[tokio::test]
    async fn embedded_store_never_gets_network_tables() {
        let dir = TempDir::new().expect("temp dir");
        let store = open_store(&dir).await;

        let mut provisioner = SchemaProvisioner::default();
        provisioner.provision_embedded(&store).await;

        let names: Vec<String> = schema_snapshot(&store)
            .await
            .iter()
            .filter_map(|row| row.get_str("name").ok().map(str::to_string))
            .collect();
        assert!(names.contains(&"sensor_readings".to_string()));
        assert!(!names.contains(&"admin".to_string()));
        assert!(!names.contains(&"documents".to_string()));
    }

    static BROKEN_TABLES: &[LogicalTable] = &[
        LogicalTable {
            name: "broken",
            owner: Backend::Embedded,
            ddl: &["CREATE TABLE IF NOT EXISTS broken ("],
        },
        LogicalTable {
            name: "survivor",
            owner: Backend::Embedded,
            ddl: &["CREATE TABLE IF NOT EXISTS survivor (id INTEGER PRIMARY KEY)"],
        },
    ];

    #[tokio::test]
    async fn embedded_failure_is_skipped_not_fatal() {
        let dir = TempDir::new().expect("temp dir");
        let store = open_store(&dir).await;

        let mut provisioner = SchemaProvisioner::new(BROKEN_TABLES);
        provisioner.provision_embedded(&store).await;
        assert_eq!(provisioner.state(), ProvisionState::EmbeddedReady);
        let report = provisioner.finish();

        assert_eq!(report.embedded_tables, vec!["survivor"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].table, "broken");
    }

    #[tokio::test]
    async fn network_batch_requires_embedded_first() {
        let dir = TempDir::new().expect("temp dir");
        let store = open_store(&dir).await;

        let mut provisioner = SchemaProvisioner::default();
        let err = provisioner
            .provision_network(&store)
            .await
            .expect_err("out of order");
        assert!(matches!(err, DatabaseError::Schema(_)));
    }
}
