use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{Config, NetworkStoreConfig, RunMode, SeedConfig};
use crate::db::broker::Broker;
use crate::db::catalog;
use crate::db::postgres::PostgresStore;
use crate::db::schema::{ProvisionReport, SchemaProvisioner};
use crate::db::seed::{BootstrapSeeder, SeedReport};
use crate::db::sqlite::SqliteStore;
use crate::db::store::Store;
use crate::db::topology::Topology;
use crate::db::DatabaseError;

/// Owns process-wide database startup.
///
/// The embedded store must open or startup fails. The network store is
/// optional: any failure while dialing or provisioning it closes its pool and
/// leaves the broker in degraded mode for the rest of the process.
pub struct DatabaseManager {
    broker: Broker,
    provision: ProvisionReport,
    seed: Option<SeedReport>,
}

impl DatabaseManager {
    pub async fn connect(config: &Config) -> Result<Self, DatabaseError> {
        let embedded = Arc::new(SqliteStore::open(&config.database.embedded).await?);
        let mut provisioner = SchemaProvisioner::default();
        provisioner.provision_embedded(embedded.as_ref()).await;

        let network = match &config.database.network {
            Some(network_config) => {
                start_network(network_config, config.database.mode, &mut provisioner).await
            }
            None => {
                info!("no network store configured, network-owned tables route to the embedded store");
                None
            }
        };

        Ok(Self::assemble(embedded, network, provisioner, &config.seed).await)
    }

    /// Fixes the topology from whichever network store survived startup and
    /// runs the seeder against it.
    async fn assemble(
        embedded: Arc<dyn Store>,
        network: Option<Arc<dyn Store>>,
        provisioner: SchemaProvisioner,
        seed_config: &SeedConfig,
    ) -> Self {
        let topology = Topology::compile(catalog::TABLES, network.is_some());
        let provision = provisioner.finish();
        let broker = Broker::new(embedded, network, topology);

        let seed = if broker.topology().network_reachable() && seed_config.enabled {
            let seeder = BootstrapSeeder::new(&broker)
                .with_default_password(seed_config.default_password.as_ref());
            match seeder.run().await {
                Ok(report) => Some(report),
                Err(err) => {
                    warn!("bootstrap seeding failed, continuing without it error={err}");
                    None
                }
            }
        } else {
            None
        };

        info!(
            "database ready network_reachable={} embedded_tables={} network_tables={}",
            broker.topology().network_reachable(),
            provision.embedded_tables.len(),
            provision.network_tables.len()
        );

        Self {
            broker,
            provision,
            seed,
        }
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    pub fn provision_report(&self) -> &ProvisionReport {
        &self.provision
    }

    pub fn seed_report(&self) -> Option<&SeedReport> {
        self.seed.as_ref()
    }

    pub async fn shutdown(&self) {
        self.broker.close().await;
        info!("database pools closed");
    }
}

async fn start_network(
    config: &NetworkStoreConfig,
    mode: RunMode,
    provisioner: &mut SchemaProvisioner,
) -> Option<Arc<dyn Store>> {
    let store = match PostgresStore::connect_lazy(config, mode) {
        Ok(store) => store,
        Err(err) => {
            degrade(None, &err).await;
            return None;
        }
    };

    if let Err(err) = store.probe().await {
        degrade(Some(&store as &dyn Store), &err).await;
        return None;
    }

    provision_or_degrade(Arc::new(store), provisioner).await
}

/// Creates the network schema, or closes the store when the batch fails.
async fn provision_or_degrade(
    store: Arc<dyn Store>,
    provisioner: &mut SchemaProvisioner,
) -> Option<Arc<dyn Store>> {
    match provisioner.provision_network(store.as_ref()).await {
        Ok(()) => Some(store),
        Err(err) => {
            degrade(Some(store.as_ref()), &err).await;
            None
        }
    }
}

async fn degrade(store: Option<&dyn Store>, reason: &DatabaseError) {
    if let Some(store) = store {
        store.close().await;
    }
    warn!(
        "network store unavailable, running degraded: identity and document tables are unavailable until restart reason={reason}"
    );
}
