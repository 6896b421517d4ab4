use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use serde_json::json;

use dualstore::db::{DatabaseManager, Query, Value};

#[derive(Parser)]
#[command(name = "dualstore")]
#[command(about = "Route queries between the embedded sensor store and the network identity store", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the YAML configuration file
    #[arg(long, global = true, env = "CONFIG_PATH")]
    pub config: Option<PathBuf>,
}

/// Routing options shared by the statement commands.
#[derive(clap::Args)]
pub struct StatementArgs {
    /// Statement with `?` placeholders
    sql: String,
    /// Positional parameters; integers and decimals are bound as numbers, `null` as NULL
    params: Vec<String>,
    /// Route by this table instead of the one named in the statement
    #[arg(long)]
    table: Option<String>,
    /// Unique columns an insert may collide on; colliding rows are skipped
    #[arg(long, value_delimiter = ',')]
    conflict_key: Vec<String>,
}

impl StatementArgs {
    fn into_query(self) -> Query {
        let params = self.params.iter().map(|raw| Value::parse_arg(raw)).collect();
        let mut query = Query::with_params(self.sql, params);
        if let Some(table) = self.table {
            query = query.on_table(table);
        }
        if !self.conflict_key.is_empty() {
            query = query.ignore_conflicts_on(self.conflict_key);
        }
        query
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision both stores, seed identities, and print what happened
    Init,
    /// Print where every catalogued table is routed
    Topology,
    /// Run a statement and print the generated id or affected row count
    Exec(StatementArgs),
    /// Run a query and print its first row, or null
    FetchOne(StatementArgs),
    /// Run a query and print every row
    FetchAll(StatementArgs),
}

pub async fn run(command: Commands, manager: &DatabaseManager) -> Result<()> {
    let broker = manager.broker();
    let output = match command {
        Commands::Init => {
            if let Some(seed) = manager.seed_report() {
                for issued in &seed.issued {
                    eprintln!(
                        "issued credential username={} password={}",
                        issued.username,
                        issued.password.expose_secret()
                    );
                }
            }
            json!({
                "network_reachable": broker.topology().network_reachable(),
                "provision": manager.provision_report(),
                "seed": manager.seed_report().map(|seed| json!({
                    "already_seeded": seed.already_seeded,
                    "inserted": seed.inserted,
                    "skipped": seed.skipped,
                })),
            })
        }
        Commands::Topology => {
            let topology = broker.topology();
            let routes: Vec<_> = topology
                .routes()
                .into_iter()
                .map(|(table, backend)| {
                    json!({
                        "table": table,
                        "owner": topology.nominal_owner(table),
                        "routed_to": backend,
                    })
                })
                .collect();
            json!({
                "network_reachable": topology.network_reachable(),
                "routes": routes,
            })
        }
        Commands::Exec(args) => {
            let result = broker.execute(args.into_query()).await?;
            json!({
                "generated_id": result.generated_id,
                "affected_rows": result.affected_rows,
                "value": result.id_or_count(),
            })
        }
        Commands::FetchOne(args) => serde_json::to_value(broker.fetch_one(args.into_query()).await?)?,
        Commands::FetchAll(args) => serde_json::to_value(broker.fetch_all(args.into_query()).await?)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
