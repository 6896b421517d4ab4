use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::catalog::LogicalTable;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Single SQLite file next to the process.
    Embedded,
    /// Separately hosted PostgreSQL.
    Network,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Embedded => f.write_str("embedded"),
            Backend::Network => f.write_str("network"),
        }
    }
}

/// Resolved table ownership for one process lifetime.
///
/// Built once by the manager after the network store has been probed. A
/// degraded topology never flips back; reconnecting means building a new
/// manager, which produces a new value.
#[derive(Clone, Debug)]
pub struct Topology {
    nominal: HashMap<&'static str, Backend>,
    network_reachable: bool,
}

impl Topology {
    pub fn compile(tables: &[LogicalTable], network_reachable: bool) -> Self {
        let nominal = tables.iter().map(|t| (t.name, t.owner)).collect();
        Self {
            nominal,
            network_reachable,
        }
    }

    pub fn network_reachable(&self) -> bool {
        self.network_reachable
    }

    /// Owner declared in the catalog, regardless of reachability.
    pub fn nominal_owner(&self, table: &str) -> Backend {
        self.nominal
            .get(table)
            .copied()
            .unwrap_or(Backend::Embedded)
    }

    /// Backend a call against `table` goes to right now.
    pub fn resolve(&self, table: Option<&str>) -> Backend {
        match table.map(|t| self.nominal_owner(t)) {
            Some(Backend::Network) if self.network_reachable => Backend::Network,
            _ => Backend::Embedded,
        }
    }

    /// Every catalogued table with its current owner, sorted by name.
    pub fn routes(&self) -> Vec<(&'static str, Backend)> {
        let mut routes: Vec<_> = self
            .nominal
            .keys()
            .map(|name| (*name, self.resolve(Some(name))))
            .collect();
        routes.sort_by_key(|(name, _)| *name);
        routes
    }
}

static TABLE_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(?:FROM|INTO|UPDATE|TABLE)\s+(?:IF\s+NOT\s+EXISTS\s+)?((?:[`"\[]?[A-Za-z_][\w$]*[`"\]]?\.)?[`"\[]?[A-Za-z_][\w$]*[`"\]]?)"#,
    )
    .expect("table reference pattern is valid")
});

/// Returns the first table named after FROM, INTO, UPDATE or TABLE.
///
/// Only the first keyword+name pair is considered, so for joins and
/// subqueries the routable table has to come first. Callers that cannot
/// guarantee that should name the table explicitly with `Query::on_table`.
pub fn extract_table(sql: &str) -> Option<String> {
    let captures = TABLE_REF.captures(sql)?;
    let reference = captures.get(1)?.as_str();
    let name = reference.rsplit('.').next().unwrap_or(reference);
    let name: String = name
        .chars()
        .filter(|c| !matches!(c, '"' | '`' | '[' | ']'))
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::db::catalog::TABLES;

    #[test_case("SELECT * FROM admin", Some("admin"); "select")]
    #[test_case("select id from Admin where id = ?", Some("admin"); "lowercase keyword")]
    #[test_case("INSERT INTO sensor_readings (metric) VALUES (?)", Some("sensor_readings"); "insert")]
    #[test_case("INSERT OR IGNORE INTO \"admin\" (username) VALUES (?)", Some("admin"); "quoted")]
    #[test_case("UPDATE `documents` SET title = ?", Some("documents"); "backticks")]
    #[test_case("DELETE FROM [devices] WHERE id = ?", Some("devices"); "brackets")]
    #[test_case("CREATE TABLE IF NOT EXISTS sensor_events (id INTEGER)", Some("sensor_events"); "ddl")]
    #[test_case("SELECT * FROM public.admin", Some("admin"); "schema qualified")]
    #[test_case("SELECT a.username FROM admin a JOIN documents d ON d.owner_id = a.id", Some("admin"); "join takes first")]
    #[test_case("SELECT 1", None; "no table")]
    #[test_case("SELECT from_unixtime FROM devices", Some("devices"); "column prefixed with keyword")]
    fn extracts_first_table(sql: &str, expected: Option<&str>) {
        assert_eq!(extract_table(sql).as_deref(), expected);
    }

    #[test]
    fn network_tables_route_to_network_while_reachable() {
        let topology = Topology::compile(TABLES, true);

        assert_eq!(topology.resolve(Some("admin")), Backend::Network);
        assert_eq!(topology.resolve(Some("documents")), Backend::Network);
        assert_eq!(topology.resolve(Some("sensor_readings")), Backend::Embedded);
        assert_eq!(topology.resolve(Some("not_catalogued")), Backend::Embedded);
        assert_eq!(topology.resolve(None), Backend::Embedded);
    }

    #[test]
    fn degraded_topology_routes_everything_to_embedded() {
        let topology = Topology::compile(TABLES, false);

        for table in TABLES {
            assert_eq!(topology.resolve(Some(table.name)), Backend::Embedded);
        }
        assert_eq!(topology.nominal_owner("admin"), Backend::Network);
        assert!(!topology.network_reachable());
    }

    #[test]
    fn routes_lists_catalog_sorted() {
        let topology = Topology::compile(TABLES, true);
        let routes = topology.routes();

        assert_eq!(routes.len(), TABLES.len());
        assert!(routes.windows(2).all(|pair| pair[0].0 < pair[1].0));
        assert!(routes.contains(&("admin", Backend::Network)));
    }
}
