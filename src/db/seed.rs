use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use super::broker::Broker;
use super::catalog::IDENTITY_TABLE;
use super::credential::{generate_password, hash_credential};
use super::query::Query;
use super::DatabaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedIdentity {
    pub username: &'static str,
    pub display_name: &'static str,
    pub role: &'static str,
    pub department: Option<&'static str>,
}

/// One administrator plus a login per department.
pub const DEFAULT_ROSTER: &[SeedIdentity] = &[
    SeedIdentity {
        username: "admin",
        display_name: "Administrator",
        role: "administrator",
        department: None,
    },
    SeedIdentity {
        username: "hr",
        display_name: "Human Resources",
        role: "staff",
        department: Some("human_resources"),
    },
    SeedIdentity {
        username: "finance",
        display_name: "Finance",
        role: "staff",
        department: Some("finance"),
    },
    SeedIdentity {
        username: "operations",
        display_name: "Operations",
        role: "staff",
        department: Some("operations"),
    },
    SeedIdentity {
        username: "maintenance",
        display_name: "Maintenance",
        role: "staff",
        department: Some("maintenance"),
    },
];

/// Password handed out for an identity seeded without a configured default.
#[derive(Debug)]
pub struct IssuedCredential {
    pub username: String,
    pub password: SecretString,
}

#[derive(Debug, Default)]
pub struct SeedReport {
    pub already_seeded: bool,
    pub inserted: Vec<String>,
    pub skipped: Vec<String>,
    pub issued: Vec<IssuedCredential>,
}

pub struct BootstrapSeeder<'a> {
    broker: &'a Broker,
    roster: &'a [SeedIdentity],
    default_password: Option<&'a SecretString>,
}

impl<'a> BootstrapSeeder<'a> {
    pub fn new(broker: &'a Broker) -> Self {
        Self {
            broker,
            roster: DEFAULT_ROSTER,
            default_password: None,
        }
    }

    pub fn with_roster(mut self, roster: &'a [SeedIdentity]) -> Self {
        self.roster = roster;
        self
    }

    pub fn with_default_password(mut self, password: Option<&'a SecretString>) -> Self {
        self.default_password = password;
        self
    }

    /// Inserts the roster when the identity table is empty.
    ///
    /// An identity that already exists is skipped. Any other failure stops
    /// the run and is returned.
    pub async fn run(&self) -> Result<SeedReport, DatabaseError> {
        let existing = self.count_identities().await?;
        if existing > 0 {
            info!("identity table already populated rows={existing}, skipping seed");
            return Ok(SeedReport {
                already_seeded: true,
                ..Default::default()
            });
        }

        let mut report = SeedReport::default();
        for identity in self.roster {
            let password = match self.default_password {
                Some(password) => password.expose_secret().to_string(),
                None => generate_password(),
            };

            match self.insert(identity, &password).await {
                Ok(()) => {
                    report.inserted.push(identity.username.to_string());
                    if self.default_password.is_none() {
                        report.issued.push(IssuedCredential {
                            username: identity.username.to_string(),
                            password: SecretString::from(password),
                        });
                    }
                }
                Err(DatabaseError::SeedConflict(username)) => {
                    debug!("identity already present, skipping username={username}");
                    report.skipped.push(username);
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            "identities seeded inserted={} skipped={}",
            report.inserted.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    async fn count_identities(&self) -> Result<i64, DatabaseError> {
        let query = Query::new("SELECT COUNT(*) AS count FROM admin").on_table(IDENTITY_TABLE);
        match self.broker.fetch_one(query).await? {
            Some(row) => row.get_i64("count"),
            None => Ok(0),
        }
    }

    async fn insert(&self, identity: &SeedIdentity, password: &str) -> Result<(), DatabaseError> {
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_credential(&password))
            .await
            .map_err(|e| DatabaseError::Credential(format!("hashing task failed: {e}")))??;

        let query = Query::new(
            "INSERT INTO admin (username, password_hash, display_name, role, department) VALUES (?, ?, ?, ?, ?)",
        )
        .on_table(IDENTITY_TABLE)
        .bind(identity.username)
        .bind(password_hash)
        .bind(identity.display_name)
        .bind(identity.role)
        .bind(identity.department);

        match self.broker.execute(query).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_unique_violation() => {
                Err(DatabaseError::SeedConflict(identity.username.to_string()))
            }
            Err(err) => Err(err),
        }
    }
}
