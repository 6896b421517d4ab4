use thiserror::Error;

use super::topology::Backend;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("identity {0} already present")]
    SeedConflict(String),
    #[error("relation {table} not found on {backend} backend")]
    RelationNotFound { table: String, backend: Backend },
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),
    #[error("cannot decode column {column}: {reason}")]
    Decode { column: String, reason: String },
    #[error("credential error: {0}")]
    Credential(String),
}

impl DatabaseError {
    /// Re-labels a driver failure on `backend` as `RelationNotFound` when the
    /// statement referenced a table that does not exist there. Anything else
    /// is returned untouched.
    pub fn classify(self, backend: Backend, table: Option<&str>) -> Self {
        match self {
            DatabaseError::Query(err) if is_undefined_table(&err) => {
                DatabaseError::RelationNotFound {
                    table: table.unwrap_or("<unknown>").to_string(),
                    backend,
                }
            }
            other => other,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        match self {
            DatabaseError::Query(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            DatabaseError::SeedConflict(_) => true,
            _ => false,
        }
    }

    pub fn is_relation_not_found(&self) -> bool {
        matches!(self, DatabaseError::RelationNotFound { .. })
    }
}

fn is_undefined_table(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };
    // 42P01 is PostgreSQL's undefined_table; SQLite only reports it in the message
    if db_err.code().as_deref() == Some("42P01") {
        return true;
    }
    db_err.message().contains("no such table")
}
