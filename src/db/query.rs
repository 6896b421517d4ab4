use super::topology::extract_table;
use super::value::Value;

/// A broker call: statement text with `?` placeholders, its ordered
/// parameters, and optional routing facts supplied by the caller.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    sql: String,
    params: Vec<Value>,
    table: Option<String>,
    conflict_key: Vec<String>,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Default::default()
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
            ..Default::default()
        }
    }

    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Routes the call by this table instead of parsing the statement text.
    pub fn on_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into().to_ascii_lowercase());
        self
    }

    /// Declares the unique columns an insert may collide on. Colliding rows
    /// are skipped on either backend.
    pub fn ignore_conflicts_on<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conflict_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn conflict_key(&self) -> &[String] {
        &self.conflict_key
    }

    /// The explicit table if one was given, else the first one named in the text.
    pub fn table(&self) -> Option<String> {
        self.table.clone().or_else(|| extract_table(&self.sql))
    }
}

impl From<&str> for Query {
    fn from(sql: &str) -> Self {
        Query::new(sql)
    }
}

impl From<String> for Query {
    fn from(sql: String) -> Self {
        Query::new(sql)
    }
}

impl<S: Into<String>> From<(S, Vec<Value>)> for Query {
    fn from((sql, params): (S, Vec<Value>)) -> Self {
        Query::with_params(sql, params)
    }
}
