use serde_json::{Map, Value};

/// One row of a remote table, keyed by column name.
pub type TableRow = Map<String, Value>;

/// Equality filter on a column.
pub type Filter<'a> = (&'a str, &'a str);

/// Row-level access to a remote table API. Mutating calls return the rows
/// they affected so callers can detect a miss.
pub trait TableTransport: Send + Sync {
    fn select(&self, table: &str, filters: &[Filter<'_>]) -> Result<Vec<TableRow>, TransportError>;

    fn insert(&self, table: &str, row: &TableRow) -> Result<Vec<TableRow>, TransportError>;

    fn update(
        &self,
        table: &str,
        filters: &[Filter<'_>],
        row: &TableRow,
    ) -> Result<Vec<TableRow>, TransportError>;

    fn delete(&self, table: &str, filters: &[Filter<'_>]) -> Result<Vec<TableRow>, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("remote table returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response payload: {0}")]
    Payload(String),
}
