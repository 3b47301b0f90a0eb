use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use tracing::debug;

use super::transport::{Filter, TableRow, TableTransport, TransportError};

/// Blocking HTTP transport for PostgREST-style table endpoints
/// (`<base_url>/<table>?column=eq.value`).
///
/// Must be built outside an async runtime.
#[derive(Debug, Clone)]
pub struct RestTableClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestTableClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| TransportError::Request(format!("failed to build client: {error}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.base_url)
    }

    fn authorized(&self, builder: RequestBuilder, filters: &[Filter<'_>]) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
            .query(&eq_filters(filters))
    }

    fn send(
        &self,
        method: &str,
        table: &str,
        builder: RequestBuilder,
    ) -> Result<Vec<TableRow>, TransportError> {
        debug!(method, table, "remote table request");
        let response = builder
            .send()
            .map_err(|error| TransportError::Request(error.to_string()))?;
        read_rows(response)
    }
}

impl TableTransport for RestTableClient {
    fn select(&self, table: &str, filters: &[Filter<'_>]) -> Result<Vec<TableRow>, TransportError> {
        let builder = self
            .authorized(self.client.get(self.table_url(table)), filters)
            .query(&[("select", "*")]);
        self.send("GET", table, builder)
    }

    fn insert(&self, table: &str, row: &TableRow) -> Result<Vec<TableRow>, TransportError> {
        let builder = self
            .authorized(self.client.post(self.table_url(table)), &[])
            .json(row);
        self.send("POST", table, builder)
    }

    fn update(
        &self,
        table: &str,
        filters: &[Filter<'_>],
        row: &TableRow,
    ) -> Result<Vec<TableRow>, TransportError> {
        let builder = self
            .authorized(self.client.patch(self.table_url(table)), filters)
            .json(row);
        self.send("PATCH", table, builder)
    }

    fn delete(&self, table: &str, filters: &[Filter<'_>]) -> Result<Vec<TableRow>, TransportError> {
        let builder = self.authorized(self.client.delete(self.table_url(table)), filters);
        self.send("DELETE", table, builder)
    }
}

fn eq_filters(filters: &[Filter<'_>]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|(column, value)| ((*column).to_string(), format!("eq.{value}")))
        .collect()
}

fn read_rows(response: Response) -> Result<Vec<TableRow>, TransportError> {
    let status = response.status();
    let text = response
        .text()
        .map_err(|error| TransportError::Request(error.to_string()))?;

    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            body: text,
        });
    }

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&text).map_err(|error| TransportError::Payload(error.to_string()))
}
