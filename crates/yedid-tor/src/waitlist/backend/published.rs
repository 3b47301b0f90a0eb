//! Read-only source over a spreadsheet published as CSV, one tab per branch
//! (`<base>/spreadsheets/d/<id>/export?format=csv&gid=<tab>`).

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, warn};

use super::remote::TransportError;
use super::{sheet, BackendError, BranchLists, WaitlistBackend};
use crate::waitlist::domain::{ListKind, PersonRecord, RecordKey};
use crate::waitlist::taxonomy::Facility;
use crate::waitlist::translator::{FieldTranslator, FieldValue};

pub const DEFAULT_EXPORT_BASE_URL: &str = "https://docs.google.com";

/// One facility's published spreadsheet and the tab id of each branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedSheet {
    pub facility: String,
    pub sheet_id: String,
    pub branch_gids: Vec<(String, String)>,
}

impl PublishedSheet {
    /// Parses `Branch=gid` pairs separated by commas.
    pub fn parse_gids(raw: &str) -> Result<Vec<(String, String)>, String> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.split_once('=') {
                Some((branch, gid)) if !branch.trim().is_empty() && !gid.trim().is_empty() => {
                    Ok((branch.trim().to_string(), gid.trim().to_string()))
                }
                _ => Err(entry.to_string()),
            })
            .collect()
    }
}

/// Fetches the CSV text of one tab.
pub trait SheetFetcher: Send + Sync {
    fn fetch_csv(&self, sheet_id: &str, gid: &str) -> Result<String, TransportError>;
}

/// Blocking HTTP fetcher for published CSV exports. Must be built outside an
/// async runtime.
#[derive(Debug, Clone)]
pub struct HttpSheetFetcher {
    client: Client,
    base_url: String,
}

impl HttpSheetFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| TransportError::Request(format!("failed to build client: {error}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn export_url(&self, sheet_id: &str, gid: &str) -> String {
        format!(
            "{}/spreadsheets/d/{sheet_id}/export?format=csv&gid={gid}",
            self.base_url
        )
    }
}

impl SheetFetcher for HttpSheetFetcher {
    fn fetch_csv(&self, sheet_id: &str, gid: &str) -> Result<String, TransportError> {
        let url = self.export_url(sheet_id, gid);
        debug!(%url, "fetching published sheet");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|error| TransportError::Request(error.to_string()))?;
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
        Ok(text)
    }
}

/// Waiting lists read from published spreadsheets. Accepted lists are always
/// empty and every mutation fails with [`BackendError::ReadOnly`].
pub struct PublishedSheetStore<F: ?Sized> {
    fetcher: Arc<F>,
    sheets: Vec<PublishedSheet>,
    translator: FieldTranslator,
}

impl<F> PublishedSheetStore<F>
where
    F: SheetFetcher + ?Sized,
{
    pub fn new(fetcher: Arc<F>, sheets: Vec<PublishedSheet>, translator: FieldTranslator) -> Self {
        Self {
            fetcher,
            sheets,
            translator,
        }
    }

    fn read_tab(
        &self,
        csv_text: &str,
        facility: &str,
        branch: &str,
    ) -> Result<Vec<PersonRecord>, BackendError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(csv_text.as_bytes());
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows: Vec<Vec<FieldValue>> = Vec::new();
        for row in reader.records() {
            let row = row?;
            rows.push(
                row.iter()
                    .map(|cell| FieldValue::Text(cell.to_string()))
                    .collect(),
            );
        }
        Ok(sheet::records_from_rows(
            &self.translator,
            ListKind::Waiting,
            &headers,
            rows,
            facility,
            branch,
        ))
    }
}

impl<F> WaitlistBackend for PublishedSheetStore<F>
where
    F: SheetFetcher + ?Sized,
{
    fn name(&self) -> &'static str {
        "published-sheet"
    }

    fn fetch_all(&self, list: ListKind, facility: &Facility) -> Result<BranchLists, BackendError> {
        let mut lists = BranchLists::for_facility(facility);
        if list == ListKind::Accepted {
            return Ok(lists);
        }
        let Some(published) = self
            .sheets
            .iter()
            .find(|sheet| sheet.facility == facility.name)
        else {
            debug!(facility = %facility.name, "no published sheet for facility");
            return Ok(lists);
        };

        for (label, gid) in &published.branch_gids {
            let Some(branch) = facility.branch_by_key(label).map(str::to_string) else {
                warn!(
                    facility = %facility.name,
                    branch = %label,
                    "published tab names an unknown branch"
                );
                continue;
            };
            let csv_text = match self.fetcher.fetch_csv(&published.sheet_id, gid) {
                Ok(text) => text,
                Err(TransportError::Status { status: 400, .. }) => {
                    warn!(
                        facility = %facility.name,
                        branch = %branch,
                        gid = %gid,
                        "published tab rejected the request, check sharing settings and gid"
                    );
                    continue;
                }
                Err(error) => return Err(error.into()),
            };
            let records = self.read_tab(&csv_text, &facility.name, &branch)?;
            lists.records_mut(&branch).extend(records);
        }
        Ok(lists)
    }

    fn append(
        &self,
        _list: ListKind,
        _facility: &Facility,
        _branch: &str,
        _record: &PersonRecord,
    ) -> Result<(), BackendError> {
        Err(BackendError::ReadOnly(self.name()))
    }

    fn delete(
        &self,
        _list: ListKind,
        _facility: &Facility,
        _key: &RecordKey,
    ) -> Result<usize, BackendError> {
        Err(BackendError::ReadOnly(self.name()))
    }

    fn update(
        &self,
        _list: ListKind,
        _facility: &Facility,
        _key: &RecordKey,
        _record: &PersonRecord,
    ) -> Result<(), BackendError> {
        Err(BackendError::ReadOnly(self.name()))
    }
}
