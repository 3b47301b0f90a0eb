use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::dates::parse_lenient_date;

/// The two logical lists every branch keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Waiting,
    Accepted,
}

impl ListKind {
    pub const fn label(self) -> &'static str {
        match self {
            ListKind::Waiting => "waiting",
            ListKind::Accepted => "accepted",
        }
    }

    /// Resource name used by the remote table API.
    pub const fn table_name(self) -> &'static str {
        match self {
            ListKind::Waiting => "WaitingList",
            ListKind::Accepted => "AcceptedList",
        }
    }

    pub const fn ordered() -> [ListKind; 2] {
        [ListKind::Waiting, ListKind::Accepted]
    }
}

/// Yes/no answer for a checklist document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Yes,
    #[default]
    No,
}

impl Answer {
    pub const fn is_yes(self) -> bool {
        matches!(self, Answer::Yes)
    }

    /// Reads the loose vocabulary found in hand-maintained sheets. Anything not
    /// recognisably affirmative is treated as `No`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "yes" | "y" | "true" | "1" | "v" | "\u{2713}" | "כן" => Answer::Yes,
            _ => Answer::No,
        }
    }
}

impl From<bool> for Answer {
    fn from(value: bool) -> Self {
        if value {
            Answer::Yes
        } else {
            Answer::No
        }
    }
}

/// The five intake documents tracked per person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Checklist {
    #[serde(default)]
    pub committee_approval: Answer,
    #[serde(default)]
    pub psychiatric_report: Answer,
    #[serde(default)]
    pub psychosocial_report: Answer,
    #[serde(default)]
    pub medical_report: Answer,
    #[serde(default)]
    pub id_photo: Answer,
}

impl Checklist {
    pub fn all_yes() -> Self {
        Self {
            committee_approval: Answer::Yes,
            psychiatric_report: Answer::Yes,
            psychosocial_report: Answer::Yes,
            medical_report: Answer::Yes,
            id_photo: Answer::Yes,
        }
    }

    pub fn answers(&self) -> [Answer; 5] {
        [
            self.committee_approval,
            self.psychiatric_report,
            self.psychosocial_report,
            self.medical_report,
            self.id_photo,
        ]
    }

    pub fn is_complete(&self) -> bool {
        self.answers().iter().all(|answer| answer.is_yes())
    }
}

/// Canonical person record shared by both lists and every backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersonRecord {
    pub name: String,
    #[serde(default)]
    pub facility: String,
    #[serde(default)]
    pub branch: String,
    /// Date the person joined the waiting list. Kept as entered so rows with
    /// malformed dates survive a load/save cycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub checklist: Checklist,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_accepted: Option<NaiveDate>,
    /// Sheet columns no profile recognises, carried so a rewrite keeps them.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
    /// Name and branch exactly as the backend holds them, when they differ
    /// from the canonical values above.
    #[serde(skip)]
    pub(crate) stored_as: Option<StoredLocator>,
}

/// Raw locator of a row whose stored name or branch is not canonical, such as
/// `" Gil "` or a branch typed in lower case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredLocator {
    pub name: String,
    pub branch: String,
}

impl PersonRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_date_added(mut self, date: impl Into<String>) -> Self {
        self.date_added = Some(date.into());
        self
    }

    pub fn with_checklist(mut self, checklist: Checklist) -> Self {
        self.checklist = checklist;
        self
    }

    pub fn with_urgent(mut self, urgent: bool) -> Self {
        self.urgent = urgent;
        self
    }

    /// Parsed intake date, or `None` when missing or unreadable.
    pub fn intake_date(&self) -> Option<NaiveDate> {
        self.date_added.as_deref().and_then(parse_lenient_date)
    }

    /// Trims the name and rejects records without one.
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if trimmed.len() != self.name.len() {
            self.name = trimmed.to_string();
        }
        Ok(self)
    }

    /// Places the record in a facility and branch. Anything stamped is about to
    /// be written in canonical form, so a remembered raw locator is dropped.
    pub(crate) fn stamp(&mut self, facility: &str, branch: &str) {
        self.facility = facility.to_string();
        self.branch = branch.to_string();
        self.stored_as = None;
    }

    /// Remembers the raw name and branch a backend row was read with, unless
    /// they already equal the canonical ones.
    pub(crate) fn remember_stored(&mut self, name: &str, branch: &str) {
        self.stored_as = (name != self.name || branch != self.branch).then(|| StoredLocator {
            name: name.to_string(),
            branch: branch.to_string(),
        });
    }

    /// Fingerprint used to recognise the same person across both lists.
    pub fn fingerprint(&self) -> RecordFingerprint {
        RecordFingerprint {
            name: self.name.clone(),
            date_added: self.date_added.clone(),
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            facility: self.facility.clone(),
            branch: self.branch.clone(),
            name: self.name.clone(),
            stored_as: self.stored_as.clone(),
        }
    }
}

/// Locator used by delete and update. The name is the de-facto identity;
/// facility and branch narrow the match so a delete never crosses branches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub facility: String,
    pub branch: String,
    pub name: String,
    /// Raw values to filter on when the backend row is not canonical.
    #[serde(skip)]
    pub stored_as: Option<StoredLocator>,
}

impl RecordKey {
    pub fn new(
        facility: impl Into<String>,
        branch: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            facility: facility.into(),
            branch: branch.into(),
            name: name.into(),
            stored_as: None,
        }
    }

    /// Name as the backend stores it.
    pub fn stored_name(&self) -> &str {
        self.stored_as
            .as_ref()
            .map_or(self.name.as_str(), |stored| stored.name.as_str())
    }

    /// Branch as the backend stores it.
    pub fn stored_branch(&self) -> &str {
        self.stored_as
            .as_ref()
            .map_or(self.branch.as_str(), |stored| stored.branch.as_str())
    }

    pub fn matches(&self, record: &PersonRecord) -> bool {
        record.name == self.name && record.branch == self.branch
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordFingerprint {
    pub name: String,
    pub date_added: Option<String>,
}

/// Partial update applied by the edit operation. `None` leaves a field alone;
/// `Some(String::new())` clears an optional text field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub date_added: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub urgent: Option<bool>,
    #[serde(default)]
    pub committee_approval: Option<Answer>,
    #[serde(default)]
    pub psychiatric_report: Option<Answer>,
    #[serde(default)]
    pub psychosocial_report: Option<Answer>,
    #[serde(default)]
    pub medical_report: Option<Answer>,
    #[serde(default)]
    pub id_photo: Option<Answer>,
}

impl RecordPatch {
    pub(crate) fn apply_to(&self, record: &mut PersonRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        merge_text(&mut record.date_added, &self.date_added);
        merge_text(&mut record.address, &self.address);
        merge_text(&mut record.referrer, &self.referrer);
        merge_text(&mut record.comments, &self.comments);
        if let Some(urgent) = self.urgent {
            record.urgent = urgent;
        }

        let checklist = &mut record.checklist;
        let updates = [
            (&mut checklist.committee_approval, self.committee_approval),
            (&mut checklist.psychiatric_report, self.psychiatric_report),
            (&mut checklist.psychosocial_report, self.psychosocial_report),
            (&mut checklist.medical_report, self.medical_report),
            (&mut checklist.id_photo, self.id_photo),
        ];
        for (slot, value) in updates {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

fn merge_text(target: &mut Option<String>, update: &Option<String>) {
    if let Some(value) = update {
        let trimmed = value.trim();
        *target = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name cannot be empty")]
    EmptyName,
}
