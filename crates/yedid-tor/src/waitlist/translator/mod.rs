//! Bidirectional mapping between [`PersonRecord`] and backend column names.
//!
//! English and Hebrew sheets, and the remote tables, describe the same record
//! with different column vocabularies. Each vocabulary is a [`SchemaProfile`]
//! of one translator; mapping tables live in `mapping`.

mod mapping;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::dates::{format_date, parse_lenient_date};
use super::domain::{Answer, ListKind, PersonRecord};
use super::normalizer::normalize_header;

/// Default headers recognised as "the name column" in sheets of unknown origin.
pub const DEFAULT_NAME_ALIASES: &[&str] = &["name", "full name", "fullname", "שם", "שם מלא"];

/// Canonical field identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    Name,
    Facility,
    Branch,
    DateAdded,
    Address,
    Referrer,
    Comments,
    Urgent,
    CommitteeApproval,
    PsychiatricReport,
    PsychosocialReport,
    MedicalReport,
    IdPhoto,
    OriginalBranch,
    DateAccepted,
}

/// Column vocabulary used by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaProfile {
    English,
    Hebrew,
    Remote,
}

impl SchemaProfile {
    pub const fn ordered() -> [SchemaProfile; 3] {
        [
            SchemaProfile::English,
            SchemaProfile::Hebrew,
            SchemaProfile::Remote,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            SchemaProfile::English => "english",
            SchemaProfile::Hebrew => "hebrew",
            SchemaProfile::Remote => "remote",
        }
    }

    /// Text written for a yes/no answer.
    pub const fn answer_label(self, answer: Answer) -> &'static str {
        match (self, answer) {
            (SchemaProfile::English, Answer::Yes) => "yes",
            (SchemaProfile::English, Answer::No) => "no",
            (_, Answer::Yes) => "כן",
            (_, Answer::No) => "לא",
        }
    }
}

impl fmt::Display for SchemaProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SchemaProfile {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "english" | "en" => Ok(SchemaProfile::English),
            "hebrew" | "he" => Ok(SchemaProfile::Hebrew),
            "remote" => Ok(SchemaProfile::Remote),
            other => Err(format!("unknown schema profile '{other}'")),
        }
    }
}

/// Backend-native cell value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    Date(NaiveDate),
    Null,
}

impl FieldValue {
    fn text(value: &Option<String>) -> Self {
        match value {
            Some(text) => FieldValue::Text(text.clone()),
            None => FieldValue::Null,
        }
    }

    /// Trimmed text content, `None` for empty cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(text) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            FieldValue::Flag(flag) => Some(flag.to_string()),
            FieldValue::Date(date) => Some(format_date(*date)),
            FieldValue::Null => None,
        }
    }

    fn as_answer(&self) -> Answer {
        match self {
            FieldValue::Flag(flag) => Answer::from(*flag),
            FieldValue::Text(text) => Answer::parse(text),
            FieldValue::Date(_) | FieldValue::Null => Answer::No,
        }
    }

    fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(date) => Some(*date),
            FieldValue::Text(text) => parse_lenient_date(text),
            FieldValue::Flag(_) | FieldValue::Null => None,
        }
    }

    /// Renders the value as a sheet cell using the profile's vocabulary.
    pub fn to_cell(&self, profile: SchemaProfile) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Flag(flag) => profile.answer_label(Answer::from(*flag)).to_string(),
            FieldValue::Date(date) => format_date(*date),
            FieldValue::Null => String::new(),
        }
    }
}

/// Record keyed by native column names.
pub type NativeRecord = BTreeMap<String, FieldValue>;

/// Translates records for one schema profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTranslator {
    profile: SchemaProfile,
    name_aliases: Vec<String>,
}

impl FieldTranslator {
    pub fn new(profile: SchemaProfile) -> Self {
        Self {
            profile,
            name_aliases: DEFAULT_NAME_ALIASES
                .iter()
                .map(|alias| normalize_header(alias))
                .collect(),
        }
    }

    pub fn with_name_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let aliases: Vec<String> = aliases
            .into_iter()
            .map(|alias| normalize_header(alias.as_ref()))
            .filter(|alias| !alias.is_empty())
            .collect();
        if !aliases.is_empty() {
            self.name_aliases = aliases;
        }
        self
    }

    pub fn profile(&self) -> SchemaProfile {
        self.profile
    }

    /// Native column names for a list, in sheet order.
    pub fn columns(&self, list: ListKind) -> Vec<&'static str> {
        mapping::field_table(self.profile, list)
            .iter()
            .map(|(_, column)| *column)
            .collect()
    }

    pub fn column(&self, list: ListKind, field: CanonicalField) -> Option<&'static str> {
        mapping::column_for(self.profile, list, field)
    }

    /// Whether a native header maps to a canonical field of this list.
    pub fn recognises(&self, list: ListKind, column: &str) -> bool {
        mapping::field_for_column(self.profile, list, column).is_some()
    }

    /// Maps a canonical record to native columns. Fields the profile does not
    /// store for this list are dropped.
    pub fn to_backend(&self, record: &PersonRecord, list: ListKind) -> NativeRecord {
        let mut native = NativeRecord::new();
        for (field, column) in mapping::field_table(self.profile, list) {
            native.insert((*column).to_string(), self.encode(record, *field));
        }
        native
    }

    /// Maps native columns back to a canonical record. Unknown columns are
    /// ignored; missing columns leave the canonical default.
    pub fn from_backend(&self, native: &NativeRecord, list: ListKind) -> PersonRecord {
        let mut record = PersonRecord::default();
        for (column, value) in native {
            if let Some(field) = mapping::field_for_column(self.profile, list, column) {
                decode(&mut record, field, value);
            }
        }
        record
    }

    /// Index of the column holding names: the profile's own name column, then
    /// the first alias match, then the first column.
    pub fn resolve_name_column<S: AsRef<str>>(
        &self,
        headers: &[S],
        list: ListKind,
    ) -> Option<usize> {
        if headers.is_empty() {
            return None;
        }

        let by_profile = headers.iter().position(|header| {
            mapping::field_for_column(self.profile, list, header.as_ref())
                == Some(CanonicalField::Name)
        });
        if by_profile.is_some() {
            return by_profile;
        }

        headers
            .iter()
            .position(|header| {
                let normalized = normalize_header(header.as_ref());
                self.name_aliases.iter().any(|alias| *alias == normalized)
            })
            .or(Some(0))
    }

    fn encode(&self, record: &PersonRecord, field: CanonicalField) -> FieldValue {
        let answer = |answer: Answer| FieldValue::Text(self.profile.answer_label(answer).into());
        match field {
            CanonicalField::Name => FieldValue::Text(record.name.clone()),
            CanonicalField::Facility => FieldValue::Text(record.facility.clone()),
            CanonicalField::Branch => FieldValue::Text(record.branch.clone()),
            CanonicalField::DateAdded => FieldValue::text(&record.date_added),
            CanonicalField::Address => FieldValue::text(&record.address),
            CanonicalField::Referrer => FieldValue::text(&record.referrer),
            CanonicalField::Comments => FieldValue::text(&record.comments),
            CanonicalField::Urgent => FieldValue::Flag(record.urgent),
            CanonicalField::CommitteeApproval => answer(record.checklist.committee_approval),
            CanonicalField::PsychiatricReport => answer(record.checklist.psychiatric_report),
            CanonicalField::PsychosocialReport => answer(record.checklist.psychosocial_report),
            CanonicalField::MedicalReport => answer(record.checklist.medical_report),
            CanonicalField::IdPhoto => answer(record.checklist.id_photo),
            CanonicalField::OriginalBranch => FieldValue::text(&record.original_branch),
            CanonicalField::DateAccepted => match record.date_accepted {
                Some(date) => FieldValue::Date(date),
                None => FieldValue::Null,
            },
        }
    }
}

fn decode(record: &mut PersonRecord, field: CanonicalField, value: &FieldValue) {
    match field {
        CanonicalField::Name => record.name = value.as_text().unwrap_or_default(),
        CanonicalField::Facility => record.facility = value.as_text().unwrap_or_default(),
        CanonicalField::Branch => record.branch = value.as_text().unwrap_or_default(),
        CanonicalField::DateAdded => record.date_added = value.as_text(),
        CanonicalField::Address => record.address = value.as_text(),
        CanonicalField::Referrer => record.referrer = value.as_text(),
        CanonicalField::Comments => record.comments = value.as_text(),
        CanonicalField::Urgent => record.urgent = value.as_answer().is_yes(),
        CanonicalField::CommitteeApproval => {
            record.checklist.committee_approval = value.as_answer()
        }
        CanonicalField::PsychiatricReport => {
            record.checklist.psychiatric_report = value.as_answer()
        }
        CanonicalField::PsychosocialReport => {
            record.checklist.psychosocial_report = value.as_answer()
        }
        CanonicalField::MedicalReport => record.checklist.medical_report = value.as_answer(),
        CanonicalField::IdPhoto => record.checklist.id_photo = value.as_answer(),
        CanonicalField::OriginalBranch => record.original_branch = value.as_text(),
        CanonicalField::DateAccepted => record.date_accepted = value.as_date(),
    }
}
