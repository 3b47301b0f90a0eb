use super::super::domain::ListKind;
use super::super::normalizer::normalize_header;
use super::{CanonicalField, SchemaProfile};
use std::collections::HashMap;
use std::sync::OnceLock;

use CanonicalField::*;

type FieldTable = &'static [(CanonicalField, &'static str)];

// Legacy English sheets.
const ENGLISH_WAITING: FieldTable = &[
    (Name, "name"),
    (DateAdded, "date"),
    (Address, "address"),
    (Referrer, "referrer"),
    (CommitteeApproval, "committee_approval"),
    (PsychiatricReport, "psychiatric_report"),
    (PsychosocialReport, "psychosocial_report"),
    (MedicalReport, "medical_report"),
    (IdPhoto, "id_photo"),
    (Comments, "comments"),
    (Urgent, "urgent"),
    (Branch, "branch"),
    (Facility, "facility"),
];

const ENGLISH_ACCEPTED: FieldTable = &[
    (Name, "name"),
    (DateAdded, "date_waiting"),
    (DateAccepted, "date_accepted"),
    (Address, "address"),
    (Referrer, "referrer"),
    (CommitteeApproval, "committee_approval"),
    (PsychiatricReport, "psychiatric_report"),
    (PsychosocialReport, "psychosocial_report"),
    (MedicalReport, "medical_report"),
    (IdPhoto, "id_photo"),
    (Comments, "comments"),
    (Urgent, "urgent"),
    (Branch, "branch"),
    (OriginalBranch, "original_branch"),
    (Facility, "facility"),
];

const HEBREW_WAITING: FieldTable = &[
    (Name, "שם מלא"),
    (DateAdded, "תאריך"),
    (Address, "כתובת"),
    (Referrer, "גורם מפנה"),
    (CommitteeApproval, "אישור ועדה"),
    (PsychiatricReport, "דוח פסיכיאטרי"),
    (PsychosocialReport, "דוח פסיכוסוציאלי"),
    (MedicalReport, "דוח רפואי"),
    (IdPhoto, "צילום תז"),
    (Comments, "הערות"),
    (Urgent, "מקרה דחוף"),
    (Branch, "סניף"),
    (Facility, "מרחב"),
];

const HEBREW_ACCEPTED: FieldTable = &[
    (Name, "שם מלא"),
    (DateAdded, "תאריך המתנה"),
    (DateAccepted, "תאריך קבלה"),
    (Address, "כתובת"),
    (Referrer, "גורם מפנה"),
    (CommitteeApproval, "אישור ועדה"),
    (PsychiatricReport, "דוח פסיכיאטרי"),
    (PsychosocialReport, "דוח פסיכוסוציאלי"),
    (MedicalReport, "דוח רפואי"),
    (IdPhoto, "צילום תז"),
    (Comments, "הערות"),
    (Urgent, "מקרה דחוף"),
    (Branch, "סניף"),
    (OriginalBranch, "סניף מקורי"),
    (Facility, "מרחב"),
];

// Remote tables use snake_case columns.
const REMOTE_WAITING: FieldTable = &[
    (Name, "name"),
    (DateAdded, "date_added"),
    (Address, "address"),
    (Referrer, "referrer"),
    (CommitteeApproval, "committee_approval"),
    (PsychiatricReport, "psychiatric_report"),
    (PsychosocialReport, "psychosocial_report"),
    (MedicalReport, "medical_report"),
    (IdPhoto, "id_photo"),
    (Comments, "comments"),
    (Urgent, "urgent_case"),
    (Branch, "branch"),
    (Facility, "facility"),
];

const REMOTE_ACCEPTED: FieldTable = &[
    (Name, "name"),
    (DateAdded, "date_waiting"),
    (DateAccepted, "date_accepted"),
    (Address, "address"),
    (Referrer, "referrer"),
    (CommitteeApproval, "committee_approval"),
    (PsychiatricReport, "psychiatric_report"),
    (PsychosocialReport, "psychosocial_report"),
    (MedicalReport, "medical_report"),
    (IdPhoto, "id_photo"),
    (Comments, "comments"),
    (Urgent, "urgent_case"),
    (Branch, "branch"),
    (OriginalBranch, "original_branch"),
    (Facility, "facility"),
];

/// Columns for a profile and list, in sheet order.
pub(crate) fn field_table(profile: SchemaProfile, list: ListKind) -> FieldTable {
    match (profile, list) {
        (SchemaProfile::English, ListKind::Waiting) => ENGLISH_WAITING,
        (SchemaProfile::English, ListKind::Accepted) => ENGLISH_ACCEPTED,
        (SchemaProfile::Hebrew, ListKind::Waiting) => HEBREW_WAITING,
        (SchemaProfile::Hebrew, ListKind::Accepted) => HEBREW_ACCEPTED,
        (SchemaProfile::Remote, ListKind::Waiting) => REMOTE_WAITING,
        (SchemaProfile::Remote, ListKind::Accepted) => REMOTE_ACCEPTED,
    }
}

pub(crate) fn column_for(
    profile: SchemaProfile,
    list: ListKind,
    field: CanonicalField,
) -> Option<&'static str> {
    field_table(profile, list)
        .iter()
        .find(|(candidate, _)| *candidate == field)
        .map(|(_, column)| *column)
}

type ReverseKey = (SchemaProfile, ListKind);
static REVERSE_MAPS: OnceLock<HashMap<ReverseKey, HashMap<String, CanonicalField>>> =
    OnceLock::new();

/// Canonical field for a native column header, compared in normalized form.
pub(crate) fn field_for_column(
    profile: SchemaProfile,
    list: ListKind,
    column: &str,
) -> Option<CanonicalField> {
    reverse_maps()
        .get(&(profile, list))
        .and_then(|map| map.get(&normalize_header(column)))
        .copied()
}

fn reverse_maps() -> &'static HashMap<ReverseKey, HashMap<String, CanonicalField>> {
    REVERSE_MAPS.get_or_init(|| {
        let mut maps = HashMap::new();
        for profile in SchemaProfile::ordered() {
            for list in ListKind::ordered() {
                let table = field_table(profile, list);
                let mut map = HashMap::with_capacity(table.len());
                for (field, column) in table {
                    map.insert(normalize_header(column), *field);
                }
                maps.insert((profile, list), map);
            }
        }
        maps
    })
}
