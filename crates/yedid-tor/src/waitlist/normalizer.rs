/// Header comparison form: invisible marks stripped, whitespace collapsed,
/// lowercased.
pub(crate) fn normalize_header(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}', '\u{200f}', '\u{200e}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

/// Sheet and branch comparison form: lowercased with every space removed.
pub(crate) fn sheet_key(value: &str) -> String {
    normalize_header(value).replace(' ', "")
}
