use std::path::Path;

use serde::{Deserialize, Serialize};

use super::normalizer::sheet_key;

/// Labels that mean "every real branch of this facility". They are query
/// modifiers only and never become storage keys.
pub const SEE_ALL_ALIASES: &[&str] = &["see all", "all", "הכל"];

/// Canonical label returned to presentation layers for the pseudo-branch.
pub const SEE_ALL_LABEL: &str = "See all";

pub fn is_see_all(label: &str) -> bool {
    let normalized = label.trim().to_lowercase();
    SEE_ALL_ALIASES.iter().any(|alias| normalized == *alias)
}

/// Top-level grouping owning an ordered set of real branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facility {
    pub name: String,
    pub branches: Vec<String>,
}

impl Facility {
    /// Builds a facility, dropping any "see all" entries from the branch list.
    pub fn new<I, S>(name: impl Into<String>, branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let branches = branches
            .into_iter()
            .map(|branch| {
                let branch: String = branch.into();
                branch.trim().to_string()
            })
            .filter(|branch| !branch.is_empty() && !is_see_all(branch))
            .collect();

        Self {
            name: name.into(),
            branches,
        }
    }

    pub fn has_branch(&self, branch: &str) -> bool {
        self.branches.iter().any(|candidate| candidate == branch)
    }

    /// Looks a branch up by its sheet-style key (case and spaces ignored).
    pub fn branch_by_key(&self, label: &str) -> Option<&str> {
        let wanted = sheet_key(label);
        self.branches
            .iter()
            .find(|branch| sheet_key(branch) == wanted)
            .map(String::as_str)
    }

    /// Branch options for a selector: the pseudo-branch first, then real ones.
    pub fn branch_options(&self) -> Vec<String> {
        std::iter::once(SEE_ALL_LABEL.to_string())
            .chain(self.branches.iter().cloned())
            .collect()
    }

    /// Resolves a user-supplied branch label into a query scope.
    pub fn scope(&self, label: &str) -> Result<BranchScope, TaxonomyError> {
        if is_see_all(label) {
            return Ok(BranchScope::All);
        }

        let trimmed = label.trim();
        if self.has_branch(trimmed) {
            return Ok(BranchScope::Branch(trimmed.to_string()));
        }

        self.branch_by_key(trimmed)
            .map(|branch| BranchScope::Branch(branch.to_string()))
            .ok_or_else(|| TaxonomyError::UnknownBranch {
                facility: self.name.clone(),
                branch: trimmed.to_string(),
            })
    }

    /// Resolves a label that must name a real branch (storage target).
    pub fn storage_branch(&self, label: &str) -> Result<String, TaxonomyError> {
        match self.scope(label)? {
            BranchScope::Branch(branch) => Ok(branch),
            BranchScope::All => Err(TaxonomyError::PseudoBranchTarget {
                facility: self.name.clone(),
            }),
        }
    }

    /// Real branches covered by a scope, in declaration order.
    pub fn branches_in<'a>(&'a self, scope: &'a BranchScope) -> Vec<&'a str> {
        match scope {
            BranchScope::All => self.branches.iter().map(String::as_str).collect(),
            BranchScope::Branch(branch) => vec![branch.as_str()],
        }
    }
}

#[derive(Deserialize)]
struct FacilityFile {
    name: String,
    branches: Vec<String>,
}

/// Query modifier: one real branch or the union of all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "branch")]
pub enum BranchScope {
    All,
    Branch(String),
}

impl BranchScope {
    pub fn label(&self) -> &str {
        match self {
            BranchScope::All => SEE_ALL_LABEL,
            BranchScope::Branch(branch) => branch,
        }
    }
}

/// Ordered set of facilities known to the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Taxonomy {
    facilities: Vec<Facility>,
}

impl Taxonomy {
    pub fn new(facilities: Vec<Facility>) -> Self {
        Self { facilities }
    }

    /// Single facility with the branch layout used by the original deployment.
    pub fn standard() -> Self {
        Self::new(vec![Facility::new(
            "גוש דן",
            [
                "תל אביב",
                "רמת גן - גבעתיים",
                "בקעת אונו",
                "הרצליה - רמת השרון",
                "חולון - בת ים",
                "להטבק",
                "טראומה מורכבת",
                "דרי רחוב",
            ],
        )])
    }

    pub fn from_json(raw: &str) -> Result<Self, TaxonomyError> {
        let entries: Vec<FacilityFile> = serde_json::from_str(raw)?;
        if entries.is_empty() {
            return Err(TaxonomyError::Empty);
        }

        Ok(Self::new(
            entries
                .into_iter()
                .map(|entry| Facility::new(entry.name, entry.branches))
                .collect(),
        ))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, TaxonomyError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn facilities(&self) -> &[Facility] {
        &self.facilities
    }

    pub fn facility(&self, name: &str) -> Result<&Facility, TaxonomyError> {
        let trimmed = name.trim();
        self.facilities
            .iter()
            .find(|facility| facility.name == trimmed)
            .or_else(|| {
                let wanted = sheet_key(trimmed);
                self.facilities
                    .iter()
                    .find(|facility| sheet_key(&facility.name) == wanted)
            })
            .ok_or_else(|| TaxonomyError::UnknownFacility(trimmed.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TaxonomyError {
    #[error("unknown facility '{0}'")]
    UnknownFacility(String),
    #[error("facility '{facility}' has no branch '{branch}'")]
    UnknownBranch { facility: String, branch: String },
    #[error("records in '{facility}' must be stored under a real branch, not the see-all view")]
    PseudoBranchTarget { facility: String },
    #[error("taxonomy file lists no facilities")]
    Empty,
    #[error("failed to read taxonomy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid taxonomy json: {0}")]
    Json(#[from] serde_json::Error),
}
