// Launch Options - declared arguments for validation and sort runs

use serde::{Deserialize, Serialize};

/// Validation scope filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationType {
    #[default]
    All,
    JsonFiles,
    Logos,
    FolderNames,
    StoreIds,
    Gtin,
}

impl ValidationType {
    /// Scope flag understood by the validator, `None` runs every check
    pub fn flag(&self) -> Option<&'static str> {
        match self {
            ValidationType::All => None,
            ValidationType::JsonFiles => Some("--json-files"),
            ValidationType::Logos => Some("--logos"),
            ValidationType::FolderNames => Some("--folder-names"),
            ValidationType::StoreIds => Some("--store-ids"),
            ValidationType::Gtin => Some("--gtin"),
        }
    }
}

/// Options for a validation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOptions {
    #[serde(default)]
    pub validation_type: ValidationType,
}

/// Options for a sort run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOptions {
    /// Preview changes without writing files
    #[serde(default)]
    pub dry_run: bool,

    /// Chain a validation pass after sorting
    #[serde(default)]
    pub validate: bool,

    /// Only normalize indentation, skip key sorting
    #[serde(default)]
    pub fix_indent_only: bool,
}
