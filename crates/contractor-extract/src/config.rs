//! Extraction session configuration.

use serde::{Deserialize, Serialize};

/// Full name of the canonical contract class.
pub const DEFAULT_CONTRACT_CLASS: &str = "System.Diagnostics.Contracts.Contract";

/// Knobs for one extraction session.
///
/// Every field has a default, so a partial JSON document (or `{}`) is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Full names of the classes whose static methods are contract calls.
    pub contract_classes: Vec<String>,
    /// Treat `if (c) throw e;` prologues as always-checked preconditions.
    pub recognize_legacy_requires: bool,
    /// Wrap bare parameter references in postconditions in `old(...)`.
    pub implicit_old_parameters: bool,
    /// Recover `original_source` text from debug locations.
    pub recover_source_text: bool,
    /// Force reference-assembly mode on or off. `None` detects it from the
    /// unit's `ContractReferenceAssemblyAttribute`.
    pub reference_assembly: Option<bool>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            contract_classes: vec![DEFAULT_CONTRACT_CLASS.to_string()],
            recognize_legacy_requires: true,
            implicit_old_parameters: true,
            recover_source_text: true,
            reference_assembly: None,
        }
    }
}
