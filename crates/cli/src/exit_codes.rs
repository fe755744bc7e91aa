//! CLI Exit Code Registry
//!
//! Single source of truth for `cflow` exit codes. Scripts and schedulers
//! rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified)                          |
//! | 2    | Usage error (bad arguments, bad pull date)           |
//! | 3    | Input not found or unreadable                        |
//! | 4    | Schema contract violation (missing column, bad month)|
//! | 5    | Output write failure                                 |
//! | 6    | Invalid config                                       |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, malformed pull date.
pub const EXIT_USAGE: u8 = 2;

/// A required bronze input is missing or cannot be read.
pub const EXIT_INPUT: u8 = 3;

/// An input table violates its column or month-token contract.
pub const EXIT_SCHEMA: u8 = 4;

/// A silver/gold output, manifest or report could not be written.
pub const EXIT_WRITE: u8 = 5;

/// Config file cannot be read, parsed or validated.
pub const EXIT_CONFIG: u8 = 6;

/// Map a core error onto the registry.
pub fn recon_exit_code(err: &caseflow_recon::ReconError) -> u8 {
    use caseflow_recon::ReconError;
    match err {
        ReconError::MissingRequiredColumn { .. } | ReconError::InvalidMonthToken { .. } => EXIT_SCHEMA,
        ReconError::TableParse { .. } => EXIT_INPUT,
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_CONFIG,
        ReconError::MissingKeyColumn { .. } => EXIT_ERROR,
    }
}
