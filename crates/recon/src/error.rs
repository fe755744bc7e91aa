use std::fmt;

use crate::table::Dataset;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    /// One or more required columns are absent after applying the column mapping.
    MissingRequiredColumn { dataset: Dataset, columns: Vec<String> },
    /// Month values that are not `YYYY-MM` tokens, with a few distinct examples.
    InvalidMonthToken { dataset: Dataset, examples: Vec<String> },
    /// A quality report was asked to key on columns the table lacks.
    MissingKeyColumn { table: String, columns: Vec<String> },
    /// Input text could not be parsed as a table.
    TableParse { dataset: Dataset, message: String },
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad thresholds, empty column names, etc.).
    ConfigValidation(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequiredColumn { dataset, columns } => {
                write!(f, "{dataset}: missing required columns: {}", columns.join(", "))
            }
            Self::InvalidMonthToken { dataset, examples } => {
                write!(
                    f,
                    "{dataset}: month not in YYYY-MM format. Examples: {}",
                    examples.join(", ")
                )
            }
            Self::MissingKeyColumn { table, columns } => {
                write!(f, "{table}: quality report key columns missing: {}", columns.join(", "))
            }
            Self::TableParse { dataset, message } => write!(f, "{dataset}: cannot parse table: {message}"),
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_dataset_and_columns() {
        let err = ReconError::MissingRequiredColumn {
            dataset: Dataset::CaseNoteEvents,
            columns: vec!["Programs Full Name".into(), "Services Count".into()],
        };
        assert_eq!(
            err.to_string(),
            "case_note_events: missing required columns: Programs Full Name, Services Count"
        );
    }
}
