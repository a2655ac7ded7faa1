use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillEtlError {
    #[error("unknown issuer: no dispatch entry matches '{issuer}'")]
    UnknownIssuer { issuer: String },

    #[error("malformed bill '{document}': required field '{field}' could not be located")]
    MalformedBill { document: String, field: String },

    #[error("ambiguous season in plan '{plan}': month {month} is claimed by both '{first}' and '{second}'")]
    AmbiguousSeason {
        plan: String,
        month: u32,
        first: String,
        second: String,
    },

    #[error("configuration error: {message}")]
    ConfigError { message: String },

    #[error("invalid value for '{field}': '{value}' ({reason})")]
    InvalidValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl BillEtlError {
    pub fn malformed(document: &str, field: &str) -> Self {
        BillEtlError::MalformedBill {
            document: document.to_string(),
            field: field.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        BillEtlError::ConfigError {
            message: message.into(),
        }
    }

    /// Per-document failures are isolated by the pipeline; everything else
    /// aborts the run.
    pub fn is_document_scoped(&self) -> bool {
        matches!(
            self,
            BillEtlError::UnknownIssuer { .. } | BillEtlError::MalformedBill { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BillEtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_bill_names_document_and_field() {
        let err = BillEtlError::malformed("f-1.txt", "cups");
        assert_eq!(
            err.to_string(),
            "malformed bill 'f-1.txt': required field 'cups' could not be located"
        );
        // The document name is plain data on the variant, not an error
        // chain.
        assert!(std::error::Error::source(&err).is_none());
    }
}
