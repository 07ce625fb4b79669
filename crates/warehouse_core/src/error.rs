//! crates/warehouse_core/src/error.rs
//!
//! Errors surfaced by document operations. Each variant carries a stable machine
//! code that the HTTP layer passes through unchanged.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// A required field is missing or malformed. Raised before the store is touched.
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("No rows found for code {0}")]
    CodeNotFound(String),

    #[error("Tab not found: {0}")]
    TabNotFound(String),

    /// Credentials missing, network or auth failure talking to the row store.
    #[error("Row store unavailable: {0}")]
    StoreUnavailable(String),
}

impl DocumentError {
    /// The short machine code returned to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            DocumentError::Validation(_) => "VALIDATION",
            DocumentError::CodeNotFound(_) => "CODE_NOT_FOUND",
            DocumentError::TabNotFound(_) => "TAB_NOT_FOUND",
            DocumentError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }
}

impl From<PortError> for DocumentError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::TabNotFound(tab) => DocumentError::TabNotFound(tab),
            other => DocumentError::StoreUnavailable(other.to_string()),
        }
    }
}

pub type DocumentResult<T> = Result<T, DocumentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_errors_map_to_machine_codes() {
        let tab: DocumentError = PortError::TabNotFound("NhapKho".into()).into();
        assert_eq!(tab.code(), "TAB_NOT_FOUND");

        let auth: DocumentError = PortError::Unauthorized("bad key".into()).into();
        assert_eq!(auth.code(), "STORE_UNAVAILABLE");

        assert_eq!(
            DocumentError::CodeNotFound("PNK10102501".into()).code(),
            "CODE_NOT_FOUND"
        );
    }
}
