use thiserror::Error;

/// Failure of a store call. Every variant carries a message meant for the
/// person who triggered the write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Blank required field, negative quantity, malformed date, or a
    /// reference to a record that does not exist.
    #[error("{0}")]
    Validation(String),
    /// The addressed record does not exist (stale or deleted id).
    #[error("{0}")]
    NotFound(String),
    /// The database could not be opened or the statement failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
            || matches!(self, Self::Validation(m) if m.ends_with("not found"))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Unavailable(value.to_string())
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(value: anyhow::Error) -> Self {
        Self::Unavailable(format!("{value:#}"))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Unavailable(format!("corrupt document: {value}"))
    }
}
