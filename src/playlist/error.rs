//! Catalog error types.

use thiserror::Error;

/// Errors that can occur while building a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The music directory does not exist.
    #[error("音楽フォルダが見つかりません: {0}")]
    DirectoryNotFound(String),

    /// The music directory could not be read.
    #[error("音楽フォルダを読み込めません: {0}")]
    ReadError(String),
}

impl CatalogError {
    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::DirectoryNotFound(_) => "--dir で音楽フォルダを指定してください",
            Self::ReadError(_) => "フォルダのアクセス権を確認してください",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CatalogError::DirectoryNotFound("/no/such/dir".to_string());
        assert!(err.to_string().contains("/no/such/dir"));

        let err = CatalogError::ReadError("permission denied".to_string());
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_suggestion() {
        assert!(CatalogError::DirectoryNotFound("x".into())
            .suggestion()
            .contains("--dir"));
        assert!(CatalogError::ReadError("x".into())
            .suggestion()
            .contains("アクセス権"));
    }
}
