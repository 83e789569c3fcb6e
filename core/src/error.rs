//! Error types for failures detected before or between network calls.
//!
//! # Design
//! Endpoint methods always hand back a [`Response`](crate::Response); these
//! errors are how input validation and composite-call failures are named
//! before being folded into a failed `Response` (see `From<ApiError>` in
//! `response.rs`). Transport failures have their own type in
//! `transport.rs` because the dispatcher classifies them separately.

use thiserror::Error;

use crate::types::FileTokenPurpose;

/// Result type alias
pub type Result<T> = std::result::Result<T, ApiError>;

/// Failures that short-circuit an endpoint method.
#[derive(Error, Debug)]
pub enum ApiError {
    /// A file token purpose other than `UPLOAD` or `DOWNLOAD`.
    #[error("attribute purpose must be either UPLOAD or DOWNLOAD, got {0:?}")]
    InvalidFileTokenPurpose(String),

    #[error("A search expression must be provided")]
    EmptySearchExpression,

    /// The issue template lookup returned no rows.
    #[error("no issue template found for project template {0:?}")]
    IssueTemplateNotFound(String),

    /// The issue template's `_href` has no final path segment to use as an id.
    #[error("issue template link {0:?} does not end in a template id")]
    MalformedIssueTemplateLink(String),

    /// The file token call succeeded but carried no `data.token`.
    #[error("the server did not return a {0} file token")]
    MissingFileToken(FileTokenPurpose),

    /// A request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        assert_eq!(
            ApiError::EmptySearchExpression.to_string(),
            "A search expression must be provided"
        );
        assert!(ApiError::InvalidFileTokenPurpose("READ".into())
            .to_string()
            .starts_with("attribute purpose must be either UPLOAD or DOWNLOAD"));
        assert_eq!(
            ApiError::MissingFileToken(FileTokenPurpose::Download).to_string(),
            "the server did not return a DOWNLOAD file token"
        );
    }
}
