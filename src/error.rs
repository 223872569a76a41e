//! Error kinds shared by content sources and providers.
//!
//! Remote failures surface as [`SourceError`] inside the source clients and
//! are wrapped into [`ContentError::SourceUnavailable`] at the source
//! boundary. Providers catch every [`ContentError`]; only the resulting
//! [`RenderStatus`] reaches the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Transport and parse failures of a remote source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// HTTP request failed (network, timeout, auth or server error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed multistatus XML from a CalDAV server
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed JSON from the weather service
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No calendar with the configured display name
    #[error("calendar '{0}' not found")]
    CalendarNotFound(String),

    /// Response parsed but its content made no sense
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Failure kinds caught at the content provider boundary.
#[derive(Error, Debug)]
pub enum ContentError {
    /// A calendar or weather source could not be reached or read
    #[error("source '{source_id}' unavailable: {source}")]
    SourceUnavailable {
        source_id: String,
        #[source]
        source: SourceError,
    },

    /// The fetch succeeded but returned nothing usable
    #[error("no data")]
    NoData,

    /// A placeholder image or font could not be loaded
    #[error("asset missing: {}", .0.display())]
    AssetMissing(PathBuf),
}

impl ContentError {
    pub fn unavailable(source_id: impl Into<String>, source: impl Into<SourceError>) -> Self {
        ContentError::SourceUnavailable {
            source_id: source_id.into(),
            source: source.into(),
        }
    }
}

/// Outcome of one render cycle, forwarded to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderStatus {
    #[default]
    Ok,
    /// A content source failed and a placeholder was drawn instead
    SourceUnavailable,
}

impl RenderStatus {
    /// Process exit code for this status
    pub fn exit_code(self) -> u8 {
        match self {
            RenderStatus::Ok => 0,
            RenderStatus::SourceUnavailable => 3,
        }
    }

    pub fn is_ok(self) -> bool {
        self == RenderStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(RenderStatus::Ok.exit_code(), 0);
        assert_eq!(RenderStatus::SourceUnavailable.exit_code(), 3);
        assert!(RenderStatus::default().is_ok());
    }

    #[test]
    fn error_display_names_the_source() {
        let err = ContentError::unavailable("work", SourceError::CalendarNotFound("Work".into()));
        let text = err.to_string();
        assert!(text.contains("work"));
        assert!(text.contains("Work"));

        let err = ContentError::AssetMissing(PathBuf::from("/tmp/x.bmp"));
        assert_eq!(err.to_string(), "asset missing: /tmp/x.bmp");
    }
}
