//! Error types for the docutable library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`DocuTableError`]: **Fatal to one operation.** The provider is not
//!   configured, an item id does not exist, an export could not be written.
//!   Returned as `Err(DocuTableError)` from the library entry points. It never
//!   tears down the session.
//!
//! * [`IngestError`]: **Non-fatal, per file.** One selected file is too
//!   large or unreadable. The file is dropped and the rest of the batch is
//!   ingested.
//!
//! * [`ExtractionError`]: **Non-fatal, per item.** The model service failed
//!   or returned something that does not decode. The item moves to the error
//!   state and stays in the session so the user can retry.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors returned by the docutable library.
#[derive(Debug, Error)]
pub enum DocuTableError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Session errors ────────────────────────────────────────────────────
    /// No item with this id exists in the session.
    #[error("No uploaded item with id {id}")]
    ItemNotFound { id: String },

    /// The item is already being analysed.
    #[error("Extraction already in progress for '{name}'")]
    ExtractionInFlight { name: String },

    /// The item has no extracted tables yet.
    #[error("'{name}' has no extracted tables to export")]
    NothingToExport { name: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// rust_xlsxwriter refused the workbook.
    #[error("Failed to build spreadsheet '{name}': {detail}")]
    SpreadsheetFailed { name: String, detail: String },

    /// Zip assembly failed.
    #[error("Failed to build archive '{name}': {detail}")]
    ArchiveFailed { name: String, detail: String },

    /// Could not create or write the export file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single selected file.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("File not found: '{path}'")]
    NotFound { path: PathBuf },

    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file is at or over the per-file size ceiling.
    #[error("'{name}' is too large: {size} bytes (limit {limit} bytes)")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },
}

/// A non-fatal error for one extraction request.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The provider call itself failed (network, auth, API error).
    #[error("Extraction service error: {message}")]
    Service { message: String },

    /// The provider did not answer within `api_timeout_secs`.
    #[error("Extraction service timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider answered with no text at all.
    #[error("No content from extraction service")]
    EmptyResponse,

    /// The answer is not a JSON array of tables.
    #[error("Malformed extraction response: {source}")]
    Malformed {
        #[source]
        source: serde_json::Error,
    },
}
