//! # docutable
//!
//! Extract tables from images and PDF documents with Vision Language Models
//! and export them as Excel spreadsheets.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PNG / JPEG / PDF
//!  │
//!  ├─ 1. Input    local file or URL, 10 MiB ceiling per file
//!  ├─ 2. Encode   bytes → data URI (preview + transport)
//!  ├─ 3. VLM      one request per document, JSON array of tables back
//!  ├─ 4. Decode   strict schema check, every cell kept as text
//!  └─ 5. Export   one table → .xlsx, several → <name>_tables.zip
//! ```
//!
//! Uploaded files live in a [`SessionStore`]: each item moves through
//! `idle → processing → complete | error` and can be re-extracted, removed,
//! or exported independently of the others.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docutable::{ExtractionClient, ExtractionConfig, SessionStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = ExtractionConfig::default();
//!     let client = ExtractionClient::from_config(&config)?;
//!
//!     let store = SessionStore::new();
//!     let ids = store.ingest(&["parts_list.pdf"], &config).await;
//!     for id in ids {
//!         store.extract(id, &client).await??;
//!         if let Some(path) = store.export_item(id, "out".as_ref()).await? {
//!             println!("wrote {}", path.display());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docutable` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod pipeline;
pub mod preview;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{DocuTableError, ExtractionError, IngestError};
pub use pipeline::decode::decode_tables;
pub use pipeline::export::{build_export, export_to_dir, save_export, ExportArtifact, ExportKind};
pub use pipeline::filename::{resolve_filename, sanitize_filename, UniqueNames};
pub use pipeline::input::{resolve_source, SourceFile};
pub use pipeline::llm::{ExtractionClient, TableExtractor};
pub use preview::{display_title, render_text, TablePager};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{ItemId, ItemStatus, Session, SessionStore, UploadedItem};
pub use table::ExtractedTable;
