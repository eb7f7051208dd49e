//! Pipeline stages from selected file to exported spreadsheet.
//!
//! Each submodule implements exactly one transformation step so each can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ decode ──▶ filename ──▶ export
//! (path/URL) (data URI) (VLM)   (JSON)     (naming)     (xlsx/zip)
//! ```
//!
//! 1. [`input`]:    read a local file or download a URL; size ceiling and
//!    media-type sniffing
//! 2. [`encode`]:   wrap bytes in a `data:` URI used for preview and transport
//! 3. [`llm`]:      one request to the vision model; the only stage that
//!    talks to the extraction service
//! 4. [`decode`]:   strict JSON decode of the answer into tables
//! 5. [`filename`]: per-table export names, de-duplicated per batch
//! 6. [`export`]:   spreadsheet / archive assembly and atomic save

pub mod decode;
pub mod encode;
pub mod export;
pub mod filename;
pub mod input;
pub mod llm;
