//! Session state: uploaded items, their extraction status, and the active
//! selection.
//!
//! [`Session`] is an immutable value. Every operation returns a new session
//! and leaves the old one untouched, so a reader holding a snapshot never
//! sees a half-applied update. Item contents (file bytes, encoded payload,
//! tables) sit behind `Arc`s, so producing a new session copies pointers
//! rather than file data.
//!
//! [`SessionStore`] is the shared handle async operations go through. It
//! swaps whole snapshots under a lock that is never held across an await.
//! Extraction results are merged by item id: if the item was removed while
//! its request was in flight, the result is dropped.
//!
//! ## Item lifecycle
//!
//! ```text
//! idle ──▶ processing ──▶ complete
//!              │   ▲           │
//!              ▼   └───────────┤ (re-extract)
//!            error ────────────┘
//! ```

use crate::config::ExtractionConfig;
use crate::error::{DocuTableError, ExtractionError};
use crate::pipeline::encode::encode_payload;
use crate::pipeline::export::export_to_dir;
use crate::pipeline::input::{resolve_source, SourceFile};
use crate::pipeline::llm::TableExtractor;
use crate::progress::ProgressCallback;
use crate::table::ExtractedTable;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Message shown for any failed extraction. The cause is logged, not shown.
pub const EXTRACTION_FAILED_MESSAGE: &str =
    "Failed to extract data. Please ensure the file contains visible tables.";

/// Identity of an uploaded item.
pub type ItemId = Uuid;

/// Processing status of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Idle,
    Processing,
    Complete,
    Error,
}

/// One uploaded file and everything extracted from it.
#[derive(Debug, Clone)]
pub struct UploadedItem {
    pub id: ItemId,
    pub source: SourceFile,
    /// `data:` URI of the file, used for preview and transport.
    pub payload: Arc<str>,
    pub media_type: String,
    pub status: ItemStatus,
    pub tables: Option<Arc<Vec<ExtractedTable>>>,
    pub error: Option<String>,
}

impl UploadedItem {
    /// Encode `source` into a new idle item.
    pub fn new(source: SourceFile) -> Self {
        let payload = encode_payload(&source.bytes, &source.media_type);
        Self {
            id: Uuid::new_v4(),
            media_type: source.media_type.clone(),
            source,
            payload,
            status: ItemStatus::Idle,
            tables: None,
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn tables(&self) -> &[ExtractedTable] {
        self.tables.as_deref().map(Vec::as_slice).unwrap_or_default()
    }

    /// One-line status for display.
    pub fn status_line(&self) -> String {
        match self.status {
            ItemStatus::Idle => "Ready to extract".to_string(),
            ItemStatus::Processing => "Analyzing document...".to_string(),
            ItemStatus::Complete => match self.tables().len() {
                n if n > 1 => format!("{n} files extracted"),
                _ => "Extraction complete".to_string(),
            },
            ItemStatus::Error => self
                .error
                .clone()
                .unwrap_or_else(|| "An error occurred.".to_string()),
        }
    }

    fn begin_extraction(mut self) -> Self {
        self.status = ItemStatus::Processing;
        self.error = None;
        self
    }

    fn finish_extraction(mut self, result: &Result<Vec<ExtractedTable>, ExtractionError>) -> Self {
        match result {
            Ok(tables) => {
                self.status = ItemStatus::Complete;
                self.tables = Some(Arc::new(tables.clone()));
                self.error = None;
            }
            Err(_) => {
                self.status = ItemStatus::Error;
                self.error = Some(EXTRACTION_FAILED_MESSAGE.to_string());
            }
        }
        self
    }
}

/// Snapshot of all uploaded items plus the active selection.
#[derive(Debug, Clone, Default)]
pub struct Session {
    items: Vec<UploadedItem>,
    active: Option<ItemId>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[UploadedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&UploadedItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn active_id(&self) -> Option<ItemId> {
        self.active
    }

    pub fn active(&self) -> Option<&UploadedItem> {
        self.active.and_then(|id| self.get(id))
    }

    /// Append `items` in order. The first of them becomes active when
    /// nothing is active yet.
    pub fn ingested(&self, items: Vec<UploadedItem>) -> Session {
        let active = self.active.or_else(|| items.first().map(|item| item.id));
        let mut next = self.items.clone();
        next.extend(items);
        Session {
            items: next,
            active,
        }
    }

    /// Apply `update` to the item with `id`. No-op when the id is unknown.
    pub fn updated(&self, id: ItemId, update: impl FnOnce(UploadedItem) -> UploadedItem) -> Session {
        let mut update = Some(update);
        let items = self
            .items
            .iter()
            .map(|item| match update.take_if(|_| item.id == id) {
                Some(f) => f(item.clone()),
                None => item.clone(),
            })
            .collect();
        Session {
            items,
            active: self.active,
        }
    }

    /// Drop the item with `id`. If it was active, the first remaining item
    /// becomes active.
    pub fn without(&self, id: ItemId) -> Session {
        let items: Vec<UploadedItem> = self
            .items
            .iter()
            .filter(|item| item.id != id)
            .cloned()
            .collect();
        let active = match self.active {
            Some(current) if current == id => items.first().map(|item| item.id),
            other => other,
        };
        Session { items, active }
    }

    /// Make `id` the active item. Unknown ids leave the selection unchanged.
    pub fn selected(&self, id: ItemId) -> Session {
        let active = if self.get(id).is_some() {
            Some(id)
        } else {
            self.active
        };
        Session {
            items: self.items.clone(),
            active,
        }
    }
}

/// Shared, swappable session handle.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the current snapshot with `f(current)` and return the result.
    fn swap(&self, f: impl FnOnce(&Session) -> Session) -> Session {
        let mut guard = self.lock();
        let next = f(&guard);
        *guard = next.clone();
        next
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    pub fn get(&self, id: ItemId) -> Option<UploadedItem> {
        self.lock().get(id).cloned()
    }

    pub fn active(&self) -> Option<UploadedItem> {
        self.lock().active().cloned()
    }

    /// Add already-loaded files. Returns the new ids in order.
    pub fn add_sources(&self, sources: Vec<SourceFile>) -> Vec<ItemId> {
        let items: Vec<UploadedItem> = sources.into_iter().map(UploadedItem::new).collect();
        let ids = items.iter().map(|item| item.id).collect();
        if !items.is_empty() {
            self.swap(|s| s.ingested(items));
        }
        ids
    }

    /// Load, encode and add every input (paths or URLs).
    ///
    /// Inputs that fail (too large, unreadable, download error) are logged
    /// and skipped; the others are added in input order.
    pub async fn ingest<S: AsRef<str>>(&self, inputs: &[S], config: &ExtractionConfig) -> Vec<ItemId> {
        let mut sources = Vec::with_capacity(inputs.len());
        for input in inputs {
            let input = input.as_ref();
            match resolve_source(input, config).await {
                Ok(source) => sources.push(source),
                Err(e) => warn!("Skipping '{}': {}", input, e),
            }
        }
        let ids = self.add_sources(sources);
        info!("Ingested {}/{} file(s)", ids.len(), inputs.len());
        ids
    }

    /// Run one extraction for `id` and merge the outcome into the session.
    ///
    /// Returns the extraction outcome. Errors from the service do not fail
    /// this call: they put the item in the error state and are returned as
    /// `Ok(Err(..))`. If the item was removed while the request was in
    /// flight, the outcome is discarded and the session is left unchanged.
    pub async fn extract<E: TableExtractor>(
        &self,
        id: ItemId,
        extractor: &E,
    ) -> Result<Result<usize, ExtractionError>, DocuTableError> {
        let (name, payload, media_type) = {
            let mut guard = self.lock();
            let item = guard.get(id).ok_or_else(|| DocuTableError::ItemNotFound {
                id: id.to_string(),
            })?;
            if item.status == ItemStatus::Processing {
                return Err(DocuTableError::ExtractionInFlight {
                    name: item.name().to_string(),
                });
            }
            let snapshot = (
                item.name().to_string(),
                Arc::clone(&item.payload),
                item.media_type.clone(),
            );
            let next = guard.updated(id, UploadedItem::begin_extraction);
            *guard = next;
            snapshot
        };

        debug!("Extracting '{}' ({})", name, media_type);
        let result = extractor.extract(&payload, &media_type).await;

        match &result {
            Ok(tables) => info!("'{}': {} table(s) extracted", name, tables.len()),
            Err(e) => warn!("'{}': extraction failed: {}", name, e),
        }

        let still_present = self
            .swap(|s| s.updated(id, |item| item.finish_extraction(&result)))
            .get(id)
            .is_some();
        if !still_present {
            debug!("'{}' was removed during extraction; result discarded", name);
        }

        Ok(result.map(|tables| tables.len()))
    }

    /// Extract every item that is not complete yet, with at most
    /// `concurrency` requests in flight. Returns the number of successes.
    pub async fn extract_all<E: TableExtractor>(
        &self,
        extractor: &E,
        concurrency: usize,
        progress: Option<&ProgressCallback>,
    ) -> usize {
        let pending: Vec<(ItemId, String)> = self
            .snapshot()
            .items()
            .iter()
            .filter(|item| matches!(item.status, ItemStatus::Idle | ItemStatus::Error))
            .map(|item| (item.id, item.name().to_string()))
            .collect();
        let total = pending.len();

        if let Some(cb) = progress {
            cb.on_batch_start(total);
        }

        let outcomes: Vec<bool> = stream::iter(pending.into_iter().map(|(id, name)| async move {
            if let Some(cb) = progress {
                cb.on_item_start(&name);
            }
            let outcome = self.extract(id, extractor).await;
            let ok = matches!(outcome, Ok(Ok(_)));
            if let Some(cb) = progress {
                match outcome {
                    Ok(Ok(count)) => cb.on_item_complete(&name, count),
                    Ok(Err(e)) => cb.on_item_error(&name, &e.to_string()),
                    Err(e) => cb.on_item_error(&name, &e.to_string()),
                }
            }
            ok
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

        let success = outcomes.into_iter().filter(|ok| *ok).count();
        if let Some(cb) = progress {
            cb.on_batch_complete(total, success);
        }
        info!("Batch extraction: {}/{} succeeded", success, total);
        success
    }

    /// Export the item's tables into `dir`, named after the uploaded file.
    pub async fn export_item(&self, id: ItemId, dir: &Path) -> Result<Option<PathBuf>, DocuTableError> {
        let item = self.get(id).ok_or_else(|| DocuTableError::ItemNotFound {
            id: id.to_string(),
        })?;
        let tables = item.tables.clone().ok_or_else(|| DocuTableError::NothingToExport {
            name: item.name().to_string(),
        })?;
        export_to_dir(&tables, item.name(), dir).await
    }

    /// Remove one item, whatever its state.
    pub fn remove(&self, id: ItemId) -> Session {
        self.swap(|s| s.without(id))
    }

    pub fn select(&self, id: ItemId) -> Session {
        self.swap(|s| s.selected(id))
    }

    /// Discard every item.
    pub fn reset(&self) -> Session {
        self.swap(|_| Session::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str) -> SourceFile {
        SourceFile::from_bytes(name, b"%PDF-1.4 test".to_vec())
    }

    fn table(title: &str) -> ExtractedTable {
        ExtractedTable::new(title, vec!["A".into()], vec![vec!["1".into()]])
    }

    #[test]
    fn new_items_are_idle_with_data_uri() {
        let item = UploadedItem::new(source("a.pdf"));
        assert_eq!(item.status, ItemStatus::Idle);
        assert_eq!(item.media_type, "application/pdf");
        assert!(item.payload.starts_with("data:application/pdf;base64,"));
        assert!(item.tables.is_none());
    }

    #[test]
    fn first_ingested_item_becomes_active() {
        let a = UploadedItem::new(source("a.pdf"));
        let b = UploadedItem::new(source("b.pdf"));
        let (a_id, b_id) = (a.id, b.id);

        let s = Session::new().ingested(vec![a]);
        assert_eq!(s.active_id(), Some(a_id));

        let s = s.ingested(vec![b]);
        assert_eq!(s.active_id(), Some(a_id), "existing selection is kept");
        assert_eq!(s.items()[1].id, b_id);
    }

    #[test]
    fn updates_do_not_touch_previous_snapshot() {
        let item = UploadedItem::new(source("a.pdf"));
        let id = item.id;
        let before = Session::new().ingested(vec![item]);
        let after = before.updated(id, UploadedItem::begin_extraction);
        assert_eq!(before.get(id).unwrap().status, ItemStatus::Idle);
        assert_eq!(after.get(id).unwrap().status, ItemStatus::Processing);
    }

    #[test]
    fn update_of_unknown_id_is_noop() {
        let s = Session::new().ingested(vec![UploadedItem::new(source("a.pdf"))]);
        let next = s.updated(Uuid::new_v4(), |mut item| {
            item.status = ItemStatus::Complete;
            item
        });
        assert_eq!(next.items()[0].status, ItemStatus::Idle);
    }

    #[test]
    fn removing_active_selects_first_remaining() {
        let items: Vec<_> = ["a", "b", "c"].iter().map(|n| UploadedItem::new(source(n))).collect();
        let ids: Vec<_> = items.iter().map(|i| i.id).collect();
        let s = Session::new().ingested(items).selected(ids[1]);
        assert_eq!(s.active_id(), Some(ids[1]));

        let s = s.without(ids[1]);
        assert_eq!(s.active_id(), Some(ids[0]));
        let s = s.without(ids[2]);
        assert_eq!(s.active_id(), Some(ids[0]));
        let s = s.without(ids[0]);
        assert_eq!(s.active_id(), None);
        assert!(s.is_empty());
    }

    #[test]
    fn selecting_unknown_id_keeps_selection() {
        let item = UploadedItem::new(source("a.pdf"));
        let id = item.id;
        let s = Session::new().ingested(vec![item]).selected(Uuid::new_v4());
        assert_eq!(s.active_id(), Some(id));
    }

    #[test]
    fn status_lines() {
        let mut item = UploadedItem::new(source("a.pdf"));
        assert_eq!(item.status_line(), "Ready to extract");

        item = item.begin_extraction();
        assert_eq!(item.status_line(), "Analyzing document...");

        item = item.finish_extraction(&Ok(vec![table("x"), table("y")]));
        assert_eq!(item.status_line(), "2 files extracted");

        item = item.finish_extraction(&Ok(vec![table("x")]));
        assert_eq!(item.status_line(), "Extraction complete");

        item = item.finish_extraction(&Err(ExtractionError::EmptyResponse));
        assert_eq!(item.status_line(), EXTRACTION_FAILED_MESSAGE);
    }

    #[test]
    fn failed_reextraction_keeps_previous_tables() {
        let item = UploadedItem::new(source("a.pdf"))
            .finish_extraction(&Ok(vec![table("x")]))
            .begin_extraction()
            .finish_extraction(&Err(ExtractionError::EmptyResponse));
        assert_eq!(item.status, ItemStatus::Error);
        assert_eq!(item.tables().len(), 1);
    }

    #[test]
    fn ids_and_status_serialise_for_reports() {
        let item = UploadedItem::new(source("a.pdf"));
        let id = serde_json::to_value(item.id).unwrap();
        assert_eq!(id, serde_json::Value::String(item.id.to_string()));
        let status = serde_json::to_value(ItemStatus::Processing).unwrap();
        assert_eq!(status, "processing");
    }

    #[test]
    fn store_reset_clears_everything() {
        let store = SessionStore::new();
        store.add_sources(vec![source("a.pdf"), source("b.pdf")]);
        assert_eq!(store.snapshot().len(), 2);
        let s = store.reset();
        assert!(s.is_empty());
        assert!(store.active().is_none());
    }
}
