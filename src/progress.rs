//! Progress-callback trait for batch extraction events.
//!
//! Pass a [`ProgressCallback`] to
//! [`crate::session::SessionStore::extract_all`] to receive events as each
//! document is analysed. Items run concurrently, so implementations must be
//! `Send + Sync` and guard shared state themselves.
//!
//! # Example
//!
//! ```rust
//! use docutable::ExtractionProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct TableCounter {
//!     tables: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for TableCounter {
//!     fn on_item_complete(&self, name: &str, table_count: usize) {
//!         self.tables.fetch_add(table_count, Ordering::SeqCst);
//!         eprintln!("{name}: {table_count} table(s)");
//!     }
//! }
//! ```

use std::sync::Arc;

/// Called by batch extraction as it processes each item.
///
/// All methods default to no-ops so callers only override what they need.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before any request is sent.
    fn on_batch_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called just before the request for an item is sent.
    fn on_item_start(&self, name: &str) {
        let _ = name;
    }

    /// Called when an item's tables were extracted.
    fn on_item_complete(&self, name: &str, table_count: usize) {
        let _ = (name, table_count);
    }

    /// Called when an item's extraction failed.
    fn on_item_error(&self, name: &str, error: &str) {
        let _ = (name, error);
    }

    /// Called once after every item has been attempted.
    fn on_batch_complete(&self, total_items: usize, success_count: usize) {
        let _ = (total_items, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Shared callback handle.
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracking {
        starts: AtomicUsize,
        tables: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ExtractionProgressCallback for Tracking {
        fn on_item_start(&self, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_complete(&self, _name: &str, table_count: usize) {
            self.tables.fetch_add(table_count, Ordering::SeqCst);
        }

        fn on_item_error(&self, _name: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(2);
        cb.on_item_start("a.pdf");
        cb.on_item_complete("a.pdf", 3);
        cb.on_item_error("b.png", "timeout");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let t = Tracking::default();
        t.on_item_start("a");
        t.on_item_complete("a", 2);
        t.on_item_start("b");
        t.on_item_error("b", "no content");
        assert_eq!(t.starts.load(Ordering::SeqCst), 2);
        assert_eq!(t.tables.load(Ordering::SeqCst), 2);
        assert_eq!(t.errors.load(Ordering::SeqCst), 1);
    }
}
