//! Progress-callback trait for per-chunk structuring events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the detector structures each chunk.
//!
//! # Example
//!
//! ```rust
//! use edgequake_text2docx::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, Mutex};
//!
//! /// Remembers why chunks fell back to the heuristic.
//! #[derive(Default)]
//! struct FallbackLog(Mutex<Vec<(usize, String)>>);
//!
//! impl ConversionProgressCallback for FallbackLog {
//!     fn on_chunk_fallback(&self, index: usize, _total: usize, reason: &str) {
//!         if let Ok(mut log) = self.0.lock() {
//!             log.push((index, reason.to_string()));
//!         }
//!     }
//! }
//!
//! let log = Arc::new(FallbackLog::default());
//! let config = ConversionConfig::builder()
//!     .progress_callback(log.clone())
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the structure detector as it processes each chunk.
///
/// Chunks are structured concurrently, so `on_chunk_start`,
/// `on_chunk_complete` and `on_chunk_fallback` may be called from several
/// tasks at once and in any order. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, before any chunk is structured.
    fn on_conversion_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called before the first oracle attempt for a chunk.
    ///
    /// `index` is the 0-based `sequence_index`.
    fn on_chunk_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when the oracle gave up on a chunk and the heuristic took over.
    fn on_chunk_fallback(&self, index: usize, total: usize, reason: &str) {
        let _ = (index, total, reason);
    }

    /// Called when a chunk has its structure, by whichever path.
    fn on_chunk_complete(&self, index: usize, total: usize, used_oracle: bool) {
        let _ = (index, total, used_oracle);
    }

    /// Called once after every chunk is structured.
    ///
    /// `oracle_chunks` counts the chunks the oracle structured.
    fn on_conversion_complete(&self, total_chunks: usize, oracle_chunks: usize) {
        let _ = (total_chunks, oracle_chunks);
    }
}

/// A no-op implementation, the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConversionConfig, StructuringMode};
    use crate::pipeline::chunking::Chunker;
    use crate::pipeline::detect::StructureDetector;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        total: AtomicUsize,
        started: AtomicUsize,
        via_oracle: AtomicUsize,
        finished: AtomicUsize,
    }

    impl ConversionProgressCallback for Recorder {
        fn on_conversion_start(&self, total_chunks: usize) {
            self.total.store(total_chunks, Ordering::SeqCst);
        }

        fn on_chunk_start(&self, _index: usize, _total: usize) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_complete(&self, _index: usize, _total: usize, used_oracle: bool) {
            if used_oracle {
                self.via_oracle.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_conversion_complete(&self, total_chunks: usize, _oracle_chunks: usize) {
            self.finished.store(total_chunks, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn detector_reports_every_chunk() {
        let recorder = Arc::new(Recorder::default());
        let config = ConversionConfig::builder()
            .mode(StructuringMode::Heuristic)
            .chunk_threshold(20)
            .progress_callback(recorder.clone())
            .build()
            .unwrap();
        let chunks = Chunker::new(20).split("A first paragraph.\n\nAnd a second one.");
        StructureDetector::new(&config).detect_all(&chunks).await;

        assert_eq!(recorder.total.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.started.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.via_oracle.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn default_methods_are_no_ops() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_conversion_start(1);
        cb.on_chunk_fallback(0, 1, "timeout");
        cb.on_conversion_complete(1, 0);
    }
}
