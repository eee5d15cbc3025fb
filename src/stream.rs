//! Streaming structuring API: emit chunks as they are structured.
//!
//! [`crate::convert::convert`] waits for every chunk before mapping and
//! assembling. [`structure_stream`] instead yields each [`ChunkOutcome`] as
//! soon as its oracle call (or fallback) finishes, which suits progress
//! displays and callers that only want the annotated markup. Outcomes arrive
//! in completion order; sort by `sequence_index` to restore document order.

use crate::config::ConversionConfig;
use crate::error::Text2DocxError;
use crate::pipeline::chunking::Chunker;
use crate::pipeline::detect::{ChunkOutcome, StructureDetector};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of structured chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = ChunkOutcome> + Send>>;

/// Chunk `text` and structure the chunks concurrently, streaming outcomes.
///
/// When `is_markup` is true the oracle is bypassed and each chunk is parsed
/// as markup. Oracle setup problems are logged; per-chunk diagnostics
/// travel inside each outcome.
///
/// # Errors
/// [`Text2DocxError::EmptyInput`] when `text` has no visible content.
pub fn structure_stream(
    text: &str,
    is_markup: bool,
    config: &ConversionConfig,
) -> Result<ChunkStream, Text2DocxError> {
    if text.trim().is_empty() {
        return Err(Text2DocxError::EmptyInput);
    }
    let chunks = Chunker::new(config.chunk_threshold)
        .with_detection(config.heading_detection.clone())
        .split(text);
    let total = chunks.len();
    info!("Streaming structure for {} chunk(s)", total);

    let detector = Arc::new(StructureDetector::new(config).with_markup_input(is_markup));
    let concurrency = config.structuring.concurrency.max(1);

    let s = stream::iter(chunks.into_iter().map(move |chunk| {
        let detector = Arc::clone(&detector);
        async move { detector.detect_reported(&chunk, total).await }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}
