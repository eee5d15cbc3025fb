//! Structure detection: oracle first, heuristic per chunk on failure.
//!
//! Each chunk is structured independently. The oracle is retried according
//! to the [`RetryPolicy`]; when it still fails, that chunk, and only that
//! chunk, is annotated by [`heuristic::annotate`]. Both paths end in
//! [`markup::parse`], so downstream stages cannot tell them apart.
//!
//! Chunks run concurrently (`buffer_unordered`, bounded by
//! `structuring.concurrency`); [`StructureDetector::detect_all`] sorts the
//! outcomes back into `sequence_index` order before returning.

use crate::config::{ConversionConfig, HeadingDetection, StructuringMode};
use crate::error::Diagnostic;
use crate::pipeline::chunking::Chunk;
use crate::progress::ProgressCallback;
use crate::structure::cleanup::{clean_oracle_output, preserves_content};
use crate::structure::oracle::{LlmOracle, OracleError, RetryPolicy, StructuringOracle};
use crate::structure::{heuristic, markup, StructuralNode};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Which path produced a chunk's structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuringPath {
    Oracle,
    Heuristic,
    /// The input was already markup; no structuring was needed.
    Markup,
}

/// Result of structuring one chunk.
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    pub sequence_index: usize,
    pub nodes: Vec<StructuralNode>,
    /// Annotated markup the nodes were parsed from.
    pub markup: String,
    pub path: StructuringPath,
    /// Oracle calls made (0 when the oracle was not consulted).
    pub attempts: u32,
    pub diagnostics: Vec<Diagnostic>,
    pub duration_ms: u64,
}

/// Structures chunks with the configured oracle and the heuristic fallback.
pub struct StructureDetector {
    oracle: Option<Arc<dyn StructuringOracle>>,
    setup_diagnostics: Vec<Diagnostic>,
    policy: RetryPolicy,
    timeout: Duration,
    model_hint: String,
    detection: HeadingDetection,
    concurrency: usize,
    markup_input: bool,
    progress: Option<ProgressCallback>,
}

impl StructureDetector {
    /// Resolve the oracle for this job.
    ///
    /// An injected oracle wins. Otherwise, in `auto` mode, an [`LlmOracle`]
    /// is built from the provider settings; when no provider can be resolved
    /// every chunk uses the heuristic and a single diagnostic says why.
    pub fn new(config: &ConversionConfig) -> Self {
        let s = &config.structuring;
        let mut setup_diagnostics = Vec::new();
        let oracle: Option<Arc<dyn StructuringOracle>> = match (s.mode, &s.oracle) {
            (StructuringMode::Heuristic, _) => None,
            (StructuringMode::Auto, Some(oracle)) => Some(Arc::clone(oracle)),
            (StructuringMode::Auto, None) => match LlmOracle::from_config(s) {
                Ok(o) => Some(Arc::new(o)),
                Err(e) => {
                    let d = match e {
                        OracleError::InvalidHint(detail) => Diagnostic::InvalidModelHint {
                            chunk: 0,
                            hint: s.model_hint().to_string(),
                            detail,
                        },
                        other => Diagnostic::OracleUnavailable {
                            chunk: 0,
                            attempts: 0,
                            detail: other.to_string(),
                        },
                    };
                    warn!("{d}; structuring every chunk heuristically");
                    setup_diagnostics.push(d);
                    None
                }
            },
        };
        if let Some(ref o) = oracle {
            debug!("Structuring oracle: {}", o.name());
        }
        Self {
            oracle,
            setup_diagnostics,
            policy: s.retry_policy(),
            timeout: s.timeout(),
            model_hint: s.model_hint().to_string(),
            detection: config.heading_detection.clone(),
            concurrency: s.concurrency.max(1),
            markup_input: false,
            progress: config.progress_callback.clone(),
        }
    }

    /// Treat chunk text as markup already: parse it, skip the oracle.
    pub fn with_markup_input(mut self, markup_input: bool) -> Self {
        self.markup_input = markup_input;
        self
    }

    /// Whether an oracle will be consulted.
    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some() && !self.markup_input
    }

    /// Diagnostics raised while resolving the oracle.
    pub fn setup_diagnostics(&self) -> &[Diagnostic] {
        &self.setup_diagnostics
    }

    /// Structure every chunk; outcomes come back in `sequence_index` order.
    pub async fn detect_all(&self, chunks: &[Chunk]) -> Vec<ChunkOutcome> {
        let total = chunks.len();
        if let Some(ref cb) = self.progress {
            cb.on_conversion_start(total);
        }
        let mut outcomes: Vec<ChunkOutcome> = stream::iter(
            chunks.iter().map(|chunk| self.detect_reported(chunk, total)),
        )
        .buffer_unordered(self.concurrency)
        .collect()
        .await;
        outcomes.sort_by_key(|o| o.sequence_index);

        let via_oracle = outcomes
            .iter()
            .filter(|o| o.path == StructuringPath::Oracle)
            .count();
        info!(
            "Structured {} chunk(s): {} by oracle, {} by fallback",
            total,
            via_oracle,
            total - via_oracle
        );
        if let Some(ref cb) = self.progress {
            cb.on_conversion_complete(total, via_oracle);
        }
        outcomes
    }

    pub(crate) async fn detect_reported(&self, chunk: &Chunk, total: usize) -> ChunkOutcome {
        if let Some(ref cb) = self.progress {
            cb.on_chunk_start(chunk.sequence_index, total);
        }
        let outcome = self.detect(chunk).await;
        if let Some(ref cb) = self.progress {
            if outcome.path == StructuringPath::Heuristic && outcome.attempts > 0 {
                let reason = outcome
                    .diagnostics
                    .first()
                    .map(|d| d.to_string())
                    .unwrap_or_default();
                cb.on_chunk_fallback(chunk.sequence_index, total, &reason);
            }
            cb.on_chunk_complete(
                chunk.sequence_index,
                total,
                outcome.path == StructuringPath::Oracle,
            );
        }
        outcome
    }

    /// Structure a single chunk.
    pub async fn detect(&self, chunk: &Chunk) -> ChunkOutcome {
        let start = Instant::now();
        let index = chunk.sequence_index;

        if self.markup_input {
            return self.outcome(chunk, chunk.text.clone(), StructuringPath::Markup, 0, vec![], start);
        }

        let oracle = match self.oracle {
            Some(ref o) if !chunk.text.trim().is_empty() => o,
            _ => return self.fallback(chunk, 0, vec![], start),
        };

        match self.call_oracle(oracle.as_ref(), chunk).await {
            Ok((annotated, attempts)) => {
                debug!("Chunk {index}: structured by {} in {attempts} attempt(s)", oracle.name());
                self.outcome(chunk, annotated, StructuringPath::Oracle, attempts, vec![], start)
            }
            Err((err, attempts)) => {
                let d = self.diagnostic_for(index, &err, attempts);
                warn!("{d}; using heuristic structure for this chunk");
                self.fallback(chunk, attempts, vec![d], start)
            }
        }
    }

    /// Call the oracle under the retry policy. Returns cleaned markup and
    /// the number of attempts, or the last error and the number of attempts.
    async fn call_oracle(
        &self,
        oracle: &dyn StructuringOracle,
        chunk: &Chunk,
    ) -> Result<(String, u32), (OracleError, u32)> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let call = oracle.annotate(&chunk.text, &self.model_hint, self.timeout);
            let result = match tokio::time::timeout(self.timeout, call).await {
                Ok(r) => r,
                Err(_) => Err(OracleError::Timeout(self.timeout)),
            };
            let err = match result {
                Ok(raw) => {
                    let cleaned = clean_oracle_output(&raw, &chunk.text);
                    if !cleaned.trim().is_empty() && preserves_content(&chunk.text, &cleaned) {
                        return Ok((cleaned, attempts));
                    }
                    OracleError::Unavailable("response dropped most of the input text".into())
                }
                Err(e) => e,
            };
            if !self.policy.should_retry(attempts, &err) {
                return Err((err, attempts));
            }
            let backoff = self.policy.backoff(attempts);
            warn!(
                "Chunk {}: attempt {}/{} failed ({err}); retrying in {}ms",
                chunk.sequence_index,
                attempts,
                self.policy.max_attempts,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }
    }

    fn diagnostic_for(&self, chunk: usize, err: &OracleError, attempts: u32) -> Diagnostic {
        match err {
            OracleError::Timeout(d) => Diagnostic::OracleTimeout {
                chunk,
                secs: d.as_secs(),
                attempts,
            },
            OracleError::InvalidHint(detail) => Diagnostic::InvalidModelHint {
                chunk,
                hint: self.model_hint.clone(),
                detail: detail.clone(),
            },
            OracleError::Unavailable(detail) => Diagnostic::OracleUnavailable {
                chunk,
                attempts,
                detail: detail.clone(),
            },
        }
    }

    fn fallback(
        &self,
        chunk: &Chunk,
        attempts: u32,
        diagnostics: Vec<Diagnostic>,
        start: Instant,
    ) -> ChunkOutcome {
        let annotated = heuristic::annotate(&chunk.text, &self.detection);
        self.outcome(
            chunk,
            annotated,
            StructuringPath::Heuristic,
            attempts,
            diagnostics,
            start,
        )
    }

    fn outcome(
        &self,
        chunk: &Chunk,
        annotated: String,
        path: StructuringPath,
        attempts: u32,
        diagnostics: Vec<Diagnostic>,
        start: Instant,
    ) -> ChunkOutcome {
        ChunkOutcome {
            sequence_index: chunk.sequence_index,
            nodes: markup::parse(&annotated),
            markup: annotated,
            path,
            attempts,
            diagnostics,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::chunking::split_into_chunks;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Oracle that fails its first `failures` calls, then echoes with `# `.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        error: OracleError,
    }

    impl StructuringOracle for Flaky {
        fn annotate<'a>(
            &'a self,
            text: &'a str,
            _hint: &'a str,
            _timeout: Duration,
        ) -> BoxFuture<'a, Result<String, OracleError>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok(format!("# {}", text.trim()))
            };
            Box::pin(async move { result })
        }
    }

    fn detector(oracle: Arc<dyn StructuringOracle>, retries: u32) -> StructureDetector {
        let config = ConversionConfig::builder()
            .oracle(oracle)
            .max_retries(retries)
            .retry_backoff_ms(1)
            .max_backoff_ms(2)
            .build()
            .unwrap();
        StructureDetector::new(&config)
    }

    fn chunk(text: &str) -> Chunk {
        split_into_chunks(text, 10_000).remove(0)
    }

    #[tokio::test]
    async fn oracle_success_after_retry() {
        let oracle = Arc::new(Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
            error: OracleError::Unavailable("503".into()),
        });
        let d = detector(oracle.clone(), 3);
        let out = d.detect(&chunk("Intro")).await;
        assert_eq!(out.path, StructuringPath::Oracle);
        assert_eq!(out.attempts, 3);
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.nodes, vec![StructuralNode::heading(1, "Intro")]);
    }

    #[tokio::test]
    async fn retries_are_bounded_then_heuristic() {
        let oracle = Arc::new(Flaky {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            error: OracleError::Unavailable("503".into()),
        });
        let d = detector(oracle.clone(), 2);
        let out = d.detect(&chunk("Chapter 1\n\nText here.")).await;
        assert_eq!(out.path, StructuringPath::Heuristic);
        assert_eq!(out.attempts, 3);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            out.diagnostics[..],
            [Diagnostic::OracleUnavailable { attempts: 3, .. }]
        ));
        assert_eq!(out.nodes[0], StructuralNode::heading(1, "Chapter 1"));
    }

    #[tokio::test]
    async fn invalid_hint_is_not_retried() {
        let oracle = Arc::new(Flaky {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            error: OracleError::InvalidHint("no such model".into()),
        });
        let d = detector(oracle.clone(), 5);
        let out = d.detect(&chunk("Hello.")).await;
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            out.diagnostics[..],
            [Diagnostic::InvalidModelHint { .. }]
        ));
    }

    #[tokio::test]
    async fn heuristic_mode_never_calls_oracle() {
        let oracle = Arc::new(Flaky {
            failures: 0,
            calls: AtomicU32::new(0),
            error: OracleError::Unavailable("x".into()),
        });
        let config = ConversionConfig::builder()
            .oracle(oracle.clone())
            .mode(StructuringMode::Heuristic)
            .build()
            .unwrap();
        let d = StructureDetector::new(&config);
        let out = d.detect(&chunk("Hello.")).await;
        assert_eq!(out.path, StructuringPath::Heuristic);
        assert_eq!(out.attempts, 0);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
        assert!(d.setup_diagnostics().is_empty());
    }

    #[tokio::test]
    async fn markup_input_bypasses_oracle() {
        let oracle = Arc::new(Flaky {
            failures: 0,
            calls: AtomicU32::new(0),
            error: OracleError::Unavailable("x".into()),
        });
        let d = detector(oracle.clone(), 0).with_markup_input(true);
        let out = d.detect(&chunk("## Part\n\n- a")).await;
        assert_eq!(out.path, StructuringPath::Markup);
        assert_eq!(out.nodes[0], StructuralNode::heading(2, "Part"));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn summarising_response_is_rejected() {
        struct Summariser;
        impl StructuringOracle for Summariser {
            fn annotate<'a>(
                &'a self,
                _text: &'a str,
                _hint: &'a str,
                _timeout: Duration,
            ) -> BoxFuture<'a, Result<String, OracleError>> {
                Box::pin(async { Ok("A summary.".to_string()) })
            }
        }
        let d = detector(Arc::new(Summariser), 0);
        let text = "This is a long paragraph with a great many words in it, all of which matter.";
        let out = d.detect(&chunk(text)).await;
        assert_eq!(out.path, StructuringPath::Heuristic);
        assert_eq!(out.nodes, vec![StructuralNode::paragraph(text)]);
    }

    #[tokio::test]
    async fn detect_all_restores_order() {
        let oracle = Arc::new(Flaky {
            failures: 0,
            calls: AtomicU32::new(0),
            error: OracleError::Unavailable("x".into()),
        });
        let d = detector(oracle, 0);
        let chunks = split_into_chunks("One\n\nTwo\n\nThree\n\nFour", 6);
        let outcomes = d.detect_all(&chunks).await;
        let order: Vec<usize> = outcomes.iter().map(|o| o.sequence_index).collect();
        assert_eq!(order, (0..chunks.len()).collect::<Vec<_>>());
    }
}
