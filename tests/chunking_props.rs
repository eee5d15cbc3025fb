//! Property tests for the chunker.

use edgequake_text2docx::pipeline::chunking::{reassemble, Chunker};
use edgequake_text2docx::{structure_stream, ConversionConfig, StructuringMode};
use futures::StreamExt;
use proptest::prelude::*;

/// Vowel-free words (never a heading keyword), line breaks and blank lines,
/// with the odd word longer than the threshold.
fn manuscript() -> impl Strategy<Value = String> {
    let token = prop_oneof![
        6 => "[b-df-hj-np-tv-zß]{1,9}".prop_map(|w| format!("{w} ")),
        1 => Just("\n".to_string()),
        1 => Just("\n\n".to_string()),
        1 => "[b-df-hj-np-tv-z]{30,60}".prop_map(|w| format!("{w} ")),
    ];
    prop::collection::vec(token, 0..300).prop_map(|t| t.concat())
}

/// Like [`manuscript`], with markdown and chapter-keyword heading lines.
fn manuscript_with_headings() -> impl Strategy<Value = String> {
    let token = prop_oneof![
        6 => "[b-df-hj-np-tv-z]{1,9}".prop_map(|w| format!("{w} ")),
        1 => Just("\n".to_string()),
        1 => Just("\n\n".to_string()),
        1 => "[b-df-hj-np-tv-z]{1,9}".prop_map(|w| format!("\n# {w}\n")),
        1 => (1u32..40).prop_map(|n| format!("\nChapter {n}\n")),
    ];
    prop::collection::vec(token, 0..300).prop_map(|t| t.concat())
}

/// Byte ranges of heading lines, without their line break.
fn heading_lines(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut pos = 0;
    for line in text.split_inclusive('\n') {
        let body = line.trim_end_matches('\n');
        if body.starts_with("# ") || body.starts_with("Chapter ") {
            spans.push((pos, pos + body.len()));
        }
        pos += line.len();
    }
    spans
}

proptest! {
    #[test]
    fn heading_lines_are_never_split(text in manuscript_with_headings(), threshold in 5usize..200) {
        let chunks = Chunker::new(threshold).split(&text);
        prop_assert_eq!(reassemble(&chunks), text.clone());
        let headings = heading_lines(&text);
        for chunk in chunks.iter().skip(1) {
            let cut = chunk.offset;
            for &(start, end) in &headings {
                prop_assert!(
                    cut <= start || cut >= end,
                    "boundary {} splits heading {:?}", cut, &text[start..end]
                );
            }
        }
    }

    #[test]
    fn chunking_is_lossless(text in manuscript(), threshold in 5usize..200) {
        let chunks = Chunker::new(threshold).split(&text);
        prop_assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn chunks_respect_the_threshold(text in manuscript(), threshold in 5usize..200) {
        for chunk in Chunker::new(threshold).split(&text) {
            prop_assert!(chunk.char_len() <= threshold, "{} > {}", chunk.char_len(), threshold);
        }
    }

    #[test]
    fn sequence_indices_are_contiguous(text in manuscript(), threshold in 5usize..200) {
        let chunks = Chunker::new(threshold).split(&text);
        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.sequence_index, i);
            prop_assert_eq!(&text[chunk.offset..chunk.offset + chunk.text.len()], chunk.text.as_str());
        }
    }
}

#[test]
fn over_long_heading_line_is_the_only_oversized_chunk() {
    let heading = "Chapter Twelve and the Long Road Home";
    let text = format!("{heading}\nbody words follow the heading line here");
    let chunks = Chunker::new(20).split(&text);
    assert_eq!(reassemble(&chunks), text);
    let oversized: Vec<_> = chunks.iter().filter(|c| c.char_len() > 20).collect();
    assert_eq!(oversized.len(), 1);
    assert!(oversized[0].text.starts_with("Chapter"));
}

#[test]
fn stream_yields_one_outcome_per_chunk() {
    let config = ConversionConfig::builder()
        .mode(StructuringMode::Heuristic)
        .chunk_threshold(25)
        .build()
        .unwrap();
    let text = "One short paragraph.\n\nAnother short one.\n\nA third.";
    let expected = Chunker::new(25).split(text).len();
    let outcomes: Vec<_> =
        tokio_test::block_on(structure_stream(text, false, &config).unwrap().collect());
    assert_eq!(outcomes.len(), expected);
}
