use super::*;
use std::path::PathBuf;

fn test_config(chunk_size: usize, chunk_overlap: usize) -> RetrievalConfig {
    RetrievalConfig {
        chunk_size,
        chunk_overlap,
        top_k: 5,
    }
}

fn doc(content: &str) -> SourceDocument {
    SourceDocument::new(PathBuf::from("data/docs/test.md"), content)
}

#[test]
fn small_document_is_a_single_chunk() {
    let document = doc("Rice grows well in warm climates.");
    let chunks = split_document(&document, &test_config(1200, 150));

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, "Rice grows well in warm climates.");
    assert_eq!(chunks[0].offset, 0);
    assert_eq!(chunks[0].chunk_index, 0);
    assert_eq!(chunks[0].source, "data/docs/test.md");
}

#[test]
fn empty_and_whitespace_documents_yield_no_chunks() {
    assert!(split_document(&doc(""), &test_config(1200, 150)).is_empty());
    assert!(split_document(&doc("   \n\n  "), &test_config(1200, 150)).is_empty());
}

#[test]
fn chunks_respect_the_size_budget() {
    let paragraph = "wheat irrigation schedule advice ".repeat(40);
    let document = doc(&paragraph);
    let config = test_config(200, 20);

    let chunks = split_document(&document, &config);
    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(
            chunk.content.len() <= config.chunk_size,
            "chunk of {} chars exceeds budget",
            chunk.content.len()
        );
        assert!(!chunk.content.trim().is_empty());
    }
}

#[test]
fn splits_prefer_heading_boundaries() {
    // The first section nearly fills the budget so the second heading must
    // start a fresh chunk
    let content = format!(
        "## Planting\n{}\n## Irrigation\n{}",
        "plant early in spring. ".repeat(12),
        "water deeply but infrequently. ".repeat(12)
    );
    let document = doc(&content);

    let chunks = split_document(&document, &test_config(300, 0));
    assert!(chunks.len() >= 2);
    assert!(chunks[0].content.starts_with("## Planting"));
    assert!(chunks
        .iter()
        .any(|c| c.content.starts_with("## Irrigation")));
}

#[test]
fn adjacent_chunks_overlap() {
    let paragraph = "soil nitrogen phosphorus potassium balance ".repeat(30);
    let document = doc(&paragraph);
    let config = test_config(200, 50);

    let chunks = split_document(&document, &config);
    assert!(chunks.len() > 1);
    for pair in chunks.windows(2) {
        let prev_end = pair[0].offset + pair[0].content.len();
        assert!(
            pair[1].offset < prev_end,
            "expected chunk at offset {} to overlap previous chunk ending at {}",
            pair[1].offset,
            prev_end
        );
    }
}

#[test]
fn offsets_locate_chunks_in_the_source() {
    let content = format!(
        "## Varieties\n{}\n## Harvest\n{}",
        "long grain and short grain. ".repeat(15),
        "harvest when moisture drops. ".repeat(15)
    );
    let document = doc(&content);

    let chunks = split_document(&document, &test_config(250, 30));
    for chunk in &chunks {
        let tail = document
            .content
            .get(chunk.offset..)
            .expect("offset should be a valid boundary");
        assert!(
            tail.starts_with(&chunk.content),
            "chunk at offset {} does not match the source",
            chunk.offset
        );
    }
}

#[test]
fn chunk_indices_increment() {
    let paragraph = "crop rotation keeps the soil healthy over seasons ".repeat(30);
    let document = doc(&paragraph);

    let chunks = split_document(&document, &test_config(200, 20));
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i as u32);
    }
}

#[test]
fn oversized_unseparated_text_is_hard_split() {
    // No separators at all: a single long token
    let content = "x".repeat(500);
    let document = doc(&content);
    let config = test_config(120, 0);

    let chunks = split_document(&document, &config);
    assert!(chunks.len() >= 4);
    for chunk in &chunks {
        assert!(chunk.content.len() <= config.chunk_size);
    }
}
