use mcqrag_core::traits::TextIndexer;
use mcqrag_core::types::{Chunk, SourceKind};
use mcqrag_text::TantivyIndexer;
use tempfile::TempDir;

fn chunk(doc: &str, idx: usize, text: &str) -> Chunk {
    Chunk {
        id: Chunk::make_id(doc, idx),
        doc_id: doc.to_string(),
        chunk_index: idx,
        char_start: idx * 100,
        char_end: idx * 100 + text.chars().count(),
        text: text.to_string(),
        title: Some(format!("Title {doc}")),
        section: (idx == 0).then(|| "Giới thiệu".to_string()),
        page: Some(idx + 1),
    }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk("d1", 0, "Giao thức TCP đảm bảo truyền dữ liệu tin cậy giữa hai máy."),
        chunk("d1", 1, "Giao thức UDP không đảm bảo thứ tự gói tin."),
        chunk("d2", 0, "Ma trận đơn vị có các phần tử trên đường chéo bằng một."),
    ]
}

#[test]
fn tantivy_index_search_and_count() {
    let tmp = TempDir::new().unwrap();
    let idx = TantivyIndexer::open(&tmp.path().join("tantivy")).expect("open");
    assert_eq!(idx.count().unwrap(), 0);

    idx.index(&corpus()).expect("index");
    assert_eq!(idx.count().unwrap(), 3);

    let hits = idx.search("TCP là gì?", 5).expect("search");
    assert!(!hits.is_empty());
    assert_eq!(hits[0].chunk.id, "d1:00000");
    assert_eq!(hits[0].source, SourceKind::Text);
    assert_eq!(hits[0].chunk.section.as_deref(), Some("Giới thiệu"));
    assert_eq!(hits[0].chunk.page, Some(1));
    assert_eq!(hits[0].chunk.title.as_deref(), Some("Title d1"));
    for w in hits.windows(2) {
        assert!(w[0].score >= w[1].score);
    }
}

#[test]
fn tantivy_tolerates_query_syntax_in_prose() {
    let idx = TantivyIndexer::in_memory().unwrap();
    idx.index(&corpus()).unwrap();
    let hits = idx.search("giao thức UDP (thứ tự", 5).expect("lenient search");
    assert!(hits.iter().any(|h| h.chunk.id == "d1:00001"));
}

#[test]
fn tantivy_clear_and_reopen() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("tantivy");
    {
        let idx = TantivyIndexer::open(&dir).unwrap();
        idx.index(&corpus()).unwrap();
    }
    let idx = TantivyIndexer::open(&dir).unwrap();
    assert_eq!(idx.count().unwrap(), 3);
    idx.clear().unwrap();
    assert_eq!(idx.count().unwrap(), 0);
    assert!(idx.search("giao thức", 5).unwrap().is_empty());
}
