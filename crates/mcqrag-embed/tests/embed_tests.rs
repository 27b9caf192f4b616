use mcqrag_core::config::{EmbeddingBackend, EmbeddingSettings};
use mcqrag_embed::{build_embedder, FakeEmbedder};
use mcqrag_core::traits::Embedder;

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { backend: EmbeddingBackend::Fake, dim: 256, ..Default::default() };
    let embedder = build_embedder(&settings).expect("embedder");
    let texts = vec!["xin chào thế giới".to_string(), "xin chào thế giới".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");

    assert_eq!(embs.len(), 2);
    assert_eq!(embs[0].len(), 256);
    assert_eq!(embedder.dim(), 256);
    let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in embs[0].iter().zip(embs[1].iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn fake_embedder_similarity_tracks_token_overlap() {
    let e = FakeEmbedder::new(512);
    let q = e.embed_text("giao thức TCP");
    let near = e.embed_text("giao thức TCP tin cậy");
    let far = e.embed_text("ma trận đơn vị");
    assert!(cosine(&q, &near) > cosine(&q, &far));
}

#[test]
fn fake_embedder_handles_empty_text() {
    let e = FakeEmbedder::new(8);
    let v = e.embed_text("   ");
    assert_eq!(v.iter().filter(|x| **x != 0.0).count(), 1);
    assert!(e.embed_batch(&[]).unwrap().is_empty());
}
