use rageval_vector::hierarchy::{assemble_parent, candidate_limit, select_parents, ChunkHit};

fn hit(doc: &str, index: usize, score: f32) -> ChunkHit {
    ChunkHit {
        id: format!("{}:{}", doc, index),
        doc_id: doc.to_string(),
        doc_path: format!("/corpus/{}.txt", doc),
        category: "misc".to_string(),
        content: format!("{} part {}", doc, index),
        chunk_index: index,
        score,
    }
}

#[test]
fn select_parents_keeps_first_hit_order_and_caps_at_k() {
    let hits = vec![hit("a", 2, 0.9), hit("b", 0, 0.8), hit("a", 0, 0.7), hit("c", 1, 0.6)];
    let parents = select_parents(&hits, 2);

    assert_eq!(parents.len(), 2);
    assert_eq!(parents[0].doc_id, "a");
    assert_eq!(parents[0].matched, vec!["a:2".to_string(), "a:0".to_string()]);
    assert!((parents[0].score - 0.9).abs() < 1e-6);
    assert_eq!(parents[1].doc_id, "b");
}

#[test]
fn assemble_parent_orders_siblings_by_index() {
    let parent = select_parents(&[hit("a", 1, 0.5)], 1).remove(0);
    let doc = assemble_parent(parent, vec![hit("a", 1, 0.0), hit("a", 0, 0.0), hit("a", 1, 0.0)]);

    assert_eq!(doc.text, "a part 0\n\na part 1");
    assert_eq!(doc.score, Some(0.5));
    assert_eq!(doc.extra["chunk_count"], 2);
}

#[test]
fn candidate_limit_saturates_for_huge_k() {
    assert_eq!(candidate_limit(3), 12);
    assert_eq!(candidate_limit(usize::MAX), usize::MAX);
    assert_eq!(candidate_limit(usize::MAX / 2), usize::MAX);
}
