use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use serde_json::json;

use rageval_core::traits::{Inferencer, QuestionSource, Reranker, VectorStore};
use rageval_core::types::{Chunk, Document, EmbeddingMetadata, InferenceMetadata, Question, SearchMetadata, SearchResponse};
use rageval_retriever::Retriever;

struct FixedQuestions(Vec<Question>);

impl QuestionSource for FixedQuestions {
    fn read_all(&self, _path: &Path) -> anyhow::Result<Vec<Question>> { Ok(self.0.clone()) }
}

#[derive(Default)]
struct ScriptedStore {
    responses: Mutex<VecDeque<SearchResponse>>,
    calls: Arc<Mutex<Vec<(String, usize, bool)>>>,
}

impl ScriptedStore {
    fn new(responses: Vec<SearchResponse>) -> Self {
        Self { responses: Mutex::new(responses.into()), calls: Arc::default() }
    }
}

impl VectorStore for ScriptedStore {
    fn search(&self, chunk: &Chunk, k: usize, hierarchical: bool) -> anyhow::Result<SearchResponse> {
        self.calls.lock().unwrap().push((chunk.data.clone(), k, hierarchical));
        self.responses.lock().unwrap().pop_front().ok_or_else(|| anyhow!("no scripted response"))
    }
}

#[derive(Default)]
struct ScriptedInferencer {
    answers: Mutex<VecDeque<(InferenceMetadata, String)>>,
    calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl ScriptedInferencer {
    fn new(answers: Vec<(InferenceMetadata, String)>) -> Self {
        Self { answers: Mutex::new(answers.into()), calls: Arc::default() }
    }
}

impl Inferencer for ScriptedInferencer {
    fn generate(&self, question: &str, documents: &[Document]) -> anyhow::Result<(InferenceMetadata, String)> {
        self.calls.lock().unwrap().push((question.to_string(), documents.iter().map(|d| d.text.clone()).collect()));
        self.answers.lock().unwrap().pop_front().ok_or_else(|| anyhow!("no scripted answer"))
    }
}

/// Reverses documents and records what it was given.
#[derive(Default)]
struct ReversingReranker {
    calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl Reranker for ReversingReranker {
    fn rerank(&self, query: &str, mut documents: Vec<Document>) -> anyhow::Result<Vec<Document>> {
        self.calls.lock().unwrap().push((query.to_string(), documents.iter().map(|d| d.text.clone()).collect()));
        documents.reverse();
        Ok(documents)
    }
}

fn docs(texts: &[&str]) -> Vec<Document> {
    texts.iter().map(|t| Document::from_text(*t)).collect()
}

fn question() -> Question { Question::new("What is X?", "X is Y") }

fn retriever(questions: Vec<Question>, store: ScriptedStore, inferencer: ScriptedInferencer) -> Retriever {
    Retriever::new(Box::new(FixedQuestions(questions)), Box::new(store), Box::new(inferencer))
}

#[test]
fn normal_path_without_reranker() {
    let store = ScriptedStore::new(vec![SearchResponse::ok(docs(&["X is Y because..."]), SearchMetadata::default())]);
    let inferencer = ScriptedInferencer::new(vec![(InferenceMetadata::default(), "X is Y".into())]);

    let items = retriever(vec![question()], store, inferencer).retrieve(Path::new("q.json"), "", 3, false).unwrap();

    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.question, "What is X?");
    assert_eq!(item.answer, "X is Y");
    assert_eq!(item.reference_contexts, vec!["X is Y because...".to_string()]);
    assert!(!item.guardrails_blocked);
    assert_eq!(item.gt_answer, "X is Y");
    assert!(item.answer_metadata.is_empty());
    assert!(item.query_metadata.is_none());
    assert!(item.guardrails_output_assessment.is_none());
    assert!(item.guardrails_context_assessment.is_none());
    assert!(item.guardrails_input_assessment.is_none());
}

#[test]
fn blocked_path_uses_guardrail_output() {
    let mut metadata = SearchMetadata::default();
    metadata.guardrail_output = Some("blocked".into());
    metadata.guardrail_blocked = Some(true);
    let store = ScriptedStore::new(vec![SearchResponse::blocked(metadata)]);
    let inferencer = ScriptedInferencer::default();
    let inferencer_calls = inferencer.calls.clone();

    let items = retriever(vec![question()], store, inferencer).retrieve(Path::new("q.json"), "", 3, false).unwrap();

    let item = &items[0];
    assert_eq!(item.answer, "blocked");
    assert!(item.guardrails_blocked);
    assert!(item.reference_contexts.is_empty());
    assert!(item.answer_metadata.is_empty());
    assert!(item.guardrails_output_assessment.is_none());
    assert!(inferencer_calls.lock().unwrap().is_empty(), "inferencer is skipped on the blocked path");
}

#[test]
fn blocked_path_without_blocked_flag_defaults_false() {
    let mut metadata = SearchMetadata::default();
    metadata.guardrail_output = Some("short-circuited".into());
    let store = ScriptedStore::new(vec![SearchResponse::blocked(metadata)]);

    let items = retriever(vec![question()], store, ScriptedInferencer::default()).retrieve(Path::new("q.json"), "", 1, false).unwrap();

    assert_eq!(items[0].answer, "short-circuited");
    assert!(!items[0].guardrails_blocked);
}

#[test]
fn blocked_path_without_guardrail_output_is_an_error() {
    let store = ScriptedStore::new(vec![SearchResponse::blocked(SearchMetadata::default())]);
    let err = retriever(vec![question()], store, ScriptedInferencer::default())
        .retrieve(Path::new("q.json"), "", 1, false)
        .unwrap_err();
    assert!(err.to_string().contains("guardrail_output"), "{err}");
}

#[test]
fn reranker_sees_question_text_and_raw_documents() {
    let store = ScriptedStore::new(vec![SearchResponse::ok(docs(&["a", "b", "c"]), SearchMetadata::default())]);
    let inferencer = ScriptedInferencer::new(vec![(InferenceMetadata::default(), "ans".into())]);
    let inferencer_calls = inferencer.calls.clone();
    let reranker = ReversingReranker::default();
    let rerank_calls = reranker.calls.clone();

    let items = retriever(vec![question()], store, inferencer)
        .with_reranker(Box::new(reranker))
        .retrieve(Path::new("q.json"), "ignored query", 3, false)
        .unwrap();

    let rerank_calls = rerank_calls.lock().unwrap();
    assert_eq!(rerank_calls.len(), 1);
    assert_eq!(rerank_calls[0].0, "What is X?");
    assert_eq!(rerank_calls[0].1, vec!["a", "b", "c"]);
    assert_eq!(inferencer_calls.lock().unwrap()[0].1, vec!["c", "b", "a"], "inferencer receives reranked docs");
    assert_eq!(items[0].reference_contexts, vec!["c", "b", "a"]);
}

#[test]
fn reranker_is_skipped_on_blocked_path() {
    let mut metadata = SearchMetadata::default();
    metadata.guardrail_output = Some("no".into());
    let store = ScriptedStore::new(vec![SearchResponse { status: false, result: docs(&["x"]), metadata }]);
    let reranker = ReversingReranker::default();
    let rerank_calls = reranker.calls.clone();

    let items = retriever(vec![question()], store, ScriptedInferencer::default())
        .with_reranker(Box::new(reranker))
        .retrieve(Path::new("q.json"), "", 1, false)
        .unwrap();

    assert!(rerank_calls.lock().unwrap().is_empty());
    assert_eq!(items[0].reference_contexts, vec!["x"]);
}

#[test]
fn output_preserves_question_order_and_forwards_search_args() {
    let questions: Vec<Question> = (0..4).map(|i| Question::new(format!("q{i}"), format!("a{i}"))).collect();
    let store = ScriptedStore::new((0..4).map(|i| SearchResponse::ok(docs(&[format!("ctx{i}").as_str()]), SearchMetadata::default())).collect());
    let store_calls = store.calls.clone();
    let inferencer = ScriptedInferencer::new((0..4).map(|i| (InferenceMetadata::default(), format!("gen{i}"))).collect());

    let items = retriever(questions, store, inferencer).retrieve(Path::new("q.json"), "", 7, true).unwrap();

    assert_eq!(items.len(), 4);
    for (i, item) in items.iter().enumerate() {
        assert_eq!(item.question, format!("q{i}"));
        assert_eq!(item.gt_answer, format!("a{i}"));
        assert_eq!(item.answer, format!("gen{i}"));
        assert_eq!(item.reference_contexts, vec![format!("ctx{i}")]);
    }
    let calls = store_calls.lock().unwrap();
    assert_eq!(calls[2], ("q2".to_string(), 7, true));
}

#[test]
fn assessments_come_from_their_own_collaborators() {
    let mut search_meta = SearchMetadata::default();
    search_meta.guardrail_context_assessment = Some(vec![json!({"action": "NONE", "source": "CONTEXT"})]);
    search_meta.guardrail_input_assessment = Some(vec![json!({"action": "NONE", "source": "INPUT"})]);
    // ignored on the normal path
    search_meta.guardrail_blocked = Some(true);
    search_meta.embedding_metadata = Some(EmbeddingMetadata {
        embedder_id: "hash:xxh64:d64".into(),
        dim: 64,
        input_chars: 10,
        latency_ms: 1,
        knn: 2,
        hierarchical: false,
    });
    let store = ScriptedStore::new(vec![SearchResponse::ok(docs(&["ctx"]), search_meta)]);

    let mut inf_meta = InferenceMetadata::default();
    inf_meta.guardrail_blocked = Some(true);
    inf_meta.guardrail_output_assessment = Some(vec![json!({"action": "BLOCKED", "source": "OUTPUT"})]);
    inf_meta.insert("model", "m1");
    let inferencer = ScriptedInferencer::new(vec![(inf_meta, "redacted".into())]);

    let items = retriever(vec![question()], store, inferencer).retrieve(Path::new("q.json"), "", 2, false).unwrap();
    let item = &items[0];

    assert!(item.guardrails_blocked);
    assert_eq!(item.guardrails_output_assessment.as_ref().unwrap()[0]["source"], "OUTPUT");
    assert_eq!(item.guardrails_context_assessment.as_ref().unwrap()[0]["source"], "CONTEXT");
    assert_eq!(item.guardrails_input_assessment.as_ref().unwrap()[0]["source"], "INPUT");
    assert_eq!(item.answer_metadata["model"], "m1");
    assert_eq!(item.answer_metadata["guardrail_blocked"], true);
    let query_meta = item.query_metadata.as_ref().expect("query metadata");
    assert_eq!(query_meta["embedder_id"], "hash:xxh64:d64");
    assert_eq!(query_meta["knn"], 2);
}

#[test]
fn normal_path_blocked_flag_ignores_search_metadata() {
    let mut search_meta = SearchMetadata::default();
    search_meta.guardrail_blocked = Some(true);
    let store = ScriptedStore::new(vec![SearchResponse::ok(vec![], search_meta)]);
    let inferencer = ScriptedInferencer::new(vec![(InferenceMetadata::default(), "none".into())]);

    let items = retriever(vec![question()], store, inferencer).retrieve(Path::new("q.json"), "", 2, false).unwrap();

    assert!(!items[0].guardrails_blocked);
    assert!(items[0].reference_contexts.is_empty());
}

#[test]
fn collaborator_errors_abort_the_batch() {
    let store = ScriptedStore::new(vec![SearchResponse::ok(docs(&["a"]), SearchMetadata::default())]);
    let inferencer = ScriptedInferencer::new(vec![(InferenceMetadata::default(), "first".into())]);
    let questions = vec![Question::new("q0", "a0"), Question::new("q1", "a1")];

    let result = retriever(questions, store, inferencer).retrieve(Path::new("q.json"), "", 1, false);
    assert!(result.is_err(), "second search has no scripted response");
}

#[test]
fn zero_knn_is_rejected_before_searching() {
    let store = ScriptedStore::default();
    let store_calls = store.calls.clone();
    let result = retriever(vec![question()], store, ScriptedInferencer::default()).retrieve(Path::new("q.json"), "", 0, false);
    assert!(result.is_err());
    assert!(store_calls.lock().unwrap().is_empty());
}

#[test]
fn items_serialize_with_every_key() {
    let store = ScriptedStore::new(vec![SearchResponse::ok(docs(&["ctx"]), SearchMetadata::default())]);
    let inferencer = ScriptedInferencer::new(vec![(InferenceMetadata::default(), "ans".into())]);
    let items = retriever(vec![question()], store, inferencer).retrieve(Path::new("q.json"), "", 1, false).unwrap();

    let value = serde_json::to_value(&items[0]).unwrap();
    let obj = value.as_object().unwrap();
    for key in [
        "question", "answer", "guardrails_output_assessment", "guardrails_context_assessment",
        "guardrails_input_assessment", "guardrails_blocked", "answer_metadata", "query_metadata",
        "reference_contexts", "gt_answer",
    ] {
        assert!(obj.contains_key(key), "missing {key}");
    }
    assert_eq!(obj.len(), 10);
    assert!(obj["query_metadata"].is_null());
}

#[test]
fn reads_questions_from_a_real_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("questions.json");
    std::fs::write(&path, r#"[{"question":"What is X?","answer":"X is Y"}]"#).unwrap();
    let store = ScriptedStore::new(vec![SearchResponse::ok(docs(&["X is Y because..."]), SearchMetadata::default())]);
    let inferencer = ScriptedInferencer::new(vec![(InferenceMetadata::default(), "X is Y".into())]);

    let retriever = Retriever::new(Box::new(rageval_core::reader::JsonReader::new()), Box::new(store), Box::new(inferencer));
    let items = retriever.retrieve(&path, "", 1, false).unwrap();
    assert_eq!(items[0].gt_answer, "X is Y");

    assert!(retriever.retrieve(&tmp.path().join("missing.json"), "", 1, false).is_err());
}
