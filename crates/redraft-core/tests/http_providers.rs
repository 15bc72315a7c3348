use std::sync::Arc;
use std::time::Duration;

use redraft_core::fakes::FixedReadability;
use redraft_core::{
    GrammarChecker, LanguageToolChecker, OllamaEmbeddingSimilarity, OllamaOracle, OracleError,
    RewardEvaluator, RewriteOracle, ScorerError, SimilarityScorer,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn oracle(server: &MockServer) -> OllamaOracle {
    OllamaOracle::new(server.uri(), "mistral", Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn oracle_posts_non_streaming_generate_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({ "model": "mistral", "stream": false })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "response": "  A clearer sentence.\n", "done": true })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let rewrite = oracle(&server).rewrite("A sentence, unclear.").await.unwrap();
    assert_eq!(rewrite, "A clearer sentence.");
}

#[tokio::test]
async fn oracle_prompt_contains_the_draft() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("The rain fell sideways."))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    oracle(&server).rewrite("The rain fell sideways.").await.unwrap();
}

#[tokio::test]
async fn oracle_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let err = oracle(&server).rewrite("text").await.unwrap_err();
    match err {
        OracleError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "model not loaded");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn oracle_blank_response_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "  \n " })))
        .mount(&server)
        .await;

    let err = oracle(&server).rewrite("text").await.unwrap_err();
    assert!(matches!(err, OracleError::EmptyResponse));
}

#[tokio::test]
async fn oracle_malformed_body_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "wrong field" })))
        .mount(&server)
        .await;

    let err = oracle(&server).rewrite("text").await.unwrap_err();
    assert!(matches!(err, OracleError::Malformed(_)));
}

#[tokio::test]
async fn oracle_request_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "response": "late" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let oracle = OllamaOracle::new(server.uri(), "mistral", Duration::from_millis(200)).unwrap();
    let err = oracle.rewrite("text").await.unwrap_err();
    assert!(matches!(err, OracleError::Timeout(_)));
}

#[tokio::test]
async fn embedding_similarity_is_cosine_of_both_vectors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_partial_json(json!({ "prompt": "reference text" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": [1.0, 0.0] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_partial_json(json!({ "prompt": "candidate text" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": [0.6, 0.8] })))
        .mount(&server)
        .await;

    let scorer =
        OllamaEmbeddingSimilarity::new(server.uri(), "all-minilm", Duration::from_secs(5)).unwrap();
    let similarity = scorer
        .similarity("candidate text", "reference text")
        .await
        .unwrap();
    assert!((similarity - 0.6).abs() < 1e-9);
}

#[tokio::test]
async fn reference_is_embedded_once_across_evaluations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_partial_json(json!({ "prompt": "reference text" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": [1.0, 0.0] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_partial_json(json!({ "prompt": "first candidate" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": [0.6, 0.8] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_partial_json(json!({ "prompt": "second candidate" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": [0.0, 1.0] })))
        .expect(1)
        .mount(&server)
        .await;

    let scorer =
        OllamaEmbeddingSimilarity::new(server.uri(), "all-minilm", Duration::from_secs(5)).unwrap();
    let first = scorer
        .similarity("first candidate", "reference text")
        .await
        .unwrap();
    let second = scorer
        .similarity("second candidate", "reference text")
        .await
        .unwrap();
    assert!((first - 0.6).abs() < 1e-9);
    assert_eq!(second, 0.0);
    server.verify().await;
}

#[tokio::test]
async fn changed_reference_is_embedded_again() {
    let server = MockServer::start().await;
    for (prompt, embedding) in [
        ("old reference", json!([1.0, 0.0])),
        ("new reference", json!([0.0, 1.0])),
        ("candidate", json!([0.0, 1.0])),
    ] {
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .and(body_partial_json(json!({ "prompt": prompt })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": embedding })))
            .mount(&server)
            .await;
    }

    let scorer =
        OllamaEmbeddingSimilarity::new(server.uri(), "all-minilm", Duration::from_secs(5)).unwrap();
    assert_eq!(scorer.similarity("candidate", "old reference").await.unwrap(), 0.0);
    assert_eq!(scorer.similarity("candidate", "new reference").await.unwrap(), 1.0);
}

#[tokio::test]
async fn embedding_service_error_is_a_scorer_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .mount(&server)
        .await;

    let scorer =
        OllamaEmbeddingSimilarity::new(server.uri(), "missing", Duration::from_secs(5)).unwrap();
    let err = scorer.similarity("a", "b").await.unwrap_err();
    assert!(matches!(err, ScorerError::Status { status: 404, .. }));
}

#[tokio::test]
async fn languagetool_counts_matches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/check"))
        .and(body_string_contains("language=en-US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "software": { "name": "LanguageTool" },
            "matches": [
                { "message": "Possible spelling mistake", "offset": 4, "length": 3 },
                { "message": "Use a comma", "offset": 12, "length": 1 },
            ]
        })))
        .mount(&server)
        .await;

    let checker =
        LanguageToolChecker::new(server.uri(), "en-US", Duration::from_secs(5)).unwrap();
    assert_eq!(checker.check("Thsi is bad however").await.unwrap(), 2);
}

#[tokio::test]
async fn unavailable_grammar_service_degrades_the_evaluation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/check"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let similarity =
        OllamaEmbeddingSimilarity::new(server.uri(), "all-minilm", Duration::from_secs(5)).unwrap();
    let grammar =
        LanguageToolChecker::new(server.uri(), "en-US", Duration::from_secs(5)).unwrap();
    let evaluator = RewardEvaluator::new(
        Arc::new(similarity),
        Arc::new(FixedReadability(70.0)),
        Arc::new(grammar),
    );

    let evaluation = evaluator.evaluate("Some text.", None).await.unwrap();
    assert_eq!(evaluation.record.errors, 0);
    assert!(evaluation.degraded.grammar);
    assert!(!evaluation.degraded.similarity);
    assert_eq!(evaluation.record.score, 63.0);
}
