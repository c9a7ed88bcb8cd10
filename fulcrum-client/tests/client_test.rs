// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! HTTP client tests against a mock Fulcrum API.

use fulcrum_client::{ClientConfig, ClientError, FulcrumClient, RetryPolicy};
use fulcrum_core::{
    ChatSession, CompareRunsError, CreateVersionRequest, DispatchOutcome, MetricsRange,
    PolicyStatus, ReplayCursor, ReplayStudio, RunStatus, RunsQuery, StageField, StudioError,
    StudioState,
};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn client_for(server: &ServerGuard, retries: u32) -> FulcrumClient {
    let config = ClientConfig::new(server.url())
        .with_api_key("test-key")
        .with_timeout(Duration::from_secs(5))
        .with_retry(
            RetryPolicy::default()
                .with_max_retries(retries)
                .with_base_delay(Duration::ZERO),
        );
    FulcrumClient::new(config).unwrap()
}

fn stages_body() -> String {
    json!({
        "run_id": "run_abc123",
        "model": "grok-beta",
        "temperature": 0.2,
        "confidence": 0.84,
        "stages": {
            "user_question": "What is Q3 forecast?",
            "retrieved_sources": [{"title": "Q3 pipeline", "score": 0.92}],
            "kpi_summary": {"pipeline_usd": 1250000},
            "prompt_packet": "SYSTEM: You are a sales forecaster.",
            "llm_response": "Q3 is projected at $1.1M.",
            "parsed_forecast": [{"quarter": "Q3", "amount": 1100000}]
        }
    })
    .to_string()
}

fn replay_body() -> String {
    json!({
        "new_run_id": "run_new_1",
        "output_text": "Q3 is projected at $1.2M.",
        "parsed_forecast": [{"quarter": "Q3", "amount": 1200000}],
        "metrics": {"latency_ms": 1450, "cost_usd": 0.0123, "confidence": 0.88, "parse_success": 1}
    })
    .to_string()
}

fn prompt_body(slug: &str) -> String {
    json!({
        "id": slug,
        "name": "Optimized Forecast",
        "latest_version": {"version": "v1", "template": "Forecast {{quarter}}", "created_at": "2025-06-01T10:00:00Z"},
        "versions": [],
        "status": "dev",
        "updated_at": "2025-06-01T10:00:00Z",
        "author": "User"
    })
    .to_string()
}

#[tokio::test]
async fn snapshot_is_fetched_once_and_cached() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/replay/runs/run_abc123/stages")
        .match_header("x-api-key", "test-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(stages_body())
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, 0);
    let first = client.fetch_run_stages("run_abc123").await.unwrap();
    let second = client.fetch_run_stages("run_abc123").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.model, "grok-beta");
    assert_eq!(
        first.stages.user_question.as_deref(),
        Some("What is Q3 forecast?")
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn invalidated_snapshot_is_refetched() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/replay/runs/run_abc123/stages")
        .with_status(200)
        .with_body(stages_body())
        .expect(2)
        .create_async()
        .await;

    let client = client_for(&server, 0);
    assert_ok!(client.fetch_run_stages("run_abc123").await);
    client.invalidate_snapshot("run_abc123").await;
    assert_ok!(client.fetch_run_stages("run_abc123").await);
    mock.assert_async().await;
}

#[tokio::test]
async fn error_detail_is_extracted() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/replay/runs/run_missing/stages")
        .with_status(404)
        .with_body(r#"{"detail": "Run not found"}"#)
        .create_async()
        .await;

    let client = client_for(&server, 3);
    let err = client.fetch_run_stages("run_missing").await.unwrap_err();
    match err {
        ClientError::Api { status, detail, .. } => {
            assert_eq!(status, 404);
            assert_eq!(detail.as_deref(), Some("Run not found"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn get_is_retried_on_server_errors() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/prompts")
        .with_status(503)
        .with_body(r#"{"detail": "warming up"}"#)
        .expect(3)
        .create_async()
        .await;

    let client = client_for(&server, 2);
    let err = assert_err!(client.list_prompts().await);
    assert_eq!(err.status(), Some(503));
    mock.assert_async().await;
}

#[tokio::test]
async fn retry_after_header_sets_the_wait() {
    let mut server = Server::new_async().await;
    let limited = server
        .mock("GET", "/prompts")
        .with_status(429)
        .with_header("retry-after", "0")
        .with_body(r#"{"detail": "Too many requests"}"#)
        .expect(1)
        .create_async()
        .await;
    let ok = server
        .mock("GET", "/prompts")
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;

    // Backoff alone would wait the 10 s cap.
    let config = ClientConfig::new(server.url()).with_retry(
        RetryPolicy::default()
            .with_max_retries(1)
            .with_base_delay(Duration::from_secs(30)),
    );
    let client = FulcrumClient::new(config).unwrap();
    let prompts = tokio::time::timeout(Duration::from_secs(5), client.list_prompts())
        .await
        .expect("Retry-After should override the backoff")
        .unwrap();

    assert!(prompts.is_empty());
    limited.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn disabled_retries_fail_fast() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/guardrails/policies")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;

    let config = ClientConfig::new(server.url()).with_retry(RetryPolicy::none());
    let client = FulcrumClient::new(config).unwrap();
    let err = assert_err!(client.guardrail_policies().await);
    assert_eq!(err.status(), Some(503));
    mock.assert_async().await;
}

#[tokio::test]
async fn expired_snapshot_is_refetched() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/replay/runs/run_abc123/stages")
        .with_status(200)
        .with_body(stages_body())
        .expect(2)
        .create_async()
        .await;

    let config = ClientConfig::new(server.url())
        .with_retry(RetryPolicy::none())
        .with_snapshot_cache(16, Duration::from_millis(50));
    let client = FulcrumClient::new(config).unwrap();
    assert_ok!(client.fetch_run_stages("run_abc123").await);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_ok!(client.fetch_run_stages("run_abc123").await);
    mock.assert_async().await;
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/prompts/unknown")
        .with_status(404)
        .with_body(r#"{"detail": "Prompt not found"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, 3);
    assert_err!(client.get_prompt("unknown").await);
    mock.assert_async().await;
}

#[tokio::test]
async fn replay_post_is_sent_once() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/replay/runs/run_abc123/stages")
        .with_status(200)
        .with_body(stages_body())
        .create_async()
        .await;
    let mock = server
        .mock("POST", "/replay/staged")
        .with_status(500)
        .with_body(r#"{"detail": "LLM timeout"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = Arc::new(client_for(&server, 3));
    let studio = ReplayStudio::replay(client.clone(), "run_abc123");
    studio.load().await.unwrap();
    let err = studio.run().await.unwrap_err();

    assert_eq!(err.to_string(), "Replay failed: LLM timeout");
    assert!(matches!(err, StudioError::Backend { .. }));
    assert_eq!(studio.state(), StudioState::Ready);
    assert!(studio.last_result().is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn studio_replays_from_prompt_assembly() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/replay/runs/run_abc123/stages")
        .with_status(200)
        .with_body(stages_body())
        .create_async()
        .await;
    let replay = server
        .mock("POST", "/replay/staged")
        .match_header("x-api-key", "test-key")
        .match_body(Matcher::PartialJson(json!({
            "source_run_id": "run_abc123",
            "replay_from_stage": 3,
            "model": "grok-beta",
            "overrides": {"prompt_packet": "SYSTEM: Answer in one line."},
            "options": {"recompute_retrieval": false, "recompute_kpi": false}
        })))
        .with_status(200)
        .with_body(replay_body())
        .expect(1)
        .create_async()
        .await;

    let studio = ReplayStudio::replay(client_for(&server, 0), "run_abc123");
    studio.load().await.unwrap();
    studio
        .set_override(StageField::UserQuestion, "What is Q4 forecast?")
        .unwrap();
    studio.set_replay_from(ReplayCursor::new(3).unwrap());
    studio
        .set_override(StageField::PromptPacket, "SYSTEM: Answer in one line.")
        .unwrap();

    let DispatchOutcome::Completed(result) = studio.run().await.unwrap() else {
        panic!("expected a completed replay");
    };
    assert_eq!(result.new_run_id, "run_new_1");
    assert!(result.metrics.parsed());
    assert!(studio
        .render_result()
        .unwrap()
        .contains("Latency 1450ms | Cost $0.0123 | Confidence 88% | Parsed YES"));

    // The upstream edit never reaches the wire.
    let sent = studio.staged_request().unwrap();
    assert!(sent.overrides.user_question.is_none());
    replay.assert_async().await;
}

#[tokio::test]
async fn playground_run_posts_to_replay() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/replay")
        .match_body(Matcher::Json(json!({
            "source_run_id": "playground",
            "model": "gpt-4-turbo",
            "temperature": 0.7,
            "prompt": "Forecast Q3"
        })))
        .with_status(200)
        .with_body(
            json!({
                "new_run_id": "run_pg_1",
                "latency_ms": 820,
                "cost_usd": 0.004,
                "confidence": 0.71,
                "output_text": "Q3 looks flat.",
                "view_run_url": "/runs/run_pg_1"
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let studio = ReplayStudio::playground(client_for(&server, 0));
    studio.set_prompt("  Forecast Q3 ");
    let outcome = studio.run().await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::Completed(ref r) if r.new_run_id == "run_pg_1"));
    mock.assert_async().await;
}

#[tokio::test]
async fn prompt_version_is_posted_to_slug() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/prompts/optimized_forecast/versions")
        .match_body(Matcher::Json(json!({
            "template": "Forecast {{quarter}} in one line",
            "author": "ana"
        })))
        .with_status(200)
        .with_body(prompt_body("optimized_forecast"))
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, 0);
    let prompt = client
        .create_prompt_version(
            "optimized_forecast",
            &CreateVersionRequest {
                template: "Forecast {{quarter}} in one line".into(),
                author: Some("ana".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(prompt.id, "optimized_forecast");
    assert_eq!(prompt.latest_version.unwrap().version, "v1");
    mock.assert_async().await;
}

#[tokio::test]
async fn runs_filters_are_sent_as_query() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/runs")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("model".into(), "grok-beta".into()),
            Matcher::UrlEncoded("min_confidence".into(), "0.5".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "runs": [{"run_id": "run_abc123", "status": "success", "model": "grok-beta", "confidence": 0.84}],
                "total": 1,
                "models": ["grok-beta"],
                "statuses": ["success"]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, 0);
    let runs = client
        .list_runs(&RunsQuery {
            model: Some("grok-beta".into()),
            min_confidence: Some(0.5),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(runs.total, Some(1));
    assert_eq!(runs.runs[0].run_id, "run_abc123");
    mock.assert_async().await;
}

#[tokio::test]
async fn chat_session_adopts_server_session() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("POST", "/chat/")
        .match_body(Matcher::PartialJson(json!({"message": "What is Q3 forecast?"})))
        .with_status(200)
        .with_body(
            json!({"response": "About $1.1M.", "run_id": "run_chat_1", "session_id": "sess-42"})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", "/chat/")
        .match_body(Matcher::PartialJson(
            json!({"message": "And Q4?", "session_id": "sess-42"}),
        ))
        .with_status(200)
        .with_body(json!({"response": "Roughly $1.3M.", "session_id": "sess-42"}).to_string())
        .expect(1)
        .create_async()
        .await;

    let chat = ChatSession::new(client_for(&server, 0));
    let reply = chat.send("What is Q3 forecast?").await.unwrap();
    assert_eq!(reply.run_id.as_deref(), Some("run_chat_1"));
    assert_eq!(chat.session_id().as_deref(), Some("sess-42"));

    let reply = chat.send("And Q4?").await.unwrap();
    assert_eq!(reply.content, "Roughly $1.3M.");
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn run_detail_is_fetched_by_id() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/runs/run_abc123")
        .with_status(200)
        .with_body(
            json!({
                "run_id": "run_abc123",
                "status": "failed",
                "model": "grok-beta",
                "params": {"temperature": 0.2, "top_k": 5},
                "metrics": {"latency_ms": 2210.0},
                "tags": {"env": "staging"},
                "artifacts": [{"name": "output.json", "path": "runs/run_abc123/output.json", "type": "json"}],
                "confidence_explanation": "Parse failed"
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, 0);
    let detail = client.get_run("run_abc123").await.unwrap();
    assert_eq!(detail.summary.status, RunStatus::Failed);
    assert_eq!(detail.params["top_k"], json!(5));
    assert_eq!(detail.artifacts[0].kind, "json");
    assert_eq!(detail.confidence_explanation.as_deref(), Some("Parse failed"));
    mock.assert_async().await;
}

#[tokio::test]
async fn compare_sends_comma_joined_ids() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/compare")
        .match_query(Matcher::UrlEncoded("run_ids".into(), "run_a,run_b".into()))
        .with_status(200)
        .with_body(
            json!({"runs": [
                {"run_id": "run_a", "status": "success", "model": "grok-beta"},
                {"run_id": "run_b", "status": "success", "model": "gpt-4-turbo"}
            ]})
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, 0);
    let compared = client.compare_runs(&["run_a", "run_b"]).await.unwrap();
    let models: Vec<_> = compared.runs.iter().map(|r| r.summary.model.as_str()).collect();
    assert_eq!(models, ["grok-beta", "gpt-4-turbo"]);
    mock.assert_async().await;
}

#[tokio::test]
async fn compare_outside_two_to_four_is_not_sent() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/compare")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server, 0);
    for ids in [vec!["run_a"], vec!["a", "b", "c", "d", "e"]] {
        let err = assert_err!(client.compare_runs(&ids).await);
        assert!(matches!(
            err,
            ClientError::Compare(CompareRunsError::RunCount(n)) if n == ids.len()
        ));
        assert!(!err.is_retryable());
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn metrics_summary_sends_range() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/metrics/summary")
        .match_query(Matcher::UrlEncoded("range".into(), "30d".into()))
        .with_status(200)
        .with_body(
            json!({
                "range": "30d",
                "kpis": {
                    "p50_latency_ms": 910.0,
                    "p95_latency_ms": 2400.0,
                    "total_cost_usd": 12.5,
                    "avg_confidence": 0.74,
                    "parse_success_rate": 0.96,
                    "run_count": 318
                },
                "models": ["grok-beta", "gpt-4-turbo"]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, 0);
    let summary = client.metrics_summary(MetricsRange::Month).await.unwrap();
    assert_eq!(summary.range, MetricsRange::Month);
    assert_eq!(summary.kpis.run_count, 318);
    assert_eq!(summary.models.len(), 2);
    mock.assert_async().await;
}

#[tokio::test]
async fn guardrail_policies_are_listed() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/guardrails/policies")
        .match_header("x-api-key", "test-key")
        .with_status(200)
        .with_body(
            json!([
                {"id": "pii", "name": "PII Detection", "description": "Email and phone numbers",
                 "type": "pii", "status": "active", "violations_24h": 4},
                {"id": "toxicity", "name": "Toxicity", "description": "Abusive language",
                 "type": "toxicity", "status": "monitor", "violations_24h": 0}
            ])
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, 0);
    let policies = client.guardrail_policies().await.unwrap();
    assert_eq!(policies.len(), 2);
    assert_eq!(policies[0].violations_24h, 4);
    assert_eq!(policies[1].status, PolicyStatus::Monitor);
    assert!(!policies[1].is_active());
    mock.assert_async().await;
}
