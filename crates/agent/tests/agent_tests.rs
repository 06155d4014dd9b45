//! Façade tests against an in-process `Transport`.
//!
//! These tests do NOT require a running agent. They check what the façade
//! sends (method, path, query, body) and how it interprets what comes back.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent::{
    Agent, AgentError, ByteStream, CancellationToken, CheckDefinition, CheckId,
    CheckRegistration, HealthStatus, LogLevel, Query, ServiceId, ServiceRegistration,
    StatusDecodeError, Transport, TransportError,
};
use async_trait::async_trait;

// ══════════════════════════════════════════════════════════════════════════════
// Recording transport
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
struct Call {
    method: &'static str,
    path: String,
    query: Query,
    body: Option<serde_json::Value>,
}

#[derive(Default)]
struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    responses: Mutex<HashMap<String, serde_json::Value>>,
    stream_body: Mutex<Option<Vec<u8>>>,
    self_fetches: AtomicUsize,
}

impl RecordingTransport {
    fn respond(self, path: &str, value: serde_json::Value) -> Self {
        self.responses.lock().unwrap().insert(path.to_string(), value);
        self
    }

    fn stream(self, body: &str) -> Self {
        *self.stream_body.lock().unwrap() = Some(body.as_bytes().to_vec());
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(
        &self,
        method: &'static str,
        path: &str,
        query: &Query,
        body: Option<serde_json::Value>,
    ) {
        self.calls.lock().unwrap().push(Call {
            method,
            path: path.to_string(),
            query: query.clone(),
            body,
        });
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn get_json(
        &self,
        path: &str,
        query: &Query,
    ) -> Result<serde_json::Value, TransportError> {
        self.record("GET", path, query, None);
        if path == "/v1/agent/self" {
            self.self_fetches.fetch_add(1, Ordering::SeqCst);
        }
        self.responses
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or(TransportError::Status {
                status: 404,
                body: format!("no route for {path}"),
                retry_after: None,
            })
    }

    async fn put(
        &self,
        path: &str,
        query: &Query,
        body: Option<serde_json::Value>,
    ) -> Result<(), TransportError> {
        self.record("PUT", path, query, body);
        Ok(())
    }

    async fn stream_get(&self, path: &str, query: &Query) -> Result<ByteStream, TransportError> {
        self.record("GET", path, query, None);
        let body = self.stream_body.lock().unwrap().clone();
        match body {
            Some(body) => Ok(Box::new(Cursor::new(body))),
            None => {
                // Never answers: used to exercise cancellation while connecting.
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("test should cancel before the stream opens")
            }
        }
    }
}

fn pair(k: &str, v: &str) -> (String, String) {
    (k.to_string(), v.to_string())
}

fn check_id(id: &str) -> CheckId {
    CheckId::new(id).unwrap()
}

// ══════════════════════════════════════════════════════════════════════════════
// Identity
// ══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_node_name_is_fetched_once_across_clones() {
    let transport = Arc::new(
        RecordingTransport::default()
            .respond("/v1/agent/self", serde_json::json!({"Config": {"NodeName": "node-A"}})),
    );
    let agent = Agent::new(transport.clone());
    let clone = agent.clone();
    let cancel = CancellationToken::new();

    assert_eq!(agent.node_name(&cancel).await.unwrap().as_str(), "node-A");
    assert_eq!(clone.node_name(&cancel).await.unwrap().as_str(), "node-A");

    assert_eq!(transport.self_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_self_info_is_not_memoized() {
    let transport = Arc::new(RecordingTransport::default().respond(
        "/v1/agent/self",
        serde_json::json!({"Config": {"NodeName": "node-A", "Datacenter": "dc1"}}),
    ));
    let agent = Agent::new(transport.clone());

    let first = agent.self_info().await.unwrap();
    agent.self_info().await.unwrap();

    assert_eq!(first.config.datacenter.as_deref(), Some("dc1"));
    assert_eq!(transport.self_fetches.load(Ordering::SeqCst), 2);
}

// ══════════════════════════════════════════════════════════════════════════════
// TTL updates
// ══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_legacy_ttl_uses_legacy_path_segment_and_note() {
    let transport = Arc::new(RecordingTransport::default());
    let agent = Agent::new(transport.clone());
    let id = check_id("service:web");

    agent.pass_ttl(&id, None).await.unwrap();
    agent.warn_ttl(&id, Some("slow")).await.unwrap();
    agent.fail_ttl(&id, None).await.unwrap();

    let calls = transport.calls();
    let paths: Vec<&str> = calls.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/v1/agent/check/pass/service:web",
            "/v1/agent/check/warn/service:web",
            "/v1/agent/check/fail/service:web",
        ]
    );
    assert!(calls.iter().all(|c| c.method == "PUT" && c.body.is_none()));
    assert_eq!(calls[1].query, vec![pair("note", "slow")]);
    assert!(calls[0].query.is_empty());
}

#[tokio::test]
async fn test_update_ttl_sends_current_vocabulary_in_body() {
    let transport = Arc::new(RecordingTransport::default());
    let agent = Agent::new(transport.clone());

    let status = HealthStatus::decode("fail").unwrap();
    agent
        .update_ttl(&check_id("heartbeat"), "no response", status)
        .await
        .unwrap();

    let calls = transport.calls();
    assert_eq!(calls[0].path, "/v1/agent/check/update/heartbeat");
    assert_eq!(
        calls[0].body,
        Some(serde_json::json!({"Status": "critical", "Output": "no response"}))
    );
}

#[tokio::test]
async fn test_ttl_rejects_ids_that_would_change_the_path() {
    let transport = Arc::new(RecordingTransport::default());
    let agent = Agent::new(transport.clone());

    let err = agent.pass_ttl(&check_id("a/b"), None).await.unwrap_err();

    assert!(matches!(err, AgentError::InvalidArgument { .. }));
    assert!(transport.calls().is_empty());
}

// ══════════════════════════════════════════════════════════════════════════════
// Checks and services
// ══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_checks_decode_either_status_vocabulary() {
    let transport = Arc::new(RecordingTransport::default().respond(
        "/v1/agent/checks",
        serde_json::json!({
            "web": {"Node": "n1", "CheckID": "web", "Name": "Web", "Status": "passing"},
            "db": {"Node": "n1", "CheckID": "db", "Name": "DB", "Status": "fail"}
        }),
    ));
    let agent = Agent::new(transport);

    let checks = agent.checks().await.unwrap();

    assert_eq!(checks["web"].status, HealthStatus::Passing);
    assert_eq!(checks["db"].status, HealthStatus::Critical);
}

#[tokio::test]
async fn test_checks_with_unknown_status_fail_with_decode_error() {
    let transport = Arc::new(RecordingTransport::default().respond(
        "/v1/agent/checks",
        serde_json::json!({
            "web": {"Node": "n1", "CheckID": "web", "Name": "Web", "Status": "maintenance"}
        }),
    ));
    let agent = Agent::new(transport);

    let err = agent.checks().await.unwrap_err();

    match err {
        AgentError::InvalidStatus(StatusDecodeError::InvalidStatus { value }) => {
            assert_eq!(value, "maintenance");
        }
        other => panic!("expected a status decode error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_register_check_and_service_send_pascal_case_bodies() {
    let transport = Arc::new(RecordingTransport::default());
    let agent = Agent::new(transport.clone());

    agent
        .register_service(&ServiceRegistration {
            id: ServiceId::new("web-1"),
            name: "web".into(),
            port: Some(8080),
            ..Default::default()
        })
        .await
        .unwrap();
    agent
        .register_check(&CheckRegistration {
            name: "heartbeat".into(),
            service_id: ServiceId::new("web-1"),
            definition: CheckDefinition {
                ttl: Some("15s".into()),
                ..Default::default()
            },
            ..Default::default()
        })
        .await
        .unwrap();
    agent
        .deregister_service(&ServiceId::new("web-1").unwrap())
        .await
        .unwrap();

    let calls = transport.calls();
    assert_eq!(calls[0].path, "/v1/agent/service/register");
    assert_eq!(
        calls[0].body,
        Some(serde_json::json!({"ID": "web-1", "Name": "web", "Port": 8080}))
    );
    assert_eq!(calls[1].path, "/v1/agent/check/register");
    assert_eq!(
        calls[1].body,
        Some(serde_json::json!({"Name": "heartbeat", "ServiceID": "web-1", "TTL": "15s"}))
    );
    assert_eq!(calls[2].path, "/v1/agent/service/deregister/web-1");
}

#[tokio::test]
async fn test_members_and_maintenance_query_parameters() {
    let transport = Arc::new(RecordingTransport::default().respond(
        "/v1/agent/members",
        serde_json::json!([{"Name": "n1", "Addr": "10.0.0.1", "Port": 8302, "Status": 1}]),
    ));
    let agent = Agent::new(transport.clone());

    let members = agent.members(true).await.unwrap();
    agent.enable_node_maintenance(Some("upgrade")).await.unwrap();
    agent.disable_node_maintenance().await.unwrap();

    assert_eq!(members[0].name, "n1");
    let calls = transport.calls();
    assert_eq!(calls[0].query, vec![pair("wan", "1")]);
    assert_eq!(
        calls[1].query,
        vec![pair("enable", "true"), pair("reason", "upgrade")]
    );
    assert_eq!(calls[2].query, vec![pair("enable", "false")]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Log streaming
// ══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_monitor_requests_lowercase_level_and_reads_lines() {
    let transport = Arc::new(RecordingTransport::default().stream("line1\nline2\nline3"));
    let agent = Agent::new(transport.clone());
    let cancel = CancellationToken::new();

    let mut reader = agent.monitor(LogLevel::Debug, &cancel).await.unwrap();
    let mut lines = Vec::new();
    while let Some(line) = reader.next_line().await.unwrap() {
        lines.push(line);
    }

    assert_eq!(lines, vec!["line1", "line2", "line3"]);
    let calls = transport.calls();
    assert_eq!(calls[0].path, "/v1/agent/monitor");
    assert_eq!(calls[0].query, vec![pair("loglevel", "debug")]);
}

#[tokio::test]
async fn test_monitor_json_adds_logjson_flag() {
    let transport = Arc::new(RecordingTransport::default().stream(""));
    let agent = Agent::new(transport.clone());

    let mut reader = agent
        .monitor_json(LogLevel::Warn, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reader.next_line().await.unwrap(), None);
    assert_eq!(
        transport.calls()[0].query,
        vec![pair("loglevel", "warn"), pair("logjson", "true")]
    );
}

#[tokio::test]
async fn test_monitor_cancelled_while_connecting_reports_cancellation() {
    let transport = Arc::new(RecordingTransport::default());
    let agent = Agent::new(transport);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        agent.monitor(LogLevel::Info, &cancel),
    )
    .await
    .expect("monitor should observe cancellation")
    .unwrap_err();

    assert!(err.is_cancelled());
}
