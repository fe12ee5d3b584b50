//! Reduction of a finished run's stdout into an [`InvocationResult`].

use crate::stream::{parse_chunk, StreamEvent};
use crate::types::{InvocationResult, TokenUsage};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

const UNKNOWN: &str = "unknown";

/// Builds the result for a process that exited successfully.
///
/// Never fails: a `result/success` event is preferred, then a single JSON
/// object spanning the whole output, then the raw text itself.
#[must_use]
pub fn assemble(stdout: &str) -> InvocationResult {
    let messages = parse_chunk(stdout);
    let events: Vec<StreamEvent> = messages.iter().map(StreamEvent::from_value).collect();

    let init = events.iter().find_map(|e| match e {
        StreamEvent::Init(init) => Some(init),
        _ => None,
    });
    let success = events.iter().find_map(|e| match e {
        StreamEvent::Success(summary) => Some(summary),
        _ => None,
    });

    if let Some(summary) = success {
        let model = init
            .and_then(|i| i.model.clone())
            .unwrap_or_else(|| UNKNOWN.to_string());
        let session_id = summary
            .session_id
            .clone()
            .or_else(|| init.and_then(|i| i.session_id.clone()));
        return InvocationResult {
            content: summary.result.clone().unwrap_or_default(),
            model,
            usage: summary.usage.unwrap_or_default(),
            timestamp: now(),
            finish_reason: Some("stop".to_string()),
            session_id,
            duration_ms: 0,
            stream_messages: Some(messages),
        };
    }

    match serde_json::from_str::<Value>(stdout.trim()) {
        Ok(Value::Object(response)) => from_single_object(&response, stdout),
        _ => raw(stdout),
    }
}

fn from_single_object(response: &Map<String, Value>, stdout: &str) -> InvocationResult {
    let content = response
        .get("result")
        .and_then(Value::as_str)
        .or_else(|| response.get("content").and_then(Value::as_str))
        .or_else(|| {
            response
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(Value::as_str)
        })
        .unwrap_or(stdout)
        .to_string();

    let model_usage = response.get("modelUsage").and_then(Value::as_object);
    let first_model = model_usage.and_then(|m| m.iter().next());

    let model = response
        .get("model")
        .and_then(Value::as_str)
        .or_else(|| first_model.map(|(name, _)| name.as_str()))
        .unwrap_or(UNKNOWN)
        .to_string();

    let usage = response.get("usage");
    let tokens = |snake: &str, camel: &str| {
        usage
            .and_then(|u| u.get(snake))
            .and_then(Value::as_u64)
            .or_else(|| first_model.and_then(|(_, m)| m.get(camel)).and_then(Value::as_u64))
            .unwrap_or(0)
    };

    InvocationResult {
        content,
        model,
        usage: TokenUsage {
            input_tokens: tokens("input_tokens", "inputTokens"),
            output_tokens: tokens("output_tokens", "outputTokens"),
        },
        timestamp: now(),
        finish_reason: response
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(str::to_string),
        session_id: response
            .get("session_id")
            .and_then(Value::as_str)
            .map(str::to_string),
        duration_ms: 0,
        stream_messages: None,
    }
}

fn raw(stdout: &str) -> InvocationResult {
    InvocationResult {
        content: stdout.to_string(),
        model: UNKNOWN.to_string(),
        usage: TokenUsage::default(),
        timestamp: now(),
        finish_reason: Some(UNKNOWN.to_string()),
        session_id: None,
        duration_ms: 0,
        stream_messages: None,
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
