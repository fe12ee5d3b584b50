//! Interpretation of the CLI's `stream-json` output.
//!
//! The CLI interleaves diagnostic lines with one JSON object per line:
//! - `{"type":"system","subtype":"init","model":"...","cwd":"...","tools":[...]}`
//! - `{"type":"assistant","message":{"content":[{"type":"tool_use",...}]}}`
//! - `{"type":"user","message":{"content":[{"type":"tool_result",...}]}}`
//! - `{"type":"result","subtype":"success","result":"...","usage":{...}}`
//!
//! Lines that are not JSON are dropped. JSON that does not match a known
//! shape becomes [`StreamEvent::Unknown`].

use crate::types::TokenUsage;
use serde::Deserialize;
use serde_json::Value;

/// Parses one stdout line, returning `None` for blank or non-JSON lines.
#[must_use]
pub fn parse_line(line: &str) -> Option<Value> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    serde_json::from_str(line).ok()
}

/// Parses every JSON line of `chunk`, in order.
#[must_use]
pub fn parse_chunk(chunk: &str) -> Vec<Value> {
    chunk.lines().filter_map(parse_line).collect()
}

/// Details of the `system/init` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionInit {
    /// Model the CLI resolved for this session.
    #[serde(default)]
    pub model: Option<String>,
    /// Working directory of the CLI.
    #[serde(default)]
    pub cwd: Option<String>,
    /// Tools available to the session.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Session identifier.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Details of the terminal `result/success` event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSummary {
    /// Final answer text.
    pub result: Option<String>,
    /// Token usage for the whole run.
    pub usage: Option<TokenUsage>,
    /// Session identifier.
    pub session_id: Option<String>,
    /// Duration reported by the CLI.
    pub duration_ms: Option<u64>,
    /// Number of agent turns.
    pub num_turns: Option<u32>,
    /// Reported cost in USD.
    pub total_cost_usd: Option<f64>,
}

impl ResultSummary {
    /// Reads each field on its own; a missing or mistyped field is left
    /// unset (or zero for token counts) without discarding the others.
    fn from_event(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        let usage = value.get("usage").filter(|u| u.is_object()).map(|u| {
            let count = |key: &str| u.get(key).and_then(Value::as_u64).unwrap_or(0);
            TokenUsage {
                input_tokens: count("input_tokens"),
                output_tokens: count("output_tokens"),
            }
        });
        Self {
            result: text("result"),
            usage,
            session_id: text("session_id"),
            duration_ms: value.get("duration_ms").and_then(Value::as_u64),
            num_turns: value
                .get("num_turns")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok()),
            total_cost_usd: value.get("total_cost_usd").and_then(Value::as_f64),
        }
    }
}

/// One block of message content.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain assistant text.
    Text {
        /// The text.
        text: String,
    },
    /// The assistant invoked a tool.
    ToolUse {
        /// Tool call id.
        #[serde(default)]
        id: String,
        /// Tool name.
        name: String,
        /// Tool input payload.
        #[serde(default)]
        input: Value,
    },
    /// A tool produced a result.
    ToolResult {
        /// Id of the tool call this answers.
        #[serde(default)]
        tool_use_id: String,
        /// Result payload: a string or a list of text blocks.
        #[serde(default)]
        content: Value,
        /// Whether the tool failed.
        #[serde(default)]
        is_error: bool,
    },
    /// Any other block type (thinking, images, ...).
    #[serde(other)]
    Other,
}

impl ContentBlock {
    /// Flattened text of a tool result's content.
    #[must_use]
    pub fn result_text(&self) -> Option<String> {
        let Self::ToolResult { content, .. } = self else {
            return None;
        };
        Some(match content {
            Value::String(s) => s.clone(),
            Value::Array(parts) => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }
}

/// A typed event from the CLI's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// `system/init`: session setup.
    Init(SessionInit),
    /// Assistant message carrying text and tool calls.
    Assistant(Vec<ContentBlock>),
    /// User message, in practice carrying tool results.
    User(Vec<ContentBlock>),
    /// `result/success`: the authoritative final answer.
    Success(ResultSummary),
    /// Anything else, including `result` events with other subtypes.
    Unknown(Value),
}

#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    content: MessageContent,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Blocks(Vec<ContentBlock>),
    Text(String),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Blocks(Vec::new())
    }
}

impl MessageContent {
    fn into_blocks(self) -> Vec<ContentBlock> {
        match self {
            Self::Blocks(blocks) => blocks,
            Self::Text(text) => vec![ContentBlock::Text { text }],
        }
    }
}

impl StreamEvent {
    /// Classifies a parsed JSON line.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self::classify(value).unwrap_or_else(|| Self::Unknown(value.clone()))
    }

    fn classify(value: &Value) -> Option<Self> {
        let kind = value.get("type")?.as_str()?;
        let subtype = value.get("subtype").and_then(Value::as_str);
        match (kind, subtype) {
            ("system", Some("init")) => serde_json::from_value(value.clone()).ok().map(Self::Init),
            ("result", Some("success")) => Some(Self::Success(ResultSummary::from_event(value))),
            ("assistant" | "user", _) => {
                let body: MessageBody = serde_json::from_value(value.get("message")?.clone()).ok()?;
                let blocks = body.content.into_blocks();
                Some(if kind == "assistant" {
                    Self::Assistant(blocks)
                } else {
                    Self::User(blocks)
                })
            }
            _ => None,
        }
    }

    /// Assistant text blocks carried by this event.
    pub fn assistant_text(&self) -> impl Iterator<Item = &str> {
        let blocks: &[ContentBlock] = match self {
            Self::Assistant(blocks) => blocks,
            _ => &[],
        };
        blocks.iter().filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn interleaved_noise_is_dropped_and_order_kept() {
        let chunk = "{\"n\":1}\nnot json\n\n   \n{\"n\":2}\n{broken\n{\"n\":3}";
        let parsed = parse_chunk(chunk);
        let ns: Vec<i64> = parsed.iter().filter_map(|v| v["n"].as_i64()).collect();
        assert_eq!(ns, vec![1, 2, 3]);
    }

    #[test]
    fn classifies_init() {
        let v = json!({
            "type": "system", "subtype": "init", "model": "deepseek-v3",
            "cwd": "/work", "tools": ["Bash", "Read"], "session_id": "abc"
        });
        let StreamEvent::Init(init) = StreamEvent::from_value(&v) else {
            panic!("expected init");
        };
        assert_eq!(init.model.as_deref(), Some("deepseek-v3"));
        assert_eq!(init.tools, vec!["Bash", "Read"]);
        assert_eq!(init.session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn classifies_tool_use_and_text() {
        let v = json!({"type": "assistant", "message": {"content": [
            {"type": "text", "text": "Looking"},
            {"type": "tool_use", "id": "t1", "name": "Glob", "input": {"pattern": "*.txt"}},
            {"type": "thinking", "thinking": "..."}
        ]}});
        let event = StreamEvent::from_value(&v);
        let StreamEvent::Assistant(blocks) = &event else {
            panic!("expected assistant");
        };
        assert_eq!(blocks.len(), 3);
        assert!(matches!(&blocks[1], ContentBlock::ToolUse { name, .. } if name == "Glob"));
        assert_eq!(blocks[2], ContentBlock::Other);
        assert_eq!(event.assistant_text().collect::<Vec<_>>(), vec!["Looking"]);
    }

    #[test]
    fn tool_result_content_is_flattened() {
        let v = json!({"type": "user", "message": {"content": [
            {"type": "tool_result", "tool_use_id": "t1",
             "content": [{"type": "text", "text": "a.txt"}, {"type": "text", "text": "b.txt"}]}
        ]}});
        let StreamEvent::User(blocks) = StreamEvent::from_value(&v) else {
            panic!("expected user");
        };
        assert_eq!(blocks[0].result_text().as_deref(), Some("a.txt\nb.txt"));
    }

    #[test]
    fn string_message_content_becomes_text_block() {
        let v = json!({"type": "user", "message": {"role": "user", "content": "hi"}});
        assert_eq!(
            StreamEvent::from_value(&v),
            StreamEvent::User(vec![ContentBlock::Text { text: "hi".to_string() }])
        );
    }

    #[test]
    fn success_survives_mistyped_fields() {
        let v = json!({
            "type": "result", "subtype": "success", "result": "Hello",
            "usage": {"input_tokens": null, "output_tokens": 5},
            "duration_ms": "slow", "num_turns": -1, "session_id": "s1"
        });
        let StreamEvent::Success(summary) = StreamEvent::from_value(&v) else {
            panic!("expected success");
        };
        assert_eq!(summary.result.as_deref(), Some("Hello"));
        assert_eq!(summary.usage, Some(TokenUsage { input_tokens: 0, output_tokens: 5 }));
        assert_eq!(summary.session_id.as_deref(), Some("s1"));
        assert_eq!(summary.duration_ms, None);
        assert_eq!(summary.num_turns, None);
    }

    #[test]
    fn unrecognized_shapes_fail_closed() {
        for v in [
            json!({"type": "result", "subtype": "error_max_turns", "is_error": true}),
            json!({"type": "system", "subtype": "hook_started"}),
            json!({"type": "assistant"}),
            json!({"type": "assistant", "message": {"content": 42}}),
            json!([1, 2, 3]),
            json!({"hello": "world"}),
        ] {
            assert_eq!(StreamEvent::from_value(&v), StreamEvent::Unknown(v.clone()));
        }
    }
}
