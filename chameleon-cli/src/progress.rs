//! One-line progress notes for live stream events.

use chameleon_claude::{ContentBlock, StreamEvent};
use serde_json::Value;

const TOOLS_SHOWN: usize = 5;

/// Human-readable progress notes for `event`, if it is worth showing.
#[must_use]
pub fn describe(event: &StreamEvent) -> Vec<String> {
    match event {
        StreamEvent::Init(init) => {
            let mut tools = init
                .tools
                .iter()
                .take(TOOLS_SHOWN)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if init.tools.len() > TOOLS_SHOWN {
                tools.push_str("...");
            }
            vec![format!(
                "System initialization completed\nWorking directory: {}\nAvailable tools: {tools}",
                init.cwd.as_deref().unwrap_or("?")
            )]
        }
        StreamEvent::Assistant(blocks) => blocks.iter().filter_map(describe_tool_use).collect(),
        StreamEvent::User(blocks) => blocks.iter().filter_map(describe_tool_result).collect(),
        StreamEvent::Success(_) | StreamEvent::Unknown(_) => Vec::new(),
    }
}

fn describe_tool_use(block: &ContentBlock) -> Option<String> {
    let ContentBlock::ToolUse { name, input, .. } = block else {
        return None;
    };
    let mut note = format!("Calling tool: {name}");
    if let Some(pattern) = input.get("pattern").and_then(Value::as_str) {
        note.push_str(&format!("\nScan pattern: {pattern}"));
    } else if let Some(path) = input.get("file_path").and_then(Value::as_str) {
        note.push_str(&format!("\nReading file: {}", file_name(path)));
    }
    Some(note)
}

fn describe_tool_result(block: &ContentBlock) -> Option<String> {
    let text = block.result_text()?;
    let documents = text.matches(".txt").count();
    if documents > 0 {
        Some(format!("Found {documents} document files"))
    } else if text.len() > 50 {
        let kb = ((text.len() + 512) / 1024).max(1);
        Some(format!("File content read ({kb} KB)"))
    } else {
        None
    }
}

// Tool inputs carry paths from whichever OS the CLI runs on.
fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
