//! Helpers that turn raw hook payload fields into event record fields

use serde_json::Value;

/// Input fields that can carry injected instructions
const SCANNABLE_INPUT_FIELDS: &[&str] = &[
    "command",
    "content",
    "prompt",
    "query",
    "new_string",
    "old_string",
    "pattern",
];

/// Truncate `text` to at most `max_bytes` of UTF-8, never splitting a character.
///
/// Returns the (possibly marked) text and the original byte size when truncation happened.
pub fn truncate_output(text: &str, max_bytes: usize) -> (String, Option<usize>) {
    let original = text.len();
    if original <= max_bytes {
        return (text.to_string(), None);
    }

    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }

    let mut truncated = String::with_capacity(end + 48);
    truncated.push_str(&text[..end]);
    truncated.push_str(&format!(
        "\n\n[TRUNCATED - original size: {:.1} KB]",
        original as f64 / 1024.0
    ));
    (truncated, Some(original))
}

/// File paths a tool call touches, in first-seen order
pub fn extract_files_accessed(tool_name: &str, tool_input: &Value) -> Vec<String> {
    let field = |key: &str| -> Vec<String> {
        tool_input
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| vec![s.to_string()])
            .unwrap_or_default()
    };

    match tool_name {
        "Read" | "Edit" | "Write" | "MultiEdit" => field("file_path"),
        "NotebookEdit" => field("notebook_path"),
        "Glob" | "Grep" => field("path"),
        "Bash" => tool_input
            .get("command")
            .and_then(|v| v.as_str())
            .map(extract_paths_from_bash)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Pull path-looking tokens out of a shell command
pub fn extract_paths_from_bash(command: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();

    for token in command.split_whitespace() {
        let token = token
            .trim_start_matches(['>', '<', '(', '"', '\''])
            .trim_end_matches(['"', '\'', ';', ',', ')', '&', '|']);

        if token.is_empty() || token.starts_with('-') || token.contains("://") {
            continue;
        }

        let looks_like_path = token.starts_with('/')
            || token.starts_with("./")
            || token.starts_with("../")
            || token.starts_with("~/");

        if looks_like_path && !paths.iter().any(|p| p == token) {
            paths.push(token.to_string());
        }
    }

    paths
}

/// Join the scannable string fields of a tool input
pub fn extract_input_text(tool_input: &Value) -> String {
    let Some(map) = tool_input.as_object() else {
        return String::new();
    };

    SCANNABLE_INPUT_FIELDS
        .iter()
        .filter_map(|key| map.get(*key).and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text content of a tool response
pub fn extract_text_content(tool_response: &Value) -> String {
    match tool_response {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => join_text_blocks(items),
        Value::Object(map) => {
            for key in ["content", "output", "text", "result"] {
                match map.get(key) {
                    Some(Value::String(s)) => return s.clone(),
                    Some(Value::Array(items)) => {
                        let joined = join_text_blocks(items);
                        if !joined.is_empty() {
                            return joined;
                        }
                    }
                    _ => {}
                }
            }

            if let Some(Value::Object(file)) = map.get("file")
                && let Some(Value::String(content)) = file.get("content")
            {
                return content.clone();
            }

            let streams: Vec<&str> = ["stdout", "stderr"]
                .iter()
                .filter_map(|k| map.get(*k).and_then(|v| v.as_str()))
                .filter(|s| !s.is_empty())
                .collect();
            if !streams.is_empty() {
                return streams.join("\n");
            }

            tool_response.to_string()
        }
        other => other.to_string(),
    }
}

fn join_text_blocks(items: &[Value]) -> String {
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(block) => block.get("text").and_then(|v| v.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Where a tool's content came from, for warnings
pub fn describe_source(tool_name: &str, tool_input: &Value) -> String {
    let pick = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| tool_input.get(*k).and_then(|v| v.as_str()))
            .map(|s| s.to_string())
    };

    let source = match tool_name {
        "Read" | "Edit" | "Write" | "MultiEdit" => pick(&["file_path"]),
        "NotebookEdit" => pick(&["notebook_path"]),
        "WebFetch" => pick(&["url"]),
        "WebSearch" => pick(&["query"]),
        "Bash" => pick(&["command"]),
        "Glob" | "Grep" => pick(&["path", "pattern"]),
        _ => None,
    };

    source.unwrap_or_else(|| tool_name.to_string())
}
