//! Pulling structured data out of free-form service output.

use std::borrow::Cow;
use std::sync::LazyLock;

use qstudio_graph::{ResultKind, ResultPayload};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Prefix of the line a program prints its result on.
pub const RESULT_PREFIX: &str = "RESULT:";

static PYTHON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```python\s*\n([\s\S]*?)\n```").expect("valid regex"));

/// Replace double-escaped newlines (`\\n`) with real ones.
pub fn normalize_output(output: &str) -> Cow<'_, str> {
    if output.contains("\\\\n") {
        Cow::Owned(output.replace("\\\\n", "\n"))
    } else {
        Cow::Borrowed(output)
    }
}

/// Extract the first well-formed `RESULT: <json>` payload from program output.
///
/// The JSON may span several lines; following lines are appended until the
/// braces balance (braces inside strings do not count). A payload is
/// accepted when `type` is `text`, `graph` or `plot` and `content` is
/// present. Malformed candidates are skipped.
///
/// ```rust
/// use qstudio_oracle::extract_result;
///
/// let out = "loading...\nRESULT: {\"type\": \"text\", \"content\": \"42\"}\ndone\n";
/// let payload = extract_result(out).unwrap();
/// assert_eq!(payload.content, "42");
/// ```
pub fn extract_result(output: &str) -> Option<ResultPayload> {
    let text = normalize_output(output);
    let lines: Vec<&str> = text.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        let Some(rest) = line.trim_start().strip_prefix(RESULT_PREFIX) else {
            continue;
        };

        let mut json = rest.trim().to_string();
        let mut balance = Balance::default();
        balance.feed(&json);
        let mut next = i + 1;
        while balance.open() && next < lines.len() {
            json.push('\n');
            json.push_str(lines[next]);
            balance.feed(lines[next]);
            next += 1;
        }

        match payload_from_json(&json) {
            Some(payload) => return Some(payload),
            None => debug!(line = i, "Skipping malformed RESULT line"),
        }
    }
    None
}

fn payload_from_json(json: &str) -> Option<ResultPayload> {
    let value: Value = serde_json::from_str(json).ok()?;
    let kind = ResultKind::parse(value.get("type")?.as_str()?)?;
    let content = value.get("content")?.clone();
    Some(ResultPayload { kind, content })
}

/// String-aware brace counter.
#[derive(Debug, Default)]
struct Balance {
    depth: i64,
    in_string: bool,
    escaped: bool,
}

impl Balance {
    fn feed(&mut self, text: &str) {
        for c in text.chars() {
            if self.in_string {
                match c {
                    _ if self.escaped => self.escaped = false,
                    '\\' => self.escaped = true,
                    '"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' => self.in_string = true,
                '{' => self.depth += 1,
                '}' => self.depth -= 1,
                _ => {}
            }
        }
    }

    fn open(&self) -> bool {
        self.depth > 0
    }
}

/// Code carried by a code-generation answer.
///
/// Answers wrapped in ```` ```python ```` fences yield the fenced blocks,
/// joined by newlines; anything else is returned as is.
pub fn extract_code(answer: &str) -> Cow<'_, str> {
    let blocks: Vec<&str> = PYTHON_FENCE
        .captures_iter(answer)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|b| !b.is_empty())
        .collect();
    if blocks.is_empty() {
        Cow::Borrowed(answer)
    } else {
        Cow::Owned(blocks.join("\n"))
    }
}
