//! Normalization of provider responses into reasoning, answer text and
//! tool invocations.
//!
//! Responses are handled as loosely-typed JSON. The reasoning provider has
//! shipped its deliberation under several block types and field names across
//! API versions, so blocks are classified into [`ContentBlock`] and reasoning
//! text is located with an ordered list of [`FieldProbe`]s. Every access is
//! defensive: malformed input degrades to empty output, never to an error.

use crate::conversation::ProviderMode;
use serde_json::Value;

/// A tool call the model asked for. Detected only, never executed.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub raw_payload: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedResponse {
    pub reasoning_segments: Vec<String>,
    pub text_segments: Vec<String>,
    pub tool_invocations: Vec<ToolInvocation>,
}

impl NormalizedResponse {
    /// Non-blank text segments joined in order, one per line.
    pub fn answer(&self) -> String {
        self.text_segments
            .iter()
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.reasoning_segments.is_empty()
            && self.text_segments.is_empty()
            && self.tool_invocations.is_empty()
    }
}

/// One content block of a multi-block response.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text { text: String },
    Reasoning { tag: String, text: String },
    ToolUse { name: String, input: Value },
    /// A block kind we do not know. `tag` is `None` when the block had no type.
    Unknown { tag: Option<String> },
}

/// Where to look for text inside a block.
#[derive(Debug, Clone, Copy)]
enum FieldProbe {
    /// The field is a string.
    Direct(&'static str),
    /// The field is a string, or a value exposing a nested `text`.
    Nested(&'static str),
    /// Any non-null value, rendered as a string.
    Coerced(&'static str),
}

/// Probe order for reasoning text, highest priority first.
const REASONING_PROBES: [FieldProbe; 6] = [
    FieldProbe::Direct("text"),
    FieldProbe::Coerced("content"),
    FieldProbe::Nested("thinking"),
    FieldProbe::Nested("reasoning"),
    FieldProbe::Nested("thought"),
    FieldProbe::Nested("content"),
];

/// Substrings that mark a block type as reasoning, compared lowercase.
const REASONING_MARKERS: [&str; 2] = ["reasoning", "thought"];

const TOOL_USE_TAGS: [&str; 2] = ["tool_use", "server_tool_use"];

impl FieldProbe {
    fn extract(self, block: &Value) -> Option<String> {
        let text = match self {
            Self::Direct(field) => block.get(field)?.as_str().map(str::to_string),
            Self::Nested(field) => nested_text(block.get(field)?),
            Self::Coerced(field) => match block.get(field)? {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            },
        }?;
        (!text.is_empty()).then_some(text)
    }
}

fn nested_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("text")?.as_str().map(str::to_string),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(nested_text).collect();
            (!parts.is_empty()).then(|| parts.join("\n"))
        }
        _ => None,
    }
}

fn type_tag(block: &Value) -> Option<String> {
    match block.get("type")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn is_reasoning_tag(tag: &str) -> bool {
    if tag == "thinking" {
        return true;
    }
    let lower = tag.to_lowercase();
    REASONING_MARKERS.iter().any(|m| lower.contains(m))
}

/// First non-empty reasoning text found by walking [`REASONING_PROBES`].
fn reasoning_text(block: &Value) -> Option<String> {
    REASONING_PROBES.iter().find_map(|probe| probe.extract(block))
}

impl ContentBlock {
    pub fn classify(block: &Value) -> Self {
        let Some(tag) = type_tag(block) else {
            return Self::Unknown { tag: None };
        };

        if tag == "text" {
            let text = block
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Self::Text { text };
        }

        if TOOL_USE_TAGS.contains(&tag.as_str()) {
            let name = block
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let input = block.get("input").cloned().unwrap_or(Value::Null);
            return Self::ToolUse { name, input };
        }

        if is_reasoning_tag(&tag) {
            let text = reasoning_text(block).unwrap_or_default();
            return Self::Reasoning { tag, text };
        }

        Self::Unknown { tag: Some(tag) }
    }
}

/// Blocks of a multi-block response. A bare array is accepted as the block list.
fn content_blocks(response: &Value) -> &[Value] {
    match response {
        Value::Array(items) => items,
        other => other
            .get("content")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
    }
}

/// Normalize a multi-block (reasoning provider) response.
pub fn normalize_blocks(response: &Value) -> NormalizedResponse {
    let mut out = NormalizedResponse::default();
    for block in content_blocks(response) {
        match ContentBlock::classify(block) {
            ContentBlock::Text { text } => out.text_segments.push(text),
            ContentBlock::Reasoning { text, .. } => {
                if !text.is_empty() {
                    out.reasoning_segments.push(text);
                }
            }
            ContentBlock::ToolUse { name, input } => out.tool_invocations.push(ToolInvocation {
                name,
                raw_payload: input,
            }),
            ContentBlock::Unknown { .. } => {}
        }
    }
    out
}

/// Normalize a single-message (chat-completion provider) response.
///
/// The message content is the only text segment; there is never reasoning.
pub fn normalize_chat(response: &Value) -> NormalizedResponse {
    let mut out = NormalizedResponse::default();
    let Some(message) = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
    else {
        return out;
    };

    if let Some(text) = message.get("content").and_then(nested_text) {
        if !text.trim().is_empty() {
            out.text_segments.push(text);
        }
    }

    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            out.tool_invocations.push(ToolInvocation {
                name: tool_call_name(call),
                raw_payload: call.clone(),
            });
        }
    }
    out
}

fn tool_call_name(call: &Value) -> String {
    call.get("function")
        .and_then(|f| f.get("name"))
        .and_then(Value::as_str)
        .or_else(|| call.get("name").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

pub fn normalize(mode: ProviderMode, response: &Value) -> NormalizedResponse {
    match mode {
        ProviderMode::Chat => normalize_chat(response),
        ProviderMode::Reasoning => normalize_blocks(response),
    }
}

/// Raw type tag of every block, `"unknown"` where absent. Used to diagnose
/// schema drift when no reasoning was found.
pub fn block_type_tags(response: &Value) -> Vec<String> {
    content_blocks(response)
        .iter()
        .map(|b| type_tag(b).unwrap_or_else(|| "unknown".into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn thinking_and_text_blocks() {
        let resp = json!({
            "content": [
                {"type": "thinking", "thinking": "Let me think.", "signature": "abc"},
                {"type": "text", "text": "Answer."}
            ]
        });
        let n = normalize_blocks(&resp);
        assert_eq!(n.reasoning_segments, vec!["Let me think."]);
        assert_eq!(n.text_segments, vec!["Answer."]);
        assert!(n.tool_invocations.is_empty());
        assert_eq!(n.answer(), "Answer.");
    }

    #[test]
    fn fuzzy_reasoning_tag_matches_any_case() {
        let resp = json!([
            {"type": "Reasoning_V2", "reasoning": "deliberation"},
            {"type": "internal_THOUGHT", "thought": {"text": "nested"}}
        ]);
        let n = normalize_blocks(&resp);
        assert_eq!(n.reasoning_segments, vec!["deliberation", "nested"]);
        assert!(n.text_segments.is_empty());
    }

    #[test]
    fn text_block_is_never_reasoning() {
        let block = json!({"type": "text", "text": "hi", "thought": "hidden"});
        assert_eq!(
            ContentBlock::classify(&block),
            ContentBlock::Text { text: "hi".into() }
        );
        let n = normalize_blocks(&json!([block]));
        assert!(n.reasoning_segments.is_empty());
        assert_eq!(n.text_segments, vec!["hi"]);
    }

    #[test]
    fn text_block_without_text_yields_empty_segment() {
        let n = normalize_blocks(&json!([{"type": "text"}]));
        assert_eq!(n.text_segments, vec![""]);
        assert_eq!(n.answer(), "");
    }

    #[test]
    fn blank_text_segments_are_left_out_of_the_answer() {
        let n = normalize_blocks(&json!([
            {"type": "thinking", "thinking": "hmm"},
            {"type": "text"},
            {"type": "text", "text": "  \n"}
        ]));
        assert_eq!(n.text_segments.len(), 2);
        assert_eq!(n.answer(), "");

        let n = normalize_blocks(&json!([
            {"type": "text", "text": "one"},
            {"type": "text", "text": " "},
            {"type": "text", "text": "two"}
        ]));
        assert_eq!(n.answer(), "one\ntwo");

        let chat = json!({"choices": [{"message": {"content": "   "}}]});
        assert!(normalize_chat(&chat).text_segments.is_empty());
    }

    #[test]
    fn reasoning_probe_order() {
        // direct text wins over everything
        let b = json!({"type": "thinking", "text": "t", "content": "c", "thinking": "th"});
        assert_eq!(reasoning_text(&b).as_deref(), Some("t"));

        // content, rendered as a string, before candidate fields
        let b = json!({"type": "thinking", "content": "c", "thinking": "th"});
        assert_eq!(reasoning_text(&b).as_deref(), Some("c"));
        let b = json!({"type": "reasoning", "content": {"steps": 3}, "thinking": "th"});
        assert_eq!(reasoning_text(&b).as_deref(), Some(r#"{"steps":3}"#));
        let b = json!({"type": "thinking", "content": [{"text": "a"}]});
        assert_eq!(reasoning_text(&b).as_deref(), Some(r#"[{"text":"a"}]"#));

        // null content counts as absent
        let b = json!({"type": "thinking", "content": null, "thinking": "th"});
        assert_eq!(reasoning_text(&b).as_deref(), Some("th"));

        // candidates in fixed order
        let b = json!({"type": "thinking", "thought": "tho", "reasoning": "rea"});
        assert_eq!(reasoning_text(&b).as_deref(), Some("rea"));
        let b = json!({"type": "thinking", "thought": {"text": "nested"}});
        assert_eq!(reasoning_text(&b).as_deref(), Some("nested"));
    }

    #[test]
    fn structured_content_wins_over_thinking_field() {
        let n = normalize_blocks(&json!([
            {"type": "reasoning", "content": {"steps": 3}, "thinking": "th"}
        ]));
        assert_eq!(n.reasoning_segments, vec![r#"{"steps":3}"#]);
    }

    #[test]
    fn empty_probe_falls_through_to_next_candidate() {
        let b = json!({"type": "thinking", "text": "", "thinking": "real"});
        assert_eq!(reasoning_text(&b).as_deref(), Some("real"));
    }

    #[test]
    fn reasoning_block_without_text_contributes_nothing() {
        let resp = json!([
            {"type": "thinking", "signature": "only"},
            {"type": "reasoning", "thinking": null, "content": null}
        ]);
        let n = normalize_blocks(&resp);
        assert!(n.is_empty());
    }

    #[test]
    fn tool_use_is_detected_even_with_text() {
        let resp = json!({"content": [
            {"type": "server_tool_use", "id": "s1", "name": "web_search", "input": {"query": "rust"}},
            {"type": "web_search_tool_result", "content": []},
            {"type": "tool_use", "name": "lookup", "text": "ignored", "input": {"k": 1}},
            {"type": "text", "text": "Found it."}
        ]});
        let n = normalize_blocks(&resp);
        assert_eq!(n.tool_invocations.len(), 2);
        assert_eq!(n.tool_invocations[0].name, "web_search");
        assert_eq!(n.tool_invocations[0].raw_payload, json!({"query": "rust"}));
        assert_eq!(n.tool_invocations[1].name, "lookup");
        assert_eq!(n.text_segments, vec!["Found it."]);
        assert!(n.reasoning_segments.is_empty());
    }

    #[test]
    fn unknown_blocks_are_classified_and_ignored() {
        assert_eq!(
            ContentBlock::classify(&json!({"type": "redacted_thinking", "data": "x"})),
            ContentBlock::Unknown {
                tag: Some("redacted_thinking".into())
            }
        );
        assert_eq!(
            ContentBlock::classify(&json!({"text": "no type"})),
            ContentBlock::Unknown { tag: None }
        );
        assert_eq!(
            ContentBlock::classify(&json!(42)),
            ContentBlock::Unknown { tag: None }
        );
    }

    #[test]
    fn malformed_input_never_panics() {
        let inputs = [
            json!(null),
            json!("string"),
            json!(7),
            json!({}),
            json!({"content": "not a list"}),
            json!({"content": [null, 1, "x", [], {"type": null}, {"type": 5, "reasoning": 1}]}),
            json!([{"type": "thinking", "thinking": {"text": 3}}, {"type": "tool_use"}]),
            json!({"choices": "nope"}),
            json!({"choices": [{"message": {"content": null, "tool_calls": [null, 3]}}]}),
        ];
        for input in &inputs {
            let _ = normalize_blocks(input);
            let _ = normalize_chat(input);
            let _ = block_type_tags(input);
        }

        let n = normalize_blocks(&inputs[6]);
        assert!(n.reasoning_segments.is_empty());
        assert_eq!(n.tool_invocations.len(), 1);
        assert_eq!(n.tool_invocations[0].name, "");
        assert_eq!(n.tool_invocations[0].raw_payload, Value::Null);
    }

    #[test]
    fn order_is_preserved_per_sequence() {
        let resp = json!([
            {"type": "text", "text": "1"},
            {"type": "thinking", "thinking": "a"},
            {"type": "text", "text": "2"},
            {"type": "reasoning_summary", "text": "b"},
            {"type": "text", "text": "3"}
        ]);
        let n = normalize_blocks(&resp);
        assert_eq!(n.text_segments, vec!["1", "2", "3"]);
        assert_eq!(n.reasoning_segments, vec!["a", "b"]);
        assert_eq!(n.answer(), "1\n2\n3");
    }

    #[test]
    fn chat_response_is_single_text_segment() {
        let resp = json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello!"}}]
        });
        let n = normalize_chat(&resp);
        assert_eq!(n.text_segments, vec!["Hello!"]);
        assert!(n.reasoning_segments.is_empty());
        assert!(n.tool_invocations.is_empty());
    }

    #[test]
    fn chat_tool_calls_probe_name() {
        let resp = json!({"choices": [{"message": {
            "content": null,
            "tool_calls": [
                {"id": "1", "type": "function", "function": {"name": "web_search", "arguments": "{}"}},
                {"id": "2", "name": "flat_name"},
                {"id": "3"}
            ]
        }}]});
        let n = normalize_chat(&resp);
        assert!(n.text_segments.is_empty());
        let names: Vec<_> = n.tool_invocations.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["web_search", "flat_name", ""]);
        assert_eq!(n.tool_invocations[1].raw_payload["id"], "2");
    }

    #[test]
    fn normalize_dispatches_on_mode() {
        let blocks = json!({"content": [{"type": "text", "text": "b"}]});
        assert_eq!(normalize(ProviderMode::Reasoning, &blocks).answer(), "b");
        assert!(normalize(ProviderMode::Chat, &blocks).is_empty());
    }

    #[test]
    fn block_tags_mark_missing_types() {
        let resp = json!({"content": [{"type": "text"}, {"foo": 1}, {"type": "thinking"}]});
        assert_eq!(block_type_tags(&resp), vec!["text", "unknown", "thinking"]);
    }
}
