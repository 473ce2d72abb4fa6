//! Canonical JSON fingerprinting for cache keys.

use sha2::{Digest, Sha256};
use serde_json::{Map, Value};

use crate::model::{ChatMessage, ToolDefinition, UniformChatRequest};

/// Recursively canonicalizes `value`: object keys sorted lexicographically,
/// array order preserved, `null` and `false`/`0`/`""`/empty-collection
/// default values dropped from objects so their presence doesn't perturb the
/// hash.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            for key in keys {
                let canon = canonicalize(&map[key]);
                if !is_default(&canon) {
                    sorted.insert(key.clone(), canon);
                }
            }

            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn is_default(value: &Value) -> bool {
    matches!(value, Value::Null)
        || matches!(value, Value::Array(items) if items.is_empty())
        || matches!(value, Value::Object(map) if map.is_empty())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Builds the canonical body object described in the fingerprint contract:
/// normalized messages, tools, merged dynamic parameters, merged static
/// parameters, and json-mode flags. The `stream` flag is deliberately never
/// part of this object.
pub fn fingerprint_body(
    messages: &[ChatMessage],
    tools: &[ToolDefinition],
    temperature: Option<f32>,
    top_p: Option<f32>,
    typical_p: Option<f32>,
    max_tokens: u32,
    static_parameters: &Value,
    json_mode_enabled: bool,
    json_mode_value: Option<&Value>,
) -> Value {
    let normalized_messages: Vec<Value> = messages
        .iter()
        .map(|m| {
            let mut obj = Map::new();
            obj.insert("role".into(), serde_json::to_value(m.role).unwrap_or(Value::Null));
            obj.insert("content".into(), Value::String(m.content.clone()));
            if let Some(id) = &m.tool_call_id {
                obj.insert("tool_call_id".into(), Value::String(id.clone()));
            }
            if !m.tool_calls.is_empty() {
                obj.insert(
                    "tool_calls".into(),
                    serde_json::to_value(&m.tool_calls).unwrap_or(Value::Null),
                );
            }
            Value::Object(obj)
        })
        .collect();

    let tools_value = if tools.is_empty() {
        Value::Null
    } else {
        serde_json::to_value(tools).unwrap_or(Value::Null)
    };

    let mut parameters = Map::new();
    if let Some(v) = temperature {
        parameters.insert("temperature".into(), json_number(v));
    }
    if let Some(v) = top_p {
        parameters.insert("top_p".into(), json_number(v));
    }
    if let Some(v) = typical_p {
        parameters.insert("typical_p".into(), json_number(v));
    }
    parameters.insert("max_tokens".into(), Value::Number(max_tokens.into()));

    let mut json_mode = Map::new();
    json_mode.insert("enabled".into(), Value::Bool(json_mode_enabled));
    json_mode.insert("value".into(), json_mode_value.cloned().unwrap_or(Value::Null));

    let mut body = Map::new();
    body.insert("messages".into(), Value::Array(normalized_messages));
    body.insert("tools".into(), tools_value);
    body.insert("parameters".into(), Value::Object(parameters));
    body.insert("static".into(), static_parameters.clone());
    body.insert("json_mode".into(), Value::Object(json_mode));

    Value::Object(body)
}

fn json_number(v: f32) -> Value {
    serde_json::Number::from_f64(v as f64).map(Value::Number).unwrap_or(Value::Null)
}

/// Cache key for a chat request: `chat:<provider>:<model>:<sha256 hex>`.
pub fn chat_key(provider: &str, endpoint_with_placeholder: &str, model: &str, body: &Value) -> String {
    let canonical = canonicalize(body);

    let mut envelope = Map::new();
    envelope.insert("ns".into(), Value::String("chat".into()));
    envelope.insert("provider".into(), Value::String(provider.into()));
    envelope.insert("endpoint".into(), Value::String(endpoint_with_placeholder.into()));
    envelope.insert("model".into(), Value::String(model.into()));
    envelope.insert("body".into(), canonical);

    let serialized = serde_json::to_vec(&Value::Object(envelope)).expect("canonicalized JSON always serializes");
    let hash = sha256_hex(&serialized);

    format!("chat:{provider}:{model}:{hash}")
}

/// Cache key for a single embedding input: `embed:<provider>:<model>:<sha256 hex of the input>`.
pub fn embedding_key(provider: &str, model: &str, input: &str) -> String {
    let hash = sha256_hex(input.as_bytes());
    format!("embed:{provider}:{model}:{hash}")
}

/// Replaces the literal `{apiKey}` placeholder so the fingerprint never
/// embeds the key itself, while still distinguishing endpoints that differ
/// only in where the key is substituted.
pub fn endpoint_with_key_placeholder(endpoint: &str) -> String {
    endpoint.replace("{apiKey}", "{key}")
}

/// Derives a [`UniformChatRequest`]'s fingerprint inputs without consuming it.
pub fn request_fingerprint_parts(request: &UniformChatRequest) -> (&[ChatMessage], &[ToolDefinition]) {
    (&request.messages, &request.tools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_is_order_independent_for_object_keys() {
        let body_a = json!({"a": 1, "b": {"x": 1, "y": 2}});
        let body_b = json!({"b": {"y": 2, "x": 1}, "a": 1});

        assert_eq!(
            chat_key("openai", "https://api/{key}", "gpt", &body_a),
            chat_key("openai", "https://api/{key}", "gpt", &body_b)
        );
    }

    #[test]
    fn fingerprint_omits_null_fields() {
        let body_with_null = json!({"a": 1, "b": null});
        let body_without = json!({"a": 1});

        assert_eq!(
            chat_key("openai", "ep", "gpt", &body_with_null),
            chat_key("openai", "ep", "gpt", &body_without)
        );
    }

    #[test]
    fn different_providers_never_collide() {
        let body = json!({"a": 1});
        assert_ne!(chat_key("openai", "ep", "gpt", &body), chat_key("anthropic", "ep", "gpt", &body));
    }

    #[test]
    fn embedding_key_is_per_input_not_per_batch() {
        let a = embedding_key("openai", "text-embed", "hello");
        let b = embedding_key("openai", "text-embed", "world");
        assert_ne!(a, b);
    }
}
