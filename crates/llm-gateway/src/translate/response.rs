//! C4: turns a provider's HTTP response back into the uniform model, for
//! both the non-streaming and SSE-streaming cases.

use config::{ResponsePaths, ResponsePathsEmbedding};
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};

use crate::error::{ErrorKind, Result};
use crate::json_path::{self, Node};
use crate::model::{ChatMessage, EmbeddingResult, FinishReason, Role, ToolCall, UniformChatChunk, UniformChatResponse, UniformEmbeddingResponse};

fn node_to_tool_call(node: &Node) -> Option<ToolCall> {
    let id = json_path::get(node, "id").and_then(Node::as_str)?.to_string();
    let r#type = json_path::get(node, "type").and_then(Node::as_str).unwrap_or("function").to_string();
    let function_name = json_path::get(node, "function.name").and_then(Node::as_str)?.to_string();
    let arguments = json_path::get(node, "function.arguments")
        .and_then(Node::as_str)
        .unwrap_or_default()
        .to_string();

    Some(ToolCall {
        id,
        r#type,
        function_name,
        arguments,
    })
}

fn parse_finish_reason(raw: &str, has_tool_calls: bool) -> FinishReason {
    match raw {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        _ if has_tool_calls => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

fn error_response(diagnostic: String) -> UniformChatResponse {
    UniformChatResponse {
        finish_reason: FinishReason::Error,
        message: ChatMessage {
            role: Role::Assistant,
            content: diagnostic,
            tool_calls: Vec::new(),
            tool_call_id: None,
        },
    }
}

/// Whether a response's `Content-Type` indicates an SSE body, per the
/// non-streaming/streaming detection rule in spec §4.4.
pub fn is_event_stream(headers: &reqwest::header::HeaderMap) -> bool {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with("text/event-stream"))
}

/// Parses a complete (non-streaming) chat response body.
pub fn translate_non_streaming_chat(body: &[u8], paths: &ResponsePaths) -> UniformChatResponse {
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => return error_response(format!("invalid JSON in provider response: {e}")),
    };
    let root = Node::from_value(&value);

    if let Some(message) = json_path::get(&root, "error.message").and_then(Node::as_str) {
        return error_response(message.to_string());
    }

    let choice_path = format!("{}[0]", paths.choices);
    let Some(choice) = json_path::get(&root, &choice_path) else {
        return error_response(format!("no choice found at '{choice_path}'"));
    };

    let content = json_path::get(choice, &paths.content)
        .and_then(Node::as_str)
        .unwrap_or_default()
        .to_string();

    let tool_calls: Vec<ToolCall> = paths
        .tool_calls
        .as_deref()
        .and_then(|p| json_path::get(choice, p))
        .and_then(Node::as_array)
        .map(|nodes| nodes.iter().filter_map(node_to_tool_call).collect())
        .unwrap_or_default();

    let finish_reason_str = json_path::get(choice, &paths.finish_reason).and_then(Node::as_str).unwrap_or("stop");
    let finish_reason = parse_finish_reason(finish_reason_str, !tool_calls.is_empty());

    UniformChatResponse {
        finish_reason,
        message: ChatMessage {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
        },
    }
}

/// Consumes `response` as SSE, yielding a lazy finite sequence of
/// [`UniformChatChunk`], terminated by exactly one chunk with a non-empty
/// finish reason. Malformed individual events are skipped with a warning.
pub fn translate_streaming_chat(
    response: reqwest::Response,
    paths: ResponsePaths,
) -> impl Stream<Item = UniformChatChunk> + Send + 'static {
    let event_stream = response.bytes_stream().eventsource();

    struct State<S> {
        stream: std::pin::Pin<Box<S>>,
        terminal_emitted: bool,
        done: bool,
    }

    let state = State {
        stream: Box::pin(event_stream),
        terminal_emitted: false,
        done: false,
    };

    futures::stream::unfold((state, paths), move |(mut state, paths)| async move {
        if state.done {
            return None;
        }

        loop {
            match state.stream.next().await {
                None => {
                    state.done = true;
                    if state.terminal_emitted {
                        return None;
                    }
                    return Some((UniformChatChunk::terminal(FinishReason::Stop), (state, paths)));
                }
                Some(Err(_)) => {
                    log::warn!("SSE parsing error in chat stream, skipping event");
                    continue;
                }
                Some(Ok(event)) => {
                    if event.data == "[DONE]" {
                        state.done = true;
                        if state.terminal_emitted {
                            return None;
                        }
                        return Some((UniformChatChunk::terminal(FinishReason::Stop), (state, paths)));
                    }

                    let Ok(value) = serde_json::from_str::<serde_json::Value>(&event.data) else {
                        log::warn!("failed to parse streaming chunk JSON, skipping");
                        continue;
                    };
                    let root = Node::from_value(&value);
                    let choice_path = format!("{}[0]", paths.choices);
                    let Some(choice) = json_path::get(&root, &choice_path) else {
                        continue;
                    };

                    let content_delta = json_path::get(choice, &paths.content)
                        .and_then(Node::as_str)
                        .or_else(|| json_path::get(choice, "delta.content").and_then(Node::as_str))
                        .unwrap_or_default()
                        .to_string();

                    let tool_calls = paths
                        .tool_calls
                        .as_deref()
                        .and_then(|p| json_path::get(choice, p))
                        .and_then(Node::as_array)
                        .map(|nodes| nodes.iter().filter_map(node_to_tool_call).collect::<Vec<_>>());

                    let finish_reason = json_path::get(choice, &paths.finish_reason)
                        .and_then(Node::as_str)
                        .filter(|s| !s.is_empty())
                        .map(|s| parse_finish_reason(s, tool_calls.as_ref().is_some_and(|v| !v.is_empty())));

                    if finish_reason.is_some() {
                        state.terminal_emitted = true;
                    }

                    return Some((
                        UniformChatChunk {
                            content_delta,
                            finish_reason,
                            tool_calls,
                        },
                        (state, paths),
                    ));
                }
            }
        }
    })
}

/// Aggregates a finished chunk sequence into a single response: deltas
/// concatenated, the last non-empty tool-calls array wins, finish reason
/// taken from the terminal chunk.
pub fn aggregate_chunks(chunks: &[UniformChatChunk]) -> UniformChatResponse {
    let mut content = String::new();
    let mut last_tool_calls: Vec<ToolCall> = Vec::new();
    let mut finish_reason = FinishReason::Stop;

    for chunk in chunks {
        content.push_str(&chunk.content_delta);

        if let Some(calls) = &chunk.tool_calls {
            if !calls.is_empty() {
                last_tool_calls = calls.clone();
            }
        }

        if let Some(reason) = chunk.finish_reason {
            finish_reason = reason;
        }
    }

    UniformChatResponse {
        finish_reason,
        message: ChatMessage {
            role: Role::Assistant,
            content,
            tool_calls: last_tool_calls,
            tool_call_id: None,
        },
    }
}

/// Parses an embedding response body, restoring request order by `index`.
/// A length mismatch against `expected_len` is a protocol mismatch, not a
/// silently-truncated result.
pub fn translate_embedding_response(body: &[u8], paths: &ResponsePathsEmbedding, expected_len: usize) -> Result<UniformEmbeddingResponse> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| ErrorKind::ProviderProtocolMismatch(format!("invalid JSON: {e}")))?;
    let root = Node::from_value(&value);

    let items = json_path::get(&root, &paths.data_list)
        .and_then(Node::as_array)
        .ok_or_else(|| ErrorKind::ProviderProtocolMismatch(format!("no array at '{}'", paths.data_list)))?;

    let mut results = Vec::with_capacity(items.len());

    for item in items {
        let embedding: Vec<f32> = json_path::get(item, &paths.embedding)
            .and_then(Node::as_array)
            .ok_or_else(|| ErrorKind::ProviderProtocolMismatch("missing embedding array in response item".to_string()))?
            .iter()
            .map(|n| n.as_f64().unwrap_or(0.0) as f32)
            .collect();

        let index = json_path::get(item, &paths.index)
            .and_then(Node::as_f64)
            .map(|f| f as usize)
            .ok_or_else(|| ErrorKind::ProviderProtocolMismatch("missing index in response item".to_string()))?;

        results.push(EmbeddingResult { index, embedding });
    }

    results.sort_by_key(|r| r.index);

    if results.len() != expected_len {
        return Err(ErrorKind::ProviderProtocolMismatch(format!(
            "expected {expected_len} embeddings, got {}",
            results.len()
        )));
    }

    Ok(UniformEmbeddingResponse { results })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths() -> ResponsePaths {
        ResponsePaths {
            choices: "choices".to_string(),
            content: "message.content".to_string(),
            tool_calls: Some("message.tool_calls".to_string()),
            finish_reason: "finish_reason".to_string(),
        }
    }

    #[test]
    fn parses_plain_text_response() {
        let body = json!({
            "choices": [ { "message": { "content": "hello there" }, "finish_reason": "stop" } ]
        });

        let response = translate_non_streaming_chat(body.to_string().as_bytes(), &paths());
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.message.content, "hello there");
    }

    #[test]
    fn tool_calls_imply_tool_calls_finish_reason() {
        let body = json!({
            "choices": [ {
                "message": {
                    "content": "",
                    "tool_calls": [ { "id": "1", "type": "function", "function": { "name": "f", "arguments": "{}" } } ]
                },
                "finish_reason": "tool_calls"
            } ]
        });

        let response = translate_non_streaming_chat(body.to_string().as_bytes(), &paths());
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.message.tool_calls.len(), 1);
        assert_eq!(response.message.tool_calls[0].function_name, "f");
    }

    #[test]
    fn provider_error_payload_surfaces_as_error_finish_reason() {
        let body = json!({ "error": { "message": "rate limited" } });
        let response = translate_non_streaming_chat(body.to_string().as_bytes(), &paths());
        assert_eq!(response.finish_reason, FinishReason::Error);
        assert_eq!(response.message.content, "rate limited");
    }

    #[test]
    fn malformed_body_yields_error_response_not_a_panic() {
        let response = translate_non_streaming_chat(b"not json", &paths());
        assert_eq!(response.finish_reason, FinishReason::Error);
    }

    #[test]
    fn aggregate_concatenates_deltas_and_keeps_last_tool_calls() {
        let chunks = vec![
            UniformChatChunk {
                content_delta: "hel".to_string(),
                finish_reason: None,
                tool_calls: None,
            },
            UniformChatChunk {
                content_delta: "lo".to_string(),
                finish_reason: Some(FinishReason::Stop),
                tool_calls: None,
            },
        ];

        let aggregated = aggregate_chunks(&chunks);
        assert_eq!(aggregated.message.content, "hello");
        assert_eq!(aggregated.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn embedding_response_restores_input_order_by_index() {
        let paths = ResponsePathsEmbedding {
            data_list: "data".to_string(),
            embedding: "embedding".to_string(),
            index: "index".to_string(),
        };

        let body = json!({
            "data": [
                { "embedding": [0.2], "index": 1 },
                { "embedding": [0.1], "index": 0 },
            ]
        });

        let response = translate_embedding_response(body.to_string().as_bytes(), &paths, 2).unwrap();
        assert_eq!(response.results[0].index, 0);
        assert_eq!(response.results[0].embedding, vec![0.1]);
        assert_eq!(response.results[1].index, 1);
    }

    #[test]
    fn embedding_length_mismatch_is_protocol_mismatch() {
        let paths = ResponsePathsEmbedding {
            data_list: "data".to_string(),
            embedding: "embedding".to_string(),
            index: "index".to_string(),
        };

        let body = json!({ "data": [ { "embedding": [0.1], "index": 0 } ] });
        let err = translate_embedding_response(body.to_string().as_bytes(), &paths, 2).unwrap_err();
        assert!(matches!(err, ErrorKind::ProviderProtocolMismatch(_)));
    }
}
