//! C3: builds a fully-formed outbound [`HttpRequest`] from a uniform request
//! and a merged provider config.

use std::collections::HashMap;

use config::{HeaderRule, MergedChatConfig, MergedEmbeddingConfig};
use reqwest::Method;
use secrecy::ExposeSecret;

use crate::http::HttpRequest;
use crate::json_path::{self, Node};
use crate::model::{ChatMessage, Role, ToolCall, ToolDefinition, UniformChatRequest, UniformEmbeddingRequest};

/// Applies the template's header rules, then the user's custom headers on
/// top (user always overrides template), per the edge policy in spec §4.3
/// step 9.
fn resolve_extra_headers(rules: &[HeaderRule], user_custom_headers: &HashMap<String, String>) -> HashMap<String, String> {
    let mut headers = HashMap::new();

    for rule in rules {
        match rule {
            HeaderRule::Insert { name, value } => {
                headers.insert(name.clone(), value.clone());
            }
            HeaderRule::Forward { name } => {
                if let Some(value) = user_custom_headers.get(name) {
                    headers.insert(name.clone(), value.clone());
                }
            }
        }
    }

    for (name, value) in user_custom_headers {
        headers.insert(name.clone(), value.clone());
    }

    headers
}

fn message_to_node(message: &ChatMessage) -> Node {
    let mut node = Node::empty_object();
    json_path::set(&mut node, "role", Node::from(role_str(message.role)));
    json_path::set(&mut node, "content", Node::from(message.content.clone()));

    if message.role == Role::Assistant && !message.tool_calls.is_empty() {
        let calls = message
            .tool_calls
            .iter()
            .map(tool_call_to_node)
            .collect::<Vec<_>>();
        json_path::set(&mut node, "tool_calls", Node::Array(calls));
    }

    if message.role == Role::Tool {
        if let Some(id) = &message.tool_call_id {
            json_path::set(&mut node, "tool_call_id", Node::from(id.clone()));
        }
    }

    node
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
        Role::Tool => "tool",
    }
}

fn tool_call_to_node(call: &ToolCall) -> Node {
    let mut node = Node::empty_object();
    json_path::set(&mut node, "id", Node::from(call.id.clone()));
    json_path::set(&mut node, "type", Node::from(call.r#type.clone()));
    json_path::set(&mut node, "function.name", Node::from(call.function_name.clone()));
    json_path::set(&mut node, "function.arguments", Node::from(call.arguments.clone()));
    node
}

fn tool_definition_to_node(tool: &ToolDefinition, paths: &config::ToolPaths) -> Node {
    let mut node = Node::empty_object();
    json_path::set(&mut node, &paths.name, Node::from(tool.name.clone()));
    json_path::set(&mut node, &paths.description, Node::from(tool.description.clone()));
    json_path::set(&mut node, &paths.parameters, Node::from_value(&tool.parameters));
    node
}

fn substitute_api_key(endpoint: &str, api_key: &str) -> String {
    endpoint.replace("{apiKey}", api_key)
}

/// Builds the outbound HTTP request for a single (possibly streaming) chat
/// call, following the ten-step algorithm in spec §4.3.
pub fn build_chat_request(merged: &MergedChatConfig, request: &UniformChatRequest) -> HttpRequest {
    let template = merged.template();
    let paths = &template.chat_api.request_paths;

    let mut body = Node::from_value(&merged.static_parameters());

    json_path::set(&mut body, &paths.model, Node::from(merged.model().to_string()));

    if let (Some(v), Some(path)) = (merged.temperature(), &paths.temperature) {
        json_path::set(&mut body, path, Node::from(v));
    }
    if let (Some(v), Some(path)) = (merged.top_p(), &paths.top_p) {
        json_path::set(&mut body, path, Node::from(v));
    }
    if let (Some(v), Some(path)) = (merged.typical_p(), &paths.typical_p) {
        json_path::set(&mut body, path, Node::from(v));
    }
    if let Some(path) = &paths.max_tokens {
        json_path::set(&mut body, path, Node::from(merged.max_tokens()));
    }

    let messages: Vec<Node> = request.messages.iter().map(message_to_node).collect();
    json_path::set(&mut body, &paths.messages, Node::Array(messages));

    if request.stream {
        json_path::set(&mut body, &paths.stream, Node::from(true));
    }

    if !request.tools.is_empty() {
        if let Some(tools_path) = &paths.tools {
            if let Some(tool_paths) = &template.chat_api.tool_paths {
                let tools: Vec<Node> = request
                    .tools
                    .iter()
                    .map(|tool| tool_definition_to_node(tool, tool_paths))
                    .collect();
                json_path::set(&mut body, tools_path, Node::Array(tools));
            }
        }
        if let Some(tool_choice_path) = &paths.tool_choice {
            json_path::set(&mut body, tool_choice_path, Node::from("auto"));
        }
    }

    if request.force_json_output {
        if let Some(json_mode) = &template.chat_api.json_mode {
            json_path::set(&mut body, &json_mode.path, Node::from_value(&json_mode.value));
        }
    }

    let api_key = merged.api_key().expose_secret();
    let url = substitute_api_key(merged.endpoint(), api_key);

    let mut headers = resolve_extra_headers(&template.http.headers, &merged.user().custom_headers);
    if !api_key.is_empty() {
        headers.insert(
            template.http.auth_header.clone(),
            format!("{} {}", template.http.auth_scheme, api_key),
        );
    }
    headers.insert("Content-Type".to_string(), "application/json".to_string());

    HttpRequest {
        method: Method::POST,
        url,
        headers: headers.into_iter().collect(),
        body: serde_json::to_vec(&body.to_value()).unwrap_or_default(),
    }
}

/// Builds the outbound HTTP request for a single embedding batch call.
pub fn build_embedding_request(merged: &MergedEmbeddingConfig, inputs: &[String]) -> HttpRequest {
    let template = merged.template();
    let paths = &template.embedding_api.request_paths;

    let mut body = Node::from_value(&merged.static_parameters());
    json_path::set(&mut body, &paths.model, Node::from(merged.model().to_string()));

    let input_nodes: Vec<Node> = inputs.iter().map(|s| Node::from(s.clone())).collect();
    json_path::set(&mut body, &paths.input, Node::Array(input_nodes));

    let api_key = merged.api_key().expose_secret();
    let url = substitute_api_key(merged.endpoint(), api_key);

    let mut headers = resolve_extra_headers(&template.http.headers, &merged.user().custom_headers);
    if !api_key.is_empty() {
        headers.insert(
            template.http.auth_header.clone(),
            format!("{} {}", template.http.auth_scheme, api_key),
        );
    }
    headers.insert("Content-Type".to_string(), "application/json".to_string());

    HttpRequest {
        method: Method::POST,
        url,
        headers: headers.into_iter().collect(),
        body: serde_json::to_vec(&body.to_value()).unwrap_or_default(),
    }
}

/// Helper so pipeline code can build a [`UniformEmbeddingRequest`]'s inputs
/// into batches without importing `config` directly.
pub fn embedding_inputs(request: &UniformEmbeddingRequest) -> &[String] {
    &request.input
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{ProviderTemplateChat, UserConfig};
    use indoc::indoc;
    use serde_json::Value;

    fn template_with_tools() -> ProviderTemplateChat {
        let json = indoc! {r#"
            {
              "provider_name": "openai",
              "http": {
                "auth_header": "Authorization", "auth_scheme": "Bearer",
                "headers": [ { "type": "insert", "name": "X-Vendor", "value": "nexus" } ]
              },
              "chat_api": {
                "endpoint": "https://api.test/v1/chat?key={apiKey}",
                "default_model": "gpt-test",
                "default_parameters": { "temperature": 0.7 },
                "request_paths": {
                  "model": "model", "messages": "messages", "temperature": "temperature",
                  "top_p": null, "typical_p": null, "max_tokens": "max_tokens",
                  "stream": "stream", "tools": "tools", "tool_choice": "tool_choice"
                },
                "response_paths": {
                  "choices": "choices", "content": "message.content",
                  "tool_calls": "message.tool_calls", "finish_reason": "finish_reason"
                },
                "tool_paths": { "name": "function.name", "description": "function.description", "parameters": "function.parameters" },
                "json_mode": { "path": "response_format.type", "value": "json_object" }
              },
              "static_parameters": { "n": 1 }
            }
        "#};
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn builds_request_with_message_model_and_headers() {
        let template = template_with_tools();
        let mut user = UserConfig::default();
        user.api_key = "sk-abc".to_string().into();
        let merged = MergedChatConfig::new("openai", template, user);

        let request = UniformChatRequest {
            messages: vec![ChatMessage::user("hello")],
            tools: vec![],
            force_json_output: false,
            stream: false,
            conversation_id: None,
        };

        let http_request = build_chat_request(&merged, &request);
        let body: Value = serde_json::from_slice(&http_request.body).unwrap();

        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["n"], 1);
        assert_eq!(body["temperature"], 0.7);

        assert_eq!(http_request.url, "https://api.test/v1/chat?key=sk-abc");
        let auth = http_request
            .headers
            .iter()
            .find(|(name, _)| name == "Authorization")
            .map(|(_, v)| v.as_str());
        assert_eq!(auth, Some("Bearer sk-abc"));
        let vendor = http_request
            .headers
            .iter()
            .find(|(name, _)| name == "X-Vendor")
            .map(|(_, v)| v.as_str());
        assert_eq!(vendor, Some("nexus"));
    }

    #[test]
    fn force_json_output_sets_json_mode_path() {
        let template = template_with_tools();
        let merged = MergedChatConfig::new("openai", template, UserConfig::default());

        let request = UniformChatRequest {
            messages: vec![ChatMessage::user("hi")],
            tools: vec![],
            force_json_output: true,
            stream: false,
            conversation_id: None,
        };

        let http_request = build_chat_request(&merged, &request);
        let body: Value = serde_json::from_slice(&http_request.body).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn tools_set_tool_choice_auto_when_path_present() {
        let template = template_with_tools();
        let merged = MergedChatConfig::new("openai", template, UserConfig::default());

        let request = UniformChatRequest {
            messages: vec![ChatMessage::user("hi")],
            tools: vec![ToolDefinition {
                name: "get_weather".to_string(),
                description: "fetch weather".to_string(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            force_json_output: false,
            stream: false,
            conversation_id: None,
        };

        let http_request = build_chat_request(&merged, &request);
        let body: Value = serde_json::from_slice(&http_request.body).unwrap();
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["function"]["name"], "get_weather");
    }
}
