//! Tool and resource surface types for `tools/*` and `resources/*`
//! (spec §6, §4.7's SDK tool surface).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry in a `tools/list` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    #[serde(rename = "outputSchema", skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsListResult {
    pub tools: Vec<ToolDefinition>,
}

/// Params for `tools/call`.
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// One block in a tool result's `content` array. Only the `text` kind
/// is produced by this host (spec §6's result shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl ContentBlock {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self { kind: "text", text: text.into() }
    }
}

/// Result of `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    #[must_use]
    pub fn ok(text: impl Into<String>, structured_content: Option<Value>) -> Self {
        Self { content: vec![ContentBlock::text(text)], structured_content, is_error: false }
    }

    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self { content: vec![ContentBlock::text(text)], structured_content: None, is_error: true }
    }
}

/// One entry in a `resources/list` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub uri: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesListResult {
    pub resources: Vec<ResourceEntry>,
}

/// Params for `resources/read`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadResourceParams {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContent {
    pub uri: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceResult {
    pub contents: Vec<ResourceContent>,
}

/// The fixed `ultralight.*` tool names injected into every app's
/// advertised tool list (spec §4.7, §6's "SDK tool surface").
pub const SDK_TOOL_NAMES: &[&str] = &[
    "ultralight.getSkills",
    "ultralight.store",
    "ultralight.load",
    "ultralight.list",
    "ultralight.query",
    "ultralight.remove",
    "ultralight.remember",
    "ultralight.recall",
    "ultralight.ai",
    "ultralight.call",
];

/// The `ultralight://app/{appId}/skills.md` resource URI (spec §6
/// "Resource URIs").
#[must_use]
pub fn skills_resource_uri(app_id: &str) -> String {
    format!("ultralight://app/{app_id}/skills.md")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_result_is_not_an_error() {
        let result = CallToolResult::ok("done", None);
        assert!(!result.is_error);
        assert_eq!(result.content[0].text, "done");
    }

    #[test]
    fn error_result_has_no_structured_content() {
        let result = CallToolResult::error("boom");
        assert!(result.is_error);
        assert!(result.structured_content.is_none());
    }

    #[test]
    fn content_block_always_serializes_type_text() {
        let block = ContentBlock::text("hi");
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "text");
    }

    #[test]
    fn sdk_tool_names_are_all_namespaced() {
        assert_eq!(SDK_TOOL_NAMES.len(), 10);
        assert!(SDK_TOOL_NAMES.iter().all(|n| n.starts_with("ultralight.")));
    }

    #[test]
    fn skills_resource_uri_matches_spec_scheme() {
        assert_eq!(skills_resource_uri("app1"), "ultralight://app/app1/skills.md");
    }

    #[test]
    fn call_tool_params_deserializes_without_arguments() {
        let params: CallToolParams = serde_json::from_value(json!({"name": "fn1"})).unwrap();
        assert_eq!(params.name, "fn1");
        assert_eq!(params.arguments, Value::Null);
    }

    #[test]
    fn tool_result_omits_structured_content_when_absent() {
        let result = CallToolResult::ok("done", None);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("structuredContent").is_none());
    }
}
